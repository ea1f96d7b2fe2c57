//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request:
//!     → gate.rs (classify, admit or reject against availability)
//!     → handler → PoolManager::execute
//!
//! Probes (startup, reconnect, gate re-check):
//!     → retries.rs (attempt budget and delay)
//! ```
//!
//! # Design Decisions
//! - Writes fail fast while the store is down
//! - Reads are admitted in degraded mode
//! - Retry budgets are fixed, not exponential

pub mod gate;
pub mod retries;

pub use gate::{Admission, AvailabilityGate, OperationKind};
pub use retries::RetryPolicy;
