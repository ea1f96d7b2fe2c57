//! Database health subsystem.
//!
//! # Data Flow
//! ```text
//! Probe (probe.rs):
//!     ping pool with bounded retries
//!     → recreate pool between failed attempts
//!     → write outcome to state.rs
//!
//! State (state.rs):
//!     Unknown → Up | Down, published on a watch channel
//!
//! Reconnect (reconnect.rs):
//!     Down observed → Armed
//!     → every interval: probe, on success init schema → Idle
//! ```
//!
//! # Design Decisions
//! - The probe is the single writer of availability
//! - Health state is per-process, not per-connection
//! - The reconnect loop is a single cancellable task

pub mod probe;
pub mod reconnect;
pub mod state;

pub use probe::ConnectivityProbe;
pub use reconnect::{ReconnectScheduler, SchedulerState};
pub use state::{Availability, AvailabilitySnapshot, AvailabilityState};
