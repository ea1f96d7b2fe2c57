//! HTTP middleware.

pub mod availability;

pub use availability::availability_gate;
