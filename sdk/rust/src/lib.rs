//! HTTP client for the ScanSphere API.

mod client;

pub use client::{ApiClient, ApiResponse, Registration};
