//! Availability gate.
//!
//! # Responsibilities
//! - Classify operations as read, write or health
//! - Admit or reject an operation against the current availability
//!
//! # Design Decisions
//! - Health checks are always admitted
//! - A non-Up state gets one single-attempt re-check before deciding
//! - Reads degrade, writes are rejected

use std::sync::Arc;

use axum::http::Method;

use crate::health::{AvailabilityState, ConnectivityProbe};
use crate::observability::metrics;
use crate::resilience::RetryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Read,
    Write,
    Health,
}

impl OperationKind {
    /// Classify a request by method and path.
    pub fn classify(method: &Method, path: &str) -> Self {
        if !path.starts_with("/api/") || path == "/api/health" || path.starts_with("/api/health/") {
            return OperationKind::Health;
        }

        if method == Method::GET || method == Method::HEAD || method == Method::OPTIONS {
            OperationKind::Read
        } else {
            OperationKind::Write
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Read => "read",
            OperationKind::Write => "write",
            OperationKind::Health => "health",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allow,
    Reject,
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allow)
    }
}

pub struct AvailabilityGate {
    availability: Arc<AvailabilityState>,
    probe: Arc<ConnectivityProbe>,
}

impl AvailabilityGate {
    pub fn new(availability: Arc<AvailabilityState>, probe: Arc<ConnectivityProbe>) -> Self {
        Self { availability, probe }
    }

    pub async fn admit(&self, kind: OperationKind) -> Admission {
        let admission = self.decide(kind).await;
        metrics::record_admission(kind.as_str(), admission.is_allowed());
        admission
    }

    async fn decide(&self, kind: OperationKind) -> Admission {
        if kind == OperationKind::Health || self.availability.is_up() {
            return Admission::Allow;
        }

        tracing::warn!(
            kind = kind.as_str(),
            state = self.availability.current().as_str(),
            "Database not available, re-checking before admission"
        );

        if self.probe.probe_with(RetryPolicy::single_attempt()).await {
            return Admission::Allow;
        }

        match kind {
            OperationKind::Write => {
                tracing::warn!("Rejecting write while database is unavailable");
                Admission::Reject
            }
            _ => {
                tracing::info!("Serving read in degraded mode");
                Admission::Allow
            }
        }
    }
}
