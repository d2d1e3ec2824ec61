//! Collection cycle — what happened during one scheduling tick.
//!
//! Cycles are not persisted; the scheduler logs them and keeps the most
//! recent one in its health snapshot.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::id::{CycleId, EndpointId};
use crate::time::Timestamp;
use crate::unit::UnitError;

/// Why a single endpoint produced no data points in a cycle.
///
/// Always isolated to that endpoint: the rest of the cycle proceeds.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EndpointFailure {
    /// No response within the endpoint's timeout.
    #[error("timed out after {}ms", timeout.as_millis())]
    Timeout {
        #[serde(with = "crate::time::seconds")]
        timeout: Duration,
    },

    /// Connection refused, DNS failure, reset, etc.
    #[error("transport error: {message}")]
    Transport { message: String },

    /// The endpoint answered with a non-success HTTP status.
    #[error("unexpected status {status}")]
    Status { status: u16 },

    /// The body could not be decoded as a sensor payload.
    #[error("malformed payload: {message}")]
    MalformedPayload { message: String },

    /// A reading used a unit the normalizer rejected.
    #[error("unit error: {message}")]
    Unit { message: String },

    /// Shutdown began before the fetch finished.
    #[error("abandoned during shutdown")]
    Abandoned,
}

impl From<UnitError> for EndpointFailure {
    fn from(err: UnitError) -> Self {
        Self::Unit {
            message: err.to_string(),
        }
    }
}

/// Outcome of polling one endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointOutcome {
    pub endpoint_id: EndpointId,
    pub url: String,
    /// Number of normalized points on success.
    pub result: Result<usize, EndpointFailure>,
}

impl EndpointOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// One run of the collector across every enabled endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionCycle {
    pub id: CycleId,
    pub started_at: Timestamp,
    /// Set once the batch has been acknowledged by the store.
    pub finished_at: Option<Timestamp>,
    /// One entry per attempted endpoint, in registry order.
    pub outcomes: Vec<EndpointOutcome>,
    /// Points newly written by this cycle.
    pub persisted: usize,
    /// Points already present in the store.
    pub skipped: usize,
}

impl CollectionCycle {
    #[must_use]
    pub fn start(started_at: Timestamp) -> Self {
        Self {
            id: CycleId::new(),
            started_at,
            finished_at: None,
            outcomes: Vec::new(),
            persisted: 0,
            skipped: 0,
        }
    }

    #[must_use]
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.outcomes.len() - self.success_count()
    }

    /// A cycle is completed once its writes are acknowledged, regardless of
    /// how many endpoints failed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.finished_at.is_some()
    }

    /// Mark the cycle as acknowledged by the store.
    pub fn complete(&mut self, finished_at: Timestamp, persisted: usize, skipped: usize) {
        self.finished_at = Some(finished_at);
        self.persisted = persisted;
        self.skipped = skipped;
    }
}
