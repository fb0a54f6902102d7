/**
 * Operation Events
 *
 * Envelopes around operations as they move between a client and the
 * server: unprocessed events are what a client sends (and what it receives
 * from other clients), processed events are remote operations that have
 * been transformed against local state and are ready to apply.
 */
use crate::ot::ops::Operation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An operation as generated by its author, before any local transformation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnprocessedOperationEvent {
    /// Session that generated the operation
    pub client_id: String,
    /// Per-client sequence number, starting at 0
    pub seq_no: u64,
    /// Version the operation was generated against
    pub context_version: u64,
    /// When the operation was generated
    pub timestamp: DateTime<Utc>,
    pub operation: Operation,
}

/// A remote operation transformed against local state and ready to apply
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessedOperationEvent {
    /// Session that generated the operation
    pub client_id: String,
    /// Sequence number assigned by the author
    pub seq_no: u64,
    /// Version the operation is valid against after transformation
    pub context_version: u64,
    pub timestamp: DateTime<Utc>,
    pub operation: Operation,
}

impl UnprocessedOperationEvent {
    /// Create an event stamped with the current time
    pub fn new(client_id: impl Into<String>, seq_no: u64, context_version: u64, operation: Operation) -> Self {
        Self {
            client_id: client_id.into(),
            seq_no,
            context_version,
            timestamp: Utc::now(),
            operation,
        }
    }

    /// Mark this event as transformed and valid against `context_version`
    pub fn processed(self, operation: Operation, context_version: u64) -> ProcessedOperationEvent {
        ProcessedOperationEvent {
            client_id: self.client_id,
            seq_no: self.seq_no,
            context_version,
            timestamp: self.timestamp,
            operation,
        }
    }
}

/// The client moved between synced and committing
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommitStatusChanged {
    /// True once every local edit has been acknowledged
    pub committed: bool,
}
