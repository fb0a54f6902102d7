//! Model Error Types
//!
//! Errors surfaced by the model service and by open real-time models.
//!
//! # Error Categories
//!
//! - Request errors - the server rejected a request, the connection went
//!   away, or no response arrived in time
//! - Lifecycle errors - the model is not open, or was detached after a
//!   protocol failure
//! - Wrapped errors - validation, concurrency and apply failures from the
//!   lower layers
//!
//! Errors are `Clone` so a single open result can be handed to every caller
//! waiting on the same pending open.
use crate::ot::error::{ApplyError, ConcurrencyError};
use crate::shared::error::SharedError;
use thiserror::Error;

/// Errors raised by the model service and real-time models
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    /// The server answered a request with an error
    #[error("Request failed ({code}): {message}")]
    RequestFailed {
        /// Server error code
        code: String,
        /// Server error message
        message: String,
    },

    /// The connection closed before a response arrived
    #[error("Connection closed")]
    ConnectionClosed,

    /// No response arrived within the request timeout
    #[error("Request {request_id} timed out")]
    RequestTimeout {
        /// Id of the expired request
        request_id: u64,
    },

    /// No open model has this resource id
    #[error("Model with resource id '{resource_id}' is not open")]
    NotOpen {
        /// Resource id that was looked up
        resource_id: String,
    },

    /// The model was closed or detached and no longer accepts calls
    #[error("Model '{resource_id}' is detached: {reason}")]
    Detached {
        /// Resource id of the model
        resource_id: String,
        /// Why the model was detached
        reason: String,
    },

    /// The server asked for auto-create options that were never registered
    #[error("Unknown auto-create id {auto_create_id}")]
    UnknownAutoCreateId {
        /// The id quoted by the server
        auto_create_id: u64,
    },

    /// The server answered with the wrong kind of response
    #[error("Expected {expected}, received {actual}")]
    UnexpectedResponse {
        /// Response kind the request expects
        expected: &'static str,
        /// Response kind received
        actual: &'static str,
    },

    /// Caller input failed validation or a frame could not be decoded
    #[error(transparent)]
    Shared(#[from] SharedError),

    /// The concurrency control rejected an operation or message
    #[error(transparent)]
    Concurrency(#[from] ConcurrencyError),

    /// An operation did not fit the model data
    #[error(transparent)]
    Apply(#[from] ApplyError),
}

impl ModelError {
    /// Create a detached error
    pub fn detached(resource_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Detached {
            resource_id: resource_id.into(),
            reason: reason.into(),
        }
    }

    /// Create a not-open error
    pub fn not_open(resource_id: impl Into<String>) -> Self {
        Self::NotOpen {
            resource_id: resource_id.into(),
        }
    }

    /// True if the model that raised this error cannot continue
    pub fn is_fatal(&self) -> bool {
        match self {
            ModelError::Concurrency(err) => err.is_fatal(),
            ModelError::Apply(_) => true,
            _ => false,
        }
    }
}
