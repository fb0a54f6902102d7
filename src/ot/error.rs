//! OT Error Types
//!
//! Errors raised while transforming, applying, or sequencing operations.
//!
//! # Error Categories
//!
//! - `TransformError` - a pair of operations that cannot have been concurrent
//! - `ApplyError` - an operation that does not fit the data it is applied to
//! - `ConcurrencyError` - protocol invariant violations and usage errors
//!   raised by the client concurrency control
//!
//! Protocol invariant violations are fatal to the document session: the
//! client and server views have diverged and the model must be closed and
//! reopened. Usage errors leave the concurrency control untouched.
use crate::ot::value::ValueType;
use thiserror::Error;

/// Two operations could not be transformed against each other
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransformError {
    /// The operations target the same node but disagree on what it is
    #[error("Cannot transform {server} against {client} at {path}")]
    IncompatibleOperations {
        /// Server operation kind
        server: &'static str,
        /// Client operation kind
        client: &'static str,
        /// Shared target path
        path: String,
    },
}

impl TransformError {
    pub fn incompatible(server: &'static str, client: &'static str, path: impl Into<String>) -> Self {
        Self::IncompatibleOperations {
            server,
            client,
            path: path.into(),
        }
    }
}

/// An operation could not be applied to a data value
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ApplyError {
    /// A path step does not exist
    #[error("Path {path} does not exist")]
    PathNotFound {
        /// Rendered path
        path: String,
    },

    /// The target node has the wrong type
    #[error("Expected {expected:?} at {path}, found {found:?}")]
    TypeMismatch {
        /// Rendered path
        path: String,
        /// Type the operation needs
        expected: ValueType,
        /// Type present in the data
        found: ValueType,
    },

    /// An index or range falls outside the target
    #[error("Index {index} out of bounds at {path} (length {len})")]
    IndexOutOfBounds {
        /// Rendered path
        path: String,
        /// Offending index
        index: usize,
        /// Length of the target
        len: usize,
    },

    /// Property missing for set/remove, or present for add
    #[error("Property '{prop}' {problem} at {path}")]
    Property {
        /// Rendered path
        path: String,
        /// Property name
        prop: String,
        /// What went wrong
        problem: &'static str,
    },
}

/// Errors raised by the client concurrency control
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConcurrencyError {
    /// A message quoted a version other than the expected one
    #[error("Expected context version {expected}, received {actual}")]
    VersionMismatch {
        /// The controller's current context version
        expected: u64,
        /// The version quoted by the message
        actual: u64,
    },

    /// An acknowledgement arrived while nothing was in flight
    #[error("Received acknowledgement for seqNo {seq_no} with no operations in flight")]
    NoInflightOperations {
        /// Sequence number quoted by the acknowledgement
        seq_no: u64,
    },

    /// An acknowledgement did not match the oldest in-flight operation
    #[error("Acknowledgement for seqNo {actual} arrived before seqNo {expected}")]
    AcknowledgementOutOfOrder {
        /// Oldest in-flight sequence number
        expected: u64,
        /// Sequence number quoted by the acknowledgement
        actual: u64,
    },

    /// A remote operation quoted a version from the future
    #[error("Remote operation context version {actual} is ahead of {expected}")]
    RemoteVersionAhead {
        /// The controller's current context version
        expected: u64,
        /// The version quoted by the remote operation
        actual: u64,
    },

    /// `start_batch_operation` while a batch is open
    #[error("Batch operation already in progress")]
    BatchAlreadyInProgress,

    /// Batch call while no batch is open
    #[error("Batch operation not in progress")]
    BatchNotInProgress,

    /// `complete_batch_operation` with nothing in the batch
    #[error("A batch operation must contain at least one operation")]
    EmptyBatch,

    /// `cancel_batch_operation` after operations were added
    #[error("Cannot cancel a batch operation holding {size} operations")]
    BatchNotEmpty {
        /// Number of operations already in the batch
        size: usize,
    },

    /// The transformer rejected a pair of operations
    #[error(transparent)]
    Transform(#[from] TransformError),
}

impl ConcurrencyError {
    /// True if the session can only recover through a full resync
    pub fn is_fatal(&self) -> bool {
        match self {
            ConcurrencyError::VersionMismatch { .. }
            | ConcurrencyError::NoInflightOperations { .. }
            | ConcurrencyError::AcknowledgementOutOfOrder { .. }
            | ConcurrencyError::RemoteVersionAhead { .. }
            | ConcurrencyError::BatchAlreadyInProgress
            | ConcurrencyError::EmptyBatch
            | ConcurrencyError::Transform(_) => true,
            ConcurrencyError::BatchNotInProgress | ConcurrencyError::BatchNotEmpty { .. } => false,
        }
    }
}
