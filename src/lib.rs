//! XFCollab - Main Library
//!
//! XFCollab is the client-side synchronization core for collaboratively
//! edited JSON-like documents, built on Operational Transformation.
//!
//! # Overview
//!
//! This library provides:
//! - A typed operation model for edits to strings, arrays, objects,
//!   numbers, booleans and dates addressed by path
//! - An operation transformer that reconciles a server operation with a
//!   concurrent client operation so both sides converge
//! - A reference transformer that keeps cursors and selections anchored
//!   across concurrent edits
//! - A per-document client concurrency control sequencing local and remote
//!   operations
//! - A model service that opens, creates and closes models and routes
//!   server messages to them
//!
//! # Module Structure
//!
//! - **`shared`** - Types shared across the wire
//!   - Operation events, commit status, error types
//!   - Client configuration
//!
//! - **`ot`** - Operational Transformation
//!   - Paths, values and operations
//!   - Operation and reference transformers
//!   - Client concurrency control
//!
//! - **`model`** - Model synchronization
//!   - Protocol messages and request correlation
//!   - Open model registry and real-time model sessions
//!   - The model service
//!
//! - **`debug`** - Invariant checks and tracing setup
//!
//! # Usage
//!
//! ```rust
//! use xfcollab::ot::{ClientConcurrencyControl, DiscreteOperation};
//! use xfcollab::path;
//! use xfcollab::shared::UnprocessedOperationEvent;
//!
//! let mut ccc = ClientConcurrencyControl::new("session-a", 0);
//!
//! // Local insert goes in flight
//! let sent = ccc
//!     .process_outgoing_operation(DiscreteOperation::string_insert(path!["title"], 0, "A").into())
//!     .unwrap();
//! assert!(sent.is_some());
//!
//! // A concurrent remote insert at the same spot is ordered first
//! let remote = UnprocessedOperationEvent::new(
//!     "session-b",
//!     0,
//!     0,
//!     DiscreteOperation::string_insert(path!["title"], 0, "B").into(),
//! );
//! ccc.process_remote_operation(remote).unwrap();
//! let incoming = ccc.get_next_incoming_operation().unwrap();
//! assert_eq!(incoming.context_version, 1);
//! ```
//!
//! # Thread Safety
//!
//! - A `ClientConcurrencyControl` is a plain state machine; callers
//!   serialize access to it
//! - `RealTimeModel` wraps its controller in a `tokio::sync::Mutex`, so each
//!   open model processes messages one at a time
//! - Events are delivered over `tokio::sync::broadcast` channels
//!
//! # Error Handling
//!
//! - `shared::error::SharedError` - validation and serialization
//! - `ot::error` - transform, apply and concurrency errors
//! - `model::error::ModelError` - request, lifecycle and wrapped errors

/// Shared types and data structures
pub mod shared;

/// Operational Transformation
pub mod ot;

/// Model synchronization
pub mod model;

/// Debug utilities
pub mod debug;

pub use model::{ModelError, ModelEvent, ModelService, RealTimeModel};
pub use ot::{ClientConcurrencyControl, DataValue, DiscreteOperation, Operation, OperationTransformer};
pub use shared::{ClientConfig, SharedError};
