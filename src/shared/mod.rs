//! Shared Module
//!
//! Types shared between the client and the server side of the model
//! protocol: operation events, shared error types and client configuration.
//!
//! # Overview
//!
//! Everything here is plain data. Events are serializable so they can be
//! carried on the wire unchanged.

/// Operation event envelopes
pub mod event;

/// Shared error types
pub mod error;

/// Client configuration
pub mod config;

/// Re-export commonly used types for convenience
pub use config::{ClientConfig, ClientConfigBuilder, ConfigError};
pub use error::SharedError;
pub use event::{CommitStatusChanged, ProcessedOperationEvent, UnprocessedOperationEvent};
