//! Model Synchronization
//!
//! Client side of the real-time model protocol: opening, creating and
//! closing models, and keeping each open model in sync with the server.
//!
//! # Module Structure
//!
//! - **`protocol`** - wire messages
//! - **`connection`** - request/response correlation and timeouts
//! - **`registry`** - open models, pending opens and auto-create options
//! - **`realtime`** - one open model session
//! - **`service`** - the public entry point
//! - **`options`** - creation options and permissions
//! - **`error`** - error types
//!
//! # Threading
//!
//! Each open model serializes its own message processing behind a mutex,
//! so messages for one model are handled strictly in order while different
//! models proceed independently.

pub mod connection;
pub mod error;
pub mod options;
pub mod protocol;
pub mod realtime;
pub mod registry;
pub mod service;

pub use connection::{ProtocolConnection, RequestTable};
pub use error::ModelError;
pub use options::{AutoCreateModelOptions, CreateModelOptions, ModelData, ModelDataInitializer, ModelPermissions};
pub use protocol::{
    Envelope, IncomingMessage, OpenModelResponse, OutgoingMessage, RequestId, ResponseMessage, ServerFrame,
};
pub use realtime::{ModelEvent, RealTimeModel};
pub use registry::ModelRegistry;
pub use service::ModelService;
