//! # Model Protocol Messages
//!
//! Wire messages exchanged with the server for real-time models.
//!
//! Outgoing messages travel in an [`Envelope`]. Requests carry a
//! client-generated request id that the matching [`ResponseMessage`] quotes;
//! replies to server requests (auto-create configuration) carry the
//! server's request id instead. Everything else the server sends is an
//! [`IncomingMessage`] addressed to an open model by resource id.

use crate::model::options::ModelPermissions;
use crate::ot::ops::Operation;
use crate::ot::value::DataValue;
use crate::ot::xform::ModelReferenceData;
use crate::shared::error::SharedError;
use crate::shared::event::UnprocessedOperationEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Correlates a request with its response
pub type RequestId = u64;

/// Messages sent by the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutgoingMessage {
    /// Open a model by id, or let the server pick one for an auto-create open
    OpenRealTimeModelRequest {
        id: Option<String>,
        auto_create_id: Option<u64>,
    },
    CreateRealTimeModelRequest {
        collection: String,
        model_id: Option<String>,
        data: BTreeMap<String, DataValue>,
    },
    DeleteRealTimeModelRequest {
        collection: String,
        model_id: String,
    },
    CloseRealTimeModelRequest {
        resource_id: String,
    },
    /// A local operation, sequenced by the concurrency control
    OperationSubmission {
        resource_id: String,
        seq_no: u64,
        version: u64,
        operation: Operation,
    },
    PublishReference {
        resource_id: String,
        reference: ModelReferenceData,
    },
    SetReference {
        resource_id: String,
        reference: ModelReferenceData,
    },
    ClearReference {
        resource_id: String,
        id: Option<String>,
        key: String,
    },
    UnpublishReference {
        resource_id: String,
        id: Option<String>,
        key: String,
    },
    /// Reply to an [`IncomingMessage::AutoCreateConfigRequest`]
    AutoCreateConfigResponse {
        collection: String,
        data: Option<BTreeMap<String, DataValue>>,
        ephemeral: bool,
        override_world: bool,
        world_permissions: Option<ModelPermissions>,
        user_permissions: HashMap<String, ModelPermissions>,
    },
    /// Negative reply to a server request
    ErrorResponse {
        code: String,
        message: String,
    },
}

/// Server state for a freshly opened model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenModelResponse {
    /// Server-assigned handle for this open session of the model
    pub resource_id: String,
    /// Model id, generated by the server for auto-created models without one
    pub model_id: String,
    pub collection: String,
    /// Version the model data is at
    pub version: u64,
    pub data: BTreeMap<String, DataValue>,
    /// Other sessions that have the model open
    #[serde(default)]
    pub connected_clients: Vec<String>,
    /// References already published by other sessions
    #[serde(default)]
    pub references: Vec<ModelReferenceData>,
    pub permissions: ModelPermissions,
    pub created_time: DateTime<Utc>,
    pub modified_time: DateTime<Utc>,
}

/// Replies to client requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseMessage {
    OpenRealTimeModelResponse(OpenModelResponse),
    CreateRealTimeModelResponse { model_id: String },
    /// Success without a payload (delete, close)
    Ok,
    Error { code: String, message: String },
}

impl ResponseMessage {
    /// Short name for logs and unexpected-response errors
    pub fn name(&self) -> &'static str {
        match self {
            ResponseMessage::OpenRealTimeModelResponse(_) => "OpenRealTimeModelResponse",
            ResponseMessage::CreateRealTimeModelResponse { .. } => "CreateRealTimeModelResponse",
            ResponseMessage::Ok => "Ok",
            ResponseMessage::Error { .. } => "Error",
        }
    }
}

/// Unsolicited messages from the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IncomingMessage {
    RemoteOperation {
        resource_id: String,
        event: UnprocessedOperationEvent,
    },
    OperationAcknowledgement {
        resource_id: String,
        seq_no: u64,
        version: u64,
    },
    /// The server needs creation parameters for an auto-create open
    AutoCreateConfigRequest {
        request_id: RequestId,
        auto_create_id: u64,
    },
    ReferencePublished {
        resource_id: String,
        reference: ModelReferenceData,
    },
    ReferenceUnpublished {
        resource_id: String,
        session_id: String,
        id: Option<String>,
        key: String,
    },
    ReferenceSet {
        resource_id: String,
        reference: ModelReferenceData,
    },
    ReferenceCleared {
        resource_id: String,
        session_id: String,
        id: Option<String>,
        key: String,
    },
    RemoteClientOpened {
        resource_id: String,
        session_id: String,
    },
    RemoteClientClosed {
        resource_id: String,
        session_id: String,
    },
    ForceClose {
        resource_id: String,
        reason: String,
    },
}

impl IncomingMessage {
    /// The model this message is addressed to, if any
    pub fn resource_id(&self) -> Option<&str> {
        match self {
            IncomingMessage::RemoteOperation { resource_id, .. }
            | IncomingMessage::OperationAcknowledgement { resource_id, .. }
            | IncomingMessage::ReferencePublished { resource_id, .. }
            | IncomingMessage::ReferenceUnpublished { resource_id, .. }
            | IncomingMessage::ReferenceSet { resource_id, .. }
            | IncomingMessage::ReferenceCleared { resource_id, .. }
            | IncomingMessage::RemoteClientOpened { resource_id, .. }
            | IncomingMessage::RemoteClientClosed { resource_id, .. }
            | IncomingMessage::ForceClose { resource_id, .. } => Some(resource_id),
            IncomingMessage::AutoCreateConfigRequest { .. } => None,
        }
    }
}

/// An outgoing message with its correlation id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Set for requests and for replies to server requests
    pub request_id: Option<RequestId>,
    pub message: OutgoingMessage,
}

/// Anything the server can send
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ServerFrame {
    Response {
        request_id: RequestId,
        message: ResponseMessage,
    },
    Message {
        message: IncomingMessage,
    },
}

impl Envelope {
    /// Encode for the transport
    pub fn to_json(&self) -> Result<String, SharedError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl ServerFrame {
    /// Decode a frame read from the transport
    pub fn from_json(text: &str) -> Result<Self, SharedError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Key identifying one reference: owning session, element id, name
pub type ReferenceKey = (String, Option<String>, String);

/// Build the key a reference is stored under
pub fn reference_key(reference: &ModelReferenceData) -> ReferenceKey {
    (reference.session_id.clone(), reference.id.clone(), reference.key.clone())
}
