//! # Model Service
//!
//! Client entry point for real-time models. The service opens, creates,
//! removes and closes models over a [`ProtocolConnection`], keeps one
//! [`RealTimeModel`] per open model in a [`ModelRegistry`], and routes
//! server messages to the model they are addressed to.
//!
//! ## Opening
//!
//! `open` returns the already-open model if there is one. If an open for the
//! same id is still waiting on the server, the caller joins it and receives
//! the same model or the same error. Otherwise a new open request is sent.
//!
//! `open_auto_create` additionally records the creation options under a
//! local auto-create id. If the model does not exist the server asks for
//! those options with an auto-create config request, answered by
//! [`ModelService::handle_auto_create_config_request`], and creates the
//! model before completing the open.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use xfcollab::model::{ModelService, ServerFrame};
//! use xfcollab::shared::ClientConfig;
//!
//! # async fn example(frames: Vec<ServerFrame>) -> Result<(), xfcollab::model::ModelError> {
//! let (service, mut outbound) = ModelService::new(ClientConfig::default());
//! // A transport task writes `outbound` to the wire and feeds every frame
//! // it reads back through `dispatch`.
//! for frame in frames {
//!     service.dispatch(frame).await?;
//! }
//! let model = service.open("meeting-notes").await?;
//! println!("opened {} at version {}", model.model_id(), model.version().await);
//! # let _ = outbound.recv().await;
//! # Ok(())
//! # }
//! ```

use crate::model::connection::ProtocolConnection;
use crate::model::error::ModelError;
use crate::model::options::{AutoCreateModelOptions, CreateModelOptions};
use crate::model::protocol::{Envelope, IncomingMessage, OutgoingMessage, RequestId, ResponseMessage, ServerFrame};
use crate::model::realtime::RealTimeModel;
use crate::model::registry::{ModelRegistry, OpenResult, PendingOpen};
use crate::shared::config::ClientConfig;
use crate::shared::error::SharedError;
use futures_util::FutureExt;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Error code sent when the server asks for unknown auto-create options
pub const UNKNOWN_MODEL: &str = "unknown_model";

/// Opens and tracks real-time models for one connection
pub struct ModelService {
    config: ClientConfig,
    connection: Arc<ProtocolConnection>,
    registry: Arc<Mutex<ModelRegistry>>,
}

impl ModelService {
    /// Create a service and the outbound receiver its transport drains
    pub fn new(config: ClientConfig) -> (Self, mpsc::UnboundedReceiver<Envelope>) {
        let (connection, outbound) = ProtocolConnection::new(&config);
        (Self::with_connection(config, Arc::new(connection)), outbound)
    }

    /// Create a service on an existing connection
    pub fn with_connection(config: ClientConfig, connection: Arc<ProtocolConnection>) -> Self {
        Self {
            config,
            connection,
            registry: Arc::new(Mutex::new(ModelRegistry::new())),
        }
    }

    pub fn connection(&self) -> &Arc<ProtocolConnection> {
        &self.connection
    }

    pub fn session_id(&self) -> &str {
        self.connection.session_id()
    }

    /// Open a model by id
    pub async fn open(&self, id: &str) -> OpenResult {
        SharedError::require_non_empty("model_id", id)?;
        self.open_model(Some(id.to_string()), None).await
    }

    /// Open a model, creating it from `options` if it does not exist
    pub async fn open_auto_create(&self, options: AutoCreateModelOptions) -> OpenResult {
        SharedError::require_non_empty("collection", &options.create.collection)?;
        if let Some(id) = &options.create.id {
            SharedError::require_non_empty("model_id", id)?;
        }
        let id = options.create.id.clone();
        self.open_model(id, Some(options)).await
    }

    /// Create a model and return its id
    ///
    /// Only the collection, id and initial data are sent. The permission
    /// fields of `options` (`override_world`, `world_permissions`,
    /// `user_permissions`) are not part of the create request and are
    /// ignored.
    pub async fn create(&self, options: CreateModelOptions) -> Result<String, ModelError> {
        SharedError::require_non_empty("collection", &options.collection)?;
        if let Some(id) = &options.id {
            SharedError::require_non_empty("model_id", id)?;
        }

        let request = OutgoingMessage::CreateRealTimeModelRequest {
            collection: options.collection,
            model_id: options.id,
            data: options.data.map(|data| data.resolve()).unwrap_or_default(),
        };
        match self.connection.request(request).await? {
            ResponseMessage::CreateRealTimeModelResponse { model_id } => {
                tracing::debug!("[ModelService] Created model {}", model_id);
                Ok(model_id)
            }
            other => Err(ModelError::UnexpectedResponse {
                expected: "CreateRealTimeModelResponse",
                actual: other.name(),
            }),
        }
    }

    /// Delete a model on the server
    pub async fn remove(&self, collection: &str, id: &str) -> Result<(), ModelError> {
        SharedError::require_non_empty("collection", collection)?;
        SharedError::require_non_empty("model_id", id)?;

        let request = OutgoingMessage::DeleteRealTimeModelRequest {
            collection: collection.to_string(),
            model_id: id.to_string(),
        };
        match self.connection.request(request).await? {
            ResponseMessage::Ok => {
                tracing::debug!("[ModelService] Removed model {}/{}", collection, id);
                Ok(())
            }
            other => Err(ModelError::UnexpectedResponse {
                expected: "Ok",
                actual: other.name(),
            }),
        }
    }

    /// Close the open model with this resource id
    pub async fn close(&self, resource_id: &str) -> Result<(), ModelError> {
        let model = self
            .registry
            .lock()
            .await
            .get_by_resource_id(resource_id)
            .ok_or_else(|| ModelError::not_open(resource_id))?;
        model.close().await
    }

    /// Close every open model
    pub async fn dispose(&self) {
        let models = self.registry.lock().await.models();
        tracing::debug!("[ModelService] Disposing {} open models", models.len());
        for model in models {
            if let Err(err) = model.close().await {
                tracing::warn!("[ModelService] Failed to close {}: {}", model.resource_id(), err);
            }
        }
    }

    /// Route a frame read from the transport
    pub async fn dispatch(&self, frame: ServerFrame) -> Result<(), ModelError> {
        match frame {
            ServerFrame::Response { request_id, message } => {
                self.connection.complete_request(request_id, message).await;
                Ok(())
            }
            ServerFrame::Message { message } => self.handle_message(message).await,
        }
    }

    /// Decode a text frame and route it
    pub async fn dispatch_json(&self, text: &str) -> Result<(), ModelError> {
        let frame = ServerFrame::from_json(text).map_err(|err| {
            tracing::warn!("[ModelService] Dropping undecodable frame: {}", err);
            err
        })?;
        self.dispatch(frame).await
    }

    /// Route an unsolicited server message
    pub async fn handle_message(&self, message: IncomingMessage) -> Result<(), ModelError> {
        if let IncomingMessage::AutoCreateConfigRequest {
            request_id,
            auto_create_id,
        } = message
        {
            return self.handle_auto_create_config_request(request_id, auto_create_id).await;
        }

        let Some(resource_id) = message.resource_id().map(str::to_string) else {
            return Ok(());
        };
        let model = self.registry.lock().await.get_by_resource_id(&resource_id);
        match model {
            Some(model) => model.handle_message(message).await,
            None => {
                tracing::warn!("[ModelService] Message for unknown resource {}", resource_id);
                Err(ModelError::not_open(resource_id))
            }
        }
    }

    /// Answer the server's request for auto-create options
    pub async fn handle_auto_create_config_request(
        &self,
        request_id: RequestId,
        auto_create_id: u64,
    ) -> Result<(), ModelError> {
        let options = self.registry.lock().await.auto_create(auto_create_id).cloned();
        let Some(options) = options else {
            tracing::warn!("[ModelService] Unknown auto-create id {}", auto_create_id);
            self.connection.reply(
                request_id,
                OutgoingMessage::ErrorResponse {
                    code: UNKNOWN_MODEL.to_string(),
                    message: format!("No auto-create options registered for id {}", auto_create_id),
                },
            )?;
            return Err(ModelError::UnknownAutoCreateId { auto_create_id });
        };

        let create = options.create;
        self.connection.reply(
            request_id,
            OutgoingMessage::AutoCreateConfigResponse {
                collection: create.collection,
                data: create.data.map(|data| data.resolve()),
                ephemeral: options.ephemeral,
                override_world: create.override_world,
                world_permissions: create.world_permissions,
                user_permissions: create.user_permissions,
            },
        )
    }

    /// The open model with this id
    pub async fn get(&self, id: &str) -> Option<Arc<RealTimeModel>> {
        self.registry.lock().await.get(id)
    }

    pub async fn is_open(&self, id: &str) -> bool {
        self.registry.lock().await.is_open(id)
    }

    pub async fn open_count(&self) -> usize {
        self.registry.lock().await.len()
    }

    pub async fn pending_open_count(&self) -> usize {
        self.registry.lock().await.pending_len()
    }

    pub async fn auto_create_count(&self) -> usize {
        self.registry.lock().await.auto_create_len()
    }

    async fn open_model(&self, id: Option<String>, options: Option<AutoCreateModelOptions>) -> OpenResult {
        let pending = {
            let mut registry = self.registry.lock().await;
            if let Some(id) = &id {
                if let Some(model) = registry.get(id) {
                    return Ok(model);
                }
            }
            match id.as_deref().and_then(|id| registry.pending(id)) {
                Some(pending) => {
                    tracing::debug!("[ModelService] Joining pending open of {:?}", id);
                    pending
                }
                None => {
                    let auto_create_id = options.map(|options| registry.register_auto_create(options));
                    let pending = self.start_open(id.clone(), auto_create_id);
                    if let Some(id) = &id {
                        registry.insert_pending(id.clone(), pending.clone());
                    }
                    pending
                }
            }
        };
        pending.await
    }

    fn start_open(&self, id: Option<String>, auto_create_id: Option<u64>) -> PendingOpen {
        let connection = self.connection.clone();
        let registry = self.registry.clone();
        let event_capacity = self.config.event_capacity;

        async move {
            tracing::debug!("[ModelService] Opening {:?} (auto-create {:?})", id, auto_create_id);
            let response = connection
                .request(OutgoingMessage::OpenRealTimeModelRequest {
                    id: id.clone(),
                    auto_create_id,
                })
                .await
                .and_then(|response| match response {
                    ResponseMessage::OpenRealTimeModelResponse(response) => Ok(response),
                    other => Err(ModelError::UnexpectedResponse {
                        expected: "OpenRealTimeModelResponse",
                        actual: other.name(),
                    }),
                });

            let mut open = registry.lock().await;
            if let Some(id) = &id {
                open.remove_pending(id);
            }
            if let Some(auto_create_id) = auto_create_id {
                open.remove_auto_create(auto_create_id);
            }

            let response = match response {
                Ok(response) => response,
                Err(err) => {
                    tracing::warn!("[ModelService] Open of {:?} failed: {}", id, err);
                    return Err(err);
                }
            };

            let key = id.unwrap_or_else(|| response.model_id.clone());
            let model = Arc::new(RealTimeModel::new(
                response,
                connection,
                Arc::downgrade(&registry),
                event_capacity,
            ));
            open.insert(key, model.clone());
            Ok(model)
        }
        .boxed()
        .shared()
    }
}
