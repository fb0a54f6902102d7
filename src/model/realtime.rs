/**
 * Real-time Model Session
 *
 * One open session of a model. It owns the model data, the client
 * concurrency control, the set of other sessions that have the model open
 * and the references those sessions publish.
 *
 * # Local edits
 *
 * `submit` applies an operation to the local data first, then hands it to
 * the concurrency control and sends the resulting submission. Inside a
 * batch the operation is applied but held back until `complete_batch`.
 *
 * # Remote messages
 *
 * `handle_message` runs every server message for this model strictly in
 * order. Remote operations are transformed, applied and broadcast as
 * `ModelEvent::RemoteOperation`. A fatal concurrency or apply error detaches
 * the session: it is dropped from the registry, `ModelEvent::Closed` is
 * broadcast with `resync` set, and every further call fails with
 * `ModelError::Detached`.
 */

use crate::model::connection::ProtocolConnection;
use crate::model::error::ModelError;
use crate::model::options::ModelPermissions;
use crate::model::protocol::{
    reference_key, IncomingMessage, OpenModelResponse, OutgoingMessage, ReferenceKey, ResponseMessage,
};
use crate::model::registry::ModelRegistry;
use crate::ot::concurrency::ClientConcurrencyControl;
use crate::ot::ops::Operation;
use crate::ot::path::Path;
use crate::ot::value::DataValue;
use crate::ot::xform::{ModelReferenceData, ReferenceTransformer, ReferenceType, ReferenceValue};
use crate::shared::event::{CommitStatusChanged, UnprocessedOperationEvent};
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, Mutex};

/// Something that happened to an open model
#[derive(Debug, Clone, PartialEq)]
pub enum ModelEvent {
    /// A remote operation was applied to the local data
    RemoteOperation {
        session_id: String,
        version: u64,
        timestamp: DateTime<Utc>,
        operation: Operation,
    },
    /// A local submission was acknowledged
    Acknowledged { seq_no: u64, version: u64 },
    ReferencePublished {
        session_id: String,
        id: Option<String>,
        key: String,
    },
    /// A remote reference changed, already transformed to the local data
    ReferenceSet { reference: ModelReferenceData },
    ReferenceCleared {
        session_id: String,
        id: Option<String>,
        key: String,
    },
    ReferenceUnpublished {
        session_id: String,
        id: Option<String>,
        key: String,
    },
    CollaboratorOpened { session_id: String },
    CollaboratorClosed { session_id: String },
    /// The session ended; `resync` is set when the model has to be reopened
    Closed { reason: String, resync: bool },
}

struct ModelState {
    data: DataValue,
    ccc: ClientConcurrencyControl,
    sessions: BTreeSet<String>,
    remote_references: HashMap<ReferenceKey, ModelReferenceData>,
    local_references: HashMap<ReferenceKey, ModelReferenceData>,
    detached: Option<String>,
}

/// An open real-time model
pub struct RealTimeModel {
    resource_id: String,
    model_id: String,
    collection: String,
    session_id: String,
    permissions: ModelPermissions,
    created_time: DateTime<Utc>,
    modified_time: DateTime<Utc>,
    connection: Arc<ProtocolConnection>,
    registry: Weak<Mutex<ModelRegistry>>,
    state: Mutex<ModelState>,
    events: broadcast::Sender<ModelEvent>,
}

impl RealTimeModel {
    pub(crate) fn new(
        response: OpenModelResponse,
        connection: Arc<ProtocolConnection>,
        registry: Weak<Mutex<ModelRegistry>>,
        event_capacity: usize,
    ) -> Self {
        let session_id = connection.session_id().to_string();
        let ccc = ClientConcurrencyControl::with_event_capacity(session_id.clone(), response.version, event_capacity);
        let sessions = response
            .connected_clients
            .into_iter()
            .filter(|session| *session != session_id)
            .collect();
        let remote_references = response
            .references
            .into_iter()
            .filter(|reference| reference.session_id != session_id)
            .map(|reference| (reference_key(&reference), reference))
            .collect();
        let (events, _) = broadcast::channel(event_capacity.max(1));

        tracing::debug!(
            "[Model] Opened {} ({}) at version {}",
            response.model_id,
            response.resource_id,
            response.version
        );

        Self {
            resource_id: response.resource_id,
            model_id: response.model_id,
            collection: response.collection,
            session_id,
            permissions: response.permissions,
            created_time: response.created_time,
            modified_time: response.modified_time,
            connection,
            registry,
            state: Mutex::new(ModelState {
                data: DataValue::Object(response.data),
                ccc,
                sessions,
                remote_references,
                local_references: HashMap::new(),
                detached: None,
            }),
            events,
        }
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn permissions(&self) -> ModelPermissions {
        self.permissions
    }

    pub fn created_time(&self) -> DateTime<Utc> {
        self.created_time
    }

    /// Last modification time reported when the model was opened
    pub fn modified_time(&self) -> DateTime<Utc> {
        self.modified_time
    }

    /// Subscribe to model events
    pub fn subscribe(&self) -> broadcast::Receiver<ModelEvent> {
        self.events.subscribe()
    }

    /// Subscribe to commit status transitions
    pub async fn subscribe_commit_status(&self) -> broadcast::Receiver<CommitStatusChanged> {
        self.state.lock().await.ccc.subscribe()
    }

    /// Snapshot of the model root
    pub async fn data(&self) -> DataValue {
        self.state.lock().await.data.clone()
    }

    /// Snapshot of one node
    pub async fn value_at(&self, path: &Path) -> Option<DataValue> {
        self.state.lock().await.data.node(path).cloned()
    }

    pub async fn version(&self) -> u64 {
        self.state.lock().await.ccc.context_version()
    }

    pub async fn is_open(&self) -> bool {
        self.state.lock().await.detached.is_none()
    }

    /// True when nothing local is waiting on the server
    pub async fn is_committed(&self) -> bool {
        self.state.lock().await.ccc.is_synced()
    }

    /// Other sessions that have the model open
    pub async fn connected_sessions(&self) -> Vec<String> {
        self.state.lock().await.sessions.iter().cloned().collect()
    }

    /// References published by other sessions
    pub async fn references(&self) -> Vec<ModelReferenceData> {
        self.state.lock().await.remote_references.values().cloned().collect()
    }

    /// A reference this session published
    pub async fn local_reference(&self, id: Option<&str>, key: &str) -> Option<ModelReferenceData> {
        let key = (self.session_id.clone(), id.map(str::to_string), key.to_string());
        self.state.lock().await.local_references.get(&key).cloned()
    }

    /// Apply a local operation and send it to the server
    ///
    /// An operation that does not fit the data is rejected and leaves the
    /// model unchanged.
    pub async fn submit(&self, operation: impl Into<Operation>) -> Result<(), ModelError> {
        let operation = operation.into();
        let mut state = self.state.lock().await;
        self.ensure_open(&state)?;

        state.data.apply(&operation)?;
        transform_references(&mut state.remote_references, &operation);
        transform_references(&mut state.local_references, &operation);

        match state.ccc.process_outgoing_operation(operation) {
            Ok(Some(event)) => self.send_submission(&mut state, event).await,
            Ok(None) => Ok(()),
            Err(err) => Err(self.fail(&mut state, err.into()).await),
        }
    }

    /// Start grouping local operations into one compound submission
    pub async fn start_batch(&self) -> Result<(), ModelError> {
        let mut state = self.state.lock().await;
        self.ensure_open(&state)?;
        match state.ccc.start_batch_operation() {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail(&mut state, err.into()).await),
        }
    }

    /// Abandon an empty batch
    pub async fn cancel_batch(&self) -> Result<(), ModelError> {
        let mut state = self.state.lock().await;
        self.ensure_open(&state)?;
        match state.ccc.cancel_batch_operation() {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail(&mut state, err.into()).await),
        }
    }

    /// Send every batched operation as one compound submission
    pub async fn complete_batch(&self) -> Result<(), ModelError> {
        let mut state = self.state.lock().await;
        self.ensure_open(&state)?;
        match state.ccc.complete_batch_operation() {
            Ok(event) => self.send_submission(&mut state, event).await,
            Err(err) => Err(self.fail(&mut state, err.into()).await),
        }
    }

    pub async fn is_batch_in_progress(&self) -> bool {
        self.state.lock().await.ccc.is_batch_operation_in_progress()
    }

    /// Announce a reference without a value
    pub async fn publish_reference(
        &self,
        id: Option<String>,
        key: impl Into<String>,
        reference_type: ReferenceType,
        path: Path,
    ) -> Result<(), ModelError> {
        let mut state = self.state.lock().await;
        self.ensure_open(&state)?;

        let reference = ModelReferenceData {
            session_id: self.session_id.clone(),
            id,
            key: key.into(),
            reference_type,
            path,
            value: None,
        };
        state.local_references.insert(reference_key(&reference), reference.clone());
        let message = OutgoingMessage::PublishReference {
            resource_id: self.resource_id.clone(),
            reference,
        };
        self.send(&mut state, message).await
    }

    /// Point a reference at a value, publishing it if needed
    pub async fn set_reference(
        &self,
        id: Option<String>,
        key: impl Into<String>,
        path: Path,
        value: ReferenceValue,
    ) -> Result<(), ModelError> {
        let mut state = self.state.lock().await;
        self.ensure_open(&state)?;

        let reference = ModelReferenceData {
            session_id: self.session_id.clone(),
            id,
            key: key.into(),
            reference_type: value.reference_type(),
            path,
            value: Some(value),
        };
        state.local_references.insert(reference_key(&reference), reference.clone());
        let message = OutgoingMessage::SetReference {
            resource_id: self.resource_id.clone(),
            reference: state.ccc.process_outgoing_set_reference(reference),
        };
        self.send(&mut state, message).await
    }

    /// Clear a reference's value, keeping it published
    pub async fn clear_reference(&self, id: Option<String>, key: impl Into<String>) -> Result<(), ModelError> {
        let mut state = self.state.lock().await;
        self.ensure_open(&state)?;

        let key = key.into();
        let lookup = (self.session_id.clone(), id.clone(), key.clone());
        if let Some(reference) = state.local_references.get_mut(&lookup) {
            reference.value = None;
        }
        let message = OutgoingMessage::ClearReference {
            resource_id: self.resource_id.clone(),
            id,
            key,
        };
        self.send(&mut state, message).await
    }

    /// Withdraw a reference
    pub async fn unpublish_reference(&self, id: Option<String>, key: impl Into<String>) -> Result<(), ModelError> {
        let mut state = self.state.lock().await;
        self.ensure_open(&state)?;

        let key = key.into();
        state
            .local_references
            .remove(&(self.session_id.clone(), id.clone(), key.clone()));
        let message = OutgoingMessage::UnpublishReference {
            resource_id: self.resource_id.clone(),
            id,
            key,
        };
        self.send(&mut state, message).await
    }

    /// Process one server message addressed to this model
    pub async fn handle_message(&self, message: IncomingMessage) -> Result<(), ModelError> {
        let mut state = self.state.lock().await;
        self.ensure_open(&state)?;

        let result = match message {
            IncomingMessage::RemoteOperation { event, .. } => self.handle_remote_operation(&mut state, event),
            IncomingMessage::OperationAcknowledgement { seq_no, version, .. } => {
                self.handle_acknowledgement(&mut state, seq_no, version)
            }
            IncomingMessage::ReferencePublished { reference, .. } => {
                self.emit(ModelEvent::ReferencePublished {
                    session_id: reference.session_id.clone(),
                    id: reference.id.clone(),
                    key: reference.key.clone(),
                });
                match reference.value {
                    Some(_) => self.handle_remote_reference(&mut state, reference),
                    None if reference.session_id == self.session_id => Ok(()),
                    None => {
                        state.remote_references.insert(reference_key(&reference), reference);
                        Ok(())
                    }
                }
            }
            IncomingMessage::ReferenceSet { reference, .. } => self.handle_remote_reference(&mut state, reference),
            IncomingMessage::ReferenceCleared {
                session_id, id, key, ..
            } => {
                let lookup = (session_id.clone(), id.clone(), key.clone());
                if let Some(reference) = state.remote_references.get_mut(&lookup) {
                    reference.value = None;
                }
                self.emit(ModelEvent::ReferenceCleared { session_id, id, key });
                Ok(())
            }
            IncomingMessage::ReferenceUnpublished {
                session_id, id, key, ..
            } => {
                state
                    .remote_references
                    .remove(&(session_id.clone(), id.clone(), key.clone()));
                self.emit(ModelEvent::ReferenceUnpublished { session_id, id, key });
                Ok(())
            }
            IncomingMessage::RemoteClientOpened { session_id, .. } => {
                tracing::debug!("[Model] {} opened by {}", self.resource_id, session_id);
                state.sessions.insert(session_id.clone());
                self.emit(ModelEvent::CollaboratorOpened { session_id });
                Ok(())
            }
            IncomingMessage::RemoteClientClosed { session_id, .. } => {
                tracing::debug!("[Model] {} closed by {}", self.resource_id, session_id);
                state.sessions.remove(&session_id);
                state
                    .remote_references
                    .retain(|(owner, _, _), _| *owner != session_id);
                self.emit(ModelEvent::CollaboratorClosed { session_id });
                Ok(())
            }
            IncomingMessage::ForceClose { reason, .. } => {
                tracing::warn!("[Model] {} force closed: {}", self.resource_id, reason);
                self.detach(&mut state, reason, false).await;
                Ok(())
            }
            IncomingMessage::AutoCreateConfigRequest { request_id, .. } => {
                tracing::warn!("[Model] Ignoring auto-create request {} routed to {}", request_id, self.resource_id);
                Ok(())
            }
        };

        match result {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail(&mut state, err).await),
        }
    }

    /// Close this session and tell the server
    pub async fn close(&self) -> Result<(), ModelError> {
        {
            let mut state = self.state.lock().await;
            self.ensure_open(&state)?;
            state.detached = Some("closed".to_string());
            self.unregister().await;
        }
        self.emit(ModelEvent::Closed {
            reason: "closed".to_string(),
            resync: false,
        });
        tracing::debug!("[Model] Closing {}", self.resource_id);

        let request = OutgoingMessage::CloseRealTimeModelRequest {
            resource_id: self.resource_id.clone(),
        };
        match self.connection.request(request).await? {
            ResponseMessage::Ok => Ok(()),
            other => Err(ModelError::UnexpectedResponse {
                expected: "Ok",
                actual: other.name(),
            }),
        }
    }

    fn handle_remote_operation(
        &self,
        state: &mut ModelState,
        event: UnprocessedOperationEvent,
    ) -> Result<(), ModelError> {
        state.ccc.process_remote_operation(event)?;
        self.drain_incoming(state)
    }

    fn handle_acknowledgement(&self, state: &mut ModelState, seq_no: u64, version: u64) -> Result<(), ModelError> {
        state.ccc.process_acknowledgement_operation(seq_no, version)?;
        self.emit(ModelEvent::Acknowledged {
            seq_no,
            version: state.ccc.context_version(),
        });
        Ok(())
    }

    fn handle_remote_reference(&self, state: &mut ModelState, reference: ModelReferenceData) -> Result<(), ModelError> {
        if reference.session_id == self.session_id {
            tracing::warn!("[Model] Ignoring echo of local reference '{}'", reference.key);
            return Ok(());
        }
        state.ccc.process_remote_reference_set(reference);
        self.drain_incoming(state)
    }

    fn drain_incoming(&self, state: &mut ModelState) -> Result<(), ModelError> {
        while let Some(event) = state.ccc.get_next_incoming_operation() {
            state.data.apply(&event.operation)?;
            transform_references(&mut state.remote_references, &event.operation);
            transform_references(&mut state.local_references, &event.operation);
            self.emit(ModelEvent::RemoteOperation {
                session_id: event.client_id,
                version: event.context_version,
                timestamp: event.timestamp,
                operation: event.operation,
            });
        }
        while let Some(reference) = state.ccc.get_next_remote_reference_set_event() {
            state.remote_references.insert(reference_key(&reference), reference.clone());
            self.emit(ModelEvent::ReferenceSet { reference });
        }
        Ok(())
    }

    async fn send_submission(&self, state: &mut ModelState, event: UnprocessedOperationEvent) -> Result<(), ModelError> {
        let message = OutgoingMessage::OperationSubmission {
            resource_id: self.resource_id.clone(),
            seq_no: event.seq_no,
            version: event.context_version,
            operation: event.operation,
        };
        self.send(state, message).await
    }

    async fn send(&self, state: &mut ModelState, message: OutgoingMessage) -> Result<(), ModelError> {
        match self.connection.send(message) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.detach(state, err.to_string(), true).await;
                Err(err)
            }
        }
    }

    fn ensure_open(&self, state: &ModelState) -> Result<(), ModelError> {
        match &state.detached {
            Some(reason) => Err(ModelError::detached(&self.resource_id, reason.clone())),
            None => Ok(()),
        }
    }

    /// Detach on fatal errors and hand the error back
    async fn fail(&self, state: &mut ModelState, error: ModelError) -> ModelError {
        if error.is_fatal() {
            tracing::error!("[Model] Fatal error on {}: {}", self.resource_id, error);
            self.detach(state, error.to_string(), true).await;
        }
        error
    }

    async fn detach(&self, state: &mut ModelState, reason: String, resync: bool) {
        if state.detached.is_some() {
            return;
        }
        state.detached = Some(reason.clone());
        self.unregister().await;
        self.emit(ModelEvent::Closed { reason, resync });
    }

    async fn unregister(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().await.remove(&self.resource_id);
        }
    }

    fn emit(&self, event: ModelEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

impl std::fmt::Debug for RealTimeModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealTimeModel")
            .field("resource_id", &self.resource_id)
            .field("model_id", &self.model_id)
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}

fn transform_references(references: &mut HashMap<ReferenceKey, ModelReferenceData>, operation: &Operation) {
    let transformer = ReferenceTransformer::new();
    for reference in references.values_mut() {
        *reference = transformer.transform(operation, reference.clone());
    }
}
