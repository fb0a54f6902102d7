//! # Client Concurrency Control
//!
//! Per-document state machine that sequences local edits against remote
//! ones. It owns the context version, the sequence number counter, the
//! in-flight queue (sent, not yet acknowledged), the unapplied queue
//! (received and transformed, not yet applied) and the open batch, if any.
//!
//! ## Commit Status
//!
//! The controller is *synced* when nothing is in flight and no batch holds
//! operations, and *committing* otherwise. Each transition is broadcast as a
//! [`CommitStatusChanged`] event.
//!
//! ## Usage
//!
//! ```rust
//! use xfcollab::ot::{ClientConcurrencyControl, DiscreteOperation};
//! use xfcollab::path;
//!
//! let mut ccc = ClientConcurrencyControl::new("session-a", 5);
//! let event = ccc
//!     .process_outgoing_operation(DiscreteOperation::array_insert(path![], 2, "X").into())
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(event.seq_no, 0);
//!
//! ccc.process_acknowledgement_operation(0, 5).unwrap();
//! assert_eq!(ccc.context_version(), 6);
//! ```
//!
//! ## Errors
//!
//! Every protocol invariant violation returns a fatal [`ConcurrencyError`];
//! the controller must then be discarded and the document reopened.

use crate::debug::validate_invariant;
use crate::ot::error::ConcurrencyError;
use crate::ot::ops::{CompoundOperation, DiscreteOperation, Operation};
use crate::ot::xform::{ModelReferenceData, OperationTransformer, ReferenceTransformer};
use crate::shared::event::{CommitStatusChanged, ProcessedOperationEvent, UnprocessedOperationEvent};
use std::collections::VecDeque;
use tokio::sync::broadcast;

const DEFAULT_EVENT_CAPACITY: usize = 256;

/// A sent operation awaiting acknowledgement
#[derive(Debug, Clone, PartialEq)]
pub struct InflightOperation {
    /// Sequence number it was sent with
    pub seq_no: u64,
    /// Current form, rewritten by every remote operation that arrives before the ack
    pub operation: Operation,
}

/// Per-document client side of the OT protocol
///
/// Tracks the server version the client has seen, the local operations
/// still in flight and the remote operations waiting to be applied. Every
/// remote operation is transformed against the in-flight operations (and
/// an open batch) before it is handed out, and the in-flight operations are
/// rewritten in turn.
pub struct ClientConcurrencyControl {
    client_id: String,
    seq_no: u64,
    context_version: u64,
    batch: Option<Vec<DiscreteOperation>>,
    inflight: VecDeque<InflightOperation>,
    unapplied: VecDeque<ProcessedOperationEvent>,
    remote_references: VecDeque<ModelReferenceData>,
    acknowledged: u64,
    transformer: OperationTransformer,
    reference_transformer: ReferenceTransformer,
    commit_status: broadcast::Sender<CommitStatusChanged>,
}

impl ClientConcurrencyControl {
    /// Create a controller for a document opened at `context_version`
    pub fn new(client_id: impl Into<String>, context_version: u64) -> Self {
        Self::with_event_capacity(client_id, context_version, DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_event_capacity(client_id: impl Into<String>, context_version: u64, capacity: usize) -> Self {
        let (commit_status, _) = broadcast::channel(capacity.max(1));
        Self {
            client_id: client_id.into(),
            seq_no: 0,
            context_version,
            batch: None,
            inflight: VecDeque::new(),
            unapplied: VecDeque::new(),
            remote_references: VecDeque::new(),
            acknowledged: 0,
            transformer: OperationTransformer::new(),
            reference_transformer: ReferenceTransformer::new(),
            commit_status,
        }
    }

    /// Subscribe to commit status transitions
    pub fn subscribe(&self) -> broadcast::Receiver<CommitStatusChanged> {
        self.commit_status.subscribe()
    }

    /// Sequence a local operation
    ///
    /// The operation is transformed past every unapplied remote operation,
    /// rewriting those entries in place. Inside a batch it is buffered and
    /// `None` is returned; otherwise it goes in flight and the event to send
    /// is returned.
    pub fn process_outgoing_operation(
        &mut self,
        operation: Operation,
    ) -> Result<Option<UnprocessedOperationEvent>, ConcurrencyError> {
        let was_synced = self.is_synced();

        let unapplied = std::mem::take(&mut self.unapplied);
        let (unapplied, operation) = self.transform_outgoing(unapplied, operation)?;
        self.unapplied = unapplied;

        let references = std::mem::take(&mut self.remote_references);
        self.remote_references = references
            .into_iter()
            .map(|reference| self.reference_transformer.transform(&operation, reference))
            .collect();

        if let Some(batch) = self.batch.as_mut() {
            batch.extend(operation.discrete_ops().cloned());
            tracing::debug!("[CCC] Added {} to batch ({} operations)", operation, batch.len());
            self.notify_if_committing(was_synced);
            return Ok(None);
        }

        let event = self.send(operation);
        self.notify_if_committing(was_synced);
        Ok(Some(event))
    }

    /// Open a batch; operations are buffered until it is completed
    pub fn start_batch_operation(&mut self) -> Result<(), ConcurrencyError> {
        if self.batch.is_some() {
            return Err(ConcurrencyError::BatchAlreadyInProgress);
        }
        self.batch = Some(Vec::new());
        Ok(())
    }

    /// Discard an open batch that has not received any operations
    pub fn cancel_batch_operation(&mut self) -> Result<(), ConcurrencyError> {
        let size = match &self.batch {
            None => return Err(ConcurrencyError::BatchNotInProgress),
            Some(batch) => batch.len(),
        };
        if size > 0 {
            return Err(ConcurrencyError::BatchNotEmpty { size });
        }
        self.batch = None;
        Ok(())
    }

    /// Close the batch and send its operations as one compound operation
    pub fn complete_batch_operation(&mut self) -> Result<UnprocessedOperationEvent, ConcurrencyError> {
        match &self.batch {
            None => return Err(ConcurrencyError::BatchNotInProgress),
            Some(batch) if batch.is_empty() => return Err(ConcurrencyError::EmptyBatch),
            Some(_) => {}
        }

        let ops = self.batch.take().unwrap_or_default();
        Ok(self.send(Operation::Compound(CompoundOperation::new(ops))))
    }

    /// The server applied our oldest in-flight operation at `version`
    pub fn process_acknowledgement_operation(&mut self, seq_no: u64, version: u64) -> Result<(), ConcurrencyError> {
        let Some(oldest) = self.inflight.front() else {
            tracing::error!("[CCC] Acknowledgement for seqNo {} with nothing in flight", seq_no);
            return Err(ConcurrencyError::NoInflightOperations { seq_no });
        };

        if version != self.context_version {
            tracing::error!(
                "[CCC] Acknowledgement version {} does not match context version {}",
                version,
                self.context_version
            );
            return Err(ConcurrencyError::VersionMismatch {
                expected: self.context_version,
                actual: version,
            });
        }

        if oldest.seq_no != seq_no {
            return Err(ConcurrencyError::AcknowledgementOutOfOrder {
                expected: oldest.seq_no,
                actual: seq_no,
            });
        }

        self.inflight.pop_front();
        self.acknowledged += 1;
        self.context_version += 1;
        tracing::debug!("[CCC] Acknowledged seqNo {}, now at version {}", seq_no, self.context_version);

        self.check_invariants();
        if self.is_synced() {
            self.notify(true);
        }
        Ok(())
    }

    /// Accept an operation sequenced by the server
    ///
    /// The operation is transformed past every in-flight operation and then
    /// every buffered batch operation, rewriting those in place, and queued
    /// for application.
    pub fn process_remote_operation(&mut self, event: UnprocessedOperationEvent) -> Result<(), ConcurrencyError> {
        if event.context_version > self.context_version {
            tracing::error!(
                "[CCC] Remote operation version {} is ahead of {}",
                event.context_version,
                self.context_version
            );
            return Err(ConcurrencyError::RemoteVersionAhead {
                expected: self.context_version,
                actual: event.context_version,
            });
        }

        let inflight = std::mem::take(&mut self.inflight);
        let (inflight, operation) = self.transform_incoming(inflight, event.operation.clone())?;
        self.inflight = inflight;

        let operation = match self.batch.take() {
            Some(batch) => {
                let server_ops: Vec<DiscreteOperation> = operation.discrete_ops().cloned().collect();
                let (server_ops, batch) = self.transformer.transform_sequences(&server_ops, &batch)?;
                self.batch = Some(batch);
                match operation {
                    Operation::Discrete(_) => server_ops
                        .into_iter()
                        .next()
                        .map(Operation::Discrete)
                        .unwrap_or(operation),
                    Operation::Compound(_) => Operation::Compound(CompoundOperation::new(server_ops)),
                }
            }
            None => operation,
        };

        self.context_version += 1;

        let references = std::mem::take(&mut self.remote_references);
        self.remote_references = references
            .into_iter()
            .map(|reference| self.reference_transformer.transform(&operation, reference))
            .collect();

        tracing::debug!("[CCC] Remote {} queued at version {}", operation, self.context_version);
        self.unapplied.push_back(event.processed(operation, self.context_version));
        Ok(())
    }

    /// Make a local reference valid against the server's state
    pub fn process_outgoing_set_reference(&self, reference: ModelReferenceData) -> ModelReferenceData {
        self.unapplied.iter().fold(reference, |reference, event| {
            self.reference_transformer.transform(&event.operation, reference)
        })
    }

    /// Queue a remote reference, transformed past local unacknowledged edits
    pub fn process_remote_reference_set(&mut self, reference: ModelReferenceData) {
        let reference = self
            .inflight
            .iter()
            .fold(reference, |reference, entry| {
                self.reference_transformer.transform(&entry.operation, reference)
            });
        let reference = self
            .batch
            .iter()
            .flatten()
            .fold(reference, |reference, op| self.reference_transformer.transform_discrete(op, reference));
        self.remote_references.push_back(reference);
    }

    /// Pop the oldest transformed remote operation
    pub fn get_next_incoming_operation(&mut self) -> Option<ProcessedOperationEvent> {
        self.unapplied.pop_front()
    }

    /// Pop the oldest remote reference once every queued operation is applied
    pub fn get_next_remote_reference_set_event(&mut self) -> Option<ModelReferenceData> {
        if !self.unapplied.is_empty() {
            return None;
        }
        self.remote_references.pop_front()
    }

    /// Transform a local operation past the unapplied queue
    ///
    /// Returns the rewritten queue and the operation as the server will see it.
    pub fn transform_outgoing(
        &self,
        unapplied: VecDeque<ProcessedOperationEvent>,
        mut operation: Operation,
    ) -> Result<(VecDeque<ProcessedOperationEvent>, Operation), ConcurrencyError> {
        let mut rewritten = VecDeque::with_capacity(unapplied.len());
        for mut event in unapplied {
            let pair = self.transformer.transform(&event.operation, &operation)?;
            event.operation = pair.server_op;
            operation = pair.client_op;
            rewritten.push_back(event);
        }
        Ok((rewritten, operation))
    }

    /// Transform a remote operation past the in-flight queue
    ///
    /// Returns the rewritten queue and the operation as it applies locally.
    pub fn transform_incoming(
        &self,
        inflight: VecDeque<InflightOperation>,
        mut operation: Operation,
    ) -> Result<(VecDeque<InflightOperation>, Operation), ConcurrencyError> {
        let mut rewritten = VecDeque::with_capacity(inflight.len());
        for mut entry in inflight {
            let pair = self.transformer.transform(&operation, &entry.operation)?;
            operation = pair.server_op;
            entry.operation = pair.client_op;
            rewritten.push_back(entry);
        }
        Ok((rewritten, operation))
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn context_version(&self) -> u64 {
        self.context_version
    }

    pub fn has_next_incoming_operation(&self) -> bool {
        !self.unapplied.is_empty()
    }

    pub fn has_next_remote_reference(&self) -> bool {
        self.unapplied.is_empty() && !self.remote_references.is_empty()
    }

    pub fn is_batch_operation_in_progress(&self) -> bool {
        self.batch.is_some()
    }

    pub fn batch_size(&self) -> usize {
        self.batch.as_ref().map_or(0, Vec::len)
    }

    pub fn inflight_len(&self) -> usize {
        self.inflight.len()
    }

    pub fn unapplied_len(&self) -> usize {
        self.unapplied.len()
    }

    /// In-flight operations, oldest first
    pub fn inflight(&self) -> impl Iterator<Item = &InflightOperation> {
        self.inflight.iter()
    }

    /// True when nothing is awaiting acknowledgement
    pub fn is_synced(&self) -> bool {
        self.inflight.is_empty() && self.batch_size() == 0
    }

    fn send(&mut self, operation: Operation) -> UnprocessedOperationEvent {
        let seq_no = self.seq_no;
        self.seq_no += 1;
        self.inflight.push_back(InflightOperation {
            seq_no,
            operation: operation.clone(),
        });
        tracing::debug!("[CCC] Sending seqNo {} at version {}: {}", seq_no, self.context_version, operation);
        self.check_invariants();
        UnprocessedOperationEvent::new(self.client_id.clone(), seq_no, self.context_version, operation)
    }

    fn notify_if_committing(&self, was_synced: bool) {
        if was_synced && !self.is_synced() {
            self.notify(false);
        }
    }

    fn notify(&self, committed: bool) {
        // no subscribers is fine
        let _ = self.commit_status.send(CommitStatusChanged { committed });
    }

    fn check_invariants(&self) {
        validate_invariant(
            self.inflight.len() as u64 == self.seq_no - self.acknowledged,
            "in-flight queue must hold exactly the unacknowledged sends",
        );
    }
}
