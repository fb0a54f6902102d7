//! # Protocol Connection
//!
//! Request/response correlation over an outbound message channel.
//!
//! The connection does not own a socket. Outgoing [`Envelope`]s are pushed
//! into an unbounded channel whose receiver belongs to the transport; the
//! transport feeds responses back through [`ProtocolConnection::complete_request`].
//!
//! Every request is tracked in a table of pending responders and resolves
//! exactly once: with the server's response, with the server's error, with
//! a timeout, or with [`ModelError::ConnectionClosed`] when the connection
//! shuts down. Late responses for requests that already resolved are
//! dropped.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use xfcollab::model::connection::ProtocolConnection;
//! use xfcollab::model::protocol::OutgoingMessage;
//! use xfcollab::shared::ClientConfig;
//!
//! # async fn example() -> Result<(), xfcollab::model::ModelError> {
//! let (connection, mut outbound) = ProtocolConnection::new(&ClientConfig::default());
//! tokio::spawn(async move {
//!     while let Some(envelope) = outbound.recv().await {
//!         // write the envelope to the wire
//!         # let _ = envelope;
//!     }
//! });
//! connection.send(OutgoingMessage::CloseRealTimeModelRequest { resource_id: "r1".into() })?;
//! # Ok(())
//! # }
//! ```

use crate::model::error::ModelError;
use crate::model::protocol::{Envelope, OutgoingMessage, RequestId, ResponseMessage};
use crate::shared::config::ClientConfig;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};

type Responder = oneshot::Sender<Result<ResponseMessage, ModelError>>;

/// Pending requests keyed by request id
#[derive(Debug, Default)]
pub struct RequestTable {
    pending: HashMap<RequestId, Responder>,
}

impl RequestTable {
    /// Track a new request
    pub fn register(&mut self, request_id: RequestId) -> oneshot::Receiver<Result<ResponseMessage, ModelError>> {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(request_id, tx);
        rx
    }

    /// Resolve a request with a server response; error responses fail it
    pub fn complete(&mut self, request_id: RequestId, response: ResponseMessage) -> bool {
        let result = match response {
            ResponseMessage::Error { code, message } => Err(ModelError::RequestFailed { code, message }),
            other => Ok(other),
        };
        self.resolve(request_id, result)
    }

    /// Fail a request
    pub fn fail(&mut self, request_id: RequestId, error: ModelError) -> bool {
        self.resolve(request_id, Err(error))
    }

    /// Fail a request that ran out of time
    pub fn expire(&mut self, request_id: RequestId) -> bool {
        self.fail(request_id, ModelError::RequestTimeout { request_id })
    }

    /// Fail every pending request, returning how many there were
    pub fn fail_all(&mut self, error: &ModelError) -> usize {
        let count = self.pending.len();
        for (_, responder) in self.pending.drain() {
            let _ = responder.send(Err(error.clone()));
        }
        count
    }

    pub fn remove(&mut self, request_id: RequestId) -> bool {
        self.pending.remove(&request_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn resolve(&mut self, request_id: RequestId, result: Result<ResponseMessage, ModelError>) -> bool {
        match self.pending.remove(&request_id) {
            Some(responder) => {
                // The requester may have given up already
                let _ = responder.send(result);
                true
            }
            None => false,
        }
    }
}

/// Removes a request's table entry when its caller stops waiting
struct TableEntry {
    requests: Arc<Mutex<RequestTable>>,
    request_id: RequestId,
}

impl Drop for TableEntry {
    fn drop(&mut self) {
        if let Ok(mut table) = self.requests.try_lock() {
            table.remove(self.request_id);
            return;
        }
        let requests = self.requests.clone();
        let request_id = self.request_id;
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                requests.lock().await.remove(request_id);
            });
        }
    }
}

/// A client's connection to the model server
#[derive(Debug)]
pub struct ProtocolConnection {
    session_id: String,
    request_timeout: Duration,
    outbound: mpsc::UnboundedSender<Envelope>,
    requests: Arc<Mutex<RequestTable>>,
    next_request_id: AtomicU64,
    closed: AtomicBool,
}

impl ProtocolConnection {
    /// Create a connection and the receiver the transport drains
    pub fn new(config: &ClientConfig) -> (Self, mpsc::UnboundedReceiver<Envelope>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        let connection = Self {
            session_id: config.session_id.clone(),
            request_timeout: config.request_timeout,
            outbound,
            requests: Arc::new(Mutex::new(RequestTable::default())),
            next_request_id: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        };
        (connection, rx)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Send a message that expects no response
    pub fn send(&self, message: OutgoingMessage) -> Result<(), ModelError> {
        self.push(Envelope {
            request_id: None,
            message,
        })
    }

    /// Answer a request the server sent
    pub fn reply(&self, request_id: RequestId, message: OutgoingMessage) -> Result<(), ModelError> {
        self.push(Envelope {
            request_id: Some(request_id),
            message,
        })
    }

    /// Send a request and wait for its response
    pub async fn request(&self, message: OutgoingMessage) -> Result<ResponseMessage, ModelError> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let rx = self.requests.lock().await.register(request_id);
        let _entry = TableEntry {
            requests: self.requests.clone(),
            request_id,
        };

        self.push(Envelope {
            request_id: Some(request_id),
            message,
        })?;
        tracing::trace!("[Protocol] Request {} sent", request_id);

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ModelError::ConnectionClosed),
            Err(_) => {
                tracing::warn!("[Protocol] Request {} timed out after {:?}", request_id, self.request_timeout);
                self.expire_request(request_id).await;
                Err(ModelError::RequestTimeout { request_id })
            }
        }
    }

    /// Deliver a response; returns false if nothing was waiting for it
    pub async fn complete_request(&self, request_id: RequestId, response: ResponseMessage) -> bool {
        let delivered = self.requests.lock().await.complete(request_id, response);
        if !delivered {
            tracing::debug!("[Protocol] Dropping response for unknown request {}", request_id);
        }
        delivered
    }

    /// Fail a pending request
    pub async fn fail_request(&self, request_id: RequestId, error: ModelError) -> bool {
        self.requests.lock().await.fail(request_id, error)
    }

    /// Fail a pending request with a timeout
    pub async fn expire_request(&self, request_id: RequestId) -> bool {
        self.requests.lock().await.expire(request_id)
    }

    pub async fn pending_requests(&self) -> usize {
        self.requests.lock().await.len()
    }

    /// Stop accepting messages and fail everything in flight
    pub async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let failed = self.requests.lock().await.fail_all(&ModelError::ConnectionClosed);
        tracing::info!("[Protocol] Closed, failed {} pending requests", failed);
    }

    fn push(&self, envelope: Envelope) -> Result<(), ModelError> {
        if self.is_closed() {
            return Err(ModelError::ConnectionClosed);
        }
        self.outbound.send(envelope).map_err(|_| ModelError::ConnectionClosed)
    }
}
