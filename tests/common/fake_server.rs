//! Scripted server for model service tests
//!
//! Tests drive both sides: they read what the service sent and decide what
//! the server answers. Everything crosses the channel as JSON text, the way
//! a transport would carry it.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use xfcollab::model::{
    Envelope, IncomingMessage, ModelError, ModelService, OutgoingMessage, RequestId, ResponseMessage, ServerFrame,
};
use xfcollab::shared::ClientConfig;

/// How long to wait for the service to send something
pub const RECV_TIMEOUT: Duration = Duration::from_secs(2);

pub struct FakeServer {
    pub service: Arc<ModelService>,
    outbound: mpsc::UnboundedReceiver<Envelope>,
}

impl FakeServer {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(5))
    }

    pub fn with_timeout(request_timeout: Duration) -> Self {
        let config = ClientConfig::builder()
            .session_id("local")
            .request_timeout(request_timeout)
            .event_capacity(64)
            .build()
            .expect("valid test config");
        let (service, outbound) = ModelService::new(config);
        Self {
            service: Arc::new(service),
            outbound,
        }
    }

    /// Next envelope the service sent
    pub async fn next_envelope(&mut self) -> Envelope {
        let envelope = tokio::time::timeout(RECV_TIMEOUT, self.outbound.recv())
            .await
            .expect("service sent nothing")
            .expect("outbound channel closed");
        let text = envelope.to_json().expect("envelopes encode");
        serde_json::from_str(&text).expect("envelopes decode")
    }

    /// Next envelope, which must be a request; returns its id and message
    pub async fn next_request(&mut self) -> (RequestId, OutgoingMessage) {
        let envelope = self.next_envelope().await;
        let request_id = envelope.request_id.expect("expected a request");
        (request_id, envelope.message)
    }

    /// True if nothing else was sent
    pub fn is_quiet(&mut self) -> bool {
        self.outbound.try_recv().is_err()
    }

    pub async fn respond(&self, request_id: RequestId, message: ResponseMessage) {
        self.send(ServerFrame::Response { request_id, message })
            .await
            .expect("responses always dispatch");
    }

    pub async fn deliver(&self, message: IncomingMessage) -> Result<(), ModelError> {
        self.send(ServerFrame::Message { message }).await
    }

    async fn send(&self, frame: ServerFrame) -> Result<(), ModelError> {
        let text = serde_json::to_string(&frame).expect("frames encode");
        self.service.dispatch_json(&text).await
    }
}
