//! Model service integration tests
//!
//! Each test plays the server through [`FakeServer`]: it reads the requests
//! the service sends and answers them by hand.

use crate::common::fixtures::{open_response, remote_event, sample_data};
use crate::common::FakeServer;
use crate::{assert_contains, assert_ok};
use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use xfcollab::model::{
    AutoCreateModelOptions, CreateModelOptions, IncomingMessage, ModelError, ModelEvent, ModelPermissions,
    OutgoingMessage, ResponseMessage,
};
use xfcollab::ot::{DataValue, DiscreteOperation};
use xfcollab::path;
use xfcollab::shared::SharedError;

/// Let spawned tasks run up to their next await point
async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

/// Open `model_id` through the fake server and return the model
async fn open(server: &mut FakeServer, resource_id: &str, model_id: &str) -> Arc<xfcollab::RealTimeModel> {
    let service = server.service.clone();
    let id = model_id.to_string();
    let task = tokio::spawn(async move { service.open(&id).await });

    let (request_id, message) = server.next_request().await;
    assert_matches!(message, OutgoingMessage::OpenRealTimeModelRequest { id: Some(_), auto_create_id: None });
    server
        .respond(
            request_id,
            ResponseMessage::OpenRealTimeModelResponse(open_response(resource_id, model_id, 3)),
        )
        .await;
    task.await.unwrap().unwrap()
}

#[tokio::test]
async fn test_open_registers_model() {
    let mut server = FakeServer::new();
    let model = open(&mut server, "r1", "doc").await;

    assert_eq!(model.model_id(), "doc");
    assert_eq!(model.resource_id(), "r1");
    assert_eq!(model.version().await, 3);
    assert_eq!(model.data().await, DataValue::Object(sample_data()));
    assert!(server.service.is_open("doc").await);
    assert_eq!(server.service.open_count().await, 1);
    assert_eq!(server.service.pending_open_count().await, 0);

    // A second open is served locally
    let again = server.service.open("doc").await.unwrap();
    assert!(Arc::ptr_eq(&model, &again));
    assert!(server.is_quiet());
}

#[tokio::test]
async fn test_concurrent_opens_share_one_request() {
    let mut server = FakeServer::new();
    let first = tokio::spawn({
        let service = server.service.clone();
        async move { service.open("doc").await }
    });
    let second = tokio::spawn({
        let service = server.service.clone();
        async move { service.open("doc").await }
    });

    let (request_id, _) = server.next_request().await;
    settle().await;
    assert_eq!(server.service.pending_open_count().await, 1);

    server
        .respond(
            request_id,
            ResponseMessage::OpenRealTimeModelResponse(open_response("r1", "doc", 0)),
        )
        .await;

    let first = first.await.unwrap().unwrap();
    let second = second.await.unwrap().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert!(server.is_quiet());
    assert_eq!(server.service.open_count().await, 1);
}

#[tokio::test]
async fn test_failed_open_reaches_every_waiter() {
    let mut server = FakeServer::new();
    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let service = server.service.clone();
            tokio::spawn(async move { service.open("missing").await })
        })
        .collect();

    let (request_id, _) = server.next_request().await;
    settle().await;
    server
        .respond(
            request_id,
            ResponseMessage::Error {
                code: "model_not_found".to_string(),
                message: "No such model".to_string(),
            },
        )
        .await;

    for waiter in waiters {
        let err = waiter.await.unwrap().unwrap_err();
        assert_matches!(err, ModelError::RequestFailed { ref code, .. } if code == "model_not_found");
    }
    assert!(server.is_quiet());
    assert_eq!(server.service.pending_open_count().await, 0);
    assert!(!server.service.is_open("missing").await);
}

#[tokio::test]
async fn test_open_times_out() {
    let mut server = FakeServer::with_timeout(Duration::from_millis(50));
    let err = server.service.open("slow").await.unwrap_err();

    assert_matches!(err, ModelError::RequestTimeout { .. });
    assert_matches!(
        server.next_request().await.1,
        OutgoingMessage::OpenRealTimeModelRequest { .. }
    );
    assert_eq!(server.service.pending_open_count().await, 0);
    assert_eq!(server.service.connection().pending_requests().await, 0);
}

#[test]
fn test_open_rejects_empty_id() {
    let server = FakeServer::new();
    tokio_test::block_on(async {
        let err = server.service.open("").await.unwrap_err();
        assert_matches!(err, ModelError::Shared(_));

        let err = server
            .service
            .open_auto_create(AutoCreateModelOptions::new(""))
            .await
            .unwrap_err();
        assert_matches!(err, ModelError::Shared(_));
    });
    assert_eq!(tokio_test::block_on(server.service.pending_open_count()), 0);
}

#[tokio::test]
async fn test_undecodable_frame_is_refused() {
    let server = FakeServer::new();
    let err = server.service.dispatch_json("{\"kind\":\"message\"}").await.unwrap_err();
    assert_matches!(err, ModelError::Shared(SharedError::SerializationError { .. }));
    assert_contains!(err.to_string(), "Serialization error");
}

#[tokio::test]
async fn test_auto_create_answers_config_request() {
    let mut server = FakeServer::new();
    let options = AutoCreateModelOptions::new("notes")
        .with_id("doc")
        .with_data(sample_data())
        .ephemeral(true);
    let task = tokio::spawn({
        let service = server.service.clone();
        async move { service.open_auto_create(options).await }
    });

    let (open_id, message) = server.next_request().await;
    let auto_create_id = match message {
        OutgoingMessage::OpenRealTimeModelRequest {
            id,
            auto_create_id: Some(auto_create_id),
        } => {
            assert_eq!(id.as_deref(), Some("doc"));
            auto_create_id
        }
        other => panic!("Expected an auto-create open, got {:?}", other),
    };
    assert_eq!(server.service.auto_create_count().await, 1);

    // The server asks for the creation options before creating the model
    server
        .deliver(IncomingMessage::AutoCreateConfigRequest {
            request_id: 900,
            auto_create_id,
        })
        .await
        .unwrap();
    let reply = server.next_envelope().await;
    assert_eq!(reply.request_id, Some(900));
    assert_matches!(
        reply.message,
        OutgoingMessage::AutoCreateConfigResponse { ref collection, ref data, ephemeral: true, .. }
            if collection == "notes" && data.as_ref() == Some(&sample_data())
    );

    server
        .respond(
            open_id,
            ResponseMessage::OpenRealTimeModelResponse(open_response("r7", "doc", 0)),
        )
        .await;
    let model = task.await.unwrap().unwrap();
    assert_eq!(model.model_id(), "doc");
    assert_eq!(server.service.auto_create_count().await, 0);
}

#[tokio::test]
async fn test_auto_create_without_id_registers_server_id() {
    let mut server = FakeServer::new();
    let task = tokio::spawn({
        let service = server.service.clone();
        async move { service.open_auto_create(AutoCreateModelOptions::new("notes")).await }
    });

    let (open_id, message) = server.next_request().await;
    assert_matches!(message, OutgoingMessage::OpenRealTimeModelRequest { id: None, auto_create_id: Some(_) });
    server
        .respond(
            open_id,
            ResponseMessage::OpenRealTimeModelResponse(open_response("r8", "generated-1", 0)),
        )
        .await;

    task.await.unwrap().unwrap();
    assert!(server.service.is_open("generated-1").await);
}

#[tokio::test]
async fn test_unknown_auto_create_id_is_refused() {
    let mut server = FakeServer::new();
    let err = server
        .deliver(IncomingMessage::AutoCreateConfigRequest {
            request_id: 4,
            auto_create_id: 77,
        })
        .await
        .unwrap_err();
    assert_eq!(err, ModelError::UnknownAutoCreateId { auto_create_id: 77 });

    let reply = server.next_envelope().await;
    assert_eq!(reply.request_id, Some(4));
    assert_matches!(reply.message, OutgoingMessage::ErrorResponse { ref code, .. } if code == "unknown_model");
}

#[tokio::test]
async fn test_create_and_remove() {
    let mut server = FakeServer::new();
    let create = tokio::spawn({
        let service = server.service.clone();
        let options = CreateModelOptions::new("notes")
            .with_data(sample_data())
            .with_world_permissions(ModelPermissions::read_only());
        async move { service.create(options).await }
    });

    let (request_id, message) = server.next_request().await;
    assert_matches!(
        message,
        OutgoingMessage::CreateRealTimeModelRequest { ref collection, model_id: None, ref data }
            if collection == "notes" && *data == sample_data()
    );
    server
        .respond(
            request_id,
            ResponseMessage::CreateRealTimeModelResponse {
                model_id: "new-doc".to_string(),
            },
        )
        .await;
    assert_eq!(assert_ok!(create.await.unwrap()), "new-doc");

    let remove = tokio::spawn({
        let service = server.service.clone();
        async move { service.remove("notes", "new-doc").await }
    });
    let (request_id, message) = server.next_request().await;
    assert_eq!(
        message,
        OutgoingMessage::DeleteRealTimeModelRequest {
            collection: "notes".to_string(),
            model_id: "new-doc".to_string(),
        }
    );
    server.respond(request_id, ResponseMessage::Ok).await;
    assert_ok!(remove.await.unwrap(), "remove");
}

#[tokio::test]
async fn test_create_rejects_wrong_response() {
    let mut server = FakeServer::new();
    let create = tokio::spawn({
        let service = server.service.clone();
        async move { service.create(CreateModelOptions::new("notes")).await }
    });

    let (request_id, _) = server.next_request().await;
    server.respond(request_id, ResponseMessage::Ok).await;
    assert_matches!(
        create.await.unwrap(),
        Err(ModelError::UnexpectedResponse { expected: "CreateRealTimeModelResponse", actual: "Ok" })
    );
}

#[tokio::test]
async fn test_close_forgets_model() {
    let mut server = FakeServer::new();
    let model = open(&mut server, "r1", "doc").await;
    let mut events = model.subscribe();

    let close = tokio::spawn({
        let service = server.service.clone();
        async move { service.close("r1").await }
    });
    let (request_id, message) = server.next_request().await;
    assert_eq!(
        message,
        OutgoingMessage::CloseRealTimeModelRequest {
            resource_id: "r1".to_string()
        }
    );
    server.respond(request_id, ResponseMessage::Ok).await;
    close.await.unwrap().unwrap();

    assert!(!server.service.is_open("doc").await);
    assert_eq!(server.service.open_count().await, 0);
    assert!(!model.is_open().await);
    assert_matches!(events.recv().await, Ok(ModelEvent::Closed { resync: false, .. }));

    // Later messages for the resource are refused
    let err = server
        .deliver(IncomingMessage::RemoteClientOpened {
            resource_id: "r1".to_string(),
            session_id: "remote".to_string(),
        })
        .await
        .unwrap_err();
    assert_matches!(err, ModelError::NotOpen { .. });
}

#[tokio::test]
async fn test_close_unknown_resource() {
    let server = FakeServer::new();
    assert_matches!(server.service.close("nope").await, Err(ModelError::NotOpen { .. }));
}

#[tokio::test]
async fn test_dispose_closes_every_model() {
    let mut server = FakeServer::new();
    open(&mut server, "r1", "first").await;
    open(&mut server, "r2", "second").await;

    let dispose = tokio::spawn({
        let service = server.service.clone();
        async move { service.dispose().await }
    });
    for _ in 0..2 {
        let (request_id, message) = server.next_request().await;
        assert_matches!(message, OutgoingMessage::CloseRealTimeModelRequest { .. });
        server.respond(request_id, ResponseMessage::Ok).await;
    }
    dispose.await.unwrap();
    assert_eq!(server.service.open_count().await, 0);
}

#[tokio::test]
async fn test_remote_operation_is_routed_to_model() {
    let mut server = FakeServer::new();
    let model = open(&mut server, "r1", "doc").await;
    let mut events = model.subscribe();

    server
        .deliver(IncomingMessage::RemoteOperation {
            resource_id: "r1".to_string(),
            event: remote_event("remote", 0, 3, DiscreteOperation::string_insert(path!["title"], 5, "!")),
        })
        .await
        .unwrap();

    assert_eq!(model.version().await, 4);
    assert_eq!(model.value_at(&path!["title"]).await, Some(DataValue::from("hello!")));
    assert_matches!(
        events.recv().await,
        Ok(ModelEvent::RemoteOperation { ref session_id, version: 4, .. }) if session_id == "remote"
    );
}

#[tokio::test]
async fn test_local_edit_round_trip() {
    let mut server = FakeServer::new();
    let model = open(&mut server, "r1", "doc").await;

    model
        .submit(DiscreteOperation::array_insert(path!["tags"], 0, "z"))
        .await
        .unwrap();
    assert!(!model.is_committed().await);

    let envelope = server.next_envelope().await;
    assert_eq!(envelope.request_id, None);
    assert_matches!(
        envelope.message,
        OutgoingMessage::OperationSubmission { ref resource_id, seq_no: 0, version: 3, .. } if resource_id == "r1"
    );

    server
        .deliver(IncomingMessage::OperationAcknowledgement {
            resource_id: "r1".to_string(),
            seq_no: 0,
            version: 3,
        })
        .await
        .unwrap();
    assert!(model.is_committed().await);
    assert_eq!(model.version().await, 4);
}

#[tokio::test]
async fn test_protocol_violation_detaches_model() {
    let mut server = FakeServer::new();
    let model = open(&mut server, "r1", "doc").await;
    let mut events = model.subscribe();

    let err = server
        .deliver(IncomingMessage::OperationAcknowledgement {
            resource_id: "r1".to_string(),
            seq_no: 0,
            version: 3,
        })
        .await
        .unwrap_err();
    assert!(err.is_fatal());
    assert!(!server.service.is_open("doc").await);
    assert_matches!(events.recv().await, Ok(ModelEvent::Closed { resync: true, .. }));
    assert_matches!(
        model.submit(DiscreteOperation::number_add(path!["meta", "count"], 1.0)).await,
        Err(ModelError::Detached { .. })
    );
}
