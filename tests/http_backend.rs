use std::sync::Arc;

use barangay_sync::{
    ActionCoordinator, ActionError, ActionOutcome, ActionType, ApiKey, AutoConfirm, Backend,
    BackendConfig, BackendError, ChannelNotifier, HttpBackend, Notice, OnlineFlag, Status,
    StatusUpdate, TemplateTable, Transaction, TransactionStore,
};
use chrono::Utc;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend_for(server: &MockServer) -> HttpBackend {
    HttpBackend::new(
        BackendConfig {
            base_url: server.uri(),
            ..BackendConfig::default()
        },
        ApiKey::fixed("hall-key"),
    )
    .expect("client should build")
}

fn record(id: u64, status: &str) -> Transaction {
    serde_json::from_value(json!({
        "transaction_id": id,
        "resident_id": 40 + id,
        "resident_email": format!("resident{id}@example.com"),
        "certificate_type": "Certificate of Good Moral Character",
        "certificate_details": {
            "templateName": "good_moral",
            "fullName": "Maria Santos",
            "age": 31,
            "purok": "Purok 2",
            "maritalStatus": "Single",
            "purpose": "Employment"
        },
        "status": status,
        "date_requested": "2025-04-02T08:15:00Z",
        "date_issued": null
    }))
    .expect("fixture should decode")
}

#[tokio::test]
async fn status_update_carries_key_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/transaction/certificate_transaction/7"))
        .and(header("x-api-key", "hall-key"))
        .and(body_json(json!({"status": "Approved", "date_issued": null})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    backend_for(&server)
        .update_status(7, &StatusUpdate::to(Status::Approved, Utc::now()))
        .await
        .expect("update should succeed");
}

#[tokio::test]
async fn error_status_keeps_response_text() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database unavailable"))
        .mount(&server)
        .await;

    let err = backend_for(&server)
        .update_status(7, &StatusUpdate::to(Status::Rejected, Utc::now()))
        .await
        .unwrap_err();

    match err {
        BackendError::Status { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "database unavailable");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn generated_document_is_returned_as_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate-certificate"))
        .and(body_json(json!({
            "templateName": "good_moral",
            "fullName": "Maria Santos",
            "age": 31,
            "purok": "Purok 2",
            "maritalStatus": "Single",
            "purpose": "Employment"
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(
                    "content-type",
                    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                )
                .set_body_bytes(b"PK\x03\x04docx".to_vec()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let request = TemplateTable::default()
        .document_request(&record(9, "Approved").certificate_details)
        .expect("template should resolve");
    let document = backend_for(&server)
        .generate_document(&request)
        .await
        .expect("generation should succeed");

    assert_eq!(document.file_name, "Maria Santos good_moral.docx");
    assert_eq!(document.bytes, b"PK\x03\x04docx".to_vec());
    assert!(
        document
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.contains("wordprocessingml"))
    );
}

#[tokio::test]
async fn approval_puts_then_notifies() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/transaction/certificate_transaction/2"))
        .and(body_json(json!({"status": "Approved", "date_issued": null})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/transaction/send-notification"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let store = TransactionStore::new();
    store.replace_all(vec![record(2, "Pending")]);
    let (notifier, mut notices) = ChannelNotifier::channel();
    let coordinator = ActionCoordinator::new(
        store.clone(),
        Arc::new(backend_for(&server)),
        Arc::new(OnlineFlag::default()),
        Arc::new(AutoConfirm),
        Arc::new(notifier),
    );

    let outcome = coordinator
        .perform_action(2, ActionType::Approve)
        .await
        .expect("approval should succeed");
    assert!(matches!(
        outcome,
        ActionOutcome::Applied {
            status: Status::Approved,
            ..
        }
    ));
    assert_eq!(store.get(2).map(|r| r.status), Some(Status::Approved));

    let requests = server
        .received_requests()
        .await
        .expect("recording is enabled");
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].method.as_str(), "PUT");
    let notification: serde_json::Value =
        serde_json::from_slice(&requests[1].body).expect("notification is json");
    assert_eq!(notification["status"], "Ready To Claim");
    assert_eq!(notification["requestId"], 2);
    assert_eq!(notification["email"], "resident2@example.com");

    assert_eq!(
        notices.recv().await,
        Some(Notice::Succeeded {
            transaction_id: 2,
            action: ActionType::Approve
        })
    );
}

#[tokio::test]
async fn refused_completion_leaves_store_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(409).set_body_string("already claimed"))
        .expect(1)
        .mount(&server)
        .await;

    let store = TransactionStore::new();
    store.replace_all(vec![record(3, "Ready To Claim")]);
    let before = store.snapshot();
    let (notifier, mut notices) = ChannelNotifier::channel();
    let coordinator = ActionCoordinator::new(
        store.clone(),
        Arc::new(backend_for(&server)),
        Arc::new(OnlineFlag::default()),
        Arc::new(AutoConfirm),
        Arc::new(notifier),
    );

    let err = coordinator
        .perform_action(3, ActionType::Complete)
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::RequestFailed(_)));
    assert_eq!(store.snapshot(), before);
    assert!(matches!(
        notices.recv().await,
        Some(Notice::RequestFailed {
            transaction_id: 3,
            ..
        })
    ));
}

#[tokio::test]
async fn offline_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let store = TransactionStore::new();
    store.replace_all(vec![record(4, "Pending")]);
    let (notifier, _notices) = ChannelNotifier::channel();
    let coordinator = ActionCoordinator::new(
        store,
        Arc::new(backend_for(&server)),
        Arc::new(OnlineFlag::new(false)),
        Arc::new(AutoConfirm),
        Arc::new(notifier),
    );

    let err = coordinator
        .perform_action(4, ActionType::Approve)
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::Offline));
}
