//! Store failures surface as 500 with a correlation id only

mod common;

use std::sync::atomic::Ordering;

use auth::domain::entity::audit_event::AuditEventType;
use common::store::FaultyStore;
use common::{PASSWORD, TestApp, body_json, test_config};

/// The client sees an id; the audit log links it to the failure
#[tokio::test]
async fn internal_failure_exposes_only_correlation_id() {
    let store = FaultyStore::default();
    let fail_lookups = store.fail_lookups.clone();
    let app = TestApp::with_store(store, test_config());
    app.create_account("wendy", false).await;

    fail_lookups.store(true, Ordering::SeqCst);
    let response = app.login("wendy", PASSWORD).await;
    assert_eq!(response.status(), 500);

    let body = body_json(response).await;
    assert_eq!(body["error"], "Internal server error");
    let id = body["id"].as_str().unwrap().to_string();
    assert!(!body.to_string().contains("10.0.0.5"));

    let events = app.audit_events().await;
    let api_error = events
        .iter()
        .find(|e| e.event_type == AuditEventType::ApiError)
        .unwrap();
    assert_eq!(api_error.metadata["id"], id.as_str());
    assert_eq!(api_error.metadata["status"], 500);
    assert_eq!(api_error.path.as_deref(), Some("/auth/login"));

    fail_lookups.store(false, Ordering::SeqCst);
    assert_eq!(app.login("wendy", PASSWORD).await.status(), 200);
}
