//! Tests for the HTTP surface.

use super::*;
use axum::body::Body;
use axum::http::Request;
use github_app_sdk::auth::{CredentialConfig, CredentialProvider};
use github_app_sdk::client::{ClientConfig, GitHubClient};
use github_app_sdk::webhook::compute_signature_header;
use mirror_keeper_core::Notifier;
use mirror_keeper_store::MirrorStore;
use tower::ServiceExt;

const SECRET: &str = "whsec_test";
const ADMIN_TOKEN: &str = "admin-token";

async fn test_router(webhook_secret: Option<&str>, admin_token: Option<&str>) -> (Router, MirrorStore) {
    let store = MirrorStore::in_memory().await.unwrap();

    let dispatcher = EventDispatcher::new(store.clone(), Notifier::disabled());
    let credentials = Arc::new(
        CredentialProvider::new(CredentialConfig::default()).expect("provider construction"),
    );
    let client = GitHubClient::new(ClientConfig::default()).expect("client construction");
    let engine = Arc::new(ReconciliationEngine::new(
        store.clone(),
        credentials,
        client,
    ));

    let state = AppState::new(
        dispatcher,
        engine,
        webhook_secret.map(String::from),
        admin_token.map(String::from),
    );
    (create_router(state), store)
}

fn webhook_request(event_type: &str, body: &str, signature: Option<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhooks/github")
        .header("content-type", "application/json")
        .header("x-github-event", event_type)
        .header("x-github-delivery", "test-delivery-1");
    if let Some(signature) = signature {
        builder = builder.header("x-hub-signature-256", signature);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_endpoints() {
    let (router, _) = test_router(None, None).await;

    for uri in ["/health", "/webhooks/github/health"] {
        let response = router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }
}

#[tokio::test]
async fn test_webhook_missing_event_header_is_bad_request() {
    let (router, _) = test_router(Some(SECRET), None).await;

    let request = Request::builder()
        .method("POST")
        .uri("/webhooks/github")
        .body(Body::from("{}"))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_webhook_invalid_signature_is_unauthorized() {
    let (router, store) = test_router(Some(SECRET), None).await;

    let body = r#"{"zen":"x"}"#;
    let response = router
        .oneshot(webhook_request(
            "ping",
            body,
            Some("sha256=0000000000000000000000000000000000000000000000000000000000000000".into()),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "invalid signature");

    // Rejected deliveries have no side effects, not even a log row.
    assert!(store
        .find_delivery_by_remote_id("test-delivery-1")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_webhook_valid_signature_is_accepted() {
    let (router, store) = test_router(Some(SECRET), None).await;

    let body = r#"{"zen":"x"}"#;
    let signature = compute_signature_header(SECRET, body.as_bytes());

    let response = router
        .oneshot(webhook_request("ping", body, Some(signature)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "success");

    let log = store
        .find_delivery_by_remote_id("test-delivery-1")
        .await
        .unwrap()
        .unwrap();
    assert!(log.processed);
}

#[tokio::test]
async fn test_unknown_event_type_returns_success_and_logs() {
    let (router, store) = test_router(Some(SECRET), None).await;

    let body = r#"{"future": "payload"}"#;
    let signature = compute_signature_header(SECRET, body.as_bytes());

    let response = router
        .oneshot(webhook_request("unknown_future_event", body, Some(signature)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let log = store
        .find_delivery_by_remote_id("test-delivery-1")
        .await
        .unwrap()
        .unwrap();
    assert!(log.processed);
    assert_eq!(log.event_type, "unknown_future_event");
}

#[tokio::test]
async fn test_webhook_processing_failure_is_internal_error() {
    let (router, store) = test_router(Some(SECRET), None).await;

    // Pull request event for a repository that is not mirrored.
    let body = serde_json::json!({
        "action": "opened",
        "number": 1,
        "pull_request": {"id": 1, "number": 1, "state": "open", "title": "x"},
        "repository": {"id": 999, "name": "ghost", "full_name": "octo/ghost"},
    })
    .to_string();
    let signature = compute_signature_header(SECRET, body.as_bytes());

    let response = router
        .oneshot(webhook_request("pull_request", &body, Some(signature)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let log = store
        .find_delivery_by_remote_id("test-delivery-1")
        .await
        .unwrap()
        .unwrap();
    assert!(!log.processed);
    assert!(log.error_message.is_some());
}

#[tokio::test]
async fn test_webhook_without_secret_runs_in_bypass_mode() {
    let (router, _) = test_router(None, None).await;

    // No signature at all, still accepted: explicit insecure dev mode.
    let response = router
        .oneshot(webhook_request("ping", r#"{"zen":"x"}"#, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_admin_routes_require_bearer_token() {
    let (router, _) = test_router(None, Some(ADMIN_TOKEN)).await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/sync/full?installation_id=42")
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .method("POST")
        .uri("/api/sync/full?installation_id=42")
        .header("authorization", "Bearer wrong-token")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_sync_full_returns_summary_even_on_failure() {
    let (router, _) = test_router(None, Some(ADMIN_TOKEN)).await;

    // Unknown installation: the global failure still arrives as a summary.
    let request = Request::builder()
        .method("POST")
        .uri("/api/sync/full?installation_id=404")
        .header("authorization", format!("Bearer {ADMIN_TOKEN}"))
        .body(Body::empty())
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let summary = body_json(response).await;
    assert_eq!(summary["success"], false);
    assert_eq!(summary["installationId"], 404);
    assert!(summary["errors"]["GLOBAL"]
        .as_str()
        .unwrap()
        .contains("not found"));
}

#[tokio::test]
async fn test_replay_linkage_endpoint() {
    let (router, _) = test_router(None, Some(ADMIN_TOKEN)).await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/sync/replay-linkage")
        .header("authorization", format!("Bearer {ADMIN_TOKEN}"))
        .body(Body::empty())
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "no_data");
}
