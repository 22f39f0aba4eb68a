//! Tests for CLI parsing and request execution.

use super::*;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[test]
fn test_parse_sync_full() {
    let cli = Cli::try_parse_from([
        "mirror-keeper",
        "--service-url",
        "http://example.com",
        "sync-full",
        "--installation-id",
        "42",
    ])
    .unwrap();

    assert_eq!(cli.service_url, "http://example.com");
    assert_eq!(
        cli.command.request_path(),
        "/api/sync/full?installation_id=42"
    );
}

#[test]
fn test_parse_replay_linkage_scoped_and_unscoped() {
    let cli = Cli::try_parse_from(["mirror-keeper", "replay-linkage"]).unwrap();
    assert_eq!(cli.command.request_path(), "/api/sync/replay-linkage");

    let cli = Cli::try_parse_from([
        "mirror-keeper",
        "replay-linkage",
        "--installation-id",
        "42",
    ])
    .unwrap();
    assert_eq!(
        cli.command.request_path(),
        "/api/sync/replay-linkage?installation_id=42"
    );
}

#[test]
fn test_missing_installation_id_is_a_parse_error() {
    assert!(Cli::try_parse_from(["mirror-keeper", "sync-full"]).is_err());
}

#[tokio::test]
async fn test_run_sends_bearer_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/sync/full"))
        .and(query_param("installation_id", "42"))
        .and(header("Authorization", "Bearer secret-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "installationId": 42,
            "success": true,
            "errors": {}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cli = Cli {
        service_url: server.uri(),
        admin_token: Some("secret-token".to_string()),
        command: Command::SyncFull {
            installation_id: 42,
        },
    };

    run(cli).await.expect("successful sync should succeed");
}

#[tokio::test]
async fn test_run_fails_on_unsuccessful_summary() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/sync/full"))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
            "installationId": 42,
            "success": false,
            "errors": {"GLOBAL": "installation 42 not found"}
        })))
        .mount(&server)
        .await;

    let cli = Cli {
        service_url: server.uri(),
        admin_token: None,
        command: Command::SyncFull {
            installation_id: 42,
        },
    };

    assert!(run(cli).await.is_err());
}
