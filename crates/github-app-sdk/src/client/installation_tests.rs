//! Tests for installation operations.

use super::*;
use crate::auth::GitHubAppId;
use crate::client::{ClientConfig, RetryPolicy};
use chrono::{Duration, Utc};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(base_url: &str) -> GitHubClient {
    GitHubClient::new(
        ClientConfig::default()
            .with_api_base_url(base_url.to_string())
            .with_retry(RetryPolicy::none()),
    )
    .expect("client construction failed")
}

fn test_assertion() -> AppAssertion {
    AppAssertion::new(
        "jwt.token.value".to_string(),
        GitHubAppId::new(1),
        Utc::now() + Duration::minutes(10),
    )
}

fn test_token() -> InstallationToken {
    InstallationToken::new(
        "ghs_test".to_string(),
        InstallationId::new(1),
        Utc::now() + Duration::hours(1),
    )
}

#[tokio::test]
async fn test_get_installation_parses_metadata() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/app/installations/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": 42,
            "account": {"login": "octo-org", "id": 9, "type": "Organization"},
            "target_type": "Organization",
            "repository_selection": "selected",
            "app_id": 12345,
            "app_slug": "mirror-keeper",
            "permissions": {"issues": "read", "pull_requests": "read"},
            "events": ["push", "pull_request"],
            "suspended_at": null,
            "some_future_field": {"ignored": true}
        })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let installation = client
        .get_installation(&test_assertion(), InstallationId::new(42))
        .await
        .expect("request should succeed");

    assert_eq!(installation.id, 42);
    assert_eq!(installation.account.login, "octo-org");
    assert_eq!(
        installation.account.account_type.as_deref(),
        Some("Organization")
    );
    assert_eq!(installation.repository_selection.as_deref(), Some("selected"));
    assert_eq!(installation.events, vec!["push", "pull_request"]);
    assert!(installation.suspended_at.is_none());
    assert_eq!(installation.permissions.len(), 2);
}

#[tokio::test]
async fn test_list_installation_repositories_unwraps_envelope() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/installation/repositories"))
        .and(query_param("per_page", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "total_count": 2,
            "repositories": [
                {
                    "id": 100,
                    "name": "alpha",
                    "full_name": "octo-org/alpha",
                    "owner": {"login": "octo-org", "id": 9, "type": "Organization"},
                    "private": true,
                    "default_branch": "main",
                    "topics": ["rust", "mirror"]
                },
                {
                    "id": 101,
                    "name": "beta",
                    "full_name": "octo-org/beta"
                }
            ]
        })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let repos = client
        .list_installation_repositories(&test_token())
        .await
        .expect("request should succeed");

    assert_eq!(repos.len(), 2);
    assert_eq!(repos[0].id, 100);
    assert_eq!(repos[0].full_name, "octo-org/alpha");
    assert!(repos[0].private);
    assert_eq!(repos[0].topics, vec!["rust", "mirror"]);

    // Minimal record: optional fields default instead of failing the decode.
    assert_eq!(repos[1].name, "beta");
    assert!(!repos[1].private);
    assert!(repos[1].owner.is_none());
}

#[tokio::test]
async fn test_missing_repositories_key_yields_empty_list() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/installation/repositories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "total_count": 0
        })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let repos = client
        .list_installation_repositories(&test_token())
        .await
        .expect("request should succeed");

    assert!(repos.is_empty());
}
