//! Tests for client request handling, status classification and retry.

use super::*;
use crate::auth::{InstallationId, InstallationToken};
use chrono::{Duration as ChronoDuration, Utc};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(base_url: &str, retry: RetryPolicy) -> GitHubClient {
    GitHubClient::new(
        ClientConfig::default()
            .with_api_base_url(base_url.to_string())
            .with_retry(retry),
    )
    .expect("client construction failed")
}

fn test_token() -> InstallationToken {
    InstallationToken::new(
        "ghs_test".to_string(),
        InstallationId::new(1),
        Utc::now() + ChronoDuration::hours(1),
    )
}

#[tokio::test]
async fn test_required_github_headers_are_sent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/demo/branches"))
        .and(header("Accept", "application/vnd.github+json"))
        .and(header("X-GitHub-Api-Version", API_VERSION))
        .and(header("Authorization", "Bearer ghs_test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), RetryPolicy::none());
    let branches = client
        .list_branches(&test_token(), "octo/demo")
        .await
        .expect("request should succeed");

    assert!(branches.is_empty());
}

#[tokio::test]
async fn test_server_error_is_retried_until_success() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/demo/branches"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/demo/branches"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"name": "main", "commit": {"sha": "abc"}, "protected": true}
        ])))
        .mount(&server)
        .await;

    let retry = RetryPolicy {
        max_retries: 3,
        initial_delay: std::time::Duration::from_millis(1),
        max_delay: std::time::Duration::from_millis(5),
        backoff_multiplier: 2.0,
        use_jitter: false,
    };

    let client = test_client(&server.uri(), retry);
    let branches = client
        .list_branches(&test_token(), "octo/demo")
        .await
        .expect("retries should recover");

    assert_eq!(branches.len(), 1);
    assert_eq!(branches[0].name, "main");
    assert!(branches[0].protected);
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/demo/branches"))
        .respond_with(ResponseTemplate::new(422).set_body_string("nope"))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(
        &server.uri(),
        RetryPolicy {
            max_retries: 3,
            initial_delay: std::time::Duration::from_millis(1),
            max_delay: std::time::Duration::from_millis(5),
            backoff_multiplier: 2.0,
            use_jitter: false,
        },
    );

    let err = client
        .list_branches(&test_token(), "octo/demo")
        .await
        .unwrap_err();

    match err {
        ApiError::HttpError { status, .. } => assert_eq!(status, 422),
        other => panic!("expected HttpError, got {other:?}"),
    }
}

#[tokio::test]
async fn test_rate_limit_is_classified_as_retryable() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/demo/branches"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "1"))
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), RetryPolicy::none());
    let err = client
        .list_branches(&test_token(), "octo/demo")
        .await
        .unwrap_err();

    match err {
        ApiError::RateLimited { retry_after_secs } => {
            assert_eq!(retry_after_secs, Some(1));
            assert!(err_is_transient(&ApiError::RateLimited { retry_after_secs }));
        }
        other => panic!("expected RateLimited, got {other:?}"),
    }
}

#[tokio::test]
async fn test_secondary_rate_limit_403_is_rate_limited() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/demo/branches"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("x-ratelimit-remaining", "0")
                .set_body_string("secondary rate limit"),
        )
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), RetryPolicy::none());
    let err = client
        .list_branches(&test_token(), "octo/demo")
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::RateLimited { .. }));
}

#[tokio::test]
async fn test_plain_403_is_terminal() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/demo/branches"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("x-ratelimit-remaining", "4999")
                .set_body_string("forbidden"),
        )
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), RetryPolicy::none());
    let err = client
        .list_branches(&test_token(), "octo/demo")
        .await
        .unwrap_err();

    match err {
        ApiError::HttpError { status, .. } => assert_eq!(status, 403),
        other => panic!("expected HttpError, got {other:?}"),
    }
}

#[tokio::test]
async fn test_404_maps_to_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/gone/branches"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), RetryPolicy::none());
    let err = client
        .list_branches(&test_token(), "octo/gone")
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::NotFound));
}

fn err_is_transient(e: &ApiError) -> bool {
    e.is_transient()
}
