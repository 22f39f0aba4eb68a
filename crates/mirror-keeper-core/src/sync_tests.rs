//! Tests for the reconciliation engine.

use super::*;
use github_app_sdk::auth::CredentialConfig;
use github_app_sdk::client::{ClientConfig, RetryPolicy};
use mirror_keeper_store::{InstallationFields, RepositoryFields};
use rsa::pkcs8::EncodePrivateKey;
use rsa::RsaPrivateKey;
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_private_key_pem() -> String {
    let mut rng = rand::thread_rng();
    let key = RsaPrivateKey::new(&mut rng, 2048).expect("failed to generate RSA key");
    key.to_pkcs8_pem(rsa::pkcs8::LineEnding::LF)
        .expect("failed to encode key")
        .to_string()
}

fn engine(server_uri: &str, store: MirrorStore) -> ReconciliationEngine {
    let credentials = Arc::new(
        CredentialProvider::new(CredentialConfig {
            app_id: Some(1),
            private_key_pem: Some(test_private_key_pem()),
            api_base_url: server_uri.to_string(),
            ..CredentialConfig::default()
        })
        .expect("provider construction failed"),
    );
    let client = GitHubClient::new(
        ClientConfig::default()
            .with_api_base_url(server_uri.to_string())
            .with_retry(RetryPolicy::none()),
    )
    .expect("client construction failed");
    ReconciliationEngine::new(store, credentials, client)
}

fn unconfigured_engine(server_uri: &str, store: MirrorStore) -> ReconciliationEngine {
    let credentials = Arc::new(
        CredentialProvider::new(CredentialConfig {
            api_base_url: server_uri.to_string(),
            ..CredentialConfig::default()
        })
        .expect("provider construction failed"),
    );
    let client = GitHubClient::new(
        ClientConfig::default()
            .with_api_base_url(server_uri.to_string())
            .with_retry(RetryPolicy::none()),
    )
    .expect("client construction failed");
    ReconciliationEngine::new(store, credentials, client)
}

async fn mount_token_endpoint(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path_regex(r"^/app/installations/\d+/access_tokens$"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "token": "ghs_sync_test",
            "expires_at": (Utc::now() + chrono::Duration::hours(1)).to_rfc3339(),
        })))
        .mount(server)
        .await;
}

/// Empty listings for one repository so a section under test can be mocked
/// separately.
async fn mount_empty_listings(server: &MockServer, full_name: &str) {
    for endpoint in ["pulls", "issues", "branches"] {
        Mock::given(method("GET"))
            .and(path(format!("/repos/{full_name}/{endpoint}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(server)
            .await;
    }
}

async fn seed_installation(store: &MirrorStore) -> uuid::Uuid {
    let (record, _) = store
        .upsert_installation(InstallationFields {
            installation_id: 42,
            account_login: "octo-org".to_string(),
            account_type: Some("Organization".to_string()),
            account_id: Some(9),
            target_type: None,
            repository_selection: None,
            app_id: None,
            app_slug: None,
            permissions: serde_json::json!({}),
            events: vec![],
            suspended_at: None,
        })
        .await
        .unwrap();
    record.id
}

async fn seed_repository(
    store: &MirrorStore,
    installation: uuid::Uuid,
    github_id: i64,
    full_name: &str,
) -> RepositoryRecord {
    let (record, _) = store
        .upsert_repository(
            Some(installation),
            RepositoryFields {
                github_repo_id: github_id,
                name: full_name.split('/').next_back().unwrap().to_string(),
                full_name: full_name.to_string(),
                owner_login: "octo-org".to_string(),
                ..RepositoryFields::default()
            },
        )
        .await
        .unwrap();
    record
}

// ============================================================================
// Top-level failures
// ============================================================================

#[tokio::test]
async fn test_unknown_installation_aborts_with_global_error() {
    let server = MockServer::start().await;
    let store = MirrorStore::in_memory().await.unwrap();
    let engine = engine(&server.uri(), store);

    let summary = engine.sync_full(404).await;

    assert!(!summary.success);
    assert_eq!(summary.errors.len(), 1);
    assert!(summary.errors["GLOBAL"].contains("not found"));
    assert!(summary.finished_at.is_some());
}

#[tokio::test]
async fn test_missing_credentials_abort_with_global_error() {
    let server = MockServer::start().await;
    let store = MirrorStore::in_memory().await.unwrap();
    seed_installation(&store).await;
    let engine = unconfigured_engine(&server.uri(), store);

    let summary = engine.sync_full(42).await;

    assert!(!summary.success);
    assert!(summary.errors.contains_key("GLOBAL"));
    assert!(summary.errors["GLOBAL"].contains("credentials"));
}

#[tokio::test]
async fn test_sync_full_refreshes_installation_metadata() {
    let server = MockServer::start().await;
    let store = MirrorStore::in_memory().await.unwrap();
    seed_installation(&store).await;

    mount_token_endpoint(&server).await;
    Mock::given(method("GET"))
        .and(path("/app/installations/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": 42,
            "account": {"login": "renamed-org", "id": 9, "type": "Organization"},
            "suspended_at": null
        })))
        .mount(&server)
        .await;

    let engine = engine(&server.uri(), store.clone());
    let summary = engine.sync_full(42).await;

    assert!(summary.success);
    let refreshed = store.find_installation(42).await.unwrap().unwrap();
    assert_eq!(refreshed.account_login, "renamed-org");
}

// ============================================================================
// Partial failure isolation
// ============================================================================

#[tokio::test]
async fn test_one_failing_repository_does_not_abort_the_run() {
    let server = MockServer::start().await;
    let store = MirrorStore::in_memory().await.unwrap();
    let installation = seed_installation(&store).await;
    seed_repository(&store, installation, 100, "octo-org/a").await;
    seed_repository(&store, installation, 101, "octo-org/b").await;
    seed_repository(&store, installation, 102, "octo-org/c").await;

    mount_token_endpoint(&server).await;
    mount_empty_listings(&server, "octo-org/a").await;
    mount_empty_listings(&server, "octo-org/c").await;

    // B's pull listing blows up; its other sections are fine.
    Mock::given(method("GET"))
        .and(path("/repos/octo-org/b/pulls"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;
    for endpoint in ["issues", "branches"] {
        Mock::given(method("GET"))
            .and(path(format!("/repos/octo-org/b/{endpoint}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;
    }

    let engine = engine(&server.uri(), store);
    let summary = engine.sync_full(42).await;

    assert!(summary.success, "per-repo failure must not fail the run");
    assert_eq!(summary.errors.len(), 1, "exactly one error entry for B");
    assert!(summary.errors.contains_key("octo-org/b (PRs)"));
}

// ============================================================================
// Partition handling
// ============================================================================

#[tokio::test]
async fn test_closed_partition_is_filtered_by_last_sync_point() {
    let server = MockServer::start().await;
    let store = MirrorStore::in_memory().await.unwrap();
    let installation = seed_installation(&store).await;
    let repo = seed_repository(&store, installation, 100, "octo-org/a").await;

    mount_token_endpoint(&server).await;

    Mock::given(method("GET"))
        .and(path("/repos/octo-org/a/pulls"))
        .and(query_param("state", "open"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    let fresh = (Utc::now() + chrono::Duration::hours(1)).to_rfc3339();
    let stale = "2020-01-01T00:00:00Z";
    Mock::given(method("GET"))
        .and(path("/repos/octo-org/a/pulls"))
        .and(query_param("state", "closed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"id": 1, "number": 1, "state": "closed", "title": "stale", "updated_at": stale},
            {"id": 2, "number": 2, "state": "closed", "title": "fresh", "updated_at": fresh},
        ])))
        .mount(&server)
        .await;

    for endpoint in ["issues", "branches"] {
        Mock::given(method("GET"))
            .and(path(format!("/repos/octo-org/a/{endpoint}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;
    }

    let engine = engine(&server.uri(), store.clone());
    let summary = engine.sync_full(42).await;

    assert!(summary.success);
    assert_eq!(summary.pull_requests_synced, 1);
    assert!(store.find_pull_request(repo.id, 2).await.unwrap().is_some());
    assert!(
        store.find_pull_request(repo.id, 1).await.unwrap().is_none(),
        "closed record older than the sync point must be skipped"
    );
}

#[tokio::test]
async fn test_issue_listing_filters_embedded_pull_requests() {
    let server = MockServer::start().await;
    let store = MirrorStore::in_memory().await.unwrap();
    let installation = seed_installation(&store).await;
    let repo = seed_repository(&store, installation, 100, "octo-org/a").await;

    mount_token_endpoint(&server).await;

    Mock::given(method("GET"))
        .and(path("/repos/octo-org/a/pulls"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octo-org/a/branches"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/repos/octo-org/a/issues"))
        .and(query_param("state", "open"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"id": 1, "number": 1, "state": "open", "title": "real issue"},
            {
                "id": 2, "number": 2, "state": "open", "title": "pr in disguise",
                "pull_request": {"url": "https://api.github.com/repos/octo-org/a/pulls/2"}
            },
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octo-org/a/issues"))
        .and(query_param("state", "closed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    let engine = engine(&server.uri(), store.clone());
    let summary = engine.sync_full(42).await;

    assert!(summary.success);
    assert_eq!(summary.issues_synced, 1);
    assert!(store.find_issue(repo.id, 1).await.unwrap().is_some());
    assert!(store.find_issue(repo.id, 2).await.unwrap().is_none());
}

// ============================================================================
// Branch and commit reconciliation
// ============================================================================

#[tokio::test]
async fn test_branch_sync_backfills_head_commit_detail() {
    let server = MockServer::start().await;
    let store = MirrorStore::in_memory().await.unwrap();
    let installation = seed_installation(&store).await;
    let repo = seed_repository(&store, installation, 100, "octo-org/a").await;

    mount_token_endpoint(&server).await;

    for endpoint in ["pulls", "issues"] {
        Mock::given(method("GET"))
            .and(path(format!("/repos/octo-org/a/{endpoint}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path("/repos/octo-org/a/branches"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"name": "main", "commit": {"sha": "abc123"}, "protected": true}
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/repos/octo-org/a/commits/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "sha": "abc123",
            "commit": {
                "message": "head commit",
                "author": {"name": "Ada", "email": "ada@example.com", "date": "2024-02-01T08:00:00Z"},
                "verification": {"verified": true}
            },
            "author": {"login": "ada"},
            "stats": {"additions": 10, "deletions": 2, "total": 12},
            "files": [{"filename": "src/lib.rs", "status": "modified", "additions": 10, "deletions": 2}],
            "parents": [{"sha": "parent1"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine(&server.uri(), store.clone());
    let summary = engine.sync_full(42).await;

    assert!(summary.success, "errors: {:?}", summary.errors);
    assert_eq!(summary.branches_synced, 1);
    assert_eq!(summary.commits_synced, 1);

    let branch = store.find_branch(repo.id, "main").await.unwrap().unwrap();
    assert_eq!(branch.sha, "abc123");
    assert!(branch.protected);
    assert_eq!(branch.commit_message.as_deref(), Some("head commit"));

    let commit = store.find_commit(repo.id, "abc123").await.unwrap().unwrap();
    assert_eq!(commit.additions, Some(10));
    assert_eq!(commit.parent_shas, vec!["parent1"]);
    assert!(commit.verified);

    // A second run sees an unchanged head and skips the detail fetch
    // (the mock's expect(1) enforces it).
    let summary = engine.sync_full(42).await;
    assert!(summary.success);
    assert_eq!(summary.branches_synced, 0);
}

// ============================================================================
// Initial repository sync
// ============================================================================

#[tokio::test]
async fn test_sync_repositories_mirrors_installation_listing() {
    let server = MockServer::start().await;
    let store = MirrorStore::in_memory().await.unwrap();
    let installation = seed_installation(&store).await;

    mount_token_endpoint(&server).await;

    Mock::given(method("GET"))
        .and(path("/installation/repositories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "total_count": 2,
            "repositories": [
                {"id": 100, "name": "alpha", "full_name": "octo-org/alpha",
                 "owner": {"login": "octo-org", "type": "Organization"}, "private": true},
                {"id": 101, "name": "beta", "full_name": "octo-org/beta"}
            ]
        })))
        .mount(&server)
        .await;

    let engine = engine(&server.uri(), store.clone());
    let summary = engine.sync_repositories(42).await;

    assert!(summary.success);
    assert_eq!(summary.repositories_synced, 2);
    assert_eq!(summary.repositories_created, 2);

    let linked = store
        .list_repositories_for_installation(installation)
        .await
        .unwrap();
    assert_eq!(linked.len(), 2);

    // Second run updates instead of creating.
    let summary = engine.sync_repositories(42).await;
    assert_eq!(summary.repositories_created, 0);
    assert_eq!(summary.repositories_updated, 2);
}
