//! Tests for pull request persistence.

use super::*;
use crate::{MirrorStore, RepositoryFields};

async fn repo(store: &MirrorStore) -> Uuid {
    let (record, _) = store
        .upsert_repository(
            None,
            RepositoryFields {
                github_repo_id: 100,
                name: "alpha".to_string(),
                full_name: "octo-org/alpha".to_string(),
                owner_login: "octo-org".to_string(),
                ..RepositoryFields::default()
            },
        )
        .await
        .unwrap();
    record.id
}

fn pr(number: i64, title: &str, updated: Option<DateTime<Utc>>) -> PullRequestFields {
    PullRequestFields {
        github_pr_id: 9000 + number,
        number,
        state: Some("open".to_string()),
        title: title.to_string(),
        user_login: Some("marty".to_string()),
        head_ref: Some("feature".to_string()),
        head_sha: Some("abc".to_string()),
        base_ref: Some("main".to_string()),
        github_updated_at: updated,
        ..PullRequestFields::default()
    }
}

#[tokio::test]
async fn test_upsert_is_idempotent_by_number() {
    let store = MirrorStore::in_memory().await.unwrap();
    let repo_id = repo(&store).await;

    let (first, created) = store.upsert_pull_request(repo_id, pr(1, "one", None)).await.unwrap();
    assert!(created);

    let (second, created) = store.upsert_pull_request(repo_id, pr(1, "one v2", None)).await.unwrap();
    assert!(!created);
    assert_eq!(second.id, first.id);
    assert_eq!(second.title, "one v2");
}

#[tokio::test]
async fn test_stale_payload_is_ignored_but_updated_at_advances() {
    let store = MirrorStore::in_memory().await.unwrap();
    let repo_id = repo(&store).await;

    let newer = Utc::now();
    let older = newer - chrono::Duration::hours(2);

    let (fresh, _) = store
        .upsert_pull_request(repo_id, pr(1, "fresh title", Some(newer)))
        .await
        .unwrap();

    // A delayed reconciliation pass delivers an older snapshot.
    let (after, created) = store
        .upsert_pull_request(repo_id, pr(1, "stale title", Some(older)))
        .await
        .unwrap();

    assert!(!created);
    assert_eq!(after.title, "fresh title", "stale fields must not overwrite");
    assert_eq!(after.github_updated_at, Some(fresh.github_updated_at.unwrap()));
    assert!(after.updated_at >= fresh.updated_at);
}

#[tokio::test]
async fn test_payload_without_remote_clock_wins_last_write() {
    let store = MirrorStore::in_memory().await.unwrap();
    let repo_id = repo(&store).await;

    store
        .upsert_pull_request(repo_id, pr(1, "first", Some(Utc::now())))
        .await
        .unwrap();

    // No remote clock on the incoming record: guard cannot apply,
    // last write wins.
    let (after, _) = store
        .upsert_pull_request(repo_id, pr(1, "clockless", None))
        .await
        .unwrap();
    assert_eq!(after.title, "clockless");
}

#[tokio::test]
async fn test_merge_metadata_roundtrip() {
    let store = MirrorStore::in_memory().await.unwrap();
    let repo_id = repo(&store).await;

    let merged_at = Utc::now();
    let mut fields = pr(2, "merge me", None);
    fields.state = Some("closed".to_string());
    fields.merged = Some(true);
    fields.merged_by = Some("doc".to_string());
    fields.merged_at = Some(merged_at);
    fields.closed_at = Some(merged_at);

    let (record, _) = store.upsert_pull_request(repo_id, fields).await.unwrap();
    assert_eq!(record.merged, Some(true));
    assert_eq!(record.merged_by.as_deref(), Some("doc"));
    assert!(record.merged_at.is_some());
}
