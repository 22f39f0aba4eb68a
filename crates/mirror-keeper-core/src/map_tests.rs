//! Tests for remote-to-store field mapping.

use super::*;
use github_app_sdk::client::{IssueLabel, IssueUser, PullRequestRef, RepositoryOwner};

#[test]
fn test_repository_fields_uses_owner_login() {
    let remote = RemoteRepository {
        id: 100,
        node_id: Some("R_x".to_string()),
        name: "alpha".to_string(),
        full_name: "octo-org/alpha".to_string(),
        owner: Some(RepositoryOwner {
            login: "octo-org".to_string(),
            id: Some(9),
            owner_type: Some("Organization".to_string()),
        }),
        private: true,
        description: None,
        fork: false,
        archived: false,
        disabled: false,
        html_url: None,
        default_branch: Some("main".to_string()),
        language: Some("Rust".to_string()),
        topics: vec!["mirror".to_string()],
        pushed_at: None,
    };

    let fields = repository_fields(&remote);
    assert_eq!(fields.github_repo_id, 100);
    assert_eq!(fields.owner_login, "octo-org");
    assert_eq!(fields.owner_type.as_deref(), Some("Organization"));
    assert_eq!(fields.topics, vec!["mirror"]);
}

#[test]
fn test_repository_fields_falls_back_to_full_name_owner() {
    let remote = RemoteRepository {
        id: 100,
        node_id: None,
        name: "alpha".to_string(),
        full_name: "octo-org/alpha".to_string(),
        owner: None,
        private: false,
        description: None,
        fork: false,
        archived: false,
        disabled: false,
        html_url: None,
        default_branch: None,
        language: None,
        topics: vec![],
        pushed_at: None,
    };

    assert_eq!(repository_fields(&remote).owner_login, "octo-org");
}

#[test]
fn test_repository_fields_from_summary() {
    let summary = EventRepositorySummary {
        id: 100,
        node_id: Some("R_x".to_string()),
        name: "alpha".to_string(),
        full_name: "octo-org/alpha".to_string(),
        private: true,
    };

    let fields = repository_fields_from_summary(&summary);
    assert_eq!(fields.github_repo_id, 100);
    assert_eq!(fields.owner_login, "octo-org");
    assert!(fields.private);
    assert!(fields.default_branch.is_none());
}

#[test]
fn test_pull_request_fields_carries_refs_and_clock() {
    let updated = chrono::Utc::now();
    let remote = RemotePullRequest {
        id: 9001,
        number: 17,
        node_id: None,
        state: "open".to_string(),
        title: "A change".to_string(),
        body: Some("words".to_string()),
        user: Some(IssueUser {
            login: "marty".to_string(),
            id: Some(55),
        }),
        head: Some(PullRequestRef {
            branch_ref: "feature".to_string(),
            sha: "abc".to_string(),
        }),
        base: Some(PullRequestRef {
            branch_ref: "main".to_string(),
            sha: "def".to_string(),
        }),
        draft: Some(false),
        merged: None,
        mergeable: None,
        merged_by: None,
        merged_at: None,
        closed_at: None,
        updated_at: Some(updated),
        html_url: None,
    };

    let fields = pull_request_fields(&remote);
    assert_eq!(fields.github_pr_id, 9001);
    assert_eq!(fields.number, 17);
    assert_eq!(fields.head_ref.as_deref(), Some("feature"));
    assert_eq!(fields.base_sha.as_deref(), Some("def"));
    assert_eq!(fields.user_id, Some(55));
    assert_eq!(fields.github_updated_at, Some(updated));
}

#[test]
fn test_issue_fields_flattens_labels_and_assignees() {
    let remote = RemoteIssue {
        id: 7001,
        number: 3,
        node_id: None,
        state: "open".to_string(),
        title: "Broken".to_string(),
        body: None,
        user: None,
        labels: vec![
            IssueLabel {
                name: "bug".to_string(),
            },
            IssueLabel {
                name: "sync".to_string(),
            },
        ],
        assignees: vec![IssueUser {
            login: "fixer".to_string(),
            id: Some(9),
        }],
        milestone: None,
        locked: false,
        comments: Some(2),
        closed_at: None,
        updated_at: None,
        html_url: None,
        pull_request: None,
    };

    let fields = issue_fields(&remote);
    assert_eq!(fields.labels, vec!["bug", "sync"]);
    assert_eq!(fields.assignees, vec!["fixer"]);
    assert_eq!(fields.comments_count, Some(2));
    assert_eq!(fields.locked, Some(false));
}
