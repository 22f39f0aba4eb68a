//! Mapping from remote-shaped records to store field structs.
//!
//! Webhook sub-trees and reconciliation API responses share these shapes,
//! so both update paths go through the same conversions before hitting the
//! upsert layer.

use github_app_sdk::client::{InstallationInfo, RemoteIssue, RemotePullRequest, RemoteRepository};
use mirror_keeper_store::{InstallationFields, IssueFields, PullRequestFields, RepositoryFields};

use crate::events::{EventInstallation, EventRepositorySummary};

/// Installation sub-tree of a webhook → installation fields.
pub fn installation_fields(event: &EventInstallation) -> InstallationFields {
    InstallationFields {
        installation_id: event.id,
        account_login: event
            .account
            .as_ref()
            .map(|a| a.login.clone())
            .unwrap_or_default(),
        account_type: event.account.as_ref().and_then(|a| a.account_type.clone()),
        account_id: event.account.as_ref().and_then(|a| a.id),
        target_type: event.target_type.clone(),
        repository_selection: event.repository_selection.clone(),
        app_id: event.app_id,
        app_slug: event.app_slug.clone(),
        permissions: serde_json::Value::Object(event.permissions.clone()),
        events: event.events.clone(),
        suspended_at: event.suspended_at,
    }
}

/// Installation REST response → installation fields.
pub fn installation_fields_from_api(info: &InstallationInfo) -> InstallationFields {
    InstallationFields {
        installation_id: info.id as i64,
        account_login: info.account.login.clone(),
        account_type: info.account.account_type.clone(),
        account_id: info.account.id.map(|id| id as i64),
        target_type: info.target_type.clone(),
        repository_selection: info.repository_selection.clone(),
        app_id: info.app_id.map(|id| id as i64),
        app_slug: info.app_slug.clone(),
        permissions: serde_json::Value::Object(info.permissions.clone()),
        events: info.events.clone(),
        suspended_at: info.suspended_at,
    }
}

/// Full repository payload → repository fields.
pub fn repository_fields(remote: &RemoteRepository) -> RepositoryFields {
    let owner_login = remote
        .owner
        .as_ref()
        .map(|o| o.login.clone())
        .unwrap_or_else(|| {
            remote
                .full_name
                .split('/')
                .next()
                .unwrap_or_default()
                .to_string()
        });

    RepositoryFields {
        github_repo_id: remote.id as i64,
        node_id: remote.node_id.clone(),
        name: remote.name.clone(),
        full_name: remote.full_name.clone(),
        owner_login,
        owner_type: remote.owner.as_ref().and_then(|o| o.owner_type.clone()),
        private: remote.private,
        description: remote.description.clone(),
        fork: remote.fork,
        archived: remote.archived,
        disabled: remote.disabled,
        html_url: remote.html_url.clone(),
        default_branch: remote.default_branch.clone(),
        language: remote.language.clone(),
        topics: remote.topics.clone(),
        pushed_at: remote.pushed_at,
    }
}

/// Abbreviated repository entry (installation events) → repository fields.
///
/// The owner login is derived from the full name; richer metadata arrives
/// later via repository events or reconciliation.
pub fn repository_fields_from_summary(summary: &EventRepositorySummary) -> RepositoryFields {
    RepositoryFields {
        github_repo_id: summary.id,
        node_id: summary.node_id.clone(),
        name: summary.name.clone(),
        full_name: summary.full_name.clone(),
        owner_login: summary
            .full_name
            .split('/')
            .next()
            .unwrap_or_default()
            .to_string(),
        private: summary.private,
        ..RepositoryFields::default()
    }
}

/// Pull request payload → pull request fields.
pub fn pull_request_fields(remote: &RemotePullRequest) -> PullRequestFields {
    PullRequestFields {
        github_pr_id: remote.id as i64,
        number: remote.number,
        node_id: remote.node_id.clone(),
        state: Some(remote.state.clone()),
        title: remote.title.clone(),
        body: remote.body.clone(),
        user_login: remote.user.as_ref().map(|u| u.login.clone()),
        user_id: remote.user.as_ref().and_then(|u| u.id).map(|id| id as i64),
        head_ref: remote.head.as_ref().map(|h| h.branch_ref.clone()),
        head_sha: remote.head.as_ref().map(|h| h.sha.clone()),
        base_ref: remote.base.as_ref().map(|b| b.branch_ref.clone()),
        base_sha: remote.base.as_ref().map(|b| b.sha.clone()),
        draft: remote.draft,
        merged: remote.merged,
        mergeable: remote.mergeable,
        merged_by: remote.merged_by.as_ref().map(|u| u.login.clone()),
        merged_at: remote.merged_at,
        closed_at: remote.closed_at,
        html_url: remote.html_url.clone(),
        github_updated_at: remote.updated_at,
    }
}

/// Issue payload → issue fields. Labels and assignees flatten to their
/// names; the full objects are not mirrored.
pub fn issue_fields(remote: &RemoteIssue) -> IssueFields {
    IssueFields {
        github_issue_id: remote.id as i64,
        number: remote.number,
        node_id: remote.node_id.clone(),
        state: Some(remote.state.clone()),
        title: remote.title.clone(),
        body: remote.body.clone(),
        user_login: remote.user.as_ref().map(|u| u.login.clone()),
        user_id: remote.user.as_ref().and_then(|u| u.id).map(|id| id as i64),
        labels: remote.labels.iter().map(|l| l.name.clone()).collect(),
        assignees: remote.assignees.iter().map(|a| a.login.clone()).collect(),
        milestone: remote.milestone.as_ref().map(|m| m.title.clone()),
        locked: Some(remote.locked),
        comments_count: remote.comments,
        closed_at: remote.closed_at,
        html_url: remote.html_url.clone(),
        github_updated_at: remote.updated_at,
    }
}

#[cfg(test)]
#[path = "map_tests.rs"]
mod tests;
