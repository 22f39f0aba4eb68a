//! Typed webhook event envelopes.
//!
//! One struct per event type instead of string-path tree walking; serde's
//! default behavior of ignoring unknown fields keeps forward compatibility
//! with upstream schema additions. Sub-objects that GitHub shapes
//! identically in webhooks and REST responses (repository, pull request,
//! issue) reuse the SDK's response types.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use github_app_sdk::client::{RemoteIssue, RemotePullRequest, RemoteRepository};

/// Account sub-object (installation target, event sender).
#[derive(Debug, Clone, Deserialize)]
pub struct EventAccount {
    pub login: String,
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(rename = "type", default)]
    pub account_type: Option<String>,
}

/// Installation sub-object of installation-lifecycle events.
#[derive(Debug, Clone, Deserialize)]
pub struct EventInstallation {
    pub id: i64,
    #[serde(default)]
    pub account: Option<EventAccount>,
    #[serde(default)]
    pub target_type: Option<String>,
    #[serde(default)]
    pub repository_selection: Option<String>,
    #[serde(default)]
    pub app_id: Option<i64>,
    #[serde(default)]
    pub app_slug: Option<String>,
    #[serde(default)]
    pub permissions: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default)]
    pub suspended_at: Option<DateTime<Utc>>,
}

/// Abbreviated repository entry carried by installation events.
#[derive(Debug, Clone, Deserialize)]
pub struct EventRepositorySummary {
    pub id: i64,
    #[serde(default)]
    pub node_id: Option<String>,
    pub name: String,
    pub full_name: String,
    #[serde(default)]
    pub private: bool,
}

/// `installation` event: created / deleted / suspend / unsuspend.
#[derive(Debug, Clone, Deserialize)]
pub struct InstallationEvent {
    pub action: String,
    pub installation: EventInstallation,
    /// Repositories visible to the installation; present on `created`.
    #[serde(default)]
    pub repositories: Vec<EventRepositorySummary>,
}

/// `installation_repositories` event: added / removed.
#[derive(Debug, Clone, Deserialize)]
pub struct InstallationRepositoriesEvent {
    pub action: String,
    pub installation: EventInstallation,
    #[serde(default)]
    pub repositories_added: Vec<EventRepositorySummary>,
    #[serde(default)]
    pub repositories_removed: Vec<EventRepositorySummary>,
}

/// `push` event.
#[derive(Debug, Clone, Deserialize)]
pub struct PushEvent {
    /// Full git ref, e.g. `refs/heads/main`.
    #[serde(rename = "ref")]
    pub ref_name: String,
    #[serde(default)]
    pub before: Option<String>,
    #[serde(default)]
    pub after: Option<String>,
    pub repository: RemoteRepository,
    #[serde(default)]
    pub commits: Vec<PushCommit>,
    #[serde(default)]
    pub head_commit: Option<PushCommit>,
    #[serde(default)]
    pub sender: Option<EventAccount>,
}

impl PushEvent {
    /// Branch name when the pushed ref is a branch; `None` for tags.
    pub fn branch_name(&self) -> Option<&str> {
        self.ref_name.strip_prefix("refs/heads/")
    }
}

/// Commit entry of a push payload.
///
/// Shallow pushes omit the per-commit file lists; all three stay `None`
/// then and the derived diff stats degrade to absent instead of failing.
#[derive(Debug, Clone, Deserialize)]
pub struct PushCommit {
    /// Commit sha (named `id` in push payloads).
    pub id: String,
    pub message: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tree_id: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub author: Option<PushIdentity>,
    #[serde(default)]
    pub committer: Option<PushIdentity>,
    #[serde(default)]
    pub added: Option<Vec<String>>,
    #[serde(default)]
    pub removed: Option<Vec<String>>,
    #[serde(default)]
    pub modified: Option<Vec<String>>,
}

impl PushCommit {
    /// Lines-of-change proxies derived from the file lists:
    /// (additions, deletions, changed_files). Absent lists stay absent.
    pub fn diff_stats(&self) -> (Option<i64>, Option<i64>, Option<i64>) {
        let additions = self.added.as_ref().map(|v| v.len() as i64);
        let deletions = self.removed.as_ref().map(|v| v.len() as i64);
        let modified = self.modified.as_ref().map(|v| v.len() as i64);

        let changed_files = match (additions, deletions, modified) {
            (None, None, None) => None,
            _ => Some(
                additions.unwrap_or(0) + deletions.unwrap_or(0) + modified.unwrap_or(0),
            ),
        };
        (additions, deletions, changed_files)
    }
}

/// Author/committer identity in push payloads.
#[derive(Debug, Clone, Deserialize)]
pub struct PushIdentity {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

/// `create` event (branch or tag creation).
#[derive(Debug, Clone, Deserialize)]
pub struct CreateEvent {
    /// Branch or tag name.
    #[serde(rename = "ref")]
    pub ref_name: String,
    /// `"branch"` or `"tag"`.
    pub ref_type: String,
    pub repository: RemoteRepository,
    #[serde(default)]
    pub sender: Option<EventAccount>,
}

/// `delete` event (branch or tag deletion).
#[derive(Debug, Clone, Deserialize)]
pub struct DeleteEvent {
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub ref_type: String,
    pub repository: RemoteRepository,
}

/// `pull_request` event.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestEvent {
    pub action: String,
    pub number: i64,
    pub pull_request: RemotePullRequest,
    pub repository: RemoteRepository,
}

/// `issues` event.
#[derive(Debug, Clone, Deserialize)]
pub struct IssuesEvent {
    pub action: String,
    pub issue: RemoteIssue,
    pub repository: RemoteRepository,
}

/// `ping` event, sent when the webhook is configured.
#[derive(Debug, Clone, Deserialize)]
pub struct PingEvent {
    #[serde(default)]
    pub zen: Option<String>,
    #[serde(default)]
    pub hook_id: Option<i64>,
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
