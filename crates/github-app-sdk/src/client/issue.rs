//! Issue listing operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::InstallationToken;
use crate::client::GitHubClient;
use crate::error::ApiError;

/// Issue as returned by the list endpoint.
///
/// GitHub's issues listing also returns pull requests (every PR is an
/// issue); those records carry a `pull_request` sub-object and must be
/// filtered by callers that want issues only; see [`RemoteIssue::is_pull_request`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteIssue {
    pub id: u64,
    pub number: i64,
    #[serde(default)]
    pub node_id: Option<String>,
    pub state: String,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub user: Option<IssueUser>,
    #[serde(default)]
    pub labels: Vec<IssueLabel>,
    #[serde(default)]
    pub assignees: Vec<IssueUser>,
    #[serde(default)]
    pub milestone: Option<IssueMilestone>,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub comments: Option<i64>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub html_url: Option<String>,
    /// Present when the record is actually a pull request.
    #[serde(default)]
    pub pull_request: Option<serde_json::Value>,
}

impl RemoteIssue {
    /// Whether this issue record is a pull request in disguise.
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

/// User reference in issue payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueUser {
    pub login: String,
    #[serde(default)]
    pub id: Option<u64>,
}

/// Label attached to an issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueLabel {
    pub name: String,
}

/// Milestone attached to an issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueMilestone {
    pub title: String,
}

impl GitHubClient {
    /// List issues of a repository in one state partition
    /// (`"open"` or `"closed"`). Pull requests are NOT filtered here.
    pub async fn list_issues(
        &self,
        token: &InstallationToken,
        full_name: &str,
        state: &str,
    ) -> Result<Vec<RemoteIssue>, ApiError> {
        self.get_as_installation(
            &format!("/repos/{full_name}/issues"),
            &[
                ("state", state),
                ("per_page", "100"),
                ("sort", "updated"),
                ("direction", "desc"),
            ],
            token,
        )
        .await
    }
}

#[cfg(test)]
#[path = "issue_tests.rs"]
mod tests;
