//! Pull request listing and review operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::InstallationToken;
use crate::client::GitHubClient;
use crate::error::ApiError;

/// Pull request as returned by the list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemotePullRequest {
    pub id: u64,
    pub number: i64,
    #[serde(default)]
    pub node_id: Option<String>,
    pub state: String,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub user: Option<super::IssueUser>,
    #[serde(default)]
    pub head: Option<PullRequestRef>,
    #[serde(default)]
    pub base: Option<PullRequestRef>,
    #[serde(default)]
    pub draft: Option<bool>,
    /// Present on the detail endpoint and webhook payloads; the list
    /// endpoint omits it.
    #[serde(default)]
    pub merged: Option<bool>,
    #[serde(default)]
    pub mergeable: Option<bool>,
    #[serde(default)]
    pub merged_by: Option<super::IssueUser>,
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub html_url: Option<String>,
}

/// Head or base reference of a pull request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestRef {
    #[serde(rename = "ref")]
    pub branch_ref: String,
    pub sha: String,
}

/// Pull request review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteReview {
    pub id: u64,
    #[serde(default)]
    pub user: Option<super::IssueUser>,
    pub state: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
}

impl GitHubClient {
    /// List pull requests of a repository in one state partition
    /// (`"open"` or `"closed"`).
    pub async fn list_pull_requests(
        &self,
        token: &InstallationToken,
        full_name: &str,
        state: &str,
    ) -> Result<Vec<RemotePullRequest>, ApiError> {
        self.get_as_installation(
            &format!("/repos/{full_name}/pulls"),
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

    /// List reviews of one pull request.
    pub async fn list_pull_request_reviews(
        &self,
        token: &InstallationToken,
        full_name: &str,
        number: i64,
    ) -> Result<Vec<RemoteReview>, ApiError> {
        self.get_as_installation(
            &format!("/repos/{full_name}/pulls/{number}/reviews"),
            &[("per_page", "100")],
            token,
        )
        .await
    }
}

#[cfg(test)]
#[path = "pull_request_tests.rs"]
mod tests;
