//! Repository, branch and commit operations.
//!
//! Response types keep only the fields the mirror consumes; everything else
//! the API returns is ignored for forward compatibility.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::InstallationToken;
use crate::client::GitHubClient;
use crate::error::ApiError;

/// Repository as returned by the GitHub API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteRepository {
    pub id: u64,
    #[serde(default)]
    pub node_id: Option<String>,
    pub name: String,
    pub full_name: String,
    #[serde(default)]
    pub owner: Option<RepositoryOwner>,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub fork: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub pushed_at: Option<DateTime<Utc>>,
}

/// Owner sub-object of a repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryOwner {
    pub login: String,
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(rename = "type", default)]
    pub owner_type: Option<String>,
}

/// Branch as returned by the branch listing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteBranch {
    pub name: String,
    pub commit: BranchHead,
    #[serde(default)]
    pub protected: bool,
}

/// Head pointer of a listed branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchHead {
    pub sha: String,
}

/// Single commit with file-level stats, from the commit detail endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitDetail {
    pub sha: String,
    #[serde(default)]
    pub node_id: Option<String>,
    pub commit: CommitPayload,
    #[serde(default)]
    pub author: Option<CommitUser>,
    #[serde(default)]
    pub stats: Option<CommitStats>,
    #[serde(default)]
    pub files: Vec<CommitFile>,
    #[serde(default)]
    pub parents: Vec<CommitParent>,
    #[serde(default)]
    pub html_url: Option<String>,
}

/// The git-level payload of a commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitPayload {
    pub message: String,
    #[serde(default)]
    pub author: Option<CommitAuthor>,
    #[serde(default)]
    pub committer: Option<CommitAuthor>,
    #[serde(default)]
    pub tree: Option<CommitParent>,
    #[serde(default)]
    pub verification: Option<CommitVerification>,
}

/// Git author/committer identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitAuthor {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

/// GitHub account attached to a commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitUser {
    pub login: String,
}

/// Signature verification status of a commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitVerification {
    #[serde(default)]
    pub verified: bool,
}

/// Aggregate diff stats of a commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitStats {
    #[serde(default)]
    pub additions: Option<i64>,
    #[serde(default)]
    pub deletions: Option<i64>,
    #[serde(default)]
    pub total: Option<i64>,
}

/// One changed file of a commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitFile {
    pub filename: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub additions: Option<i64>,
    #[serde(default)]
    pub deletions: Option<i64>,
}

/// SHA reference (parent commit, tree).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitParent {
    pub sha: String,
}

impl GitHubClient {
    /// List branches of a repository.
    pub async fn list_branches(
        &self,
        token: &InstallationToken,
        full_name: &str,
    ) -> Result<Vec<RemoteBranch>, ApiError> {
        self.get_as_installation(
            &format!("/repos/{full_name}/branches"),
            &[("per_page", "100")],
            token,
        )
        .await
    }

    /// Fetch one commit including its changed files and diff stats.
    pub async fn get_commit(
        &self,
        token: &InstallationToken,
        full_name: &str,
        sha: &str,
    ) -> Result<CommitDetail, ApiError> {
        self.get_as_installation(&format!("/repos/{full_name}/commits/{sha}"), &[], token)
            .await
    }

    /// Check whether a branch has protection enabled.
    ///
    /// GitHub answers 404 for unprotected branches, which maps to `false`
    /// rather than an error.
    pub async fn is_branch_protected(
        &self,
        token: &InstallationToken,
        full_name: &str,
        branch: &str,
    ) -> Result<bool, ApiError> {
        let result: Result<serde_json::Value, ApiError> = self
            .get_as_installation(
                &format!("/repos/{full_name}/branches/{branch}/protection"),
                &[],
                token,
            )
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(ApiError::NotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
#[path = "repository_tests.rs"]
mod tests;
