//! Pull-based incremental reconciliation.
//!
//! A full sync catches up one installation on anything webhooks missed:
//! outages, dropped deliveries, cold start. Per repository, pull requests
//! and issues are fetched in both the "open" and "closed" state partitions
//! (the listing APIs cannot reliably express "updated since X"): the open
//! set is small and upserted unconditionally, the closed backlog is bounded
//! by comparing each record's remote update time against the repository's
//! last local sync point. Branch heads and their commits are reconciled
//! from the branch listing, with diff stats backfilled from the commit
//! detail endpoint.
//!
//! One repository failing never aborts the installation: its error is
//! recorded in the summary and the run continues. Only top-level failures
//! (installation unknown, credentials unavailable) abort with a single
//! GLOBAL error. Callers always receive a [`SyncSummary`], never an error;
//! inspect `success` and `errors`.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use github_app_sdk::auth::{CredentialProvider, InstallationId, InstallationToken};
use github_app_sdk::client::GitHubClient;
use mirror_keeper_store::{BranchFields, CommitFields, MirrorStore, RepositoryRecord};

use crate::error::SyncError;
use crate::map;

/// Structured result of one reconciliation run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub installation_id: i64,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub success: bool,

    pub repositories_synced: u32,
    pub repositories_created: u32,
    pub repositories_updated: u32,

    pub pull_requests_synced: u32,
    pub pull_requests_created: u32,
    pub pull_requests_updated: u32,

    pub issues_synced: u32,
    pub issues_created: u32,
    pub issues_updated: u32,

    pub branches_synced: u32,
    pub commits_synced: u32,

    /// Context (repository or GLOBAL) → error message.
    pub errors: BTreeMap<String, String>,
}

impl SyncSummary {
    fn new(installation_id: i64) -> Self {
        Self {
            installation_id,
            started_at: None,
            finished_at: None,
            success: false,
            repositories_synced: 0,
            repositories_created: 0,
            repositories_updated: 0,
            pull_requests_synced: 0,
            pull_requests_created: 0,
            pull_requests_updated: 0,
            issues_synced: 0,
            issues_created: 0,
            issues_updated: 0,
            branches_synced: 0,
            commits_synced: 0,
            errors: BTreeMap::new(),
        }
    }

    fn add_error(&mut self, context: impl Into<String>, message: impl Into<String>) {
        self.errors.insert(context.into(), message.into());
    }
}

/// Walks the remote API and reconciles it into the local mirror.
pub struct ReconciliationEngine {
    store: MirrorStore,
    credentials: Arc<CredentialProvider>,
    client: GitHubClient,
}

impl ReconciliationEngine {
    pub fn new(
        store: MirrorStore,
        credentials: Arc<CredentialProvider>,
        client: GitHubClient,
    ) -> Self {
        Self {
            store,
            credentials,
            client,
        }
    }

    pub(crate) fn store(&self) -> &MirrorStore {
        &self.store
    }

    /// Full reconciliation of one installation, by its remote id.
    pub async fn sync_full(&self, installation_id: i64) -> SyncSummary {
        info!(installation_id, "starting full sync");
        let mut summary = SyncSummary::new(installation_id);
        summary.started_at = Some(Utc::now());

        match self.sync_full_inner(installation_id, &mut summary).await {
            Ok(()) => {
                summary.success = true;
                info!(
                    installation_id,
                    pull_requests = summary.pull_requests_synced,
                    issues = summary.issues_synced,
                    branches = summary.branches_synced,
                    errors = summary.errors.len(),
                    "full sync completed"
                );
            }
            Err(e) => {
                error!(installation_id, error = %e, "full sync aborted");
                summary.add_error("GLOBAL", e.to_string());
                summary.success = false;
            }
        }

        summary.finished_at = Some(Utc::now());
        summary
    }

    async fn sync_full_inner(
        &self,
        installation_id: i64,
        summary: &mut SyncSummary,
    ) -> Result<(), SyncError> {
        let installation = self
            .store
            .find_installation(installation_id)
            .await?
            .ok_or(SyncError::InstallationNotFound(installation_id))?;

        let token = self
            .credentials
            .installation_token(InstallationId::new(installation_id as u64))
            .await?;

        // Refresh installation metadata (permissions, suspension) while we
        // are here. Best-effort: a failed lookup does not abort the run.
        match self.credentials.sign_app_assertion() {
            Ok(assertion) => {
                match self
                    .client
                    .get_installation(&assertion, InstallationId::new(installation_id as u64))
                    .await
                {
                    Ok(info) => {
                        self.store
                            .upsert_installation(map::installation_fields_from_api(&info))
                            .await?;
                    }
                    Err(e) => {
                        warn!(installation_id, error = %e, "installation metadata refresh failed");
                    }
                }
            }
            Err(e) => {
                warn!(installation_id, error = %e, "no app assertion for metadata refresh");
            }
        }

        let repositories = self
            .store
            .list_repositories_for_installation(installation.id)
            .await?;
        info!(
            installation_id,
            repositories = repositories.len(),
            "syncing repositories"
        );

        for repo in &repositories {
            if let Err(e) = self.sync_repository(repo, &token, summary).await {
                error!(full_name = %repo.full_name, error = %e, "repository sync failed");
                summary.add_error(repo.full_name.clone(), e.to_string());
            }
        }

        Ok(())
    }

    /// Initial repository sync: fetch everything the installation can see
    /// and mirror it. Used on first install and by operators to repair
    /// linkage.
    pub async fn sync_repositories(&self, installation_id: i64) -> SyncSummary {
        info!(installation_id, "starting repository sync");
        let mut summary = SyncSummary::new(installation_id);
        summary.started_at = Some(Utc::now());

        match self
            .sync_repositories_inner(installation_id, &mut summary)
            .await
        {
            Ok(()) => summary.success = true,
            Err(e) => {
                error!(installation_id, error = %e, "repository sync aborted");
                summary.add_error("GLOBAL", e.to_string());
            }
        }

        summary.finished_at = Some(Utc::now());
        summary
    }

    async fn sync_repositories_inner(
        &self,
        installation_id: i64,
        summary: &mut SyncSummary,
    ) -> Result<(), SyncError> {
        let installation = self
            .store
            .find_installation(installation_id)
            .await?
            .ok_or(SyncError::InstallationNotFound(installation_id))?;

        let token = self
            .credentials
            .installation_token(InstallationId::new(installation_id as u64))
            .await?;

        let remote_repos = self.client.list_installation_repositories(&token).await?;
        info!(
            installation_id,
            count = remote_repos.len(),
            "fetched installation repositories"
        );

        for remote in &remote_repos {
            match self
                .store
                .upsert_repository(Some(installation.id), map::repository_fields(remote))
                .await
            {
                Ok((_, created)) => {
                    summary.repositories_synced += 1;
                    if created {
                        summary.repositories_created += 1;
                    } else {
                        summary.repositories_updated += 1;
                    }
                }
                Err(e) => {
                    error!(full_name = %remote.full_name, error = %e, "failed to mirror repository");
                    summary.add_error(remote.full_name.clone(), e.to_string());
                }
            }
        }

        Ok(())
    }

    /// Reconcile one repository. Sections record their own errors; a
    /// returned error means the whole repository could not be processed.
    async fn sync_repository(
        &self,
        repo: &RepositoryRecord,
        token: &InstallationToken,
        summary: &mut SyncSummary,
    ) -> Result<(), SyncError> {
        info!(full_name = %repo.full_name, "syncing repository");

        // Read the sync point before this run's writes advance it.
        let last_sync = repo.updated_at;

        if let Err(e) = self.sync_pull_requests(repo, token, last_sync, summary).await {
            summary.add_error(format!("{} (PRs)", repo.full_name), e.to_string());
        }

        if let Err(e) = self.sync_issues(repo, token, last_sync, summary).await {
            summary.add_error(format!("{} (Issues)", repo.full_name), e.to_string());
        }

        if let Err(e) = self.sync_branches(repo, token, summary).await {
            summary.add_error(format!("{} (Branches)", repo.full_name), e.to_string());
        }

        self.store.touch_repository(repo.id).await?;
        Ok(())
    }

    async fn sync_pull_requests(
        &self,
        repo: &RepositoryRecord,
        token: &InstallationToken,
        last_sync: DateTime<Utc>,
        summary: &mut SyncSummary,
    ) -> Result<(), SyncError> {
        let open = self
            .client
            .list_pull_requests(token, &repo.full_name, "open")
            .await?;
        let closed = self
            .client
            .list_pull_requests(token, &repo.full_name, "closed")
            .await?;

        // Open PRs are a small bounded set: upsert them all.
        for pr in &open {
            let (_, created) = self
                .store
                .upsert_pull_request(repo.id, map::pull_request_fields(pr))
                .await?;
            summary.pull_requests_synced += 1;
            if created {
                summary.pull_requests_created += 1;
            } else {
                summary.pull_requests_updated += 1;
            }
        }

        // The closed backlog can be huge: only records the remote reports
        // as updated after our last sync point.
        for pr in &closed {
            let Some(updated_at) = pr.updated_at else {
                continue;
            };
            if updated_at <= last_sync {
                continue;
            }
            let (_, created) = self
                .store
                .upsert_pull_request(repo.id, map::pull_request_fields(pr))
                .await?;
            summary.pull_requests_synced += 1;
            if created {
                summary.pull_requests_created += 1;
            } else {
                summary.pull_requests_updated += 1;
            }
        }

        Ok(())
    }

    async fn sync_issues(
        &self,
        repo: &RepositoryRecord,
        token: &InstallationToken,
        last_sync: DateTime<Utc>,
        summary: &mut SyncSummary,
    ) -> Result<(), SyncError> {
        let open = self.client.list_issues(token, &repo.full_name, "open").await?;
        let closed = self
            .client
            .list_issues(token, &repo.full_name, "closed")
            .await?;

        for issue in &open {
            // The issues listing also returns pull requests; skip them.
            if issue.is_pull_request() {
                continue;
            }
            let (_, created) = self
                .store
                .upsert_issue(repo.id, map::issue_fields(issue))
                .await?;
            summary.issues_synced += 1;
            if created {
                summary.issues_created += 1;
            } else {
                summary.issues_updated += 1;
            }
        }

        for issue in &closed {
            if issue.is_pull_request() {
                continue;
            }
            let Some(updated_at) = issue.updated_at else {
                continue;
            };
            if updated_at <= last_sync {
                continue;
            }
            let (_, created) = self
                .store
                .upsert_issue(repo.id, map::issue_fields(issue))
                .await?;
            summary.issues_synced += 1;
            if created {
                summary.issues_created += 1;
            } else {
                summary.issues_updated += 1;
            }
        }

        Ok(())
    }

    /// Reconcile branch heads. Unchanged branches are skipped; a moved head
    /// pulls the commit detail once to fill head info and diff stats.
    async fn sync_branches(
        &self,
        repo: &RepositoryRecord,
        token: &InstallationToken,
        summary: &mut SyncSummary,
    ) -> Result<(), SyncError> {
        let branches = self.client.list_branches(token, &repo.full_name).await?;

        for branch in &branches {
            let local = self.store.find_branch(repo.id, &branch.name).await?;

            let unchanged = local
                .as_ref()
                .map(|l| l.sha == branch.commit.sha && l.protected == branch.protected)
                .unwrap_or(false);
            if unchanged {
                continue;
            }

            let detail = match self
                .client
                .get_commit(token, &repo.full_name, &branch.commit.sha)
                .await
            {
                Ok(detail) => Some(detail),
                Err(e) => {
                    // Head info degrades gracefully; the branch pointer is
                    // still worth recording.
                    warn!(
                        branch = %branch.name,
                        sha = %branch.commit.sha,
                        error = %e,
                        "failed to fetch head commit detail"
                    );
                    None
                }
            };

            let author = detail.as_ref().and_then(|d| d.commit.author.clone());
            let (branch_record, _) = self
                .store
                .upsert_branch(
                    repo.id,
                    BranchFields {
                        name: branch.name.clone(),
                        sha: branch.commit.sha.clone(),
                        protected: Some(branch.protected),
                        commit_message: detail.as_ref().map(|d| d.commit.message.clone()),
                        commit_author: author.as_ref().and_then(|a| a.name.clone()),
                        commit_date: author.as_ref().and_then(|a| a.date),
                    },
                )
                .await?;
            summary.branches_synced += 1;

            if let Some(detail) = detail {
                let (_, created) = self
                    .store
                    .upsert_commit(
                        repo.id,
                        Some(branch_record.id),
                        commit_fields_from_detail(&detail),
                    )
                    .await?;
                if created {
                    summary.commits_synced += 1;
                }
            }
        }

        Ok(())
    }
}

/// Commit detail response → commit fields, including diff stats and the
/// verification flag the push payload cannot provide.
fn commit_fields_from_detail(detail: &github_app_sdk::client::CommitDetail) -> CommitFields {
    let author = detail.commit.author.as_ref();
    let committer = detail.commit.committer.as_ref();

    CommitFields {
        sha: detail.sha.clone(),
        node_id: detail.node_id.clone(),
        message: detail.commit.message.clone(),
        author_name: author.and_then(|a| a.name.clone()),
        author_email: author.and_then(|a| a.email.clone()),
        author_login: detail.author.as_ref().map(|u| u.login.clone()),
        author_date: author.and_then(|a| a.date),
        committer_name: committer.and_then(|c| c.name.clone()),
        committer_email: committer.and_then(|c| c.email.clone()),
        committer_date: committer.and_then(|c| c.date),
        tree_sha: detail.commit.tree.as_ref().map(|t| t.sha.clone()),
        parent_shas: detail.parents.iter().map(|p| p.sha.clone()).collect(),
        additions: detail.stats.as_ref().and_then(|s| s.additions),
        deletions: detail.stats.as_ref().and_then(|s| s.deletions),
        changed_files: Some(detail.files.len() as i64).filter(|n| *n > 0),
        html_url: detail.html_url.clone(),
        verified: detail
            .commit
            .verification
            .as_ref()
            .map(|v| v.verified)
            .unwrap_or(false),
    }
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
