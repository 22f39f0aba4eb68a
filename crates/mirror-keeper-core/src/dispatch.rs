//! Webhook event dispatch.
//!
//! One call to [`EventDispatcher::handle`] turns an authenticated delivery
//! into persisted side effects:
//!
//! 1. the delivery is logged (processed=false) BEFORE any processing, so a
//!    failure stays diagnosable and replayable;
//! 2. the payload is decoded into the typed envelope for its event type;
//! 3. the matching handler performs natural-key upserts;
//! 4. the log row flips to processed, or records the error and the failure
//!    re-raises so the transport can answer 5xx and the sender retries.
//!
//! Delivery is at-least-once: the same delivery id or a logically identical
//! payload can arrive twice, and handlers must converge on the same end
//! state. That property comes from the store's identity-based upserts, not
//! from delivery-id dedup (which only prevents re-logging).

use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};

use mirror_keeper_store::{BranchFields, CommitFields, MirrorStore, RepositoryRecord};

use crate::error::DispatchError;
use crate::events::{
    CreateEvent, DeleteEvent, InstallationEvent, InstallationRepositoriesEvent, IssuesEvent,
    PingEvent, PullRequestEvent, PushCommit, PushEvent,
};
use crate::map;
use crate::notify::{ChangeEvent, Notifier};

/// Result of handling one delivery.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    /// Row id of the delivery log entry.
    pub delivery_log_id: i64,
    /// False when the event type is unknown (accepted but a no-op).
    pub handled: bool,
}

/// Routes webhook deliveries to their handlers.
#[derive(Clone)]
pub struct EventDispatcher {
    store: MirrorStore,
    notifier: Notifier,
}

impl EventDispatcher {
    pub fn new(store: MirrorStore, notifier: Notifier) -> Self {
        Self { store, notifier }
    }

    /// Process one delivery. See the module docs for the contract.
    #[tracing::instrument(skip(self, raw_payload, signature))]
    pub async fn handle(
        &self,
        event_type: &str,
        raw_payload: &[u8],
        signature: Option<&str>,
        delivery_id: Option<&str>,
    ) -> Result<DispatchOutcome, DispatchError> {
        let payload: serde_json::Value =
            serde_json::from_slice(raw_payload).map_err(|e| DispatchError::MalformedPayload {
                event_type: event_type.to_string(),
                message: e.to_string(),
            })?;

        let (log_row, newly_logged) = self
            .store
            .log_delivery(event_type, delivery_id, &payload, signature)
            .await?;
        if !newly_logged {
            debug!(delivery_id = ?delivery_id, "redelivery - reprocessing logged delivery");
        }

        match self.route(event_type, &payload).await {
            Ok(handled) => {
                self.store.mark_delivery_processed(log_row.id).await?;
                Ok(DispatchOutcome {
                    delivery_log_id: log_row.id,
                    handled,
                })
            }
            Err(e) => {
                // Best effort: the original failure is the one worth
                // surfacing even if recording it fails too.
                if let Err(log_err) = self
                    .store
                    .mark_delivery_failed(log_row.id, &e.to_string())
                    .await
                {
                    error!(error = %log_err, "failed to record delivery error");
                }
                Err(e)
            }
        }
    }

    async fn route(
        &self,
        event_type: &str,
        payload: &serde_json::Value,
    ) -> Result<bool, DispatchError> {
        match event_type {
            "installation" => self.handle_installation(parse(event_type, payload)?).await?,
            "installation_repositories" => {
                self.handle_installation_repositories(parse(event_type, payload)?)
                    .await?
            }
            "push" => self.handle_push(parse(event_type, payload)?).await?,
            "create" => self.handle_create(parse(event_type, payload)?).await?,
            "delete" => self.handle_delete(parse(event_type, payload)?).await?,
            "pull_request" => {
                self.handle_pull_request(parse(event_type, payload)?)
                    .await?
            }
            "issues" => self.handle_issues(parse(event_type, payload)?).await?,
            "ping" => self.handle_ping(parse(event_type, payload)?),
            other => {
                // Never reject a type we do not understand: the sender
                // would retry indefinitely.
                info!(event_type = other, "unhandled webhook event type");
                return Ok(false);
            }
        }
        Ok(true)
    }

    // ========================================================================
    // Installation lifecycle
    // ========================================================================

    async fn handle_installation(&self, event: InstallationEvent) -> Result<(), DispatchError> {
        let installation_id = event.installation.id;
        let account = event
            .installation
            .account
            .as_ref()
            .map(|a| a.login.as_str())
            .unwrap_or("<unknown>");
        info!(
            action = %event.action,
            installation_id,
            account,
            "installation event"
        );

        match event.action.as_str() {
            "created" | "new_permissions_accepted" => {
                let (record, _) = self
                    .store
                    .upsert_installation(map::installation_fields(&event.installation))
                    .await?;

                // The created payload lists the visible repositories; link
                // them right away so the mirror does not depend on separate
                // repository events.
                for summary in &event.repositories {
                    if let Err(e) = self
                        .store
                        .upsert_repository(
                            Some(record.id),
                            map::repository_fields_from_summary(summary),
                        )
                        .await
                    {
                        error!(
                            full_name = %summary.full_name,
                            error = %e,
                            "failed to link repository from installation event"
                        );
                    }
                }
            }
            "deleted" => {
                if !self.store.delete_installation(installation_id).await? {
                    warn!(installation_id, "deleted installation was not mirrored");
                }
            }
            "suspend" => {
                self.store
                    .set_installation_suspended(installation_id, true)
                    .await?;
            }
            "unsuspend" => {
                self.store
                    .set_installation_suspended(installation_id, false)
                    .await?;
            }
            other => {
                info!(action = other, "ignoring installation action");
            }
        }
        Ok(())
    }

    async fn handle_installation_repositories(
        &self,
        event: InstallationRepositoriesEvent,
    ) -> Result<(), DispatchError> {
        let installation_id = event.installation.id;
        info!(
            action = %event.action,
            installation_id,
            added = event.repositories_added.len(),
            removed = event.repositories_removed.len(),
            "installation repositories event"
        );

        let Some(installation) = self.store.find_installation(installation_id).await? else {
            warn!(installation_id, "installation not mirrored; skipping repository links");
            return Ok(());
        };

        for summary in &event.repositories_added {
            if let Err(e) = self
                .store
                .upsert_repository(
                    Some(installation.id),
                    map::repository_fields_from_summary(summary),
                )
                .await
            {
                error!(full_name = %summary.full_name, error = %e, "failed to link repository");
            }
        }

        for summary in &event.repositories_removed {
            // Unlink, never delete: history outlives access.
            if !self.store.unlink_repository(summary.id).await? {
                debug!(full_name = %summary.full_name, "removed repository was not mirrored");
            }
        }

        Ok(())
    }

    // ========================================================================
    // Git data: push, branch create/delete
    // ========================================================================

    async fn handle_push(&self, event: PushEvent) -> Result<(), DispatchError> {
        let Some(branch_name) = event.branch_name() else {
            debug!(ref_name = %event.ref_name, "ignoring push to non-branch ref");
            return Ok(());
        };

        let Some(repo) = self.find_repo(&event.repository).await? else {
            // A push for an unmirrored repository is not an error; the next
            // reconciliation will pick the repository up.
            return Ok(());
        };

        info!(
            full_name = %repo.full_name,
            branch = branch_name,
            commits = event.commits.len(),
            "push event"
        );

        // Move the branch head. A deleted-branch push (after = 0000...) has
        // no head_commit; the delete event handles the row, nothing to do.
        let head = event.head_commit.as_ref();
        let head_sha = head
            .map(|c| c.id.clone())
            .or_else(|| event.after.clone())
            .filter(|sha| !sha.is_empty() && !sha.chars().all(|c| c == '0'));

        let branch_id = match head_sha {
            Some(sha) => {
                let (branch, created) = self
                    .store
                    .upsert_branch(
                        repo.id,
                        BranchFields {
                            name: branch_name.to_string(),
                            sha: sha.clone(),
                            protected: None,
                            commit_message: head.map(|c| c.message.clone()),
                            commit_author: head
                                .and_then(|c| c.author.as_ref())
                                .and_then(|a| a.name.clone()),
                            commit_date: head.and_then(|c| c.timestamp),
                        },
                    )
                    .await?;
                if created {
                    self.notifier.fire(ChangeEvent::BranchCreated {
                        repo_id: repo.id.to_string(),
                        branch: branch_name.to_string(),
                        sha,
                    });
                }
                Some(branch.id)
            }
            None => None,
        };

        // One bad commit does not sink the rest of the push.
        let mut saved = 0usize;
        for commit in &event.commits {
            match self
                .store
                .upsert_commit(repo.id, branch_id, commit_fields(commit))
                .await
            {
                Ok((record, created)) => {
                    saved += 1;
                    if created {
                        self.notifier.fire(ChangeEvent::CommitCreated {
                            repo_id: repo.id.to_string(),
                            sha: record.sha,
                            message: record.message,
                            author: record.author_name,
                        });
                    }
                }
                Err(e) => {
                    error!(sha = %commit.id, error = %e, "failed to mirror pushed commit");
                }
            }
        }

        info!(
            saved,
            branch = branch_name,
            full_name = %repo.full_name,
            "push event processed"
        );
        Ok(())
    }

    async fn handle_create(&self, event: CreateEvent) -> Result<(), DispatchError> {
        if event.ref_type != "branch" {
            debug!(ref_type = %event.ref_type, "ignoring create event for non-branch ref");
            return Ok(());
        }

        let Some(repo) = self.find_repo(&event.repository).await? else {
            return Ok(());
        };

        // The create payload carries no head sha; the first push fills it.
        let (branch, created) = self
            .store
            .upsert_branch(
                repo.id,
                BranchFields {
                    name: event.ref_name.clone(),
                    sha: String::new(),
                    protected: None,
                    commit_message: None,
                    commit_author: event.sender.as_ref().map(|s| s.login.clone()),
                    commit_date: Some(chrono::Utc::now()),
                },
            )
            .await?;

        if created {
            self.notifier.fire(ChangeEvent::BranchCreated {
                repo_id: repo.id.to_string(),
                branch: branch.name.clone(),
                sha: branch.sha,
            });
        }

        info!(branch = %event.ref_name, full_name = %repo.full_name, "branch created");
        Ok(())
    }

    async fn handle_delete(&self, event: DeleteEvent) -> Result<(), DispatchError> {
        if event.ref_type != "branch" {
            debug!(ref_type = %event.ref_type, "ignoring delete event for non-branch ref");
            return Ok(());
        }

        let Some(repo) = self.find_repo(&event.repository).await? else {
            return Ok(());
        };

        if self.store.delete_branch(repo.id, &event.ref_name).await? {
            info!(branch = %event.ref_name, full_name = %repo.full_name, "branch deleted");
        }
        Ok(())
    }

    // ========================================================================
    // Pull requests and issues
    // ========================================================================

    async fn handle_pull_request(&self, event: PullRequestEvent) -> Result<(), DispatchError> {
        info!(
            action = %event.action,
            number = event.number,
            full_name = %event.repository.full_name,
            "pull request event"
        );

        // A PR event for an unknown repository is a hard failure for this
        // delivery; the sender's retry gives reconciliation a chance to
        // create the parent first.
        let repo = self.find_repo(&event.repository).await?.ok_or_else(|| {
            DispatchError::RepositoryNotFound {
                identifier: event.repository.full_name.clone(),
            }
        })?;

        let (record, created) = self
            .store
            .upsert_pull_request(repo.id, map::pull_request_fields(&event.pull_request))
            .await?;

        debug!(
            number = record.number,
            created,
            state = ?record.state,
            "pull request mirrored"
        );

        self.notifier.fire(ChangeEvent::PullRequestUpdated {
            repo_id: repo.id.to_string(),
            number: record.number,
            action: event.action.clone(),
            state: record.state,
        });
        Ok(())
    }

    async fn handle_issues(&self, event: IssuesEvent) -> Result<(), DispatchError> {
        info!(
            action = %event.action,
            number = event.issue.number,
            full_name = %event.repository.full_name,
            "issues event"
        );

        let repo = self.find_repo(&event.repository).await?.ok_or_else(|| {
            DispatchError::RepositoryNotFound {
                identifier: event.repository.full_name.clone(),
            }
        })?;

        let (record, created) = self
            .store
            .upsert_issue(repo.id, map::issue_fields(&event.issue))
            .await?;

        debug!(number = record.number, created, "issue mirrored");

        self.notifier.fire(ChangeEvent::IssueUpdated {
            repo_id: repo.id.to_string(),
            number: record.number,
            action: event.action.clone(),
            state: record.state,
        });
        Ok(())
    }

    fn handle_ping(&self, event: PingEvent) {
        info!(
            hook_id = ?event.hook_id,
            zen = ?event.zen,
            "ping event received"
        );
    }

    /// Look up the local mirror of an event's repository by remote id,
    /// warning when it is absent.
    async fn find_repo(
        &self,
        remote: &github_app_sdk::client::RemoteRepository,
    ) -> Result<Option<RepositoryRecord>, DispatchError> {
        let found = self
            .store
            .find_repository_by_github_id(remote.id as i64)
            .await?;
        if found.is_none() {
            warn!(
                full_name = %remote.full_name,
                github_repo_id = remote.id,
                "repository not mirrored locally"
            );
        }
        Ok(found)
    }
}

/// Decode a typed envelope from the generic payload tree.
fn parse<T: DeserializeOwned>(
    event_type: &str,
    payload: &serde_json::Value,
) -> Result<T, DispatchError> {
    serde_json::from_value(payload.clone()).map_err(|e| DispatchError::MalformedPayload {
        event_type: event_type.to_string(),
        message: e.to_string(),
    })
}

/// Push commit entry → commit fields.
fn commit_fields(commit: &PushCommit) -> CommitFields {
    let (additions, deletions, changed_files) = commit.diff_stats();
    CommitFields {
        sha: commit.id.clone(),
        node_id: None,
        message: commit.message.clone(),
        author_name: commit.author.as_ref().and_then(|a| a.name.clone()),
        author_email: commit.author.as_ref().and_then(|a| a.email.clone()),
        author_login: commit.author.as_ref().and_then(|a| a.username.clone()),
        author_date: commit.timestamp,
        committer_name: commit.committer.as_ref().and_then(|c| c.name.clone()),
        committer_email: commit.committer.as_ref().and_then(|c| c.email.clone()),
        committer_date: commit.timestamp,
        tree_sha: commit.tree_id.clone(),
        parent_shas: Vec::new(),
        additions,
        deletions,
        changed_files,
        html_url: commit.url.clone(),
        verified: false,
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
