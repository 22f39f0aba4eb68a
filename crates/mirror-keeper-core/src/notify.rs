//! Best-effort outbound change notifications.
//!
//! A downstream consumer can be told about mirrored changes as they land.
//! Delivery is fire-and-forget: the notification is spawned off the
//! handling task, failures are logged and swallowed, and nothing ever
//! propagates back into the webhook transaction.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tracing::{debug, warn};

/// One change worth telling the downstream about.
#[derive(Debug, Clone)]
pub enum ChangeEvent {
    CommitCreated {
        repo_id: String,
        sha: String,
        message: String,
        author: Option<String>,
    },
    BranchCreated {
        repo_id: String,
        branch: String,
        sha: String,
    },
    PullRequestUpdated {
        repo_id: String,
        number: i64,
        action: String,
        state: Option<String>,
    },
    IssueUpdated {
        repo_id: String,
        number: i64,
        action: String,
        state: Option<String>,
    },
}

impl ChangeEvent {
    /// Event name as the downstream expects it.
    pub fn event_name(&self) -> String {
        match self {
            Self::CommitCreated { .. } => "commit.created".to_string(),
            Self::BranchCreated { .. } => "branch.created".to_string(),
            Self::PullRequestUpdated { action, .. } => format!("pull_request.{action}"),
            Self::IssueUpdated { action, .. } => format!("issue.{action}"),
        }
    }

    /// Wire payload: `{event, repoId, ..., timestamp}`.
    pub fn to_payload(&self) -> serde_json::Value {
        let timestamp = Utc::now().timestamp_millis();
        match self {
            Self::CommitCreated {
                repo_id,
                sha,
                message,
                author,
            } => serde_json::json!({
                "event": self.event_name(),
                "repoId": repo_id,
                "commitSha": sha,
                "message": message,
                "author": author,
                "timestamp": timestamp,
            }),
            Self::BranchCreated {
                repo_id,
                branch,
                sha,
            } => serde_json::json!({
                "event": self.event_name(),
                "repoId": repo_id,
                "branchName": branch,
                "sha": sha,
                "timestamp": timestamp,
            }),
            Self::PullRequestUpdated {
                repo_id,
                number,
                state,
                ..
            } => serde_json::json!({
                "event": self.event_name(),
                "repoId": repo_id,
                "prNumber": number,
                "state": state,
                "timestamp": timestamp,
            }),
            Self::IssueUpdated {
                repo_id,
                number,
                state,
                ..
            } => serde_json::json!({
                "event": self.event_name(),
                "repoId": repo_id,
                "issueNumber": number,
                "state": state,
                "timestamp": timestamp,
            }),
        }
    }
}

/// Delivery failure of one notification. Logged, never propagated.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification transport failed: {0}")]
    Transport(String),

    #[error("downstream answered {status}")]
    Rejected { status: u16 },
}

/// Injected delivery seam for notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn publish(&self, event: &ChangeEvent) -> Result<(), NotifyError>;
}

/// Sink that drops everything; used when no downstream is configured.
pub struct NoopNotificationSink;

#[async_trait]
impl NotificationSink for NoopNotificationSink {
    async fn publish(&self, _event: &ChangeEvent) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// JSON-over-HTTP sink posting to a configured downstream URL.
pub struct HttpNotificationSink {
    client: reqwest::Client,
    url: String,
}

impl HttpNotificationSink {
    pub fn new(url: String) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl NotificationSink for HttpNotificationSink {
    async fn publish(&self, event: &ChangeEvent) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(&event.to_payload())
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(NotifyError::Rejected {
                status: response.status().as_u16(),
            })
        }
    }
}

/// Fire-and-forget wrapper around a sink.
#[derive(Clone)]
pub struct Notifier {
    sink: Arc<dyn NotificationSink>,
}

impl Notifier {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self { sink }
    }

    pub fn disabled() -> Self {
        Self::new(Arc::new(NoopNotificationSink))
    }

    /// Publish without waiting. Failures are logged and discarded.
    pub fn fire(&self, event: ChangeEvent) {
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            let name = event.event_name();
            match sink.publish(&event).await {
                Ok(()) => debug!(event = %name, "change notification delivered"),
                Err(e) => warn!(event = %name, error = %e, "change notification dropped"),
            }
        });
    }
}

#[cfg(test)]
#[path = "notify_tests.rs"]
mod tests;
