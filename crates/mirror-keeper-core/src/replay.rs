//! Repository linkage replay from the webhook delivery log.
//!
//! An `installation created` payload lists the repositories the
//! installation can see. When that sub-payload was dropped or mishandled on
//! first receipt, the delivery log still has it: this walks logged
//! `installation` deliveries (newest first) and re-creates any repository
//! rows that are missing. Create-only: existing rows are never touched, so
//! a replay cannot clobber fresher state.

use serde::Serialize;
use tracing::{error, info, warn};

use crate::events::InstallationEvent;
use crate::map;
use crate::sync::ReconciliationEngine;

/// How many logged deliveries a replay will look at.
const REPLAY_SCAN_LIMIT: i64 = 500;

/// Outcome of one replay pass.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    /// `success`, `no_data` (nothing logged), `no_webhook` (no delivery for
    /// the requested installation), `not_found` (installation not mirrored)
    /// or `error` (the log itself could not be read).
    pub status: String,
    pub processed_deliveries: u32,
    pub saved_repositories: u32,
    pub errors: Vec<String>,
}

impl ReplayReport {
    fn with_status(status: &str) -> Self {
        Self {
            status: status.to_string(),
            processed_deliveries: 0,
            saved_repositories: 0,
            errors: Vec::new(),
        }
    }
}

impl ReconciliationEngine {
    /// Replay repository linkage from logged `installation` deliveries.
    ///
    /// With `installation_id` set, only the newest matching delivery is
    /// replayed; otherwise every logged `created` delivery is.
    pub async fn replay_repository_linkage(
        &self,
        installation_id: Option<i64>,
    ) -> ReplayReport {
        info!(installation_id = ?installation_id, "replaying repository linkage from webhook log");

        let deliveries = match self
            .store()
            .list_deliveries_for_event("installation", REPLAY_SCAN_LIMIT)
            .await
        {
            Ok(deliveries) => deliveries,
            Err(e) => {
                let mut report = ReplayReport::with_status("error");
                report.errors.push(e.to_string());
                return report;
            }
        };

        if deliveries.is_empty() {
            warn!("no installation deliveries logged");
            return ReplayReport::with_status("no_data");
        }

        if let Some(target) = installation_id {
            if let Ok(None) = self.store().find_installation(target).await {
                return ReplayReport::with_status("not_found");
            }
        }

        let mut report = ReplayReport::with_status("success");
        let mut matched_target = false;

        for delivery in &deliveries {
            let event: InstallationEvent = match serde_json::from_value(delivery.payload.clone()) {
                Ok(event) => event,
                Err(e) => {
                    warn!(delivery = delivery.id, error = %e, "skipping unparseable delivery");
                    report
                        .errors
                        .push(format!("delivery {}: {e}", delivery.id));
                    continue;
                }
            };

            if event.action != "created" {
                continue;
            }
            if let Some(target) = installation_id {
                if event.installation.id != target {
                    continue;
                }
                matched_target = true;
            }

            self.replay_one(&event, &mut report).await;
            report.processed_deliveries += 1;

            // Scoped replay uses only the newest matching delivery.
            if installation_id.is_some() {
                break;
            }
        }

        if installation_id.is_some() && !matched_target {
            return ReplayReport::with_status("no_webhook");
        }

        info!(
            processed = report.processed_deliveries,
            saved = report.saved_repositories,
            "repository linkage replay completed"
        );
        report
    }

    async fn replay_one(&self, event: &InstallationEvent, report: &mut ReplayReport) {
        let installation = match self.store().find_installation(event.installation.id).await {
            Ok(Some(installation)) => installation,
            Ok(None) => {
                warn!(
                    installation_id = event.installation.id,
                    "installation from logged delivery is not mirrored; skipping"
                );
                return;
            }
            Err(e) => {
                report.errors.push(e.to_string());
                return;
            }
        };

        for summary in &event.repositories {
            match self.store().find_repository_by_github_id(summary.id).await {
                Ok(Some(_)) => {} // already mirrored, leave it alone
                Ok(None) => {
                    match self
                        .store()
                        .upsert_repository(
                            Some(installation.id),
                            map::repository_fields_from_summary(summary),
                        )
                        .await
                    {
                        Ok(_) => {
                            report.saved_repositories += 1;
                            info!(full_name = %summary.full_name, "repository restored from log");
                        }
                        Err(e) => {
                            error!(full_name = %summary.full_name, error = %e, "replay upsert failed");
                            report.errors.push(format!("{}: {e}", summary.full_name));
                        }
                    }
                }
                Err(e) => {
                    report.errors.push(format!("{}: {e}", summary.full_name));
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "replay_tests.rs"]
mod tests;
