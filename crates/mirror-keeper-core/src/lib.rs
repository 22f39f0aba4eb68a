//! # Mirror-Keeper Core
//!
//! The two update paths of the mirror and everything they share:
//!
//! - [`dispatch`]: push path. One authenticated webhook delivery in, audit
//!   log row plus idempotent entity upserts out.
//! - [`sync`]: pull path. Walk the GitHub API for one installation and
//!   reconcile anything webhooks missed, with per-repository failure
//!   isolation and a structured summary.
//! - [`replay`]: backfill repository linkage from previously logged
//!   `installation` deliveries.
//! - [`notify`]: best-effort change notifications to a downstream consumer.
//!
//! Both paths converge on the store's natural-key upserts, which is what
//! makes webhook redelivery and overlapping reconciliation runs safe.

pub mod dispatch;
pub mod error;
pub mod events;
pub mod map;
pub mod notify;
pub mod replay;
pub mod sync;

pub use dispatch::{DispatchOutcome, EventDispatcher};
pub use error::{DispatchError, SyncError};
pub use notify::{ChangeEvent, HttpNotificationSink, NoopNotificationSink, NotificationSink, Notifier};
pub use replay::ReplayReport;
pub use sync::{ReconciliationEngine, SyncSummary};
