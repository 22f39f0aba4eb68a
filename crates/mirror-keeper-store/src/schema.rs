//! Schema bootstrap.
//!
//! The DDL is idempotent (`CREATE TABLE IF NOT EXISTS`) and applied at
//! startup. Timestamps are stored as RFC3339 text, list- and map-valued
//! columns as JSON text, UUIDs as text.

use sqlx::sqlite::SqlitePool;

use crate::error::DbError;

const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS installations (
    id                   TEXT PRIMARY KEY,
    installation_id      INTEGER NOT NULL UNIQUE,
    account_login        TEXT NOT NULL,
    account_type         TEXT,
    account_id           INTEGER,
    target_type          TEXT,
    repository_selection TEXT,
    app_id               INTEGER,
    app_slug             TEXT,
    permissions          TEXT NOT NULL DEFAULT '{}',
    events               TEXT NOT NULL DEFAULT '[]',
    suspended_at         TEXT,
    created_at           TEXT NOT NULL,
    updated_at           TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS repositories (
    id              TEXT PRIMARY KEY,
    installation_id TEXT REFERENCES installations(id) ON DELETE SET NULL,
    github_repo_id  INTEGER NOT NULL UNIQUE,
    node_id         TEXT,
    name            TEXT NOT NULL,
    full_name       TEXT NOT NULL,
    owner_login     TEXT NOT NULL,
    owner_type      TEXT,
    private         INTEGER NOT NULL DEFAULT 0,
    description     TEXT,
    fork            INTEGER NOT NULL DEFAULT 0,
    archived        INTEGER NOT NULL DEFAULT 0,
    disabled        INTEGER NOT NULL DEFAULT 0,
    html_url        TEXT,
    default_branch  TEXT,
    language        TEXT,
    topics          TEXT NOT NULL DEFAULT '[]',
    pushed_at       TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS branches (
    id             TEXT PRIMARY KEY,
    repo_id        TEXT NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
    name           TEXT NOT NULL,
    sha            TEXT NOT NULL,
    protected      INTEGER NOT NULL DEFAULT 0,
    commit_message TEXT,
    commit_author  TEXT,
    commit_date    TEXT,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL,
    UNIQUE (repo_id, name)
);

CREATE TABLE IF NOT EXISTS commits (
    id              TEXT PRIMARY KEY,
    repo_id         TEXT NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
    branch_id       TEXT REFERENCES branches(id) ON DELETE SET NULL,
    sha             TEXT NOT NULL,
    node_id         TEXT,
    message         TEXT NOT NULL,
    author_name     TEXT,
    author_email    TEXT,
    author_login    TEXT,
    author_date     TEXT,
    committer_name  TEXT,
    committer_email TEXT,
    committer_date  TEXT,
    tree_sha        TEXT,
    parent_shas     TEXT NOT NULL DEFAULT '[]',
    additions       INTEGER,
    deletions       INTEGER,
    changed_files   INTEGER,
    html_url        TEXT,
    verified        INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL,
    UNIQUE (repo_id, sha)
);

CREATE TABLE IF NOT EXISTS pull_requests (
    id                TEXT PRIMARY KEY,
    repo_id           TEXT NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
    github_pr_id      INTEGER NOT NULL,
    number            INTEGER NOT NULL,
    node_id           TEXT,
    state             TEXT,
    title             TEXT NOT NULL,
    body              TEXT,
    user_login        TEXT,
    user_id           INTEGER,
    head_ref          TEXT,
    head_sha          TEXT,
    base_ref          TEXT,
    base_sha          TEXT,
    draft             INTEGER,
    merged            INTEGER,
    mergeable         INTEGER,
    merged_by         TEXT,
    merged_at         TEXT,
    closed_at         TEXT,
    html_url          TEXT,
    github_updated_at TEXT,
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL,
    UNIQUE (repo_id, number)
);

CREATE TABLE IF NOT EXISTS github_issues (
    id                TEXT PRIMARY KEY,
    repo_id           TEXT NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
    github_issue_id   INTEGER NOT NULL,
    number            INTEGER NOT NULL,
    node_id           TEXT,
    state             TEXT,
    title             TEXT NOT NULL,
    body              TEXT,
    user_login        TEXT,
    user_id           INTEGER,
    labels            TEXT NOT NULL DEFAULT '[]',
    assignees         TEXT NOT NULL DEFAULT '[]',
    milestone         TEXT,
    locked            INTEGER,
    comments_count    INTEGER,
    closed_at         TEXT,
    html_url          TEXT,
    github_updated_at TEXT,
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL,
    UNIQUE (repo_id, number)
);

CREATE TABLE IF NOT EXISTS webhook_deliveries (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    event_type    TEXT NOT NULL,
    delivery_id   TEXT UNIQUE,
    payload       TEXT NOT NULL,
    signature     TEXT,
    processed     INTEGER NOT NULL DEFAULT 0,
    processed_at  TEXT,
    error_message TEXT,
    created_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_repositories_installation
    ON repositories(installation_id);
CREATE INDEX IF NOT EXISTS idx_commits_repo
    ON commits(repo_id);
CREATE INDEX IF NOT EXISTS idx_deliveries_event_type
    ON webhook_deliveries(event_type, created_at);
"#;

/// Apply the schema to a fresh or existing database.
pub async fn init_schema(pool: &SqlitePool) -> Result<(), DbError> {
    sqlx::raw_sql(DDL).execute(pool).await?;
    tracing::debug!("database schema applied");
    Ok(())
}
