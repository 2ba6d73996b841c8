//! Schema bootstrap
//!
//! `ripple-directory -migrate` prepares a database for the whole backend:
//! the directory's own tables plus the relay's event store, so one pass sets
//! up a development environment. Statements are idempotent.

use ripple_common::{AppError, AppResult};
use sqlx::PgPool;

const SCHEMA: &[&str] = &[
    // Directory
    r#"
    CREATE TABLE IF NOT EXISTS conversations (
        id         TEXT PRIMARY KEY,
        conv_type  INT NOT NULL,
        name       TEXT NOT NULL DEFAULT '',
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS conversation_members (
        conversation_id TEXT NOT NULL REFERENCES conversations(id),
        uid             TEXT NOT NULL,
        role            INT NOT NULL DEFAULT 0,
        muted           BOOLEAN NOT NULL DEFAULT FALSE,
        joined_at       TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        PRIMARY KEY (conversation_id, uid)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_conversation_members_uid ON conversation_members (uid)",
    // Relay event store
    r#"
    CREATE TABLE IF NOT EXISTS events (
        id         BIGSERIAL PRIMARY KEY,
        mid        BIGINT NOT NULL,
        cid        TEXT NOT NULL,
        kind       INT NOT NULL,
        sender     TEXT NOT NULL,
        tags       TEXT NOT NULL DEFAULT '[]',
        data       TEXT NOT NULL DEFAULT '{}',
        flags      INT NOT NULL DEFAULT 0,
        sig        TEXT,
        timestamp  BIGINT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (cid, mid)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_events_mid ON events (mid)",
    "CREATE INDEX IF NOT EXISTS idx_events_kind ON events (kind)",
    "CREATE INDEX IF NOT EXISTS idx_events_sender ON events (sender)",
    "CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events (timestamp)",
    r#"
    CREATE TABLE IF NOT EXISTS read_receipts (
        cid           TEXT NOT NULL,
        uid           TEXT NOT NULL,
        last_read_mid BIGINT NOT NULL,
        updated_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        PRIMARY KEY (cid, uid)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS reactions (
        mid        BIGINT NOT NULL,
        cid        TEXT NOT NULL,
        uid        TEXT NOT NULL,
        emoji      TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        PRIMARY KEY (mid, uid, emoji)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_reactions_mid ON reactions (mid)",
];

/// Create all tables and indexes
pub async fn run_migrations(pool: &PgPool) -> AppResult<()> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| AppError::Database(format!("migration failed: {e}")))?;
    }

    tracing::info!(statements = SCHEMA.len(), "schema bootstrapped");
    Ok(())
}
