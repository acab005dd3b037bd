//! Schema bootstrap for the real-time core's tables.
//!
//! Idempotent: every statement is `IF NOT EXISTS`, so running migrations on
//! an already-initialized database is safe.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::info;

const SCHEMA: &[&str] = &[
    // status is the integer lifecycle rank: 0 sent, 1 delivered, 2 read.
    // A message targets a receiver XOR a group; the CHECK enforces it at
    // the storage layer as well.
    "CREATE TABLE IF NOT EXISTS messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        sender_id INTEGER NOT NULL,
        receiver_id INTEGER,
        group_id INTEGER,
        content TEXT NOT NULL,
        kind TEXT NOT NULL DEFAULT 'text',
        status INTEGER NOT NULL DEFAULT 0,
        reply_to_id INTEGER,
        is_revoked INTEGER NOT NULL DEFAULT 0,
        revoked_at TEXT,
        created_at TEXT NOT NULL,
        CHECK ((receiver_id IS NULL) != (group_id IS NULL))
    )",
    "CREATE INDEX IF NOT EXISTS idx_messages_receiver
        ON messages (receiver_id, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_messages_group
        ON messages (group_id, created_at)",
    "CREATE TABLE IF NOT EXISTS group_members (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        group_id INTEGER NOT NULL,
        user_id INTEGER NOT NULL,
        role TEXT NOT NULL DEFAULT 'member',
        join_status TEXT NOT NULL DEFAULT 'active',
        joined_at TEXT NOT NULL,
        UNIQUE (group_id, user_id)
    )",
    "CREATE INDEX IF NOT EXISTS idx_group_members_group
        ON group_members (group_id, join_status)",
];

/// Apply the schema to the given pool.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .context("schema statement failed")?;
    }
    info!("database schema up to date");
    Ok(())
}
