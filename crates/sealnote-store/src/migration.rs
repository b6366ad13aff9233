//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL batch
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// Idempotent. Returns the number of migrations applied by this call.
pub fn migrate(conn: &mut Connection) -> Result<u32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current = current_version(conn)?;
    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {current} is newer than supported version {CURRENT_VERSION}"
        )));
    }
    if current == CURRENT_VERSION {
        return Ok(0);
    }

    let tx = conn.transaction()?;
    for version in (current + 1)..=CURRENT_VERSION {
        apply_migration(&tx, version)?;

        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            rusqlite::params![version, chrono::Utc::now().timestamp_millis()],
        )?;
        tracing::info!(version, "applied schema migration");
    }
    tx.commit()?;

    Ok(CURRENT_VERSION - current)
}

/// The highest applied migration version, or 0 for a fresh database.
pub fn current_version(conn: &Connection) -> Result<u32> {
    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Registered accounts
        CREATE TABLE users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,          -- lower-cased
            public_key TEXT NOT NULL,            -- base64, 32 bytes
            login_salt TEXT NOT NULL,
            encryption_salt TEXT NOT NULL,
            hmac_salt TEXT NOT NULL,
            hmac_type TEXT NOT NULL,
            encryption_type TEXT NOT NULL,
            created_at INTEGER NOT NULL          -- Unix ms
        );

        -- One-time login challenges
        CREATE TABLE challenges (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            challenge_value TEXT NOT NULL UNIQUE, -- base64, 32 random bytes
            expires_at INTEGER NOT NULL,          -- Unix ms
            used INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL           -- Unix ms
        );

        -- Hash-chained note history
        CREATE TABLE blocks (
            id INTEGER PRIMARY KEY AUTOINCREMENT, -- insertion order, breaks timestamp ties
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            note_id INTEGER NOT NULL,
            prev_hash TEXT NOT NULL,
            timestamp INTEGER NOT NULL,           -- Unix seconds
            iv TEXT NOT NULL,
            iv_title TEXT NOT NULL,
            cipher_title TEXT NOT NULL,
            ciphertext TEXT NOT NULL,
            mac TEXT NOT NULL,
            signature TEXT NOT NULL,

            UNIQUE(user_id, note_id, prev_hash)
        );

        CREATE INDEX idx_blocks_note ON blocks(user_id, note_id, timestamp, id);
        CREATE INDEX idx_challenges_expires ON challenges(expires_at);
        "#,
    )?;

    Ok(())
}
