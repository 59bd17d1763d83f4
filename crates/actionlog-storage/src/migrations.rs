//! Database schema migrations.
//!
//! Applies the initial schema: the action_records table with its tag and
//! metadata side tables, plus schema_migrations.

use rusqlite::Connection;
use tracing::info;

use actionlog_core::error::ActionLogError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), ActionLogError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| ActionLogError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| {
            ActionLogError::Storage(format!("Failed to query migration version: {}", e))
        })?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: action_log");
    }

    Ok(())
}

/// Version 1: action records, relationship tags, auxiliary metadata.
fn apply_v1(conn: &Connection) -> Result<(), ActionLogError> {
    conn.execute_batch(
        "
        -- One row per (node id, node type, stream) triple.
        CREATE TABLE IF NOT EXISTS action_records (
            id              TEXT PRIMARY KEY NOT NULL,
            dedup_key       TEXT NOT NULL UNIQUE,
            title           TEXT NOT NULL DEFAULT '',
            slug            TEXT NOT NULL DEFAULT '',
            visibility      TEXT NOT NULL DEFAULT 'private'
                            CHECK (visibility IN ('private', 'publish')),
            created_at      INTEGER NOT NULL,
            modified_at     INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_action_records_modified
            ON action_records (modified_at DESC);

        CREATE INDEX IF NOT EXISTS idx_action_records_visibility
            ON action_records (visibility, modified_at DESC);

        CREATE TABLE IF NOT EXISTS action_record_tags (
            record_id       TEXT NOT NULL,
            taxonomy        TEXT NOT NULL
                            CHECK (taxonomy IN ('node_dbid', 'node_type', 'action_type', 'stream_type')),
            term            TEXT NOT NULL,
            PRIMARY KEY (record_id, taxonomy),
            FOREIGN KEY (record_id) REFERENCES action_records(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_action_record_tags_term
            ON action_record_tags (taxonomy, term);

        CREATE TABLE IF NOT EXISTS action_record_meta (
            record_id       TEXT NOT NULL,
            meta_key        TEXT NOT NULL,
            meta_value      TEXT NOT NULL DEFAULT '',
            PRIMARY KEY (record_id, meta_key),
            FOREIGN KEY (record_id) REFERENCES action_records(id) ON DELETE CASCADE
        );

        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (1, 'action_log');
        ",
    )
    .map_err(|e| ActionLogError::Storage(format!("Failed to apply migration v1: {}", e)))?;

    Ok(())
}
