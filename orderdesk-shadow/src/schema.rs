//! DDL for the shadow store and the DuckDB-backed source ledger.

use crate::error::ShadowResult;
use duckdb::Connection;

/// Shadow records: one editable mirror per source record.
///
/// `id` is the source id copied verbatim; `original_id` repeats it under a
/// separate UNIQUE constraint so the mirror link survives any future
/// renumbering of shadow ids.
const SHADOW_RECORDS_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS shadow_records (
    id BIGINT PRIMARY KEY,
    original_id BIGINT NOT NULL UNIQUE,
    title VARCHAR NOT NULL,
    customer VARCHAR NOT NULL DEFAULT '',
    created_epoch BIGINT,
    created_text VARCHAR,
    content TEXT NOT NULL DEFAULT '',
    status VARCHAR NOT NULL,
    is_edited BOOLEAN NOT NULL DEFAULT FALSE,
    is_display_target BOOLEAN NOT NULL DEFAULT TRUE,
    last_sync_at BIGINT,
    edited_at BIGINT,
    edited_by VARCHAR,
    revision BIGINT NOT NULL DEFAULT 0
);
"#;

/// Sync log: one row per sync run.
const SYNC_LOG_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS _sync_log (
    id VARCHAR PRIMARY KEY,
    sync_type VARCHAR NOT NULL,
    status VARCHAR NOT NULL,
    records_processed BIGINT NOT NULL DEFAULT 0,
    records_added BIGINT NOT NULL DEFAULT 0,
    records_updated BIGINT NOT NULL DEFAULT 0,
    records_skipped BIGINT NOT NULL DEFAULT 0,
    records_unchanged BIGINT NOT NULL DEFAULT 0,
    records_failed BIGINT NOT NULL DEFAULT 0,
    sync_start_at BIGINT NOT NULL,
    sync_end_at BIGINT,
    error_message VARCHAR
);
"#;

/// Intake records, as written by the intake side.
const SOURCE_RECORDS_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS source_records (
    id BIGINT PRIMARY KEY,
    title VARCHAR NOT NULL,
    customer VARCHAR NOT NULL DEFAULT '',
    created_epoch BIGINT,
    created_text VARCHAR,
    content TEXT NOT NULL DEFAULT ''
);
"#;

/// Initialize the shadow store tables.
pub fn initialize_shadow_schema(conn: &Connection) -> ShadowResult<()> {
    conn.execute_batch(SHADOW_RECORDS_DDL)?;
    conn.execute_batch(SYNC_LOG_DDL)?;
    Ok(())
}

/// Initialize the source ledger table.
pub fn initialize_ledger_schema(conn: &Connection) -> ShadowResult<()> {
    conn.execute_batch(SOURCE_RECORDS_DDL)?;
    Ok(())
}
