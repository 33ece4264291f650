//! Sync log: one `_sync_log` row per sync run.

use super::helpers::now_millis;
use super::sync::SyncTally;
use super::ShadowStore;
use crate::error::{ShadowError, ShadowResult};
use crate::types::{SyncLogEntry, SyncStatus, SyncType};
use duckdb::{params, Connection};
use uuid::Uuid;

const SYNC_LOG_COLUMNS: &str = "id, sync_type, status, records_processed, records_added, \
     records_updated, records_skipped, records_unchanged, records_failed, sync_start_at, \
     sync_end_at, error_message";

fn row_to_entry(row: &duckdb::Row<'_>) -> duckdb::Result<SyncLogEntry> {
    let sync_type: String = row.get(1)?;
    let status: String = row.get(2)?;
    Ok(SyncLogEntry {
        id: row.get(0)?,
        // Only this module writes the column, so unknown values mean a
        // foreign writer; read them as the safer variants.
        sync_type: SyncType::parse(&sync_type).unwrap_or(SyncType::Full),
        status: SyncStatus::parse(&status).unwrap_or(SyncStatus::Failed),
        records_processed: row.get(3)?,
        records_added: row.get(4)?,
        records_updated: row.get(5)?,
        records_skipped: row.get(6)?,
        records_unchanged: row.get(7)?,
        records_failed: row.get(8)?,
        sync_start_at: row.get(9)?,
        sync_end_at: row.get(10)?,
        error_message: row.get(11)?,
    })
}

impl ShadowStore {
    /// Open a `running` log entry and return its id.
    pub(crate) fn start_sync_log(&self, sync_type: SyncType) -> ShadowResult<(String, i64)> {
        let id = Uuid::now_v7().to_string();
        let started_at = now_millis();
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO _sync_log (id, sync_type, status, sync_start_at) VALUES (?, ?, ?, ?)",
            params![id, sync_type.as_str(), SyncStatus::Running.as_str(), started_at],
        )?;
        Ok((id, started_at))
    }

    /// Finalize a running entry as `completed` with the run's counts.
    pub(crate) fn complete_sync_log(&self, id: &str, tally: &SyncTally) -> ShadowResult<()> {
        let conn = self.lock_conn()?;
        let updated = conn.execute(
            r#"UPDATE _sync_log
               SET status = ?, records_processed = ?, records_added = ?, records_updated = ?,
                   records_skipped = ?, records_unchanged = ?, records_failed = ?, sync_end_at = ?
               WHERE id = ? AND status = ?"#,
            params![
                SyncStatus::Completed.as_str(),
                tally.processed,
                tally.added,
                tally.updated,
                tally.skipped,
                tally.unchanged,
                tally.failed,
                now_millis(),
                id,
                SyncStatus::Running.as_str(),
            ],
        )?;
        ensure_finalized(&conn, id, updated)
    }

    /// Finalize a running entry as `failed`.
    pub(crate) fn fail_sync_log(&self, id: &str, message: &str) -> ShadowResult<()> {
        let conn = self.lock_conn()?;
        let updated = conn.execute(
            "UPDATE _sync_log SET status = ?, error_message = ?, sync_end_at = ? WHERE id = ? AND status = ?",
            params![
                SyncStatus::Failed.as_str(),
                message,
                now_millis(),
                id,
                SyncStatus::Running.as_str(),
            ],
        )?;
        ensure_finalized(&conn, id, updated)
    }

    /// Get one sync log entry.
    pub fn get_sync_log(&self, id: &str) -> ShadowResult<Option<SyncLogEntry>> {
        let conn = self.lock_conn()?;
        let result = conn.query_row(
            &format!("SELECT {SYNC_LOG_COLUMNS} FROM _sync_log WHERE id = ?"),
            params![id],
            row_to_entry,
        );
        match result {
            Ok(entry) => Ok(Some(entry)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Most recent sync runs first.
    pub fn sync_history(&self, limit: usize) -> ShadowResult<Vec<SyncLogEntry>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SYNC_LOG_COLUMNS} FROM _sync_log ORDER BY sync_start_at DESC, id DESC LIMIT {limit}"
        ))?;
        let entries = stmt
            .query_map([], row_to_entry)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// The latest run, optionally of one type only.
    pub fn last_sync(&self, sync_type: Option<SyncType>) -> ShadowResult<Option<SyncLogEntry>> {
        let conn = self.lock_conn()?;
        let result = match sync_type {
            Some(t) => conn.query_row(
                &format!(
                    "SELECT {SYNC_LOG_COLUMNS} FROM _sync_log WHERE sync_type = ? ORDER BY sync_start_at DESC, id DESC LIMIT 1"
                ),
                params![t.as_str()],
                row_to_entry,
            ),
            None => conn.query_row(
                &format!(
                    "SELECT {SYNC_LOG_COLUMNS} FROM _sync_log ORDER BY sync_start_at DESC, id DESC LIMIT 1"
                ),
                [],
                row_to_entry,
            ),
        };
        match result {
            Ok(entry) => Ok(Some(entry)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Distinguish "no such entry" from "entry already finalized".
fn ensure_finalized(conn: &Connection, id: &str, updated: usize) -> ShadowResult<()> {
    if updated == 1 {
        return Ok(());
    }
    let status = conn.query_row(
        "SELECT status FROM _sync_log WHERE id = ?",
        params![id],
        |row| row.get::<_, String>(0),
    );
    match status {
        Ok(status) => Err(ShadowError::InvalidState(format!(
            "sync log {id} is already {status}"
        ))),
        Err(duckdb::Error::QueryReturnedNoRows) => {
            Err(ShadowError::NotFound(format!("sync log {id}")))
        }
        Err(e) => Err(e.into()),
    }
}
