//! Shared helper functions for shadow store operations.

use crate::error::{ShadowError, ShadowResult};
use duckdb::{params, Connection};
use orderdesk_model::{ShadowRecord, SourceTimestamp};
use tracing::warn;

/// Column list matching [`row_to_shadow`].
pub(crate) const SHADOW_COLUMNS: &str = "id, original_id, title, customer, created_epoch, \
     created_text, content, status, is_edited, is_display_target, last_sync_at, edited_at, \
     edited_by, revision";

pub(crate) fn row_to_shadow(row: &duckdb::Row<'_>) -> duckdb::Result<ShadowRecord> {
    Ok(ShadowRecord {
        id: row.get(0)?,
        original_id: row.get(1)?,
        title: row.get(2)?,
        customer: row.get(3)?,
        created: SourceTimestamp::from_columns(row.get(4)?, row.get(5)?),
        content: row.get(6)?,
        status: row.get(7)?,
        is_edited: row.get(8)?,
        is_display_target: row.get(9)?,
        last_sync_at: row.get(10)?,
        edited_at: row.get(11)?,
        edited_by: row.get(12)?,
        revision: row.get(13)?,
    })
}

/// Load one shadow record by a key column (`id` or `original_id`).
pub(crate) fn fetch_shadow(
    conn: &Connection,
    key_column: &str,
    key: i64,
) -> ShadowResult<Option<ShadowRecord>> {
    let sql = format!("SELECT {SHADOW_COLUMNS} FROM shadow_records WHERE {key_column} = ?");
    match conn.query_row(&sql, params![key], row_to_shadow) {
        Ok(record) => Ok(Some(record)),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Run `body` inside a transaction, rolling back on any error.
pub(crate) fn with_transaction<T>(
    conn: &Connection,
    body: impl FnOnce(&Connection) -> ShadowResult<T>,
) -> ShadowResult<T> {
    conn.execute_batch("BEGIN TRANSACTION")?;
    match body(conn) {
        Ok(value) => {
            conn.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = conn.execute_batch("ROLLBACK") {
                warn!(error = %rollback_err, cause = %e, "transaction rollback failed");
            }
            Err(e)
        }
    }
}

/// Whether an insert failed on the primary key / unique constraint.
pub(crate) fn is_duplicate_key(err: &duckdb::Error) -> bool {
    let msg = err.to_string();
    msg.contains("Duplicate key")
        || msg.contains("violates primary key")
        || msg.contains("violates unique")
}

/// Map an insert error, turning key collisions into `DuplicateMirror`.
pub(crate) fn insert_error(source_id: i64, err: duckdb::Error) -> ShadowError {
    if is_duplicate_key(&err) {
        ShadowError::DuplicateMirror(source_id)
    } else {
        ShadowError::DuckDb(err)
    }
}

/// Current time in milliseconds since Unix epoch.
pub(crate) fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::initialize_shadow_schema;

    fn count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM shadow_records", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn failed_body_rolls_back() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_shadow_schema(&conn).unwrap();

        let result: ShadowResult<()> = with_transaction(&conn, |conn| {
            conn.execute(
                "INSERT INTO shadow_records (id, original_id, title, status) VALUES (1, 1, 'x', 'new')",
                [],
            )?;
            Err(ShadowError::Conflict(1))
        });
        assert!(matches!(result, Err(ShadowError::Conflict(1))));
        assert_eq!(count(&conn), 0);

        // The connection is usable again after the rollback.
        with_transaction(&conn, |conn| {
            conn.execute(
                "INSERT INTO shadow_records (id, original_id, title, status) VALUES (2, 2, 'y', 'new')",
                [],
            )?;
            Ok(())
        })
        .unwrap();
        assert_eq!(count(&conn), 1);
    }
}
