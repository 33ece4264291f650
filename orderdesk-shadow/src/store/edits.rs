//! Staff edits: single-field updates, whole-content replacement, revert.
//!
//! Every write marks the record edited and bumps `revision`. The UPDATE is
//! guarded by the revision read at the start, so a write that raced another
//! process fails with `Conflict` instead of silently merging.

use super::helpers::{fetch_shadow, now_millis, with_transaction};
use super::ShadowStore;
use crate::error::{ShadowError, ShadowResult};
use crate::ledger::SourceLedger;
use crate::types::{FieldTarget, UpdateResult, UpdateStatus};
use duckdb::{params, Connection, Params};
use orderdesk_model::{encode, try_decode, Document};
use tracing::{debug, info};

const CONTENT_FIELD: &str = "content";

/// Execute a revision-guarded UPDATE; zero affected rows is a conflict.
fn guarded_update(conn: &Connection, id: i64, sql: &str, params: impl Params) -> ShadowResult<()> {
    match conn.execute(sql, params)? {
        0 => Err(ShadowError::Conflict(id)),
        _ => Ok(()),
    }
}

impl ShadowStore {
    /// Set one field of a shadow record.
    ///
    /// `field_name` is resolved through [`FieldTarget::resolve`]: structured
    /// names write their column, anything else upserts the matching entry
    /// of the content's `attrs` list.
    pub fn update_field(
        &self,
        id: i64,
        field_name: &str,
        value: &str,
        editor: &str,
    ) -> ShadowResult<UpdateResult> {
        if field_name.trim().is_empty() {
            return Err(ShadowError::InvalidInput("field name is empty".into()));
        }
        let target = FieldTarget::resolve(field_name);

        let conn = self.lock_conn()?;
        let result = with_transaction(&conn, |conn| {
            let Some(record) = fetch_shadow(conn, "id", id)? else {
                return Ok(UpdateResult::new(UpdateStatus::NotFound, field_name, value, None));
            };
            let edited_at = now_millis();

            match &target {
                FieldTarget::StructuredColumn(column) => {
                    if column.read(&record) == value {
                        return Ok(UpdateResult::new(UpdateStatus::NoOp, field_name, value, None));
                    }
                    let sql = format!(
                        "UPDATE shadow_records SET {} = ?, is_edited = TRUE, edited_at = ?, \
                         edited_by = ?, revision = revision + 1 WHERE id = ? AND revision = ?",
                        column.sql_name()
                    );
                    guarded_update(
                        conn,
                        id,
                        &sql,
                        params![value, edited_at, editor, id, record.revision],
                    )?;
                }
                FieldTarget::AttributeEntry(name) => {
                    let mut doc = try_decode(&record.content).map_err(|e| {
                        ShadowError::MalformedContent(format!("record {id}: {e}"))
                    })?;
                    let change = doc.upsert_attr(name.as_str(), value);
                    if !change.is_change() {
                        return Ok(UpdateResult::new(UpdateStatus::NoOp, field_name, value, None));
                    }
                    debug!(id, attr = %name, ?change, "attr upserted");
                    write_content(conn, id, record.revision, &encode(&doc), edited_at, editor)?;
                }
            }

            Ok(UpdateResult::new(UpdateStatus::Updated, field_name, value, Some(edited_at)))
        })?;

        if result.status == UpdateStatus::Updated {
            info!(id, field = field_name, editor, "shadow record field updated");
        }
        Ok(result)
    }

    /// Replace the whole content document of a shadow record.
    pub fn update_content(
        &self,
        id: i64,
        document: &Document,
        editor: &str,
    ) -> ShadowResult<UpdateResult> {
        let blob = encode(document);

        let conn = self.lock_conn()?;
        let result = with_transaction(&conn, |conn| {
            let Some(record) = fetch_shadow(conn, "id", id)? else {
                return Ok(UpdateResult::new(UpdateStatus::NotFound, CONTENT_FIELD, blob.as_str(), None));
            };
            if record.content == blob {
                return Ok(UpdateResult::new(UpdateStatus::NoOp, CONTENT_FIELD, blob.as_str(), None));
            }
            let edited_at = now_millis();
            write_content(conn, id, record.revision, &blob, edited_at, editor)?;
            Ok(UpdateResult::new(UpdateStatus::Updated, CONTENT_FIELD, blob.as_str(), Some(edited_at)))
        })?;

        if result.status == UpdateStatus::Updated {
            info!(id, editor, "shadow record content replaced");
        }
        Ok(result)
    }

    /// Discard hand edits and restore the record from its source.
    ///
    /// The mirrored fields are re-read from the ledger, `status` goes back
    /// to the configured default and the edit metadata is cleared, so the
    /// next full sync refreshes the record again.
    pub fn revert_to_source(
        &self,
        id: i64,
        ledger: &dyn SourceLedger,
    ) -> ShadowResult<UpdateStatus> {
        let Some(record) = self.get_record(id)? else {
            return Ok(UpdateStatus::NotFound);
        };
        let Some(source) = ledger.fetch_source_record(record.original_id)? else {
            return Ok(UpdateStatus::NotFound);
        };
        let default_status = &self.config.default_status;
        if !record.is_edited && record.mirrors(&source) && record.status == *default_status {
            return Ok(UpdateStatus::NoOp);
        }

        let conn = self.lock_conn()?;
        guarded_update(
            &conn,
            id,
            r#"UPDATE shadow_records
               SET title = ?, customer = ?, created_epoch = ?, created_text = ?, content = ?,
                   status = ?, is_edited = FALSE, edited_at = NULL, edited_by = NULL,
                   last_sync_at = ?, revision = revision + 1
               WHERE id = ? AND revision = ?"#,
            params![
                source.title,
                source.customer,
                source.created.epoch_column(),
                source.created.text_column(),
                source.content,
                default_status.as_str(),
                now_millis(),
                id,
                record.revision,
            ],
        )?;

        info!(id, original_id = record.original_id, "shadow record reverted to source");
        Ok(UpdateStatus::Updated)
    }
}

fn write_content(
    conn: &Connection,
    id: i64,
    revision: i64,
    content: &str,
    edited_at: i64,
    editor: &str,
) -> ShadowResult<()> {
    guarded_update(
        conn,
        id,
        "UPDATE shadow_records SET content = ?, is_edited = TRUE, edited_at = ?, edited_by = ?, \
         revision = revision + 1 WHERE id = ? AND revision = ?",
        params![content, edited_at, editor, id, revision],
    )
}
