//! Shadow record reads and the two sync writes (insert, overwrite).

use super::helpers::{fetch_shadow, insert_error};
use super::ShadowStore;
use crate::error::ShadowResult;
use duckdb::params;
use orderdesk_model::{ShadowRecord, SourceRecord};
use std::collections::HashSet;

impl ShadowStore {
    /// Get a shadow record by its id.
    pub fn get_record(&self, id: i64) -> ShadowResult<Option<ShadowRecord>> {
        let conn = self.lock_conn()?;
        fetch_shadow(&conn, "id", id)
    }

    /// Get the mirror of a source record.
    pub fn get_by_original_id(&self, original_id: i64) -> ShadowResult<Option<ShadowRecord>> {
        let conn = self.lock_conn()?;
        fetch_shadow(&conn, "original_id", original_id)
    }

    /// Source ids that already have a mirror.
    pub fn mirrored_original_ids(&self) -> ShadowResult<HashSet<i64>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare("SELECT original_id FROM shadow_records")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(ids)
    }

    /// Insert a fresh, unedited mirror of `source`.
    ///
    /// Fails with `DuplicateMirror` when the source id is already mirrored.
    pub(crate) fn insert_mirror(
        &self,
        source: &SourceRecord,
        is_display_target: bool,
        synced_at: i64,
    ) -> ShadowResult<ShadowRecord> {
        let record = ShadowRecord::from_source(
            source,
            is_display_target,
            self.config.default_status.clone(),
            synced_at,
        );
        let conn = self.lock_conn()?;
        conn.execute(
            r#"INSERT INTO shadow_records (
                   id, original_id, title, customer, created_epoch, created_text, content,
                   status, is_edited, is_display_target, last_sync_at, revision
               ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, FALSE, ?, ?, 0)"#,
            params![
                record.id,
                record.original_id,
                record.title,
                record.customer,
                record.created.epoch_column(),
                record.created.text_column(),
                record.content,
                record.status,
                record.is_display_target,
                synced_at,
            ],
        )
        .map_err(|e| insert_error(source.id, e))?;
        Ok(record)
    }

    /// Overwrite the mirrored fields of an unedited shadow record.
    ///
    /// Returns `false` when the row is edited (or gone) by the time the
    /// statement runs; edited rows are never written by a sync.
    pub(crate) fn overwrite_mirror(
        &self,
        id: i64,
        source: &SourceRecord,
        synced_at: i64,
    ) -> ShadowResult<bool> {
        let conn = self.lock_conn()?;
        let updated = conn.execute(
            r#"UPDATE shadow_records
               SET title = ?, customer = ?, created_epoch = ?, created_text = ?, content = ?,
                   last_sync_at = ?, revision = revision + 1
               WHERE id = ? AND is_edited = FALSE"#,
            params![
                source.title,
                source.customer,
                source.created.epoch_column(),
                source.created.text_column(),
                source.content,
                synced_at,
                id,
            ],
        )?;
        Ok(updated == 1)
    }
}
