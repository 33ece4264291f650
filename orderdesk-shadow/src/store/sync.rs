//! Sync engine: mirror source ledger records into the shadow table.
//!
//! Each run is logged in `_sync_log`. Per-record failures are counted and
//! the run continues; fatal errors (storage gone, ledger unreachable) abort
//! it and finalize the log entry as `failed`.

use super::ShadowStore;
use crate::error::{ShadowError, ShadowResult};
use crate::ledger::SourceLedger;
use crate::types::{SyncReport, SyncStatus, SyncType};
use orderdesk_model::SourceRecord;
use std::cmp::Reverse;
use std::time::Instant;
use tracing::{debug, info, warn};

/// What happened to one source record during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MirrorOutcome {
    Added,
    Updated,
    Unchanged,
    /// Edited mirror, left alone.
    Skipped,
}

/// Running counts for one sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SyncTally {
    pub processed: i64,
    pub added: i64,
    pub updated: i64,
    pub skipped: i64,
    pub unchanged: i64,
    pub failed: i64,
    pub skipped_ids: Vec<i64>,
    pub failed_ids: Vec<i64>,
}

impl SyncTally {
    /// Fold one record's outcome into the tally. Fatal errors stop the fold.
    pub(crate) fn absorb(
        mut self,
        source_id: i64,
        outcome: ShadowResult<MirrorOutcome>,
    ) -> ShadowResult<Self> {
        self.processed += 1;
        match outcome {
            Ok(MirrorOutcome::Added) => self.added += 1,
            Ok(MirrorOutcome::Updated) => self.updated += 1,
            Ok(MirrorOutcome::Unchanged) => self.unchanged += 1,
            Ok(MirrorOutcome::Skipped) => {
                self.skipped += 1;
                self.skipped_ids.push(source_id);
            }
            Err(ShadowError::DuplicateMirror(_)) => {
                warn!(source_id, "source record mirrored concurrently, skipping");
                self.skipped += 1;
                self.skipped_ids.push(source_id);
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(source_id, error = %e, "failed to mirror source record");
                self.failed += 1;
                self.failed_ids.push(source_id);
            }
        }
        Ok(self)
    }

    fn into_report(self, sync_id: String, sync_type: SyncType, duration_ms: i64) -> SyncReport {
        SyncReport {
            sync_id,
            sync_type,
            status: SyncStatus::Completed,
            records_processed: self.processed,
            records_added: self.added,
            records_updated: self.updated,
            records_skipped: self.skipped,
            records_unchanged: self.unchanged,
            records_failed: self.failed,
            duration_ms,
            skipped_ids: self.skipped_ids,
            failed_ids: self.failed_ids,
        }
    }
}

/// All source records, newest first. Records without a usable `created`
/// sort last.
fn fetch_sources(ledger: &dyn SourceLedger) -> ShadowResult<Vec<SourceRecord>> {
    let mut sources = ledger.fetch_source_records().map_err(|e| match e {
        ShadowError::Unavailable(_) => e,
        other => ShadowError::Unavailable(format!("source ledger: {other}")),
    })?;
    sources.sort_by_cached_key(|s| Reverse((s.created.to_utc(), s.id)));
    Ok(sources)
}

impl ShadowStore {
    /// Mirror source records that have no shadow record yet.
    ///
    /// New mirrors are classified with the store's configured
    /// [`DisplayClassifier`].
    pub fn sync_incremental(&self, ledger: &dyn SourceLedger) -> ShadowResult<SyncReport> {
        self.run_logged(SyncType::Incremental, |synced_at| {
            let mirrored = self.mirrored_original_ids()?;
            let candidates: Vec<SourceRecord> = fetch_sources(ledger)?
                .into_iter()
                .filter(|s| !mirrored.contains(&s.id))
                .collect();
            debug!(
                candidates = candidates.len(),
                mirrored = mirrored.len(),
                "incremental sync candidates"
            );

            candidates.iter().try_fold(SyncTally::default(), |tally, source| {
                let outcome = self
                    .insert_mirror(source, self.is_display_target(source), synced_at)
                    .map(|_| MirrorOutcome::Added);
                tally.absorb(source.id, outcome)
            })
        })
    }

    /// Reconcile every source record: insert missing mirrors and refresh
    /// unedited ones whose source changed. Edited mirrors are skipped.
    pub fn sync_full(&self, ledger: &dyn SourceLedger) -> ShadowResult<SyncReport> {
        self.run_logged(SyncType::Full, |synced_at| {
            let sources = fetch_sources(ledger)?;
            debug!(sources = sources.len(), "full sync sources");

            sources.iter().try_fold(SyncTally::default(), |tally, source| {
                let outcome = self.mirror_full(source, synced_at);
                tally.absorb(source.id, outcome)
            })
        })
    }

    fn is_display_target(&self, source: &SourceRecord) -> bool {
        self.classifier.is_display_target(&source.title)
    }

    fn mirror_full(&self, source: &SourceRecord, synced_at: i64) -> ShadowResult<MirrorOutcome> {
        match self.get_by_original_id(source.id)? {
            None => self
                .insert_mirror(source, self.is_display_target(source), synced_at)
                .map(|_| MirrorOutcome::Added),
            Some(existing) if existing.is_edited => Ok(MirrorOutcome::Skipped),
            Some(existing) if existing.mirrors(source) => Ok(MirrorOutcome::Unchanged),
            Some(existing) => {
                if self.overwrite_mirror(existing.id, source, synced_at)? {
                    Ok(MirrorOutcome::Updated)
                } else {
                    // Edited between the read and the write.
                    Ok(MirrorOutcome::Skipped)
                }
            }
        }
    }

    /// Wrap a run in its sync log entry and build the report.
    fn run_logged(
        &self,
        sync_type: SyncType,
        body: impl FnOnce(i64) -> ShadowResult<SyncTally>,
    ) -> ShadowResult<SyncReport> {
        let timer = Instant::now();
        let (sync_id, started_at) = self.start_sync_log(sync_type)?;
        info!(sync_id = %sync_id, sync_type = %sync_type, "sync started");

        match body(started_at) {
            Ok(tally) => {
                self.complete_sync_log(&sync_id, &tally)?;
                let duration_ms = timer.elapsed().as_millis() as i64;
                info!(
                    sync_id = %sync_id,
                    sync_type = %sync_type,
                    processed = tally.processed,
                    added = tally.added,
                    updated = tally.updated,
                    skipped = tally.skipped,
                    unchanged = tally.unchanged,
                    failed = tally.failed,
                    duration_ms,
                    "sync completed"
                );
                Ok(tally.into_report(sync_id, sync_type, duration_ms))
            }
            Err(e) => {
                warn!(sync_id = %sync_id, sync_type = %sync_type, error = %e, "sync failed");
                if let Err(log_err) = self.fail_sync_log(&sync_id, &e.to_string()) {
                    warn!(sync_id = %sync_id, error = %log_err, "could not finalize sync log");
                }
                Err(e)
            }
        }
    }
}
