use orderdesk_model::{SourceRecord, SourceTimestamp};
use orderdesk_shadow::{
    MemoryLedger, ShadowConfig, ShadowError, ShadowResult, ShadowStore, SourceLedger, SyncStatus,
    SyncType, UpdateStatus,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::HashSet;

fn source(id: i64, title: &str) -> SourceRecord {
    SourceRecord::new(
        id,
        title,
        "大島商店",
        SourceTimestamp::Epoch(1_700_000_000 + id),
        json!({"attrs": [{"name": "注文担当", "value": "大島"}]}).to_string(),
    )
}

fn three_sources() -> MemoryLedger {
    MemoryLedger::from_records([
        source(1, "シルクスカーフ注文"),
        source(2, "ネクタイ注文"),
        source(3, "ストール注文"),
    ])
}

/// A ledger that cannot be reached.
struct DownLedger;

impl SourceLedger for DownLedger {
    fn fetch_source_records(&self) -> ShadowResult<Vec<SourceRecord>> {
        Err(ShadowError::Unavailable("ledger offline".into()))
    }

    fn fetch_source_record(&self, _id: i64) -> ShadowResult<Option<SourceRecord>> {
        Err(ShadowError::Unavailable("ledger offline".into()))
    }
}

/// A ledger that reports the same record twice, as two racing readers would.
struct EchoLedger(SourceRecord);

impl SourceLedger for EchoLedger {
    fn fetch_source_records(&self) -> ShadowResult<Vec<SourceRecord>> {
        Ok(vec![self.0.clone(), self.0.clone()])
    }

    fn fetch_source_record(&self, id: i64) -> ShadowResult<Option<SourceRecord>> {
        Ok((id == self.0.id).then(|| self.0.clone()))
    }
}

// ── Incremental ──────────────────────────────────────────────────

#[test]
fn incremental_mirrors_new_records() {
    let store = ShadowStore::open_in_memory().unwrap();
    let ledger = three_sources();

    let report = store.sync_incremental(&ledger).unwrap();
    assert_eq!(report.sync_type, SyncType::Incremental);
    assert_eq!(report.status, SyncStatus::Completed);
    assert_eq!(report.records_processed, 3);
    assert_eq!(report.records_added, 3);
    assert_eq!(report.records_failed, 0);

    let shadow = store.get_record(2).unwrap().unwrap();
    assert_eq!(shadow.original_id, 2);
    assert_eq!(shadow.title, "ネクタイ注文");
    assert!(!shadow.is_edited);
    assert!(shadow.is_display_target);
    assert_eq!(shadow.status, "new");
    assert!(shadow.last_sync_at.is_some());
}

#[test]
fn incremental_only_picks_up_unmirrored_ids() {
    let store = ShadowStore::open_in_memory().unwrap();
    let ledger = three_sources();
    store.sync_incremental(&ledger).unwrap();

    ledger.upsert(source(4, "ハンカチ注文"));
    // Upstream edits are not an incremental concern.
    ledger.upsert(source(1, "シルクスカーフ注文（変更）"));

    let report = store.sync_incremental(&ledger).unwrap();
    assert_eq!(report.records_processed, 1);
    assert_eq!(report.records_added, 1);
    assert_eq!(store.get_record(1).unwrap().unwrap().title, "シルクスカーフ注文");
    assert!(store.get_record(4).unwrap().is_some());
}

#[test]
fn excluded_titles_are_mirrored_but_hidden() {
    let store = ShadowStore::open_in_memory().unwrap();
    let ledger = MemoryLedger::from_records([
        source(1, "サンプル請求フォーム"),
        source(2, "シルクスカーフ注文"),
    ]);
    store.sync_incremental(&ledger).unwrap();

    assert!(!store.get_record(1).unwrap().unwrap().is_display_target);
    assert!(store.get_record(2).unwrap().unwrap().is_display_target);
    assert_eq!(store.count_orders().unwrap(), 1);
}

#[test]
fn configured_exclusions_apply_to_new_mirrors() {
    let config = ShadowConfig {
        exclusion_patterns: Some(vec!["社内".into()]),
        ..ShadowConfig::default()
    };
    let store = ShadowStore::open_in_memory_with_config(config).unwrap();
    let ledger = MemoryLedger::from_records([
        source(1, "社内用スカーフ"),
        source(2, "サンプル請求フォーム"),
    ]);

    store.sync_incremental(&ledger).unwrap();
    ledger.upsert(source(3, "社内ストール"));
    store.sync_full(&ledger).unwrap();

    assert!(!store.get_record(1).unwrap().unwrap().is_display_target);
    assert!(store.get_record(2).unwrap().unwrap().is_display_target);
    assert!(!store.get_record(3).unwrap().unwrap().is_display_target);
}

#[test]
fn halfwidth_inquiry_titles_are_hidden() {
    let store = ShadowStore::open_in_memory().unwrap();
    let ledger = MemoryLedger::from_records([source(1, "ｻﾝﾌﾟﾙ請求フォーム")]);
    store.sync_incremental(&ledger).unwrap();
    assert!(!store.get_record(1).unwrap().unwrap().is_display_target);
}

#[test]
fn extreme_created_values_do_not_abort_the_run() {
    let store = ShadowStore::open_in_memory().unwrap();
    let ledger = MemoryLedger::from_records([
        source(1, "シルクスカーフ注文"),
        SourceRecord::new(2, "ネクタイ注文", "", SourceTimestamp::Epoch(i64::MIN), "{}"),
        SourceRecord::new(
            3,
            "ストール注文",
            "",
            SourceTimestamp::Text("-9223372036854775808".into()),
            "{}",
        ),
    ]);

    let report = store.sync_full(&ledger).unwrap();
    assert_eq!(report.status, SyncStatus::Completed);
    assert_eq!(report.records_added, 3);

    let view = store.get_order(2).unwrap().unwrap();
    assert!(view.date_is_fallback);
    assert_eq!(
        store.last_sync(None).unwrap().unwrap().status,
        SyncStatus::Completed
    );
}

// ── Full ─────────────────────────────────────────────────────────

#[test]
fn full_sync_twice_adds_and_updates_nothing() {
    let store = ShadowStore::open_in_memory().unwrap();
    let ledger = three_sources();

    let first = store.sync_full(&ledger).unwrap();
    assert_eq!(first.records_added, 3);

    let second = store.sync_full(&ledger).unwrap();
    assert_eq!(second.records_processed, 3);
    assert_eq!(second.records_added, 0);
    assert_eq!(second.records_updated, 0);
    assert_eq!(second.records_unchanged, 3);
    assert_eq!(second.records_skipped, 0);
}

#[test]
fn full_sync_refreshes_unedited_mirrors() {
    let store = ShadowStore::open_in_memory().unwrap();
    let ledger = three_sources();
    store.sync_full(&ledger).unwrap();
    let before = store.get_record(3).unwrap().unwrap();

    let mut changed = source(3, "ストール注文 追加");
    changed.customer = "山田織物".into();
    ledger.upsert(changed);

    let report = store.sync_full(&ledger).unwrap();
    assert_eq!(report.records_updated, 1);
    assert_eq!(report.records_unchanged, 2);

    let after = store.get_record(3).unwrap().unwrap();
    assert_eq!(after.title, "ストール注文 追加");
    assert_eq!(after.customer, "山田織物");
    assert!(!after.is_edited);
    assert_eq!(after.revision, before.revision + 1);
}

#[test]
fn display_target_is_frozen_at_first_mirror() {
    let store = ShadowStore::open_in_memory().unwrap();
    let ledger = MemoryLedger::from_records([source(1, "シルクスカーフ注文")]);
    store.sync_full(&ledger).unwrap();

    ledger.upsert(source(1, "テスト送信"));
    let report = store.sync_full(&ledger).unwrap();
    assert_eq!(report.records_updated, 1);

    let shadow = store.get_record(1).unwrap().unwrap();
    assert_eq!(shadow.title, "テスト送信");
    assert!(shadow.is_display_target);
}

#[test]
fn full_sync_never_touches_edited_records() {
    let store = ShadowStore::open_in_memory().unwrap();
    let ledger = three_sources();
    store.sync_full(&ledger).unwrap();

    store.update_field(1, "注文担当", "山田", "staff").unwrap();
    let edited = store.get_record(1).unwrap().unwrap();

    ledger.upsert(SourceRecord::new(
        1,
        "サンプル請求",
        "別の顧客",
        SourceTimestamp::Text("2020-01-01".into()),
        "{}",
    ));
    let report = store.sync_full(&ledger).unwrap();
    assert_eq!(report.records_skipped, 1);
    assert_eq!(report.skipped_ids, vec![1]);

    assert_eq!(store.get_record(1).unwrap().unwrap(), edited);
}

#[test]
fn scenario_edit_then_full_sync() {
    let store = ShadowStore::open_in_memory().unwrap();
    let ledger = three_sources();

    let report = store.sync_incremental(&ledger).unwrap();
    assert_eq!(report.records_added, 3);

    let edit = store.update_field(2, "title", "ネクタイ注文（社内修正）", "staff").unwrap();
    assert_eq!(edit.status, UpdateStatus::Updated);

    for id in 1..=3 {
        ledger.upsert(source(id, &format!("改訂 {id}")));
    }

    let report = store.sync_full(&ledger).unwrap();
    assert_eq!(report.records_updated, 2);
    assert_eq!(report.records_skipped, 1);
    assert_eq!(report.skipped_ids, vec![2]);

    assert_eq!(store.get_record(1).unwrap().unwrap().title, "改訂 1");
    assert_eq!(store.get_record(2).unwrap().unwrap().title, "ネクタイ注文（社内修正）");
    assert_eq!(store.get_record(3).unwrap().unwrap().title, "改訂 3");
}

// ── Mirror uniqueness ────────────────────────────────────────────

#[test]
fn repeated_syncs_never_duplicate_mirrors() {
    let store = ShadowStore::open_in_memory().unwrap();
    let ledger = three_sources();

    store.sync_incremental(&ledger).unwrap();
    store.sync_full(&ledger).unwrap();
    ledger.upsert(source(4, "風呂敷注文"));
    store.sync_full(&ledger).unwrap();
    store.sync_incremental(&ledger).unwrap();

    let stats = store.store_stats().unwrap();
    assert_eq!(stats.total, 4);

    let originals: HashSet<i64> = (1..=4)
        .filter_map(|id| store.get_by_original_id(id).unwrap())
        .map(|r| r.original_id)
        .collect();
    assert_eq!(originals.len(), 4);
    assert_eq!(store.mirrored_original_ids().unwrap(), originals);
}

#[test]
fn insert_race_counts_as_skipped() {
    let store = ShadowStore::open_in_memory().unwrap();
    let ledger = EchoLedger(source(9, "ハンカチ注文"));

    let report = store.sync_incremental(&ledger).unwrap();
    assert_eq!(report.records_processed, 2);
    assert_eq!(report.records_added, 1);
    assert_eq!(report.records_skipped, 1);
    assert_eq!(report.skipped_ids, vec![9]);
    assert_eq!(report.records_failed, 0);
    assert_eq!(store.store_stats().unwrap().total, 1);
}

// ── Sync log ─────────────────────────────────────────────────────

#[test]
fn completed_run_is_logged_with_counts() {
    let store = ShadowStore::open_in_memory().unwrap();
    let report = store.sync_full(&three_sources()).unwrap();

    let entry = store.get_sync_log(&report.sync_id).unwrap().unwrap();
    assert_eq!(entry.status, SyncStatus::Completed);
    assert_eq!(entry.sync_type, SyncType::Full);
    assert_eq!(entry.records_processed, 3);
    assert_eq!(entry.records_added, 3);
    assert!(entry.sync_end_at.unwrap() >= entry.sync_start_at);
    assert_eq!(entry.error_message, None);
}

#[test]
fn unreachable_ledger_fails_the_run() {
    let store = ShadowStore::open_in_memory().unwrap();

    let err = store.sync_full(&DownLedger).unwrap_err();
    assert!(matches!(err, ShadowError::Unavailable(_)));

    let entry = store.last_sync(Some(SyncType::Full)).unwrap().unwrap();
    assert_eq!(entry.status, SyncStatus::Failed);
    assert!(entry.error_message.unwrap().contains("ledger offline"));
    assert_eq!(store.store_stats().unwrap().total, 0);
}

#[test]
fn history_is_newest_first() {
    let store = ShadowStore::open_in_memory().unwrap();
    let ledger = three_sources();

    let first = store.sync_incremental(&ledger).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    let second = store.sync_full(&ledger).unwrap();

    let history = store.sync_history(10).unwrap();
    let ids: Vec<&str> = history.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec![second.sync_id.as_str(), first.sync_id.as_str()]);

    assert_eq!(store.sync_history(1).unwrap().len(), 1);
    assert_eq!(
        store.last_sync(Some(SyncType::Incremental)).unwrap().unwrap().id,
        first.sync_id
    );
    assert_eq!(store.last_sync(None).unwrap().unwrap().id, second.sync_id);
}

#[test]
fn empty_store_has_no_history() {
    let store = ShadowStore::open_in_memory().unwrap();
    assert!(store.sync_history(5).unwrap().is_empty());
    assert!(store.last_sync(None).unwrap().is_none());
    assert!(store.get_sync_log("missing").unwrap().is_none());
}
