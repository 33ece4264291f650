//! Source ledger collaborators.
//!
//! The ledger is the intake side's record set. The shadow store only ever
//! reads from it; the write helpers on the concrete ledgers exist for the
//! intake side and for tests.

use crate::error::{ShadowError, ShadowResult};
use crate::schema::initialize_ledger_schema;
use duckdb::{params, Connection};
use orderdesk_model::{SourceRecord, SourceTimestamp};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

/// Read access to the intake records.
pub trait SourceLedger: Send + Sync {
    /// Every source record, in no particular order.
    fn fetch_source_records(&self) -> ShadowResult<Vec<SourceRecord>>;

    /// A single source record, if it still exists.
    fn fetch_source_record(&self, id: i64) -> ShadowResult<Option<SourceRecord>>;
}

// ── In-memory ledger ────────────────────────────────────────────────────

/// Ledger held in process memory, keyed by source id.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    records: Mutex<BTreeMap<i64, SourceRecord>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = SourceRecord>,
    {
        Self {
            records: Mutex::new(records.into_iter().map(|r| (r.id, r)).collect()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<i64, SourceRecord>> {
        self.records.lock().unwrap_or_else(|poisoned| {
            warn!("recovering from poisoned memory ledger mutex");
            poisoned.into_inner()
        })
    }

    /// Insert a new record or replace an existing one (an upstream edit).
    pub fn upsert(&self, record: SourceRecord) {
        self.lock().insert(record.id, record);
    }

    /// Drop a record upstream. Mirrors are never removed by a sync.
    pub fn remove(&self, id: i64) -> Option<SourceRecord> {
        self.lock().remove(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl SourceLedger for MemoryLedger {
    fn fetch_source_records(&self) -> ShadowResult<Vec<SourceRecord>> {
        Ok(self.lock().values().cloned().collect())
    }

    fn fetch_source_record(&self, id: i64) -> ShadowResult<Option<SourceRecord>> {
        Ok(self.lock().get(&id).cloned())
    }
}

// ── DuckDB ledger ───────────────────────────────────────────────────────

/// Ledger stored in the `source_records` table of its own DuckDB database.
#[derive(Clone)]
pub struct DuckDbLedger {
    conn: Arc<Mutex<Connection>>,
}

impl DuckDbLedger {
    /// Opens (or creates) the ledger database at the given path.
    pub fn open(path: &Path) -> ShadowResult<Self> {
        let conn = crate::open_duckdb_with_wal_recovery(path, "128MB", 1)?;
        initialize_ledger_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory ledger (for testing).
    pub fn open_in_memory() -> ShadowResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_ledger_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| {
            warn!("recovering from poisoned ledger mutex");
            poisoned.into_inner()
        })
    }

    /// Write an intake record, replacing any previous version.
    pub fn append(&self, record: &SourceRecord) -> ShadowResult<()> {
        let conn = self.lock_conn();
        conn.execute(
            r#"INSERT OR REPLACE INTO source_records (id, title, customer, created_epoch, created_text, content)
               VALUES (?, ?, ?, ?, ?, ?)"#,
            params![
                record.id,
                record.title,
                record.customer,
                record.created.epoch_column(),
                record.created.text_column(),
                record.content,
            ],
        )?;
        Ok(())
    }
}

const SOURCE_SELECT: &str =
    "SELECT id, title, customer, created_epoch, created_text, content FROM source_records";

fn row_to_source(row: &duckdb::Row<'_>) -> duckdb::Result<SourceRecord> {
    Ok(SourceRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        customer: row.get(2)?,
        created: SourceTimestamp::from_columns(row.get(3)?, row.get(4)?),
        content: row.get(5)?,
    })
}

impl SourceLedger for DuckDbLedger {
    fn fetch_source_records(&self) -> ShadowResult<Vec<SourceRecord>> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare(SOURCE_SELECT)?;
        let records = stmt
            .query_map([], row_to_source)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ShadowError::Unavailable(format!("reading source ledger: {e}")))?;
        Ok(records)
    }

    fn fetch_source_record(&self, id: i64) -> ShadowResult<Option<SourceRecord>> {
        let conn = self.lock_conn();
        let result = conn.query_row(
            &format!("{SOURCE_SELECT} WHERE id = ?"),
            params![id],
            row_to_source,
        );
        match result {
            Ok(record) => Ok(Some(record)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
