//! DuckDB-backed shadow store for the order desk.
//!
//! Orders captured by the intake form live in a source ledger this crate
//! never writes to. Staff edit *shadow* copies instead:
//!
//! - the sync engine mirrors new and changed source records into the
//!   shadow table (incremental or full), logging every run in `_sync_log`
//! - once a shadow record has been edited by hand, no sync touches it again
//! - field updates target either a structured column or one entry of the
//!   record's `attrs` list, resolved through [`FieldTarget`]
//! - the query facade pages through listable orders as [`OrderView`]s
//!
//! [`OrderView`]: orderdesk_model::OrderView

mod config;
mod error;
mod ledger;
mod schema;
mod store;
mod types;

pub use config::ShadowConfig;
pub use error::{ShadowError, ShadowResult};
pub use ledger::{DuckDbLedger, MemoryLedger, SourceLedger};
pub use schema::{initialize_ledger_schema, initialize_shadow_schema};
pub use store::ShadowStore;
pub use types::{
    Column, FieldTarget, OrderPage, StoreStats, SyncLogEntry, SyncReport, SyncStatus, SyncType,
    UpdateResult, UpdateStatus,
};

use duckdb::Connection;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Open a DuckDB database file and apply the configured resource limits.
///
/// After a crash DuckDB can refuse a leftover write-ahead log. When the
/// first open fails and `<db>.wal` exists, that log is discarded and the
/// open is tried once more. Failures that remain are `Unavailable`.
pub fn open_duckdb_with_wal_recovery(
    path: &Path,
    memory_limit: &str,
    threads: u32,
) -> ShadowResult<Connection> {
    let conn = match Connection::open(path) {
        Ok(conn) => conn,
        Err(first_err) => reopen_without_wal(path, first_err)?,
    };
    apply_resource_limits(&conn, memory_limit, threads)?;
    Ok(conn)
}

/// DuckDB keeps its log next to the database as `<file name>.wal`.
fn wal_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".wal");
    PathBuf::from(name)
}

fn reopen_without_wal(path: &Path, first_err: duckdb::Error) -> ShadowResult<Connection> {
    let unavailable = |e: &dyn Display| {
        ShadowError::Unavailable(format!("cannot open {}: {e}", path.display()))
    };

    let wal = wal_path(path);
    if !wal.exists() {
        return Err(unavailable(&first_err));
    }
    warn!(
        db = %path.display(),
        error = %first_err,
        "open failed with a leftover WAL, discarding it"
    );
    if let Err(e) = std::fs::remove_file(&wal) {
        warn!(wal = %wal.display(), error = %e, "could not remove WAL");
        return Err(unavailable(&first_err));
    }
    Connection::open(path).map_err(|e| unavailable(&e))
}

fn apply_resource_limits(conn: &Connection, memory_limit: &str, threads: u32) -> ShadowResult<()> {
    let memory_limit = memory_limit.replace('\'', "''");
    conn.execute_batch(&format!(
        "SET memory_limit = '{memory_limit}'; SET threads = {threads};"
    ))?;
    Ok(())
}

/// Install a stderr `tracing` subscriber filtered by `RUST_LOG`
/// (default `info`). Safe to call more than once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wal_sits_next_to_the_database() {
        assert_eq!(
            wal_path(Path::new("/data/shadow.duckdb")),
            PathBuf::from("/data/shadow.duckdb.wal")
        );
        assert_eq!(wal_path(Path::new("shadow")), PathBuf::from("shadow.wal"));
    }

    #[test]
    fn unopenable_path_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("shadow.duckdb");
        let err = open_duckdb_with_wal_recovery(&path, "64MB", 1).unwrap_err();
        assert!(matches!(err, ShadowError::Unavailable(_)));
        assert!(err.is_fatal());
    }
}
