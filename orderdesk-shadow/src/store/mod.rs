//! Shadow store: thread-safe DuckDB handle, operations split by concern.

mod edits;
pub(crate) mod helpers;
mod query;
mod records;
mod sync;
mod sync_log;

use crate::config::ShadowConfig;
use crate::error::{ShadowError, ShadowResult};
use crate::schema::initialize_shadow_schema;
use duckdb::Connection;
use orderdesk_model::{DisplayClassifier, Projection};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::time::{Duration, Instant};
use tracing::warn;

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Thread-safe store of shadow records and sync history, backed by DuckDB.
///
/// Cheap to clone; clones share one connection. Pass it explicitly to
/// whatever needs it.
#[derive(Clone)]
pub struct ShadowStore {
    conn: Arc<Mutex<Connection>>,
    config: Arc<ShadowConfig>,
    classifier: Arc<DisplayClassifier>,
    projection: Arc<Projection>,
}

impl ShadowStore {
    /// Open (or create) the shadow database at the given path.
    pub fn open(path: &Path, config: ShadowConfig) -> ShadowResult<Self> {
        config.validate()?;
        let conn =
            crate::open_duckdb_with_wal_recovery(path, &config.memory_limit, config.threads)?;
        Self::from_connection(conn, config)
    }

    /// Open an in-memory shadow database with default settings (for testing).
    pub fn open_in_memory() -> ShadowResult<Self> {
        Self::open_in_memory_with_config(ShadowConfig::default())
    }

    pub fn open_in_memory_with_config(config: ShadowConfig) -> ShadowResult<Self> {
        config.validate()?;
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, config)
    }

    fn from_connection(conn: Connection, config: ShadowConfig) -> ShadowResult<Self> {
        initialize_shadow_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            classifier: Arc::new(config.classifier()),
            projection: Arc::new(config.projection()),
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &ShadowConfig {
        &self.config
    }

    pub fn classifier(&self) -> &DisplayClassifier {
        &self.classifier
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// Acquire the connection, waiting at most `lock_timeout_ms`.
    ///
    /// A poisoned lock is recovered: a panic in an earlier holder does not
    /// leave the DuckDB connection itself in a bad state.
    pub(crate) fn lock_conn(&self) -> ShadowResult<MutexGuard<'_, Connection>> {
        let deadline = Instant::now() + self.config.lock_timeout();
        loop {
            match self.conn.try_lock() {
                Ok(guard) => return Ok(guard),
                Err(TryLockError::Poisoned(poisoned)) => {
                    warn!("recovering from poisoned shadow store mutex");
                    return Ok(poisoned.into_inner());
                }
                Err(TryLockError::WouldBlock) => {
                    if Instant::now() >= deadline {
                        return Err(ShadowError::Unavailable(format!(
                            "shadow store busy for more than {} ms",
                            self.config.lock_timeout_ms
                        )));
                    }
                    std::thread::sleep(LOCK_POLL_INTERVAL);
                }
            }
        }
    }

    /// Run CHECKPOINT for maintenance.
    pub fn maintenance(&self) -> ShadowResult<()> {
        let conn = self.lock_conn()?;
        conn.execute_batch("CHECKPOINT")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_times_out_as_unavailable() {
        let store = ShadowStore::open_in_memory_with_config(ShadowConfig::test()).unwrap();
        let held = store.lock_conn().unwrap();

        let other = store.clone();
        let err = std::thread::spawn(move || other.lock_conn().map(|_| ()))
            .join()
            .unwrap()
            .unwrap_err();
        drop(held);

        assert!(matches!(err, ShadowError::Unavailable(_)));
        assert!(err.is_fatal());
        assert!(err.is_retryable());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = ShadowConfig {
            max_page_size: 0,
            ..ShadowConfig::default()
        };
        assert!(matches!(
            ShadowStore::open_in_memory_with_config(config),
            Err(ShadowError::Config(_))
        ));
    }
}
