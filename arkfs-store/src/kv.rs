// SPDX-License-Identifier: AGPL-3.0-or-later
//! Sled-backed key-value store
//!
//! Durable, ordered and prefix-iterable. Multi-key updates go through sled
//! transactions or atomic batches; consistent multi-key reads go through
//! [`KvStore::view`].

use arkfs_core::{ArkError, ArkResult};
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
    TransactionalTree,
};
use sled::{Batch, Db};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::keys::{AUDIT_PREFIX, META_PREFIX};

fn store_err(e: sled::Error) -> ArkError {
    ArkError::Store(e.to_string())
}

fn txn_err(e: TransactionError<ArkError>) -> ArkError {
    match e {
        TransactionError::Abort(inner) => inner,
        TransactionError::Storage(e) => store_err(e),
    }
}

/// Abort a transaction closure with an arkfs error
pub fn abort<T>(e: ArkError) -> ConflictableTransactionResult<T, ArkError> {
    Err(ConflictableTransactionError::Abort(e))
}

struct Inner {
    db: Db,
    path: Option<PathBuf>,
    closed: watch::Sender<bool>,
}

/// Shared handle to the embedded store. Cloning is cheap.
#[derive(Clone)]
pub struct KvStore {
    inner: Arc<Inner>,
}

/// Read-only access inside [`KvStore::view`]
pub struct ReadView<'a> {
    tx: &'a TransactionalTree,
}

impl ReadView<'_> {
    pub fn get(&self, key: &[u8]) -> ConflictableTransactionResult<Option<Vec<u8>>, ArkError> {
        Ok(self.tx.get(key)?.map(|v| v.to_vec()))
    }
}

/// Key counts and disk usage
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    pub meta_keys: usize,
    pub audit_keys: usize,
    pub disk_size_bytes: u64,
}

impl KvStore {
    /// Open or create the store directory at `path`
    pub fn open(path: impl AsRef<Path>) -> ArkResult<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)?;
        let db = sled::open(path).map_err(store_err)?;
        info!(path = %path.display(), "store opened");
        Ok(Self::from_db(db, Some(path.to_path_buf())))
    }

    /// In-memory store removed on drop
    pub fn temporary() -> ArkResult<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(store_err)?;
        Ok(Self::from_db(db, None))
    }

    fn from_db(db: Db, path: Option<PathBuf>) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner { db, path, closed }),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    pub fn is_closed(&self) -> bool {
        *self.inner.closed.borrow()
    }

    /// Receiver that flips to `true` when the store closes
    pub fn closed_signal(&self) -> watch::Receiver<bool> {
        self.inner.closed.subscribe()
    }

    fn ensure_open(&self) -> ArkResult<()> {
        if self.is_closed() {
            Err(ArkError::StoreClosed)
        } else {
            Ok(())
        }
    }

    /// Get a value by key
    pub fn get(&self, key: &[u8]) -> ArkResult<Option<Vec<u8>>> {
        self.ensure_open()?;
        self.inner
            .db
            .get(key)
            .map_err(store_err)
            .map(|opt| opt.map(|v| v.to_vec()))
    }

    /// Insert a key-value pair
    pub fn set(&self, key: &[u8], value: &[u8]) -> ArkResult<()> {
        self.ensure_open()?;
        self.inner.db.insert(key, value).map_err(store_err)?;
        Ok(())
    }

    /// Remove a key
    pub fn delete(&self, key: &[u8]) -> ArkResult<()> {
        self.ensure_open()?;
        self.inner.db.remove(key).map_err(store_err)?;
        Ok(())
    }

    /// Run `f` as an all-or-nothing read-write transaction.
    ///
    /// sled may re-run `f` on conflict, so it must not have side effects
    /// outside the transaction.
    pub fn transaction<F, T>(&self, f: F) -> ArkResult<T>
    where
        F: Fn(&TransactionalTree) -> ConflictableTransactionResult<T, ArkError>,
    {
        self.ensure_open()?;
        self.inner.db.transaction(f).map_err(txn_err)
    }

    /// Run `f` against a consistent read-only view
    pub fn view<F, T>(&self, f: F) -> ArkResult<T>
    where
        F: Fn(&ReadView<'_>) -> ConflictableTransactionResult<T, ArkError>,
    {
        self.ensure_open()?;
        self.inner
            .db
            .transaction(|tx| f(&ReadView { tx }))
            .map_err(txn_err)
    }

    /// Apply a batch of inserts and removals atomically
    pub fn apply_batch(&self, batch: Batch) -> ArkResult<()> {
        self.ensure_open()?;
        self.inner.db.apply_batch(batch).map_err(store_err)
    }

    /// Iterate over all keys with a given prefix, in ascending byte order
    pub fn scan_prefix(
        &self,
        prefix: &[u8],
    ) -> ArkResult<impl Iterator<Item = ArkResult<(Vec<u8>, Vec<u8>)>> + '_> {
        self.ensure_open()?;
        Ok(self.inner.db.scan_prefix(prefix).map(|result| {
            result
                .map(|(k, v)| (k.to_vec(), v.to_vec()))
                .map_err(store_err)
        }))
    }

    /// Keys under `prefix`, in ascending byte order
    pub fn keys_with_prefix(&self, prefix: &[u8]) -> ArkResult<Vec<Vec<u8>>> {
        self.ensure_open()?;
        self.inner
            .db
            .scan_prefix(prefix)
            .keys()
            .map(|k| k.map(|k| k.to_vec()).map_err(store_err))
            .collect()
    }

    /// Flush to disk
    pub fn flush(&self) -> ArkResult<()> {
        self.ensure_open()?;
        self.inner.db.flush().map_err(store_err)?;
        Ok(())
    }

    pub fn stats(&self) -> ArkResult<StoreStats> {
        self.ensure_open()?;
        Ok(StoreStats {
            meta_keys: self.inner.db.scan_prefix(META_PREFIX).count(),
            audit_keys: self.inner.db.scan_prefix(AUDIT_PREFIX).count(),
            disk_size_bytes: self.inner.db.size_on_disk().map_err(store_err)?,
        })
    }

    /// Flush and refuse further operations. Background loops stop on
    /// their next wake-up.
    pub fn close(&self) -> ArkResult<()> {
        if self.is_closed() {
            return Ok(());
        }
        self.inner.db.flush().map_err(store_err)?;
        self.inner.closed.send_replace(true);
        info!("store closed");
        Ok(())
    }

    /// One maintenance cycle: up to `attempts` flush passes, stopping at
    /// the first pass with nothing left to write or the first error.
    pub async fn reclaim(&self, attempts: u32) -> usize {
        let mut passes = 0;
        for _ in 0..attempts {
            if self.is_closed() {
                break;
            }
            match self.inner.db.flush_async().await {
                Ok(0) => break,
                Ok(bytes) => {
                    passes += 1;
                    debug!(bytes, "store reclaim pass");
                }
                Err(e) => {
                    debug!(error = %e, "store reclaim pass failed");
                    break;
                }
            }
        }
        passes
    }

    /// Spawn the periodic space-reclamation loop. It runs until the store
    /// is closed; errors are ignored.
    pub fn spawn_maintenance(&self, interval: Duration, attempts: u32) -> JoinHandle<()> {
        let store = self.clone();
        let mut closed = self.closed_signal();
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    changed = closed.changed() => {
                        if changed.is_err() || *closed.borrow() {
                            break;
                        }
                        continue;
                    }
                }
                if store.is_closed() {
                    break;
                }
                store.reclaim(attempts).await;
            }
            debug!("store maintenance stopped");
        })
    }
}
