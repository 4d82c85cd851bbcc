// SPDX-License-Identifier: AGPL-3.0-or-later
//! Append-only audit trail
//!
//! Records are written once under `audit:<ms>:<hex>` and only ever removed
//! by the retention sweep.

use arkfs_core::config::retention_days_or_default;
use arkfs_core::{clock, ArkError, ArkResult, AuditRecord};
use sled::Batch;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::keys::{audit_key, parse_audit_key, AUDIT_PREFIX};
use crate::kv::KvStore;

/// Audit log over the shared store
#[derive(Clone)]
pub struct AuditLog {
    kv: KvStore,
}

impl AuditLog {
    pub fn new(kv: KvStore) -> Self {
        Self { kv }
    }

    pub fn store(&self) -> &KvStore {
        &self.kv
    }

    /// Append `record`, filling the timestamp when it is zero.
    /// Returns the key it was stored under.
    pub fn append(&self, mut record: AuditRecord) -> ArkResult<Vec<u8>> {
        if record.timestamp == 0 {
            record.timestamp = clock::now_millis();
        }
        let key = audit_key(record.timestamp);
        let value = serde_json::to_vec(&record)?;

        self.kv.transaction(|tx| {
            tx.insert(key.as_slice(), value.as_slice())?;
            Ok(())
        })?;
        Ok(key)
    }

    /// Stored JSON of every record with timestamp in `[from_ms, to_ms]`,
    /// in key order
    pub fn raw_range(&self, from_ms: i64, to_ms: i64) -> ArkResult<Vec<Vec<u8>>> {
        let mut out = Vec::new();
        for item in self.kv.scan_prefix(AUDIT_PREFIX.as_bytes())? {
            let (key, value) = item?;
            match parse_audit_key(&key) {
                Some(ts) if ts >= from_ms && ts <= to_ms => out.push(value),
                _ => {}
            }
        }
        Ok(out)
    }

    /// Decoded records with timestamp in `[from_ms, to_ms]`
    pub fn range(&self, from_ms: i64, to_ms: i64) -> ArkResult<Vec<AuditRecord>> {
        self.raw_range(from_ms, to_ms)?
            .iter()
            .map(|bytes| serde_json::from_slice(bytes).map_err(ArkError::from))
            .collect()
    }

    /// Delete every record strictly older than `cutoff_ms` in one batch.
    /// Returns the number removed.
    pub fn purge_before(&self, cutoff_ms: i64) -> ArkResult<usize> {
        let mut batch = Batch::default();
        let mut removed = 0;
        for key in self.kv.keys_with_prefix(AUDIT_PREFIX.as_bytes())? {
            match parse_audit_key(&key) {
                Some(ts) if ts < cutoff_ms => {
                    batch.remove(key);
                    removed += 1;
                }
                _ => {}
            }
        }
        if removed > 0 {
            self.kv.apply_batch(batch)?;
        }
        Ok(removed)
    }

    /// Drop records older than `retention_days` (30 when not positive)
    pub fn retention_sweep(&self, retention_days: i64) -> ArkResult<usize> {
        self.retention_sweep_at(clock::now_millis(), retention_days)
    }

    /// Retention sweep relative to `now_ms`. The cutoff saturates, so a
    /// retention longer than the clock can express removes nothing.
    pub fn retention_sweep_at(&self, now_ms: i64, retention_days: i64) -> ArkResult<usize> {
        let days = retention_days_or_default(retention_days);
        let cutoff_ms = clock::days_before(now_ms, days);
        let removed = self.purge_before(cutoff_ms)?;
        debug!(cutoff_ms, removed, "audit retention sweep");
        Ok(removed)
    }

    /// Spawn the recurring retention sweep. Failures are logged and the
    /// loop carries on; it stops once the store is closed.
    pub fn spawn_retention(&self, retention_days: i64, interval: Duration) -> JoinHandle<()> {
        let log = self.clone();
        let mut closed = self.kv.closed_signal();
        tokio::spawn(async move {
            info!(retention_days, interval_secs = interval.as_secs(), "audit retention started");
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
                match log.retention_sweep(retention_days) {
                    Ok(_) => {}
                    Err(ArkError::StoreClosed) => break,
                    Err(e) => warn!(error = %e, "audit retention sweep failed"),
                }
            }
            info!("audit retention stopped");
        })
    }
}
