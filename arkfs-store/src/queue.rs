// SPDX-License-Identifier: AGPL-3.0-or-later
//! Background audit queue
//!
//! Mutating operations hand their audit record to a bounded channel and
//! return immediately. A single worker drains the channel into the
//! [`AuditLog`]. When the channel is full the record is dropped and counted.

use arkfs_core::{ArkError, ArkResult, AuditRecord};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::audit_log::AuditLog;

#[derive(Default)]
struct Counters {
    written: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

/// Decoupled best-effort audit writer
pub struct AuditQueue {
    tx: Mutex<Option<mpsc::Sender<AuditRecord>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    counters: Arc<Counters>,
}

impl AuditQueue {
    /// Start the worker. Must be called inside a tokio runtime.
    pub fn start(log: AuditLog, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<AuditRecord>(capacity.max(1));
        let counters = Arc::new(Counters::default());
        let worker_counters = counters.clone();

        let worker = tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                let action = record.action.clone();
                match log.append(record) {
                    Ok(_) => {
                        worker_counters.written.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        worker_counters.failed.fetch_add(1, Ordering::Relaxed);
                        warn!(%action, error = %e, "audit append failed");
                    }
                }
            }
            debug!("audit queue drained");
        });

        Self {
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
            counters,
        }
    }

    /// Queue `record` without waiting. A full or closed queue drops the
    /// record and reports why.
    pub fn submit(&self, record: AuditRecord) -> ArkResult<()> {
        let guard = self.tx.lock();
        let Some(tx) = guard.as_ref() else {
            return Err(ArkError::AuditQueueClosed);
        };
        match tx.try_send(record) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(record)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(action = %record.action, target = %record.target_path, "audit queue full, record dropped");
                Err(ArkError::AuditQueueFull)
            }
            Err(TrySendError::Closed(_)) => Err(ArkError::AuditQueueClosed),
        }
    }

    /// Records written to the log so far
    pub fn written(&self) -> u64 {
        self.counters.written.load(Ordering::Relaxed)
    }

    /// Records the worker failed to write
    pub fn failed(&self) -> u64 {
        self.counters.failed.load(Ordering::Relaxed)
    }

    /// Records rejected because the queue was full
    pub fn dropped(&self) -> u64 {
        self.counters.dropped.load(Ordering::Relaxed)
    }

    /// Stop accepting records and wait for the backlog to be written
    pub async fn shutdown(&self) {
        drop(self.tx.lock().take());
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                warn!(error = %e, "audit worker ended abnormally");
            }
        }
    }
}
