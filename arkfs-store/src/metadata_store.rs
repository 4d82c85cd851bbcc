// SPDX-License-Identifier: AGPL-3.0-or-later
//! Path metadata store
//!
//! Maps canonical filesystem paths to [`FileMetadata`] records under the
//! `meta:` prefix. A missing record is not an error.

use arkfs_core::{clock, path, ArkError, ArkResult, FileMetadata, Sandbox};
use sled::Batch;
use std::sync::Arc;
use tracing::debug;

use crate::keys::{meta_key, meta_subtree_prefix};
use crate::kv::{abort, KvStore};

fn decode(bytes: &[u8]) -> ArkResult<FileMetadata> {
    serde_json::from_slice(bytes).map_err(ArkError::from)
}

fn encode(meta: &FileMetadata) -> ArkResult<Vec<u8>> {
    serde_json::to_vec(meta).map_err(ArkError::from)
}

/// Metadata side-table
#[derive(Clone)]
pub struct MetadataStore {
    kv: KvStore,
    sandbox: Arc<Sandbox>,
}

impl MetadataStore {
    pub fn new(kv: KvStore, sandbox: Arc<Sandbox>) -> Self {
        Self { kv, sandbox }
    }

    /// Record stored for `path`, if any
    pub fn get(&self, path: &str) -> ArkResult<Option<FileMetadata>> {
        let clean = self.sandbox.validate(path)?;
        self.kv
            .get(&meta_key(&clean))?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    /// Replace the record for `path`.
    ///
    /// Creation provenance already on disk is kept. Otherwise it comes from
    /// `record`, with `created_at` defaulting to now. `updated_at` is always
    /// now. Returns the record as stored.
    pub fn upsert(&self, path: &str, mut record: FileMetadata) -> ArkResult<FileMetadata> {
        let clean = self.sandbox.validate(path)?;
        let key = meta_key(&clean);
        record.dedup_tags();

        let stored = self.kv.transaction(|tx| {
            let existing = match tx.get(&key)? {
                Some(bytes) => match decode(&bytes) {
                    Ok(meta) => meta,
                    Err(e) => return abort(e),
                },
                None => FileMetadata::default(),
            };

            let mut next = record.clone();
            let now = clock::now_millis();
            if existing.has_creation_stamp() {
                next.created_at = existing.created_at;
                next.created_by = existing.created_by;
                next.created_by_name = existing.created_by_name.clone();
            } else if !next.has_creation_stamp() {
                next.created_at = now;
            }
            next.updated_at = now;

            let value = match encode(&next) {
                Ok(value) => value,
                Err(e) => return abort(e),
            };
            tx.insert(key.as_slice(), value)?;
            Ok(next)
        })?;

        debug!(path = %clean, "metadata upserted");
        Ok(stored)
    }

    /// Look up several canonical paths inside one read-only view.
    ///
    /// Callers must have validated the paths already.
    pub fn lookup_many(&self, paths: &[String]) -> ArkResult<Vec<Option<FileMetadata>>> {
        let raw = self.kv.view(|view| {
            paths
                .iter()
                .map(|p| view.get(&meta_key(p)))
                .collect::<Result<Vec<_>, _>>()
        })?;

        raw.into_iter()
            .map(|bytes| bytes.map(|b| decode(&b)).transpose())
            .collect()
    }

    /// Remove the record for canonical `path` and every record below it.
    /// Returns the number of keys removed.
    pub fn delete_subtree(&self, path: &str) -> ArkResult<usize> {
        let exact = meta_key(path);
        let mut doomed = self.kv.keys_with_prefix(&meta_subtree_prefix(path))?;
        if self.kv.get(&exact)?.is_some() {
            doomed.push(exact);
        }

        let removed = doomed.len();
        let mut batch = Batch::default();
        for key in doomed {
            batch.remove(key);
        }
        self.kv.apply_batch(batch)?;

        debug!(path, removed, "metadata subtree deleted");
        Ok(removed)
    }

    /// Move the record for canonical `old` and every record below it to the
    /// same relative place under `new`, in one transaction.
    /// Returns the number of records moved; moving a path onto itself moves
    /// nothing.
    ///
    /// Child keys are collected by a prefix scan before the transaction
    /// starts. A child first written between that scan and the commit stays
    /// under `old`.
    pub fn migrate_subtree(&self, old: &str, new: &str) -> ArkResult<usize> {
        if path::canonicalize(old) == path::canonicalize(new) {
            return Ok(0);
        }
        let old_prefix = meta_subtree_prefix(old);
        let new_prefix = meta_subtree_prefix(new);
        let old_exact = meta_key(old);
        let new_exact = meta_key(new);
        let children = self.kv.keys_with_prefix(&old_prefix)?;

        let moved = self.kv.transaction(|tx| {
            let mut moved = 0;
            if let Some(value) = tx.get(&old_exact)? {
                tx.insert(new_exact.as_slice(), value)?;
                tx.remove(old_exact.as_slice())?;
                moved += 1;
            }
            for key in &children {
                if let Some(value) = tx.get(key)? {
                    let mut target = new_prefix.clone();
                    target.extend_from_slice(&key[old_prefix.len()..]);
                    tx.insert(target, value)?;
                    tx.remove(key.as_slice())?;
                    moved += 1;
                }
            }
            Ok(moved)
        })?;

        debug!(from = old, to = new, moved, "metadata subtree migrated");
        Ok(moved)
    }
}
