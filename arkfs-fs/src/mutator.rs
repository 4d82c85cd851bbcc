// SPDX-License-Identifier: AGPL-3.0-or-later
//! mkdir / rename / delete with metadata kept in step
//!
//! The filesystem step runs first. Metadata is touched only after it
//! succeeds. There is no rollback: if the metadata step fails the
//! filesystem change stands and the error is returned.

use arkfs_core::{path, ArkError, ArkResult, Sandbox};
use arkfs_store::MetadataStore;
use std::io::ErrorKind;
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, warn};

/// Applies filesystem mutations and migrates their metadata
#[derive(Clone)]
pub struct PathMutator {
    sandbox: Arc<Sandbox>,
    metadata: MetadataStore,
}

impl PathMutator {
    pub fn new(sandbox: Arc<Sandbox>, metadata: MetadataStore) -> Self {
        Self { sandbox, metadata }
    }

    /// Create `name` under `parent`, including missing components.
    /// `name` must resolve strictly below `parent`. Returns the canonical
    /// path created.
    pub async fn mkdir(&self, parent: &str, name: &str) -> ArkResult<String> {
        let parent = self.sandbox.validate(parent)?;
        let target = self.sandbox.validate(&path::join(&parent, name))?;
        if target == parent || !path::is_within(&target, &parent) {
            return Err(ArkError::InvalidPath(format!("{parent}/{name}")));
        }

        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(0o755);
        builder.create(&target).await?;

        debug!(path = %target, "directory created");
        Ok(target)
    }

    /// Rename `old` to `new`, then move its metadata subtree.
    /// Returns the number of metadata records moved.
    pub async fn rename(&self, old: &str, new: &str) -> ArkResult<usize> {
        let old = self.sandbox.validate(old)?;
        let new = self.sandbox.validate(new)?;

        fs::rename(&old, &new)
            .await
            .map_err(|e| ArkError::io_at(e, &old))?;

        self.metadata.migrate_subtree(&old, &new).map_err(|e| {
            warn!(from = %old, to = %new, error = %e, "renamed on disk but metadata migration failed");
            e
        })
    }

    /// Recursively remove `target`, then drop its metadata subtree.
    /// A missing target is not an error. Returns the number of metadata
    /// records removed.
    pub async fn delete(&self, target: &str) -> ArkResult<usize> {
        let target = self.sandbox.validate(target)?;

        match fs::symlink_metadata(&target).await {
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(&target).await?,
            Ok(_) => fs::remove_file(&target).await?,
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        self.metadata.delete_subtree(&target).map_err(|e| {
            warn!(path = %target, error = %e, "deleted on disk but metadata cleanup failed");
            e
        })
    }
}
