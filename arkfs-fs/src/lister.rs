// SPDX-License-Identifier: AGPL-3.0-or-later
//! Paginated, metadata-enriched directory listing

use arkfs_core::{path, ArkError, ArkResult, DirEntry, DirectoryListing, Sandbox};
use arkfs_store::MetadataStore;
use chrono::{DateTime, Utc};
use std::collections::BinaryHeap;
use std::fs::Metadata;
use std::sync::Arc;
use tokio::fs;
use tracing::debug;

/// Directory entries read per batch
pub const LIST_BATCH: usize = 1024;

/// Page size used when the caller asks for zero entries
pub const DEFAULT_LIMIT: usize = 50;

/// Lists directories straight from the filesystem
#[derive(Clone)]
pub struct DirectoryLister {
    sandbox: Arc<Sandbox>,
    metadata: MetadataStore,
}

#[cfg(unix)]
fn permission_bits(meta: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn permission_bits(meta: &Metadata) -> u32 {
    if meta.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

fn modified_millis(meta: &Metadata) -> i64 {
    meta.modified()
        .map(|t| DateTime::<Utc>::from(t).timestamp_millis())
        .unwrap_or(0)
}

/// Keep only the `window` smallest names seen so far
fn retain_smallest(heap: &mut BinaryHeap<String>, batch: &mut Vec<String>, window: usize) {
    for name in batch.drain(..) {
        if heap.len() < window {
            heap.push(name);
        } else if heap.peek().is_some_and(|largest| name < *largest) {
            heap.pop();
            heap.push(name);
        }
    }
}

impl DirectoryLister {
    pub fn new(sandbox: Arc<Sandbox>, metadata: MetadataStore) -> Self {
        Self { sandbox, metadata }
    }

    /// List one page of `dir`, sorted by name.
    ///
    /// Names are streamed in batches of [`LIST_BATCH`]; only the
    /// `offset + limit + 1` smallest are held at once. Entries that fail
    /// to stat are skipped.
    pub async fn list(
        &self,
        dir: &str,
        offset: usize,
        limit: usize,
        include_hidden: bool,
    ) -> ArkResult<DirectoryListing> {
        let clean = self.sandbox.validate(dir)?;
        let limit = if limit == 0 { DEFAULT_LIMIT } else { limit };

        let meta = fs::metadata(&clean)
            .await
            .map_err(|e| ArkError::io_at(e, &clean))?;
        if !meta.is_dir() {
            return Err(ArkError::NotADirectory(clean));
        }

        let window = offset.saturating_add(limit).saturating_add(1);
        let mut smallest = BinaryHeap::new();
        let mut batch = Vec::with_capacity(LIST_BATCH);
        let mut read_dir = fs::read_dir(&clean).await?;

        while let Some(entry) = read_dir.next_entry().await? {
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    debug!(dir = %clean, name = ?raw, "skipping non-UTF-8 entry");
                    continue;
                }
            };
            if !include_hidden && name.starts_with('.') {
                continue;
            }
            batch.push(name);
            if batch.len() == LIST_BATCH {
                retain_smallest(&mut smallest, &mut batch, window);
            }
        }
        retain_smallest(&mut smallest, &mut batch, window);

        let names = smallest.into_sorted_vec();
        let has_more = names.len() > offset.saturating_add(limit);

        let mut rows = Vec::with_capacity(limit);
        for name in names.into_iter().skip(offset).take(limit) {
            let full = path::join(&clean, &name);
            match fs::symlink_metadata(&full).await {
                Ok(meta) => rows.push((name, full, meta)),
                Err(e) => debug!(path = %full, error = %e, "skipping unreadable entry"),
            }
        }

        let paths: Vec<String> = rows.iter().map(|(_, full, _)| full.clone()).collect();
        let annotations = self.metadata.lookup_many(&paths)?;

        let entries = rows
            .into_iter()
            .zip(annotations)
            .map(|((name, full, meta), annotation)| {
                let is_dir = meta.is_dir();
                DirEntry {
                    name,
                    path: full,
                    is_dir,
                    size: if is_dir { 0 } else { meta.len() },
                    mode: permission_bits(&meta),
                    mod_time: modified_millis(&meta),
                    meta: annotation,
                }
            })
            .collect();

        Ok(DirectoryListing::new(entries, offset, limit, has_more))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arkfs_core::FileMetadata;
    use arkfs_store::KvStore;
    use std::path::Path;

    fn lister_for(sandbox: Sandbox) -> (DirectoryLister, MetadataStore) {
        let sandbox = Arc::new(sandbox);
        let metadata = MetadataStore::new(KvStore::temporary().unwrap(), sandbox.clone());
        (DirectoryLister::new(sandbox, metadata.clone()), metadata)
    }

    fn touch(dir: &Path, name: &str, contents: &str) {
        std::fs::write(dir.join(name), contents).unwrap();
    }

    fn root(dir: &tempfile::TempDir) -> String {
        dir.path().to_string_lossy().into_owned()
    }

    #[test]
    fn test_retain_smallest() {
        let mut heap = BinaryHeap::new();
        let mut batch: Vec<String> = ["e", "a", "d", "b", "c"].iter().map(|s| s.to_string()).collect();
        retain_smallest(&mut heap, &mut batch, 3);
        assert!(batch.is_empty());
        assert_eq!(heap.into_sorted_vec(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_pagination_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["d", "b", "a", "c"] {
            touch(dir.path(), name, "x");
        }
        touch(dir.path(), ".hidden", "x");
        let (lister, _) = lister_for(Sandbox::unrestricted());

        let first = lister.list(&root(&dir), 0, 2, false).await.unwrap();
        assert_eq!(first.names(), vec!["a", "b"]);
        assert!(first.has_more);
        assert_eq!(first.next_offset, 2);

        let second = lister.list(&root(&dir), 2, 2, false).await.unwrap();
        assert_eq!(second.names(), vec!["c", "d"]);
        assert!(!second.has_more);
        assert_eq!(second.next_offset, 4);
    }

    #[tokio::test]
    async fn test_hidden_entries() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), ".env", "secret");
        touch(dir.path(), "visible", "x");
        let (lister, _) = lister_for(Sandbox::unrestricted());

        let listing = lister.list(&root(&dir), 0, 10, false).await.unwrap();
        assert_eq!(listing.names(), vec!["visible"]);

        let listing = lister.list(&root(&dir), 0, 10, true).await.unwrap();
        assert_eq!(listing.names(), vec![".env", "visible"]);
    }

    #[tokio::test]
    async fn test_large_directory_spans_batches() {
        let dir = tempfile::tempdir().unwrap();
        let total = LIST_BATCH + 200;
        for i in 0..total {
            touch(dir.path(), &format!("f{i:05}"), "");
        }
        let (lister, _) = lister_for(Sandbox::unrestricted());

        let listing = lister.list(&root(&dir), LIST_BATCH, 3, false).await.unwrap();
        let expected: Vec<String> = (LIST_BATCH..LIST_BATCH + 3).map(|i| format!("f{i:05}")).collect();
        assert_eq!(listing.names(), expected);
        assert!(listing.has_more);

        let tail = lister.list(&root(&dir), total - 1, 10, false).await.unwrap();
        assert_eq!(tail.entries.len(), 1);
        assert!(!tail.has_more);
    }

    #[tokio::test]
    async fn test_entry_fields_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "doc.txt", "hello");
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let (lister, metadata) = lister_for(Sandbox::unrestricted());

        let doc_path = path::join(&root(&dir), "doc.txt");
        metadata
            .upsert(&doc_path, FileMetadata::new().with_tag("a"))
            .unwrap();

        let listing = lister.list(&root(&dir), 0, 0, false).await.unwrap();
        assert_eq!(listing.limit, DEFAULT_LIMIT);
        assert_eq!(listing.entries.len(), 2);

        let doc = &listing.entries[0];
        assert_eq!(doc.name, "doc.txt");
        assert_eq!(doc.path, doc_path);
        assert!(!doc.is_dir);
        assert_eq!(doc.size, 5);
        assert!(doc.mod_time > 0);
        assert_eq!(doc.meta.as_ref().unwrap().tags, vec!["a"]);

        let sub = &listing.entries[1];
        assert!(sub.is_dir);
        assert_eq!(sub.size, 0);
        assert!(sub.meta.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_broken_symlink_is_listed_not_followed() {
        let dir = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(dir.path().join("missing"), dir.path().join("dangling")).unwrap();
        let (lister, _) = lister_for(Sandbox::unrestricted());

        let listing = lister.list(&root(&dir), 0, 10, false).await.unwrap();
        assert_eq!(listing.names(), vec!["dangling"]);
        assert!(!listing.entries[0].is_dir);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_non_utf8_names_are_skipped() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(OsStr::from_bytes(b"bad\xff")), "x").unwrap();
        touch(dir.path(), "a", "x");
        touch(dir.path(), "b", "x");
        let (lister, _) = lister_for(Sandbox::unrestricted());

        let listing = lister.list(&root(&dir), 0, 2, false).await.unwrap();
        assert_eq!(listing.names(), vec!["a", "b"]);
        assert!(!listing.has_more);
    }

    #[tokio::test]
    async fn test_sandbox_denied() {
        let dir = tempfile::tempdir().unwrap();
        let (lister, _) = lister_for(Sandbox::restricted(["/definitely/not/here"]));
        let err = lister.list(&root(&dir), 0, 10, false).await.unwrap_err();
        assert!(err.is_access_denied());
    }

    #[tokio::test]
    async fn test_listing_a_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "plain", "x");
        let (lister, _) = lister_for(Sandbox::unrestricted());
        let err = lister
            .list(&path::join(&root(&dir), "plain"), 0, 10, false)
            .await
            .unwrap_err();
        assert!(matches!(err, ArkError::NotADirectory(_)));
    }

    #[tokio::test]
    async fn test_missing_directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let (lister, _) = lister_for(Sandbox::unrestricted());
        let err = lister
            .list(&path::join(&root(&dir), "nope"), 0, 10, false)
            .await
            .unwrap_err();
        assert!(matches!(err, ArkError::NotFound(_)));
        assert!(err.is_filesystem_error());
    }
}
