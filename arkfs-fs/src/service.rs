// SPDX-License-Identifier: AGPL-3.0-or-later
//! File service facade
//!
//! The surface handed to request handlers: listing, metadata access,
//! mutations and audit export. Every mutation is followed by a best-effort
//! audit record queued in the background.

use arkfs_core::{
    path, Actor, ArkConfig, ArkError, ArkResult, AuditAction, AuditRecord, DirectoryListing,
    FileMetadata, Sandbox,
};
use arkfs_store::export::parse_range;
use arkfs_store::{AuditLog, AuditQueue, KvStore, MetadataStore};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::lister::DirectoryLister;
use crate::mutator::PathMutator;

/// Handles of the background loops started by [`FileService::spawn_background`]
pub struct BackgroundTasks {
    pub maintenance: JoinHandle<()>,
    pub retention: JoinHandle<()>,
}

impl BackgroundTasks {
    /// Wait for both loops to finish (they stop when the store closes).
    /// Returns how many ended abnormally.
    pub async fn join(self) -> usize {
        let mut failed = 0;
        for (task, handle) in [("maintenance", self.maintenance), ("retention", self.retention)] {
            if let Err(e) = handle.await {
                warn!(task, error = %e, "background loop ended abnormally");
                failed += 1;
            }
        }
        failed
    }
}

pub struct FileService {
    kv: KvStore,
    metadata: MetadataStore,
    lister: DirectoryLister,
    mutator: PathMutator,
    audit_log: AuditLog,
    audit: AuditQueue,
    config: ArkConfig,
}

impl FileService {
    /// Wire the service over an opened store. Starts the audit worker, so
    /// it must be called inside a tokio runtime.
    pub fn new(kv: KvStore, config: ArkConfig) -> Self {
        let sandbox = Arc::new(Sandbox::new(&config.sandbox));
        info!(
            restricted = sandbox.is_restricted(),
            allowed = ?config.sandbox.allowed_dirs,
            "file service ready"
        );
        let metadata = MetadataStore::new(kv.clone(), sandbox.clone());
        let audit_log = AuditLog::new(kv.clone());
        let audit = AuditQueue::start(audit_log.clone(), config.audit.queue_capacity);

        Self {
            lister: DirectoryLister::new(sandbox.clone(), metadata.clone()),
            mutator: PathMutator::new(sandbox, metadata.clone()),
            kv,
            metadata,
            audit_log,
            audit,
            config,
        }
    }

    pub fn store(&self) -> &KvStore {
        &self.kv
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit_log
    }

    pub fn audit_queue(&self) -> &AuditQueue {
        &self.audit
    }

    /// Start store maintenance and audit retention
    pub fn spawn_background(&self) -> BackgroundTasks {
        BackgroundTasks {
            maintenance: self.kv.spawn_maintenance(
                self.config.store.maintenance_interval(),
                self.config.store.maintenance_attempts,
            ),
            retention: self.audit_log.spawn_retention(
                self.config.audit.effective_retention_days(),
                self.config.audit.sweep_interval(),
            ),
        }
    }

    fn record(&self, record: AuditRecord) {
        if let Err(e) = self.audit.submit(record) {
            debug!(error = %e, "audit record not queued");
        }
    }

    pub async fn list(
        &self,
        dir: &str,
        offset: usize,
        limit: usize,
        include_hidden: bool,
    ) -> ArkResult<DirectoryListing> {
        self.lister.list(dir, offset, limit, include_hidden).await
    }

    pub fn get_metadata(&self, target: &str) -> ArkResult<Option<FileMetadata>> {
        self.metadata.get(target)
    }

    /// Store `record` for `target` on behalf of `actor`
    pub fn upsert_metadata(
        &self,
        actor: &Actor,
        target: &str,
        mut record: FileMetadata,
    ) -> ArkResult<FileMetadata> {
        record.set_updater(actor);
        if record.created_by == 0 {
            record.set_creator(actor);
        }
        let stored = self.metadata.upsert(target, record)?;
        self.record(AuditRecord::new(actor, AuditAction::UpdateMeta, target));
        Ok(stored)
    }

    pub async fn mkdir(&self, actor: &Actor, parent: &str, name: &str) -> ArkResult<String> {
        let created = self.mutator.mkdir(parent, name).await?;
        self.record(AuditRecord::new(actor, AuditAction::Mkdir, parent).with_extra("name", name));
        Ok(created)
    }

    pub async fn rename(&self, actor: &Actor, old: &str, new: &str) -> ArkResult<()> {
        self.mutator.rename(old, new).await?;
        self.record(
            AuditRecord::new(actor, AuditAction::Rename, new)
                .with_extra("from", path::canonicalize(old)),
        );
        Ok(())
    }

    pub async fn delete(&self, actor: &Actor, target: &str) -> ArkResult<()> {
        self.mutator.delete(target).await?;
        self.record(AuditRecord::new(actor, AuditAction::Delete, target));
        Ok(())
    }

    /// Audit records between two RFC3339 instants, inclusive
    pub fn audit_range(&self, from: &str, to: &str) -> ArkResult<Vec<AuditRecord>> {
        let (from, to) = parse_range(from, to)?;
        self.audit_log
            .range(from.timestamp_millis(), to.timestamp_millis())
    }

    /// Export audit records between two RFC3339 instants into the
    /// configured export directory. Returns the archive path.
    pub async fn export_audit(&self, from: &str, to: &str) -> ArkResult<PathBuf> {
        let (from, to) = parse_range(from, to)?;
        let log = self.audit_log.clone();
        let dir = self.config.audit.export_dir.clone();
        tokio::task::spawn_blocking(move || log.export(from, to, dir))
            .await
            .map_err(|e| ArkError::Archive(e.to_string()))?
    }

    /// Run one retention sweep now
    pub fn sweep_audit(&self, retention_days: Option<i64>) -> ArkResult<usize> {
        let days = retention_days.unwrap_or_else(|| self.config.audit.effective_retention_days());
        self.audit_log.retention_sweep(days)
    }

    /// Drain pending audit records and close the store
    pub async fn shutdown(&self) -> ArkResult<()> {
        self.audit.shutdown().await;
        self.kv.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arkfs_core::clock;

    struct Fixture {
        _dir: tempfile::TempDir,
        root: String,
        service: FileService,
    }

    fn fixture_with(edit: impl FnOnce(&mut ArkConfig, &str)) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("files").to_string_lossy().into_owned();
        std::fs::create_dir(&root).unwrap();

        let mut config = ArkConfig::default();
        config.audit.export_dir = dir.path().join("exports");
        edit(&mut config, &root);

        let service = FileService::new(KvStore::temporary().unwrap(), config);
        Fixture { _dir: dir, root, service }
    }

    fn fixture() -> Fixture {
        fixture_with(|_, _| {})
    }

    fn alice() -> Actor {
        Actor::new(1, "alice")
    }

    async fn drain(service: &FileService) {
        service.audit_queue().shutdown().await;
    }

    #[tokio::test]
    async fn test_mutations_are_audited() {
        let fx = fixture();
        let svc = &fx.service;

        svc.mkdir(&alice(), &fx.root, "docs").await.unwrap();
        let docs = path::join(&fx.root, "docs");
        let moved = path::join(&fx.root, "papers");
        svc.rename(&alice(), &docs, &moved).await.unwrap();
        svc.upsert_metadata(&alice(), &moved, FileMetadata::new().with_tag("t"))
            .unwrap();
        svc.delete(&alice(), &moved).await.unwrap();
        drain(svc).await;

        let records = svc.audit_log().range(0, i64::MAX).unwrap();
        let mut actions: Vec<&str> = records.iter().map(|r| r.action.as_str()).collect();
        actions.sort();
        assert_eq!(actions, vec!["delete", "mkdir", "rename", "update_meta"]);

        let mkdir = records.iter().find(|r| r.action == AuditAction::Mkdir).unwrap();
        assert_eq!(mkdir.target_path, fx.root);
        assert_eq!(mkdir.extra.as_ref().unwrap()["name"], "docs");

        let rename = records.iter().find(|r| r.action == AuditAction::Rename).unwrap();
        assert_eq!(rename.target_path, moved);
        assert_eq!(rename.extra.as_ref().unwrap()["from"], docs.as_str());
        assert!(records.iter().all(|r| r.actor_name == "alice"));
    }

    #[tokio::test]
    async fn test_failed_mutation_is_not_audited() {
        let fx = fixture();
        let svc = &fx.service;
        let err = svc
            .rename(&alice(), &path::join(&fx.root, "missing"), &path::join(&fx.root, "x"))
            .await
            .unwrap_err();
        assert!(err.is_filesystem_error());
        drain(svc).await;
        assert!(svc.audit_log().range(0, i64::MAX).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_stamps_identities() {
        let fx = fixture();
        let svc = &fx.service;
        let doc = path::join(&fx.root, "doc.txt");

        let first = svc
            .upsert_metadata(&alice(), &doc, FileMetadata::new().with_tag("a"))
            .unwrap();
        assert_eq!(first.creator(), alice());
        assert_eq!(first.updater(), alice());

        let bob = Actor::new(2, "bob");
        let second = svc
            .upsert_metadata(&bob, &doc, FileMetadata::new().with_notes("edited"))
            .unwrap();
        assert_eq!(second.creator(), alice());
        assert_eq!(second.updater(), bob);
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(svc.get_metadata(&doc).unwrap(), Some(second));
    }

    #[tokio::test]
    async fn test_rename_scenario_keeps_timestamps() {
        let fx = fixture();
        let svc = &fx.service;
        let doc = path::join(&fx.root, "doc.txt");
        std::fs::write(&doc, "x").unwrap();

        let stored = svc
            .upsert_metadata(&alice(), &doc, FileMetadata::new().with_tag("a"))
            .unwrap();
        let doc2 = path::join(&fx.root, "doc2.txt");
        svc.rename(&alice(), &doc, &doc2).await.unwrap();

        let moved = svc.get_metadata(&doc2).unwrap().unwrap();
        assert_eq!(moved.tags, vec!["a"]);
        assert_eq!(moved.created_at, stored.created_at);
        assert_eq!(moved.updated_at, stored.updated_at);
        assert!(svc.get_metadata(&doc).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_restricted_service_denies_everything_outside() {
        let fx = fixture_with(|config, root| {
            config.sandbox.restrict = true;
            config.sandbox.allowed_dirs = vec![root.to_string()];
        });
        let svc = &fx.service;
        let outside_dir = tempfile::tempdir().unwrap();
        let outside = outside_dir.path().to_string_lossy().into_owned();
        let victim = path::join(&outside, "victim");
        std::fs::write(&victim, "x").unwrap();

        assert!(svc.list(&outside, 0, 10, false).await.unwrap_err().is_access_denied());
        assert!(svc.get_metadata(&victim).unwrap_err().is_access_denied());
        assert!(svc
            .upsert_metadata(&alice(), &victim, FileMetadata::new())
            .unwrap_err()
            .is_access_denied());
        assert!(svc.mkdir(&alice(), &outside, "x").await.unwrap_err().is_access_denied());
        assert!(svc
            .rename(&alice(), &victim, &path::join(&outside, "moved"))
            .await
            .unwrap_err()
            .is_access_denied());
        assert!(svc.delete(&alice(), &victim).await.unwrap_err().is_access_denied());

        drain(svc).await;
        assert!(std::path::Path::new(&victim).exists());
        assert!(!std::path::Path::new(&path::join(&outside, "x")).exists());
        let stats = svc.store().stats().unwrap();
        assert_eq!(stats.meta_keys, 0);
        assert_eq!(stats.audit_keys, 0);
    }

    #[tokio::test]
    async fn test_export_audit() {
        let fx = fixture();
        let svc = &fx.service;
        let base = 1_704_067_200_000; // 2024-01-01T00:00:00Z
        for day in 0..5 {
            svc.audit_log()
                .append(
                    AuditRecord::new(&alice(), AuditAction::Delete, "/srv/x")
                        .with_timestamp(base + day * clock::MILLIS_PER_DAY),
                )
                .unwrap();
        }

        let archive = svc
            .export_audit("2024-01-02T00:00:00Z", "2024-01-03T00:00:00Z")
            .await
            .unwrap();
        assert!(archive.ends_with("audit_20240102_000000_20240103_000000.zip"));
        assert!(archive.exists());

        let jsonl = std::fs::read_to_string(archive.with_extension("jsonl")).unwrap();
        assert_eq!(jsonl.lines().count(), 2);

        let records = svc
            .audit_range("2024-01-02T00:00:00Z", "2024-01-03T00:00:00Z")
            .unwrap();
        assert_eq!(records.len(), 2);

        assert!(matches!(
            svc.export_audit("not-a-time", "2024-01-03T00:00:00Z").await,
            Err(ArkError::InvalidTimeRange(_))
        ));
    }

    #[tokio::test]
    async fn test_sweep_audit() {
        let fx = fixture();
        let svc = &fx.service;
        let now = clock::now_millis();
        for days_ago in [1, 5, 45] {
            svc.audit_log()
                .append(
                    AuditRecord::new(&alice(), AuditAction::Mkdir, "/srv")
                        .with_timestamp(now - days_ago * clock::MILLIS_PER_DAY),
                )
                .unwrap();
        }
        assert_eq!(svc.sweep_audit(Some(i64::MAX)).unwrap(), 0);
        assert_eq!(svc.sweep_audit(Some(200_000_000_000)).unwrap(), 0);
        assert_eq!(svc.sweep_audit(None).unwrap(), 1);
        assert_eq!(svc.sweep_audit(Some(3)).unwrap(), 1);
        assert_eq!(svc.audit_log().range(0, i64::MAX).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_flushes_queue_and_stops_background() {
        let fx = fixture_with(|config, _| {
            config.store.maintenance_interval_secs = 1;
            config.audit.sweep_interval_secs = 1;
        });
        let svc = &fx.service;
        let tasks = svc.spawn_background();

        svc.mkdir(&alice(), &fx.root, "a").await.unwrap();
        svc.shutdown().await.unwrap();
        assert_eq!(svc.audit_queue().written(), 1);

        let failed = tokio::time::timeout(std::time::Duration::from_secs(5), tasks.join())
            .await
            .expect("background loops should stop");
        assert_eq!(failed, 0);
        assert!(matches!(svc.get_metadata(&fx.root), Err(ArkError::StoreClosed)));
    }

    #[tokio::test]
    async fn test_join_reports_panicked_loop() {
        let tasks = BackgroundTasks {
            maintenance: tokio::spawn(async { panic!("maintenance blew up") }),
            retention: tokio::spawn(async {}),
        };
        assert_eq!(tasks.join().await, 1);
    }
}
