// SPDX-License-Identifier: AGPL-3.0-or-later
//! CLI command implementations

use arkfs_core::{clock, path, Actor, ArkConfig, ArkError, ArkResult, DirEntry, FileMetadata};
use arkfs_fs::FileService;
use arkfs_store::KvStore;
use console::style;
use std::path::Path;
use tabled::{Table, Tabled};
use tracing::debug;

/// Everything a command needs: the service and who is calling
pub struct Context {
    service: FileService,
    actor: Actor,
}

impl Context {
    /// Load configuration and open the store
    pub fn open(config: Option<&Path>, actor_id: u64, actor_name: &str) -> ArkResult<Self> {
        let config = ArkConfig::load_or_default(config)?;
        debug!(store = %config.store.path.display(), "opening store");
        let kv = KvStore::open(&config.store.path)?;
        Ok(Self {
            service: FileService::new(kv, config),
            actor: Actor::new(actor_id, actor_name),
        })
    }

    pub async fn close(&self) -> ArkResult<()> {
        self.service.shutdown().await
    }
}

/// Parse a `KEY=VALUE` pair
pub fn parse_field(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{s}'")),
    }
}

/// Resolve a command-line path against the working directory
fn resolve(p: &str) -> ArkResult<String> {
    if p.starts_with('/') {
        return Ok(path::canonicalize(p));
    }
    let cwd = std::env::current_dir()?;
    Ok(path::join(&cwd.to_string_lossy(), p))
}

/// Format a millisecond timestamp for display
fn format_time(millis: i64) -> String {
    clock::from_millis(millis)
        .filter(|_| millis > 0)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Format file size
fn format_size(entry: &DirEntry, human: bool) -> String {
    if entry.is_dir {
        "-".to_string()
    } else if human {
        bytesize::ByteSize(entry.size).to_string()
    } else {
        entry.size.to_string()
    }
}

/// Format permissions
fn format_permissions(is_dir: bool, m: u32) -> String {
    let bit = |mask: u32, c: char| if m & mask != 0 { c } else { '-' };
    format!(
        "{}{}{}{}{}{}{}{}{}{}",
        if is_dir { 'd' } else { '-' },
        bit(0o400, 'r'),
        bit(0o200, 'w'),
        bit(0o100, 'x'),
        bit(0o040, 'r'),
        bit(0o020, 'w'),
        bit(0o010, 'x'),
        bit(0o004, 'r'),
        bit(0o002, 'w'),
        bit(0o001, 'x'),
    )
}

/// Directories in cyan, hidden entries dimmed
fn display_name(entry: &DirEntry) -> String {
    let styled = style(&entry.name);
    let styled = if entry.is_dir { styled.cyan() } else { styled };
    let styled = if entry.is_hidden() { styled.dim() } else { styled };
    styled.to_string()
}

fn format_tags(meta: Option<&FileMetadata>) -> String {
    match meta {
        Some(m) if !m.tags.is_empty() => m.tags.join(","),
        _ => String::new(),
    }
}

#[derive(Tabled)]
struct LsEntry {
    #[tabled(rename = "Permissions")]
    perms: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Modified")]
    modified: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Tags")]
    tags: String,
}

/// List one page of a directory
pub async fn ls(
    ctx: &Context,
    dir: &str,
    offset: usize,
    limit: usize,
    long: bool,
    all: bool,
    human: bool,
) -> ArkResult<()> {
    let dir = resolve(dir)?;
    let listing = ctx.service.list(&dir, offset, limit, all).await?;

    if listing.entries.is_empty() {
        println!("(empty directory)");
    } else if long {
        let rows: Vec<LsEntry> = listing
            .entries
            .iter()
            .map(|e| LsEntry {
                perms: format_permissions(e.is_dir, e.mode),
                size: format_size(e, human),
                modified: format_time(e.mod_time),
                name: display_name(e),
                tags: format_tags(e.meta.as_ref()),
            })
            .collect();
        println!("{}", Table::new(rows));
    } else {
        for entry in &listing.entries {
            println!("{}", display_name(entry));
        }
    }

    if listing.has_more {
        println!(
            "{}",
            style(format!("... more entries, continue with --offset {}", listing.next_offset)).dim()
        );
    }
    Ok(())
}

/// Print the metadata stored for a path
pub fn meta_get(ctx: &Context, target: &str) -> ArkResult<()> {
    let target = resolve(target)?;
    match ctx.service.get_metadata(&target)? {
        Some(meta) => {
            println!("  Path: {target}");
            if !meta.tags.is_empty() {
                println!("  Tags: {}", meta.tags.join(", "));
            }
            if !meta.notes.is_empty() {
                println!("  Notes: {}", meta.notes);
            }
            for (key, value) in &meta.custom {
                println!("  {key}: {value}");
            }
            println!(
                "  Created: {} by {} ({})",
                format_time(meta.created_at),
                meta.created_by_name,
                meta.created_by
            );
            println!(
                "  Updated: {} by {} ({})",
                format_time(meta.updated_at),
                meta.updated_by_name,
                meta.updated_by
            );
        }
        None => println!("{}", style(format!("No metadata for {target}")).dim()),
    }
    Ok(())
}

/// Replace the metadata stored for a path
pub fn meta_set(
    ctx: &Context,
    target: &str,
    tags: Vec<String>,
    notes: Option<String>,
    fields: Vec<(String, String)>,
) -> ArkResult<()> {
    let target = resolve(target)?;
    let mut record = FileMetadata {
        tags,
        notes: notes.unwrap_or_default(),
        custom: fields.into_iter().collect(),
        ..Default::default()
    };
    record.dedup_tags();

    let stored = ctx.service.upsert_metadata(&ctx.actor, &target, record)?;
    println!(
        "{} metadata for {} ({} tags)",
        style("Updated").green(),
        target,
        stored.tags.len()
    );
    Ok(())
}

pub async fn mkdir(ctx: &Context, parent: &str, name: &str) -> ArkResult<()> {
    let parent = resolve(parent)?;
    let created = ctx.service.mkdir(&ctx.actor, &parent, name).await?;
    println!("Created {created}");
    Ok(())
}

pub async fn mv(ctx: &Context, source: &str, dest: &str) -> ArkResult<()> {
    let source = resolve(source)?;
    let dest = resolve(dest)?;
    ctx.service.rename(&ctx.actor, &source, &dest).await?;
    println!("Moved {source} -> {dest}");
    Ok(())
}

pub async fn rm(ctx: &Context, target: &str) -> ArkResult<()> {
    let target = resolve(target)?;
    ctx.service.delete(&ctx.actor, &target).await?;
    println!("Removed {target}");
    Ok(())
}

/// Print audit records as JSON lines
pub fn audit(ctx: &Context, from: &str, to: &str) -> ArkResult<()> {
    for record in ctx.service.audit_range(from, to)? {
        println!("{}", serde_json::to_string(&record)?);
    }
    Ok(())
}

pub async fn export_audit(ctx: &Context, from: &str, to: &str) -> ArkResult<()> {
    let archive = ctx.service.export_audit(from, to).await?;
    let size = std::fs::metadata(&archive).map(|m| m.len()).unwrap_or(0);
    println!(
        "{} {} ({})",
        style("Exported").green(),
        archive.display(),
        bytesize::ByteSize(size)
    );
    Ok(())
}

pub fn sweep_audit(ctx: &Context, days: Option<i64>) -> ArkResult<()> {
    let removed = ctx.service.sweep_audit(days)?;
    println!("Removed {removed} audit records");
    Ok(())
}

/// Show store statistics
pub fn stats(ctx: &Context) -> ArkResult<()> {
    let stats = ctx.service.store().stats()?;
    let location = ctx
        .service
        .store()
        .path()
        .map(|p| p.display().to_string())
        .ok_or_else(|| ArkError::Config("store has no path".into()))?;

    println!("Store: {location}");
    println!("  Metadata records: {}", stats.meta_keys);
    println!("  Audit records:    {}", stats.audit_keys);
    println!("  Size on disk:     {}", bytesize::ByteSize(stats.disk_size_bytes));
    Ok(())
}
