// SPDX-License-Identifier: AGPL-3.0-or-later
//! Directory listing rows

use crate::FileMetadata;
use serde::{Deserialize, Serialize};

/// One row of a directory listing, derived from a stat plus a metadata lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub path: String,
    pub is_dir: bool,
    /// Always zero for directories
    pub size: u64,
    /// Permission bits (`mode & 0o777`)
    pub mode: u32,
    /// Modification time, epoch milliseconds
    pub mod_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<FileMetadata>,
}

impl DirEntry {
    pub fn is_hidden(&self) -> bool {
        self.name.starts_with('.')
    }
}

/// Paginated directory listing result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryListing {
    pub entries: Vec<DirEntry>,
    pub offset: usize,
    pub limit: usize,
    pub has_more: bool,
    pub next_offset: usize,
}

impl DirectoryListing {
    pub fn new(entries: Vec<DirEntry>, offset: usize, limit: usize, has_more: bool) -> Self {
        let next_offset = offset + entries.len();
        Self { entries, offset, limit, has_more, next_offset }
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }
}
