// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration
//!
//! Loaded from a TOML file. Every section and field has a default so a
//! partial file (or no file at all) is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ArkError, ArkResult};

/// Retention applied when the configured value is zero or negative.
pub const DEFAULT_RETENTION_DAYS: i64 = 30;

/// `days`, or [`DEFAULT_RETENTION_DAYS`] when it is not positive
pub fn retention_days_or_default(days: i64) -> i64 {
    if days <= 0 {
        DEFAULT_RETENTION_DAYS
    } else {
        days
    }
}

fn data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "arkfs", "arkfs")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("data/arkfs"))
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArkConfig {
    pub sandbox: SandboxConfig,
    pub store: StoreConfig,
    pub audit: AuditConfig,
}

/// Which directories operations may touch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    pub root_dir: String,
    pub allowed_dirs: Vec<String>,
    /// When false every path is accepted
    pub restrict: bool,
    /// Advisory only; not enforced
    pub max_depth: u32,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            root_dir: "/".to_string(),
            allowed_dirs: vec!["/".to_string()],
            restrict: false,
            max_depth: 10,
        }
    }
}

/// Embedded store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store directory (created if absent)
    pub path: PathBuf,
    pub maintenance_interval_secs: u64,
    /// Reclamation passes per maintenance cycle
    pub maintenance_attempts: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: data_dir().join("store"),
            maintenance_interval_secs: 600, // 10 minutes
            maintenance_attempts: 3,
        }
    }
}

impl StoreConfig {
    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance_interval_secs.max(1))
    }
}

/// Audit trail settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub retention_days: i64,
    pub export_dir: PathBuf,
    pub sweep_interval_secs: u64,
    /// Pending appends held by the background queue
    pub queue_capacity: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            retention_days: DEFAULT_RETENTION_DAYS,
            export_dir: PathBuf::from("exports/audit"),
            sweep_interval_secs: 3600, // 1 hour
            queue_capacity: 1024,
        }
    }
}

impl AuditConfig {
    /// Retention in days, falling back to the default when unset.
    pub fn effective_retention_days(&self) -> i64 {
        retention_days_or_default(self.retention_days)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

impl ArkConfig {
    /// Parse configuration from TOML text
    pub fn from_toml(text: &str) -> ArkResult<Self> {
        toml::from_str(text).map_err(|e| ArkError::Config(e.to_string()))
    }

    /// Read and parse a TOML configuration file
    pub fn load(path: impl AsRef<Path>) -> ArkResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ArkError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&text)
    }

    /// Load from `path` when given, otherwise use defaults
    pub fn load_or_default(path: Option<&Path>) -> ArkResult<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }
}
