// SPDX-License-Identifier: AGPL-3.0-or-later
//! Path sandbox
//!
//! Guards every filesystem and metadata entry point. Validation is pure
//! and synchronous: it never touches the filesystem.

use crate::config::SandboxConfig;
use crate::error::{ArkError, ArkResult};
use crate::path;

/// Allow-list of directories an operation may touch
#[derive(Debug, Clone)]
pub struct Sandbox {
    restrict: bool,
    allowed: Vec<String>,
    root_dir: String,
    max_depth: u32,
}

impl Sandbox {
    pub fn new(config: &SandboxConfig) -> Self {
        Self {
            restrict: config.restrict,
            allowed: config
                .allowed_dirs
                .iter()
                .map(|dir| path::canonicalize(dir))
                .collect(),
            root_dir: path::canonicalize(&config.root_dir),
            max_depth: config.max_depth,
        }
    }

    /// Sandbox that accepts every path
    pub fn unrestricted() -> Self {
        Self::new(&SandboxConfig::default())
    }

    /// Sandbox limited to `dirs`
    pub fn restricted<I, S>(dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let config = SandboxConfig {
            allowed_dirs: dirs.into_iter().map(|d| d.as_ref().to_string()).collect(),
            restrict: true,
            ..SandboxConfig::default()
        };
        Self::new(&config)
    }

    /// Validate `candidate`, returning its canonical form.
    pub fn validate(&self, candidate: &str) -> ArkResult<String> {
        let clean = path::canonicalize(candidate);
        if !self.restrict {
            return Ok(clean);
        }
        if self.allowed.iter().any(|dir| path::is_within(&clean, dir)) {
            Ok(clean)
        } else {
            Err(ArkError::AccessDenied(clean))
        }
    }

    pub fn is_restricted(&self) -> bool {
        self.restrict
    }

    pub fn root_dir(&self) -> &str {
        &self.root_dir
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }
}
