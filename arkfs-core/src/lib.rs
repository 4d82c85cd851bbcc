// SPDX-License-Identifier: AGPL-3.0-or-later
//! arkfs core
//!
//! Shared types for the metadata-and-audit layer: the error taxonomy, path
//! canonicalization and sandboxing, metadata and audit records, listing
//! rows, and configuration.

pub mod audit;
pub mod clock;
pub mod config;
pub mod entry;
pub mod error;
pub mod metadata;
pub mod path;
pub mod sandbox;

pub use audit::{AuditAction, AuditRecord};
pub use config::{ArkConfig, AuditConfig, SandboxConfig, StoreConfig};
pub use entry::{DirEntry, DirectoryListing};
pub use error::{ArkError, ArkResult};
pub use metadata::{Actor, FileMetadata};
pub use sandbox::Sandbox;
