// SPDX-License-Identifier: AGPL-3.0-or-later
//! Filesystem operations for arkfs
//!
//! Directory listing and path mutation against the local filesystem, kept
//! consistent with the metadata store and recorded in the audit trail.

mod lister;
mod mutator;
mod service;

pub use lister::{DirectoryLister, DEFAULT_LIMIT, LIST_BATCH};
pub use mutator::PathMutator;
pub use service::{BackgroundTasks, FileService};
