// SPDX-License-Identifier: AGPL-3.0-or-later
//! Embedded storage for arkfs
//!
//! One sled database holds two disjoint key spaces:
//! - `meta:<path>` - per-path metadata records
//! - `audit:<ms>:<hex>` - append-only audit events
//!
//! The [`KvStore`] handle is constructed once and passed into the
//! [`MetadataStore`] and [`AuditLog`]; closing it stops their background
//! loops.

pub mod audit_log;
pub mod export;
pub mod keys;
pub mod kv;
pub mod metadata_store;
pub mod queue;

pub use audit_log::AuditLog;
pub use kv::{KvStore, ReadView, StoreStats};
pub use metadata_store::MetadataStore;
pub use queue::AuditQueue;
