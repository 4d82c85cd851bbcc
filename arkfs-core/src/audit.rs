// SPDX-License-Identifier: AGPL-3.0-or-later
//! Audit records

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

use crate::metadata::Actor;
use crate::path;

/// Kind of mutating operation. The set is open: unknown tags round-trip
/// through [`AuditAction::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AuditAction {
    Mkdir,
    Rename,
    Delete,
    UpdateMeta,
    Other(String),
}

impl AuditAction {
    pub fn as_str(&self) -> &str {
        match self {
            AuditAction::Mkdir => "mkdir",
            AuditAction::Rename => "rename",
            AuditAction::Delete => "delete",
            AuditAction::UpdateMeta => "update_meta",
            AuditAction::Other(tag) => tag,
        }
    }

    pub fn parse(tag: &str) -> Self {
        match tag {
            "mkdir" => AuditAction::Mkdir,
            "rename" => AuditAction::Rename,
            "delete" => AuditAction::Delete,
            "update_meta" => AuditAction::UpdateMeta,
            other => AuditAction::Other(other.to_string()),
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for AuditAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AuditAction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(AuditAction::parse(&tag))
    }
}

/// Immutable event describing one mutating call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Epoch milliseconds; zero means "fill on append"
    pub timestamp: i64,
    pub actor_id: u64,
    pub actor_name: String,
    pub action: AuditAction,
    pub target_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Map<String, Value>>,
}

impl AuditRecord {
    /// New record for `action` on `target`; the target is canonicalized.
    pub fn new(actor: &Actor, action: AuditAction, target: &str) -> Self {
        Self {
            timestamp: 0,
            actor_id: actor.id,
            actor_name: actor.name.clone(),
            action,
            target_path: path::canonicalize(target),
            extra: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }
}
