// SPDX-License-Identifier: AGPL-3.0-or-later
//! Per-path metadata records

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn is_zero_u64(v: &u64) -> bool {
    *v == 0
}

fn is_zero_i64(v: &i64) -> bool {
    *v == 0
}

/// Identity of the caller performing an operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: u64,
    pub name: String,
}

impl Actor {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self { id, name: name.into() }
    }
}

/// Structured annotation attached to a filesystem path.
///
/// Zero-valued fields are omitted from the stored JSON. `created_*` is set
/// once, on the first write; `updated_*` changes on every write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub created_by: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub created_by_name: String,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub updated_by: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub updated_by_name: String,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub updated_at: i64,
}

impl FileMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tag, keeping the first occurrence of duplicates
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom.insert(key.into(), value.into());
        self
    }

    /// True once creation provenance has been recorded
    pub fn has_creation_stamp(&self) -> bool {
        self.created_at != 0
    }

    /// Drop repeated tags while preserving order
    pub fn dedup_tags(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.tags.retain(|tag| seen.insert(tag.clone()));
    }

    pub fn creator(&self) -> Actor {
        Actor::new(self.created_by, self.created_by_name.clone())
    }

    pub fn updater(&self) -> Actor {
        Actor::new(self.updated_by, self.updated_by_name.clone())
    }

    pub fn set_creator(&mut self, actor: &Actor) {
        self.created_by = actor.id;
        self.created_by_name = actor.name.clone();
    }

    pub fn set_updater(&mut self, actor: &Actor) {
        self.updated_by = actor.id;
        self.updated_by_name = actor.name.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_record_serializes_compactly() {
        let json = serde_json::to_string(&FileMetadata::new()).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn test_missing_fields_deserialize_to_defaults() {
        let meta: FileMetadata = serde_json::from_str(r#"{"tags":["a"]}"#).unwrap();
        assert_eq!(meta.tags, vec!["a"]);
        assert!(!meta.has_creation_stamp());
        assert!(meta.custom.is_empty());
    }

    #[test]
    fn test_builders() {
        let meta = FileMetadata::new()
            .with_tag("report")
            .with_tag("q3")
            .with_tag("report")
            .with_notes("quarterly")
            .with_field("owner", "finance");

        assert_eq!(meta.tags, vec!["report", "q3"]);
        assert_eq!(meta.notes, "quarterly");
        assert_eq!(meta.custom.get("owner").map(String::as_str), Some("finance"));
    }

    #[test]
    fn test_dedup_tags_preserves_order() {
        let mut meta = FileMetadata {
            tags: vec!["b".into(), "a".into(), "b".into(), "c".into(), "a".into()],
            ..Default::default()
        };
        meta.dedup_tags();
        assert_eq!(meta.tags, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_actor_accessors() {
        let mut meta = FileMetadata::new();
        meta.set_creator(&Actor::new(7, "alice"));
        meta.set_updater(&Actor::new(9, "bob"));
        assert_eq!(meta.creator(), Actor::new(7, "alice"));
        assert_eq!(meta.updater(), Actor::new(9, "bob"));
    }
}
