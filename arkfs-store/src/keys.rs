// SPDX-License-Identifier: AGPL-3.0-or-later
//! Key encoding for the shared store
//!
//! Audit keys render the timestamp as plain decimal, so byte order matches
//! time order only while timestamps share a digit count. Sweep and export
//! parse the timestamp back out of each key instead of relying on order.

pub const META_PREFIX: &str = "meta:";
pub const AUDIT_PREFIX: &str = "audit:";

/// Random bytes appended to audit keys
const SUFFIX_LEN: usize = 8;

/// Key of the metadata record for canonical `path`
pub fn meta_key(path: &str) -> Vec<u8> {
    format!("{}{}", META_PREFIX, path).into_bytes()
}

/// Prefix shared by the metadata keys of every path below `path`
pub fn meta_subtree_prefix(path: &str) -> Vec<u8> {
    if path.ends_with('/') {
        format!("{}{}", META_PREFIX, path).into_bytes()
    } else {
        format!("{}{}/", META_PREFIX, path).into_bytes()
    }
}

/// Fresh audit key for an event at `timestamp_ms`
pub fn audit_key(timestamp_ms: i64) -> Vec<u8> {
    let suffix: [u8; SUFFIX_LEN] = rand::random();
    audit_key_with_suffix(timestamp_ms, &hex::encode(suffix))
}

pub fn audit_key_with_suffix(timestamp_ms: i64, suffix: &str) -> Vec<u8> {
    format!("{}{}:{}", AUDIT_PREFIX, timestamp_ms, suffix).into_bytes()
}

/// Timestamp encoded in an audit key
pub fn parse_audit_key(key: &[u8]) -> Option<i64> {
    let rest = std::str::from_utf8(key).ok()?.strip_prefix(AUDIT_PREFIX)?;
    let (ts, _suffix) = rest.split_once(':').unwrap_or((rest, ""));
    ts.parse().ok()
}
