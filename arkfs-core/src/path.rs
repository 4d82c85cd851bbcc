// SPDX-License-Identifier: AGPL-3.0-or-later
//! Textual path canonicalization
//!
//! Paths are normalized lexically: separators collapse, `.` segments drop,
//! and `..` removes the previous segment. Symlinks are never consulted, so
//! the result depends only on the input string.

/// Path separator used by canonical paths.
pub const SEPARATOR: char = '/';

/// Canonicalize `path` lexically.
///
/// An empty input becomes `"."`. `..` at the root of an absolute path is
/// dropped; leading `..` segments of a relative path are kept.
pub fn canonicalize(path: &str) -> String {
    let rooted = path.starts_with(SEPARATOR);
    let mut segments: Vec<&str> = Vec::new();

    for part in path.split(SEPARATOR) {
        match part {
            "" | "." => {}
            ".." => match segments.last().copied() {
                Some(last) if last != ".." => {
                    segments.pop();
                }
                _ if rooted => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Join `name` onto `parent` and canonicalize the result.
pub fn join(parent: &str, name: &str) -> String {
    canonicalize(&format!("{}{}{}", parent, SEPARATOR, name))
}

/// True when canonical `path` equals canonical `dir` or lies beneath it.
///
/// Matching is per segment: `/data2` is not inside `/data`.
pub fn is_within(path: &str, dir: &str) -> bool {
    if dir == "/" {
        return path.starts_with(SEPARATOR);
    }
    match path.strip_prefix(dir) {
        Some(rest) => rest.is_empty() || rest.starts_with(SEPARATOR),
        None => false,
    }
}
