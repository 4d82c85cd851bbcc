// SPDX-License-Identifier: AGPL-3.0-or-later
//! Audit export
//!
//! Writes the records of a time range as JSON lines, once as a loose
//! `.jsonl` file and once inside a single-entry zip archive.

use arkfs_core::{ArkError, ArkResult};
use chrono::{DateTime, Utc};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::audit_log::AuditLog;

const FILE_TIME_FORMAT: &str = "%Y%m%d_%H%M%S";

fn archive_err(e: zip::result::ZipError) -> ArkError {
    ArkError::Archive(e.to_string())
}

/// Parse an inclusive RFC3339 time range
pub fn parse_range(from: &str, to: &str) -> ArkResult<(DateTime<Utc>, DateTime<Utc>)> {
    let parse = |label: &str, text: &str| {
        DateTime::parse_from_rfc3339(text)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| ArkError::InvalidTimeRange(format!("invalid {label} '{text}': {e}")))
    };
    let from = parse("from", from)?;
    let to = parse("to", to)?;
    if from > to {
        return Err(ArkError::InvalidTimeRange(format!("{from} is after {to}")));
    }
    Ok((from, to))
}

/// Base file name (without extension) for an export of `[from, to]`
pub fn export_stem(from: &DateTime<Utc>, to: &DateTime<Utc>) -> String {
    format!(
        "audit_{}_{}",
        from.format(FILE_TIME_FORMAT),
        to.format(FILE_TIME_FORMAT)
    )
}

fn write_archive(zip_path: &Path, entry_name: &str, contents: &[u8]) -> ArkResult<()> {
    let file = std::fs::File::create(zip_path)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file(entry_name, options).map_err(archive_err)?;
    zip.write_all(contents)?;
    zip.finish().map_err(archive_err)?;
    Ok(())
}

impl AuditLog {
    /// JSON-lines buffer of every record in `[from_ms, to_ms]`
    pub fn export_lines(&self, from_ms: i64, to_ms: i64) -> ArkResult<Vec<u8>> {
        let mut buf = Vec::new();
        for value in self.raw_range(from_ms, to_ms)? {
            buf.extend_from_slice(&value);
            buf.push(b'\n');
        }
        Ok(buf)
    }

    /// Export `[from, to]` into `export_dir` and return the archive path.
    ///
    /// The whole range is buffered in memory before anything is written.
    pub fn export(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        export_dir: impl AsRef<Path>,
    ) -> ArkResult<PathBuf> {
        let export_dir = export_dir.as_ref();
        std::fs::create_dir_all(export_dir)?;

        let stem = export_stem(&from, &to);
        let jsonl_name = format!("{stem}.jsonl");
        let jsonl_path = export_dir.join(&jsonl_name);
        let zip_path = export_dir.join(format!("{stem}.zip"));

        let buf = self.export_lines(from.timestamp_millis(), to.timestamp_millis())?;

        std::fs::write(&jsonl_path, &buf)?;
        write_archive(&zip_path, &jsonl_name, &buf)?;

        info!(
            archive = %zip_path.display(),
            jsonl = %jsonl_path.display(),
            bytes = buf.len(),
            "audit export complete"
        );
        Ok(zip_path)
    }
}
