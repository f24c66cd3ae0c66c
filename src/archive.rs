//! Zip packaging of per-group workbooks.
//!
//! Every group gets its own entry. A group whose workbook cannot be built is
//! replaced by a `<group>_ERROR.txt` entry holding the failure message, and the
//! remaining groups are still packaged.

use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{GroupBuildError, Result};

#[derive(Debug)]
pub struct ArchiveReport {
    pub bytes: Vec<u8>,
    /// Groups packaged as workbooks, in archive order.
    pub built: Vec<String>,
    pub failed: Vec<GroupBuildError>,
}

/// Replace characters that file systems reject in names with `_`.
pub fn safe_file_name(name: &str) -> String {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    let pattern = UNSAFE.get_or_init(|| Regex::new(r#"[\\/:*?"<>|]"#).unwrap());
    pattern.replace_all(name, "_").into_owned()
}

/// `<group> <period> Student List.<ext>`
pub fn entry_name(group: &str, period_label: &str, extension: &str) -> String {
    format!(
        "{} {} Student List.{}",
        safe_file_name(group),
        period_label,
        extension
    )
}

pub fn error_entry_name(group: &str) -> String {
    format!("{}_ERROR.txt", safe_file_name(group))
}

/// Build one workbook per group with `build` and package them.
///
/// Failures of `build` are isolated to their group; only archive I/O errors are
/// returned.
pub fn build_archive<F>(
    groups: &[String],
    period_label: &str,
    extension: &str,
    mut build: F,
) -> Result<ArchiveReport>
where
    F: FnMut(&str) -> Result<Vec<u8>>,
{
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let mut names = HashSet::new();
    let mut built = Vec::new();
    let mut failed = Vec::new();

    for group in groups {
        match build(group) {
            Ok(bytes) => {
                let name = unique_name(&mut names, entry_name(group, period_label, extension));
                zip.start_file(name.as_str(), options)?;
                zip.write_all(&bytes)?;
                debug!(%group, entry = %name, bytes = bytes.len(), "packaged group");
                built.push(group.clone());
            }
            Err(source) => {
                let err = GroupBuildError {
                    group: group.clone(),
                    source,
                };
                warn!(%group, error = %err.source, "group failed, writing error entry");
                let name = unique_name(&mut names, error_entry_name(group));
                zip.start_file(name.as_str(), options)?;
                zip.write_all(err.to_string().as_bytes())?;
                failed.push(err);
            }
        }
    }

    let bytes = zip.finish()?.into_inner();
    Ok(ArchiveReport {
        bytes,
        built,
        failed,
    })
}

/// Groups that differ only in unsafe characters map to the same entry; number the repeats.
fn unique_name(taken: &mut HashSet<String>, name: String) -> String {
    if taken.insert(name.clone()) {
        return name;
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) => (stem.to_string(), format!(".{ext}")),
        None => (name.clone(), String::new()),
    };
    let mut n = 2;
    loop {
        let candidate = format!("{stem} ({n}){ext}");
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}
