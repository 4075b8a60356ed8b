use crate::core::{RmuError, RmuResult};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A binary in the mods directory that is a candidate for updating
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryTarget {
    pub path: PathBuf,
    /// Exact file name, matched against release asset names
    pub file_name: String,
    /// Repository URL read from the binary's metadata, once extracted
    pub reference_url: Option<String>,
}

impl BinaryTarget {
    pub fn new(path: PathBuf, file_name: impl Into<String>) -> Self {
        Self {
            path,
            file_name: file_name.into(),
            reference_url: None,
        }
    }

    /// Record the extracted reference. The first value sticks.
    pub fn record_reference(&mut self, url: &str) -> &str {
        self.reference_url.get_or_insert_with(|| url.to_string())
    }
}

/// Files in `dir` (not its subdirectories) with `extension`, minus those
/// starting with `skip_prefix`, sorted by path
///
/// Failing to read `dir` itself is an error. Entries that cannot be
/// inspected are skipped.
pub fn find_targets(dir: &Path, extension: &str, skip_prefix: &str) -> RmuResult<Vec<BinaryTarget>> {
    let entries = fs::read_dir(dir)
        .map_err(|e| RmuError::Path(format!("Cannot read {}: {}", dir.display(), e)))?;

    let mut targets = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            debug!("Skipping non UTF-8 file name {}", path.display());
            continue;
        };
        if !skip_prefix.is_empty() && file_name.starts_with(skip_prefix) {
            debug!("Skipping {} (prefix '{}')", file_name, skip_prefix);
            continue;
        }
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension));
        if !matches {
            continue;
        }

        targets.push(BinaryTarget::new(path.clone(), file_name));
    }

    targets.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(targets)
}
