//! File selection by name pattern.

use std::path::{Path, PathBuf};

use regex::{Regex, RegexBuilder};
use tracing::{debug, info, warn};

/// Errors produced while selecting local files.
#[derive(Debug, thiserror::Error)]
pub enum SelectError {
    /// The source directory is missing or unreadable. Kept distinct from an
    /// empty match set so a typo in the directory is never mistaken for
    /// "nothing to do".
    #[error("source directory {} is unavailable: {source}", path.display())]
    DirectoryUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid file pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Compiles a selection pattern.
///
/// Matching is case-insensitive and unanchored: `\.bak$` selects
/// `DB.BAK`, `log` selects `catalog.txt`. An empty pattern selects every file.
pub fn compile_pattern(pattern: &str) -> Result<Regex, SelectError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| SelectError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })
}

/// Returns the names of regular files in `dir` whose name matches `pattern`.
///
/// Subdirectories are never selected or descended into. Names are returned
/// sorted so a batch always runs in the same order.
pub fn select_files(dir: &Path, pattern: &str) -> Result<Vec<String>, SelectError> {
    let re = compile_pattern(pattern)?;
    debug!(dir = %dir.display(), pattern, "scanning source directory");

    let unavailable = |source| SelectError::DirectoryUnavailable {
        path: dir.to_path_buf(),
        source,
    };
    let entries = std::fs::read_dir(dir).map_err(unavailable)?;

    let mut selected = Vec::new();
    for entry in entries {
        let entry = entry.map_err(unavailable)?;
        let file_type = match entry.file_type() {
            Ok(t) => t,
            Err(e) => {
                warn!(file = %entry.path().display(), error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if file_type.is_dir() {
            continue;
        }
        // Non UTF-8 names cannot be matched or addressed on the share.
        let Ok(name) = entry.file_name().into_string() else {
            warn!(file = %entry.path().display(), "skipping file with non UTF-8 name");
            continue;
        };
        if re.is_match(&name) {
            debug!(file = %name, "file selected");
            selected.push(name);
        }
    }

    selected.sort();

    if selected.is_empty() {
        warn!(dir = %dir.display(), pattern, "no files match the pattern");
    } else {
        info!(dir = %dir.display(), count = selected.len(), "files selected");
    }
    Ok(selected)
}
