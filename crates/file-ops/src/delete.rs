//! Local file removal after a verified transfer.

use std::io;
use std::path::Path;

/// Removes a local file, logging the outcome.
pub fn remove_local_file(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::info!(path = %path.display(), "deleted local file");
            Ok(())
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "failed to delete local file");
            Err(e)
        }
    }
}

/// Removes `path` if it exists.
///
/// Returns `Ok(false)` when there was nothing to remove.
pub fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match std::fs::symlink_metadata(path) {
        Ok(_) => remove_local_file(path).map(|()| true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
