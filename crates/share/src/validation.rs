use std::path::{Component, Path};

use crate::ShareError;

/// Validates that a remote path stays inside the share it is addressed to.
///
/// Rejects:
/// - Empty paths
/// - Absolute paths (Unix `/` or Windows `C:\`)
/// - Parent directory traversal (`..`)
/// - Windows prefix components (`C:`, `\\server`)
pub fn validate_remote_path(path: &Path) -> Result<(), ShareError> {
    if path.as_os_str().is_empty() {
        return Err(ShareError::InvalidPath("empty path".into()));
    }

    let shown = path.display();

    if path.is_absolute() {
        return Err(ShareError::InvalidPath(format!(
            "absolute path not allowed: {shown}"
        )));
    }

    let mut has_name = false;
    for component in path.components() {
        match component {
            Component::ParentDir => {
                return Err(ShareError::InvalidPath(format!(
                    "parent directory traversal not allowed: {shown}"
                )));
            }
            Component::Prefix(_) => {
                return Err(ShareError::InvalidPath(format!(
                    "path prefix not allowed: {shown}"
                )));
            }
            Component::RootDir => {
                return Err(ShareError::InvalidPath(format!(
                    "absolute path not allowed: {shown}"
                )));
            }
            Component::Normal(_) => has_name = true,
            Component::CurDir => {}
        }
    }

    // "." and "./." name the share root, which is not a file.
    if !has_name {
        return Err(ShareError::InvalidPath(format!("no file name in: {shown}")));
    }

    Ok(())
}
