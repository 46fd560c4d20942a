//! Session establishment for a mounted share.
//!
//! Authentication is performed by whatever mounted the share (CIFS, autofs,
//! a desktop file manager). Connecting here only confirms that the mount
//! point is reachable and reports a run-level error otherwise.

use std::path::PathBuf;

use tracing::info;

use crate::{MountedShare, ShareError};

/// Describes the remote share a batch writes to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShareConfig {
    /// Server host name, for logging.
    pub host: String,
    /// Share name on the server, for logging.
    pub share: String,
    /// Account the mount was authenticated with, for logging.
    pub user: String,
    /// Local directory where the share is mounted.
    pub mount_point: PathBuf,
}

/// Establishes the share handle for a batch.
///
/// Fails when the mount point does not exist, cannot be inspected, or is
/// not a directory. No job may start when this fails.
pub fn connect(config: &ShareConfig) -> Result<MountedShare, ShareError> {
    let metadata =
        std::fs::metadata(&config.mount_point).map_err(|source| ShareError::Unavailable {
            path: config.mount_point.clone(),
            source,
        })?;

    if !metadata.is_dir() {
        return Err(ShareError::NotADirectory(config.mount_point.clone()));
    }

    // Listing the root catches stale mounts that still stat as directories.
    std::fs::read_dir(&config.mount_point).map_err(|source| ShareError::Unavailable {
        path: config.mount_point.clone(),
        source,
    })?;

    info!(
        host = %config.host,
        share = %config.share,
        user = %config.user,
        mount = %config.mount_point.display(),
        "share connected"
    );
    Ok(MountedShare::new(&config.mount_point))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(mount_point: PathBuf) -> ShareConfig {
        ShareConfig {
            host: "fileserver".into(),
            share: "backups".into(),
            user: "svc".into(),
            mount_point,
        }
    }

    #[test]
    fn connect_to_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let share = connect(&config(dir.path().to_path_buf())).unwrap();
        assert_eq!(share.root(), dir.path());
    }

    #[test]
    fn connect_missing_mount_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let result = connect(&config(dir.path().join("not-mounted")));
        assert!(matches!(result, Err(ShareError::Unavailable { .. })));
    }

    #[test]
    fn connect_to_file_is_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let result = connect(&config(file.path().to_path_buf()));
        assert!(matches!(result, Err(ShareError::NotADirectory(_))));
    }
}
