//! Share mounted into the local filesystem (CIFS/SMB mount point).

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{RemoteFile, RemoteShare, RemoteWriter, validate_remote_path};

/// A remote share reachable through a local mount point.
///
/// Every remote path is resolved relative to the mount root and must not
/// escape it.
#[derive(Debug, Clone)]
pub struct MountedShare {
    root: PathBuf,
}

impl MountedShare {
    /// Creates a share rooted at `root`. No I/O is performed.
    ///
    /// Use [`connect`](crate::connect) to check that the mount is usable.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the mount root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> io::Result<PathBuf> {
        validate_remote_path(path)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        Ok(self.root.join(path))
    }
}

impl RemoteShare for MountedShare {
    fn create(&self, path: &Path) -> io::Result<Box<dyn RemoteWriter>> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&full)?;
        debug!(path = %full.display(), "created remote file");
        Ok(Box::new(MountedWriter { file }))
    }

    fn open(&self, path: &Path) -> io::Result<RemoteFile> {
        let full = self.resolve(path)?;
        let file = File::open(&full)?;
        let size = file.metadata()?.len();
        debug!(path = %full.display(), size, "opened remote file");
        Ok(RemoteFile {
            reader: Box::new(file),
            size,
        })
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        let full = self.resolve(path)?;
        std::fs::remove_file(&full)?;
        debug!(path = %full.display(), "removed remote file");
        Ok(())
    }
}

struct MountedWriter {
    file: File,
}

impl Write for MountedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl RemoteWriter for MountedWriter {
    fn finish(mut self: Box<Self>) -> io::Result<()> {
        self.file.flush()?;
        // Push the data to the server before the file is reopened for verification.
        self.file.sync_all()
    }
}
