//! Remote share capability consumed by the transfer pipeline.
//!
//! The pipeline only ever needs three byte-stream operations on remote
//! paths: create a file for writing, open a file for reading and remove a
//! file. Session setup and authentication live outside the pipeline; a
//! [`RemoteShare`] handed to it is already usable.

mod memory;
mod mounted;
mod session;
mod validation;

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub use memory::{Faults, MemoryShare};
pub use mounted::MountedShare;
pub use session::{ShareConfig, connect};
pub use validation::validate_remote_path;

/// Errors produced while establishing or addressing a remote share.
#[derive(Debug, thiserror::Error)]
pub enum ShareError {
    #[error("share mount point {} is unavailable: {source}", path.display())]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("share mount point is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("invalid remote path: {0}")]
    InvalidPath(String),
}

/// Byte-stream operations on an established remote share.
///
/// Implementations are shared read-only across every job of a batch. The
/// pipeline never closes the underlying session, only the files it opened.
pub trait RemoteShare: Send + Sync {
    /// Creates (or truncates) a remote file for writing.
    fn create(&self, path: &Path) -> std::io::Result<Box<dyn RemoteWriter>>;

    /// Opens an existing remote file for reading.
    fn open(&self, path: &Path) -> std::io::Result<RemoteFile>;

    /// Removes a remote file.
    fn remove(&self, path: &Path) -> std::io::Result<()>;
}

/// Writable remote stream.
///
/// [`finish`](RemoteWriter::finish) flushes and closes the stream so that
/// close-time failures are reported instead of being lost on drop.
pub trait RemoteWriter: Write + Send {
    fn finish(self: Box<Self>) -> std::io::Result<()>;
}

/// A remote file opened for reading.
pub struct RemoteFile {
    /// Readable stream over the remote content.
    pub reader: Box<dyn Read + Send>,
    /// Size reported by the share when the file was opened.
    pub size: u64,
}

impl std::fmt::Debug for RemoteFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteFile")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}
