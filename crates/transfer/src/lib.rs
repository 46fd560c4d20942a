//! Transfer and verification pipeline.
//!
//! Each selected file goes through the same sequence, one file at a time:
//!
//! 1. **Compress** (optional): wrap the file into a single-entry zip
//! 2. **Transfer**: stream it to the share while hashing it (SHA-256)
//! 3. **Verify**: reopen the remote copy, hash it again, compare
//! 4. **Clean up** (optional): delete the local original and the archive
//!
//! Deletion is only reachable with the [`Verified`] proof returned by the
//! verifier, so a local file is never removed before its remote copy has
//! been confirmed byte-identical.

mod batch;
mod cleanup;
mod compress;
mod digest;
mod engine;
mod progress;
mod types;
mod verify;

use std::io;
use std::path::{Path, PathBuf};

pub use batch::{BatchConfig, BatchRunner};
pub use cleanup::{CleanupReport, cleanup_after_success};
pub use compress::{CompressedArtifact, archive_path_for, compress_file};
pub use digest::{ContentDigest, DIGEST_LEN, DigestWriter, digest_bytes, digest_reader};
pub use engine::{TransferReceipt, transfer_file};
pub use progress::{NullSink, Phase, ProgressEvent, ProgressSink, SpeedCalculator};
pub use types::{BatchSummary, JobState, TransferJob, TransferOutcome};
pub use verify::{Verified, verify_remote};

/// Default copy buffer size: 1 MiB.
///
/// One read of this size drives one remote write and one hash update.
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// Errors produced by the pipeline. Every variant is local to one job.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("compression of {} failed ({operation}): {source}", path.display())]
    Compression {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("local file {} could not be read ({operation}): {source}", path.display())]
    LocalIo {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not create remote file {}: {source}", path.display())]
    RemoteCreate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("copy to remote file {} was interrupted: {source}", path.display())]
    TransferIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not reopen remote file {} for verification: {source}", path.display())]
    RemoteReopen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not read remote file {} for verification: {source}", path.display())]
    RemoteRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("integrity mismatch for {}: source {expected}, remote {actual}", path.display())]
    IntegrityMismatch {
        path: PathBuf,
        expected: ContentDigest,
        actual: ContentDigest,
    },

    #[error("could not delete local file {}: {source}", path.display())]
    LocalDelete {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not delete intermediate archive {}: {source}", path.display())]
    ArtifactCleanup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    InvalidPath(#[from] smbsync_share::ShareError),
}

impl TransferError {
    /// Stable identifier of the failure class, for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Compression { .. } => "compression_failure",
            Self::LocalIo { .. } => "local_io_failure",
            Self::RemoteCreate { .. } => "remote_create_failure",
            Self::TransferIo { .. } => "transfer_io_failure",
            Self::RemoteReopen { .. } => "remote_reopen_failure",
            Self::RemoteRead { .. } => "remote_read_failure",
            Self::IntegrityMismatch { .. } => "integrity_mismatch",
            Self::LocalDelete { .. } => "local_delete_failure",
            Self::ArtifactCleanup { .. } => "artifact_cleanup_failure",
            Self::InvalidPath(_) => "invalid_path",
        }
    }

    /// `true` for failures that happened while verifying the remote copy.
    pub fn is_verification_unavailable(&self) -> bool {
        matches!(self, Self::RemoteReopen { .. } | Self::RemoteRead { .. })
    }

    pub(crate) fn compression(operation: &'static str, path: &Path, source: io::Error) -> Self {
        Self::Compression {
            operation,
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn local_io(operation: &'static str, path: &Path, source: io::Error) -> Self {
        Self::LocalIo {
            operation,
            path: path.to_path_buf(),
            source,
        }
    }
}
