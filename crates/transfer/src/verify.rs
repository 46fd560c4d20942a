//! Independent re-read of the remote copy.

use std::path::Path;

use smbsync_share::{RemoteFile, RemoteShare};
use tracing::{debug, error, info};

use crate::engine::display_name;
use crate::{ContentDigest, Phase, ProgressEvent, ProgressSink, TransferError, digest_reader};

/// Proof that a remote file was read back and hashed equal to its source.
///
/// Only [`verify_remote`] creates it; destructive cleanup requires it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verified {
    digest: ContentDigest,
    bytes: u64,
}

impl Verified {
    /// The digest shared by source and remote copy.
    pub fn digest(&self) -> &ContentDigest {
        &self.digest
    }

    /// Bytes read back from the remote file.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    #[cfg(test)]
    pub(crate) fn for_tests(digest: ContentDigest, bytes: u64) -> Self {
        Self { digest, bytes }
    }
}

/// Reopens `remote`, hashes its full content and compares it with `expected`.
///
/// The file is opened fresh, never through the handle used to write it.
/// Open or read failures are reported as verification-unavailable errors
/// ([`TransferError::RemoteReopen`], [`TransferError::RemoteRead`]), distinct
/// from [`TransferError::IntegrityMismatch`]. The read handle is closed
/// before this returns.
pub fn verify_remote(
    share: &dyn RemoteShare,
    remote: &Path,
    expected: &ContentDigest,
    buf_size: usize,
    sink: &dyn ProgressSink,
) -> Result<Verified, TransferError> {
    let file = display_name(remote);
    info!(file = %file, "verifying remote copy");

    let RemoteFile { mut reader, size } = share.open(remote).map_err(|e| {
        error!(remote = %remote.display(), error = %e, "failed to reopen remote file");
        TransferError::RemoteReopen {
            path: remote.to_path_buf(),
            source: e,
        }
    })?;

    sink.emit(ProgressEvent::PhaseStarted {
        file: file.clone(),
        phase: Phase::Verifying,
        total: size,
    });
    let read = digest_reader(&mut reader, buf_size, |done| {
        sink.emit(ProgressEvent::Bytes {
            file: file.clone(),
            phase: Phase::Verifying,
            done,
            total: size,
        });
    });
    drop(reader);

    let (actual, bytes) = read.map_err(|source| {
        error!(remote = %remote.display(), error = %source, "failed to read remote file");
        TransferError::RemoteRead {
            path: remote.to_path_buf(),
            source,
        }
    })?;
    debug!(file = %file, digest = %actual, "remote digest");

    if actual != *expected {
        error!(
            file = %file,
            expected = %expected,
            actual = %actual,
            "integrity check failed: digests differ"
        );
        return Err(TransferError::IntegrityMismatch {
            path: remote.to_path_buf(),
            expected: *expected,
            actual,
        });
    }

    info!(file = %file, bytes, "remote copy verified");
    Ok(Verified {
        digest: actual,
        bytes,
    })
}
