//! Streams a local file to the share, hashing it in the same pass.

use std::fs::File;
use std::path::Path;

use smbsync_share::RemoteShare;
use tracing::{debug, error, info, warn};

use crate::digest::{PumpError, pump};
use crate::{ContentDigest, DigestWriter, Phase, ProgressEvent, ProgressSink, TransferError};

const MIB: f64 = 1024.0 * 1024.0;

/// What the engine sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferReceipt {
    /// Digest of every byte written to the remote file.
    pub digest: ContentDigest,
    pub bytes: u64,
}

/// Copies `local` to `remote` on `share` and returns the source digest.
///
/// Every buffer read from the local file is written to the remote file and
/// fed to the digest exactly once; the source is never read twice. Both
/// handles are closed before this returns. When the copy is interrupted the
/// partial remote file is removed (best effort) so it cannot be mistaken
/// for a complete one.
pub fn transfer_file(
    share: &dyn RemoteShare,
    local: &Path,
    remote: &Path,
    buf_size: usize,
    sink: &dyn ProgressSink,
) -> Result<TransferReceipt, TransferError> {
    let file = display_name(local);

    let mut source = File::open(local).map_err(|e| {
        error!(path = %local.display(), error = %e, "failed to open local file");
        TransferError::local_io("open", local, e)
    })?;
    let total = source
        .metadata()
        .map_err(|e| TransferError::local_io("stat", local, e))?
        .len();
    info!(
        file = %file,
        bytes = total,
        mb = %format!("{:.2}", total as f64 / MIB),
        "starting transfer"
    );
    debug!(local = %local.display(), remote = %remote.display(), "transfer paths");

    let writer = share.create(remote).map_err(|e| {
        error!(remote = %remote.display(), error = %e, "failed to create remote file");
        TransferError::RemoteCreate {
            path: remote.to_path_buf(),
            source: e,
        }
    })?;
    let mut dest = DigestWriter::new(writer);

    sink.emit(ProgressEvent::PhaseStarted {
        file: file.clone(),
        phase: Phase::Transferring,
        total,
    });
    let copied = pump(&mut source, &mut dest, buf_size, |done| {
        sink.emit(ProgressEvent::Bytes {
            file: file.clone(),
            phase: Phase::Transferring,
            done,
            total,
        });
    });
    drop(source);

    let (writer, digest) = dest.finalize();
    let result = match copied {
        Ok(bytes) => writer.finish().map(|()| bytes).map_err(|e| TransferError::TransferIo {
            path: remote.to_path_buf(),
            source: e,
        }),
        Err(PumpError::Read(e)) => {
            drop(writer);
            Err(TransferError::local_io("read", local, e))
        }
        Err(PumpError::Write(e)) => {
            drop(writer);
            Err(TransferError::TransferIo {
                path: remote.to_path_buf(),
                source: e,
            })
        }
    };

    match result {
        Ok(bytes) => {
            info!(file = %file, bytes, "copy completed");
            debug!(file = %file, digest = %digest, "source digest");
            Ok(TransferReceipt { digest, bytes })
        }
        Err(e) => {
            error!(file = %file, error = %e, "transfer failed");
            if let Err(rm) = share.remove(remote) {
                warn!(remote = %remote.display(), error = %rm, "failed to remove partial remote file");
            }
            Err(e)
        }
    }
}

pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
