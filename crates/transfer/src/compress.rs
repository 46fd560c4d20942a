//! Single-entry zip archives built before transfer.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};
use zip::CompressionMethod;
use zip::write::{FileOptions, ZipWriter};

use crate::digest::{PumpError, pump};
use crate::{DEFAULT_BUFFER_SIZE, Phase, ProgressEvent, ProgressSink, TransferError};

/// A local archive written in place of the original file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedArtifact {
    /// Local path of the archive.
    pub path: PathBuf,
    /// Name of the single entry inside the archive (the original file name).
    pub entry_name: String,
    /// Size of the original file.
    pub source_len: u64,
}

impl CompressedArtifact {
    /// File name of the archive, used as the remote name.
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }
}

/// Archive path for `source`: the extension is replaced by `.zip`.
///
/// `report.pdf` → `report.zip`, `data.tar.gz` → `data.tar.zip`,
/// `README` → `README.zip`.
pub fn archive_path_for(source: &Path) -> PathBuf {
    source.with_extension("zip")
}

/// Writes `source` into a new single-entry zip next to it.
///
/// The original file is never modified and an existing file at the archive
/// path is never overwritten. On failure a partially written archive is
/// removed and no transfer should be attempted.
pub fn compress_file(
    source: &Path,
    sink: &dyn ProgressSink,
) -> Result<CompressedArtifact, TransferError> {
    let archive = archive_path_for(source);
    if archive == source {
        return Err(TransferError::compression(
            "derive archive name",
            source,
            io::Error::new(
                io::ErrorKind::AlreadyExists,
                "archive path would overwrite the source file",
            ),
        ));
    }

    let entry_name = source
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            TransferError::compression(
                "derive entry name",
                source,
                io::Error::new(io::ErrorKind::InvalidInput, "source has no UTF-8 file name"),
            )
        })?
        .to_string();

    info!(file = %entry_name, archive = %archive.display(), "compressing file");

    let input =
        File::open(source).map_err(|e| TransferError::compression("open source", source, e))?;
    let total = input
        .metadata()
        .map_err(|e| TransferError::compression("stat source", source, e))?
        .len();

    // Never reuse an existing file: it may be user data that was not selected.
    let output = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&archive)
        .map_err(|e| TransferError::compression("create archive", &archive, e))?;

    match write_archive(input, total, output, source, &archive, &entry_name, sink) {
        Ok(archive_len) => {
            info!(
                file = %entry_name,
                archive = %archive.display(),
                source_bytes = total,
                archive_bytes = archive_len,
                "file compressed"
            );
            Ok(CompressedArtifact {
                path: archive,
                entry_name,
                source_len: total,
            })
        }
        Err(e) => {
            if let Err(rm) = std::fs::remove_file(&archive) {
                warn!(archive = %archive.display(), error = %rm, "failed to remove partial archive");
            }
            Err(e)
        }
    }
}

/// Streams `input` into `output` as a single deflated entry. Returns the
/// archive size.
fn write_archive(
    mut input: File,
    total: u64,
    output: File,
    source: &Path,
    archive: &Path,
    entry_name: &str,
    sink: &dyn ProgressSink,
) -> Result<u64, TransferError> {
    let mut zip = ZipWriter::new(output);

    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(total >= u64::from(u32::MAX));
    zip.start_file(entry_name, options)
        .map_err(|e| TransferError::compression("start entry", archive, e.into()))?;

    sink.emit(ProgressEvent::PhaseStarted {
        file: entry_name.to_string(),
        phase: Phase::Compressing,
        total,
    });

    pump(&mut input, &mut zip, DEFAULT_BUFFER_SIZE, |done| {
        sink.emit(ProgressEvent::Bytes {
            file: entry_name.to_string(),
            phase: Phase::Compressing,
            done,
            total,
        });
    })
    .map_err(|e| match e {
        PumpError::Read(e) => TransferError::compression("read source", source, e),
        PumpError::Write(e) => TransferError::compression("write archive", archive, e),
    })?;

    let file = zip
        .finish()
        .map_err(|e| TransferError::compression("finish archive", archive, e.into()))?;
    file.sync_all()
        .map_err(|e| TransferError::compression("sync archive", archive, e))?;
    file.metadata()
        .map(|m| m.len())
        .map_err(|e| TransferError::compression("stat archive", archive, e))
}
