//! Local cleanup after a verified transfer.

use std::path::Path;

use smbsync_file_ops::{remove_if_exists, remove_local_file};
use tracing::{info, warn};

use crate::{ProgressEvent, ProgressSink, TransferError, TransferJob, Verified};

/// What cleanup did for one job.
#[derive(Debug, Default)]
pub struct CleanupReport {
    /// Cleanup was requested for the job.
    pub requested: bool,
    pub original_removed: bool,
    pub artifact_removed: bool,
    /// Failure to remove the original. The transfer itself stays verified.
    pub error: Option<TransferError>,
    /// Non-fatal failures (intermediate archive removal).
    pub warnings: Vec<TransferError>,
}

/// Removes the local original and, if distinct, the intermediate archive.
///
/// Requires the [`Verified`] proof of the job's remote copy. Does nothing
/// unless the job asked for deletion. The archive is attempted even if the
/// original could not be removed; its failure never fails the job.
pub fn cleanup_after_success(
    _proof: &Verified,
    job: &TransferJob,
    artifact: Option<&Path>,
    sink: &dyn ProgressSink,
) -> CleanupReport {
    let mut report = CleanupReport::default();
    if !job.delete_after {
        return report;
    }
    report.requested = true;

    info!(file = %job.file, path = %job.source.display(), "deleting local original");
    match remove_local_file(&job.source) {
        Ok(()) => report.original_removed = true,
        Err(e) => {
            report.error = Some(TransferError::LocalDelete {
                path: job.source.clone(),
                source: e,
            });
        }
    }
    sink.emit(ProgressEvent::Cleanup {
        file: job.file.clone(),
        path: job.source.clone(),
        removed: report.original_removed,
    });

    if let Some(archive) = artifact.filter(|a| *a != job.source.as_path()) {
        match remove_if_exists(archive) {
            Ok(removed) => report.artifact_removed = removed,
            Err(e) => {
                warn!(file = %job.file, archive = %archive.display(), error = %e, "failed to delete intermediate archive");
                report.warnings.push(TransferError::ArtifactCleanup {
                    path: archive.to_path_buf(),
                    source: e,
                });
            }
        }
        sink.emit(ProgressEvent::Cleanup {
            file: job.file.clone(),
            path: archive.to_path_buf(),
            removed: report.artifact_removed,
        });
    }

    report
}
