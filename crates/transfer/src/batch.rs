//! Sequential batch orchestration.

use std::collections::HashSet;
use std::io;
use std::path::PathBuf;

use smbsync_share::{RemoteShare, validate_remote_path};
use tracing::{debug, error, info};

use crate::{
    BatchSummary, DEFAULT_BUFFER_SIZE, JobState, NullSink, ProgressEvent, ProgressSink,
    TransferError, TransferJob, TransferOutcome, archive_path_for, cleanup_after_success,
    compress_file, transfer_file, verify_remote,
};

/// Settings shared by every job of a batch. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    /// Local directory holding the selected files.
    pub source_dir: PathBuf,
    /// Destination directory, relative to the share root.
    pub remote_dir: PathBuf,
    /// Zip each file before sending it.
    pub compress: bool,
    /// Delete local files after a verified transfer.
    pub delete_after: bool,
    /// Copy buffer size in bytes.
    pub buffer_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("."),
            remote_dir: PathBuf::from("."),
            compress: false,
            delete_after: false,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// Runs the pipeline over a list of files, one at a time.
///
/// A failing file never stops the batch; its outcome is recorded and the
/// next file starts from a clean slate.
pub struct BatchRunner<'a> {
    share: &'a dyn RemoteShare,
    config: &'a BatchConfig,
    sink: &'a dyn ProgressSink,
}

impl<'a> BatchRunner<'a> {
    /// Creates a runner over an established share.
    pub fn new(share: &'a dyn RemoteShare, config: &'a BatchConfig) -> Self {
        Self {
            share,
            config,
            sink: &NullSink,
        }
    }

    /// Sends progress events to `sink`.
    pub fn with_sink(mut self, sink: &'a dyn ProgressSink) -> Self {
        self.sink = sink;
        self
    }

    /// Builds the job for a selected file name.
    pub fn job_for(&self, file: &str) -> TransferJob {
        TransferJob {
            file: file.to_string(),
            source: self.config.source_dir.join(file),
            remote: self.config.remote_dir.join(file),
            compress: self.config.compress,
            delete_after: self.config.delete_after,
        }
    }

    /// Processes `files` in order and summarizes the results.
    ///
    /// An empty list yields an empty summary. A job whose remote name was
    /// already written by an earlier job of the batch (`a.csv` and `a.txt`
    /// both compress to `a.zip`) fails before any I/O, so it can never
    /// replace a copy another job relied on for cleanup.
    pub fn run(&self, files: &[String]) -> BatchSummary {
        let total = files.len();
        let mut outcomes = Vec::with_capacity(total);
        let mut written: HashSet<PathBuf> = HashSet::new();

        for (i, file) in files.iter().enumerate() {
            info!(index = i + 1, total, file = %file, "processing file");
            self.sink.emit(ProgressEvent::JobStarted {
                index: i + 1,
                total,
                file: file.clone(),
            });
            let job = self.job_for(file);
            let target = remote_target(&job);
            let outcome = if written.contains(&target) {
                self.reject_duplicate(&job, target)
            } else {
                self.run_job(&job)
            };
            // Anything that completed a copy may have left a remote file.
            if outcome.source_digest.is_some() {
                written.insert(outcome.remote.clone());
            }
            outcomes.push(outcome);
        }

        let summary = BatchSummary::from_outcomes(outcomes);
        info!(
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            failed = summary.failed,
            bytes = summary.bytes_transferred,
            "batch completed"
        );
        summary
    }

    /// Runs one job through compress → transfer → verify → cleanup.
    pub fn run_job(&self, job: &TransferJob) -> TransferOutcome {
        let mut outcome = TransferOutcome::new(job);
        self.drive(job, &mut outcome);
        self.report(outcome)
    }

    fn reject_duplicate(&self, job: &TransferJob, target: PathBuf) -> TransferOutcome {
        let mut outcome = TransferOutcome::new(job);
        let source = io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} was already written by this batch", target.display()),
        );
        outcome.remote = target;
        let (state, error) = if job.compress {
            (
                JobState::CompressFailed,
                TransferError::compression("derive archive name", &job.source, source),
            )
        } else {
            (
                JobState::TransferFailed,
                TransferError::RemoteCreate {
                    path: outcome.remote.clone(),
                    source,
                },
            )
        };
        fail(&mut outcome, state, error);
        self.report(outcome)
    }

    /// Logs the terminal outcome and announces it to the sink.
    fn report(&self, outcome: TransferOutcome) -> TransferOutcome {
        debug_assert!(outcome.state.is_terminal(), "job left in {}", outcome.state);
        match &outcome.error {
            None => info!(
                file = %outcome.file,
                state = %outcome.state,
                bytes = outcome.bytes_transferred,
                warnings = outcome.warnings.len(),
                "file synced"
            ),
            Some(e) => error!(
                file = %outcome.file,
                state = %outcome.state,
                kind = e.kind(),
                error = %e,
                "file failed"
            ),
        }

        self.sink.emit(ProgressEvent::JobFinished {
            file: outcome.file.clone(),
            state: outcome.state,
            bytes: outcome.bytes_transferred,
        });
        outcome
    }

    fn drive(&self, job: &TransferJob, outcome: &mut TransferOutcome) {
        let buf_size = self.config.buffer_size;

        if let Err(e) = validate_remote_path(&job.remote) {
            return fail(outcome, JobState::TransferFailed, e.into());
        }

        let mut artifact: Option<PathBuf> = None;
        let local: PathBuf = if job.compress {
            outcome.state = JobState::Compressing;
            match compress_file(&job.source, self.sink) {
                Ok(a) => {
                    outcome.remote = remote_target(job);
                    debug!(
                        file = %job.file,
                        entry = %a.entry_name,
                        source_bytes = a.source_len,
                        remote = %outcome.remote.display(),
                        "sending archive instead of original"
                    );
                    let path = a.path.clone();
                    artifact = Some(a.path);
                    path
                }
                Err(e) => return fail(outcome, JobState::CompressFailed, e),
            }
        } else {
            job.source.clone()
        };

        outcome.state = JobState::Transferring;
        let receipt = match transfer_file(self.share, &local, &outcome.remote, buf_size, self.sink)
        {
            Ok(r) => r,
            Err(e) => return fail(outcome, JobState::TransferFailed, e),
        };
        outcome.bytes_transferred = receipt.bytes;
        outcome.source_digest = Some(receipt.digest);

        outcome.state = JobState::Verifying;
        let proof = match verify_remote(
            self.share,
            &outcome.remote,
            &receipt.digest,
            buf_size,
            self.sink,
        ) {
            Ok(p) => p,
            Err(e @ TransferError::IntegrityMismatch { .. }) => {
                return fail(outcome, JobState::IntegrityFailed, e);
            }
            Err(e) => return fail(outcome, JobState::VerificationFailed, e),
        };
        outcome.state = JobState::Succeeded;

        if !job.delete_after {
            return;
        }

        outcome.state = JobState::CleaningUp;
        let report = cleanup_after_success(&proof, job, artifact.as_deref(), self.sink);
        outcome.warnings = report.warnings;
        match report.error {
            None => outcome.state = JobState::CleanedUp,
            Some(e) => fail(outcome, JobState::CleanupFailed, e),
        }
    }
}

/// Remote path the job writes: the archive name when compressing.
fn remote_target(job: &TransferJob) -> PathBuf {
    if job.compress {
        archive_path_for(&job.remote)
    } else {
        job.remote.clone()
    }
}

fn fail(outcome: &mut TransferOutcome, state: JobState, error: TransferError) {
    outcome.state = state;
    outcome.error = Some(error);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest_bytes;
    use crate::test_support::RecordingSink;
    use smbsync_share::{Faults, MemoryShare, MountedShare};
    use std::io::Read;
    use std::path::Path;
    use tempfile::TempDir;

    fn config(dir: &TempDir, compress: bool, delete_after: bool) -> BatchConfig {
        BatchConfig {
            source_dir: dir.path().to_path_buf(),
            remote_dir: PathBuf::from("backups"),
            compress,
            delete_after,
            buffer_size: 64 * 1024,
        }
    }

    fn write(dir: &TempDir, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, data).unwrap();
        path
    }

    #[test]
    fn ten_megabyte_file_with_delete_after() {
        let dir = TempDir::new().unwrap();
        let data: Vec<u8> = (0..10 * 1024 * 1024u32).map(|i| (i % 253) as u8).collect();
        let local = write(&dir, "report.pdf", &data);
        let remote_root = TempDir::new().unwrap();
        let share = MountedShare::new(remote_root.path());
        let cfg = config(&dir, false, true);

        let summary = BatchRunner::new(&share, &cfg).run(&["report.pdf".to_string()]);

        assert_eq!(summary.succeeded, 1);
        let outcome = &summary.outcomes[0];
        assert_eq!(outcome.state, JobState::CleanedUp);
        assert!(outcome.succeeded());
        assert_eq!(outcome.bytes_transferred, data.len() as u64);
        assert_eq!(outcome.source_digest, Some(digest_bytes(&data)));
        assert_eq!(
            std::fs::read(remote_root.path().join("backups/report.pdf")).unwrap(),
            data
        );
        assert!(!local.exists());
    }

    #[test]
    fn keeps_local_file_without_delete_after() {
        let dir = TempDir::new().unwrap();
        let local = write(&dir, "a.txt", b"hello");
        let share = MemoryShare::new();
        let cfg = config(&dir, false, false);

        let summary = BatchRunner::new(&share, &cfg).run(&["a.txt".to_string()]);
        assert_eq!(summary.outcomes[0].state, JobState::Succeeded);
        assert!(local.exists());
        assert_eq!(share.contents("backups/a.txt").unwrap(), b"hello");
    }

    #[test]
    fn verification_read_error_keeps_original() {
        let dir = TempDir::new().unwrap();
        let local = write(&dir, "a.txt", b"hello");
        let share = MemoryShare::new();
        share.inject("backups/a.txt", Faults { fail_read: true, ..Faults::default() });
        let cfg = config(&dir, false, true);

        let summary = BatchRunner::new(&share, &cfg).run(&["a.txt".to_string()]);
        let outcome = &summary.outcomes[0];
        assert_eq!(outcome.state, JobState::VerificationFailed);
        assert!(matches!(outcome.error, Some(TransferError::RemoteRead { .. })));
        assert!(local.exists());
        assert_eq!(summary.failed, 1);
    }

    #[test]
    fn tampered_remote_is_integrity_failure_and_keeps_original() {
        let dir = TempDir::new().unwrap();
        let local = write(&dir, "a.txt", b"hello");
        let share = MemoryShare::new();
        share.inject("backups/a.txt", Faults { corrupt_on_finish: true, ..Faults::default() });
        let cfg = config(&dir, false, true);

        let runner = BatchRunner::new(&share, &cfg);
        let outcome = runner.run_job(&runner.job_for("a.txt"));
        assert_eq!(outcome.state, JobState::IntegrityFailed);
        match &outcome.error {
            Some(TransferError::IntegrityMismatch { expected, actual, .. }) => {
                assert_eq!(*expected, digest_bytes(b"hello"));
                assert_ne!(expected, actual);
            }
            other => panic!("expected IntegrityMismatch, got {other:?}"),
        }
        assert!(local.exists());
    }

    #[test]
    fn first_failure_does_not_affect_second_file() {
        let dir = TempDir::new().unwrap();
        write(&dir, "first.bak", b"one");
        let second = write(&dir, "second.bak", b"two");
        let share = MemoryShare::new();
        share.inject("backups/first.bak", Faults { fail_create: true, ..Faults::default() });
        let cfg = config(&dir, false, true);

        let summary = BatchRunner::new(&share, &cfg)
            .run(&["first.bak".to_string(), "second.bak".to_string()]);

        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.succeeded, 1);
        assert!(matches!(
            summary.outcomes[0].error,
            Some(TransferError::RemoteCreate { .. })
        ));
        assert_eq!(summary.outcomes[0].state, JobState::TransferFailed);
        assert!(dir.path().join("first.bak").exists());
        assert_eq!(summary.outcomes[1].state, JobState::CleanedUp);
        assert_eq!(share.contents("backups/second.bak").unwrap(), b"two");
        assert!(!second.exists());
    }

    #[test]
    fn compress_and_delete_removes_original_and_archive() {
        let dir = TempDir::new().unwrap();
        let local = write(&dir, "a.txt", b"compress me please");
        let share = MemoryShare::new();
        let cfg = config(&dir, true, true);

        let summary = BatchRunner::new(&share, &cfg).run(&["a.txt".to_string()]);
        let outcome = &summary.outcomes[0];
        assert_eq!(outcome.state, JobState::CleanedUp);
        assert_eq!(outcome.remote, PathBuf::from("backups/a.zip"));
        assert!(outcome.warnings.is_empty());
        assert!(!local.exists());
        assert!(!dir.path().join("a.zip").exists());

        let remote = share.contents("backups/a.zip").unwrap();
        let mut zip = zip::ZipArchive::new(std::io::Cursor::new(remote)).unwrap();
        let mut entry = zip.by_name("a.txt").unwrap();
        let mut data = Vec::new();
        entry.read_to_end(&mut data).unwrap();
        assert_eq!(data, b"compress me please");
    }

    #[test]
    fn compress_without_delete_keeps_archive() {
        let dir = TempDir::new().unwrap();
        let local = write(&dir, "a.txt", b"abc");
        let share = MemoryShare::new();
        let cfg = config(&dir, true, false);

        let summary = BatchRunner::new(&share, &cfg).run(&["a.txt".to_string()]);
        assert_eq!(summary.outcomes[0].state, JobState::Succeeded);
        assert!(local.exists());
        assert!(dir.path().join("a.zip").exists());
    }

    #[test]
    fn archive_cleanup_failure_keeps_job_successful() {
        let dir = TempDir::new().unwrap();
        let local = write(&dir, "a.txt", b"abc");
        let share = MemoryShare::new();
        let cfg = config(&dir, true, true);
        let archive = dir.path().join("a.zip");

        // Swap the archive for a non-empty directory once it has been sent,
        // so removing it fails.
        let swap = {
            let archive = archive.clone();
            move |e: ProgressEvent| {
                if let ProgressEvent::PhaseStarted {
                    phase: crate::Phase::Verifying,
                    ..
                } = e
                {
                    std::fs::remove_file(&archive).unwrap();
                    std::fs::create_dir(&archive).unwrap();
                    std::fs::write(archive.join("keep"), b"x").unwrap();
                }
            }
        };

        let summary = BatchRunner::new(&share, &cfg)
            .with_sink(&swap)
            .run(&["a.txt".to_string()]);
        let outcome = &summary.outcomes[0];
        assert_eq!(outcome.state, JobState::CleanedUp);
        assert!(outcome.succeeded());
        assert_eq!(outcome.warnings.len(), 1);
        assert!(matches!(
            outcome.warnings[0],
            TransferError::ArtifactCleanup { .. }
        ));
        assert!(!local.exists());
        assert_eq!(summary.succeeded, 1);
    }

    #[test]
    fn compression_failure_skips_transfer() {
        let dir = TempDir::new().unwrap();
        let share = MemoryShare::new();
        let cfg = config(&dir, true, true);

        let summary = BatchRunner::new(&share, &cfg).run(&["missing.txt".to_string()]);
        assert_eq!(summary.outcomes[0].state, JobState::CompressFailed);
        assert!(share.is_empty());
    }

    #[test]
    fn local_delete_failure_is_cleanup_failed() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.txt", b"abc");
        let share = MemoryShare::new();
        let cfg = config(&dir, false, true);
        let source = dir.path().join("a.txt");

        // Remove the original behind the pipeline's back after verification.
        let thief = move |e: ProgressEvent| {
            if let ProgressEvent::PhaseStarted {
                phase: crate::Phase::Verifying,
                ..
            } = e
            {
                std::fs::remove_file(&source).unwrap();
            }
        };

        let summary = BatchRunner::new(&share, &cfg)
            .with_sink(&thief)
            .run(&["a.txt".to_string()]);
        let outcome = &summary.outcomes[0];
        assert_eq!(outcome.state, JobState::CleanupFailed);
        assert!(outcome.transfer_succeeded());
        assert!(matches!(outcome.error, Some(TransferError::LocalDelete { .. })));
        assert_eq!(summary.failed, 1);
        assert!(share.exists("backups/a.txt"));
    }

    #[test]
    fn escaping_file_name_is_rejected_before_any_io() {
        let dir = TempDir::new().unwrap();
        let share = MemoryShare::new();
        let cfg = BatchConfig {
            remote_dir: PathBuf::from(".."),
            ..config(&dir, false, true)
        };
        write(&dir, "a.txt", b"abc");

        let summary = BatchRunner::new(&share, &cfg).run(&["a.txt".to_string()]);
        assert_eq!(summary.outcomes[0].state, JobState::TransferFailed);
        assert!(matches!(summary.outcomes[0].error, Some(TransferError::InvalidPath(_))));
        assert!(dir.path().join("a.txt").exists());
    }

    #[test]
    fn empty_batch_is_empty_summary() {
        let dir = TempDir::new().unwrap();
        let share = MemoryShare::new();
        let cfg = config(&dir, false, false);
        let summary = BatchRunner::new(&share, &cfg).run(&[]);
        assert!(summary.is_empty());
    }

    #[test]
    fn events_follow_pipeline_order() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.txt", b"abc");
        let share = MemoryShare::new();
        let cfg = config(&dir, true, true);
        let sink = RecordingSink::default();

        BatchRunner::new(&share, &cfg)
            .with_sink(&sink)
            .run(&["a.txt".to_string()]);

        let kinds: Vec<&str> = sink
            .take()
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::JobStarted { .. } => Some("start"),
                ProgressEvent::PhaseStarted { phase, .. } => Some(phase.as_str()),
                ProgressEvent::Cleanup { .. } => Some("cleanup"),
                ProgressEvent::JobFinished { .. } => Some("finish"),
                ProgressEvent::Bytes { .. } => None,
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                "start",
                "compressing",
                "transferring",
                "verifying",
                "cleanup",
                "cleanup",
                "finish"
            ]
        );
    }

    #[test]
    fn job_paths_follow_config() {
        let dir = TempDir::new().unwrap();
        let share = MemoryShare::new();
        let cfg = config(&dir, true, false);
        let job = BatchRunner::new(&share, &cfg).job_for("db.bak");
        assert_eq!(job.source, dir.path().join("db.bak"));
        assert_eq!(job.remote, Path::new("backups/db.bak"));
        assert!(job.compress);
        assert!(!job.delete_after);
    }

    #[test]
    fn same_archive_name_is_not_reused_within_a_batch() {
        let dir = TempDir::new().unwrap();
        let csv = write(&dir, "a.csv", b"csv rows");
        let txt = write(&dir, "a.txt", b"text lines");
        let share = MemoryShare::new();
        let cfg = config(&dir, true, true);

        let summary = BatchRunner::new(&share, &cfg)
            .run(&["a.csv".to_string(), "a.txt".to_string()]);

        assert_eq!(summary.outcomes[0].state, JobState::CleanedUp);
        assert!(!csv.exists());

        let second = &summary.outcomes[1];
        assert_eq!(second.state, JobState::CompressFailed);
        assert_eq!(second.remote, PathBuf::from("backups/a.zip"));
        assert!(matches!(
            second.error,
            Some(TransferError::Compression { operation: "derive archive name", .. })
        ));
        assert!(txt.exists());
        assert_eq!(summary.failed, 1);

        // The first file's only copy survives on the share.
        let remote = share.contents("backups/a.zip").unwrap();
        let mut zip = zip::ZipArchive::new(std::io::Cursor::new(remote)).unwrap();
        let mut data = Vec::new();
        zip.by_name("a.csv").unwrap().read_to_end(&mut data).unwrap();
        assert_eq!(data, b"csv rows");
    }

    #[test]
    fn existing_local_archive_is_never_overwritten_or_deleted() {
        let dir = TempDir::new().unwrap();
        let local = write(&dir, "a.txt", b"to send");
        let user_zip = write(&dir, "a.zip", b"user archive, not selected");
        let share = MemoryShare::new();
        let cfg = config(&dir, true, true);

        let summary = BatchRunner::new(&share, &cfg).run(&["a.txt".to_string()]);

        let outcome = &summary.outcomes[0];
        assert_eq!(outcome.state, JobState::CompressFailed);
        assert!(matches!(
            outcome.error,
            Some(TransferError::Compression { operation: "create archive", .. })
        ));
        assert_eq!(std::fs::read(&user_zip).unwrap(), b"user archive, not selected");
        assert!(local.exists());
        assert!(share.is_empty());
    }

    #[test]
    fn reopen_failure_is_verification_failed_and_keeps_original() {
        let dir = TempDir::new().unwrap();
        let local = write(&dir, "a.txt", b"hello");
        let share = MemoryShare::new();
        share.inject("backups/a.txt", Faults { fail_open: true, ..Faults::default() });
        let cfg = config(&dir, false, true);

        let summary = BatchRunner::new(&share, &cfg).run(&["a.txt".to_string()]);
        let outcome = &summary.outcomes[0];
        assert_eq!(outcome.state, JobState::VerificationFailed);
        assert!(matches!(outcome.error, Some(TransferError::RemoteReopen { .. })));
        assert!(!outcome.transfer_succeeded());
        assert!(local.exists());
        assert!(share.exists("backups/a.txt"));
    }
}
