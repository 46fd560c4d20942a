use std::path::PathBuf;

use crate::{ContentDigest, TransferError};

/// One file's trip through the pipeline. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferJob {
    /// File name as selected in the source directory.
    pub file: String,
    /// Local path of the original file.
    pub source: PathBuf,
    /// Remote path (relative to the share root) for the uncompressed file.
    pub remote: PathBuf,
    pub compress: bool,
    pub delete_after: bool,
}

/// Per-job state machine.
///
/// `Selected → Compressing → Transferring → Verifying → Succeeded →
/// CleaningUp → {CleanedUp, CleanupFailed}`, or one of the `*Failed`
/// terminals. There is no retry transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Selected,
    Compressing,
    Transferring,
    Verifying,
    CleaningUp,
    /// Verified; no cleanup requested.
    Succeeded,
    /// Verified and the local original removed.
    CleanedUp,
    /// Verified, but the local original could not be removed.
    CleanupFailed,
    CompressFailed,
    TransferFailed,
    /// The remote copy could not be reopened or read back.
    VerificationFailed,
    /// The digests differ.
    IntegrityFailed,
}

impl JobState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Selected => "selected",
            Self::Compressing => "compressing",
            Self::Transferring => "transferring",
            Self::Verifying => "verifying",
            Self::CleaningUp => "cleaning_up",
            Self::Succeeded => "succeeded",
            Self::CleanedUp => "cleaned_up",
            Self::CleanupFailed => "cleanup_failed",
            Self::CompressFailed => "compress_failed",
            Self::TransferFailed => "transfer_failed",
            Self::VerificationFailed => "verification_failed",
            Self::IntegrityFailed => "integrity_failed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(
            self,
            Self::Selected
                | Self::Compressing
                | Self::Transferring
                | Self::Verifying
                | Self::CleaningUp
        )
    }

    /// `true` when the remote copy was verified byte-identical.
    pub const fn is_verified(self) -> bool {
        matches!(self, Self::Succeeded | Self::CleanedUp | Self::CleanupFailed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one job. Produced once, never mutated after the batch records it.
#[derive(Debug)]
pub struct TransferOutcome {
    pub file: String,
    pub state: JobState,
    /// Remote path actually written (the archive name when compressing).
    pub remote: PathBuf,
    /// The failure that ended the job, if any.
    pub error: Option<TransferError>,
    /// Non-fatal problems, such as an archive that could not be removed.
    pub warnings: Vec<TransferError>,
    pub bytes_transferred: u64,
    pub source_digest: Option<ContentDigest>,
}

impl TransferOutcome {
    pub(crate) fn new(job: &TransferJob) -> Self {
        Self {
            file: job.file.clone(),
            state: JobState::Selected,
            remote: job.remote.clone(),
            error: None,
            warnings: Vec::new(),
            bytes_transferred: 0,
            source_digest: None,
        }
    }

    /// `true` when the job needs no further attention.
    pub fn succeeded(&self) -> bool {
        matches!(self.state, JobState::Succeeded | JobState::CleanedUp)
    }

    /// `true` when the remote copy was verified, even if cleanup failed.
    pub fn transfer_succeeded(&self) -> bool {
        self.state.is_verified()
    }
}

/// Aggregate of a whole batch.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub bytes_transferred: u64,
    pub outcomes: Vec<TransferOutcome>,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: Vec<TransferOutcome>) -> Self {
        let succeeded = outcomes.iter().filter(|o| o.succeeded()).count();
        Self {
            attempted: outcomes.len(),
            succeeded,
            failed: outcomes.len() - succeeded,
            bytes_transferred: outcomes.iter().map(|o| o.bytes_transferred).sum(),
            outcomes,
        }
    }

    /// `true` when no file was attempted.
    pub fn is_empty(&self) -> bool {
        self.attempted == 0
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }

    /// Outcomes that did not succeed.
    pub fn failures(&self) -> impl Iterator<Item = &TransferOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded())
    }
}
