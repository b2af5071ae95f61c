//! Events emitted by the orchestrator at stage boundaries.

use std::io;
use std::path::Path;
use std::time::Duration;

use url::Url;

use crate::error::{Phase, StageError};
use crate::model::StagingArtifact;

/// Observable pipeline milestones, borrowed from the running orchestrator.
#[derive(Debug, Clone, Copy)]
pub enum PipelineEvent<'a> {
    /// A run was accepted and its deadline derived.
    RunStarted {
        /// Store endpoint being snapshotted.
        source: &'a Url,
        /// Configured dial timeout for the store.
        dial_timeout: Duration,
        /// Overall run budget.
        timeout: Duration,
    },
    /// Capture is about to start.
    CaptureStarted {
        /// Backend name reported by the snapshot source.
        backend: &'static str,
        /// Store endpoint being snapshotted.
        endpoint: &'a Url,
        /// Where the artifact will be written.
        staging_path: &'a Path,
    },
    /// Capture produced a complete artifact.
    CaptureSucceeded {
        /// Captured artifact.
        artifact: &'a StagingArtifact,
        /// Time spent in the capture stage.
        elapsed: Duration,
    },
    /// Transfer is about to start.
    TransferStarted {
        /// Backend name reported by the object sink.
        backend: &'static str,
        /// Destination bucket.
        bucket: &'a str,
        /// Destination object key.
        object: &'a str,
        /// Artifact size in bytes.
        size_bytes: u64,
        /// Budget left for the transfer.
        remaining: Duration,
    },
    /// Transfer completed.
    TransferSucceeded {
        /// Bytes written to the destination.
        bytes_uploaded: u64,
        /// Time spent in the transfer stage.
        elapsed: Duration,
    },
    /// A phase failed; the run ends with this failure.
    PhaseFailed {
        /// Phase that failed.
        phase: Phase,
        /// Classified failure.
        error: &'a StageError,
    },
    /// The staging artifact was deleted after upload.
    StagingRemoved {
        /// Deleted file.
        path: &'a Path,
    },
    /// Deleting the staging artifact failed; the run still succeeds.
    StagingCleanupFailed {
        /// File that could not be removed.
        path: &'a Path,
        /// Underlying IO error.
        error: &'a io::Error,
    },
    /// The run succeeded.
    RunCompleted {
        /// Bytes written to the destination.
        bytes_uploaded: u64,
        /// Wall-clock time of the whole run.
        elapsed: Duration,
    },
}

impl PipelineEvent<'_> {
    /// Machine-friendly discriminator.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "run_started",
            Self::CaptureStarted { .. } => "capture_started",
            Self::CaptureSucceeded { .. } => "capture_succeeded",
            Self::TransferStarted { .. } => "transfer_started",
            Self::TransferSucceeded { .. } => "transfer_succeeded",
            Self::PhaseFailed { .. } => "phase_failed",
            Self::StagingRemoved { .. } => "staging_removed",
            Self::StagingCleanupFailed { .. } => "staging_cleanup_failed",
            Self::RunCompleted { .. } => "run_completed",
        }
    }
}
