//! Capture-then-transfer orchestration under a single deadline.
//!
//! # Design
//! - One `Deadline` per run, derived from the request timeout and shared by both stages.
//! - The deadline is checked before a stage starts and bounds the stage call, so a stage
//!   that ignores it is still cut off.
//! - Stages run strictly in sequence; the orchestrator never retries.
//! - Progress is reported through the injected `PipelineObserver`, never a global logger.

use std::sync::Arc;

use snapvault_core::{
    BackupFailure, BackupReport, BackupRequest, Deadline, FailureKind, NoopObserver,
    ObjectSink, Phase, PipelineEvent, PipelineObserver, RunOutcome, SnapshotSource,
    StageError, StageResult, StagingArtifact, StagingCleanup, StagingDisposition,
};
use tokio::time::Instant;

/// Runs one backup: snapshot capture into staging, then upload.
#[derive(Clone)]
pub struct BackupOrchestrator {
    source: Arc<dyn SnapshotSource>,
    sink: Arc<dyn ObjectSink>,
    observer: Arc<dyn PipelineObserver>,
}

impl BackupOrchestrator {
    /// Build an orchestrator over the given stages with a no-op observer.
    #[must_use]
    pub fn new(source: Arc<dyn SnapshotSource>, sink: Arc<dyn ObjectSink>) -> Self {
        Self {
            source,
            sink,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Replace the observer that receives pipeline events.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Run a backup with a fresh deadline derived from `request.timeout`.
    ///
    /// # Errors
    ///
    /// Returns a `BackupFailure` tagged with the phase that failed.
    pub async fn run_backup(&self, request: &BackupRequest) -> RunOutcome {
        let deadline = Deadline::after(request.timeout);
        self.run_backup_with_deadline(request, &deadline).await
    }

    /// Run a backup under a caller-owned deadline, e.g. one wired to an interrupt handler.
    ///
    /// # Errors
    ///
    /// Returns a `BackupFailure` tagged with the phase that failed.
    pub async fn run_backup_with_deadline(
        &self,
        request: &BackupRequest,
        deadline: &Deadline,
    ) -> RunOutcome {
        let started = Instant::now();
        self.observer.observe(&PipelineEvent::RunStarted {
            source: &request.source.endpoint,
            dial_timeout: request.source.dial_timeout,
            timeout: deadline.budget(),
        });

        let artifact = self
            .capture(request, deadline)
            .await
            .map_err(|err| self.fail(Phase::Capture, err))?;
        let bytes_uploaded = self
            .transfer(request, deadline, &artifact)
            .await
            .map_err(|err| self.fail(Phase::Transfer, err))?;
        let staging = self.dispose(request.cleanup, &artifact).await;

        let elapsed = started.elapsed();
        self.observer.observe(&PipelineEvent::RunCompleted {
            bytes_uploaded,
            elapsed,
        });
        Ok(BackupReport {
            bytes_uploaded,
            artifact,
            bucket: request.destination.bucket.clone(),
            object: request.destination.object.clone(),
            staging,
            elapsed,
        })
    }

    async fn capture(
        &self,
        request: &BackupRequest,
        deadline: &Deadline,
    ) -> StageResult<StagingArtifact> {
        deadline
            .check()
            .map_err(|reason| StageError::interrupted("orchestrator.capture", reason))?;
        let staging_path = request.staging_path();
        self.observer.observe(&PipelineEvent::CaptureStarted {
            backend: self.source.backend(),
            endpoint: &request.source.endpoint,
            staging_path: &staging_path,
        });

        let started = Instant::now();
        let artifact = deadline
            .bound(
                self.source
                    .capture(deadline, &request.source, &staging_path),
            )
            .await
            .unwrap_or_else(|reason| {
                Err(StageError::interrupted("orchestrator.capture", reason))
            })?;
        self.observer.observe(&PipelineEvent::CaptureSucceeded {
            artifact: &artifact,
            elapsed: started.elapsed(),
        });
        Ok(artifact)
    }

    async fn transfer(
        &self,
        request: &BackupRequest,
        deadline: &Deadline,
        artifact: &StagingArtifact,
    ) -> StageResult<u64> {
        deadline
            .check()
            .map_err(|reason| StageError::interrupted("orchestrator.transfer", reason))?;
        let destination = &request.destination;
        self.observer.observe(&PipelineEvent::TransferStarted {
            backend: self.sink.backend(),
            bucket: &destination.bucket,
            object: &destination.object,
            size_bytes: artifact.size_bytes,
            remaining: deadline.remaining(),
        });

        let started = Instant::now();
        let bytes_uploaded = deadline
            .bound(self.sink.upload(deadline, artifact, destination))
            .await
            .unwrap_or_else(|reason| {
                Err(StageError::interrupted("orchestrator.transfer", reason))
            })?;
        if bytes_uploaded != artifact.size_bytes {
            return Err(
                StageError::new(FailureKind::PartialWrite, "orchestrator.transfer").with_detail(
                    format!(
                        "uploaded {bytes_uploaded} of {} bytes",
                        artifact.size_bytes
                    ),
                ),
            );
        }
        self.observer.observe(&PipelineEvent::TransferSucceeded {
            bytes_uploaded,
            elapsed: started.elapsed(),
        });
        Ok(bytes_uploaded)
    }

    async fn dispose(
        &self,
        cleanup: StagingCleanup,
        artifact: &StagingArtifact,
    ) -> StagingDisposition {
        match cleanup {
            StagingCleanup::Retain => StagingDisposition::Retained,
            StagingCleanup::RemoveAfterUpload => {
                match tokio::fs::remove_file(artifact.path()).await {
                    Ok(()) => {
                        self.observer.observe(&PipelineEvent::StagingRemoved {
                            path: artifact.path(),
                        });
                        StagingDisposition::Removed
                    }
                    Err(error) => {
                        self.observer.observe(&PipelineEvent::StagingCleanupFailed {
                            path: artifact.path(),
                            error: &error,
                        });
                        StagingDisposition::RemovalFailed
                    }
                }
            }
        }
    }

    fn fail(&self, phase: Phase, error: StageError) -> BackupFailure {
        self.observer.observe(&PipelineEvent::PhaseFailed {
            phase,
            error: &error,
        });
        match phase {
            Phase::Capture => BackupFailure::capture(error),
            Phase::Transfer => BackupFailure::transfer(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use snapvault_test_support::{
        RecordingObserver, ScriptedSink, ScriptedSource, sample_request,
    };
    use tempfile::TempDir;

    #[tokio::test(start_paused = true)]
    async fn expired_deadline_skips_both_stages() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let request = sample_request(temp.path(), Duration::from_secs(60));
        let source = Arc::new(ScriptedSource::producing(16));
        let sink = Arc::new(ScriptedSink::accepting());
        let orchestrator = BackupOrchestrator::new(source.clone(), sink.clone());

        let deadline = Deadline::after(Duration::ZERO);
        let failure = orchestrator
            .run_backup_with_deadline(&request, &deadline)
            .await
            .expect_err("deadline already spent");

        assert_eq!(failure.phase(), Phase::Capture);
        assert_eq!(failure.kind(), FailureKind::DeadlineExceeded);
        assert_eq!(source.calls(), 0);
        assert_eq!(sink.calls(), 0);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn events_follow_stage_boundaries() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let request = sample_request(temp.path(), Duration::from_secs(60));
        let observer = Arc::new(RecordingObserver::new());
        let orchestrator = BackupOrchestrator::new(
            Arc::new(ScriptedSource::producing(64)),
            Arc::new(ScriptedSink::accepting()),
        )
        .with_observer(observer.clone());

        orchestrator.run_backup(&request).await?;

        assert_eq!(
            observer.kinds(),
            vec![
                "run_started",
                "capture_started",
                "capture_succeeded",
                "transfer_started",
                "transfer_succeeded",
                "run_completed",
            ]
        );
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn failure_events_carry_phase_and_kind() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let request = sample_request(temp.path(), Duration::from_secs(60));
        let observer = Arc::new(RecordingObserver::new());
        let orchestrator = BackupOrchestrator::new(
            Arc::new(ScriptedSource::producing(64)),
            Arc::new(ScriptedSink::failing(FailureKind::Rejected)),
        )
        .with_observer(observer.clone());

        let failure = orchestrator
            .run_backup(&request)
            .await
            .expect_err("sink rejects");
        assert_eq!(failure.phase(), Phase::Transfer);
        assert_eq!(
            observer.failures(),
            vec![(Phase::Transfer, FailureKind::Rejected)]
        );
        assert_eq!(observer.kinds().last(), Some(&"phase_failed"));
        Ok(())
    }
}
