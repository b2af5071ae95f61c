//! Scripted capture and transfer stages with call accounting.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use snapvault_core::{
    Deadline, Destination, FailureKind, ObjectSink, SnapshotSource, SourceConfig, StageError,
    StageResult, StagingArtifact,
};
use tokio::time::sleep;

/// What a scripted capture does once its delay has elapsed.
#[derive(Debug, Clone, Copy)]
pub enum CaptureScript {
    /// Write `size_bytes` bytes to the destination and report the artifact.
    Produce {
        /// Artifact size.
        size_bytes: usize,
    },
    /// Fail with the given classification.
    Fail {
        /// Failure classification.
        kind: FailureKind,
    },
}

/// Capture stage that follows a fixed script.
#[derive(Debug)]
pub struct ScriptedSource {
    script: CaptureScript,
    delay: Duration,
    honour_deadline: bool,
    calls: AtomicUsize,
}

impl ScriptedSource {
    /// Capture that produces an artifact of `size_bytes`.
    #[must_use]
    pub const fn producing(size_bytes: usize) -> Self {
        Self::scripted(CaptureScript::Produce { size_bytes })
    }

    /// Capture that fails with `kind`.
    #[must_use]
    pub const fn failing(kind: FailureKind) -> Self {
        Self::scripted(CaptureScript::Fail { kind })
    }

    const fn scripted(script: CaptureScript) -> Self {
        Self {
            script,
            delay: Duration::ZERO,
            honour_deadline: true,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sleep for `delay` before acting.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Ignore the deadline, simulating a misbehaving backend.
    #[must_use]
    pub const fn ignoring_deadline(mut self) -> Self {
        self.honour_deadline = false;
        self
    }

    /// Number of times `capture` was invoked.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn perform(&self, dest: &Path) -> StageResult<StagingArtifact> {
        sleep(self.delay).await;
        match self.script {
            CaptureScript::Produce { size_bytes } => {
                let bytes = vec![0xA5_u8; size_bytes];
                tokio::fs::write(dest, &bytes).await.map_err(|err| {
                    StageError::new(FailureKind::Io, "scripted.capture").with_source(err)
                })?;
                Ok(StagingArtifact {
                    path: dest.to_path_buf(),
                    size_bytes: bytes.len() as u64,
                    sha256: Sha256::digest(&bytes).into(),
                })
            }
            CaptureScript::Fail { kind } => Err(StageError::new(kind, "scripted.capture")),
        }
    }
}

#[async_trait]
impl SnapshotSource for ScriptedSource {
    fn backend(&self) -> &'static str {
        "scripted"
    }

    async fn capture(
        &self,
        deadline: &Deadline,
        _source: &SourceConfig,
        dest: &Path,
    ) -> StageResult<StagingArtifact> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.honour_deadline {
            deadline
                .bound(self.perform(dest))
                .await
                .map_err(|reason| StageError::interrupted("scripted.capture", reason))?
        } else {
            self.perform(dest).await
        }
    }
}

/// What a scripted upload does once its delay has elapsed.
#[derive(Debug, Clone, Copy)]
pub enum UploadScript {
    /// Report the full artifact size.
    Accept,
    /// Report `missing` fewer bytes than the artifact holds.
    Short {
        /// Bytes left out of the report.
        missing: u64,
    },
    /// Fail with the given classification.
    Fail {
        /// Failure classification.
        kind: FailureKind,
    },
}

/// Observation made by the sink at the moment it was invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadCall {
    /// Artifact path handed to the sink.
    pub path: PathBuf,
    /// Size of the file on disk when the upload started.
    pub size_on_disk: Option<u64>,
    /// Bucket requested.
    pub bucket: String,
    /// Object key requested.
    pub object: String,
}

/// Transfer stage that follows a fixed script.
#[derive(Debug)]
pub struct ScriptedSink {
    script: UploadScript,
    delay: Duration,
    honour_deadline: bool,
    calls: Mutex<Vec<UploadCall>>,
}

impl ScriptedSink {
    /// Upload that accepts every artifact.
    #[must_use]
    pub const fn accepting() -> Self {
        Self::scripted(UploadScript::Accept)
    }

    /// Upload that reports `missing` fewer bytes than the artifact size.
    #[must_use]
    pub const fn short_by(missing: u64) -> Self {
        Self::scripted(UploadScript::Short { missing })
    }

    /// Upload that fails with `kind`.
    #[must_use]
    pub const fn failing(kind: FailureKind) -> Self {
        Self::scripted(UploadScript::Fail { kind })
    }

    const fn scripted(script: UploadScript) -> Self {
        Self {
            script,
            delay: Duration::ZERO,
            honour_deadline: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Sleep for `delay` before acting.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Ignore the deadline, simulating a misbehaving backend.
    #[must_use]
    pub const fn ignoring_deadline(mut self) -> Self {
        self.honour_deadline = false;
        self
    }

    /// Number of times `upload` was invoked.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.recorded().len()
    }

    /// Every invocation recorded so far.
    #[must_use]
    pub fn recorded(&self) -> Vec<UploadCall> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    async fn perform(&self, artifact: &StagingArtifact) -> StageResult<u64> {
        sleep(self.delay).await;
        match self.script {
            UploadScript::Accept => Ok(artifact.size_bytes),
            UploadScript::Short { missing } => Ok(artifact.size_bytes.saturating_sub(missing)),
            UploadScript::Fail { kind } => Err(StageError::new(kind, "scripted.upload")),
        }
    }
}

#[async_trait]
impl ObjectSink for ScriptedSink {
    fn backend(&self) -> &'static str {
        "scripted"
    }

    async fn upload(
        &self,
        deadline: &Deadline,
        artifact: &StagingArtifact,
        destination: &Destination,
    ) -> StageResult<u64> {
        let size_on_disk = tokio::fs::metadata(&artifact.path)
            .await
            .ok()
            .map(|meta| meta.len());
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(UploadCall {
                path: artifact.path.clone(),
                size_on_disk,
                bucket: destination.bucket.clone(),
                object: destination.object.clone(),
            });
        }
        if self.honour_deadline {
            deadline
                .bound(self.perform(artifact))
                .await
                .map_err(|reason| StageError::interrupted("scripted.upload", reason))?
        } else {
            self.perform(artifact).await
        }
    }
}
