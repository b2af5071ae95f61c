//! Stage and observer traits implemented by backends.

use std::path::Path;

use async_trait::async_trait;

use crate::deadline::Deadline;
use crate::error::StageResult;
use crate::events::PipelineEvent;
use crate::model::{Destination, SourceConfig, StagingArtifact};

/// Captures a consistent snapshot of a store into a local file.
///
/// Implementations must honour `deadline` at every suspension point and must not
/// leave a file at `dest` that looks complete when they fail.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Short backend identifier used in logs.
    fn backend(&self) -> &'static str;

    /// Stream a snapshot from `source` into `dest`.
    async fn capture(
        &self,
        deadline: &Deadline,
        source: &SourceConfig,
        dest: &Path,
    ) -> StageResult<StagingArtifact>;
}

/// Moves a staging artifact into durable object storage.
///
/// Implementations own their retry policy and must never report success for a
/// truncated or corrupted upload.
#[async_trait]
pub trait ObjectSink: Send + Sync {
    /// Short backend identifier used in logs.
    fn backend(&self) -> &'static str;

    /// Upload `artifact` to `destination`, returning the number of bytes written.
    async fn upload(
        &self,
        deadline: &Deadline,
        artifact: &StagingArtifact,
        destination: &Destination,
    ) -> StageResult<u64>;
}

/// Receives pipeline events; injected into the orchestrator instead of a global logger.
pub trait PipelineObserver: Send + Sync {
    /// Handle one event.
    fn observe(&self, event: &PipelineEvent<'_>);
}

/// Observer that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {
    fn observe(&self, _event: &PipelineEvent<'_>) {}
}
