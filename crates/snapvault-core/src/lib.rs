#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Backend-agnostic building blocks for the snapshot backup pipeline.
//!
//! Layout: `model.rs` (requests, artifacts, reports), `deadline.rs` (shared
//! cancellable deadline), `error.rs` (phase and failure taxonomy), `events.rs`
//! (observer events), `service.rs` (stage and observer traits).

pub mod deadline;
pub mod error;
pub mod events;
pub mod model;
pub mod service;

pub use deadline::{Deadline, Interruption};
pub use error::{BackupFailure, BoxError, FailureKind, Phase, StageError, StageResult};
pub use events::PipelineEvent;
pub use model::{
    BackupReport, BackupRequest, Destination, DestinationCredentials, RunOutcome, STAGING_FILE_NAME,
    SourceConfig, StagingArtifact, StagingCleanup, StagingDisposition,
};
pub use service::{NoopObserver, ObjectSink, PipelineObserver, SnapshotSource};
