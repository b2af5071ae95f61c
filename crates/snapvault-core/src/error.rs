//! # Design
//!
//! - Classify every stage failure with a `FailureKind` so operators can tell source,
//!   destination, and deadline problems apart without reading collaborator logs.
//! - Tag run-level failures with the `Phase` that produced them.
//! - Keep messages constant; context lives in fields and the source chain.

use std::error::Error;
use std::fmt::{self, Display, Formatter};

use thiserror::Error;

use crate::deadline::Interruption;

/// Boxed error used to carry collaborator-specific causes.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Result alias for stage operations.
pub type StageResult<T> = Result<T, StageError>;

/// Pipeline phase that produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Snapshot capture into the staging artifact.
    Capture,
    /// Upload of the staging artifact to object storage.
    Transfer,
}

impl Phase {
    /// Stable lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Capture => "capture",
            Self::Transfer => "transfer",
        }
    }
}

impl Display for Phase {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Classification of a stage failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The remote endpoint could not be reached.
    Unreachable,
    /// Establishing the connection exceeded the dial timeout.
    DialTimeout,
    /// The shared deadline expired while the stage was running.
    DeadlineExceeded,
    /// The shared deadline was cancelled while the stage was running.
    Cancelled,
    /// The remote rejected the supplied credentials.
    Unauthorized,
    /// The remote refused the request for another reason.
    Rejected,
    /// The data stream was malformed, empty, or aborted by the remote.
    Stream,
    /// Captured data failed an integrity check.
    Integrity,
    /// Fewer bytes were written than the artifact holds.
    PartialWrite,
    /// Local filesystem failure.
    Io,
}

impl FailureKind {
    /// Stable machine-readable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unreachable => "unreachable",
            Self::DialTimeout => "dial-timeout",
            Self::DeadlineExceeded => "deadline-exceeded",
            Self::Cancelled => "cancelled",
            Self::Unauthorized => "unauthorized",
            Self::Rejected => "rejected",
            Self::Stream => "stream",
            Self::Integrity => "integrity",
            Self::PartialWrite => "partial-write",
            Self::Io => "io",
        }
    }

    const fn describe(self) -> &'static str {
        match self {
            Self::Unreachable => "endpoint unreachable",
            Self::DialTimeout => "dial timeout exceeded",
            Self::DeadlineExceeded => "deadline exceeded",
            Self::Cancelled => "run cancelled",
            Self::Unauthorized => "authentication or authorization failed",
            Self::Rejected => "request rejected",
            Self::Stream => "stream error",
            Self::Integrity => "integrity check failed",
            Self::PartialWrite => "partial write",
            Self::Io => "local io failure",
        }
    }
}

impl Display for FailureKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl From<Interruption> for FailureKind {
    fn from(value: Interruption) -> Self {
        match value {
            Interruption::Expired => Self::DeadlineExceeded,
            Interruption::Cancelled => Self::Cancelled,
        }
    }
}

/// Classified failure reported by a capture or transfer stage.
#[derive(Debug)]
pub struct StageError {
    kind: FailureKind,
    operation: &'static str,
    detail: Option<String>,
    source: Option<BoxError>,
}

impl StageError {
    /// Build an error of `kind` raised by `operation`.
    #[must_use]
    pub const fn new(kind: FailureKind, operation: &'static str) -> Self {
        Self {
            kind,
            operation,
            detail: None,
            source: None,
        }
    }

    /// Build the error reported when the deadline interrupts `operation`.
    #[must_use]
    pub fn interrupted(operation: &'static str, reason: Interruption) -> Self {
        Self::new(reason.into(), operation)
    }

    /// Attach a short, operator-facing detail (status code, path, sizes).
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Attach the underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Failure classification.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        self.kind
    }

    /// Operation identifier that failed.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        self.operation
    }

    /// Optional operator-facing detail.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

impl Display for StageError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "{} during {}",
            self.kind.describe(),
            self.operation
        )?;
        if let Some(detail) = &self.detail {
            write!(formatter, " ({detail})")?;
        }
        Ok(())
    }
}

impl Error for StageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_deref()
            .map(|source| source as &(dyn Error + 'static))
    }
}

/// Terminal failure of a backup run, tagged with the phase that produced it.
#[derive(Debug, Error)]
#[error("backup failed during {phase} phase")]
pub struct BackupFailure {
    phase: Phase,
    #[source]
    source: StageError,
}

impl BackupFailure {
    /// Failure raised while capturing the snapshot.
    #[must_use]
    pub const fn capture(source: StageError) -> Self {
        Self {
            phase: Phase::Capture,
            source,
        }
    }

    /// Failure raised while transferring the staging artifact.
    #[must_use]
    pub const fn transfer(source: StageError) -> Self {
        Self {
            phase: Phase::Transfer,
            source,
        }
    }

    /// Phase that failed.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Classification of the underlying stage failure.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        self.source.kind
    }

    /// Underlying stage failure.
    #[must_use]
    pub const fn cause(&self) -> &StageError {
        &self.source
    }
}
