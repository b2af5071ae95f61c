//! # Design
//!
//! - Centralize binary-level errors for configuration, telemetry, and the backup run.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Map every variant onto a stable process exit code.

use snapvault_config::ConfigError;
use snapvault_core::BackupFailure;
use snapvault_telemetry::TelemetryError;
use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Exit code for a telemetry setup failure.
pub const EXIT_TELEMETRY: i32 = 1;
/// Exit code for invalid or missing configuration.
pub const EXIT_CONFIG: i32 = 2;
/// Exit code for a failed capture phase.
pub const EXIT_CAPTURE: i32 = 3;
/// Exit code for a failed transfer phase.
pub const EXIT_TRANSFER: i32 = 4;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration was missing or invalid.
    #[error("configuration rejected")]
    Config {
        /// Source configuration error.
        #[source]
        source: ConfigError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// The backup run ended with a phase failure.
    #[error("backup run failed")]
    Backup {
        /// Phase-tagged failure.
        #[source]
        source: BackupFailure,
    },
}

impl AppError {
    pub(crate) const fn config(source: ConfigError) -> Self {
        Self::Config { source }
    }

    pub(crate) const fn telemetry(operation: &'static str, source: TelemetryError) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn backup(source: BackupFailure) -> Self {
        Self::Backup { source }
    }

    /// Process exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } => EXIT_CONFIG,
            Self::Telemetry { .. } => EXIT_TELEMETRY,
            Self::Backup { source } => match source.phase() {
                snapvault_core::Phase::Capture => EXIT_CAPTURE,
                snapvault_core::Phase::Transfer => EXIT_TRANSFER,
            },
        }
    }

    /// Operator-facing diagnostic: classification tag followed by the full cause chain.
    #[must_use]
    pub fn into_message(self) -> String {
        let tag = match &self {
            Self::Backup { source } => {
                format!("[phase={} kind={}] ", source.phase(), source.kind())
            }
            Self::Config { source } => format!("[field={}] ", source.field()),
            Self::Telemetry { operation, .. } => format!("[operation={operation}] "),
        };
        format!("{tag}{:#}", anyhow::Error::new(self))
    }
}
