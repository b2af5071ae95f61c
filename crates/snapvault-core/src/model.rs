//! Requests, artifacts, and outcomes exchanged by the backup pipeline.

use std::fmt::{self, Debug, Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::BackupFailure;

/// File name of the staging artifact inside the staging directory.
pub const STAGING_FILE_NAME: &str = "snapshot.db";

/// Connection settings for the store being snapshotted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    /// Base URL of the store endpoint.
    pub endpoint: Url,
    /// Bound on establishing the connection.
    pub dial_timeout: Duration,
    /// Verify store-provided integrity data when the snapshot carries it.
    pub verify_integrity: bool,
}

/// Static credentials for the object store.
#[derive(Clone, PartialEq, Eq)]
pub struct DestinationCredentials {
    access_key_id: String,
    secret_access_key: String,
}

impl DestinationCredentials {
    /// Build credentials from an access key pair.
    #[must_use]
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }

    /// Access key identifier.
    #[must_use]
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    /// Secret access key.
    #[must_use]
    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }
}

impl Debug for DestinationCredentials {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("DestinationCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Object-storage location and credentials for the upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    /// Object-store endpoint.
    pub endpoint: Url,
    /// Signing region.
    pub region: String,
    /// Target bucket.
    pub bucket: String,
    /// Target object key.
    pub object: String,
    /// Credentials used to sign requests.
    pub credentials: DestinationCredentials,
    /// Part size in bytes; larger artifacts are uploaded in parts of this size.
    pub part_size: u64,
}

/// What happens to the staging artifact after a successful upload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StagingCleanup {
    /// Leave the artifact in place.
    #[default]
    Retain,
    /// Delete the artifact once the upload succeeded.
    RemoveAfterUpload,
}

impl StagingCleanup {
    /// Stable configuration label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Retain => "retain",
            Self::RemoveAfterUpload => "remove-after-upload",
        }
    }
}

impl Display for StagingCleanup {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Immutable configuration for one backup run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRequest {
    /// Store to snapshot.
    pub source: SourceConfig,
    /// Overall bound on capture plus transfer.
    pub timeout: Duration,
    /// Directory holding the staging artifact.
    pub staging_dir: PathBuf,
    /// Upload target.
    pub destination: Destination,
    /// Staging artifact policy after a successful upload.
    pub cleanup: StagingCleanup,
}

impl BackupRequest {
    /// Deterministic location of the staging artifact.
    #[must_use]
    pub fn staging_path(&self) -> PathBuf {
        self.staging_dir.join(STAGING_FILE_NAME)
    }
}

/// Local file holding a fully captured snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingArtifact {
    /// Location of the snapshot file.
    pub path: PathBuf,
    /// Size of the snapshot file in bytes.
    pub size_bytes: u64,
    /// SHA-256 digest of the whole file.
    pub sha256: [u8; 32],
}

impl StagingArtifact {
    /// Location of the snapshot file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lowercase hex rendering of the digest.
    #[must_use]
    pub fn sha256_hex(&self) -> String {
        use std::fmt::Write as _;

        self.sha256
            .iter()
            .fold(String::with_capacity(64), |mut hex, byte| {
                let _ = write!(hex, "{byte:02x}");
                hex
            })
    }
}

/// What happened to the staging artifact at the end of a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagingDisposition {
    /// The artifact was left on disk.
    Retained,
    /// The artifact was deleted.
    Removed,
    /// Deletion was requested but failed; the artifact may still exist.
    RemovalFailed,
}

/// Summary of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupReport {
    /// Bytes transferred to object storage.
    pub bytes_uploaded: u64,
    /// Artifact that was uploaded.
    pub artifact: StagingArtifact,
    /// Bucket the object was written to.
    pub bucket: String,
    /// Object key that was written.
    pub object: String,
    /// Staging artifact outcome.
    pub staging: StagingDisposition,
    /// Wall-clock time consumed by the run.
    pub elapsed: Duration,
}

/// Terminal result of a run: a report or a phase-tagged failure.
pub type RunOutcome = Result<BackupReport, BackupFailure>;
