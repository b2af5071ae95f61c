//! Raw settings as supplied by flags, environment, or a serialized document.

use std::fmt::{self, Debug, Formatter};
use std::path::PathBuf;

use serde::Deserialize;
use snapvault_core::{BackupRequest, StagingCleanup};

use crate::defaults;
use crate::error::ConfigResult;
use crate::validate::build_request;

/// Unvalidated inputs for one backup run.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BackupSettings {
    /// Staging directory; the system temp directory when absent.
    pub backup_temp_dir: Option<PathBuf>,
    /// Store endpoint URL.
    pub etcd_url: String,
    /// Bound on dialing the store, in seconds.
    pub etcd_dial_timeout_seconds: u64,
    /// Bound on the whole run, in seconds.
    pub timeout_seconds: u64,
    /// Destination bucket.
    pub bucket: String,
    /// Destination object key.
    pub object: String,
    /// Object-store endpoint URL.
    pub s3_endpoint: Option<String>,
    /// Object-store signing region.
    pub s3_region: String,
    /// Object-store access key identifier.
    pub s3_access_key_id: Option<String>,
    /// Object-store secret access key.
    pub s3_secret_access_key: Option<String>,
    /// Staging cleanup policy, written `retain` or `remove-after-upload`.
    pub staging_cleanup: StagingCleanup,
    /// Multipart part size in MiB.
    pub part_size_mib: u64,
    /// Verify the store's trailing snapshot hash when present.
    pub verify_integrity: bool,
}

impl BackupSettings {
    /// Validate the settings and build the immutable run request.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` naming the first missing or invalid field.
    pub fn validate(&self) -> ConfigResult<BackupRequest> {
        build_request(self)
    }
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            backup_temp_dir: None,
            etcd_url: defaults::ETCD_URL.to_string(),
            etcd_dial_timeout_seconds: defaults::ETCD_DIAL_TIMEOUT_SECS,
            timeout_seconds: defaults::TIMEOUT_SECS,
            bucket: defaults::BUCKET.to_string(),
            object: defaults::OBJECT.to_string(),
            s3_endpoint: None,
            s3_region: defaults::S3_REGION.to_string(),
            s3_access_key_id: None,
            s3_secret_access_key: None,
            staging_cleanup: StagingCleanup::default(),
            part_size_mib: defaults::PART_SIZE_MIB,
            verify_integrity: true,
        }
    }
}

impl Debug for BackupSettings {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("BackupSettings")
            .field("backup_temp_dir", &self.backup_temp_dir)
            .field("etcd_url", &self.etcd_url)
            .field("etcd_dial_timeout_seconds", &self.etcd_dial_timeout_seconds)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("bucket", &self.bucket)
            .field("object", &self.object)
            .field("s3_endpoint", &self.s3_endpoint)
            .field("s3_region", &self.s3_region)
            .field("s3_access_key_id", &self.s3_access_key_id)
            .field(
                "s3_secret_access_key",
                &self.s3_secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field("staging_cleanup", &self.staging_cleanup)
            .field("part_size_mib", &self.part_size_mib)
            .field("verify_integrity", &self.verify_integrity)
            .finish()
    }
}
