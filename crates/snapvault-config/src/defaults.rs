//! Default values and limits for backup settings.
//!
//! # Design
//! - Keep every default in one place so flags, env fallbacks, and tests agree.
//! - Endpoints and credentials of the destination have no defaults on purpose.

/// Default store endpoint.
pub const ETCD_URL: &str = "http://localhost:2379";
/// Default bound on dialing the store, in seconds.
pub const ETCD_DIAL_TIMEOUT_SECS: u64 = 5;
/// Default bound on the whole run, in seconds.
pub const TIMEOUT_SECS: u64 = 60;
/// Default destination bucket.
pub const BUCKET: &str = "etcd-backups";
/// Default destination object key.
pub const OBJECT: &str = "snapshot.db";
/// Default signing region for the object store.
pub const S3_REGION: &str = "us-east-1";
/// Default staging cleanup policy label.
pub const STAGING_CLEANUP: &str = "retain";
/// Default multipart part size in MiB.
pub const PART_SIZE_MIB: u64 = 64;
/// Smallest part size S3 accepts for non-final parts, in MiB.
pub const MIN_PART_SIZE_MIB: u64 = 5;
/// Largest part size S3 accepts, in MiB.
pub const MAX_PART_SIZE_MIB: u64 = 5 * 1024;
/// Longest object key S3 accepts, in bytes.
pub const MAX_OBJECT_KEY_BYTES: usize = 1024;
