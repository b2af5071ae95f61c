//! Sample requests for orchestrator tests.

use std::path::Path;
use std::time::Duration;

use snapvault_core::{
    BackupRequest, Destination, DestinationCredentials, SourceConfig, StagingCleanup,
};
use url::Url;

/// Build a fully populated request staging into `staging_dir` with the given run budget.
///
/// # Panics
///
/// Never in practice: the embedded URLs are valid literals.
#[must_use]
pub fn sample_request(staging_dir: &Path, timeout: Duration) -> BackupRequest {
    BackupRequest {
        source: SourceConfig {
            endpoint: parse("http://127.0.0.1:2379"),
            dial_timeout: Duration::from_secs(5),
            verify_integrity: true,
        },
        timeout,
        staging_dir: staging_dir.to_path_buf(),
        destination: Destination {
            endpoint: parse("http://127.0.0.1:9000"),
            region: "us-east-1".to_string(),
            bucket: "etcd-backups".to_string(),
            object: "snapshot.db".to_string(),
            credentials: DestinationCredentials::new("test-access", "test-secret"),
            part_size: 5 * 1024 * 1024,
        },
        cleanup: StagingCleanup::Retain,
    }
}

fn parse(raw: &str) -> Url {
    Url::parse(raw).unwrap_or_else(|err| panic!("fixture URL {raw} is invalid: {err}"))
}
