//! Command-line surface; every flag also reads a `SNAPVAULT_*` environment variable.

use std::path::PathBuf;

use clap::Parser;
use snapvault_config::{BackupSettings, defaults, parse_cleanup};
use snapvault_core::StagingCleanup;
use snapvault_telemetry::{DEFAULT_LOG_LEVEL, LogFormat, TelemetryError};

/// Snapshot an etcd cluster and upload the snapshot to S3-compatible storage.
#[derive(Debug, Parser)]
#[command(name = "snapvault", version, about)]
pub struct Cli {
    /// Directory holding the staging snapshot (defaults to the system temp directory).
    #[arg(long, env = "SNAPVAULT_BACKUP_TEMP_DIR")]
    pub backup_temp_dir: Option<PathBuf>,

    /// etcd client endpoint.
    #[arg(long, env = "SNAPVAULT_ETCD_URL", default_value = defaults::ETCD_URL)]
    pub etcd_url: String,

    /// Seconds allowed for establishing the etcd connection.
    #[arg(
        long,
        env = "SNAPVAULT_ETCD_DIAL_TIMEOUT_SECONDS",
        default_value_t = defaults::ETCD_DIAL_TIMEOUT_SECS
    )]
    pub etcd_dial_timeout_seconds: u64,

    /// Seconds allowed for the whole backup, capture and upload included.
    #[arg(long, env = "SNAPVAULT_TIMEOUT_SECONDS", default_value_t = defaults::TIMEOUT_SECS)]
    pub timeout_seconds: u64,

    /// Destination bucket.
    #[arg(long = "bucketname", env = "SNAPVAULT_BUCKET", default_value = defaults::BUCKET)]
    pub bucket: String,

    /// Destination object key.
    #[arg(long = "objectname", env = "SNAPVAULT_OBJECT", default_value = defaults::OBJECT)]
    pub object: String,

    /// S3-compatible endpoint, e.g. `http://minio:9000`.
    #[arg(long, env = "SNAPVAULT_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// Signing region.
    #[arg(long, env = "SNAPVAULT_S3_REGION", default_value = defaults::S3_REGION)]
    pub s3_region: String,

    /// Access key identifier.
    #[arg(long, env = "SNAPVAULT_S3_ACCESS_KEY_ID", hide_env_values = true)]
    pub s3_access_key_id: Option<String>,

    /// Secret access key.
    #[arg(long, env = "SNAPVAULT_S3_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub s3_secret_access_key: Option<String>,

    /// What to do with the staging snapshot after a successful upload.
    #[arg(
        long,
        env = "SNAPVAULT_STAGING_CLEANUP",
        default_value = defaults::STAGING_CLEANUP,
        value_parser = parse_cleanup
    )]
    pub staging_cleanup: StagingCleanup,

    /// Multipart part size in MiB; larger snapshots are uploaded in parts.
    #[arg(long, env = "SNAPVAULT_PART_SIZE_MIB", default_value_t = defaults::PART_SIZE_MIB)]
    pub part_size_mib: u64,

    /// Skip verification of the snapshot's trailing SHA-256.
    #[arg(long, env = "SNAPVAULT_SKIP_INTEGRITY_CHECK")]
    pub skip_integrity_check: bool,

    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, env = "SNAPVAULT_LOG_LEVEL", default_value = DEFAULT_LOG_LEVEL)]
    pub log_level: String,

    /// Log output format (`pretty` or `json`); defaults by build profile.
    #[arg(long, env = "SNAPVAULT_LOG_FORMAT", value_parser = ["pretty", "json"])]
    pub log_format: Option<String>,
}

impl Cli {
    /// Raw settings for validation.
    #[must_use]
    pub fn settings(&self) -> BackupSettings {
        BackupSettings {
            backup_temp_dir: self.backup_temp_dir.clone(),
            etcd_url: self.etcd_url.clone(),
            etcd_dial_timeout_seconds: self.etcd_dial_timeout_seconds,
            timeout_seconds: self.timeout_seconds,
            bucket: self.bucket.clone(),
            object: self.object.clone(),
            s3_endpoint: self.s3_endpoint.clone(),
            s3_region: self.s3_region.clone(),
            s3_access_key_id: self.s3_access_key_id.clone(),
            s3_secret_access_key: self.s3_secret_access_key.clone(),
            staging_cleanup: self.staging_cleanup,
            part_size_mib: self.part_size_mib,
            verify_integrity: !self.skip_integrity_check,
        }
    }

    /// Selected log format.
    ///
    /// # Errors
    ///
    /// Returns `TelemetryError::UnknownLogFormat` for an unrecognised value.
    pub fn log_format(&self) -> Result<LogFormat, TelemetryError> {
        self.log_format
            .as_deref()
            .map_or(Ok(LogFormat::infer()), str::parse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    const REQUIRED: [&str; 7] = [
        "snapvault",
        "--s3-endpoint",
        "http://127.0.0.1:9000",
        "--s3-access-key-id",
        "access",
        "--s3-secret-access-key",
        "secret",
    ];

    #[test]
    fn defaults_match_the_documented_surface() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from(REQUIRED)?;
        let settings = cli.settings();
        assert_eq!(settings.etcd_url, "http://localhost:2379");
        assert_eq!(settings.etcd_dial_timeout_seconds, 5);
        assert_eq!(settings.timeout_seconds, 60);
        assert_eq!(settings.bucket, "etcd-backups");
        assert_eq!(settings.object, "snapshot.db");
        assert_eq!(settings.staging_cleanup, StagingCleanup::Retain);
        assert!(settings.verify_integrity);
        assert!(settings.backup_temp_dir.is_none());

        let request = settings.validate()?;
        assert_eq!(request.cleanup, StagingCleanup::Retain);
        assert_eq!(request.staging_dir, std::env::temp_dir());
        Ok(())
    }

    #[test]
    fn legacy_flag_names_are_accepted() -> anyhow::Result<()> {
        let mut args = REQUIRED.to_vec();
        args.extend([
            "--bucketname",
            "nightly",
            "--objectname",
            "cluster-a/snapshot.db",
            "--timeout-seconds",
            "120",
            "--staging-cleanup",
            "remove-after-upload",
            "--skip-integrity-check",
        ]);
        let settings = Cli::try_parse_from(args)?.settings();
        assert_eq!(settings.bucket, "nightly");
        assert_eq!(settings.object, "cluster-a/snapshot.db");
        assert_eq!(settings.timeout_seconds, 120);
        assert!(!settings.verify_integrity);
        assert_eq!(
            settings.validate()?.cleanup,
            StagingCleanup::RemoveAfterUpload
        );
        Ok(())
    }

    #[test]
    fn every_flag_reads_a_prefixed_environment_variable() {
        let command = Cli::command();
        let mut checked = 0;
        for argument in command.get_arguments() {
            let id = argument.get_id().as_str();
            if id == "help" || id == "version" {
                continue;
            }
            let env = argument
                .get_env()
                .and_then(|name| name.to_str())
                .unwrap_or_default();
            assert!(env.starts_with("SNAPVAULT_"), "{id} has no environment fallback");
            checked += 1;
        }
        assert_eq!(checked, 15);
    }

    #[test]
    fn secrets_are_hidden_from_help() {
        let command = Cli::command();
        let secret = command
            .get_arguments()
            .find(|argument| argument.get_id() == "s3_secret_access_key")
            .expect("secret flag");
        assert!(secret.is_hide_env_values_set());
        assert_eq!(
            secret.get_env().and_then(|name| name.to_str()),
            Some("SNAPVAULT_S3_SECRET_ACCESS_KEY")
        );
    }

    #[test]
    fn missing_credentials_fail_validation_not_parsing() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from(["snapvault", "--s3-endpoint", "http://minio:9000"])?;
        let err = cli.settings().validate().expect_err("credentials required");
        assert_eq!(err.field(), "s3_access_key_id");
        Ok(())
    }

    #[test]
    fn unknown_cleanup_policy_is_a_usage_error() {
        let mut args = REQUIRED.to_vec();
        args.extend(["--staging-cleanup", "shred"]);
        let err = Cli::try_parse_from(args).expect_err("invalid value");
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn log_format_flag_overrides_build_default() -> anyhow::Result<()> {
        let mut args = REQUIRED.to_vec();
        args.extend(["--log-format", "json"]);
        assert_eq!(Cli::try_parse_from(args)?.log_format()?, LogFormat::Json);
        assert_eq!(
            Cli::try_parse_from(REQUIRED)?.log_format()?,
            LogFormat::infer()
        );
        Ok(())
    }
}
