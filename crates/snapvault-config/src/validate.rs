//! Validation helpers that turn `BackupSettings` into a `BackupRequest`.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use snapvault_core::{
    BackupRequest, Destination, DestinationCredentials, SourceConfig, StagingCleanup,
};
use url::Url;

use crate::defaults;
use crate::error::{ConfigError, ConfigResult};
use crate::model::BackupSettings;

const MIB: u64 = 1024 * 1024;

/// Validate `settings` and build the request for one run.
///
/// # Errors
///
/// Returns a `ConfigError` naming the first missing or invalid field.
pub fn build_request(settings: &BackupSettings) -> ConfigResult<BackupRequest> {
    let endpoint = parse_http_url("etcd_url", &settings.etcd_url)?;
    let dial_timeout = positive_seconds(
        "etcd_dial_timeout_seconds",
        settings.etcd_dial_timeout_seconds,
    )?;
    let timeout = positive_seconds("timeout_seconds", settings.timeout_seconds)?;
    if dial_timeout > timeout {
        return Err(ConfigError::invalid(
            "etcd_dial_timeout_seconds",
            "must not exceed timeout_seconds",
            &settings.etcd_dial_timeout_seconds.to_string(),
        ));
    }

    let staging_dir = staging_dir(settings.backup_temp_dir.as_ref())?;
    let destination = destination(settings)?;

    Ok(BackupRequest {
        source: SourceConfig {
            endpoint,
            dial_timeout,
            verify_integrity: settings.verify_integrity,
        },
        timeout,
        staging_dir,
        destination,
        cleanup: settings.staging_cleanup,
    })
}

fn destination(settings: &BackupSettings) -> ConfigResult<Destination> {
    let endpoint = required("s3_endpoint", settings.s3_endpoint.as_deref())?;
    let endpoint = parse_http_url("s3_endpoint", endpoint)?;
    let region = settings.s3_region.trim();
    if region.is_empty() {
        return Err(ConfigError::MissingField { field: "s3_region" });
    }
    let access_key_id = required("s3_access_key_id", settings.s3_access_key_id.as_deref())?;
    let secret_access_key = required(
        "s3_secret_access_key",
        settings.s3_secret_access_key.as_deref(),
    )?;

    Ok(Destination {
        endpoint,
        region: region.to_string(),
        bucket: validate_bucket(&settings.bucket)?,
        object: validate_object(&settings.object)?,
        credentials: DestinationCredentials::new(access_key_id, secret_access_key),
        part_size: part_size_bytes(settings.part_size_mib)?,
    })
}

fn required<'a>(field: &'static str, value: Option<&'a str>) -> ConfigResult<&'a str> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::MissingField { field }),
    }
}

pub(crate) fn parse_http_url(field: &'static str, raw: &str) -> ConfigResult<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::MissingField { field });
    }
    let url = Url::parse(trimmed)
        .map_err(|_| ConfigError::invalid(field, "must be an absolute URL", trimmed))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::invalid(
            field,
            "scheme must be http or https",
            trimmed,
        ));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(ConfigError::invalid(field, "must include a host", trimmed));
    }
    Ok(url)
}

const fn positive_seconds(field: &'static str, seconds: u64) -> ConfigResult<Duration> {
    if seconds == 0 {
        return Err(ConfigError::InvalidField {
            field,
            reason: "must be greater than zero",
            value: None,
        });
    }
    Ok(Duration::from_secs(seconds))
}

fn staging_dir(configured: Option<&PathBuf>) -> ConfigResult<PathBuf> {
    match configured {
        None => Ok(env::temp_dir()),
        Some(path) if path.as_os_str().is_empty() => Err(ConfigError::InvalidField {
            field: "backup_temp_dir",
            reason: "must not be empty",
            value: None,
        }),
        Some(path) => Ok(path.clone()),
    }
}

pub(crate) fn validate_bucket(raw: &str) -> ConfigResult<String> {
    let bucket = raw.trim();
    if bucket.is_empty() {
        return Err(ConfigError::MissingField { field: "bucket" });
    }
    if !(3..=63).contains(&bucket.len()) {
        return Err(ConfigError::invalid(
            "bucket",
            "must be between 3 and 63 characters",
            bucket,
        ));
    }
    let allowed = bucket.bytes().all(|byte| {
        byte.is_ascii_lowercase() || byte.is_ascii_digit() || matches!(byte, b'-' | b'.')
    });
    let edges_ok = bucket
        .bytes()
        .next()
        .zip(bucket.bytes().last())
        .is_some_and(|(first, last)| {
            first.is_ascii_alphanumeric() && last.is_ascii_alphanumeric()
        });
    if !allowed || !edges_ok {
        return Err(ConfigError::invalid(
            "bucket",
            "must use lowercase letters, digits, dots, or hyphens and start and end alphanumerically",
            bucket,
        ));
    }
    Ok(bucket.to_string())
}

pub(crate) fn validate_object(raw: &str) -> ConfigResult<String> {
    let object = raw.trim();
    if object.is_empty() {
        return Err(ConfigError::MissingField { field: "object" });
    }
    if object.len() > defaults::MAX_OBJECT_KEY_BYTES {
        return Err(ConfigError::InvalidField {
            field: "object",
            reason: "must be at most 1024 bytes",
            value: None,
        });
    }
    if object.starts_with('/') {
        return Err(ConfigError::invalid(
            "object",
            "must not start with '/'",
            object,
        ));
    }
    Ok(object.to_string())
}

/// Parse a cleanup policy label as accepted on the command line.
///
/// # Errors
///
/// Returns `ConfigError::InvalidField` for an unknown label.
pub fn parse_cleanup(raw: &str) -> ConfigResult<StagingCleanup> {
    match raw.trim() {
        "retain" => Ok(StagingCleanup::Retain),
        "remove-after-upload" => Ok(StagingCleanup::RemoveAfterUpload),
        other => Err(ConfigError::invalid(
            "staging_cleanup",
            "must be 'retain' or 'remove-after-upload'",
            other,
        )),
    }
}

pub(crate) fn part_size_bytes(mib: u64) -> ConfigResult<u64> {
    if !(defaults::MIN_PART_SIZE_MIB..=defaults::MAX_PART_SIZE_MIB).contains(&mib) {
        return Err(ConfigError::invalid(
            "part_size_mib",
            "must be between 5 and 5120",
            &mib.to_string(),
        ));
    }
    Ok(mib * MIB)
}
