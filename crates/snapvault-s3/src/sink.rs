//! `ObjectSink` that writes staged snapshots to an S3-compatible bucket.
//!
//! # Design
//! - Artifacts up to one part in size go out as a single `PutObject` carrying the
//!   artifact's SHA-256, so the store rejects a corrupted body.
//! - Larger artifacts use a multipart upload read straight from disk by offset.
//! - Every SDK call is bounded by the shared deadline; a failed multipart upload is aborted.
//! - An in-flight multipart upload is held by a guard that spawns the abort when the
//!   upload future is dropped before completing.
//! - Retries are the SDK's standard policy, capped at `max_attempts`.

use std::future::Future;

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::{ByteStream, Length};
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use snapvault_core::{
    Deadline, Destination, FailureKind, ObjectSink, StageError, StageResult, StagingArtifact,
};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::client::build_client;
use crate::error::classify;

/// Attempts per SDK call unless overridden.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const MAX_PARTS: u64 = 10_000;

/// Uploads artifacts to S3, `MinIO`, or any other S3-compatible endpoint.
#[derive(Debug, Clone, Copy)]
pub struct S3ObjectSink {
    max_attempts: u32,
}

impl Default for S3ObjectSink {
    fn default() -> Self {
        Self::new()
    }
}

impl S3ObjectSink {
    /// Sink using the default retry budget.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Override the number of attempts per SDK call (minimum one).
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = if max_attempts == 0 { 1 } else { max_attempts };
        self
    }

    /// Configured attempts per SDK call.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    async fn prepare(
        &self,
        artifact: &StagingArtifact,
        destination: &Destination,
    ) -> StageResult<Client> {
        let metadata = tokio::fs::metadata(artifact.path()).await.map_err(|err| {
            StageError::new(FailureKind::Io, "s3.read_artifact")
                .with_detail(artifact.path().display().to_string())
                .with_source(err)
        })?;
        if metadata.len() != artifact.size_bytes {
            return Err(
                StageError::new(FailureKind::Integrity, "s3.read_artifact").with_detail(format!(
                    "artifact is {} bytes on disk, expected {}",
                    metadata.len(),
                    artifact.size_bytes
                )),
            );
        }
        Ok(build_client(destination, self.max_attempts).await)
    }
}

#[async_trait]
impl ObjectSink for S3ObjectSink {
    fn backend(&self) -> &'static str {
        "s3"
    }

    async fn upload(
        &self,
        deadline: &Deadline,
        artifact: &StagingArtifact,
        destination: &Destination,
    ) -> StageResult<u64> {
        let started = Instant::now();
        let client = bounded(deadline, "s3.prepare", self.prepare(artifact, destination)).await?;
        let part_size = effective_part_size(artifact.size_bytes, destination.part_size);
        let multipart = artifact.size_bytes > part_size;
        info!(
            bucket = %destination.bucket,
            object = %destination.object,
            upload_size = artifact.size_bytes,
            multipart,
            part_size,
            "uploading snapshot"
        );

        let uploaded = if multipart {
            put_multipart(&client, deadline, artifact, destination, part_size).await?
        } else {
            bounded(
                deadline,
                "s3.put_object",
                put_single(&client, artifact, destination),
            )
            .await?
        };

        info!(
            bucket = %destination.bucket,
            object = %destination.object,
            bytes_uploaded = uploaded,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "uploaded snapshot"
        );
        Ok(uploaded)
    }
}

async fn bounded<T, F>(deadline: &Deadline, operation: &'static str, work: F) -> StageResult<T>
where
    F: Future<Output = StageResult<T>>,
{
    deadline
        .bound(work)
        .await
        .unwrap_or_else(|reason| Err(StageError::interrupted(operation, reason)))
}

/// Grow the configured part size when the artifact would need more than `MAX_PARTS` parts.
fn effective_part_size(size_bytes: u64, configured: u64) -> u64 {
    configured.max(1).max(size_bytes.div_ceil(MAX_PARTS))
}

fn content_length(operation: &'static str, length: u64) -> StageResult<i64> {
    i64::try_from(length).map_err(|err| {
        StageError::new(FailureKind::Rejected, operation)
            .with_detail(format!("length {length} exceeds the protocol limit"))
            .with_source(err)
    })
}

fn read_error(err: impl Into<snapvault_core::BoxError>) -> StageError {
    StageError::new(FailureKind::Io, "s3.read_artifact").with_source(err)
}

async fn put_single(
    client: &Client,
    artifact: &StagingArtifact,
    destination: &Destination,
) -> StageResult<u64> {
    let body = ByteStream::from_path(artifact.path())
        .await
        .map_err(read_error)?;
    let response = client
        .put_object()
        .bucket(&destination.bucket)
        .key(&destination.object)
        .content_length(content_length("s3.put_object", artifact.size_bytes)?)
        .checksum_sha256(STANDARD.encode(artifact.sha256))
        .body(body)
        .send()
        .await
        .map_err(|err| classify("s3.put_object", err))?;
    debug!(etag = response.e_tag().unwrap_or_default(), "object stored");
    Ok(artifact.size_bytes)
}

async fn put_multipart(
    client: &Client,
    deadline: &Deadline,
    artifact: &StagingArtifact,
    destination: &Destination,
    part_size: u64,
) -> StageResult<u64> {
    let created = bounded(deadline, "s3.create_multipart_upload", async {
        client
            .create_multipart_upload()
            .bucket(&destination.bucket)
            .key(&destination.object)
            .send()
            .await
            .map_err(|err| classify("s3.create_multipart_upload", err))
    })
    .await?;
    let upload_id = created
        .upload_id()
        .ok_or_else(|| {
            StageError::new(FailureKind::Rejected, "s3.create_multipart_upload")
                .with_detail("response carried no upload id")
        })?
        .to_owned();
    debug!(upload_id = %upload_id, "multipart upload created");

    let mut pending = PendingUpload::new(client, destination, upload_id.clone());
    let outcome = deadline
        .bound(upload_parts(
            client,
            &upload_id,
            artifact,
            destination,
            part_size,
        ))
        .await;
    match outcome {
        Ok(Ok(uploaded)) => {
            pending.disarm();
            Ok(uploaded)
        }
        Ok(Err(err)) => {
            pending.disarm();
            if deadline.bound(abort(client, destination, &upload_id)).await.is_err() {
                spawn_abort(client, destination, upload_id);
            }
            Err(err)
        }
        Err(reason) => Err(StageError::interrupted("s3.upload_part", reason)),
    }
}

/// Multipart upload that has been created but not completed or aborted.
///
/// Dropping an armed guard schedules the abort on the current runtime.
struct PendingUpload {
    client: Client,
    destination: Destination,
    upload_id: Option<String>,
}

impl PendingUpload {
    fn new(client: &Client, destination: &Destination, upload_id: String) -> Self {
        Self {
            client: client.clone(),
            destination: destination.clone(),
            upload_id: Some(upload_id),
        }
    }

    fn disarm(&mut self) {
        self.upload_id = None;
    }
}

impl Drop for PendingUpload {
    fn drop(&mut self) {
        let Some(upload_id) = self.upload_id.take() else {
            return;
        };
        if tokio::runtime::Handle::try_current().is_ok() {
            warn!(upload_id = %upload_id, "multipart upload interrupted; aborting");
            spawn_abort(&self.client, &self.destination, upload_id);
        } else {
            warn!(upload_id = %upload_id, "no runtime left to abort multipart upload");
        }
    }
}

async fn upload_parts(
    client: &Client,
    upload_id: &str,
    artifact: &StagingArtifact,
    destination: &Destination,
    part_size: u64,
) -> StageResult<u64> {
    let mut completed = Vec::new();
    let mut offset = 0_u64;
    let mut part_number = 1_i32;
    while offset < artifact.size_bytes {
        let length = part_size.min(artifact.size_bytes - offset);
        let body = ByteStream::read_from()
            .path(artifact.path())
            .offset(offset)
            .length(Length::Exact(length))
            .build()
            .await
            .map_err(read_error)?;
        let part = client
            .upload_part()
            .bucket(&destination.bucket)
            .key(&destination.object)
            .upload_id(upload_id)
            .part_number(part_number)
            .content_length(content_length("s3.upload_part", length)?)
            .body(body)
            .send()
            .await
            .map_err(|err| classify("s3.upload_part", err))?;
        debug!(part_number, length, "part uploaded");
        completed.push(
            CompletedPart::builder()
                .part_number(part_number)
                .set_e_tag(part.e_tag().map(str::to_owned))
                .build(),
        );
        offset += length;
        part_number += 1;
    }

    client
        .complete_multipart_upload()
        .bucket(&destination.bucket)
        .key(&destination.object)
        .upload_id(upload_id)
        .multipart_upload(
            CompletedMultipartUpload::builder()
                .set_parts(Some(completed))
                .build(),
        )
        .send()
        .await
        .map_err(|err| classify("s3.complete_multipart_upload", err))?;
    Ok(offset)
}

async fn abort(client: &Client, destination: &Destination, upload_id: &str) {
    match client
        .abort_multipart_upload()
        .bucket(&destination.bucket)
        .key(&destination.object)
        .upload_id(upload_id)
        .send()
        .await
    {
        Ok(_) => debug!(upload_id, "multipart upload aborted"),
        Err(err) => warn!(
            upload_id,
            error = %DisplayErrorContext(&err),
            "failed to abort multipart upload"
        ),
    }
}

// The deadline is spent; the abort runs detached and is best effort.
fn spawn_abort(client: &Client, destination: &Destination, upload_id: String) {
    let client = client.clone();
    let destination = destination.clone();
    tokio::spawn(async move {
        abort(&client, &destination, &upload_id).await;
    });
}
