//! `SnapshotSource` backed by etcd's maintenance API.
//!
//! # Design
//! - One HTTP client per capture; its connect timeout is the configured dial timeout.
//! - The whole capture runs under the shared deadline; interruption drops the stream.
//! - The part file is removed whenever the capture does not commit, including when the
//!   capture future is dropped by an outer deadline.

use std::path::Path;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, StatusCode, header};
use snapvault_core::{
    Deadline, FailureKind, SnapshotSource, SourceConfig, StageError, StageResult,
    StagingArtifact,
};
use tokio::time::Instant;
use tracing::{debug, info};
use url::Url;

use crate::frame::{Frame, FrameDecoder, FrameError, GatewayError};
use crate::staging::{StagingWriter, part_path, remove_if_present};

const OPERATION: &str = "etcd.snapshot";
const SNAPSHOT_PATH: [&str; 3] = ["v3", "maintenance", "snapshot"];
// gRPC status codes surfaced by the gateway in error frames.
const GRPC_PERMISSION_DENIED: i64 = 7;
const GRPC_UNAUTHENTICATED: i64 = 16;

/// Streams etcd snapshots through the v3 JSON gateway.
#[derive(Debug, Default, Clone, Copy)]
pub struct EtcdSnapshotSource;

impl EtcdSnapshotSource {
    /// Construct the source.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    async fn stream_to(&self, source: &SourceConfig, dest: &Path) -> StageResult<StagingArtifact> {
        let client = Client::builder()
            .connect_timeout(source.dial_timeout)
            .build()
            .map_err(|err| {
                StageError::new(FailureKind::Io, "etcd.client")
                    .with_detail("http client setup failed")
                    .with_source(err)
            })?;
        let url = snapshot_url(&source.endpoint)?;
        debug!(url = %url, "requesting snapshot stream");

        let response = client
            .post(url)
            .header(header::CONTENT_TYPE, "application/json")
            .body("{}")
            .send()
            .await
            .map_err(classify_send)?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status));
        }

        let mut writer = StagingWriter::create(dest).await?;
        let mut decoder = FrameDecoder::default();
        let mut remaining = None;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|err| {
                StageError::new(FailureKind::Stream, OPERATION)
                    .with_detail("snapshot stream interrupted")
                    .with_source(err)
            })?;
            for frame in decoder.push(&chunk).map_err(frame_error)? {
                remaining = Some(apply_frame(&mut writer, frame).await?);
            }
        }
        if let Some(frame) = decoder.finish().map_err(frame_error)? {
            remaining = Some(apply_frame(&mut writer, frame).await?);
        }
        if let Some(outstanding) = remaining.filter(|left| *left > 0) {
            return Err(StageError::new(FailureKind::Stream, OPERATION).with_detail(format!(
                "stream ended after {} bytes with {outstanding} bytes outstanding",
                writer.written()
            )));
        }

        writer.commit(source.verify_integrity).await
    }
}

#[async_trait]
impl SnapshotSource for EtcdSnapshotSource {
    fn backend(&self) -> &'static str {
        "etcd"
    }

    async fn capture(
        &self,
        deadline: &Deadline,
        source: &SourceConfig,
        dest: &Path,
    ) -> StageResult<StagingArtifact> {
        remove_if_present(dest).await;
        remove_if_present(&part_path(dest)).await;

        info!(
            etcd_url = %source.endpoint,
            dial_timeout_ms = duration_ms(source.dial_timeout),
            staging_path = %dest.display(),
            "fetching snapshot"
        );
        let started = Instant::now();
        let artifact = deadline
            .bound(self.stream_to(source, dest))
            .await
            .unwrap_or_else(|reason| Err(StageError::interrupted(OPERATION, reason)))?;
        info!(
            size_bytes = artifact.size_bytes,
            sha256 = %artifact.sha256_hex(),
            elapsed_ms = duration_ms(started.elapsed()),
            "fetched snapshot"
        );
        Ok(artifact)
    }
}

/// Returns the frame's outstanding byte count; an omitted count means the stream is done.
async fn apply_frame(writer: &mut StagingWriter, frame: Frame) -> StageResult<u64> {
    match frame {
        Frame::Chunk { bytes, remaining } => {
            writer.write_chunk(&bytes).await?;
            Ok(remaining.unwrap_or(0))
        }
        Frame::Failure(error) => Err(gateway_error(&error)),
    }
}

fn snapshot_url(endpoint: &Url) -> StageResult<Url> {
    let mut url = endpoint.clone();
    url.path_segments_mut()
        .map_err(|()| {
            StageError::new(FailureKind::Rejected, OPERATION)
                .with_detail(format!("endpoint {endpoint} cannot carry a path"))
        })?
        .pop_if_empty()
        .extend(SNAPSHOT_PATH);
    Ok(url)
}

fn classify_send(err: reqwest::Error) -> StageError {
    let kind = if err.is_timeout() {
        FailureKind::DialTimeout
    } else {
        FailureKind::Unreachable
    };
    StageError::new(kind, OPERATION).with_source(err)
}

fn status_error(status: StatusCode) -> StageError {
    let kind = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FailureKind::Unauthorized,
        _ => FailureKind::Rejected,
    };
    StageError::new(kind, OPERATION).with_detail(format!("status {}", status.as_u16()))
}

fn gateway_error(error: &GatewayError) -> StageError {
    let denied = matches!(
        error.code,
        Some(GRPC_PERMISSION_DENIED | GRPC_UNAUTHENTICATED)
    ) || matches!(error.http_code, Some(401 | 403));
    let kind = if denied {
        FailureKind::Unauthorized
    } else {
        FailureKind::Stream
    };
    let mut detail = error.message.clone();
    if let Some(code) = error.code {
        detail = format!("{detail} (grpc code {code})");
    }
    StageError::new(kind, OPERATION).with_detail(detail)
}

fn frame_error(err: FrameError) -> StageError {
    StageError::new(FailureKind::Stream, OPERATION).with_source(err)
}

fn duration_ms(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
