use std::net::TcpListener;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use httpmock::prelude::*;
use sha2::{Digest, Sha256};
use snapvault_core::{Deadline, FailureKind, SnapshotSource, SourceConfig};
use snapvault_etcd::EtcdSnapshotSource;
use tempfile::TempDir;
use url::Url;

const SNAPSHOT_PATH: &str = "/v3/maintenance/snapshot";

fn source_config(endpoint: &str) -> Result<SourceConfig> {
    Ok(SourceConfig {
        endpoint: Url::parse(endpoint)?,
        dial_timeout: Duration::from_secs(2),
        verify_integrity: true,
    })
}

/// Render `payload` as gateway frames of at most `chunk` bytes each.
fn frames(payload: &[u8], chunk: usize) -> String {
    let mut remaining = payload.len();
    payload
        .chunks(chunk)
        .map(|piece| {
            remaining -= piece.len();
            format!(
                "{{\"result\":{{\"blob\":\"{}\",\"remaining_bytes\":\"{remaining}\"}}}}\n",
                STANDARD.encode(piece)
            )
        })
        .collect()
}

fn hashed_snapshot(body: &[u8]) -> Vec<u8> {
    let mut bytes = body.to_vec();
    bytes.extend_from_slice(&Sha256::digest(body));
    bytes
}

fn leftovers(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        names.push(entry?.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

#[tokio::test]
async fn streams_snapshot_into_staging_file() -> Result<()> {
    let server = MockServer::start_async().await;
    let payload: Vec<u8> = (0..3000_u32).map(|value| (value % 251) as u8).collect();
    let body = frames(&payload, 1024);
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path(SNAPSHOT_PATH);
            then.status(200)
                .header("content-type", "application/json")
                .body(body);
        })
        .await;

    let temp = TempDir::new()?;
    let dest = temp.path().join("snapshot.db");
    let deadline = Deadline::after(Duration::from_secs(10));
    let artifact = EtcdSnapshotSource::new()
        .capture(&deadline, &source_config(&server.base_url())?, &dest)
        .await?;

    mock.assert_async().await;
    assert_eq!(artifact.size_bytes, 3000);
    assert_eq!(artifact.path, dest);
    assert_eq!(artifact.sha256, <[u8; 32]>::from(Sha256::digest(&payload)));
    assert_eq!(std::fs::read(&dest)?, payload);
    assert_eq!(leftovers(temp.path())?, vec!["snapshot.db".to_string()]);
    Ok(())
}

#[tokio::test]
async fn verifies_trailing_integrity_hash() -> Result<()> {
    let server = MockServer::start_async().await;
    let payload = hashed_snapshot(&[0x42_u8; 512]);
    let body = frames(&payload, 200);
    server
        .mock_async(|when, then| {
            when.method(POST).path(SNAPSHOT_PATH);
            then.status(200).body(body);
        })
        .await;

    let temp = TempDir::new()?;
    let dest = temp.path().join("snapshot.db");
    let artifact = EtcdSnapshotSource::new()
        .capture(
            &Deadline::after(Duration::from_secs(10)),
            &source_config(&server.base_url())?,
            &dest,
        )
        .await?;
    assert_eq!(artifact.size_bytes, 544);
    Ok(())
}

#[tokio::test]
async fn corrupted_snapshot_leaves_no_artifact() -> Result<()> {
    let server = MockServer::start_async().await;
    let mut payload = hashed_snapshot(&[0x42_u8; 512]);
    payload[7] ^= 0x01;
    let body = frames(&payload, 512);
    server
        .mock_async(|when, then| {
            when.method(POST).path(SNAPSHOT_PATH);
            then.status(200).body(body);
        })
        .await;

    let temp = TempDir::new()?;
    let dest = temp.path().join("snapshot.db");
    let err = EtcdSnapshotSource::new()
        .capture(
            &Deadline::after(Duration::from_secs(10)),
            &source_config(&server.base_url())?,
            &dest,
        )
        .await
        .expect_err("integrity failure");
    assert_eq!(err.kind(), FailureKind::Integrity);
    assert!(leftovers(temp.path())?.is_empty());
    Ok(())
}

#[tokio::test]
async fn gateway_error_frame_aborts_capture() -> Result<()> {
    let server = MockServer::start_async().await;
    let mut body = frames(&[1_u8; 64], 64).replace("\"remaining_bytes\":\"0\"", "\"remaining_bytes\":\"4096\"");
    body.push_str("{\"error\":{\"grpc_code\":14,\"http_code\":503,\"message\":\"etcdserver: leader changed\"}}\n");
    server
        .mock_async(|when, then| {
            when.method(POST).path(SNAPSHOT_PATH);
            then.status(200).body(body);
        })
        .await;

    let temp = TempDir::new()?;
    let dest = temp.path().join("snapshot.db");
    let err = EtcdSnapshotSource::new()
        .capture(
            &Deadline::after(Duration::from_secs(10)),
            &source_config(&server.base_url())?,
            &dest,
        )
        .await
        .expect_err("aborted stream");
    assert_eq!(err.kind(), FailureKind::Stream);
    assert!(err.to_string().contains("leader changed"));
    assert!(leftovers(temp.path())?.is_empty());
    Ok(())
}

#[tokio::test]
async fn truncated_stream_is_a_stream_failure() -> Result<()> {
    let server = MockServer::start_async().await;
    let body = frames(&[9_u8; 2048], 512);
    let truncated: String = body.lines().take(2).map(|line| format!("{line}\n")).collect();
    server
        .mock_async(|when, then| {
            when.method(POST).path(SNAPSHOT_PATH);
            then.status(200).body(truncated);
        })
        .await;

    let temp = TempDir::new()?;
    let dest = temp.path().join("snapshot.db");
    let err = EtcdSnapshotSource::new()
        .capture(
            &Deadline::after(Duration::from_secs(10)),
            &source_config(&server.base_url())?,
            &dest,
        )
        .await
        .expect_err("truncated stream");
    assert_eq!(err.kind(), FailureKind::Stream);
    assert_eq!(
        err.detail(),
        Some("stream ended after 1024 bytes with 1024 bytes outstanding")
    );
    assert!(leftovers(temp.path())?.is_empty());
    Ok(())
}

#[tokio::test]
async fn rejected_credentials_are_unauthorized() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(SNAPSHOT_PATH);
            then.status(401)
                .body("{\"error\":\"etcdserver: user name is empty\",\"code\":16}");
        })
        .await;

    let temp = TempDir::new()?;
    let err = EtcdSnapshotSource::new()
        .capture(
            &Deadline::after(Duration::from_secs(10)),
            &source_config(&server.base_url())?,
            &temp.path().join("snapshot.db"),
        )
        .await
        .expect_err("unauthorized");
    assert_eq!(err.kind(), FailureKind::Unauthorized);
    assert_eq!(err.detail(), Some("status 401"));
    Ok(())
}

#[tokio::test]
async fn closed_port_is_unreachable() -> Result<()> {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        listener.local_addr()?.port()
    };
    let temp = TempDir::new()?;
    let err = EtcdSnapshotSource::new()
        .capture(
            &Deadline::after(Duration::from_secs(10)),
            &source_config(&format!("http://127.0.0.1:{port}"))?,
            &temp.path().join("snapshot.db"),
        )
        .await
        .expect_err("nothing listens on the port");
    assert_eq!(err.kind(), FailureKind::Unreachable);
    Ok(())
}

#[tokio::test]
async fn slow_server_hits_the_deadline() -> Result<()> {
    let server = MockServer::start_async().await;
    let body = frames(&[5_u8; 128], 128);
    server
        .mock_async(|when, then| {
            when.method(POST).path(SNAPSHOT_PATH);
            then.status(200).delay(Duration::from_secs(5)).body(body);
        })
        .await;

    let temp = TempDir::new()?;
    let dest = temp.path().join("snapshot.db");
    let err = EtcdSnapshotSource::new()
        .capture(
            &Deadline::after(Duration::from_millis(200)),
            &source_config(&server.base_url())?,
            &dest,
        )
        .await
        .expect_err("deadline expires first");
    assert_eq!(err.kind(), FailureKind::DeadlineExceeded);
    assert!(leftovers(temp.path())?.is_empty());
    Ok(())
}

#[tokio::test]
async fn stale_staging_file_is_replaced() -> Result<()> {
    let server = MockServer::start_async().await;
    let body = frames(b"fresh", 5);
    server
        .mock_async(|when, then| {
            when.method(POST).path(SNAPSHOT_PATH);
            then.status(200).body(body);
        })
        .await;

    let temp = TempDir::new()?;
    let dest = temp.path().join("snapshot.db");
    std::fs::write(&dest, b"stale snapshot from an earlier run")?;
    std::fs::write(temp.path().join("snapshot.db.part"), b"half")?;
    EtcdSnapshotSource::new()
        .capture(
            &Deadline::after(Duration::from_secs(10)),
            &source_config(&server.base_url())?,
            &dest,
        )
        .await?;
    assert_eq!(std::fs::read(&dest)?, b"fresh");
    assert_eq!(leftovers(temp.path())?, vec!["snapshot.db".to_string()]);
    Ok(())
}
