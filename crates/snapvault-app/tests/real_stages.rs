use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use httpmock::prelude::*;
use snapvault_app::BackupOrchestrator;
use snapvault_core::{FailureKind, Phase};
use snapvault_etcd::EtcdSnapshotSource;
use snapvault_s3::S3ObjectSink;
use snapvault_test_support::{ScriptedSink, ScriptedSource, sample_request};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use url::Url;

const OBJECT_PATH: &str = "/etcd-backups/snapshot.db";

/// Gateway that answers with one snapshot frame and then stops sending.
async fn stalling_gateway() -> Result<(Url, JoinHandle<()>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let address = listener.local_addr()?;
    let server = tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };
        let mut request = vec![0_u8; 4096];
        if socket.read(&mut request).await.is_err() {
            return;
        }
        let frame = "{\"result\":{\"blob\":\"YWJj\",\"remaining_bytes\":\"1021\"}}\n";
        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\n\
             transfer-encoding: chunked\r\n\r\n{:x}\r\n{frame}\r\n",
            frame.len()
        );
        if socket.write_all(response.as_bytes()).await.is_err() {
            return;
        }
        let _ = socket.flush().await;
        tokio::time::sleep(Duration::from_secs(30)).await;
    });
    Ok((Url::parse(&format!("http://{address}"))?, server))
}

fn leftovers(dir: &std::path::Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        names.push(entry?.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

#[tokio::test]
async fn stalled_capture_leaves_no_part_file() -> Result<()> {
    let (endpoint, server) = stalling_gateway().await?;
    let temp = TempDir::new()?;
    let mut request = sample_request(temp.path(), Duration::from_secs(1));
    request.source.endpoint = endpoint;
    let sink = Arc::new(ScriptedSink::accepting());
    let orchestrator = BackupOrchestrator::new(Arc::new(EtcdSnapshotSource::new()), sink.clone());

    let started = Instant::now();
    let failure = orchestrator
        .run_backup(&request)
        .await
        .expect_err("gateway stalls past the deadline");
    server.abort();

    assert_eq!(failure.phase(), Phase::Capture);
    assert_eq!(failure.kind(), FailureKind::DeadlineExceeded);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(sink.calls(), 0);
    assert!(
        leftovers(temp.path())?.is_empty(),
        "staging dir should be empty: {:?}",
        leftovers(temp.path())?
    );
    Ok(())
}

#[tokio::test]
async fn interrupted_multipart_upload_is_aborted() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(OBJECT_PATH).query_param_exists("uploads");
            then.status(200).body(
                "<InitiateMultipartUploadResult><Bucket>etcd-backups</Bucket>\
                 <Key>snapshot.db</Key><UploadId>upload-9</UploadId>\
                 </InitiateMultipartUploadResult>",
            );
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(PUT)
                .path(OBJECT_PATH)
                .query_param("uploadId", "upload-9");
            then.status(200)
                .header("ETag", "\"slow-part\"")
                .delay(Duration::from_secs(10));
        })
        .await;
    let abort = server
        .mock_async(|when, then| {
            when.method(DELETE)
                .path(OBJECT_PATH)
                .query_param("uploadId", "upload-9");
            then.status(204);
        })
        .await;

    let temp = TempDir::new()?;
    let mut request = sample_request(temp.path(), Duration::from_secs(2));
    request.destination.endpoint = Url::parse(&server.base_url())?;
    request.destination.part_size = 1024;
    let orchestrator = BackupOrchestrator::new(
        Arc::new(ScriptedSource::producing(2500)),
        Arc::new(S3ObjectSink::new().with_max_attempts(1)),
    );

    let failure = orchestrator
        .run_backup(&request)
        .await
        .expect_err("part upload outlives the deadline");
    assert_eq!(failure.phase(), Phase::Transfer);
    assert_eq!(failure.kind(), FailureKind::DeadlineExceeded);

    // The abort runs detached once the upload is dropped.
    let waited = Instant::now();
    while abort.calls_async().await == 0 && waited.elapsed() < Duration::from_secs(5) {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    abort.assert_async().await;
    Ok(())
}
