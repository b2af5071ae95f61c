//! Pipeline observer that renders events through `tracing`.

use snapvault_core::{PipelineEvent, PipelineObserver};
use tracing::{error, info, warn};

/// Emits one structured tracing event per pipeline milestone.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl TracingObserver {
    /// Construct the observer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl PipelineObserver for TracingObserver {
    fn observe(&self, event: &PipelineEvent<'_>) {
        let kind = event.kind();
        match *event {
            PipelineEvent::RunStarted {
                source,
                dial_timeout,
                timeout,
            } => info!(
                event = kind,
                etcd_url = %source,
                dial_timeout_secs = dial_timeout.as_secs(),
                timeout_secs = timeout.as_secs(),
                "backup run starting"
            ),
            PipelineEvent::CaptureStarted {
                backend,
                endpoint,
                staging_path,
            } => info!(
                event = kind,
                backend,
                endpoint = %endpoint,
                staging_path = %staging_path.display(),
                "connecting to store and capturing snapshot"
            ),
            PipelineEvent::CaptureSucceeded { artifact, elapsed } => info!(
                event = kind,
                size_bytes = artifact.size_bytes,
                sha256 = %artifact.sha256_hex(),
                elapsed_ms = duration_ms(elapsed),
                "snapshot captured"
            ),
            PipelineEvent::TransferStarted {
                backend,
                bucket,
                object,
                size_bytes,
                remaining,
            } => info!(
                event = kind,
                backend,
                bucket,
                object,
                size_bytes,
                remaining_ms = duration_ms(remaining),
                "uploading snapshot"
            ),
            PipelineEvent::TransferSucceeded {
                bytes_uploaded,
                elapsed,
            } => info!(
                event = kind,
                upload_size = bytes_uploaded,
                elapsed_ms = duration_ms(elapsed),
                "snapshot uploaded"
            ),
            PipelineEvent::PhaseFailed { phase, error } => error!(
                event = kind,
                phase = %phase,
                failure = %error.kind(),
                operation = error.operation(),
                error = %error,
                "backup phase failed"
            ),
            PipelineEvent::StagingRemoved { path } => info!(
                event = kind,
                path = %path.display(),
                "staging artifact removed"
            ),
            PipelineEvent::StagingCleanupFailed { path, error } => warn!(
                event = kind,
                path = %path.display(),
                error = %error,
                "failed to remove staging artifact"
            ),
            PipelineEvent::RunCompleted {
                bytes_uploaded,
                elapsed,
            } => info!(
                event = kind,
                upload_size = bytes_uploaded,
                elapsed_ms = duration_ms(elapsed),
                "backup complete"
            ),
        }
    }
}

fn duration_ms(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Write};
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use snapvault_core::{FailureKind, Phase, StageError, StagingArtifact};
    use url::Url;

    #[derive(Clone, Default)]
    struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

    impl Write for CaptureWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0
                .lock()
                .map_err(|_| io::Error::other("poisoned"))?
                .extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl CaptureWriter {
        fn contents(&self) -> String {
            self.0
                .lock()
                .map(|buf| String::from_utf8_lossy(&buf).into_owned())
                .unwrap_or_default()
        }
    }

    fn capture<F: FnOnce()>(emit: F) -> String {
        let writer = CaptureWriter::default();
        let make_writer = {
            let writer = writer.clone();
            move || writer.clone()
        };
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_writer(make_writer)
            .finish();
        tracing::subscriber::with_default(subscriber, emit);
        writer.contents()
    }

    #[test]
    fn failure_events_carry_phase_and_classification() {
        let error = StageError::new(FailureKind::DeadlineExceeded, "etcd.snapshot");
        let output = capture(|| {
            TracingObserver::new().observe(&PipelineEvent::PhaseFailed {
                phase: Phase::Capture,
                error: &error,
            });
        });
        assert!(output.contains("\"phase\":\"capture\""), "{output}");
        assert!(output.contains("\"failure\":\"deadline-exceeded\""), "{output}");
        assert!(output.contains("ERROR"), "{output}");
    }

    #[test]
    fn stage_start_events_name_the_backend() -> anyhow::Result<()> {
        let endpoint = Url::parse("http://localhost:2379")?;
        let staging = PathBuf::from("/tmp/snapshot.db");
        let output = capture(|| {
            let observer = TracingObserver::new();
            observer.observe(&PipelineEvent::CaptureStarted {
                backend: "etcd",
                endpoint: &endpoint,
                staging_path: &staging,
            });
            observer.observe(&PipelineEvent::TransferStarted {
                backend: "s3",
                bucket: "etcd-backups",
                object: "snapshot.db",
                size_bytes: 4096,
                remaining: Duration::from_secs(30),
            });
        });
        assert!(output.contains("\"backend\":\"etcd\""), "{output}");
        assert!(output.contains("\"backend\":\"s3\""), "{output}");
        Ok(())
    }

    #[test]
    fn success_events_report_upload_size() -> anyhow::Result<()> {
        let endpoint = Url::parse("http://localhost:2379")?;
        let artifact = StagingArtifact {
            path: PathBuf::from("/tmp/snapshot.db"),
            size_bytes: 1_048_576,
            sha256: [0; 32],
        };
        let output = capture(|| {
            let observer = TracingObserver::new();
            observer.observe(&PipelineEvent::RunStarted {
                source: &endpoint,
                dial_timeout: Duration::from_secs(5),
                timeout: Duration::from_secs(60),
            });
            observer.observe(&PipelineEvent::CaptureSucceeded {
                artifact: &artifact,
                elapsed: Duration::from_secs(2),
            });
            observer.observe(&PipelineEvent::RunCompleted {
                bytes_uploaded: 1_048_576,
                elapsed: Duration::from_secs(5),
            });
        });
        assert!(output.contains("\"etcd_url\":\"http://localhost:2379/\""), "{output}");
        assert!(output.contains("\"upload_size\":1048576"), "{output}");
        assert!(output.contains("backup complete"), "{output}");
        Ok(())
    }
}
