//! Process wiring: logging, configuration, components, interrupt handling.
//!
//! # Design
//! - Validation happens before any network activity.
//! - SIGINT (and SIGTERM on Unix) cancel the run deadline; the active stage aborts.
//! - The whole run executes inside a `backup-agent` span carrying a run id.

use std::sync::Arc;

use clap::Parser;
use snapvault_core::{BackupReport, BackupRequest, Deadline};
use snapvault_etcd::EtcdSnapshotSource;
use snapvault_s3::S3ObjectSink;
use snapvault_telemetry::{LoggingConfig, TracingObserver, init_logging};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::cli::Cli;
use crate::error::{AppError, AppResult};
use crate::orchestrator::BackupOrchestrator;

/// Parse the command line, run one backup, and return the process exit code.
pub async fn run_app() -> i32 {
    let cli = Cli::parse();
    match run_with(&cli).await {
        Ok(report) => {
            println!(
                "uploaded {} bytes to {}/{}",
                report.bytes_uploaded, report.bucket, report.object
            );
            0
        }
        Err(err) => {
            let code = err.exit_code();
            eprintln!("error: {}", err.into_message());
            code
        }
    }
}

/// Run one backup for parsed command-line options.
///
/// # Errors
///
/// Returns an `AppError` for telemetry setup failures, invalid configuration, or a
/// failed backup phase.
pub async fn run_with(cli: &Cli) -> AppResult<BackupReport> {
    let format = cli
        .log_format()
        .map_err(|source| AppError::telemetry("telemetry.log_format", source))?;
    init_logging(&LoggingConfig {
        level: &cli.log_level,
        format,
    })
    .map_err(|source| AppError::telemetry("telemetry.init", source))?;

    let request = cli.settings().validate().map_err(|source| {
        error!(field = source.field(), error = %source, "configuration rejected");
        AppError::config(source)
    })?;

    let run_id = Uuid::new_v4();
    execute(&request)
        .instrument(info_span!("backup-agent", run_id = %run_id))
        .await
}

async fn execute(request: &BackupRequest) -> AppResult<BackupReport> {
    info!(
        etcd_url = %request.source.endpoint,
        s3_endpoint = %request.destination.endpoint,
        bucket = %request.destination.bucket,
        object = %request.destination.object,
        staging_dir = %request.staging_dir.display(),
        cleanup = %request.cleanup,
        "backup starting"
    );
    let orchestrator = BackupOrchestrator::new(
        Arc::new(EtcdSnapshotSource::new()),
        Arc::new(S3ObjectSink::new()),
    )
    .with_observer(Arc::new(TracingObserver::new()));

    let deadline = Deadline::after(request.timeout);
    let listener = spawn_interrupt_listener(deadline.cancellation_token());
    let outcome = orchestrator
        .run_backup_with_deadline(request, &deadline)
        .await;
    listener.abort();

    outcome.map_err(AppError::backup)
}

fn spawn_interrupt_listener(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(
        async move {
            tokio::select! {
                signal = shutdown_signal() => {
                    warn!(signal, "shutdown signal received; cancelling backup");
                    token.cancel();
                }
                () = token.cancelled() => {}
            }
        }
        .in_current_span(),
    )
}

#[cfg(unix)]
async fn shutdown_signal() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => Some(stream),
        Err(err) => {
            warn!(error = %err, "failed to install SIGTERM handler");
            None
        }
    };
    let sigterm = async {
        match terminate.as_mut() {
            Some(stream) => {
                stream.recv().await;
            }
            None => std::future::pending::<()>().await,
        }
    };
    tokio::select! {
        () = interrupt() => "SIGINT",
        () = sigterm => "SIGTERM",
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> &'static str {
    interrupt().await;
    "ctrl-c"
}

async fn interrupt() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
