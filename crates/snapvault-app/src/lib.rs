#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Snapvault application wiring: etcd snapshot capture followed by S3 upload under one
//! deadline.
//!
//! Layout: `orchestrator.rs` (capture-then-transfer pipeline), `cli.rs` (flags and
//! environment), `bootstrap.rs` (process wiring), `error.rs` (`AppError` and exit codes).

/// Process wiring and interrupt handling.
pub mod bootstrap;
/// Command-line surface.
pub mod cli;
/// Application errors and exit codes.
pub mod error;
/// Backup pipeline orchestration.
pub mod orchestrator;

pub use bootstrap::{run_app, run_with};
pub use cli::Cli;
pub use error::{AppError, AppResult};
pub use orchestrator::BackupOrchestrator;
