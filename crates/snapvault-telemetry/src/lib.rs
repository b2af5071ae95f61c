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

//! Observability for the backup agent.
//!
//! Layout: `init.rs` (subscriber installation), `observer.rs` (pipeline events
//! rendered as tracing events), `error.rs` (`TelemetryError`).

pub mod error;
pub mod init;
pub mod observer;

pub use error::{Result, TelemetryError};
pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, init_logging};
pub use observer::TracingObserver;
