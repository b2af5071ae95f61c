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

//! Shared test helpers used across integration suites.
//! Layout: fixtures.rs (sample requests), mocks.rs (scripted stages), observer.rs (recording observer).

pub mod fixtures;
pub mod mocks;
pub mod observer;

pub use fixtures::sample_request;
pub use mocks::{CaptureScript, ScriptedSink, ScriptedSource, UploadCall, UploadScript};
pub use observer::RecordingObserver;
