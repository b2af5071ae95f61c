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
#![allow(clippy::redundant_pub_crate)]

//! Object sink for S3-compatible stores (AWS S3, `MinIO`, Ceph RGW).
//!
//! Layout: `sink.rs` (`S3ObjectSink`), `client.rs` (SDK client construction),
//! `error.rs` (SDK error classification).

mod client;
mod error;
mod sink;

pub use sink::{DEFAULT_MAX_ATTEMPTS, S3ObjectSink};
