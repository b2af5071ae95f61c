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

//! etcd v3 snapshot capture.
//!
//! The snapshot is streamed from the maintenance API exposed by etcd's JSON gateway
//! (`POST /v3/maintenance/snapshot`), decoded frame by frame, and written to a
//! `.part` file that is renamed into place only once the stream completed and the
//! trailing integrity hash matched.
//!
//! Layout: `source.rs` (`EtcdSnapshotSource`), `frame.rs` (gateway frame decoding),
//! `staging.rs` (part-file writer with hashing).

mod frame;
mod source;
mod staging;

pub use source::EtcdSnapshotSource;
