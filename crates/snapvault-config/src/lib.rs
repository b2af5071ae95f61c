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

//! Configuration surface for backup runs.
//!
//! Layout: `defaults.rs` (default values and limits), `model.rs` (raw settings as
//! supplied by flags or environment), `validate.rs` (checks and conversion into a
//! `BackupRequest`), `error.rs` (`ConfigError`).

pub mod defaults;
pub mod error;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use model::BackupSettings;
pub use validate::{build_request, parse_cleanup};
