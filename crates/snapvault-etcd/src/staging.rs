//! Part-file writer that hashes the snapshot while it streams in.
//!
//! # Design
//! - Bytes land in `<dest>.part`; only `commit` renames the file to `<dest>`.
//! - The part file is owned by a drop guard, so a writer dropped mid-stream (for
//!   example when the run deadline fires) still removes it.
//! - The whole file is hashed for the artifact digest.
//! - All bytes but the last 32 are hashed separately so etcd's trailing SHA-256
//!   can be checked without re-reading the file.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use snapvault_core::{FailureKind, StageError, StageResult, StagingArtifact};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

const HASH_LEN: usize = 32;
// bbolt files are page aligned; a 32 byte remainder means etcd appended its hash.
const HASH_ALIGNMENT: u64 = 512;

/// Location of the in-progress file for `dest`.
pub(crate) fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map_or_else(|| OsString::from("snapshot"), ToOwned::to_owned);
    name.push(".part");
    dest.with_file_name(name)
}

/// Remove `path`, ignoring a missing file.
pub(crate) async fn remove_if_present(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "removed stale staging file"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(
            path = %path.display(),
            error = %err,
            "failed to remove staging file"
        ),
    }
}

/// Removes the part file on drop unless the snapshot was committed.
#[derive(Debug)]
struct PartFile {
    path: PathBuf,
    armed: bool,
}

impl PartFile {
    const fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    const fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PartFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed incomplete snapshot"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!(
                path = %self.path.display(),
                error = %err,
                "failed to remove incomplete snapshot"
            ),
        }
    }
}

/// Streaming writer for one snapshot.
pub(crate) struct StagingWriter {
    dest: PathBuf,
    file: File,
    part: PartFile,
    whole: Sha256,
    body: Sha256,
    tail: Vec<u8>,
    written: u64,
}

impl StagingWriter {
    /// Create (or truncate) the part file next to `dest`.
    pub(crate) async fn create(dest: &Path) -> StageResult<Self> {
        if let Some(parent) = dest.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| io_error("staging.create_dir", parent, err))?;
        }
        let part = part_path(dest);
        let file = File::create(&part)
            .await
            .map_err(|err| io_error("staging.create", &part, err))?;
        Ok(Self {
            dest: dest.to_path_buf(),
            file,
            part: PartFile::new(part),
            whole: Sha256::new(),
            body: Sha256::new(),
            tail: Vec::with_capacity(HASH_LEN * 2),
            written: 0,
        })
    }

    /// Bytes written so far.
    pub(crate) const fn written(&self) -> u64 {
        self.written
    }

    /// Append one chunk of snapshot bytes.
    pub(crate) async fn write_chunk(&mut self, chunk: &[u8]) -> StageResult<()> {
        if chunk.is_empty() {
            return Ok(());
        }
        self.file
            .write_all(chunk)
            .await
            .map_err(|err| io_error("staging.write", self.part.path(), err))?;
        self.whole.update(chunk);
        self.tail.extend_from_slice(chunk);
        if self.tail.len() > HASH_LEN {
            let settled = self.tail.len() - HASH_LEN;
            self.body.update(&self.tail[..settled]);
            self.tail.drain(..settled);
        }
        self.written += chunk.len() as u64;
        Ok(())
    }

    /// Flush, verify, and atomically move the part file into place.
    pub(crate) async fn commit(mut self, verify_integrity: bool) -> StageResult<StagingArtifact> {
        if self.written == 0 {
            return Err(StageError::new(FailureKind::Stream, "etcd.snapshot")
                .with_detail("server sent an empty snapshot"));
        }
        self.file
            .flush()
            .await
            .map_err(|err| io_error("staging.flush", self.part.path(), err))?;
        self.file
            .sync_all()
            .await
            .map_err(|err| io_error("staging.sync", self.part.path(), err))?;

        let has_hash = self.written % HASH_ALIGNMENT == HASH_LEN as u64;
        if verify_integrity {
            if has_hash {
                let expected = self.body.finalize();
                if expected.as_slice() != self.tail.as_slice() {
                    return Err(StageError::new(FailureKind::Integrity, "etcd.snapshot")
                        .with_detail("trailing sha256 does not match snapshot contents"));
                }
                debug!(size_bytes = self.written, "snapshot integrity hash verified");
            } else {
                warn!(
                    size_bytes = self.written,
                    "snapshot carries no integrity hash; skipping verification"
                );
            }
        }

        let Self {
            dest,
            file,
            mut part,
            whole,
            written,
            ..
        } = self;
        drop(file);
        fs::rename(part.path(), &dest)
            .await
            .map_err(|err| io_error("staging.rename", &dest, err))?;
        part.disarm();

        Ok(StagingArtifact {
            path: dest,
            size_bytes: written,
            sha256: whole.finalize().into(),
        })
    }
}

fn io_error(operation: &'static str, path: &Path, err: std::io::Error) -> StageError {
    StageError::new(FailureKind::Io, operation)
        .with_detail(path.display().to_string())
        .with_source(err)
}
