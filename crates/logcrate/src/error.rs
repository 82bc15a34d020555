//! Crate-level error types.

use std::path::PathBuf;

use logcrate_storage::StorageError;
use logcrate_types::InvalidDigestLength;

/// Errors surfaced by the public `LogCrate` API.
///
/// A missing record id is not an error: `read` and `read_from` return
/// `None` for it.
#[derive(Debug, thiserror::Error)]
pub enum CrateError {
    /// Error from the storage layer (I/O, codec, corruption).
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// `create` refuses a directory that already exists.
    #[error("directory already exists: {0}")]
    DirectoryExists(PathBuf),

    /// `open` requires an existing, previously populated crate directory.
    #[error("directory missing or not a crate: {0}")]
    DirectoryMissing(PathBuf),

    /// A supplied digest was not exactly 20 bytes.
    #[error(transparent)]
    InvalidDigest(#[from] InvalidDigestLength),

    /// The coordinator observed a protocol violation between itself and
    /// the writer. Fatal: the crate has terminated.
    #[error("crate invariant violated: {0}")]
    InvariantViolation(&'static str),

    /// The crate has been closed (or its coordinator has terminated).
    #[error("crate is closed")]
    Closed,
}
