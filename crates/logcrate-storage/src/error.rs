//! Error types for storage operations.

use std::io;
use std::path::PathBuf;

use logcrate_types::SegmentId;

/// Errors that can occur in the storage layer.
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    /// Filesystem I/O error.
    #[error("filesystem error: {0}")]
    Io(#[from] io::Error),

    /// A record header buffer was too short to decode.
    #[error("malformed record header: need {need} bytes, have {have}")]
    Malformed { need: usize, have: usize },

    /// A segment file header failed validation.
    #[error("corrupt segment header in {path}: {reason}")]
    CorruptHeader { path: PathBuf, reason: &'static str },

    /// A segment file was written by an unsupported format version.
    #[error("unsupported segment version in {path}: expected {expected}, found {found}")]
    VersionMismatch {
        path: PathBuf,
        expected: u32,
        found: u32,
    },

    /// A record read back from disk disagrees with its index entry.
    #[error("corrupt record in segment {segment_id} at offset {offset}: {reason}")]
    CorruptRecord {
        segment_id: SegmentId,
        offset: u64,
        reason: &'static str,
    },

    /// A payload is too large for the record header's u32 size field.
    #[error("payload too large: {size} bytes")]
    PayloadTooLarge { size: usize },
}
