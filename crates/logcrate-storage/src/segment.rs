//! Segment file header codec and filename convention.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use logcrate_types::SegmentId;

use crate::StorageError;

// ============================================================================
// File Format Constants
// ============================================================================

/// Magic bytes identifying a valid segment file.
pub const SEGMENT_MAGIC: [u8; 8] = *b"logcrate";

/// Current segment file format version.
pub const SEGMENT_VERSION: u32 = 1;

/// Header size: magic (8) + version (4) + segment id (8) = 20 bytes.
pub const SEGMENT_HEADER_SIZE: usize = 8 + 4 + 8;

/// Filename suffix for segment files.
const SEGMENT_SUFFIX: &str = ".dat";

// ============================================================================
// Segment Header
// ============================================================================

/// The fixed 20-byte header at the start of every segment file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    /// Id of the first record in this segment.
    pub segment_id: SegmentId,
}

impl SegmentHeader {
    pub fn new(segment_id: SegmentId) -> Self {
        Self { segment_id }
    }

    /// Serializes the header to its fixed 20-byte layout.
    ///
    /// Format: `[magic:"logcrate"][version:u32_be][segment_id:u64_be]`
    pub fn to_bytes(&self) -> [u8; SEGMENT_HEADER_SIZE] {
        let mut buf = [0u8; SEGMENT_HEADER_SIZE];
        buf[0..8].copy_from_slice(&SEGMENT_MAGIC);
        buf[8..12].copy_from_slice(&SEGMENT_VERSION.to_be_bytes());
        buf[12..20].copy_from_slice(&self.segment_id.as_u64().to_be_bytes());
        buf
    }

    /// Parses and validates a header from the start of `data`.
    ///
    /// `path` is carried into errors for diagnostics only.
    ///
    /// # Errors
    ///
    /// - [`StorageError::CorruptHeader`] if `data` is shorter than the
    ///   header or the magic bytes do not match
    /// - [`StorageError::VersionMismatch`] if the version is unsupported
    pub fn from_bytes(path: &Path, data: &[u8]) -> Result<Self, StorageError> {
        if data.len() < SEGMENT_HEADER_SIZE {
            return Err(StorageError::CorruptHeader {
                path: path.to_path_buf(),
                reason: "truncated segment header",
            });
        }

        if data[0..8] != SEGMENT_MAGIC {
            return Err(StorageError::CorruptHeader {
                path: path.to_path_buf(),
                reason: "bad magic bytes",
            });
        }

        let version = u32::from_be_bytes(
            data[8..12]
                .try_into()
                .expect("slice length equals version field after bounds check"),
        );
        if version != SEGMENT_VERSION {
            return Err(StorageError::VersionMismatch {
                path: path.to_path_buf(),
                expected: SEGMENT_VERSION,
                found: version,
            });
        }

        let segment_id = u64::from_be_bytes(
            data[12..20]
                .try_into()
                .expect("slice length equals id field after bounds check"),
        );

        Ok(Self {
            segment_id: SegmentId::new(segment_id),
        })
    }
}

// ============================================================================
// Filename Convention
// ============================================================================

/// Formats a segment id as its filename: 16 lowercase hex digits + `.dat`.
///
/// The zero-padded hex form makes lexicographic filename order agree with
/// ascending segment-id order.
pub fn segment_file_name(id: SegmentId) -> String {
    format!("{:016x}{SEGMENT_SUFFIX}", id.as_u64())
}

/// Returns the full path of a segment file within a crate directory.
pub fn segment_path(dir: &Path, id: SegmentId) -> PathBuf {
    dir.join(segment_file_name(id))
}

/// Parses a segment id back out of a filename.
///
/// Returns `None` for anything that is not exactly 16 lowercase hex digits
/// followed by `.dat`.
pub fn parse_segment_file_name(name: &OsStr) -> Option<SegmentId> {
    let name = name.to_str()?;
    let stem = name.strip_suffix(SEGMENT_SUFFIX)?;

    if stem.len() != 16 || !stem.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    {
        return None;
    }

    let id = u64::from_str_radix(stem, 16).ok()?;
    Some(SegmentId::new(id))
}
