//! # logcrate-types: Core types for `LogCrate`
//!
//! This crate contains the shared identifier types used across the
//! `LogCrate` engine:
//! - Record identity ([`RecordId`])
//! - Segment identity ([`SegmentId`])
//! - Content fingerprints ([`Digest`])

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

// ============================================================================
// Record Id - Copy (cheap 8-byte value)
// ============================================================================

/// Position of a record within a crate.
///
/// Record ids are zero-indexed, dense, and strictly monotonically
/// increasing: the first record appended to a fresh crate has id 0, the
/// next id 1, and so on. Pruning whole segments from the front of the log
/// raises the smallest live id but never re-uses one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct RecordId(u64);

impl RecordId {
    pub const ZERO: RecordId = RecordId(0);

    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// The id assigned to the record after this one.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// The id `n` records past this one.
    pub fn advance(&self, n: u64) -> Self {
        Self(self.0 + n)
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RecordId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<RecordId> for u64 {
    fn from(id: RecordId) -> Self {
        id.0
    }
}

// ============================================================================
// Segment Id - Copy (cheap 8-byte value)
// ============================================================================

/// Identity of one segment file within a crate.
///
/// A segment id equals the id of the first record written into that
/// segment, which is also the filename stem. Opening a segment therefore
/// tells you its starting record id without any auxiliary index file.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct SegmentId(u64);

impl SegmentId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// The id of the first record in this segment.
    pub fn first_record(&self) -> RecordId {
        RecordId::new(self.0)
    }
}

impl Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SegmentId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<SegmentId> for u64 {
    fn from(id: SegmentId) -> Self {
        id.0
    }
}

impl From<RecordId> for SegmentId {
    /// A segment is named after its first record.
    fn from(id: RecordId) -> Self {
        Self(id.as_u64())
    }
}

// ============================================================================
// Digest - Copy (fixed 20 bytes, no heap data)
// ============================================================================

/// Length of a content digest in bytes.
pub const DIGEST_LEN: usize = 20;

/// Opaque 20-byte content fingerprint attached to every record.
///
/// The engine never computes or inspects digests; callers supply them at
/// append time (typically SHA-1 of the payload) and the engine round-trips
/// them, verifying equality on read to detect corruption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Digest([u8; DIGEST_LEN]);

impl Digest {
    pub fn new(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }
}

impl Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<[u8; DIGEST_LEN]> for Digest {
    fn from(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for Digest {
    type Error = InvalidDigestLength;

    /// Fails unless the slice is exactly [`DIGEST_LEN`] bytes.
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; DIGEST_LEN] = bytes
            .try_into()
            .map_err(|_| InvalidDigestLength(bytes.len()))?;
        Ok(Self(arr))
    }
}

/// Error returned when constructing a [`Digest`] from a slice of the
/// wrong length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidDigestLength(pub usize);

impl Display for InvalidDigestLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "digest must be {DIGEST_LEN} bytes, got {}", self.0)
    }
}

impl std::error::Error for InvalidDigestLength {}
