//! Stateless positional readers.
//!
//! Readers open segment files read-only with their own handles, so they run
//! concurrently with each other and with the writer; positional reads and
//! tail appends do not conflict on POSIX semantics. Every record read back
//! is checked against its index entry before being returned.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use bytes::Bytes;
use logcrate_types::{Digest, SegmentId};

use crate::record::RecordHeader;
use crate::segment::segment_path;
use crate::{IndexEntry, StorageError, RECORD_HEADER_SIZE};

/// Reads and verifies a single record.
///
/// Opens the target segment, reads `entry.total_size` bytes at
/// `entry.offset`, and enforces that the stored payload size and digest
/// match the index entry.
///
/// # Errors
///
/// - [`StorageError::CorruptRecord`] on a size or digest mismatch
/// - [`StorageError::Io`] if the segment cannot be opened or read
pub fn read_record(dir: &Path, entry: &IndexEntry) -> Result<(Digest, Bytes), StorageError> {
    let mut file = File::open(segment_path(dir, entry.segment_id))?;
    read_entry(&mut file, entry)
}

/// Reads and verifies several records from one segment.
///
/// The segment is opened once; entries are read in the order given, which
/// callers keep ascending by offset.
pub fn read_segment(
    dir: &Path,
    segment_id: SegmentId,
    entries: &[IndexEntry],
) -> Result<Vec<(Digest, Bytes)>, StorageError> {
    debug_assert!(
        entries.iter().all(|e| e.segment_id == segment_id),
        "all entries must point into the segment being read"
    );
    debug_assert!(
        entries.windows(2).all(|w| w[0].offset < w[1].offset),
        "entries must be in ascending offset order"
    );

    let mut file = File::open(segment_path(dir, segment_id))?;

    entries
        .iter()
        .map(|entry| read_entry(&mut file, entry))
        .collect()
}

/// Positional read of one record through an already-open handle.
fn read_entry(file: &mut File, entry: &IndexEntry) -> Result<(Digest, Bytes), StorageError> {
    let mut buf = vec![0u8; entry.total_size as usize];
    file.seek(SeekFrom::Start(entry.offset))?;
    file.read_exact(&mut buf)?;

    let header = RecordHeader::from_bytes(&buf)?;

    if header.payload_size != entry.payload_size() {
        return Err(StorageError::CorruptRecord {
            segment_id: entry.segment_id,
            offset: entry.offset,
            reason: "stored payload size disagrees with index",
        });
    }

    if header.digest != entry.digest {
        return Err(StorageError::CorruptRecord {
            segment_id: entry.segment_id,
            offset: entry.offset,
            reason: "stored digest disagrees with index",
        });
    }

    // Zero-copy: the payload is a slice of the read buffer.
    let payload = Bytes::from(buf).slice(RECORD_HEADER_SIZE..);

    Ok((header.digest, payload))
}
