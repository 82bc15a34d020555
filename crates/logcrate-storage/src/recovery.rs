//! Crash-consistent recovery scan.
//!
//! Reconstitutes a crate's in-memory index by scanning its segment files in
//! ascending filename order and replaying record headers. The segment-id-
//! equals-first-record-id invariant means no auxiliary index file is needed:
//! each segment header announces where its record ids start.
//!
//! A short read at a segment's tail marks the end of valid data: the torn
//! bytes are the remains of an interrupted append and are trimmed so the
//! writer resumes on a clean tail. A corrupt or version-mismatched segment
//! *header*, by contrast, aborts recovery.

use std::fs::{self, OpenOptions};
use std::path::Path;

use bytes::Bytes;
use logcrate_types::{RecordId, SegmentId};

use crate::record::RecordHeader;
use crate::segment::{parse_segment_file_name, SegmentHeader, SEGMENT_HEADER_SIZE};
use crate::{IndexEntry, RecordIndex, StorageError, RECORD_HEADER_SIZE};

/// Where the writer resumes after recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterTail {
    /// The final (and therefore active) segment.
    pub segment_id: SegmentId,
    /// End of the last valid record in that segment.
    pub cursor: u64,
    /// Id the next appended record will receive.
    pub next_id: RecordId,
}

/// Everything `open` needs: the rebuilt index and the writer's tail state.
#[derive(Debug)]
pub struct RecoveredCrate {
    pub index: RecordIndex,
    pub tail: WriterTail,
}

/// Scans a crate directory and rebuilds its index.
///
/// Every file in the directory is treated as a segment; foreign files fail
/// recovery. Returns `None` when the directory holds no files at all (the
/// caller decides how to surface that).
///
/// # Errors
///
/// - [`StorageError::CorruptHeader`] for a foreign file, a truncated or
///   bad-magic segment header, or a header whose id disagrees with the
///   filename
/// - [`StorageError::VersionMismatch`] for an unsupported format version
/// - [`StorageError::Io`] if the directory or a segment cannot be read
pub fn recover(dir: &Path) -> Result<Option<RecoveredCrate>, StorageError> {
    let mut names: Vec<_> = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.file_name()))
        .collect::<Result<_, _>>()?;

    if names.is_empty() {
        return Ok(None);
    }

    // Lexicographic filename order is ascending segment-id order.
    names.sort();

    let mut index = RecordIndex::new();
    let mut tail = None;

    for name in names {
        let path = dir.join(&name);

        let Some(segment_id) = parse_segment_file_name(&name) else {
            return Err(StorageError::CorruptHeader {
                path,
                reason: "not a segment file",
            });
        };

        let segment_tail = scan_segment(&path, segment_id, &mut index)?;
        tail = Some(segment_tail);
    }

    let tail = tail.expect("at least one segment was scanned");

    tracing::debug!(
        records = index.len(),
        segment_id = %tail.segment_id,
        next_id = %tail.next_id,
        "recovered crate"
    );

    Ok(Some(RecoveredCrate { index, tail }))
}

/// Replays one segment's records into the index.
///
/// Returns the tail state as if this were the final segment; the caller
/// keeps the last one.
fn scan_segment(
    path: &Path,
    segment_id: SegmentId,
    index: &mut RecordIndex,
) -> Result<WriterTail, StorageError> {
    let data: Bytes = fs::read(path)?.into();

    let header = SegmentHeader::from_bytes(path, &data)?;
    if header.segment_id != segment_id {
        return Err(StorageError::CorruptHeader {
            path: path.to_path_buf(),
            reason: "segment id disagrees with filename",
        });
    }

    let mut id = segment_id.first_record();
    let mut pos = SEGMENT_HEADER_SIZE as u64;

    loop {
        let remaining = data.len() as u64 - pos;
        if remaining == 0 {
            break;
        }

        // EOF mid-header or mid-payload: an interrupted append left a torn
        // tail. Valid data ends here.
        if remaining < RECORD_HEADER_SIZE as u64 {
            trim_torn_tail(path, segment_id, pos, data.len() as u64)?;
            break;
        }

        let record =
            RecordHeader::from_bytes(&data[pos as usize..pos as usize + RECORD_HEADER_SIZE])?;
        let total_size = u64::from(record.total_size());

        if remaining < total_size {
            trim_torn_tail(path, segment_id, pos, data.len() as u64)?;
            break;
        }

        index.insert(
            id,
            IndexEntry {
                segment_id,
                offset: pos,
                total_size: record.total_size(),
                digest: record.digest,
            },
        );

        id = id.next();
        pos += total_size;
    }

    Ok(WriterTail {
        segment_id,
        cursor: pos,
        next_id: id,
    })
}

/// Truncates torn bytes off a segment so the tail ends at the last valid
/// record.
fn trim_torn_tail(
    path: &Path,
    segment_id: SegmentId,
    valid_end: u64,
    file_len: u64,
) -> Result<(), StorageError> {
    tracing::warn!(
        segment_id = %segment_id,
        valid_end,
        file_len,
        "trimming torn segment tail"
    );

    let file = OpenOptions::new().write(true).open(path)?;
    file.set_len(valid_end)?;
    file.sync_all()?;

    Ok(())
}
