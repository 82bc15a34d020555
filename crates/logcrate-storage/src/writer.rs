//! Exclusive segment writer.
//!
//! The [`SegmentWriter`] is the sole owner of the active segment's file
//! handle and write cursor. It turns append batches into contiguous disk
//! writes, rolling to a fresh segment when the configured size cap would be
//! exceeded.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use logcrate_types::{Digest, RecordId, SegmentId};

use crate::record::encode_record_into;
use crate::recovery::WriterTail;
use crate::segment::{segment_path, SegmentHeader, SEGMENT_HEADER_SIZE};
use crate::{StorageError, RECORD_HEADER_SIZE};

/// The open, writable segment at the log's tail.
#[derive(Debug)]
struct ActiveSegment {
    file: File,
    id: SegmentId,
    /// Byte offset where the next record header will land.
    cursor: u64,
}

/// Result of one successful batch append.
///
/// Field vectors are parallel: element `i` describes the record with id
/// `first_id + i`.
#[derive(Debug, Clone)]
pub struct BatchCommit {
    /// Set when the batch forced a roll to this new segment, which happens
    /// before any record of the batch is written.
    pub rolled: Option<SegmentId>,
    /// Segment every record of the batch landed in.
    pub segment_id: SegmentId,
    /// Id assigned to the first record of the batch.
    pub first_id: RecordId,
    /// Byte offset of each record header within the segment.
    pub offsets: Vec<u64>,
    /// Header-plus-payload size of each record.
    pub total_sizes: Vec<u32>,
    /// Caller-supplied digest of each record.
    pub digests: Vec<Digest>,
}

/// Exclusive owner of the active segment file and the append cursor.
#[derive(Debug)]
pub struct SegmentWriter {
    /// Crate directory holding the segment files.
    dir: PathBuf,
    /// Soft size cap checked against the incoming batch before writing.
    segment_max_size: u64,
    /// Id the next appended record will receive.
    next_id: RecordId,
    /// Active segment, absent until the first append rolls one.
    active: Option<ActiveSegment>,
}

impl SegmentWriter {
    /// Creates a writer for a freshly created, empty crate.
    ///
    /// No segment exists yet; the first append rolls segment 0.
    pub fn create(dir: impl Into<PathBuf>, segment_max_size: u64) -> Self {
        Self {
            dir: dir.into(),
            segment_max_size,
            next_id: RecordId::ZERO,
            active: None,
        }
    }

    /// Resumes writing at the tail position recovery established.
    ///
    /// The final segment is reopened for writing with the cursor at the end
    /// of its last valid record; recovery has already trimmed any torn
    /// tail, which debug builds verify against the file length.
    pub fn resume(
        dir: impl Into<PathBuf>,
        segment_max_size: u64,
        tail: &WriterTail,
    ) -> Result<Self, StorageError> {
        let dir = dir.into();
        let path = segment_path(&dir, tail.segment_id);
        let file = OpenOptions::new().write(true).open(&path)?;

        debug_assert_eq!(
            file.metadata()?.len(),
            tail.cursor,
            "recovered tail cursor must sit at end of file"
        );

        tracing::debug!(
            segment_id = %tail.segment_id,
            cursor = tail.cursor,
            next_id = %tail.next_id,
            "resuming writer at recovered tail"
        );

        Ok(Self {
            dir,
            segment_max_size,
            next_id: tail.next_id,
            active: Some(ActiveSegment {
                file,
                id: tail.segment_id,
                cursor: tail.cursor,
            }),
        })
    }

    /// Id the next appended record will receive.
    pub fn next_id(&self) -> RecordId {
        self.next_id
    }

    /// Appends a batch of records as one contiguous write.
    ///
    /// Reserves ids `[next_id, next_id + n)`, rolling to a fresh segment
    /// first when no segment is active or the batch would push the current
    /// one past the size cap. A batch that alone exceeds the cap is still
    /// written whole into its fresh segment; segments are never split
    /// mid-batch.
    ///
    /// On failure neither the cursor nor `next_id` advances; any partial
    /// tail left on disk is overwritten by the next successful batch (the
    /// pre-write seek repositions the handle) or trimmed by recovery.
    ///
    /// # Panics
    ///
    /// Debug builds panic on an empty batch; the coordinator answers those
    /// without involving the writer.
    pub fn append_batch(&mut self, batch: &[(Digest, Bytes)]) -> Result<BatchCommit, StorageError> {
        debug_assert!(!batch.is_empty(), "cannot append an empty batch");

        let batch_bytes: u64 = batch
            .iter()
            .map(|(_, payload)| (RECORD_HEADER_SIZE + payload.len()) as u64)
            .sum();

        let needs_roll = match &self.active {
            None => true,
            Some(active) => active.cursor + batch_bytes > self.segment_max_size,
        };

        let rolled = if needs_roll {
            Some(self.roll(SegmentId::from(self.next_id))?)
        } else {
            None
        };

        let active = self
            .active
            .as_mut()
            .expect("active segment exists: just rolled or already open");

        // Encode the whole batch into one buffer, recording per-record
        // positions from the pre-write cursor.
        let mut buf = Vec::with_capacity(batch_bytes as usize);
        let mut offsets = Vec::with_capacity(batch.len());
        let mut total_sizes = Vec::with_capacity(batch.len());
        let mut digests = Vec::with_capacity(batch.len());
        let mut cursor = active.cursor;

        for (digest, payload) in batch {
            offsets.push(cursor);
            let total_size = encode_record_into(&mut buf, *digest, payload)?;
            total_sizes.push(total_size);
            digests.push(*digest);
            cursor += u64::from(total_size);
        }

        // The seek pins the write position: a previously failed batch may
        // have left a partial tail beyond the cursor.
        active.file.seek(SeekFrom::Start(active.cursor))?;
        active.file.write_all(&buf)?;

        let first_id = self.next_id;
        let segment_id = active.id;
        active.cursor = cursor;
        self.next_id = self.next_id.advance(batch.len() as u64);

        tracing::trace!(
            segment_id = %segment_id,
            first_id = %first_id,
            records = batch.len(),
            bytes = batch_bytes,
            "appended batch"
        );

        Ok(BatchCommit {
            rolled,
            segment_id,
            first_id,
            offsets,
            total_sizes,
            digests,
        })
    }

    /// Closes the current segment and opens a fresh one named after the
    /// next record id.
    ///
    /// The outgoing segment is durably flushed before the new header is
    /// written; the cursor restarts just past the segment header.
    fn roll(&mut self, id: SegmentId) -> Result<SegmentId, StorageError> {
        if let Some(old) = self.active.take() {
            old.file.sync_all()?;
        }

        // Truncating create keeps a failed roll retryable: the retry reuses
        // the same segment id and overwrites whatever partial header the
        // failed attempt left behind.
        let path = segment_path(&self.dir, id);
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        file.write_all(&SegmentHeader::new(id).to_bytes())?;

        tracing::debug!(segment_id = %id, path = %path.display(), "rolled new segment");

        self.active = Some(ActiveSegment {
            file,
            id,
            cursor: SEGMENT_HEADER_SIZE as u64,
        });

        Ok(id)
    }

    /// Durably flushes the active segment, if any.
    pub fn sync(&mut self) -> Result<(), StorageError> {
        if let Some(active) = &self.active {
            active.file.sync_all()?;
        }
        Ok(())
    }

    /// Durably flushes and closes the active segment.
    ///
    /// The writer is spent afterwards: a subsequent append would roll a new
    /// segment, so callers drop it instead.
    pub fn close(&mut self) -> Result<(), StorageError> {
        if let Some(active) = self.active.take() {
            active.file.sync_all()?;
            tracing::debug!(segment_id = %active.id, "closed active segment");
        }
        Ok(())
    }

    /// Directory this writer appends into.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
