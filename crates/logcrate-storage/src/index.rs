//! In-memory record index.
//!
//! The [`RecordIndex`] maps record ids to their physical location, enabling
//! positional reads without scanning segment files. It is owned exclusively
//! by the crate coordinator and mutated only on its single-threaded event
//! path, so it carries no internal locking; readers receive copies of
//! entries before issuing I/O.

use std::collections::BTreeMap;

use logcrate_types::{Digest, RecordId, SegmentId};

use crate::RECORD_HEADER_SIZE;

/// Physical location and integrity data for one record.
///
/// # Invariants
///
/// Bytes `[offset, offset + total_size)` of segment `segment_id` contain a
/// well-formed record whose stored payload size is `total_size - 24` and
/// whose stored digest equals `digest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Segment holding the record.
    pub segment_id: SegmentId,
    /// Byte offset of the record *header* within the segment file.
    pub offset: u64,
    /// Header plus payload size in bytes.
    pub total_size: u32,
    /// Content fingerprint stored in the record header.
    pub digest: Digest,
}

impl IndexEntry {
    /// Byte length of the record's payload alone.
    pub fn payload_size(&self) -> u32 {
        self.total_size - RECORD_HEADER_SIZE as u32
    }
}

/// Ordered mapping from record id to [`IndexEntry`].
#[derive(Debug, Default, Clone)]
pub struct RecordIndex {
    entries: BTreeMap<RecordId, IndexEntry>,
}

impl RecordIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the entry for a record id.
    #[must_use]
    pub fn get(&self, id: RecordId) -> Option<IndexEntry> {
        self.entries.get(&id).copied()
    }

    /// Returns `true` if `id` has an entry.
    #[must_use]
    pub fn contains(&self, id: RecordId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Inserts the entry for a newly committed or recovered record.
    ///
    /// Ids arrive in ascending order (appends are serialized and recovery
    /// scans segments in order), which debug builds verify.
    pub fn insert(&mut self, id: RecordId, entry: IndexEntry) {
        debug_assert!(
            self.entries.last_key_value().map_or(true, |(last, _)| id > *last),
            "record id {id} must exceed the current maximum"
        );
        self.entries.insert(id, entry);
    }

    /// Returns the smallest and largest live record ids, or `None` when
    /// the crate is empty.
    #[must_use]
    pub fn range(&self) -> Option<(RecordId, RecordId)> {
        let (first, _) = self.entries.first_key_value()?;
        let (last, _) = self.entries.last_key_value()?;
        Some((*first, *last))
    }

    /// Returns `true` if the index contains no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of indexed records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterates entries in ascending record-id order.
    pub fn iter(&self) -> impl Iterator<Item = (RecordId, IndexEntry)> + '_ {
        self.entries.iter().map(|(id, entry)| (*id, *entry))
    }
}
