//! Read workers.
//!
//! Reads never touch the writer: the coordinator resolves index entries
//! and hands them to short-lived worker threads that open segment files
//! read-only and reply directly to the caller. A batched read fans out one
//! worker per segment and joins them in ascending segment order, so the
//! concatenated result is in record-id order no matter which segment
//! finishes first.

use std::path::PathBuf;
use std::sync::mpsc::SyncSender;
use std::thread;

use bytes::Bytes;
use logcrate_storage::{read_record, read_segment, IndexEntry, StorageError};
use logcrate_types::{Digest, SegmentId};

use crate::CrateError;

pub(crate) type SingleReply = SyncSender<Result<Option<(Digest, Bytes)>, CrateError>>;
pub(crate) type BatchReply = SyncSender<Result<Option<Vec<(Digest, Bytes)>>, CrateError>>;

/// Serves `read(id)` on a worker thread.
pub(crate) fn spawn_single(dir: PathBuf, entry: IndexEntry, reply: SingleReply) {
    let spawned = thread::Builder::new()
        .name("logcrate-read".to_string())
        .spawn(move || {
            let result = read_record(&dir, &entry)
                .map(Some)
                .map_err(CrateError::from);
            let _ = reply.send(result);
        });

    if let Err(error) = spawned {
        tracing::error!(error = %error, "failed to spawn read worker");
        // The reply channel was moved into the failed closure; the caller
        // sees a disconnect and reports the crate as closed.
    }
}

/// Serves `read(start_id, max_bytes)` on worker threads.
///
/// `groups` holds the admitted entries grouped by segment, ascending by
/// segment id and by offset within each group.
pub(crate) fn spawn_batched(
    dir: PathBuf,
    groups: Vec<(SegmentId, Vec<IndexEntry>)>,
    reply: BatchReply,
) {
    debug_assert!(
        groups.windows(2).all(|w| w[0].0 < w[1].0),
        "segment groups must be ascending"
    );

    let spawned = thread::Builder::new()
        .name("logcrate-read-batch".to_string())
        .spawn(move || {
            let _ = reply.send(read_groups(dir, groups));
        });

    if let Err(error) = spawned {
        tracing::error!(error = %error, "failed to spawn batch read worker");
    }
}

/// Fans out one reader per segment and aggregates in segment order.
fn read_groups(
    dir: PathBuf,
    groups: Vec<(SegmentId, Vec<IndexEntry>)>,
) -> Result<Option<Vec<(Digest, Bytes)>>, CrateError> {
    let mut workers = Vec::with_capacity(groups.len());

    for (segment_id, entries) in groups {
        let dir = dir.clone();
        let worker = thread::Builder::new()
            .name(format!("logcrate-read-{segment_id}"))
            .spawn(move || read_segment(&dir, segment_id, &entries))
            .map_err(StorageError::Io)?;
        workers.push(worker);
    }

    // Joining in spawn order is joining in ascending segment order; within
    // a segment, entries were already ascending by offset.
    let mut records = Vec::new();
    for worker in workers {
        let segment_records = worker
            .join()
            .map_err(|_| CrateError::InvariantViolation("segment reader panicked"))??;
        records.extend(segment_records);
    }

    Ok(Some(records))
}
