//! Writer task.
//!
//! A dedicated thread wrapping the exclusive [`SegmentWriter`]. Commands
//! arrive over an mpsc channel and are processed strictly in FIFO order;
//! each append command produces exactly one `DidAppend` or `AppendFailed`
//! event back into the coordinator's mailbox, preserving the in-flight
//! correlation the coordinator relies on.

use std::sync::mpsc::{Receiver, SyncSender};

use bytes::Bytes;
use logcrate_storage::{BatchCommit, SegmentWriter, StorageError};
use logcrate_types::{Digest, RecordId, SegmentId};

use crate::coordinator::CoordinatorMsg;

/// Commands the coordinator sends to the writer task.
#[derive(Debug)]
pub(crate) enum WriterCommand {
    /// Append a non-empty batch of records.
    Append { batch: Vec<(Digest, Bytes)> },
    /// Durably flush the active segment.
    Sync,
    /// Durably flush and close the active segment, then exit.
    Close,
}

/// Events the writer task emits into the coordinator's mailbox.
#[derive(Debug)]
pub(crate) enum WriterEvent {
    /// A fresh segment was opened (always precedes the `DidAppend` of the
    /// batch that forced it).
    DidRoll { segment_id: SegmentId },
    /// A batch was handed to the operating system successfully.
    DidAppend(BatchCommit),
    /// A batch failed; the cursor did not advance.
    AppendFailed {
        first_id: RecordId,
        error: StorageError,
    },
    /// Result of an explicit sync request.
    SyncDone(Result<(), StorageError>),
    /// The active segment is flushed and closed; the task is exiting.
    Closed(Result<(), StorageError>),
}

/// Runs the writer loop until `Close` arrives or the coordinator goes away.
pub(crate) fn run(
    mut writer: SegmentWriter,
    commands: Receiver<WriterCommand>,
    events: SyncSender<CoordinatorMsg>,
) {
    let send = |event: WriterEvent| events.send(CoordinatorMsg::Writer(event)).is_ok();

    for command in commands {
        match command {
            WriterCommand::Append { batch } => {
                let first_id = writer.next_id();
                match writer.append_batch(&batch) {
                    Ok(commit) => {
                        if let Some(segment_id) = commit.rolled {
                            if !send(WriterEvent::DidRoll { segment_id }) {
                                return;
                            }
                        }
                        if !send(WriterEvent::DidAppend(commit)) {
                            return;
                        }
                    }
                    Err(error) => {
                        tracing::error!(first_id = %first_id, error = %error, "append failed");
                        if !send(WriterEvent::AppendFailed { first_id, error }) {
                            return;
                        }
                    }
                }
            }
            WriterCommand::Sync => {
                if !send(WriterEvent::SyncDone(writer.sync())) {
                    return;
                }
            }
            WriterCommand::Close => {
                let _ = send(WriterEvent::Closed(writer.close()));
                return;
            }
        }
    }

    // Coordinator dropped its sender without a Close: flush what we have.
    if let Err(error) = writer.close() {
        tracing::warn!(error = %error, "flush on writer shutdown failed");
    }
}
