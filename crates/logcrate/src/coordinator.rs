//! Coordinator event loop.
//!
//! The coordinator is the only task that mutates crate state: it owns the
//! record index and the in-flight FIFO of append callers. Client requests
//! and writer events arrive through one mailbox and are handled in order;
//! handlers never block on I/O (reads are dispatched to worker threads,
//! appends to the writer task).
//!
//! # FIFO correlation
//!
//! Append batches are forwarded to the writer in arrival order and the
//! writer processes them in order, so a plain queue of waiters correlates
//! writer events to client replies: every forwarded batch produces exactly
//! one `DidAppend` or `AppendFailed`, and it belongs to the queue's head.
//! A writer event with no waiter queued is a protocol-violation bug that
//! terminates the crate.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, Sender, SyncSender};

use bytes::Bytes;
use logcrate_storage::{BatchCommit, IndexEntry, RecordIndex};
use logcrate_types::{Digest, RecordId, SegmentId};

use crate::reader;
use crate::writer::{WriterCommand, WriterEvent};
use crate::CrateError;

/// Everything that can land in the coordinator's mailbox.
#[derive(Debug)]
pub(crate) enum CoordinatorMsg {
    Client(ClientRequest),
    Writer(WriterEvent),
}

/// Client calls, each carrying its own reply channel.
#[derive(Debug)]
pub(crate) enum ClientRequest {
    Append {
        batch: Vec<(Digest, Bytes)>,
        reply: SyncSender<Result<Vec<RecordId>, CrateError>>,
    },
    Read {
        id: RecordId,
        reply: reader::SingleReply,
    },
    ReadFrom {
        start: RecordId,
        max_bytes: u64,
        reply: reader::BatchReply,
    },
    Range {
        reply: SyncSender<Option<(RecordId, RecordId)>>,
    },
    IsEmpty {
        reply: SyncSender<bool>,
    },
    Sync {
        reply: SyncSender<Result<(), CrateError>>,
    },
    Close {
        reply: SyncSender<Result<(), CrateError>>,
    },
}

/// The coordinator task state.
pub(crate) struct Coordinator {
    /// Crate directory, cloned into read workers.
    dir: PathBuf,
    /// The authoritative id → location mapping.
    index: RecordIndex,
    /// Mailbox of client requests and writer events.
    mailbox: Receiver<CoordinatorMsg>,
    /// Commands to the writer task.
    writer_tx: Sender<WriterCommand>,
    /// In-flight FIFO: one waiter per batch forwarded to the writer.
    pending_appends: VecDeque<SyncSender<Result<Vec<RecordId>, CrateError>>>,
    /// In-flight FIFO for explicit sync requests.
    pending_syncs: VecDeque<SyncSender<Result<(), CrateError>>>,
    /// The caller waiting on `close`, once one arrived.
    close_waiter: Option<SyncSender<Result<(), CrateError>>>,
}

impl Coordinator {
    pub(crate) fn new(
        dir: PathBuf,
        index: RecordIndex,
        mailbox: Receiver<CoordinatorMsg>,
        writer_tx: Sender<WriterCommand>,
    ) -> Self {
        Self {
            dir,
            index,
            mailbox,
            writer_tx,
            pending_appends: VecDeque::new(),
            pending_syncs: VecDeque::new(),
            close_waiter: None,
        }
    }

    /// Runs the event loop until the crate closes or terminates.
    ///
    /// This method blocks and is run on a dedicated thread.
    pub(crate) fn run(mut self) {
        tracing::debug!(dir = %self.dir.display(), "coordinator starting");

        while let Ok(msg) = self.mailbox.recv() {
            let outcome = match msg {
                CoordinatorMsg::Client(request) => self.handle_client(request),
                CoordinatorMsg::Writer(event) => self.handle_writer(event),
            };

            match outcome {
                Flow::Continue => {}
                Flow::Stop => break,
                Flow::Fatal(reason) => {
                    self.terminate(reason);
                    return;
                }
            }
        }

        tracing::debug!(dir = %self.dir.display(), "coordinator stopped");
    }

    fn handle_client(&mut self, request: ClientRequest) -> Flow {
        // After a close has been requested, mutating calls are refused;
        // queries keep working until the loop exits.
        let closing = self.close_waiter.is_some();

        match request {
            ClientRequest::Append { batch, reply } => {
                if closing {
                    let _ = reply.send(Err(CrateError::Closed));
                    return Flow::Continue;
                }
                // An empty batch reserves no ids, so it never reaches the
                // writer; answering here keeps the FIFO one-to-one with
                // forwarded batches.
                if batch.is_empty() {
                    let _ = reply.send(Ok(Vec::new()));
                    return Flow::Continue;
                }
                if self.writer_tx.send(WriterCommand::Append { batch }).is_err() {
                    let _ = reply.send(Err(CrateError::Closed));
                    return Flow::Fatal("writer task terminated unexpectedly");
                }
                self.pending_appends.push_back(reply);
                Flow::Continue
            }

            ClientRequest::Read { id, reply } => {
                match self.index.get(id) {
                    None => {
                        let _ = reply.send(Ok(None));
                    }
                    Some(entry) => reader::spawn_single(self.dir.clone(), entry, reply),
                }
                Flow::Continue
            }

            ClientRequest::ReadFrom {
                start,
                max_bytes,
                reply,
            } => {
                if !self.index.contains(start) {
                    let _ = reply.send(Ok(None));
                    return Flow::Continue;
                }
                let groups = self.admit_prefix(start, max_bytes);
                if groups.is_empty() {
                    // The first record alone exceeds the budget.
                    let _ = reply.send(Ok(Some(Vec::new())));
                    return Flow::Continue;
                }
                reader::spawn_batched(self.dir.clone(), groups, reply);
                Flow::Continue
            }

            ClientRequest::Range { reply } => {
                let _ = reply.send(self.index.range());
                Flow::Continue
            }

            ClientRequest::IsEmpty { reply } => {
                let _ = reply.send(self.index.is_empty());
                Flow::Continue
            }

            ClientRequest::Sync { reply } => {
                if closing {
                    let _ = reply.send(Err(CrateError::Closed));
                    return Flow::Continue;
                }
                if self.writer_tx.send(WriterCommand::Sync).is_err() {
                    let _ = reply.send(Err(CrateError::Closed));
                    return Flow::Fatal("writer task terminated unexpectedly");
                }
                self.pending_syncs.push_back(reply);
                Flow::Continue
            }

            ClientRequest::Close { reply } => {
                if closing {
                    let _ = reply.send(Err(CrateError::Closed));
                    return Flow::Continue;
                }
                // The writer drains previously forwarded batches first, so
                // every append enqueued before this point commits (or
                // fails) before the Closed acknowledgement arrives.
                if self.writer_tx.send(WriterCommand::Close).is_err() {
                    let _ = reply.send(Err(CrateError::Closed));
                    return Flow::Fatal("writer task terminated unexpectedly");
                }
                self.close_waiter = Some(reply);
                Flow::Continue
            }
        }
    }

    fn handle_writer(&mut self, event: WriterEvent) -> Flow {
        match event {
            WriterEvent::DidRoll { segment_id } => {
                tracing::debug!(segment_id = %segment_id, "segment rolled");
                Flow::Continue
            }

            WriterEvent::DidAppend(commit) => {
                let Some(waiter) = self.pending_appends.pop_front() else {
                    return Flow::Fatal("append commit with no waiting caller");
                };
                let ids = self.apply_commit(commit);
                let _ = waiter.send(Ok(ids));
                Flow::Continue
            }

            WriterEvent::AppendFailed { first_id, error } => {
                let Some(waiter) = self.pending_appends.pop_front() else {
                    return Flow::Fatal("append failure with no waiting caller");
                };
                tracing::warn!(first_id = %first_id, error = %error, "append rejected");
                let _ = waiter.send(Err(error.into()));
                Flow::Continue
            }

            WriterEvent::SyncDone(result) => {
                let Some(waiter) = self.pending_syncs.pop_front() else {
                    return Flow::Fatal("sync acknowledgement with no waiting caller");
                };
                let _ = waiter.send(result.map_err(CrateError::from));
                Flow::Continue
            }

            WriterEvent::Closed(result) => {
                let Some(waiter) = self.close_waiter.take() else {
                    return Flow::Fatal("close acknowledgement with no waiting caller");
                };
                debug_assert!(
                    self.pending_appends.is_empty() && self.pending_syncs.is_empty(),
                    "writer acknowledged close with requests still in flight"
                );
                let _ = waiter.send(result.map_err(CrateError::from));
                Flow::Stop
            }
        }
    }

    /// Makes a committed batch visible: all index entries are applied
    /// before the caller learns its ids, so a subsequent read observes
    /// every record of the batch.
    fn apply_commit(&mut self, commit: BatchCommit) -> Vec<RecordId> {
        let n = commit.offsets.len();
        let mut ids = Vec::with_capacity(n);

        for i in 0..n {
            let id = commit.first_id.advance(i as u64);
            self.index.insert(
                id,
                IndexEntry {
                    segment_id: commit.segment_id,
                    offset: commit.offsets[i],
                    total_size: commit.total_sizes[i],
                    digest: commit.digests[i],
                },
            );
            ids.push(id);
        }

        ids
    }

    /// Walks the index upward from `start`, admitting the longest prefix
    /// of records whose payloads fit `max_bytes`, grouped by segment.
    ///
    /// Admission is all-or-nothing per record and stops at the first
    /// overflow; later, smaller records are not considered. The budget
    /// counts payload bytes only.
    fn admit_prefix(&self, start: RecordId, max_bytes: u64) -> Vec<(SegmentId, Vec<IndexEntry>)> {
        let mut groups: Vec<(SegmentId, Vec<IndexEntry>)> = Vec::new();
        let mut remaining = max_bytes;
        let mut id = start;

        while let Some(entry) = self.index.get(id) {
            let payload_size = u64::from(entry.payload_size());
            if payload_size > remaining {
                break;
            }
            remaining -= payload_size;

            match groups.last_mut() {
                Some((segment_id, entries)) if *segment_id == entry.segment_id => {
                    entries.push(entry);
                }
                _ => groups.push((entry.segment_id, vec![entry])),
            }

            id = id.next();
        }

        groups
    }

    /// Fails every in-flight caller and abandons the loop. Used when the
    /// writer protocol is violated; the crate is unusable afterwards.
    fn terminate(&mut self, reason: &'static str) {
        tracing::error!(reason, dir = %self.dir.display(), "terminating crate");

        for waiter in self.pending_appends.drain(..) {
            let _ = waiter.send(Err(CrateError::InvariantViolation(reason)));
        }
        for waiter in self.pending_syncs.drain(..) {
            let _ = waiter.send(Err(CrateError::InvariantViolation(reason)));
        }
        if let Some(waiter) = self.close_waiter.take() {
            let _ = waiter.send(Err(CrateError::InvariantViolation(reason)));
        }
    }
}

/// Control flow of one handled message.
enum Flow {
    Continue,
    Stop,
    Fatal(&'static str),
}
