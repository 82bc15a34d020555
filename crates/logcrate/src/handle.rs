//! The public `LogCrate` handle.
//!
//! Owns the coordinator and writer threads and exposes the client API.
//! Every call is a message into the coordinator's mailbox plus a blocking
//! wait on a private reply channel.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, SyncSender};
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use logcrate_storage::{recover, RecordIndex, SegmentWriter, StorageError};
use logcrate_types::{Digest, RecordId};

use crate::coordinator::{ClientRequest, Coordinator, CoordinatorMsg};
use crate::writer;
use crate::{CrateConfig, CrateError};

/// Backpressure bound on the coordinator mailbox.
const MAILBOX_CAPACITY: usize = 1024;

/// An open crate: one directory of segment files plus its coordinator.
///
/// Appends are serialized and commit in call order; reads run concurrently
/// with each other and with in-flight appends. The handle is used from any
/// thread; each call blocks only its own caller.
///
/// # Shutdown
///
/// Call [`close`](LogCrate::close) for a clean shutdown: it completes every
/// append accepted before it, durably flushes the active segment, and joins
/// the background threads. Dropping an unclosed handle does the same on a
/// best-effort basis, logging instead of returning errors.
#[derive(Debug)]
pub struct LogCrate {
    mailbox_tx: SyncSender<CoordinatorMsg>,
    coordinator: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
    closed: bool,
}

impl LogCrate {
    /// Creates a new, empty crate.
    ///
    /// The directory must not exist yet; it is created empty and the first
    /// append rolls segment 0.
    ///
    /// # Errors
    ///
    /// [`CrateError::DirectoryExists`] if `dir` already exists.
    pub fn create(dir: impl AsRef<Path>, config: CrateConfig) -> Result<Self, CrateError> {
        let dir = dir.as_ref();
        if dir.exists() {
            return Err(CrateError::DirectoryExists(dir.to_path_buf()));
        }
        fs::create_dir_all(dir).map_err(StorageError::Io)?;

        tracing::info!(dir = %dir.display(), "created crate");

        let segment_writer = SegmentWriter::create(dir, config.segment_max_size);
        Self::start(dir.to_path_buf(), RecordIndex::new(), segment_writer)
    }

    /// Opens an existing crate, reconstituting its index from the segment
    /// files.
    ///
    /// A torn tail left by a crash is trimmed; the writer resumes after
    /// the last valid record and the next append receives the next unused
    /// id.
    ///
    /// # Errors
    ///
    /// - [`CrateError::DirectoryMissing`] if `dir` does not exist or holds
    ///   no segments
    /// - [`StorageError::CorruptHeader`] / [`StorageError::VersionMismatch`]
    ///   via [`CrateError::Storage`] if any segment header fails validation
    pub fn open(dir: impl AsRef<Path>, config: CrateConfig) -> Result<Self, CrateError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(CrateError::DirectoryMissing(dir.to_path_buf()));
        }

        let recovered =
            recover(dir)?.ok_or_else(|| CrateError::DirectoryMissing(dir.to_path_buf()))?;

        tracing::info!(
            dir = %dir.display(),
            records = recovered.index.len(),
            "opened crate"
        );

        let segment_writer =
            SegmentWriter::resume(dir, config.segment_max_size, &recovered.tail)?;
        Self::start(dir.to_path_buf(), recovered.index, segment_writer)
    }

    /// Spawns the writer and coordinator threads.
    fn start(
        dir: PathBuf,
        index: RecordIndex,
        segment_writer: SegmentWriter,
    ) -> Result<Self, CrateError> {
        let (mailbox_tx, mailbox_rx) = mpsc::sync_channel(MAILBOX_CAPACITY);
        // Unbounded: the coordinator must never block against the writer,
        // whose events land back in the bounded mailbox.
        let (writer_tx, writer_rx) = mpsc::channel();

        let writer_mailbox = mailbox_tx.clone();
        let writer_thread = thread::Builder::new()
            .name("logcrate-writer".to_string())
            .spawn(move || writer::run(segment_writer, writer_rx, writer_mailbox))
            .map_err(|e| StorageError::Io(io::Error::other(e)))?;

        let coordinator = Coordinator::new(dir, index, mailbox_rx, writer_tx);
        let coordinator_thread = thread::Builder::new()
            .name("logcrate-coordinator".to_string())
            .spawn(move || coordinator.run())
            .map_err(|e| StorageError::Io(io::Error::other(e)))?;

        Ok(Self {
            mailbox_tx,
            coordinator: Some(coordinator_thread),
            writer: Some(writer_thread),
            closed: false,
        })
    }

    /// Appends one record; returns its assigned id.
    pub fn append(&self, digest: Digest, payload: Bytes) -> Result<RecordId, CrateError> {
        let ids = self.append_batch(vec![(digest, payload)])?;
        ids.into_iter()
            .next()
            .ok_or(CrateError::InvariantViolation(
                "single append committed no record",
            ))
    }

    /// Appends a batch of records atomically; returns their ids in input
    /// order.
    ///
    /// The whole batch lands in one segment and one contiguous write. An
    /// empty batch returns an empty id list.
    pub fn append_batch(
        &self,
        batch: Vec<(Digest, Bytes)>,
    ) -> Result<Vec<RecordId>, CrateError> {
        self.request(|reply| ClientRequest::Append { batch, reply })?
    }

    /// Reads one record back. `None` means the id is not in the live
    /// range (never appended, or pruned away).
    pub fn read(&self, id: RecordId) -> Result<Option<(Digest, Bytes)>, CrateError> {
        self.request(|reply| ClientRequest::Read { id, reply })?
    }

    /// Reads a run of records starting at `start`, bounded by a payload
    /// byte budget.
    ///
    /// Returns the longest prefix of records from `start` whose summed
    /// payload sizes fit `max_bytes` (headers do not count). The walk
    /// stops at the first record that would overflow, so `Some(vec![])`
    /// means `start` exists but its record alone exceeds the budget —
    /// distinct from `None`, which means `start` is not in the index.
    pub fn read_from(
        &self,
        start: RecordId,
        max_bytes: u64,
    ) -> Result<Option<Vec<(Digest, Bytes)>>, CrateError> {
        self.request(|reply| ClientRequest::ReadFrom {
            start,
            max_bytes,
            reply,
        })?
    }

    /// Returns the smallest and largest live record ids, or `None` for an
    /// empty crate.
    pub fn range(&self) -> Result<Option<(RecordId, RecordId)>, CrateError> {
        self.request(|reply| ClientRequest::Range { reply })
    }

    /// Returns `true` if no records are live.
    pub fn is_empty(&self) -> Result<bool, CrateError> {
        self.request(|reply| ClientRequest::IsEmpty { reply })
    }

    /// Durably flushes the active segment.
    ///
    /// Ordinary appends only guarantee the bytes reached the operating
    /// system; `sync` is the explicit barrier for callers that need more.
    pub fn sync(&self) -> Result<(), CrateError> {
        self.request(|reply| ClientRequest::Sync { reply })?
    }

    /// Closes the crate: completes appends accepted before this call,
    /// durably flushes and closes the active segment, and joins the
    /// background threads. Idempotent.
    pub fn close(&mut self) -> Result<(), CrateError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let result = self
            .request(|reply| ClientRequest::Close { reply })
            .and_then(|inner| inner);

        self.join_threads();
        result
    }

    fn join_threads(&mut self) {
        if let Some(writer) = self.writer.take() {
            let _ = writer.join();
        }
        if let Some(coordinator) = self.coordinator.take() {
            let _ = coordinator.join();
        }
    }

    /// Sends one request and waits for its reply.
    fn request<T>(
        &self,
        build: impl FnOnce(SyncSender<T>) -> ClientRequest,
    ) -> Result<T, CrateError> {
        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        self.mailbox_tx
            .send(CoordinatorMsg::Client(build(reply_tx)))
            .map_err(|_| CrateError::Closed)?;
        reply_rx.recv().map_err(|_| CrateError::Closed)
    }
}

impl Drop for LogCrate {
    fn drop(&mut self) {
        if let Err(error) = self.close() {
            tracing::warn!(error = %error, "close on drop failed");
        }
    }
}
