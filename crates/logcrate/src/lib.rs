//! # LogCrate
//!
//! An embeddable, append-only, log-structured record store. A *crate*
//! manages a directory of fixed-format segment files; clients append
//! digest-tagged payloads and read them back by the monotonically
//! increasing record id assigned at append time.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      LogCrate handle                        │
//! │              (client calls, any thread)                     │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ mailbox (mpsc)
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                     Coordinator                             │
//! │     (owns the index + in-flight append FIFO)                │
//! └───────┬─────────────────────────────────────┬───────────────┘
//!         │ commands            events │        │ spawn
//!         ▼                            │        ▼
//!   ┌─────────────┐                    │  ┌─────────────┐
//!   │   Writer    │────────────────────┘  │   Readers   │
//!   │ (active     │                       │ (short-lived,│
//!   │  segment)   │                       │  positional) │
//!   └─────────────┘                       └─────────────┘
//! ```
//!
//! Appends are serialized through the single writer task and commit in
//! submission order; reads run concurrently with each other and with the
//! writer on independent file handles. All state mutation is confined to
//! the coordinator's event loop, so the engine needs no locks.
//!
//! ## Example
//!
//! ```ignore
//! use bytes::Bytes;
//! use logcrate::{CrateConfig, Digest, LogCrate};
//!
//! let mut crate_ = LogCrate::create("./data", CrateConfig::default())?;
//!
//! let id = crate_.append(digest, Bytes::from("payload"))?;
//! let (digest, payload) = crate_.read(id)?.expect("just appended");
//!
//! crate_.close()?;
//! ```

mod config;
mod coordinator;
mod error;
mod handle;
mod reader;
mod writer;

pub use config::{CrateConfig, DEFAULT_SEGMENT_MAX_SIZE};
pub use error::CrateError;
pub use handle::LogCrate;

// Re-export the shared types callers need to speak the API.
pub use bytes::Bytes;
pub use logcrate_types::{Digest, RecordId, SegmentId, DIGEST_LEN};
