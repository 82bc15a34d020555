//! logcrate-storage: Segment file format and recovery for `LogCrate`
//!
//! This crate implements the on-disk layer of the engine: the fixed-layout
//! record and segment codecs, the in-memory record index, the exclusive
//! segment writer with its rollover protocol, the stateless positional
//! readers, and the directory scan that reconstitutes a crate on open.
//!
//! # Record Format
//!
//! Each record is stored as:
//! ```text
//! [payload_size:u32][digest:20B][payload:bytes]
//!        4B             20B        variable
//! ```
//!
//! - **`payload_size`**: Size of the payload in bytes (header excluded)
//! - **digest**: Opaque 20-byte content fingerprint supplied by the caller
//! - **payload**: The record data
//!
//! All integers are big-endian.
//!
//! # Segment Format
//!
//! ```text
//! [magic:"logcrate"][version:u32][segment_id:u64][record 0][record 1]…
//!        8B              4B           8B
//! ```
//!
//! A segment's id equals the id of the first record written into it, and
//! doubles as the filename stem:
//!
//! ```text
//! crate_dir/
//!   0000000000000000.dat   <- records 0..n
//!   00000000000004d2.dat   <- records 1234.. (after a roll)
//! ```
//!
//! Sorting filenames lexicographically yields ascending segment order, so
//! recovery needs no auxiliary index file: it scans segments in filename
//! order and replays record headers.

mod error;
mod index;
mod reader;
mod record;
mod recovery;
mod segment;
mod writer;

pub use error::StorageError;
pub use index::{IndexEntry, RecordIndex};
pub use reader::{read_record, read_segment};
pub use record::{RecordHeader, RECORD_HEADER_SIZE};
pub use recovery::{recover, RecoveredCrate, WriterTail};
pub use segment::{
    parse_segment_file_name, segment_file_name, segment_path, SegmentHeader, SEGMENT_HEADER_SIZE,
    SEGMENT_MAGIC, SEGMENT_VERSION,
};
pub use writer::{BatchCommit, SegmentWriter};

#[cfg(test)]
mod tests;
