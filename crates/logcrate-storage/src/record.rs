//! Record header codec.
//!
//! Every record on disk is `header || payload` where the header carries the
//! payload size and the caller-supplied content digest. The engine never
//! computes digests; it round-trips them and verifies equality on read.

use bytes::Bytes;
use logcrate_types::{Digest, DIGEST_LEN};

use crate::StorageError;

/// Size of the fixed record header: `payload_size` (4) + digest (20).
pub const RECORD_HEADER_SIZE: usize = 4 + DIGEST_LEN;

/// The fixed 24-byte header preceding every payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Byte length of the payload, excluding this header.
    pub payload_size: u32,
    /// Opaque 20-byte content fingerprint.
    pub digest: Digest,
}

impl RecordHeader {
    pub fn new(payload_size: u32, digest: Digest) -> Self {
        Self {
            payload_size,
            digest,
        }
    }

    /// Total on-disk size of the record this header describes.
    pub fn total_size(&self) -> u32 {
        RECORD_HEADER_SIZE as u32 + self.payload_size
    }

    /// Serializes the header to its fixed 24-byte layout.
    ///
    /// Format: `[payload_size:u32_be][digest:20B]`
    pub fn to_bytes(&self) -> [u8; RECORD_HEADER_SIZE] {
        let mut buf = [0u8; RECORD_HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.payload_size.to_be_bytes());
        buf[4..RECORD_HEADER_SIZE].copy_from_slice(self.digest.as_bytes());
        buf
    }

    /// Deserializes a header from the start of `data`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Malformed`] if `data` is shorter than
    /// [`RECORD_HEADER_SIZE`].
    pub fn from_bytes(data: &[u8]) -> Result<Self, StorageError> {
        if data.len() < RECORD_HEADER_SIZE {
            return Err(StorageError::Malformed {
                need: RECORD_HEADER_SIZE,
                have: data.len(),
            });
        }

        let payload_size = u32::from_be_bytes(
            data[0..4]
                .try_into()
                .expect("slice length equals size field after bounds check"),
        );
        let digest = Digest::try_from(&data[4..RECORD_HEADER_SIZE])
            .expect("slice length equals DIGEST_LEN after bounds check");

        Ok(Self {
            payload_size,
            digest,
        })
    }
}

/// Appends one encoded record (`header || payload`) to `buf`.
///
/// # Errors
///
/// Returns [`StorageError::PayloadTooLarge`] if the payload does not fit
/// the header's u32 size field.
pub(crate) fn encode_record_into(
    buf: &mut Vec<u8>,
    digest: Digest,
    payload: &Bytes,
) -> Result<u32, StorageError> {
    let payload_size =
        u32::try_from(payload.len()).map_err(|_| StorageError::PayloadTooLarge {
            size: payload.len(),
        })?;

    let header = RecordHeader::new(payload_size, digest);
    buf.extend_from_slice(&header.to_bytes());
    buf.extend_from_slice(payload);

    Ok(header.total_size())
}
