//! Unit tests for logcrate-storage

use bytes::Bytes;
use logcrate_types::{Digest, RecordId, SegmentId};

use crate::{
    parse_segment_file_name, segment_file_name, IndexEntry, RecordHeader, RecordIndex,
    SegmentHeader, StorageError, RECORD_HEADER_SIZE, SEGMENT_HEADER_SIZE, SEGMENT_VERSION,
};

fn digest(fill: u8) -> Digest {
    Digest::new([fill; 20])
}

// ============================================================================
// Record Header Codec Tests
// ============================================================================

#[test]
fn record_header_roundtrip() {
    let header = RecordHeader::new(4096, digest(0x5a));
    let bytes = header.to_bytes();

    assert_eq!(bytes.len(), RECORD_HEADER_SIZE);

    let parsed = RecordHeader::from_bytes(&bytes).unwrap();
    assert_eq!(parsed, header);
    assert_eq!(parsed.total_size(), 24 + 4096);
}

#[test]
fn record_header_layout_is_big_endian() {
    let header = RecordHeader::new(5, digest(0xcc));
    let bytes = header.to_bytes();

    // Size field: u32 big-endian.
    assert_eq!(&bytes[0..4], &[0, 0, 0, 5]);
    // Digest occupies the remaining 20 bytes verbatim.
    assert_eq!(&bytes[4..24], &[0xcc; 20]);
}

#[test]
fn record_header_rejects_short_buffer() {
    let result = RecordHeader::from_bytes(&[0u8; 23]);
    assert!(matches!(
        result,
        Err(StorageError::Malformed { need: 24, have: 23 })
    ));
}

// ============================================================================
// Segment Header Codec Tests
// ============================================================================

#[test]
fn segment_header_roundtrip() {
    let path = std::path::Path::new("0000000000000007.dat");
    let header = SegmentHeader::new(SegmentId::new(7));
    let bytes = header.to_bytes();

    assert_eq!(bytes.len(), SEGMENT_HEADER_SIZE);
    assert_eq!(&bytes[0..8], b"logcrate");

    let parsed = SegmentHeader::from_bytes(path, &bytes).unwrap();
    assert_eq!(parsed.segment_id, SegmentId::new(7));
}

#[test]
fn segment_header_rejects_bad_magic() {
    let path = std::path::Path::new("x");
    let mut bytes = SegmentHeader::new(SegmentId::new(0)).to_bytes();
    bytes[0] = b'X';

    let result = SegmentHeader::from_bytes(path, &bytes);
    assert!(matches!(
        result,
        Err(StorageError::CorruptHeader {
            reason: "bad magic bytes",
            ..
        })
    ));
}

#[test]
fn segment_header_rejects_future_version() {
    let path = std::path::Path::new("x");
    let mut bytes = SegmentHeader::new(SegmentId::new(0)).to_bytes();
    bytes[8..12].copy_from_slice(&(SEGMENT_VERSION + 1).to_be_bytes());

    let result = SegmentHeader::from_bytes(path, &bytes);
    assert!(matches!(
        result,
        Err(StorageError::VersionMismatch { expected: 1, found: 2, .. })
    ));
}

#[test]
fn segment_header_rejects_truncation() {
    let path = std::path::Path::new("x");
    let bytes = SegmentHeader::new(SegmentId::new(0)).to_bytes();

    let result = SegmentHeader::from_bytes(path, &bytes[..19]);
    assert!(matches!(
        result,
        Err(StorageError::CorruptHeader {
            reason: "truncated segment header",
            ..
        })
    ));
}

// ============================================================================
// Filename Convention Tests
// ============================================================================

#[test]
fn segment_file_name_is_padded_hex() {
    assert_eq!(segment_file_name(SegmentId::new(0)), "0000000000000000.dat");
    assert_eq!(
        segment_file_name(SegmentId::new(0x4d2)),
        "00000000000004d2.dat"
    );
}

#[test]
fn segment_file_names_sort_in_id_order() {
    let mut names = vec![
        segment_file_name(SegmentId::new(256)),
        segment_file_name(SegmentId::new(1)),
        segment_file_name(SegmentId::new(16)),
    ];
    names.sort();

    assert_eq!(
        names,
        vec![
            "0000000000000001.dat",
            "0000000000000010.dat",
            "0000000000000100.dat",
        ]
    );
}

#[test]
fn parse_segment_file_name_accepts_only_canonical_names() {
    let parse = |name: &str| parse_segment_file_name(std::ffi::OsStr::new(name));

    assert_eq!(parse("0000000000000000.dat"), Some(SegmentId::new(0)));
    assert_eq!(parse("00000000000004d2.dat"), Some(SegmentId::new(1234)));

    assert_eq!(parse("00000000000004D2.dat"), None); // uppercase hex
    assert_eq!(parse("4d2.dat"), None); // unpadded
    assert_eq!(parse("0000000000000000.log"), None); // wrong suffix
    assert_eq!(parse("junk"), None);
}

// ============================================================================
// Record Index Tests
// ============================================================================

fn entry(segment: u64, offset: u64, total_size: u32) -> IndexEntry {
    IndexEntry {
        segment_id: SegmentId::new(segment),
        offset,
        total_size,
        digest: digest(0x11),
    }
}

#[test]
fn index_starts_empty() {
    let index = RecordIndex::new();
    assert!(index.is_empty());
    assert_eq!(index.len(), 0);
    assert_eq!(index.range(), None);
    assert_eq!(index.get(RecordId::ZERO), None);
}

#[test]
fn index_get_and_range() {
    let mut index = RecordIndex::new();
    index.insert(RecordId::new(5), entry(5, 20, 30));
    index.insert(RecordId::new(6), entry(5, 50, 44));

    assert!(!index.is_empty());
    assert_eq!(index.len(), 2);
    assert_eq!(index.range(), Some((RecordId::new(5), RecordId::new(6))));
    assert_eq!(index.get(RecordId::new(6)), Some(entry(5, 50, 44)));
    assert_eq!(index.get(RecordId::new(7)), None);
    assert!(index.contains(RecordId::new(5)));
}

#[test]
fn index_entry_payload_size_excludes_header() {
    assert_eq!(entry(0, 20, 24).payload_size(), 0);
    assert_eq!(entry(0, 20, 31).payload_size(), 7);
}

#[test]
fn index_iterates_in_id_order() {
    let mut index = RecordIndex::new();
    for id in 0..10u64 {
        index.insert(RecordId::new(id), entry(0, 20 + id * 30, 30));
    }

    let ids: Vec<u64> = index.iter().map(|(id, _)| id.as_u64()).collect();
    assert_eq!(ids, (0..10).collect::<Vec<_>>());
}

// ============================================================================
// Writer / Reader / Recovery Integration Tests
// ============================================================================

mod integration {
    use super::*;
    use crate::{read_record, read_segment, recover, SegmentWriter};
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, std::path::PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();
        (dir, path)
    }

    fn batch(payloads: &[&str]) -> Vec<(Digest, Bytes)> {
        payloads
            .iter()
            .enumerate()
            .map(|(i, p)| (digest(i as u8 + 1), Bytes::copy_from_slice(p.as_bytes())))
            .collect()
    }

    fn segment_files(dir: &std::path::Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn first_append_rolls_segment_zero() {
        let (_guard, dir) = setup();
        let mut writer = SegmentWriter::create(&dir, 1024);

        let commit = writer.append_batch(&batch(&["hello"])).unwrap();

        assert_eq!(commit.rolled, Some(SegmentId::new(0)));
        assert_eq!(commit.segment_id, SegmentId::new(0));
        assert_eq!(commit.first_id, RecordId::ZERO);
        assert_eq!(commit.offsets, vec![SEGMENT_HEADER_SIZE as u64]);
        assert_eq!(commit.total_sizes, vec![24 + 5]);
        assert_eq!(segment_files(&dir), vec!["0000000000000000.dat"]);
    }

    #[test]
    fn batch_offsets_accumulate_from_cursor() {
        let (_guard, dir) = setup();
        let mut writer = SegmentWriter::create(&dir, 1024);

        let commit = writer.append_batch(&batch(&["aa", "bbbb", "c"])).unwrap();
        assert_eq!(commit.offsets, vec![20, 20 + 26, 20 + 26 + 28]);

        // A second batch continues where the first ended.
        let commit = writer.append_batch(&batch(&["dd"])).unwrap();
        assert_eq!(commit.rolled, None);
        assert_eq!(commit.first_id, RecordId::new(3));
        assert_eq!(commit.offsets, vec![20 + 26 + 28 + 25]);
    }

    #[test]
    fn oversize_batch_is_written_whole_into_fresh_segment() {
        let (_guard, dir) = setup();
        // Cap smaller than even the segment header.
        let mut writer = SegmentWriter::create(&dir, 8);

        let commit = writer.append_batch(&batch(&["0123456"])).unwrap();
        assert_eq!(commit.segment_id, SegmentId::new(0));
        assert_eq!(segment_files(&dir).len(), 1);

        let commit = writer
            .append_batch(&batch(&["lots and lots more data to push us over"]))
            .unwrap();
        assert_eq!(commit.rolled, Some(SegmentId::new(1)));
        assert_eq!(commit.segment_id, SegmentId::new(1));
        assert_eq!(segment_files(&dir).len(), 2);
    }

    #[test]
    fn segment_is_never_split_mid_batch() {
        let (_guard, dir) = setup();
        let mut writer = SegmentWriter::create(&dir, 200);

        // Two records of 74 bytes each fit (20 + 148 < 200)…
        writer.append_batch(&batch(&["x".repeat(50).as_str()])).unwrap();
        writer.append_batch(&batch(&["y".repeat(50).as_str()])).unwrap();
        assert_eq!(segment_files(&dir).len(), 1);

        // …but a two-record batch that would cross the cap rolls whole.
        let commit = writer
            .append_batch(&batch(&["z".repeat(50).as_str(), "w".repeat(50).as_str()]))
            .unwrap();
        assert_eq!(commit.rolled, Some(SegmentId::new(2)));
        assert_eq!(segment_files(&dir).len(), 2);
        assert_eq!(commit.offsets, vec![20, 20 + 74]);
    }

    #[test]
    fn read_record_roundtrips_committed_batches() {
        let (_guard, dir) = setup();
        let mut writer = SegmentWriter::create(&dir, 64);

        let payloads = ["first", "second record", "third"];
        let records = batch(&payloads);

        let mut index = RecordIndex::new();
        for (i, record) in records.iter().enumerate() {
            let commit = writer.append_batch(std::slice::from_ref(record)).unwrap();
            index.insert(
                commit.first_id,
                IndexEntry {
                    segment_id: commit.segment_id,
                    offset: commit.offsets[0],
                    total_size: commit.total_sizes[0],
                    digest: commit.digests[0],
                },
            );
            assert_eq!(commit.first_id, RecordId::new(i as u64));
        }
        writer.close().unwrap();

        for (i, (expected_digest, expected_payload)) in records.iter().enumerate() {
            let entry = index.get(RecordId::new(i as u64)).unwrap();
            let (d, p) = read_record(&dir, &entry).unwrap();
            assert_eq!(&d, expected_digest);
            assert_eq!(&p, expected_payload);
        }
    }

    #[test]
    fn read_segment_returns_entries_in_given_order() {
        let (_guard, dir) = setup();
        let mut writer = SegmentWriter::create(&dir, 4096);

        let records = batch(&["alpha", "beta", "gamma"]);
        let commit = writer.append_batch(&records).unwrap();
        writer.close().unwrap();

        let entries: Vec<IndexEntry> = (0..3)
            .map(|i| IndexEntry {
                segment_id: commit.segment_id,
                offset: commit.offsets[i],
                total_size: commit.total_sizes[i],
                digest: commit.digests[i],
            })
            .collect();

        let results = read_segment(&dir, commit.segment_id, &entries).unwrap();
        assert_eq!(results.len(), 3);
        for (result, original) in results.iter().zip(&records) {
            assert_eq!(result, original);
        }
    }

    #[test]
    fn read_detects_digest_tampering() {
        let (_guard, dir) = setup();
        let mut writer = SegmentWriter::create(&dir, 4096);

        let commit = writer.append_batch(&batch(&["payload"])).unwrap();
        writer.close().unwrap();

        let entry = IndexEntry {
            segment_id: commit.segment_id,
            offset: commit.offsets[0],
            total_size: commit.total_sizes[0],
            digest: commit.digests[0],
        };

        // Flip one digest byte inside the stored record header.
        let path = crate::segment_path(&dir, commit.segment_id);
        let mut data = fs::read(&path).unwrap();
        let digest_pos = commit.offsets[0] as usize + 4;
        data[digest_pos] ^= 0xff;
        fs::write(&path, data).unwrap();

        let result = read_record(&dir, &entry);
        assert!(matches!(
            result,
            Err(StorageError::CorruptRecord {
                reason: "stored digest disagrees with index",
                ..
            })
        ));
    }

    #[test]
    fn recover_rebuilds_index_across_segments() {
        let (_guard, dir) = setup();
        let mut writer = SegmentWriter::create(&dir, 90);

        writer.append_batch(&batch(&["0123456"])).unwrap();
        writer.append_batch(&batch(&["789abcd"])).unwrap();
        writer.append_batch(&batch(&["something much larger"])).unwrap();
        writer.close().unwrap();

        assert_eq!(segment_files(&dir).len(), 2);

        let recovered = recover(&dir).unwrap().unwrap();
        assert_eq!(recovered.index.len(), 3);
        assert_eq!(
            recovered.index.range(),
            Some((RecordId::ZERO, RecordId::new(2)))
        );
        assert_eq!(recovered.tail.segment_id, SegmentId::new(2));
        assert_eq!(recovered.tail.next_id, RecordId::new(3));

        // Every recovered entry reads back its original payload.
        let (d, p) = read_record(&dir, &recovered.index.get(RecordId::new(2)).unwrap()).unwrap();
        assert_eq!(d, digest(1));
        assert_eq!(p, Bytes::from("something much larger"));
    }

    #[test]
    fn recover_of_empty_directory_yields_none() {
        let (_guard, dir) = setup();
        assert!(recover(&dir).unwrap().is_none());
    }

    #[test]
    fn recover_rejects_foreign_files() {
        let (_guard, dir) = setup();
        let mut writer = SegmentWriter::create(&dir, 4096);
        writer.append_batch(&batch(&["data"])).unwrap();
        writer.close().unwrap();

        fs::write(dir.join("notes.txt"), b"not a segment").unwrap();

        let result = recover(&dir);
        assert!(matches!(
            result,
            Err(StorageError::CorruptHeader {
                reason: "not a segment file",
                ..
            })
        ));
    }

    #[test]
    fn recover_rejects_mismatched_header_id() {
        let (_guard, dir) = setup();
        let mut writer = SegmentWriter::create(&dir, 4096);
        writer.append_batch(&batch(&["data"])).unwrap();
        writer.close().unwrap();

        // Rename the segment so the filename no longer matches its header.
        fs::rename(
            dir.join("0000000000000000.dat"),
            dir.join("0000000000000005.dat"),
        )
        .unwrap();

        let result = recover(&dir);
        assert!(matches!(
            result,
            Err(StorageError::CorruptHeader {
                reason: "segment id disagrees with filename",
                ..
            })
        ));
    }

    #[test]
    fn recover_trims_torn_tail_and_resumes() {
        let (_guard, dir) = setup();
        let mut writer = SegmentWriter::create(&dir, 4096);

        writer.append_batch(&batch(&["intact one", "intact two"])).unwrap();
        writer.close().unwrap();

        // Simulate a crash mid-append: valid records followed by a torn
        // header fragment.
        let path = crate::segment_path(&dir, SegmentId::new(0));
        let valid_len = fs::metadata(&path).unwrap().len();
        let mut data = fs::read(&path).unwrap();
        data.extend_from_slice(&[0xde, 0xad, 0xbe]);
        fs::write(&path, data).unwrap();

        let recovered = recover(&dir).unwrap().unwrap();
        assert_eq!(recovered.index.len(), 2);
        assert_eq!(recovered.tail.cursor, valid_len);
        assert_eq!(fs::metadata(&path).unwrap().len(), valid_len);

        // The writer resumes cleanly and appends are readable.
        let mut writer = SegmentWriter::resume(&dir, 4096, &recovered.tail).unwrap();
        assert_eq!(writer.next_id(), RecordId::new(2));

        let commit = writer.append_batch(&batch(&["after recovery"])).unwrap();
        assert_eq!(commit.first_id, RecordId::new(2));
        writer.close().unwrap();

        let entry = IndexEntry {
            segment_id: commit.segment_id,
            offset: commit.offsets[0],
            total_size: commit.total_sizes[0],
            digest: commit.digests[0],
        };
        let (_, p) = read_record(&dir, &entry).unwrap();
        assert_eq!(p, Bytes::from("after recovery"));
    }

    #[test]
    fn recover_trims_tail_torn_mid_payload() {
        let (_guard, dir) = setup();
        let mut writer = SegmentWriter::create(&dir, 4096);

        writer.append_batch(&batch(&["kept"])).unwrap();
        writer.close().unwrap();

        // A full header claiming 100 payload bytes, but only 10 present.
        let path = crate::segment_path(&dir, SegmentId::new(0));
        let valid_len = fs::metadata(&path).unwrap().len();
        let mut data = fs::read(&path).unwrap();
        data.extend_from_slice(&RecordHeader::new(100, digest(9)).to_bytes());
        data.extend_from_slice(&[0u8; 10]);
        fs::write(&path, data).unwrap();

        let recovered = recover(&dir).unwrap().unwrap();
        assert_eq!(recovered.index.len(), 1);
        assert_eq!(recovered.tail.cursor, valid_len);
        assert_eq!(fs::metadata(&path).unwrap().len(), valid_len);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn record_header_roundtrip_any_fields(
            size in any::<u32>(),
            digest_bytes in prop::array::uniform20(any::<u8>()),
        ) {
            let header = RecordHeader::new(size, Digest::new(digest_bytes));
            let parsed = RecordHeader::from_bytes(&header.to_bytes()).unwrap();
            prop_assert_eq!(parsed, header);
        }

        #[test]
        fn segment_file_name_roundtrip_any_id(id in any::<u64>()) {
            let name = segment_file_name(SegmentId::new(id));
            let parsed = parse_segment_file_name(std::ffi::OsStr::new(&name));
            prop_assert_eq!(parsed, Some(SegmentId::new(id)));
        }

        #[test]
        fn segment_header_roundtrip_any_id(id in any::<u64>()) {
            let path = std::path::Path::new("x");
            let header = SegmentHeader::new(SegmentId::new(id));
            let parsed = SegmentHeader::from_bytes(path, &header.to_bytes()).unwrap();
            prop_assert_eq!(parsed.segment_id, SegmentId::new(id));
        }
    }
}
