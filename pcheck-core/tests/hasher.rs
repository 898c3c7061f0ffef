mod common;

use pcheck_core::hasher::{digest_bytes, hash_piece, HashContext};
use pcheck_core::manifest::{Digest, FileEntry, HashAlgo};
use pcheck_core::segment::{PieceTask, Segment, Segmenter};
use pcheck_core::VerifyError;
use sha1::{Digest as _, Sha1};
use std::fs;

fn task(segments: Vec<Segment>) -> PieceTask {
    PieceTask { index: 0, expected_digest: Digest::new(vec![0; 20]), segments }
}

#[test]
fn sha1_digest_matches_reference() {
    let mut h = Sha1::new();
    h.update(b"abcd");
    let expected: [u8; 20] = h.finalize().into();
    assert_eq!(digest_bytes(HashAlgo::Sha1, b"abcd").as_bytes(), &expected[..]);
    assert_eq!(digest_bytes(HashAlgo::Sha1, b"abcd").to_hex(), "81fe8bfe87576c3ecb22426f8e57847382917acf");
    assert_eq!(digest_bytes(HashAlgo::Blake3, b"abcd").as_bytes(), blake3::hash(b"abcd").as_bytes());
}

#[test]
fn digest_is_independent_of_file_split() {
    let td = tempfile::tempdir().unwrap();
    let data = common::random_bytes(300_000, 7);
    fs::write(td.path().join("whole.bin"), &data).unwrap();
    fs::write(td.path().join("p1.bin"), &data[..1]).unwrap();
    fs::write(td.path().join("p2.bin"), &data[1..70_000]).unwrap();
    fs::write(td.path().join("p3.bin"), &data[70_000..]).unwrap();

    let ctx = HashContext::new(td.path(), HashAlgo::Sha1, data.len() as u64);
    let whole = task(vec![Segment {
        file: FileEntry::new(["whole.bin"], data.len() as u64),
        start_offset: 0,
        length: data.len() as u64,
    }]);
    let split = task(vec![
        Segment { file: FileEntry::new(["p1.bin"], 1), start_offset: 0, length: 1 },
        Segment { file: FileEntry::new(["p2.bin"], 69_999), start_offset: 0, length: 69_999 },
        Segment {
            file: FileEntry::new(["p3.bin"], 230_000),
            start_offset: 0,
            length: 230_000,
        },
    ]);
    let a = hash_piece(&whole, &ctx).unwrap();
    let b = hash_piece(&split, &ctx).unwrap();
    assert_eq!(a, b);
    assert_eq!(a, digest_bytes(HashAlgo::Sha1, &data));
}

#[test]
fn reads_from_segment_offset() {
    let td = tempfile::tempdir().unwrap();
    fs::write(td.path().join("f.bin"), b"abcdefgh").unwrap();
    let ctx = HashContext::new(td.path(), HashAlgo::Sha1, 4);
    let t = task(vec![Segment { file: FileEntry::new(["f.bin"], 8), start_offset: 4, length: 4 }]);
    assert_eq!(hash_piece(&t, &ctx).unwrap(), digest_bytes(HashAlgo::Sha1, b"efgh"));
    assert_eq!(ctx.progress.snapshot().bytes_done, 4);
}

#[test]
fn short_file_hashes_what_is_there() {
    let td = tempfile::tempdir().unwrap();
    fs::write(td.path().join("a.bin"), b"ab").unwrap();
    fs::write(td.path().join("b.bin"), b"cd").unwrap();
    let ctx = HashContext::new(td.path(), HashAlgo::Sha1, 8);
    // a.bin is declared as 4 bytes but only 2 exist on disk
    let t = task(vec![
        Segment { file: FileEntry::new(["a.bin"], 4), start_offset: 0, length: 4 },
        Segment { file: FileEntry::new(["b.bin"], 2), start_offset: 0, length: 2 },
    ]);
    assert_eq!(hash_piece(&t, &ctx).unwrap(), digest_bytes(HashAlgo::Sha1, b"abcd"));
}

#[test]
fn missing_file_is_an_io_error() {
    let td = tempfile::tempdir().unwrap();
    let ctx = HashContext::new(td.path(), HashAlgo::Sha1, 4);
    let t = task(vec![Segment { file: FileEntry::new(["gone.bin"], 4), start_offset: 0, length: 4 }]);
    match hash_piece(&t, &ctx) {
        Err(VerifyError::Io { path, source }) => {
            assert!(path.ends_with("gone.bin"));
            assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn cancelled_flag_stops_hashing() {
    let td = tempfile::tempdir().unwrap();
    fs::write(td.path().join("f.bin"), vec![1u8; 1024]).unwrap();
    let ctx = HashContext::new(td.path(), HashAlgo::Sha1, 1024);
    ctx.cancel.cancel();
    let t = task(vec![Segment { file: FileEntry::new(["f.bin"], 1024), start_offset: 0, length: 1024 }]);
    assert!(matches!(hash_piece(&t, &ctx), Err(VerifyError::Cancelled)));
    assert_eq!(ctx.progress.snapshot().bytes_done, 0);
}

#[test]
fn oversized_task_fails_before_reading() {
    let td = tempfile::tempdir().unwrap();
    let ctx = HashContext::new(td.path(), HashAlgo::Sha1, 2);
    // files do not exist: the budget check must fire first
    let t = task(vec![
        Segment { file: FileEntry::new(["a"], 2), start_offset: 0, length: 2 },
        Segment { file: FileEntry::new(["b"], 2), start_offset: 0, length: 2 },
    ]);
    assert!(matches!(hash_piece(&t, &ctx), Err(VerifyError::SegmentationInvariant { .. })));
}

#[test]
fn segmenter_tasks_hash_to_manifest_digests() {
    let td = tempfile::tempdir().unwrap();
    let a = common::random_bytes(10_000, 1);
    let b = common::random_bytes(3, 2);
    let c = common::random_bytes(25_001, 3);
    let m = common::write_set(td.path(), "set", 4096, &[("a.bin", &a), ("d/b.bin", &b), ("d/e/c.bin", &c)]);
    let ctx = HashContext::new(m.data_root(td.path()), m.hash, m.piece_length);
    for t in Segmenter::new(&m).unwrap() {
        assert_eq!(hash_piece(&t, &ctx).unwrap(), t.expected_digest, "piece {}", t.index);
    }
}
