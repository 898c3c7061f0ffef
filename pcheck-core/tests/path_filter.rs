use pcheck_core::filter::PathFilter;
use pcheck_core::manifest::{Digest, FileEntry};
use pcheck_core::segment::{PieceTask, Segment};

fn piece(paths: &[&str]) -> PieceTask {
    PieceTask {
        index: 0,
        expected_digest: Digest::new(vec![0; 20]),
        segments: paths
            .iter()
            .map(|p| Segment { file: FileEntry::new(p.split('/'), 1), start_offset: 0, length: 1 })
            .collect(),
    }
}

#[test]
fn no_patterns_admits_everything() {
    let f = PathFilter::new::<&str>(&[]).unwrap();
    assert!(f.admits(&piece(&["a/b/c.bin"])));
    assert!(f.admits(&piece(&[])));
    assert!(PathFilter::default().admits(&piece(&["x"])));
}

#[test]
fn any_file_of_the_piece_is_enough() {
    let f = PathFilter::new(&["**/*.mkv"]).unwrap();
    assert!(f.admits(&piece(&["extras/notes.txt", "movie/part1.mkv"])));
    assert!(!f.admits(&piece(&["extras/notes.txt", "extras/cover.jpg"])));
}

#[test]
fn star_stays_within_one_component() {
    let f = PathFilter::new(&["*.txt"]).unwrap();
    assert!(f.is_match("readme.txt"));
    assert!(!f.is_match("docs/readme.txt"));

    let deep = PathFilter::new(&["docs/**"]).unwrap();
    assert!(deep.is_match("docs/a/b/c.txt"));
    assert!(!deep.is_match("src/docs.txt"));
}

#[test]
fn any_pattern_of_the_set_is_enough() {
    let f = PathFilter::new(&["a/*", "b/**/*.iso"]).unwrap();
    assert!(f.admits(&piece(&["b/x/y/disk.iso"])));
    assert!(f.admits(&piece(&["a/file"])));
    assert!(!f.admits(&piece(&["a/sub/file"])));
}

#[test]
fn bad_pattern_is_an_error() {
    assert!(PathFilter::new(&["{unclosed"]).is_err());
}
