//! Piece segmentation: which byte ranges of which files make up each piece.
//!
//! Files are laid end to end in manifest order and cut into `piece_length`
//! blocks. A [`Cursor`] carries the position reached by one piece into the
//! next, so a piece can start in the middle of a file.

use crate::error::{Result, VerifyError};
use crate::manifest::{Digest, FileEntry, Manifest};

/// Contiguous byte range of one file that belongs to one piece.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    pub file: FileEntry,
    pub start_offset: u64,
    pub length: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PieceTask {
    pub index: u64,
    pub expected_digest: Digest,
    pub segments: Vec<Segment>,
}

impl PieceTask {
    /// Bytes covered by the segments.
    pub fn len(&self) -> u64 {
        self.segments.iter().map(|s| s.length).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Offset of the piece within its first file.
    pub fn offset(&self) -> u64 {
        self.segments.first().map(|s| s.start_offset).unwrap_or(0)
    }

    pub fn files(&self) -> impl Iterator<Item = &FileEntry> + '_ {
        self.segments.iter().map(|s| &s.file)
    }

    /// Verify the segment list fits in `piece_length` bytes: every segment
    /// non-empty and inside its file, and no segment left over once the
    /// budget is spent.
    pub fn check(&self, piece_length: u64) -> Result<()> {
        let violation =
            |detail: String| VerifyError::SegmentationInvariant { index: self.index, detail };
        let mut budget = piece_length;
        for seg in &self.segments {
            let path = seg.file.display_path();
            if budget == 0 {
                return Err(violation(format!(
                    "too many files for piece length {}: {:?} left over",
                    piece_length, path
                )));
            }
            if seg.length == 0 {
                return Err(violation(format!("zero-length segment in {:?}", path)));
            }
            match seg.start_offset.checked_add(seg.length) {
                Some(end) if end <= seg.file.length => {}
                _ => {
                    return Err(violation(format!(
                        "segment {}+{} overruns {:?} ({} bytes)",
                        seg.start_offset, seg.length, path, seg.file.length
                    )))
                }
            }
            if seg.length > budget {
                return Err(violation(format!(
                    "segments exceed piece length {} at {:?}",
                    piece_length, path
                )));
            }
            budget -= seg.length;
        }
        Ok(())
    }
}

/// Position in the virtual byte stream: a file and an offset inside it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cursor {
    pub file_index: usize,
    pub offset: u64,
}

/// Compute the segments of one piece starting at `cursor`.
///
/// Returns the segments and the cursor for the following piece. Stops early
/// when the file list runs out, which is how the short last piece ends.
/// Zero-length files are stepped over without producing a segment.
pub fn step(files: &[FileEntry], piece_length: u64, cursor: Cursor) -> (Vec<Segment>, Cursor) {
    let mut segments = Vec::new();
    let mut cur = cursor;
    let mut covered = 0u64;
    while covered < piece_length {
        let Some(file) = files.get(cur.file_index) else {
            break;
        };
        let take = (piece_length - covered).min(file.length.saturating_sub(cur.offset));
        if take > 0 {
            segments.push(Segment { file: file.clone(), start_offset: cur.offset, length: take });
            covered += take;
            cur.offset += take;
        }
        if cur.offset >= file.length {
            cur = Cursor { file_index: cur.file_index + 1, offset: 0 };
        }
    }
    (segments, cur)
}

/// Lazy sequence of [`PieceTask`]s, one per digest, in index order.
#[derive(Clone, Debug)]
pub struct Segmenter<'a> {
    manifest: &'a Manifest,
    next_index: usize,
    cursor: Cursor,
}

impl<'a> Segmenter<'a> {
    pub fn new(manifest: &'a Manifest) -> Result<Self> {
        if manifest.piece_length == 0 {
            return Err(VerifyError::InvalidManifest("piece length is zero".into()));
        }
        Ok(Self { manifest, next_index: 0, cursor: Cursor::default() })
    }

    /// Rewind to the first piece.
    pub fn reset(&mut self) {
        self.next_index = 0;
        self.cursor = Cursor::default();
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }
}

impl Iterator for Segmenter<'_> {
    type Item = PieceTask;

    fn next(&mut self) -> Option<PieceTask> {
        let expected_digest = self.manifest.piece_digests.get(self.next_index)?.clone();
        let (segments, cursor) = step(&self.manifest.files, self.manifest.piece_length, self.cursor);
        let task = PieceTask { index: self.next_index as u64, expected_digest, segments };
        self.cursor = cursor;
        self.next_index += 1;
        Some(task)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.manifest.piece_digests.len().saturating_sub(self.next_index);
        (left, Some(left))
    }
}

impl ExactSizeIterator for Segmenter<'_> {}
