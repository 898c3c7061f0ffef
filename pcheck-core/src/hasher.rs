//! Cross-file piece hashing.
//!
//! A piece's digest is one hash over the concatenation of its segments, so
//! the accumulator is carried from file to file.

use crate::error::{Result, VerifyError};
use crate::manifest::{Digest, HashAlgo};
use crate::path_safety::{resolve, PathPolicy};
use crate::progress::{CancelFlag, Progress};
use crate::segment::PieceTask;
use sha1::Digest as _;
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::PathBuf;

/// Bytes read per call; cancellation is checked between reads.
pub const READ_CHUNK: usize = 64 * 1024;

pub enum PieceHasher {
    Sha1(sha1::Sha1),
    Blake3(Box<blake3::Hasher>),
}

impl PieceHasher {
    pub fn new(algo: HashAlgo) -> Self {
        match algo {
            HashAlgo::Sha1 => PieceHasher::Sha1(sha1::Sha1::new()),
            HashAlgo::Blake3 => PieceHasher::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            PieceHasher::Sha1(h) => h.update(data),
            PieceHasher::Blake3(h) => {
                h.update(data);
            }
        }
    }

    pub fn finalize(self) -> Digest {
        match self {
            PieceHasher::Sha1(h) => Digest::new(h.finalize().to_vec()),
            PieceHasher::Blake3(h) => Digest::new(h.finalize().as_bytes().to_vec()),
        }
    }
}

/// Digest of an in-memory buffer.
pub fn digest_bytes(algo: HashAlgo, data: &[u8]) -> Digest {
    let mut h = PieceHasher::new(algo);
    h.update(data);
    h.finalize()
}

/// Everything a worker needs besides the task itself.
#[derive(Clone, Debug)]
pub struct HashContext {
    pub root: PathBuf,
    pub algo: HashAlgo,
    pub piece_length: u64,
    pub policy: PathPolicy,
    pub cancel: CancelFlag,
    pub progress: Progress,
}

impl HashContext {
    pub fn new(root: impl Into<PathBuf>, algo: HashAlgo, piece_length: u64) -> Self {
        Self {
            root: root.into(),
            algo,
            piece_length,
            policy: PathPolicy::default(),
            cancel: CancelFlag::new(),
            progress: Progress::new(),
        }
    }
}

/// Hash the bytes of `task` as read from disk.
///
/// A file shorter than its segment ends that segment early without error;
/// the resulting digest simply will not match. Missing or unreadable files
/// are errors. Returns `Cancelled` as soon as the flag is observed.
pub fn hash_piece(task: &PieceTask, ctx: &HashContext) -> Result<Digest> {
    hash_piece_counted(task, ctx).map(|(digest, _)| digest)
}

/// [`hash_piece`], also returning how many bytes were actually read.
pub fn hash_piece_counted(task: &PieceTask, ctx: &HashContext) -> Result<(Digest, u64)> {
    task.check(ctx.piece_length)?;
    let mut read = 0u64;
    let mut hasher = PieceHasher::new(ctx.algo);
    let mut buf = vec![0u8; task.len().min(READ_CHUNK as u64) as usize];
    for seg in &task.segments {
        let path = resolve(&ctx.root, &seg.file.rel_path(), ctx.policy)?;
        let mut f = File::open(&path).map_err(|e| VerifyError::io(&path, e))?;
        if seg.start_offset > 0 {
            f.seek(SeekFrom::Start(seg.start_offset)).map_err(|e| VerifyError::io(&path, e))?;
        }
        let mut remaining = seg.length;
        while remaining > 0 {
            if ctx.cancel.is_cancelled() {
                return Err(VerifyError::Cancelled);
            }
            let want = remaining.min(buf.len() as u64) as usize;
            let n = match f.read(&mut buf[..want]) {
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(VerifyError::io(&path, e)),
            };
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            remaining -= n as u64;
            read += n as u64;
            ctx.progress.add_bytes(n as u64);
        }
    }
    Ok((hasher.finalize(), read))
}
