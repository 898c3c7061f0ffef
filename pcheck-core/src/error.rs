use std::path::PathBuf;
use thiserror::Error;

/// Fatal conditions that end a verification run.
///
/// Digest mismatches are not errors; they are reported as outcomes.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("unsafe path in manifest: {path:?} ({reason})")]
    UnsafePath { path: PathBuf, reason: &'static str },

    #[error("invalid glob pattern {pattern:?}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("cannot start worker pool")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    /// The segment list of a piece does not fit its byte budget.
    #[error("piece {index}: segmentation invariant violated: {detail}")]
    SegmentationInvariant { index: u64, detail: String },

    #[error("read {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("verification cancelled")]
    Cancelled,
}

impl VerifyError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        VerifyError::Io { path: path.into(), source }
    }

    /// True for errors raised by a worker because another worker failed first.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, VerifyError::Cancelled)
    }
}

pub type Result<T, E = VerifyError> = std::result::Result<T, E>;
