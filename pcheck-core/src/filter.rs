use crate::error::{Result, VerifyError};
use crate::segment::PieceTask;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

/// Pattern used when the caller supplies none.
pub const MATCH_ALL: &str = "**";

/// Decides which pieces are verified: a piece is admitted when any of its
/// files matches any pattern. Patterns match the `/`-joined relative path;
/// `*` stays inside one component, `**` spans directories.
#[derive(Clone, Debug)]
pub struct PathFilter {
    set: GlobSet,
    match_all: bool,
}

impl PathFilter {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut b = GlobSetBuilder::new();
        let mut match_all = patterns.is_empty();
        for p in patterns {
            let p = p.as_ref();
            match_all |= p == MATCH_ALL;
            b.add(glob(p)?);
        }
        let set = b.build().map_err(|source| VerifyError::Pattern { pattern: joined(patterns), source })?;
        Ok(Self { set, match_all })
    }

    pub fn is_match(&self, rel_path: &str) -> bool {
        self.match_all || self.set.is_match(rel_path)
    }

    pub fn admits(&self, task: &PieceTask) -> bool {
        self.match_all || task.files().any(|f| self.is_match(&f.display_path()))
    }
}

impl Default for PathFilter {
    fn default() -> Self {
        Self { set: GlobSet::empty(), match_all: true }
    }
}

fn glob(pattern: &str) -> Result<globset::Glob> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|source| VerifyError::Pattern { pattern: pattern.to_string(), source })
}

fn joined<S: AsRef<str>>(patterns: &[S]) -> String {
    patterns.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(" ")
}
