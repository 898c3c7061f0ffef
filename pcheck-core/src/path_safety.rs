use crate::error::{Result, VerifyError};
use std::path::{Component, Path, PathBuf};

#[derive(Clone, Copy, Debug, Default)]
pub struct PathPolicy {
    pub follow_symlinks: bool,
}

/// Manifest paths are untrusted. Each component must be a single normal
/// path element: not empty, no `.`/`..`, no separators, no root or drive prefix.
pub fn check_components(components: &[String]) -> Result<()> {
    let joined: PathBuf = components.iter().collect();
    if components.is_empty() {
        return Err(VerifyError::UnsafePath { path: joined, reason: "empty path" });
    }
    for c in components {
        let mut parts = Path::new(c).components();
        let ok = matches!((parts.next(), parts.next()), (Some(Component::Normal(n)), None) if n == c.as_str());
        if !ok {
            let reason = if c == ".." {
                "parent traversal not allowed"
            } else if Path::new(c).is_absolute() || c.starts_with('/') || c.starts_with('\\') {
                "absolute paths are not allowed"
            } else {
                "component is not a plain file name"
            };
            return Err(VerifyError::UnsafePath { path: joined, reason });
        }
    }
    Ok(())
}

/// Resolve `rel` under `root` for reading.
///
/// Without `follow_symlinks`, a symlink at the file or at any ancestor below
/// `root` is rejected. With it, the canonical target must stay under `root`.
/// A path that does not exist resolves to the plain join so the open reports
/// the real I/O error.
pub fn resolve(root: &Path, rel: &Path, policy: PathPolicy) -> Result<PathBuf> {
    let candidate = root.join(rel);
    if !policy.follow_symlinks {
        let mut cur = root.to_path_buf();
        for comp in rel.components() {
            cur.push(comp);
            if let Ok(m) = std::fs::symlink_metadata(&cur) {
                if m.file_type().is_symlink() {
                    return Err(VerifyError::UnsafePath {
                        path: cur,
                        reason: "symlink encountered (not following)",
                    });
                }
            }
        }
        return Ok(candidate);
    }
    let cand_can = match std::fs::canonicalize(&candidate) {
        Ok(p) => p,
        Err(_) => return Ok(candidate),
    };
    let root_can = std::fs::canonicalize(root).map_err(|e| VerifyError::io(root, e))?;
    if !cand_can.starts_with(&root_can) {
        return Err(VerifyError::UnsafePath { path: rel.to_path_buf(), reason: "path escapes root" });
    }
    Ok(cand_can)
}
