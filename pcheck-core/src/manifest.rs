use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Expected or computed digest of one piece. Opaque bytes, compared exactly.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest(Vec<u8>);

impl Digest {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Digest(bytes.into())
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        hex::decode(s).map(Digest)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl TryFrom<String> for Digest {
    type Error = hex::FromHexError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Digest::from_hex(&s)
    }
}

impl From<Digest> for String {
    fn from(d: Digest) -> String {
        d.to_hex()
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

/// Hash function the piece digests were produced with.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgo {
    #[default]
    Sha1,
    Blake3,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct FileEntry {
    /// Path components relative to the data root.
    pub path: Vec<String>,
    pub length: u64,
}

impl FileEntry {
    pub fn new<I, S>(path: I, length: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { path: path.into_iter().map(Into::into).collect(), length }
    }

    pub fn rel_path(&self) -> PathBuf {
        self.path.iter().collect()
    }

    /// Components joined with `/`, the form glob patterns match against.
    pub fn display_path(&self) -> String {
        self.path.join("/")
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Manifest {
    /// Root directory name under the data directory; empty for single-file torrents.
    #[serde(default)]
    pub name: String,
    pub piece_length: u64,
    #[serde(default)]
    pub hash: HashAlgo,
    #[serde(rename = "pieces")]
    pub piece_digests: Vec<Digest>,
    pub files: Vec<FileEntry>,
}

impl Manifest {
    /// Sum of the declared file lengths, saturating at `u64::MAX`.
    pub fn total_length(&self) -> u64 {
        self.files.iter().fold(0u64, |acc, f| acc.saturating_add(f.length))
    }

    /// Reject manifests whose declared sizes cannot describe real data.
    pub fn validate(&self) -> Result<()> {
        if self.piece_length == 0 {
            bail!("piece length is zero");
        }
        self.files
            .iter()
            .try_fold(0u64, |acc, f| acc.checked_add(f.length))
            .ok_or_else(|| anyhow!("total file length overflows"))?;
        Ok(())
    }

    pub fn piece_count(&self) -> usize {
        self.piece_digests.len()
    }

    /// Directory the file paths are relative to.
    pub fn data_root(&self, target: &Path) -> PathBuf {
        if self.name.is_empty() {
            target.to_path_buf()
        } else {
            target.join(&self.name)
        }
    }

    /// Load a manifest, picking the decoder from the file extension:
    /// `.json` is the serde form, anything else is treated as torrent metainfo.
    pub fn load(path: &Path) -> Result<Manifest> {
        let bytes = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
        let is_json = path.extension().map(|e| e.eq_ignore_ascii_case("json")).unwrap_or(false);
        if is_json {
            Manifest::from_json_slice(&bytes).with_context(|| format!("parse {}", path.display()))
        } else {
            crate::torrent::from_bytes(&bytes).with_context(|| format!("parse {}", path.display()))
        }
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Manifest> {
        let m: Manifest = serde_json::from_slice(bytes).context("decode JSON manifest")?;
        m.validate()?;
        Ok(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_manifest_decodes_hex_digests() {
        let src = r#"{
            "name": "set",
            "piece_length": 4,
            "pieces": ["81fe8bfe87576c3ecb22426f8e57847382917acf"],
            "files": [{"path": ["a.bin"], "length": 4}]
        }"#;
        let m = Manifest::from_json_slice(src.as_bytes()).unwrap();
        assert_eq!(m.hash, HashAlgo::Sha1);
        assert_eq!(m.piece_digests[0].as_bytes().len(), 20);
        assert_eq!(m.files[0].display_path(), "a.bin");
        assert_eq!(m.data_root(Path::new("/data")), Path::new("/data/set"));
    }

    #[test]
    fn oversized_lengths_are_rejected() {
        let src = format!(
            r#"{{"piece_length": 4, "pieces": [], "files": [
                {{"path": ["a"], "length": {max}}}, {{"path": ["b"], "length": {max}}}]}}"#,
            max = u64::MAX / 2 + 1
        );
        let err = Manifest::from_json_slice(src.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("overflows"), "{err:#}");

        let m = Manifest {
            name: String::new(),
            piece_length: 4,
            hash: HashAlgo::Sha1,
            piece_digests: vec![],
            files: vec![FileEntry::new(["a"], u64::MAX), FileEntry::new(["b"], 1)],
        };
        assert_eq!(m.total_length(), u64::MAX);
    }

    #[test]
    fn json_manifest_rejects_bad_hex() {
        let src = r#"{"piece_length": 4, "pieces": ["zz"], "files": []}"#;
        assert!(Manifest::from_json_slice(src.as_bytes()).is_err());
    }
}
