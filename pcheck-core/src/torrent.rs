//! BitTorrent v1 metainfo (`.torrent`) decoding into a [`Manifest`].
//!
//! Only the `info` dictionary is read. Trackers, creation data and any
//! unknown keys are ignored; the info hash is not computed.

use crate::manifest::{Digest, FileEntry, HashAlgo, Manifest};
use anyhow::{anyhow, bail, Context, Result};
use std::collections::BTreeMap;

/// Width of one SHA-1 piece digest inside the `pieces` string.
const SHA1_LEN: usize = 20;
/// Nesting guard for hostile input.
const MAX_DEPTH: usize = 64;

#[derive(Debug, PartialEq)]
pub enum Value<'a> {
    Int(i64),
    Bytes(&'a [u8]),
    List(Vec<Value<'a>>),
    Dict(BTreeMap<&'a [u8], Value<'a>>),
}

impl<'a> Value<'a> {
    fn as_dict(&self) -> Option<&BTreeMap<&'a [u8], Value<'a>>> {
        match self {
            Value::Dict(d) => Some(d),
            _ => None,
        }
    }

    fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    fn as_bytes(&self) -> Option<&'a [u8]> {
        match self {
            Value::Bytes(b) => Some(*b),
            _ => None,
        }
    }

    fn as_list(&self) -> Option<&[Value<'a>]> {
        match self {
            Value::List(l) => Some(l.as_slice()),
            _ => None,
        }
    }
}

/// Decode one complete bencoded value; trailing bytes are an error.
pub fn decode(data: &[u8]) -> Result<Value<'_>> {
    let mut p = Parser { data, pos: 0 };
    let v = p.value(0)?;
    if p.pos != data.len() {
        bail!("trailing data at offset {}", p.pos);
    }
    Ok(v)
}

struct Parser<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Result<u8> {
        self.data.get(self.pos).copied().ok_or_else(|| anyhow!("unexpected end of input"))
    }

    fn value(&mut self, depth: usize) -> Result<Value<'a>> {
        if depth > MAX_DEPTH {
            bail!("nesting deeper than {}", MAX_DEPTH);
        }
        match self.peek()? {
            b'i' => {
                self.pos += 1;
                let n = self.number(b'e')?;
                Ok(Value::Int(n))
            }
            b'l' => {
                self.pos += 1;
                let mut items = Vec::new();
                while self.peek()? != b'e' {
                    items.push(self.value(depth + 1)?);
                }
                self.pos += 1;
                Ok(Value::List(items))
            }
            b'd' => {
                self.pos += 1;
                let mut map = BTreeMap::new();
                while self.peek()? != b'e' {
                    let key = self.bytes()?;
                    let val = self.value(depth + 1)?;
                    map.insert(key, val);
                }
                self.pos += 1;
                Ok(Value::Dict(map))
            }
            b'0'..=b'9' => Ok(Value::Bytes(self.bytes()?)),
            c => bail!("unexpected byte {:#04x} at offset {}", c, self.pos),
        }
    }

    fn number(&mut self, end: u8) -> Result<i64> {
        let start = self.pos;
        let rel = self.data[start..]
            .iter()
            .position(|&b| b == end)
            .ok_or_else(|| anyhow!("unterminated number at offset {}", start))?;
        let digits = std::str::from_utf8(&self.data[start..start + rel])?;
        let n: i64 = digits.parse().with_context(|| format!("bad number {:?}", digits))?;
        self.pos = start + rel + 1;
        Ok(n)
    }

    fn bytes(&mut self) -> Result<&'a [u8]> {
        if !self.peek()?.is_ascii_digit() {
            bail!("expected string length at offset {}", self.pos);
        }
        let len = self.number(b':')?;
        let len = usize::try_from(len).map_err(|_| anyhow!("negative string length"))?;
        let end = self.pos.checked_add(len).filter(|&e| e <= self.data.len());
        let Some(end) = end else {
            bail!("string of {} bytes overruns input", len);
        };
        let s = &self.data[self.pos..end];
        self.pos = end;
        Ok(s)
    }
}

fn text(info: &BTreeMap<&[u8], Value<'_>>, key: &str) -> Result<Option<String>> {
    let utf8_key = format!("{key}.utf-8");
    let raw = info.get(utf8_key.as_bytes()).or_else(|| info.get(key.as_bytes()));
    match raw {
        None => Ok(None),
        Some(v) => {
            let b = v.as_bytes().ok_or_else(|| anyhow!("{key} is not a string"))?;
            Ok(Some(String::from_utf8(b.to_vec()).with_context(|| format!("{key} is not UTF-8"))?))
        }
    }
}

fn length(v: Option<&Value<'_>>) -> Result<u64> {
    let n = v.and_then(Value::as_int).ok_or_else(|| anyhow!("missing integer length"))?;
    u64::try_from(n).map_err(|_| anyhow!("negative length {}", n))
}

fn file_entry(v: &Value<'_>) -> Result<FileEntry> {
    let d = v.as_dict().ok_or_else(|| anyhow!("file entry is not a dictionary"))?;
    let path = d
        .get(&b"path.utf-8"[..])
        .or_else(|| d.get(&b"path"[..]))
        .and_then(Value::as_list)
        .ok_or_else(|| anyhow!("file entry without path list"))?;
    let mut comps = Vec::with_capacity(path.len());
    for c in path {
        let b = c.as_bytes().ok_or_else(|| anyhow!("path component is not a string"))?;
        comps.push(String::from_utf8(b.to_vec()).context("path component is not UTF-8")?);
    }
    if comps.is_empty() {
        bail!("file entry with empty path");
    }
    Ok(FileEntry { path: comps, length: length(d.get(&b"length"[..]))? })
}

/// Decode `.torrent` bytes into a manifest.
pub fn from_bytes(data: &[u8]) -> Result<Manifest> {
    let root = decode(data)?;
    let root = root.as_dict().ok_or_else(|| anyhow!("metainfo is not a dictionary"))?;
    let info = root
        .get(&b"info"[..])
        .and_then(Value::as_dict)
        .ok_or_else(|| anyhow!("metainfo has no info dictionary"))?;

    let name = text(info, "name")?.ok_or_else(|| anyhow!("info has no name"))?;
    let piece_length = length(info.get(&b"piece length"[..])).context("piece length")?;
    let pieces = info
        .get(&b"pieces"[..])
        .and_then(Value::as_bytes)
        .ok_or_else(|| anyhow!("info has no pieces string"))?;
    if pieces.len() % SHA1_LEN != 0 {
        bail!("pieces string length {} is not a multiple of {}", pieces.len(), SHA1_LEN);
    }
    let piece_digests = pieces.chunks(SHA1_LEN).map(Digest::new).collect();

    let (name, files) = match info.get(&b"files"[..]) {
        Some(list) => {
            let list = list.as_list().ok_or_else(|| anyhow!("files is not a list"))?;
            let files = list.iter().map(file_entry).collect::<Result<Vec<_>>>()?;
            (name, files)
        }
        None => {
            let len = length(info.get(&b"length"[..])).context("single-file length")?;
            (String::new(), vec![FileEntry { path: vec![name], length: len }])
        }
    };

    let m = Manifest { name, piece_length, hash: HashAlgo::Sha1, piece_digests, files };
    m.validate()?;
    Ok(m)
}
