#![allow(dead_code)]

use pcheck_core::hasher::digest_bytes;
use pcheck_core::{FileEntry, HashAlgo, Manifest};
use std::path::Path;

/// Build a manifest whose digests describe `files` concatenated in order.
pub fn manifest_for(name: &str, piece_length: u64, algo: HashAlgo, files: &[(&str, &[u8])]) -> Manifest {
    let stream: Vec<u8> = files.iter().flat_map(|(_, data)| data.iter().copied()).collect();
    let piece_digests =
        stream.chunks(piece_length as usize).map(|piece| digest_bytes(algo, piece)).collect();
    let files = files
        .iter()
        .map(|(path, data)| FileEntry::new(path.split('/'), data.len() as u64))
        .collect();
    Manifest { name: name.to_string(), piece_length, hash: algo, piece_digests, files }
}

/// Write `files` under `target/name` and return the matching manifest.
pub fn write_set(target: &Path, name: &str, piece_length: u64, files: &[(&str, &[u8])]) -> Manifest {
    let m = manifest_for(name, piece_length, HashAlgo::Sha1, files);
    let root = m.data_root(target);
    for (path, data) in files {
        let p = root.join(path);
        std::fs::create_dir_all(p.parent().unwrap()).unwrap();
        std::fs::write(p, data).unwrap();
    }
    m
}

pub fn random_bytes(len: usize, seed: u64) -> Vec<u8> {
    fastrand::seed(seed);
    (0..len).map(|_| fastrand::u8(..)).collect()
}
