//! Verify downloaded files against a piece-oriented integrity manifest
//! (BitTorrent-style): pieces span file boundaries, each piece is hashed
//! across the files it covers and compared with its expected digest.

pub mod error;
pub mod filter;
pub mod hasher;
pub mod manifest;
pub mod path_safety;
pub mod progress;
pub mod segment;
pub mod torrent;
pub mod verify;

pub use error::VerifyError;
pub use manifest::{Digest, FileEntry, HashAlgo, Manifest};
pub use verify::{verify, verify_streaming, VerificationOutcome, VerifyConfig, VerifyReport};
