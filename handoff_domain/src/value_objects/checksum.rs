// /////////////////////////////////////////////////////////////////////////////
// Handoff Buffer Manager
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Content Checksums
//!
//! File identity in the ledger is the triple `(relpath, filename, checksum)`:
//! a buffer writer that silently rewrites a file's bytes produces a new
//! checksum and therefore a new ledger row. This module computes those
//! checksums.
//!
//! ## Algorithms
//!
//! - **blake2** (default) - BLAKE2b-512, fast and collision resistant
//! - **sha256** - SHA-256, for deployments standardized on the SHA-2 family
//!
//! Digests are streamed in 4 KiB blocks so checksum cost is bounded by I/O,
//! not by file size in memory. Checksum computation dominates the tracker's
//! cost; the block size matches the ext4 default so reads stay aligned.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use blake2::Blake2b512;
use serde::Deserialize;
use sha2::{Digest, Sha256};

/// Size of the read buffer used while streaming a file into the digest.
const BLOCK_SIZE: usize = 4096;

/// Hash algorithm used to fingerprint file content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    /// BLAKE2b-512 (the default).
    #[default]
    Blake2,
    /// SHA-256.
    Sha256,
}

impl ChecksumAlgorithm {
    /// Name of the algorithm as it appears in configuration files.
    pub fn name(&self) -> &'static str {
        match self {
            ChecksumAlgorithm::Blake2 => "blake2",
            ChecksumAlgorithm::Sha256 => "sha256",
        }
    }

    /// Computes the hex-encoded digest of everything `reader` yields.
    pub fn hash_reader<R: Read>(&self, reader: R) -> io::Result<String> {
        match self {
            ChecksumAlgorithm::Blake2 => digest_stream::<Blake2b512, R>(reader),
            ChecksumAlgorithm::Sha256 => digest_stream::<Sha256, R>(reader),
        }
    }

    /// Computes the hex-encoded digest of the file at `path`.
    pub fn hash_file(&self, path: &Path) -> io::Result<String> {
        let file = File::open(path)?;
        self.hash_reader(BufReader::new(file))
    }
}

fn digest_stream<D: Digest, R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = D::new();
    let mut block = [0u8; BLOCK_SIZE];
    loop {
        let read = reader.read(&mut block)?;
        if read == 0 {
            break;
        }
        hasher.update(&block[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_sha256_known_vector() {
        let digest = ChecksumAlgorithm::Sha256.hash_reader(&b"abc"[..]).unwrap();
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_blake2_digest_shape() {
        let digest = ChecksumAlgorithm::Blake2.hash_reader(&b"abc"[..]).unwrap();
        // BLAKE2b-512 produces 64 bytes, 128 hex characters.
        assert_eq!(digest.len(), 128);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_algorithms_disagree() {
        let blake = ChecksumAlgorithm::Blake2.hash_reader(&b"content"[..]).unwrap();
        let sha = ChecksumAlgorithm::Sha256.hash_reader(&b"content"[..]).unwrap();
        assert_ne!(blake, sha);
    }

    #[test]
    fn test_digest_is_deterministic() {
        let first = ChecksumAlgorithm::Blake2.hash_reader(&b"same bytes"[..]).unwrap();
        let second = ChecksumAlgorithm::Blake2.hash_reader(&b"same bytes"[..]).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_streaming_matches_single_shot() {
        // A payload bigger than one block must hash identically to the
        // equivalent single buffer.
        let payload = vec![0xA5u8; BLOCK_SIZE * 3 + 17];
        let streamed = ChecksumAlgorithm::Sha256.hash_reader(&payload[..]).unwrap();

        let mut hasher = Sha256::new();
        hasher.update(&payload);
        assert_eq!(streamed, hex::encode(hasher.finalize()));
    }

    #[test]
    fn test_hash_file_roundtrip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"file on disk").unwrap();
        file.flush().unwrap();

        let from_file = ChecksumAlgorithm::Blake2.hash_file(file.path()).unwrap();
        let from_bytes = ChecksumAlgorithm::Blake2.hash_reader(&b"file on disk"[..]).unwrap();
        assert_eq!(from_file, from_bytes);
    }

    #[test]
    fn test_hash_file_missing() {
        let result = ChecksumAlgorithm::Blake2.hash_file(Path::new("/no/such/file"));
        assert!(result.is_err());
    }

    #[test]
    fn test_default_is_blake2() {
        assert_eq!(ChecksumAlgorithm::default(), ChecksumAlgorithm::Blake2);
        assert_eq!(ChecksumAlgorithm::default().name(), "blake2");
    }
}
