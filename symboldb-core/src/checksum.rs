//! Checksum representation and computation.
//!
//! Repository metadata carries SHA-256 digests for current repos and SHA-1
//! for older ones, so both are supported throughout. Digest values are held
//! as raw bytes; hexadecimal is only used at the parsing and display edges.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest as _, Sha256};

use crate::errors::ChecksumError;

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashKind {
    Sha1,
    Sha256,
}

impl HashKind {
    /// Parse a repository metadata algorithm name ("sha", "sha1", "sha256").
    /// Yum metadata historically used "sha" for SHA-1.
    pub fn from_name(name: &str) -> Result<Self, ChecksumError> {
        match name {
            "sha" | "sha1" | "SHA1" => Ok(HashKind::Sha1),
            "sha256" | "SHA256" => Ok(HashKind::Sha256),
            _ => Err(ChecksumError::UnsupportedAlgorithm {
                name: name.to_string(),
            }),
        }
    }

    /// Canonical lower-case algorithm name.
    pub fn name(self) -> &'static str {
        match self {
            HashKind::Sha1 => "sha1",
            HashKind::Sha256 => "sha256",
        }
    }

    /// Digest length in bytes.
    pub fn digest_len(self) -> usize {
        match self {
            HashKind::Sha1 => 20,
            HashKind::Sha256 => 32,
        }
    }
}

impl fmt::Display for HashKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A digest value together with its algorithm and, when known, the length
/// of the data that was digested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checksum {
    pub kind: HashKind,
    pub value: Vec<u8>,
    pub length: Option<u64>,
}

impl Checksum {
    /// Checksum of a byte slice.
    pub fn of(kind: HashKind, data: &[u8]) -> Self {
        Checksum {
            kind,
            value: hash_bytes(kind, data),
            length: Some(data.len() as u64),
        }
    }

    /// Parse an algorithm name and hexadecimal digest, as found in repomd
    /// and RPM header metadata.
    pub fn from_hex(name: &str, length: Option<u64>, hex_digest: &str) -> Result<Self, ChecksumError> {
        let kind = HashKind::from_name(name)?;
        let value = hex::decode(hex_digest).map_err(|_| ChecksumError::MalformedDigest {
            digest: hex_digest.to_string(),
        })?;
        if value.len() != kind.digest_len() {
            return Err(ChecksumError::WrongDigestLength {
                kind,
                actual: value.len(),
            });
        }
        Ok(Checksum { kind, value, length })
    }

    /// Lower-case hexadecimal rendering of the digest value.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.value)
    }
}

/// One-shot digest of a byte slice.
pub fn hash_bytes(kind: HashKind, data: &[u8]) -> Vec<u8> {
    match kind {
        HashKind::Sha1 => {
            let mut h = Sha1::new();
            h.update(data);
            h.finalize().to_vec()
        }
        HashKind::Sha256 => {
            let mut h = Sha256::new();
            h.update(data);
            h.finalize().to_vec()
        }
    }
}

/// Streaming digest sink. Tracks the number of octets written so package
/// digests can record the file length alongside the value.
pub struct HashSink {
    kind: HashKind,
    octets: u64,
    state: HashState,
}

enum HashState {
    Sha1(Sha1),
    Sha256(Sha256),
}

impl HashSink {
    pub fn new(kind: HashKind) -> Self {
        let state = match kind {
            HashKind::Sha1 => HashState::Sha1(Sha1::new()),
            HashKind::Sha256 => HashState::Sha256(Sha256::new()),
        };
        HashSink {
            kind,
            octets: 0,
            state,
        }
    }

    pub fn write(&mut self, data: &[u8]) {
        self.octets += data.len() as u64;
        match &mut self.state {
            HashState::Sha1(h) => h.update(data),
            HashState::Sha256(h) => h.update(data),
        }
    }

    /// Number of octets hashed so far.
    pub fn octets(&self) -> u64 {
        self.octets
    }

    pub fn finish(self) -> Checksum {
        let value = match self.state {
            HashState::Sha1(h) => h.finalize().to_vec(),
            HashState::Sha256(h) => h.finalize().to_vec(),
        };
        Checksum {
            kind: self.kind,
            value,
            length: Some(self.octets),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip() {
        let c = Checksum::from_hex("sha256", Some(3), &"ab".repeat(32)).unwrap();
        assert_eq!(c.kind, HashKind::Sha256);
        assert_eq!(c.to_hex(), "ab".repeat(32));
        assert_eq!(c.length, Some(3));
    }

    #[test]
    fn sha_means_sha1() {
        let c = Checksum::from_hex("sha", None, &"00".repeat(20)).unwrap();
        assert_eq!(c.kind, HashKind::Sha1);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(Checksum::from_hex("sha256", None, "abcd").is_err());
        assert!(Checksum::from_hex("md5", None, &"00".repeat(16)).is_err());
    }

    #[test]
    fn streaming_matches_oneshot() {
        let mut sink = HashSink::new(HashKind::Sha256);
        sink.write(b"hello ");
        sink.write(b"world");
        let streamed = sink.finish();
        let oneshot = Checksum::of(HashKind::Sha256, b"hello world");
        assert_eq!(streamed.value, oneshot.value);
        assert_eq!(streamed.length, Some(11));
    }

    #[test]
    fn known_sha1_vector() {
        // sha1("abc")
        let c = Checksum::of(HashKind::Sha1, b"abc");
        assert_eq!(c.to_hex(), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn known_sha256_vector() {
        // sha256("abc")
        let c = Checksum::of(HashKind::Sha256, b"abc");
        assert_eq!(
            c.to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
