use std::convert::TryInto;
use std::fmt;
use std::fs::File;
use std::path::Path;

use std::hash::Hash as StdHash;
use std::hash::Hasher as StdHasher;
use thiserror::Error;
use twox_hash::XxHash32;

use serde::de::{self, Unexpected, Visitor};
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;

use crate::buf::fill_buf;

// Read size used when hashing whole files
const HASH_BLOCK_SIZE: usize = 1024 * 1024;

#[derive(Error, Debug)]
pub enum HashError {
    #[error("digest is not 64 hex characters")]
    Hex,
}

// Make the checksum api be similiar to blake3's
pub struct Checksum(XxHash32);

impl Checksum {
    pub fn new() -> Checksum {
        Checksum(XxHash32::with_seed(0))
    }

    pub fn update(&mut self, data: &[u8]) {
        self.0.write(data);
    }

    pub fn finalize(self) -> u32 {
        self.0.finish() as u32
    }
}

impl Default for Checksum {
    fn default() -> Self {
        Checksum::new()
    }
}

/// Content digest of a byte sequence.
///
/// Used to detect corruption of frames and whole assets, not for security.
#[derive(PartialEq, Eq, Clone, Copy, StdHash)]
pub struct Digest(blake3::Hash);

/// Streaming digest accumulator.
///
/// `finalize` does not consume the digester so calling it twice yields the
/// same value, and dropping it without finalizing is fine.
#[derive(Clone, Default)]
pub struct Digester(blake3::Hasher);

impl Digester {
    pub fn new() -> Digester {
        Digester(blake3::Hasher::new())
    }

    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        self.0.update(data);
        self
    }

    pub fn finalize(&self) -> Digest {
        Digest(self.0.finalize())
    }
}

pub fn hash_bytes(data: &[u8]) -> Digest {
    Digest(blake3::hash(data))
}

/// Digest a whole file, reporting the fraction done after every block.
pub fn hash_file<F: FnMut(f32)>(path: &Path, mut progress: F) -> Result<Digest, std::io::Error> {
    let mut file = File::open(path)?;
    let total = file.metadata()?.len();

    let mut digester = Digester::new();
    let mut in_buf = vec![0u8; HASH_BLOCK_SIZE];
    let mut done: u64 = 0;

    loop {
        let (eof, len) = fill_buf(&mut file, &mut in_buf)?;
        digester.update(&in_buf[..len]);
        done += len as u64;

        if total > 0 {
            progress(done as f32 / total as f32);
        }
        if eof {
            break;
        }
    }

    Ok(digester.finalize())
}

// To encapsulate the hash engine used
pub fn from_hex(hash: &str) -> Result<Digest, HashError> {
    blake3::Hash::from_hex(hash).map(Digest).map_err(|_| HashError::Hex)
}

pub fn to_hex(hash: &Digest) -> String {
    hash.0.to_hex().to_string()
}

impl From<[u8; 32]> for Digest {
    fn from(bytes: [u8; 32]) -> Self {
        Digest(blake3::Hash::from(bytes))
    }
}

impl Digest {
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    pub fn to_hex(&self) -> String {
        to_hex(self)
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.0.to_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_hex())
    }
}

// Serde impls
impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(self.0.as_bytes())
    }
}

struct DigestVisitor;

impl<'de> Visitor<'de> for DigestVisitor {
    type Value = Digest;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "a byte array containing 32 bytes")
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
        if v.len() == 32 {
            let mut hash_bytes: [u8; 32] = [0; 32];
            hash_bytes.clone_from_slice(v);
            Ok(Digest::from(hash_bytes))
        } else {
            Err(de::Error::invalid_value(Unexpected::Bytes(v), &self))
        }
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Self::Value, E> {
        v.try_into().map_or_else(
            |v: Vec<u8>| Err(de::Error::invalid_value(Unexpected::Bytes(&v), &self)),
            |hash_bytes: [u8; 32]| Ok(Digest::from(hash_bytes)),
        )
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Digest, D::Error> {
        deserializer.deserialize_byte_buf(DigestVisitor)
    }
}

#[cfg(test)]
mod test_digest {
    use super::*;
    use std::io::Write;

    #[test]
    fn finalize_is_idempotent() {
        let mut digester = Digester::new();
        digester.update(b"Hello ").update(b"World!");

        assert_eq!(digester.finalize(), digester.finalize());
    }

    #[test]
    fn split_updates_match_one_shot() {
        let mut digester = Digester::new();
        digester.update(b"Hello ");
        digester.update(b"World!");

        assert_eq!(digester.finalize(), hash_bytes(b"Hello World!"));
    }

    #[test]
    fn order_matters() {
        let mut ab = Digester::new();
        ab.update(&[0x00]).update(&[0x01]);
        let mut ba = Digester::new();
        ba.update(&[0x01]).update(&[0x00]);

        assert_ne!(ab.finalize(), ba.finalize());
    }

    #[test]
    fn drop_without_finalize() {
        let mut digester = Digester::new();
        digester.update(b"abandoned");
        drop(digester);
    }

    #[test]
    fn hex_round_trip() {
        let digest = hash_bytes(b"hex");
        let text = digest.to_hex();

        assert_eq!(text.len(), 64);
        assert_eq!(from_hex(&text).unwrap(), digest);
        assert!(from_hex("nope").is_err());
    }

    #[test]
    fn file_digest_reports_progress() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let data = vec![7u8; HASH_BLOCK_SIZE * 2 + 10];
        file.write_all(&data).unwrap();
        file.flush().unwrap();

        let mut seen = vec![];
        let digest = hash_file(file.path(), |p| seen.push(p)).unwrap();

        assert_eq!(digest, hash_bytes(&data));
        assert_eq!(seen.len(), 3);
        assert_eq!(*seen.last().unwrap(), 1.0);
    }

    #[test]
    fn serde_as_bytes() {
        let digest = hash_bytes(b"serde");
        let enc = bincode::serialize(&digest).unwrap();
        let dec: Digest = bincode::deserialize(&enc).unwrap();

        assert_eq!(dec, digest);
    }
}
