//! Canonical hashes
//!
//! Every consensus object is identified by the SHA-256 of its binary
//! encoding. [`Hashed`] is implemented for anything [`Writeable`], so an
//! object's hash always agrees with what goes over the wire.

use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use super::ser::{self, Readable, Reader, Writeable, Writer};

/// Size of a hash in bytes
pub const HASH_SIZE: usize = 32;

/// A 32-byte SHA-256 digest
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash(pub [u8; HASH_SIZE]);

/// The all-zero hash, used as the previous hash of genesis and for unset roots
pub const ZERO_HASH: Hash = Hash([0; HASH_SIZE]);

impl Hash {
    pub fn from_slice(bytes: &[u8]) -> Option<Hash> {
        if bytes.len() != HASH_SIZE {
            return None;
        }
        let mut hash = [0u8; HASH_SIZE];
        hash.copy_from_slice(bytes);
        Some(Hash(hash))
    }

    pub fn from_hex(s: &str) -> Option<Hash> {
        hex::decode(s).ok().and_then(|bytes| Hash::from_slice(&bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // short form, enough to tell hashes apart in logs
        write!(f, "{}", &self.to_hex()[..12])
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash::from_hex(&s).ok_or_else(|| de::Error::custom(format!("invalid hash: {}", s)))
    }
}

impl Writeable for Hash {
    fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
        writer.write_fixed_bytes(&self.0)
    }
}

impl Readable for Hash {
    fn read(reader: &mut dyn Reader) -> Result<Hash, ser::Error> {
        let bytes = reader.read_fixed_bytes(HASH_SIZE)?;
        Hash::from_slice(&bytes).ok_or(ser::Error::CorruptedData)
    }
}

/// Writer that feeds everything written into a SHA-256 state
#[derive(Default)]
pub struct HashWriter {
    state: Sha256,
}

impl HashWriter {
    pub fn finalize(self) -> Hash {
        let mut hash = [0u8; HASH_SIZE];
        hash.copy_from_slice(&self.state.finalize());
        Hash(hash)
    }
}

impl Writer for HashWriter {
    fn write_fixed_bytes<T: AsRef<[u8]>>(&mut self, bytes: &T) -> Result<(), ser::Error> {
        self.state.update(bytes.as_ref());
        Ok(())
    }
}

/// Anything with a canonical hash
pub trait Hashed {
    fn hash(&self) -> Hash;
}

impl<T: Writeable> Hashed for T {
    fn hash(&self) -> Hash {
        let mut hasher = HashWriter::default();
        // a hasher never rejects bytes; a failing write leaves a partial digest
        let _ = self.write(&mut hasher);
        hasher.finalize()
    }
}
