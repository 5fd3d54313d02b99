//! Deterministic key derivation
//!
//! An [`ExtendedKey`] is a secret key plus a chaincode. Children are
//! derived with a keyed hash of the parent key and child index, so the
//! whole tree follows from the seed and nothing secret is ever stored.

use std::fmt;

use secp256k1::{PublicKey, SecretKey};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::crypto::{self, hmac_sha256, hmac_sha512, keys::to_scalar, Secp};

/// Size of a key identifier
pub const IDENTIFIER_SIZE: usize = 10;

const SEED_KEY: &[u8] = b"Mimble seed";
const IDENTIFIER_KEY: &[u8] = b"Mimble identifier";

/// Key derivation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtKeyError {
    #[error("Invalid seed size: {0} bytes (expected 16, 32 or 64)")]
    InvalidSeedSize(usize),
    #[error("Invalid slice size: {0} bytes")]
    InvalidSliceSize(usize),
    #[error("Derived key material is out of range")]
    InvalidExtendedKey,
    #[error("Secp error: {0}")]
    Secp(#[from] crypto::Error),
}

/// Stable reference to a derived key that reveals nothing about it
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier([u8; IDENTIFIER_SIZE]);

impl Identifier {
    pub fn zero() -> Identifier {
        Identifier([0; IDENTIFIER_SIZE])
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Identifier, ExtKeyError> {
        if bytes.len() != IDENTIFIER_SIZE {
            return Err(ExtKeyError::InvalidSliceSize(bytes.len()));
        }
        let mut identifier = [0u8; IDENTIFIER_SIZE];
        identifier.copy_from_slice(bytes);
        Ok(Identifier(identifier))
    }

    /// Keyed hash of the compressed public key
    pub fn from_pubkey(pubkey: &PublicKey) -> Identifier {
        let digest = hmac_sha256(IDENTIFIER_KEY, &[&pubkey.serialize()]);
        let mut identifier = [0u8; IDENTIFIER_SIZE];
        identifier.copy_from_slice(&digest[..IDENTIFIER_SIZE]);
        Identifier(identifier)
    }

    pub fn from_secret_key(secp: &Secp, key: &SecretKey) -> Result<Identifier, ExtKeyError> {
        let pubkey = secp.public_key(key)?;
        Ok(Identifier::from_pubkey(&pubkey))
    }

    pub fn from_hex(s: &str) -> Result<Identifier, ExtKeyError> {
        let bytes = hex::decode(s).map_err(|_| ExtKeyError::InvalidSliceSize(s.len() / 2))?;
        Identifier::from_bytes(&bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn to_bytes(&self) -> [u8; IDENTIFIER_SIZE] {
        self.0
    }
}

impl AsRef<[u8]> for Identifier {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({})", self.to_hex())
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Identifier::from_hex(&s).map_err(de::Error::custom)
    }
}

/// A node in the derivation tree
#[derive(Clone)]
pub struct ExtendedKey {
    /// Number of derivations from the root
    pub depth: u8,
    /// Child index this key was derived at
    pub n_child: u32,
    /// Identifier of the root key of the tree
    pub root_key_id: Identifier,
    /// Identifier of this key
    pub key_id: Identifier,
    /// Secret key
    pub key: SecretKey,
    /// Chaincode for further derivation
    pub chaincode: [u8; 32],
}

impl ExtendedKey {
    /// Root key from a 16, 32 or 64 byte seed
    pub fn from_seed(secp: &Secp, seed: &[u8]) -> Result<ExtendedKey, ExtKeyError> {
        if ![16, 32, 64].contains(&seed.len()) {
            return Err(ExtKeyError::InvalidSeedSize(seed.len()));
        }
        let derived = hmac_sha512(SEED_KEY, &[seed]);
        let key = SecretKey::from_slice(&derived[..32]).map_err(|_| ExtKeyError::InvalidExtendedKey)?;
        let mut chaincode = [0u8; 32];
        chaincode.copy_from_slice(&derived[32..]);

        let key_id = Identifier::from_secret_key(secp, &key)?;
        Ok(ExtendedKey {
            depth: 0,
            n_child: 0,
            root_key_id: key_id,
            key_id,
            key,
            chaincode,
        })
    }

    /// Child key at index `n`
    pub fn derive(&self, secp: &Secp, n: u32) -> Result<ExtendedKey, ExtKeyError> {
        let derived = hmac_sha512(&self.chaincode, &[&self.key.secret_bytes(), &n.to_be_bytes()]);
        let delta = SecretKey::from_slice(&derived[..32]).map_err(|_| ExtKeyError::InvalidExtendedKey)?;
        let key = self
            .key
            .add_tweak(&to_scalar(&delta)?)
            .map_err(|_| ExtKeyError::InvalidExtendedKey)?;
        let mut chaincode = [0u8; 32];
        chaincode.copy_from_slice(&derived[32..]);

        let key_id = Identifier::from_secret_key(secp, &key)?;
        Ok(ExtendedKey {
            depth: self.depth.saturating_add(1),
            n_child: n,
            root_key_id: self.root_key_id,
            key_id,
            key,
            chaincode,
        })
    }

    pub fn identifier(&self) -> Identifier {
        self.key_id
    }
}

impl fmt::Debug for ExtendedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtendedKey")
            .field("depth", &self.depth)
            .field("n_child", &self.n_child)
            .field("root_key_id", &self.root_key_id)
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::ContextFlag;

    fn secp() -> Secp {
        Secp::with_caps(ContextFlag::Commit)
    }

    #[test]
    fn test_seed_sizes() {
        let secp = secp();
        for len in [16, 32, 64] {
            assert!(ExtendedKey::from_seed(&secp, &vec![7u8; len]).is_ok());
        }
        for len in [0, 15, 33, 65] {
            assert_eq!(
                ExtendedKey::from_seed(&secp, &vec![7u8; len]).err(),
                Some(ExtKeyError::InvalidSeedSize(len))
            );
        }
    }

    #[test]
    fn test_root_identifier() {
        let secp = secp();
        let root = ExtendedKey::from_seed(&secp, &[1u8; 32]).unwrap();
        assert_eq!(root.depth, 0);
        assert_eq!(root.root_key_id, root.key_id);
        assert_eq!(root.key_id, Identifier::from_secret_key(&secp, &root.key).unwrap());
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let secp = secp();
        let root = ExtendedKey::from_seed(&secp, &[2u8; 32]).unwrap();
        let a = root.derive(&secp, 5).unwrap();
        let b = root.derive(&secp, 5).unwrap();
        assert_eq!(a.key, b.key);
        assert_eq!(a.chaincode, b.chaincode);
        assert_eq!(a.key_id, b.key_id);
        assert_eq!(a.n_child, 5);
        assert_eq!(a.depth, 1);
        assert_eq!(a.root_key_id, root.key_id);

        let c = root.derive(&secp, 6).unwrap();
        assert_ne!(a.key_id, c.key_id);
        assert_ne!(a.key, c.key);
    }

    #[test]
    fn test_different_seeds_different_roots() {
        let secp = secp();
        let a = ExtendedKey::from_seed(&secp, &[3u8; 16]).unwrap();
        let b = ExtendedKey::from_seed(&secp, &[4u8; 16]).unwrap();
        assert_ne!(a.key_id, b.key_id);
    }

    #[test]
    fn test_identifier_hex_and_serde() {
        let secp = secp();
        let root = ExtendedKey::from_seed(&secp, &[5u8; 32]).unwrap();
        let id = root.identifier();
        assert_eq!(Identifier::from_hex(&id.to_hex()).unwrap(), id);

        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.to_hex()));
        let back: Identifier = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);

        assert!(Identifier::from_bytes(&[0u8; 9]).is_err());
        assert!(Identifier::from_hex("zz").is_err());
    }
}
