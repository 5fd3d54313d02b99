//! Secret key arithmetic and ECDSA signing
//!
//! Blinding factors are plain secp256k1 secret keys; these helpers add,
//! negate and derive them, and sign/verify messages through a capability
//! checked [`Secp`] handle.

use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey, Scalar, SecretKey};

use super::context::{Error, Secp};
use super::hash::sha256_parts;

/// Size of a DER encoded ECDSA signature, upper bound
pub const MAX_SIGNATURE_SIZE: usize = 72;

/// A secret key as a tweak scalar
pub fn to_scalar(key: &SecretKey) -> Result<Scalar, Error> {
    Scalar::from_be_bytes(key.secret_bytes()).map_err(|_| Error::InvalidSecretKey)
}

/// a + b mod n
pub fn add_keys(a: SecretKey, b: &SecretKey) -> Result<SecretKey, Error> {
    Ok(a.add_tweak(&to_scalar(b)?)?)
}

/// Sum of positives minus sum of negatives. Fails if nothing is given or
/// the result is zero.
pub fn sum_keys(positive: &[SecretKey], negative: &[SecretKey]) -> Result<SecretKey, Error> {
    let mut terms = positive
        .iter()
        .copied()
        .chain(negative.iter().map(|k| k.negate()));
    let first = terms.next().ok_or(Error::InvalidSecretKey)?;
    terms.try_fold(first, |acc, k| add_keys(acc, &k))
}

/// Deterministic secret key from hashed parts, re-hashing with a counter
/// until the digest lands in [1, n)
pub fn key_from_hash(parts: &[&[u8]]) -> SecretKey {
    let mut counter: u32 = 0;
    loop {
        let ctr = counter.to_be_bytes();
        let mut all: Vec<&[u8]> = parts.to_vec();
        all.push(&ctr);
        if let Ok(key) = SecretKey::from_slice(&sha256_parts(&all)) {
            return key;
        }
        counter += 1;
    }
}

impl Secp {
    /// Public key for a secret key
    pub fn public_key(&self, key: &SecretKey) -> Result<PublicKey, Error> {
        self.require_sign()?;
        Ok(PublicKey::from_secret_key(self.ctx(), key))
    }

    /// Sign a 32-byte message digest
    pub fn sign(&self, msg: &Message, key: &SecretKey) -> Result<Signature, Error> {
        self.require_sign()?;
        Ok(self.ctx().sign_ecdsa(msg, key))
    }

    /// Verify a signature, `IncorrectSignature` when it doesn't match
    pub fn verify(&self, msg: &Message, sig: &Signature, pubkey: &PublicKey) -> Result<(), Error> {
        self.require_verify()?;
        self.ctx()
            .verify_ecdsa(msg, sig, pubkey)
            .map_err(|_| Error::IncorrectSignature)
    }
}

/// Parse a DER encoded signature
pub fn signature_from_der(bytes: &[u8]) -> Result<Signature, Error> {
    Signature::from_der(bytes).map_err(|_| Error::InvalidSignature)
}

/// Message from a 32-byte digest
pub fn message_from_slice(digest: &[u8]) -> Result<Message, Error> {
    Message::from_digest_slice(digest).map_err(|_| Error::InvalidMessage)
}
