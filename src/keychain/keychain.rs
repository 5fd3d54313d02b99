//! Keychain: one root extended key, derived keys on demand
//!
//! Secret keys are never stored. They are re-derived from the root each
//! time an [`Identifier`] is used; a shared cache remembers at which child
//! index each identifier was last seen so most lookups take a single
//! derivation instead of a scan.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use log::{debug, trace};
use rand::rngs::OsRng;
use rand::RngCore;
use secp256k1::ecdsa::Signature;
use secp256k1::{Message, SecretKey};
use thiserror::Error;

use super::blind::{BlindSum, BlindingFactor};
use super::extkey::{ExtKeyError, ExtendedKey, Identifier};
use crate::crypto::{self, Commitment, ContextFlag, ProofInfo, ProofMessage, RangeProof, Secp};

/// Highest child index scanned when looking up an unknown identifier
pub const KEY_DERIVATION_LIMIT: u32 = 10_000;

/// Keychain errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Extended key error: {0}")]
    ExtendedKey(#[from] ExtKeyError),
    #[error("Secp error: {0}")]
    Secp(#[from] crypto::Error),
    #[error("Key derivation not found for {0}")]
    KeyDerivationNotFound(Identifier),
}

/// Derives keys, commitments, proofs and signatures from a single seed
#[derive(Clone)]
pub struct Keychain {
    secp: Secp,
    extkey: ExtendedKey,
    key_overrides: HashMap<Identifier, SecretKey>,
    key_derivation_cache: Arc<DashMap<Identifier, u32>>,
}

impl Keychain {
    /// Keychain rooted at the given seed
    pub fn from_seed(seed: &[u8]) -> Result<Keychain, Error> {
        let secp = Secp::with_caps(ContextFlag::Commit);
        let extkey = ExtendedKey::from_seed(&secp, seed)?;
        Ok(Keychain {
            secp,
            extkey,
            key_overrides: HashMap::new(),
            key_derivation_cache: Arc::new(DashMap::new()),
        })
    }

    /// Keychain rooted at a fresh random 32-byte seed
    pub fn from_random_seed() -> Result<Keychain, Error> {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        Keychain::from_seed(&seed)
    }

    /// Clone of this keychain where `burn_key_id` resolves to a fixed,
    /// publicly known key. Outputs committed to it are provably unspendable
    /// by anyone in particular.
    pub fn burn_enabled(&self, burn_key_id: &Identifier) -> Result<Keychain, Error> {
        let burn_key = SecretKey::from_slice(&[1; 32]).map_err(crypto::Error::from)?;
        let mut keychain = self.clone();
        keychain.key_overrides.insert(*burn_key_id, burn_key);
        Ok(keychain)
    }

    pub fn root_key_id(&self) -> Identifier {
        self.extkey.root_key_id
    }

    pub fn secp(&self) -> &Secp {
        &self.secp
    }

    /// Identifier of the key at child index `derivation`
    pub fn derive_key_id(&self, derivation: u32) -> Result<Identifier, Error> {
        let extkey = self.extkey.derive(&self.secp, derivation)?;
        self.key_derivation_cache.insert(extkey.key_id, derivation);
        Ok(extkey.key_id)
    }

    /// Secret key behind an identifier: overrides first, then the cached
    /// child index, then a scan of indices 1..KEY_DERIVATION_LIMIT
    pub fn derived_key(&self, key_id: &Identifier) -> Result<SecretKey, Error> {
        if let Some(key) = self.key_overrides.get(key_id) {
            return Ok(*key);
        }

        let cached = self.key_derivation_cache.get(key_id).map(|entry| *entry);
        if let Some(derivation) = cached {
            trace!("derivation cache hit for {} at {}", key_id, derivation);
            let extkey = self.extkey.derive(&self.secp, derivation)?;
            return Ok(extkey.key);
        }

        debug!("derivation cache miss for {}, scanning", key_id);
        for i in 1..KEY_DERIVATION_LIMIT {
            let extkey = self.extkey.derive(&self.secp, i)?;
            self.key_derivation_cache.insert(extkey.key_id, i);
            if extkey.key_id == *key_id {
                debug!("found {} at derivation {}", key_id, i);
                return Ok(extkey.key);
            }
        }

        Err(Error::KeyDerivationNotFound(*key_id))
    }

    /// Commitment to `amount` blinded by the identified key
    pub fn commit(&self, amount: u64, key_id: &Identifier) -> Result<Commitment, Error> {
        let skey = self.derived_key(key_id)?;
        Ok(self.secp.commit(amount, skey)?)
    }

    /// Commitment to `amount` blinded by the key at a child index
    pub fn commit_with_key_index(&self, amount: u64, index: u32) -> Result<Commitment, Error> {
        let extkey = self.extkey.derive(&self.secp, index)?;
        self.key_derivation_cache.insert(extkey.key_id, index);
        Ok(self.secp.commit(amount, extkey.key)?)
    }

    pub fn switch_commit(&self, key_id: &Identifier) -> Result<Commitment, Error> {
        let skey = self.derived_key(key_id)?;
        Ok(self.secp.switch_commit(skey)?)
    }

    /// Range proof for `commit`, rewindable with the same key
    pub fn range_proof(
        &self,
        amount: u64,
        key_id: &Identifier,
        commit: Commitment,
        msg: ProofMessage,
    ) -> Result<RangeProof, Error> {
        let skey = self.derived_key(key_id)?;
        Ok(self.secp.range_proof(0, amount, skey, commit, msg)?)
    }

    pub fn rewind_range_proof(
        &self,
        key_id: &Identifier,
        commit: Commitment,
        proof: &RangeProof,
    ) -> Result<ProofInfo, Error> {
        let nonce = self.derived_key(key_id)?;
        Ok(self.secp.rewind_range_proof(commit, proof, nonce)?)
    }

    /// Reduce identifiers and opaque blinding factors to one blinding factor
    pub fn blind_sum(&self, blind_sum: &BlindSum) -> Result<BlindingFactor, Error> {
        let mut pos_keys = blind_sum
            .positive_key_ids
            .iter()
            .map(|id| self.derived_key(id))
            .collect::<Result<Vec<_>, _>>()?;
        let mut neg_keys = blind_sum
            .negative_key_ids
            .iter()
            .map(|id| self.derived_key(id))
            .collect::<Result<Vec<_>, _>>()?;

        pos_keys.extend(blind_sum.positive_blinding_factors.iter().map(|b| b.secret_key()));
        neg_keys.extend(blind_sum.negative_blinding_factors.iter().map(|b| b.secret_key()));

        let sum = self.secp.blind_sum(pos_keys, neg_keys)?;
        Ok(BlindingFactor::new(sum))
    }

    pub fn sign(&self, msg: &Message, key_id: &Identifier) -> Result<Signature, Error> {
        let skey = self.derived_key(key_id)?;
        Ok(self.secp.sign(msg, &skey)?)
    }

    pub fn sign_with_blinding(
        &self,
        msg: &Message,
        blinding: &BlindingFactor,
    ) -> Result<Signature, Error> {
        Ok(self.secp.sign(msg, &blinding.secret_key())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transaction::verify_excess;
    use crate::crypto::message_from_slice;
    use std::thread;

    fn keychain() -> Keychain {
        Keychain::from_seed(&[0x42u8; 32]).unwrap()
    }

    #[test]
    fn test_invalid_seed() {
        assert_eq!(
            Keychain::from_seed(&[0u8; 20]).err(),
            Some(Error::ExtendedKey(ExtKeyError::InvalidSeedSize(20)))
        );
    }

    #[test]
    fn test_derived_key_by_scan_and_cache() {
        let keychain = keychain();
        let key_id = keychain.derive_key_id(7).unwrap();

        // a fresh clone of the root has an empty cache and must scan
        let other = Keychain::from_seed(&[0x42u8; 32]).unwrap();
        let scanned = other.derived_key(&key_id).unwrap();
        assert!(other.key_derivation_cache.contains_key(&key_id));
        assert_eq!(*other.key_derivation_cache.get(&key_id).unwrap(), 7);

        let cached = keychain.derived_key(&key_id).unwrap();
        assert_eq!(scanned, cached);
    }

    #[test]
    fn test_key_not_found() {
        let keychain = keychain();
        let foreign = Keychain::from_seed(&[0x43u8; 32]).unwrap().root_key_id();
        assert_eq!(
            keychain.derived_key(&foreign),
            Err(Error::KeyDerivationNotFound(foreign))
        );
    }

    #[test]
    fn test_concurrent_cache_population() {
        let keychain = keychain();
        let key_id = Keychain::from_seed(&[0x42u8; 32])
            .unwrap()
            .derive_key_id(50)
            .unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let keychain = keychain.clone();
                thread::spawn(move || keychain.derived_key(&key_id).unwrap())
            })
            .collect();
        let keys: Vec<SecretKey> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(keys.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(*keychain.key_derivation_cache.get(&key_id).unwrap(), 50);
    }

    #[test]
    fn test_commit_matches_key_index() {
        let keychain = keychain();
        let key_id = keychain.derive_key_id(3).unwrap();
        assert_eq!(
            keychain.commit(12, &key_id).unwrap(),
            keychain.commit_with_key_index(12, 3).unwrap()
        );
    }

    #[test]
    fn test_range_proof_and_rewind() {
        let keychain = keychain();
        let key_id = keychain.derive_key_id(1).unwrap();
        let commit = keychain.commit(77, &key_id).unwrap();
        let proof = keychain
            .range_proof(77, &key_id, commit, ProofMessage::empty())
            .unwrap();
        assert!(keychain.secp().verify_range_proof(commit, &proof).is_ok());

        let info = keychain.rewind_range_proof(&key_id, commit, &proof).unwrap();
        assert!(info.success);
        assert_eq!(info.value, 77);

        let other_id = keychain.derive_key_id(2).unwrap();
        let info = keychain.rewind_range_proof(&other_id, commit, &proof).unwrap();
        assert!(!info.success);
    }

    #[test]
    fn test_blind_sum_balances_commitments() {
        let keychain = keychain();
        let secp = keychain.secp();
        let in1 = keychain.derive_key_id(1).unwrap();
        let in2 = keychain.derive_key_id(2).unwrap();
        let out = keychain.derive_key_id(3).unwrap();

        let blind = keychain
            .blind_sum(&BlindSum::new().add_key_id(out).sub_key_id(in1).sub_key_id(in2))
            .unwrap();

        let excess = secp.commit(0, blind.secret_key()).unwrap();
        let sum = secp
            .commit_sum(
                vec![keychain.commit(5, &out).unwrap(), secp.commit_value(1).unwrap()],
                vec![keychain.commit(4, &in1).unwrap(), keychain.commit(2, &in2).unwrap()],
            )
            .unwrap();
        assert_eq!(sum, excess);

        // an opaque blinding factor nets out exactly like the key it came from
        let partial = keychain
            .blind_sum(&BlindSum::new().sub_key_id(in1).sub_key_id(in2))
            .unwrap();
        let rebuilt = keychain
            .blind_sum(&BlindSum::new().add_key_id(out).add_blinding_factor(partial))
            .unwrap();
        assert_eq!(rebuilt, blind);
    }

    #[test]
    fn test_sign_verifies_against_commitment_key() {
        let keychain = keychain();
        let key_id = keychain.derive_key_id(4).unwrap();
        let msg = message_from_slice(&[7u8; 32]).unwrap();
        let sig = keychain.sign(&msg, &key_id).unwrap();
        let excess = keychain.commit(0, &key_id).unwrap();
        assert!(verify_excess(keychain.secp(), &msg, &sig, &excess).is_ok());
    }

    #[test]
    fn test_burn_override() {
        let keychain = keychain();
        let burn_id = Identifier::zero();
        let burn = keychain.burn_enabled(&burn_id).unwrap();
        assert_eq!(
            burn.derived_key(&burn_id).unwrap(),
            SecretKey::from_slice(&[1; 32]).unwrap()
        );
        assert!(!keychain.key_overrides.contains_key(&burn_id));
    }
}
