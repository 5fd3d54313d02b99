//! Pedersen commitments
//!
//! A commitment is `blind·G + value·H`, computed by `secp256k1zkp` and
//! encoded in 33 bytes: a `0x08` or `0x09` tag for y followed by x. The
//! all-zero encoding stands for the point at infinity, which is what a
//! perfectly balanced sum yields.

use std::fmt;
use std::sync::OnceLock;

use secp256k1::constants::{GENERATOR_X, GENERATOR_Y};
use secp256k1::{PublicKey, SecretKey};
use secp256k1zkp as zkp;

use super::context::{Error, Secp};
use super::hash::sha256_parts;
use super::keys::{sum_keys, to_scalar};

/// Size of a serialized commitment
pub const PEDERSEN_COMMITMENT_SIZE: usize = 33;

const TAG_EVEN: u8 = 0x08;
const TAG_ODD: u8 = 0x09;

const DOMAIN_SWITCH: &[u8] = b"pedersen/switch-generator";

/// Hidden amount, `blind·G + value·H`
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Commitment(pub [u8; PEDERSEN_COMMITMENT_SIZE]);

impl Commitment {
    /// Commitment to nothing (the point at infinity)
    pub const fn zero() -> Self {
        Commitment([0; PEDERSEN_COMMITMENT_SIZE])
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; PEDERSEN_COMMITMENT_SIZE]
    }

    /// Build from raw bytes, checking size and that the bytes decode to a
    /// curve point
    pub fn from_vec(bytes: Vec<u8>) -> Result<Self, Error> {
        Self::from_slice(&bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != PEDERSEN_COMMITMENT_SIZE {
            return Err(Error::InvalidCommit);
        }
        let mut raw = [0u8; PEDERSEN_COMMITMENT_SIZE];
        raw.copy_from_slice(bytes);
        let commit = Commitment(raw);
        if !commit.is_zero() {
            commit.to_pubkey_candidates()?;
        }
        Ok(commit)
    }

    pub(crate) fn to_zkp(self) -> zkp::pedersen::Commitment {
        zkp::pedersen::Commitment(self.0)
    }

    fn from_zkp(commit: zkp::pedersen::Commitment) -> Self {
        Commitment(commit.0)
    }

    /// Both public keys with this commitment's x coordinate, even y first.
    /// The tag does not say which of the two is the committed point.
    pub fn to_pubkey_candidates(&self) -> Result<[PublicKey; 2], Error> {
        if self.0[0] != TAG_EVEN && self.0[0] != TAG_ODD {
            return Err(Error::InvalidCommit);
        }
        let mut raw = self.0;
        raw[0] = 0x02;
        let even = PublicKey::from_slice(&raw).map_err(|_| Error::InvalidCommit)?;
        raw[0] = 0x03;
        let odd = PublicKey::from_slice(&raw).map_err(|_| Error::InvalidCommit)?;
        Ok([even, odd])
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl AsRef<[u8]> for Commitment {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Commitment({})", self.to_hex())
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Switch commitment generator J, hashed onto the curve from G's encoding
fn generator_j() -> &'static PublicKey {
    static J: OnceLock<PublicKey> = OnceLock::new();
    J.get_or_init(|| {
        let mut g = [0x04u8; 65];
        g[1..33].copy_from_slice(&GENERATOR_X);
        g[33..].copy_from_slice(&GENERATOR_Y);
        let mut counter: u32 = 0;
        loop {
            let x = sha256_parts(&[DOMAIN_SWITCH, &g, &counter.to_be_bytes()]);
            let mut raw = [0x02u8; 33];
            raw[1..].copy_from_slice(&x);
            if let Ok(pk) = PublicKey::from_slice(&raw) {
                return pk;
            }
            counter += 1;
        }
    })
}

fn non_zero(commits: Vec<Commitment>) -> Vec<zkp::pedersen::Commitment> {
    commits
        .into_iter()
        .filter(|c| !c.is_zero())
        .map(Commitment::to_zkp)
        .collect()
}

impl Secp {
    /// Commit to a value with a blinding factor
    pub fn commit(&self, value: u64, blind: SecretKey) -> Result<Commitment, Error> {
        self.require_commit()?;
        let blind = self.zkp_key(&blind)?;
        self.zkp()
            .commit(value, blind)
            .map(Commitment::from_zkp)
            .map_err(|_| Error::InvalidCommit)
    }

    /// Commit to a value with a zero blinding factor
    pub fn commit_value(&self, value: u64) -> Result<Commitment, Error> {
        self.require_commit()?;
        if value == 0 {
            return Ok(Commitment::zero());
        }
        self.zkp()
            .commit_value(value)
            .map(Commitment::from_zkp)
            .map_err(|_| Error::InvalidCommit)
    }

    /// Switch commitment `blind·J`
    pub fn switch_commit(&self, blind: SecretKey) -> Result<Commitment, Error> {
        self.require_commit()?;
        let point = generator_j().mul_tweak(self.ctx(), &to_scalar(&blind)?)?;
        let mut raw = point.serialize();
        raw[0] = if raw[0] == 0x03 { TAG_ODD } else { TAG_EVEN };
        Ok(Commitment(raw))
    }

    /// Sum of positive commitments minus sum of negative ones
    pub fn commit_sum(
        &self,
        positive: Vec<Commitment>,
        negative: Vec<Commitment>,
    ) -> Result<Commitment, Error> {
        self.require_commit()?;
        let positive = non_zero(positive);
        let negative = non_zero(negative);
        if positive.is_empty() && negative.is_empty() {
            return Ok(Commitment::zero());
        }
        // the library refuses to serialize infinity
        if self.zkp().verify_commit_sum(positive.clone(), negative.clone()) {
            return Ok(Commitment::zero());
        }
        self.zkp()
            .commit_sum(positive, negative)
            .map(Commitment::from_zkp)
            .map_err(|_| Error::InvalidCommit)
    }

    /// True when positives minus negatives is the zero commitment
    pub fn verify_commit_sum(&self, positive: Vec<Commitment>, negative: Vec<Commitment>) -> bool {
        if self.require_commit().is_err() {
            return false;
        }
        self.zkp()
            .verify_commit_sum(non_zero(positive), non_zero(negative))
    }

    /// Sum of positive blinding factors minus negative ones
    pub fn blind_sum(
        &self,
        positive: Vec<SecretKey>,
        negative: Vec<SecretKey>,
    ) -> Result<SecretKey, Error> {
        self.require_commit()?;
        sum_keys(&positive, &negative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::context::ContextFlag;

    fn secp() -> Secp {
        Secp::with_caps(ContextFlag::Commit)
    }

    fn key(byte: u8) -> SecretKey {
        SecretKey::from_slice(&[byte; 32]).unwrap()
    }

    #[test]
    fn test_commit_is_deterministic() {
        let secp = secp();
        let a = secp.commit(5, key(1)).unwrap();
        let b = secp.commit(5, key(1)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, secp.commit(6, key(1)).unwrap());
        assert_ne!(a, secp.commit(5, key(2)).unwrap());
        assert!(a.0[0] == TAG_EVEN || a.0[0] == TAG_ODD);
    }

    #[test]
    fn test_homomorphic_balance() {
        let secp = secp();
        let (r1, r2, r3) = (key(11), key(12), key(13));
        let inputs = vec![secp.commit(10, r1).unwrap(), secp.commit(11, r2).unwrap()];
        let output = secp.commit(19, r3).unwrap();
        let fee = secp.commit_value(2).unwrap();

        // outputs + fee - inputs is the commitment to the excess blinding factor
        let excess_blind = secp.blind_sum(vec![r3], vec![r1, r2]).unwrap();
        let excess = secp.commit(0, excess_blind).unwrap();
        let sum = secp.commit_sum(vec![output, fee], inputs.clone()).unwrap();
        assert_eq!(sum, excess);

        // tallying the excess too makes everything cancel out
        assert!(secp.verify_commit_sum(vec![output, fee], vec![inputs[0], inputs[1], excess]));

        let wrong = secp.commit(18, r3).unwrap();
        assert!(!secp.verify_commit_sum(vec![wrong, fee], vec![inputs[0], inputs[1], excess]));
    }

    #[test]
    fn test_zero_commitment() {
        let secp = secp();
        assert!(secp.commit_value(0).unwrap().is_zero());
        let c = secp.commit(3, key(4)).unwrap();
        assert_eq!(secp.commit_sum(vec![c, Commitment::zero()], vec![]).unwrap(), c);
        assert!(secp.commit_sum(vec![c], vec![c]).unwrap().is_zero());
        assert!(secp.commit_sum(vec![], vec![]).unwrap().is_zero());
    }

    #[test]
    fn test_pubkey_candidates_hold_blind_key() {
        let secp = secp();
        let blind = key(21);
        let c = secp.commit(0, blind).unwrap();
        let pk = secp.public_key(&blind).unwrap();

        let candidates = c.to_pubkey_candidates().unwrap();
        assert!(candidates.contains(&pk));
        assert_ne!(candidates[0], candidates[1]);
        assert_eq!(candidates[0].serialize()[1..], candidates[1].serialize()[1..]);
    }

    #[test]
    fn test_from_slice_validation() {
        assert_eq!(Commitment::from_slice(&[8u8; 32]), Err(Error::InvalidCommit));
        let mut bad = [0u8; 33];
        bad[0] = 0x02;
        bad[32] = 1;
        assert_eq!(Commitment::from_slice(&bad), Err(Error::InvalidCommit));
        assert!(Commitment::from_slice(&[0u8; 33]).unwrap().is_zero());

        let c = secp().commit(1, key(3)).unwrap();
        assert_eq!(Commitment::from_vec(c.0.to_vec()).unwrap(), c);
    }

    #[test]
    fn test_switch_commit_differs_from_commit() {
        let secp = secp();
        let blind = key(8);
        let switch = secp.switch_commit(blind).unwrap();
        assert_ne!(switch, secp.commit(0, blind).unwrap());
        assert_eq!(switch, secp.switch_commit(blind).unwrap());
        assert_ne!(switch, secp.switch_commit(key(9)).unwrap());
    }

    #[test]
    fn test_commit_requires_capability() {
        let full = Secp::with_caps(ContextFlag::Full);
        assert_eq!(full.commit(1, key(1)), Err(Error::IncapableContext));
        assert_eq!(full.commit_value(1), Err(Error::IncapableContext));
        assert!(!full.verify_commit_sum(vec![], vec![]));
    }
}
