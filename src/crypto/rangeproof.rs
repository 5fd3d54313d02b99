//! Rewindable range proofs
//!
//! Proofs are `secp256k1zkp` bulletproofs showing the committed value lies
//! in `[0, 2^64)`. A proof with a minimum covers the commitment shifted
//! down by `min·H`, so it attests `[min, min + 2^64)`:
//!
//! ```text
//! min (8) | bulletproof
//! ```
//!
//! The output's blinding factor is the rewind nonce: whoever can derive
//! the key recovers the value and the 20-byte message.

use std::fmt;

use secp256k1::SecretKey;
use secp256k1zkp as zkp;

use super::context::{Error, Secp};
use super::keys::key_from_hash;
use super::pedersen::Commitment;

/// Size of the message embedded in a proof
pub const PROOF_MSG_SIZE: usize = 20;

/// Largest serialized range proof
pub const MAX_PROOF_SIZE: usize = 8 + zkp::constants::MAX_PROOF_SIZE;

const DOMAIN_PRIVATE_NONCE: &[u8] = b"rangeproof/private-nonce";

/// Message carried inside a range proof. Trailing zero bytes do not
/// survive a rewind.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ProofMessage(Vec<u8>);

impl ProofMessage {
    pub fn empty() -> Self {
        ProofMessage(Vec::new())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() > PROOF_MSG_SIZE {
            return Err(Error::ProofMessageTooLong(bytes.len()));
        }
        Ok(ProofMessage(bytes.to_vec()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn to_zkp(&self) -> zkp::pedersen::ProofMessage {
        let mut padded = [0u8; PROOF_MSG_SIZE];
        padded[..self.0.len()].copy_from_slice(&self.0);
        zkp::pedersen::ProofMessage::from_bytes(&padded)
    }

    fn from_recovered(bytes: &[u8]) -> Self {
        let bytes = &bytes[..bytes.len().min(PROOF_MSG_SIZE)];
        let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
        ProofMessage(bytes[..end].to_vec())
    }
}

impl fmt::Debug for ProofMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProofMessage({})", hex::encode(&self.0))
    }
}

/// Serialized range proof
#[derive(Clone, PartialEq, Eq)]
pub struct RangeProof {
    pub proof: Vec<u8>,
}

impl RangeProof {
    pub fn from_vec(proof: Vec<u8>) -> Self {
        RangeProof { proof }
    }

    pub fn len(&self) -> usize {
        self.proof.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proof.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.proof
    }

    /// Split into the minimum and the bulletproof itself
    fn parts(&self) -> Result<(u64, zkp::pedersen::RangeProof), Error> {
        if self.proof.len() <= 8 || self.proof.len() > MAX_PROOF_SIZE {
            return Err(Error::InvalidRangeProof);
        }
        let (min_bytes, inner) = self.proof.split_at(8);
        let mut min = [0u8; 8];
        min.copy_from_slice(min_bytes);

        let mut proof = [0u8; zkp::constants::MAX_PROOF_SIZE];
        proof[..inner.len()].copy_from_slice(inner);
        Ok((
            u64::from_be_bytes(min),
            zkp::pedersen::RangeProof {
                proof,
                plen: inner.len(),
            },
        ))
    }
}

impl fmt::Debug for RangeProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RangeProof({} bytes)", self.proof.len())
    }
}

/// Range a verified proof attests to, both ends inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofRange {
    pub min: u64,
    pub max: u64,
}

impl ProofRange {
    fn from_min(min: u64) -> Self {
        ProofRange {
            min,
            max: min.saturating_add(u64::MAX),
        }
    }
}

/// Outcome of rewinding a proof
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofInfo {
    pub success: bool,
    pub value: u64,
    pub message: ProofMessage,
    pub min: u64,
    pub max: u64,
}

impl ProofInfo {
    fn failed() -> Self {
        ProofInfo {
            success: false,
            value: 0,
            message: ProofMessage::empty(),
            min: 0,
            max: 0,
        }
    }
}

impl Secp {
    /// Commitment minus `min·H`, the thing the bulletproof covers
    fn proof_base(&self, commit: Commitment, min: u64) -> Result<Commitment, Error> {
        if min == 0 {
            return Ok(commit);
        }
        let base = self.commit_sum(vec![commit], vec![self.commit_value(min)?])?;
        if base.is_zero() {
            return Err(Error::InvalidRangeProof);
        }
        Ok(base)
    }

    /// Prove that `commit` (made with `blind`) hides `value >= min`, with
    /// `message` recoverable by rewinding with `blind` as nonce
    pub fn range_proof(
        &self,
        min: u64,
        value: u64,
        blind: SecretKey,
        commit: Commitment,
        message: ProofMessage,
    ) -> Result<RangeProof, Error> {
        self.require_commit()?;
        if value < min {
            return Err(Error::ValueBelowMinimum { value, min });
        }
        let base = self.proof_base(commit, min)?;
        if self.commit(value - min, blind)? != base {
            return Err(Error::InvalidCommit);
        }
        let private_nonce =
            key_from_hash(&[DOMAIN_PRIVATE_NONCE, &blind.secret_bytes(), base.as_ref()]);

        let bulletproof = self.zkp().bullet_proof(
            value - min,
            self.zkp_key(&blind)?,
            self.zkp_key(&blind)?,
            self.zkp_key(&private_nonce)?,
            None,
            Some(message.to_zkp()),
        );

        let mut proof = Vec::with_capacity(8 + bulletproof.plen);
        proof.extend_from_slice(&min.to_be_bytes());
        proof.extend_from_slice(&bulletproof.proof[..bulletproof.plen]);
        Ok(RangeProof { proof })
    }

    /// Verify a proof against a commitment
    pub fn verify_range_proof(
        &self,
        commit: Commitment,
        proof: &RangeProof,
    ) -> Result<ProofRange, Error> {
        self.require_commit()?;
        let (min, bulletproof) = proof.parts()?;
        let base = self.proof_base(commit, min)?;
        self.zkp()
            .verify_bullet_proof(base.to_zkp(), bulletproof, None)
            .map_err(|_| Error::InvalidRangeProof)?;
        Ok(ProofRange::from_min(min))
    }

    /// Recover value and message from a proof with the blinding factor it
    /// was made with. `success` is false for any other nonce or commitment.
    pub fn rewind_range_proof(
        &self,
        commit: Commitment,
        proof: &RangeProof,
        nonce: SecretKey,
    ) -> Result<ProofInfo, Error> {
        self.require_commit()?;
        let Ok((min, bulletproof)) = proof.parts() else {
            return Ok(ProofInfo::failed());
        };
        let Ok(base) = self.proof_base(commit, min) else {
            return Ok(ProofInfo::failed());
        };
        let rewound =
            self.zkp()
                .rewind_bullet_proof(base.to_zkp(), self.zkp_key(&nonce)?, None, bulletproof);
        let info = match rewound {
            Ok(info) if info.success => info,
            _ => return Ok(ProofInfo::failed()),
        };

        // the nonce is the blinding factor, so it must reopen the base
        if self.commit(info.value, nonce)? != base {
            return Ok(ProofInfo::failed());
        }
        let Some(value) = info.value.checked_add(min) else {
            return Ok(ProofInfo::failed());
        };
        let range = ProofRange::from_min(min);
        Ok(ProofInfo {
            success: true,
            value,
            message: ProofMessage::from_recovered(info.message.as_bytes()),
            min: range.min,
            max: range.max,
        })
    }
}
