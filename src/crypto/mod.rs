//! Commitment and signature primitives
//!
//! This module provides:
//! - A capability-tagged secp256k1 handle (`Secp`, `ContextFlag`)
//! - Pedersen commitments and their arithmetic, via `secp256k1zkp`
//! - Rewindable bulletproof range proofs
//! - ECDSA signing over blinded excess keys
//! - SHA-256 / HASH160 / HMAC helpers

pub mod context;
pub mod hash;
pub mod keys;
pub mod pedersen;
pub mod rangeproof;

pub use context::{ContextFlag, Error, Secp};
pub use hash::{hash160, hmac_sha256, hmac_sha512, sha256, sha256_hex};
pub use keys::{message_from_slice, signature_from_der, MAX_SIGNATURE_SIZE};
pub use pedersen::{Commitment, PEDERSEN_COMMITMENT_SIZE};
pub use rangeproof::{ProofInfo, ProofMessage, ProofRange, RangeProof, MAX_PROOF_SIZE, PROOF_MSG_SIZE};
pub use secp256k1::ecdsa::Signature;
pub use secp256k1::{Message, PublicKey, SecretKey};
