//! Capability-tagged handle over the secp256k1 context
//!
//! Every primitive operation goes through a [`Secp`] handle. The handle is
//! immutable and cheap to clone; its [`ContextFlag`] decides which
//! operations it may perform. Keys and signatures run on `secp256k1`,
//! commitments and bulletproofs on `secp256k1zkp`.

use std::fmt;
use std::sync::Arc;

use secp256k1::{All, Secp256k1};
use secp256k1zkp as zkp;
use thiserror::Error;

/// Errors raised by the commitment and signature primitives
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("Context lacks the capability for this operation")]
    IncapableContext,
    #[error("Invalid commitment")]
    InvalidCommit,
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Invalid secret key")]
    InvalidSecretKey,
    #[error("Invalid signature encoding")]
    InvalidSignature,
    #[error("Signature does not verify")]
    IncorrectSignature,
    #[error("Invalid message")]
    InvalidMessage,
    #[error("Invalid range proof")]
    InvalidRangeProof,
    #[error("Proof message too long: {0} bytes")]
    ProofMessageTooLong(usize),
    #[error("Value {value} below range proof minimum {min}")]
    ValueBelowMinimum { value: u64, min: u64 },
    #[error("Value {0} cannot be committed to")]
    ValueOutOfRange(i128),
    #[error("Secp256k1 error: {0}")]
    Secp256k1(#[from] secp256k1::Error),
}

/// Capabilities a [`Secp`] handle was created with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextFlag {
    /// No capabilities, every operation fails
    None,
    /// Signing only
    SignOnly,
    /// Signature verification only
    VerifyOnly,
    /// Signing and verification
    Full,
    /// Everything, including commitments and range proofs
    Commit,
}

impl ContextFlag {
    pub fn can_sign(self) -> bool {
        matches!(self, ContextFlag::SignOnly | ContextFlag::Full | ContextFlag::Commit)
    }

    pub fn can_verify(self) -> bool {
        matches!(self, ContextFlag::VerifyOnly | ContextFlag::Full | ContextFlag::Commit)
    }

    pub fn can_commit(self) -> bool {
        self == ContextFlag::Commit
    }
}

/// Shareable handle to the curve library
#[derive(Clone)]
pub struct Secp {
    ctx: Arc<Secp256k1<All>>,
    zkp: Arc<zkp::Secp256k1>,
    caps: ContextFlag,
}

impl Secp {
    /// Create a handle with the given capabilities
    pub fn with_caps(caps: ContextFlag) -> Self {
        Self {
            ctx: Arc::new(Secp256k1::new()),
            zkp: Arc::new(zkp::Secp256k1::with_caps(zkp::ContextFlag::Commit)),
            caps,
        }
    }

    /// Same underlying contexts, different capabilities
    pub fn restricted(&self, caps: ContextFlag) -> Self {
        Self {
            ctx: Arc::clone(&self.ctx),
            zkp: Arc::clone(&self.zkp),
            caps,
        }
    }

    pub fn caps(&self) -> ContextFlag {
        self.caps
    }

    pub(crate) fn ctx(&self) -> &Secp256k1<All> {
        &self.ctx
    }

    /// Commitment context. Callers check `require_commit` first.
    pub(crate) fn zkp(&self) -> &zkp::Secp256k1 {
        &self.zkp
    }

    /// The same secret key, for the commitment context
    pub(crate) fn zkp_key(&self, key: &secp256k1::SecretKey) -> Result<zkp::key::SecretKey, Error> {
        zkp::key::SecretKey::from_slice(&self.zkp, &key.secret_bytes())
            .map_err(|_| Error::InvalidSecretKey)
    }

    pub(crate) fn require_sign(&self) -> Result<(), Error> {
        if self.caps.can_sign() {
            Ok(())
        } else {
            Err(Error::IncapableContext)
        }
    }

    pub(crate) fn require_verify(&self) -> Result<(), Error> {
        if self.caps.can_verify() {
            Ok(())
        } else {
            Err(Error::IncapableContext)
        }
    }

    pub(crate) fn require_commit(&self) -> Result<(), Error> {
        if self.caps.can_commit() {
            Ok(())
        } else {
            Err(Error::IncapableContext)
        }
    }
}

impl fmt::Debug for Secp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secp").field("caps", &self.caps).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_matrix() {
        assert!(!ContextFlag::None.can_sign());
        assert!(!ContextFlag::None.can_verify());
        assert!(ContextFlag::SignOnly.can_sign());
        assert!(!ContextFlag::SignOnly.can_verify());
        assert!(ContextFlag::VerifyOnly.can_verify());
        assert!(!ContextFlag::VerifyOnly.can_commit());
        assert!(ContextFlag::Full.can_sign() && ContextFlag::Full.can_verify());
        assert!(!ContextFlag::Full.can_commit());
        assert!(ContextFlag::Commit.can_commit());
    }

    #[test]
    fn test_restricted_shares_context() {
        let secp = Secp::with_caps(ContextFlag::Commit);
        let verify = secp.restricted(ContextFlag::VerifyOnly);
        assert!(Arc::ptr_eq(&secp.ctx, &verify.ctx));
        assert!(Arc::ptr_eq(&secp.zkp, &verify.zkp));
        assert_eq!(verify.require_sign(), Err(Error::IncapableContext));
        assert!(verify.require_verify().is_ok());
    }
}
