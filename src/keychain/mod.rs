//! Key management
//!
//! - `extkey`: deterministic derivation tree and key identifiers
//! - `blind`: blinding factors and their running sums
//! - `keychain`: commitments, proofs and signatures from identifiers

pub mod blind;
pub mod extkey;
#[allow(clippy::module_inception)]
pub mod keychain;

pub use blind::{BlindSum, BlindingFactor};
pub use extkey::{ExtKeyError, ExtendedKey, Identifier, IDENTIFIER_SIZE};
pub use keychain::{Error, Keychain, KEY_DERIVATION_LIMIT};
