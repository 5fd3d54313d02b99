//! Mimble Core: a confidential-transaction ledger core in Rust
//!
//! Amounts are hidden behind Pedersen commitments; a transaction proves
//! it balances by commitment arithmetic and a signature by its excess.
//! This crate provides:
//! - Commitment, range proof and signature primitives over secp256k1
//! - A deterministic keychain that never stores secret keys
//! - Transactions, build combinators for joint construction, and kernels
//! - Blocks with coinbase accounting, cut-through and validation
//! - Consensus constants and difficulty retargeting
//!
//! # Example
//!
//! ```rust
//! use mimble_core::core::build::{input, output, transaction, with_fee};
//! use mimble_core::core::{Block, BlockHeader};
//! use mimble_core::keychain::Keychain;
//!
//! let keychain = Keychain::from_seed(&[1u8; 32]).unwrap();
//! let k1 = keychain.derive_key_id(1).unwrap();
//! let k2 = keychain.derive_key_id(2).unwrap();
//! let k3 = keychain.derive_key_id(3).unwrap();
//!
//! // spend 10, keep 8, pay 2 in fees
//! let (tx, _) = transaction(vec![input(10, k1), output(8, k2), with_fee(2)], &keychain).unwrap();
//! tx.validate(keychain.secp()).unwrap();
//!
//! let block = Block::new(&BlockHeader::default(), vec![&tx], &keychain, &k3).unwrap();
//! block.validate(keychain.secp()).unwrap();
//! ```

pub mod cli;
pub mod config;
pub mod consensus;
pub mod core;
pub mod crypto;
pub mod genesis;
pub mod keychain;

// Re-export commonly used types
pub use config::{ChainParams, ChainType};
pub use self::core::{
    Block, BlockHeader, Committed, Difficulty, Hash, Hashed, Input, Output, Transaction, TxKernel,
};
pub use crypto::{Commitment, ContextFlag, Secp};
pub use keychain::{BlindingFactor, Identifier, Keychain};
