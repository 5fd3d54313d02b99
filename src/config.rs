//! Chain configuration
//!
//! Consensus constants live in [`crate::consensus`] and never change at
//! runtime. What does vary between networks (proof size, coinbase
//! maturity, genesis) is collected in [`ChainParams`].

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::consensus::{COINBASE_MATURITY, MINIMUM_DIFFICULTY};
use crate::core::pow::MAX_PROOF_NONCES;

/// Which network to run against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainType {
    /// Local development chain, short proofs and quick maturity
    #[default]
    Development,
    /// Public test network
    Testnet,
    /// Main network
    Mainnet,
}

/// Parameters that differ per network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainParams {
    pub chain_type: ChainType,
    /// Number of nonces in a proof of work
    pub proof_size: usize,
    /// Blocks before a coinbase output may be spent
    pub coinbase_maturity: u64,
    /// Genesis timestamp, seconds since the epoch
    pub genesis_timestamp: i64,
    /// Difficulty of the genesis block
    pub genesis_difficulty: u64,
}

impl ChainParams {
    pub fn for_chain(chain_type: ChainType) -> Self {
        match chain_type {
            ChainType::Development => Self {
                chain_type,
                proof_size: 12,
                coinbase_maturity: 3,
                genesis_timestamp: 1_497_484_800,
                genesis_difficulty: MINIMUM_DIFFICULTY,
            },
            ChainType::Testnet => Self {
                chain_type,
                proof_size: MAX_PROOF_NONCES,
                coinbase_maturity: COINBASE_MATURITY,
                genesis_timestamp: 1_510_790_400,
                genesis_difficulty: 1_000,
            },
            ChainType::Mainnet => Self {
                chain_type,
                proof_size: MAX_PROOF_NONCES,
                coinbase_maturity: COINBASE_MATURITY,
                genesis_timestamp: 1_514_764_800,
                genesis_difficulty: 1_000,
            },
        }
    }
}

impl Default for ChainParams {
    fn default() -> Self {
        Self::for_chain(ChainType::default())
    }
}
