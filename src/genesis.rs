//! Genesis blocks
//!
//! A genesis block has no inputs, outputs or kernels. Its header fixes
//! the chain's starting time and difficulty.

use chrono::DateTime;

use crate::config::{ChainParams, ChainType};
use crate::core::{Block, BlockHeader, Difficulty, Proof};

/// Genesis block for the given chain parameters
pub fn genesis(params: &ChainParams) -> Block {
    let difficulty = Difficulty::from_num(params.genesis_difficulty);
    Block {
        header: BlockHeader {
            height: 0,
            timestamp: DateTime::from_timestamp(params.genesis_timestamp, 0).unwrap_or_default(),
            nonce: 0,
            pow: Proof::zero(params.proof_size),
            difficulty,
            total_difficulty: difficulty,
            ..BlockHeader::default()
        },
        ..Block::default()
    }
}

pub fn genesis_dev() -> Block {
    genesis(&ChainParams::for_chain(ChainType::Development))
}

pub fn genesis_testnet() -> Block {
    genesis(&ChainParams::for_chain(ChainType::Testnet))
}

pub fn genesis_main() -> Block {
    genesis(&ChainParams::for_chain(ChainType::Mainnet))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hash::ZERO_HASH;
    use crate::keychain::Keychain;

    #[test]
    fn test_genesis_headers() {
        let dev = genesis_dev();
        assert_eq!(dev.header.height, 0);
        assert_eq!(dev.header.previous, ZERO_HASH);
        assert_eq!(dev.header.pow.proof_size(), 12);
        assert_eq!(dev.header.timestamp.timestamp(), 1_497_484_800);
        assert!(dev.inputs.is_empty() && dev.outputs.is_empty() && dev.kernels.is_empty());

        assert_ne!(genesis_testnet().hash(), genesis_main().hash());
        assert_eq!(genesis_dev().hash(), dev.hash());
    }

    #[test]
    fn test_first_block_on_genesis() {
        let keychain = Keychain::from_seed(&[0x51u8; 32]).unwrap();
        let key_id = keychain.derive_key_id(1).unwrap();
        let genesis = genesis_testnet();
        let block = Block::new(&genesis.header, vec![], &keychain, &key_id).unwrap();

        assert_eq!(block.header.height, 1);
        assert_eq!(block.header.previous, genesis.hash());
        assert_eq!(
            block.header.total_difficulty,
            genesis.header.pow.to_difficulty() + genesis.header.total_difficulty
        );
        block.validate(keychain.secp()).unwrap();
    }
}
