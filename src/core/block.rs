//! Block implementation
//!
//! A block is not a list of transactions: it is the union of their inputs,
//! outputs and kernels plus one coinbase output and kernel, with any
//! output spent inside the block cut through. Validity is checked on the
//! union as a whole.

use std::collections::HashSet;

use chrono::{DateTime, SubsecRound, Utc};
use log::{debug, trace};
use rayon::prelude::*;
use thiserror::Error;

use super::hash::{Hash, Hashed, ZERO_HASH};
use super::pow::Proof;
use super::ser::{self, read_and_verify_sorted, write_sorted, Readable, Reader, Writeable, Writer};
use super::target::Difficulty;
use super::transaction::{
    self, Input, KernelFeatures, Output, OutputFeatures, SwitchCommitHash, Transaction, TxKernel,
};
use super::Committed;
use crate::consensus::{self, reward, REWARD};
use crate::crypto::{self, message_from_slice, Commitment, ProofMessage, Secp};
use crate::keychain::{self, Identifier, Keychain};

// =============================================================================
// Block Errors
// =============================================================================

/// Block validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Block weight {weight} exceeds maximum {max}")]
    WeightExceeded { weight: usize, max: usize },
    #[error("Kernel excesses do not match the block's commitment sum")]
    KernelSumMismatch,
    #[error("Coinbase outputs do not match coinbase kernels plus reward")]
    CoinbaseSumMismatch,
    #[error("Kernel lock height {lock_height} is above block height {height}")]
    KernelLockHeight { lock_height: u64, height: u64 },
    #[error("Kernel fee {0} is odd")]
    OddKernelFee(u64),
    #[error("Header version {version} is not valid at height {height}")]
    InvalidBlockVersion { version: u16, height: u64 },
    #[error("Secp error: {0}")]
    Secp(#[from] crypto::Error),
    #[error("Transaction error: {0}")]
    Transaction(#[from] transaction::Error),
    #[error("Keychain error: {0}")]
    Keychain(#[from] keychain::Error),
}

// =============================================================================
// Header
// =============================================================================

/// Chain linkage and proof of work metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    /// Protocol version, fixed per height by the fork schedule
    pub version: u16,
    pub height: u64,
    /// Hash of the previous header
    pub previous: Hash,
    /// Creation time, whole seconds
    pub timestamp: DateTime<Utc>,
    /// Root of the unspent output set
    pub utxo_root: Hash,
    /// Root of the range proof set
    pub range_proof_root: Hash,
    /// Root of the kernel set
    pub kernel_root: Hash,
    pub nonce: u64,
    pub pow: Proof,
    /// Difficulty this block was mined at
    pub difficulty: Difficulty,
    /// Sum of the difficulties of all previous blocks
    pub total_difficulty: Difficulty,
}

impl Default for BlockHeader {
    fn default() -> BlockHeader {
        BlockHeader {
            version: 1,
            height: 0,
            previous: ZERO_HASH,
            timestamp: DateTime::<Utc>::default(),
            utxo_root: ZERO_HASH,
            range_proof_root: ZERO_HASH,
            kernel_root: ZERO_HASH,
            nonce: 0,
            pow: Proof::new(Vec::new()),
            difficulty: Difficulty::minimum(),
            total_difficulty: Difficulty::minimum(),
        }
    }
}

impl Writeable for BlockHeader {
    fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
        writer.write_u16(self.version)?;
        writer.write_u64(self.height)?;
        self.previous.write(writer)?;
        writer.write_i64(self.timestamp.timestamp())?;
        self.utxo_root.write(writer)?;
        self.range_proof_root.write(writer)?;
        self.kernel_root.write(writer)?;
        writer.write_u64(self.nonce)?;
        self.difficulty.write(writer)?;
        self.total_difficulty.write(writer)?;
        self.pow.write(writer)
    }
}

impl Readable for BlockHeader {
    fn read(reader: &mut dyn Reader) -> Result<BlockHeader, ser::Error> {
        let version = reader.read_u16()?;
        let height = reader.read_u64()?;
        let previous = Hash::read(reader)?;
        let timestamp =
            DateTime::from_timestamp(reader.read_i64()?, 0).ok_or(ser::Error::CorruptedData)?;
        Ok(BlockHeader {
            version,
            height,
            previous,
            timestamp,
            utxo_root: Hash::read(reader)?,
            range_proof_root: Hash::read(reader)?,
            kernel_root: Hash::read(reader)?,
            nonce: reader.read_u64()?,
            difficulty: Difficulty::read(reader)?,
            total_difficulty: Difficulty::read(reader)?,
            pow: Proof::read(reader)?,
        })
    }
}

// =============================================================================
// Block
// =============================================================================

/// Header plus the cut-through union of its transactions
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Block {
    pub header: BlockHeader,
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
    pub kernels: Vec<TxKernel>,
}

impl Block {
    /// Block on top of `prev` holding `txs` and a coinbase paid to `key_id`
    pub fn new(
        prev: &BlockHeader,
        txs: Vec<&Transaction>,
        keychain: &Keychain,
        key_id: &Identifier,
    ) -> Result<Block, Error> {
        let fees = txs.iter().fold(0u64, |acc, tx| acc.saturating_add(tx.fee));
        let (reward_out, reward_kern) = Block::reward_output(keychain, key_id, fees)?;
        Block::with_reward(keychain.secp(), prev, txs, reward_out, reward_kern)
    }

    /// Block on top of `prev` from already built transactions and reward.
    /// Every transaction's signature is checked; the result is compacted.
    pub fn with_reward(
        secp: &Secp,
        prev: &BlockHeader,
        txs: Vec<&Transaction>,
        reward_out: Output,
        reward_kern: TxKernel,
    ) -> Result<Block, Error> {
        let mut kernels = txs
            .par_iter()
            .map(|tx| tx.verify_sig(secp))
            .collect::<Result<Vec<_>, _>>()?;
        kernels.push(reward_kern);

        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        for tx in &txs {
            inputs.extend(tx.inputs.iter().copied());
            outputs.extend(tx.outputs.iter().cloned());
        }
        outputs.push(reward_out);

        let height = prev.height + 1;
        let header = BlockHeader {
            version: consensus::header_version(height),
            height,
            previous: prev.hash(),
            timestamp: Utc::now().trunc_subsecs(0),
            difficulty: prev.difficulty,
            total_difficulty: prev.pow.to_difficulty() + prev.total_difficulty,
            ..BlockHeader::default()
        };

        debug!(
            "assembled block at height {} from {} transactions",
            height,
            txs.len()
        );
        Ok(Block {
            header,
            inputs,
            outputs,
            kernels,
        }
        .compact())
    }

    /// Coinbase output and kernel for a block collecting `fees`. The
    /// kernel signs the all-zero message.
    pub fn reward_output(
        keychain: &Keychain,
        key_id: &Identifier,
        fees: u64,
    ) -> Result<(Output, TxKernel), keychain::Error> {
        let secp = keychain.secp();
        let value = reward(fees);

        let commit = keychain.commit(value, key_id)?;
        let switch_commit = keychain.switch_commit(key_id)?;
        let proof = keychain.range_proof(value, key_id, commit, ProofMessage::empty())?;
        let output = Output {
            features: OutputFeatures::COINBASE_OUTPUT,
            commit,
            switch_commit_hash: SwitchCommitHash::from_switch_commit(switch_commit),
            proof,
        };

        let over_commit = secp.commit_value(value)?;
        let excess = secp.commit_sum(vec![commit], vec![over_commit])?;

        let msg = message_from_slice(&[0; 32])?;
        let sig = keychain.sign(&msg, key_id)?;
        let kernel = TxKernel {
            features: KernelFeatures::COINBASE_KERNEL,
            fee: 0,
            lock_height: 0,
            excess,
            excess_sig: sig.serialize_der().to_vec(),
        };
        Ok((output, kernel))
    }

    /// Hash of the header, which identifies the block
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    pub fn total_fees(&self) -> u64 {
        self.kernels
            .iter()
            .fold(0u64, |acc, kernel| acc.saturating_add(kernel.fee))
    }

    pub fn weight(&self) -> usize {
        consensus::block_weight(self.inputs.len(), self.outputs.len(), self.kernels.len())
    }

    /// Cut through: drop every input whose commitment is also a
    /// non-coinbase output, and that output with it. Surviving inputs and
    /// outputs keep their relative order.
    pub fn compact(&self) -> Block {
        let in_set: HashSet<Commitment> = self.inputs.iter().map(|i| i.commitment()).collect();
        let out_set: HashSet<Commitment> = self
            .outputs
            .iter()
            .filter(|o| !o.is_coinbase())
            .map(|o| o.commitment())
            .collect();
        let to_cut: HashSet<Commitment> = in_set.intersection(&out_set).copied().collect();

        let inputs: Vec<Input> = self
            .inputs
            .iter()
            .filter(|i| !to_cut.contains(&i.commitment()))
            .copied()
            .collect();
        let outputs: Vec<Output> = self
            .outputs
            .iter()
            .filter(|o| o.is_coinbase() || !to_cut.contains(&o.commitment()))
            .cloned()
            .collect();

        trace!(
            "compacted block {}: cut {} input/output pairs",
            self.header.height,
            to_cut.len()
        );
        Block {
            header: self.header.clone(),
            inputs,
            outputs,
            kernels: self.kernels.clone(),
        }
    }

    /// Union of this block and `other`, compacted, under this block's header
    pub fn merge(&self, other: Block) -> Block {
        let mut inputs = self.inputs.clone();
        let mut outputs = self.outputs.clone();
        let mut kernels = self.kernels.clone();
        inputs.extend(other.inputs);
        outputs.extend(other.outputs);
        kernels.extend(other.kernels);

        Block {
            header: self.header.clone(),
            inputs,
            outputs,
            kernels,
        }
        .compact()
    }

    /// Full validation: header version, weight, coinbase and kernels
    pub fn validate(&self, secp: &Secp) -> Result<(), Error> {
        if !consensus::valid_header_version(self.header.height, self.header.version) {
            return Err(Error::InvalidBlockVersion {
                version: self.header.version,
                height: self.header.height,
            });
        }
        if consensus::exceeds_weight(self.inputs.len(), self.outputs.len(), self.kernels.len()) {
            return Err(Error::WeightExceeded {
                weight: self.weight(),
                max: consensus::MAX_BLOCK_WEIGHT,
            });
        }
        self.verify_coinbase(secp)?;
        self.verify_kernels(secp, false)
    }

    /// Check kernel lock heights and fees, and that the kernel excesses
    /// account for the whole block. Signatures are checked unless
    /// `skip_sig` is set.
    pub fn verify_kernels(&self, secp: &Secp, skip_sig: bool) -> Result<(), Error> {
        for kernel in &self.kernels {
            if kernel.lock_height > self.header.height {
                debug!(
                    "kernel lock height {} above block height {}",
                    kernel.lock_height, self.header.height
                );
                return Err(Error::KernelLockHeight {
                    lock_height: kernel.lock_height,
                    height: self.header.height,
                });
            }
            if !kernel.is_coinbase() && kernel.fee % 2 != 0 {
                return Err(Error::OddKernelFee(kernel.fee));
            }
        }

        let io_sum = self.sum_commitments(secp)?;
        let kernel_sum = secp.commit_sum(self.kernels.iter().map(|k| k.excess).collect(), vec![])?;
        if io_sum != kernel_sum {
            debug!("kernel sum mismatch in block {}", self.header.height);
            return Err(Error::KernelSumMismatch);
        }

        if !skip_sig {
            self.kernels
                .par_iter()
                .try_for_each(|kernel| kernel.verify(secp))?;
        }
        Ok(())
    }

    /// Check that coinbase outputs, less the reward, equal the coinbase
    /// kernel excesses
    pub fn verify_coinbase(&self, secp: &Secp) -> Result<(), Error> {
        let cb_outs: Vec<Commitment> = self
            .outputs
            .iter()
            .filter(|o| o.is_coinbase())
            .map(|o| o.commitment())
            .collect();
        let cb_kerns: Vec<Commitment> = self
            .kernels
            .iter()
            .filter(|k| k.is_coinbase())
            .map(|k| k.excess)
            .collect();

        let over_commit = secp.commit_value(reward(self.total_fees()))?;
        let out_adjust_sum = secp.commit_sum(cb_outs, vec![over_commit])?;
        let kerns_sum = secp.commit_sum(cb_kerns, vec![])?;

        if kerns_sum != out_adjust_sum {
            debug!("coinbase sum mismatch in block {}", self.header.height);
            return Err(Error::CoinbaseSumMismatch);
        }
        Ok(())
    }
}

impl Committed for Block {
    fn inputs_committed(&self) -> &[Input] {
        &self.inputs
    }

    fn outputs_committed(&self) -> &[Output] {
        &self.outputs
    }

    /// Half the fees are burned; the reward is value created from nothing
    fn overage(&self) -> i128 {
        let fees: u128 = self.kernels.iter().map(|k| u128::from(k.fee)).sum();
        // a sum of u64 fees halved stays well inside i128
        (fees / 2) as i128 - i128::from(REWARD)
    }
}

impl Writeable for Block {
    fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
        self.header.write(writer)?;
        writer.write_u64(self.inputs.len() as u64)?;
        writer.write_u64(self.outputs.len() as u64)?;
        writer.write_u64(self.kernels.len() as u64)?;
        write_sorted(writer, &self.inputs)?;
        write_sorted(writer, &self.outputs)?;
        write_sorted(writer, &self.kernels)
    }
}

impl Readable for Block {
    fn read(reader: &mut dyn Reader) -> Result<Block, ser::Error> {
        let header = BlockHeader::read(reader)?;
        let input_len = reader.read_u64()?;
        let output_len = reader.read_u64()?;
        let kernel_len = reader.read_u64()?;
        Ok(Block {
            header,
            inputs: read_and_verify_sorted(reader, input_len)?,
            outputs: read_and_verify_sorted(reader, output_len)?,
            kernels: read_and_verify_sorted(reader, kernel_len)?,
        })
    }
}
