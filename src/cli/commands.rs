//! CLI commands for the ledger core
//!
//! Implements the command handlers behind the `mimble` binary.

use log::info;
use serde_json::json;

use crate::config::ChainParams;
use crate::consensus::{self, next_difficulty, TargetError};
use crate::core::build::{input, output, transaction, with_fee, with_lock_height};
use crate::core::hash::Hashed;
use crate::core::ser::ser_vec;
use crate::core::{Block, Difficulty, Transaction};
use crate::genesis;
use crate::keychain::{Identifier, Keychain};

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Application state shared by all commands
pub struct AppState {
    pub params: ChainParams,
    pub keychain: Keychain,
}

impl AppState {
    /// Keychain from a hex seed, or a fresh random one
    pub fn new(params: ChainParams, seed: Option<&str>) -> CliResult<Self> {
        let keychain = match seed {
            Some(seed) => Keychain::from_seed(&hex::decode(seed)?)?,
            None => {
                info!("no seed given, using a random keychain");
                Keychain::from_random_seed()?
            }
        };
        Ok(Self { params, keychain })
    }

    fn key_ids(&self, count: u32) -> CliResult<Vec<Identifier>> {
        (1..=count)
            .map(|i| self.keychain.derive_key_id(i).map_err(Into::into))
            .collect()
    }
}

/// Show the root identifier and the first derived identifiers
pub fn cmd_keys(state: &AppState, count: u32) -> CliResult<()> {
    println!("🔑 Keychain");
    println!("   ├─ Root: {}", state.keychain.root_key_id());
    for (i, key_id) in state.key_ids(count)?.iter().enumerate() {
        println!("   ├─ #{}: {}", i + 1, key_id);
    }
    println!("   └─ {} identifiers derived", count);
    Ok(())
}

/// Build a transaction spending `inputs` into one output, minus `fee`
fn self_transfer(state: &AppState, inputs: &[u64], fee: u64, lock_height: u64) -> CliResult<Transaction> {
    let total: u64 = inputs.iter().sum();
    let change = total
        .checked_sub(fee)
        .ok_or_else(|| format!("fee {} exceeds inputs total {}", fee, total))?;

    let key_ids = state.key_ids(inputs.len() as u32 + 1)?;
    let mut elems: Vec<_> = inputs
        .iter()
        .zip(&key_ids)
        .map(|(value, key_id)| input(*value, *key_id))
        .collect();
    elems.push(output(change, key_ids[inputs.len()]));
    elems.push(with_fee(fee));
    elems.push(with_lock_height(lock_height));

    let (tx, _) = transaction(elems, &state.keychain)?;
    Ok(tx)
}

/// Build and validate a self-transfer, print its encoding and kernel
pub fn cmd_build_tx(state: &AppState, inputs: &[u64], fee: u64, lock_height: u64) -> CliResult<()> {
    if inputs.is_empty() {
        return Err("at least one input value is required".into());
    }
    let tx = self_transfer(state, inputs, fee, lock_height)?;
    let kernel = tx.validate(state.keychain.secp())?;
    let bytes = ser_vec(&tx)?;

    println!("🧾 Transaction");
    println!("   ├─ Hash: {}", tx.hash());
    println!("   ├─ Inputs: {}", tx.inputs.len());
    println!("   ├─ Outputs: {}", tx.outputs.len());
    println!("   ├─ Fee: {}", tx.fee);
    println!("   ├─ Excess: {}", kernel.excess);
    println!("   ├─ Size: {} bytes", bytes.len());
    println!("   └─ Encoding: {}", hex::encode(&bytes));
    Ok(())
}

/// Assemble a block on the chain's genesis and validate it
pub fn cmd_block(state: &AppState, with_tx: bool) -> CliResult<()> {
    let genesis = genesis::genesis(&state.params);
    let txs = if with_tx {
        vec![self_transfer(state, &[10, 11], 2, 0)?]
    } else {
        Vec::new()
    };
    let reward_key = state.keychain.derive_key_id(1_000)?;
    let block = Block::new(&genesis.header, txs.iter().collect(), &state.keychain, &reward_key)?;
    block.validate(state.keychain.secp())?;

    println!("🧱 Block #{}", block.header.height);
    println!("   ├─ Hash: {}", block.hash());
    println!("   ├─ Previous: {}", block.header.previous);
    println!("   ├─ Inputs: {}", block.inputs.len());
    println!("   ├─ Outputs: {}", block.outputs.len());
    println!("   ├─ Kernels: {}", block.kernels.len());
    println!("   ├─ Fees: {}", block.total_fees());
    println!("   ├─ Weight: {}/{}", block.weight(), consensus::MAX_BLOCK_WEIGHT);
    println!("   └─ Total difficulty: {}", block.header.total_difficulty);
    Ok(())
}

/// Parse `timestamp:difficulty` pairs
fn parse_history(history: &[String]) -> Vec<Result<(u64, Difficulty), TargetError>> {
    history
        .iter()
        .map(|entry| -> Result<(u64, Difficulty), TargetError> {
            let (ts, diff) = entry
                .split_once(':')
                .ok_or_else(|| TargetError(format!("expected timestamp:difficulty, got {}", entry)))?;
            let ts = ts
                .parse::<u64>()
                .map_err(|e| TargetError(format!("bad timestamp {}: {}", ts, e)))?;
            let diff = diff
                .parse::<u64>()
                .map_err(|e| TargetError(format!("bad difficulty {}: {}", diff, e)))?;
            Ok((ts, Difficulty::from_num(diff)))
        })
        .collect()
}

/// Next difficulty for a newest-first block history
pub fn cmd_difficulty(history: &[String]) -> CliResult<()> {
    let next = next_difficulty(parse_history(history))?;
    println!("🎯 Next difficulty: {}", next);
    Ok(())
}

/// Print consensus constants and chain parameters as JSON
pub fn cmd_params(params: &ChainParams) -> CliResult<()> {
    let out = json!({
        "chain": params,
        "consensus": {
            "block_time_sec": consensus::BLOCK_TIME_SEC,
            "reward": consensus::REWARD,
            "coinbase_maturity": consensus::COINBASE_MATURITY,
            "max_block_weight": consensus::MAX_BLOCK_WEIGHT,
            "max_block_inputs": consensus::MAX_BLOCK_INPUTS,
            "difficulty_adjust_window": consensus::DIFFICULTY_ADJUST_WINDOW,
            "median_time_window": consensus::MEDIAN_TIME_WINDOW,
            "minimum_difficulty": consensus::MINIMUM_DIFFICULTY,
        },
        "genesis": genesis::genesis(params).hash(),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
