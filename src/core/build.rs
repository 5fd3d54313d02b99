//! Transaction building combinators
//!
//! A transaction is described as a list of [`Append`] steps and folded
//! over an empty transaction and an empty [`BlindSum`]. Each step only
//! touches identifiers owned by the keychain it runs against, so two
//! parties can build one transaction together: the first hands over its
//! partial transaction and the sum of its blinding factors, the second
//! continues from there with [`initial_tx`] and [`with_excess`].
//!
//! ```no_run
//! use mimble_core::core::build::{input, output, transaction, with_fee};
//! use mimble_core::keychain::Keychain;
//!
//! let keychain = Keychain::from_random_seed().unwrap();
//! let k1 = keychain.derive_key_id(1).unwrap();
//! let k2 = keychain.derive_key_id(2).unwrap();
//! let (tx, _) = transaction(vec![input(10, k1), output(8, k2), with_fee(2)], &keychain).unwrap();
//! ```

use log::debug;

use super::transaction::{Input, Output, OutputFeatures, SwitchCommitHash, Transaction};
use crate::crypto::{message_from_slice, ProofMessage};
use crate::keychain::{self, BlindSum, BlindingFactor, Identifier, Keychain};

/// One step of a transaction build
#[derive(Debug, Clone)]
pub enum Append {
    /// Spend an output of `value` blinded by `key_id`
    Input { value: u64, key_id: Identifier },
    /// Create an output of `value` blinded by `key_id`
    Output { value: u64, key_id: Identifier },
    Fee(u64),
    LockHeight(u64),
    /// Start from an existing partial transaction
    InitialTx(Transaction),
    /// Add a blinding factor known only as a scalar
    Excess(BlindingFactor),
}

pub fn input(value: u64, key_id: Identifier) -> Append {
    Append::Input { value, key_id }
}

pub fn output(value: u64, key_id: Identifier) -> Append {
    Append::Output { value, key_id }
}

pub fn with_fee(fee: u64) -> Append {
    Append::Fee(fee)
}

pub fn with_lock_height(lock_height: u64) -> Append {
    Append::LockHeight(lock_height)
}

pub fn initial_tx(tx: Transaction) -> Append {
    Append::InitialTx(tx)
}

pub fn with_excess(excess: BlindingFactor) -> Append {
    Append::Excess(excess)
}

impl Append {
    /// Apply this step to the transaction and blinding sum built so far
    pub fn apply(
        self,
        keychain: &Keychain,
        (tx, sum): (Transaction, BlindSum),
    ) -> Result<(Transaction, BlindSum), keychain::Error> {
        match self {
            Append::Input { value, key_id } => {
                let commit = keychain.commit(value, &key_id)?;
                Ok((tx.with_input(Input(commit)), sum.sub_key_id(key_id)))
            }
            Append::Output { value, key_id } => {
                let commit = keychain.commit(value, &key_id)?;
                let switch_commit = keychain.switch_commit(&key_id)?;
                let proof = keychain.range_proof(value, &key_id, commit, ProofMessage::empty())?;
                let output = Output {
                    features: OutputFeatures::DEFAULT_OUTPUT,
                    commit,
                    switch_commit_hash: SwitchCommitHash::from_switch_commit(switch_commit),
                    proof,
                };
                Ok((tx.with_output(output), sum.add_key_id(key_id)))
            }
            Append::Fee(fee) => Ok((tx.with_fee(fee), sum)),
            Append::LockHeight(lock_height) => Ok((tx.with_lock_height(lock_height), sum)),
            Append::InitialTx(initial) => Ok((initial, sum)),
            Append::Excess(excess) => Ok((tx, sum.add_blinding_factor(excess))),
        }
    }
}

/// Fold the steps into a signed transaction. Also returns the summed
/// blinding factor, which is what a counterparty needs to continue the
/// transaction.
pub fn transaction(
    elems: Vec<Append>,
    keychain: &Keychain,
) -> Result<(Transaction, BlindingFactor), keychain::Error> {
    let (tx, sum) = elems
        .into_iter()
        .try_fold((Transaction::empty(), BlindSum::new()), |acc, elem| {
            elem.apply(keychain, acc)
        })?;
    let blind_sum = keychain.blind_sum(&sum)?;
    let msg = message_from_slice(&tx.sig_msg())?;
    let sig = keychain.sign_with_blinding(&msg, &blind_sum)?;

    debug!(
        "built transaction: {} inputs, {} outputs, fee {}",
        tx.inputs.len(),
        tx.outputs.len(),
        tx.fee
    );
    Ok((tx.with_signature(&sig), blind_sum))
}
