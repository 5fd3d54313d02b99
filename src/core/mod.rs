//! Core ledger data model
//!
//! This module contains:
//! - Binary encoding and canonical hashes (`ser`, `hash`)
//! - Transactions, outputs and kernels (`transaction`)
//! - Transaction building combinators (`build`)
//! - Blocks with compaction and validation (`block`)
//! - Difficulty and the opaque proof of work (`target`, `pow`)

pub mod block;
pub mod build;
pub mod hash;
pub mod pow;
pub mod ser;
pub mod target;
pub mod transaction;

use rayon::prelude::*;

use crate::crypto::{self, Commitment, Secp};

pub use block::{Block, BlockHeader};
pub use hash::{Hash, Hashed, ZERO_HASH};
pub use pow::Proof;
pub use target::Difficulty;
pub use transaction::{
    Input, KernelFeatures, Output, OutputFeatures, SwitchCommitHash, Transaction, TxKernel,
};

/// Something holding input and output commitments that, together with an
/// overage, should sum to an excess of pure blinding factors
pub trait Committed {
    fn inputs_committed(&self) -> &[Input];

    fn outputs_committed(&self) -> &[Output];

    /// Value leaving the set (positive) or entering it (negative) other
    /// than through inputs and outputs
    fn overage(&self) -> i128;

    /// Verify every output's range proof, then sum the output commitments
    /// and the overage minus the input commitments
    fn sum_commitments(&self, secp: &Secp) -> Result<Commitment, crypto::Error> {
        self.outputs_committed()
            .par_iter()
            .try_for_each(|output| output.verify_proof(secp))?;

        let mut input_commits: Vec<Commitment> =
            self.inputs_committed().iter().map(|i| i.commitment()).collect();
        let mut output_commits: Vec<Commitment> =
            self.outputs_committed().iter().map(|o| o.commitment()).collect();

        let overage = self.overage();
        if overage != 0 {
            let magnitude = u64::try_from(overage.unsigned_abs())
                .map_err(|_| crypto::Error::ValueOutOfRange(overage))?;
            let over_commit = secp.commit_value(magnitude)?;
            if overage < 0 {
                input_commits.push(over_commit);
            } else {
                output_commits.push(over_commit);
            }
        }

        secp.commit_sum(output_commits, input_commits)
    }
}
