//! Transactions and their parts
//!
//! A transaction destroys inputs and creates outputs without revealing
//! any amount. It balances when the output commitments, minus the input
//! commitments, plus the fee, leave only a multiple of G; the signature
//! over that excess proves the builder knew the blinding factors.

use std::fmt;

use bitflags::bitflags;
use log::debug;
use secp256k1::ecdsa::Signature;
use thiserror::Error;

use super::ser::{self, read_and_verify_sorted, write_sorted, Readable, Reader, Writeable, Writer};
use super::Committed;
use crate::consensus::MAX_BLOCK_INPUTS;
use crate::crypto::{
    self, hash160, message_from_slice, signature_from_der, Commitment, Message, RangeProof, Secp,
    MAX_SIGNATURE_SIZE,
};
use crate::keychain::{Identifier, Keychain};

/// Size of a switch commitment hash
pub const SWITCH_COMMIT_HASH_SIZE: usize = 20;

// =============================================================================
// Transaction Errors
// =============================================================================

/// Transaction validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Odd fee: {0} (fees must be even, half is burned)")]
    OddFee(u64),
    #[error("Too many inputs: {count} (max: {max})")]
    TooManyInputs { count: usize, max: usize },
    #[error("Secp error: {0}")]
    Secp(#[from] crypto::Error),
}

bitflags! {
    /// Options for an output's structure or use
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OutputFeatures: u8 {
        /// No flags
        const DEFAULT_OUTPUT = 0b0000_0000;
        /// Output is a coinbase output, subject to maturity
        const COINBASE_OUTPUT = 0b0000_0001;
    }
}

bitflags! {
    /// Options for a kernel's structure or use
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct KernelFeatures: u8 {
        /// No flags
        const DEFAULT_KERNEL = 0b0000_0000;
        /// Kernel matching a coinbase output
        const COINBASE_KERNEL = 0b0000_0001;
    }
}

/// Message a kernel signature commits to: a 32-byte buffer holding the fee
/// at offset 15 and the lock height at offset 23, both big-endian
pub fn kernel_sig_msg(fee: u64, lock_height: u64) -> [u8; 32] {
    let mut msg = [0u8; 32];
    msg[15..23].copy_from_slice(&fee.to_be_bytes());
    msg[23..31].copy_from_slice(&lock_height.to_be_bytes());
    msg
}

/// Verify `sig` against the excess commitment taken as a public key. The
/// commitment fixes x but the signer's y parity is unknown, so both
/// candidate keys are tried.
pub fn verify_excess(
    secp: &Secp,
    msg: &Message,
    sig: &Signature,
    excess: &Commitment,
) -> Result<(), crypto::Error> {
    for pubkey in excess.to_pubkey_candidates()? {
        match secp.verify(msg, sig, &pubkey) {
            Ok(()) => return Ok(()),
            Err(crypto::Error::IncorrectSignature) => continue,
            Err(e) => return Err(e),
        }
    }
    Err(crypto::Error::IncorrectSignature)
}

// =============================================================================
// Switch commitment hash
// =============================================================================

/// HASH160 of an output's switch commitment
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SwitchCommitHash(pub [u8; SWITCH_COMMIT_HASH_SIZE]);

impl SwitchCommitHash {
    pub fn from_switch_commit(switch_commit: Commitment) -> SwitchCommitHash {
        SwitchCommitHash(hash160(&switch_commit.0))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for SwitchCommitHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SwitchCommitHash({})", self.to_hex())
    }
}

impl Writeable for SwitchCommitHash {
    fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
        writer.write_fixed_bytes(&self.0)
    }
}

impl Readable for SwitchCommitHash {
    fn read(reader: &mut dyn Reader) -> Result<SwitchCommitHash, ser::Error> {
        let bytes = reader.read_fixed_bytes(SWITCH_COMMIT_HASH_SIZE)?;
        let mut hash = [0u8; SWITCH_COMMIT_HASH_SIZE];
        hash.copy_from_slice(&bytes);
        Ok(SwitchCommitHash(hash))
    }
}

// =============================================================================
// Input
// =============================================================================

/// Reference to the output being spent, by commitment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Input(pub Commitment);

impl Input {
    pub fn commitment(&self) -> Commitment {
        self.0
    }
}

impl Writeable for Input {
    fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
        self.0.write(writer)
    }
}

impl Readable for Input {
    fn read(reader: &mut dyn Reader) -> Result<Input, ser::Error> {
        Ok(Input(Commitment::read(reader)?))
    }
}

// =============================================================================
// Output
// =============================================================================

/// A newly created output: a commitment to its value plus the proof that
/// the value is in range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    pub features: OutputFeatures,
    pub commit: Commitment,
    pub switch_commit_hash: SwitchCommitHash,
    pub proof: RangeProof,
}

impl Output {
    pub fn commitment(&self) -> Commitment {
        self.commit
    }

    pub fn switch_commit_hash(&self) -> SwitchCommitHash {
        self.switch_commit_hash
    }

    pub fn proof(&self) -> &RangeProof {
        &self.proof
    }

    pub fn is_coinbase(&self) -> bool {
        self.features.contains(OutputFeatures::COINBASE_OUTPUT)
    }

    /// Check the range proof against the commitment
    pub fn verify_proof(&self, secp: &Secp) -> Result<(), crypto::Error> {
        secp.verify_range_proof(self.commit, &self.proof).map(|_| ())
    }

    /// Value of this output if it was built from `key_id` on this
    /// keychain, by rewinding its range proof
    pub fn recover_value(&self, keychain: &Keychain, key_id: &Identifier) -> Option<u64> {
        match keychain.rewind_range_proof(key_id, self.commit, &self.proof) {
            Ok(info) if info.success => Some(info.value),
            _ => None,
        }
    }
}

impl Writeable for Output {
    fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
        writer.write_u8(self.features.bits())?;
        self.commit.write(writer)?;
        self.switch_commit_hash.write(writer)?;
        self.proof.write(writer)
    }
}

impl Readable for Output {
    fn read(reader: &mut dyn Reader) -> Result<Output, ser::Error> {
        let features =
            OutputFeatures::from_bits(reader.read_u8()?).ok_or(ser::Error::CorruptedData)?;
        Ok(Output {
            features,
            commit: Commitment::read(reader)?,
            switch_commit_hash: SwitchCommitHash::read(reader)?,
            proof: RangeProof::read(reader)?,
        })
    }
}

// =============================================================================
// Kernel
// =============================================================================

/// Proof that a transaction balances: the excess commitment and a
/// signature by it over the fee and lock height
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxKernel {
    pub features: KernelFeatures,
    pub fee: u64,
    pub lock_height: u64,
    pub excess: Commitment,
    /// DER encoded signature
    pub excess_sig: Vec<u8>,
}

impl TxKernel {
    pub fn is_coinbase(&self) -> bool {
        self.features.contains(KernelFeatures::COINBASE_KERNEL)
    }

    /// Check the excess signature over this kernel's fee and lock height
    pub fn verify(&self, secp: &Secp) -> Result<(), crypto::Error> {
        let msg = message_from_slice(&kernel_sig_msg(self.fee, self.lock_height))?;
        let sig = signature_from_der(&self.excess_sig)?;
        verify_excess(secp, &msg, &sig, &self.excess)
    }
}

impl Writeable for TxKernel {
    fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
        writer.write_u8(self.features.bits())?;
        writer.write_u64(self.fee)?;
        writer.write_u64(self.lock_height)?;
        self.excess.write(writer)?;
        writer.write_bytes(&self.excess_sig)
    }
}

impl Readable for TxKernel {
    fn read(reader: &mut dyn Reader) -> Result<TxKernel, ser::Error> {
        let features =
            KernelFeatures::from_bits(reader.read_u8()?).ok_or(ser::Error::CorruptedData)?;
        Ok(TxKernel {
            features,
            fee: reader.read_u64()?,
            lock_height: reader.read_u64()?,
            excess: Commitment::read(reader)?,
            excess_sig: reader.read_vec(MAX_SIGNATURE_SIZE)?,
        })
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// Inputs, outputs, fee and the excess signature proving they balance
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Transaction {
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
    pub fee: u64,
    pub lock_height: u64,
    /// DER encoded signature by the excess, empty until signed
    pub excess_sig: Vec<u8>,
}

impl Transaction {
    /// Transaction with nothing in it, the starting point for building
    pub fn empty() -> Transaction {
        Transaction::default()
    }

    pub fn new(inputs: Vec<Input>, outputs: Vec<Output>, fee: u64, lock_height: u64) -> Transaction {
        Transaction {
            inputs,
            outputs,
            fee,
            lock_height,
            excess_sig: Vec::new(),
        }
    }

    pub fn with_signature(self, sig: &Signature) -> Transaction {
        Transaction {
            excess_sig: sig.serialize_der().to_vec(),
            ..self
        }
    }

    pub fn with_input(self, input: Input) -> Transaction {
        let mut inputs = self.inputs;
        inputs.push(input);
        Transaction { inputs, ..self }
    }

    pub fn with_output(self, output: Output) -> Transaction {
        let mut outputs = self.outputs;
        outputs.push(output);
        Transaction { outputs, ..self }
    }

    pub fn with_fee(self, fee: u64) -> Transaction {
        Transaction { fee, ..self }
    }

    pub fn with_lock_height(self, lock_height: u64) -> Transaction {
        Transaction {
            lock_height,
            ..self
        }
    }

    /// Message the excess signature covers
    pub fn sig_msg(&self) -> [u8; 32] {
        kernel_sig_msg(self.fee, self.lock_height)
    }

    /// Recompute the excess from the commitments and check the signature
    /// against it, producing the kernel for this transaction
    pub fn verify_sig(&self, secp: &Secp) -> Result<TxKernel, Error> {
        let excess = self.sum_commitments(secp)?;
        let msg = message_from_slice(&self.sig_msg())?;
        let sig = signature_from_der(&self.excess_sig)?;
        verify_excess(secp, &msg, &sig, &excess)?;

        Ok(TxKernel {
            features: KernelFeatures::DEFAULT_KERNEL,
            fee: self.fee,
            lock_height: self.lock_height,
            excess,
            excess_sig: self.excess_sig.clone(),
        })
    }

    /// Full validation: even fee, input cap, range proofs and signature
    pub fn validate(&self, secp: &Secp) -> Result<TxKernel, Error> {
        if self.fee % 2 != 0 {
            debug!("rejecting transaction with odd fee {}", self.fee);
            return Err(Error::OddFee(self.fee));
        }
        if self.inputs.len() > MAX_BLOCK_INPUTS {
            return Err(Error::TooManyInputs {
                count: self.inputs.len(),
                max: MAX_BLOCK_INPUTS,
            });
        }
        // range proofs are checked while summing commitments
        self.verify_sig(secp)
    }
}

impl Committed for Transaction {
    fn inputs_committed(&self) -> &[Input] {
        &self.inputs
    }

    fn outputs_committed(&self) -> &[Output] {
        &self.outputs
    }

    fn overage(&self) -> i128 {
        i128::from(self.fee)
    }
}

impl Writeable for Transaction {
    fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
        writer.write_u64(self.fee)?;
        writer.write_u64(self.lock_height)?;
        writer.write_bytes(&self.excess_sig)?;
        writer.write_u64(self.inputs.len() as u64)?;
        writer.write_u64(self.outputs.len() as u64)?;
        write_sorted(writer, &self.inputs)?;
        write_sorted(writer, &self.outputs)
    }
}

impl Readable for Transaction {
    fn read(reader: &mut dyn Reader) -> Result<Transaction, ser::Error> {
        let fee = reader.read_u64()?;
        let lock_height = reader.read_u64()?;
        let excess_sig = reader.read_vec(MAX_SIGNATURE_SIZE)?;
        let input_len = reader.read_u64()?;
        let output_len = reader.read_u64()?;
        let inputs = read_and_verify_sorted(reader, input_len)?;
        let outputs = read_and_verify_sorted(reader, output_len)?;
        Ok(Transaction {
            inputs,
            outputs,
            fee,
            lock_height,
            excess_sig,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::build::{self, input, output, with_fee, with_lock_height};
    use crate::core::hash::Hashed;
    use crate::core::ser::{deserialize, ser_vec};

    fn keychain() -> Keychain {
        Keychain::from_seed(&[0x11u8; 32]).unwrap()
    }

    /// 5 + 3 in, 6 out, fee 2
    fn sample_tx(keychain: &Keychain) -> Transaction {
        let k1 = keychain.derive_key_id(1).unwrap();
        let k2 = keychain.derive_key_id(2).unwrap();
        let k3 = keychain.derive_key_id(3).unwrap();
        let (tx, _) = build::transaction(
            vec![input(5, k1), input(3, k2), output(6, k3), with_fee(2)],
            keychain,
        )
        .unwrap();
        tx
    }

    #[test]
    fn test_kernel_sig_msg_layout() {
        let msg = kernel_sig_msg(0x0102, 0x0304);
        assert_eq!(&msg[..15], &[0u8; 15]);
        assert_eq!(&msg[15..23], &0x0102u64.to_be_bytes());
        assert_eq!(&msg[23..31], &0x0304u64.to_be_bytes());
        assert_eq!(msg[31], 0);
        assert_eq!(kernel_sig_msg(0, 0), [0u8; 32]);
    }

    #[test]
    fn test_validate_and_kernel() {
        let keychain = keychain();
        let secp = keychain.secp();
        let tx = sample_tx(&keychain);
        let kernel = tx.validate(secp).unwrap();
        assert_eq!(kernel.fee, 2);
        assert_eq!(kernel.features, KernelFeatures::DEFAULT_KERNEL);
        assert_eq!(kernel.excess, tx.sum_commitments(secp).unwrap());
        assert!(kernel.verify(secp).is_ok());
    }

    #[test]
    fn test_odd_fee() {
        let keychain = keychain();
        let k1 = keychain.derive_key_id(1).unwrap();
        let k2 = keychain.derive_key_id(2).unwrap();
        let (tx, _) = build::transaction(
            vec![input(10, k1), output(7, k2), with_fee(3)],
            &keychain,
        )
        .unwrap();
        assert_eq!(tx.validate(keychain.secp()), Err(Error::OddFee(3)));
        // the signature itself is fine
        assert!(tx.verify_sig(keychain.secp()).is_ok());
    }

    #[test]
    fn test_unbalanced_tx_fails() {
        let keychain = keychain();
        let k1 = keychain.derive_key_id(1).unwrap();
        let k2 = keychain.derive_key_id(2).unwrap();
        let (tx, _) = build::transaction(
            vec![input(10, k1), output(9, k2), with_fee(2)],
            &keychain,
        )
        .unwrap();
        assert_eq!(
            tx.verify_sig(keychain.secp()),
            Err(Error::Secp(crypto::Error::IncorrectSignature))
        );
    }

    #[test]
    fn test_huge_fee_cannot_mint_value() {
        let keychain = keychain();
        let k1 = keychain.derive_key_id(1).unwrap();
        let k2 = keychain.derive_key_id(2).unwrap();
        // outputs exceed inputs by 2
        let (tx, _) = build::transaction(
            vec![input(10, k1), output(12, k2), with_fee(u64::MAX - 1)],
            &keychain,
        )
        .unwrap();
        assert_eq!(
            tx.validate(keychain.secp()),
            Err(Error::Secp(crypto::Error::IncorrectSignature))
        );
    }

    #[test]
    fn test_fee_near_u64_max_balances() {
        let keychain = keychain();
        let k1 = keychain.derive_key_id(1).unwrap();
        let k2 = keychain.derive_key_id(2).unwrap();
        let (tx, _) = build::transaction(
            vec![input(u64::MAX, k1), output(1, k2), with_fee(u64::MAX - 1)],
            &keychain,
        )
        .unwrap();
        let kernel = tx.validate(keychain.secp()).unwrap();
        assert_eq!(kernel.fee, u64::MAX - 1);
        assert_eq!(tx.overage(), i128::from(u64::MAX - 1));
    }

    #[test]
    fn test_tampered_fee_fails() {
        let keychain = keychain();
        let tx = sample_tx(&keychain).with_fee(4);
        assert!(tx.verify_sig(keychain.secp()).is_err());
    }

    #[test]
    fn test_lock_height_is_signed() {
        let keychain = keychain();
        let k1 = keychain.derive_key_id(1).unwrap();
        let k2 = keychain.derive_key_id(2).unwrap();
        let (tx, _) = build::transaction(
            vec![input(10, k1), output(8, k2), with_fee(2), with_lock_height(5)],
            &keychain,
        )
        .unwrap();
        let kernel = tx.validate(keychain.secp()).unwrap();
        assert_eq!(kernel.lock_height, 5);

        let moved = tx.with_lock_height(6);
        assert!(moved.verify_sig(keychain.secp()).is_err());
    }

    #[test]
    fn test_swapped_output_commitment_fails() {
        let keychain = keychain();
        let secp = keychain.secp();
        let mut tx = sample_tx(&keychain);
        let other = keychain.derive_key_id(9).unwrap();
        tx.outputs[0].commit = keychain.commit(6, &other).unwrap();
        // the old proof no longer matches the new commitment
        assert_eq!(
            tx.validate(secp),
            Err(Error::Secp(crypto::Error::InvalidRangeProof))
        );
    }

    #[test]
    fn test_too_many_inputs() {
        let keychain = keychain();
        let mut tx = sample_tx(&keychain);
        let filler = tx.inputs[0];
        tx.inputs = vec![filler; MAX_BLOCK_INPUTS + 1];
        assert_eq!(
            tx.validate(keychain.secp()),
            Err(Error::TooManyInputs {
                count: MAX_BLOCK_INPUTS + 1,
                max: MAX_BLOCK_INPUTS
            })
        );
    }

    #[test]
    fn test_transaction_roundtrip() {
        let keychain = keychain();
        let tx = sample_tx(&keychain);
        let bytes = ser_vec(&tx).unwrap();
        let back: Transaction = deserialize(&mut &bytes[..]).unwrap();

        assert_eq!(ser_vec(&back).unwrap(), bytes);
        assert_eq!(back.hash(), tx.hash());
        assert_eq!(back.fee, tx.fee);
        assert_eq!(back.excess_sig, tx.excess_sig);
        assert!(back.validate(keychain.secp()).is_ok());
    }

    #[test]
    fn test_out_of_order_inputs_rejected() {
        let keychain = keychain();
        let mut tx = sample_tx(&keychain);
        tx.inputs.sort_by_key(|input| input.hash());
        tx.inputs.reverse();

        // hand-write the inputs in descending order
        struct Unsorted<'a>(&'a Transaction);
        impl<'a> Writeable for Unsorted<'a> {
            fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
                let tx = self.0;
                writer.write_u64(tx.fee)?;
                writer.write_u64(tx.lock_height)?;
                writer.write_bytes(&tx.excess_sig)?;
                writer.write_u64(tx.inputs.len() as u64)?;
                writer.write_u64(tx.outputs.len() as u64)?;
                for input in &tx.inputs {
                    input.write(writer)?;
                }
                write_sorted(writer, &tx.outputs)
            }
        }
        let bytes = ser_vec(&Unsorted(&tx)).unwrap();
        assert_eq!(
            deserialize::<Transaction>(&mut &bytes[..]),
            Err(ser::Error::BadlySorted)
        );
    }

    #[test]
    fn test_output_and_kernel_roundtrip() {
        let keychain = keychain();
        let secp = keychain.secp();
        let tx = sample_tx(&keychain);
        let output = tx.outputs[0].clone();
        let bytes = ser_vec(&output).unwrap();
        let back: Output = deserialize(&mut &bytes[..]).unwrap();
        assert_eq!(back, output);
        assert_eq!(ser_vec(&back).unwrap(), bytes);

        let kernel = tx.verify_sig(secp).unwrap();
        let bytes = ser_vec(&kernel).unwrap();
        let back: TxKernel = deserialize(&mut &bytes[..]).unwrap();
        assert_eq!(back, kernel);
        assert_eq!(back.hash(), kernel.hash());
    }

    #[test]
    fn test_bad_feature_bits_rejected() {
        let keychain = keychain();
        let tx = sample_tx(&keychain);
        let mut bytes = ser_vec(&tx.outputs[0]).unwrap();
        bytes[0] = 0x80;
        assert_eq!(
            deserialize::<Output>(&mut &bytes[..]),
            Err(ser::Error::CorruptedData)
        );
    }

    #[test]
    fn test_recover_value() {
        let keychain = keychain();
        let tx = sample_tx(&keychain);
        let k3 = keychain.derive_key_id(3).unwrap();
        let k1 = keychain.derive_key_id(1).unwrap();
        assert_eq!(tx.outputs[0].recover_value(&keychain, &k3), Some(6));
        assert_eq!(tx.outputs[0].recover_value(&keychain, &k1), None);
    }

    #[test]
    fn test_switch_commit_hash() {
        let keychain = keychain();
        let tx = sample_tx(&keychain);
        let k3 = keychain.derive_key_id(3).unwrap();
        let switch = keychain.switch_commit(&k3).unwrap();
        assert_eq!(
            tx.outputs[0].switch_commit_hash,
            SwitchCommitHash::from_switch_commit(switch)
        );
    }

    #[test]
    fn test_verify_needs_capability() {
        let keychain = keychain();
        let tx = sample_tx(&keychain);
        let kernel = tx.verify_sig(keychain.secp()).unwrap();
        let sign_only = keychain.secp().restricted(crypto::ContextFlag::SignOnly);
        assert_eq!(
            kernel.verify(&sign_only),
            Err(crypto::Error::IncapableContext)
        );
    }
}
