//! Proof of work, as carried in block headers
//!
//! The proof is opaque to the ledger core: a list of solver nonces whose
//! hash determines the difficulty the block achieved. Solving and full
//! verification belong to the miner.

use std::fmt;

use super::hash::Hashed;
use super::ser::{self, Readable, Reader, Writeable, Writer};
use super::target::Difficulty;

/// Largest proof accepted from the wire
pub const MAX_PROOF_NONCES: usize = 42;

#[derive(Clone, PartialEq, Eq)]
pub struct Proof {
    pub nonces: Vec<u32>,
}

impl Proof {
    pub fn new(nonces: Vec<u32>) -> Proof {
        Proof { nonces }
    }

    /// Placeholder proof of `proof_size` zero nonces
    pub fn zero(proof_size: usize) -> Proof {
        Proof {
            nonces: vec![0; proof_size],
        }
    }

    pub fn proof_size(&self) -> usize {
        self.nonces.len()
    }

    /// Difficulty achieved by this proof
    pub fn to_difficulty(&self) -> Difficulty {
        Difficulty::from_hash(&self.hash())
    }
}

impl fmt::Debug for Proof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Proof({:?})", self.nonces)
    }
}

impl Writeable for Proof {
    fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
        writer.write_u64(self.nonces.len() as u64)?;
        for n in &self.nonces {
            writer.write_u32(*n)?;
        }
        Ok(())
    }
}

impl Readable for Proof {
    fn read(reader: &mut dyn Reader) -> Result<Proof, ser::Error> {
        let len = reader.read_u64()?;
        if len > MAX_PROOF_NONCES as u64 {
            return Err(ser::Error::TooLargeReadErr(format!(
                "proof of {} nonces, limit {}",
                len, MAX_PROOF_NONCES
            )));
        }
        let nonces = (0..len)
            .map(|_| reader.read_u32())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Proof { nonces })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ser::{deserialize, ser_vec};

    #[test]
    fn test_proof_encoding() {
        let proof = Proof::new(vec![1, 2, 0xdeadbeef]);
        let bytes = ser_vec(&proof).unwrap();
        assert_eq!(&bytes[..8], &3u64.to_be_bytes());
        assert_eq!(&bytes[16..], &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(bytes.len(), 8 + 3 * 4);

        let back: Proof = deserialize(&mut &bytes[..]).unwrap();
        assert_eq!(back, proof);
    }

    #[test]
    fn test_proof_too_large() {
        let bytes = ser_vec(&Proof::zero(MAX_PROOF_NONCES + 1)).unwrap();
        assert!(matches!(
            deserialize::<Proof>(&mut &bytes[..]),
            Err(ser::Error::TooLargeReadErr(_))
        ));
    }

    #[test]
    fn test_difficulty_follows_hash() {
        let a = Proof::zero(42);
        let b = Proof::new(vec![7; 42]);
        assert_eq!(a.to_difficulty(), a.to_difficulty());
        assert_eq!(a.to_difficulty(), Difficulty::from_hash(&a.hash()));
        assert_ne!(a.hash(), b.hash());
        assert!(a.to_difficulty() >= Difficulty::from_num(1));
    }
}
