//! Blinding factors and the running sum kept while building a transaction

use std::fmt;

use secp256k1::SecretKey;

use super::extkey::{ExtKeyError, Identifier};

/// A secret scalar blinding a commitment
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct BlindingFactor(SecretKey);

impl BlindingFactor {
    pub fn new(secret_key: SecretKey) -> BlindingFactor {
        BlindingFactor(secret_key)
    }

    pub fn secret_key(&self) -> SecretKey {
        self.0
    }

    pub fn from_slice(data: &[u8]) -> Result<BlindingFactor, ExtKeyError> {
        SecretKey::from_slice(data)
            .map(BlindingFactor)
            .map_err(|_| ExtKeyError::InvalidSliceSize(data.len()))
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.secret_bytes()
    }
}

impl fmt::Debug for BlindingFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BlindingFactor(..)")
    }
}

/// Identifiers and opaque blinding factors to be summed into one excess,
/// positives for outputs, negatives for inputs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlindSum {
    pub positive_key_ids: Vec<Identifier>,
    pub negative_key_ids: Vec<Identifier>,
    pub positive_blinding_factors: Vec<BlindingFactor>,
    pub negative_blinding_factors: Vec<BlindingFactor>,
}

impl BlindSum {
    pub fn new() -> BlindSum {
        BlindSum::default()
    }

    pub fn add_key_id(mut self, key_id: Identifier) -> BlindSum {
        self.positive_key_ids.push(key_id);
        self
    }

    pub fn sub_key_id(mut self, key_id: Identifier) -> BlindSum {
        self.negative_key_ids.push(key_id);
        self
    }

    pub fn add_blinding_factor(mut self, blind: BlindingFactor) -> BlindSum {
        self.positive_blinding_factors.push(blind);
        self
    }

    pub fn sub_blinding_factor(mut self, blind: BlindingFactor) -> BlindSum {
        self.negative_blinding_factors.push(blind);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.positive_key_ids.is_empty()
            && self.negative_key_ids.is_empty()
            && self.positive_blinding_factors.is_empty()
            && self.negative_blinding_factors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blinding_factor_bytes() {
        let bf = BlindingFactor::from_slice(&[9u8; 32]).unwrap();
        assert_eq!(bf.to_bytes(), [9u8; 32]);
        assert!(BlindingFactor::from_slice(&[0u8; 32]).is_err());
        assert!(BlindingFactor::from_slice(&[1u8; 31]).is_err());
        assert_eq!(format!("{:?}", bf), "BlindingFactor(..)");
    }

    #[test]
    fn test_blind_sum_accumulates() {
        let id = Identifier::from_bytes(&[1u8; 10]).unwrap();
        let bf = BlindingFactor::from_slice(&[2u8; 32]).unwrap();
        let sum = BlindSum::new()
            .add_key_id(id)
            .sub_key_id(id)
            .add_blinding_factor(bf);
        assert_eq!(sum.positive_key_ids, vec![id]);
        assert_eq!(sum.negative_key_ids, vec![id]);
        assert_eq!(sum.positive_blinding_factors.len(), 1);
        assert!(sum.negative_blinding_factors.is_empty());
        assert!(!sum.is_empty());
        assert!(BlindSum::new().is_empty());
    }
}
