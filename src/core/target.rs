//! Difficulty
//!
//! A difficulty is the inverse of a target: the larger it is, the fewer
//! hashes qualify. Total chain work is the sum of block difficulties.

use std::fmt;
use std::ops::{Add, Div, Mul, Sub};

use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};

use super::hash::Hash;
use super::ser::{self, Readable, Reader, Writeable, Writer};
use crate::consensus::MINIMUM_DIFFICULTY;

/// Work a block (or a chain of blocks) represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Difficulty {
    num: u64,
}

impl Difficulty {
    pub fn zero() -> Difficulty {
        Difficulty { num: 0 }
    }

    /// Lowest difficulty the retarget ever produces
    pub fn minimum() -> Difficulty {
        Difficulty {
            num: MINIMUM_DIFFICULTY,
        }
    }

    pub fn from_num(num: u64) -> Difficulty {
        Difficulty { num }
    }

    /// Difficulty a hash achieves: the maximum target divided by the
    /// hash's leading 8 bytes read as a big-endian integer
    pub fn from_hash(hash: &Hash) -> Difficulty {
        let target = BigEndian::read_u64(&hash.0[..8]);
        Difficulty {
            num: u64::MAX / target.max(1),
        }
    }

    pub fn into_num(self) -> u64 {
        self.num
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.num)
    }
}

impl Add for Difficulty {
    type Output = Difficulty;
    fn add(self, other: Difficulty) -> Difficulty {
        Difficulty {
            num: self.num.saturating_add(other.num),
        }
    }
}

impl Sub for Difficulty {
    type Output = Difficulty;
    fn sub(self, other: Difficulty) -> Difficulty {
        Difficulty {
            num: self.num.saturating_sub(other.num),
        }
    }
}

impl Mul for Difficulty {
    type Output = Difficulty;
    fn mul(self, other: Difficulty) -> Difficulty {
        Difficulty {
            num: self.num.saturating_mul(other.num),
        }
    }
}

impl Div for Difficulty {
    type Output = Difficulty;
    fn div(self, other: Difficulty) -> Difficulty {
        Difficulty {
            num: self.num / other.num.max(1),
        }
    }
}

impl Writeable for Difficulty {
    fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
        writer.write_u64(self.num)
    }
}

impl Readable for Difficulty {
    fn read(reader: &mut dyn Reader) -> Result<Difficulty, ser::Error> {
        Ok(Difficulty {
            num: reader.read_u64()?,
        })
    }
}
