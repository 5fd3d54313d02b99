//! Binary consensus encoding
//!
//! The encoding is fixed by protocol:
//! - integers are fixed width, big-endian
//! - variable length byte fields carry an 8-byte big-endian length prefix
//! - hashes, commitments and switch commitment hashes are fixed width
//! - collections of inputs, outputs and kernels are written in ascending
//!   order of their hashes, and that order is checked again on read
//!
//! Types opt in through [`Writeable`] and [`Readable`]; [`ser_vec`] and
//! [`deserialize`] are the entry points.

use std::io::{self, Read, Write};

use byteorder::{BigEndian, ByteOrder, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

use super::hash::Hashed;
use crate::consensus::VerifySortOrder;
use crate::crypto::{Commitment, RangeProof, MAX_PROOF_SIZE, PEDERSEN_COMMITMENT_SIZE};

/// Serialization errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("IO error: {0}")]
    IOErr(String),
    #[error("Unexpected data: expected {expected:?}, received {received:?}")]
    UnexpectedData { expected: Vec<u8>, received: Vec<u8> },
    #[error("Corrupted data")]
    CorruptedData,
    #[error("Read too large: {0}")]
    TooLargeReadErr(String),
    #[error("Collection is not sorted by hash")]
    BadlySorted,
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Error {
        Error::IOErr(e.to_string())
    }
}

/// Sink for the binary encoding
///
/// Only `write_fixed_bytes` is required; every other method encodes into
/// it.
pub trait Writer {
    fn write_fixed_bytes<T: AsRef<[u8]>>(&mut self, bytes: &T) -> Result<(), Error>;

    fn write_u8(&mut self, n: u8) -> Result<(), Error> {
        self.write_fixed_bytes(&[n])
    }

    fn write_u16(&mut self, n: u16) -> Result<(), Error> {
        let mut buf = [0; 2];
        BigEndian::write_u16(&mut buf, n);
        self.write_fixed_bytes(&buf)
    }

    fn write_u32(&mut self, n: u32) -> Result<(), Error> {
        let mut buf = [0; 4];
        BigEndian::write_u32(&mut buf, n);
        self.write_fixed_bytes(&buf)
    }

    fn write_u64(&mut self, n: u64) -> Result<(), Error> {
        let mut buf = [0; 8];
        BigEndian::write_u64(&mut buf, n);
        self.write_fixed_bytes(&buf)
    }

    fn write_i64(&mut self, n: i64) -> Result<(), Error> {
        let mut buf = [0; 8];
        BigEndian::write_i64(&mut buf, n);
        self.write_fixed_bytes(&buf)
    }

    /// Length-prefixed byte field
    fn write_bytes<T: AsRef<[u8]>>(&mut self, bytes: &T) -> Result<(), Error> {
        self.write_u64(bytes.as_ref().len() as u64)?;
        self.write_fixed_bytes(bytes)
    }
}

/// Source of the binary encoding
pub trait Reader {
    fn read_u8(&mut self) -> Result<u8, Error>;
    fn read_u16(&mut self) -> Result<u16, Error>;
    fn read_u32(&mut self) -> Result<u32, Error>;
    fn read_u64(&mut self) -> Result<u64, Error>;
    fn read_i64(&mut self) -> Result<i64, Error>;
    /// Length-prefixed byte field of at most `max_len` bytes
    fn read_vec(&mut self, max_len: usize) -> Result<Vec<u8>, Error>;
    fn read_fixed_bytes(&mut self, length: usize) -> Result<Vec<u8>, Error>;

    /// Consume one byte and fail unless it is `val`
    fn expect_u8(&mut self, val: u8) -> Result<u8, Error> {
        let b = self.read_u8()?;
        if b == val {
            Ok(b)
        } else {
            Err(Error::UnexpectedData {
                expected: vec![val],
                received: vec![b],
            })
        }
    }
}

pub trait Writeable {
    fn write<W: Writer>(&self, writer: &mut W) -> Result<(), Error>;
}

pub trait Readable: Sized {
    fn read(reader: &mut dyn Reader) -> Result<Self, Error>;
}

/// Decode a `Readable` from a byte source
pub fn deserialize<T: Readable>(source: &mut dyn Read) -> Result<T, Error> {
    let mut reader = BinReader { source };
    T::read(&mut reader)
}

/// Encode a `Writeable` into a byte sink
pub fn serialize<T: Writeable + ?Sized>(sink: &mut dyn Write, thing: &T) -> Result<(), Error> {
    let mut writer = BinWriter { sink };
    thing.write(&mut writer)
}

/// Encode a `Writeable` into a fresh byte vector
pub fn ser_vec<T: Writeable + ?Sized>(thing: &T) -> Result<Vec<u8>, Error> {
    let mut vec = Vec::new();
    serialize(&mut vec, thing)?;
    Ok(vec)
}

struct BinReader<'a> {
    source: &'a mut dyn Read,
}

impl<'a> Reader for BinReader<'a> {
    fn read_u8(&mut self) -> Result<u8, Error> {
        Ok(self.source.read_u8()?)
    }

    fn read_u16(&mut self) -> Result<u16, Error> {
        Ok(self.source.read_u16::<BigEndian>()?)
    }

    fn read_u32(&mut self) -> Result<u32, Error> {
        Ok(self.source.read_u32::<BigEndian>()?)
    }

    fn read_u64(&mut self) -> Result<u64, Error> {
        Ok(self.source.read_u64::<BigEndian>()?)
    }

    fn read_i64(&mut self) -> Result<i64, Error> {
        Ok(self.source.read_i64::<BigEndian>()?)
    }

    fn read_vec(&mut self, max_len: usize) -> Result<Vec<u8>, Error> {
        let len = self.read_u64()?;
        if len > max_len as u64 {
            return Err(Error::TooLargeReadErr(format!(
                "byte field of {} bytes, limit {}",
                len, max_len
            )));
        }
        self.read_fixed_bytes(len as usize)
    }

    fn read_fixed_bytes(&mut self, length: usize) -> Result<Vec<u8>, Error> {
        let mut buf = vec![0; length];
        self.source.read_exact(&mut buf)?;
        Ok(buf)
    }
}

struct BinWriter<'a> {
    sink: &'a mut dyn Write,
}

impl<'a> Writer for BinWriter<'a> {
    fn write_fixed_bytes<T: AsRef<[u8]>>(&mut self, bytes: &T) -> Result<(), Error> {
        self.sink.write_all(bytes.as_ref())?;
        Ok(())
    }

    fn write_u64(&mut self, n: u64) -> Result<(), Error> {
        self.sink.write_u64::<BigEndian>(n)?;
        Ok(())
    }
}

/// Write `items` in ascending order of their hashes, without a count
pub fn write_sorted<W, T>(writer: &mut W, items: &[T]) -> Result<(), Error>
where
    W: Writer,
    T: Writeable,
{
    let mut keyed: Vec<_> = items.iter().map(|item| (item.hash(), item)).collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    for (_, item) in keyed {
        item.write(writer)?;
    }
    Ok(())
}

/// Read `count` items and reject them unless they arrived sorted by hash
pub fn read_and_verify_sorted<T>(reader: &mut dyn Reader, count: u64) -> Result<Vec<T>, Error>
where
    T: Readable + Writeable,
{
    let items = read_multi::<T>(reader, count)?;
    items.verify_sort_order()?;
    Ok(items)
}

/// Read `count` consecutive items
pub fn read_multi<T: Readable>(reader: &mut dyn Reader, count: u64) -> Result<Vec<T>, Error> {
    if count > MAX_READ_ITEMS {
        return Err(Error::TooLargeReadErr(format!(
            "{} items, limit {}",
            count, MAX_READ_ITEMS
        )));
    }
    (0..count).map(|_| T::read(reader)).collect()
}

/// Upper bound on any collection count accepted from the wire
pub const MAX_READ_ITEMS: u64 = crate::consensus::MAX_BLOCK_WEIGHT as u64;

// =============================================================================
// Primitive impls
// =============================================================================

impl Writeable for u64 {
    fn write<W: Writer>(&self, writer: &mut W) -> Result<(), Error> {
        writer.write_u64(*self)
    }
}

impl Readable for u64 {
    fn read(reader: &mut dyn Reader) -> Result<u64, Error> {
        reader.read_u64()
    }
}

impl Writeable for Commitment {
    fn write<W: Writer>(&self, writer: &mut W) -> Result<(), Error> {
        writer.write_fixed_bytes(&self.0)
    }
}

impl Readable for Commitment {
    fn read(reader: &mut dyn Reader) -> Result<Commitment, Error> {
        let bytes = reader.read_fixed_bytes(PEDERSEN_COMMITMENT_SIZE)?;
        Commitment::from_vec(bytes).map_err(|_| Error::CorruptedData)
    }
}

impl Writeable for RangeProof {
    fn write<W: Writer>(&self, writer: &mut W) -> Result<(), Error> {
        writer.write_bytes(&self.proof)
    }
}

impl Readable for RangeProof {
    fn read(reader: &mut dyn Reader) -> Result<RangeProof, Error> {
        Ok(RangeProof::from_vec(reader.read_vec(MAX_PROOF_SIZE)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hash::Hash;

    #[test]
    fn test_integers_are_big_endian() {
        struct Sample;
        impl Writeable for Sample {
            fn write<W: Writer>(&self, writer: &mut W) -> Result<(), Error> {
                writer.write_u8(1)?;
                writer.write_u16(0x0203)?;
                writer.write_u32(0x04050607)?;
                writer.write_i64(-1)?;
                writer.write_bytes(&[9u8, 9])
            }
        }
        let bytes = ser_vec(&Sample).unwrap();
        assert_eq!(
            bytes,
            vec![
                1, 2, 3, 4, 5, 6, 7, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0, 0, 0, 0,
                0, 0, 0, 2, 9, 9
            ]
        );
    }

    #[test]
    fn test_read_vec_limit() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&5u64.to_be_bytes());
        bytes.extend_from_slice(&[1, 2, 3, 4, 5]);

        let mut source = &bytes[..];
        let mut reader = BinReader { source: &mut source };
        assert_eq!(reader.read_vec(5).unwrap(), vec![1, 2, 3, 4, 5]);

        let mut source = &bytes[..];
        let mut reader = BinReader { source: &mut source };
        assert!(matches!(reader.read_vec(4), Err(Error::TooLargeReadErr(_))));
    }

    #[test]
    fn test_truncated_input() {
        let bytes = [0u8; 3];
        assert!(matches!(
            deserialize::<u64>(&mut &bytes[..]),
            Err(Error::IOErr(_))
        ));
    }

    #[test]
    fn test_expect_u8() {
        let bytes = [7u8, 8];
        let mut source = &bytes[..];
        let mut reader = BinReader { source: &mut source };
        assert_eq!(reader.expect_u8(7), Ok(7));
        assert_eq!(
            reader.expect_u8(7),
            Err(Error::UnexpectedData {
                expected: vec![7],
                received: vec![8]
            })
        );
    }

    #[test]
    fn test_sorted_write_and_checked_read() {
        let items: Vec<u64> = (0..8).collect();
        let mut hashes: Vec<Hash> = items.iter().map(|i| i.hash()).collect();
        hashes.sort();

        let mut sorted = Vec::new();
        serialize(&mut sorted, &SortedU64s(items.clone())).unwrap();
        let read: Vec<u64> = read_and_verify_sorted(
            &mut BinReader {
                source: &mut &sorted[..],
            },
            8,
        )
        .unwrap();
        let read_hashes: Vec<Hash> = read.iter().map(|i| i.hash()).collect();
        assert_eq!(read_hashes, hashes);

        // the same items in plain order almost surely break hash order
        let mut plain = Vec::new();
        for i in &items {
            serialize(&mut plain, i).unwrap();
        }
        let plain_sorted = items
            .windows(2)
            .all(|w| w[0].hash() <= w[1].hash());
        let result: Result<Vec<u64>, Error> = read_and_verify_sorted(
            &mut BinReader {
                source: &mut &plain[..],
            },
            8,
        );
        if plain_sorted {
            assert!(result.is_ok());
        } else {
            assert_eq!(result, Err(Error::BadlySorted));
        }
    }

    struct SortedU64s(Vec<u64>);

    impl Writeable for SortedU64s {
        fn write<W: Writer>(&self, writer: &mut W) -> Result<(), Error> {
            write_sorted(writer, &self.0)
        }
    }

    #[test]
    fn test_commitment_rejects_garbage() {
        let bytes = [0x07u8; PEDERSEN_COMMITMENT_SIZE];
        assert_eq!(
            deserialize::<Commitment>(&mut &bytes[..]),
            Err(Error::CorruptedData)
        );
        let zero = [0u8; PEDERSEN_COMMITMENT_SIZE];
        assert_eq!(
            deserialize::<Commitment>(&mut &zero[..]),
            Ok(Commitment::zero())
        );
    }
}
