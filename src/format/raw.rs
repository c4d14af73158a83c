//! # Record decoding
//!
//! * Every on-disk record is a plain struct deriving **bincode 2**
//!   `Decode`/`Encode`, decoded with fixed-width little-endian integers so
//!   each field goes through an explicit LE conversion on any host.
//! * [`Record::SIZE`] is the size on disk, not `mem::size_of`.
//! * Lumps are decoded record by record with `chunks_exact`; a length
//!   that is not a whole number of records is a [`FormatError::CorruptLump`].

use bincode::{
    Decode, Encode,
    config::{self, Config},
    decode_from_slice, encode_to_vec,
};
use std::io;
use thiserror::Error;

/// Decoding / validation errors for every file format we read.
#[derive(Error, Debug)]
pub enum FormatError {
    #[error("{what} has wrong version number ({found} should be {expected})")]
    BadVersion {
        what: &'static str,
        expected: i32,
        found: i32,
    },

    #[error("{what} truncated: need {needed} bytes, have {available}")]
    Truncated {
        what: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("lump {lump} size {size} not a multiple of record size {record}")]
    CorruptLump {
        lump: &'static str,
        size: usize,
        record: usize,
    },

    #[error("lump {lump} at {offset}+{length} outside file of {file_len} bytes")]
    LumpOutOfBounds {
        lump: &'static str,
        offset: i32,
        length: i32,
        file_len: u64,
    },

    #[error("lumps {first} and {second} overlap")]
    OverlappingLumps {
        first: &'static str,
        second: &'static str,
    },

    #[error("{what} record {index}: {source}")]
    BadRecord {
        what: &'static str,
        index: usize,
        source: bincode::error::DecodeError,
    },

    #[error("texture {name} is not 16 aligned ({width}x{height})")]
    UnalignedTexture {
        name: String,
        width: u32,
        height: u32,
    },

    #[error("texture {name} has unusable size {width}x{height}")]
    BadTextureSize {
        name: String,
        width: u32,
        height: u32,
    },

    #[error("miptex {index} at offset {offset} does not fit in {lump_len} byte lump")]
    MiptexOutOfBounds {
        index: usize,
        offset: i32,
        lump_len: usize,
    },

    #[error("encode failed: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// A fixed-size on-disk record.
pub trait Record: Decode<()> + Encode + Sized {
    const SIZE: usize;
}

impl Record for i16 {
    const SIZE: usize = 2;
}
impl Record for i32 {
    const SIZE: usize = 4;
}
impl Record for f32 {
    const SIZE: usize = 4;
}

#[inline]
pub fn le_config() -> impl Config {
    config::standard()
        .with_fixed_int_encoding()
        .with_little_endian()
}

/// Decode one record from the front of `bytes`.
pub fn decode_record<T: Record>(bytes: &[u8], what: &'static str) -> Result<T, FormatError> {
    if bytes.len() < T::SIZE {
        return Err(FormatError::Truncated {
            what,
            needed: T::SIZE,
            available: bytes.len(),
        });
    }
    decode_from_slice::<T, _>(&bytes[..T::SIZE], le_config())
        .map(|(val, _)| val)
        .map_err(|source| FormatError::BadRecord {
            what,
            index: 0,
            source,
        })
}

/// Decode a whole lump into records.  Empty lumps are valid.
pub fn decode_lump<T: Record>(bytes: &[u8], lump: &'static str) -> Result<Vec<T>, FormatError> {
    if bytes.len() % T::SIZE != 0 {
        return Err(FormatError::CorruptLump {
            lump,
            size: bytes.len(),
            record: T::SIZE,
        });
    }
    bytes
        .chunks_exact(T::SIZE)
        .enumerate()
        .map(|(index, chunk)| {
            decode_from_slice::<T, _>(chunk, le_config())
                .map(|(val, _)| val)
                .map_err(|source| FormatError::BadRecord {
                    what: lump,
                    index,
                    source,
                })
        })
        .collect()
}

/// Inverse of [`decode_lump`].
pub fn encode_lump<T: Record>(records: &[T]) -> Result<Vec<u8>, FormatError> {
    let mut out = Vec::with_capacity(records.len() * T::SIZE);
    for r in records {
        out.extend(encode_to_vec(r, le_config())?);
    }
    Ok(out)
}

/// `&str` view of a fixed-size, NUL-padded name.
pub fn name_str(name: &[u8]) -> &str {
    let end = name.iter().position(|&b| b == 0).unwrap_or(name.len());
    std::str::from_utf8(&name[..end]).unwrap_or("?")
}

/// NUL-padded 16-byte name (truncating longer input).
pub fn name16(name: &str) -> [u8; 16] {
    let mut out = [0u8; 16];
    let n = name.len().min(16);
    out[..n].copy_from_slice(&name.as_bytes()[..n]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Decode, Encode)]
    struct Pair {
        a: i16,
        b: i32,
    }
    impl Record for Pair {
        const SIZE: usize = 6;
    }

    #[test]
    fn lump_decodes_little_endian() {
        let mut bytes = Vec::new();
        bytes.extend(&1i16.to_le_bytes());
        bytes.extend(&0x0102_0304i32.to_le_bytes());
        bytes.extend(&(-2i16).to_le_bytes());
        bytes.extend(&7i32.to_le_bytes());

        let v: Vec<Pair> = decode_lump(&bytes, "pairs").unwrap();
        assert_eq!(
            v,
            vec![Pair { a: 1, b: 0x0102_0304 }, Pair { a: -2, b: 7 }]
        );
    }

    #[test]
    fn ragged_lump_is_corrupt() {
        let err = decode_lump::<Pair>(&[0u8; 7], "pairs").unwrap_err();
        assert!(matches!(
            err,
            FormatError::CorruptLump {
                lump: "pairs",
                size: 7,
                record: 6
            }
        ));
    }

    #[test]
    fn empty_lump_is_empty_vec() {
        assert!(decode_lump::<Pair>(&[], "pairs").unwrap().is_empty());
    }

    #[test]
    fn short_record() {
        let err = decode_record::<Pair>(&[0u8; 3], "header").unwrap_err();
        assert!(matches!(
            err,
            FormatError::Truncated {
                needed: 6,
                available: 3,
                ..
            }
        ));
    }

    #[test]
    fn names_trim_at_nul() {
        assert_eq!(name_str(b"+0lava\0\0junk"), "+0lava");
        assert_eq!(name_str(&name16("sky4")), "sky4");
        assert_eq!(name16("a_very_long_texture_name").len(), 16);
    }
}
