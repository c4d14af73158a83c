//! Textures lump: `count`, `count` offsets (−1 = absent), then for each
//! texture a 40-byte header followed by four mip levels of 8-bit pixels.

use bincode::{Decode, Encode};
use byteorder::{LittleEndian as LE, ReadBytesExt};

use super::raw::{FormatError, Record, decode_record, name_str};

pub const MIPLEVELS: usize = 4;

/// Largest width or height accepted for a wall texture.
pub const MAX_MIPTEX_SIZE: u32 = 4096;

#[derive(Clone, Copy, Debug, Default, PartialEq, Decode, Encode)]
pub struct RawMiptexHeader {
    pub name: [u8; 16],
    pub width: u32,
    pub height: u32,
    /// Relative to the start of this header.
    pub offsets: [u32; MIPLEVELS],
}

impl Record for RawMiptexHeader {
    const SIZE: usize = 40;
}

/// One texture as stored in the lump.
#[derive(Clone, Debug, PartialEq)]
pub struct RawMiptex {
    pub header: RawMiptexHeader,
    /// All four mip levels, `w*h/64*85` bytes.
    pub pixels: Vec<u8>,
}

impl RawMiptex {
    pub fn name(&self) -> &str {
        name_str(&self.header.name)
    }
}

/// Bytes of pixel data for a `width × height` texture with all mips.
pub fn mip_pixel_count(width: u32, height: u32) -> usize {
    (width as usize * height as usize) / 64 * 85
}

/// Decode the whole textures lump.  An empty lump means "no textures".
pub fn parse_miptex_lump(bytes: &[u8]) -> Result<Vec<Option<RawMiptex>>, FormatError> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    let mut cur = bytes;
    if cur.len() < 4 {
        return Err(FormatError::Truncated {
            what: "miptex count",
            needed: 4,
            available: cur.len(),
        });
    }
    let count = cur.read_i32::<LE>()?.max(0) as usize;
    let table = 4 + count * 4;
    if bytes.len() < table {
        return Err(FormatError::Truncated {
            what: "miptex offsets",
            needed: table,
            available: bytes.len(),
        });
    }

    let mut out = Vec::with_capacity(count);
    for index in 0..count {
        let offset = cur.read_i32::<LE>()?;
        if offset == -1 {
            out.push(None);
            continue;
        }
        let out_of_bounds = FormatError::MiptexOutOfBounds {
            index,
            offset,
            lump_len: bytes.len(),
        };
        let Ok(start) = usize::try_from(offset) else {
            return Err(out_of_bounds);
        };
        if start + RawMiptexHeader::SIZE > bytes.len() {
            return Err(out_of_bounds);
        }
        let header: RawMiptexHeader = decode_record(&bytes[start..], "miptex")?;
        let sized = |d: u32| (1..=MAX_MIPTEX_SIZE).contains(&d);
        if !sized(header.width) || !sized(header.height) {
            return Err(FormatError::BadTextureSize {
                name: name_str(&header.name).to_owned(),
                width: header.width,
                height: header.height,
            });
        }
        if header.width & 15 != 0 || header.height & 15 != 0 {
            return Err(FormatError::UnalignedTexture {
                name: name_str(&header.name).to_owned(),
                width: header.width,
                height: header.height,
            });
        }
        let data = start + RawMiptexHeader::SIZE;
        let end = data + mip_pixel_count(header.width, header.height);
        if end > bytes.len() {
            return Err(out_of_bounds);
        }
        out.push(Some(RawMiptex {
            header,
            pixels: bytes[data..end].to_vec(),
        }));
    }
    Ok(out)
}
