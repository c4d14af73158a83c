//! BSP header, lump directory and model-file magic dispatch.

use byteorder::{LittleEndian as LE, ReadBytesExt};
use std::fmt;

use super::raw::FormatError;

pub const BSPVERSION: i32 = 29;
pub const HEADER_LUMPS: usize = 15;
/// `version` + 15 × (offset, length).
pub const HEADER_SIZE: usize = 4 + HEADER_LUMPS * 8;

/// "IDPO" read as a little-endian word.
pub const IDPOLYHEADER: u32 = u32::from_le_bytes(*b"IDPO");
/// "IDSP" read as a little-endian word.
pub const IDSPRITEHEADER: u32 = u32::from_le_bytes(*b"IDSP");

/// Lump slots in on-disk directory order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LumpId {
    Entities = 0,
    Planes = 1,
    Textures = 2,
    Vertexes = 3,
    Visibility = 4,
    Nodes = 5,
    TexInfo = 6,
    Faces = 7,
    Lighting = 8,
    ClipNodes = 9,
    Leafs = 10,
    MarkSurfaces = 11,
    Edges = 12,
    SurfEdges = 13,
    Models = 14,
}

impl LumpId {
    pub const ALL: [LumpId; HEADER_LUMPS] = [
        LumpId::Entities,
        LumpId::Planes,
        LumpId::Textures,
        LumpId::Vertexes,
        LumpId::Visibility,
        LumpId::Nodes,
        LumpId::TexInfo,
        LumpId::Faces,
        LumpId::Lighting,
        LumpId::ClipNodes,
        LumpId::Leafs,
        LumpId::MarkSurfaces,
        LumpId::Edges,
        LumpId::SurfEdges,
        LumpId::Models,
    ];

    pub fn name(self) -> &'static str {
        match self {
            LumpId::Entities => "entities",
            LumpId::Planes => "planes",
            LumpId::Textures => "textures",
            LumpId::Vertexes => "vertexes",
            LumpId::Visibility => "visibility",
            LumpId::Nodes => "nodes",
            LumpId::TexInfo => "texinfo",
            LumpId::Faces => "faces",
            LumpId::Lighting => "lighting",
            LumpId::ClipNodes => "clipnodes",
            LumpId::Leafs => "leafs",
            LumpId::MarkSurfaces => "marksurfaces",
            LumpId::Edges => "edges",
            LumpId::SurfEdges => "surfedges",
            LumpId::Models => "models",
        }
    }
}

impl fmt::Display for LumpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One directory entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LumpInfo {
    pub offset: i32,
    pub length: i32,
}

impl LumpInfo {
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    fn end(&self) -> i64 {
        i64::from(self.offset) + i64::from(self.length)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BspHeader {
    pub version: i32,
    pub lumps: [LumpInfo; HEADER_LUMPS],
}

impl BspHeader {
    /// Parse and validate the header of a `file_len` byte BSP.
    pub fn parse(bytes: &[u8], file_len: u64) -> Result<Self, FormatError> {
        if bytes.len() < HEADER_SIZE {
            return Err(FormatError::Truncated {
                what: "bsp header",
                needed: HEADER_SIZE,
                available: bytes.len(),
            });
        }
        let mut cur = bytes;
        let version = cur.read_i32::<LE>()?;
        if version != BSPVERSION {
            return Err(FormatError::BadVersion {
                what: "bsp",
                expected: BSPVERSION,
                found: version,
            });
        }

        let mut lumps = [LumpInfo::default(); HEADER_LUMPS];
        for l in lumps.iter_mut() {
            l.offset = cur.read_i32::<LE>()?;
            l.length = cur.read_i32::<LE>()?;
        }

        let header = Self { version, lumps };
        header.validate(file_len)?;
        Ok(header)
    }

    pub fn lump(&self, id: LumpId) -> LumpInfo {
        self.lumps[id as usize]
    }

    /// Lumps must lie inside the file and must not share bytes.
    fn validate(&self, file_len: u64) -> Result<(), FormatError> {
        for id in LumpId::ALL {
            let l = self.lump(id);
            if l.offset < 0 || l.length < 0 || l.end() > file_len as i64 {
                return Err(FormatError::LumpOutOfBounds {
                    lump: id.name(),
                    offset: l.offset,
                    length: l.length,
                    file_len,
                });
            }
        }

        let mut spans: Vec<(LumpId, LumpInfo)> = LumpId::ALL
            .iter()
            .map(|&id| (id, self.lump(id)))
            .filter(|(_, l)| !l.is_empty())
            .collect();
        spans.sort_by_key(|(_, l)| l.offset);
        for pair in spans.windows(2) {
            let (a, la) = pair[0];
            let (b, lb) = pair[1];
            if la.end() > i64::from(lb.offset) {
                return Err(FormatError::OverlappingLumps {
                    first: a.name(),
                    second: b.name(),
                });
            }
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_SIZE);
        out.extend(&self.version.to_le_bytes());
        for l in &self.lumps {
            out.extend(&l.offset.to_le_bytes());
            out.extend(&l.length.to_le_bytes());
        }
        out
    }
}

/// Which loader a model file goes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelFormat {
    Brush,
    Alias,
    Sprite,
}

impl ModelFormat {
    /// Dispatch on the first four bytes of the file.
    pub fn detect(magic: [u8; 4]) -> Self {
        match u32::from_le_bytes(magic) {
            IDPOLYHEADER => ModelFormat::Alias,
            IDSPRITEHEADER => ModelFormat::Sprite,
            _ => ModelFormat::Brush,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_with(lumps: &[(LumpId, i32, i32)]) -> BspHeader {
        let mut h = BspHeader {
            version: BSPVERSION,
            lumps: [LumpInfo {
                offset: HEADER_SIZE as i32,
                length: 0,
            }; HEADER_LUMPS],
        };
        for &(id, offset, length) in lumps {
            h.lumps[id as usize] = LumpInfo { offset, length };
        }
        h
    }

    #[test]
    fn parse_roundtrip() {
        let h = header_with(&[(LumpId::Planes, 124, 40), (LumpId::Vertexes, 164, 12)]);
        let bytes = h.to_bytes();
        assert_eq!(bytes.len(), HEADER_SIZE);
        let parsed = BspHeader::parse(&bytes, 176).unwrap();
        assert_eq!(parsed, h);
        assert_eq!(parsed.lump(LumpId::Vertexes).length, 12);
    }

    #[test]
    fn wrong_version() {
        let mut h = header_with(&[]);
        h.version = 30;
        let err = BspHeader::parse(&h.to_bytes(), 124).unwrap_err();
        assert!(matches!(
            err,
            FormatError::BadVersion {
                expected: 29,
                found: 30,
                ..
            }
        ));
    }

    #[test]
    fn lump_past_eof() {
        let h = header_with(&[(LumpId::Edges, 124, 8)]);
        let err = BspHeader::parse(&h.to_bytes(), 128).unwrap_err();
        assert!(matches!(err, FormatError::LumpOutOfBounds { lump: "edges", .. }));
    }

    #[test]
    fn overlapping_lumps() {
        let h = header_with(&[(LumpId::Planes, 124, 40), (LumpId::Edges, 140, 8)]);
        let err = BspHeader::parse(&h.to_bytes(), 200).unwrap_err();
        assert!(matches!(
            err,
            FormatError::OverlappingLumps {
                first: "planes",
                second: "edges"
            }
        ));
    }

    #[test]
    fn truncated_header() {
        let err = BspHeader::parse(&[29, 0, 0, 0], 4).unwrap_err();
        assert!(matches!(err, FormatError::Truncated { .. }));
    }

    #[test]
    fn magic_dispatch() {
        assert_eq!(ModelFormat::detect(*b"IDPO"), ModelFormat::Alias);
        assert_eq!(ModelFormat::detect(*b"IDSP"), ModelFormat::Sprite);
        assert_eq!(ModelFormat::detect(29i32.to_le_bytes()), ModelFormat::Brush);
    }
}
