//! On-disk formats: BSP (v29), MDL (v6) and SPR (v1).
//!
//! Nothing in here knows about hunks, caches or the runtime world graph;
//! it only turns bytes into plain records and back.

pub mod alias;
pub mod bsp;
pub mod header;
pub mod miptex;
pub mod raw;
pub mod sprite;

pub use header::{BspHeader, HEADER_SIZE, LumpId, LumpInfo, ModelFormat};
pub use raw::{FormatError, Record, decode_lump, decode_record, encode_lump, name_str};
