//! SPR (sprite) on-disk records, version 1.
//!
//! ```text
//! header | frames…
//! frame = type:i32 ( RawSpriteFrame pixels | count:i32 intervals[count] (RawSpriteFrame pixels)×count )
//! ```

use bincode::{Decode, Encode};

use super::raw::Record;

pub const SPRITE_VERSION: i32 = 1;

pub const SPR_SINGLE: i32 = 0;
pub const SPR_GROUP: i32 = 1;

#[derive(Clone, Copy, Debug, Default, PartialEq, Decode, Encode)]
pub struct RawSpriteHeader {
    pub ident: i32,
    pub version: i32,
    pub kind: i32,
    pub bounding_radius: f32,
    pub width: i32,
    pub height: i32,
    pub num_frames: i32,
    pub beam_length: f32,
    pub sync_type: i32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Decode, Encode)]
pub struct RawSpriteFrame {
    pub origin: [i32; 2],
    pub width: i32,
    pub height: i32,
}

impl Record for RawSpriteHeader {
    const SIZE: usize = 36;
}
impl Record for RawSpriteFrame {
    const SIZE: usize = 16;
}
