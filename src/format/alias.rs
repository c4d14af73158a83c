//! MDL (alias model) on-disk records, version 6.
//!
//! ```text
//! header | skins… | stverts[numverts] | triangles[numtris] | frames…
//! skin   = type:i32 ( pixels | count:i32 intervals[count] pixels×count )
//! frame  = type:i32 ( frame | group intervals[n] frame×n )
//! frame  = RawAliasFrame + RawTriVertex[numverts]
//! ```

use bincode::{Decode, Encode};

use super::raw::Record;

pub const ALIAS_VERSION: i32 = 6;

pub const ALIAS_SINGLE: i32 = 0;
pub const ALIAS_GROUP: i32 = 1;
pub const ALIAS_SKIN_SINGLE: i32 = 0;
pub const ALIAS_SKIN_GROUP: i32 = 1;

pub const MAX_LBM_HEIGHT: i32 = 480;
pub const MAXALIASVERTS: i32 = 2000;
pub const ALIAS_BASE_SIZE_RATIO: f32 = 1.0 / 11.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Decode, Encode)]
pub struct RawAliasHeader {
    pub ident: i32,
    pub version: i32,
    pub scale: [f32; 3],
    pub scale_origin: [f32; 3],
    pub bounding_radius: f32,
    pub eye_position: [f32; 3],
    pub num_skins: i32,
    pub skin_width: i32,
    pub skin_height: i32,
    pub num_verts: i32,
    pub num_tris: i32,
    pub num_frames: i32,
    pub sync_type: i32,
    pub flags: i32,
    pub size: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Decode, Encode)]
pub struct RawStVert {
    pub onseam: i32,
    pub s: i32,
    pub t: i32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Decode, Encode)]
pub struct RawTriangle {
    pub faces_front: i32,
    pub vertindex: [i32; 3],
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Decode, Encode)]
pub struct RawTriVertex {
    pub v: [u8; 3],
    pub light_normal_index: u8,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Decode, Encode)]
pub struct RawAliasFrame {
    pub bboxmin: RawTriVertex,
    pub bboxmax: RawTriVertex,
    pub name: [u8; 16],
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Decode, Encode)]
pub struct RawAliasGroup {
    pub num_frames: i32,
    pub bboxmin: RawTriVertex,
    pub bboxmax: RawTriVertex,
}

impl Record for RawAliasHeader {
    const SIZE: usize = 84;
}
impl Record for RawStVert {
    const SIZE: usize = 12;
}
impl Record for RawTriangle {
    const SIZE: usize = 16;
}
impl Record for RawTriVertex {
    const SIZE: usize = 4;
}
impl Record for RawAliasFrame {
    const SIZE: usize = 24;
}
impl Record for RawAliasGroup {
    const SIZE: usize = 12;
}
