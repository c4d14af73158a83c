use bincode::{Decode, Encode};

use super::raw::Record;

/*=======================================================================*/
/*                         Raw binary structs                            */
/*=======================================================================*/

#[derive(Clone, Copy, Debug, Default, PartialEq, Decode, Encode)]
pub struct RawPlane {
    pub normal: [f32; 3],
    pub dist: f32,
    /// PLANE_X / _Y / _Z for axial planes, 3.. otherwise.
    pub kind: i32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Decode, Encode)]
pub struct RawVertex {
    pub point: [f32; 3],
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Decode, Encode)]
pub struct RawNode {
    pub planenum: i32,
    /// Negative values are `-(leaf + 1)`.
    pub children: [i16; 2],
    pub mins: [i16; 3],
    pub maxs: [i16; 3],
    pub firstface: u16,
    pub numfaces: u16,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Decode, Encode)]
pub struct RawTexInfo {
    /// `[s|t][x y z offset]`
    pub vecs: [[f32; 4]; 2],
    pub miptex: i32,
    pub flags: i32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Decode, Encode)]
pub struct RawFace {
    pub planenum: i16,
    pub side: i16,
    pub firstedge: i32,
    pub numedges: i16,
    pub texinfo: i16,
    pub styles: [u8; 4],
    pub lightofs: i32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Decode, Encode)]
pub struct RawClipNode {
    pub planenum: i32,
    /// Negative values are contents.
    pub children: [i16; 2],
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Decode, Encode)]
pub struct RawLeaf {
    pub contents: i32,
    pub visofs: i32,
    pub mins: [i16; 3],
    pub maxs: [i16; 3],
    pub firstmarksurface: u16,
    pub nummarksurfaces: u16,
    pub ambient_level: [u8; 4],
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Decode, Encode)]
pub struct RawEdge {
    pub v: [u16; 2],
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Decode, Encode)]
pub struct RawModel {
    pub mins: [f32; 3],
    pub maxs: [f32; 3],
    pub origin: [f32; 3],
    pub headnode: [i32; 4],
    pub visleafs: i32,
    pub firstface: i32,
    pub numfaces: i32,
}

impl Record for RawPlane {
    const SIZE: usize = 20;
}
impl Record for RawVertex {
    const SIZE: usize = 12;
}
impl Record for RawNode {
    const SIZE: usize = 24;
}
impl Record for RawTexInfo {
    const SIZE: usize = 40;
}
impl Record for RawFace {
    const SIZE: usize = 20;
}
impl Record for RawClipNode {
    const SIZE: usize = 8;
}
impl Record for RawLeaf {
    const SIZE: usize = 28;
}
impl Record for RawEdge {
    const SIZE: usize = 4;
}
impl Record for RawModel {
    const SIZE: usize = 64;
}

/// Surfedges are bare `i32`s, mark-surfaces bare `i16`s.
pub type RawSurfEdge = i32;
pub type RawMarkSurface = i16;
