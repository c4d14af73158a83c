use bitflags::bitflags;
use glam::Vec3;

use crate::world::texture::{TextureBank, TextureId};

pub type VertexId = u32;
pub type EdgeId = u32;
pub type PlaneId = u32;
pub type TexInfoId = u32;
pub type SurfaceId = u32;
pub type NodeId = u32;
pub type LeafId = u32;

/*------------------------- leaf contents ----------------------------*/

pub const CONTENTS_EMPTY: i32 = -1;
pub const CONTENTS_SOLID: i32 = -2;
pub const CONTENTS_WATER: i32 = -3;
pub const CONTENTS_SLIME: i32 = -4;
pub const CONTENTS_LAVA: i32 = -5;
pub const CONTENTS_SKY: i32 = -6;

/*----------------------------- planes -------------------------------*/

pub const PLANE_X: u8 = 0;
pub const PLANE_Y: u8 = 1;
pub const PLANE_Z: u8 = 2;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub dist: f32,
    /// `PLANE_X/Y/Z` for axial planes (fast path), anything else otherwise.
    pub kind: u8,
    /// Bit `j` set when `normal[j] < 0`; selects box corners.
    pub signbits: u8,
}

impl Plane {
    pub fn new(normal: Vec3, dist: f32, kind: u8) -> Self {
        let mut signbits = 0;
        for j in 0..3 {
            if normal[j] < 0.0 {
                signbits |= 1 << j;
            }
        }
        Self {
            normal,
            dist,
            kind,
            signbits,
        }
    }

    /// Signed distance of `p`, using the axial fast path when possible.
    #[inline]
    pub fn distance(&self, p: Vec3) -> f32 {
        match self.kind {
            PLANE_X | PLANE_Y | PLANE_Z => p[self.kind as usize] - self.dist,
            _ => p.dot(self.normal) - self.dist,
        }
    }
}

/*--------------------------- primitives -----------------------------*/

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vertex {
    pub pos: Vec3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Edge {
    pub v: [VertexId; 2],
}

/*--------------------------- texinfo --------------------------------*/

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TexInfoFlags: u32 {
        /// Sky or liquid; never lightmapped, no extent limit.
        const SPECIAL = 0x0001;
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TexInfo {
    /// `[s|t][x y z offset]`
    pub vecs: [[f32; 4]; 2],
    /// Mip bias derived from the basis vector lengths.
    pub mipadjust: f32,
    pub texture: TextureId,
    pub flags: TexInfoFlags,
}

/*--------------------------- surfaces -------------------------------*/

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SurfaceFlags: u32 {
        const PLANEBACK      = 0x0002;
        const DRAWSKY        = 0x0004;
        const DRAWSPRITE     = 0x0008;
        const DRAWTURB       = 0x0010;
        const DRAWTILED      = 0x0020;
        const DRAWBACKGROUND = 0x0040;
        const UNDERWATER     = 0x0080;
    }
}

/// Extent given to sky/liquid surfaces instead of a measured one.
pub const TILED_EXTENT: i16 = 16384;
pub const TILED_TEXTUREMINS: i16 = -8192;
/// Largest measured extent a normal surface may have.
pub const MAX_SURFACE_EXTENT: i32 = 256;

#[derive(Clone, Debug, PartialEq)]
pub struct Surface {
    pub plane: PlaneId,
    pub flags: SurfaceFlags,
    /// Index into `Level::surfedges`.
    pub firstedge: u32,
    pub numedges: u32,
    pub texinfo: TexInfoId,
    pub texturemins: [i16; 2],
    pub extents: [i16; 2],
    pub styles: [u8; 4],
    /// Byte offset into `Level::lightdata`.
    pub lightofs: Option<u32>,
}

/*----------------------------- BSP ----------------------------------*/

/// Decoded child reference.  On disk (and in [`Node::children`]) a
/// negative value `c` means leaf `-1 - c`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeRef {
    Node(NodeId),
    Leaf(LeafId),
}

impl NodeRef {
    #[inline]
    pub fn from_child(child: i32) -> Self {
        if child >= 0 {
            NodeRef::Node(child as NodeId)
        } else {
            NodeRef::Leaf((-1 - child) as LeafId)
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub plane: PlaneId,
    pub children: [i32; 2],
    pub mins: [i16; 3],
    pub maxs: [i16; 3],
    /// Surfaces lying on this node's plane.
    pub firstsurface: u32,
    pub numsurfaces: u32,
    pub parent: Option<NodeId>,
}

impl Node {
    #[inline]
    pub fn child(&self, side: usize) -> NodeRef {
        NodeRef::from_child(self.children[side])
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Leaf {
    pub contents: i32,
    /// Offset of the compressed PVS row in `Level::visdata`.
    pub visofs: Option<u32>,
    pub mins: [i16; 3],
    pub maxs: [i16; 3],
    /// Index into `Level::marksurfaces`.
    pub firstmarksurface: u32,
    pub nummarksurfaces: u32,
    pub ambient_sound_level: [u8; 4],
    pub parent: Option<NodeId>,
}

/*-------------------------- clip hulls ------------------------------*/

pub const MAX_MAP_HULLS: usize = 4;

/// Hull 0 mirrors the draw tree; the two box hulls share the lump.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClipSet {
    DrawTree,
    Lump,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClipNode {
    pub plane: PlaneId,
    /// Non-negative: clip node index.  Negative: contents.
    pub children: [i32; 2],
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hull {
    pub set: ClipSet,
    pub first_clipnode: i32,
    pub last_clipnode: i32,
    pub clip_mins: Vec3,
    pub clip_maxs: Vec3,
}

/*-------------------------- submodels -------------------------------*/

/// One entry of the models lump.
#[derive(Clone, Debug, PartialEq)]
pub struct Submodel {
    pub mins: Vec3,
    pub maxs: Vec3,
    pub origin: Vec3,
    pub headnode: [i32; MAX_MAP_HULLS],
    pub visleafs: u32,
    pub firstface: u32,
    pub numfaces: u32,
}

/*---------------------------- level ---------------------------------*/

/// Runtime snapshot of one BSP file (immutable after load).  Shared by
/// the world model and every `*N` submodel.
#[derive(Debug)]
pub struct Level {
    pub name: String,
    pub vertices: Vec<Vertex>,
    pub edges: Vec<Edge>,
    /// Signed edge indices; negative means "walk the edge reversed".
    pub surfedges: Vec<i32>,
    pub planes: Vec<Plane>,
    pub texinfo: Vec<TexInfo>,
    pub surfaces: Vec<Surface>,
    pub marksurfaces: Vec<SurfaceId>,
    pub nodes: Vec<Node>,
    pub leafs: Vec<Leaf>,
    /// Clip nodes for hulls 1 and 2.
    pub clipnodes: Vec<ClipNode>,
    /// Hull 0, one clip node per draw node.
    pub hull0: Vec<ClipNode>,
    pub lightdata: Vec<u8>,
    pub visdata: Vec<u8>,
    pub entities: String,
    pub submodels: Vec<Submodel>,
    pub textures: TextureBank,
    /// Lump slot → bank id; `None` for slots the file leaves empty.
    pub miptex: Vec<Option<TextureId>>,
}
