pub mod bsp;
pub mod camera;
pub mod geometry;
pub mod texture;

pub use geometry::{
    ClipNode, ClipSet, Edge, Hull, Leaf, LeafId, Level, Node, NodeId, NodeRef, Plane, PlaneId,
    Submodel, Surface, SurfaceFlags, SurfaceId, TexInfo, TexInfoFlags, Vertex,
};

pub use bsp::{SIDE_BACK, SIDE_BOTH, SIDE_FRONT, box_on_plane_side, vis_row_bytes};
pub use camera::Camera;

pub use texture::{
    AnimationError, NO_TEXTURE, Texture, TextureBank, TextureError, TextureId,
};
