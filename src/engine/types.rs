use glam::Vec3;

use crate::world::{Camera, LeafId, SurfaceId, TextureId};

/// Constants that depend on the *frame-buffer*, not on the map.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Screen {
    pub w: usize,
    pub h: usize,
}

/// Everything one frame is rendered from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct View {
    pub origin: Vec3,
    /// `[pitch, yaw, roll]`, degrees.
    pub angles: Vec3,
    /// Animation clock, seconds.
    pub time: f32,
}

impl View {
    pub fn new(origin: Vec3, angles: Vec3, time: f32) -> Self {
        Self {
            origin,
            angles,
            time,
        }
    }

    pub fn from_camera(camera: &Camera, time: f32) -> Self {
        Self::new(camera.origin(), camera.angles(), time)
    }
}

/// An entity whose model is one of the level's `*N` submodels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BrushEntity {
    pub origin: Vec3,
    /// `[pitch, yaw, roll]`, degrees.
    pub angles: Vec3,
    /// Non-zero selects the alternate texture animation.
    pub frame: i32,
}

/// All visible surfaces sharing one texture.
#[derive(Clone, Debug, PartialEq)]
pub struct ChainBatch {
    /// Texture the surfaces reference.
    pub texture: TextureId,
    /// Frame to bind this frame; differs from `texture` only for animated
    /// textures.
    pub frame: TextureId,
    pub animated: bool,
    pub surfaces: Vec<SurfaceId>,
}

/// Output of one world walk.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorldFrame {
    pub view_leaf: LeafId,
    /// Non-solid leaves in the order the walk reached them.
    pub leaves: Vec<LeafId>,
    /// In texture-id order.
    pub batches: Vec<ChainBatch>,
}

impl WorldFrame {
    pub fn surface_count(&self) -> usize {
        self.batches.iter().map(|b| b.surfaces.len()).sum()
    }
}

/// Piece of a submodel face left after clipping into one world leaf.
/// Edges are in world space.
#[derive(Clone, Debug, PartialEq)]
pub struct ClippedFragment {
    pub surface: SurfaceId,
    pub leaf: LeafId,
    pub edges: Vec<[Vec3; 2]>,
}
