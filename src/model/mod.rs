//! # Models
//!
//! * [`brush`]  – BSP levels and their `*N` submodels
//! * [`alias`]  – keyframed MDL meshes, payload kept in the [`Cache`](crate::memory::Cache)
//! * [`sprite`] – SPR billboards
//! * [`registry`] – the named table every load goes through
//! * [`context`]  – the state one load threads through its sub-loaders

pub mod alias;
pub mod brush;
pub mod context;
pub mod registry;
pub mod sprite;

use std::rc::Rc;

use glam::Vec3;
use thiserror::Error;

use crate::{
    format::FormatError,
    io::ReadError,
    memory::{CacheError, HunkError},
    world::{
        LeafId, Level,
        geometry::{Hull, Submodel},
        texture::{AnimationError, TextureError},
    },
};

pub use alias::AliasModel;
pub use registry::{ModelHandle, ModelRegistry, RegistryError, SlotState};
pub use sprite::SpriteModel;

/*======================================================================*/
/*                               Errors                                 */
/*======================================================================*/

/// Everything that can abort one model load.  A failed load never touches
/// other slots.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error(transparent)]
    Read(#[from] ReadError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Hunk(#[from] HunkError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Animation(#[from] AnimationError),

    #[error(transparent)]
    Texture(#[from] TextureError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("{model}: bad surface extents on face {face} ({extent})")]
    BadSurfaceExtents {
        model: String,
        face: usize,
        extent: i32,
    },

    #[error("{model}: {what} {index} references {target}, limit {limit}")]
    BadReference {
        model: String,
        what: &'static str,
        index: usize,
        target: i64,
        limit: usize,
    },

    #[error("{model}: {reason}")]
    Invalid { model: String, reason: String },
}

/*======================================================================*/
/*                             Model types                              */
/*======================================================================*/

/// Discriminant kept by registry slots even after the payload is gone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelType {
    Brush,
    Sprite,
    Alias,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncType {
    Sync,
    Rand,
}

impl From<i32> for SyncType {
    fn from(v: i32) -> Self {
        if v == 0 { SyncType::Sync } else { SyncType::Rand }
    }
}

/// World model or one of its `*N` slices.
#[derive(Clone, Debug)]
pub struct BrushModel {
    pub level: Rc<Level>,
    pub submodel: usize,
    pub firstmodelsurface: u32,
    pub nummodelsurfaces: u32,
    /// Leaves covered by the PVS rows (`visleafs` of the submodel).
    pub numleafs: u32,
    pub hulls: [Hull; 3],
}

impl BrushModel {
    /// Root of this model's draw tree (`headnode[0]`).
    pub fn headnode(&self) -> i32 {
        self.level.submodels[self.submodel].headnode[0]
    }

    pub fn submodel(&self) -> &Submodel {
        &self.level.submodels[self.submodel]
    }

    pub fn point_in_leaf(&self, p: Vec3) -> LeafId {
        self.level.point_in_leaf(p)
    }

    /// Decompressed PVS of `leaf`, one bit per leaf starting at leaf 1.
    pub fn leaf_pvs(&self, leaf: LeafId) -> Vec<u8> {
        self.level.leaf_pvs(leaf, self.numleafs as usize)
    }

    pub fn hull_point_contents(&self, hull: usize, p: Vec3) -> i32 {
        self.level.hull_point_contents(&self.hulls[hull], p)
    }

    pub fn surfaces(&self) -> std::ops::Range<u32> {
        self.firstmodelsurface..self.firstmodelsurface + self.nummodelsurfaces
    }
}

#[derive(Clone, Debug)]
pub enum ModelKind {
    Brush(BrushModel),
    Sprite(Rc<SpriteModel>),
    /// Payload lives in the cache; see [`ModelRegistry::extradata`].
    Alias,
}

/// Descriptor kept in a registry slot.
#[derive(Clone, Debug)]
pub struct Model {
    pub name: String,
    pub kind: ModelKind,
    pub numframes: u32,
    pub flags: i32,
    pub synctype: SyncType,
    pub mins: Vec3,
    pub maxs: Vec3,
    pub radius: f32,
}

impl Model {
    pub fn model_type(&self) -> ModelType {
        match self.kind {
            ModelKind::Brush(_) => ModelType::Brush,
            ModelKind::Sprite(_) => ModelType::Sprite,
            ModelKind::Alias => ModelType::Alias,
        }
    }

    pub fn brush(&self) -> Option<&BrushModel> {
        match &self.kind {
            ModelKind::Brush(b) => Some(b),
            _ => None,
        }
    }

    pub fn sprite(&self) -> Option<&SpriteModel> {
        match &self.kind {
            ModelKind::Sprite(s) => Some(s),
            _ => None,
        }
    }
}

/// `maps/e1m1.bsp` → `e1m1`; used as the hunk / cache tag.
pub fn load_name(path: &str) -> String {
    std::path::Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_owned()
}
