//! Per-level scratch the traversal engine rewrites every frame.

use crate::{
    engine::chains::TextureChains,
    world::{LeafId, Level, NodeId, SurfaceId},
};

/// Visibility stamps and chains for one level.
///
/// * A node or leaf is in the current PVS when its stamp equals
///   `visframecount`.
/// * A surface is touched by a visible leaf this frame when its stamp
///   equals `framecount`.
#[derive(Clone, Debug)]
pub struct FrameState {
    pub framecount: u32,
    pub visframecount: u32,
    pub oldviewleaf: Option<LeafId>,
    pub node_visframe: Vec<u32>,
    pub leaf_visframe: Vec<u32>,
    pub surf_visframe: Vec<u32>,
    pub chains: TextureChains,
}

impl FrameState {
    pub fn new(level: &Level) -> Self {
        Self {
            framecount: 0,
            visframecount: 0,
            oldviewleaf: None,
            node_visframe: vec![0; level.nodes.len()],
            leaf_visframe: vec![0; level.leafs.len()],
            surf_visframe: vec![0; level.surfaces.len()],
            chains: TextureChains::new(level.textures.len(), level.surfaces.len()),
        }
    }

    #[inline]
    pub fn node_visible(&self, node: NodeId) -> bool {
        self.node_visframe.get(node as usize) == Some(&self.visframecount)
    }

    #[inline]
    pub fn leaf_visible(&self, leaf: LeafId) -> bool {
        self.leaf_visframe.get(leaf as usize) == Some(&self.visframecount)
    }

    #[inline]
    pub fn surface_marked(&self, surf: SurfaceId) -> bool {
        self.surf_visframe.get(surf as usize) == Some(&self.framecount)
    }

    /// Force the PVS to be re-marked on the next frame.
    pub fn invalidate_vis(&mut self) {
        self.oldviewleaf = None;
    }
}
