//! Per-texture surface chains.
//!
//! Accepted surfaces are pushed onto the chain of their texture instead of
//! being drawn on the spot, so the rasteriser binds every texture once.
//! Heads are indexed by [`TextureId`], links by [`SurfaceId`]; pushing
//! prepends, so a chain lists surfaces in reverse acceptance order.

use crate::world::{SurfaceId, TextureId};

#[derive(Clone, Debug, Default)]
pub struct TextureChains {
    heads: Vec<Option<SurfaceId>>,
    next: Vec<Option<SurfaceId>>,
    live: usize,
}

impl TextureChains {
    pub fn new(num_textures: usize, num_surfaces: usize) -> Self {
        Self {
            heads: vec![None; num_textures],
            next: vec![None; num_surfaces],
            live: 0,
        }
    }

    /// Number of surfaces currently chained.
    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn push(&mut self, texture: TextureId, surface: SurfaceId) {
        let (Some(head), Some(link)) = (
            self.heads.get_mut(texture as usize),
            self.next.get_mut(surface as usize),
        ) else {
            log::warn!("chain push out of range: texture {texture}, surface {surface}");
            return;
        };
        *link = head.replace(surface);
        self.live += 1;
    }

    /// Walk one chain without clearing it.
    pub fn chain(&self, texture: TextureId) -> ChainIter<'_> {
        ChainIter {
            next: &self.next,
            at: self.heads.get(texture as usize).copied().flatten(),
        }
    }

    /// Take every non-empty chain in texture-id order, leaving all heads
    /// empty.
    pub fn drain(&mut self) -> Vec<(TextureId, Vec<SurfaceId>)> {
        let mut out = Vec::new();
        for id in 0..self.heads.len() {
            let Some(first) = self.heads[id].take() else {
                continue;
            };
            let mut surfaces = Vec::new();
            let mut at = Some(first);
            while let Some(s) = at {
                surfaces.push(s);
                at = self.next[s as usize].take();
            }
            out.push((id as TextureId, surfaces));
        }
        self.live = 0;
        out
    }

    /// Reset every head without walking the links.
    pub fn clear(&mut self) {
        self.heads.fill(None);
        self.next.fill(None);
        self.live = 0;
    }
}

pub struct ChainIter<'a> {
    next: &'a [Option<SurfaceId>],
    at: Option<SurfaceId>,
}

impl Iterator for ChainIter<'_> {
    type Item = SurfaceId;

    fn next(&mut self) -> Option<SurfaceId> {
        let cur = self.at?;
        self.at = self.next.get(cur as usize).copied().flatten();
        Some(cur)
    }
}
