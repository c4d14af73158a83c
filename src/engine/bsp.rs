//! Front-to-back walk of the world BSP.
//!
//! Once per frame:
//! 1. [`mark_leaves`] stamps every leaf in the view leaf's PVS, plus the
//!    nodes above them, with the current vis generation.
//! 2. [`render_world`] walks the draw tree from the root, near side first,
//!    and pushes each surface that is both touched by a visible leaf and
//!    facing the viewer onto its texture chain.
//! 3. The chains are drained into [`ChainBatch`]es in texture-id order.

use glam::Vec3;

use crate::{
    engine::{
        animation::texture_animation,
        frame::FrameState,
        types::{ChainBatch, View, WorldFrame},
    },
    model::BrushModel,
    world::{
        LeafId, Level, NodeRef, SurfaceFlags,
        geometry::{CONTENTS_SOLID, NodeId},
    },
};

/// Stamp the PVS of `viewleaf`.  Does nothing while the view stays in the
/// same leaf.
pub fn mark_leaves(world: &BrushModel, state: &mut FrameState, viewleaf: LeafId) {
    if state.oldviewleaf == Some(viewleaf) {
        return;
    }
    state.visframecount = state.visframecount.wrapping_add(1);
    state.oldviewleaf = Some(viewleaf);

    let level = &world.level;
    let vis = world.leaf_pvs(viewleaf);
    let stamp = state.visframecount;

    for i in 0..world.numleafs as usize {
        if vis.get(i >> 3).is_none_or(|b| b & (1 << (i & 7)) == 0) {
            continue;
        }
        let Some(leaf) = level.leafs.get(i + 1) else {
            break;
        };
        state.leaf_visframe[i + 1] = stamp;

        let mut parent = leaf.parent;
        while let Some(n) = parent {
            let slot = &mut state.node_visframe[n as usize];
            if *slot == stamp {
                break;
            }
            *slot = stamp;
            parent = level.nodes[n as usize].parent;
        }
    }
}

/// Walk the world from `view` and return the texture-sorted visible
/// surfaces.  Leaves `state.chains` empty.
pub fn render_world(world: &BrushModel, state: &mut FrameState, view: &View) -> WorldFrame {
    let level = &*world.level;
    state.framecount = state.framecount.wrapping_add(1);

    let view_leaf = world.point_in_leaf(view.origin);
    mark_leaves(world, state, view_leaf);

    let mut walk = WorldWalk {
        level,
        state,
        origin: view.origin,
        leaves: Vec::new(),
    };
    walk.visit(NodeRef::from_child(world.headnode()));
    let leaves = walk.leaves;

    let batches = state
        .chains
        .drain()
        .into_iter()
        .map(|(texture, surfaces)| {
            let animated = level
                .textures
                .texture(texture)
                .is_ok_and(|t| t.is_animated());
            let frame = if animated {
                texture_animation(&level.textures, texture, view.time, 0).unwrap_or_else(|e| {
                    log::warn!("{}: {e}", level.name);
                    texture
                })
            } else {
                texture
            };
            ChainBatch {
                texture,
                frame,
                animated,
                surfaces,
            }
        })
        .collect();

    WorldFrame {
        view_leaf,
        leaves,
        batches,
    }
}

/// Surfaces closer than this to edge-on are drawn from either side.
pub const BACKFACE_EPSILON: f32 = 0.01;

struct WorldWalk<'a> {
    level: &'a Level,
    state: &'a mut FrameState,
    origin: Vec3,
    leaves: Vec<LeafId>,
}

impl WorldWalk<'_> {
    fn visit(&mut self, at: NodeRef) {
        match at {
            NodeRef::Leaf(l) => self.visit_leaf(l),
            NodeRef::Node(n) => self.visit_node(n),
        }
    }

    fn visit_leaf(&mut self, l: LeafId) {
        let Some(leaf) = self.level.leafs.get(l as usize) else {
            return;
        };
        if leaf.contents == CONTENTS_SOLID || !self.state.leaf_visible(l) {
            return;
        }
        self.leaves.push(l);

        let first = leaf.firstmarksurface as usize;
        let marks = &self.level.marksurfaces[first..first + leaf.nummarksurfaces as usize];
        for &s in marks {
            self.state.surf_visframe[s as usize] = self.state.framecount;
        }
    }

    fn visit_node(&mut self, n: NodeId) {
        if !self.state.node_visible(n) {
            return;
        }
        let level = self.level;
        let node = &level.nodes[n as usize];
        let dot = level.planes[node.plane as usize].distance(self.origin);
        let side = if dot >= 0.0 { 0 } else { 1 };

        self.visit(node.child(side));

        let first = node.firstsurface;
        for s in first..first + node.numsurfaces {
            if !self.state.surface_marked(s) {
                continue;
            }
            let surf = &level.surfaces[s as usize];
            let back = surf.flags.contains(SurfaceFlags::PLANEBACK);
            if (dot < 0.0) != back {
                continue;
            }
            let texture = level.texinfo[surf.texinfo as usize].texture;
            self.state.chains.push(texture, s);
        }

        self.visit(node.child(side ^ 1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::models_two_rooms;

    fn world() -> BrushModel {
        models_two_rooms()[0].brush().unwrap().clone()
    }

    fn view(x: f32) -> View {
        View::new(Vec3::new(x, 10.0, 10.0), Vec3::ZERO, 0.0)
    }

    #[test]
    fn pvs_stamps_leaves_and_ancestors() {
        let w = world();
        let mut st = FrameState::new(&w.level);
        mark_leaves(&w, &mut st, 1);
        assert_eq!(st.visframecount, 1);
        assert!(st.leaf_visible(1) && st.leaf_visible(2));
        assert!(!st.leaf_visible(0));
        assert!((0..3).all(|n| st.node_visible(n)));

        // same leaf again: no new generation
        mark_leaves(&w, &mut st, 1);
        assert_eq!(st.visframecount, 1);
        st.invalidate_vis();
        mark_leaves(&w, &mut st, 1);
        assert_eq!(st.visframecount, 2);
    }

    #[test]
    fn near_side_first_and_batches_by_texture() {
        let w = world();
        let mut st = FrameState::new(&w.level);
        let frame = render_world(&w, &mut st, &view(5.0));

        assert_eq!(frame.view_leaf, 1);
        assert_eq!(frame.leaves, vec![1, 2]);

        let floor = w.level.textures.id("floor").unwrap();
        let wall = w.level.textures.id("+0wall").unwrap();
        assert_eq!(frame.batches.len(), 2);
        assert_eq!(frame.batches[0].texture, floor);
        assert_eq!(frame.batches[0].surfaces, vec![1, 0]);
        assert!(!frame.batches[0].animated);
        assert_eq!(frame.batches[1].texture, wall);
        assert_eq!(frame.batches[1].surfaces, vec![2]);
        assert!(frame.batches[1].animated);
        assert_eq!(frame.batches[1].frame, wall);
        assert!(st.chains.is_empty());
    }

    #[test]
    fn back_facing_wall_is_culled() {
        let w = world();
        let mut st = FrameState::new(&w.level);
        let frame = render_world(&w, &mut st, &view(-5.0));

        assert_eq!(frame.view_leaf, 2);
        assert_eq!(frame.leaves, vec![2, 1]);
        assert_eq!(frame.surface_count(), 2);
        assert!(frame.batches.iter().all(|b| !b.surfaces.contains(&2)));
    }

    #[test]
    fn unstamped_surfaces_are_skipped() {
        let w = world();
        let mut st = FrameState::new(&w.level);
        render_world(&w, &mut st, &view(5.0));

        // Leaf 2 drops out of the PVS: its floor B is never stamped for the
        // next frame, so node2 emits nothing.
        st.leaf_visframe[2] = 0;
        st.oldviewleaf = Some(1);
        let frame = render_world(&w, &mut st, &view(5.0));
        assert_eq!(frame.leaves, vec![1]);
        let floor = w.level.textures.id("floor").unwrap();
        let floors = frame.batches.iter().find(|b| b.texture == floor).unwrap();
        assert_eq!(floors.surfaces, vec![0]);
    }

    #[test]
    fn animated_batch_advances_with_time() {
        let w = world();
        let mut st = FrameState::new(&w.level);
        let mut v = view(5.0);
        v.time = 0.25;
        let frame = render_world(&w, &mut st, &v);
        let wall = frame.batches.iter().find(|b| b.animated).unwrap();
        assert_eq!(wall.frame, w.level.textures.id("+1wall").unwrap());
    }
}
