use glam::Vec3;

use crate::{
    engine::{
        bsp::render_world,
        clipper::clip_submodel,
        frame::FrameState,
        types::{BrushEntity, ClippedFragment, Screen, View, WorldFrame},
    },
    model::BrushModel,
    renderer::{Renderer, RendererExt, Rgba},
    world::{
        LeafId,
        geometry::{CONTENTS_LAVA, CONTENTS_SLIME, CONTENTS_WATER},
    },
};

/// A world model, its per-frame scratch and the back-end it feeds.
pub struct Engine<R: Renderer> {
    pub renderer: R,
    pub world: BrushModel,
    pub state: FrameState,
    pub screen: Screen,
}

impl<R: Renderer> Engine<R> {
    pub fn new(renderer: R, world: BrushModel, w: usize, h: usize) -> Self {
        let state = FrameState::new(&world.level);
        Self {
            renderer,
            world,
            state,
            screen: Screen { w, h },
        }
    }

    /// Walk the world, clip `entities` into it and hand everything to the
    /// renderer.  Returns the walk result for callers that want stats.
    pub fn render_frame(
        &mut self,
        view: &View,
        entities: &[(BrushModel, BrushEntity)],
        submit: impl FnOnce(&[Rgba], usize, usize),
    ) -> WorldFrame {
        let frame = render_world(&self.world, &mut self.state, view);

        let fragments: Vec<ClippedFragment> = entities
            .iter()
            .flat_map(|(model, ent)| {
                clip_submodel(&self.world, model, ent, view.origin, &self.state)
            })
            .collect();

        self.renderer.draw_frame(
            self.screen,
            view,
            &self.world.level,
            &frame,
            &fragments,
            submit,
        );
        frame
    }

    /// Leaf containing `p`.
    pub fn point_in_leaf(&self, p: Vec3) -> LeafId {
        self.world.point_in_leaf(p)
    }

    /// Decompressed PVS row of `leaf`.
    pub fn leaf_visibility(&self, leaf: LeafId) -> Vec<u8> {
        self.world.leaf_pvs(leaf)
    }

    /// True when `p` is inside a liquid volume.
    pub fn is_underwater(&self, p: Vec3) -> bool {
        let leaf = self.point_in_leaf(p);
        self.world
            .level
            .leafs
            .get(leaf as usize)
            .is_some_and(|l| {
                matches!(l.contents, CONTENTS_WATER | CONTENTS_SLIME | CONTENTS_LAVA)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{renderer::software::Software, testutil::models_two_rooms};

    #[test]
    fn frame_includes_world_and_door() {
        let models = models_two_rooms();
        let world = models[0].brush().unwrap().clone();
        let door = models[1].brush().unwrap().clone();
        let mut engine = Engine::new(Software::default(), world, 32, 32);

        let view = View::new(Vec3::new(5.0, 10.0, 10.0), Vec3::ZERO, 0.0);
        let mut submitted = 0;
        let frame = engine.render_frame(&view, &[(door, BrushEntity::default())], |fb, w, h| {
            assert_eq!(fb.len(), w * h);
            submitted += 1;
        });
        assert_eq!(submitted, 1);
        assert_eq!(frame.surface_count(), 3);
        assert_eq!(engine.point_in_leaf(view.origin), 1);
        assert_eq!(engine.leaf_visibility(1), vec![0x03]);
        assert!(!engine.is_underwater(view.origin));
    }
}
