//! Clip brush submodels (doors, lifts, platforms) into the world BSP.
//!
//! * The entity's bounds locate the top node: the first visible world
//!   node whose plane splits them.
//! * Every face of the submodel that faces the viewer is split down the
//!   world tree from there, each world plane moved into the entity's
//!   rotated local space.
//! * Pieces that land in a visible, non-solid leaf become
//!   [`ClippedFragment`]s; pieces in solid leaves are dropped.
//!
//! Vertex and edge pools are bounded per face.  A face that needs more is
//! abandoned where it ran out.

use glam::{Mat3, Vec3};
use smallvec::SmallVec;

use crate::{
    engine::{
        bsp::BACKFACE_EPSILON,
        frame::FrameState,
        types::{BrushEntity, ClippedFragment},
    },
    model::{BrushModel, brush::radius_from_bounds},
    world::{
        LeafId, Level, NodeRef, SIDE_BOTH, SurfaceFlags, SurfaceId, box_on_plane_side,
        camera::{PITCH, ROLL, YAW},
        geometry::{CONTENTS_SOLID, NodeId},
    },
};

pub const MAX_BMODEL_VERTS: usize = 500;
pub const MAX_BMODEL_EDGES: usize = 1000;

type EdgeList = SmallVec<[[Vec3; 2]; 16]>;

/// Rotation taking world directions into the entity's local space.
///
/// Built yaw first, then pitch, then roll: `roll * (pitch * yaw)`.
pub fn entity_rotation(angles: Vec3) -> Mat3 {
    let (sy, cy) = angles[YAW].to_radians().sin_cos();
    let (sp, cp) = angles[PITCH].to_radians().sin_cos();
    let (sr, cr) = angles[ROLL].to_radians().sin_cos();

    let yaw = rows([[cy, sy, 0.0], [-sy, cy, 0.0], [0.0, 0.0, 1.0]]);
    let pitch = rows([[cp, 0.0, -sp], [0.0, 1.0, 0.0], [sp, 0.0, cp]]);
    let roll = rows([[1.0, 0.0, 0.0], [0.0, cr, sr], [0.0, -sr, cr]]);
    roll * (pitch * yaw)
}

/// `Mat3` whose rows are `r`, so `m * v` dots each row with `v`.
fn rows(r: [[f32; 3]; 3]) -> Mat3 {
    Mat3::from_cols_array_2d(&r).transpose()
}

/// World node (or leaf) the entity's world bounds first straddle, if it is
/// in the current PVS.
pub fn find_topnode(
    level: &Level,
    root: i32,
    mins: Vec3,
    maxs: Vec3,
    state: &FrameState,
) -> Option<NodeRef> {
    let mut at = NodeRef::from_child(root);
    loop {
        match at {
            NodeRef::Leaf(l) => {
                let leaf = level.leafs.get(l as usize)?;
                let ok = state.leaf_visible(l) && leaf.contents != CONTENTS_SOLID;
                return ok.then_some(at);
            }
            NodeRef::Node(n) => {
                if !state.node_visible(n) {
                    return None;
                }
                let node = &level.nodes[n as usize];
                let sides = box_on_plane_side(mins, maxs, &level.planes[node.plane as usize]);
                if sides == SIDE_BOTH {
                    return Some(at);
                }
                // front bit set: everything is in front
                at = node.child(if sides & 1 != 0 { 0 } else { 1 });
            }
        }
    }
}

/// Submodel faces visible from `view_origin`, clipped into world leaves.
///
/// `state` must hold the stamps of the world walk for this frame.
pub fn clip_submodel(
    world: &BrushModel,
    model: &BrushModel,
    entity: &BrushEntity,
    view_origin: Vec3,
    state: &FrameState,
) -> Vec<ClippedFragment> {
    let level = &*world.level;
    let rotated = entity.angles != Vec3::ZERO;
    let rotation = if rotated {
        entity_rotation(entity.angles)
    } else {
        Mat3::IDENTITY
    };

    let sub = model.submodel();
    let (mins, maxs) = if rotated {
        let r = Vec3::splat(radius_from_bounds(sub.mins, sub.maxs));
        (entity.origin - r, entity.origin + r)
    } else {
        (entity.origin + sub.mins, entity.origin + sub.maxs)
    };

    let Some(topnode) = find_topnode(level, world.headnode(), mins, maxs, state) else {
        return Vec::new();
    };

    let clipper = Clipper {
        level,
        state,
        rotation,
        entity_origin: entity.origin,
    };
    let modelorg = rotation * (view_origin - entity.origin);

    let mut out = Vec::new();
    let mut truncated = 0usize;
    for s in model.surfaces() {
        let surf = &model.level.surfaces[s as usize];
        let plane = &model.level.planes[surf.plane as usize];
        let dot = plane.normal.dot(modelorg) - plane.dist;
        let back = surf.flags.contains(SurfaceFlags::PLANEBACK);
        let facing = (back && dot < -BACKFACE_EPSILON) || (!back && dot > BACKFACE_EPSILON);
        if !facing {
            continue;
        }

        let points: Vec<Vec3> = model.level.surface_points(surf).collect();
        match topnode {
            NodeRef::Leaf(l) => {
                let edges = points
                    .iter()
                    .zip(points.iter().cycle().skip(1))
                    .map(|(&a, &b)| [clipper.to_world(a), clipper.to_world(b)])
                    .collect();
                out.push(ClippedFragment {
                    surface: s,
                    leaf: l,
                    edges,
                });
            }
            NodeRef::Node(n) => {
                let edges: EdgeList = points
                    .iter()
                    .zip(points.iter().cycle().skip(1))
                    .map(|(&a, &b)| [a, b])
                    .collect();
                let mut budget = Budget {
                    verts: 0,
                    edges: edges.len(),
                };
                if clipper.clip(s, edges, n, &mut budget, &mut out).is_err() {
                    truncated += 1;
                }
            }
        }
    }

    if truncated > 0 {
        log::warn!(
            "{}: {truncated} face(s) ran out of clip space ({MAX_BMODEL_VERTS} verts / {MAX_BMODEL_EDGES} edges)",
            level.name
        );
    }
    out
}

/// Per-face pool usage.
struct Budget {
    verts: usize,
    edges: usize,
}

/// Pool exhausted; the rest of the face is abandoned.
struct OutOfClipSpace;

struct Clipper<'a> {
    level: &'a Level,
    state: &'a FrameState,
    rotation: Mat3,
    entity_origin: Vec3,
}

impl Clipper<'_> {
    /// Local (rotated) point back to world space.
    fn to_world(&self, p: Vec3) -> Vec3 {
        self.rotation.transpose() * p + self.entity_origin
    }

    fn clip(
        &self,
        surface: SurfaceId,
        edges: EdgeList,
        node: NodeId,
        budget: &mut Budget,
        out: &mut Vec<ClippedFragment>,
    ) -> Result<(), OutOfClipSpace> {
        let n = &self.level.nodes[node as usize];
        let plane = &self.level.planes[n.plane as usize];
        let normal = self.rotation * plane.normal;
        let dist = plane.dist - self.entity_origin.dot(plane.normal);

        let mut sides: [EdgeList; 2] = [SmallVec::new(), SmallVec::new()];
        let mut enter = None;
        let mut exit = None;
        let mut split = false;

        for [a, b] in edges {
            let last = a.dot(normal) - dist;
            let cur = b.dot(normal) - dist;
            let last_side = if last > 0.0 { 0 } else { 1 };
            let side = if cur > 0.0 { 0 } else { 1 };

            if side == last_side {
                sides[side].push([a, b]);
                continue;
            }

            if budget.verts >= MAX_BMODEL_VERTS {
                return Err(OutOfClipSpace);
            }
            let frac = last / (last - cur);
            let mid = a + (b - a) * frac;
            budget.verts += 1;

            if budget.edges >= MAX_BMODEL_EDGES - 1 {
                return Err(OutOfClipSpace);
            }
            sides[last_side].push([a, mid]);
            sides[side].push([mid, b]);
            budget.edges += 2;

            if side == 0 {
                enter = Some(mid);
            } else {
                exit = Some(mid);
            }
            split = true;
        }

        if split {
            if budget.edges >= MAX_BMODEL_EDGES - 2 {
                return Err(OutOfClipSpace);
            }
            // close both halves along the split line
            if let (Some(enter), Some(exit)) = (enter, exit) {
                sides[0].push([exit, enter]);
                sides[1].push([enter, exit]);
                budget.edges += 2;
            }
        }

        for (i, list) in sides.into_iter().enumerate() {
            if list.is_empty() {
                continue;
            }
            match n.child(i) {
                NodeRef::Leaf(l) => self.emit(surface, l, &list, out),
                NodeRef::Node(child) => {
                    if self.state.node_visible(child) {
                        self.clip(surface, list, child, budget, out)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn emit(
        &self,
        surface: SurfaceId,
        l: LeafId,
        list: &[[Vec3; 2]],
        out: &mut Vec<ClippedFragment>,
    ) {
        let Some(leaf) = self.level.leafs.get(l as usize) else {
            return;
        };
        if !self.state.leaf_visible(l) || leaf.contents == CONTENTS_SOLID {
            return;
        }
        out.push(ClippedFragment {
            surface,
            leaf: l,
            edges: list
                .iter()
                .map(|&[a, b]| [self.to_world(a), self.to_world(b)])
                .collect(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        engine::{bsp::render_world, types::View},
        testutil::models_two_rooms,
    };

    fn setup(view: Vec3) -> (BrushModel, BrushModel, FrameState) {
        let models = models_two_rooms();
        let world = models[0].brush().unwrap().clone();
        let door = models[1].brush().unwrap().clone();
        let mut st = FrameState::new(&world.level);
        render_world(&world, &mut st, &View::new(view, Vec3::ZERO, 0.0));
        (world, door, st)
    }

    fn close(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn rotation_order_is_roll_pitch_yaw() {
        assert!(close(entity_rotation(Vec3::ZERO) * Vec3::X, Vec3::X));
        // yaw 90: world +Y is local +X
        let r = entity_rotation(Vec3::new(0.0, 90.0, 0.0));
        assert!(close(r * Vec3::Y, Vec3::X));
        assert!(close(r * Vec3::X, -Vec3::Y));

        let a = Vec3::new(30.0, 60.0, 10.0);
        let (sy, cy) = 60f32.to_radians().sin_cos();
        let (sp, cp) = 30f32.to_radians().sin_cos();
        let (sr, cr) = 10f32.to_radians().sin_cos();
        let yaw = rows([[cy, sy, 0.0], [-sy, cy, 0.0], [0.0, 0.0, 1.0]]);
        let pitch = rows([[cp, 0.0, -sp], [0.0, 1.0, 0.0], [sp, 0.0, cp]]);
        let roll = rows([[1.0, 0.0, 0.0], [0.0, cr, sr], [0.0, -sr, cr]]);
        let v = Vec3::new(1.0, 2.0, 3.0);
        assert!(close(entity_rotation(a) * v, roll * (pitch * (yaw * v))));
    }

    #[test]
    fn door_splits_across_both_rooms() {
        let (world, door, st) = setup(Vec3::new(5.0, 10.0, 10.0));
        let eye = Vec3::new(5.0, 10.0, 10.0);
        let frags = clip_submodel(&world, &door, &BrushEntity::default(), eye, &st);

        assert_eq!(frags.len(), 2);
        assert_eq!((frags[0].leaf, frags[1].leaf), (1, 2));
        for f in &frags {
            assert_eq!(f.surface, 3);
            assert_eq!(f.edges.len(), 4);
            assert!(f.edges.iter().flatten().all(|p| p.y == 32.0));
        }
        assert!(frags[0].edges.iter().flatten().all(|p| p.x >= 0.0));
        assert!(frags[1].edges.iter().flatten().all(|p| p.x <= 0.0));
    }

    #[test]
    fn back_of_door_is_not_drawn() {
        // the door faces -y; from y = 50 the viewer sees its back
        let (world, door, st) = setup(Vec3::new(5.0, 50.0, 10.0));
        let eye = Vec3::new(5.0, 50.0, 10.0);
        let frags = clip_submodel(&world, &door, &BrushEntity::default(), eye, &st);
        assert!(frags.is_empty());
    }

    #[test]
    fn moved_door_lands_in_one_leaf() {
        let (world, door, st) = setup(Vec3::new(5.0, 10.0, 10.0));
        let ent = BrushEntity {
            origin: Vec3::new(40.0, 0.0, 8.0),
            ..Default::default()
        };
        // bounds x 7..73, z 7..41: entirely in front of node0 and node1
        let sub = door.submodel();
        let (mins, maxs) = (ent.origin + sub.mins, ent.origin + sub.maxs);
        assert_eq!(
            find_topnode(&world.level, world.headnode(), mins, maxs, &st),
            Some(NodeRef::Leaf(1))
        );
        let eye = Vec3::new(5.0, 10.0, 10.0);
        let frags = clip_submodel(&world, &door, &ent, eye, &st);
        assert_eq!(frags.len(), 1);
        assert_eq!(frags[0].leaf, 1);
        assert_eq!(frags[0].edges.len(), 4);
        assert!(close(frags[0].edges[0][0], Vec3::new(8.0, 32.0, 8.0)));
    }

    #[test]
    fn invisible_topnode_draws_nothing() {
        let (world, door, mut st) = setup(Vec3::new(5.0, 10.0, 10.0));
        st.node_visframe[0] = 0;
        let eye = Vec3::new(5.0, 10.0, 10.0);
        let frags = clip_submodel(&world, &door, &BrushEntity::default(), eye, &st);
        assert!(frags.is_empty());
    }

    #[test]
    fn out_of_space_drops_the_face() {
        let (world, door, st) = setup(Vec3::new(5.0, 10.0, 10.0));
        let clipper = Clipper {
            level: &world.level,
            state: &st,
            rotation: Mat3::IDENTITY,
            entity_origin: Vec3::ZERO,
        };
        let points: Vec<Vec3> = door.level.surface_points(&door.level.surfaces[3]).collect();
        let edges: EdgeList = points
            .iter()
            .zip(points.iter().cycle().skip(1))
            .map(|(&a, &b)| [a, b])
            .collect();
        let mut budget = Budget {
            verts: 0,
            edges: MAX_BMODEL_EDGES - 1,
        };
        let mut out = Vec::new();
        assert!(clipper.clip(3, edges, 0, &mut budget, &mut out).is_err());
        assert!(out.is_empty());
    }
}
