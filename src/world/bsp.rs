use glam::Vec3;

use crate::world::geometry::{
    ClipNode, ClipSet, Hull, LeafId, Level, NodeRef, Plane, Surface, PLANE_X, PLANE_Z,
};

/// Front / back / straddling result of [`box_on_plane_side`].
pub const SIDE_FRONT: u8 = 1;
pub const SIDE_BACK: u8 = 2;
pub const SIDE_BOTH: u8 = SIDE_FRONT | SIDE_BACK;

/// Bytes in one decompressed PVS row for `numleafs` leaves.
#[inline]
pub fn vis_row_bytes(numleafs: usize) -> usize {
    (numleafs + 7) >> 3
}

// ──────────────────────────────────────────────────────────────────────────
//                       Level – public helpers
// ──────────────────────────────────────────────────────────────────────────
impl Level {
    /// Walk the draw tree from the world root and return the leaf holding `p`.
    /// Points exactly on a plane go to the back side.
    pub fn point_in_leaf(&self, p: Vec3) -> LeafId {
        if self.nodes.is_empty() {
            return 0;
        }
        let mut at = NodeRef::Node(0);
        loop {
            match at {
                NodeRef::Leaf(leaf) => return leaf,
                NodeRef::Node(n) => {
                    let node = &self.nodes[n as usize];
                    let d = self.planes[node.plane as usize].distance(p);
                    at = node.child(if d > 0.0 { 0 } else { 1 });
                }
            }
        }
    }

    /// Run-length decode the PVS row at `visofs`.
    ///
    /// * A zero byte is followed by a count of zero bytes to emit.
    /// * The result is always exactly `vis_row_bytes(numleafs)` long.
    /// * No vis data (or no offset) means everything is visible.
    pub fn decompress_vis(&self, visofs: Option<u32>, numleafs: usize) -> Vec<u8> {
        let row = vis_row_bytes(numleafs);
        let Some(ofs) = visofs.filter(|_| !self.visdata.is_empty()) else {
            return vec![0xFF; row];
        };

        let mut out = Vec::with_capacity(row);
        let mut input = self.visdata.get(ofs as usize..).unwrap_or(&[]).iter();
        while out.len() < row {
            let Some(&b) = input.next() else { break };
            if b != 0 {
                out.push(b);
                continue;
            }
            let run = input.next().copied().unwrap_or(0) as usize;
            let n = run.min(row - out.len());
            out.extend(std::iter::repeat_n(0, n));
        }
        out.resize(row, 0);
        out
    }

    /// Decompressed PVS of `leaf`.  Leaf 0 (outside) sees everything.
    pub fn leaf_pvs(&self, leaf: LeafId, numleafs: usize) -> Vec<u8> {
        if leaf == 0 {
            return vec![0xFF; vis_row_bytes(numleafs)];
        }
        let visofs = self.leafs.get(leaf as usize).and_then(|l| l.visofs);
        self.decompress_vis(visofs, numleafs)
    }

    /// Contents value at `p` in one clip hull.
    pub fn hull_point_contents(&self, hull: &Hull, p: Vec3) -> i32 {
        let nodes: &[ClipNode] = match hull.set {
            ClipSet::DrawTree => &self.hull0,
            ClipSet::Lump => &self.clipnodes,
        };
        let mut num = hull.first_clipnode;
        while num >= 0 {
            let Some(node) = nodes.get(num as usize) else {
                break;
            };
            let d = self.planes[node.plane as usize].distance(p);
            num = node.children[if d < 0.0 { 1 } else { 0 }];
        }
        num
    }

    /// World-space corners of a surface, walking its signed edge loop.
    pub fn surface_points<'a>(&'a self, surf: &Surface) -> impl Iterator<Item = Vec3> + 'a {
        let first = surf.firstedge as usize;
        let edges = &self.surfedges[first..first + surf.numedges as usize];
        edges.iter().map(move |&e| {
            let vert = if e >= 0 {
                self.edges[e as usize].v[0]
            } else {
                self.edges[e.unsigned_abs() as usize].v[1]
            };
            self.vertices[vert as usize].pos
        })
    }

    /// Light samples of a surface: one `smax * tmax` block per active style.
    pub fn lightmap(&self, surf: &Surface) -> Option<&[u8]> {
        let ofs = surf.lightofs? as usize;
        let smax = (surf.extents[0] as usize >> 4) + 1;
        let tmax = (surf.extents[1] as usize >> 4) + 1;
        let styles = surf.styles.iter().take_while(|&&s| s != 255).count();
        self.lightdata.get(ofs..ofs + smax * tmax * styles)
    }
}

/// Which side(s) of `plane` the box `mins..maxs` lies on.
pub fn box_on_plane_side(mins: Vec3, maxs: Vec3, plane: &Plane) -> u8 {
    // axial fast path
    if (PLANE_X..=PLANE_Z).contains(&plane.kind) {
        let k = plane.kind as usize;
        if plane.dist <= mins[k] {
            return SIDE_FRONT;
        }
        if plane.dist >= maxs[k] {
            return SIDE_BACK;
        }
        return SIDE_BOTH;
    }

    // Pick the corner nearest / farthest along the normal from signbits.
    let mut near = Vec3::ZERO;
    let mut far = Vec3::ZERO;
    for j in 0..3 {
        if plane.signbits & (1 << j) != 0 {
            near[j] = maxs[j];
            far[j] = mins[j];
        } else {
            near[j] = mins[j];
            far[j] = maxs[j];
        }
    }
    let dist1 = plane.normal.dot(far);
    let dist2 = plane.normal.dot(near);

    let mut sides = 0;
    if dist1 >= plane.dist {
        sides = SIDE_FRONT;
    }
    if dist2 < plane.dist {
        sides |= SIDE_BACK;
    }
    sides
}
