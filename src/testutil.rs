//! In-memory BSP / MDL / SPR files for the unit tests.

use std::rc::Rc;

use bincode::{Encode, encode_to_vec};

use crate::{
    format::{
        BspHeader, HEADER_SIZE, LumpId, LumpInfo,
        alias::*,
        bsp::*,
        header::{BSPVERSION, HEADER_LUMPS, IDPOLYHEADER, IDSPRITEHEADER},
        miptex::{MIPLEVELS, RawMiptexHeader, mip_pixel_count},
        raw::{Record, le_config, name16},
        sprite::{RawSpriteFrame, RawSpriteHeader, SPR_GROUP, SPR_SINGLE, SPRITE_VERSION},
    },
    io::{MemSource, ScratchBuffer},
    memory::Hunk,
    model::{Model, brush::load_brush_model, context::LoaderContext},
    world::Level,
};

fn enc<T: Encode>(v: T) -> Vec<u8> {
    encode_to_vec(v, le_config()).unwrap()
}

fn enc_all<T: Encode + Copy>(vs: &[T]) -> Vec<u8> {
    vs.iter().flat_map(|&v| enc(v)).collect()
}

/// Textures lump with the given `(name, width, height)` entries.
pub fn miptex_lump(textures: &[Option<(&str, u32, u32)>]) -> Vec<u8> {
    let table = 4 + 4 * textures.len();
    let mut body = Vec::new();
    let mut offsets = Vec::new();
    for (i, t) in textures.iter().enumerate() {
        let Some((name, w, h)) = *t else {
            offsets.push(-1i32);
            continue;
        };
        offsets.push((table + body.len()) as i32);
        let mut mip = [0u32; MIPLEVELS];
        let mut at = RawMiptexHeader::SIZE as u32;
        for (level, m) in mip.iter_mut().enumerate() {
            *m = at;
            at += (w >> level) * (h >> level);
        }
        body.extend(enc(RawMiptexHeader {
            name: name16(name),
            width: w,
            height: h,
            offsets: mip,
        }));
        body.extend((0..mip_pixel_count(w, h)).map(|p| (p + i) as u8));
    }

    let mut out = Vec::with_capacity(table + body.len());
    out.extend(&(textures.len() as i32).to_le_bytes());
    for o in offsets {
        out.extend(&o.to_le_bytes());
    }
    out.extend(body);
    out
}

/*====================================================================*/
/*                       BSP                                          */
/*====================================================================*/

/// Every lump of a BSP as editable records.
#[derive(Clone, Debug)]
pub struct BspFixture {
    pub planes: Vec<RawPlane>,
    pub vertices: Vec<RawVertex>,
    pub edges: Vec<RawEdge>,
    pub surfedges: Vec<i32>,
    pub textures: Vec<Option<(String, u32, u32)>>,
    pub texinfo: Vec<RawTexInfo>,
    pub faces: Vec<RawFace>,
    pub lighting: Vec<u8>,
    pub marksurfaces: Vec<i16>,
    pub visdata: Vec<u8>,
    pub leafs: Vec<RawLeaf>,
    pub nodes: Vec<RawNode>,
    pub clipnodes: Vec<RawClipNode>,
    pub entities: String,
    pub models: Vec<RawModel>,
    /// Append stray bytes to one lump.
    pub extra_lump_bytes: Option<(LumpId, usize)>,
}

fn plane(normal: [f32; 3], dist: f32, kind: i32) -> RawPlane {
    RawPlane { normal, dist, kind }
}

fn face(planenum: i16, side: i16, firstedge: i32, texinfo: i16, lightofs: i32) -> RawFace {
    RawFace {
        planenum,
        side,
        firstedge,
        numedges: 4,
        texinfo,
        styles: if lightofs >= 0 { [0, 255, 255, 255] } else { [255; 4] },
        lightofs,
    }
}

fn leaf(contents: i32, visofs: i32, first: u16, count: u16) -> RawLeaf {
    RawLeaf {
        contents,
        visofs,
        mins: [-64, 0, 0],
        maxs: [64, 64, 64],
        firstmarksurface: first,
        nummarksurfaces: count,
        ambient_level: [0, 0, 0, 0],
    }
}

fn node(planenum: i32, children: [i16; 2], firstface: u16) -> RawNode {
    RawNode {
        planenum,
        children,
        mins: [-64, 0, 0],
        maxs: [64, 64, 64],
        firstface,
        numfaces: 1,
    }
}

impl BspFixture {
    /// Two 64³ rooms split by the plane x = 0, plus a door submodel.
    ///
    /// ```text
    ///  node0  x=0   ─┬─ front: node1  z=0 ─┬─ leaf1 (room +x, floor A)
    ///   wall C       │                     └─ leaf0 (solid)
    ///                └─ back:  node2  z=0 ─┬─ leaf2 (room -x, floor B)
    ///                                      └─ leaf0
    /// ```
    pub fn two_rooms() -> Self {
        let v = |x: f32, y: f32, z: f32| RawVertex { point: [x, y, z] };
        let e = |a: u16, b: u16| RawEdge { v: [a, b] };
        let tex = |s: [f32; 4], t: [f32; 4], miptex: i32| RawTexInfo {
            vecs: [s, t],
            miptex,
            flags: 0,
        };

        Self {
            planes: vec![
                plane([1.0, 0.0, 0.0], 0.0, 0),
                plane([0.0, 0.0, 1.0], 0.0, 2),
                plane([0.0, 1.0, 0.0], 32.0, 1),
            ],
            vertices: vec![
                v(0.0, 0.0, 0.0),
                v(64.0, 0.0, 0.0),
                v(64.0, 64.0, 0.0),
                v(0.0, 64.0, 0.0),
                v(-64.0, 0.0, 0.0),
                v(-64.0, 64.0, 0.0),
                v(0.0, 64.0, 64.0),
                v(0.0, 0.0, 64.0),
                v(-32.0, 32.0, 0.0),
                v(32.0, 32.0, 0.0),
                v(32.0, 32.0, 32.0),
                v(-32.0, 32.0, 32.0),
            ],
            edges: vec![
                e(0, 0),
                e(0, 1),
                e(1, 2),
                e(2, 3),
                e(3, 0),
                e(4, 0),
                e(3, 5),
                e(5, 4),
                e(3, 6),
                e(6, 7),
                e(7, 0),
                e(8, 9),
                e(9, 10),
                e(10, 11),
                e(11, 8),
            ],
            surfedges: vec![1, 2, 3, 4, 5, -4, 6, 7, -4, 8, 9, 10, 11, 12, 13, 14],
            textures: vec![
                Some(("floor".into(), 16, 16)),
                Some(("+0wall".into(), 16, 16)),
                Some(("+1wall".into(), 16, 16)),
            ],
            texinfo: vec![
                tex([1.0, 0.0, 0.0, 0.0], [0.0, 1.0, 0.0, 0.0], 0),
                tex([0.0, 1.0, 0.0, 0.0], [0.0, 0.0, 1.0, 0.0], 1),
            ],
            faces: vec![
                face(1, 0, 0, 0, 0),
                face(1, 0, 4, 0, -1),
                face(0, 0, 8, 1, -1),
                face(2, 1, 12, 0, -1),
            ],
            lighting: (0..25).map(|i| i * 10).collect(),
            marksurfaces: vec![0, 2, 1, 2],
            visdata: vec![0x03, 0x03],
            leafs: vec![leaf(-2, -1, 0, 0), leaf(-1, 0, 0, 2), leaf(-1, 1, 2, 2)],
            nodes: vec![node(0, [1, 2], 2), node(1, [-2, -1], 0), node(1, [-3, -1], 1)],
            clipnodes: vec![RawClipNode {
                planenum: 1,
                children: [-1, -2],
            }],
            entities: "{\n\"classname\" \"worldspawn\"\n}\n".into(),
            models: vec![
                RawModel {
                    mins: [-64.0, 0.0, 0.0],
                    maxs: [64.0, 64.0, 64.0],
                    origin: [0.0; 3],
                    headnode: [0; 4],
                    visleafs: 2,
                    firstface: 0,
                    numfaces: 4,
                },
                RawModel {
                    mins: [-32.0, 32.0, 0.0],
                    maxs: [32.0, 32.0, 32.0],
                    origin: [0.0; 3],
                    headnode: [0; 4],
                    visleafs: 0,
                    firstface: 3,
                    numfaces: 1,
                },
            ],
            extra_lump_bytes: None,
        }
    }

    fn lump_bytes(&self, id: LumpId) -> Vec<u8> {
        let mut bytes = match id {
            LumpId::Entities => {
                let mut b = self.entities.as_bytes().to_vec();
                b.push(0);
                b
            }
            LumpId::Planes => enc_all(&self.planes),
            LumpId::Textures => {
                let t: Vec<_> = self
                    .textures
                    .iter()
                    .map(|t| t.as_ref().map(|(n, w, h)| (n.as_str(), *w, *h)))
                    .collect();
                miptex_lump(&t)
            }
            LumpId::Vertexes => enc_all(&self.vertices),
            LumpId::Visibility => self.visdata.clone(),
            LumpId::Nodes => enc_all(&self.nodes),
            LumpId::TexInfo => enc_all(&self.texinfo),
            LumpId::Faces => enc_all(&self.faces),
            LumpId::Lighting => self.lighting.clone(),
            LumpId::ClipNodes => enc_all(&self.clipnodes),
            LumpId::Leafs => enc_all(&self.leafs),
            LumpId::MarkSurfaces => enc_all(&self.marksurfaces),
            LumpId::Edges => enc_all(&self.edges),
            LumpId::SurfEdges => enc_all(&self.surfedges),
            LumpId::Models => enc_all(&self.models),
        };
        match self.extra_lump_bytes {
            Some((extra, n)) if extra == id => bytes.extend(std::iter::repeat_n(0xAA, n)),
            _ => {}
        }
        bytes
    }

    /// Serialise with lumps in on-disk order, each 4-byte aligned.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut body = Vec::new();
        let mut lumps = [LumpInfo::default(); HEADER_LUMPS];
        for id in LumpId::ALL {
            let bytes = self.lump_bytes(id);
            lumps[id as usize] = LumpInfo {
                offset: (HEADER_SIZE + body.len()) as i32,
                length: bytes.len() as i32,
            };
            body.extend(bytes);
            while body.len() % 4 != 0 {
                body.push(0);
            }
        }
        let mut out = BspHeader {
            version: BSPVERSION,
            lumps,
        }
        .to_bytes();
        out.extend(body);
        out
    }
}

/// World model plus the `*1` door of the two-room level.
pub fn models_two_rooms() -> Vec<Model> {
    let mut src = MemSource::new();
    src.insert("maps/two.bsp", BspFixture::two_rooms().to_bytes());
    let mut scratch = ScratchBuffer::with_capacity(1 << 20);
    let mut hunk = Hunk::new(1 << 20);
    let mut ctx = LoaderContext::new(&src, "maps/two.bsp", &mut scratch, &mut hunk, None).unwrap();
    load_brush_model(&mut ctx).unwrap()
}

/// The two-room level, built through the real loader and unshared.
pub fn level_two_rooms() -> Level {
    let models = models_two_rooms();
    let level = Rc::clone(&models[0].brush().unwrap().level);
    drop(models);
    Rc::try_unwrap(level).unwrap()
}

/*====================================================================*/
/*                       MDL / SPR                                    */
/*====================================================================*/

/// Three-vertex MDL: a single skin plus a two-skin group, a single
/// `stand1` frame plus a `run1`/`run2` group.
#[derive(Clone, Debug)]
pub struct MdlFixture {
    pub header: RawAliasHeader,
    pub frame_intervals: [f32; 2],
}

impl Default for MdlFixture {
    fn default() -> Self {
        Self {
            header: RawAliasHeader {
                ident: IDPOLYHEADER as i32,
                version: ALIAS_VERSION,
                scale: [1.0; 3],
                scale_origin: [0.0; 3],
                bounding_radius: 10.0,
                eye_position: [0.0, 0.0, 24.0],
                num_skins: 2,
                skin_width: 8,
                skin_height: 4,
                num_verts: 3,
                num_tris: 1,
                num_frames: 2,
                sync_type: 0,
                flags: 8,
                size: 11.0,
            },
            frame_intervals: [0.1, 0.2],
        }
    }
}

impl MdlFixture {
    pub fn to_bytes(&self) -> Vec<u8> {
        let skin = vec![7u8; 32];
        let tv = |x: u8| RawTriVertex {
            v: [x, x, x],
            light_normal_index: 0,
        };
        let frame = |name: &str, x: u8| {
            let mut b = enc(RawAliasFrame {
                bboxmin: tv(0),
                bboxmax: tv(x),
                name: name16(name),
            });
            b.extend(enc_all(&[tv(0), tv(x), tv(x / 2)]));
            b
        };

        let mut out = enc(self.header);
        // skins
        out.extend(enc(ALIAS_SKIN_SINGLE));
        out.extend(&skin);
        out.extend(enc(ALIAS_SKIN_GROUP));
        out.extend(enc(2i32));
        out.extend(enc_all(&[0.1f32, 0.2]));
        out.extend(&skin);
        out.extend(&skin);
        // mesh
        out.extend(enc_all(&[
            RawStVert { onseam: 0, s: 0, t: 0 },
            RawStVert { onseam: 0, s: 4, t: 2 },
            RawStVert { onseam: 1, s: 7, t: 3 },
        ]));
        out.extend(enc(RawTriangle {
            faces_front: 1,
            vertindex: [0, 1, 2],
        }));
        // frames
        out.extend(enc(ALIAS_SINGLE));
        out.extend(frame("stand1", 10));
        out.extend(enc(ALIAS_GROUP));
        out.extend(enc(RawAliasGroup {
            num_frames: 2,
            bboxmin: tv(0),
            bboxmax: tv(20),
        }));
        out.extend(enc_all(&self.frame_intervals));
        out.extend(frame("run1", 12));
        out.extend(frame("run2", 20));
        out
    }
}

/// SPR with a 4×2 single frame and a two-frame 1×1 group whose pixels are
/// `1` and `2`.
#[derive(Clone, Debug)]
pub struct SprFixture {
    pub header: RawSpriteHeader,
    pub group_intervals: [f32; 2],
}

impl Default for SprFixture {
    fn default() -> Self {
        Self {
            header: RawSpriteHeader {
                ident: IDSPRITEHEADER as i32,
                version: SPRITE_VERSION,
                kind: 0,
                bounding_radius: 3.0,
                width: 5,
                height: 3,
                num_frames: 2,
                beam_length: 0.0,
                sync_type: 0,
            },
            group_intervals: [0.1, 0.2],
        }
    }
}

impl SprFixture {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = enc(self.header);
        out.extend(enc(SPR_SINGLE));
        out.extend(enc(RawSpriteFrame {
            origin: [-2, 1],
            width: 4,
            height: 2,
        }));
        out.extend([9u8; 8]);

        out.extend(enc(SPR_GROUP));
        out.extend(enc(2i32));
        out.extend(enc_all(&self.group_intervals));
        for px in [1u8, 2] {
            out.extend(enc(RawSpriteFrame {
                origin: [0, 0],
                width: 1,
                height: 1,
            }));
            out.push(px);
        }
        out
    }
}
