// ──────────────────────────────────────────────────────────────────────────
// model/brush.rs
//
//  *   BSP lumps  (format::bsp, one window each)   ──╮
//  *   miptex lump → TextureBank + anim rings         │  --->  world::Level (Rc)
//  *   hull 0 mirror, parents, submodels              │         + one Model per submodel
//                                                    ╯
// ──────────────────────────────────────────────────────────────────────────

use std::rc::Rc;

use glam::Vec3;

use crate::{
    format::{
        BspHeader, HEADER_SIZE, LumpId, Record, decode_lump,
        bsp::{
            RawClipNode, RawEdge, RawFace, RawLeaf, RawMarkSurface, RawModel, RawNode, RawPlane,
            RawSurfEdge, RawTexInfo, RawVertex,
        },
        miptex::parse_miptex_lump,
    },
    model::{BrushModel, LoadError, Model, ModelKind, SyncType, context::LoaderContext},
    world::{
        geometry::*,
        texture::{NO_TEXTURE, Texture, TextureBank, TextureId},
    },
};

/// Box hulls 1 and 2: player-sized and shambler-sized.
pub const HULL1_MINS: Vec3 = Vec3::new(-16.0, -16.0, -24.0);
pub const HULL1_MAXS: Vec3 = Vec3::new(16.0, 16.0, 32.0);
pub const HULL2_MINS: Vec3 = Vec3::new(-32.0, -32.0, -24.0);
pub const HULL2_MAXS: Vec3 = Vec3::new(32.0, 32.0, 64.0);

/*====================================================================*/
/*                       Public API                                   */
/*====================================================================*/

/// Build the level at `ctx.path` and return one model per submodel; index
/// 0 is the world itself, index `i` is `"*i"`.
pub fn load_brush_model(ctx: &mut LoaderContext<'_>) -> Result<Vec<Model>, LoadError> {
    let header_len = (HEADER_SIZE as u64).min(ctx.file_len) as usize;
    let file_len = ctx.file_len;
    let header = BspHeader::parse(ctx.window(0, header_len)?, file_len)?;
    let mut r = LumpReader { ctx, header };

    /*----- lumps, in dependency order ------------------------------------*/
    let vertices = r.vertexes()?;
    let edges = r.edges(vertices.len())?;
    let surfedges = r.surfedges(edges.len())?;
    let (textures, miptex) = r.textures()?;
    let lightdata = r.bytes(LumpId::Lighting)?;
    let planes = r.planes()?;
    let texinfo = r.texinfo(&miptex)?;
    let surfaces = r.faces(&FaceInputs {
        vertices: &vertices,
        edges: &edges,
        surfedges: &surfedges,
        planes: &planes,
        texinfo: &texinfo,
        textures: &textures,
    })?;
    let marksurfaces = r.marksurfaces(surfaces.len())?;
    let visdata = r.bytes(LumpId::Visibility)?;
    let mut leafs = r.leafs(marksurfaces.len(), visdata.len())?;
    let mut nodes = r.nodes(planes.len(), leafs.len(), surfaces.len())?;
    set_parents(&mut nodes, &mut leafs);
    let clipnodes = r.clipnodes(planes.len())?;
    let hull0 = make_hull0(&nodes, &leafs);
    r.ctx.charge::<ClipNode>(hull0.len())?;
    let entities = r.entities()?;
    let submodels = r.submodels(nodes.len(), clipnodes.len(), leafs.len(), surfaces.len())?;

    let name = r.ctx.path.to_owned();
    let level = Rc::new(Level {
        name: name.clone(),
        vertices,
        edges,
        surfedges,
        planes,
        texinfo,
        surfaces,
        marksurfaces,
        nodes,
        leafs,
        clipnodes,
        hull0,
        lightdata,
        visdata,
        entities,
        submodels,
        textures,
        miptex,
    });

    log::info!(
        "{name}: {} nodes, {} leafs, {} surfaces, {} textures, {} submodels",
        level.nodes.len(),
        level.leafs.len(),
        level.surfaces.len(),
        level.textures.len() - 1,
        level.submodels.len()
    );

    Ok((0..level.submodels.len())
        .map(|i| {
            let model_name = if i == 0 { name.clone() } else { format!("*{i}") };
            submodel(&level, i, model_name)
        })
        .collect())
}

/// Model descriptor for submodel `i` of `level`.
pub fn submodel(level: &Rc<Level>, i: usize, name: String) -> Model {
    let bm = &level.submodels[i];
    let last_node = level.nodes.len() as i32 - 1;
    let last_clip = level.clipnodes.len() as i32 - 1;
    let hulls = [
        Hull {
            set: ClipSet::DrawTree,
            first_clipnode: bm.headnode[0],
            last_clipnode: last_node,
            clip_mins: Vec3::ZERO,
            clip_maxs: Vec3::ZERO,
        },
        Hull {
            set: ClipSet::Lump,
            first_clipnode: bm.headnode[1],
            last_clipnode: last_clip,
            clip_mins: HULL1_MINS,
            clip_maxs: HULL1_MAXS,
        },
        Hull {
            set: ClipSet::Lump,
            first_clipnode: bm.headnode[2],
            last_clipnode: last_clip,
            clip_mins: HULL2_MINS,
            clip_maxs: HULL2_MAXS,
        },
    ];

    Model {
        name,
        kind: ModelKind::Brush(BrushModel {
            level: Rc::clone(level),
            submodel: i,
            firstmodelsurface: bm.firstface,
            nummodelsurfaces: bm.numfaces,
            numleafs: bm.visleafs,
            hulls,
        }),
        // regular and alternate texture animation
        numframes: 2,
        flags: 0,
        synctype: SyncType::Sync,
        mins: bm.mins,
        maxs: bm.maxs,
        radius: radius_from_bounds(bm.mins, bm.maxs),
    }
}

pub fn radius_from_bounds(mins: Vec3, maxs: Vec3) -> f32 {
    mins.abs().max(maxs.abs()).length()
}

/*====================================================================*/
/*                       Lump reader                                  */
/*====================================================================*/

struct LumpReader<'c, 'a> {
    ctx: &'c mut LoaderContext<'a>,
    header: BspHeader,
}

struct FaceInputs<'l> {
    vertices: &'l [Vertex],
    edges: &'l [Edge],
    surfedges: &'l [i32],
    planes: &'l [Plane],
    texinfo: &'l [TexInfo],
    textures: &'l TextureBank,
}

/// Checked signed index into a table of `limit` entries.
fn index(value: i64, limit: usize) -> Option<usize> {
    usize::try_from(value).ok().filter(|&v| v < limit)
}

impl LumpReader<'_, '_> {
    fn window(&mut self, id: LumpId) -> Result<&[u8], LoadError> {
        let l = self.header.lump(id);
        log::debug!("{}: lump {id} {} bytes at {}", self.ctx.tag, l.length, l.offset);
        self.ctx.window(l.offset as u64, l.length as usize)
    }

    fn records<T: Record>(&mut self, id: LumpId) -> Result<Vec<T>, LoadError> {
        let bytes = self.window(id)?;
        Ok(decode_lump::<T>(bytes, id.name())?)
    }

    fn bytes(&mut self, id: LumpId) -> Result<Vec<u8>, LoadError> {
        let out = self.window(id)?.to_vec();
        self.ctx.charge_bytes(out.len())?;
        Ok(out)
    }

    fn bad(&self, what: &'static str, index: usize, target: i64, limit: usize) -> LoadError {
        self.ctx.bad_reference(what, index, target, limit)
    }

    /*----- geometry ------------------------------------------------------*/

    fn vertexes(&mut self) -> Result<Vec<Vertex>, LoadError> {
        let raw: Vec<RawVertex> = self.records(LumpId::Vertexes)?;
        self.ctx.charge::<Vertex>(raw.len())?;
        Ok(raw
            .into_iter()
            .map(|v| Vertex {
                pos: Vec3::from_array(v.point),
            })
            .collect())
    }

    fn edges(&mut self, nverts: usize) -> Result<Vec<Edge>, LoadError> {
        let raw: Vec<RawEdge> = self.records(LumpId::Edges)?;
        self.ctx.charge::<Edge>(raw.len())?;
        raw.iter()
            .enumerate()
            .map(|(i, e)| {
                for v in e.v {
                    if v as usize >= nverts {
                        return Err(self.bad("edge", i, v.into(), nverts));
                    }
                }
                Ok(Edge {
                    v: e.v.map(u32::from),
                })
            })
            .collect()
    }

    fn surfedges(&mut self, nedges: usize) -> Result<Vec<i32>, LoadError> {
        let raw: Vec<RawSurfEdge> = self.records(LumpId::SurfEdges)?;
        self.ctx.charge::<i32>(raw.len())?;
        for (i, &e) in raw.iter().enumerate() {
            if e.unsigned_abs() as usize >= nedges {
                return Err(self.bad("surfedge", i, e.into(), nedges));
            }
        }
        Ok(raw)
    }

    fn planes(&mut self) -> Result<Vec<Plane>, LoadError> {
        let raw: Vec<RawPlane> = self.records(LumpId::Planes)?;
        self.ctx.charge::<Plane>(raw.len())?;
        Ok(raw
            .into_iter()
            .map(|p| Plane::new(Vec3::from_array(p.normal), p.dist, p.kind as u8))
            .collect())
    }

    /*----- textures ------------------------------------------------------*/

    /// Decode the miptex lump into a bank.  Returns the bank and, per lump
    /// slot, the id the slot resolved to.
    fn textures(&mut self) -> Result<(TextureBank, Vec<Option<TextureId>>), LoadError> {
        let raws = parse_miptex_lump(self.window(LumpId::Textures)?)?;
        let limit = self.ctx.texture_limit;
        let mut bank = TextureBank::default_with_checker();
        let mut slots = Vec::with_capacity(raws.len());

        // texture-limit bookkeeping
        let mut loaded = 0usize;
        let mut substitutes: Vec<TextureId> = Vec::new();
        let mut rover = 0usize;

        for raw in &raws {
            let Some(raw) = raw else {
                slots.push(None);
                continue;
            };
            let mut name = raw.name().to_owned();
            let special = name.starts_with("sky") || name.starts_with('*');

            if let Some(limit) = limit {
                if name.starts_with('+') {
                    name.replace_range(..1, "_");
                }
                if loaded >= limit && !special {
                    let sub = (!substitutes.is_empty()).then(|| {
                        let id = substitutes[rover % substitutes.len()];
                        rover += 1;
                        id
                    });
                    log::warn!("{}: texture {name} not loaded, substituting {sub:?}", self.ctx.tag);
                    slots.push(sub);
                    continue;
                }
            }

            let id = match bank.id(&name) {
                Some(id) => id,
                None => {
                    let tex = Texture::from_miptex(raw, &name);
                    self.ctx
                        .charge_bytes(size_of::<Texture>() + tex.pixels.len() + tex.resampled.len())?;
                    if tex.sky {
                        log::debug!("{}: sky texture {name}", self.ctx.tag);
                    }
                    bank.insert(tex)?
                }
            };
            loaded += 1;
            if !special {
                substitutes.push(id);
            }
            slots.push(Some(id));
        }

        bank.sequence_animations(&slots)?;
        Ok((bank, slots))
    }

    fn texinfo(&mut self, miptex: &[Option<TextureId>]) -> Result<Vec<TexInfo>, LoadError> {
        let raw: Vec<RawTexInfo> = self.records(LumpId::TexInfo)?;
        self.ctx.charge::<TexInfo>(raw.len())?;
        raw.iter()
            .enumerate()
            .map(|(i, t)| {
                let len = (Vec3::from_slice(&t.vecs[0][..3]).length()
                    + Vec3::from_slice(&t.vecs[1][..3]).length())
                    / 2.0;
                let mipadjust = if len < 0.32 {
                    4.0
                } else if len < 0.49 {
                    3.0
                } else if len < 0.99 {
                    2.0
                } else {
                    1.0
                };

                let (texture, flags) = if miptex.is_empty() {
                    (NO_TEXTURE, TexInfoFlags::empty())
                } else {
                    let slot = index(t.miptex.into(), miptex.len())
                        .ok_or_else(|| self.bad("texinfo", i, t.miptex.into(), miptex.len()))?;
                    match miptex[slot] {
                        Some(id) => (id, TexInfoFlags::from_bits_truncate(t.flags as u32)),
                        None => (NO_TEXTURE, TexInfoFlags::empty()),
                    }
                };

                Ok(TexInfo {
                    vecs: t.vecs,
                    mipadjust,
                    texture,
                    flags,
                })
            })
            .collect()
    }

    /*----- faces ---------------------------------------------------------*/

    fn faces(&mut self, inp: &FaceInputs<'_>) -> Result<Vec<Surface>, LoadError> {
        let raw: Vec<RawFace> = self.records(LumpId::Faces)?;
        self.ctx.charge::<Surface>(raw.len())?;
        raw.iter()
            .enumerate()
            .map(|(i, f)| {
                let plane = index(f.planenum.into(), inp.planes.len())
                    .ok_or_else(|| self.bad("face plane", i, f.planenum.into(), inp.planes.len()))?;
                let ti = index(f.texinfo.into(), inp.texinfo.len())
                    .ok_or_else(|| self.bad("face texinfo", i, f.texinfo.into(), inp.texinfo.len()))?;
                if f.numedges < 3 {
                    let limit = inp.surfedges.len();
                    return Err(self.bad("face edge count", i, f.numedges.into(), limit));
                }
                let numedges = f.numedges as usize;
                let firstedge = index(f.firstedge.into(), inp.surfedges.len() + 1)
                    .filter(|&first| first + numedges <= inp.surfedges.len())
                    .ok_or_else(|| {
                        self.bad("face edges", i, f.firstedge.into(), inp.surfedges.len())
                    })?;

                let mut flags = SurfaceFlags::empty();
                if f.side != 0 {
                    flags |= SurfaceFlags::PLANEBACK;
                }
                let texinfo = &inp.texinfo[ti];
                let texname = &inp.textures.texture(texinfo.texture)?.name;
                if texname.starts_with("sky") {
                    flags |= SurfaceFlags::DRAWSKY | SurfaceFlags::DRAWTILED;
                } else if texname.starts_with('*') {
                    flags |= SurfaceFlags::DRAWTURB | SurfaceFlags::DRAWTILED;
                }

                let mut surf = Surface {
                    plane: plane as PlaneId,
                    flags,
                    firstedge: firstedge as u32,
                    numedges: numedges as u32,
                    texinfo: ti as TexInfoId,
                    texturemins: [0; 2],
                    extents: [0; 2],
                    styles: f.styles,
                    lightofs: u32::try_from(f.lightofs).ok(),
                };
                self.calc_surface_extents(&mut surf, i, inp)?;
                Ok(surf)
            })
            .collect()
    }

    /// Project every corner onto the texture axes and snap to 16-texel blocks.
    fn calc_surface_extents(
        &self,
        surf: &mut Surface,
        face: usize,
        inp: &FaceInputs<'_>,
    ) -> Result<(), LoadError> {
        let tex = &inp.texinfo[surf.texinfo as usize];
        if surf.flags.contains(SurfaceFlags::DRAWTILED) {
            surf.extents = [TILED_EXTENT; 2];
            surf.texturemins = [TILED_TEXTUREMINS; 2];
            return Ok(());
        }

        let mut mins = [999_999.0f32; 2];
        let mut maxs = [-99_999.0f32; 2];
        let first = surf.firstedge as usize;
        for &e in &inp.surfedges[first..first + surf.numedges as usize] {
            let vert = if e >= 0 {
                inp.edges[e as usize].v[0]
            } else {
                inp.edges[e.unsigned_abs() as usize].v[1]
            };
            let p = inp.vertices[vert as usize].pos;
            for j in 0..2 {
                let v = tex.vecs[j];
                let val = p.x * v[0] + p.y * v[1] + p.z * v[2] + v[3];
                mins[j] = mins[j].min(val);
                maxs[j] = maxs[j].max(val);
            }
        }

        for j in 0..2 {
            let bmin = (mins[j] / 16.0).floor() as i64;
            let bmax = (maxs[j] / 16.0).ceil() as i64;
            let extent = (bmax - bmin) * 16;
            let bad = || LoadError::BadSurfaceExtents {
                model: self.ctx.path.to_owned(),
                face,
                extent: i32::try_from(extent).unwrap_or(i32::MAX),
            };
            if !tex.flags.contains(TexInfoFlags::SPECIAL) && extent > MAX_SURFACE_EXTENT as i64 {
                return Err(bad());
            }
            surf.texturemins[j] = i16::try_from(bmin * 16).map_err(|_| bad())?;
            surf.extents[j] = i16::try_from(extent).map_err(|_| bad())?;
        }
        Ok(())
    }

    /*----- leaves & nodes ------------------------------------------------*/

    fn marksurfaces(&mut self, nsurfaces: usize) -> Result<Vec<SurfaceId>, LoadError> {
        let raw: Vec<RawMarkSurface> = self.records(LumpId::MarkSurfaces)?;
        self.ctx.charge::<SurfaceId>(raw.len())?;
        raw.iter()
            .enumerate()
            .map(|(i, &m)| {
                let s = m as u16 as usize;
                if s >= nsurfaces {
                    return Err(self.bad("marksurface", i, s as i64, nsurfaces));
                }
                Ok(s as SurfaceId)
            })
            .collect()
    }

    fn leafs(&mut self, nmarks: usize, vislen: usize) -> Result<Vec<Leaf>, LoadError> {
        let raw: Vec<RawLeaf> = self.records(LumpId::Leafs)?;
        self.ctx.charge::<Leaf>(raw.len())?;
        raw.iter()
            .enumerate()
            .map(|(i, l)| {
                let first = l.firstmarksurface as usize;
                let count = l.nummarksurfaces as usize;
                if first + count > nmarks {
                    return Err(self.bad("leaf marksurfaces", i, (first + count) as i64, nmarks));
                }
                let visofs = match l.visofs {
                    -1 => None,
                    _ if vislen == 0 => None,
                    ofs => Some(
                        index(ofs.into(), vislen)
                            .ok_or_else(|| self.bad("leaf visofs", i, ofs.into(), vislen))?
                            as u32,
                    ),
                };
                Ok(Leaf {
                    contents: l.contents,
                    visofs,
                    mins: l.mins,
                    maxs: l.maxs,
                    firstmarksurface: first as u32,
                    nummarksurfaces: count as u32,
                    ambient_sound_level: l.ambient_level,
                    parent: None,
                })
            })
            .collect()
    }

    fn nodes(&mut self, nplanes: usize, nleafs: usize, nsurfaces: usize) -> Result<Vec<Node>, LoadError> {
        let raw: Vec<RawNode> = self.records(LumpId::Nodes)?;
        self.ctx.charge::<Node>(raw.len())?;
        let nnodes = raw.len();
        raw.iter()
            .enumerate()
            .map(|(i, n)| {
                let plane = index(n.planenum.into(), nplanes)
                    .ok_or_else(|| self.bad("node plane", i, n.planenum.into(), nplanes))?;
                let first = n.firstface as usize;
                let count = n.numfaces as usize;
                if first + count > nsurfaces {
                    return Err(self.bad("node faces", i, (first + count) as i64, nsurfaces));
                }
                let children = n.children.map(i32::from);
                // a child node always has a higher index than its parent
                for c in children {
                    let ok = match NodeRef::from_child(c) {
                        NodeRef::Node(n) => (i + 1..nnodes).contains(&(n as usize)),
                        NodeRef::Leaf(l) => (l as usize) < nleafs,
                    };
                    if !ok {
                        return Err(self.bad("node child", i, c.into(), nnodes));
                    }
                }
                Ok(Node {
                    plane: plane as PlaneId,
                    children,
                    mins: n.mins,
                    maxs: n.maxs,
                    firstsurface: first as u32,
                    numsurfaces: count as u32,
                    parent: None,
                })
            })
            .collect()
    }

    fn clipnodes(&mut self, nplanes: usize) -> Result<Vec<ClipNode>, LoadError> {
        let raw: Vec<RawClipNode> = self.records(LumpId::ClipNodes)?;
        self.ctx.charge::<ClipNode>(raw.len())?;
        let count = raw.len();
        raw.iter()
            .enumerate()
            .map(|(i, c)| {
                let plane = index(c.planenum.into(), nplanes)
                    .ok_or_else(|| self.bad("clipnode plane", i, c.planenum.into(), nplanes))?;
                let children = c.children.map(i32::from);
                for child in children {
                    if child >= 0 && !(i + 1..count).contains(&(child as usize)) {
                        return Err(self.bad("clipnode child", i, child.into(), count));
                    }
                }
                Ok(ClipNode {
                    plane: plane as PlaneId,
                    children,
                })
            })
            .collect()
    }

    /*----- misc ----------------------------------------------------------*/

    fn entities(&mut self) -> Result<String, LoadError> {
        let bytes = self.window(LumpId::Entities)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        let text = String::from_utf8_lossy(&bytes[..end]).into_owned();
        self.ctx.charge_bytes(text.len())?;
        Ok(text)
    }

    fn submodels(
        &mut self,
        nnodes: usize,
        nclipnodes: usize,
        nleafs: usize,
        nsurfaces: usize,
    ) -> Result<Vec<Submodel>, LoadError> {
        let raw: Vec<RawModel> = self.records(LumpId::Models)?;
        if raw.is_empty() {
            return Err(self.ctx.invalid("no submodels"));
        }
        self.ctx.charge::<Submodel>(raw.len())?;
        raw.iter()
            .enumerate()
            .map(|(i, m)| {
                let head = m.headnode[0];
                if head >= 0 && head as usize >= nnodes {
                    return Err(self.bad("submodel headnode", i, head.into(), nnodes));
                }
                for &h in &m.headnode[1..3] {
                    if h >= 0 && h as usize >= nclipnodes {
                        return Err(self.bad("submodel clip headnode", i, h.into(), nclipnodes));
                    }
                }
                let first = index(m.firstface.into(), nsurfaces + 1)
                    .ok_or_else(|| self.bad("submodel faces", i, m.firstface.into(), nsurfaces))?;
                let count = m.numfaces.max(0) as usize;
                if first + count > nsurfaces {
                    return Err(self.bad("submodel faces", i, (first + count) as i64, nsurfaces));
                }
                let visleafs = m.visleafs.clamp(0, nleafs as i32) as u32;
                Ok(Submodel {
                    // spread the bounds by a unit
                    mins: Vec3::from_array(m.mins) - Vec3::ONE,
                    maxs: Vec3::from_array(m.maxs) + Vec3::ONE,
                    origin: Vec3::from_array(m.origin),
                    headnode: m.headnode,
                    visleafs,
                    firstface: first as u32,
                    numfaces: count as u32,
                })
            })
            .collect()
    }
}

/*====================================================================*/
/*                       Post passes                                  */
/*====================================================================*/

/// Fill `parent` on every node and leaf reachable from the world root.
fn set_parents(nodes: &mut [Node], leafs: &mut [Leaf]) {
    if nodes.is_empty() {
        return;
    }
    let mut stack = vec![(NodeRef::Node(0), None)];
    while let Some((at, parent)) = stack.pop() {
        match at {
            NodeRef::Leaf(l) => leafs[l as usize].parent = parent,
            NodeRef::Node(n) => {
                let node = &mut nodes[n as usize];
                if node.parent.is_some() {
                    continue; // shared subtree, already linked
                }
                node.parent = parent;
                stack.push((node.child(0), Some(n)));
                stack.push((node.child(1), Some(n)));
            }
        }
    }
}

/// Duplicate the draw tree as clip hull 0: leaf children become their
/// contents value.
fn make_hull0(nodes: &[Node], leafs: &[Leaf]) -> Vec<ClipNode> {
    nodes
        .iter()
        .map(|n| ClipNode {
            plane: n.plane,
            children: [0, 1].map(|side| match n.child(side) {
                NodeRef::Node(c) => c as i32,
                NodeRef::Leaf(l) => leafs[l as usize].contents,
            }),
        })
        .collect()
}

/*====================================================================*/
/*                               Tests                                */
/*====================================================================*/
