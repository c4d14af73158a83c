//! MDL loader.
//!
//! * The mesh is decoded record by record through a [`StreamCursor`].
//! * Skins, frames and groups are assembled in the hunk, then the finished
//!   [`AliasModel`] is serialised into a single [`Cache`] entry and the hunk
//!   is rewound.
//! * Only the descriptor ([`Model`]) stays in the registry; the payload is
//!   re-fetched (and reloaded on eviction) through the registry.

use bincode::{Decode, Encode, decode_from_slice, encode_to_vec};
use glam::Vec3;

use crate::{
    format::{
        FormatError,
        alias::*,
        name_str,
        raw::le_config,
    },
    memory::{Cache, CacheUser},
    model::{
        LoadError, Model, ModelKind, RegistryError,
        brush::radius_from_bounds,
        context::{LoaderContext, StreamCursor},
    },
};

/// Alias models get a fixed box; per-frame boxes are in the frames.
pub const ALIAS_BOUNDS: f32 = 16.0;

/*====================================================================*/
/*                       Cached payload                               */
/*====================================================================*/

/// Texture coordinate, `s` / `t` in 16.16 fixed point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Decode, Encode)]
pub struct StVert {
    pub onseam: i32,
    pub s: i32,
    pub t: i32,
}

#[derive(Clone, Debug, PartialEq, Decode, Encode)]
pub enum AliasSkin {
    Single(Vec<u8>),
    Group { intervals: Vec<f32>, skins: Vec<Vec<u8>> },
}

#[derive(Clone, Debug, PartialEq, Decode, Encode)]
pub struct PoseFrame {
    pub name: String,
    pub bboxmin: RawTriVertex,
    pub bboxmax: RawTriVertex,
    pub verts: Vec<RawTriVertex>,
}

#[derive(Clone, Debug, PartialEq, Decode, Encode)]
pub enum AliasFrame {
    Single(PoseFrame),
    /// Poses cycled by time; `intervals` are cumulative end times.
    Group {
        name: String,
        bboxmin: RawTriVertex,
        bboxmax: RawTriVertex,
        intervals: Vec<f32>,
        poses: Vec<PoseFrame>,
    },
}

impl AliasFrame {
    pub fn name(&self) -> &str {
        match self {
            AliasFrame::Single(p) => &p.name,
            AliasFrame::Group { name, .. } => name,
        }
    }
}

/// Everything the renderer needs to draw one MDL.
#[derive(Clone, Debug, PartialEq, Decode, Encode)]
pub struct AliasModel {
    pub scale: [f32; 3],
    pub scale_origin: [f32; 3],
    pub bounding_radius: f32,
    pub eye_position: [f32; 3],
    pub skin_width: u32,
    pub skin_height: u32,
    pub num_verts: u32,
    /// Header size scaled by `1/11`.
    pub size: f32,
    pub skins: Vec<AliasSkin>,
    pub stverts: Vec<StVert>,
    pub triangles: Vec<RawTriangle>,
    pub frames: Vec<AliasFrame>,
}

impl AliasModel {
    /// Rebuild a model from its cache entry.
    pub fn from_cache_bytes(bytes: &[u8]) -> Result<Self, FormatError> {
        decode_from_slice::<Self, _>(bytes, le_config())
            .map(|(m, _)| m)
            .map_err(|source| FormatError::BadRecord {
                what: "cached alias model",
                index: 0,
                source,
            })
    }

    pub fn to_cache_bytes(&self) -> Result<Vec<u8>, FormatError> {
        Ok(encode_to_vec(self, le_config())?)
    }

    /// Pose of `frame` at `time`; groups pick by cumulative interval.
    pub fn pose(&self, frame: usize, time: f32) -> Option<&PoseFrame> {
        match self.frames.get(frame)? {
            AliasFrame::Single(p) => Some(p),
            AliasFrame::Group { intervals, poses, .. } => {
                poses.get(pick_interval(intervals, time))
            }
        }
    }

    /// Skin pixels of `skin` at `time`.
    pub fn skin(&self, skin: usize, time: f32) -> Option<&[u8]> {
        match self.skins.get(skin)? {
            AliasSkin::Single(px) => Some(px),
            AliasSkin::Group { intervals, skins } => {
                skins.get(pick_interval(intervals, time)).map(Vec::as_slice)
            }
        }
    }
}

/// Index of the first cumulative interval past `time` wrapped into the
/// group's full period.
pub fn pick_interval(intervals: &[f32], time: f32) -> usize {
    let Some(&full) = intervals.last() else {
        return 0;
    };
    if full <= 0.0 {
        return 0;
    }
    let t = time - (time / full).floor() * full;
    intervals
        .iter()
        .position(|&end| end > t)
        .unwrap_or(intervals.len() - 1)
}

/*====================================================================*/
/*                       Loader                                       */
/*====================================================================*/

/// Decode the MDL at `ctx.path` into the cache under `user` and return the
/// registry descriptor.
pub fn load_alias_model(
    ctx: &mut LoaderContext<'_>,
    cache: &mut Cache,
    user: CacheUser,
) -> Result<Model, LoadError> {
    let mark = ctx.hunk.low_mark();
    let mut cur = StreamCursor::new(ctx, 0);

    let h: RawAliasHeader = cur.record("alias header")?;
    validate_header(cur.ctx(), &h)?;

    let skin_px = h.skin_width as usize * h.skin_height as usize;
    let numverts = h.num_verts as usize;

    /*----- skins ---------------------------------------------------------*/
    let mut skins = Vec::new();
    for _ in 0..h.num_skins {
        let kind: i32 = cur.record("skin type")?;
        if kind == ALIAS_SKIN_SINGLE {
            skins.push(AliasSkin::Single(cur.bytes(skin_px)?));
            cur.ctx().charge_bytes(skin_px)?;
            continue;
        }
        let count: i32 = cur.record("skin group")?;
        if count < 1 {
            return Err(cur.ctx().invalid(format!("skin group of {count}")));
        }
        let intervals = intervals(&mut cur, count as usize, "skin")?;
        let mut group = Vec::new();
        for _ in 0..count {
            group.push(cur.bytes(skin_px)?);
        }
        cur.ctx().charge_bytes(skin_px * group.len())?;
        skins.push(AliasSkin::Group {
            intervals,
            skins: group,
        });
    }

    /*----- mesh ----------------------------------------------------------*/
    let stverts: Vec<StVert> = cur
        .records::<RawStVert>(numverts, "stvert")?
        .into_iter()
        .map(|v| StVert {
            onseam: v.onseam,
            s: v.s << 16,
            t: v.t << 16,
        })
        .collect();
    cur.ctx().charge::<StVert>(stverts.len())?;

    let triangles: Vec<RawTriangle> = cur.records(h.num_tris as usize, "triangle")?;
    for (i, tri) in triangles.iter().enumerate() {
        for &v in &tri.vertindex {
            if v < 0 || v as usize >= numverts {
                return Err(cur.ctx().bad_reference("triangle", i, v.into(), numverts));
            }
        }
    }
    cur.ctx().charge::<RawTriangle>(triangles.len())?;

    /*----- frames --------------------------------------------------------*/
    let mut frames = Vec::new();
    for _ in 0..h.num_frames {
        let kind: i32 = cur.record("frame type")?;
        if kind == ALIAS_SINGLE {
            frames.push(AliasFrame::Single(pose(&mut cur, numverts)?));
            continue;
        }
        let g: RawAliasGroup = cur.record("frame group")?;
        if g.num_frames < 1 {
            return Err(cur.ctx().invalid(format!("frame group of {}", g.num_frames)));
        }
        let intervals = intervals(&mut cur, g.num_frames as usize, "frame")?;
        let mut poses = Vec::new();
        for _ in 0..g.num_frames {
            poses.push(pose(&mut cur, numverts)?);
        }
        // the group is known by its last pose
        let name = poses.last().map(|p| p.name.clone()).unwrap_or_default();
        frames.push(AliasFrame::Group {
            name,
            bboxmin: g.bboxmin,
            bboxmax: g.bboxmax,
            intervals,
            poses,
        });
    }

    let alias = AliasModel {
        scale: h.scale,
        scale_origin: h.scale_origin,
        bounding_radius: h.bounding_radius,
        eye_position: h.eye_position,
        skin_width: h.skin_width as u32,
        skin_height: h.skin_height as u32,
        num_verts: numverts as u32,
        size: h.size * ALIAS_BASE_SIZE_RATIO,
        skins,
        stverts,
        triangles,
        frames,
    };

    /*----- move into the cache -------------------------------------------*/
    let bytes = alias.to_cache_bytes()?;
    let tag = ctx.tag.clone();
    match cache.alloc(user, bytes.len(), &tag) {
        Ok(slot) => slot.copy_from_slice(&bytes),
        Err(e) => {
            log::warn!("{}: {e}", ctx.path);
            return Err(RegistryError::CachingFailed(ctx.path.to_owned()).into());
        }
    }
    ctx.hunk.free_to_low_mark(mark);

    log::debug!(
        "{}: {} verts, {} tris, {} frames, {} cached bytes",
        ctx.path,
        numverts,
        h.num_tris,
        h.num_frames,
        bytes.len()
    );

    let mins = Vec3::splat(-ALIAS_BOUNDS);
    let maxs = Vec3::splat(ALIAS_BOUNDS);
    Ok(Model {
        name: ctx.path.to_owned(),
        kind: ModelKind::Alias,
        numframes: h.num_frames as u32,
        flags: h.flags,
        synctype: h.sync_type.into(),
        mins,
        maxs,
        radius: radius_from_bounds(mins, maxs),
    })
}

fn validate_header(ctx: &LoaderContext<'_>, h: &RawAliasHeader) -> Result<(), LoadError> {
    if h.version != ALIAS_VERSION {
        return Err(FormatError::BadVersion {
            what: "alias model",
            expected: ALIAS_VERSION,
            found: h.version,
        }
        .into());
    }
    let reason = if h.skin_height > MAX_LBM_HEIGHT {
        format!("skin height {} exceeds {MAX_LBM_HEIGHT}", h.skin_height)
    } else if h.num_verts <= 0 {
        "no vertices".to_owned()
    } else if h.num_verts > MAXALIASVERTS {
        format!("{} vertices exceeds {MAXALIASVERTS}", h.num_verts)
    } else if h.num_tris <= 0 {
        "no triangles".to_owned()
    } else if h.skin_width <= 0
        || h.skin_height <= 0
        || h.skin_width & 3 != 0
        || h.skin_width.checked_mul(h.skin_height).is_none()
    {
        format!("bad skin size {}x{}", h.skin_width, h.skin_height)
    } else if h.num_skins < 1 {
        format!("invalid skin count {}", h.num_skins)
    } else if h.num_frames < 1 {
        format!("invalid frame count {}", h.num_frames)
    } else {
        return Ok(());
    };
    Err(ctx.invalid(reason))
}

/// Group intervals; every entry must be positive.
fn intervals(cur: &mut StreamCursor<'_, '_>, count: usize, what: &str) -> Result<Vec<f32>, LoadError> {
    let iv: Vec<f32> = cur.records(count, "interval")?;
    if let Some(bad) = iv.iter().find(|&&t| t <= 0.0) {
        return Err(cur.ctx().invalid(format!("{what} interval {bad} <= 0")));
    }
    cur.ctx().charge::<f32>(iv.len())?;
    Ok(iv)
}

fn pose(cur: &mut StreamCursor<'_, '_>, numverts: usize) -> Result<PoseFrame, LoadError> {
    let f: RawAliasFrame = cur.record("alias frame")?;
    let verts: Vec<RawTriVertex> = cur.records(numverts, "trivertex")?;
    cur.ctx().charge::<RawTriVertex>(verts.len())?;
    Ok(PoseFrame {
        name: name_str(&f.name).to_owned(),
        bboxmin: f.bboxmin,
        bboxmax: f.bboxmax,
        verts,
    })
}

/*====================================================================*/
/*                               Tests                                */
/*====================================================================*/
