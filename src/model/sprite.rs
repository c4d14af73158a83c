//! SPR loader.  Sprites are small, so the whole file is read in one window
//! and walked in place.

use std::rc::Rc;

use glam::Vec3;

use crate::{
    format::{
        FormatError, Record, decode_record,
        sprite::{RawSpriteFrame, RawSpriteHeader, SPR_SINGLE, SPRITE_VERSION},
    },
    model::{
        LoadError, Model, ModelKind, alias::pick_interval, brush::radius_from_bounds,
        context::LoaderContext,
    },
};

#[derive(Clone, Debug, PartialEq)]
pub struct SpriteFrame {
    pub width: u32,
    pub height: u32,
    pub up: f32,
    pub down: f32,
    pub left: f32,
    pub right: f32,
    pub pixels: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SpriteFrameDesc {
    Single(SpriteFrame),
    /// `intervals` are cumulative end times.
    Group {
        intervals: Vec<f32>,
        frames: Vec<SpriteFrame>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct SpriteModel {
    /// Orientation mode (parallel, facing, oriented, …).
    pub kind: i32,
    pub maxwidth: i32,
    pub maxheight: i32,
    pub beamlength: f32,
    pub frames: Vec<SpriteFrameDesc>,
}

impl SpriteModel {
    /// Picture for `frame` at `time`.
    pub fn frame(&self, frame: usize, time: f32) -> Option<&SpriteFrame> {
        match self.frames.get(frame)? {
            SpriteFrameDesc::Single(f) => Some(f),
            SpriteFrameDesc::Group { intervals, frames } => {
                frames.get(pick_interval(intervals, time))
            }
        }
    }
}

/// Slice walker over the in-memory file.
struct Reader<'b> {
    bytes: &'b [u8],
    pos: usize,
    path: &'b str,
}

impl<'b> Reader<'b> {
    fn record<T: Record>(&mut self, what: &'static str) -> Result<T, FormatError> {
        let rec = decode_record::<T>(self.bytes.get(self.pos..).unwrap_or(&[]), what)?;
        self.pos += T::SIZE;
        Ok(rec)
    }

    fn bytes(&mut self, count: usize, what: &'static str) -> Result<&'b [u8], FormatError> {
        let available = self.bytes.len().saturating_sub(self.pos);
        if count > available {
            return Err(FormatError::Truncated {
                what,
                needed: count,
                available,
            });
        }
        let out = &self.bytes[self.pos..self.pos + count];
        self.pos += count;
        Ok(out)
    }

    fn invalid(&self, reason: String) -> LoadError {
        LoadError::Invalid {
            model: self.path.to_owned(),
            reason,
        }
    }

    fn frame(&mut self) -> Result<SpriteFrame, LoadError> {
        let f: RawSpriteFrame = self.record("sprite frame")?;
        if f.width < 0 || f.height < 0 {
            return Err(self.invalid(format!("sprite frame {}x{}", f.width, f.height)));
        }
        let (w, h) = (f.width as u32, f.height as u32);
        let count = (w as usize)
            .checked_mul(h as usize)
            .ok_or_else(|| self.invalid(format!("sprite frame {w}x{h}")))?;
        let pixels = self.bytes(count, "sprite pixels")?.to_vec();
        let [x, y] = f.origin.map(i64::from);
        Ok(SpriteFrame {
            width: w,
            height: h,
            up: y as f32,
            down: (y - i64::from(f.height)) as f32,
            left: x as f32,
            right: (x + i64::from(f.width)) as f32,
            pixels,
        })
    }
}

pub fn load_sprite_model(ctx: &mut LoaderContext<'_>) -> Result<Model, LoadError> {
    let len = ctx.file_len as usize;
    let path = ctx.path;
    let (sprite, header) = {
        let bytes = ctx.window(0, len)?;
        parse(bytes, path)?
    };

    let pixels: usize = sprite
        .frames
        .iter()
        .map(|d| match d {
            SpriteFrameDesc::Single(f) => f.pixels.len(),
            SpriteFrameDesc::Group { frames, .. } => frames.iter().map(|f| f.pixels.len()).sum(),
        })
        .sum();
    ctx.charge::<SpriteModel>(1)?;
    ctx.charge_bytes(pixels)?;

    let half_w = (sprite.maxwidth / 2) as f32;
    let half_h = (sprite.maxheight / 2) as f32;
    let mins = Vec3::new(-half_w, -half_w, -half_h);
    let maxs = -mins;

    log::debug!("{path}: {} frames, {pixels} pixels", sprite.frames.len());

    Ok(Model {
        name: path.to_owned(),
        numframes: header.num_frames as u32,
        flags: 0,
        synctype: header.sync_type.into(),
        mins,
        maxs,
        radius: radius_from_bounds(mins, maxs),
        kind: ModelKind::Sprite(Rc::new(sprite)),
    })
}

fn parse(bytes: &[u8], path: &str) -> Result<(SpriteModel, RawSpriteHeader), LoadError> {
    let mut r = Reader { bytes, pos: 0, path };
    let h: RawSpriteHeader = r.record("sprite header")?;
    if h.version != SPRITE_VERSION {
        return Err(FormatError::BadVersion {
            what: "sprite",
            expected: SPRITE_VERSION,
            found: h.version,
        }
        .into());
    }
    if h.num_frames < 1 {
        return Err(r.invalid(format!("invalid frame count {}", h.num_frames)));
    }

    let mut frames = Vec::new();
    for _ in 0..h.num_frames {
        let kind: i32 = r.record("sprite frame type")?;
        if kind == SPR_SINGLE {
            frames.push(SpriteFrameDesc::Single(r.frame()?));
            continue;
        }
        let count: i32 = r.record("sprite group")?;
        if count < 1 {
            return Err(r.invalid(format!("sprite group of {count}")));
        }
        let mut intervals = Vec::new();
        for _ in 0..count {
            let t: f32 = r.record("sprite interval")?;
            if t <= 0.0 {
                return Err(r.invalid(format!("sprite interval {t} <= 0")));
            }
            intervals.push(t);
        }
        let group = (0..count).map(|_| r.frame()).collect::<Result<Vec<_>, _>>()?;
        frames.push(SpriteFrameDesc::Group {
            intervals,
            frames: group,
        });
    }

    Ok((
        SpriteModel {
            kind: h.kind,
            maxwidth: h.width,
            maxheight: h.height,
            beamlength: h.beam_length,
            frames,
        },
        h,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{MemSource, ScratchBuffer};
    use crate::memory::Hunk;
    use crate::testutil::SprFixture;

    fn load(bytes: Vec<u8>) -> Result<Model, LoadError> {
        let mut src = MemSource::new();
        src.insert("progs/s_light.spr", bytes);
        let mut scratch = ScratchBuffer::with_capacity(1 << 16);
        let mut hunk = Hunk::new(1 << 16);
        let mut ctx = LoaderContext::new(&src, "progs/s_light.spr", &mut scratch, &mut hunk, None)?;
        load_sprite_model(&mut ctx)
    }

    #[test]
    fn single_and_group_frames() {
        let m = load(SprFixture::default().to_bytes()).unwrap();
        assert_eq!(m.numframes, 2);
        assert_eq!(m.flags, 0);
        // maxwidth 5, maxheight 3: integer halves
        assert_eq!(m.mins, Vec3::new(-2.0, -2.0, -1.0));
        assert_eq!(m.maxs, Vec3::new(2.0, 2.0, 1.0));

        let s = m.sprite().unwrap();
        let f = s.frame(0, 0.0).unwrap();
        assert_eq!((f.width, f.height), (4, 2));
        assert_eq!((f.up, f.down, f.left, f.right), (1.0, -1.0, -2.0, 2.0));
        assert_eq!(f.pixels.len(), 8);

        assert_eq!(s.frame(1, 0.05).unwrap().pixels[0], 1);
        assert_eq!(s.frame(1, 0.15).unwrap().pixels[0], 2);
    }

    #[test]
    fn wrong_version() {
        let mut fx = SprFixture::default();
        fx.header.version = 2;
        assert!(matches!(
            load(fx.to_bytes()),
            Err(LoadError::Format(FormatError::BadVersion { found: 2, .. }))
        ));
    }

    #[test]
    fn no_frames() {
        let mut fx = SprFixture::default();
        fx.header.num_frames = 0;
        assert!(matches!(load(fx.to_bytes()), Err(LoadError::Invalid { .. })));
    }

    #[test]
    fn bad_interval() {
        let mut fx = SprFixture::default();
        fx.group_intervals = [-1.0, 0.2];
        assert!(matches!(load(fx.to_bytes()), Err(LoadError::Invalid { .. })));
    }

    fn frame_bytes(origin: [i32; 2], width: i32, height: i32) -> Vec<u8> {
        let frame = RawSpriteFrame {
            origin,
            width,
            height,
        };
        bincode::encode_to_vec(frame, crate::format::raw::le_config()).unwrap()
    }

    #[test]
    fn huge_frame_is_truncated() {
        let mut fx = SprFixture::default();
        fx.header.num_frames = 1;
        let mut bytes = fx.to_bytes();
        bytes.truncate(RawSpriteHeader::SIZE);
        bytes.extend(&SPR_SINGLE.to_le_bytes());
        bytes.extend(frame_bytes([i32::MAX, i32::MIN], i32::MAX, i32::MAX));
        assert!(matches!(
            load(bytes),
            Err(LoadError::Format(FormatError::Truncated { what: "sprite pixels", .. }))
        ));
    }

    #[test]
    fn extreme_origin_keeps_extents() {
        let raw = frame_bytes([i32::MAX, i32::MIN], 0, 0);
        let mut r = Reader {
            bytes: &raw,
            pos: 0,
            path: "x.spr",
        };
        let f = r.frame().unwrap();
        assert_eq!(f.right, i32::MAX as f32);
        assert_eq!(f.down, i32::MIN as f32);
        assert!(f.pixels.is_empty());
    }

    #[test]
    fn truncated_pixels() {
        let mut bytes = SprFixture::default().to_bytes();
        bytes.pop();
        assert!(matches!(
            load(bytes),
            Err(LoadError::Format(FormatError::Truncated { .. }))
        ));
    }
}
