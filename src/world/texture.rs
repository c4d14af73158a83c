// Repository of the textures one level brought in.  Everything outside
// the loader talks to it through `TextureId` only.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::format::miptex::{MIPLEVELS, RawMiptex, RawMiptexHeader, mip_pixel_count};
use crate::format::raw::Record;

/// Runtime handle for a texture in this bank.
///
/// *Guaranteed* to remain stable for the lifetime of the bank.
pub type TextureId = u16;

/// `TextureId` whose pixels are the checkerboard fallback.
/// Always = 0 because `TextureBank::new()` inserts it first.
pub const NO_TEXTURE: TextureId = 0;

/// Animation frames advance every `1 / 10` s; each frame spans this many ticks.
pub const ANIM_CYCLE: i32 = 2;
/// Frames per cycle (`+0`..`+9`, `+a`..`+j`).
pub const MAX_ANIM_FRAMES: usize = 10;

/// Resampled render copy height for tall textures.
const RESAMPLE_HEIGHT: usize = 32;

/// Animation links.  `total == 0` means the texture does not animate.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AnimInfo {
    pub total: i32,
    pub min: i32,
    pub max: i32,
    pub next: Option<TextureId>,
    pub alternate: Option<TextureId>,
}

/// One palettised texture: the four mip levels as stored in the file plus
/// a power-of-two render copy.
#[derive(Clone, Debug, PartialEq)]
pub struct Texture {
    pub name: String,
    pub w: usize,
    pub h: usize,
    /// Mip level starts, relative to `pixels`.
    pub offsets: [usize; MIPLEVELS],
    pub pixels: Vec<u8>,

    pub resampled: Vec<u8>,
    pub rwidth: usize,
    pub rheight: usize,
    /// Source rows per resampled row, `0.0` when no vertical squeeze happened.
    pub rscale: f32,

    pub anim: AnimInfo,
    pub sky: bool,
}

impl Texture {
    /// Build the runtime texture from a decoded miptex.
    pub fn from_miptex(raw: &RawMiptex, name: &str) -> Self {
        let RawMiptexHeader {
            width,
            height,
            offsets,
            ..
        } = raw.header;
        let (w, h) = (width as usize, height as usize);
        let offsets = offsets.map(|o| (o as usize).saturating_sub(RawMiptexHeader::SIZE));

        let (rwidth, rheight, rscale) = resample_dims(w, h);
        let top = &raw.pixels[..(w * h).min(raw.pixels.len())];
        let resampled = resample(top, w, h, rwidth, rheight);

        Texture {
            name: name.to_owned(),
            w,
            h,
            offsets,
            pixels: raw.pixels.clone(),
            resampled,
            rwidth,
            rheight,
            rscale,
            anim: AnimInfo::default(),
            sky: name.starts_with("sky"),
        }
    }

    /// Pixels of mip level `level` (0 = full size).
    pub fn mip(&self, level: usize) -> &[u8] {
        let level = level.min(MIPLEVELS - 1);
        let (w, h) = (self.w >> level, self.h >> level);
        let start = self.offsets[level];
        self.pixels.get(start..start + w * h).unwrap_or(&[])
    }

    pub fn is_animated(&self) -> bool {
        self.anim.total != 0 || self.anim.alternate.is_some()
    }
}

/// 16×16 checkerboard (with mips) standing in for absent textures.
impl Default for Texture {
    fn default() -> Self {
        const LIGHT_IDX: u8 = 8;
        const DARK_IDX: u8 = 16;
        const SIZE: usize = 16;

        let mut pixels = Vec::with_capacity(mip_pixel_count(SIZE as u32, SIZE as u32));
        let mut offsets = [0; MIPLEVELS];
        for (level, offset) in offsets.iter_mut().enumerate() {
            *offset = pixels.len();
            let size = SIZE >> level;
            let block = (8 >> level).max(1);
            for y in 0..size {
                for x in 0..size {
                    pixels.push(if (x / block + y / block) & 1 == 0 {
                        LIGHT_IDX
                    } else {
                        DARK_IDX
                    });
                }
            }
        }
        let resampled = pixels[..SIZE * SIZE].to_vec();
        Texture {
            name: "notexture".to_string(),
            w: SIZE,
            h: SIZE,
            offsets,
            pixels,
            resampled,
            rwidth: SIZE,
            rheight: SIZE,
            rscale: 0.0,
            anim: AnimInfo::default(),
            sky: false,
        }
    }
}

/// Things that can go wrong when using the bank.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TextureError {
    /// Attempted to insert a second texture with an existing name.
    #[error("texture name `{0}` already present in bank")]
    Duplicate(String),

    /// Requested ID is outside `0 .. bank.len()`.
    #[error("texture id {0} out of range")]
    BadId(TextureId),
}

/// Failures while linking or walking animation cycles.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AnimationError {
    #[error("bad animating texture {0}")]
    BadAnimatingTexture(String),

    #[error("missing frame {frame} of {name}")]
    BrokenAnimationCycle { name: String, frame: usize },

    #[error("broken cycle at {0}")]
    BrokenCycle(String),

    #[error("infinite cycle at {0}")]
    InfiniteCycle(String),

    #[error(transparent)]
    Texture(#[from] TextureError),
}

/// A format-agnostic cache of textures.
///
/// * Stores exactly one copy of every name.
/// * ID **0** is always the “missing” checkerboard.
///
/// **Thread-safety:** access `TextureBank` from a single thread or wrap it
/// in `RwLock`; the struct itself is not `Sync`.
#[derive(Debug)]
pub struct TextureBank {
    by_name: HashMap<String, TextureId>,
    data: Vec<Texture>,
}

impl TextureBank {
    // ---------------------------------------------------------------------
    // Constructors
    // ---------------------------------------------------------------------

    /// Create a bank whose id **0** is `missing_tex`, registered under the
    /// fixed name `"MISSING"`.
    pub fn new(missing_tex: Texture) -> Self {
        let mut by_name = HashMap::new();
        by_name.insert("MISSING".into(), NO_TEXTURE);
        Self {
            by_name,
            data: vec![missing_tex],
        }
    }

    pub fn default_with_checker() -> Self {
        Self::new(Texture::default())
    }

    // ---------------------------------------------------------------------
    // Query helpers
    // ---------------------------------------------------------------------

    /// Number of textures stored (including the “missing” one).
    pub fn len(&self) -> usize {
        self.data.len()
    }
    pub fn is_empty(&self) -> bool {
        self.data.len() == 1
    } // only checker

    /// Obtain the id for a *loaded* texture by name.
    pub fn id(&self, name: &str) -> Option<TextureId> {
        self.by_name.get(name).copied()
    }

    /// Borrow a texture by id, with bounds-checking.
    pub fn texture(&self, id: TextureId) -> Result<&Texture, TextureError> {
        self.data.get(id as usize).ok_or(TextureError::BadId(id))
    }

    pub fn texture_mut(&mut self, id: TextureId) -> Result<&mut Texture, TextureError> {
        self.data
            .get_mut(id as usize)
            .ok_or(TextureError::BadId(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = (TextureId, &Texture)> {
        self.data
            .iter()
            .enumerate()
            .map(|(i, t)| (i as TextureId, t))
    }

    // ---------------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------------

    /// Insert a texture under its own name.
    pub fn insert(&mut self, tex: Texture) -> Result<TextureId, TextureError> {
        if self.by_name.contains_key(&tex.name) {
            return Err(TextureError::Duplicate(tex.name));
        }
        let id = self.data.len() as TextureId;
        self.by_name.insert(tex.name.clone(), id);
        self.data.push(tex);
        Ok(id)
    }

    /// Link every `+Nname` / `+Xname` group into its frame rings.
    ///
    /// `slots` is the lump order (`None` for absent entries); members are
    /// matched on the name after the two-character prefix.
    pub fn sequence_animations(&mut self, slots: &[Option<TextureId>]) -> Result<(), AnimationError> {
        for (i, &slot) in slots.iter().enumerate() {
            let Some(id) = slot else { continue };
            let tex = self.texture(id)?;
            let Some((frame, suffix)) = anim_name(&tex.name) else {
                continue;
            };
            if tex.anim.next.is_some() {
                continue; // already sequenced
            }
            let name = tex.name.clone();
            let suffix = suffix.to_owned();

            let mut anims: [Option<TextureId>; MAX_ANIM_FRAMES] = [None; MAX_ANIM_FRAMES];
            let mut altanims: [Option<TextureId>; MAX_ANIM_FRAMES] = [None; MAX_ANIM_FRAMES];
            let (mut max, mut altmax) = (0, 0);

            let mut place = |frame: char, id: TextureId, owner: &str| -> Result<(), AnimationError> {
                match anim_slot(frame) {
                    Some(AnimSlot::Regular(n)) => {
                        anims[n] = Some(id);
                        max = max.max(n + 1);
                    }
                    Some(AnimSlot::Alternate(n)) => {
                        altanims[n] = Some(id);
                        altmax = altmax.max(n + 1);
                    }
                    None => return Err(AnimationError::BadAnimatingTexture(owner.to_owned())),
                }
                Ok(())
            };
            place(frame, id, &name)?;

            for &other in slots[i + 1..].iter().flatten() {
                let tex2 = self.texture(other)?;
                let Some((frame2, suffix2)) = anim_name(&tex2.name) else {
                    continue;
                };
                if suffix2 != suffix {
                    continue;
                }
                place(frame2, other, &tex2.name)?;
            }

            self.link_cycle(&name, &anims[..max], altanims[0])?;
            self.link_cycle(&name, &altanims[..altmax], anims[0])?;
        }
        Ok(())
    }

    /// Close one ring; `alternate` is the other ring's first frame (only
    /// recorded when that ring exists).
    fn link_cycle(
        &mut self,
        name: &str,
        frames: &[Option<TextureId>],
        alternate: Option<TextureId>,
    ) -> Result<(), AnimationError> {
        let max = frames.len();
        for (j, frame) in frames.iter().enumerate() {
            let Some(id) = *frame else {
                return Err(AnimationError::BrokenAnimationCycle {
                    name: name.to_owned(),
                    frame: j,
                });
            };
            let next = frames[(j + 1) % max];
            let tex = self.texture_mut(id)?;
            tex.anim.total = max as i32 * ANIM_CYCLE;
            tex.anim.min = j as i32 * ANIM_CYCLE;
            tex.anim.max = (j as i32 + 1) * ANIM_CYCLE;
            tex.anim.next = next;
            tex.anim.alternate = alternate;
        }
        Ok(())
    }
}

/*======================================================================*/
/*                          Name parsing                                */
/*======================================================================*/

static ANIM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+(.)(.*)$").unwrap());

/// `"+3slime"` → `('3', "slime")`.
fn anim_name(name: &str) -> Option<(char, &str)> {
    let caps = ANIM_RE.captures(name)?;
    let frame = caps.get(1)?.as_str().chars().next()?;
    Some((frame, caps.get(2)?.as_str()))
}

enum AnimSlot {
    Regular(usize),
    Alternate(usize),
}

fn anim_slot(frame: char) -> Option<AnimSlot> {
    match frame.to_ascii_uppercase() {
        c @ '0'..='9' => Some(AnimSlot::Regular(c as usize - '0' as usize)),
        c @ 'A'..='J' => Some(AnimSlot::Alternate(c as usize - 'A' as usize)),
        _ => None,
    }
}

/*======================================================================*/
/*                           Resampling                                 */
/*======================================================================*/

/// Smallest power of two `>= v` (`1` for `0`).
pub fn pow2(v: usize) -> usize {
    v.next_power_of_two()
}

/// Render copy size for a `w × h` texture: `(rwidth, rheight, rscale)`.
pub fn resample_dims(w: usize, h: usize) -> (usize, usize, f32) {
    if h > RESAMPLE_HEIGHT {
        let squeezed = (w as f64 / (h as f64 / RESAMPLE_HEIGHT as f64)) as usize;
        let mut rw = pow2(squeezed);
        for step in [8, 16, 32] {
            if rw != step && rw < step {
                rw = step;
                break;
            }
        }
        (rw, RESAMPLE_HEIGHT, h as f32 / RESAMPLE_HEIGHT as f32)
    } else {
        (pow2(w), pow2(h), 0.0)
    }
}

/// Nearest-neighbour resample with 16.16 column stepping.
pub fn resample(input: &[u8], inw: usize, inh: usize, outw: usize, outh: usize) -> Vec<u8> {
    let mut out = vec![0u8; outw * outh];
    if inw == 0 || inh == 0 || outw == 0 || outh == 0 || input.len() < inw * inh {
        return out;
    }
    let fracstep = (inw as u32).wrapping_mul(0x10000) / outw as u32;
    for (i, row) in out.chunks_exact_mut(outw).enumerate() {
        let inrow = &input[(i * inh / outh) * inw..][..inw];
        let mut frac = fracstep >> 1;
        for px in row.iter_mut() {
            *px = inrow[((frac >> 16) as usize).min(inw - 1)];
            frac = frac.wrapping_add(fracstep);
        }
    }
    out
}

/*======================================================================*/
/*                               Tests                                  */
/*======================================================================*/
#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_tex(name: &str, color: u8) -> Texture {
        Texture {
            name: name.to_string(),
            w: 2,
            h: 2,
            offsets: [0; MIPLEVELS],
            pixels: vec![color; 4],
            resampled: vec![color; 4],
            rwidth: 2,
            rheight: 2,
            rscale: 0.0,
            anim: AnimInfo::default(),
            sky: false,
        }
    }

    fn bank_with(names: &[&str]) -> (TextureBank, Vec<Option<TextureId>>) {
        let mut bank = TextureBank::default_with_checker();
        let slots = names
            .iter()
            .map(|n| Some(bank.insert(dummy_tex(n, 1)).unwrap()))
            .collect();
        (bank, slots)
    }

    #[test]
    fn insert_and_lookup() {
        let mut bank = TextureBank::default_with_checker();
        let red = bank.insert(dummy_tex("RED", 0x00)).unwrap();
        let blue = bank.insert(dummy_tex("BLUE", 0xFF)).unwrap();

        assert_ne!(red, NO_TEXTURE);
        assert_ne!(blue, red);
        assert_eq!(bank.id("RED"), Some(red));
        assert_eq!(bank.id("NOPE"), None);
        assert_eq!(bank.texture(blue).unwrap().pixels[0], 0xFF);
    }

    #[test]
    fn duplicate_name_rejected() {
        let mut bank = TextureBank::default_with_checker();
        bank.insert(dummy_tex("WOOD", 1)).unwrap();
        let err = bank.insert(dummy_tex("WOOD", 2)).unwrap_err();
        assert_eq!(err, TextureError::Duplicate("WOOD".into()));
        assert_eq!(bank.len(), 2);
    }

    #[test]
    fn bad_id_guard() {
        let bank = TextureBank::default_with_checker();
        let bad = TextureId::MAX;
        assert_eq!(bank.texture(bad).unwrap_err(), TextureError::BadId(bad));
    }

    #[test]
    fn checker_has_all_mips() {
        let t = Texture::default();
        assert_eq!(t.pixels.len(), 340);
        assert_eq!(t.mip(3).len(), 4);
        assert_ne!(t.mip(0)[0], t.mip(0)[8]);
    }

    /*---------------------------- animation ---------------------------*/

    #[test]
    fn regular_cycle_closes() {
        let (mut bank, slots) = bank_with(&["+0lava", "stone", "+2lava", "+1lava"]);
        bank.sequence_animations(&slots).unwrap();

        let start = slots[0].unwrap();
        let t = bank.texture(start).unwrap();
        assert_eq!(t.anim.total, 3 * ANIM_CYCLE);
        assert_eq!((t.anim.min, t.anim.max), (0, 2));

        // walking total / cycle links returns to the start
        let mut id = start;
        let mut seen = Vec::new();
        for _ in 0..(t.anim.total / ANIM_CYCLE) {
            seen.push(id);
            id = bank.texture(id).unwrap().anim.next.unwrap();
        }
        assert_eq!(id, start);
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 3);
        assert_eq!(bank.texture(slots[1].unwrap()).unwrap().anim.total, 0);
    }

    #[test]
    fn alternate_rings_point_at_each_other() {
        let (mut bank, slots) = bank_with(&["+0btn", "+1btn", "+abtn"]);
        bank.sequence_animations(&slots).unwrap();
        let alt = slots[2].unwrap();
        assert_eq!(bank.texture(slots[0].unwrap()).unwrap().anim.alternate, Some(alt));
        assert_eq!(bank.texture(slots[1].unwrap()).unwrap().anim.alternate, Some(alt));
        let a = bank.texture(alt).unwrap();
        assert_eq!(a.anim.alternate, slots[0]);
        assert_eq!(a.anim.next, Some(alt));
        assert_eq!(a.anim.total, ANIM_CYCLE);
    }

    #[test]
    fn missing_frame_breaks_cycle() {
        let (mut bank, slots) = bank_with(&["+0fan", "+2fan"]);
        let err = bank.sequence_animations(&slots).unwrap_err();
        assert!(matches!(
            err,
            AnimationError::BrokenAnimationCycle { frame: 1, .. }
        ));
    }

    #[test]
    fn bad_frame_character() {
        let (mut bank, slots) = bank_with(&["+zfan"]);
        let err = bank.sequence_animations(&slots).unwrap_err();
        assert_eq!(err, AnimationError::BadAnimatingTexture("+zfan".into()));
    }

    #[test]
    fn absent_slots_are_skipped() {
        let (mut bank, mut slots) = bank_with(&["+0fan", "+1fan"]);
        slots.insert(1, None);
        bank.sequence_animations(&slots).unwrap();
        assert_eq!(bank.texture(slots[0].unwrap()).unwrap().anim.next, slots[2]);
    }

    /*---------------------------- resampling --------------------------*/

    #[test]
    fn pow2_rounds_up() {
        assert_eq!(pow2(16), 16);
        assert_eq!(pow2(17), 32);
        assert_eq!(pow2(48), 64);
        assert_eq!(pow2(0), 1);
    }

    #[test]
    fn short_textures_keep_pow2_size() {
        assert_eq!(resample_dims(48, 16), (64, 16, 0.0));
        assert_eq!(resample_dims(32, 32), (32, 32, 0.0));
    }

    #[test]
    fn tall_textures_squeeze_to_32_rows() {
        // 64x128: width / 4 = 16, which the ladder still bumps to 32
        assert_eq!(resample_dims(64, 128), (32, 32, 4.0));
        assert_eq!(resample_dims(256, 64), (128, 32, 2.0));
        // 16x256: width / 8 = 2, snapped up to 8
        assert_eq!(resample_dims(16, 256), (8, 32, 8.0));
    }

    #[test]
    fn resample_doubles_columns() {
        let input = [1, 2, 3, 4];
        let out = resample(&input, 2, 2, 4, 2);
        assert_eq!(out, vec![1, 1, 2, 2, 3, 3, 4, 4]);
    }

    #[test]
    fn resample_halves_rows_and_columns() {
        let input: Vec<u8> = (0..16).collect();
        // fracstep = 2.0, frac starts at 1.0 -> columns 1 and 3
        let out = resample(&input, 4, 4, 2, 2);
        assert_eq!(out, vec![1, 3, 9, 11]);
    }
}
