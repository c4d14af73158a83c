//! ---------------------------------------------------------------------------
//! Top-down wireframe software renderer
//!
//! * Fills an `&mut [u32]` frame-buffer in **0x00RRGGBB** format.
//! * Looks straight down the Z axis, centred on the view origin, at a fixed
//!   number of pixels per map unit.
//! * Every batch is drawn in a colour picked from its bound texture id;
//!   submodel fragments use one highlight colour.
//! ---------------------------------------------------------------------------

use glam::{Vec2, Vec3};

use crate::{
    engine::types::{ChainBatch, ClippedFragment, View},
    renderer::{Renderer, Rgba},
    world::{Level, camera::angle_vectors},
};

const CLEAR: Rgba = 0x00_202020;
const FRAGMENT: Rgba = 0x00_FFD040;
const VIEWER: Rgba = 0x00_FF4040;

/// Cycled through by texture id.
const PALETTE: [Rgba; 6] = [
    0x00_A0A0A0,
    0x00_60C060,
    0x00_6080E0,
    0x00_C080C0,
    0x00_C0C060,
    0x00_60C0C0,
];

/*───────────────────────────────────────────────────────────────────────*/
/*                              Backend                                 */
/*───────────────────────────────────────────────────────────────────────*/

pub struct Software {
    scratch: Vec<Rgba>,
    width: usize,
    height: usize,
    /// Pixels per map unit.
    pub scale: f32,
    centre: Vec2,
}

impl Default for Software {
    fn default() -> Self {
        Self {
            scratch: Vec::new(),
            width: 0,
            height: 0,
            scale: 1.0,
            centre: Vec2::ZERO,
        }
    }
}

impl Software {
    pub fn with_scale(scale: f32) -> Self {
        Self {
            scale,
            ..Self::default()
        }
    }

    #[inline]
    pub fn colour_for(texture: u32) -> Rgba {
        PALETTE[texture as usize % PALETTE.len()]
    }

    /// Map-space → screen-space; Y is flipped so north is up.
    #[inline]
    pub fn to_screen(&self, p: Vec3) -> (i32, i32) {
        let sx = self.width as f32 * 0.5 + (p.x - self.centre.x) * self.scale;
        let sy = self.height as f32 * 0.5 - (p.y - self.centre.y) * self.scale;
        (sx.round() as i32, sy.round() as i32)
    }

    fn line(&mut self, a: Vec3, b: Vec3, colour: Rgba) {
        let (x0, y0) = self.to_screen(a);
        let (x1, y1) = self.to_screen(b);
        draw_line(&mut self.scratch, self.width, self.height, x0, y0, x1, y1, colour);
    }
}

/*──────────────────────── Renderer trait impl ────────────────────────*/
impl Renderer for Software {
    fn begin_frame(&mut self, w: usize, h: usize, view: &View) {
        if w != self.width || h != self.height {
            self.width = w;
            self.height = h;
            self.scratch.resize(w * h, 0);
        }
        self.scratch.fill(CLEAR);
        self.centre = view.origin.truncate();

        // viewer marker: a short stroke along the heading
        let (forward, _, _) = angle_vectors(view.angles);
        let tip = view.origin + forward.with_z(0.0).normalize_or_zero() * (8.0 / self.scale);
        self.line(view.origin, tip, VIEWER);
    }

    fn draw_batch(&mut self, level: &Level, batch: &ChainBatch) {
        let colour = Self::colour_for(batch.frame.into());
        for &s in &batch.surfaces {
            let Some(surf) = level.surfaces.get(s as usize) else {
                continue;
            };
            let points: Vec<Vec3> = level.surface_points(surf).collect();
            for (i, &a) in points.iter().enumerate() {
                let b = points[(i + 1) % points.len()];
                self.line(a, b, colour);
            }
        }
    }

    fn draw_fragment(&mut self, _level: &Level, fragment: &ClippedFragment) {
        for &[a, b] in &fragment.edges {
            self.line(a, b, FRAGMENT);
        }
    }

    fn end_frame<F>(&mut self, submit: F)
    where
        F: FnOnce(&[Rgba], usize, usize),
    {
        submit(&self.scratch, self.width, self.height);
    }
}

/// Integer Bresenham line-drawing algorithm.
#[allow(clippy::too_many_arguments)]
fn draw_line(
    buf: &mut [u32],
    w: usize,
    h: usize,
    mut x0: i32,
    mut y0: i32,
    x1: i32,
    y1: i32,
    colour: Rgba,
) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if (0..w as i32).contains(&x0) && (0..h as i32).contains(&y0) {
            buf[y0 as usize * w + x0 as usize] = colour;
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/
#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        engine::{
            bsp::render_world,
            frame::FrameState,
            types::Screen,
        },
        renderer::RendererExt,
        testutil::models_two_rooms,
    };

    #[test]
    fn bresenham_hits_both_ends() {
        let mut buf = vec![0u32; 16 * 16];
        draw_line(&mut buf, 16, 16, 1, 2, 12, 9, 7);
        assert_eq!(buf[2 * 16 + 1], 7);
        assert_eq!(buf[9 * 16 + 12], 7);
        // clipped, no panic
        draw_line(&mut buf, 16, 16, -20, -20, 40, 40, 9);
        assert_eq!(buf[5 * 16 + 5], 9);
    }

    #[test]
    fn world_frame_lands_in_the_buffer() {
        let models = models_two_rooms();
        let world = models[0].brush().unwrap();
        let mut st = FrameState::new(&world.level);
        let view = View::new(Vec3::new(0.0, 32.0, 10.0), Vec3::ZERO, 0.0);
        let frame = render_world(world, &mut st, &view);

        let mut sw = Software::with_scale(1.0);
        let mut seen = None;
        sw.draw_frame(
            Screen { w: 160, h: 100 },
            &view,
            &world.level,
            &frame,
            &[],
            |fb, w, h| seen = Some((fb.to_vec(), w, h)),
        );
        let (fb, w, h) = seen.unwrap();
        assert_eq!((w, h), (160, 100));
        assert_eq!(fb.len(), 160 * 100);

        // floor A's corner (64, 0) → (80 + 64, 50 + 32)
        let floor = world.level.textures.id("floor").unwrap();
        assert_eq!(fb[82 * 160 + 144], Software::colour_for(floor.into()));
        assert_eq!(fb[0], CLEAR);
    }

    #[test]
    fn fragments_use_highlight() {
        let models = models_two_rooms();
        let level = &models[0].brush().unwrap().level;
        let mut sw = Software::default();
        sw.begin_frame(64, 64, &View::new(Vec3::ZERO, Vec3::ZERO, 0.0));
        sw.draw_fragment(
            level,
            &ClippedFragment {
                surface: 3,
                leaf: 1,
                edges: vec![[Vec3::new(-10.0, 5.0, 0.0), Vec3::new(10.0, 5.0, 0.0)]],
            },
        );
        let mut row = Vec::new();
        sw.end_frame(|fb, w, _| row = fb[(32 - 5) * w..(32 - 5) * w + w].to_vec());
        assert_eq!(row[32], FRAGMENT);
        assert_eq!(row[22], FRAGMENT);
        assert_eq!(row[42], FRAGMENT);
    }
}
