//! Rendering abstraction layer.
//!
//! *The rest of the engine never touches a pixel buffer directly.*
//! The world walk produces texture-sorted [`ChainBatch`]es plus clipped
//! submodel [`ClippedFragment`]s and hands them to a type that implements
//! [`Renderer`].
//!
//! * Back-ends can be swapped (`renderer::software`, a GPU one, …)
//!   without touching the traversal code.
//! * A blanket-impl [`RendererExt`] adds `draw_frame` so call-sites stay
//!   short.

use crate::{
    engine::types::{ChainBatch, ClippedFragment, Screen, View, WorldFrame},
    world::Level,
};

/// Pixel format of the software frame-buffer (0x00RRGGBB).
pub type Rgba = u32;

/// A renderer that owns an internal scratch buffer for the whole frame.
///
/// `end_frame` hands the finished buffer to a user-supplied closure.
/// Software callers typically forward it to their window-manager;
/// GPU back-ends can ignore the slice because they never allocate it.
pub trait Renderer {
    /// (Re)allocate internal scratch for the requested resolution and clear it.
    fn begin_frame(&mut self, width: usize, height: usize, view: &View);

    /// Draw every surface of one texture chain.  `batch.frame` is the
    /// texture to bind.
    fn draw_batch(&mut self, level: &Level, batch: &ChainBatch);

    /// Draw one piece of a clipped submodel face.
    fn draw_fragment(&mut self, level: &Level, fragment: &ClippedFragment);

    /// Finish the frame and **loan** the finished buffer to `submit`.
    ///
    /// * `submit(&[Rgba], w, h)` is run exactly once per frame.
    /// * Software caller passes `|fb, w, h| window.update_with_buffer(fb, w, h)`.
    fn end_frame<F>(&mut self, submit: F)
    where
        F: FnOnce(&[Rgba], usize, usize);
}

/// Convenience blanket-impl with a one-liner `draw_frame` adaptor.
pub trait RendererExt: Renderer {
    fn draw_frame<F>(
        &mut self,
        screen: Screen,
        view: &View,
        level: &Level,
        frame: &WorldFrame,
        fragments: &[ClippedFragment],
        submit: F,
    ) where
        F: FnOnce(&[Rgba], usize, usize),
    {
        self.begin_frame(screen.w, screen.h, view);
        for b in &frame.batches {
            self.draw_batch(level, b);
        }
        for f in fragments {
            self.draw_fragment(level, f);
        }
        self.end_frame(submit);
    }
}
impl<T: Renderer + ?Sized> RendererExt for T {}

pub mod software;
