//! Pick the frame of an animated texture for the current time.

use crate::world::{AnimationError, TextureBank, TextureId};

/// Longest `next` walk tolerated before the cycle is declared broken.
const MAX_CYCLE_STEPS: u32 = 100;

/// Frame of `base` to show at `time` (seconds).
///
/// * A non-zero `entity_frame` switches to the alternate cycle when the
///   texture has one.
/// * Each frame is shown for a tenth of a second per tick of its window.
pub fn texture_animation(
    bank: &TextureBank,
    base: TextureId,
    time: f32,
    entity_frame: i32,
) -> Result<TextureId, AnimationError> {
    let mut id = base;
    let mut tex = bank.texture(id)?;

    if entity_frame != 0 {
        if let Some(alt) = tex.anim.alternate {
            id = alt;
            tex = bank.texture(id)?;
        }
    }

    if tex.anim.total == 0 {
        return Ok(id);
    }

    let relative = (time * 10.0) as i32 % tex.anim.total;
    let mut steps = 0;
    while tex.anim.min > relative || tex.anim.max <= relative {
        id = tex
            .anim
            .next
            .ok_or_else(|| AnimationError::BrokenCycle(tex.name.clone()))?;
        tex = bank.texture(id)?;
        steps += 1;
        if steps > MAX_CYCLE_STEPS {
            return Err(AnimationError::InfiniteCycle(tex.name.clone()));
        }
    }
    Ok(id)
}
