//! # Hunk
//!
//! Level-lifetime bump arena with a hard byte ceiling.
//!
//! * Every allocation is rounded up to [`HUNK_ALIGN`] bytes and recorded
//!   under a name tag (usually the model being loaded).
//! * [`Hunk::low_mark`] / [`Hunk::free_to_low_mark`] give the stack
//!   discipline loaders rely on to throw away scratch work.
//! * The typed data itself lives in the owning `Vec`s of the world graph;
//!   the hunk is the ledger that keeps the total under the ceiling.

use std::mem;
use thiserror::Error;

pub const HUNK_ALIGN: usize = 32;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum HunkError {
    #[error("Hunk_Alloc overflow: {tag} wants {requested} bytes, {available} free")]
    Overflow {
        tag: String,
        requested: usize,
        available: usize,
    },
}

/// One recorded allocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HunkBlock {
    pub offset: usize,
    pub size: usize,
    pub tag: String,
}

/// Byte range handed out by [`Hunk::alloc`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HunkSpan {
    pub offset: usize,
    pub size: usize,
}

/// Opaque position returned by [`Hunk::low_mark`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HunkMark {
    low: usize,
    blocks: usize,
}

#[derive(Debug)]
pub struct Hunk {
    capacity: usize,
    low: usize,
    blocks: Vec<HunkBlock>,
}

#[inline]
fn round_up(size: usize) -> usize {
    (size + HUNK_ALIGN - 1) & !(HUNK_ALIGN - 1)
}

impl Hunk {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            low: 0,
            blocks: Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn used(&self) -> usize {
        self.low
    }

    pub fn available(&self) -> usize {
        self.capacity - self.low
    }

    pub fn blocks(&self) -> &[HunkBlock] {
        &self.blocks
    }

    /// Bump-allocate `size` bytes under `tag`.
    pub fn alloc(&mut self, size: usize, tag: &str) -> Result<HunkSpan, HunkError> {
        let rounded = round_up(size);
        if rounded > self.available() {
            log::warn!(
                "hunk: overflow allocating {rounded} bytes for {tag} ({} free)",
                self.available()
            );
            return Err(HunkError::Overflow {
                tag: tag.to_owned(),
                requested: rounded,
                available: self.available(),
            });
        }
        let span = HunkSpan {
            offset: self.low,
            size: rounded,
        };
        self.low += rounded;
        self.blocks.push(HunkBlock {
            offset: span.offset,
            size: rounded,
            tag: tag.to_owned(),
        });
        Ok(span)
    }

    /// Charge storage for `count` values of `T`.
    pub fn alloc_array<T>(&mut self, count: usize, tag: &str) -> Result<HunkSpan, HunkError> {
        self.alloc(count.saturating_mul(mem::size_of::<T>()), tag)
    }

    pub fn low_mark(&self) -> HunkMark {
        HunkMark {
            low: self.low,
            blocks: self.blocks.len(),
        }
    }

    /// Discard everything allocated after `mark`.
    pub fn free_to_low_mark(&mut self, mark: HunkMark) {
        if mark.low > self.low {
            log::warn!("hunk: stale mark {} above cursor {}", mark.low, self.low);
            return;
        }
        self.blocks.truncate(mark.blocks);
        self.low = mark.low;
    }

    /// Bytes charged per tag, in first-allocation order.
    pub fn usage_by_tag(&self) -> Vec<(String, usize)> {
        let mut out: Vec<(String, usize)> = Vec::new();
        for b in &self.blocks {
            match out.iter_mut().find(|(t, _)| *t == b.tag) {
                Some((_, total)) => *total += b.size,
                None => out.push((b.tag.clone(), b.size)),
            }
        }
        out
    }

    pub fn report(&self) {
        log::info!(
            "hunk: {} / {} bytes in {} blocks",
            self.low,
            self.capacity,
            self.blocks.len()
        );
        for (tag, total) in self.usage_by_tag() {
            log::info!("hunk: {total:>10} {tag}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_round_to_alignment() {
        let mut hunk = Hunk::new(1024);
        let a = hunk.alloc(1, "a").unwrap();
        let b = hunk.alloc(33, "b").unwrap();
        assert_eq!(a, HunkSpan { offset: 0, size: 32 });
        assert_eq!(b, HunkSpan { offset: 32, size: 64 });
        assert_eq!(hunk.used(), 96);
    }

    #[test]
    fn zero_sized_alloc_is_free() {
        let mut hunk = Hunk::new(64);
        let span = hunk.alloc(0, "empty").unwrap();
        assert_eq!(span.size, 0);
        assert_eq!(hunk.used(), 0);
    }

    #[test]
    fn overflow_is_reported() {
        let mut hunk = Hunk::new(64);
        hunk.alloc(40, "first").unwrap();
        let err = hunk.alloc(40, "second").unwrap_err();
        assert_eq!(
            err,
            HunkError::Overflow {
                tag: "second".into(),
                requested: 64,
                available: 0,
            }
        );
    }

    #[test]
    fn mark_and_rewind() {
        let mut hunk = Hunk::new(4096);
        hunk.alloc(100, "level").unwrap();
        let mark = hunk.low_mark();
        hunk.alloc(500, "scratch").unwrap();
        hunk.alloc_array::<u32>(10, "scratch").unwrap();
        assert_eq!(hunk.blocks().len(), 3);

        hunk.free_to_low_mark(mark);
        assert_eq!(hunk.used(), 128);
        assert_eq!(hunk.blocks().len(), 1);
        assert_eq!(hunk.usage_by_tag(), vec![("level".to_string(), 128)]);
    }

    #[test]
    fn usage_groups_tags() {
        let mut hunk = Hunk::new(4096);
        hunk.alloc(10, "maps/e1m1.bsp").unwrap();
        hunk.alloc(10, "progs/player.mdl").unwrap();
        hunk.alloc(40, "maps/e1m1.bsp").unwrap();
        assert_eq!(
            hunk.usage_by_tag(),
            vec![
                ("maps/e1m1.bsp".to_string(), 96),
                ("progs/player.mdl".to_string(), 32)
            ]
        );
    }
}
