//! # Cache allocator
//!
//! Fixed-capacity region for evictable payloads (expanded alias models).
//!
//! * Entries are keyed by a [`CacheUser`] owner handle; there are no raw
//!   pointers, so an evicted entry simply stops answering [`Cache::check`].
//! * Placement is first-fit in address order.  When nothing fits, the
//!   least-recently-used entry is evicted and the search repeats.
//! * Each entry is wrapped in guard words and the arena ends in a
//!   sentinel.  A damaged guard means memory was scribbled on; that is
//!   the one condition treated as a hard stop (see [`corruption_abort`]).

use std::fmt;
use thiserror::Error;

/// Guard word written before and after every payload.
pub const CACHE_GUARD: u32 = 0x1df0_01ed;
/// Sentinel written just past the usable arena.
pub const ARENA_SENTINEL: u32 = 0xdead_f00d;

const GUARD_LEN: usize = 4;

/// Owner handle: whoever holds this can ask whether its data is resident.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheUser(pub u32);

impl fmt::Display for CacheUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user #{}", self.0)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache_Alloc: {0} already allocated")]
    AlreadyAllocated(CacheUser),

    #[error("Cache_Alloc: {requested} bytes do not fit in a {capacity} byte cache")]
    OutOfSpace { requested: usize, capacity: usize },
}

/// A guard word no longer holds its expected value.
#[derive(Error, Debug, PartialEq, Eq)]
#[error("cache corruption at offset {offset} ({what})")]
pub struct CacheCorruption {
    pub offset: usize,
    pub what: String,
}

#[derive(Clone, Debug)]
struct CacheEntry {
    user: CacheUser,
    offset: usize,
    size: usize,
    tag: String,
    last_used: u64,
}

impl CacheEntry {
    fn footprint(&self) -> usize {
        self.size + 2 * GUARD_LEN
    }

    fn payload(&self) -> std::ops::Range<usize> {
        let start = self.offset + GUARD_LEN;
        start..start + self.size
    }
}

pub struct Cache {
    capacity: usize,
    storage: Vec<u8>,
    /// Sorted by `offset`.
    entries: Vec<CacheEntry>,
    clock: u64,
}

impl Cache {
    pub fn new(capacity: usize) -> Self {
        let mut storage = vec![0u8; capacity + GUARD_LEN];
        storage[capacity..].copy_from_slice(&ARENA_SENTINEL.to_le_bytes());
        Self {
            capacity,
            storage,
            entries: Vec::new(),
            clock: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes occupied by entries, guards included.
    pub fn used(&self) -> usize {
        self.entries.iter().map(CacheEntry::footprint).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, user: CacheUser) -> bool {
        self.position(user).is_some()
    }

    fn position(&self, user: CacheUser) -> Option<usize> {
        self.entries.iter().position(|e| e.user == user)
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    // ------------------------------------------------------------------ //
    // Public API
    // ------------------------------------------------------------------ //

    /// Reserve `size` zeroed bytes for `user`, evicting LRU entries as
    /// needed.  The returned slice is only valid until the next call that
    /// can evict; re-fetch through [`Cache::check`].
    pub fn alloc(
        &mut self,
        user: CacheUser,
        size: usize,
        tag: &str,
    ) -> Result<&mut [u8], CacheError> {
        if let Err(err) = self.verify() {
            corruption_abort(err);
        }
        if self.contains(user) {
            return Err(CacheError::AlreadyAllocated(user));
        }

        let footprint = size + 2 * GUARD_LEN;
        if footprint > self.capacity {
            log::warn!("cache: {tag} wants {size} bytes, arena is {}", self.capacity);
            return Err(CacheError::OutOfSpace {
                requested: size,
                capacity: self.capacity,
            });
        }

        let (index, offset) = loop {
            if let Some(slot) = self.find_gap(footprint) {
                break slot;
            }
            if !self.evict_lru() {
                return Err(CacheError::OutOfSpace {
                    requested: size,
                    capacity: self.capacity,
                });
            }
        };

        let last_used = self.tick();
        let entry = CacheEntry {
            user,
            offset,
            size,
            tag: tag.to_owned(),
            last_used,
        };
        let guard = CACHE_GUARD.to_le_bytes();
        self.storage[offset..offset + GUARD_LEN].copy_from_slice(&guard);
        let tail = offset + GUARD_LEN + size;
        self.storage[tail..tail + GUARD_LEN].copy_from_slice(&guard);
        let range = entry.payload();
        self.storage[range.clone()].fill(0);
        self.entries.insert(index, entry);

        log::debug!("cache: {tag} got {size} bytes at {offset}");
        Ok(&mut self.storage[range])
    }

    /// Payload of `user` if still resident.  Refreshes its LRU position.
    pub fn check(&mut self, user: CacheUser) -> Option<&[u8]> {
        let idx = self.position(user)?;
        let now = self.tick();
        self.entries[idx].last_used = now;
        let range = self.entries[idx].payload();
        Some(&self.storage[range])
    }

    /// Drop the entry of `user`.  Returns whether it was resident.
    pub fn free(&mut self, user: CacheUser) -> bool {
        match self.position(user) {
            Some(idx) => {
                self.entries.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Drop every entry.
    pub fn flush(&mut self) {
        self.entries.clear();
    }

    /// Check every guard word and the arena sentinel.
    pub fn verify(&self) -> Result<(), CacheCorruption> {
        if self.storage[self.capacity..] != ARENA_SENTINEL.to_le_bytes() {
            return Err(CacheCorruption {
                offset: self.capacity,
                what: "arena sentinel".into(),
            });
        }
        let guard = CACHE_GUARD.to_le_bytes();
        for e in &self.entries {
            let tail = e.offset + GUARD_LEN + e.size;
            if self.storage[e.offset..e.offset + GUARD_LEN] != guard {
                return Err(CacheCorruption {
                    offset: e.offset,
                    what: format!("head guard of {}", e.tag),
                });
            }
            if self.storage[tail..tail + GUARD_LEN] != guard {
                return Err(CacheCorruption {
                    offset: tail,
                    what: format!("tail guard of {}", e.tag),
                });
            }
        }
        Ok(())
    }

    pub fn report(&self) {
        log::info!(
            "cache: {} / {} bytes in {} entries",
            self.used(),
            self.capacity,
            self.entries.len()
        );
        for e in &self.entries {
            log::info!("cache: {:>8} @{:<8} {}", e.size, e.offset, e.tag);
        }
    }

    // ------------------------------------------------------------------ //
    // Placement helpers
    // ------------------------------------------------------------------ //

    /// First gap (in address order) that holds `footprint` bytes, as
    /// `(insert index, offset)`.
    fn find_gap(&self, footprint: usize) -> Option<(usize, usize)> {
        let mut cursor = 0;
        for (i, e) in self.entries.iter().enumerate() {
            if e.offset - cursor >= footprint {
                return Some((i, cursor));
            }
            cursor = e.offset + e.footprint();
        }
        (self.capacity - cursor >= footprint).then_some((self.entries.len(), cursor))
    }

    fn evict_lru(&mut self) -> bool {
        let victim = self
            .entries
            .iter()
            .enumerate()
            .min_by_key(|(_, e)| e.last_used)
            .map(|(i, _)| i);
        match victim {
            Some(i) => {
                let e = self.entries.remove(i);
                log::debug!("cache: evicting {} ({} bytes, {})", e.tag, e.size, e.user);
                true
            }
            None => false,
        }
    }
}

/// Guard damage means something wrote outside its allocation earlier on.
/// Logs and panics.
pub fn corruption_abort(err: CacheCorruption) -> ! {
    log::error!("{err}");
    panic!("{err}");
}
