//! The two cooperating allocators every loader writes into.

pub mod cache;
pub mod hunk;

pub use cache::{Cache, CacheCorruption, CacheError, CacheUser};
pub use hunk::{Hunk, HunkError, HunkMark, HunkSpan};
