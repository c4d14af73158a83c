pub mod window;

pub use window::{DirSource, FileSource, MemSource, ReadError, ScratchBuffer};
