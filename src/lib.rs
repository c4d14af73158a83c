pub mod config;
pub mod engine;
pub mod format;
pub mod io;
pub mod memory;
pub mod model;
pub mod renderer;
pub mod world;

#[cfg(test)]
pub(crate) mod testutil;
