//! # Traversal engine
//!
//! * [`frame`]     – per-level visibility stamps and texture chains
//! * [`bsp`]       – PVS marking and the front-to-back world walk
//! * [`chains`]    – per-texture surface lists
//! * [`animation`] – time-based texture frame selection
//! * [`clipper`]   – brush submodels clipped into the world tree
//! * [`engine`]    – glue that feeds a [`Renderer`](crate::renderer::Renderer)

pub mod animation;
pub mod bsp;
pub mod chains;
pub mod clipper;
#[allow(clippy::module_inception)]
pub mod engine;
pub mod frame;
pub mod types;

pub use animation::texture_animation;
pub use bsp::{mark_leaves, render_world};
pub use clipper::{clip_submodel, entity_rotation};
pub use engine::Engine;
pub use frame::FrameState;
pub use types::{BrushEntity, ChainBatch, ClippedFragment, Screen, View, WorldFrame};
