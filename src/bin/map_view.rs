//! Top-down wireframe of what the world walk sees.
//!
//! ```bash
//! cargo run --release -- maps/e1m1.bsp --base-dir id1
//! ```
//!
//! Controls W/S = forward/back A/D = strafe ←/→ = turn
//! PgUp/PgDn = eye up/down +/- = zoom Esc = quit

use std::{path::PathBuf, time::Instant};

use anyhow::{Context, bail};
use clap::Parser;
use glam::Vec3;
use minifb::{Key, Window, WindowOptions};
use once_cell::sync::Lazy;
use regex::Regex;

use yaquake_rs::{
    config::EngineConfig,
    engine::{BrushEntity, Engine, View},
    model::{Model, ModelRegistry},
    renderer::software::Software,
    world::Camera,
};

const W: usize = 1024;
const H: usize = 768;
const MOVE_SPEED: f32 = 320.0;
const TURN_SPEED: f32 = 120.0;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Opts {
    /// Map path relative to the base directory.
    map: String,

    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(long, value_name = "DIR")]
    base_dir: Option<PathBuf>,

    /// Pixels per map unit.
    #[arg(long, default_value_t = 0.5)]
    scale: f32,
}

static PAIR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#""([^"]*)"\s+"([^"]*)""#).unwrap());

/// `origin` of the first `info_player_start` in the entities lump.
fn player_start(entities: &str) -> Option<Vec3> {
    entities.split('}').find_map(|block| {
        let mut classname = None;
        let mut origin = None;
        for cap in PAIR_RE.captures_iter(block) {
            match &cap[1] {
                "classname" => classname = Some(cap[2].to_owned()),
                "origin" => {
                    let v: Vec<f32> = cap[2]
                        .split_whitespace()
                        .filter_map(|p| p.parse().ok())
                        .collect();
                    if let [x, y, z] = v[..] {
                        origin = Some(Vec3::new(x, y, z));
                    }
                }
                _ => {}
            }
        }
        (classname.as_deref() == Some("info_player_start"))
            .then_some(origin)
            .flatten()
    })
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let opts = Opts::parse();

    let mut cfg = match &opts.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(dir) = opts.base_dir {
        cfg.base_dir = dir;
    }

    let mut registry = ModelRegistry::from_config(&cfg);
    let handle = registry
        .for_name(&opts.map, true)?
        .with_context(|| format!("{} not loaded", opts.map))?;
    let Some(world) = registry.model(handle).and_then(Model::brush).cloned() else {
        bail!("{} is not a brush model", opts.map);
    };

    // every `*N` submodel, drawn where the map placed it
    let entities: Vec<_> = (1..world.level.submodels.len())
        .filter_map(|i| registry.handle(&format!("*{i}")))
        .filter_map(|h| registry.model(h).and_then(Model::brush).cloned())
        .map(|m| (m, BrushEntity::default()))
        .collect();

    let start = player_start(&world.level.entities).unwrap_or_else(|| {
        log::warn!("no info_player_start, starting at the origin");
        Vec3::ZERO
    });
    let mut camera = Camera::new(start, Vec3::ZERO);
    log::info!("{}: {} submodels, start {start}", world.level.name, entities.len());

    let mut engine = Engine::new(Software::with_scale(opts.scale), world, W, H);
    let mut win = Window::new("yaquake map view", W, H, WindowOptions::default())?;
    win.set_target_fps(60);

    let clock = Instant::now();
    let mut last = clock.elapsed().as_secs_f32();
    let mut last_leaf = None;

    while win.is_open() && !win.is_key_down(Key::Escape) {
        let now = clock.elapsed().as_secs_f32();
        let dt = now - last;
        last = now;

        /* ─────────── input ─────────── */
        let axis = |pos: Key, neg: Key| -> f32 {
            (win.is_key_down(pos) as i32 - win.is_key_down(neg) as i32) as f32
        };
        camera.step(
            axis(Key::W, Key::S) * MOVE_SPEED * dt,
            axis(Key::D, Key::A) * MOVE_SPEED * dt,
        );
        camera.turn(axis(Key::Left, Key::Right) * TURN_SPEED * dt);
        camera.lift(axis(Key::PageUp, Key::PageDown) * MOVE_SPEED * dt);
        let zoom = axis(Key::Equal, Key::Minus);
        if zoom != 0.0 {
            let sw = &mut engine.renderer;
            sw.scale = (sw.scale * (1.0 + zoom * dt)).clamp(0.05, 8.0);
        }

        /* ─────────── frame ─────────── */
        let view = View::from_camera(&camera, now);
        let mut result = Ok(());
        let frame = engine.render_frame(&view, &entities, |fb, w, h| {
            result = win.update_with_buffer(fb, w, h);
        });
        result?;

        if last_leaf != Some(frame.view_leaf) {
            last_leaf = Some(frame.view_leaf);
            log::debug!(
                "leaf {}: {} surfaces in {} batches",
                frame.view_leaf,
                frame.surface_count(),
                frame.batches.len()
            );
        }
    }
    Ok(())
}
