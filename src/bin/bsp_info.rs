//! Print what the loader makes of a BSP file.
//!
//! ```bash
//! cargo run --bin bsp_info -- maps/e1m1.bsp --base-dir id1 \
//!     --point 480,-352,88 --origin 480,-352,88 --angles 0,90,0
//! ```

use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Parser;
use glam::Vec3;

use yaquake_rs::{
    config::EngineConfig,
    engine::{FrameState, View, render_world},
    model::{Model, ModelRegistry},
    world::geometry::{
        CONTENTS_EMPTY, CONTENTS_LAVA, CONTENTS_SKY, CONTENTS_SLIME, CONTENTS_SOLID,
        CONTENTS_WATER,
    },
};

/// CLI options handled via `clap` derive.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Opts {
    /// Map path relative to the base directory.
    map: String,

    /// TOML engine config.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Overrides `base_dir` from the config.
    #[arg(long, value_name = "DIR")]
    base_dir: Option<PathBuf>,

    /// Report the leaf containing this point (`x,y,z`).
    #[arg(long, value_parser = parse_vec3, allow_hyphen_values = true)]
    point: Option<Vec3>,

    /// View origin for the batch summary (`x,y,z`).
    #[arg(long, value_parser = parse_vec3, allow_hyphen_values = true)]
    origin: Option<Vec3>,

    /// View angles, degrees (`pitch,yaw,roll`).
    #[arg(long, value_parser = parse_vec3, allow_hyphen_values = true, default_value = "0,0,0")]
    angles: Vec3,

    /// Animation clock, seconds.
    #[arg(long, default_value_t = 0.0)]
    time: f32,
}

fn parse_vec3(s: &str) -> Result<Vec3, String> {
    let parts: Vec<f32> = s
        .split(',')
        .map(|p| p.trim().parse::<f32>().map_err(|e| format!("`{p}`: {e}")))
        .collect::<Result<_, _>>()?;
    match parts[..] {
        [x, y, z] => Ok(Vec3::new(x, y, z)),
        _ => Err(format!("expected x,y,z, got `{s}`")),
    }
}

fn contents_name(c: i32) -> &'static str {
    match c {
        CONTENTS_EMPTY => "empty",
        CONTENTS_SOLID => "solid",
        CONTENTS_WATER => "water",
        CONTENTS_SLIME => "slime",
        CONTENTS_LAVA => "lava",
        CONTENTS_SKY => "sky",
        _ => "other",
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let opts = Opts::parse();
    log::trace!("Starting with args: {opts:?}");

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
    let level = &world.level;

    // ─────────── lumps ────────────
    println!("{}", level.name);
    println!("  planes       {:6}", level.planes.len());
    println!("  vertexes     {:6}", level.vertices.len());
    println!("  edges        {:6}", level.edges.len());
    println!("  surfedges    {:6}", level.surfedges.len());
    println!("  textures     {:6}", level.textures.len() - 1);
    println!("  texinfo      {:6}", level.texinfo.len());
    println!("  faces        {:6}", level.surfaces.len());
    println!("  marksurfaces {:6}", level.marksurfaces.len());
    println!("  leafs        {:6}", level.leafs.len());
    println!("  nodes        {:6}", level.nodes.len());
    println!("  clipnodes    {:6}", level.clipnodes.len());
    println!("  lighting     {:6} bytes", level.lightdata.len());
    println!("  visibility   {:6} bytes", level.visdata.len());
    println!("  entities     {:6} bytes", level.entities.len());

    // ─────────── models ────────────
    println!("models: {}", level.submodels.len());
    for (i, sub) in level.submodels.iter().enumerate() {
        println!(
            "  *{i:<3} faces {:5}..{:<5} visleafs {:5}  {:?} .. {:?}",
            sub.firstface,
            sub.firstface + sub.numfaces,
            sub.visleafs,
            sub.mins.to_array(),
            sub.maxs.to_array(),
        );
    }

    if let Some(p) = opts.point {
        let leaf = world.point_in_leaf(p);
        let contents = level.leafs[leaf as usize].contents;
        let visible = world
            .leaf_pvs(leaf)
            .iter()
            .map(|b| b.count_ones())
            .sum::<u32>();
        println!(
            "point {:?}: leaf {leaf} ({}), {visible} leaves in PVS",
            p.to_array(),
            contents_name(contents)
        );
    }

    if let Some(origin) = opts.origin {
        let mut state = FrameState::new(level);
        let view = View::new(origin, opts.angles, opts.time);
        let frame = render_world(&world, &mut state, &view);
        println!(
            "view {:?}: leaf {}, {} leaves walked, {} surfaces in {} batches",
            origin.to_array(),
            frame.view_leaf,
            frame.leaves.len(),
            frame.surface_count(),
            frame.batches.len()
        );
        for b in &frame.batches {
            let name = level.textures.texture(b.frame).map(|t| t.name.as_str())?;
            println!("  {name:<16} {:5}{}", b.surfaces.len(), if b.animated { " (animated)" } else { "" });
        }
    }

    registry.report();
    Ok(())
}
