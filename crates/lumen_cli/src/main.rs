//! Lumen command-line renderer.
//!
//! Loads a scene (or uses the built-in one), applies command-line
//! overrides, renders on all cores and writes a PNG or TGA image.

mod output;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use lumen_renderer::{load_scene, render_parallel, worker_count, RenderStrategy, SceneDescription};

use crate::output::OutputSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Strategy {
    /// Workers send finished buckets to a single writer
    Aggregate,
    /// Workers write straight into disjoint scanline bands
    Disjoint,
}

impl From<Strategy> for RenderStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Aggregate => RenderStrategy::Aggregate,
            Strategy::Disjoint => RenderStrategy::Disjoint,
        }
    }
}

/// Render a scene of diffuse spheres with a Monte Carlo path tracer.
#[derive(Debug, Parser)]
#[command(name = "lumen", version, about)]
struct Args {
    /// Scene description (JSON); the built-in scene when omitted
    #[arg(short, long)]
    scene: Option<PathBuf>,

    /// Output image; the format follows the extension (.png or .tga)
    #[arg(short, long, default_value = "result.png")]
    output: PathBuf,

    /// Image width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Image height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// Samples per pixel
    #[arg(long)]
    samples: Option<u32>,

    /// Maximum number of bounces per path
    #[arg(long)]
    max_depth: Option<u32>,

    /// Worker threads (defaults to available parallelism)
    #[arg(short = 'j', long)]
    threads: Option<usize>,

    /// Bucket edge length, or rows per band with the disjoint strategy
    #[arg(long)]
    bucket_size: Option<u32>,

    /// How workers deliver pixels to the image
    #[arg(long, value_enum)]
    strategy: Option<Strategy>,

    /// Seed for a reproducible render
    #[arg(long)]
    seed: Option<u64>,

    /// Print the resolved scene as JSON and exit
    #[arg(long)]
    dump_scene: bool,
}

impl Args {
    /// Override scene settings with whatever was given on the command line.
    fn apply(&self, scene: &mut SceneDescription) {
        let render = &mut scene.render;
        if let Some(width) = self.width {
            render.width = width;
        }
        if let Some(height) = self.height {
            render.height = height;
        }
        if let Some(samples) = self.samples {
            render.samples_per_pixel = samples;
        }
        if let Some(max_depth) = self.max_depth {
            render.max_depth = max_depth;
        }
        if let Some(threads) = self.threads {
            render.threads = Some(threads);
        }
        if let Some(bucket_size) = self.bucket_size {
            render.bucket_size = bucket_size;
        }
        if let Some(strategy) = self.strategy {
            render.strategy = strategy.into();
        }
        if let Some(seed) = self.seed {
            render.seed = Some(seed);
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut scene = match &args.scene {
        Some(path) => load_scene(path)
            .with_context(|| format!("Failed to load scene {}", path.display()))?,
        None => SceneDescription::default(),
    };
    args.apply(&mut scene);

    if args.dump_scene {
        println!("{}", scene.to_json()?);
        return Ok(());
    }

    scene.render.validate()?;
    let world = scene.build_world().context("Invalid scene")?;
    let camera = scene.build_camera().context("Invalid camera")?;

    // Open the sink first so a bad path costs nothing
    let sink = OutputSink::create(&args.output)?;

    log::info!(
        "Scene has {} objects, rendering with {} workers",
        world.len(),
        worker_count(&scene.render)
    );

    let start = Instant::now();
    let raster = render_parallel(&camera, &world, &scene.render)?;
    log::info!("Render finished in {:.2?}", start.elapsed());

    sink.write(&raster)?;
    log::info!("Image saved to {}", args.output.display());

    Ok(())
}
