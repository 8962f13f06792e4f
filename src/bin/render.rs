//! splat-render: render a splat scene to a PNG without a window
//!
//! Usage:
//!   splat-render --scene scene.ply --out render.png
//!   splat-render --scene scene.ply --width 1920 --height 1080 --eye 0,0,-3 --target 0,0,0
//!   splat-render --config splat.toml --frames 100

use anyhow::{bail, Context, Result};
use clap::Parser;
use nalgebra::Vector3;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use splat_rs::gpu::{ContextOptions, GpuContext, GpuRenderer};
use splat_rs::io::{load_ply, load_ply_limited};
use splat_rs::{Camera, RendererConfig};

#[derive(Parser)]
#[command(name = "splat-render")]
#[command(author, version, about = "Render a Gaussian splat scene to a PNG")]
struct Args {
    /// Scene file (.ply). Defaults to the first scene in the config.
    #[arg(long)]
    scene: Option<PathBuf>,

    /// Renderer config (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output image
    #[arg(long, default_value = "render.png")]
    out: PathBuf,

    #[arg(long, default_value = "1280")]
    width: u32,

    #[arg(long, default_value = "720")]
    height: u32,

    /// Frames to render; the last one is written out
    #[arg(long, default_value = "1")]
    frames: u32,

    /// Camera position as x,y,z (overrides the config)
    #[arg(long, value_parser = parse_vec3)]
    eye: Option<Vector3<f32>>,

    /// Look-at point as x,y,z (overrides the config)
    #[arg(long, value_parser = parse_vec3)]
    target: Option<Vector3<f32>>,

    /// Load only the first N splats
    #[arg(long)]
    limit: Option<usize>,

    /// Composite at half resolution
    #[arg(long)]
    half_res: bool,
}

fn parse_vec3(s: &str) -> Result<Vector3<f32>, String> {
    let parts: Vec<f32> = s
        .split(',')
        .map(|p| p.trim().parse::<f32>().map_err(|e| e.to_string()))
        .collect::<Result<_, _>>()?;
    match parts.as_slice() {
        [x, y, z] => Ok(Vector3::new(*x, *y, *z)),
        _ => Err(format!("expected three comma-separated floats, got '{s}'")),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    info!("splat-render v{}", splat_rs::VERSION);

    let mut config = RendererConfig::load_or_default(args.config.as_deref())?;
    if args.half_res {
        config.half_resolution = true;
    }
    if args.width == 0 || args.height == 0 {
        bail!("--width and --height must be positive");
    }

    let scene_path = match args.scene.or_else(|| config.scenes.first().cloned()) {
        Some(p) => p,
        None => bail!("no scene given; pass --scene or list one in the config"),
    };
    let t = Instant::now();
    let store = match args.limit {
        Some(max) => load_ply_limited(&scene_path, max),
        None => load_ply(&scene_path),
    }
    .with_context(|| format!("loading {}", scene_path.display()))?;
    info!(
        splats = store.len(),
        ms = t.elapsed().as_millis() as u64,
        "loaded {}",
        scene_path.display()
    );

    let mut camera = config.initial_camera();
    if args.eye.is_some() || args.target.is_some() {
        camera = Camera::look_at(
            args.eye.unwrap_or_else(|| Vector3::from(config.eye)),
            args.target.unwrap_or_else(|| Vector3::from(config.target)),
            Vector3::from(config.up),
            config.fov_radians(),
            config.near,
            config.far,
        );
    }

    let options = ContextOptions {
        validation: config.validation,
        adapter_index: config.adapter_index,
    };
    let ctx = Arc::new(GpuContext::new_blocking(&options).map_err(anyhow::Error::msg)?);
    let mut renderer = GpuRenderer::new(
        ctx,
        &store,
        args.width,
        args.height,
        config.composite_settings(),
    )?;

    let frames = args.frames.max(1);
    let t = Instant::now();
    let mut image = None;
    for _ in 0..frames {
        image = Some(renderer.render(&camera)?);
    }
    let elapsed = t.elapsed().as_secs_f32();
    info!(
        frames,
        avg_ms = elapsed * 1000.0 / frames as f32,
        instances = renderer.orchestrator().metrics().value("instances").unwrap_or(0.0),
        multiplier = renderer.orchestrator().capacity().multiplier(),
        "rendered"
    );

    let image = image.context("no frame rendered")?;
    image
        .save(&args.out)
        .with_context(|| format!("writing {}", args.out.display()))?;
    info!("wrote {}", args.out.display());

    Ok(())
}
