//! splat-viewer: interactive window for Gaussian splat scenes
//!
//! Usage:
//!   splat-viewer scene.ply [more.ply ...]
//!   splat-viewer --config splat.toml
//!
//! Keyboard:
//! - W/S: forward/back, A/D: left/right, Q/E: down/up
//! - Arrows: yaw and pitch
//! - H: toggle half-resolution compositing
//! - M: toggle metrics logging
//! - Tab: next scene
//! - Esc: quit

use anyhow::{bail, Context, Result};
use clap::Parser;
use nalgebra::Vector3;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use winit::{
    event::{ElementState, Event, KeyEvent, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::WindowBuilder,
};

use splat_rs::config::ProfilingMode;
use splat_rs::core::PrimitiveStore;
use splat_rs::gpu::{ContextOptions, GpuContext, GpuStages, SurfacePresenter};
use splat_rs::io::load_ply;
use splat_rs::metrics::{FpsCounter, Metrics};
use splat_rs::{FrameOrchestrator, FrameOutcome, RendererConfig};

const MOVE_SPEED: f32 = 2.0;
const TURN_SPEED: f32 = 1.0;
/// Camera spin per frame while profiling.
const PROFILE_STEP: f32 = 0.005;
const PROFILE_WINDOW: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "splat-viewer")]
#[command(author, version, about = "Interactive Gaussian splat viewer")]
struct Args {
    /// Scenes to cycle through with Tab (appended to the config's list)
    scenes: Vec<PathBuf>,

    /// Renderer config (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "1280")]
    width: u32,

    #[arg(long, default_value = "720")]
    height: u32,

    /// Spin the camera and log the average frame rate
    #[arg(long)]
    profile: bool,
}

fn load_scene(path: &PathBuf) -> Result<PrimitiveStore> {
    let t = Instant::now();
    let store = load_ply(path).with_context(|| format!("loading {}", path.display()))?;
    info!(
        splats = store.len(),
        ms = t.elapsed().as_millis() as u64,
        "loaded {}",
        path.display()
    );
    Ok(store)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    info!("splat-viewer v{}", splat_rs::VERSION);

    let mut config = RendererConfig::load_or_default(args.config.as_deref())?;
    config.scenes.extend(args.scenes);
    if args.profile {
        config.profiling = ProfilingMode::Fps;
    }
    if config.scenes.is_empty() {
        bail!("no scenes given; pass one or more .ply files or list them in the config");
    }
    let store = load_scene(&config.scenes[0])?;

    let event_loop = EventLoop::new()?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("splat-viewer")
            .with_inner_size(winit::dpi::PhysicalSize::new(args.width, args.height))
            .build(&event_loop)?,
    );

    let options = ContextOptions {
        validation: config.validation,
        adapter_index: config.adapter_index,
    };
    let (ctx, surface) = GpuContext::with_window_blocking(Arc::clone(&window), &options)
        .map_err(anyhow::Error::msg)?;
    let ctx = Arc::new(ctx);

    let presenter = SurfacePresenter::new(
        Arc::clone(&ctx),
        Arc::clone(&window),
        surface,
        config.immediate_present,
    )?;
    let stages = GpuStages::new(ctx);
    let mut orchestrator = FrameOrchestrator::new(
        presenter,
        stages,
        &store,
        config.composite_settings(),
        Metrics::new(config.enable_gui),
    )?;
    drop(store);

    let mut camera = config.initial_camera();
    let orbit_center = Vector3::from(config.target);
    let orbit_axis = Vector3::from(config.up);
    let mut scene_index = 0usize;
    let mut keys_pressed: HashSet<KeyCode> = HashSet::new();
    let mut last_frame = Instant::now();
    let mut last_summary = Instant::now();
    let mut profile = FpsCounter::new(PROFILE_WINDOW, Instant::now());

    info!("controls: WASD/QE move, arrows turn, H half-res, M metrics, Tab next scene, Esc quit");

    event_loop.run(move |event, elwt| {
        elwt.set_control_flow(ControlFlow::Poll);

        match event {
            Event::WindowEvent { event, window_id } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => {
                    if let Err(e) = orchestrator.stop() {
                        warn!("stopping renderer: {e}");
                    }
                    elwt.exit();
                }

                WindowEvent::KeyboardInput {
                    event:
                        KeyEvent {
                            physical_key: PhysicalKey::Code(key),
                            state,
                            repeat,
                            ..
                        },
                    ..
                } => {
                    match state {
                        ElementState::Pressed => {
                            keys_pressed.insert(key);
                        }
                        ElementState::Released => {
                            keys_pressed.remove(&key);
                        }
                    }
                    if state != ElementState::Pressed || repeat {
                        return;
                    }

                    match key {
                        KeyCode::Escape => {
                            if let Err(e) = orchestrator.stop() {
                                warn!("stopping renderer: {e}");
                            }
                            elwt.exit();
                        }
                        KeyCode::KeyH => {
                            let half = !orchestrator.settings().half_resolution;
                            orchestrator.set_half_resolution(half);
                            info!(half_resolution = half, "toggled half resolution");
                        }
                        KeyCode::KeyM => {
                            let metrics = orchestrator.metrics_mut();
                            let enabled = !metrics.is_enabled();
                            metrics.set_enabled(enabled);
                            info!(enabled, "toggled metrics");
                        }
                        KeyCode::Tab if config.scenes.len() > 1 => {
                            scene_index = (scene_index + 1) % config.scenes.len();
                            let switched = load_scene(&config.scenes[scene_index])
                                .and_then(|s| Ok(orchestrator.switch_scene(&s)?));
                            if let Err(e) = switched {
                                error!("switching scene: {e:#}");
                                std::process::exit(1);
                            }
                        }
                        _ => {}
                    }
                }

                WindowEvent::RedrawRequested => {
                    let now = Instant::now();
                    let dt = (now - last_frame).as_secs_f32().min(0.1);
                    last_frame = now;

                    if config.profiling == ProfilingMode::Fps {
                        camera.orbit(orbit_center, orbit_axis, PROFILE_STEP);
                    } else {
                        let mut delta = Vector3::zeros();
                        let mut yaw = 0.0;
                        let mut pitch = 0.0;
                        for key in &keys_pressed {
                            match key {
                                KeyCode::KeyW => delta.z += 1.0,
                                KeyCode::KeyS => delta.z -= 1.0,
                                KeyCode::KeyD => delta.x += 1.0,
                                KeyCode::KeyA => delta.x -= 1.0,
                                // +Y is down in camera space
                                KeyCode::KeyQ => delta.y += 1.0,
                                KeyCode::KeyE => delta.y -= 1.0,
                                KeyCode::ArrowLeft => yaw -= 1.0,
                                KeyCode::ArrowRight => yaw += 1.0,
                                KeyCode::ArrowUp => pitch += 1.0,
                                KeyCode::ArrowDown => pitch -= 1.0,
                                _ => {}
                            }
                        }
                        if delta != Vector3::zeros() {
                            camera.translate(delta.normalize() * MOVE_SPEED * dt);
                        }
                        if yaw != 0.0 || pitch != 0.0 {
                            camera.rotate_local(yaw * TURN_SPEED * dt, pitch * TURN_SPEED * dt);
                        }
                    }

                    match orchestrator.draw_frame(&camera) {
                        Ok(FrameOutcome::Presented { .. }) => {
                            if config.profiling == ProfilingMode::Fps {
                                if let Some(fps) = profile.tick(Instant::now()) {
                                    info!(fps, "average frame rate over the last 30s");
                                }
                            }
                        }
                        Ok(FrameOutcome::Skipped) => {}
                        Ok(FrameOutcome::Stopped) => elwt.exit(),
                        Err(e) => {
                            error!("frame failed: {e}");
                            std::process::exit(1);
                        }
                    }

                    if now - last_summary >= Duration::from_secs(1) {
                        orchestrator.metrics().log_summary();
                        last_summary = now;
                    }
                }

                _ => {}
            },

            Event::AboutToWait => {
                window.request_redraw();
            }

            _ => {}
        }
    })?;

    Ok(())
}
