//! # splat-rs: real-time 3D Gaussian splat rendering in Rust
//!
//! A scene of anisotropic 3D Gaussians ("splats") is drawn every frame by a
//! chain of compute stages:
//!
//! 1. Project each splat to a screen-space conic and count the 16×16 tiles
//!    it overlaps.
//! 2. Prefix-scan the counts into per-splat write offsets.
//! 3. Expand one `(tile | depth, splat)` key per overlap.
//! 4. Radix-sort the keys.
//! 5. Find each tile's range in the sorted keys.
//! 6. Composite every pixel front to back over its tile's range.
//!
//! ## Modules
//!
//! - `core`: splats, camera, tile grid and the shared screen-space records
//! - `io`: PLY scene loading
//! - `render`: host (CPU) implementation of every stage
//! - `frame`: per-frame state machine, instance capacity and presentation
//!   seams
//! - `gpu`: the wgpu implementation (feature-gated)
//! - `config`, `metrics`: runtime settings and frame statistics

// Core data structures and math
pub mod core;

// Scene loading
pub mod io;

// Host pipeline
pub mod render;

// Frame orchestration
pub mod frame;

pub mod config;
pub mod metrics;

// GPU pipeline (optional)
#[cfg(feature = "gpu")]
pub mod gpu;

// Re-export commonly used types at crate root for convenience
pub use config::RendererConfig;
pub use core::{Camera, Gaussian, PrimitiveStore, TileGrid};
pub use frame::{CompositeSettings, FrameError, FrameOrchestrator, FrameOutcome};
pub use io::{load_ply, load_ply_limited, LoadError};
pub use render::{render_reference, CpuStages};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
