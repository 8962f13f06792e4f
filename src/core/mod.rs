//! Core data structures and mathematical operations.
//!
//! This module contains the fundamental types used throughout the system:
//! - `Gaussian` / `PrimitiveStore`: the immutable scene primitives
//! - `Camera` / `FrameUniforms`: viewpoint and its per-frame uniform block
//! - `TileGrid`, composite keys, and scan/sort pass plans
//! - `ScreenAttributes` / `TileRange`: per-frame intermediate records
//!
//! All types here are pure data: no I/O, no GPU handles.

mod camera;
mod gaussian;
pub mod math;
mod screen;
mod sh;
pub mod tiles;

pub use camera::{Camera, FrameUniforms};
pub use gaussian::{Gaussian, PrimitiveStore, SCALE_MODIFIER};
pub use math::{covariance_upper, perspective_jacobian, quaternion_to_matrix, sigmoid};
pub use screen::{ScreenAttributes, TileRange};
pub use sh::{evaluate_sh, sh_basis, SH_C0, SH_COEFFS};
pub use tiles::{composite_key, key_depth, key_tile, ScanPlan, SortPlan, TileGrid, TILE_SIZE};
