//! Host (CPU) implementation of the rendering pipeline.
//!
//! Every GPU stage has a host counterpart here with the same inputs,
//! outputs and buffer layout:
//! - `project`: splats → screen attributes + tile overlap counts
//! - `scan`: overlap counts → instance offsets + total
//! - `keys`: offsets → unsorted (tile|depth, splat) pairs
//! - `radix`: LSD radix sort of the pairs
//! - `binning`: sorted keys → per-tile ranges
//! - `composite`: ranges → pixels
//!
//! `CpuStages` strings them together behind the same `FrameStages` seam
//! the GPU backend uses. It serves as the reference when checking GPU
//! output, and as the backend for headless tests of the frame loop.

pub mod binning;
pub mod composite;
pub mod keys;
pub mod project;
pub mod radix;
mod reference;
pub mod scan;

pub use reference::{render_reference, CpuStages};
