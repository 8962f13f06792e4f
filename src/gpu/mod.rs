//! GPU rendering pipeline (feature-gated).
//!
//! Only available when compiled with --features gpu
//!
//! Architecture:
//! - `context` - wgpu device/queue initialization
//! - `buffers` - GPU buffer management and readback
//! - `types` - Pod structs shared with the WGSL shaders
//! - `shaders`, `pipelines` - WGSL modules and the pipelines built from them
//! - `resources` - scene-, instance- and viewport-sized buffer sets
//! - `scan`, `sort` - prefix sum and radix sort recording
//! - `stages` - [`GpuStages`], the wgpu backend of the frame loop
//! - `present` - window surface and offscreen presenters
//! - `renderer` - one-shot headless rendering

mod buffers;
mod context;
mod pipelines;
mod present;
mod renderer;
mod resources;
mod scan;
mod shaders;
mod sort;
mod stages;
mod types;

pub use buffers::{dispatch_size, read_buffer_blocking};
pub use context::{ContextOptions, GpuContext};
pub use present::{OffscreenImage, OffscreenPresenter, RenderTarget, SurfaceImage, SurfacePresenter};
pub use renderer::GpuRenderer;
pub use stages::GpuStages;
pub use types::{
    key_from_gpu, key_to_gpu, BinParams, CompositeParams, ExpandParams, PrimitiveGPU,
    ProjectParams, ScanParams, SortParams,
};
