//! Frame orchestration.
//!
//! [`FrameOrchestrator`] drives one frame at a time through an explicit
//! state machine. It talks to the outside through two seams:
//!
//! - [`Presenter`]: acquires and presents images (a window surface, or an
//!   offscreen texture).
//! - [`FrameStages`]: records and submits the pipeline stages, and owns
//!   every buffer whose size depends on the scene, the viewport, or the
//!   instance capacity.
//!
//! The wgpu backend is `gpu::GpuStages`; `render::CpuStages` runs the same
//! stages on the host and is what the state machine is tested against.

mod capacity;
mod error;
mod orchestrator;

pub use capacity::CapacityPolicy;
pub use error::FrameError;
pub use orchestrator::{FrameOrchestrator, FrameOutcome, FrameState, MAX_GROW_RETRIES};

use crate::core::{FrameUniforms, PrimitiveStore, TileGrid};

/// Result of asking the presenter for an image.
#[derive(Debug)]
pub enum Acquire<I> {
    Ready(I),
    /// Usable, but the surface should be recreated after presenting.
    Suboptimal(I),
    /// Unusable; recreate and skip this frame.
    OutOfDate,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PresentStatus {
    Presented,
    Suboptimal,
    OutOfDate,
}

/// Window surface or offscreen target.
pub trait Presenter {
    type Image;

    fn acquire(&mut self) -> Result<Acquire<Self::Image>, FrameError>;

    fn present(&mut self, image: Self::Image) -> Result<PresentStatus, FrameError>;

    /// Rebuild the swapchain at the current framebuffer size.
    fn recreate(&mut self) -> Result<(), FrameError>;

    /// Current framebuffer size in pixels.
    fn size(&self) -> (u32, u32);
}

/// Per-frame compositing switches.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CompositeSettings {
    pub half_resolution: bool,
    pub background: [f32; 3],
}

impl Default for CompositeSettings {
    fn default() -> Self {
        Self {
            half_resolution: false,
            background: [0.0; 3],
        }
    }
}

/// The pipeline stages as seen by the orchestrator.
///
/// Implementations own all scene-, viewport- and capacity-sized buffers.
/// The orchestrator decides when they are resized.
pub trait FrameStages<I> {
    /// Block until the previously submitted frame has finished.
    fn wait_previous(&mut self) -> Result<(), FrameError>;

    /// Upload a scene and (re)create every primitive-sized buffer.
    fn load_scene(&mut self, store: &PrimitiveStore) -> Result<(), FrameError>;

    /// Reallocate the key/value/histogram buffers for `capacity` instances.
    fn resize_instances(&mut self, capacity: u64) -> Result<(), FrameError>;

    /// Reallocate the tile range buffer for a new grid.
    fn resize_tiles(&mut self, grid: TileGrid) -> Result<(), FrameError>;

    /// Run projection and the prefix scan, wait, and return the total
    /// instance count.
    fn project_and_scan(&mut self, uniforms: &FrameUniforms) -> Result<u32, FrameError>;

    /// Expand keys, sort, bin, and composite into `target`.
    fn sort_and_composite(
        &mut self,
        target: &mut I,
        instances: u32,
        settings: &CompositeSettings,
    ) -> Result<(), FrameError>;

    /// Drain all outstanding work.
    fn wait_idle(&mut self) -> Result<(), FrameError>;

    /// Largest instance capacity the device can back.
    fn max_instances(&self) -> u64;
}
