//! High-level headless renderer: one call, one image.

use image::RgbaImage;
use std::sync::Arc;

use super::context::GpuContext;
use super::present::OffscreenPresenter;
use super::stages::GpuStages;
use crate::core::{Camera, PrimitiveStore};
use crate::frame::{CompositeSettings, FrameError, FrameOrchestrator, FrameOutcome};
use crate::metrics::Metrics;

/// A resize costs one skipped frame, so two attempts always suffice.
const MAX_ATTEMPTS: u32 = 2;

pub struct GpuRenderer {
    orchestrator: FrameOrchestrator<OffscreenPresenter, GpuStages>,
}

impl GpuRenderer {
    pub fn new(
        ctx: Arc<GpuContext>,
        store: &PrimitiveStore,
        width: u32,
        height: u32,
        settings: CompositeSettings,
    ) -> Result<Self, FrameError> {
        let presenter = OffscreenPresenter::new(Arc::clone(&ctx), width, height);
        let stages = GpuStages::new(ctx);
        let orchestrator =
            FrameOrchestrator::new(presenter, stages, store, settings, Metrics::new(true))?;
        Ok(Self { orchestrator })
    }

    /// Render one frame and read it back.
    pub fn render(&mut self, camera: &Camera) -> Result<RgbaImage, FrameError> {
        for _ in 0..MAX_ATTEMPTS {
            match self.orchestrator.draw_frame(camera)? {
                FrameOutcome::Presented { .. } => {
                    return self
                        .orchestrator
                        .presenter_mut()
                        .take_frame()
                        .ok_or_else(|| FrameError::Readback("no frame was read back".into()));
                }
                FrameOutcome::Skipped => continue,
                FrameOutcome::Stopped => {
                    return Err(FrameError::Device("renderer has been stopped".into()));
                }
            }
        }
        Err(FrameError::Present(format!(
            "no frame presented after {MAX_ATTEMPTS} attempts"
        )))
    }

    /// Takes effect on the next [`GpuRenderer::render`].
    pub fn resize(&mut self, width: u32, height: u32) {
        self.orchestrator.presenter_mut().resize(width, height);
    }

    pub fn orchestrator(&self) -> &FrameOrchestrator<OffscreenPresenter, GpuStages> {
        &self.orchestrator
    }

    pub fn orchestrator_mut(&mut self) -> &mut FrameOrchestrator<OffscreenPresenter, GpuStages> {
        &mut self.orchestrator
    }
}
