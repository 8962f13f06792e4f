use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::{
    Acquire, CapacityPolicy, CompositeSettings, FrameError, FrameStages, PresentStatus, Presenter,
};
use crate::core::{Camera, PrimitiveStore, TileGrid};
use crate::metrics::{FpsCounter, Metrics};

/// Growth steps allowed within a single frame before giving up.
///
/// One step is always enough because the multiplier jumps straight to the
/// required value; the bound only guards against a backend that reports a
/// different count on the retry.
pub const MAX_GROW_RETRIES: u32 = 4;

/// States of one frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrameState {
    WaitPrevious,
    AcquireImage,
    SubmitProjectAndScan,
    ReadInstanceCount,
    Grow,
    SubmitSortAndComposite,
    Present,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// An image was presented.
    Presented { instances: u32, grew: bool },
    /// The surface was out of date or zero-sized; nothing was presented.
    Skipped,
    /// The renderer has been stopped.
    Stopped,
}

pub struct FrameOrchestrator<P: Presenter, S: FrameStages<P::Image>> {
    presenter: P,
    stages: S,
    capacity: CapacityPolicy,
    grid: TileGrid,
    settings: CompositeSettings,
    metrics: Metrics,
    fps: FpsCounter,
    running: Arc<AtomicBool>,
    recreate_pending: bool,
    frames_presented: u64,
}

impl<P: Presenter, S: FrameStages<P::Image>> FrameOrchestrator<P, S> {
    /// Upload `store` and size every buffer for the presenter's current
    /// framebuffer.
    pub fn new(
        presenter: P,
        mut stages: S,
        store: &PrimitiveStore,
        settings: CompositeSettings,
        metrics: Metrics,
    ) -> Result<Self, FrameError> {
        let (width, height) = presenter.size();
        let grid = TileGrid::new(width, height);
        let capacity = CapacityPolicy::new(store.len());

        stages.load_scene(store)?;
        stages.resize_tiles(grid)?;
        check_limit(capacity.capacity(), stages.max_instances())?;
        stages.resize_instances(capacity.capacity())?;

        info!(
            splats = store.len(),
            width,
            height,
            tiles = grid.num_tiles(),
            "renderer ready"
        );

        Ok(Self {
            presenter,
            stages,
            capacity,
            grid,
            settings,
            metrics,
            fps: FpsCounter::per_second(Instant::now()),
            running: Arc::new(AtomicBool::new(true)),
            recreate_pending: false,
            frames_presented: 0,
        })
    }

    /// Render and present one frame.
    pub fn draw_frame(&mut self, camera: &Camera) -> Result<FrameOutcome, FrameError> {
        if !self.is_running() {
            return Ok(FrameOutcome::Stopped);
        }

        let mut state = FrameState::WaitPrevious;
        let mut image: Option<P::Image> = None;
        let mut instances = 0u32;
        let mut grow_retries = 0u32;
        let mut suboptimal = false;
        let mut scan_ms = 0.0f32;

        loop {
            state = match state {
                FrameState::WaitPrevious => {
                    self.stages.wait_previous()?;
                    if self.recreate_pending {
                        self.recreate_swapchain()?;
                    }
                    FrameState::AcquireImage
                }

                FrameState::AcquireImage => {
                    let (w, h) = self.presenter.size();
                    if w == 0 || h == 0 {
                        return Ok(FrameOutcome::Skipped);
                    }
                    match self.presenter.acquire()? {
                        Acquire::Ready(img) => {
                            image = Some(img);
                            FrameState::SubmitProjectAndScan
                        }
                        Acquire::Suboptimal(img) => {
                            suboptimal = true;
                            image = Some(img);
                            FrameState::SubmitProjectAndScan
                        }
                        Acquire::OutOfDate => {
                            warn!("surface out of date on acquire, recreating");
                            self.recreate_swapchain()?;
                            return Ok(FrameOutcome::Skipped);
                        }
                    }
                }

                FrameState::SubmitProjectAndScan => {
                    let uniforms = camera.frame_uniforms(self.grid.width, self.grid.height);
                    let t = Instant::now();
                    instances = self.stages.project_and_scan(&uniforms)?;
                    scan_ms = t.elapsed().as_secs_f32() * 1000.0;
                    FrameState::ReadInstanceCount
                }

                FrameState::ReadInstanceCount => {
                    if self.capacity.fits(instances) {
                        FrameState::SubmitSortAndComposite
                    } else {
                        FrameState::Grow
                    }
                }

                FrameState::Grow => {
                    grow_retries += 1;
                    if grow_retries > MAX_GROW_RETRIES {
                        return Err(FrameError::GrowthDidNotConverge {
                            retries: grow_retries - 1,
                            instances,
                        });
                    }
                    let mut grown = self.capacity;
                    if let Some(new_capacity) = grown.grow_to(instances) {
                        check_limit(new_capacity, self.stages.max_instances())?;
                        info!(
                            instances,
                            multiplier = grown.multiplier(),
                            capacity = new_capacity,
                            "growing instance buffers"
                        );
                        self.stages.resize_instances(new_capacity)?;
                    }
                    self.capacity = grown;
                    FrameState::SubmitProjectAndScan
                }

                FrameState::SubmitSortAndComposite => {
                    let target = image
                        .as_mut()
                        .ok_or_else(|| FrameError::Acquire("no image acquired".into()))?;
                    let t = Instant::now();
                    self.stages
                        .sort_and_composite(target, instances, &self.settings)?;
                    let composite_ms = t.elapsed().as_secs_f32() * 1000.0;
                    self.metrics.push_timing("project_scan", scan_ms);
                    self.metrics.push_timing("sort_composite", composite_ms);
                    FrameState::Present
                }

                FrameState::Present => {
                    let img = image
                        .take()
                        .ok_or_else(|| FrameError::Present("no image acquired".into()))?;
                    match self.presenter.present(img)? {
                        PresentStatus::Presented => {}
                        status => {
                            debug!(?status, "surface needs recreation after present");
                            self.recreate_pending = true;
                        }
                    }
                    if suboptimal {
                        self.recreate_pending = true;
                    }
                    self.finish_frame(instances);
                    return Ok(FrameOutcome::Presented {
                        instances,
                        grew: grow_retries > 0,
                    });
                }
            };
        }
    }

    fn finish_frame(&mut self, instances: u32) {
        self.frames_presented += 1;
        self.metrics.push_value("instances", instances as f32);
        self.metrics
            .push_value("capacity_multiplier", self.capacity.multiplier() as f32);
        if let Some(fps) = self.fps.tick(Instant::now()) {
            self.metrics.push_value("fps", fps);
        }
    }

    fn recreate_swapchain(&mut self) -> Result<(), FrameError> {
        self.stages.wait_idle()?;
        self.presenter.recreate()?;
        self.recreate_pending = false;

        let (width, height) = self.presenter.size();
        let grid = TileGrid::new(width, height);
        if grid != self.grid {
            info!(width, height, tiles = grid.num_tiles(), "viewport resized");
            self.stages.resize_tiles(grid)?;
            self.grid = grid;
        }
        Ok(())
    }

    /// Replace the scene. All scene- and instance-sized buffers are torn
    /// down and rebuilt; the capacity multiplier starts over at 1.
    pub fn switch_scene(&mut self, store: &PrimitiveStore) -> Result<(), FrameError> {
        let capacity = CapacityPolicy::new(store.len());
        check_limit(capacity.capacity(), self.stages.max_instances())?;
        self.stages.wait_idle()?;
        self.stages.load_scene(store)?;
        self.stages.resize_instances(capacity.capacity())?;
        self.capacity = capacity;
        info!(splats = store.len(), "switched scene");
        Ok(())
    }

    /// Stop rendering and drain the device. Later `draw_frame` calls
    /// return [`FrameOutcome::Stopped`].
    pub fn stop(&mut self) -> Result<(), FrameError> {
        self.running.store(false, Ordering::SeqCst);
        self.stages.wait_idle()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Shared flag another thread can clear to stop the render loop.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Takes effect on the next frame.
    pub fn set_half_resolution(&mut self, enabled: bool) {
        self.settings.half_resolution = enabled;
    }

    pub fn settings(&self) -> &CompositeSettings {
        &self.settings
    }

    pub fn capacity(&self) -> &CapacityPolicy {
        &self.capacity
    }

    pub fn grid(&self) -> TileGrid {
        self.grid
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn metrics_mut(&mut self) -> &mut Metrics {
        &mut self.metrics
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn presenter_mut(&mut self) -> &mut P {
        &mut self.presenter
    }

    pub fn stages(&self) -> &S {
        &self.stages
    }

    /// Tear down, returning the presenter and stages.
    pub fn into_parts(self) -> (P, S) {
        (self.presenter, self.stages)
    }
}

fn check_limit(required: u64, limit: u64) -> Result<(), FrameError> {
    if required > limit {
        return Err(FrameError::CapacityExceeded { required, limit });
    }
    Ok(())
}
