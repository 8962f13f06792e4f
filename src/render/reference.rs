//! Host implementation of the frame stages.
//!
//! Runs the full pipeline on the CPU with the same buffer ownership and
//! sizing rules as the GPU backend, so the orchestrator's growth and
//! recreation paths can be exercised without a device.

use image::RgbaImage;
use tracing::debug;

use super::{binning, composite, keys, project, radix, scan};
use crate::core::{
    Camera, FrameUniforms, Gaussian, PrimitiveStore, ScreenAttributes, SortPlan, TileGrid,
    TileRange,
};
use crate::frame::{CompositeSettings, FrameError, FrameStages};

/// CPU backend for [`crate::frame::FrameOrchestrator`].
pub struct CpuStages {
    gaussians: Vec<Gaussian>,
    grid: TileGrid,
    attributes: Vec<ScreenAttributes>,
    overlaps: Vec<u32>,
    offsets: Vec<u32>,
    total: u32,
    sort: radix::SortBuffers,
    sorted_in: usize,
    ranges: Vec<TileRange>,
    max_instances: u64,
    instance_resizes: u32,
    tile_resizes: u32,
}

impl Default for CpuStages {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuStages {
    pub fn new() -> Self {
        Self::with_max_instances(u32::MAX as u64)
    }

    /// Cap the instance capacity, standing in for a device buffer limit.
    pub fn with_max_instances(max_instances: u64) -> Self {
        Self {
            gaussians: Vec::new(),
            grid: TileGrid::new(0, 0),
            attributes: Vec::new(),
            overlaps: Vec::new(),
            offsets: Vec::new(),
            total: 0,
            sort: radix::SortBuffers::default(),
            sorted_in: 0,
            ranges: Vec::new(),
            max_instances,
            instance_resizes: 0,
            tile_resizes: 0,
        }
    }

    pub fn instance_capacity(&self) -> usize {
        self.sort.capacity()
    }

    pub fn grid(&self) -> TileGrid {
        self.grid
    }

    pub fn attributes(&self) -> &[ScreenAttributes] {
        &self.attributes
    }

    pub fn overlaps(&self) -> &[u32] {
        &self.overlaps
    }

    pub fn offsets(&self) -> &[u32] {
        &self.offsets
    }

    pub fn total_instances(&self) -> u32 {
        self.total
    }

    pub fn sorted_keys(&self) -> &[u64] {
        &self.sort.keys[self.sorted_in][..self.total as usize]
    }

    pub fn sorted_values(&self) -> &[u32] {
        &self.sort.values[self.sorted_in][..self.total as usize]
    }

    pub fn tile_ranges(&self) -> &[TileRange] {
        &self.ranges
    }

    /// How many times the instance buffers were (re)allocated.
    pub fn instance_resizes(&self) -> u32 {
        self.instance_resizes
    }

    pub fn tile_resizes(&self) -> u32 {
        self.tile_resizes
    }

    /// Everything up to and including the scan.
    pub fn run_project_and_scan(&mut self, uniforms: &FrameUniforms) -> Result<u32, FrameError> {
        project::project_all(
            &self.gaussians,
            uniforms,
            &self.grid,
            &mut self.attributes,
            &mut self.overlaps,
        );
        let result = scan::exclusive_scan(&self.overlaps)?;
        self.offsets = result.offsets;
        self.total = result.total;
        Ok(self.total)
    }

    /// Key expansion, sort and tile binning for the current scan result.
    pub fn run_sort_and_bin(&mut self) -> Result<(), FrameError> {
        keys::expand_keys(
            &self.attributes,
            &self.offsets,
            self.total,
            &self.grid,
            &mut self.sort.keys[0],
            &mut self.sort.values[0],
        )?;
        let plan = SortPlan::for_grid(&self.grid);
        self.sorted_in = radix::radix_sort(&mut self.sort, self.total as usize, &plan);
        let count = self.total as usize;
        binning::identify_tile_ranges(&self.sort.keys[self.sorted_in][..count], &mut self.ranges);
        Ok(())
    }
}

impl FrameStages<RgbaImage> for CpuStages {
    fn wait_previous(&mut self) -> Result<(), FrameError> {
        Ok(())
    }

    fn load_scene(&mut self, store: &PrimitiveStore) -> Result<(), FrameError> {
        self.gaussians = store.as_slice().to_vec();
        self.attributes = Vec::with_capacity(self.gaussians.len());
        self.overlaps = Vec::with_capacity(self.gaussians.len());
        self.offsets.clear();
        self.total = 0;
        Ok(())
    }

    fn resize_instances(&mut self, capacity: u64) -> Result<(), FrameError> {
        debug!(capacity, "allocating host instance buffers");
        self.sort = radix::SortBuffers::with_capacity(capacity as usize);
        self.sorted_in = 0;
        self.instance_resizes += 1;
        Ok(())
    }

    fn resize_tiles(&mut self, grid: TileGrid) -> Result<(), FrameError> {
        self.grid = grid;
        self.ranges = vec![TileRange::default(); grid.num_tiles() as usize];
        self.tile_resizes += 1;
        Ok(())
    }

    fn project_and_scan(&mut self, uniforms: &FrameUniforms) -> Result<u32, FrameError> {
        self.run_project_and_scan(uniforms)
    }

    fn sort_and_composite(
        &mut self,
        target: &mut RgbaImage,
        instances: u32,
        settings: &CompositeSettings,
    ) -> Result<(), FrameError> {
        if instances != self.total {
            return Err(FrameError::Device(format!(
                "instance count {instances} does not match scan total {}",
                self.total
            )));
        }
        self.run_sort_and_bin()?;
        composite::composite(
            &self.attributes,
            self.sorted_values(),
            &self.ranges,
            &self.grid,
            settings,
            target,
        );
        Ok(())
    }

    fn wait_idle(&mut self) -> Result<(), FrameError> {
        Ok(())
    }

    fn max_instances(&self) -> u64 {
        self.max_instances
    }
}

/// Render one image on the host, sizing buffers exactly for the frame.
pub fn render_reference(
    store: &PrimitiveStore,
    camera: &Camera,
    width: u32,
    height: u32,
    settings: &CompositeSettings,
) -> Result<RgbaImage, FrameError> {
    let mut stages = CpuStages::new();
    stages.load_scene(store)?;
    stages.resize_tiles(TileGrid::new(width, height))?;
    let uniforms = camera.frame_uniforms(width, height);
    let total = stages.run_project_and_scan(&uniforms)?;
    stages.resize_instances(total.max(1) as u64)?;
    let mut out = RgbaImage::new(width, height);
    stages.sort_and_composite(&mut out, total, settings)?;
    Ok(out)
}
