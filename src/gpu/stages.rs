//! wgpu implementation of the frame stages.
//!
//! Each frame is two submissions:
//!
//! 1. projection + prefix scan, followed by a 4-byte readback of the
//!    instance total (the orchestrator needs it to check capacity)
//! 2. key expansion, radix sort, tile binning, compositing and the blit
//!    onto the presentation target
//!
//! Set SPLAT_GPU_TIMING=1 to log per-stage wall-clock timings.

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use wgpu::*;

use super::buffers::{self, create_buffer, create_buffer_init, dispatch_size};
use super::context::GpuContext;
use super::pipelines::{buffer_entries, BlitPipelines, Pipelines};
use super::present::RenderTarget;
use super::resources::{InstanceBuffers, SceneBuffers, TileBuffers};
use super::scan::encode_exclusive_scan;
use super::sort::RadixSorter;
use super::types::{key_from_gpu, BinParams, CompositeParams, ExpandParams, ProjectParams};
use crate::core::{
    FrameUniforms, PrimitiveStore, ScreenAttributes, SortPlan, TileGrid, TileRange, TILE_SIZE,
};
use crate::frame::{CompositeSettings, FrameError, FrameStages};

const WORKGROUP_SIZE: u32 = 256;
/// Largest flat launch: 65535 × 65535 workgroups of 256.
const MAX_DISPATCH_ITEMS: u64 = 65_535 * 65_535 * WORKGROUP_SIZE as u64;

pub struct GpuStages {
    ctx: Arc<GpuContext>,
    pipelines: Pipelines,
    sorter: RadixSorter,
    blit: BlitPipelines,
    uniforms: Buffer,
    count_readback: Buffer,
    scene: Option<SceneBuffers>,
    instances: Option<InstanceBuffers>,
    tiles: Option<TileBuffers>,
    /// Scan buffer holding the current offsets.
    offsets_in: usize,
    /// Instance buffer pair holding the current sort result.
    sorted_in: usize,
    last_count: u32,
    last_submission: Option<SubmissionIndex>,
    timing: bool,
}

impl GpuStages {
    pub fn new(ctx: Arc<GpuContext>) -> Self {
        let device = &ctx.device;
        let pipelines = Pipelines::new(device);
        let sorter = RadixSorter::new(device);
        let blit = BlitPipelines::new(device);

        let uniforms = create_buffer(
            device,
            "Frame Uniforms",
            std::mem::size_of::<FrameUniforms>() as u64,
            BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        );
        let count_readback = create_buffer(
            device,
            "Instance Count Readback",
            4,
            BufferUsages::MAP_READ | BufferUsages::COPY_DST,
        );

        let timing = std::env::var("SPLAT_GPU_TIMING").is_ok();

        Self {
            ctx,
            pipelines,
            sorter,
            blit,
            uniforms,
            count_readback,
            scene: None,
            instances: None,
            tiles: None,
            offsets_in: 0,
            sorted_in: 0,
            last_count: 0,
            last_submission: None,
            timing,
        }
    }

    pub fn context(&self) -> &Arc<GpuContext> {
        &self.ctx
    }

    pub fn instance_capacity(&self) -> u64 {
        self.instances.as_ref().map_or(0, |b| b.capacity)
    }

    fn scene(&self) -> Result<&SceneBuffers, FrameError> {
        self.scene
            .as_ref()
            .ok_or_else(|| FrameError::Device("no scene loaded".into()))
    }

    fn tiles(&self) -> Result<&TileBuffers, FrameError> {
        self.tiles
            .as_ref()
            .ok_or_else(|| FrameError::Device("tile buffers not allocated".into()))
    }

    fn instance_buffers(&self) -> Result<&InstanceBuffers, FrameError> {
        self.instances
            .as_ref()
            .ok_or_else(|| FrameError::Device("instance buffers not allocated".into()))
    }

    fn read<T: bytemuck::Pod>(&self, buffer: &Buffer, count: usize) -> Result<Vec<T>, FrameError> {
        buffers::read_buffer_blocking(&self.ctx.device, &self.ctx.queue, buffer, count)
            .map_err(FrameError::Readback)
    }

    /// Screen attributes from the last projection.
    pub fn read_attributes(&self) -> Result<Vec<ScreenAttributes>, FrameError> {
        let scene = self.scene()?;
        self.read(&scene.attributes, scene.num_primitives as usize)
    }

    /// Tile overlap counts from the last projection.
    pub fn read_overlaps(&self) -> Result<Vec<u32>, FrameError> {
        let scene = self.scene()?;
        self.read(&scene.overlaps, scene.num_primitives as usize)
    }

    /// Exclusive offsets from the last scan, followed by the total.
    pub fn read_offsets(&self) -> Result<Vec<u32>, FrameError> {
        let scene = self.scene()?;
        self.read(
            &scene.scan[self.offsets_in],
            scene.num_primitives as usize + 1,
        )
    }

    /// Sorted keys and values from the last frame.
    pub fn read_sorted(&self) -> Result<(Vec<u64>, Vec<u32>), FrameError> {
        let inst = self.instance_buffers()?;
        let count = self.last_count as usize;
        let keys: Vec<[u32; 2]> = self.read(&inst.keys[self.sorted_in], count)?;
        let values = self.read(&inst.values[self.sorted_in], count)?;
        Ok((keys.into_iter().map(key_from_gpu).collect(), values))
    }

    pub fn read_tile_ranges(&self) -> Result<Vec<TileRange>, FrameError> {
        let tiles = self.tiles()?;
        self.read(&tiles.ranges, tiles.grid.num_tiles() as usize)
    }

    fn log_timing(&self, stage: &str, start: Option<Instant>) {
        if let Some(t) = start {
            debug!(stage, ms = t.elapsed().as_secs_f32() * 1000.0, "gpu timing");
        }
    }
}

impl<I: RenderTarget> FrameStages<I> for GpuStages {
    fn wait_previous(&mut self) -> Result<(), FrameError> {
        if let Some(index) = self.last_submission.take() {
            self.ctx
                .device
                .poll(Maintain::WaitForSubmissionIndex(index));
        }
        Ok(())
    }

    fn load_scene(&mut self, store: &PrimitiveStore) -> Result<(), FrameError> {
        if store.len() > u32::MAX as usize {
            return Err(FrameError::CapacityExceeded {
                required: store.len() as u64,
                limit: u32::MAX as u64,
            });
        }
        self.scene = None;
        self.scene = Some(SceneBuffers::new(&self.ctx.device, store));
        self.offsets_in = 0;
        self.last_count = 0;
        Ok(())
    }

    fn resize_instances(&mut self, capacity: u64) -> Result<(), FrameError> {
        // Release the old allocation before creating the larger one.
        self.instances = None;
        self.instances = Some(InstanceBuffers::new(&self.ctx.device, capacity));
        self.sorted_in = 0;
        info!(capacity, "allocated instance buffers");
        Ok(())
    }

    fn resize_tiles(&mut self, grid: TileGrid) -> Result<(), FrameError> {
        self.tiles = None;
        self.tiles = Some(TileBuffers::new(&self.ctx.device, grid, &self.blit.layout));
        debug!(tiles = grid.num_tiles(), "allocated tile buffers");
        Ok(())
    }

    fn project_and_scan(&mut self, uniforms: &FrameUniforms) -> Result<u32, FrameError> {
        let start = self.timing.then(Instant::now);
        let device = &self.ctx.device;
        let queue = &self.ctx.queue;
        let scene = self.scene()?;
        let grid = self.tiles()?.grid;
        let n = scene.num_primitives;

        queue.write_buffer(&self.uniforms, 0, bytemuck::bytes_of(uniforms));

        let mut encoder = device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("Project + Scan Encoder"),
        });

        if n > 0 {
            let params = ProjectParams {
                num_primitives: n,
                tiles_x: grid.tiles_x,
                tiles_y: grid.tiles_y,
                _pad: 0,
            };
            let params_buffer =
                create_buffer_init(device, "Project Params", &[params], BufferUsages::UNIFORM);
            let bind_group = device.create_bind_group(&BindGroupDescriptor {
                label: Some("Project Bind Group"),
                layout: &self.pipelines.project_layout,
                entries: &buffer_entries(&[
                    &self.uniforms,
                    &params_buffer,
                    &scene.primitives,
                    &scene.attributes,
                    &scene.overlaps,
                ]),
            });

            let mut pass = encoder.begin_compute_pass(&ComputePassDescriptor {
                label: Some("Project Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipelines.project);
            pass.set_bind_group(0, &bind_group, &[]);
            let (x, y) = dispatch_size(n, WORKGROUP_SIZE);
            pass.dispatch_workgroups(x, y, 1);
            drop(pass);

            encoder.copy_buffer_to_buffer(&scene.overlaps, 0, &scene.scan[0], 0, n as u64 * 4);
        }

        let offsets_in =
            encode_exclusive_scan(device, &mut encoder, &self.pipelines, &scene.scan, n);
        encoder.copy_buffer_to_buffer(
            &scene.scan[offsets_in],
            n as u64 * 4,
            &self.count_readback,
            0,
            4,
        );
        queue.submit(Some(encoder.finish()));

        let total = buffers::map_read_blocking::<u32>(device, &self.count_readback, 1)
            .map_err(FrameError::Readback)?
            .first()
            .copied()
            .ok_or_else(|| FrameError::Readback("empty instance count".into()))?;

        self.offsets_in = offsets_in;
        self.log_timing("project_scan", start);
        Ok(total)
    }

    fn sort_and_composite(
        &mut self,
        target: &mut I,
        instances: u32,
        settings: &CompositeSettings,
    ) -> Result<(), FrameError> {
        let start = self.timing.then(Instant::now);
        let format = target.format();
        self.blit.prepare(&self.ctx.device, format);

        let device = &self.ctx.device;
        let scene = self.scene()?;
        let tiles = self.tiles()?;
        let inst = self.instance_buffers()?;
        let grid = tiles.grid;

        if instances as u64 > inst.capacity {
            return Err(FrameError::CapacityExceeded {
                required: instances as u64,
                limit: inst.capacity,
            });
        }

        let mut encoder = device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("Sort + Composite Encoder"),
        });

        if instances > 0 {
            let params = ExpandParams {
                num_primitives: scene.num_primitives,
                capacity: inst.capacity.min(u32::MAX as u64) as u32,
                tiles_x: grid.tiles_x,
                _pad: 0,
            };
            let params_buffer =
                create_buffer_init(device, "Expand Params", &[params], BufferUsages::UNIFORM);
            let bind_group = device.create_bind_group(&BindGroupDescriptor {
                label: Some("Expand Keys Bind Group"),
                layout: &self.pipelines.expand_layout,
                entries: &buffer_entries(&[
                    &params_buffer,
                    &scene.attributes,
                    &scene.scan[self.offsets_in],
                    &inst.keys[0],
                    &inst.values[0],
                ]),
            });

            let mut pass = encoder.begin_compute_pass(&ComputePassDescriptor {
                label: Some("Expand Keys Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipelines.expand);
            pass.set_bind_group(0, &bind_group, &[]);
            let (x, y) = dispatch_size(scene.num_primitives, WORKGROUP_SIZE);
            pass.dispatch_workgroups(x, y, 1);
        }

        let sorted_in = self.sorter.sort(
            device,
            &mut encoder,
            inst,
            instances,
            &SortPlan::for_grid(&grid),
        );

        encoder.clear_buffer(&tiles.ranges, 0, None);

        if instances > 0 {
            let params = BinParams {
                count: instances,
                num_tiles: grid.num_tiles(),
                _pad: [0; 2],
            };
            let params_buffer =
                create_buffer_init(device, "Bin Params", &[params], BufferUsages::UNIFORM);
            let bind_group = device.create_bind_group(&BindGroupDescriptor {
                label: Some("Tile Boundary Bind Group"),
                layout: &self.pipelines.boundary_layout,
                entries: &buffer_entries(&[&params_buffer, &inst.keys[sorted_in], &tiles.ranges]),
            });

            let mut pass = encoder.begin_compute_pass(&ComputePassDescriptor {
                label: Some("Tile Boundary Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipelines.boundary);
            pass.set_bind_group(0, &bind_group, &[]);
            let (x, y) = dispatch_size(instances, WORKGROUP_SIZE);
            pass.dispatch_workgroups(x, y, 1);
        }

        {
            let [r, g, b] = settings.background;
            let params = CompositeParams {
                width: grid.width,
                height: grid.height,
                tiles_x: grid.tiles_x,
                half_resolution: settings.half_resolution as u32,
                background: [r, g, b, 1.0],
            };
            let params_buffer =
                create_buffer_init(device, "Composite Params", &[params], BufferUsages::UNIFORM);
            let mut entries = buffer_entries(&[
                &params_buffer,
                &scene.attributes,
                &inst.values[sorted_in],
                &tiles.ranges,
            ]);
            entries.push(BindGroupEntry {
                binding: 4,
                resource: BindingResource::TextureView(&tiles.output_view),
            });
            let bind_group = device.create_bind_group(&BindGroupDescriptor {
                label: Some("Composite Bind Group"),
                layout: &self.pipelines.composite_layout,
                entries: &entries,
            });

            let (w, h) = if settings.half_resolution {
                (grid.width.div_ceil(2), grid.height.div_ceil(2))
            } else {
                (grid.width, grid.height)
            };
            let mut pass = encoder.begin_compute_pass(&ComputePassDescriptor {
                label: Some("Composite Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipelines.composite);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(w.div_ceil(TILE_SIZE).max(1), h.div_ceil(TILE_SIZE).max(1), 1);
        }

        let blit_pipeline = self
            .blit
            .pipeline(format)
            .ok_or_else(|| FrameError::Device(format!("no blit pipeline for {format:?}")))?;
        {
            let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("Blit Pass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: target.view(),
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(Color::BLACK),
                        store: StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(blit_pipeline);
            pass.set_bind_group(0, &tiles.blit_bind_group, &[]);
            pass.draw(0..3, 0..1);
        }

        let index = self.ctx.queue.submit(Some(encoder.finish()));
        if self.timing {
            device.poll(Maintain::WaitForSubmissionIndex(index.clone()));
        }
        self.last_submission = Some(index);
        self.sorted_in = sorted_in;
        self.last_count = instances;
        self.log_timing("sort_composite", start);
        Ok(())
    }

    fn wait_idle(&mut self) -> Result<(), FrameError> {
        self.last_submission = None;
        self.ctx.device.poll(Maintain::Wait);
        Ok(())
    }

    fn max_instances(&self) -> u64 {
        self.ctx
            .max_sort_entries()
            .min(MAX_DISPATCH_ITEMS)
            .min(u32::MAX as u64)
    }
}
