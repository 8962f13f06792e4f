//! Device buffers grouped by what their size depends on.
//!
//! - [`SceneBuffers`]: number of splats (rebuilt on scene load)
//! - [`InstanceBuffers`]: instance capacity (rebuilt on growth)
//! - [`TileBuffers`]: viewport (rebuilt on resize)

use tracing::debug;
use wgpu::*;

use super::buffers::{create_buffer_init, create_storage};
use super::types::PrimitiveGPU;
use crate::core::tiles::RADIX_BUCKETS;
use crate::core::{PrimitiveStore, ScreenAttributes, TileGrid, TileRange};
use crate::render::radix::BLOCK_SIZE;

pub struct SceneBuffers {
    pub num_primitives: u32,
    pub primitives: Buffer,
    pub attributes: Buffer,
    pub overlaps: Buffer,
    /// Ping-pong prefix-scan buffers, `n + 1` slots each.
    pub scan: [Buffer; 2],
}

impl SceneBuffers {
    pub fn new(device: &Device, store: &PrimitiveStore) -> Self {
        let mut data: Vec<PrimitiveGPU> = store
            .as_slice()
            .iter()
            .map(PrimitiveGPU::from_gaussian)
            .collect();
        let n = data.len() as u64;
        if data.is_empty() {
            data.push(bytemuck::Zeroable::zeroed());
        }

        let primitives = create_buffer_init(device, "Primitives", &data, BufferUsages::STORAGE);
        let attributes = create_storage::<ScreenAttributes>(
            device,
            "Screen Attributes",
            n.max(1),
            BufferUsages::COPY_SRC,
        );
        let overlaps =
            create_storage::<u32>(device, "Tile Overlaps", n.max(1), BufferUsages::COPY_SRC);
        let scan_usage = BufferUsages::COPY_SRC | BufferUsages::COPY_DST;
        let scan = [
            create_storage::<u32>(device, "Scan Ping", n + 1, scan_usage),
            create_storage::<u32>(device, "Scan Pong", n + 1, scan_usage),
        ];

        debug!(
            splats = n,
            bytes = n * std::mem::size_of::<PrimitiveGPU>() as u64,
            "uploaded scene"
        );

        Self {
            num_primitives: n as u32,
            primitives,
            attributes,
            overlaps,
            scan,
        }
    }
}

/// Keys, values and the radix histogram, sized for `capacity` instances.
pub struct InstanceBuffers {
    pub capacity: u64,
    /// `[primary, alternate]`; keys are `vec2<u32>` (depth bits, tile).
    pub keys: [Buffer; 2],
    pub values: [Buffer; 2],
    pub histogram: Buffer,
}

impl InstanceBuffers {
    pub fn new(device: &Device, capacity: u64) -> Self {
        let capacity = capacity.max(1);
        let usage = BufferUsages::COPY_SRC;
        let blocks = capacity.div_ceil(BLOCK_SIZE as u64);

        Self {
            capacity,
            keys: [
                create_storage::<[u32; 2]>(device, "Sort Keys", capacity, usage),
                create_storage::<[u32; 2]>(device, "Sort Keys Alt", capacity, usage),
            ],
            values: [
                create_storage::<u32>(device, "Sort Values", capacity, usage),
                create_storage::<u32>(device, "Sort Values Alt", capacity, usage),
            ],
            histogram: create_storage::<u32>(
                device,
                "Radix Histogram",
                blocks * RADIX_BUCKETS as u64,
                BufferUsages::empty(),
            ),
        }
    }
}

/// Tile ranges and the composite output image.
pub struct TileBuffers {
    pub grid: TileGrid,
    pub ranges: Buffer,
    pub output: Texture,
    pub output_view: TextureView,
    pub blit_bind_group: BindGroup,
}

impl TileBuffers {
    pub fn new(device: &Device, grid: TileGrid, blit_layout: &BindGroupLayout) -> Self {
        let ranges = create_storage::<TileRange>(
            device,
            "Tile Ranges",
            (grid.num_tiles() as u64).max(1),
            BufferUsages::COPY_DST | BufferUsages::COPY_SRC,
        );

        let output = device.create_texture(&TextureDescriptor {
            label: Some("Composite Output"),
            size: Extent3d {
                width: grid.width.max(1),
                height: grid.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsages::STORAGE_BINDING
                | TextureUsages::TEXTURE_BINDING
                | TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let output_view = output.create_view(&TextureViewDescriptor::default());

        let blit_bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some("Blit Bind Group"),
            layout: blit_layout,
            entries: &[BindGroupEntry {
                binding: 0,
                resource: BindingResource::TextureView(&output_view),
            }],
        });

        Self {
            grid,
            ranges,
            output,
            output_view,
            blit_bind_group,
        }
    }
}
