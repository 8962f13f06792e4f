//! GPU-side LSD radix sort of the instance keys.
//!
//! Keys are 64-bit `(tile << 32) | depth_bits`, stored as `vec2<u32>`. Each
//! pass sorts one 8-bit digit with three kernels (histogram, offsets,
//! scatter) and ping-pongs between the primary and alternate buffers. The
//! scatter is stable, so after all passes the keys are ordered by tile and,
//! within a tile, by depth.

use wgpu::*;

use super::buffers::{create_buffer_init, dispatch_size};
use super::pipelines::{buffer_entries, compute_pipeline, storage_entry, uniform_entry};
use super::resources::InstanceBuffers;
use super::shaders;
use super::types::SortParams;
use crate::core::SortPlan;
use crate::render::radix::BLOCK_SIZE;

pub struct RadixSorter {
    histogram: ComputePipeline,
    offsets: ComputePipeline,
    scatter: ComputePipeline,
    bind_group_layout: BindGroupLayout,
}

impl RadixSorter {
    pub fn new(device: &Device) -> Self {
        let shader = shaders::create_radix_sort_shader(device);

        let bind_group_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Radix Sort Bind Group Layout"),
            entries: &[
                uniform_entry(0, ShaderStages::COMPUTE),
                storage_entry(1, true),
                storage_entry(2, true),
                storage_entry(3, false),
                storage_entry(4, false),
                storage_entry(5, false),
            ],
        });

        let histogram = compute_pipeline(
            device,
            "Radix Histogram Pipeline",
            &bind_group_layout,
            &shader,
            "radix_histogram",
        );
        let offsets = compute_pipeline(
            device,
            "Radix Offsets Pipeline",
            &bind_group_layout,
            &shader,
            "radix_offsets",
        );
        let scatter = compute_pipeline(
            device,
            "Radix Scatter Pipeline",
            &bind_group_layout,
            &shader,
            "radix_scatter",
        );

        Self {
            histogram,
            offsets,
            scatter,
            bind_group_layout,
        }
    }

    /// Record the sort of the first `count` entries of `buffers.keys[0]` /
    /// `buffers.values[0]`. Returns the index of the buffer pair holding
    /// the sorted result.
    pub fn sort(
        &self,
        device: &Device,
        encoder: &mut CommandEncoder,
        buffers: &InstanceBuffers,
        count: u32,
        plan: &SortPlan,
    ) -> usize {
        if count <= 1 {
            return 0;
        }

        let block = BLOCK_SIZE as u32;
        let num_blocks = count.div_ceil(block);
        let (x, y) = dispatch_size(count, block);
        let mut src = 0usize;

        for pass in 0..plan.passes {
            let params = SortParams {
                count,
                shift: SortPlan::shift(pass),
                num_blocks,
                _pad: 0,
            };
            let params_buffer =
                create_buffer_init(device, "Sort Params", &[params], BufferUsages::UNIFORM);

            let dst = 1 - src;
            let bind_group = device.create_bind_group(&BindGroupDescriptor {
                label: Some("Radix Sort Bind Group"),
                layout: &self.bind_group_layout,
                entries: &buffer_entries(&[
                    &params_buffer,
                    &buffers.keys[src],
                    &buffers.values[src],
                    &buffers.keys[dst],
                    &buffers.values[dst],
                    &buffers.histogram,
                ]),
            });

            let mut cpass = encoder.begin_compute_pass(&ComputePassDescriptor {
                label: Some("Radix Sort Pass"),
                timestamp_writes: None,
            });
            cpass.set_bind_group(0, &bind_group, &[]);

            cpass.set_pipeline(&self.histogram);
            cpass.dispatch_workgroups(x, y, 1);

            cpass.set_pipeline(&self.offsets);
            cpass.dispatch_workgroups(1, 1, 1);

            cpass.set_pipeline(&self.scatter);
            cpass.dispatch_workgroups(x, y, 1);
            drop(cpass);

            src = dst;
        }

        debug_assert_eq!(src == 1, plan.result_in_alternate());
        src
    }
}
