//! Exclusive prefix scan of the tile overlap counts.

use wgpu::*;

use super::buffers::{create_buffer_init, dispatch_size};
use super::pipelines::{buffer_entries, Pipelines};
use super::types::ScanParams;
use crate::core::ScanPlan;

const WORKGROUP_SIZE: u32 = 256;

/// Record the doubling passes and the final shift over `buffers[0]`,
/// which must hold the `n` counts. Returns the index of the buffer holding
/// the exclusive offsets, with the total at slot `n`.
pub fn encode_exclusive_scan(
    device: &Device,
    encoder: &mut CommandEncoder,
    pipelines: &Pipelines,
    buffers: &[Buffer; 2],
    n: u32,
) -> usize {
    let plan = ScanPlan::new(n);
    let mut src = 0usize;

    for pass in 0..plan.total_passes() {
        let shift = pass == plan.doubling_passes;
        let params = ScanParams {
            n,
            stride: if shift { 0 } else { ScanPlan::stride(pass) },
            _pad: [0; 2],
        };
        let params_buffer =
            create_buffer_init(device, "Scan Params", &[params], BufferUsages::UNIFORM);

        let bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some("Prefix Sum Bind Group"),
            layout: &pipelines.scan_layout,
            entries: &buffer_entries(&[&params_buffer, &buffers[src], &buffers[1 - src]]),
        });

        let mut cpass = encoder.begin_compute_pass(&ComputePassDescriptor {
            label: Some(if shift { "Prefix Sum Shift" } else { "Prefix Sum Step" }),
            timestamp_writes: None,
        });
        cpass.set_pipeline(if shift {
            &pipelines.scan_shift
        } else {
            &pipelines.scan_step
        });
        cpass.set_bind_group(0, &bind_group, &[]);
        let (x, y) = dispatch_size(n + 1, WORKGROUP_SIZE);
        cpass.dispatch_workgroups(x, y, 1);
        drop(cpass);

        src = 1 - src;
    }

    debug_assert_eq!(src == 1, plan.result_in_alternate());
    src
}
