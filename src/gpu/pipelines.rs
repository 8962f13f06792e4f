//! Compute and blit pipelines, created once per device.

use std::collections::HashMap;
use wgpu::*;

use super::shaders;

pub(crate) fn uniform_entry(binding: u32, visibility: ShaderStages) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility,
        ty: BindingType::Buffer {
            ty: BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub(crate) fn storage_entry(binding: u32, read_only: bool) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility: ShaderStages::COMPUTE,
        ty: BindingType::Buffer {
            ty: BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub(crate) fn buffer_entries<'a>(buffers: &[&'a Buffer]) -> Vec<BindGroupEntry<'a>> {
    buffers
        .iter()
        .enumerate()
        .map(|(i, b)| BindGroupEntry {
            binding: i as u32,
            resource: b.as_entire_binding(),
        })
        .collect()
}

pub(crate) fn compute_pipeline(
    device: &Device,
    label: &str,
    layout: &BindGroupLayout,
    module: &ShaderModule,
    entry_point: &str,
) -> ComputePipeline {
    let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[layout],
        push_constant_ranges: &[],
    });

    device.create_compute_pipeline(&ComputePipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        module,
        entry_point,
    })
}

fn layout(device: &Device, label: &str, entries: &[BindGroupLayoutEntry]) -> BindGroupLayout {
    device.create_bind_group_layout(&BindGroupLayoutDescriptor {
        label: Some(label),
        entries,
    })
}

pub struct Pipelines {
    pub project_layout: BindGroupLayout,
    pub project: ComputePipeline,

    pub scan_layout: BindGroupLayout,
    pub scan_step: ComputePipeline,
    pub scan_shift: ComputePipeline,

    pub expand_layout: BindGroupLayout,
    pub expand: ComputePipeline,

    pub boundary_layout: BindGroupLayout,
    pub boundary: ComputePipeline,

    pub composite_layout: BindGroupLayout,
    pub composite: ComputePipeline,
}

impl Pipelines {
    pub fn new(device: &Device) -> Self {
        let project_layout = layout(
            device,
            "Project Bind Group Layout",
            &[
                uniform_entry(0, ShaderStages::COMPUTE),
                uniform_entry(1, ShaderStages::COMPUTE),
                storage_entry(2, true),
                storage_entry(3, false),
                storage_entry(4, false),
            ],
        );
        let project = compute_pipeline(
            device,
            "Project Pipeline",
            &project_layout,
            &shaders::create_project_shader(device),
            "project",
        );

        let scan_layout = layout(
            device,
            "Prefix Sum Bind Group Layout",
            &[
                uniform_entry(0, ShaderStages::COMPUTE),
                storage_entry(1, true),
                storage_entry(2, false),
            ],
        );
        let scan_shader = shaders::create_prefix_sum_shader(device);
        let scan_step = compute_pipeline(
            device,
            "Prefix Sum Step Pipeline",
            &scan_layout,
            &scan_shader,
            "scan_step",
        );
        let scan_shift = compute_pipeline(
            device,
            "Prefix Sum Shift Pipeline",
            &scan_layout,
            &scan_shader,
            "scan_shift",
        );

        let expand_layout = layout(
            device,
            "Expand Keys Bind Group Layout",
            &[
                uniform_entry(0, ShaderStages::COMPUTE),
                storage_entry(1, true),
                storage_entry(2, true),
                storage_entry(3, false),
                storage_entry(4, false),
            ],
        );
        let expand = compute_pipeline(
            device,
            "Expand Keys Pipeline",
            &expand_layout,
            &shaders::create_expand_keys_shader(device),
            "expand_keys",
        );

        let boundary_layout = layout(
            device,
            "Tile Boundary Bind Group Layout",
            &[
                uniform_entry(0, ShaderStages::COMPUTE),
                storage_entry(1, true),
                storage_entry(2, false),
            ],
        );
        let boundary = compute_pipeline(
            device,
            "Tile Boundary Pipeline",
            &boundary_layout,
            &shaders::create_tile_boundary_shader(device),
            "tile_boundary",
        );

        let composite_layout = layout(
            device,
            "Composite Bind Group Layout",
            &[
                uniform_entry(0, ShaderStages::COMPUTE),
                storage_entry(1, true),
                storage_entry(2, true),
                storage_entry(3, true),
                BindGroupLayoutEntry {
                    binding: 4,
                    visibility: ShaderStages::COMPUTE,
                    ty: BindingType::StorageTexture {
                        access: StorageTextureAccess::WriteOnly,
                        format: TextureFormat::Rgba8Unorm,
                        view_dimension: TextureViewDimension::D2,
                    },
                    count: None,
                },
            ],
        );
        let composite = compute_pipeline(
            device,
            "Composite Pipeline",
            &composite_layout,
            &shaders::create_composite_shader(device),
            "composite",
        );

        Self {
            project_layout,
            project,
            scan_layout,
            scan_step,
            scan_shift,
            expand_layout,
            expand,
            boundary_layout,
            boundary,
            composite_layout,
            composite,
        }
    }
}

/// Fullscreen copy of the composite texture, one render pipeline per
/// target format.
pub struct BlitPipelines {
    shader: ShaderModule,
    pub layout: BindGroupLayout,
    pipeline_layout: PipelineLayout,
    pipelines: HashMap<TextureFormat, RenderPipeline>,
}

impl BlitPipelines {
    pub fn new(device: &Device) -> Self {
        let shader = shaders::create_blit_shader(device);
        let layout = layout(
            device,
            "Blit Bind Group Layout",
            &[BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::FRAGMENT,
                ty: BindingType::Texture {
                    sample_type: TextureSampleType::Float { filterable: false },
                    view_dimension: TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            }],
        );
        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("Blit Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        Self {
            shader,
            layout,
            pipeline_layout,
            pipelines: HashMap::new(),
        }
    }

    /// Build the pipeline for `format` if it does not exist yet.
    pub fn prepare(&mut self, device: &Device, format: TextureFormat) {
        self.pipelines.entry(format).or_insert_with(|| {
            device.create_render_pipeline(&RenderPipelineDescriptor {
                label: Some("Blit Pipeline"),
                layout: Some(&self.pipeline_layout),
                vertex: VertexState {
                    module: &self.shader,
                    entry_point: "vs_main",
                    buffers: &[],
                },
                fragment: Some(FragmentState {
                    module: &self.shader,
                    entry_point: "fs_main",
                    targets: &[Some(ColorTargetState {
                        format,
                        blend: None,
                        write_mask: ColorWrites::ALL,
                    })],
                }),
                primitive: PrimitiveState::default(),
                depth_stencil: None,
                multisample: MultisampleState::default(),
                multiview: None,
            })
        });
    }

    pub fn pipeline(&self, format: TextureFormat) -> Option<&RenderPipeline> {
        self.pipelines.get(&format)
    }
}
