//! WGSL shader modules.
//!
//! Compute shaders for each pipeline stage:
//! - Projection (3D → screen attributes + tile counts)
//! - Prefix sum
//! - Key expansion
//! - Radix sort
//! - Tile binning
//! - Compositing
//!
//! plus a fullscreen blit onto the presentation target.

use wgpu::{Device, ShaderModule};

pub const PROJECT_SHADER: &str = include_str!("shaders/project.wgsl");
pub const PREFIX_SUM_SHADER: &str = include_str!("shaders/prefix_sum.wgsl");
pub const EXPAND_KEYS_SHADER: &str = include_str!("shaders/expand_keys.wgsl");
pub const RADIX_SORT_SHADER: &str = include_str!("shaders/radix_sort.wgsl");
pub const TILE_BOUNDARY_SHADER: &str = include_str!("shaders/tile_boundary.wgsl");
pub const COMPOSITE_SHADER: &str = include_str!("shaders/composite.wgsl");
pub const BLIT_SHADER: &str = include_str!("shaders/blit.wgsl");

fn create(device: &Device, label: &str, source: &str) -> ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    })
}

pub fn create_project_shader(device: &Device) -> ShaderModule {
    create(device, "Project Shader", PROJECT_SHADER)
}

pub fn create_prefix_sum_shader(device: &Device) -> ShaderModule {
    create(device, "Prefix Sum Shader", PREFIX_SUM_SHADER)
}

pub fn create_expand_keys_shader(device: &Device) -> ShaderModule {
    create(device, "Expand Keys Shader", EXPAND_KEYS_SHADER)
}

pub fn create_radix_sort_shader(device: &Device) -> ShaderModule {
    create(device, "Radix Sort Shader", RADIX_SORT_SHADER)
}

pub fn create_tile_boundary_shader(device: &Device) -> ShaderModule {
    create(device, "Tile Boundary Shader", TILE_BOUNDARY_SHADER)
}

pub fn create_composite_shader(device: &Device) -> ShaderModule {
    create(device, "Composite Shader", COMPOSITE_SHADER)
}

pub fn create_blit_shader(device: &Device) -> ShaderModule {
    create(device, "Blit Shader", BLIT_SHADER)
}
