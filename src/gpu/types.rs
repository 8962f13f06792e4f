//! GPU-friendly data types.
//!
//! These types are uploaded directly to GPU buffers:
//! - Flat memory layout (no pointers)
//! - Field order and padding match the WGSL structs
//! - bytemuck Pod + Zeroable traits

use crate::core::Gaussian;

/// GPU representation of a splat. Matches `Primitive` in `project.wgsl`.
///
/// Total size: 240 bytes.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PrimitiveGPU {
    /// World position (x, y, z) and opacity in `w`.
    pub position_opacity: [f32; 4],

    /// 3D covariance, upper triangle `[xx, xy, xz, yy, yz, zz]`.
    pub cov3d: [f32; 6],
    pub _pad: [f32; 2],

    /// SH coefficients, 16 RGB triplets: `[r0, g0, b0, r1, g1, b1, ...]`.
    pub sh: [f32; 48],
}

impl PrimitiveGPU {
    pub fn from_gaussian(g: &Gaussian) -> Self {
        let mut sh = [0.0f32; 48];
        for (k, rgb) in g.sh_coeffs.iter().enumerate() {
            sh[k * 3..k * 3 + 3].copy_from_slice(rgb);
        }

        Self {
            position_opacity: [g.position.x, g.position.y, g.position.z, g.opacity],
            cov3d: *g.covariance(),
            _pad: [0.0; 2],
            sh,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ProjectParams {
    pub num_primitives: u32,
    pub tiles_x: u32,
    pub tiles_y: u32,
    pub _pad: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ScanParams {
    /// Number of input counts; the buffers hold `n + 1` slots.
    pub n: u32,
    pub stride: u32,
    pub _pad: [u32; 2],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ExpandParams {
    pub num_primitives: u32,
    /// Writes at or past this slot are dropped.
    pub capacity: u32,
    pub tiles_x: u32,
    pub _pad: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SortParams {
    pub count: u32,
    /// Bit offset of this pass's digit within the 64-bit key.
    pub shift: u32,
    pub num_blocks: u32,
    pub _pad: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BinParams {
    pub count: u32,
    pub num_tiles: u32,
    pub _pad: [u32; 2],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CompositeParams {
    pub width: u32,
    pub height: u32,
    pub tiles_x: u32,
    pub half_resolution: u32,
    pub background: [f32; 4],
}

/// Pack a host key into the `vec2<u32>` (depth bits, tile) the shaders use.
pub fn key_to_gpu(key: u64) -> [u32; 2] {
    [key as u32, (key >> 32) as u32]
}

pub fn key_from_gpu(key: [u32; 2]) -> u64 {
    ((key[1] as u64) << 32) | key[0] as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::composite_key;
    use nalgebra::{UnitQuaternion, Vector3};

    #[test]
    fn test_gpu_struct_sizes() {
        assert_eq!(std::mem::size_of::<PrimitiveGPU>(), 240);
        assert_eq!(std::mem::size_of::<ProjectParams>(), 16);
        assert_eq!(std::mem::size_of::<ScanParams>(), 16);
        assert_eq!(std::mem::size_of::<SortParams>(), 16);
        assert_eq!(std::mem::size_of::<CompositeParams>(), 32);
    }

    #[test]
    fn test_primitive_packing() {
        let mut sh = [[0.0f32; 3]; 16];
        sh[0] = [0.1, 0.2, 0.3];
        sh[15] = [0.7, 0.8, 0.9];
        let g = Gaussian::new(
            Vector3::new(1.0, 2.0, 3.0),
            Vector3::new(0.5, 0.5, 0.5),
            UnitQuaternion::identity(),
            0.4,
            sh,
        );
        let p = PrimitiveGPU::from_gaussian(&g);
        assert_eq!(p.position_opacity, [1.0, 2.0, 3.0, 0.4]);
        assert_eq!(&p.sh[0..3], &[0.1, 0.2, 0.3]);
        assert_eq!(&p.sh[45..48], &[0.7, 0.8, 0.9]);
        assert_eq!(p.cov3d, *g.covariance());
    }

    #[test]
    fn test_key_words() {
        let key = composite_key(7, 2.5);
        let gpu = key_to_gpu(key);
        assert_eq!(gpu[1], 7);
        assert_eq!(gpu[0], 2.5f32.to_bits());
        assert_eq!(key_from_gpu(gpu), key);
    }
}
