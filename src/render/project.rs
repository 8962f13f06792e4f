//! Projection of 3D splats to screen-space conics and tile rectangles.
//!
//! This is the host mirror of `project.wgsl`; both follow the same steps:
//!
//! 1. Transform the center to view space and cull against the near plane.
//! 2. Project to NDC and then to pixel coordinates.
//! 3. Rotate Σ into view space (W Σ Wᵀ) and project with the perspective
//!    Jacobian: Σ₂d = J W Σ Wᵀ Jᵀ, plus a 0.3 px² low-pass dilation.
//! 4. Invert Σ₂d into the conic and derive a 3σ radius from its larger
//!    eigenvalue.
//! 5. Clamp the radius box to the tile grid and count covered tiles.
//! 6. Evaluate SH along the camera-to-splat direction.

use nalgebra::{Matrix2, Matrix3, Vector4};
use rayon::prelude::*;

use crate::core::{
    evaluate_sh, perspective_jacobian, FrameUniforms, Gaussian, ScreenAttributes, TileGrid,
    TILE_SIZE,
};

/// Low-pass filter added to the 2D covariance diagonal (pixels²).
pub const DILATION: f32 = 0.3;

/// Projection of one splat. Returns `None` when culled.
pub fn project_gaussian(
    gaussian: &Gaussian,
    uniforms: &FrameUniforms,
    grid: &TileGrid,
) -> Option<ScreenAttributes> {
    let view = uniforms.view_matrix();
    let p = gaussian.position;
    let p4 = Vector4::new(p.x, p.y, p.z, 1.0);

    let p_view = (view * p4).xyz();
    if p_view.z <= uniforms.near {
        return None;
    }

    let p_hom = uniforms.view_proj_matrix() * p4;
    let w = 1.0 / (p_hom.w + 1e-7);
    let ndc_x = p_hom.x * w;
    let ndc_y = p_hom.y * w;
    let u = ndc_to_pixel(ndc_x, uniforms.width);
    let v = ndc_to_pixel(ndc_y, uniforms.height);

    let (focal_x, focal_y) = uniforms.focal();
    let j = perspective_jacobian(
        &p_view,
        focal_x,
        focal_y,
        uniforms.tan_fovx,
        uniforms.tan_fovy,
    );
    let w_rot: Matrix3<f32> = view.fixed_view::<3, 3>(0, 0).into_owned();
    let t = j * w_rot;
    let cov2: Matrix2<f32> = t * gaussian.covariance_matrix() * t.transpose();

    let a = cov2[(0, 0)] + DILATION;
    let b = cov2[(0, 1)];
    let c = cov2[(1, 1)] + DILATION;

    let det = a * c - b * b;
    if det == 0.0 {
        return None;
    }
    let inv_det = 1.0 / det;
    let conic = [c * inv_det, -b * inv_det, a * inv_det];

    let mid = 0.5 * (a + c);
    let disc = (mid * mid - det).max(0.1).sqrt();
    let lambda_max = (mid + disc).max(mid - disc);
    let radius = (3.0 * lambda_max.sqrt()).ceil();
    if radius <= 0.0 {
        return None;
    }

    let aabb = tile_rect(u, v, radius, grid);
    let [x0, y0, x1, y1] = aabb;
    if (x1 - x0) * (y1 - y0) == 0 {
        return None;
    }

    let color = evaluate_sh(&gaussian.sh_coeffs, &(p - uniforms.camera_position()));

    Some(ScreenAttributes {
        conic_opacity: [conic[0], conic[1], conic[2], gaussian.opacity],
        color_radius: [color.x, color.y, color.z, radius],
        aabb,
        uv: [u, v],
        depth: p_view.z,
        _pad: 0.0,
    })
}

/// `((ndc + 1) · size − 1) / 2`: NDC to pixel coordinates, pixel centers at
/// integers.
pub fn ndc_to_pixel(ndc: f32, size: u32) -> f32 {
    ((ndc + 1.0) * size as f32 - 1.0) * 0.5
}

/// Tile rectangle `[min_x, min_y, max_x, max_y)` covered by a disc, clamped
/// to the grid.
pub fn tile_rect(u: f32, v: f32, radius: f32, grid: &TileGrid) -> [u32; 4] {
    let ts = TILE_SIZE as f32;
    let clamp = |x: f32, hi: u32| x.floor().clamp(0.0, hi as f32) as u32;
    [
        clamp((u - radius) / ts, grid.tiles_x),
        clamp((v - radius) / ts, grid.tiles_y),
        clamp((u + radius + ts - 1.0) / ts, grid.tiles_x),
        clamp((v + radius + ts - 1.0) / ts, grid.tiles_y),
    ]
}

/// Project every splat. Culled entries are zeroed with a count of 0.
pub fn project_all(
    gaussians: &[Gaussian],
    uniforms: &FrameUniforms,
    grid: &TileGrid,
    attributes: &mut Vec<ScreenAttributes>,
    overlaps: &mut Vec<u32>,
) {
    attributes.clear();
    overlaps.clear();
    gaussians
        .par_iter()
        .map(|g| project_gaussian(g, uniforms, grid).unwrap_or_default())
        .collect_into_vec(attributes);
    overlaps.extend(attributes.iter().map(ScreenAttributes::tile_count));
}
