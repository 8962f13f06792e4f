//! Spherical harmonics evaluation for view-dependent color.
//!
//! Splats store color as degree-3 real SH coefficients (16 per channel).
//! The same constants and sign conventions are used by `project.wgsl`.

use nalgebra::Vector3;

pub const SH_C0: f32 = 0.282_094_8;
pub const SH_C1: f32 = 0.488_602_52;
pub const SH_C2: [f32; 5] = [
    1.092_548_4,
    -1.092_548_4,
    0.315_391_57,
    -1.092_548_4,
    0.546_274_2,
];
pub const SH_C3: [f32; 7] = [
    -0.590_043_6,
    2.890_611_4,
    -0.457_045_8,
    0.373_176_34,
    -0.457_045_8,
    1.445_305_7,
    -0.590_043_6,
];

/// Number of SH coefficients per channel for degree 3.
pub const SH_COEFFS: usize = 16;

/// Evaluate the 16 real SH basis functions along a unit direction.
///
/// Ordering: Y_0^0, then degree 1 (m = -1, 0, 1), degree 2 (m = -2..2),
/// degree 3 (m = -3..3).
pub fn sh_basis(direction: &Vector3<f32>) -> [f32; 16] {
    let (x, y, z) = (direction.x, direction.y, direction.z);
    let (xx, yy, zz) = (x * x, y * y, z * z);
    let (xy, yz, xz) = (x * y, y * z, x * z);

    [
        SH_C0,
        -SH_C1 * y,
        SH_C1 * z,
        -SH_C1 * x,
        SH_C2[0] * xy,
        SH_C2[1] * yz,
        SH_C2[2] * (2.0 * zz - xx - yy),
        SH_C2[3] * xz,
        SH_C2[4] * (xx - yy),
        SH_C3[0] * y * (3.0 * xx - yy),
        SH_C3[1] * xy * z,
        SH_C3[2] * y * (4.0 * zz - xx - yy),
        SH_C3[3] * z * (2.0 * zz - 3.0 * xx - 3.0 * yy),
        SH_C3[4] * x * (4.0 * zz - xx - yy),
        SH_C3[5] * z * (xx - yy),
        SH_C3[6] * x * (xx - 3.0 * yy),
    ]
}

/// Evaluate view-dependent color from SH coefficients.
///
/// Returns `max(Σ basis·coeff + 0.5, 0)` per channel. The upper end is left
/// unclamped; the compositor saturates when packing to 8 bits.
pub fn evaluate_sh(sh_coeffs: &[[f32; 3]; 16], direction: &Vector3<f32>) -> Vector3<f32> {
    let dir = direction.normalize();
    let basis = sh_basis(&dir);

    let mut color = Vector3::<f32>::zeros();
    for (b, c) in basis.iter().zip(sh_coeffs.iter()) {
        color.x += b * c[0];
        color.y += b * c[1];
        color.z += b * c[2];
    }

    Vector3::new(
        (color.x + 0.5).max(0.0),
        (color.y + 0.5).max(0.0),
        (color.z + 0.5).max(0.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sh_basis_dc_component() {
        let b1 = sh_basis(&Vector3::new(1.0, 0.0, 0.0));
        let b2 = sh_basis(&Vector3::new(0.0, 1.0, 0.0));
        assert_relative_eq!(b1[0], b2[0], epsilon = 1e-6);
        assert_relative_eq!(b1[0], 0.282_094_8, epsilon = 1e-6);
    }

    #[test]
    fn test_evaluate_sh_dc_only_is_view_independent() {
        let mut sh = [[0.0f32; 3]; 16];
        sh[0] = [1.0, 0.5, 0.2];

        let c1 = evaluate_sh(&sh, &Vector3::new(1.0, 0.0, 0.0));
        let c2 = evaluate_sh(&sh, &Vector3::new(0.0, 0.0, 1.0));
        assert_relative_eq!(c1, c2, epsilon = 1e-5);
        assert_relative_eq!(c1.x, 1.0 * SH_C0 + 0.5, epsilon = 1e-5);
    }

    #[test]
    fn test_degree_one_flips_with_direction() {
        let mut sh = [[0.0f32; 3]; 16];
        sh[2] = [0.4, 0.4, 0.4];

        let toward = evaluate_sh(&sh, &Vector3::new(0.0, 0.0, 1.0));
        let away = evaluate_sh(&sh, &Vector3::new(0.0, 0.0, -1.0));
        assert_relative_eq!(toward.x - 0.5, -(away.x - 0.5), epsilon = 1e-5);
    }

    #[test]
    fn test_negative_result_clamped_to_zero() {
        let mut sh = [[0.0f32; 3]; 16];
        sh[0] = [-10.0, -10.0, -10.0];
        let c = evaluate_sh(&sh, &Vector3::new(0.0, 0.0, 1.0));
        assert_eq!(c, Vector3::zeros());
    }

    #[test]
    fn test_basis_energy_bounded_on_sphere() {
        let dir = Vector3::new(0.3, -0.5, 0.8).normalize();
        let basis = sh_basis(&dir);
        assert!(basis.iter().all(|b| b.is_finite()));
    }
}
