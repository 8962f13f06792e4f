//! Mathematical utilities (quaternions, activations, covariance helpers).

use nalgebra::{Matrix2x3, Matrix3, UnitQuaternion, Vector3};

/// Convert a unit quaternion to a 3×3 rotation matrix.
///
/// R = | 1-2(y²+z²)   2(xy-wz)    2(xz+wy)  |
///     | 2(xy+wz)     1-2(x²+z²)  2(yz-wx)  |
///     | 2(xz-wy)     2(yz+wx)    1-2(x²+y²)|
pub fn quaternion_to_matrix(q: &UnitQuaternion<f32>) -> Matrix3<f32> {
    q.to_rotation_matrix().into_inner()
}

/// Sigmoid activation: σ(x) = 1 / (1 + e^(-x)).
///
/// Raw opacities in scene files are logits; this maps them into (0, 1).
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Logit, the inverse of [`sigmoid`]. Clamped away from 0 and 1.
pub fn inverse_sigmoid(p: f32) -> f32 {
    let p_clamped = p.clamp(1e-6, 1.0 - 1e-6);
    (p_clamped / (1.0 - p_clamped)).ln()
}

/// Σ = R · S · Sᵀ · Rᵀ with S = diag(scale · modifier), packed as the upper
/// triangle `[xx, xy, xz, yy, yz, zz]`.
pub fn covariance_upper(
    scale: &Vector3<f32>,
    rotation: &UnitQuaternion<f32>,
    modifier: f32,
) -> [f32; 6] {
    let r = quaternion_to_matrix(rotation);
    let s = scale * modifier;
    let m = r * Matrix3::from_diagonal(&s);
    let sigma = m * m.transpose();
    [
        sigma[(0, 0)],
        sigma[(0, 1)],
        sigma[(0, 2)],
        sigma[(1, 1)],
        sigma[(1, 2)],
        sigma[(2, 2)],
    ]
}

/// Expand an upper-triangular covariance back into a full symmetric matrix.
pub fn covariance_from_upper(c: &[f32; 6]) -> Matrix3<f32> {
    Matrix3::new(c[0], c[1], c[2], c[1], c[3], c[4], c[2], c[4], c[5])
}

/// Jacobian of the pinhole projection at a view-space point.
///
/// J = | fx/z    0      -fx*x/z² |
///     |  0     fy/z    -fy*y/z² |
///
/// `x/z` and `y/z` are clamped to 1.3× the half-FOV tangent so splats far
/// outside the frustum do not blow up the footprint.
pub fn perspective_jacobian(
    point_view: &Vector3<f32>,
    focal_x: f32,
    focal_y: f32,
    tan_fovx: f32,
    tan_fovy: f32,
) -> Matrix2x3<f32> {
    let z = point_view.z;
    let lim_x = 1.3 * tan_fovx;
    let lim_y = 1.3 * tan_fovy;
    let x = (point_view.x / z).clamp(-lim_x, lim_x) * z;
    let y = (point_view.y / z).clamp(-lim_y, lim_y) * z;

    let z_inv = 1.0 / z;
    let z_inv_sq = z_inv * z_inv;

    Matrix2x3::new(
        focal_x * z_inv,
        0.0,
        -focal_x * x * z_inv_sq,
        0.0,
        focal_y * z_inv,
        -focal_y * y * z_inv_sq,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sigmoid() {
        assert_relative_eq!(sigmoid(0.0), 0.5, epsilon = 1e-6);
        assert!(sigmoid(10.0) > 0.99);
        assert!(sigmoid(-10.0) < 0.01);
    }

    #[test]
    fn test_sigmoid_inverse_roundtrip() {
        let p = 0.7;
        assert_relative_eq!(sigmoid(inverse_sigmoid(p)), p, epsilon = 1e-6);
    }

    #[test]
    fn test_quaternion_to_matrix_orthogonal() {
        let q = UnitQuaternion::from_euler_angles(0.1, 0.2, 0.3);
        let r = quaternion_to_matrix(&q);
        assert_relative_eq!(r * r.transpose(), Matrix3::identity(), epsilon = 1e-5);
        assert_relative_eq!(r.determinant(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_covariance_identity_rotation_is_diagonal() {
        let c = covariance_upper(
            &Vector3::new(1.0, 2.0, 3.0),
            &UnitQuaternion::identity(),
            1.0,
        );
        assert_relative_eq!(c[0], 1.0, epsilon = 1e-6);
        assert_relative_eq!(c[3], 4.0, epsilon = 1e-6);
        assert_relative_eq!(c[5], 9.0, epsilon = 1e-6);
        assert_relative_eq!(c[1], 0.0, epsilon = 1e-6);
        assert_relative_eq!(c[2], 0.0, epsilon = 1e-6);
        assert_relative_eq!(c[4], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_covariance_is_rotation_invariant_in_trace() {
        let scale = Vector3::new(0.5, 1.5, 0.25);
        let q = UnitQuaternion::from_euler_angles(0.7, -0.4, 1.1);
        let sigma = covariance_from_upper(&covariance_upper(&scale, &q, 1.0));
        assert_relative_eq!(sigma.trace(), scale.norm_squared(), epsilon = 1e-5);
        assert_relative_eq!(sigma, sigma.transpose(), epsilon = 1e-6);
    }

    #[test]
    fn test_jacobian_clamps_outside_frustum() {
        let inside = perspective_jacobian(&Vector3::new(0.0, 0.0, 2.0), 100.0, 100.0, 0.5, 0.5);
        assert_relative_eq!(inside[(0, 2)], 0.0, epsilon = 1e-6);

        let far_out = perspective_jacobian(&Vector3::new(100.0, 0.0, 1.0), 100.0, 100.0, 0.5, 0.5);
        let clamped = perspective_jacobian(&Vector3::new(0.65, 0.0, 1.0), 100.0, 100.0, 0.5, 0.5);
        assert_relative_eq!(far_out[(0, 2)], clamped[(0, 2)], epsilon = 1e-4);
    }
}
