//! Unit tests for core math invariants and small, deterministic examples.
//!
//! Each test checks a property the projection stage relies on, with numbers
//! simple enough to verify by hand.

use approx::assert_relative_eq;
use nalgebra::{Matrix2, SymmetricEigen, UnitQuaternion, Vector3, Vector4};
use splat_rs::core::{math::perspective_jacobian, Camera, Gaussian, TileGrid};
use splat_rs::render::project::{ndc_to_pixel, project_gaussian, tile_rect, DILATION};
use std::f32::consts::FRAC_PI_2;

fn camera_at(position: Vector3<f32>) -> Camera {
    Camera::new(position, UnitQuaternion::identity(), FRAC_PI_2, 0.1, 100.0)
}

#[test]
fn test_view_matrix_identity_rotation_translates() {
    let camera = camera_at(Vector3::new(1.0, 2.0, 3.0));
    let p = camera.view_matrix() * Vector4::new(4.0, 5.0, 6.0, 1.0);

    // With identity rotation, world-to-view is just point - position.
    assert_relative_eq!(p.x, 3.0, epsilon = 1e-6);
    assert_relative_eq!(p.y, 3.0, epsilon = 1e-6);
    assert_relative_eq!(p.z, 3.0, epsilon = 1e-6);
}

#[test]
fn test_projection_pinhole_example() {
    // 90° fov on a 640-wide viewport: focal length 320 px.
    let camera = camera_at(Vector3::zeros());
    let (fx, fy) = camera.focal(640, 480);
    assert_relative_eq!(fx, 320.0, epsilon = 1e-3);
    assert_relative_eq!(fy, 320.0, epsilon = 1e-3);

    // (1, 2, 4) lands at ndc (0.25, 0.5 * 640 / 480).
    let clip = camera.projection_matrix(640, 480) * Vector4::new(1.0, 2.0, 4.0, 1.0);
    let u = ndc_to_pixel(clip.x / clip.w, 640);
    let v = ndc_to_pixel(clip.y / clip.w, 480);
    // u = fx * x / z + (w - 1) / 2 = 80 + 319.5
    assert_relative_eq!(u, 399.5, epsilon = 1e-2);
    assert_relative_eq!(v, 160.0 + 239.5, epsilon = 1e-2);
}

#[test]
fn test_projection_depth_range() {
    let camera = camera_at(Vector3::zeros());
    let p = camera.projection_matrix(100, 100);
    let near = p * Vector4::new(0.0, 0.0, camera.near, 1.0);
    let far = p * Vector4::new(0.0, 0.0, camera.far, 1.0);
    assert_relative_eq!(near.z / near.w, 0.0, epsilon = 1e-5);
    assert_relative_eq!(far.z / far.w, 1.0, epsilon = 1e-5);
}

#[test]
fn test_look_at_faces_target() {
    let camera = Camera::look_at(
        Vector3::new(3.0, -1.0, 2.0),
        Vector3::new(0.0, 0.0, 0.0),
        Vector3::new(0.0, -1.0, 0.0),
        1.0,
        0.1,
        50.0,
    );
    let target = camera.view_matrix() * Vector4::new(0.0, 0.0, 0.0, 1.0);
    let distance = Vector3::new(3.0f32, -1.0, 2.0).norm();
    assert_relative_eq!(target.x, 0.0, epsilon = 1e-5);
    assert_relative_eq!(target.y, 0.0, epsilon = 1e-5);
    assert_relative_eq!(target.z, distance, epsilon = 1e-5);
}

#[test]
fn test_perspective_jacobian_matches_finite_difference() {
    let fx = 320.0;
    let fy = 240.0;
    let p = Vector3::new(0.3, -1.2, 2.5);
    let eps = 1e-3;

    // Wide limits so the clamp stays out of the way.
    let j = perspective_jacobian(&p, fx, fy, 10.0, 10.0);

    let project_uv = |pt: Vector3<f32>| -> (f32, f32) { (fx * pt.x / pt.z, fy * pt.y / pt.z) };

    for axis in 0..3 {
        let mut p_plus = p;
        let mut p_minus = p;
        p_plus[axis] += eps;
        p_minus[axis] -= eps;

        let (u_plus, v_plus) = project_uv(p_plus);
        let (u_minus, v_minus) = project_uv(p_minus);
        let du = (u_plus - u_minus) / (2.0 * eps);
        let dv = (v_plus - v_minus) / (2.0 * eps);

        assert_relative_eq!(du, j[(0, axis)], epsilon = 0.5);
        assert_relative_eq!(dv, j[(1, axis)], epsilon = 0.5);
    }
}

#[test]
fn test_perspective_jacobian_clamps_off_frustum_points() {
    let far_out = perspective_jacobian(&Vector3::new(100.0, 0.0, 1.0), 100.0, 100.0, 1.0, 1.0);
    let at_limit = perspective_jacobian(&Vector3::new(1.3, 0.0, 1.0), 100.0, 100.0, 1.0, 1.0);
    assert_relative_eq!(far_out[(0, 2)], at_limit[(0, 2)], epsilon = 1e-4);
}

#[test]
fn test_gaussian_covariance_symmetry_and_positive_definite() {
    let g = Gaussian::from_raw(
        Vector3::zeros(),
        Vector3::new(-1.0, -2.0, -3.0),
        [0.9, 0.2, -0.4, 0.1],
        0.0,
        [[0.0f32; 3]; 16],
    );
    let cov = g.covariance_matrix();

    let symmetry_error = (cov - cov.transpose()).abs().max();
    assert!(symmetry_error < 1e-6, "covariance matrix not symmetric");

    let eig = SymmetricEigen::new(cov);
    for v in eig.eigenvalues.iter() {
        assert!(*v > 0.0, "eigenvalue not positive: {v}");
    }

    // Eigenvalues are the squared scales.
    let mut got: Vec<f32> = eig.eigenvalues.iter().copied().collect();
    got.sort_by(f32::total_cmp);
    let mut want: Vec<f32> = [-1.0f32, -2.0, -3.0].iter().map(|s| (2.0 * s).exp()).collect();
    want.sort_by(f32::total_cmp);
    for (a, b) in got.iter().zip(&want) {
        assert_relative_eq!(*a, *b, epsilon = 1e-5);
    }
}

#[test]
fn test_conic_is_inverse_of_dilated_covariance() {
    let g = Gaussian::new(
        Vector3::new(0.2, -0.1, 4.0),
        Vector3::new(0.3, 0.1, 0.2),
        UnitQuaternion::from_euler_angles(0.4, 0.1, -0.7),
        0.8,
        [[0.0; 3]; 16],
    );
    let camera = camera_at(Vector3::zeros());
    let uniforms = camera.frame_uniforms(128, 128);
    let grid = TileGrid::new(128, 128);
    let s = project_gaussian(&g, &uniforms, &grid).expect("visible");

    // Rebuild Σ₂d from the conic and check its diagonal carries the dilation.
    let [a, b, c] = s.conic();
    let conic = Matrix2::new(a, b, b, c);
    let cov = conic.try_inverse().expect("invertible");
    assert!(cov[(0, 0)] > DILATION);
    assert!(cov[(1, 1)] > DILATION);
    let ident = cov * conic;
    assert_relative_eq!(ident[(0, 0)], 1.0, epsilon = 1e-4);
    assert_relative_eq!(ident[(0, 1)], 0.0, epsilon = 1e-4);

    // Radius covers three sigma of the wider axis.
    let lambda_max = SymmetricEigen::new(cov).eigenvalues.max();
    assert!(s.radius() >= 3.0 * lambda_max.sqrt() - 1e-3);
    assert_relative_eq!(s.depth, 4.0, epsilon = 1e-5);
}

#[test]
fn test_tile_rect_clamps_to_grid() {
    let grid = TileGrid::new(100, 50);
    assert_eq!(grid.tiles_x, 7);
    assert_eq!(grid.tiles_y, 4);

    assert_eq!(tile_rect(-100.0, -100.0, 5.0, &grid), [0, 0, 0, 0]);
    assert_eq!(tile_rect(50.0, 25.0, 1000.0, &grid), [0, 0, 7, 4]);
    assert_eq!(tile_rect(20.0, 20.0, 2.0, &grid), [1, 1, 2, 2]);
}
