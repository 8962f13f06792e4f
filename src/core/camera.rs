//! Pinhole camera and the per-frame uniform block derived from it.
//!
//! Convention: +X right, +Y down, +Z forward (view space). The camera
//! stores its pose as a camera-to-world rotation and a world position.

use nalgebra::{Matrix3, Matrix4, Rotation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// A pinhole camera with a horizontal field of view.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Camera {
    /// Camera center in world space.
    pub position: Vector3<f32>,

    /// Camera-to-world rotation. Columns are the camera axes in world space.
    pub rotation: UnitQuaternion<f32>,

    /// Horizontal field of view in radians.
    pub fov_x: f32,

    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn new(
        position: Vector3<f32>,
        rotation: UnitQuaternion<f32>,
        fov_x: f32,
        near: f32,
        far: f32,
    ) -> Self {
        Self {
            position,
            rotation,
            fov_x,
            near,
            far,
        }
    }

    /// Place a camera at `eye` looking at `target`, with `up` as the world
    /// up direction.
    pub fn look_at(
        eye: Vector3<f32>,
        target: Vector3<f32>,
        up: Vector3<f32>,
        fov_x: f32,
        near: f32,
        far: f32,
    ) -> Self {
        Self::new(eye, look_rotation(target - eye, up), fov_x, near, far)
    }

    /// Move in the camera's local frame (x right, y down, z forward).
    pub fn translate(&mut self, local_delta: Vector3<f32>) {
        self.position += self.rotation * local_delta;
    }

    /// Yaw about the camera's down axis, then pitch about its right axis.
    pub fn rotate_local(&mut self, yaw: f32, pitch: f32) {
        let yaw_q = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), yaw);
        let pitch_q = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), pitch);
        self.rotation = self.rotation * yaw_q * pitch_q;
    }

    /// Rotate the camera about a world axis through `center`.
    pub fn orbit(&mut self, center: Vector3<f32>, axis: Vector3<f32>, angle: f32) {
        let Some(axis) = nalgebra::Unit::try_new(axis, 1e-6) else {
            return;
        };
        let q = UnitQuaternion::from_axis_angle(&axis, angle);
        self.position = center + q * (self.position - center);
        self.rotation = q * self.rotation;
    }

    /// Tangents of the half field of view for a viewport.
    ///
    /// `tan_fovy` follows from the aspect ratio so pixels stay square.
    pub fn tan_half_fov(&self, width: u32, height: u32) -> (f32, f32) {
        let tan_fovx = (self.fov_x * 0.5).tan();
        let tan_fovy = tan_fovx * height as f32 / width.max(1) as f32;
        (tan_fovx, tan_fovy)
    }

    /// Focal lengths in pixels for a viewport.
    pub fn focal(&self, width: u32, height: u32) -> (f32, f32) {
        let (tan_fovx, tan_fovy) = self.tan_half_fov(width, height);
        (
            width as f32 / (2.0 * tan_fovx),
            height as f32 / (2.0 * tan_fovy),
        )
    }

    /// World-to-view transform `[Rᵀ | -Rᵀ·p]`.
    pub fn view_matrix(&self) -> Matrix4<f32> {
        let r_t: Matrix3<f32> = self.rotation.to_rotation_matrix().into_inner().transpose();
        let t = -(r_t * self.position);
        let mut m = r_t.to_homogeneous();
        m[(0, 3)] = t.x;
        m[(1, 3)] = t.y;
        m[(2, 3)] = t.z;
        m
    }

    /// View-to-clip transform. Clip w is view-space z; depth maps near→0,
    /// far→1.
    pub fn projection_matrix(&self, width: u32, height: u32) -> Matrix4<f32> {
        let (tan_fovx, tan_fovy) = self.tan_half_fov(width, height);
        let (n, f) = (self.near, self.far);
        let mut p = Matrix4::zeros();
        p[(0, 0)] = 1.0 / tan_fovx;
        p[(1, 1)] = 1.0 / tan_fovy;
        p[(2, 2)] = f / (f - n);
        p[(2, 3)] = -(f * n) / (f - n);
        p[(3, 2)] = 1.0;
        p
    }

    /// Build the uniform block uploaded at the start of every frame.
    pub fn frame_uniforms(&self, width: u32, height: u32) -> FrameUniforms {
        let view = self.view_matrix();
        let view_proj = self.projection_matrix(width, height) * view;
        let (tan_fovx, tan_fovy) = self.tan_half_fov(width, height);
        FrameUniforms {
            camera_position: [self.position.x, self.position.y, self.position.z, 1.0],
            view: view.into(),
            view_proj: view_proj.into(),
            width,
            height,
            tan_fovx,
            tan_fovy,
            near: self.near,
            _pad: [0.0; 3],
        }
    }
}

/// Camera-to-world rotation whose +Z axis points along `forward`.
fn look_rotation(forward: Vector3<f32>, up: Vector3<f32>) -> UnitQuaternion<f32> {
    let z = forward.try_normalize(1e-8).unwrap_or_else(Vector3::z);
    let mut down = -up;
    if down.cross(&z).norm_squared() < 1e-10 {
        // Looking straight along the up axis; pick any perpendicular.
        down = if z.x.abs() < 0.9 { Vector3::x() } else { Vector3::y() };
    }
    let x = down.cross(&z).normalize();
    let y = z.cross(&x);
    let m = Matrix3::from_columns(&[x, y, z]);
    UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(m))
}

/// Per-frame uniform block, laid out to match `FrameUniforms` in the WGSL
/// shaders (176 bytes).
///
/// Matrices are column-major.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameUniforms {
    pub camera_position: [f32; 4],
    pub view: [[f32; 4]; 4],
    pub view_proj: [[f32; 4]; 4],
    pub width: u32,
    pub height: u32,
    pub tan_fovx: f32,
    pub tan_fovy: f32,
    pub near: f32,
    pub _pad: [f32; 3],
}

impl FrameUniforms {
    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::from(self.view)
    }

    pub fn view_proj_matrix(&self) -> Matrix4<f32> {
        Matrix4::from(self.view_proj)
    }

    pub fn camera_position(&self) -> Vector3<f32> {
        Vector3::new(
            self.camera_position[0],
            self.camera_position[1],
            self.camera_position[2],
        )
    }

    /// Focal lengths in pixels.
    pub fn focal(&self) -> (f32, f32) {
        (
            self.width as f32 / (2.0 * self.tan_fovx),
            self.height as f32 / (2.0 * self.tan_fovy),
        )
    }
}
