//! Splat primitives and the per-scene primitive store.
//!
//! A Gaussian is parameterized by:
//! - Position (mean μ)
//! - Linear scale along its local axes
//! - Rotation (unit quaternion)
//! - Opacity in [0, 1]
//! - Degree-3 spherical harmonics coefficients (view-dependent color)
//!
//! Scene files store log-scale and logit-opacity; those are activated once
//! at load by [`Gaussian::from_raw`] so that the renderer only ever sees
//! final values. The 3D covariance is precomputed at construction.

use nalgebra::{Matrix3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::core::math::{covariance_from_upper, covariance_upper, sigmoid};

/// Scale modifier applied when the covariance is built.
pub const SCALE_MODIFIER: f32 = 1.0;

/// A 3D Gaussian primitive with activated parameters.
///
/// Σ = R · S · Sᵀ · Rᵀ with S = diag(scale). The upper triangle of Σ is kept
/// in `covariance` as `[xx, xy, xz, yy, yz, zz]`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Gaussian {
    pub position: Vector3<f32>,

    /// Linear scale (already exp'd).
    pub scale: Vector3<f32>,

    pub rotation: UnitQuaternion<f32>,

    /// Opacity in [0, 1] (already sigmoid'd).
    pub opacity: f32,

    /// `sh_coeffs[j][c]`: coefficient `j` of channel `c`. Index 0 is DC.
    pub sh_coeffs: [[f32; 3]; 16],

    covariance: [f32; 6],
}

impl Gaussian {
    /// Create a Gaussian from activated parameters.
    pub fn new(
        position: Vector3<f32>,
        scale: Vector3<f32>,
        rotation: UnitQuaternion<f32>,
        opacity: f32,
        sh_coeffs: [[f32; 3]; 16],
    ) -> Self {
        let covariance = covariance_upper(&scale, &rotation, SCALE_MODIFIER);
        Self {
            position,
            scale,
            rotation,
            opacity,
            sh_coeffs,
            covariance,
        }
    }

    /// Create a Gaussian from raw scene-file values.
    ///
    /// `log_scale` is exponentiated, `opacity_logit` goes through a sigmoid,
    /// and the quaternion `(w, x, y, z)` is normalized.
    pub fn from_raw(
        position: Vector3<f32>,
        log_scale: Vector3<f32>,
        rotation_wxyz: [f32; 4],
        opacity_logit: f32,
        sh_coeffs: [[f32; 3]; 16],
    ) -> Self {
        let [w, x, y, z] = rotation_wxyz;
        let rotation = UnitQuaternion::from_quaternion(nalgebra::Quaternion::new(w, x, y, z));
        Self::new(
            position,
            log_scale.map(f32::exp),
            rotation,
            sigmoid(opacity_logit),
            sh_coeffs,
        )
    }

    /// Upper triangle of the 3D covariance `[xx, xy, xz, yy, yz, zz]`.
    pub fn covariance(&self) -> &[f32; 6] {
        &self.covariance
    }

    /// Full symmetric 3D covariance matrix.
    pub fn covariance_matrix(&self) -> Matrix3<f32> {
        covariance_from_upper(&self.covariance)
    }
}

/// The immutable set of primitives for one scene.
///
/// Built once at scene load and only read afterwards; the GPU copy is
/// uploaded from [`PrimitiveStore::as_slice`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PrimitiveStore {
    gaussians: Vec<Gaussian>,
}

impl PrimitiveStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_gaussians(gaussians: Vec<Gaussian>) -> Self {
        Self { gaussians }
    }

    pub fn len(&self) -> usize {
        self.gaussians.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gaussians.is_empty()
    }

    pub fn as_slice(&self) -> &[Gaussian] {
        &self.gaussians
    }

    pub fn get(&self, index: usize) -> Option<&Gaussian> {
        self.gaussians.get(index)
    }

    /// Axis-aligned bounds of the primitive centers, `None` when empty.
    pub fn bounds(&self) -> Option<(Vector3<f32>, Vector3<f32>)> {
        let first = self.gaussians.first()?.position;
        Some(self.gaussians.iter().fold((first, first), |(lo, hi), g| {
            (lo.inf(&g.position), hi.sup(&g.position))
        }))
    }
}

impl FromIterator<Gaussian> for PrimitiveStore {
    fn from_iter<I: IntoIterator<Item = Gaussian>>(iter: I) -> Self {
        Self::from_gaussians(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_from_raw_activates_parameters() {
        let g = Gaussian::from_raw(
            Vector3::zeros(),
            Vector3::new(0.0, 1.0f32.ln(), 2.0f32.ln()),
            [2.0, 0.0, 0.0, 0.0],
            0.0,
            [[0.0; 3]; 16],
        );
        assert_relative_eq!(g.scale, Vector3::new(1.0, 1.0, 2.0), epsilon = 1e-6);
        assert_relative_eq!(g.opacity, 0.5, epsilon = 1e-6);
        assert_relative_eq!(g.rotation.w, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_covariance_precomputed_at_construction() {
        let g = Gaussian::new(
            Vector3::zeros(),
            Vector3::new(2.0, 3.0, 4.0),
            UnitQuaternion::identity(),
            1.0,
            [[0.0; 3]; 16],
        );
        assert_eq!(g.covariance(), &[4.0, 0.0, 0.0, 9.0, 0.0, 16.0]);
        assert_relative_eq!(g.covariance_matrix()[(2, 2)], 16.0, epsilon = 1e-6);
    }

    #[test]
    fn test_store_bounds() {
        let mk = |x: f32, y: f32, z: f32| {
            Gaussian::new(
                Vector3::new(x, y, z),
                Vector3::repeat(1.0),
                UnitQuaternion::identity(),
                1.0,
                [[0.0; 3]; 16],
            )
        };
        let store: PrimitiveStore = vec![mk(1.0, -2.0, 3.0), mk(-1.0, 4.0, 0.5)]
            .into_iter()
            .collect();
        let (lo, hi) = store.bounds().unwrap();
        assert_eq!(lo, Vector3::new(-1.0, -2.0, 0.5));
        assert_eq!(hi, Vector3::new(1.0, 4.0, 3.0));
        assert!(PrimitiveStore::new().bounds().is_none());
    }
}
