//! Renderer configuration (`splat.toml`).
//!
//! Every field has a default, so an empty file (or no file) is valid.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::Camera;
use crate::frame::CompositeSettings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// What the viewer measures while running.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfilingMode {
    #[default]
    None,
    /// Spin the camera every frame and log the average frame rate.
    Fps,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererConfig {
    /// Composite at half resolution and upsample 2×2.
    #[serde(default)]
    pub half_resolution: bool,

    /// Emit the on-screen metrics (instance count, FPS, stage timings).
    #[serde(default = "default_true")]
    pub enable_gui: bool,

    /// Request backend validation layers.
    #[serde(default)]
    pub validation: bool,

    /// Index into the adapter list; `None` picks the high-performance one.
    #[serde(default)]
    pub adapter_index: Option<usize>,

    /// Present without vsync.
    #[serde(default)]
    pub immediate_present: bool,

    /// Horizontal field of view in degrees.
    #[serde(default = "default_fov")]
    pub fov_degrees: f32,

    #[serde(default = "default_near")]
    pub near: f32,

    #[serde(default = "default_far")]
    pub far: f32,

    /// Background color composited behind the splats (linear RGB).
    #[serde(default)]
    pub background: [f32; 3],

    #[serde(default)]
    pub profiling: ProfilingMode,

    /// Scenes the viewer can cycle through.
    #[serde(default)]
    pub scenes: Vec<PathBuf>,

    #[serde(default = "default_eye")]
    pub eye: [f32; 3],

    #[serde(default)]
    pub target: [f32; 3],

    /// World up direction used to orient the initial camera.
    #[serde(default = "default_up")]
    pub up: [f32; 3],
}

fn default_true() -> bool { true }
fn default_fov() -> f32 { 45.0 }
fn default_near() -> f32 { 0.2 }
fn default_far() -> f32 { 1000.0 }
fn default_eye() -> [f32; 3] { [0.0, 0.0, -5.0] }
fn default_up() -> [f32; 3] { [0.0, -1.0, 0.0] }

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            half_resolution: false,
            enable_gui: true,
            validation: false,
            adapter_index: None,
            immediate_present: false,
            fov_degrees: default_fov(),
            near: default_near(),
            far: default_far(),
            background: [0.0; 3],
            profiling: ProfilingMode::None,
            scenes: Vec::new(),
            eye: default_eye(),
            target: [0.0; 3],
            up: default_up(),
        }
    }
}

impl RendererConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text, path)
    }

    /// Load from a file when given, otherwise use defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.near > 0.0) {
            return Err(ConfigError::Invalid(format!("near must be positive, got {}", self.near)));
        }
        if self.far <= self.near {
            return Err(ConfigError::Invalid(format!(
                "far ({}) must be greater than near ({})",
                self.far, self.near
            )));
        }
        if !(self.fov_degrees > 0.0 && self.fov_degrees < 180.0) {
            return Err(ConfigError::Invalid(format!(
                "fov_degrees must be in (0, 180), got {}",
                self.fov_degrees
            )));
        }
        Ok(())
    }

    pub fn fov_radians(&self) -> f32 {
        self.fov_degrees.to_radians()
    }

    /// Camera at `eye` looking at `target`.
    pub fn initial_camera(&self) -> Camera {
        Camera::look_at(
            Vector3::from(self.eye),
            Vector3::from(self.target),
            Vector3::from(self.up),
            self.fov_radians(),
            self.near,
            self.far,
        )
    }

    pub fn composite_settings(&self) -> CompositeSettings {
        CompositeSettings {
            half_resolution: self.half_resolution,
            background: self.background,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let c = RendererConfig::from_toml_str("", Path::new("test.toml")).unwrap();
        assert_eq!(c.fov_degrees, 45.0);
        assert_eq!(c.near, 0.2);
        assert_eq!(c.far, 1000.0);
        assert!(c.enable_gui);
        assert!(!c.half_resolution);
        assert_eq!(c.profiling, ProfilingMode::None);
    }

    #[test]
    fn test_overrides() {
        let text = r#"
            half_resolution = true
            profiling = "fps"
            background = [1.0, 1.0, 1.0]
            scenes = ["a.ply", "b.ply"]
        "#;
        let c = RendererConfig::from_toml_str(text, Path::new("test.toml")).unwrap();
        assert!(c.half_resolution);
        assert_eq!(c.profiling, ProfilingMode::Fps);
        assert_eq!(c.background, [1.0; 3]);
        assert_eq!(c.scenes.len(), 2);
    }

    #[test]
    fn test_rejects_bad_planes() {
        let err = RendererConfig::from_toml_str("near = 5.0\nfar = 1.0", Path::new("x.toml"));
        assert!(matches!(err, Err(ConfigError::Invalid(_))));
        let err = RendererConfig::from_toml_str("near = 0.0", Path::new("x.toml"));
        assert!(matches!(err, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_parse_error_names_file() {
        let err = RendererConfig::from_toml_str("near = \"x\"", Path::new("bad.toml")).unwrap_err();
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn test_initial_camera_looks_at_target() {
        let cam = RendererConfig::default().initial_camera();
        let u = cam.frame_uniforms(64, 64);
        let p = u.view_matrix() * nalgebra::Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert!(p.x.abs() < 1e-5);
        assert!(p.y.abs() < 1e-5);
        assert!((p.z - 5.0).abs() < 1e-4);
    }
}
