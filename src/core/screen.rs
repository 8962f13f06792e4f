//! Per-frame screen-space records shared by the CPU and GPU pipelines.

/// Projected attributes of one splat for the current frame.
///
/// Layout matches `ScreenAttributes` in the WGSL shaders. A culled splat is
/// all zeros.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ScreenAttributes {
    /// Inverse 2D covariance `(a, b, c)` and opacity.
    pub conic_opacity: [f32; 4],
    /// RGB color and pixel radius.
    pub color_radius: [f32; 4],
    /// Tile rectangle `[min_x, min_y, max_x, max_y)`.
    pub aabb: [u32; 4],
    /// Pixel-space center.
    pub uv: [f32; 2],
    /// View-space depth.
    pub depth: f32,
    pub _pad: f32,
}

impl ScreenAttributes {
    pub fn conic(&self) -> [f32; 3] {
        [self.conic_opacity[0], self.conic_opacity[1], self.conic_opacity[2]]
    }

    pub fn opacity(&self) -> f32 {
        self.conic_opacity[3]
    }

    pub fn color(&self) -> [f32; 3] {
        [self.color_radius[0], self.color_radius[1], self.color_radius[2]]
    }

    pub fn radius(&self) -> f32 {
        self.color_radius[3]
    }

    /// Tiles covered by the rectangle.
    pub fn tile_count(&self) -> u32 {
        let [x0, y0, x1, y1] = self.aabb;
        x1.saturating_sub(x0) * y1.saturating_sub(y0)
    }
}

/// Half-open range of sorted instance indices belonging to one tile.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TileRange {
    pub start: u32,
    pub end: u32,
}

impl TileRange {
    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layouts() {
        assert_eq!(std::mem::size_of::<ScreenAttributes>(), 64);
        assert_eq!(std::mem::size_of::<TileRange>(), 8);
    }

    #[test]
    fn test_tile_count_of_culled_is_zero() {
        assert_eq!(ScreenAttributes::default().tile_count(), 0);
        let s = ScreenAttributes {
            aabb: [1, 2, 4, 3],
            ..Default::default()
        };
        assert_eq!(s.tile_count(), 3);
    }
}
