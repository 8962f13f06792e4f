//! Front-to-back tile compositing, host mirror of `composite.wgsl`.

use image::RgbaImage;
use rayon::prelude::*;

use crate::core::{ScreenAttributes, TileGrid, TileRange};
use crate::frame::CompositeSettings;

/// Contributions weaker than this are skipped.
pub const MIN_ALPHA: f32 = 1.0 / 255.0;
/// Per-splat alpha cap.
pub const MAX_ALPHA: f32 = 0.99;
/// Stop once transmittance would drop below this.
pub const MIN_TRANSMITTANCE: f32 = 1e-4;

/// Blend one pixel's tile range front to back over `background`.
pub fn shade_pixel(
    px: u32,
    py: u32,
    range: TileRange,
    sorted_values: &[u32],
    attributes: &[ScreenAttributes],
    background: [f32; 3],
) -> [f32; 3] {
    let mut t = 1.0f32;
    let mut c = [0.0f32; 3];

    for idx in range.start..range.end {
        let s = &attributes[sorted_values[idx as usize] as usize];
        let dx = s.uv[0] - px as f32;
        let dy = s.uv[1] - py as f32;
        let [ca, cb, cc] = s.conic();
        let power = -0.5 * (ca * dx * dx + cc * dy * dy) - cb * dx * dy;
        if power > 0.0 {
            continue;
        }

        let alpha = (s.opacity() * power.exp()).min(MAX_ALPHA);
        if alpha < MIN_ALPHA {
            continue;
        }
        let test_t = t * (1.0 - alpha);
        if test_t < MIN_TRANSMITTANCE {
            break;
        }

        let color = s.color();
        for ch in 0..3 {
            c[ch] += color[ch] * alpha * t;
        }
        t = test_t;
    }

    [
        c[0] + t * background[0],
        c[1] + t * background[1],
        c[2] + t * background[2],
    ]
}

fn to_unorm8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Composite every pixel of `out`. In half-resolution mode the top-left
/// pixel of each 2×2 block is shaded and copied to the whole block.
pub fn composite(
    attributes: &[ScreenAttributes],
    sorted_values: &[u32],
    ranges: &[TileRange],
    grid: &TileGrid,
    settings: &CompositeSettings,
    out: &mut RgbaImage,
) {
    let width = out.width().min(grid.width);
    let row_bytes = out.width() as usize * 4;
    let rows = out.height().min(grid.height) as usize;
    let buf: &mut [u8] = &mut *out;

    buf.par_chunks_mut(row_bytes)
        .take(rows)
        .enumerate()
        .for_each(|(y, row)| {
            let y = y as u32;
            let sy = if settings.half_resolution { y & !1 } else { y };
            for x in 0..width {
                let sx = if settings.half_resolution { x & !1 } else { x };
                let range = ranges[grid.tile_of_pixel(sx, sy) as usize];
                let rgb = shade_pixel(sx, sy, range, sorted_values, attributes, settings.background);
                let o = x as usize * 4;
                row[o] = to_unorm8(rgb[0]);
                row[o + 1] = to_unorm8(rgb[1]);
                row[o + 2] = to_unorm8(rgb[2]);
                row[o + 3] = 255;
            }
        });
}
