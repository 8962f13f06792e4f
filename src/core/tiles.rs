//! Tile grid, composite sort keys, and pass planning for scan and sort.

use serde::{Deserialize, Serialize};

/// Edge length of a screen tile in pixels.
pub const TILE_SIZE: u32 = 16;

/// Radix digit width used by the sorter.
pub const RADIX_BITS: u32 = 8;

/// Number of buckets per radix digit.
pub const RADIX_BUCKETS: u32 = 1 << RADIX_BITS;

/// Screen tiling for one viewport size.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileGrid {
    pub width: u32,
    pub height: u32,
    pub tiles_x: u32,
    pub tiles_y: u32,
}

impl TileGrid {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            tiles_x: width.div_ceil(TILE_SIZE),
            tiles_y: height.div_ceil(TILE_SIZE),
        }
    }

    pub fn num_tiles(&self) -> u32 {
        self.tiles_x * self.tiles_y
    }

    /// Row-major tile id.
    pub fn tile_id(&self, tx: u32, ty: u32) -> u32 {
        ty * self.tiles_x + tx
    }

    /// Tile containing a pixel.
    pub fn tile_of_pixel(&self, x: u32, y: u32) -> u32 {
        self.tile_id(x / TILE_SIZE, y / TILE_SIZE)
    }

    /// Bits needed to represent the largest tile id.
    pub fn tile_bits(&self) -> u32 {
        let max_id = self.num_tiles().saturating_sub(1);
        u32::BITS - max_id.leading_zeros()
    }
}

/// Pack a (tile, depth) pair into one 64-bit key.
///
/// Depth is positive for every visible splat, so its IEEE-754 bit pattern
/// orders the same way as the float value.
pub fn composite_key(tile_id: u32, depth: f32) -> u64 {
    ((tile_id as u64) << 32) | depth.to_bits() as u64
}

pub fn key_tile(key: u64) -> u32 {
    (key >> 32) as u32
}

pub fn key_depth(key: u64) -> f32 {
    f32::from_bits(key as u32)
}

/// Passes needed to sort composite keys for a given tile grid.
///
/// The low word (depth bits) always takes four 8-bit passes. The high word
/// only needs enough passes to cover the bits of the largest tile id.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SortPlan {
    pub passes: u32,
}

impl SortPlan {
    pub fn for_grid(grid: &TileGrid) -> Self {
        let depth_passes = 32 / RADIX_BITS;
        let tile_passes = grid.tile_bits().div_ceil(RADIX_BITS);
        Self {
            passes: depth_passes + tile_passes,
        }
    }

    /// Bit shift of the digit handled in `pass`, counted across the full
    /// 64-bit key.
    pub fn shift(pass: u32) -> u32 {
        pass * RADIX_BITS
    }

    /// Whether the sorted result ends up in the alternate buffer.
    pub fn result_in_alternate(&self) -> bool {
        self.passes % 2 == 1
    }
}

/// Passes of the doubling prefix scan over `n` elements.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ScanPlan {
    /// Hillis-Steele doubling passes: `ceil(log2(n))`.
    pub doubling_passes: u32,
}

impl ScanPlan {
    pub fn new(n: u32) -> Self {
        let doubling_passes = if n <= 1 {
            0
        } else {
            u32::BITS - (n - 1).leading_zeros()
        };
        Self { doubling_passes }
    }

    /// Doubling passes plus the final shift to exclusive form.
    pub fn total_passes(&self) -> u32 {
        self.doubling_passes + 1
    }

    /// Stride of doubling pass `t`.
    pub fn stride(pass: u32) -> u32 {
        1 << pass
    }

    /// After the doubling passes, the inclusive scan sits in the alternate
    /// buffer when the pass count is odd. The shift pass then writes to the
    /// other one.
    pub fn inclusive_in_alternate(&self) -> bool {
        self.doubling_passes % 2 == 1
    }

    pub fn result_in_alternate(&self) -> bool {
        !self.inclusive_in_alternate()
    }
}
