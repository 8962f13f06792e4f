//! Instance expansion, host mirror of `expand_keys.wgsl`.

use crate::core::{composite_key, ScreenAttributes, TileGrid};
use crate::frame::FrameError;

/// Write one `(key, splat index)` pair per covered tile.
///
/// Splat `i` writes to `offsets[i]..offsets[i] + tile_count`, walking its
/// tile rectangle row by row. Fails if the scan total does not fit the
/// provided buffers.
pub fn expand_keys(
    attributes: &[ScreenAttributes],
    offsets: &[u32],
    total: u32,
    grid: &TileGrid,
    keys: &mut [u64],
    values: &mut [u32],
) -> Result<(), FrameError> {
    let capacity = keys.len().min(values.len()) as u64;
    if total as u64 > capacity {
        return Err(FrameError::CapacityExceeded {
            required: total as u64,
            limit: capacity,
        });
    }

    for (i, (s, &offset)) in attributes.iter().zip(offsets).enumerate() {
        if s.tile_count() == 0 {
            continue;
        }
        let [x0, y0, x1, y1] = s.aabb;
        let mut slot = offset as usize;
        for ty in y0..y1 {
            for tx in x0..x1 {
                keys[slot] = composite_key(grid.tile_id(tx, ty), s.depth);
                values[slot] = i as u32;
                slot += 1;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{key_depth, key_tile};

    #[test]
    fn test_row_major_within_rect() {
        let grid = TileGrid::new(64, 64);
        let s = ScreenAttributes {
            aabb: [1, 2, 3, 4],
            depth: 2.5,
            ..Default::default()
        };
        let mut keys = vec![0u64; 4];
        let mut values = vec![0u32; 4];
        expand_keys(&[s], &[0], 4, &grid, &mut keys, &mut values).unwrap();
        let tiles: Vec<u32> = keys.iter().map(|&k| key_tile(k)).collect();
        assert_eq!(tiles, vec![9, 10, 13, 14]);
        assert!(keys.iter().all(|&k| key_depth(k) == 2.5));
        assert_eq!(values, vec![0; 4]);
    }

    #[test]
    fn test_rejects_total_beyond_capacity() {
        let grid = TileGrid::new(16, 16);
        let mut keys = vec![0u64; 2];
        let mut values = vec![0u32; 2];
        let err = expand_keys(&[], &[], 3, &grid, &mut keys, &mut values);
        assert!(matches!(err, Err(FrameError::CapacityExceeded { required: 3, limit: 2 })));
    }
}
