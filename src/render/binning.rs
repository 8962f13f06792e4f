//! Tile range resolution, host mirror of `tile_boundary.wgsl`.

use crate::core::{key_tile, TileRange};

/// Clear `ranges`, then mark where each tile's run of sorted keys starts
/// and ends.
pub fn identify_tile_ranges(sorted_keys: &[u64], ranges: &mut [TileRange]) {
    ranges.fill(TileRange::default());
    let n = sorted_keys.len();

    for p in 0..n {
        let tile = key_tile(sorted_keys[p]) as usize;
        if tile >= ranges.len() {
            continue;
        }
        if p == 0 || key_tile(sorted_keys[p - 1]) as usize != tile {
            ranges[tile].start = p as u32;
        }
        if p + 1 == n || key_tile(sorted_keys[p + 1]) as usize != tile {
            ranges[tile].end = p as u32 + 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::composite_key;

    #[test]
    fn test_ranges_partition_sorted_keys() {
        let keys: Vec<u64> = [(0, 1.0), (0, 2.0), (2, 1.0), (3, 0.5), (3, 0.7), (3, 0.9)]
            .iter()
            .map(|&(t, d)| composite_key(t, d))
            .collect();
        let mut ranges = vec![TileRange { start: 9, end: 9 }; 5];
        identify_tile_ranges(&keys, &mut ranges);
        assert_eq!(ranges[0], TileRange { start: 0, end: 2 });
        assert_eq!(ranges[1], TileRange::default());
        assert_eq!(ranges[2], TileRange { start: 2, end: 3 });
        assert_eq!(ranges[3], TileRange { start: 3, end: 6 });
        assert_eq!(ranges[4], TileRange::default());
    }

    #[test]
    fn test_empty_input_clears() {
        let mut ranges = vec![TileRange { start: 1, end: 4 }; 3];
        identify_tile_ranges(&[], &mut ranges);
        assert!(ranges.iter().all(TileRange::is_empty));
    }
}
