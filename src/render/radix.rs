//! LSD radix sort of composite keys, host mirror of the `radix_*.wgsl`
//! passes.
//!
//! Each pass runs the same three steps as the GPU: per-block digit
//! histograms stored digit-major, a global exclusive scan over that table,
//! and a stable scatter into the other buffer.

use crate::core::{tiles::RADIX_BUCKETS, SortPlan};

/// Entries handled by one histogram / scatter block.
pub const BLOCK_SIZE: usize = 256;

/// Double-buffered key/value storage.
#[derive(Clone, Debug, Default)]
pub struct SortBuffers {
    pub keys: [Vec<u64>; 2],
    pub values: [Vec<u32>; 2],
    /// `hist[digit * num_blocks + block]`.
    pub histogram: Vec<u32>,
}

impl SortBuffers {
    pub fn with_capacity(capacity: usize) -> Self {
        let blocks = capacity.div_ceil(BLOCK_SIZE).max(1);
        Self {
            keys: [vec![0; capacity], vec![0; capacity]],
            values: [vec![0; capacity], vec![0; capacity]],
            histogram: vec![0; blocks * RADIX_BUCKETS as usize],
        }
    }

    pub fn capacity(&self) -> usize {
        self.keys[0].len()
    }
}

fn digit(key: u64, pass: u32) -> usize {
    ((key >> SortPlan::shift(pass)) & (RADIX_BUCKETS as u64 - 1)) as usize
}

/// Sort the first `count` entries of buffer 0. Returns the index of the
/// buffer holding the result: the parity of `plan.passes`, or 0 when there
/// is nothing to reorder.
pub fn radix_sort(buffers: &mut SortBuffers, count: usize, plan: &SortPlan) -> usize {
    if count <= 1 {
        return 0;
    }
    let buckets = RADIX_BUCKETS as usize;
    let num_blocks = count.div_ceil(BLOCK_SIZE).max(1);
    let mut src = 0usize;

    for pass in 0..plan.passes {
        let dst = 1 - src;
        let hist = &mut buffers.histogram[..num_blocks * buckets];
        hist.fill(0);

        for i in 0..count {
            let d = digit(buffers.keys[src][i], pass);
            hist[d * num_blocks + i / BLOCK_SIZE] += 1;
        }

        // Digit-major exclusive scan gives each (digit, block) its base.
        let mut running = 0u32;
        for h in hist.iter_mut() {
            let c = *h;
            *h = running;
            running += c;
        }

        let (keys_src, keys_dst) = split_pair(&mut buffers.keys, src);
        let (vals_src, vals_dst) = split_pair(&mut buffers.values, src);
        for i in 0..count {
            let key = keys_src[i];
            let d = digit(key, pass);
            let slot = &mut hist[d * num_blocks + i / BLOCK_SIZE];
            let dest = *slot as usize;
            *slot += 1;
            keys_dst[dest] = key;
            vals_dst[dest] = vals_src[i];
        }

        src = dst;
    }
    src
}

fn split_pair<T>(pair: &mut [Vec<T>; 2], src: usize) -> (&[T], &mut [T]) {
    let (a, b) = pair.split_at_mut(1);
    if src == 0 {
        (&a[0], &mut b[0])
    } else {
        (&b[0], &mut a[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{composite_key, TileGrid};

    #[test]
    fn test_sorts_and_keeps_values_paired() {
        let grid = TileGrid::new(64, 64);
        let plan = SortPlan::for_grid(&grid);
        let input: Vec<(u64, u32)> = (0..1000u32)
            .map(|i| {
                let tile = (i * 37) % grid.num_tiles();
                let depth = 0.5 + ((i * 7919) % 1000) as f32 * 0.01;
                (composite_key(tile, depth), i)
            })
            .collect();

        let mut buffers = SortBuffers::with_capacity(1200);
        for (i, &(k, v)) in input.iter().enumerate() {
            buffers.keys[0][i] = k;
            buffers.values[0][i] = v;
        }

        let out = radix_sort(&mut buffers, input.len(), &plan);
        assert_eq!(out, plan.passes as usize % 2);

        let mut expected = input.clone();
        expected.sort_by_key(|&(k, _)| k);
        let got: Vec<(u64, u32)> = (0..input.len())
            .map(|i| (buffers.keys[out][i], buffers.values[out][i]))
            .collect();
        // Stable: equal keys keep input order, same as the std stable sort.
        assert_eq!(got, expected);
    }

    #[test]
    fn test_trivial_counts_stay_in_first_buffer() {
        let plan = SortPlan { passes: 5 };
        let mut buffers = SortBuffers::with_capacity(4);
        assert_eq!(radix_sort(&mut buffers, 0, &plan), 0);

        buffers.keys[0][0] = composite_key(3, 1.5);
        buffers.values[0][0] = 7;
        assert_eq!(radix_sort(&mut buffers, 1, &plan), 0);
        assert_eq!(buffers.keys[0][0], composite_key(3, 1.5));
        assert_eq!(buffers.values[0][0], 7);
    }
}
