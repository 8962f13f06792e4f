//! Exclusive prefix scan, host mirror of `prefix_sum.wgsl`.
//!
//! Runs the same ping-pong schedule as the GPU: `ceil(log2 n)` doubling
//! passes build the inclusive scan, then one shift pass writes the
//! exclusive offsets with the total appended at index `n`.

use crate::core::ScanPlan;
use crate::frame::FrameError;

/// Offsets for each element plus the total.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanResult {
    /// `offsets[i] = Σ counts[..i]`, length `n`.
    pub offsets: Vec<u32>,
    pub total: u32,
}

/// Exclusive scan of `counts` using the doubling schedule.
///
/// Fails with [`FrameError::CapacityExceeded`] when the total does not fit
/// in a `u32`.
pub fn exclusive_scan(counts: &[u32]) -> Result<ScanResult, FrameError> {
    let n = counts.len();
    if n == 0 {
        return Ok(ScanResult::default());
    }

    let plan = ScanPlan::new(n as u32);
    let mut ping: Vec<u32> = counts.to_vec();
    ping.push(0);
    let mut pong = vec![0u32; n + 1];

    for pass in 0..plan.doubling_passes {
        let stride = ScanPlan::stride(pass) as usize;
        for i in 0..n {
            pong[i] = if i >= stride {
                // Partial sums never exceed the total, so any overflow here
                // means the total overflows.
                match ping[i].checked_add(ping[i - stride]) {
                    Some(sum) => sum,
                    None => return Err(overflow(counts)),
                }
            } else {
                ping[i]
            };
        }
        std::mem::swap(&mut ping, &mut pong);
    }

    // Shift pass: inclusive -> exclusive, total at the end.
    for i in 0..=n {
        pong[i] = if i == 0 { 0 } else { ping[i - 1] };
    }

    let total = pong[n];
    pong.truncate(n);
    Ok(ScanResult {
        offsets: pong,
        total,
    })
}

fn overflow(counts: &[u32]) -> FrameError {
    FrameError::CapacityExceeded {
        required: counts.iter().map(|&c| c as u64).sum(),
        limit: u32::MAX as u64,
    }
}
