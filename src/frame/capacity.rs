//! Instance buffer sizing.
//!
//! Capacity is `num_primitives × multiplier`. The multiplier starts at 1,
//! only grows, and resets when a new scene is loaded.

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CapacityPolicy {
    num_primitives: u64,
    multiplier: u64,
}

impl CapacityPolicy {
    pub fn new(num_primitives: usize) -> Self {
        Self {
            num_primitives: num_primitives as u64,
            multiplier: 1,
        }
    }

    pub fn multiplier(&self) -> u64 {
        self.multiplier
    }

    pub fn num_primitives(&self) -> u64 {
        self.num_primitives
    }

    /// Number of instance slots currently allocated. An empty scene still
    /// reserves one slot so buffers are never zero-sized.
    pub fn capacity(&self) -> u64 {
        (self.num_primitives * self.multiplier).max(1)
    }

    pub fn fits(&self, instances: u32) -> bool {
        instances as u64 <= self.capacity()
    }

    /// Smallest multiplier with `num_primitives × m ≥ instances`, never
    /// below the current one.
    pub fn required_multiplier(&self, instances: u32) -> u64 {
        if self.num_primitives == 0 {
            return self.multiplier;
        }
        (instances as u64)
            .div_ceil(self.num_primitives)
            .max(self.multiplier)
    }

    /// Grow to fit `instances`. Returns the new capacity when it changed.
    pub fn grow_to(&mut self, instances: u32) -> Option<u64> {
        let m = self.required_multiplier(instances);
        if m == self.multiplier {
            return None;
        }
        self.multiplier = m;
        Some(self.capacity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_capacity_matches_primitives() {
        let p = CapacityPolicy::new(100);
        assert_eq!(p.multiplier(), 1);
        assert_eq!(p.capacity(), 100);
        assert!(p.fits(100));
        assert!(!p.fits(101));
    }

    #[test]
    fn test_growth_is_minimal() {
        let mut p = CapacityPolicy::new(100);
        assert_eq!(p.grow_to(300), Some(300));
        assert_eq!(p.multiplier(), 3);
        assert_eq!(p.grow_to(300), None);
        assert_eq!(p.grow_to(301), Some(400));
    }

    #[test]
    fn test_growth_is_monotonic() {
        let mut p = CapacityPolicy::new(10);
        p.grow_to(55);
        assert_eq!(p.multiplier(), 6);
        assert_eq!(p.grow_to(5), None);
        assert_eq!(p.multiplier(), 6);
    }

    #[test]
    fn test_empty_scene() {
        let mut p = CapacityPolicy::new(0);
        assert_eq!(p.capacity(), 1);
        assert!(p.fits(0));
        assert_eq!(p.grow_to(0), None);
    }
}
