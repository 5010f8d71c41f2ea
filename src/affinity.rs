//! Core affinity masks
//!
//! Controls which emulated CPU cores a thread is eligible to run on.

/// Maximum number of emulated cores a mask can describe.
pub const MAX_CORES: usize = 64;

/// Bitmask of emulated cores (one bit per core, up to [`MAX_CORES`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreMask(u64);

impl CoreMask {
    /// Create empty mask.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Create mask allowing all cores.
    pub const fn all() -> Self {
        Self(u64::MAX)
    }

    /// Create mask for a single core.
    pub const fn single(core: usize) -> Self {
        Self(1 << (core & (MAX_CORES - 1)))
    }

    /// Rebuild a mask from its raw bit representation.
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Raw bit representation.
    pub const fn bits(&self) -> u64 {
        self.0
    }

    /// Set a core bit.
    pub fn set(&mut self, core: usize) {
        self.0 |= 1 << (core & (MAX_CORES - 1));
    }

    /// Clear a core bit.
    pub fn clear(&mut self, core: usize) {
        self.0 &= !(1 << (core & (MAX_CORES - 1)));
    }

    /// Check whether a core is in the mask.
    pub const fn contains(&self, core: usize) -> bool {
        (self.0 & (1 << (core & (MAX_CORES - 1)))) != 0
    }

    /// Number of cores in the mask.
    pub const fn count(&self) -> u32 {
        self.0.count_ones()
    }

    /// Check if no core is allowed.
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Lowest-numbered core in the mask.
    pub fn first(&self) -> Option<usize> {
        if self.0 == 0 {
            None
        } else {
            Some(self.0.trailing_zeros() as usize)
        }
    }

    /// Intersection with another mask.
    pub const fn intersect(&self, other: &Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Union with another mask.
    pub const fn union(&self, other: &Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl Default for CoreMask {
    fn default() -> Self {
        Self::all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_core_mask() {
        let mask = CoreMask::single(2);
        assert!(mask.contains(2));
        assert!(!mask.contains(0));
        assert_eq!(mask.count(), 1);
        assert_eq!(mask.first(), Some(2));
    }

    #[test]
    fn set_and_clear() {
        let mut mask = CoreMask::empty();
        assert!(mask.is_empty());
        mask.set(0);
        mask.set(3);
        assert_eq!(mask.count(), 2);
        mask.clear(0);
        assert!(!mask.contains(0));
        assert_eq!(mask.first(), Some(3));
    }

    #[test]
    fn all_contains_every_core() {
        let mask = CoreMask::all();
        for core in 0..MAX_CORES {
            assert!(mask.contains(core));
        }
    }

    #[test]
    fn intersect_and_union() {
        let a = CoreMask::single(1).union(&CoreMask::single(2));
        let b = CoreMask::single(2).union(&CoreMask::single(3));
        assert_eq!(a.intersect(&b), CoreMask::single(2));
        assert_eq!(a.union(&b).count(), 3);
    }
}
