//! Per-run metrics for the iteration engine.

/// Counters for a single kernel run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KernelMetrics {
    /// Kernel calls made.
    pub iterations: u64,
    /// Indices skipped because the combined mask was set there.
    pub masked_skips: u64,
    /// Worker threads the loop ran on (1 = sequential).
    pub workers: usize,
    /// Wall-clock time of the whole run, in microseconds.
    pub elapsed_us: u64,
}

impl KernelMetrics {
    pub(crate) fn absorb(&mut self, other: &RangeStats) {
        self.iterations += other.iterations;
        self.masked_skips += other.masked_skips;
    }
}

/// Counters of one contiguous index range.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct RangeStats {
    pub(crate) iterations: u64,
    pub(crate) masked_skips: u64,
}

impl RangeStats {
    /// Counters of two disjoint ranges together.
    pub(crate) fn merged(self, other: Self) -> Self {
        Self {
            iterations: self.iterations + other.iterations,
            masked_skips: self.masked_skips + other.masked_skips,
        }
    }
}
