//! Cumulative counters for the materialization protocol.
//!
//! [`ArenaMetrics`] is a plain snapshot; the arena keeps the live counters
//! and copies them out on [`ArrayArena::metrics`](crate::ArrayArena::metrics).

/// Counters accumulated since the arena was created.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArenaMetrics {
    /// Outermost (0→1) attaches performed on views.
    pub attaches: u64,
    /// Gather passes (attach and `copy_into`).
    pub gathers: u64,
    /// Scatter passes (sync and `sync_from`).
    pub scatters: u64,
    /// Bytes copied out of parents by gathers.
    pub bytes_gathered: u64,
    /// Bytes copied into parents by scatters.
    pub bytes_scattered: u64,
    /// Masks materialized, including lazily mirrored view masks.
    pub masks_created: u64,
    /// Arrays currently alive in the arena (masks included).
    pub live_arrays: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metrics_are_zero() {
        let m = ArenaMetrics::default();
        assert_eq!(m.attaches, 0);
        assert_eq!(m.gathers, 0);
        assert_eq!(m.scatters, 0);
        assert_eq!(m.bytes_gathered, 0);
        assert_eq!(m.bytes_scattered, 0);
        assert_eq!(m.masks_created, 0);
        assert_eq!(m.live_arrays, 0);
    }
}
