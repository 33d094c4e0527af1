//! Engine configuration.

use tessera_core::ArrayError;

/// Configuration for an [`Engine`](crate::Engine).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Number of worker threads for data-parallel loops. `None` = run on
    /// rayon's global pool (its thread count, clamped to `[1, 16]`);
    /// `Some(n)` with `n > 1` gives the engine a dedicated pool.
    pub worker_count: Option<usize>,
    /// Minimum iteration length before a loop is split across workers.
    /// Default: 65 536. Must be at least 1.
    pub parallel_threshold: usize,
}

impl EngineConfig {
    /// Default [`parallel_threshold`](Self::parallel_threshold).
    pub const DEFAULT_PARALLEL_THRESHOLD: usize = 65_536;

    /// Resolve the actual worker count, applying auto-detection if `None`.
    ///
    /// Explicit values are clamped to `[1, 64]`.
    pub fn resolved_worker_count(&self) -> usize {
        match self.worker_count {
            Some(n) => n.clamp(1, 64),
            None => rayon::current_num_threads().clamp(1, 16),
        }
    }

    /// Check the documented invariants.
    pub fn validate(&self) -> Result<(), ArrayError> {
        if self.worker_count == Some(0) {
            return Err(ArrayError::InvalidConfig {
                reason: "worker_count must be at least 1".into(),
            });
        }
        if self.parallel_threshold == 0 {
            return Err(ArrayError::InvalidConfig {
                reason: "parallel_threshold must be at least 1".into(),
            });
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_count: None,
            parallel_threshold: Self::DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = EngineConfig::default();
        assert_eq!(config.parallel_threshold, 65_536);
        assert!(config.validate().is_ok());
        let workers = config.resolved_worker_count();
        assert!((1..=16).contains(&workers));
    }

    #[test]
    fn explicit_workers_are_clamped() {
        let config = EngineConfig {
            worker_count: Some(500),
            ..EngineConfig::default()
        };
        assert_eq!(config.resolved_worker_count(), 64);
    }

    #[test]
    fn zero_values_rejected() {
        let zero_workers = EngineConfig {
            worker_count: Some(0),
            ..EngineConfig::default()
        };
        assert!(matches!(
            zero_workers.validate(),
            Err(ArrayError::InvalidConfig { .. })
        ));
        let zero_threshold = EngineConfig {
            parallel_threshold: 0,
            ..EngineConfig::default()
        };
        assert!(zero_threshold.validate().is_err());
    }
}
