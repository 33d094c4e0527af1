//! Arena configuration parameters.

use tessera_core::{ArrayError, MAX_RANK};

/// Configuration for an [`ArrayArena`](crate::ArrayArena).
///
/// Validated at construction; immutable afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Maximum nesting of `attach` on a single view.
    ///
    /// Default: 64. Exceeding it fails with `Reentrancy`, which catches
    /// runaway recursion and leaked guards. Must be at least 1.
    pub max_attach_depth: usize,

    /// Maximum array rank accepted by constructors.
    ///
    /// Default: 16. Must be in `[1, 16]`.
    pub max_rank: usize,
}

impl ArenaConfig {
    /// Default attach nesting limit.
    pub const DEFAULT_MAX_ATTACH_DEPTH: usize = 64;

    /// Default (and largest) supported rank.
    pub const DEFAULT_MAX_RANK: usize = MAX_RANK;

    /// Check the documented invariants.
    pub fn validate(&self) -> Result<(), ArrayError> {
        if self.max_attach_depth == 0 {
            return Err(ArrayError::InvalidConfig {
                reason: "max_attach_depth must be at least 1".into(),
            });
        }
        if self.max_rank == 0 || self.max_rank > MAX_RANK {
            return Err(ArrayError::InvalidConfig {
                reason: format!("max_rank must be in [1, {MAX_RANK}], got {}", self.max_rank),
            });
        }
        Ok(())
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            max_attach_depth: Self::DEFAULT_MAX_ATTACH_DEPTH,
            max_rank: Self::DEFAULT_MAX_RANK,
        }
    }
}
