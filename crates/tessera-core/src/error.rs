//! Error taxonomy for the Tessera array engine.
//!
//! Every fallible operation in the workspace returns [`ArrayError`]. All
//! variants are fatal to the current call: the core performs no retry and
//! no partial recovery. Masked input is never an error.

use std::error::Error;
use std::fmt;

use crate::element::ElementKind;
use crate::id::{ArrayId, KindTag};

/// Errors raised by array construction, access, materialization and
/// kernel dispatch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArrayError {
    /// Operand element counts or shapes disagree outside broadcast rules.
    ShapeMismatch {
        /// The extent (or element count) that was required.
        expected: usize,
        /// The extent (or element count) that was supplied.
        received: usize,
    },
    /// Rank outside `[1, max_rank]`, or an index with the wrong number of axes.
    RankOutOfRange {
        /// The offending rank.
        rank: usize,
        /// Maximum rank accepted.
        max: usize,
    },
    /// Store or sync on a read-only array (or through a read-only ancestor).
    ReadOnly {
        /// The array that refused the write.
        array: ArrayId,
    },
    /// Index outside `[0, dim)` after negative-index normalization.
    OutOfBounds {
        /// The offending (signed) index.
        index: i64,
        /// The axis being indexed.
        axis: usize,
        /// Extent of that axis.
        dim: usize,
    },
    /// A view kind does not provide an operation the dispatcher needs.
    KindContract {
        /// The kind at fault.
        kind: KindTag,
        /// Which operation was missing or refused.
        operation: &'static str,
    },
    /// Unbalanced attach/detach, or attach nesting beyond the configured depth.
    Reentrancy {
        /// The array whose attach counter was violated.
        array: ArrayId,
        /// Description of the violation.
        reason: String,
    },
    /// The element kind does not support the requested operation.
    UnsupportedElement {
        /// The element kind in question.
        kind: ElementKind,
        /// The operation that was attempted.
        operation: &'static str,
    },
    /// A mask was requested on a mask array or a value-only projection.
    MaskForbidden {
        /// The array that may not carry a mask.
        array: ArrayId,
    },
    /// A handle whose slot has been released and possibly reused.
    StaleHandle {
        /// The stale handle.
        array: ArrayId,
    },
    /// Release refused because views still reference the array.
    InUse {
        /// The array that is still referenced.
        array: ArrayId,
        /// Number of live dependants.
        dependants: usize,
    },
    /// A contiguous-access operation was called on a detached array.
    NotAttached {
        /// The detached array.
        array: ArrayId,
    },
    /// The same array was passed as more than one written kernel operand.
    AliasedOutput {
        /// The aliased array.
        array: ArrayId,
    },
    /// A configuration value violates its documented invariant.
    InvalidConfig {
        /// Description of the invalid value.
        reason: String,
    },
    /// A host callback (Object view) reported a failure.
    Callback {
        /// Description supplied by the callback.
        reason: String,
    },
}

impl fmt::Display for ArrayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShapeMismatch { expected, received } => {
                write!(f, "shape mismatch: expected {expected}, received {received}")
            }
            Self::RankOutOfRange { rank, max } => {
                write!(f, "rank {rank} out of range [1, {max}]")
            }
            Self::ReadOnly { array } => write!(f, "array {array} is read-only"),
            Self::OutOfBounds { index, axis, dim } => {
                write!(f, "index {index} out of bounds for axis {axis} with extent {dim}")
            }
            Self::KindContract { kind, operation } => {
                write!(f, "kind {kind} does not support {operation}")
            }
            Self::Reentrancy { array, reason } => {
                write!(f, "attach protocol violated on array {array}: {reason}")
            }
            Self::UnsupportedElement { kind, operation } => {
                write!(f, "element kind {kind} does not support {operation}")
            }
            Self::MaskForbidden { array } => {
                write!(f, "array {array} may not carry a mask")
            }
            Self::StaleHandle { array } => write!(f, "stale array handle {array}"),
            Self::InUse { array, dependants } => {
                write!(f, "array {array} is still referenced by {dependants} view(s)")
            }
            Self::NotAttached { array } => write!(f, "array {array} is not attached"),
            Self::AliasedOutput { array } => {
                write!(f, "array {array} is written by more than one operand")
            }
            Self::InvalidConfig { reason } => write!(f, "invalid config: {reason}"),
            Self::Callback { reason } => write!(f, "callback failed: {reason}"),
        }
    }
}

impl Error for ArrayError {}

/// Convenience alias used throughout the workspace.
pub type Result<T, E = ArrayError> = std::result::Result<T, E>;
