//! Header checks shared by the view kinds.

use tessera_arena::MapContext;
use tessera_core::shape::normalize_index;
use tessera_core::{ArrayError, ElementType};

/// The view must use its parent's element type (plain copies only).
pub(crate) fn same_element(ctx: &MapContext<'_>) -> Result<(), ArrayError> {
    match ctx.parent_elem {
        Some(parent) if parent != ctx.elem => Err(ArrayError::UnsupportedElement {
            kind: ctx.elem.kind(),
            operation: "a view element type different from its parent's",
        }),
        _ => Ok(()),
    }
}

/// The parent must have exactly `rank` axes.
pub(crate) fn parent_rank(ctx: &MapContext<'_>, rank: usize) -> Result<(), ArrayError> {
    if ctx.parent_shape.len() != rank {
        return Err(ArrayError::ShapeMismatch {
            expected: rank,
            received: ctx.parent_shape.len(),
        });
    }
    Ok(())
}

/// `shape` and `expected` must agree axis by axis.
pub(crate) fn shape_matches(shape: &[usize], expected: &[usize]) -> Result<(), ArrayError> {
    if shape.len() != expected.len() {
        return Err(ArrayError::ShapeMismatch {
            expected: expected.len(),
            received: shape.len(),
        });
    }
    for (&got, &want) in shape.iter().zip(expected) {
        if got != want {
            return Err(ArrayError::ShapeMismatch {
                expected: want,
                received: got,
            });
        }
    }
    Ok(())
}

/// Per-axis parameter lists must all have the view's rank.
pub(crate) fn param_len(rank: usize, len: usize) -> Result<(), ArrayError> {
    if len != rank {
        return Err(ArrayError::ShapeMismatch {
            expected: rank,
            received: len,
        });
    }
    Ok(())
}

/// Normalise a signed linear address against an element count.
pub(crate) fn linear(index: i64, count: usize) -> Result<usize, ArrayError> {
    normalize_index(index, 0, count)
}

/// Views of host elements cannot address bytes.
pub(crate) fn byte_addressable(elem: ElementType, operation: &'static str) -> Result<(), ArrayError> {
    if elem.is_host() {
        return Err(ArrayError::UnsupportedElement {
            kind: elem.kind(),
            operation,
        });
    }
    Ok(())
}
