//! Shapes, row-major address arithmetic and index normalisation.

use smallvec::SmallVec;

use crate::error::ArrayError;

/// Maximum supported rank.
pub const MAX_RANK: usize = 16;

/// Array extents, one per axis.
///
/// Uses `SmallVec<[usize; 4]>` to avoid heap allocation for the common
/// ranks; higher ranks spill to the heap transparently.
pub type Shape = SmallVec<[usize; 4]>;

/// A multi-index into a [`Shape`].
pub type Index = SmallVec<[usize; 4]>;

/// Number of elements in `shape` (product of extents).
pub fn element_count(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Number of elements in `shape`, or `OutOfBounds` naming the first axis
/// whose extent makes the count overflow `usize`.
pub fn checked_element_count(shape: &[usize]) -> Result<usize, ArrayError> {
    shape.iter().enumerate().try_fold(1usize, |count, (axis, &dim)| {
        count.checked_mul(dim).ok_or_else(|| ArrayError::OutOfBounds {
            index: i64::try_from(dim).unwrap_or(i64::MAX),
            axis,
            dim: usize::MAX / count,
        })
    })
}

/// Check rank bounds for a shape, and that its element count fits.
pub fn validate_shape(shape: &[usize], max_rank: usize) -> Result<(), ArrayError> {
    if shape.is_empty() || shape.len() > max_rank {
        return Err(ArrayError::RankOutOfRange {
            rank: shape.len(),
            max: max_rank,
        });
    }
    checked_element_count(shape)?;
    Ok(())
}

/// Row-major strides of `shape`, in elements.
pub fn strides(shape: &[usize]) -> Shape {
    let mut out: Shape = SmallVec::from_elem(1, shape.len());
    for axis in (0..shape.len().saturating_sub(1)).rev() {
        out[axis] = out[axis + 1] * shape[axis + 1];
    }
    out
}

/// Linear (row-major) address of an in-bounds multi-index.
pub fn index_to_addr(shape: &[usize], index: &[usize]) -> usize {
    debug_assert_eq!(shape.len(), index.len());
    index
        .iter()
        .zip(shape)
        .fold(0, |addr, (&i, &dim)| addr * dim + i)
}

/// Multi-index of linear address `addr` in `shape`, written into `out`.
pub fn addr_to_index(shape: &[usize], mut addr: usize, out: &mut [usize]) {
    debug_assert_eq!(shape.len(), out.len());
    for axis in (0..shape.len()).rev() {
        let dim = shape[axis];
        if dim == 0 {
            out[axis] = 0;
            continue;
        }
        out[axis] = addr % dim;
        addr /= dim;
    }
}

/// Multi-index of linear address `addr` in `shape`.
pub fn to_index(shape: &[usize], addr: usize) -> Index {
    let mut out: Index = SmallVec::from_elem(0, shape.len());
    addr_to_index(shape, addr, &mut out);
    out
}

/// Normalise a possibly-negative index against extent `dim`.
///
/// `-1` addresses the last element. Returns `OutOfBounds` if the
/// normalised index is outside `[0, dim)`.
pub fn normalize_index(index: i64, axis: usize, dim: usize) -> Result<usize, ArrayError> {
    let normalized = if index < 0 { index + dim as i64 } else { index };
    if normalized < 0 || normalized >= dim as i64 {
        return Err(ArrayError::OutOfBounds { index, axis, dim });
    }
    Ok(normalized as usize)
}

/// Normalise a signed multi-index and return its linear address.
pub fn checked_addr(shape: &[usize], index: &[i64]) -> Result<usize, ArrayError> {
    if index.len() != shape.len() {
        return Err(ArrayError::RankOutOfRange {
            rank: index.len(),
            max: shape.len(),
        });
    }
    let mut addr = 0usize;
    for (axis, (&i, &dim)) in index.iter().zip(shape).enumerate() {
        addr = addr * dim + normalize_index(i, axis, dim)?;
    }
    Ok(addr)
}

/// Row-major iterator over every multi-index of a shape.
///
/// Yields nothing for shapes with a zero extent.
pub struct IndexIter {
    shape: Shape,
    current: Index,
    remaining: usize,
}

impl IndexIter {
    /// Iterate over all multi-indices of `shape`.
    pub fn new(shape: &[usize]) -> Self {
        Self {
            shape: SmallVec::from_slice(shape),
            current: SmallVec::from_elem(0, shape.len()),
            remaining: element_count(shape),
        }
    }

    /// Advance and return the next index by reference (no allocation).
    pub fn next_index(&mut self) -> Option<&[usize]> {
        if self.remaining == 0 {
            return None;
        }
        let total = element_count(&self.shape);
        if self.remaining != total {
            for axis in (0..self.shape.len()).rev() {
                self.current[axis] += 1;
                if self.current[axis] < self.shape[axis] {
                    break;
                }
                self.current[axis] = 0;
            }
        }
        self.remaining -= 1;
        Some(&self.current)
    }
}

impl Iterator for IndexIter {
    type Item = Index;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_index().map(SmallVec::from_slice)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for IndexIter {}
