//! Repeat and UnboundRepeat: read-only tilings of a parent.
//!
//! Each view axis is either a *parent* axis (consuming the next parent
//! axis in order) or a *free* axis with no parent counterpart. A parent
//! axis with repeat count `c > 0` tiles the parent `c` times along that
//! axis (`shape = parent · c`, `parent_idx = idx mod parent`); count 0
//! passes the axis through. A free axis has extent `c` and does not move
//! the parent index. A pattern with no parent axes repeats the single
//! element of a one-element parent.
//!
//! An [`UnboundRepeat`] is the same mapping with parent axes passed
//! through and free axes as placeholders of extent 1, until the view is
//! bound to a concrete shape (see
//! [`ViewBuilder::bind`](crate::ViewBuilder::bind)).

use std::any::Any;

use tessera_arena::{MapContext, Mapping, Source, ViewKind};
use tessera_core::{ArrayError, BuiltinKind, KindTag};

use crate::check;

/// Role of one view axis in a repeat pattern.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AxisRole {
    /// Maps to the next parent axis.
    Parent,
    /// Has no parent counterpart.
    Free,
}

fn parent_axes(pattern: &[AxisRole]) -> usize {
    pattern.iter().filter(|&&r| r == AxisRole::Parent).count()
}

/// View shape of `pattern` with `counts` over a parent of `parent_shape`.
fn tiled_shape(
    pattern: &[AxisRole],
    counts: &[usize],
    parent_shape: &[usize],
) -> Result<Vec<usize>, ArrayError> {
    check::param_len(pattern.len(), counts.len())?;
    let parents = parent_axes(pattern);
    let count: usize = parent_shape.iter().product();
    if parents == 0 {
        if count != 1 {
            return Err(ArrayError::ShapeMismatch {
                expected: 1,
                received: count,
            });
        }
    } else if parents != parent_shape.len() {
        return Err(ArrayError::ShapeMismatch {
            expected: parent_shape.len(),
            received: parents,
        });
    }
    let mut next = 0;
    pattern
        .iter()
        .zip(counts)
        .enumerate()
        .map(|(axis, (role, &c))| match role {
            AxisRole::Parent => {
                let dim = parent_shape[next];
                next += 1;
                dim.checked_mul(c.max(1)).ok_or(ArrayError::OutOfBounds {
                    index: i64::try_from(c).unwrap_or(i64::MAX),
                    axis,
                    dim: usize::MAX / dim,
                })
            }
            AxisRole::Free => Ok(c),
        })
        .collect()
}

/// Parent address of view `index` under `pattern`.
fn map_pattern(pattern: &[AxisRole], ctx: &MapContext<'_>, index: &[usize]) -> Source {
    let mut next = 0;
    let mut addr = 0usize;
    for (role, &i) in pattern.iter().zip(index) {
        if *role == AxisRole::Parent {
            let dim = ctx.parent_shape[next];
            addr = addr * dim + i % dim;
            next += 1;
        }
    }
    Source::Parent(addr)
}

fn validate_pattern(
    pattern: &[AxisRole],
    counts: &[usize],
    ctx: &MapContext<'_>,
) -> Result<(), ArrayError> {
    check::same_element(ctx)?;
    let expected = tiled_shape(pattern, counts, ctx.parent_shape)?;
    check::shape_matches(ctx.shape, &expected)
}

/// Parameters of a Repeat view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Repeat {
    pattern: Vec<AxisRole>,
    counts: Vec<usize>,
}

impl Repeat {
    /// Tile every parent axis by its count (0 = pass through).
    pub fn new(counts: &[usize]) -> Self {
        Self {
            pattern: vec![AxisRole::Parent; counts.len()],
            counts: counts.to_vec(),
        }
    }

    /// Tile with an explicit axis pattern.
    pub fn with_pattern(pattern: &[AxisRole], counts: &[usize]) -> Result<Self, ArrayError> {
        check::param_len(pattern.len(), counts.len())?;
        Ok(Self {
            pattern: pattern.to_vec(),
            counts: counts.to_vec(),
        })
    }

    /// Repeat count per view axis.
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    /// Axis pattern.
    pub fn pattern(&self) -> &[AxisRole] {
        &self.pattern
    }

    /// View shape over a parent of `parent_shape`.
    pub fn shape(&self, parent_shape: &[usize]) -> Result<Vec<usize>, ArrayError> {
        tiled_shape(&self.pattern, &self.counts, parent_shape)
    }
}

impl ViewKind for Repeat {
    fn tag(&self) -> KindTag {
        BuiltinKind::Repeat.tag()
    }

    fn mapping(&self) -> Mapping {
        Mapping::Index
    }

    fn read_only(&self) -> bool {
        true
    }

    fn validate(&self, ctx: &MapContext<'_>) -> Result<(), ArrayError> {
        validate_pattern(&self.pattern, &self.counts, ctx)
    }

    fn map_index(&self, ctx: &MapContext<'_>, index: &[usize]) -> Result<Source, ArrayError> {
        Ok(map_pattern(&self.pattern, ctx, index))
    }

    fn mirror_for_mask(&self) -> Option<Box<dyn ViewKind>> {
        Some(Box::new(self.clone()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Parameters of an UnboundRepeat view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnboundRepeat {
    pattern: Vec<AxisRole>,
}

impl UnboundRepeat {
    /// A placeholder repeat with the given axis pattern.
    pub fn new(pattern: &[AxisRole]) -> Self {
        Self {
            pattern: pattern.to_vec(),
        }
    }

    /// Axis pattern.
    pub fn pattern(&self) -> &[AxisRole] {
        &self.pattern
    }

    fn counts(&self) -> Vec<usize> {
        self.pattern
            .iter()
            .map(|role| match role {
                AxisRole::Parent => 0,
                AxisRole::Free => 1,
            })
            .collect()
    }

    /// Placeholder shape over a parent of `parent_shape` (free axes 1).
    pub fn shape(&self, parent_shape: &[usize]) -> Result<Vec<usize>, ArrayError> {
        tiled_shape(&self.pattern, &self.counts(), parent_shape)
    }

    /// The Repeat that realises this pattern at `target`, or `None` when
    /// no free axis needs repeating (a plain reshape suffices).
    ///
    /// Fails with `ShapeMismatch` if `target` has the wrong rank or a
    /// parent axis of `target` differs from the parent's extent.
    pub fn bind(&self, parent_shape: &[usize], target: &[usize]) -> Result<Option<Repeat>, ArrayError> {
        let placeholder = self.shape(parent_shape)?;
        check::param_len(placeholder.len(), target.len())?;
        let mut counts = vec![0; target.len()];
        let mut repeats = false;
        for (axis, role) in self.pattern.iter().enumerate() {
            match role {
                AxisRole::Parent if target[axis] != placeholder[axis] => {
                    return Err(ArrayError::ShapeMismatch {
                        expected: placeholder[axis],
                        received: target[axis],
                    })
                }
                AxisRole::Parent => {}
                AxisRole::Free => {
                    counts[axis] = target[axis];
                    repeats |= target[axis] != 1;
                }
            }
        }
        if !repeats {
            return Ok(None);
        }
        Repeat::with_pattern(&self.pattern, &counts).map(Some)
    }
}

impl ViewKind for UnboundRepeat {
    fn tag(&self) -> KindTag {
        BuiltinKind::UnboundRepeat.tag()
    }

    fn mapping(&self) -> Mapping {
        Mapping::Index
    }

    fn read_only(&self) -> bool {
        true
    }

    fn validate(&self, ctx: &MapContext<'_>) -> Result<(), ArrayError> {
        validate_pattern(&self.pattern, &self.counts(), ctx)
    }

    fn map_index(&self, ctx: &MapContext<'_>, index: &[usize]) -> Result<Source, ArrayError> {
        Ok(map_pattern(&self.pattern, ctx, index))
    }

    fn mirror_for_mask(&self) -> Option<Box<dyn ViewKind>> {
        Some(Box::new(self.clone()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AxisRole::{Free, Parent};

    #[test]
    fn tiled_shape_multiplies_counts() {
        assert_eq!(Repeat::new(&[3, 0]).shape(&[1, 5]).unwrap(), vec![3, 5]);
        assert_eq!(Repeat::new(&[2, 2]).shape(&[2, 3]).unwrap(), vec![4, 6]);
    }

    #[test]
    fn free_axes_insert_extents() {
        let r = Repeat::with_pattern(&[Free, Parent], &[4, 0]).unwrap();
        assert_eq!(r.shape(&[3]).unwrap(), vec![4, 3]);
        assert!(r.shape(&[3, 1]).is_err());
    }

    #[test]
    fn scalar_parent_needs_one_element() {
        let r = Repeat::with_pattern(&[Free, Free], &[2, 3]).unwrap();
        assert_eq!(r.shape(&[1]).unwrap(), vec![2, 3]);
        assert!(matches!(
            r.shape(&[2]),
            Err(ArrayError::ShapeMismatch { expected: 1, received: 2 })
        ));
    }

    #[test]
    fn bind_rules() {
        let u = UnboundRepeat::new(&[Parent, Free]);
        assert_eq!(u.shape(&[5]).unwrap(), vec![5, 1]);
        assert_eq!(u.bind(&[5], &[5, 1]).unwrap(), None);
        let bound = u.bind(&[5], &[5, 3]).unwrap().unwrap();
        assert_eq!(bound.counts(), &[0, 3]);
        assert_eq!(bound.shape(&[5]).unwrap(), vec![5, 3]);
        assert!(matches!(
            u.bind(&[5], &[4, 3]),
            Err(ArrayError::ShapeMismatch { expected: 5, received: 4 })
        ));
        assert!(u.bind(&[5], &[5]).is_err());
    }
}
