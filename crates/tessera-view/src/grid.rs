//! Grid: fancy indexing with one optional index list per axis.
//!
//! Axis `i` of the view either passes the parent axis through (`None`) or
//! picks parent indices from a list. Negative picks count from the end of
//! the parent axis. A list may carry its own mask: masked picks read as
//! masked elements, and so do out-of-range picks of a masked list (an
//! unmasked list with an out-of-range pick is an error).

use std::any::Any;

use tessera_arena::{ArrayArena, MapContext, Mapping, Source, ViewKind};
use tessera_core::shape::normalize_index;
use tessera_core::{ArrayError, ArrayId, BuiltinKind, KindTag, Value};

use crate::check;

/// Index list of one grid axis.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GridAxis {
    picks: Vec<i64>,
    masked: Option<Vec<bool>>,
}

impl GridAxis {
    /// An unmasked index list.
    pub fn new(picks: Vec<i64>) -> Self {
        Self {
            picks,
            masked: None,
        }
    }

    /// An index list with per-pick mask flags.
    pub fn masked(picks: Vec<i64>, masked: Vec<bool>) -> Result<Self, ArrayError> {
        check::param_len(picks.len(), masked.len())?;
        Ok(Self {
            picks,
            masked: Some(masked),
        })
    }

    /// Read an index list out of an integer array; masked elements become
    /// masked picks.
    pub fn from_array(arena: &ArrayArena, id: ArrayId) -> Result<Self, ArrayError> {
        let values = arena.fetch_all(id)?;
        let elem = arena.element(id)?;
        let mut picks = Vec::with_capacity(values.len());
        let mut masked = Vec::with_capacity(values.len());
        for value in &values {
            if value.is_undefined() {
                picks.push(0);
                masked.push(true);
                continue;
            }
            let pick = value.as_i64().ok_or(ArrayError::UnsupportedElement {
                kind: elem.kind(),
                operation: "grid index list",
            })?;
            picks.push(pick);
            masked.push(false);
        }
        if masked.iter().any(|&m| m) {
            Self::masked(picks, masked)
        } else {
            Ok(Self::new(picks))
        }
    }

    /// Number of picks (the view extent on this axis).
    pub fn len(&self) -> usize {
        self.picks.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.picks.is_empty()
    }

    /// Whether the list carries a mask.
    pub fn is_masked(&self) -> bool {
        self.masked.is_some()
    }

    /// Parent index for view index `i`, or `None` for a masked pick.
    fn resolve(&self, i: usize, axis: usize, dim: usize) -> Result<Option<usize>, ArrayError> {
        match &self.masked {
            Some(flags) if flags[i] => Ok(None),
            Some(_) => Ok(normalize_index(self.picks[i], axis, dim).ok()),
            None => normalize_index(self.picks[i], axis, dim).map(Some),
        }
    }
}

/// Parameters of a Grid view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    axes: Vec<Option<GridAxis>>,
    /// Set on mask mirrors: masked picks read as set mask bits.
    mirror: bool,
}

impl Grid {
    /// A grid with one entry per parent axis.
    pub fn new(axes: Vec<Option<GridAxis>>) -> Self {
        Self {
            axes,
            mirror: false,
        }
    }

    /// Per-axis index lists.
    pub fn axes(&self) -> &[Option<GridAxis>] {
        &self.axes
    }

    /// View shape over a parent of `parent_shape`.
    pub fn shape(&self, parent_shape: &[usize]) -> Result<Vec<usize>, ArrayError> {
        check::param_len(parent_shape.len(), self.axes.len())?;
        Ok(self
            .axes
            .iter()
            .zip(parent_shape)
            .map(|(axis, &dim)| axis.as_ref().map_or(dim, GridAxis::len))
            .collect())
    }
}

impl ViewKind for Grid {
    fn tag(&self) -> KindTag {
        BuiltinKind::Grid.tag()
    }

    fn mapping(&self) -> Mapping {
        Mapping::Index
    }

    fn implies_mask(&self) -> bool {
        self.axes.iter().flatten().any(GridAxis::is_masked)
    }

    fn validate(&self, ctx: &MapContext<'_>) -> Result<(), ArrayError> {
        check::same_element(ctx)?;
        check::parent_rank(ctx, self.axes.len())?;
        for (axis, (list, &dim)) in self.axes.iter().zip(ctx.parent_shape).enumerate() {
            match list {
                None if ctx.shape[axis] > dim => {
                    return Err(ArrayError::OutOfBounds {
                        index: ctx.shape[axis] as i64 - 1,
                        axis,
                        dim,
                    })
                }
                Some(list) if !list.is_masked() => {
                    for &pick in &list.picks {
                        normalize_index(pick, axis, dim)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn map_index(&self, ctx: &MapContext<'_>, index: &[usize]) -> Result<Source, ArrayError> {
        let mut addr = 0usize;
        for (axis, &i) in index.iter().enumerate() {
            let dim = ctx.parent_shape[axis];
            let p = match &self.axes[axis] {
                None => Some(i),
                Some(list) => list.resolve(i, axis, dim)?,
            };
            match p {
                Some(p) => addr = addr * dim + p,
                None if self.mirror => return Ok(Source::Fill(Value::Bool(true))),
                None => return Ok(Source::Masked),
            }
        }
        Ok(Source::Parent(addr))
    }

    fn mirror_for_mask(&self) -> Option<Box<dyn ViewKind>> {
        Some(Box::new(Self {
            axes: self.axes.clone(),
            mirror: true,
        }))
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
    use tessera_arena::ViewSpec;
    use tessera_core::{ElementKind, ElementType};

    use super::*;

    fn int32() -> ElementType {
        ElementType::new(ElementKind::Int32)
    }

    fn matrix(arena: &ArrayArena) -> ArrayId {
        let values: Vec<Value> = (0..12).map(Value::from).collect();
        arena.entity_from_values(&[3, 4], int32(), &values).unwrap()
    }

    fn grid(arena: &ArrayArena, p: ArrayId, kind: Grid) -> ArrayId {
        let shape = kind.shape(&arena.shape(p).unwrap()).unwrap();
        arena
            .create_view(ViewSpec::new(Some(p), &shape, int32(), Box::new(kind)))
            .unwrap()
    }

    #[test]
    fn picks_rows_and_passes_columns() {
        let arena = ArrayArena::default();
        let p = matrix(&arena);
        let v = grid(&arena, p, Grid::new(vec![Some(GridAxis::new(vec![2, -3])), None]));
        assert_eq!(arena.shape(v).unwrap().as_slice(), &[2, 4]);
        assert_eq!(
            arena.fetch_all(v).unwrap(),
            [8, 9, 10, 11, 0, 1, 2, 3].map(Value::from).to_vec()
        );
    }

    #[test]
    fn out_of_range_pick_rejected_unless_masked() {
        let arena = ArrayArena::default();
        let p = matrix(&arena);
        let kind = Grid::new(vec![None, Some(GridAxis::new(vec![4]))]);
        let err = arena
            .create_view(ViewSpec::new(Some(p), &[3, 1], int32(), Box::new(kind)))
            .unwrap_err();
        assert!(matches!(err, ArrayError::OutOfBounds { axis: 1, .. }));

        let axis = GridAxis::masked(vec![1, 9], vec![false, false]).unwrap();
        let v = grid(&arena, p, Grid::new(vec![Some(GridAxis::new(vec![0])), Some(axis)]));
        assert_eq!(arena.fetch_all(v).unwrap(), vec![Value::Int(1), Value::Undefined]);
    }

    #[test]
    fn masked_pick_reads_undefined_and_implies_mask() {
        let arena = ArrayArena::default();
        let p = matrix(&arena);
        let axis = GridAxis::masked(vec![0, 1, 2], vec![false, true, false]).unwrap();
        let v = grid(&arena, p, Grid::new(vec![Some(axis), Some(GridAxis::new(vec![3]))]));
        assert!(arena.has_mask(v).unwrap());
        assert_eq!(
            arena.fetch_all(v).unwrap(),
            vec![Value::Int(3), Value::Undefined, Value::Int(11)]
        );
        assert_eq!(arena.count_masked(p).unwrap(), 0);
    }

    #[test]
    fn index_list_from_masked_array() {
        let arena = ArrayArena::default();
        let idx = arena
            .entity_from_values(&[2], int32(), &[Value::Int(1), Value::Undefined])
            .unwrap();
        let axis = GridAxis::from_array(&arena, idx).unwrap();
        assert!(axis.is_masked());
        assert_eq!(axis.len(), 2);
    }
}
