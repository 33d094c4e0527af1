//! Block: a per-axis `start, step, count` sub-array.
//!
//! Index `i` of the view is parent index `start + i * step` on every axis.
//! Steps may be negative (reversed axes) but never zero. When the
//! innermost step is 1 each row of the block is a contiguous run of the
//! parent, and gather/scatter copy whole runs.

use std::any::Any;

use tessera_arena::{gather_mapped, scatter_mapped, MapContext, Mapping, Source, ViewKind};
use tessera_core::shape::addr_to_index;
use tessera_core::{ArrayError, Buffer, BuiltinKind, KindTag};

use crate::check;

/// Parameters of a Block view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    start: Vec<usize>,
    step: Vec<isize>,
    count: Vec<usize>,
}

impl Block {
    /// A block with the given per-axis parameters; the view's shape is
    /// `count`.
    ///
    /// Returns `ShapeMismatch` if the three lists differ in length and
    /// `InvalidConfig` for a zero step.
    pub fn new(start: &[usize], step: &[isize], count: &[usize]) -> Result<Self, ArrayError> {
        check::param_len(count.len(), start.len())?;
        check::param_len(count.len(), step.len())?;
        if let Some(axis) = step.iter().position(|&s| s == 0) {
            return Err(ArrayError::InvalidConfig {
                reason: format!("block step on axis {axis} must be non-zero"),
            });
        }
        Ok(Self {
            start: start.to_vec(),
            step: step.to_vec(),
            count: count.to_vec(),
        })
    }

    /// First parent index per axis.
    pub fn start(&self) -> &[usize] {
        &self.start
    }

    /// Parent stride per axis, in indices.
    pub fn step(&self) -> &[isize] {
        &self.step
    }

    /// View extent per axis.
    pub fn count(&self) -> &[usize] {
        &self.count
    }

    fn parent_index(&self, axis: usize, i: usize) -> usize {
        (self.start[axis] as isize + i as isize * self.step[axis]) as usize
    }

    /// Call `f(view_addr, parent_addr, len)` for every contiguous row.
    /// Requires an innermost step of 1.
    fn for_each_run(&self, ctx: &MapContext<'_>, mut f: impl FnMut(usize, usize, usize)) {
        let rank = self.count.len();
        let inner = self.count[rank - 1];
        if inner == 0 {
            return;
        }
        let rows = ctx.element_count() / inner;
        let mut outer = vec![0usize; rank - 1];
        for row in 0..rows {
            addr_to_index(&self.count[..rank - 1], row, &mut outer);
            let mut p = 0usize;
            for (axis, &i) in outer.iter().enumerate() {
                p = p * ctx.parent_shape[axis] + self.parent_index(axis, i);
            }
            p = p * ctx.parent_shape[rank - 1] + self.start[rank - 1];
            f(row * inner, p, inner);
        }
    }

    fn contiguous(&self) -> bool {
        self.step.last() == Some(&1)
    }
}

impl ViewKind for Block {
    fn tag(&self) -> KindTag {
        BuiltinKind::Block.tag()
    }

    fn mapping(&self) -> Mapping {
        Mapping::Index
    }

    fn validate(&self, ctx: &MapContext<'_>) -> Result<(), ArrayError> {
        check::same_element(ctx)?;
        check::parent_rank(ctx, self.count.len())?;
        for axis in 0..self.count.len() {
            let n = self.count[axis];
            if n == 0 {
                continue;
            }
            let dim = ctx.parent_shape[axis];
            // Wide enough that no start/step/count combination overflows.
            let first = self.start[axis] as i128;
            let last = first + (n as i128 - 1) * self.step[axis] as i128;
            for index in [first, last] {
                if index < 0 || index >= dim as i128 {
                    return Err(ArrayError::OutOfBounds {
                        index: index.clamp(i64::MIN as i128, i64::MAX as i128) as i64,
                        axis,
                        dim,
                    });
                }
            }
        }
        Ok(())
    }

    fn map_index(&self, ctx: &MapContext<'_>, index: &[usize]) -> Result<Source, ArrayError> {
        let addr = index.iter().enumerate().fold(0, |addr, (axis, &i)| {
            addr * ctx.parent_shape[axis] + self.parent_index(axis, i)
        });
        Ok(Source::Parent(addr))
    }

    fn gather(
        &self,
        ctx: &MapContext<'_>,
        parent: &Buffer,
        out: &mut Buffer,
    ) -> Result<(), ArrayError> {
        if !self.contiguous() {
            return gather_mapped(self, ctx, parent, out);
        }
        self.for_each_run(ctx, |v, p, n| out.copy_run(v, parent, p, n));
        Ok(())
    }

    fn scatter(
        &self,
        ctx: &MapContext<'_>,
        view: &Buffer,
        parent: &mut Buffer,
    ) -> Result<(), ArrayError> {
        if !self.contiguous() {
            return scatter_mapped(self, ctx, view, parent);
        }
        self.for_each_run(ctx, |v, p, n| parent.copy_run(p, view, v, n));
        Ok(())
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
    use tessera_arena::{ArrayArena, ViewSpec};
    use tessera_core::{ArrayId, ElementKind, ElementType, Value};

    use super::*;

    fn int32() -> ElementType {
        ElementType::new(ElementKind::Int32)
    }

    fn grid4x4(arena: &ArrayArena) -> ArrayId {
        let values: Vec<Value> = (0..16).map(Value::from).collect();
        arena.entity_from_values(&[4, 4], int32(), &values).unwrap()
    }

    fn block(arena: &ArrayArena, p: ArrayId, start: &[usize], step: &[isize], count: &[usize]) -> ArrayId {
        let kind = Block::new(start, step, count).unwrap();
        arena
            .create_view(ViewSpec::new(Some(p), count, int32(), Box::new(kind)))
            .unwrap()
    }

    #[test]
    fn negative_step_reverses_axis() {
        let arena = ArrayArena::default();
        let p = grid4x4(&arena);
        let v = block(&arena, p, &[0, 3], &[1, -1], &[1, 4]);
        assert_eq!(
            arena.fetch_all(v).unwrap(),
            vec![Value::Int(3), Value::Int(2), Value::Int(1), Value::Int(0)]
        );
    }

    #[test]
    fn contiguous_rows_gather_in_bulk() {
        let arena = ArrayArena::default();
        let p = grid4x4(&arena);
        let v = block(&arena, p, &[1, 1], &[2, 1], &[2, 3]);
        arena.attach(v).unwrap();
        assert_eq!(
            arena.fetch_all(v).unwrap(),
            [5, 6, 7, 13, 14, 15].map(Value::from).to_vec()
        );
        arena.store(v, 4, &Value::Int(-14)).unwrap();
        arena.sync(v).unwrap();
        arena.detach(v).unwrap();
        assert_eq!(arena.fetch_index(p, &[3, 2]).unwrap(), Value::Int(-14));
    }

    #[test]
    fn zero_step_rejected() {
        assert!(matches!(
            Block::new(&[0], &[0], &[2]),
            Err(ArrayError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn shrunk_parent_fails_on_access() {
        let arena = ArrayArena::default();
        let p = arena.entity(&[6], int32()).unwrap();
        let v = block(&arena, p, &[2], &[1], &[4]);
        arena.resize(p, &[4]).unwrap();
        assert!(matches!(
            arena.attach(v),
            Err(ArrayError::OutOfBounds { index: 5, .. })
        ));
        assert_eq!(arena.attach_depth(v).unwrap(), 0);
    }
}
