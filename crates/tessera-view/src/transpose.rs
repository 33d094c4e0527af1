//! Transpose: the parent with its axis order reversed.
//!
//! Gather and scatter walk the parent in row-major order, so reads and
//! writes of the parent are contiguous and only the view side jumps.

use std::any::Any;

use tessera_arena::{MapContext, Mapping, Source, ViewKind};
use tessera_core::shape::{strides, IndexIter};
use tessera_core::{ArrayError, Buffer, BuiltinKind, KindTag};

use crate::check;

/// The Transpose kind; it has no parameters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Transpose;

impl Transpose {
    /// View shape over a parent of `parent_shape`.
    pub fn shape(parent_shape: &[usize]) -> Vec<usize> {
        parent_shape.iter().rev().copied().collect()
    }

    /// Call `f(view_addr, parent_addr)` in parent order.
    fn walk(ctx: &MapContext<'_>, mut f: impl FnMut(usize, usize)) {
        let view_strides = strides(ctx.shape);
        let rank = view_strides.len();
        let mut iter = IndexIter::new(ctx.parent_shape);
        let mut parent_addr = 0;
        while let Some(index) = iter.next_index() {
            let view_addr: usize = index
                .iter()
                .enumerate()
                .map(|(axis, &i)| i * view_strides[rank - 1 - axis])
                .sum();
            f(view_addr, parent_addr);
            parent_addr += 1;
        }
    }
}

impl ViewKind for Transpose {
    fn tag(&self) -> KindTag {
        BuiltinKind::Transpose.tag()
    }

    fn mapping(&self) -> Mapping {
        Mapping::Index
    }

    fn validate(&self, ctx: &MapContext<'_>) -> Result<(), ArrayError> {
        check::same_element(ctx)?;
        check::shape_matches(ctx.shape, &Self::shape(ctx.parent_shape))
    }

    fn map_index(&self, ctx: &MapContext<'_>, index: &[usize]) -> Result<Source, ArrayError> {
        let addr = index
            .iter()
            .rev()
            .zip(ctx.parent_shape)
            .fold(0, |addr, (&i, &dim)| addr * dim + i);
        Ok(Source::Parent(addr))
    }

    fn gather(
        &self,
        ctx: &MapContext<'_>,
        parent: &Buffer,
        out: &mut Buffer,
    ) -> Result<(), ArrayError> {
        Self::walk(ctx, |v, p| out.copy_element(v, parent, p));
        Ok(())
    }

    fn scatter(
        &self,
        ctx: &MapContext<'_>,
        view: &Buffer,
        parent: &mut Buffer,
    ) -> Result<(), ArrayError> {
        Self::walk(ctx, |v, p| parent.copy_element(p, view, v));
        Ok(())
    }

    fn mirror_for_mask(&self) -> Option<Box<dyn ViewKind>> {
        Some(Box::new(Transpose))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
