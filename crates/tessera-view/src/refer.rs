//! Refer: an affine slice of the parent's linear address space.
//!
//! Element `a` of the view is parent element `offset + ratio * a`. The
//! view may have any shape, so a Refer also serves as a reshape (ratio 1)
//! or a broadcast of one element (ratio 0). A ratio-0 view of more than
//! one element aliases a single parent element many times and is
//! read-only.

use std::any::Any;

use tessera_arena::{gather_mapped, scatter_mapped, MapContext, Mapping, Source, ViewKind};
use tessera_core::{ArrayError, Buffer, BuiltinKind, KindTag};

use crate::check;

/// Parameters of a Refer view. The offset is in parent elements.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Refer {
    offset: usize,
    ratio: usize,
    read_only: bool,
}

impl Refer {
    /// A slice starting at parent element `offset`, stepping `ratio`
    /// elements per view element, for a view of `count` elements.
    pub fn new(offset: usize, ratio: usize, count: usize) -> Self {
        Self {
            offset,
            ratio,
            read_only: ratio == 0 && count > 1,
        }
    }

    /// The whole parent, element for element.
    pub fn identity() -> Self {
        Self::new(0, 1, 0)
    }

    /// First parent element.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Parent elements per view element.
    pub fn ratio(&self) -> usize {
        self.ratio
    }

    /// `offset + ratio * addr`, or `None` if that overflows.
    fn parent_addr(&self, addr: usize) -> Option<usize> {
        self.ratio
            .checked_mul(addr)
            .and_then(|span| span.checked_add(self.offset))
    }

    fn contiguous(&self) -> bool {
        self.ratio == 1
    }
}

impl ViewKind for Refer {
    fn tag(&self) -> KindTag {
        BuiltinKind::Refer.tag()
    }

    fn mapping(&self) -> Mapping {
        Mapping::Addr
    }

    fn read_only(&self) -> bool {
        self.read_only
    }

    fn validate(&self, ctx: &MapContext<'_>) -> Result<(), ArrayError> {
        check::same_element(ctx)?;
        let count = ctx.element_count();
        if count == 0 {
            return Ok(());
        }
        match self.parent_addr(count - 1) {
            Some(last) if last < ctx.parent_count() => Ok(()),
            last => Err(ArrayError::OutOfBounds {
                index: last.and_then(|l| i64::try_from(l).ok()).unwrap_or(i64::MAX),
                axis: 0,
                dim: ctx.parent_count(),
            }),
        }
    }

    fn map_addr(&self, ctx: &MapContext<'_>, addr: usize) -> Result<Source, ArrayError> {
        self.parent_addr(addr)
            .map(Source::Parent)
            .ok_or(ArrayError::OutOfBounds {
                index: i64::try_from(addr).unwrap_or(i64::MAX),
                axis: 0,
                dim: ctx.element_count(),
            })
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
        out.copy_run(0, parent, self.offset, ctx.element_count());
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
        parent.copy_run(self.offset, view, 0, ctx.element_count());
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
