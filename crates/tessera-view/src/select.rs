//! Select: a rank-1 compaction of chosen parent elements.
//!
//! Built from a boolean selector (one flag per parent element) or from an
//! explicit list of linear addresses. Element `i` of the view is the
//! `i`-th chosen parent element.

use std::any::Any;

use tessera_arena::{MapContext, Mapping, Source, ViewKind};
use tessera_core::{ArrayError, BuiltinKind, KindTag};

use crate::check;

/// Parameters of a Select view: the chosen parent addresses, in view order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Select {
    positions: Vec<usize>,
}

impl Select {
    /// Choose the parent elements whose flag is set.
    pub fn from_flags(selector: &[bool]) -> Self {
        Self {
            positions: selector
                .iter()
                .enumerate()
                .filter_map(|(addr, &on)| on.then_some(addr))
                .collect(),
        }
    }

    /// Choose parent elements by linear address; negative addresses count
    /// from the end of a parent of `parent_count` elements.
    pub fn from_indices(indices: &[i64], parent_count: usize) -> Result<Self, ArrayError> {
        let positions = indices
            .iter()
            .map(|&i| check::linear(i, parent_count))
            .collect::<Result<_, _>>()?;
        Ok(Self { positions })
    }

    /// Chosen parent addresses.
    pub fn positions(&self) -> &[usize] {
        &self.positions
    }

    /// Number of view elements.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

impl ViewKind for Select {
    fn tag(&self) -> KindTag {
        BuiltinKind::Select.tag()
    }

    fn mapping(&self) -> Mapping {
        Mapping::Addr
    }

    fn validate(&self, ctx: &MapContext<'_>) -> Result<(), ArrayError> {
        check::same_element(ctx)?;
        check::shape_matches(ctx.shape, &[self.positions.len()])?;
        let dim = ctx.parent_count();
        match self.positions.iter().max() {
            Some(&max) if max >= dim => Err(ArrayError::OutOfBounds {
                index: max as i64,
                axis: 0,
                dim,
            }),
            _ => Ok(()),
        }
    }

    fn map_addr(&self, _ctx: &MapContext<'_>, addr: usize) -> Result<Source, ArrayError> {
        Ok(Source::Parent(self.positions[addr]))
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
