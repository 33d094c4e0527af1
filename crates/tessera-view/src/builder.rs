//! View construction on the arena.
//!
//! [`ViewBuilder`] adds one constructor per view kind to
//! [`ArrayArena`]. Each constructor derives the view's header (shape and
//! element type) from the parent's current header, builds the kind, and
//! registers the view; the kind validates itself against the parent
//! before the view exists.

use tessera_arena::{ArrayArena, ViewSpec};
use tessera_core::shape::checked_element_count;
use tessera_core::{ArrayError, ArrayId, ElementType};

use crate::bitfield::Bitfield;
use crate::block::Block;
use crate::grid::{Grid, GridAxis};
use crate::object::{DynamicSource, Object};
use crate::refer::Refer;
use crate::repeat::{AxisRole, Repeat, UnboundRepeat};
use crate::select::Select;
use crate::transpose::Transpose;
use crate::window::{Boundary, Window};

/// View constructors for [`ArrayArena`].
pub trait ViewBuilder {
    /// An affine slice: view element `a` is parent element
    /// `byte_offset / elem_bytes + ratio · a`.
    ///
    /// `byte_offset` must be a multiple of the element size (and 0 for
    /// host elements). A ratio of 0 over more than one element yields a
    /// read-only broadcast of one parent element.
    fn refer(
        &self,
        parent: ArrayId,
        byte_offset: usize,
        ratio: usize,
        shape: &[usize],
    ) -> Result<ArrayId, ArrayError>;

    /// A per-axis `start, step, count` block; the view's shape is `count`.
    fn block(
        &self,
        parent: ArrayId,
        start: &[usize],
        step: &[isize],
        count: &[usize],
    ) -> Result<ArrayId, ArrayError>;

    /// A movable unit-step window of extent `count` at origin `start`.
    fn window(
        &self,
        parent: ArrayId,
        start: &[isize],
        count: &[usize],
        boundary: Boundary,
    ) -> Result<ArrayId, ArrayError>;

    /// Move a window's origin by `delta`, re-gathering it (and its mask)
    /// if it is attached.
    fn slide_window(&self, window: ArrayId, delta: &[isize]) -> Result<(), ArrayError>;

    /// A rank-1 view of the parent elements whose selector flag is set.
    /// The selector has one flag per parent element.
    fn select(&self, parent: ArrayId, selector: &[bool]) -> Result<ArrayId, ArrayError>;

    /// [`select`](Self::select) driven by a boolean array; masked or
    /// false elements are not selected.
    fn select_where(&self, parent: ArrayId, selector: ArrayId) -> Result<ArrayId, ArrayError>;

    /// A rank-1 view of the parent elements at the given linear addresses
    /// (negative addresses count from the end).
    fn select_indices(&self, parent: ArrayId, indices: &[i64]) -> Result<ArrayId, ArrayError>;

    /// Fancy indexing: one optional index list per parent axis.
    fn grid(&self, parent: ArrayId, axes: Vec<Option<GridAxis>>) -> Result<ArrayId, ArrayError>;

    /// Tile the parent `counts[i]` times along axis `i` (0 passes the axis
    /// through). Read-only.
    fn repeat(&self, parent: ArrayId, counts: &[usize]) -> Result<ArrayId, ArrayError>;

    /// A placeholder repeat: parent axes in order, free axes of extent 1.
    /// Read-only until bound.
    fn unbound_repeat(&self, parent: ArrayId, pattern: &[AxisRole]) -> Result<ArrayId, ArrayError>;

    /// Realise an unbound repeat at `shape`, as a new view of the same
    /// parent.
    ///
    /// Parent axes of `shape` must equal the parent's extents
    /// (`ShapeMismatch`). If every free axis of `shape` is 1 the result is
    /// a reshaping Refer; otherwise it is a Repeat. Binding anything but
    /// an unbound repeat (including an already-bound result) fails with
    /// `KindContract`.
    fn bind(&self, unbound: ArrayId, shape: &[usize]) -> Result<ArrayId, ArrayError>;

    /// [`bind`](Self::bind) to the current shape of `like`.
    fn bind_like(&self, unbound: ArrayId, like: ArrayId) -> Result<ArrayId, ArrayError>;

    /// The `bit_width`-bit field at `bit_offset` of every parent element.
    fn bitfield(&self, parent: ArrayId, bit_offset: u32, bit_width: u32) -> Result<ArrayId, ArrayError>;

    /// The parent with its axis order reversed.
    fn transpose(&self, parent: ArrayId) -> Result<ArrayId, ArrayError>;

    /// A parentless array backed by host callbacks.
    fn object(
        &self,
        shape: &[usize],
        elem: ElementType,
        source: Box<dyn DynamicSource>,
    ) -> Result<ArrayId, ArrayError>;

    /// The raw stored values of `id`, ignoring its mask. The projection
    /// never carries a mask of its own.
    fn values(&self, id: ArrayId) -> Result<ArrayId, ArrayError>;
}

impl ViewBuilder for ArrayArena {
    fn refer(
        &self,
        parent: ArrayId,
        byte_offset: usize,
        ratio: usize,
        shape: &[usize],
    ) -> Result<ArrayId, ArrayError> {
        let elem = self.element(parent)?;
        let offset = match elem.bytes() {
            0 if byte_offset == 0 => 0,
            bytes if bytes > 0 && byte_offset % bytes == 0 => byte_offset / bytes,
            _ => {
                return Err(ArrayError::UnsupportedElement {
                    kind: elem.kind(),
                    operation: "a byte offset that is not a whole number of elements",
                })
            }
        };
        let count = checked_element_count(shape)?;
        let kind = Refer::new(offset, ratio, count);
        self.create_view(ViewSpec::new(Some(parent), shape, elem, Box::new(kind)))
    }

    fn block(
        &self,
        parent: ArrayId,
        start: &[usize],
        step: &[isize],
        count: &[usize],
    ) -> Result<ArrayId, ArrayError> {
        let kind = Block::new(start, step, count)?;
        let elem = self.element(parent)?;
        self.create_view(ViewSpec::new(Some(parent), count, elem, Box::new(kind)))
    }

    fn window(
        &self,
        parent: ArrayId,
        start: &[isize],
        count: &[usize],
        boundary: Boundary,
    ) -> Result<ArrayId, ArrayError> {
        let kind = Window::new(start, count, boundary)?;
        let elem = self.element(parent)?;
        self.create_view(ViewSpec::new(Some(parent), count, elem, Box::new(kind)))
    }

    fn slide_window(&self, window: ArrayId, delta: &[isize]) -> Result<(), ArrayError> {
        self.with_kind_mut::<Window, _>(window, |w| w.slide(delta))??;
        // A window over a mask or value-only parent carries an entity mask,
        // which has no window to move.
        if let Some(mask) = self.mask_of(window)? {
            if let Ok(slid) = self.with_kind_mut::<Window, _>(mask, |w| w.slide(delta)) {
                slid?;
            }
        }
        self.refresh(window)
    }

    fn select(&self, parent: ArrayId, selector: &[bool]) -> Result<ArrayId, ArrayError> {
        let count = self.element_count(parent)?;
        if selector.len() != count {
            return Err(ArrayError::ShapeMismatch {
                expected: count,
                received: selector.len(),
            });
        }
        let kind = Select::from_flags(selector);
        let elem = self.element(parent)?;
        self.create_view(ViewSpec::new(Some(parent), &[kind.len()], elem, Box::new(kind)))
    }

    fn select_where(&self, parent: ArrayId, selector: ArrayId) -> Result<ArrayId, ArrayError> {
        let flags: Vec<bool> = self
            .fetch_all(selector)?
            .iter()
            .map(|v| v.as_bool().unwrap_or(false))
            .collect();
        self.select(parent, &flags)
    }

    fn select_indices(&self, parent: ArrayId, indices: &[i64]) -> Result<ArrayId, ArrayError> {
        let kind = Select::from_indices(indices, self.element_count(parent)?)?;
        let elem = self.element(parent)?;
        self.create_view(ViewSpec::new(Some(parent), &[kind.len()], elem, Box::new(kind)))
    }

    fn grid(&self, parent: ArrayId, axes: Vec<Option<GridAxis>>) -> Result<ArrayId, ArrayError> {
        let kind = Grid::new(axes);
        let shape = kind.shape(&self.shape(parent)?)?;
        let elem = self.element(parent)?;
        self.create_view(ViewSpec::new(Some(parent), &shape, elem, Box::new(kind)))
    }

    fn repeat(&self, parent: ArrayId, counts: &[usize]) -> Result<ArrayId, ArrayError> {
        let kind = Repeat::new(counts);
        let shape = kind.shape(&self.shape(parent)?)?;
        let elem = self.element(parent)?;
        self.create_view(ViewSpec::new(Some(parent), &shape, elem, Box::new(kind)))
    }

    fn unbound_repeat(&self, parent: ArrayId, pattern: &[AxisRole]) -> Result<ArrayId, ArrayError> {
        let kind = UnboundRepeat::new(pattern);
        let shape = kind.shape(&self.shape(parent)?)?;
        let elem = self.element(parent)?;
        self.create_view(ViewSpec::new(Some(parent), &shape, elem, Box::new(kind)))
    }

    fn bind(&self, unbound: ArrayId, shape: &[usize]) -> Result<ArrayId, ArrayError> {
        let pattern = self.with_kind::<UnboundRepeat, _>(unbound, |k| k.clone())?;
        let parent = self.parent(unbound)?.ok_or(ArrayError::KindContract {
            kind: self.kind_tag(unbound)?,
            operation: "bind without a parent",
        })?;
        let parent_shape = self.shape(parent)?;
        match pattern.bind(&parent_shape, shape)? {
            Some(kind) => {
                let elem = self.element(parent)?;
                self.create_view(ViewSpec::new(Some(parent), shape, elem, Box::new(kind)))
            }
            None => self.refer(parent, 0, 1, shape),
        }
    }

    fn bind_like(&self, unbound: ArrayId, like: ArrayId) -> Result<ArrayId, ArrayError> {
        let shape = self.shape(like)?;
        self.bind(unbound, &shape)
    }

    fn bitfield(&self, parent: ArrayId, bit_offset: u32, bit_width: u32) -> Result<ArrayId, ArrayError> {
        let kind = Bitfield::new(self.element(parent)?, bit_offset, bit_width)?;
        let shape = self.shape(parent)?;
        let elem = kind.element()?;
        self.create_view(ViewSpec::new(Some(parent), &shape, elem, Box::new(kind)))
    }

    fn transpose(&self, parent: ArrayId) -> Result<ArrayId, ArrayError> {
        let shape = Transpose::shape(&self.shape(parent)?);
        let elem = self.element(parent)?;
        self.create_view(ViewSpec::new(Some(parent), &shape, elem, Box::new(Transpose)))
    }

    fn object(
        &self,
        shape: &[usize],
        elem: ElementType,
        source: Box<dyn DynamicSource>,
    ) -> Result<ArrayId, ArrayError> {
        self.create_view(ViewSpec::new(None, shape, elem, Box::new(Object::new(source))))
    }

    fn values(&self, id: ArrayId) -> Result<ArrayId, ArrayError> {
        let shape = self.shape(id)?;
        let elem = self.element(id)?;
        let kind = Refer::identity();
        self.create_view(ViewSpec::new(Some(id), &shape, elem, Box::new(kind)).value_only())
    }
}
