//! Element access: fetch, store and the contiguous fast path.
//!
//! `fetch`/`store` work on any array in any state. An attached array is
//! read and written through its materialized buffer (view writes reach the
//! parent on the next `sync`); a detached view maps each access through
//! its kind to the parent, recursively. [`Value::Undefined`] stands for a
//! masked element in both directions.

use tessera_core::shape::checked_addr;
use tessera_core::value::{decode, encode};
use tessera_core::{ArrayError, ArrayId, Value};

use crate::arena::{ArrayArena, Role};
use crate::kind::{resolve, Source};

/// Next step of a detached access.
enum Step {
    Done(Value),
    Parent(ArrayId, usize),
    Direct,
}

impl ArrayArena {
    pub(crate) fn check_addr(&self, id: ArrayId, addr: usize) -> Result<usize, ArrayError> {
        let dim = self.element_count(id)?;
        if addr >= dim {
            return Err(ArrayError::OutOfBounds {
                index: addr as i64,
                axis: 0,
                dim,
            });
        }
        Ok(addr)
    }

    fn addr_of(&self, id: ArrayId, index: &[i64]) -> Result<usize, ArrayError> {
        let shape = self.shape(id)?;
        checked_addr(&shape, index)
    }

    /// Read element `addr` (row-major). Masked elements read as
    /// [`Value::Undefined`].
    ///
    /// A detached parentless view asks its source every time, and the
    /// answer sets or clears the element's mask bit.
    pub fn fetch(&self, id: ArrayId, addr: usize) -> Result<Value, ArrayError> {
        self.check_addr(id, addr)?;
        if self.reads_source(id)? {
            return self.fetch_direct(id, addr);
        }
        if self.is_masked(id, addr)? {
            return Ok(Value::Undefined);
        }
        self.fetch_raw(id, addr)
    }

    /// Read the element at a multi-index; negative indices count from the
    /// end of their axis.
    pub fn fetch_index(&self, id: ArrayId, index: &[i64]) -> Result<Value, ArrayError> {
        let addr = self.addr_of(id, index)?;
        self.fetch(id, addr)
    }

    /// Every element in row-major order.
    pub fn fetch_all(&self, id: ArrayId) -> Result<Vec<Value>, ArrayError> {
        (0..self.element_count(id)?)
            .map(|addr| self.fetch(id, addr))
            .collect()
    }

    /// Read the stored value at `addr`, ignoring the mask.
    pub(crate) fn fetch_raw(&self, id: ArrayId, addr: usize) -> Result<Value, ArrayError> {
        let step = {
            let inner = self.inner.borrow();
            let node = inner.node(id)?;
            if let Some(buffer) = &node.buffer {
                return Ok(buffer.get(node.elem, addr));
            }
            let view = node.view().ok_or(ArrayError::NotAttached { array: id })?;
            let (ctx, kind) = inner.context(id)?;
            kind.validate(&ctx)?;
            match view.parent {
                None => Step::Direct,
                Some(p) => match resolve(kind, &ctx, addr)? {
                    Source::Parent(pa) if pa < ctx.parent_count() => Step::Parent(p, pa),
                    Source::Parent(pa) => {
                        return Err(ArrayError::OutOfBounds {
                            index: pa as i64,
                            axis: 0,
                            dim: ctx.parent_count(),
                        })
                    }
                    Source::Fill(value) => Step::Done(value.cast_to(node.elem)?),
                    Source::Masked => Step::Done(Value::Undefined),
                },
            }
        };
        match step {
            Step::Done(value) => Ok(value),
            Step::Direct => self.fetch_direct(id, addr),
            Step::Parent(p, pa) => {
                let value = self.fetch_raw(p, pa)?;
                if value.is_undefined() {
                    return Ok(value);
                }
                self.apply_extract(id, &value)
            }
        }
    }

    /// Whether `id` is a detached view without a parent.
    fn reads_source(&self, id: ArrayId) -> Result<bool, ArrayError> {
        let inner = self.inner.borrow();
        let node = inner.node(id)?;
        Ok(node.buffer.is_none() && node.view().is_some_and(|view| view.parent.is_none()))
    }

    fn fetch_direct(&self, id: ArrayId, addr: usize) -> Result<Value, ArrayError> {
        let (value, role) = {
            let inner = self.inner.borrow();
            let (ctx, kind) = inner.context(id)?;
            kind.validate(&ctx)?;
            (kind.fetch_direct(&ctx, addr)?, inner.node(id)?.role)
        };
        if role == Role::Normal {
            if value.is_undefined() {
                self.poke_mask(id, addr, true)?;
            } else if self.is_masked(id, addr)? {
                self.poke_mask(id, addr, false)?;
            }
        }
        Ok(value)
    }

    /// Convert a parent value into the view's element, applying the kind's
    /// element transform if it has one.
    fn apply_extract(&self, id: ArrayId, parent_value: &Value) -> Result<Value, ArrayError> {
        let inner = self.inner.borrow();
        let (ctx, kind) = inner.context(id)?;
        let (Some(transform), Some(parent_elem)) = (kind.transform(), ctx.parent_elem) else {
            return Ok(parent_value.clone());
        };
        let mut raw = vec![0u8; parent_elem.bytes()];
        encode(parent_elem, parent_value, &mut raw)?;
        let mut out = vec![0u8; ctx.elem.bytes()];
        transform.extract(&raw, &mut out);
        Ok(decode(ctx.elem, &out))
    }

    /// Write `value` at `addr`.
    ///
    /// Storing [`Value::Undefined`] masks the element; storing any other
    /// value unmasks it. Fails with `ReadOnly` if `id` or an ancestor is
    /// read-only.
    pub fn store(&self, id: ArrayId, addr: usize, value: &Value) -> Result<(), ArrayError> {
        self.check_addr(id, addr)?;
        self.ensure_writable(id)?;
        if value.is_undefined() {
            return self.set_masked(id, addr, true);
        }
        self.store_raw(id, addr, value)?;
        if self.is_masked(id, addr)? {
            self.set_masked(id, addr, false)?;
        }
        Ok(())
    }

    /// Write the element at a multi-index; see [`ArrayArena::store`].
    pub fn store_index(&self, id: ArrayId, index: &[i64], value: &Value) -> Result<(), ArrayError> {
        let addr = self.addr_of(id, index)?;
        self.store(id, addr, value)
    }

    /// Write the stored value at `addr`, leaving the mask alone.
    pub(crate) fn store_raw(&self, id: ArrayId, addr: usize, value: &Value) -> Result<(), ArrayError> {
        {
            let mut inner = self.inner.borrow_mut();
            let node = inner.node_mut(id)?;
            let elem = node.elem;
            if let Some(buffer) = node.buffer.as_mut() {
                return buffer.set(elem, addr, value);
            }
        }
        let (parent, parent_addr, elem, transformed) = {
            let inner = self.inner.borrow();
            let node = inner.node(id)?;
            let view = node.view().ok_or(ArrayError::NotAttached { array: id })?;
            let (ctx, kind) = inner.context(id)?;
            kind.validate(&ctx)?;
            let Some(p) = view.parent else {
                return kind.store_direct(&ctx, addr, value);
            };
            match resolve(kind, &ctx, addr)? {
                Source::Parent(pa) if pa < ctx.parent_count() => {
                    (p, pa, node.elem, kind.transform().is_some())
                }
                Source::Parent(pa) => {
                    return Err(ArrayError::OutOfBounds {
                        index: pa as i64,
                        axis: 0,
                        dim: ctx.parent_count(),
                    })
                }
                // Positions without a parent element discard writes.
                Source::Fill(_) | Source::Masked => return Ok(()),
            }
        };
        if !transformed {
            return self.store_raw(parent, parent_addr, &value.cast_to(elem)?);
        }
        let current = self.fetch_raw(parent, parent_addr)?;
        let updated = self.apply_insert(id, &current, value)?;
        self.store_raw(parent, parent_addr, &updated)
    }

    /// Read-modify-write of one parent element through the element
    /// transform of view `id`.
    fn apply_insert(&self, id: ArrayId, parent_value: &Value, value: &Value) -> Result<Value, ArrayError> {
        let inner = self.inner.borrow();
        let (ctx, kind) = inner.context(id)?;
        let (Some(transform), Some(parent_elem)) = (kind.transform(), ctx.parent_elem) else {
            return Ok(value.clone());
        };
        let mut raw = vec![0u8; parent_elem.bytes()];
        if !parent_value.is_undefined() {
            encode(parent_elem, parent_value, &mut raw)?;
        }
        let mut field = vec![0u8; ctx.elem.bytes()];
        encode(ctx.elem, value, &mut field)?;
        transform.insert(&mut raw, &field);
        Ok(decode(parent_elem, &raw))
    }

    /// Run `f` on the bytes of an attached array from element `addr` to the
    /// end of its buffer.
    ///
    /// This is the contiguous fast path for bulk operations. `f` must not
    /// call back into the arena. Fails with `NotAttached` on a detached
    /// array and `UnsupportedElement` on host-value arrays.
    pub fn slice_at<R>(
        &self,
        id: ArrayId,
        addr: usize,
        f: impl FnOnce(&[u8]) -> R,
    ) -> Result<R, ArrayError> {
        self.check_addr(id, addr)?;
        let inner = self.inner.borrow();
        let node = inner.node(id)?;
        let buffer = node
            .buffer
            .as_ref()
            .ok_or(ArrayError::NotAttached { array: id })?;
        let bytes = buffer.as_bytes().ok_or(ArrayError::UnsupportedElement {
            kind: node.elem.kind(),
            operation: "contiguous access",
        })?;
        Ok(f(&bytes[addr * node.elem.bytes()..]))
    }

    /// [`ArrayArena::slice_at`] by multi-index.
    pub fn slice_at_index<R>(
        &self,
        id: ArrayId,
        index: &[i64],
        f: impl FnOnce(&[u8]) -> R,
    ) -> Result<R, ArrayError> {
        let addr = self.addr_of(id, index)?;
        self.slice_at(id, addr, f)
    }

    /// Mutable [`ArrayArena::slice_at`]. Writes to a view's buffer reach the
    /// parent on the next `sync`.
    pub fn slice_at_mut<R>(
        &self,
        id: ArrayId,
        addr: usize,
        f: impl FnOnce(&mut [u8]) -> R,
    ) -> Result<R, ArrayError> {
        self.check_addr(id, addr)?;
        self.ensure_writable(id)?;
        let mut inner = self.inner.borrow_mut();
        let node = inner.node_mut(id)?;
        let (kind, elem_bytes) = (node.elem.kind(), node.elem.bytes());
        let buffer = node
            .buffer
            .as_mut()
            .ok_or(ArrayError::NotAttached { array: id })?;
        let bytes = buffer.as_bytes_mut().ok_or(ArrayError::UnsupportedElement {
            kind,
            operation: "contiguous access",
        })?;
        Ok(f(&mut bytes[addr * elem_bytes..]))
    }
}

#[cfg(test)]
mod tests {
    use tessera_core::{ElementKind, ElementType};

    use super::*;

    fn int16() -> ElementType {
        ElementType::new(ElementKind::Int16)
    }

    #[test]
    fn fetch_and_store_by_index() {
        let arena = ArrayArena::default();
        let a = arena.entity(&[2, 3], int16()).unwrap();
        arena.store_index(a, &[1, -1], &Value::Int(12)).unwrap();
        assert_eq!(arena.fetch(a, 5).unwrap(), Value::Int(12));
        assert_eq!(arena.fetch_index(a, &[-1, 2]).unwrap(), Value::Int(12));
    }

    #[test]
    fn out_of_bounds_is_reported() {
        let arena = ArrayArena::default();
        let a = arena.entity(&[2, 3], int16()).unwrap();
        assert!(matches!(
            arena.fetch(a, 6),
            Err(ArrayError::OutOfBounds { index: 6, dim: 6, .. })
        ));
        assert!(matches!(
            arena.fetch_index(a, &[2, 0]),
            Err(ArrayError::OutOfBounds { axis: 0, dim: 2, .. })
        ));
    }

    #[test]
    fn undefined_round_trips_through_mask() {
        let arena = ArrayArena::default();
        let a = arena.entity(&[3], int16()).unwrap();
        arena.store(a, 1, &Value::Int(5)).unwrap();
        arena.store(a, 1, &Value::Undefined).unwrap();
        assert_eq!(arena.fetch(a, 1).unwrap(), Value::Undefined);
        // The stored value survives under the mask.
        assert_eq!(arena.fetch_raw(a, 1).unwrap(), Value::Int(5));
        arena.store(a, 1, &Value::Int(6)).unwrap();
        assert_eq!(arena.fetch(a, 1).unwrap(), Value::Int(6));
        assert_eq!(arena.count_masked(a).unwrap(), 0);
    }

    #[test]
    fn slice_at_exposes_tail_bytes() {
        let arena = ArrayArena::default();
        let a = arena.entity(&[4], int16()).unwrap();
        arena.store(a, 2, &Value::Int(0x0102)).unwrap();
        let tail = arena.slice_at(a, 2, |bytes| bytes.to_vec()).unwrap();
        assert_eq!(tail.len(), 4);
        assert_eq!(&tail[..2], &0x0102i16.to_ne_bytes());
        arena
            .slice_at_mut(a, 3, |bytes| bytes[..2].copy_from_slice(&7i16.to_ne_bytes()))
            .unwrap();
        assert_eq!(arena.fetch(a, 3).unwrap(), Value::Int(7));
    }

    #[test]
    fn host_arrays_have_no_byte_view() {
        let arena = ArrayArena::default();
        let a = arena.entity(&[2], ElementType::new(ElementKind::Host)).unwrap();
        arena.store(a, 0, &Value::from(3.5)).unwrap();
        assert_eq!(arena.fetch(a, 0).unwrap(), Value::Float(3.5));
        assert_eq!(arena.fetch(a, 1).unwrap(), Value::Nil);
        assert!(matches!(
            arena.slice_at(a, 0, |_| ()),
            Err(ArrayError::UnsupportedElement { .. })
        ));
    }
}
