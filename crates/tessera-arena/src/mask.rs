//! The mask subsystem.
//!
//! Any array may carry a boolean mask of identical shape; a set bit marks
//! the element as undefined. Masks are created on first demand:
//!
//! - an entity (or parentless view) gets an entity mask;
//! - a view gets the *same kind with the same parameters* applied to its
//!   parent's mask ([`ViewKind::mirror_for_mask`](crate::ViewKind::mirror_for_mask)),
//!   so writes through the view's mask land in the parent's mask.
//!
//! A view reports a mask whenever its parent has one or its kind implies
//! one; the mirror is built lazily at that point. Masks and value-only
//! projections never carry a mask.

use tessera_core::{ArrayError, ArrayId, Buffer, ElementType, Value};

use crate::arena::{ArrayArena, Body, Role, ViewSpec};

impl ArrayArena {
    /// The mask of `id`, if one has been materialized. Never creates one.
    pub fn mask_of(&self, id: ArrayId) -> Result<Option<ArrayId>, ArrayError> {
        Ok(self.inner.borrow().node(id)?.mask)
    }

    /// Whether `id` has a mask, materializing a view's mirrored mask if its
    /// parent has one or its kind implies one.
    pub fn has_mask(&self, id: ArrayId) -> Result<bool, ArrayError> {
        let (mask, role, parent, implies) = {
            let inner = self.inner.borrow();
            let node = inner.node(id)?;
            (
                node.mask,
                node.role,
                node.parent(),
                node.view().is_some_and(|v| v.kind.implies_mask()),
            )
        };
        if mask.is_some() {
            return Ok(true);
        }
        if role != Role::Normal {
            return Ok(false);
        }
        let needed = implies
            || match parent {
                Some(p) => self.has_mask(p)?,
                None => false,
            };
        if needed {
            self.create_mask(id)?;
        }
        Ok(needed)
    }

    /// Return the mask of `id`, creating an all-clear one if needed.
    ///
    /// Idempotent. Fails with `MaskForbidden` on masks and value-only
    /// projections. A view's mask is built over its parent's mask, which
    /// is created first.
    pub fn create_mask(&self, id: ArrayId) -> Result<ArrayId, ArrayError> {
        let (mask, role, parent, shape, depth, is_view) = {
            let inner = self.inner.borrow();
            let node = inner.node(id)?;
            (
                node.mask,
                node.role,
                node.parent(),
                node.shape.clone(),
                node.attach_depth,
                matches!(node.body, Body::View(_)),
            )
        };
        if role != Role::Normal {
            return Err(ArrayError::MaskForbidden { array: id });
        }
        if let Some(m) = mask {
            return Ok(m);
        }
        let boolean = ElementType::boolean();
        let owner = Role::Mask { owner: id };
        let parent_can_mask = match parent {
            Some(p) => self.inner.borrow().node(p)?.role == Role::Normal,
            None => false,
        };
        let m = match parent {
            Some(p) if parent_can_mask => {
                let parent_mask = self.create_mask(p)?;
                let mirror = {
                    let inner = self.inner.borrow();
                    let node = inner.node(id)?;
                    node.view().and_then(|v| v.kind.mirror_for_mask()).ok_or(
                        ArrayError::KindContract {
                            kind: node.tag,
                            operation: "mirror_for_mask",
                        },
                    )?
                };
                self.insert_view(ViewSpec::new(Some(parent_mask), &shape, boolean, mirror), owner)?
            }
            _ => {
                let count = shape.iter().product();
                self.insert_entity(&shape, boolean, Buffer::zeroed(boolean, count), owner)
            }
        };
        {
            let mut inner = self.inner.borrow_mut();
            inner.node_mut(id)?.mask = Some(m);
            inner.metrics.masks_created += 1;
        }
        // A view's mask is attached exactly while the view is.
        if is_view && depth > 0 {
            self.attach(m)?;
        }
        Ok(m)
    }

    /// Whether element `addr` of `id` is masked.
    pub fn is_masked(&self, id: ArrayId, addr: usize) -> Result<bool, ArrayError> {
        if !self.has_mask(id)? {
            return Ok(false);
        }
        match self.mask_of(id)? {
            Some(m) => Ok(self.fetch_raw(m, addr)?.as_bool().unwrap_or(false)),
            None => Ok(false),
        }
    }

    /// Set or clear the mask bit of element `addr`.
    pub fn set_masked(&self, id: ArrayId, addr: usize, masked: bool) -> Result<(), ArrayError> {
        self.check_addr(id, addr)?;
        self.ensure_writable(id)?;
        if !masked && !self.has_mask(id)? {
            return Ok(());
        }
        let m = self.create_mask(id)?;
        self.store_raw(m, addr, &Value::Bool(masked))
    }

    /// Set a mask bit without the writability check; used when a read
    /// discovers an undefined element.
    pub(crate) fn poke_mask(&self, id: ArrayId, addr: usize, masked: bool) -> Result<(), ArrayError> {
        let m = self.create_mask(id)?;
        self.store_raw(m, addr, &Value::Bool(masked))
    }

    /// The mask bits of `id` in row-major order, or `None` if it has no mask.
    pub fn read_mask(&self, id: ArrayId) -> Result<Option<Vec<bool>>, ArrayError> {
        if !self.has_mask(id)? {
            return Ok(None);
        }
        let Some(m) = self.mask_of(id)? else {
            return Ok(None);
        };
        let mut bits = Buffer::zeroed(ElementType::boolean(), self.element_count(id)?);
        self.copy_into(m, &mut bits)?;
        Ok(bits
            .as_bytes()
            .map(|bytes| bytes.iter().map(|&b| b != 0).collect()))
    }

    /// Overwrite the mask of `id` with `bits`, creating the mask if needed.
    pub fn write_mask(&self, id: ArrayId, bits: &[bool]) -> Result<(), ArrayError> {
        self.ensure_writable(id)?;
        self.overwrite_mask(id, bits)
    }

    /// [`ArrayArena::write_mask`] without the writability check.
    pub(crate) fn overwrite_mask(&self, id: ArrayId, bits: &[bool]) -> Result<(), ArrayError> {
        let count = self.element_count(id)?;
        if bits.len() != count {
            return Err(ArrayError::ShapeMismatch {
                expected: count,
                received: bits.len(),
            });
        }
        let m = self.create_mask(id)?;
        let buffer = Buffer::Bytes {
            data: bits.iter().map(|&b| b as u8).collect(),
            elem_bytes: 1,
        };
        if self.is_view(m)? {
            return self.sync_from(m, &buffer);
        }
        let mut inner = self.inner.borrow_mut();
        inner.node_mut(m)?.buffer = Some(buffer);
        Ok(())
    }

    /// Clear every mask bit of `id` (no-op without a mask).
    pub fn clear_mask(&self, id: ArrayId) -> Result<(), ArrayError> {
        if !self.has_mask(id)? {
            return Ok(());
        }
        let count = self.element_count(id)?;
        self.write_mask(id, &vec![false; count])
    }

    /// Number of masked elements.
    pub fn count_masked(&self, id: ArrayId) -> Result<usize, ArrayError> {
        Ok(self
            .read_mask(id)?
            .map_or(0, |bits| bits.iter().filter(|&&b| b).count()))
    }

    /// Linear addresses of the masked elements, ascending.
    pub fn masked_positions(&self, id: ArrayId) -> Result<Vec<usize>, ArrayError> {
        Ok(self
            .read_mask(id)?
            .map(|bits| {
                bits.iter()
                    .enumerate()
                    .filter_map(|(addr, &b)| b.then_some(addr))
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Clear the mask of `id` in place and return how many elements were
    /// unmasked. With `fill`, the unmasked elements are set to it.
    pub fn unmask(&self, id: ArrayId, fill: Option<&Value>) -> Result<usize, ArrayError> {
        let positions = self.masked_positions(id)?;
        if positions.is_empty() {
            return Ok(0);
        }
        self.ensure_writable(id)?;
        match fill {
            Some(value) if !value.is_undefined() => {
                for &addr in &positions {
                    self.store(id, addr, value)?;
                }
            }
            _ => self.clear_mask(id)?,
        }
        Ok(positions.len())
    }

    /// Deep copy of `id` with its mask cleared (and masked elements set to
    /// `fill`, if given). The original is untouched.
    pub fn unmask_copy(&self, id: ArrayId, fill: Option<&Value>) -> Result<ArrayId, ArrayError> {
        let copy = self.clone_array(id)?;
        self.unmask(copy, fill)?;
        Ok(copy)
    }

    /// Flip every mask bit of `id`, creating an all-clear mask first if
    /// needed (so the result is fully masked).
    pub fn invert_mask(&self, id: ArrayId) -> Result<(), ArrayError> {
        let count = self.element_count(id)?;
        let bits = self.read_mask(id)?.unwrap_or_else(|| vec![false; count]);
        let inverted: Vec<bool> = bits.iter().map(|b| !b).collect();
        self.write_mask(id, &inverted)
    }

    /// Overwrite the mask of `target` with the OR of the masks of
    /// `sources`. One-element sources broadcast; sources without a mask
    /// contribute nothing. If no source is masked, the target's mask is
    /// cleared.
    pub fn merge_masks(&self, target: ArrayId, sources: &[ArrayId]) -> Result<(), ArrayError> {
        let count = self.element_count(target)?;
        let mut combined = vec![false; count];
        let mut any = false;
        for &source in sources {
            let n = self.element_count(source)?;
            if n != count && n != 1 {
                return Err(ArrayError::ShapeMismatch {
                    expected: count,
                    received: n,
                });
            }
            if let Some(bits) = self.read_mask(source)? {
                any = true;
                for (i, slot) in combined.iter_mut().enumerate() {
                    *slot |= bits[if n == 1 { 0 } else { i }];
                }
            }
        }
        if any {
            self.write_mask(target, &combined)
        } else {
            self.clear_mask(target)
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use tessera_core::ElementKind;

    use super::*;

    fn float64() -> ElementType {
        ElementType::new(ElementKind::Float64)
    }

    fn masked_entity(arena: &ArrayArena, bits: &[bool]) -> ArrayId {
        let a = arena.entity(&[bits.len()], float64()).unwrap();
        if bits.iter().any(|&b| b) {
            arena.write_mask(a, bits).unwrap();
        }
        a
    }

    #[test]
    fn create_mask_is_idempotent() {
        let arena = ArrayArena::default();
        let a = arena.entity(&[4], float64()).unwrap();
        assert!(!arena.has_mask(a).unwrap());
        let m1 = arena.create_mask(a).unwrap();
        let m2 = arena.create_mask(a).unwrap();
        assert_eq!(m1, m2);
        assert!(arena.has_mask(a).unwrap());
        assert!(arena.is_mask(m1).unwrap());
        assert_eq!(arena.metrics().masks_created, 1);
    }

    #[test]
    fn masks_do_not_carry_masks() {
        let arena = ArrayArena::default();
        let a = arena.entity(&[4], float64()).unwrap();
        let m = arena.create_mask(a).unwrap();
        assert!(matches!(
            arena.create_mask(m),
            Err(ArrayError::MaskForbidden { .. })
        ));
        assert!(!arena.has_mask(m).unwrap());
    }

    #[test]
    fn unmask_with_fill() {
        let arena = ArrayArena::default();
        let a = masked_entity(&arena, &[true, false, true]);
        assert_eq!(arena.unmask(a, Some(&Value::Float(-1.0))).unwrap(), 2);
        assert_eq!(arena.count_masked(a).unwrap(), 0);
        assert_eq!(arena.fetch(a, 2).unwrap(), Value::Float(-1.0));
        assert_eq!(arena.fetch(a, 1).unwrap(), Value::Float(0.0));
    }

    #[test]
    fn unmask_copy_leaves_original() {
        let arena = ArrayArena::default();
        let a = masked_entity(&arena, &[false, true]);
        let b = arena.unmask_copy(a, None).unwrap();
        assert_eq!(arena.count_masked(a).unwrap(), 1);
        assert_eq!(arena.count_masked(b).unwrap(), 0);
    }

    #[test]
    fn invert_without_mask_masks_all() {
        let arena = ArrayArena::default();
        let a = arena.entity(&[3], float64()).unwrap();
        arena.invert_mask(a).unwrap();
        assert_eq!(arena.masked_positions(a).unwrap(), vec![0, 1, 2]);
        arena.invert_mask(a).unwrap();
        assert_eq!(arena.count_masked(a).unwrap(), 0);
    }

    #[test]
    fn merge_broadcasts_scalars() {
        let arena = ArrayArena::default();
        let target = arena.entity(&[3], float64()).unwrap();
        let scalar = masked_entity(&arena, &[true]);
        let plain = arena.entity(&[3], float64()).unwrap();
        arena.merge_masks(target, &[plain, scalar]).unwrap();
        assert_eq!(arena.count_masked(target).unwrap(), 3);
        arena.merge_masks(target, &[plain]).unwrap();
        assert_eq!(arena.count_masked(target).unwrap(), 0);
    }

    #[test]
    fn merge_rejects_mismatched_lengths() {
        let arena = ArrayArena::default();
        let target = arena.entity(&[3], float64()).unwrap();
        let other = arena.entity(&[2], float64()).unwrap();
        assert!(matches!(
            arena.merge_masks(target, &[other]),
            Err(ArrayError::ShapeMismatch { expected: 3, received: 2 })
        ));
    }

    proptest! {
        #[test]
        fn merge_is_elementwise_or(
            pairs in prop::collection::vec((any::<bool>(), any::<bool>()), 1..32)
        ) {
            let arena = ArrayArena::default();
            let (a_bits, b_bits): (Vec<bool>, Vec<bool>) = pairs.iter().copied().unzip();
            let a = masked_entity(&arena, &a_bits);
            let b = masked_entity(&arena, &b_bits);
            let target = arena.entity(&[pairs.len()], float64()).unwrap();
            arena.merge_masks(target, &[a, b]).unwrap();
            for (i, (x, y)) in pairs.iter().enumerate() {
                prop_assert_eq!(arena.is_masked(target, i).unwrap(), *x || *y);
            }
        }
    }
}
