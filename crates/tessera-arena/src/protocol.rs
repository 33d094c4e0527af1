//! The attach/sync/detach materialization protocol.
//!
//! ```text
//!            allocate / attach (0→1)            detach (1→0)
//! Detached ───────────────────────────▶ Attached ────────────▶ Detached
//!                                        │   ▲
//!                             attach/detach (n→n±1): counter only
//! ```
//!
//! Entities own their buffer for life; for them attach and detach only
//! move the counter. A view materializes on its outermost attach: the
//! parent is attached first, then the view's private buffer is filled by
//! the kind's gather. `sync` scatters the private buffer back and
//! propagates to the parent and the mask. The outermost detach frees the
//! private buffer and detaches the parent.

use tessera_core::{ArrayError, ArrayId, Buffer, Value};

use crate::arena::{ArrayArena, Body};

/// Header fields the protocol consults before acting.
struct Header {
    is_view: bool,
    parent: Option<ArrayId>,
    mask: Option<ArrayId>,
    depth: usize,
    suppressed: bool,
    attached: bool,
    count: usize,
}

impl ArrayArena {
    fn header(&self, id: ArrayId) -> Result<Header, ArrayError> {
        let inner = self.inner.borrow();
        let node = inner.node(id)?;
        Ok(Header {
            is_view: matches!(node.body, Body::View(_)),
            parent: node.parent(),
            mask: node.mask,
            depth: node.attach_depth,
            suppressed: node.suppress_sync > 0,
            attached: node.buffer.is_some(),
            count: node.element_count(),
        })
    }

    /// Bump the attach counter. The nesting limit applies to views only:
    /// an entity is attached once by every attached view of it.
    fn enter(&self, id: ArrayId, is_view: bool) -> Result<usize, ArrayError> {
        let max = self.config().max_attach_depth;
        let mut inner = self.inner.borrow_mut();
        let node = inner.node_mut(id)?;
        if is_view && node.attach_depth >= max {
            return Err(ArrayError::Reentrancy {
                array: id,
                reason: format!("attach depth would exceed {max}"),
            });
        }
        node.attach_depth += 1;
        Ok(node.attach_depth)
    }

    fn unwind(&self, id: ArrayId) {
        if let Ok(node) = self.inner.borrow_mut().node_mut(id) {
            node.attach_depth = node.attach_depth.saturating_sub(1);
        }
    }

    /// Reserve storage without copying data.
    ///
    /// For a view: allocates the parent, then a zeroed private buffer the
    /// size of the view. Balanced by [`ArrayArena::detach`].
    pub fn allocate(&self, id: ArrayId) -> Result<(), ArrayError> {
        self.open(id, false)
    }

    /// Materialize `id`. Balanced by [`ArrayArena::detach`].
    ///
    /// Only the outermost attach of a view does work: it attaches the
    /// parent, gathers into a private buffer and attaches the view's mask.
    pub fn attach(&self, id: ArrayId) -> Result<(), ArrayError> {
        self.open(id, true)
    }

    fn open(&self, id: ArrayId, gather: bool) -> Result<(), ArrayError> {
        let header = self.header(id)?;
        let depth = self.enter(id, header.is_view)?;
        if !header.is_view {
            if !header.attached {
                let mut inner = self.inner.borrow_mut();
                let node = inner.node_mut(id)?;
                node.buffer = Some(Buffer::zeroed(node.elem, node.element_count()));
            }
            return Ok(());
        }
        if depth > 1 {
            return Ok(());
        }
        if let Err(err) = self.materialize(id, &header, gather) {
            self.unwind(id);
            return Err(err);
        }
        Ok(())
    }

    fn materialize(&self, id: ArrayId, header: &Header, gather: bool) -> Result<(), ArrayError> {
        if let Some(p) = header.parent {
            self.open(p, gather)?;
        }
        let result = self.fill_private(id, gather).and_then(|()| match header.mask {
            Some(m) => self.open(m, gather),
            None => Ok(()),
        });
        match result {
            Ok(()) => {
                self.inner.borrow_mut().metrics.attaches += 1;
                Ok(())
            }
            Err(err) => {
                if let Ok(node) = self.inner.borrow_mut().node_mut(id) {
                    node.buffer = None;
                }
                if let Some(p) = header.parent {
                    if let Err(undo) = self.detach(p) {
                        eprintln!("tessera: failed to detach {p} after attach of {id} failed: {undo}");
                    }
                }
                Err(err)
            }
        }
    }

    fn fill_private(&self, id: ArrayId, gather: bool) -> Result<(), ArrayError> {
        let buffer = if gather {
            self.gather_view(id)?
        } else {
            let inner = self.inner.borrow();
            let node = inner.node(id)?;
            Buffer::zeroed(node.elem, node.element_count())
        };
        self.inner.borrow_mut().node_mut(id)?.buffer = Some(buffer);
        Ok(())
    }

    /// Gather a fresh private buffer for view `id` from its source.
    fn gather_view(&self, id: ArrayId) -> Result<Buffer, ArrayError> {
        let mut out = {
            let inner = self.inner.borrow();
            let node = inner.node(id)?;
            Buffer::zeroed(node.elem, node.element_count())
        };
        self.gather_to(id, &mut out)?;
        Ok(out)
    }

    /// Run the kind's gather for view `id` into `out`. The parent must be
    /// attached.
    fn gather_to(&self, id: ArrayId, out: &mut Buffer) -> Result<(), ArrayError> {
        let undefined = {
            let inner = self.inner.borrow();
            let (ctx, kind) = inner.context(id)?;
            kind.validate(&ctx)?;
            let mut undefined = Vec::new();
            match inner.node(id)?.parent() {
                Some(p) => {
                    let parent = inner
                        .node(p)?
                        .buffer
                        .as_ref()
                        .ok_or(ArrayError::NotAttached { array: p })?;
                    kind.gather(&ctx, parent, out)?;
                }
                None => {
                    for addr in 0..ctx.element_count() {
                        let value = kind.fetch_direct(&ctx, addr)?;
                        if value.is_undefined() {
                            out.clear_element(addr);
                            undefined.push(addr);
                        } else {
                            out.set(ctx.elem, addr, &value)?;
                        }
                    }
                }
            }
            undefined
        };
        {
            let mut inner = self.inner.borrow_mut();
            inner.metrics.gathers += 1;
            inner.metrics.bytes_gathered += out.byte_len() as u64;
        }
        if self.parent(id)?.is_none() {
            self.refresh_direct_mask(id, out.len(), &undefined)?;
        }
        Ok(())
    }

    /// Mirror callback-reported undefined elements into the mask of a
    /// parentless view.
    fn refresh_direct_mask(
        &self,
        id: ArrayId,
        count: usize,
        undefined: &[usize],
    ) -> Result<(), ArrayError> {
        if undefined.is_empty() && self.mask_of(id)?.is_none() {
            return Ok(());
        }
        let mut bits = vec![false; count];
        for &addr in undefined {
            bits[addr] = true;
        }
        self.overwrite_mask(id, &bits)
    }

    /// Write the materialized contents of `id` back to its source.
    ///
    /// Fails with `ReadOnly` if the view (or an ancestor) is read-only and
    /// with `NotAttached` if it is not materialized. A view inside a
    /// [`suppress_sync`](ArrayArena::suppress_sync) scope skips the write.
    pub fn sync(&self, id: ArrayId) -> Result<(), ArrayError> {
        let header = self.header(id)?;
        if !header.is_view {
            return Ok(());
        }
        self.ensure_writable(id)?;
        if header.suppressed {
            return Ok(());
        }
        if !header.attached {
            return Err(ArrayError::NotAttached { array: id });
        }
        let own = self.take_buffer(id)?;
        let result = self.write_back(id, header.parent, &own);
        self.inner.borrow_mut().node_mut(id)?.buffer = Some(own);
        result?;
        if let Some(p) = header.parent {
            self.sync(p)?;
        }
        if let Some(m) = header.mask {
            self.sync(m)?;
        }
        Ok(())
    }

    /// Scatter `src` through view `id` into its attached parent, or store
    /// it through the callbacks of a parentless view.
    fn write_back(
        &self,
        id: ArrayId,
        parent: Option<ArrayId>,
        src: &Buffer,
    ) -> Result<(), ArrayError> {
        let Some(p) = parent else {
            return self.store_direct_all(id, src);
        };
        let mut target = self.take_buffer(p)?;
        let result = {
            let inner = self.inner.borrow();
            inner.context(id).and_then(|(ctx, kind)| {
                kind.validate(&ctx)?;
                kind.scatter(&ctx, src, &mut target)
            })
        };
        let bytes = src.byte_len() as u64;
        let mut inner = self.inner.borrow_mut();
        inner.node_mut(p)?.buffer = Some(target);
        result?;
        inner.metrics.scatters += 1;
        inner.metrics.bytes_scattered += bytes;
        Ok(())
    }

    fn store_direct_all(&self, id: ArrayId, src: &Buffer) -> Result<(), ArrayError> {
        let masked = self.read_mask(id)?;
        let inner = self.inner.borrow();
        let (ctx, kind) = inner.context(id)?;
        for addr in 0..ctx.element_count() {
            let value = match &masked {
                Some(bits) if bits[addr] => Value::Undefined,
                _ => src.get(ctx.elem, addr),
            };
            kind.store_direct(&ctx, addr, &value)?;
        }
        Ok(())
    }

    /// Undo one `attach` or `allocate`.
    ///
    /// The outermost detach of a view frees its private buffer and
    /// detaches its mask and parent. Detaching an array that is not
    /// attached fails with `Reentrancy`.
    pub fn detach(&self, id: ArrayId) -> Result<(), ArrayError> {
        let header = self.header(id)?;
        if header.depth == 0 {
            return Err(ArrayError::Reentrancy {
                array: id,
                reason: "detach without matching attach".into(),
            });
        }
        {
            let mut inner = self.inner.borrow_mut();
            let node = inner.node_mut(id)?;
            node.attach_depth -= 1;
            if !header.is_view || node.attach_depth > 0 {
                return Ok(());
            }
            node.buffer = None;
        }
        if let Some(m) = header.mask {
            self.detach(m)?;
        }
        if let Some(p) = header.parent {
            self.detach(p)?;
        }
        Ok(())
    }

    /// Copy the current contents of `id` into `out` (one element per view
    /// element, row-major).
    ///
    /// An attached array copies its materialized buffer; a detached view
    /// gathers straight from its source without keeping a private buffer.
    pub fn copy_into(&self, id: ArrayId, out: &mut Buffer) -> Result<(), ArrayError> {
        let header = self.header(id)?;
        if out.len() != header.count {
            return Err(ArrayError::ShapeMismatch {
                expected: header.count,
                received: out.len(),
            });
        }
        if header.attached {
            let inner = self.inner.borrow();
            let own = inner
                .node(id)?
                .buffer
                .as_ref()
                .ok_or(ArrayError::NotAttached { array: id })?;
            out.copy_run(0, own, 0, header.count);
            return Ok(());
        }
        if !header.is_view {
            return Err(ArrayError::NotAttached { array: id });
        }
        match header.parent {
            Some(p) => {
                self.attach(p)?;
                let result = self.gather_to(id, out);
                self.detach(p)?;
                result
            }
            None => self.gather_to(id, out),
        }
    }

    /// Write `src` into `id` as if it had been stored element by element.
    ///
    /// A detached view scatters straight into its source; an attached one
    /// also refreshes its private buffer.
    pub fn sync_from(&self, id: ArrayId, src: &Buffer) -> Result<(), ArrayError> {
        let header = self.header(id)?;
        if src.len() != header.count {
            return Err(ArrayError::ShapeMismatch {
                expected: header.count,
                received: src.len(),
            });
        }
        self.ensure_writable(id)?;
        if header.attached {
            let mut inner = self.inner.borrow_mut();
            if let Some(own) = inner.node_mut(id)?.buffer.as_mut() {
                own.copy_run(0, src, 0, header.count);
            }
        }
        if !header.is_view {
            return Ok(());
        }
        match header.parent {
            Some(p) => {
                self.attach(p)?;
                let result = self
                    .write_back(id, Some(p), src)
                    .and_then(|()| self.sync(p));
                self.detach(p)?;
                result
            }
            None => self.write_back(id, None, src),
        }
    }

    /// Re-gather an attached view from its source, discarding writes that
    /// were not synced. Needed after a kind's parameters change in place.
    /// No-op on entities and detached views.
    pub fn refresh(&self, id: ArrayId) -> Result<(), ArrayError> {
        let header = self.header(id)?;
        if !header.is_view || !header.attached {
            return Ok(());
        }
        let buffer = self.gather_view(id)?;
        self.inner.borrow_mut().node_mut(id)?.buffer = Some(buffer);
        if let Some(m) = header.mask {
            self.refresh(m)?;
        }
        Ok(())
    }

    /// Set every element of `id` to `value`.
    ///
    /// Filling with [`Value::Undefined`] masks every element instead.
    pub fn fill(&self, id: ArrayId, value: &Value) -> Result<(), ArrayError> {
        self.ensure_writable(id)?;
        if value.is_undefined() {
            let mask = self.create_mask(id)?;
            return self.fill(mask, &Value::Bool(true));
        }
        let header = self.header(id)?;
        if !header.is_view {
            let mut inner = self.inner.borrow_mut();
            let node = inner.node_mut(id)?;
            let elem = node.elem;
            return match node.buffer.as_mut() {
                Some(buffer) => buffer.fill(elem, value),
                None => Err(ArrayError::NotAttached { array: id }),
            };
        }
        self.attach(id)?;
        let result = self.fill_attached(id, value).and_then(|()| self.sync(id));
        self.detach(id)?;
        result
    }

    fn fill_attached(&self, id: ArrayId, value: &Value) -> Result<(), ArrayError> {
        let mut inner = self.inner.borrow_mut();
        let node = inner.node_mut(id)?;
        let elem = node.elem;
        node.buffer
            .as_mut()
            .ok_or(ArrayError::NotAttached { array: id })?
            .fill(elem, value)
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use tessera_core::{BuiltinKind, ElementKind, ElementType, KindTag};

    use super::*;
    use crate::arena::ViewSpec;
    use crate::kind::{MapContext, Mapping, Source, ViewKind};

    /// Every other parent element, starting at `offset`.
    #[derive(Debug)]
    struct Stride2 {
        offset: usize,
    }

    impl ViewKind for Stride2 {
        fn tag(&self) -> KindTag {
            BuiltinKind::Refer.tag()
        }
        fn mapping(&self) -> Mapping {
            Mapping::Addr
        }
        fn map_addr(&self, _ctx: &MapContext<'_>, addr: usize) -> Result<Source, ArrayError> {
            Ok(Source::Parent(self.offset + 2 * addr))
        }
        fn mirror_for_mask(&self) -> Option<Box<dyn ViewKind>> {
            Some(Box::new(Stride2 {
                offset: self.offset,
            }))
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn int32() -> ElementType {
        ElementType::new(ElementKind::Int32)
    }

    fn setup(arena: &ArrayArena) -> (ArrayId, ArrayId) {
        let values: Vec<Value> = (0..6).map(Value::from).collect();
        let parent = arena.entity_from_values(&[6], int32(), &values).unwrap();
        let view = arena
            .create_view(ViewSpec::new(
                Some(parent),
                &[3],
                int32(),
                Box::new(Stride2 { offset: 1 }),
            ))
            .unwrap();
        (parent, view)
    }

    #[test]
    fn attach_gathers_and_detach_frees() {
        let arena = ArrayArena::default();
        let (_, view) = setup(&arena);
        assert!(!arena.is_attached(view).unwrap());
        arena.attach(view).unwrap();
        assert!(arena.is_attached(view).unwrap());
        let mut out = Buffer::zeroed(int32(), 3);
        arena.copy_into(view, &mut out).unwrap();
        assert_eq!(out.get(int32(), 2), Value::Int(5));
        arena.detach(view).unwrap();
        assert!(!arena.is_attached(view).unwrap());
        assert_eq!(arena.metrics().attaches, 1);
    }

    #[test]
    fn failed_gather_unwinds_the_chain() {
        let arena = ArrayArena::default();
        let (parent, view) = setup(&arena);
        let outer = arena
            .create_view(ViewSpec::new(Some(view), &[2], int32(), Box::new(Stride2 { offset: 0 })))
            .unwrap();
        // `view` now maps its last element past the parent's end.
        arena.resize(parent, &[4]).unwrap();
        assert!(arena.attach(outer).is_err());
        assert!(!arena.is_attached(view).unwrap());
        assert_eq!(arena.attach_depth(view).unwrap(), 0);
        assert_eq!(arena.attach_depth(outer).unwrap(), 0);

        arena.resize(parent, &[6]).unwrap();
        arena.attach(outer).unwrap();
        assert_eq!(arena.attach_depth(view).unwrap(), 1);
        arena.detach(outer).unwrap();
        assert!(!arena.is_attached(view).unwrap());
    }

    #[test]
    fn nested_attach_needs_matching_detaches() {
        let arena = ArrayArena::default();
        let (_, view) = setup(&arena);
        arena.attach(view).unwrap();
        arena.attach(view).unwrap();
        arena.detach(view).unwrap();
        assert!(arena.is_attached(view).unwrap());
        arena.detach(view).unwrap();
        assert!(!arena.is_attached(view).unwrap());
        assert!(matches!(
            arena.detach(view),
            Err(ArrayError::Reentrancy { .. })
        ));
        assert_eq!(arena.metrics().gathers, 1);
    }

    #[test]
    fn attach_depth_is_bounded() {
        let arena = ArrayArena::new(crate::ArenaConfig {
            max_attach_depth: 2,
            ..Default::default()
        })
        .unwrap();
        let (_, view) = setup(&arena);
        arena.attach(view).unwrap();
        arena.attach(view).unwrap();
        assert!(matches!(
            arena.attach(view),
            Err(ArrayError::Reentrancy { .. })
        ));
        assert_eq!(arena.attach_depth(view).unwrap(), 2);
    }

    #[test]
    fn sync_writes_back_through_mapping() {
        let arena = ArrayArena::default();
        let (parent, view) = setup(&arena);
        arena.attach(view).unwrap();
        arena.store(view, 0, &Value::Int(-1)).unwrap();
        assert_eq!(arena.fetch(parent, 1).unwrap(), Value::Int(1));
        arena.sync(view).unwrap();
        assert_eq!(arena.fetch(parent, 1).unwrap(), Value::Int(-1));
        arena.detach(view).unwrap();
    }

    #[test]
    fn sync_requires_attach() {
        let arena = ArrayArena::default();
        let (_, view) = setup(&arena);
        assert!(matches!(
            arena.sync(view),
            Err(ArrayError::NotAttached { .. })
        ));
    }

    #[test]
    fn allocate_does_not_copy() {
        let arena = ArrayArena::default();
        let (_, view) = setup(&arena);
        arena.allocate(view).unwrap();
        let mut out = Buffer::zeroed(int32(), 3);
        arena.copy_into(view, &mut out).unwrap();
        assert_eq!(out, Buffer::zeroed(int32(), 3));
        arena.detach(view).unwrap();
    }

    #[test]
    fn sync_from_and_copy_into_detached() {
        let arena = ArrayArena::default();
        let (parent, view) = setup(&arena);
        let mut src = Buffer::zeroed(int32(), 3);
        src.fill(int32(), &Value::Int(9)).unwrap();
        arena.sync_from(view, &src).unwrap();
        assert_eq!(arena.fetch(parent, 0).unwrap(), Value::Int(0));
        assert_eq!(arena.fetch(parent, 3).unwrap(), Value::Int(9));
        let mut out = Buffer::zeroed(int32(), 3);
        arena.copy_into(view, &mut out).unwrap();
        assert_eq!(out, src);
        assert!(!arena.is_attached(view).unwrap());
    }

    #[test]
    fn fill_view_touches_only_mapped_elements() {
        let arena = ArrayArena::default();
        let (parent, view) = setup(&arena);
        arena.fill(view, &Value::Int(7)).unwrap();
        assert_eq!(arena.fetch(parent, 4).unwrap(), Value::Int(4));
        assert_eq!(arena.fetch(parent, 5).unwrap(), Value::Int(7));
        assert_eq!(arena.attach_depth(view).unwrap(), 0);
    }

    #[test]
    fn fill_undefined_masks_everything() {
        let arena = ArrayArena::default();
        let (parent, view) = setup(&arena);
        arena.fill(view, &Value::Undefined).unwrap();
        assert_eq!(arena.count_masked(view).unwrap(), 3);
        assert_eq!(arena.masked_positions(parent).unwrap(), vec![1, 3, 5]);
    }

    #[test]
    fn suppressed_sync_is_skipped() {
        let arena = ArrayArena::default();
        let (parent, view) = setup(&arena);
        arena.attach(view).unwrap();
        arena.store(view, 1, &Value::Int(42)).unwrap();
        {
            let _quiet = arena.suppress_sync(view).unwrap();
            arena.sync(view).unwrap();
            assert_eq!(arena.fetch(parent, 3).unwrap(), Value::Int(3));
        }
        arena.sync(view).unwrap();
        assert_eq!(arena.fetch(parent, 3).unwrap(), Value::Int(42));
        arena.detach(view).unwrap();
    }

    #[test]
    fn refresh_picks_up_new_offset() {
        let arena = ArrayArena::default();
        let (_, view) = setup(&arena);
        arena.attach(view).unwrap();
        arena
            .with_kind_mut::<Stride2, _>(view, |k| k.offset = 0)
            .unwrap();
        assert_eq!(arena.fetch(view, 1).unwrap(), Value::Int(3));
        arena.refresh(view).unwrap();
        assert_eq!(arena.fetch(view, 1).unwrap(), Value::Int(2));
        arena.detach(view).unwrap();
    }

    #[test]
    fn release_refused_while_views_alive() {
        let arena = ArrayArena::default();
        let (parent, view) = setup(&arena);
        assert!(matches!(
            arena.release(parent),
            Err(ArrayError::InUse { dependants: 1, .. })
        ));
        arena.attach(view).unwrap();
        assert!(matches!(
            arena.release(view),
            Err(ArrayError::Reentrancy { .. })
        ));
        arena.detach(view).unwrap();
        arena.release(view).unwrap();
        arena.release(parent).unwrap();
        assert!(arena.is_empty());
    }
}
