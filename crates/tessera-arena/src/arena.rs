//! The array arena: node storage, generational handles and lifecycle.
//!
//! Every array of a session lives in one [`ArrayArena`]. Views refer to
//! their parent by [`ArrayId`]; a slot's generation is bumped on release,
//! so a handle that outlives its array is rejected with `StaleHandle`
//! instead of aliasing whatever reuses the slot.
//!
//! The arena is a single-threaded object. All operations take `&self` and
//! borrow the node table through a `RefCell` for short, non-overlapping
//! stretches; recursion over parents never holds a borrow across the
//! recursive call. Scoped guards can therefore coexist with further
//! arena calls.

use std::cell::RefCell;

use smallvec::SmallVec;
use tessera_core::shape::{element_count, validate_shape};
use tessera_core::{
    ArrayError, ArrayId, Buffer, BuiltinKind, ElementType, KindTag, Shape, Value,
};

use crate::config::ArenaConfig;
use crate::kind::{MapContext, ViewKind};
use crate::metrics::ArenaMetrics;

/// What an array is for, as far as mask recursion is concerned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Role {
    /// Ordinary array; may carry a mask.
    Normal,
    /// The mask of `owner`; never carries a mask itself.
    Mask {
        /// The array this mask belongs to.
        owner: ArrayId,
    },
    /// Raw-value projection; never carries a mask.
    ValueOnly,
}

pub(crate) struct ViewState {
    pub(crate) parent: Option<ArrayId>,
    pub(crate) kind: Box<dyn ViewKind>,
}

pub(crate) enum Body {
    Entity,
    View(ViewState),
}

pub(crate) struct Node {
    pub(crate) tag: KindTag,
    pub(crate) elem: ElementType,
    pub(crate) shape: Shape,
    pub(crate) buffer: Option<Buffer>,
    pub(crate) mask: Option<ArrayId>,
    pub(crate) role: Role,
    /// Sticky: once resolved read-only, never re-derived.
    pub(crate) read_only: bool,
    pub(crate) attach_depth: usize,
    pub(crate) suppress_sync: usize,
    /// Live views (including mask mirrors) whose parent is this array.
    pub(crate) dependants: usize,
    pub(crate) body: Body,
}

impl Node {
    pub(crate) fn element_count(&self) -> usize {
        element_count(&self.shape)
    }

    pub(crate) fn view(&self) -> Option<&ViewState> {
        match &self.body {
            Body::View(view) => Some(view),
            Body::Entity => None,
        }
    }

    pub(crate) fn parent(&self) -> Option<ArrayId> {
        self.view().and_then(|v| v.parent)
    }
}

struct Slot {
    generation: u32,
    node: Option<Node>,
}

#[derive(Default)]
pub(crate) struct ArenaInner {
    slots: Vec<Slot>,
    free: Vec<u32>,
    pub(crate) metrics: ArenaMetrics,
}

impl ArenaInner {
    pub(crate) fn node(&self, id: ArrayId) -> Result<&Node, ArrayError> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.node.as_ref())
            .ok_or(ArrayError::StaleHandle { array: id })
    }

    pub(crate) fn node_mut(&mut self, id: ArrayId) -> Result<&mut Node, ArrayError> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.node.as_mut())
            .ok_or(ArrayError::StaleHandle { array: id })
    }

    /// Header of `id` and its parent, ready for a kind to map against.
    pub(crate) fn context(&self, id: ArrayId) -> Result<(MapContext<'_>, &dyn ViewKind), ArrayError> {
        let node = self.node(id)?;
        let view = node.view().ok_or(ArrayError::KindContract {
            kind: node.tag,
            operation: "view mapping",
        })?;
        let (parent_shape, parent_elem) = match view.parent {
            Some(p) => {
                let parent = self.node(p)?;
                (parent.shape.as_slice(), Some(parent.elem))
            }
            None => (&[][..], None),
        };
        let ctx = MapContext {
            array: id,
            shape: &node.shape,
            elem: node.elem,
            parent_shape,
            parent_elem,
        };
        Ok((ctx, view.kind.as_ref()))
    }

    fn insert(&mut self, node: Node) -> ArrayId {
        self.metrics.live_arrays += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            return ArrayId::new(index, slot.generation);
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        ArrayId::new(index, 0)
    }

    fn remove(&mut self, id: ArrayId) -> Result<Node, ArrayError> {
        self.node(id)?;
        let slot = &mut self.slots[id.index()];
        let node = slot.node.take().ok_or(ArrayError::StaleHandle { array: id })?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index() as u32);
        self.metrics.live_arrays -= 1;
        Ok(node)
    }
}

/// Description of a new view, handed to [`ArrayArena::create_view`].
pub struct ViewSpec {
    /// Parent array; `None` only for parentless kinds.
    pub parent: Option<ArrayId>,
    /// Shape of the view.
    pub shape: Shape,
    /// Element type of the view.
    pub elem: ElementType,
    /// The kind's operation table and parameters.
    pub kind: Box<dyn ViewKind>,
    /// Whether the view is a raw-value projection that never carries a mask.
    pub value_only: bool,
}

impl ViewSpec {
    /// A view of `parent` with the given header.
    pub fn new(
        parent: Option<ArrayId>,
        shape: &[usize],
        elem: ElementType,
        kind: Box<dyn ViewKind>,
    ) -> Self {
        Self {
            parent,
            shape: SmallVec::from_slice(shape),
            elem,
            kind,
            value_only: false,
        }
    }

    /// Mark the view as a raw-value projection.
    pub fn value_only(mut self) -> Self {
        self.value_only = true;
        self
    }
}

/// Owner of every array in a session.
pub struct ArrayArena {
    config: ArenaConfig,
    pub(crate) inner: RefCell<ArenaInner>,
}

impl ArrayArena {
    /// Create an arena with the given configuration.
    pub fn new(config: ArenaConfig) -> Result<Self, ArrayError> {
        config.validate()?;
        Ok(Self {
            config,
            inner: RefCell::new(ArenaInner::default()),
        })
    }

    /// The arena's configuration.
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Snapshot of the cumulative counters.
    pub fn metrics(&self) -> ArenaMetrics {
        self.inner.borrow().metrics.clone()
    }

    /// Number of live arrays, masks included.
    pub fn len(&self) -> usize {
        self.inner.borrow().metrics.live_arrays
    }

    /// Whether the arena holds no arrays.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `id` refers to a live array.
    pub fn contains(&self, id: ArrayId) -> bool {
        self.inner.borrow().node(id).is_ok()
    }

    // ── Construction ────────────────────────────────────────────

    /// Create a zero-filled entity array (host elements start as `Nil`).
    pub fn entity(&self, shape: &[usize], elem: ElementType) -> Result<ArrayId, ArrayError> {
        validate_shape(shape, self.config.max_rank)?;
        let buffer = Buffer::zeroed(elem, element_count(shape));
        Ok(self.insert_entity(shape, elem, buffer, Role::Normal))
    }

    /// Create an entity array holding `values` in row-major order.
    pub fn entity_from_values(
        &self,
        shape: &[usize],
        elem: ElementType,
        values: &[Value],
    ) -> Result<ArrayId, ArrayError> {
        validate_shape(shape, self.config.max_rank)?;
        let count = element_count(shape);
        if values.len() != count {
            return Err(ArrayError::ShapeMismatch {
                expected: count,
                received: values.len(),
            });
        }
        let mut buffer = Buffer::zeroed(elem, count);
        let mut undefined = Vec::new();
        for (addr, value) in values.iter().enumerate() {
            if value.is_undefined() {
                undefined.push(addr);
            } else {
                buffer.set(elem, addr, value)?;
            }
        }
        let id = self.insert_entity(shape, elem, buffer, Role::Normal);
        for addr in undefined {
            self.set_masked(id, addr, true)?;
        }
        Ok(id)
    }

    /// A one-element entity holding `value`, for broadcasting.
    pub fn scalar(&self, elem: ElementType, value: Value) -> Result<ArrayId, ArrayError> {
        self.entity_from_values(&[1], elem, &[value])
    }

    pub(crate) fn insert_entity(
        &self,
        shape: &[usize],
        elem: ElementType,
        buffer: Buffer,
        role: Role,
    ) -> ArrayId {
        let node = Node {
            tag: BuiltinKind::Entity.tag(),
            elem,
            shape: SmallVec::from_slice(shape),
            buffer: Some(buffer),
            mask: None,
            role,
            read_only: false,
            attach_depth: 0,
            suppress_sync: 0,
            dependants: 0,
            body: Body::Entity,
        };
        self.inner.borrow_mut().insert(node)
    }

    /// Register a view. The kind is validated against its parent's current
    /// header before the view is created.
    pub fn create_view(&self, spec: ViewSpec) -> Result<ArrayId, ArrayError> {
        let role = if spec.value_only {
            Role::ValueOnly
        } else {
            Role::Normal
        };
        self.insert_view(spec, role)
    }

    pub(crate) fn insert_view(&self, spec: ViewSpec, role: Role) -> Result<ArrayId, ArrayError> {
        validate_shape(&spec.shape, self.config.max_rank)?;
        let tag = spec.kind.tag();
        let mut inner = self.inner.borrow_mut();
        if let Some(p) = spec.parent {
            let parent = inner.node(p)?;
            let ctx = MapContext {
                array: p,
                shape: &spec.shape,
                elem: spec.elem,
                parent_shape: &parent.shape,
                parent_elem: Some(parent.elem),
            };
            spec.kind.validate(&ctx)?;
            inner.node_mut(p)?.dependants += 1;
        }
        let node = Node {
            tag,
            elem: spec.elem,
            shape: spec.shape,
            buffer: None,
            mask: None,
            role,
            read_only: false,
            attach_depth: 0,
            suppress_sync: 0,
            dependants: 0,
            body: Body::View(ViewState {
                parent: spec.parent,
                kind: spec.kind,
            }),
        };
        Ok(inner.insert(node))
    }

    // ── Header queries ──────────────────────────────────────────

    /// Shape of `id`.
    pub fn shape(&self, id: ArrayId) -> Result<Shape, ArrayError> {
        Ok(self.inner.borrow().node(id)?.shape.clone())
    }

    /// Element type of `id`.
    pub fn element(&self, id: ArrayId) -> Result<ElementType, ArrayError> {
        Ok(self.inner.borrow().node(id)?.elem)
    }

    /// Number of elements of `id`.
    pub fn element_count(&self, id: ArrayId) -> Result<usize, ArrayError> {
        Ok(self.inner.borrow().node(id)?.element_count())
    }

    /// Rank of `id`.
    pub fn rank(&self, id: ArrayId) -> Result<usize, ArrayError> {
        Ok(self.inner.borrow().node(id)?.shape.len())
    }

    /// Kind tag of `id`.
    pub fn kind_tag(&self, id: ArrayId) -> Result<KindTag, ArrayError> {
        Ok(self.inner.borrow().node(id)?.tag)
    }

    /// Parent of a view; `None` for entities and parentless views.
    pub fn parent(&self, id: ArrayId) -> Result<Option<ArrayId>, ArrayError> {
        Ok(self.inner.borrow().node(id)?.parent())
    }

    /// Whether `id` is a view rather than an entity.
    pub fn is_view(&self, id: ArrayId) -> Result<bool, ArrayError> {
        Ok(self.inner.borrow().node(id)?.view().is_some())
    }

    /// Whether `id` currently has a materialized buffer.
    pub fn is_attached(&self, id: ArrayId) -> Result<bool, ArrayError> {
        Ok(self.inner.borrow().node(id)?.buffer.is_some())
    }

    /// Current attach nesting of `id`.
    pub fn attach_depth(&self, id: ArrayId) -> Result<usize, ArrayError> {
        Ok(self.inner.borrow().node(id)?.attach_depth)
    }

    /// Whether `id` is the mask of another array.
    pub fn is_mask(&self, id: ArrayId) -> Result<bool, ArrayError> {
        Ok(matches!(
            self.inner.borrow().node(id)?.role,
            Role::Mask { .. }
        ))
    }

    /// Whether `id` is a raw-value projection.
    pub fn is_value_only(&self, id: ArrayId) -> Result<bool, ArrayError> {
        Ok(self.inner.borrow().node(id)?.role == Role::ValueOnly)
    }

    /// Run `f` on the concrete kind of view `id`.
    ///
    /// Fails with `KindContract` if `id` is not a view of kind `K`.
    pub fn with_kind<K: ViewKind, R>(
        &self,
        id: ArrayId,
        f: impl FnOnce(&K) -> R,
    ) -> Result<R, ArrayError> {
        let inner = self.inner.borrow();
        let node = inner.node(id)?;
        node.view()
            .and_then(|v| v.kind.as_any().downcast_ref::<K>())
            .map(f)
            .ok_or(ArrayError::KindContract {
                kind: node.tag,
                operation: "downcast",
            })
    }

    /// Run `f` on the concrete kind of view `id`, mutably.
    ///
    /// The caller is responsible for re-materializing an attached view
    /// whose mapping `f` changed.
    pub fn with_kind_mut<K: ViewKind, R>(
        &self,
        id: ArrayId,
        f: impl FnOnce(&mut K) -> R,
    ) -> Result<R, ArrayError> {
        let mut inner = self.inner.borrow_mut();
        let node = inner.node_mut(id)?;
        let tag = node.tag;
        match &mut node.body {
            Body::View(view) => view
                .kind
                .as_any_mut()
                .downcast_mut::<K>()
                .map(f)
                .ok_or(ArrayError::KindContract {
                    kind: tag,
                    operation: "downcast",
                }),
            Body::Entity => Err(ArrayError::KindContract {
                kind: tag,
                operation: "downcast",
            }),
        }
    }

    /// Whether writes to `id` are refused.
    ///
    /// An array is read-only if it was frozen, if its kind is read-only,
    /// if its parent is read-only, or (for masks) if its owner is. A
    /// positive answer is cached on the node.
    pub fn is_read_only(&self, id: ArrayId) -> Result<bool, ArrayError> {
        let (cached, inherent, parent, owner) = {
            let inner = self.inner.borrow();
            let node = inner.node(id)?;
            let owner = match node.role {
                Role::Mask { owner } => Some(owner),
                _ => None,
            };
            (
                node.read_only,
                node.view().is_some_and(|v| v.kind.read_only()),
                node.parent(),
                owner,
            )
        };
        if cached {
            return Ok(true);
        }
        let mut read_only = inherent;
        if !read_only {
            if let Some(p) = parent {
                read_only = self.is_read_only(p)?;
            }
        }
        if !read_only {
            if let Some(o) = owner {
                read_only = self.is_read_only(o)?;
            }
        }
        if read_only {
            self.inner.borrow_mut().node_mut(id)?.read_only = true;
        }
        Ok(read_only)
    }

    /// Mark `id` read-only. Views of it become read-only too.
    pub fn freeze(&self, id: ArrayId) -> Result<(), ArrayError> {
        self.inner.borrow_mut().node_mut(id)?.read_only = true;
        Ok(())
    }

    pub(crate) fn ensure_writable(&self, id: ArrayId) -> Result<(), ArrayError> {
        if self.is_read_only(id)? {
            return Err(ArrayError::ReadOnly { array: id });
        }
        Ok(())
    }

    // ── Lifecycle ───────────────────────────────────────────────

    /// Free `id` and its mask.
    ///
    /// Refused with `InUse` while views of the array (or of its mask) are
    /// alive, and with `Reentrancy` while the array is attached.
    pub fn release(&self, id: ArrayId) -> Result<(), ArrayError> {
        let (mask, dependants, depth) = {
            let inner = self.inner.borrow();
            let node = inner.node(id)?;
            let mask_dependants = match node.mask {
                Some(m) => inner.node(m)?.dependants,
                None => 0,
            };
            (node.mask, node.dependants + mask_dependants, node.attach_depth)
        };
        if dependants > 0 {
            return Err(ArrayError::InUse {
                array: id,
                dependants,
            });
        }
        if depth > 0 {
            return Err(ArrayError::Reentrancy {
                array: id,
                reason: "released while attached".into(),
            });
        }
        if let Some(m) = mask {
            self.release_mask(m)?;
        }
        let node = self.inner.borrow_mut().remove(id)?;
        if let Some(p) = node.parent() {
            self.inner.borrow_mut().node_mut(p)?.dependants -= 1;
        }
        Ok(())
    }

    fn release_mask(&self, mask: ArrayId) -> Result<(), ArrayError> {
        // A mask mirror is attached exactly as long as its owner; the owner
        // is detached here, so the mask is too.
        let node = self.inner.borrow_mut().remove(mask)?;
        if let Some(p) = node.parent() {
            self.inner.borrow_mut().node_mut(p)?.dependants -= 1;
        }
        Ok(())
    }

    /// Change the shape of an entity, preserving the row-major prefix of
    /// its data. Views of the entity revalidate on their next use.
    pub fn resize(&self, id: ArrayId, shape: &[usize]) -> Result<(), ArrayError> {
        validate_shape(shape, self.config.max_rank)?;
        let mask = {
            let mut inner = self.inner.borrow_mut();
            let node = inner.node_mut(id)?;
            if node.view().is_some() {
                return Err(ArrayError::KindContract {
                    kind: node.tag,
                    operation: "resize",
                });
            }
            if node.read_only {
                return Err(ArrayError::ReadOnly { array: id });
            }
            node.shape = SmallVec::from_slice(shape);
            let count = node.element_count();
            if let Some(buffer) = node.buffer.as_mut() {
                buffer.resize(count);
            }
            node.mask
        };
        if let Some(m) = mask {
            self.resize_mask(m, shape)?;
        }
        Ok(())
    }

    fn resize_mask(&self, mask: ArrayId, shape: &[usize]) -> Result<(), ArrayError> {
        let mut inner = self.inner.borrow_mut();
        let node = inner.node_mut(mask)?;
        node.shape = SmallVec::from_slice(shape);
        let count = node.element_count();
        if let Some(buffer) = node.buffer.as_mut() {
            buffer.resize(count);
        }
        Ok(())
    }

    /// Deep-copy `id` (value and mask) into a fresh entity.
    pub fn clone_array(&self, id: ArrayId) -> Result<ArrayId, ArrayError> {
        let (shape, elem, count, value_only) = {
            let inner = self.inner.borrow();
            let node = inner.node(id)?;
            (
                node.shape.clone(),
                node.elem,
                node.element_count(),
                node.role == Role::ValueOnly,
            )
        };
        let mut buffer = Buffer::zeroed(elem, count);
        self.copy_into(id, &mut buffer)?;
        let copy = self.insert_entity(&shape, elem, buffer, Role::Normal);
        if !value_only {
            if let Some(bits) = self.read_mask(id)? {
                self.write_mask(copy, &bits)?;
            }
        }
        Ok(copy)
    }

    // ── Raw buffer access for iteration engines ─────────────────

    /// Move the materialized buffer out of `id`.
    ///
    /// While taken, the array reports `NotAttached` for buffer access.
    /// Return it with [`ArrayArena::restore_buffer`].
    pub fn take_buffer(&self, id: ArrayId) -> Result<Buffer, ArrayError> {
        self.inner
            .borrow_mut()
            .node_mut(id)?
            .buffer
            .take()
            .ok_or(ArrayError::NotAttached { array: id })
    }

    /// Put back a buffer taken with [`ArrayArena::take_buffer`].
    pub fn restore_buffer(&self, id: ArrayId, buffer: Buffer) -> Result<(), ArrayError> {
        let mut inner = self.inner.borrow_mut();
        let node = inner.node_mut(id)?;
        if buffer.len() != node.element_count() {
            return Err(ArrayError::ShapeMismatch {
                expected: node.element_count(),
                received: buffer.len(),
            });
        }
        node.buffer = Some(buffer);
        Ok(())
    }
}

impl Default for ArrayArena {
    fn default() -> Self {
        Self {
            config: ArenaConfig::default(),
            inner: RefCell::new(ArenaInner::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::ElementKind;

    fn int32() -> ElementType {
        ElementType::new(ElementKind::Int32)
    }

    #[test]
    fn entity_is_attached_and_zeroed() {
        let arena = ArrayArena::default();
        let a = arena.entity(&[2, 3], int32()).unwrap();
        assert!(arena.is_attached(a).unwrap());
        assert_eq!(arena.element_count(a).unwrap(), 6);
        assert_eq!(arena.fetch(a, 5).unwrap(), Value::Int(0));
        assert_eq!(arena.kind_tag(a).unwrap(), BuiltinKind::Entity.tag());
    }

    #[test]
    fn rank_limits_enforced() {
        let arena = ArrayArena::default();
        assert!(matches!(
            arena.entity(&[], int32()),
            Err(ArrayError::RankOutOfRange { rank: 0, .. })
        ));
        assert!(arena.entity(&[1; 17], int32()).is_err());
    }

    #[test]
    fn released_handle_is_stale() {
        let arena = ArrayArena::default();
        let a = arena.entity(&[4], int32()).unwrap();
        arena.release(a).unwrap();
        assert!(!arena.contains(a));
        let b = arena.entity(&[4], int32()).unwrap();
        assert_eq!(a.index(), b.index());
        assert_ne!(a.generation(), b.generation());
        assert!(matches!(
            arena.fetch(a, 0),
            Err(ArrayError::StaleHandle { .. })
        ));
    }

    #[test]
    fn release_frees_mask() {
        let arena = ArrayArena::default();
        let a = arena.entity(&[3], int32()).unwrap();
        arena.create_mask(a).unwrap();
        assert_eq!(arena.len(), 2);
        arena.release(a).unwrap();
        assert!(arena.is_empty());
    }

    #[test]
    fn entity_from_values_masks_undefined() {
        let arena = ArrayArena::default();
        let a = arena
            .entity_from_values(&[3], int32(), &[Value::Int(1), Value::Undefined, Value::Int(3)])
            .unwrap();
        assert_eq!(arena.fetch(a, 1).unwrap(), Value::Undefined);
        assert_eq!(arena.count_masked(a).unwrap(), 1);
    }

    #[test]
    fn resize_keeps_prefix() {
        let arena = ArrayArena::default();
        let a = arena
            .entity_from_values(&[3], int32(), &[1.into(), 2.into(), 3.into()])
            .unwrap();
        arena.create_mask(a).unwrap();
        arena.resize(a, &[5]).unwrap();
        assert_eq!(arena.shape(a).unwrap().as_slice(), &[5]);
        assert_eq!(arena.fetch(a, 2).unwrap(), Value::Int(3));
        assert_eq!(arena.fetch(a, 4).unwrap(), Value::Int(0));
        assert_eq!(arena.count_masked(a).unwrap(), 0);
    }

    #[test]
    fn clone_copies_values_and_mask() {
        let arena = ArrayArena::default();
        let a = arena
            .entity_from_values(&[2], int32(), &[Value::Int(7), Value::Undefined])
            .unwrap();
        let b = arena.clone_array(a).unwrap();
        assert_ne!(a, b);
        assert_eq!(arena.fetch(b, 0).unwrap(), Value::Int(7));
        assert_eq!(arena.fetch(b, 1).unwrap(), Value::Undefined);
        arena.store(b, 0, &Value::Int(1)).unwrap();
        assert_eq!(arena.fetch(a, 0).unwrap(), Value::Int(7));
    }

    #[test]
    fn frozen_entity_refuses_writes() {
        let arena = ArrayArena::default();
        let a = arena.entity(&[2], int32()).unwrap();
        arena.freeze(a).unwrap();
        assert!(arena.is_read_only(a).unwrap());
        assert!(matches!(
            arena.store(a, 0, &Value::Int(1)),
            Err(ArrayError::ReadOnly { .. })
        ));
        assert!(matches!(
            arena.set_masked(a, 0, true),
            Err(ArrayError::ReadOnly { .. })
        ));
    }

    #[test]
    fn take_and_restore_buffer() {
        let arena = ArrayArena::default();
        let a = arena.entity(&[2], int32()).unwrap();
        let buf = arena.take_buffer(a).unwrap();
        assert!(matches!(
            arena.take_buffer(a),
            Err(ArrayError::NotAttached { .. })
        ));
        arena.restore_buffer(a, buf).unwrap();
        assert!(arena.is_attached(a).unwrap());
    }
}
