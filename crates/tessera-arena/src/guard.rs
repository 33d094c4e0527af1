//! Scoped attach and sync-suppression guards.
//!
//! [`AttachGuard`] pairs an `attach` with its `detach`; guards nest freely
//! because only the outermost attach of a view does real work. Drop never
//! panics: a failing detach is reported on stderr.

use tessera_core::{ArrayError, ArrayId};

use crate::arena::ArrayArena;

/// Keeps an array attached for the guard's lifetime.
#[must_use = "the array is detached as soon as the guard is dropped"]
pub struct AttachGuard<'a> {
    arena: &'a ArrayArena,
    id: ArrayId,
}

impl AttachGuard<'_> {
    /// The attached array.
    pub fn id(&self) -> ArrayId {
        self.id
    }

    /// Write the attached contents back to the source.
    pub fn sync(&self) -> Result<(), ArrayError> {
        self.arena.sync(self.id)
    }
}

impl Drop for AttachGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.arena.detach(self.id) {
            eprintln!("tessera: AttachGuard failed to detach {}: {err}", self.id);
        }
    }
}

/// Makes `sync` a no-op on one view for the guard's lifetime.
///
/// Used when a view is written inside an outer scope that will itself
/// sync the data to its final destination.
#[must_use = "sync is re-enabled as soon as the guard is dropped"]
pub struct SyncSuppressGuard<'a> {
    arena: &'a ArrayArena,
    id: ArrayId,
}

impl Drop for SyncSuppressGuard<'_> {
    fn drop(&mut self) {
        match self.arena.inner.borrow_mut().node_mut(self.id) {
            Ok(node) => node.suppress_sync = node.suppress_sync.saturating_sub(1),
            Err(err) => eprintln!("tessera: SyncSuppressGuard lost {}: {err}", self.id),
        }
    }
}

impl ArrayArena {
    /// Attach `id` and return a guard that detaches it on drop.
    pub fn attach_scope(&self, id: ArrayId) -> Result<AttachGuard<'_>, ArrayError> {
        self.attach(id)?;
        Ok(AttachGuard { arena: self, id })
    }

    /// Suppress `sync` on `id` until the returned guard is dropped.
    pub fn suppress_sync(&self, id: ArrayId) -> Result<SyncSuppressGuard<'_>, ArrayError> {
        self.inner.borrow_mut().node_mut(id)?.suppress_sync += 1;
        Ok(SyncSuppressGuard { arena: self, id })
    }
}

#[cfg(test)]
mod tests {
    use tessera_core::{ElementKind, ElementType};

    use super::*;

    #[test]
    fn guards_nest() {
        let arena = ArrayArena::default();
        let a = arena.entity(&[2], ElementType::new(ElementKind::UInt8)).unwrap();
        {
            let outer = arena.attach_scope(a).unwrap();
            {
                let _inner = arena.attach_scope(a).unwrap();
                assert_eq!(arena.attach_depth(a).unwrap(), 2);
            }
            assert_eq!(arena.attach_depth(a).unwrap(), 1);
            assert_eq!(outer.id(), a);
            outer.sync().unwrap();
        }
        assert_eq!(arena.attach_depth(a).unwrap(), 0);
    }

    #[test]
    fn suppress_guard_restores_counter() {
        let arena = ArrayArena::default();
        let a = arena.entity(&[2], ElementType::new(ElementKind::UInt8)).unwrap();
        {
            let _g1 = arena.suppress_sync(a).unwrap();
            let _g2 = arena.suppress_sync(a).unwrap();
            assert_eq!(arena.inner.borrow().node(a).unwrap().suppress_sync, 2);
        }
        assert_eq!(arena.inner.borrow().node(a).unwrap().suppress_sync, 0);
    }

    #[test]
    fn guard_drop_after_release_does_not_panic() {
        let arena = ArrayArena::default();
        let a = arena.entity(&[1], ElementType::new(ElementKind::UInt8)).unwrap();
        let guard = arena.attach_scope(a).unwrap();
        // Releasing an attached array is refused, so the guard still detaches.
        assert!(arena.release(a).is_err());
        drop(guard);
        arena.release(a).unwrap();
    }
}
