//! Strongly-typed identifiers for arrays and array kinds.

use std::fmt;

/// Handle to an array living in an arena.
///
/// A handle is generation-scoped: releasing an array bumps the generation of
/// its slot, so an old handle to a reused slot is detected in O(1) instead of
/// silently aliasing the new occupant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArrayId {
    index: u32,
    generation: u32,
}

impl ArrayId {
    /// Create a handle from a slot index and generation.
    pub fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index inside the owning arena.
    pub fn index(&self) -> usize {
        self.index as usize
    }

    /// Generation of the slot when this handle was issued.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for ArrayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

/// Identifies which operation table (view kind) applies to an array.
///
/// Tags are handed out by the [`KindRegistry`](crate::kind::KindRegistry) in
/// registration order. Code must never hard-code tag numbers; look kinds up
/// by name or keep the tag returned at registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KindTag(pub u16);

impl fmt::Display for KindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match crate::kind::registry().name(*self) {
            Some(name) => write!(f, "{name}"),
            None => write!(f, "kind#{}", self.0),
        }
    }
}

impl From<u16> for KindTag {
    fn from(v: u16) -> Self {
        Self(v)
    }
}
