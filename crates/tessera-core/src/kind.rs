//! Process-wide registry of array kinds.
//!
//! Each array carries a [`KindTag`] identifying its kind. The registry only
//! names tags: it records a name and whether the kind is built in, and
//! dispatches nothing. The operation table itself travels with each view as
//! its boxed `ViewKind` in the arena. The registry is initialised once on
//! first use with the built-in kinds and is read-mostly afterwards; host
//! code may register additional kinds at startup with
//! [`KindRegistry::register`].

use std::sync::{OnceLock, RwLock};

use indexmap::IndexMap;

use crate::error::ArrayError;
use crate::id::KindTag;

/// The kinds shipped with the workspace.
///
/// Their tags are assigned at registry initialisation; resolve them with
/// [`BuiltinKind::tag`] rather than assuming a number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BuiltinKind {
    /// Dense owned buffer.
    Entity,
    /// Affine slice of the parent's linear address space.
    Refer,
    /// Per-axis start/step/count block.
    Block,
    /// Block with a movable origin and an out-of-range policy.
    Window,
    /// Compacted selection of parent addresses.
    Select,
    /// Per-axis index lists (fancy indexing).
    Grid,
    /// Tiled repetition along marked axes.
    Repeat,
    /// Repeat whose free axes are sized later by binding.
    UnboundRepeat,
    /// Bit field extracted from each parent element.
    Bitfield,
    /// Axis-order reversal.
    Transpose,
    /// Host callback-backed array with no parent.
    Object,
}

impl BuiltinKind {
    /// All built-in kinds, in registration order.
    pub const ALL: [BuiltinKind; 11] = [
        Self::Entity,
        Self::Refer,
        Self::Block,
        Self::Window,
        Self::Select,
        Self::Grid,
        Self::Repeat,
        Self::UnboundRepeat,
        Self::Bitfield,
        Self::Transpose,
        Self::Object,
    ];

    /// Registry name of the kind.
    pub fn name(self) -> &'static str {
        match self {
            Self::Entity => "entity",
            Self::Refer => "refer",
            Self::Block => "block",
            Self::Window => "window",
            Self::Select => "select",
            Self::Grid => "grid",
            Self::Repeat => "repeat",
            Self::UnboundRepeat => "unbound_repeat",
            Self::Bitfield => "bitfield",
            Self::Transpose => "transpose",
            Self::Object => "object",
        }
    }

    /// Tag assigned to this kind in the process-wide registry.
    pub fn tag(self) -> KindTag {
        registry()
            .lookup(self.name())
            .unwrap_or_else(|| unreachable!("built-in kind '{}' registered at init", self.name()))
    }
}

/// Descriptive entry for a registered kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KindInfo {
    /// Unique registry name.
    pub name: String,
    /// Whether the kind ships with the workspace.
    pub builtin: bool,
}

/// Maps [`KindTag`]s to names and back. Holds no behaviour.
pub struct KindRegistry {
    entries: RwLock<IndexMap<String, KindInfo>>,
}

impl KindRegistry {
    fn with_builtins() -> Self {
        let mut entries = IndexMap::with_capacity(BuiltinKind::ALL.len());
        for kind in BuiltinKind::ALL {
            entries.insert(
                kind.name().to_string(),
                KindInfo {
                    name: kind.name().to_string(),
                    builtin: true,
                },
            );
        }
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Register a host-defined kind and return its fresh tag.
    ///
    /// Returns `Err(ArrayError::InvalidConfig)` if the name is taken or the
    /// tag space is exhausted.
    pub fn register(&self, name: &str) -> Result<KindTag, ArrayError> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if entries.contains_key(name) {
            return Err(ArrayError::InvalidConfig {
                reason: format!("kind '{name}' is already registered"),
            });
        }
        let tag = u16::try_from(entries.len()).map_err(|_| ArrayError::InvalidConfig {
            reason: "kind tag space exhausted".into(),
        })?;
        entries.insert(
            name.to_string(),
            KindInfo {
                name: name.to_string(),
                builtin: false,
            },
        );
        Ok(KindTag(tag))
    }

    /// Find the tag registered under `name`.
    pub fn lookup(&self, name: &str) -> Option<KindTag> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get_index_of(name)
            .and_then(|i| u16::try_from(i).ok())
            .map(KindTag)
    }

    /// Name of the kind registered under `tag`.
    pub fn name(&self, tag: KindTag) -> Option<String> {
        self.info(tag).map(|info| info.name)
    }

    /// Full description of the kind registered under `tag`.
    pub fn info(&self, tag: KindTag) -> Option<KindInfo> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get_index(tag.0 as usize).map(|(_, info)| info.clone())
    }

    /// Number of registered kinds.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Always `false` once initialised: built-ins are registered up front.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

static REGISTRY: OnceLock<KindRegistry> = OnceLock::new();

/// The process-wide kind registry, initialised on first use.
pub fn registry() -> &'static KindRegistry {
    REGISTRY.get_or_init(KindRegistry::with_builtins)
}

/// Register a host-defined kind in the process-wide registry.
pub fn register_kind(name: &str) -> Result<KindTag, ArrayError> {
    registry().register(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_resolve_to_distinct_tags() {
        let mut tags: Vec<KindTag> = BuiltinKind::ALL.iter().map(|k| k.tag()).collect();
        tags.sort();
        tags.dedup();
        assert_eq!(tags.len(), BuiltinKind::ALL.len());
    }

    #[test]
    fn builtin_names_round_trip() {
        for kind in BuiltinKind::ALL {
            assert_eq!(registry().name(kind.tag()).as_deref(), Some(kind.name()));
            assert!(registry().info(kind.tag()).unwrap().builtin);
        }
    }

    #[test]
    fn register_custom_kind() {
        let tag = register_kind("test.custom_reverse").unwrap();
        assert_eq!(registry().lookup("test.custom_reverse"), Some(tag));
        assert!(!registry().info(tag).unwrap().builtin);
        assert_eq!(tag.to_string(), "test.custom_reverse");
    }

    #[test]
    fn duplicate_registration_rejected() {
        register_kind("test.duplicate").unwrap();
        let err = register_kind("test.duplicate").unwrap_err();
        assert!(matches!(err, ArrayError::InvalidConfig { .. }));
    }

    #[test]
    fn unknown_tag_displays_number() {
        assert_eq!(KindTag(u16::MAX).to_string(), "kind#65535");
    }
}
