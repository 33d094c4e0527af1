//! Tessera: multidimensional arrays with zero-copy views, masks and
//! broadcasting kernels.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Tessera sub-crates. For most users, adding `tessera` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use tessera::prelude::*;
//!
//! let arena = ArrayArena::default();
//! let elem = ElementType::new(ElementKind::Int32);
//! let values: Vec<Value> = (0..16).map(Value::from).collect();
//! let grid = arena.entity_from_values(&[4, 4], elem, &values).unwrap();
//!
//! // Rows 1..3, every other column.
//! let block = arena.block(grid, &[1, 0], &[1, 2], &[2, 2]).unwrap();
//! assert_eq!(arena.fetch(block, 1).unwrap(), Value::Int(6));
//!
//! // Mask one element, then double the block in place. The masked
//! // element is skipped and stays masked.
//! arena.set_masked(block, 0, true).unwrap();
//! let metrics = Engine::default()
//!     .run_map(&arena, |v| Value::Int(v[0].as_i64().unwrap_or(0) * 2), &[block], block)
//!     .unwrap();
//! assert_eq!(metrics.iterations, 3);
//! assert_eq!(arena.fetch(grid, 6).unwrap(), Value::Int(12));
//! assert!(arena.is_masked(grid, 4).unwrap());
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `tessera-core` | Element kinds, values, shapes, buffers, IDs, kind registry, errors |
//! | [`arena`] | `tessera-arena` | Array arena, attach/sync/detach protocol, masks, guards |
//! | [`view`] | `tessera-view` | View kinds and the `ViewBuilder` constructors |
//! | [`engine`] | `tessera-engine` | Broadcasting kernel runs |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types (`tessera-core`).
///
/// Element kinds and their cast rules, [`types::Value`], shapes and index
/// arithmetic, [`types::Buffer`], and the [`types::ArrayError`] taxonomy.
pub use tessera_core as types;

/// Array storage and the materialization protocol (`tessera-arena`).
///
/// [`arena::ArrayArena`] owns every array; [`arena::ViewKind`] is the
/// extension point for new view kinds.
pub use tessera_arena as arena;

/// View kinds (`tessera-view`).
///
/// Construct views through [`view::ViewBuilder`], which is implemented for
/// [`arena::ArrayArena`].
pub use tessera_view as view;

/// Broadcasting iteration engine (`tessera-engine`).
///
/// [`engine::Engine::run_kernel`] for custom [`engine::Kernel`]s,
/// [`engine::Engine::run_map`] for element-wise closures.
pub use tessera_engine as engine;

/// Common imports for typical Tessera usage.
///
/// ```rust
/// use tessera::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use tessera_core::{ArrayError, ArrayId, ElementKind, ElementType, Value};

    // Arena
    pub use tessera_arena::{ArenaConfig, ArrayArena, AttachGuard};

    // Views
    pub use tessera_view::{AxisRole, Boundary, GridAxis, ViewBuilder};

    // Engine
    pub use tessera_engine::{Engine, EngineConfig, Kernel, Operand, Slot, ValueKernel};
}
