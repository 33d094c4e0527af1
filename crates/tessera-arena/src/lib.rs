//! Array arena, materialization protocol and masks for Tessera.
//!
//! Every array of a session lives in an [`ArrayArena`] and is addressed by
//! a generational [`ArrayId`](tessera_core::ArrayId). Entity arrays own a
//! dense buffer; views are described by a [`ViewKind`] operation table and
//! borrow their data from a parent on demand.
//!
//! # Architecture
//!
//! ```text
//! ArrayArena
//! ├── Node table (RefCell, generational slots)
//! │   ├── Entity: shape, element type, owned Buffer, optional mask
//! │   └── View:   parent handle, Box<dyn ViewKind>, attach/suppress counters
//! ├── protocol: allocate / attach / sync / detach / copy_into / sync_from / fill
//! ├── access:   fetch / store by address or index, slice_at fast path
//! ├── mask:     lazy masks, mirrored through views; OR-merge helpers
//! └── guard:    AttachGuard, SyncSuppressGuard
//! ```
//!
//! The arena is single-threaded (`!Sync`). Parallel work happens on
//! buffers taken out of it; see [`ArrayArena::take_buffer`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

mod access;
pub mod arena;
pub mod config;
pub mod guard;
pub mod kind;
mod mask;
pub mod metrics;
mod protocol;

// Public re-exports for the primary API surface.
pub use arena::{ArrayArena, ViewSpec};
pub use config::ArenaConfig;
pub use guard::{AttachGuard, SyncSuppressGuard};
pub use kind::{
    gather_mapped, resolve, scatter_mapped, ElementTransform, MapContext, Mapping, Source,
    ViewKind,
};
pub use metrics::ArenaMetrics;
