//! View kinds for the Tessera array engine.
//!
//! Each kind implements [`ViewKind`](tessera_arena::ViewKind): a mapping
//! from view elements to parent elements plus the gather/scatter pair the
//! arena's attach/sync protocol drives. Views are created through the
//! [`ViewBuilder`] extension trait on [`ArrayArena`](tessera_arena::ArrayArena).
//!
//! # Kinds
//!
//! - [`Refer`]: affine slice (`offset + ratio · addr`), reshape, broadcast
//! - [`Block`]: per-axis `start, step, count`
//! - [`Window`]: unit-step block with a movable origin and a [`Boundary`]
//! - [`Select`]: rank-1 compaction by flags or addresses
//! - [`Grid`]: per-axis index lists, optionally masked
//! - [`Repeat`] / [`UnboundRepeat`]: read-only tiling, bound on demand
//! - [`Bitfield`]: a bit range of each element
//! - [`Transpose`]: reversed axis order
//! - [`Object`]: parentless, backed by a [`DynamicSource`]
//!
//! Every kind except Object mirrors itself onto its parent's mask, so a
//! view's mask is a view of the same shape over the parent's mask.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod bitfield;
pub mod block;
pub mod builder;
mod check;
pub mod grid;
pub mod object;
pub mod refer;
pub mod repeat;
pub mod select;
pub mod transpose;
pub mod window;

// Public re-exports for the primary API surface.
pub use bitfield::Bitfield;
pub use block::Block;
pub use builder::ViewBuilder;
pub use grid::{Grid, GridAxis};
pub use object::{DynamicSource, FnSource, Object};
pub use refer::Refer;
pub use repeat::{AxisRole, Repeat, UnboundRepeat};
pub use select::Select;
pub use transpose::Transpose;
pub use window::{Boundary, Window};
