//! Core types for the Tessera array engine.
//!
//! This is the leaf crate of the workspace. It defines the element kinds
//! and their cast rules, the [`Value`] exchanged with arrays and its byte
//! codec, shapes and index arithmetic, element buffers, array and kind
//! identifiers, the process-wide kind registry, and the error taxonomy.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod buffer;
pub mod element;
pub mod error;
pub mod id;
pub mod kind;
pub mod quad;
pub mod shape;
pub mod value;

// Public re-exports for the primary API surface.
pub use buffer::Buffer;
pub use element::{ElementClass, ElementKind, ElementType};
pub use error::{ArrayError, Result};
pub use id::{ArrayId, KindTag};
pub use kind::{register_kind, registry, BuiltinKind, KindInfo, KindRegistry};
pub use shape::{Index, IndexIter, Shape, MAX_RANK};
pub use value::{HostValue, Value};
