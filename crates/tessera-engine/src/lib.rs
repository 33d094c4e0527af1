//! Broadcasting N-ary iteration engine for Tessera.
//!
//! [`Engine::run_kernel`] runs a [`Kernel`] over 1..=7 [`Operand`]s of an
//! [`ArrayArena`](tessera_arena::ArrayArena). One-element operands are
//! broadcast, masks of mask-source operands are ORed into a combined mask
//! whose set positions are skipped, and long loops are split across
//! scoped worker threads.
//!
//! ```text
//! plan ──▶ attach ──▶ combine masks ──▶ loop (1..n workers) ──▶ mask sinks ──▶ sync ──▶ detach
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod engine;
pub mod kernel;
pub mod metrics;
pub mod operand;
mod plan;

// Public re-exports for the primary API surface.
pub use config::EngineConfig;
pub use engine::Engine;
pub use kernel::{Kernel, Slot, ValueKernel};
pub use metrics::KernelMetrics;
pub use operand::{Access, Operand};
pub use plan::MAX_OPERANDS;
