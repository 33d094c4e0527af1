//! Test utilities for Tessera development.
//!
//! Provides element-type shorthands and [`fixtures`] that build populated
//! arrays in an [`ArrayArena`](tessera_arena::ArrayArena), so tests and
//! benches across the workspace set up the same data the same way.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use tessera_core::{ElementKind, ElementType};

pub fn int32() -> ElementType {
    ElementType::new(ElementKind::Int32)
}

pub fn int64() -> ElementType {
    ElementType::new(ElementKind::Int64)
}

pub fn uint8() -> ElementType {
    ElementType::new(ElementKind::UInt8)
}

pub fn uint32() -> ElementType {
    ElementType::new(ElementKind::UInt32)
}

pub fn float64() -> ElementType {
    ElementType::new(ElementKind::Float64)
}

pub fn boolean() -> ElementType {
    ElementType::boolean()
}
