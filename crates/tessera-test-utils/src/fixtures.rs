//! Reusable array fixtures.
//!
//! - [`iota`]: an entity holding `0, 1, 2, ...` in row-major order.
//! - [`masked_iota`]: the same with selected addresses masked.
//! - [`from_ints`]: an entity from explicit integers.
//! - [`snapshot`]: the current bytes of any array, for before/after checks.

use tessera_arena::ArrayArena;
use tessera_core::shape::element_count;
use tessera_core::{ArrayId, Buffer, ElementType, Value};

/// An entity of `shape` whose element at address `a` is `a` cast to `elem`.
pub fn iota(arena: &ArrayArena, shape: &[usize], elem: ElementType) -> ArrayId {
    let values: Vec<Value> = (0..element_count(shape) as i64).map(Value::Int).collect();
    arena
        .entity_from_values(shape, elem, &values)
        .expect("iota fixture shape must be valid")
}

/// [`iota`] with the addresses in `masked` marked undefined.
pub fn masked_iota(
    arena: &ArrayArena,
    shape: &[usize],
    elem: ElementType,
    masked: &[usize],
) -> ArrayId {
    let id = iota(arena, shape, elem);
    for &addr in masked {
        arena
            .set_masked(id, addr, true)
            .expect("masked address must be in bounds");
    }
    id
}

/// An entity of `shape` holding `values` in row-major order.
pub fn from_ints(arena: &ArrayArena, shape: &[usize], elem: ElementType, values: &[i64]) -> ArrayId {
    let values: Vec<Value> = values.iter().map(|&v| Value::Int(v)).collect();
    arena
        .entity_from_values(shape, elem, &values)
        .expect("fixture values must match the shape")
}

/// Copy of the current contents of `id`, mask ignored.
pub fn snapshot(arena: &ArrayArena, id: ArrayId) -> Buffer {
    let elem = arena.element(id).expect("live array");
    let count = arena.element_count(id).expect("live array");
    let mut out = Buffer::zeroed(elem, count);
    arena.copy_into(id, &mut out).expect("copy_into on fixture");
    out
}

/// Every element of `id` as `i64`, with masked elements as `None`.
pub fn ints(arena: &ArrayArena, id: ArrayId) -> Vec<Option<i64>> {
    arena
        .fetch_all(id)
        .expect("fetch_all on fixture")
        .iter()
        .map(Value::as_i64)
        .collect()
}
