//! Benchmark profiles for the Tessera array engine.
//!
//! - [`square_profile`]: an `n × n` float grid filled with `0, 1, 2, ...`
//! - [`checkerboard_profile`]: the same grid with every other element masked
//! - [`view_profile`]: one view of each common kind over a square grid

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use tessera_arena::ArrayArena;
use tessera_core::{ArrayError, ArrayId};
use tessera_test_utils::fixtures::iota;
use tessera_test_utils::float64;
use tessera_view::{Boundary, ViewBuilder};

/// An `n × n` Float64 entity holding its own row-major addresses.
pub fn square_profile(arena: &ArrayArena, n: usize) -> ArrayId {
    iota(arena, &[n, n], float64())
}

/// [`square_profile`] with the elements whose row + column is odd masked.
pub fn checkerboard_profile(arena: &ArrayArena, n: usize) -> Result<ArrayId, ArrayError> {
    let id = square_profile(arena, n);
    let bits: Vec<bool> = (0..n * n).map(|a| (a / n + a % n) % 2 == 1).collect();
    arena.write_mask(id, &bits)?;
    Ok(id)
}

/// Named views over an `n × n` grid: a strided block, a transpose, a
/// clamped window shifted by one, and a row selection.
pub fn view_profile(arena: &ArrayArena, n: usize) -> Result<Vec<(&'static str, ArrayId)>, ArrayError> {
    let grid = square_profile(arena, n);
    let half = n / 2;
    let every_other: Vec<bool> = (0..n * n).map(|a| (a / n) % 2 == 0).collect();
    Ok(vec![
        ("block", arena.block(grid, &[0, 0], &[2, 2], &[half, half])?),
        ("transpose", arena.transpose(grid)?),
        ("window", arena.window(grid, &[-1, -1], &[n, n], Boundary::Clamp)?),
        ("select", arena.select(grid, &every_other)?),
    ])
}
