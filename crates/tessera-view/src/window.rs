//! Window: a unit-step block with a movable origin.
//!
//! The origin may lie partly or wholly outside the parent; positions that
//! fall outside are resolved by the window's [`Boundary`]. Writes to such
//! positions are discarded unless the boundary maps them back inside the
//! parent (Clamp, Wrap, Reflect).

use std::any::Any;

use tessera_arena::{MapContext, Mapping, Source, ViewKind};
use tessera_core::{ArrayError, BuiltinKind, KindTag, Value};

use crate::check;

/// How a window resolves positions outside its parent.
#[derive(Clone, Debug, PartialEq)]
pub enum Boundary {
    /// Use the nearest edge element.
    Clamp,
    /// Periodic: wrap around to the opposite edge.
    Wrap,
    /// Mirror at the edges, edge element included (`-1 → 0`, `-2 → 1`,
    /// `n → n-1`).
    Reflect,
    /// Read a constant.
    Fill(Value),
    /// Read a masked element.
    Mask,
}

/// Resolve one axis position under `boundary`; `None` means "no parent
/// element" (Fill or Mask).
fn resolve_axis(pos: i128, dim: usize, boundary: &Boundary) -> Option<usize> {
    let n = dim as i128;
    if (0..n).contains(&pos) {
        return Some(pos as usize);
    }
    if n == 0 {
        return None;
    }
    match boundary {
        Boundary::Clamp => Some(pos.clamp(0, n - 1) as usize),
        Boundary::Wrap => Some(pos.rem_euclid(n) as usize),
        Boundary::Reflect => {
            let m = pos.rem_euclid(2 * n);
            let reflected = if m < n { m } else { 2 * n - 1 - m };
            Some(reflected as usize)
        }
        Boundary::Fill(_) | Boundary::Mask => None,
    }
}

/// Parameters of a Window view.
#[derive(Clone, Debug, PartialEq)]
pub struct Window {
    start: Vec<isize>,
    count: Vec<usize>,
    boundary: Boundary,
}

impl Window {
    /// A window of extent `count` whose origin is at parent index `start`.
    pub fn new(start: &[isize], count: &[usize], boundary: Boundary) -> Result<Self, ArrayError> {
        check::param_len(count.len(), start.len())?;
        Ok(Self {
            start: start.to_vec(),
            count: count.to_vec(),
            boundary,
        })
    }

    /// Current origin.
    pub fn start(&self) -> &[isize] {
        &self.start
    }

    /// Extent per axis.
    pub fn count(&self) -> &[usize] {
        &self.count
    }

    /// Out-of-range policy.
    pub fn boundary(&self) -> &Boundary {
        &self.boundary
    }

    /// Move the origin by `delta`.
    ///
    /// Fails with `OutOfBounds`, leaving the origin unchanged, if the
    /// new origin does not fit in an `isize`.
    pub fn slide(&mut self, delta: &[isize]) -> Result<(), ArrayError> {
        check::param_len(self.start.len(), delta.len())?;
        let moved = self
            .start
            .iter()
            .zip(delta)
            .enumerate()
            .map(|(axis, (&s, &d))| {
                s.checked_add(d).ok_or(ArrayError::OutOfBounds {
                    index: d as i64,
                    axis,
                    dim: self.count[axis],
                })
            })
            .collect::<Result<Vec<isize>, _>>()?;
        self.start = moved;
        Ok(())
    }
}

impl ViewKind for Window {
    fn tag(&self) -> KindTag {
        BuiltinKind::Window.tag()
    }

    fn mapping(&self) -> Mapping {
        Mapping::Index
    }

    fn implies_mask(&self) -> bool {
        self.boundary == Boundary::Mask
    }

    fn validate(&self, ctx: &MapContext<'_>) -> Result<(), ArrayError> {
        check::same_element(ctx)?;
        check::parent_rank(ctx, self.count.len())
    }

    fn map_index(&self, ctx: &MapContext<'_>, index: &[usize]) -> Result<Source, ArrayError> {
        let mut addr = 0usize;
        for (axis, &i) in index.iter().enumerate() {
            let dim = ctx.parent_shape[axis];
            match resolve_axis(self.start[axis] as i128 + i as i128, dim, &self.boundary) {
                Some(p) => addr = addr * dim + p,
                None => {
                    return Ok(match &self.boundary {
                        Boundary::Fill(value) => Source::Fill(value.clone()),
                        _ => Source::Masked,
                    })
                }
            }
        }
        Ok(Source::Parent(addr))
    }

    fn mirror_for_mask(&self) -> Option<Box<dyn ViewKind>> {
        // Out-of-range positions of a Mask window are masked; those of a
        // Fill window are defined.
        let boundary = match &self.boundary {
            Boundary::Mask => Boundary::Fill(Value::Bool(true)),
            Boundary::Fill(_) => Boundary::Fill(Value::Bool(false)),
            other => other.clone(),
        };
        Some(Box::new(Self {
            start: self.start.clone(),
            count: self.count.clone(),
            boundary,
        }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
