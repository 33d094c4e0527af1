//! The per-kind operation table.
//!
//! Every view kind implements [`ViewKind`]. The arena dispatches through
//! it for address mapping, gather and scatter; entity arrays are handled
//! by the arena directly and never see this trait.
//!
//! A kind maps view addresses to parent addresses either by linear
//! address or by multi-index ([`Mapping`]). The dispatcher converts
//! between the two forms, so a kind implements only the one that is
//! natural for it. Kinds without a parent (host callbacks) use
//! [`Mapping::Direct`] and supply `fetch_direct`/`store_direct` instead.

use std::any::Any;
use std::fmt;

use tessera_core::shape::{to_index, IndexIter};
use tessera_core::{ArrayError, ArrayId, Buffer, ElementType, KindTag, Value};

/// Where a view element comes from.
#[derive(Clone, Debug, PartialEq)]
pub enum Source {
    /// Linear address in the parent.
    Parent(usize),
    /// No parent element; reads yield this value and writes are discarded.
    Fill(Value),
    /// No parent element; reads yield a masked element and writes are
    /// discarded.
    Masked,
}

/// The mapping form a kind implements.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mapping {
    /// [`ViewKind::map_addr`].
    Addr,
    /// [`ViewKind::map_index`].
    Index,
    /// No parent: [`ViewKind::fetch_direct`] and [`ViewKind::store_direct`].
    Direct,
}

/// Header data a kind may consult while mapping.
///
/// Parent fields describe the parent's *current* shape, which may differ
/// from the shape it had when the view was built.
#[derive(Clone, Copy, Debug)]
pub struct MapContext<'a> {
    /// The view being mapped.
    pub array: ArrayId,
    /// Shape of the view.
    pub shape: &'a [usize],
    /// Element type of the view.
    pub elem: ElementType,
    /// Current shape of the parent (empty for parentless kinds).
    pub parent_shape: &'a [usize],
    /// Element type of the parent, if there is one.
    pub parent_elem: Option<ElementType>,
}

impl MapContext<'_> {
    /// Element count of the view.
    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }

    /// Element count of the parent.
    pub fn parent_count(&self) -> usize {
        self.parent_shape.iter().product()
    }
}

/// Per-element conversion between parent bytes and view bytes.
///
/// Used by kinds whose elements are not plain copies of parent elements,
/// such as bit fields.
pub trait ElementTransform {
    /// Derive one view element from the bytes of one parent element.
    fn extract(&self, parent: &[u8], out: &mut [u8]);

    /// Write one view element back into the bytes of one parent element,
    /// preserving bits the view does not cover.
    fn insert(&self, parent: &mut [u8], value: &[u8]);
}

/// Operation table of a view kind.
pub trait ViewKind: Any + fmt::Debug {
    /// Registry tag of the kind.
    fn tag(&self) -> KindTag;

    /// Which mapping form this kind implements.
    fn mapping(&self) -> Mapping;

    /// Whether writes through this kind are refused.
    fn read_only(&self) -> bool {
        false
    }

    /// Whether the kind produces masked elements on its own, so that a
    /// mask must exist even when the parent has none.
    fn implies_mask(&self) -> bool {
        false
    }

    /// Check the view's parameters against the parent's current header.
    fn validate(&self, _ctx: &MapContext<'_>) -> Result<(), ArrayError> {
        Ok(())
    }

    /// Map a view linear address to its source.
    fn map_addr(&self, _ctx: &MapContext<'_>, _addr: usize) -> Result<Source, ArrayError> {
        Err(contract(self.tag(), "map_addr"))
    }

    /// Map a view multi-index to its source.
    fn map_index(&self, _ctx: &MapContext<'_>, _index: &[usize]) -> Result<Source, ArrayError> {
        Err(contract(self.tag(), "map_index"))
    }

    /// Element conversion applied between parent and view, if any.
    fn transform(&self) -> Option<&dyn ElementTransform> {
        None
    }

    /// Copy the view's elements out of `parent` into `out`, in view order.
    fn gather(
        &self,
        ctx: &MapContext<'_>,
        parent: &Buffer,
        out: &mut Buffer,
    ) -> Result<(), ArrayError> {
        gather_mapped(self, ctx, parent, out)
    }

    /// Copy `view` back into the mapped positions of `parent`.
    fn scatter(
        &self,
        ctx: &MapContext<'_>,
        view: &Buffer,
        parent: &mut Buffer,
    ) -> Result<(), ArrayError> {
        scatter_mapped(self, ctx, view, parent)
    }

    /// Fetch one element from a parentless kind.
    fn fetch_direct(&self, _ctx: &MapContext<'_>, _addr: usize) -> Result<Value, ArrayError> {
        Err(contract(self.tag(), "fetch_direct"))
    }

    /// Store one element into a parentless kind.
    fn store_direct(
        &self,
        _ctx: &MapContext<'_>,
        _addr: usize,
        _value: &Value,
    ) -> Result<(), ArrayError> {
        Err(contract(self.tag(), "store_direct"))
    }

    /// The same kind with the same parameters, applied to a boolean mask.
    ///
    /// `None` means the kind cannot mirror a mask; asking such a view for
    /// its mask fails with `KindContract`.
    fn mirror_for_mask(&self) -> Option<Box<dyn ViewKind>> {
        None
    }

    /// Upcast for downcasting to the concrete kind.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting to the concrete kind.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

pub(crate) fn contract(kind: KindTag, operation: &'static str) -> ArrayError {
    ArrayError::KindContract { kind, operation }
}

/// Map one view address through `kind`, converting to the kind's form.
pub fn resolve<K: ViewKind + ?Sized>(
    kind: &K,
    ctx: &MapContext<'_>,
    addr: usize,
) -> Result<Source, ArrayError> {
    match kind.mapping() {
        Mapping::Addr => kind.map_addr(ctx, addr),
        Mapping::Index => kind.map_index(ctx, &to_index(ctx.shape, addr)),
        Mapping::Direct => Err(contract(kind.tag(), "parent mapping")),
    }
}

fn check_parent_addr(ctx: &MapContext<'_>, addr: usize) -> Result<usize, ArrayError> {
    let dim = ctx.parent_count();
    if addr >= dim {
        return Err(ArrayError::OutOfBounds {
            index: addr as i64,
            axis: 0,
            dim,
        });
    }
    Ok(addr)
}

fn for_each_source<K: ViewKind + ?Sized>(
    kind: &K,
    ctx: &MapContext<'_>,
    mut f: impl FnMut(usize, Source) -> Result<(), ArrayError>,
) -> Result<(), ArrayError> {
    match kind.mapping() {
        Mapping::Addr => {
            for addr in 0..ctx.element_count() {
                f(addr, kind.map_addr(ctx, addr)?)?;
            }
        }
        Mapping::Index => {
            let mut iter = IndexIter::new(ctx.shape);
            let mut addr = 0;
            while let Some(index) = iter.next_index() {
                f(addr, kind.map_index(ctx, index)?)?;
                addr += 1;
            }
        }
        Mapping::Direct => return Err(contract(kind.tag(), "parent mapping")),
    }
    Ok(())
}

/// Element-at-a-time gather through the kind's mapping.
///
/// Kinds override [`ViewKind::gather`] only to add a bulk fast path.
pub fn gather_mapped<K: ViewKind + ?Sized>(
    kind: &K,
    ctx: &MapContext<'_>,
    parent: &Buffer,
    out: &mut Buffer,
) -> Result<(), ArrayError> {
    let transform = kind.transform();
    for_each_source(kind, ctx, |addr, source| {
        match source {
            Source::Parent(p) => {
                let p = check_parent_addr(ctx, p)?;
                match transform {
                    Some(t) => {
                        let (Some(src), Some(dst)) = (parent.element(p), out.element_mut(addr))
                        else {
                            return Err(unsupported(ctx, "element transform"));
                        };
                        t.extract(src, dst);
                    }
                    None => out.copy_element(addr, parent, p),
                }
            }
            Source::Fill(value) => out.set(ctx.elem, addr, &value)?,
            Source::Masked => out.clear_element(addr),
        }
        Ok(())
    })
}

/// Element-at-a-time scatter through the kind's mapping.
///
/// Elements without a parent source are discarded. When several view
/// elements map to one parent element the last one wins.
pub fn scatter_mapped<K: ViewKind + ?Sized>(
    kind: &K,
    ctx: &MapContext<'_>,
    view: &Buffer,
    parent: &mut Buffer,
) -> Result<(), ArrayError> {
    let transform = kind.transform();
    for_each_source(kind, ctx, |addr, source| {
        if let Source::Parent(p) = source {
            let p = check_parent_addr(ctx, p)?;
            match transform {
                Some(t) => {
                    let src = view.element(addr).ok_or_else(|| unsupported(ctx, "element transform"))?;
                    let dst = parent
                        .element_mut(p)
                        .ok_or_else(|| unsupported(ctx, "element transform"))?;
                    t.insert(dst, src);
                }
                None => parent.copy_element(p, view, addr),
            }
        }
        Ok(())
    })
}

fn unsupported(ctx: &MapContext<'_>, operation: &'static str) -> ArrayError {
    ArrayError::UnsupportedElement {
        kind: ctx.parent_elem.unwrap_or(ctx.elem).kind(),
        operation,
    }
}
