//! Bitfield: a bit range of every parent element as its own array.
//!
//! The view's element kind is derived from the field width: 1 bit reads
//! as `Bool`, up to 8 bits as `UInt8`, and so on up to `UInt64`. Bits are
//! numbered from the least significant bit of the parent element read as
//! a native integer; parents whose element size is not an integer width
//! (records, 256-bit complex) are read as little-endian bit strings over
//! their first 16 bytes. Storing into the view is a read-modify-write
//! that preserves the parent bits outside the field.

use std::any::Any;

use tessera_arena::{ElementTransform, MapContext, Mapping, Source, ViewKind};
use tessera_core::{ArrayError, BuiltinKind, ElementKind, ElementType, KindTag};

use crate::check;
use crate::refer::Refer;

const WINDOW_BITS: u32 = 128;

/// Parameters of a Bitfield view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bitfield {
    offset: u32,
    width: u32,
}

impl Bitfield {
    /// The field of `width` bits starting at bit `offset` of elements of
    /// type `parent`.
    ///
    /// Fails with `UnsupportedElement` for host elements, a width of 0 or
    /// above 64, and with `OutOfBounds` if the field runs past the parent
    /// element.
    pub fn new(parent: ElementType, offset: u32, width: u32) -> Result<Self, ArrayError> {
        let field = Self { offset, width };
        field.element()?;
        field.check_parent(parent)?;
        Ok(field)
    }

    /// First bit of the field.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Number of bits in the field.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Element type of the view.
    pub fn element(&self) -> Result<ElementType, ArrayError> {
        ElementKind::for_bit_width(self.width)
            .map(ElementType::new)
            .ok_or(ArrayError::UnsupportedElement {
                kind: ElementKind::UInt64,
                operation: "bit fields outside 1..=64 bits",
            })
    }

    fn check_parent(&self, parent: ElementType) -> Result<(), ArrayError> {
        check::byte_addressable(parent, "bit field extraction")?;
        let bits = (parent.bytes() as u32 * 8).min(WINDOW_BITS);
        let end = u64::from(self.offset) + u64::from(self.width);
        if end > u64::from(bits) {
            return Err(ArrayError::OutOfBounds {
                index: end as i64 - 1,
                axis: 0,
                dim: bits as usize,
            });
        }
        Ok(())
    }

    fn field_mask(&self) -> u128 {
        (1u128 << self.width) - 1
    }
}

/// The first (up to) 128 bits of an element.
fn read_window(bytes: &[u8]) -> u128 {
    match bytes.len() {
        1 => bytes[0] as u128,
        2 => u16::from_ne_bytes([bytes[0], bytes[1]]) as u128,
        4 => u32::from_ne_bytes(word(bytes)) as u128,
        8 => u64::from_ne_bytes(word(bytes)) as u128,
        16 => u128::from_ne_bytes(word(bytes)),
        n => {
            let mut le = [0u8; 16];
            let len = n.min(16);
            le[..len].copy_from_slice(&bytes[..len]);
            u128::from_le_bytes(le)
        }
    }
}

/// Inverse of [`read_window`]; bytes beyond the window are untouched.
fn write_window(bytes: &mut [u8], value: u128) {
    match bytes.len() {
        1 => bytes[0] = value as u8,
        2 => bytes.copy_from_slice(&(value as u16).to_ne_bytes()),
        4 => bytes.copy_from_slice(&(value as u32).to_ne_bytes()),
        8 => bytes.copy_from_slice(&(value as u64).to_ne_bytes()),
        16 => bytes.copy_from_slice(&value.to_ne_bytes()),
        n => {
            let len = n.min(16);
            bytes[..len].copy_from_slice(&value.to_le_bytes()[..len]);
        }
    }
}

fn word<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

impl ElementTransform for Bitfield {
    fn extract(&self, parent: &[u8], out: &mut [u8]) {
        let field = (read_window(parent) >> self.offset) & self.field_mask();
        write_window(out, field);
    }

    fn insert(&self, parent: &mut [u8], value: &[u8]) {
        let mask = self.field_mask() << self.offset;
        let field = (read_window(value) << self.offset) & mask;
        let updated = (read_window(parent) & !mask) | field;
        write_window(parent, updated);
    }
}

impl ViewKind for Bitfield {
    fn tag(&self) -> KindTag {
        BuiltinKind::Bitfield.tag()
    }

    fn mapping(&self) -> Mapping {
        Mapping::Addr
    }

    fn validate(&self, ctx: &MapContext<'_>) -> Result<(), ArrayError> {
        if let Some(parent) = ctx.parent_elem {
            self.check_parent(parent)?;
        }
        check::shape_matches(ctx.shape, ctx.parent_shape)
    }

    fn map_addr(&self, _ctx: &MapContext<'_>, addr: usize) -> Result<Source, ArrayError> {
        Ok(Source::Parent(addr))
    }

    fn transform(&self) -> Option<&dyn ElementTransform> {
        Some(self)
    }

    /// One mask bit per element: the mask maps through unchanged.
    fn mirror_for_mask(&self) -> Option<Box<dyn ViewKind>> {
        Some(Box::new(Refer::identity()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uint16() -> ElementType {
        ElementType::new(ElementKind::UInt16)
    }

    #[test]
    fn element_kind_follows_width() {
        let b = Bitfield::new(uint16(), 0, 1).unwrap();
        assert_eq!(b.element().unwrap().kind(), ElementKind::Bool);
        let b = Bitfield::new(uint16(), 4, 12).unwrap();
        assert_eq!(b.element().unwrap().kind(), ElementKind::UInt16);
    }

    #[test]
    fn field_past_element_rejected() {
        assert!(matches!(
            Bitfield::new(uint16(), 10, 8),
            Err(ArrayError::OutOfBounds { index: 17, dim: 16, .. })
        ));
        assert!(Bitfield::new(uint16(), 0, 0).is_err());
        assert!(Bitfield::new(ElementType::new(ElementKind::Host), 0, 1).is_err());
    }

    #[test]
    fn extract_and_insert_preserve_other_bits() {
        let b = Bitfield::new(uint16(), 4, 4).unwrap();
        let parent = 0xABCDu16.to_ne_bytes();
        let mut out = [0u8; 1];
        b.extract(&parent, &mut out);
        assert_eq!(out[0], 0xC);

        let mut parent = parent;
        b.insert(&mut parent, &[0x5]);
        assert_eq!(u16::from_ne_bytes(parent), 0xAB5D);
    }

    #[test]
    fn wide_record_uses_little_endian_bits() {
        let record = ElementType::record(20).unwrap();
        let b = Bitfield::new(record, 8, 8).unwrap();
        let mut parent = [0u8; 20];
        parent[1] = 0x7F;
        let mut out = [0u8; 1];
        b.extract(&parent, &mut out);
        assert_eq!(out[0], 0x7F);
        b.insert(&mut parent, &[0x01]);
        assert_eq!(parent[1], 0x01);
        assert_eq!(parent[19], 0);
    }
}
