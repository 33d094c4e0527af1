//! The kernel interface.
//!
//! A [`Kernel`] is called once per unmasked iteration index with one
//! [`Slot`] per operand, in operand order. A slot exposes exactly one
//! element: the operand's element at that index (or its only element, for
//! a broadcast scalar). Kernels see nothing else, so a kernel that is
//! `Sync` can be run on disjoint index ranges concurrently.

use tessera_core::value::{decode, encode};
use tessera_core::{ArrayError, ElementType, Value};

enum SlotBytes<'a> {
    Read(&'a [u8]),
    Write(&'a mut [u8]),
}

/// One operand element handed to a kernel.
pub struct Slot<'a> {
    elem: ElementType,
    bytes: SlotBytes<'a>,
}

impl<'a> Slot<'a> {
    pub(crate) fn read(elem: ElementType, bytes: &'a [u8]) -> Self {
        Self {
            elem,
            bytes: SlotBytes::Read(bytes),
        }
    }

    pub(crate) fn write(elem: ElementType, bytes: &'a mut [u8]) -> Self {
        Self {
            elem,
            bytes: SlotBytes::Write(bytes),
        }
    }

    /// Element type of the operand.
    pub fn elem(&self) -> ElementType {
        self.elem
    }

    /// Whether the kernel may write this slot.
    pub fn is_writable(&self) -> bool {
        matches!(self.bytes, SlotBytes::Write(_))
    }

    /// The element's bytes (native byte order).
    pub fn bytes(&self) -> &[u8] {
        match &self.bytes {
            SlotBytes::Read(b) => b,
            SlotBytes::Write(b) => b,
        }
    }

    /// The element's bytes, mutably; `None` for read-only slots.
    pub fn bytes_mut(&mut self) -> Option<&mut [u8]> {
        match &mut self.bytes {
            SlotBytes::Read(_) => None,
            SlotBytes::Write(b) => Some(b),
        }
    }

    /// The element as a [`Value`].
    pub fn value(&self) -> Value {
        decode(self.elem, self.bytes())
    }

    /// Store `value` (cast to the slot's element type).
    ///
    /// Fails with `UnsupportedElement` on a read-only slot or for
    /// `Value::Undefined`: kernels cannot mask elements.
    pub fn set(&mut self, value: &Value) -> Result<(), ArrayError> {
        let elem = self.elem;
        match &mut self.bytes {
            SlotBytes::Read(_) => Err(ArrayError::UnsupportedElement {
                kind: elem.kind(),
                operation: "writing a read operand",
            }),
            SlotBytes::Write(b) => encode(elem, value, b),
        }
    }
}

/// A scalar function applied at every unmasked iteration index.
///
/// Kernels must be `Sync`: the engine may call one kernel from several
/// worker threads at once, each on its own index range.
pub trait Kernel: Sync {
    /// Process iteration `index`.
    ///
    /// An error stops the loop; elements already written keep their new
    /// values.
    fn call(&self, index: usize, slots: &mut [Slot<'_>]) -> Result<(), ArrayError>;
}

/// Adapts a `Fn(&[Value]) -> Value` closure into a [`Kernel`].
///
/// The closure receives the values of every slot but the last, and its
/// result is stored into the last slot.
pub struct ValueKernel<F> {
    f: F,
}

impl<F> ValueKernel<F>
where
    F: Fn(&[Value]) -> Value + Sync,
{
    /// Wrap `f`.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> Kernel for ValueKernel<F>
where
    F: Fn(&[Value]) -> Value + Sync,
{
    fn call(&self, _index: usize, slots: &mut [Slot<'_>]) -> Result<(), ArrayError> {
        let Some((out, inputs)) = slots.split_last_mut() else {
            return Ok(());
        };
        let args: smallvec::SmallVec<[Value; 6]> = inputs.iter().map(Slot::value).collect();
        out.set(&(self.f)(&args))
    }
}

#[cfg(test)]
mod tests {
    use tessera_core::ElementKind;

    use super::*;

    fn int32() -> ElementType {
        ElementType::new(ElementKind::Int32)
    }

    #[test]
    fn slot_round_trips_values() {
        let mut bytes = [0u8; 4];
        let mut slot = Slot::write(int32(), &mut bytes);
        slot.set(&Value::Float(7.9)).unwrap();
        assert_eq!(slot.value(), Value::Int(7));
        assert!(slot.is_writable());
        assert!(slot.set(&Value::Undefined).is_err());
    }

    #[test]
    fn read_slot_refuses_writes() {
        let bytes = 5i32.to_ne_bytes();
        let mut slot = Slot::read(int32(), &bytes);
        assert_eq!(slot.value(), Value::Int(5));
        assert!(slot.bytes_mut().is_none());
        assert!(slot.set(&Value::Int(1)).is_err());
    }

    #[test]
    fn value_kernel_writes_last_slot() {
        let kernel = ValueKernel::new(|args: &[Value]| {
            Value::Int(args.iter().filter_map(Value::as_i64).sum())
        });
        let (a, b) = (2i32.to_ne_bytes(), 3i32.to_ne_bytes());
        let mut out = [0u8; 4];
        let mut slots = [
            Slot::read(int32(), &a),
            Slot::read(int32(), &b),
            Slot::write(int32(), &mut out),
        ];
        kernel.call(0, &mut slots).unwrap();
        drop(slots);
        assert_eq!(i32::from_ne_bytes(out), 5);
    }
}
