//! Element storage.
//!
//! Byte-addressable element types live in a flat `Vec<u8>`; host values
//! live in a `Vec<Value>`. Either way a buffer holds a whole number of
//! elements and is indexed by linear element address.

use crate::element::ElementType;
use crate::error::ArrayError;
use crate::value::{decode, encode, Value};

/// Materialized element storage of one array.
#[derive(Clone, Debug, PartialEq)]
pub enum Buffer {
    /// Packed elements, `elem_bytes` bytes each, native byte order.
    Bytes {
        /// Raw storage; `data.len()` is a multiple of `elem_bytes`.
        data: Vec<u8>,
        /// Byte size of one element.
        elem_bytes: usize,
    },
    /// Host value slots.
    Host(Vec<Value>),
}

impl Buffer {
    /// A zero-filled buffer of `count` elements (host slots start as `Nil`).
    pub fn zeroed(elem: ElementType, count: usize) -> Self {
        if elem.is_host() {
            Self::Host(vec![Value::Nil; count])
        } else {
            Self::Bytes {
                data: vec![0; elem.bytes() * count],
                elem_bytes: elem.bytes(),
            }
        }
    }

    /// Number of elements held.
    pub fn len(&self) -> usize {
        match self {
            Self::Bytes { data, elem_bytes } => data.len() / (*elem_bytes).max(1),
            Self::Host(values) => values.len(),
        }
    }

    /// Whether the buffer holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total heap bytes used by the element payload.
    pub fn byte_len(&self) -> usize {
        match self {
            Self::Bytes { data, .. } => data.len(),
            Self::Host(values) => values.len() * std::mem::size_of::<Value>(),
        }
    }

    /// Raw bytes, or `None` for host buffers.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes { data, .. } => Some(data),
            Self::Host(_) => None,
        }
    }

    /// Mutable raw bytes, or `None` for host buffers.
    pub fn as_bytes_mut(&mut self) -> Option<&mut [u8]> {
        match self {
            Self::Bytes { data, .. } => Some(data),
            Self::Host(_) => None,
        }
    }

    /// Bytes of element `addr`, or `None` for host buffers.
    pub fn element(&self, addr: usize) -> Option<&[u8]> {
        match self {
            Self::Bytes { data, elem_bytes } => {
                let start = addr * elem_bytes;
                data.get(start..start + elem_bytes)
            }
            Self::Host(_) => None,
        }
    }

    /// Mutable bytes of element `addr`, or `None` for host buffers.
    pub fn element_mut(&mut self, addr: usize) -> Option<&mut [u8]> {
        match self {
            Self::Bytes { data, elem_bytes } => {
                let start = addr * *elem_bytes;
                data.get_mut(start..start + *elem_bytes)
            }
            Self::Host(_) => None,
        }
    }

    /// Decode element `addr`.
    pub fn get(&self, elem: ElementType, addr: usize) -> Value {
        match self {
            Self::Bytes { data, elem_bytes } => {
                let start = addr * elem_bytes;
                decode(elem, &data[start..start + elem_bytes])
            }
            Self::Host(values) => values[addr].clone(),
        }
    }

    /// Encode `value` into element `addr`.
    pub fn set(&mut self, elem: ElementType, addr: usize, value: &Value) -> Result<(), ArrayError> {
        match self {
            Self::Bytes { data, elem_bytes } => {
                let start = addr * *elem_bytes;
                encode(elem, value, &mut data[start..start + *elem_bytes])
            }
            Self::Host(values) => {
                if value.is_undefined() {
                    return Err(ArrayError::UnsupportedElement {
                        kind: elem.kind(),
                        operation: "storing the undefined sentinel",
                    });
                }
                values[addr] = value.clone();
                Ok(())
            }
        }
    }

    /// Reset element `addr` to zero bytes (or `Nil`).
    pub fn clear_element(&mut self, addr: usize) {
        match self {
            Self::Bytes { data, elem_bytes } => {
                let start = addr * *elem_bytes;
                data[start..start + *elem_bytes].fill(0);
            }
            Self::Host(values) => values[addr] = Value::Nil,
        }
    }

    /// Copy `count` consecutive elements from `src[src_addr..]` to
    /// `self[dst_addr..]`.
    ///
    /// # Panics
    ///
    /// Panics if the two buffers have different layouts or a range is out
    /// of bounds. Callers copy only between arrays of the same element type.
    pub fn copy_run(&mut self, dst_addr: usize, src: &Buffer, src_addr: usize, count: usize) {
        match (self, src) {
            (
                Self::Bytes { data: dst, elem_bytes },
                Self::Bytes {
                    data: from,
                    elem_bytes: src_bytes,
                },
            ) => {
                assert_eq!(*elem_bytes, *src_bytes, "buffer element sizes differ");
                let n = count * *elem_bytes;
                let d = dst_addr * *elem_bytes;
                let s = src_addr * *elem_bytes;
                dst[d..d + n].copy_from_slice(&from[s..s + n]);
            }
            (Self::Host(dst), Self::Host(from)) => {
                dst[dst_addr..dst_addr + count].clone_from_slice(&from[src_addr..src_addr + count]);
            }
            _ => panic!("buffer layouts differ"),
        }
    }

    /// Copy a single element; see [`Buffer::copy_run`].
    pub fn copy_element(&mut self, dst_addr: usize, src: &Buffer, src_addr: usize) {
        self.copy_run(dst_addr, src, src_addr, 1);
    }

    /// Grow or shrink to `count` elements; new elements are zero (or `Nil`).
    pub fn resize(&mut self, count: usize) {
        match self {
            Self::Bytes { data, elem_bytes } => data.resize(count * *elem_bytes, 0),
            Self::Host(values) => values.resize(count, Value::Nil),
        }
    }

    /// Set every element to `value`.
    pub fn fill(&mut self, elem: ElementType, value: &Value) -> Result<(), ArrayError> {
        match self {
            Self::Bytes { data, elem_bytes } => {
                let eb = *elem_bytes;
                if eb == 0 || data.is_empty() {
                    return Ok(());
                }
                encode(elem, value, &mut data[..eb])?;
                let (first, rest) = data.split_at_mut(eb);
                for chunk in rest.chunks_exact_mut(eb) {
                    chunk.copy_from_slice(first);
                }
                Ok(())
            }
            Self::Host(values) => {
                if value.is_undefined() {
                    return Err(ArrayError::UnsupportedElement {
                        kind: elem.kind(),
                        operation: "storing the undefined sentinel",
                    });
                }
                values.iter_mut().for_each(|v| *v = value.clone());
                Ok(())
            }
        }
    }
}
