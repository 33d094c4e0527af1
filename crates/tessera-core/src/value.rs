//! Scalar values exchanged with arrays, and the byte codec.
//!
//! A [`Value`] is the unit of `fetch`/`store`. Integer kinds of every width
//! decode to [`Value::Int`] or [`Value::UInt`], floats to [`Value::Float`],
//! and so on; the element type of the target array decides the stored
//! width. [`Value::Undefined`] is the masked-element sentinel.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::element::{ElementClass, ElementKind, ElementType};
use crate::error::ArrayError;
use crate::quad::{bits128_to_f64, f64_to_bits128};

/// Opaque host object stored in [`ElementKind::Host`] arrays.
///
/// Cloning shares the object; equality is identity.
#[derive(Clone)]
pub struct HostValue(Arc<dyn Any + Send + Sync>);

impl HostValue {
    /// Wrap a host object.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Borrow the wrapped object as `T`, if it is one.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostValue({:p})", Arc::as_ptr(&self.0))
    }
}

/// A single element value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// The masked-element sentinel. Storing it sets the mask bit.
    Undefined,
    /// The empty host slot; host arrays are initialised with it.
    Nil,
    /// Boolean.
    Bool(bool),
    /// Any signed integer kind.
    Int(i64),
    /// Any unsigned integer kind.
    UInt(u64),
    /// Any float kind (128-bit floats are narrowed on fetch).
    Float(f64),
    /// Any complex kind, as `(re, im)`.
    Complex(f64, f64),
    /// Raw record bytes.
    Record(Vec<u8>),
    /// Opaque host object.
    Host(HostValue),
}

impl Value {
    /// Whether this is the [`Value::Undefined`] sentinel.
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// Numeric view as `f64`, if the value is real-valued.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Bool(b) => Some(if b { 1.0 } else { 0.0 }),
            Self::Int(v) => Some(v as f64),
            Self::UInt(v) => Some(v as f64),
            Self::Float(v) => Some(v),
            _ => None,
        }
    }

    /// Numeric view as `i64` (floats truncate), if the value is real-valued.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Bool(b) => Some(b as i64),
            Self::Int(v) => Some(v),
            Self::UInt(v) => Some(v as i64),
            Self::Float(v) => Some(v as i64),
            _ => None,
        }
    }

    /// Truth value, if the value is real-valued.
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Self::Bool(b) => Some(b),
            Self::Int(v) => Some(v != 0),
            Self::UInt(v) => Some(v != 0),
            Self::Float(v) => Some(v != 0.0),
            Self::Complex(re, im) => Some(re != 0.0 || im != 0.0),
            _ => None,
        }
    }

    /// Convert to the value class of `kind`.
    ///
    /// Integer narrowing to the stored width happens in [`encode`] with
    /// `as`-cast (wrapping) semantics; float-to-integer conversion
    /// truncates and saturates. Complex values do not convert to real kinds.
    pub fn cast_to(&self, target: ElementType) -> Result<Value, ArrayError> {
        let kind = target.kind();
        let unsupported = || ArrayError::UnsupportedElement {
            kind,
            operation: "cast",
        };
        if self.is_undefined() {
            return Ok(Self::Undefined);
        }
        match kind.class() {
            ElementClass::Host => Ok(self.clone()),
            ElementClass::Record => match self {
                Self::Record(bytes) if bytes.len() == target.bytes() => Ok(self.clone()),
                _ => Err(unsupported()),
            },
            ElementClass::Boolean => self.as_bool().map(Self::Bool).ok_or_else(unsupported),
            ElementClass::Signed => self.as_i64().map(Self::Int).ok_or_else(unsupported),
            ElementClass::Unsigned => match *self {
                Self::UInt(v) => Ok(Self::UInt(v)),
                Self::Float(v) => Ok(Self::UInt(v as u64)),
                _ => self.as_i64().map(|v| Self::UInt(v as u64)).ok_or_else(unsupported),
            },
            ElementClass::Float => self.as_f64().map(Self::Float).ok_or_else(unsupported),
            ElementClass::Complex => match *self {
                Self::Complex(re, im) => Ok(Self::Complex(re, im)),
                _ => self
                    .as_f64()
                    .map(|re| Self::Complex(re, 0.0))
                    .ok_or_else(unsupported),
            },
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Self::UInt(v as u64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::UInt(v as u64)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::UInt(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

/// Decode one element of type `elem` from `bytes` (native byte order).
///
/// # Panics
///
/// Panics if `bytes` is shorter than the element, or `elem` is a host slot
/// (host elements are not byte-encoded).
pub fn decode(elem: ElementType, bytes: &[u8]) -> Value {
    fn arr<const N: usize>(b: &[u8]) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&b[..N]);
        out
    }
    match elem.kind() {
        ElementKind::Bool => Value::Bool(bytes[0] != 0),
        ElementKind::Int8 => Value::Int(i8::from_ne_bytes(arr(bytes)) as i64),
        ElementKind::Int16 => Value::Int(i16::from_ne_bytes(arr(bytes)) as i64),
        ElementKind::Int32 => Value::Int(i32::from_ne_bytes(arr(bytes)) as i64),
        ElementKind::Int64 => Value::Int(i64::from_ne_bytes(arr(bytes))),
        ElementKind::UInt8 => Value::UInt(bytes[0] as u64),
        ElementKind::UInt16 => Value::UInt(u16::from_ne_bytes(arr(bytes)) as u64),
        ElementKind::UInt32 => Value::UInt(u32::from_ne_bytes(arr(bytes)) as u64),
        ElementKind::UInt64 => Value::UInt(u64::from_ne_bytes(arr(bytes))),
        ElementKind::Float32 => Value::Float(f32::from_ne_bytes(arr(bytes)) as f64),
        ElementKind::Float64 => Value::Float(f64::from_ne_bytes(arr(bytes))),
        ElementKind::Float128 => Value::Float(bits128_to_f64(u128::from_ne_bytes(arr(bytes)))),
        ElementKind::Complex64 => Value::Complex(
            f32::from_ne_bytes(arr(bytes)) as f64,
            f32::from_ne_bytes(arr(&bytes[4..])) as f64,
        ),
        ElementKind::Complex128 => Value::Complex(
            f64::from_ne_bytes(arr(bytes)),
            f64::from_ne_bytes(arr(&bytes[8..])),
        ),
        ElementKind::Complex256 => Value::Complex(
            bits128_to_f64(u128::from_ne_bytes(arr(bytes))),
            bits128_to_f64(u128::from_ne_bytes(arr(&bytes[16..]))),
        ),
        ElementKind::Record => Value::Record(bytes[..elem.bytes()].to_vec()),
        ElementKind::Host => panic!("host elements are not byte-encoded"),
    }
}

/// Encode `value` as one element of type `elem` into `out`.
///
/// The value is first cast with [`Value::cast_to`]. `Undefined` and host
/// slots are rejected: the caller routes those to the mask or host storage.
pub fn encode(elem: ElementType, value: &Value, out: &mut [u8]) -> Result<(), ArrayError> {
    let unsupported = |operation| ArrayError::UnsupportedElement {
        kind: elem.kind(),
        operation,
    };
    if elem.is_host() {
        return Err(unsupported("byte encoding"));
    }
    let cast = value.cast_to(elem)?;
    match (elem.kind(), cast) {
        (ElementKind::Bool, Value::Bool(b)) => out[0] = b as u8,
        (ElementKind::Int8, Value::Int(v)) => out[..1].copy_from_slice(&(v as i8).to_ne_bytes()),
        (ElementKind::Int16, Value::Int(v)) => out[..2].copy_from_slice(&(v as i16).to_ne_bytes()),
        (ElementKind::Int32, Value::Int(v)) => out[..4].copy_from_slice(&(v as i32).to_ne_bytes()),
        (ElementKind::Int64, Value::Int(v)) => out[..8].copy_from_slice(&v.to_ne_bytes()),
        (ElementKind::UInt8, Value::UInt(v)) => out[0] = v as u8,
        (ElementKind::UInt16, Value::UInt(v)) => out[..2].copy_from_slice(&(v as u16).to_ne_bytes()),
        (ElementKind::UInt32, Value::UInt(v)) => out[..4].copy_from_slice(&(v as u32).to_ne_bytes()),
        (ElementKind::UInt64, Value::UInt(v)) => out[..8].copy_from_slice(&v.to_ne_bytes()),
        (ElementKind::Float32, Value::Float(v)) => {
            out[..4].copy_from_slice(&(v as f32).to_ne_bytes())
        }
        (ElementKind::Float64, Value::Float(v)) => out[..8].copy_from_slice(&v.to_ne_bytes()),
        (ElementKind::Float128, Value::Float(v)) => {
            out[..16].copy_from_slice(&f64_to_bits128(v).to_ne_bytes())
        }
        (ElementKind::Complex64, Value::Complex(re, im)) => {
            out[..4].copy_from_slice(&(re as f32).to_ne_bytes());
            out[4..8].copy_from_slice(&(im as f32).to_ne_bytes());
        }
        (ElementKind::Complex128, Value::Complex(re, im)) => {
            out[..8].copy_from_slice(&re.to_ne_bytes());
            out[8..16].copy_from_slice(&im.to_ne_bytes());
        }
        (ElementKind::Complex256, Value::Complex(re, im)) => {
            out[..16].copy_from_slice(&f64_to_bits128(re).to_ne_bytes());
            out[16..32].copy_from_slice(&f64_to_bits128(im).to_ne_bytes());
        }
        (ElementKind::Record, Value::Record(bytes)) => out[..bytes.len()].copy_from_slice(&bytes),
        (_, Value::Undefined) => return Err(unsupported("encoding the undefined sentinel")),
        _ => return Err(unsupported("encoding")),
    }
    Ok(())
}
