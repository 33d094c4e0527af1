//! Element kinds, their static property table, and cast priority.

use std::fmt;

/// Broad numeric class of an element kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementClass {
    /// `true`/`false`, stored as one byte.
    Boolean,
    /// Two's-complement signed integer.
    Signed,
    /// Unsigned integer.
    Unsigned,
    /// IEEE-754 binary floating point.
    Float,
    /// Pair of IEEE-754 floats (real, imaginary).
    Complex,
    /// Opaque fixed-length byte record.
    Record,
    /// Host value slot (not byte-addressable).
    Host,
}

/// Primitive element kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// Boolean.
    Bool,
    /// Signed 8-bit integer.
    Int8,
    /// Signed 16-bit integer.
    Int16,
    /// Signed 32-bit integer.
    Int32,
    /// Signed 64-bit integer.
    Int64,
    /// Unsigned 8-bit integer.
    UInt8,
    /// Unsigned 16-bit integer.
    UInt16,
    /// Unsigned 32-bit integer.
    UInt32,
    /// Unsigned 64-bit integer.
    UInt64,
    /// 32-bit float.
    Float32,
    /// 64-bit float.
    Float64,
    /// 128-bit float, stored in IEEE binary128 layout.
    Float128,
    /// Complex of two 32-bit floats.
    Complex64,
    /// Complex of two 64-bit floats.
    Complex128,
    /// Complex of two 128-bit floats.
    Complex256,
    /// Fixed-length byte record; the length lives in [`ElementType`].
    Record,
    /// Opaque host value.
    Host,
}

/// Row of the static element table.
struct KindProps {
    bytes: usize,
    class: ElementClass,
    priority: u8,
}

impl ElementKind {
    /// Every element kind, in cast-priority order.
    pub const ALL: [ElementKind; 17] = [
        Self::Bool,
        Self::Int8,
        Self::UInt8,
        Self::Int16,
        Self::UInt16,
        Self::Int32,
        Self::UInt32,
        Self::Int64,
        Self::UInt64,
        Self::Float32,
        Self::Float64,
        Self::Float128,
        Self::Complex64,
        Self::Complex128,
        Self::Complex256,
        Self::Host,
        Self::Record,
    ];

    fn props(self) -> KindProps {
        use ElementClass::*;
        let (bytes, class, priority) = match self {
            Self::Bool => (1, Boolean, 0),
            Self::Int8 => (1, Signed, 1),
            Self::UInt8 => (1, Unsigned, 2),
            Self::Int16 => (2, Signed, 3),
            Self::UInt16 => (2, Unsigned, 4),
            Self::Int32 => (4, Signed, 5),
            Self::UInt32 => (4, Unsigned, 6),
            Self::Int64 => (8, Signed, 7),
            Self::UInt64 => (8, Unsigned, 8),
            Self::Float32 => (4, Float, 9),
            Self::Float64 => (8, Float, 10),
            Self::Float128 => (16, Float, 11),
            Self::Complex64 => (8, Complex, 12),
            Self::Complex128 => (16, Complex, 13),
            Self::Complex256 => (32, Complex, 14),
            Self::Host => (0, Host, 15),
            Self::Record => (0, Record, u8::MAX),
        };
        KindProps {
            bytes,
            class,
            priority,
        }
    }

    /// Fixed byte size, or `None` for records (size per array) and host slots.
    pub fn fixed_bytes(self) -> Option<usize> {
        match self {
            Self::Record | Self::Host => None,
            _ => Some(self.props().bytes),
        }
    }

    /// Numeric class.
    pub fn class(self) -> ElementClass {
        self.props().class
    }

    /// Cast priority; higher wins in [`ElementKind::promote`].
    pub fn priority(self) -> u8 {
        self.props().priority
    }

    /// Whether bitwise operations (and bit fields) are defined on this kind.
    pub fn is_integral(self) -> bool {
        matches!(
            self.class(),
            ElementClass::Boolean | ElementClass::Signed | ElementClass::Unsigned
        )
    }

    /// Whether elements are plain bytes (everything except host slots).
    pub fn is_byte_addressable(self) -> bool {
        self != Self::Host
    }

    /// Result kind of a binary operation between `a` and `b`.
    ///
    /// The higher-priority kind wins, except that a complex kind is widened
    /// to hold a more precise float operand. Records only promote with
    /// themselves; `None` means the pair has no common kind.
    pub fn promote(a: ElementKind, b: ElementKind) -> Option<ElementKind> {
        if a == Self::Record || b == Self::Record {
            return (a == b).then_some(a);
        }
        let (hi, lo) = if a.priority() >= b.priority() { (a, b) } else { (b, a) };
        if hi.class() == ElementClass::Complex && lo.class() == ElementClass::Float {
            let widened = match (hi, lo) {
                (Self::Complex64, Self::Float64) => Self::Complex128,
                (Self::Complex64 | Self::Complex128, Self::Float128) => Self::Complex256,
                _ => hi,
            };
            return Some(widened);
        }
        Some(hi)
    }

    /// Element kind wide enough to hold an unsigned bit field of `width` bits.
    pub fn for_bit_width(width: u32) -> Option<ElementKind> {
        match width {
            1 => Some(Self::Bool),
            2..=8 => Some(Self::UInt8),
            9..=16 => Some(Self::UInt16),
            17..=32 => Some(Self::UInt32),
            33..=64 => Some(Self::UInt64),
            _ => None,
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::UInt8 => "uint8",
            Self::UInt16 => "uint16",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Float128 => "float128",
            Self::Complex64 => "complex64",
            Self::Complex128 => "complex128",
            Self::Complex256 => "complex256",
            Self::Record => "record",
            Self::Host => "host",
        };
        f.write_str(name)
    }
}

/// A concrete element type: a kind plus its byte size.
///
/// For every kind except [`ElementKind::Record`] the size is implied by the
/// kind. Host slots report a size of zero because they are not stored as
/// bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ElementType {
    kind: ElementKind,
    bytes: usize,
}

impl ElementType {
    /// Element type of a fixed-size kind.
    ///
    /// # Panics
    ///
    /// Panics if `kind` is [`ElementKind::Record`]; use [`ElementType::record`].
    pub fn new(kind: ElementKind) -> Self {
        assert!(
            kind != ElementKind::Record,
            "record element types need an explicit size"
        );
        Self {
            kind,
            bytes: kind.fixed_bytes().unwrap_or(0),
        }
    }

    /// Fixed-length record of `bytes` bytes (must be non-zero).
    pub fn record(bytes: usize) -> Option<Self> {
        (bytes > 0).then_some(Self {
            kind: ElementKind::Record,
            bytes,
        })
    }

    /// Boolean element type, as used by masks.
    pub fn boolean() -> Self {
        Self::new(ElementKind::Bool)
    }

    /// The element kind.
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Byte size of one element (zero for host slots).
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// Whether this is the host-value kind.
    pub fn is_host(&self) -> bool {
        self.kind == ElementKind::Host
    }
}

impl From<ElementKind> for ElementType {
    fn from(kind: ElementKind) -> Self {
        Self::new(kind)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ElementKind::Record => write!(f, "record[{}]", self.bytes),
            kind => write!(f, "{kind}"),
        }
    }
}
