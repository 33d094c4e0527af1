//! Operand descriptors for kernel runs.

use tessera_core::ArrayId;

/// How a kernel uses an operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Access {
    /// Read only.
    Read,
    /// Written only; the previous contents are kept at masked indices.
    Write,
    /// Read and written in place.
    ReadWrite,
}

impl Access {
    /// Whether the kernel writes this operand.
    pub fn writes(self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite)
    }
}

/// One array taking part in a kernel run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Operand {
    /// The array.
    pub id: ArrayId,
    /// How the kernel uses it.
    pub access: Access,
    /// Its mask contributes to the combined mask.
    pub mask_source: bool,
    /// Its mask is overwritten from the combined mask after the run.
    pub mask_sink: bool,
}

impl Operand {
    /// A read operand that is a mask source.
    pub fn read(id: ArrayId) -> Self {
        Self {
            id,
            access: Access::Read,
            mask_source: true,
            mask_sink: false,
        }
    }

    /// A written operand that is a mask sink.
    pub fn write(id: ArrayId) -> Self {
        Self {
            id,
            access: Access::Write,
            mask_source: false,
            mask_sink: true,
        }
    }

    /// An in-place operand: both mask source and sink.
    pub fn read_write(id: ArrayId) -> Self {
        Self {
            id,
            access: Access::ReadWrite,
            mask_source: true,
            mask_sink: true,
        }
    }

    /// Override the mask-source flag.
    pub fn with_mask_source(mut self, source: bool) -> Self {
        self.mask_source = source;
        self
    }

    /// Override the mask-sink flag.
    pub fn with_mask_sink(mut self, sink: bool) -> Self {
        self.mask_sink = sink;
        self
    }
}
