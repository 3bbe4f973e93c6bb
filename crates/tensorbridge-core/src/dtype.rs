//! Managed dtypes and tensor identities.

use std::fmt;

/// Closed set of element types a managed tensor can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DType {
    Float32,
    Int32,
    /// One byte per element on both sides of the bridge; only 0 and 1 are legal.
    Bool,
    /// Variable-length byte strings, see [`crate::codec`] for the layout.
    String,
    /// Interleaved (re, im) pairs of f32.
    Complex64,
}

impl DType {
    /// Every managed dtype, in declaration order.
    pub const ALL: [DType; 5] = [
        DType::Float32,
        DType::Int32,
        DType::Bool,
        DType::String,
        DType::Complex64,
    ];

    /// Size of one element in bytes, or `None` for variable-length strings.
    pub fn element_size(self) -> Option<usize> {
        match self {
            DType::Float32 | DType::Int32 => Some(4),
            DType::Bool => Some(1),
            DType::Complex64 => Some(8),
            DType::String => None,
        }
    }

    /// Lowercase name used in messages and the CLI tables.
    pub fn name(self) -> &'static str {
        match self {
            DType::Float32 => "float32",
            DType::Int32 => "int32",
            DType::Bool => "bool",
            DType::String => "string",
            DType::Complex64 => "complex64",
        }
    }

    /// Parse a dtype from its lowercase name.
    pub fn from_name(name: &str) -> Option<Self> {
        DType::ALL.into_iter().find(|dtype| dtype.name() == name)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// Identity of a managed tensor's handle.
///
/// Identities are handed out by the runtime from a monotonic counter and are
/// never reused, so a stale id can always be told apart from a live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TensorId(u64);

impl TensorId {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Number of elements described by a shape (1 for scalars).
///
/// `None` if the count does not fit in `usize`. A shape with a zero
/// dimension always has 0 elements.
pub fn num_elements(shape: &[usize]) -> Option<usize> {
    if shape.contains(&0) {
        return Some(0);
    }
    shape.iter().try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
}
