//! Core types for the tensorbridge native bridge.
//!
//! This crate holds everything the bridge needs that does not touch a live
//! native context:
//! - Managed dtypes and the Type Mapping Table (`DType`, `NativeType`, `AttrKind`)
//! - The attribute tagged union (`AttrValue`, `OpAttribute`)
//! - Op definitions, the op-definition registry and the Attribute Encoder
//! - Byte codecs for bool and string tensors
//! - The native engine seam (`NativeEngine` trait and C ABI types)
//! - The error taxonomy shared by every tensorbridge crate

pub mod attr;
pub mod codec;
pub mod dtype;
pub mod encoder;
pub mod engine;
pub mod ffi;
pub mod op_def;
pub mod registry;
pub mod type_map;

pub use attr::{AttrKind, AttrValue, OpAttribute};
pub use dtype::{DType, TensorId};
pub use encoder::{AttributeEncoder, InputDtypes, OpArgs, encode};
pub use engine::{
    NativeAttr, NativeAttrValue, NativeEngine, NativeError, NativeOutput, NativeStatus,
    NativeToken,
};
pub use op_def::{AttrDef, InputArg, OpDef};
pub use registry::OpRegistry;
pub use type_map::{AttrDescriptor, NativeType};

/// Result type using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for every bridge operation.
///
/// None of these are retried internally. `UseAfterDispose` is a lifecycle
/// bug rather than a bad input; see [`Error::is_fatal`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A dtype or type code with no mapping, or one an op does not allow.
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    /// Two inputs sharing a type attribute disagree on dtype.
    #[error("Dtype mismatch in op '{op}': {first} vs {second}")]
    DtypeMismatch {
        op: String,
        first: DType,
        second: DType,
    },

    /// Data length does not fit the shape.
    ///
    /// A shape whose size overflows `usize` reports `expected` as `usize::MAX`.
    #[error(
        "Shape mismatch: shape {shape:?} of {dtype} needs {expected} bytes/elements, got {actual}"
    )]
    ShapeMismatch {
        shape: Vec<usize>,
        dtype: DType,
        expected: usize,
        actual: usize,
    },

    /// Bytes that do not decode as their dtype, e.g. a bool byte above 1.
    #[error("Corrupt data: {0}")]
    CorruptData(String),

    /// A tensor read or used as an input before it holds data.
    #[error("Tensor {id} is not ready: state is {state}")]
    NotReady { id: TensorId, state: &'static str },

    /// A typed view requested over a tensor of another dtype.
    #[error("Type mismatch: requested a {requested} view of a {actual} tensor")]
    TypeMismatch { requested: DType, actual: DType },

    /// The engine rejected an op call; `message` is its own text.
    #[error("Native execution of '{op}' failed: {message}")]
    NativeExecutionFailure { op: String, message: String },

    /// A handle used after it was disposed.
    #[error("Tensor {0} used after dispose")]
    UseAfterDispose(TensorId),

    /// Data bound to a tensor that already holds data.
    #[error("Tensor {id} is already {state}; rebinding data is not supported")]
    AlreadyBound { id: TensorId, state: &'static str },

    /// An attribute value of a different kind than its declaration.
    #[error("Attribute '{attr}' of op '{op}' declared as {expected}, got {actual}")]
    AttributeMismatch {
        op: String,
        attr: String,
        expected: AttrKind,
        actual: AttrKind,
    },

    /// A required attribute with no explicit, inferred or default value.
    #[error("Attribute '{attr}' of op '{op}' has no value and cannot be inferred")]
    MissingAttribute { op: String, attr: String },

    /// An undeclared, repeated or contradictory attribute.
    #[error("Attribute '{attr}' of op '{op}' is invalid: {message}")]
    InvalidAttribute {
        op: String,
        attr: String,
        message: String,
    },

    /// Input groups do not match the op's declared inputs.
    #[error("Op '{op}' declares {expected} input groups, got {actual}")]
    InputArity {
        op: String,
        expected: usize,
        actual: usize,
    },

    /// An op name missing from the registry.
    #[error("Unknown op: {0}")]
    UnknownOp(String),

    /// A non-execute engine call failed, such as `allocate` or `read_bytes`.
    #[error("Native call {call} failed: {message}")]
    NativeCall {
        call: &'static str,
        message: String,
    },

    /// An op returned a different number of outputs than the caller needs.
    #[error("Op '{op}' returned {actual} outputs, expected {expected}")]
    OutputArity {
        op: String,
        expected: usize,
        actual: usize,
    },
}

impl Error {
    /// Whether the error indicates a lifecycle bug rather than a bad input.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::UseAfterDispose(_))
    }
}
