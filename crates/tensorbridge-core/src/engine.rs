//! The seam between the bridge and the native execution context.
//!
//! The native side is an external collaborator. It owns memory, enumerates
//! types with its own codes and hands out opaque tokens that must be released
//! exactly once. [`NativeEngine`] is the whole surface the bridge consumes.

use crate::attr::{AttrValue, OpAttribute};
use crate::type_map::{AttrDescriptor, NativeType, to_attribute_kind, to_native_type};
use std::fmt;

/// Opaque token naming one native allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NativeToken(pub u64);

impl fmt::Display for NativeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "token:{}", self.0)
    }
}

/// One output of a native op: its token plus the shape and dtype the native
/// layer reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeOutput {
    pub token: NativeToken,
    pub shape: Vec<usize>,
    pub dtype: NativeType,
}

/// Native status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct NativeStatus(pub i32);

impl NativeStatus {
    pub const OK: NativeStatus = NativeStatus(0);
    pub const CANCELLED: NativeStatus = NativeStatus(1);
    pub const UNKNOWN: NativeStatus = NativeStatus(2);
    pub const INVALID_ARGUMENT: NativeStatus = NativeStatus(3);
    pub const NOT_FOUND: NativeStatus = NativeStatus(5);
    pub const FAILED_PRECONDITION: NativeStatus = NativeStatus(9);
    pub const UNIMPLEMENTED: NativeStatus = NativeStatus(12);
    pub const INTERNAL: NativeStatus = NativeStatus(13);

    pub fn is_ok(self) -> bool {
        self == NativeStatus::OK
    }

    pub fn name(self) -> &'static str {
        match self {
            NativeStatus::OK => "OK",
            NativeStatus::CANCELLED => "Cancelled",
            NativeStatus::INVALID_ARGUMENT => "InvalidArgument",
            NativeStatus::NOT_FOUND => "NotFound",
            NativeStatus::FAILED_PRECONDITION => "FailedPrecondition",
            NativeStatus::UNIMPLEMENTED => "Unimplemented",
            NativeStatus::INTERNAL => "Internal",
            _ => "Unknown",
        }
    }
}

/// Failure reported by the native layer. The message is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeError {
    pub status: NativeStatus,
    pub message: String,
}

impl NativeError {
    pub fn new(status: NativeStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(NativeStatus::INVALID_ARGUMENT, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(NativeStatus::NOT_FOUND, message)
    }
}

impl fmt::Display for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status.name(), self.message)
    }
}

impl std::error::Error for NativeError {}

/// Attribute value with dtypes already lowered to native codes.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeAttrValue {
    Int(i64),
    Float(f32),
    Bool(bool),
    Type(NativeType),
    Shape(Vec<i64>),
    String(String),
    IntList(Vec<i64>),
    TypeList(Vec<NativeType>),
}

/// An attribute as the native executor receives it.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeAttr {
    pub name: String,
    pub descriptor: AttrDescriptor,
    pub value: NativeAttrValue,
}

impl NativeAttr {
    pub fn lower(attr: &OpAttribute) -> Self {
        let value = match &attr.value {
            AttrValue::Int(v) => NativeAttrValue::Int(*v),
            AttrValue::Float(v) => NativeAttrValue::Float(*v),
            AttrValue::Bool(v) => NativeAttrValue::Bool(*v),
            AttrValue::Type(dtype) => NativeAttrValue::Type(to_native_type(*dtype)),
            AttrValue::Shape(dims) => NativeAttrValue::Shape(dims.clone()),
            AttrValue::String(s) => NativeAttrValue::String(s.clone()),
            AttrValue::IntList(values) => NativeAttrValue::IntList(values.clone()),
            AttrValue::TensorList(dtypes) => {
                NativeAttrValue::TypeList(dtypes.iter().copied().map(to_native_type).collect())
            }
        };
        Self {
            name: attr.name.clone(),
            descriptor: to_attribute_kind(&attr.value),
            value,
        }
    }
}

/// Lower an ordered attribute list, keeping its order.
pub fn lower_attributes(attrs: &[OpAttribute]) -> Vec<NativeAttr> {
    attrs.iter().map(NativeAttr::lower).collect()
}

/// The native execution context.
///
/// Calls block until the native side finishes. Implementations are not
/// required to be thread-safe; the runtime serializes access.
pub trait NativeEngine {
    /// Version string of the native library.
    fn version(&self) -> String;

    /// Allocate uninitialised storage for a tensor.
    fn allocate(&mut self, shape: &[usize], dtype: NativeType)
    -> Result<NativeToken, NativeError>;

    /// Copy caller bytes into an allocation.
    fn bind_bytes(&mut self, token: NativeToken, bytes: &[u8]) -> Result<(), NativeError>;

    /// Copy an allocation's bytes out.
    fn read_bytes(&mut self, token: NativeToken) -> Result<Vec<u8>, NativeError>;

    /// Run an op. Every output token is owned by the caller.
    fn execute_op(
        &mut self,
        name: &str,
        attrs: &[NativeAttr],
        inputs: &[NativeToken],
    ) -> Result<Vec<NativeOutput>, NativeError>;

    /// Release a token. Releasing an unknown token is a no-op.
    fn release(&mut self, token: NativeToken);

    /// Name of the device holding the token, e.g. `/job:localhost/device:CPU:0`.
    fn device_name(&self, token: NativeToken) -> Result<String, NativeError>;

    /// Copy a token's data to host memory, returning a new token.
    fn copy_to_host(&mut self, token: NativeToken) -> Result<NativeToken, NativeError>;
}

impl<E: NativeEngine + ?Sized> NativeEngine for Box<E> {
    fn version(&self) -> String {
        (**self).version()
    }

    fn allocate(
        &mut self,
        shape: &[usize],
        dtype: NativeType,
    ) -> Result<NativeToken, NativeError> {
        (**self).allocate(shape, dtype)
    }

    fn bind_bytes(&mut self, token: NativeToken, bytes: &[u8]) -> Result<(), NativeError> {
        (**self).bind_bytes(token, bytes)
    }

    fn read_bytes(&mut self, token: NativeToken) -> Result<Vec<u8>, NativeError> {
        (**self).read_bytes(token)
    }

    fn execute_op(
        &mut self,
        name: &str,
        attrs: &[NativeAttr],
        inputs: &[NativeToken],
    ) -> Result<Vec<NativeOutput>, NativeError> {
        (**self).execute_op(name, attrs, inputs)
    }

    fn release(&mut self, token: NativeToken) {
        (**self).release(token)
    }

    fn device_name(&self, token: NativeToken) -> Result<String, NativeError> {
        (**self).device_name(token)
    }

    fn copy_to_host(&mut self, token: NativeToken) -> Result<NativeToken, NativeError> {
        (**self).copy_to_host(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::DType;

    #[test]
    fn test_lowering_keeps_order_and_codes() {
        let attrs = [
            OpAttribute::int("N", 3),
            OpAttribute::dtype("T", DType::Bool),
            OpAttribute::new("T2", AttrValue::TensorList(vec![DType::Int32, DType::String])),
        ];
        let lowered = lower_attributes(&attrs);
        assert_eq!(lowered.len(), 3);
        assert_eq!(lowered[0].name, "N");
        assert_eq!(lowered[0].descriptor.code, AttrDescriptor::INT);
        assert_eq!(lowered[1].value, NativeAttrValue::Type(NativeType::BOOL));
        assert_eq!(
            lowered[2].value,
            NativeAttrValue::TypeList(vec![NativeType::INT32, NativeType::STRING])
        );
        assert!(lowered[2].descriptor.is_list);
    }

    #[test]
    fn test_native_error_display() {
        let err = NativeError::not_found("Op type not registered 'Nope'");
        assert_eq!(err.to_string(), "NotFound: Op type not registered 'Nope'");
        assert_eq!(NativeStatus(42).name(), "Unknown");
    }
}
