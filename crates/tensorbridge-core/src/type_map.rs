//! Type Mapping Table between managed dtypes and native codes.
//!
//! The native side enumerates its element types and attribute kinds with plain
//! integers. Codes here match that enumeration; codes the native side knows
//! but the managed side has no dtype for (uint8, int64) are kept so they can
//! be named in errors.

use crate::attr::{AttrKind, AttrValue};
use crate::dtype::DType;
use crate::{Error, Result};
use std::fmt;

/// A native element type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct NativeType(pub i32);

impl NativeType {
    pub const FLOAT: NativeType = NativeType(1);
    pub const INT32: NativeType = NativeType(3);
    pub const UINT8: NativeType = NativeType(4);
    pub const STRING: NativeType = NativeType(7);
    pub const COMPLEX64: NativeType = NativeType(8);
    pub const INT64: NativeType = NativeType(9);
    pub const BOOL: NativeType = NativeType(10);

    pub fn code(self) -> i32 {
        self.0
    }

    /// Native name of the code, if it is one the bridge knows.
    pub fn name(self) -> Option<&'static str> {
        match self {
            NativeType::FLOAT => Some("TF_FLOAT"),
            NativeType::INT32 => Some("TF_INT32"),
            NativeType::UINT8 => Some("TF_UINT8"),
            NativeType::STRING => Some("TF_STRING"),
            NativeType::COMPLEX64 => Some("TF_COMPLEX64"),
            NativeType::INT64 => Some("TF_INT64"),
            NativeType::BOOL => Some("TF_BOOL"),
            _ => None,
        }
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.pad(name),
            None => write!(f, "native type {}", self.0),
        }
    }
}

/// Map a managed dtype to its native code. Total over [`DType`].
pub fn to_native_type(dtype: DType) -> NativeType {
    match dtype {
        DType::Float32 => NativeType::FLOAT,
        DType::Int32 => NativeType::INT32,
        DType::Bool => NativeType::BOOL,
        DType::String => NativeType::STRING,
        DType::Complex64 => NativeType::COMPLEX64,
    }
}

/// Map a native code back to a managed dtype.
///
/// Fails with [`Error::UnsupportedType`] for codes without a managed dtype,
/// including ones the native side does define.
pub fn to_managed_type(native: NativeType) -> Result<DType> {
    match native {
        NativeType::FLOAT => Ok(DType::Float32),
        NativeType::INT32 => Ok(DType::Int32),
        NativeType::BOOL => Ok(DType::Bool),
        NativeType::STRING => Ok(DType::String),
        NativeType::COMPLEX64 => Ok(DType::Complex64),
        other => Err(Error::UnsupportedType(format!(
            "{other} has no managed dtype"
        ))),
    }
}

/// Native attribute-descriptor: a base kind code and a list flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttrDescriptor {
    pub code: i32,
    pub is_list: bool,
}

impl AttrDescriptor {
    pub const STRING: i32 = 0;
    pub const INT: i32 = 1;
    pub const FLOAT: i32 = 2;
    pub const BOOL: i32 = 3;
    pub const TYPE: i32 = 4;
    pub const SHAPE: i32 = 5;
    pub const TENSOR: i32 = 6;

    const fn scalar(code: i32) -> Self {
        Self {
            code,
            is_list: false,
        }
    }

    const fn list(code: i32) -> Self {
        Self {
            code,
            is_list: true,
        }
    }

    /// Descriptor for an attribute kind.
    pub fn for_kind(kind: AttrKind) -> Self {
        match kind {
            AttrKind::String => Self::scalar(Self::STRING),
            AttrKind::Int => Self::scalar(Self::INT),
            AttrKind::Float => Self::scalar(Self::FLOAT),
            AttrKind::Bool => Self::scalar(Self::BOOL),
            AttrKind::Type => Self::scalar(Self::TYPE),
            AttrKind::Shape => Self::scalar(Self::SHAPE),
            AttrKind::IntList => Self::list(Self::INT),
            AttrKind::TensorList => Self::list(Self::TYPE),
        }
    }

    /// Inverse of [`AttrDescriptor::for_kind`].
    pub fn kind(self) -> Result<AttrKind> {
        match (self.code, self.is_list) {
            (Self::STRING, false) => Ok(AttrKind::String),
            (Self::INT, false) => Ok(AttrKind::Int),
            (Self::FLOAT, false) => Ok(AttrKind::Float),
            (Self::BOOL, false) => Ok(AttrKind::Bool),
            (Self::TYPE, false) => Ok(AttrKind::Type),
            (Self::SHAPE, false) => Ok(AttrKind::Shape),
            (Self::INT, true) => Ok(AttrKind::IntList),
            (Self::TYPE, true) => Ok(AttrKind::TensorList),
            (code, is_list) => Err(Error::UnsupportedType(format!(
                "attribute descriptor code {code} (list: {is_list})"
            ))),
        }
    }
}

/// Map an attribute value to the descriptor the native layer expects.
pub fn to_attribute_kind(value: &AttrValue) -> AttrDescriptor {
    AttrDescriptor::for_kind(value.kind())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn any_dtype() -> impl Strategy<Value = DType> {
        prop::sample::select(DType::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn prop_dtype_round_trip(dtype in any_dtype()) {
            prop_assert_eq!(to_managed_type(to_native_type(dtype)).unwrap(), dtype);
        }

        #[test]
        fn prop_unknown_codes_rejected(code in 11i32..1000) {
            let is_unsupported = matches!(
                to_managed_type(NativeType(code)),
                Err(Error::UnsupportedType(_))
            );
            prop_assert!(is_unsupported);
        }
    }

    #[test]
    fn test_mapping_is_injective() {
        let codes: HashSet<_> = DType::ALL.into_iter().map(to_native_type).collect();
        assert_eq!(codes.len(), DType::ALL.len());
    }

    #[test]
    fn test_native_only_codes_are_unsupported() {
        for native in [NativeType::UINT8, NativeType::INT64, NativeType(0)] {
            let err = to_managed_type(native).unwrap_err();
            assert!(matches!(err, Error::UnsupportedType(_)), "{native}: {err}");
        }
    }

    #[test]
    fn test_bool_is_native_bool() {
        assert_eq!(to_native_type(DType::Bool), NativeType::BOOL);
        assert_eq!(NativeType::BOOL.code(), 10);
    }

    #[test]
    fn test_attribute_codes() {
        assert_eq!(to_attribute_kind(&AttrValue::Int(3)), AttrDescriptor { code: 1, is_list: false });
        assert_eq!(
            to_attribute_kind(&AttrValue::Type(DType::Float32)),
            AttrDescriptor { code: 4, is_list: false }
        );
        assert_eq!(
            to_attribute_kind(&AttrValue::IntList(vec![1, 2])),
            AttrDescriptor { code: 1, is_list: true }
        );
        assert_eq!(
            to_attribute_kind(&AttrValue::TensorList(vec![DType::Int32])),
            AttrDescriptor { code: 4, is_list: true }
        );
        assert_eq!(to_attribute_kind(&AttrValue::String("x".into())).code, 0);
    }

    #[test]
    fn test_descriptor_round_trip() {
        for kind in AttrKind::ALL {
            assert_eq!(AttrDescriptor::for_kind(kind).kind().unwrap(), kind);
        }
        assert!(AttrDescriptor { code: 6, is_list: false }.kind().is_err());
    }
}
