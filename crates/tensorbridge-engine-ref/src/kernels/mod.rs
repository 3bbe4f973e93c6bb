//! Host kernels, looked up by native op name.

mod cast;
mod elementwise;
mod identity;
mod shape;

use bytemuck::Pod;
use tensorbridge_core::dtype::num_elements;
use tensorbridge_core::{NativeAttr, NativeAttrValue, NativeError, NativeStatus, NativeType};

/// A tensor value held by the engine.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct HostValue {
    pub shape: Vec<usize>,
    pub dtype: NativeType,
    pub bytes: Vec<u8>,
}

impl HostValue {
    pub fn new(shape: Vec<usize>, dtype: NativeType, bytes: Vec<u8>) -> Self {
        Self {
            shape,
            dtype,
            bytes,
        }
    }

    pub fn from_elements<T: Pod>(shape: Vec<usize>, dtype: NativeType, values: &[T]) -> Self {
        Self::new(shape, dtype, bytemuck::cast_slice(values).to_vec())
    }

    /// Saturates at `usize::MAX`; only empty string slots can carry such a shape.
    pub fn num_elements(&self) -> usize {
        num_elements(&self.shape).unwrap_or(usize::MAX)
    }

    pub fn elements<T: Pod>(&self) -> Vec<T> {
        bytemuck::pod_collect_to_vec(&self.bytes)
    }
}

/// Element size of fixed-width native types.
pub(crate) fn element_size(dtype: NativeType) -> Option<usize> {
    match dtype {
        NativeType::FLOAT | NativeType::INT32 => Some(4),
        NativeType::BOOL | NativeType::UINT8 => Some(1),
        NativeType::COMPLEX64 | NativeType::INT64 => Some(8),
        _ => None,
    }
}

/// Run kernel `name` over `inputs`.
pub(crate) fn run(
    name: &str,
    attrs: &[NativeAttr],
    inputs: &[&HostValue],
) -> Result<Vec<HostValue>, NativeError> {
    match name {
        "Identity" => identity::identity(attrs, inputs),
        "IdentityN" => identity::identity_n(attrs, inputs),
        "Add" | "Sub" | "Mul" => elementwise::arithmetic(name, attrs, inputs),
        "Equal" => elementwise::equal(attrs, inputs),
        "Cast" => cast::cast(attrs, inputs),
        "Reshape" => shape::reshape(attrs, inputs),
        "ConcatV2" => shape::concat(attrs, inputs),
        _ => Err(NativeError::not_found(format!(
            "Op type not registered '{name}' in binary"
        ))),
    }
}

fn find_attr<'a>(attrs: &'a [NativeAttr], name: &str) -> Result<&'a NativeAttrValue, NativeError> {
    attrs
        .iter()
        .find(|attr| attr.name == name)
        .map(|attr| &attr.value)
        .ok_or_else(|| NativeError::invalid_argument(format!("NodeDef missing attr '{name}'")))
}

pub(crate) fn attr_type(attrs: &[NativeAttr], name: &str) -> Result<NativeType, NativeError> {
    match find_attr(attrs, name)? {
        NativeAttrValue::Type(dtype) => Ok(*dtype),
        other => Err(wrong_kind(name, "type", other)),
    }
}

pub(crate) fn attr_int(attrs: &[NativeAttr], name: &str) -> Result<i64, NativeError> {
    match find_attr(attrs, name)? {
        NativeAttrValue::Int(value) => Ok(*value),
        other => Err(wrong_kind(name, "int", other)),
    }
}

pub(crate) fn attr_type_list(
    attrs: &[NativeAttr],
    name: &str,
) -> Result<Vec<NativeType>, NativeError> {
    match find_attr(attrs, name)? {
        NativeAttrValue::TypeList(dtypes) => Ok(dtypes.clone()),
        other => Err(wrong_kind(name, "list(type)", other)),
    }
}

fn wrong_kind(name: &str, expected: &str, actual: &NativeAttrValue) -> NativeError {
    NativeError::invalid_argument(format!(
        "AttrValue for '{name}' must be {expected}, got {actual:?}"
    ))
}

/// Check the dtype of `input` against type attribute `attr`.
pub(crate) fn expect_dtype(
    attrs: &[NativeAttr],
    attr: &str,
    input: &HostValue,
) -> Result<NativeType, NativeError> {
    let declared = attr_type(attrs, attr)?;
    if declared != input.dtype {
        return Err(NativeError::invalid_argument(format!(
            "Attribute {attr}={declared} does not match input of type {}",
            input.dtype
        )));
    }
    Ok(declared)
}

pub(crate) fn expect_inputs(
    op: &str,
    inputs: &[&HostValue],
    count: usize,
) -> Result<(), NativeError> {
    if inputs.len() != count {
        return Err(NativeError::invalid_argument(format!(
            "{op} expects {count} inputs, got {}",
            inputs.len()
        )));
    }
    Ok(())
}

pub(crate) fn unimplemented(op: &str, dtype: NativeType) -> NativeError {
    NativeError::new(
        NativeStatus::UNIMPLEMENTED,
        format!("{op} has no kernel for {dtype}"),
    )
}
