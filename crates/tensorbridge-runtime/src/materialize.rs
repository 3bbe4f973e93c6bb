//! Data materialization path: native readback and typed views.

use crate::config::BridgeConfig;
use std::sync::Arc;
use tensorbridge_core::codec::{decode_strings, encode_strings};
use tensorbridge_core::{DType, Error, NativeEngine, NativeToken, Result};

/// Read a token's bytes, staging through host memory when the token lives on
/// another device.
pub(crate) fn read_native<E: NativeEngine + ?Sized>(
    engine: &mut E,
    token: NativeToken,
    config: &BridgeConfig,
) -> Result<Vec<u8>> {
    let device = engine
        .device_name(token)
        .map_err(|err| native_call("device_name", err))?;

    if config.is_host_device(&device) {
        return engine
            .read_bytes(token)
            .map_err(|err| native_call("read_bytes", err));
    }

    tracing::debug!(%token, %device, "Copying to host before read");
    let host = engine
        .copy_to_host(token)
        .map_err(|err| native_call("copy_to_host", err))?;
    let bytes = engine.read_bytes(host);
    engine.release(host);
    bytes.map_err(|err| native_call("read_bytes", err))
}

pub(crate) fn native_call(call: &'static str, err: tensorbridge_core::NativeError) -> Error {
    Error::NativeCall {
        call,
        message: err.to_string(),
    }
}

/// A Rust element type that can view tensor bytes of one dtype.
pub trait Element: Sized {
    /// The dtype this element views.
    const DTYPE: DType;

    /// Decode bytes already checked against this dtype's layout.
    fn decode(bytes: &[u8]) -> Vec<Self>;

    fn encode(values: &[Self]) -> Vec<u8>;
}

macro_rules! pod_element {
    ($ty:ty, $dtype:expr) => {
        impl Element for $ty {
            const DTYPE: DType = $dtype;

            fn decode(bytes: &[u8]) -> Vec<Self> {
                bytemuck::pod_collect_to_vec(bytes)
            }

            fn encode(values: &[Self]) -> Vec<u8> {
                bytemuck::cast_slice(values).to_vec()
            }
        }
    };
}

pod_element!(f32, DType::Float32);
pod_element!(i32, DType::Int32);
pod_element!([f32; 2], DType::Complex64);
// Bool tensors viewed as raw 0/1 bytes.
pod_element!(u8, DType::Bool);

impl Element for bool {
    const DTYPE: DType = DType::Bool;

    fn decode(bytes: &[u8]) -> Vec<Self> {
        bytes.iter().map(|&b| b == 1).collect()
    }

    fn encode(values: &[Self]) -> Vec<u8> {
        values.iter().map(|&v| u8::from(v)).collect()
    }
}

/// Materialized bytes of a tensor together with its metadata.
///
/// Only built from bytes that passed `validate_bytes`.
#[derive(Debug, Clone)]
pub struct TensorView {
    shape: Vec<usize>,
    dtype: DType,
    bytes: Arc<[u8]>,
}

impl TensorView {
    pub(crate) fn new(shape: Vec<usize>, dtype: DType, bytes: Arc<[u8]>) -> Self {
        Self {
            shape,
            dtype,
            bytes,
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// The raw bytes, exactly as the native layer holds them.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Typed copy of the elements.
    ///
    /// # Errors
    /// [`Error::TypeMismatch`] if `T` does not view this tensor's dtype.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        if T::DTYPE != self.dtype {
            return Err(Error::TypeMismatch {
                requested: T::DTYPE,
                actual: self.dtype,
            });
        }
        Ok(T::decode(&self.bytes))
    }

    /// Elements of a string tensor as raw byte strings.
    pub fn string_bytes(&self) -> Result<Vec<Vec<u8>>> {
        if self.dtype != DType::String {
            return Err(Error::TypeMismatch {
                requested: DType::String,
                actual: self.dtype,
            });
        }
        decode_strings(&self.bytes)
    }

    /// Elements of a string tensor as UTF-8.
    pub fn strings(&self) -> Result<Vec<String>> {
        self.string_bytes()?
            .into_iter()
            .map(|bytes| {
                String::from_utf8(bytes)
                    .map_err(|err| Error::CorruptData(format!("string element: {err}")))
            })
            .collect()
    }
}

/// Encode UTF-8 values into the string tensor layout.
pub(crate) fn encode_string_values<S: AsRef<str>>(values: &[S]) -> Result<Vec<u8>> {
    let raw: Vec<&[u8]> = values.iter().map(|v| v.as_ref().as_bytes()).collect();
    encode_strings(&raw)
}
