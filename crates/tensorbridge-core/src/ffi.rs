//! C ABI for native engines.
//!
//! A native library exposes itself as a [`TbNativeApi`] function table plus an
//! opaque context pointer. Every call returns a status code (see
//! [`NativeStatus`](crate::engine::NativeStatus)); on failure the message is fetched with `last_error`.
//! Strings cross as pointer and length, never NUL-terminated.

use crate::attr::AttrKind;
use crate::engine::{NativeAttr, NativeAttrValue, NativeError};
use crate::type_map::{AttrDescriptor, NativeType};
use std::os::raw::c_void;

/// Highest tensor rank a [`TbOutput`] can describe.
pub const TB_MAX_RANK: usize = 8;

/// One attribute in C layout.
///
/// `scalar` carries int values, bools as 0/1 and type codes. `list` carries
/// shape dims, int lists and type-code lists. `bytes` carries string values.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TbAttr {
    pub name: *const u8,
    pub name_len: usize,
    pub kind: i32,
    pub is_list: u8,
    pub scalar: i64,
    pub float: f32,
    pub list: *const i64,
    pub list_len: usize,
    pub bytes: *const u8,
    pub bytes_len: usize,
}

/// One op output in C layout.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct TbOutput {
    pub token: u64,
    pub dtype: i32,
    pub rank: u32,
    pub dims: [u64; TB_MAX_RANK],
}

pub type TbVersionFn = unsafe extern "C" fn(ctx: *mut c_void, buf: *mut u8, cap: usize) -> usize;
pub type TbAllocateFn = unsafe extern "C" fn(
    ctx: *mut c_void,
    dims: *const u64,
    rank: usize,
    dtype: i32,
    out_token: *mut u64,
) -> i32;
pub type TbBindBytesFn =
    unsafe extern "C" fn(ctx: *mut c_void, token: u64, data: *const u8, len: usize) -> i32;
pub type TbByteLenFn = unsafe extern "C" fn(ctx: *mut c_void, token: u64, out_len: *mut usize) -> i32;
pub type TbReadBytesFn =
    unsafe extern "C" fn(ctx: *mut c_void, token: u64, out: *mut u8, len: usize) -> i32;
pub type TbExecuteFn = unsafe extern "C" fn(
    ctx: *mut c_void,
    name: *const u8,
    name_len: usize,
    attrs: *const TbAttr,
    num_attrs: usize,
    inputs: *const u64,
    num_inputs: usize,
    outputs: *mut TbOutput,
    output_cap: usize,
    num_outputs: *mut usize,
) -> i32;
pub type TbReleaseFn = unsafe extern "C" fn(ctx: *mut c_void, token: u64);
pub type TbDeviceNameFn = unsafe extern "C" fn(
    ctx: *mut c_void,
    token: u64,
    buf: *mut u8,
    cap: usize,
    out_len: *mut usize,
) -> i32;
pub type TbCopyToHostFn =
    unsafe extern "C" fn(ctx: *mut c_void, token: u64, out_token: *mut u64) -> i32;
pub type TbLastErrorFn = unsafe extern "C" fn(ctx: *mut c_void, buf: *mut u8, cap: usize) -> usize;
pub type TbDestroyFn = unsafe extern "C" fn(ctx: *mut c_void);

/// Function table of a native engine.
///
/// Length-returning calls (`version`, `last_error`, `device_name`) report the
/// full length even when `cap` is smaller; callers retry with a bigger buffer.
/// When `output_cap` is too small, `execute` releases its outputs, sets
/// `num_outputs` to the required count and fails with `FAILED_PRECONDITION`.
#[repr(C)]
pub struct TbNativeApi {
    pub ctx: *mut c_void,
    pub version: TbVersionFn,
    pub allocate: TbAllocateFn,
    pub bind_bytes: TbBindBytesFn,
    pub byte_len: TbByteLenFn,
    pub read_bytes: TbReadBytesFn,
    pub execute: TbExecuteFn,
    pub release: TbReleaseFn,
    pub device_name: TbDeviceNameFn,
    pub copy_to_host: TbCopyToHostFn,
    pub last_error: TbLastErrorFn,
    pub destroy: TbDestroyFn,
}

/// Owned backing storage for a `TbAttr` array built from [`NativeAttr`]s.
///
/// The raw pointers in [`TbAttrBuffer::as_ptr`] stay valid while the buffer
/// lives.
pub struct TbAttrBuffer {
    attrs: Vec<TbAttr>,
    _lists: Vec<Vec<i64>>,
}

impl TbAttrBuffer {
    pub fn new(attrs: &[NativeAttr]) -> Self {
        let mut lists = Vec::with_capacity(attrs.len());
        let mut raw = Vec::with_capacity(attrs.len());
        for attr in attrs {
            let mut out = TbAttr {
                name: attr.name.as_ptr(),
                name_len: attr.name.len(),
                kind: attr.descriptor.code,
                is_list: u8::from(attr.descriptor.is_list),
                scalar: 0,
                float: 0.0,
                list: std::ptr::null(),
                list_len: 0,
                bytes: std::ptr::null(),
                bytes_len: 0,
            };
            let list: Option<Vec<i64>> = match &attr.value {
                NativeAttrValue::Int(v) => {
                    out.scalar = *v;
                    None
                }
                NativeAttrValue::Float(v) => {
                    out.float = *v;
                    None
                }
                NativeAttrValue::Bool(v) => {
                    out.scalar = i64::from(*v);
                    None
                }
                NativeAttrValue::Type(t) => {
                    out.scalar = i64::from(t.code());
                    None
                }
                NativeAttrValue::String(s) => {
                    out.bytes = s.as_ptr();
                    out.bytes_len = s.len();
                    None
                }
                NativeAttrValue::Shape(values) | NativeAttrValue::IntList(values) => {
                    Some(values.clone())
                }
                NativeAttrValue::TypeList(types) => {
                    Some(types.iter().map(|t| i64::from(t.code())).collect())
                }
            };
            if let Some(list) = list {
                // The Vec's heap pointer is stable across the move into `lists`.
                out.list = list.as_ptr();
                out.list_len = list.len();
                lists.push(list);
            }
            raw.push(out);
        }
        Self {
            attrs: raw,
            _lists: lists,
        }
    }

    pub fn as_ptr(&self) -> *const TbAttr {
        self.attrs.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }
}

/// Build a slice from a C pointer and length, accepting null for empty.
///
/// # Safety
/// If `len > 0`, `ptr` must be valid for reads of `len` elements for `'a`.
pub unsafe fn slice_from_raw<'a, T>(ptr: *const T, len: usize) -> &'a [T] {
    if len == 0 || ptr.is_null() {
        &[]
    } else {
        unsafe { std::slice::from_raw_parts(ptr, len) }
    }
}

/// Decode a C attribute array back into [`NativeAttr`]s.
///
/// # Safety
/// `attrs` must point to `len` valid [`TbAttr`]s whose name, list and bytes
/// pointers are valid for their stated lengths.
pub unsafe fn read_attrs(attrs: *const TbAttr, len: usize) -> Result<Vec<NativeAttr>, NativeError> {
    let raw = unsafe { slice_from_raw(attrs, len) };
    let mut out = Vec::with_capacity(raw.len());
    for attr in raw {
        let name_bytes = unsafe { slice_from_raw(attr.name, attr.name_len) };
        let name = std::str::from_utf8(name_bytes)
            .map_err(|_| NativeError::invalid_argument("attribute name is not UTF-8"))?
            .to_string();
        let descriptor = AttrDescriptor {
            code: attr.kind,
            is_list: attr.is_list != 0,
        };
        let kind = descriptor
            .kind()
            .map_err(|err| NativeError::invalid_argument(format!("attribute '{name}': {err}")))?;
        let list = unsafe { slice_from_raw(attr.list, attr.list_len) };
        let value = match kind {
            AttrKind::Int => NativeAttrValue::Int(attr.scalar),
            AttrKind::Float => NativeAttrValue::Float(attr.float),
            AttrKind::Bool => NativeAttrValue::Bool(attr.scalar != 0),
            AttrKind::Type => NativeAttrValue::Type(NativeType(attr.scalar as i32)),
            AttrKind::Shape => NativeAttrValue::Shape(list.to_vec()),
            AttrKind::IntList => NativeAttrValue::IntList(list.to_vec()),
            AttrKind::TensorList => NativeAttrValue::TypeList(
                list.iter().map(|&code| NativeType(code as i32)).collect(),
            ),
            AttrKind::String => {
                let bytes = unsafe { slice_from_raw(attr.bytes, attr.bytes_len) };
                let s = std::str::from_utf8(bytes).map_err(|_| {
                    NativeError::invalid_argument(format!("attribute '{name}' is not UTF-8"))
                })?;
                NativeAttrValue::String(s.to_string())
            }
        };
        out.push(NativeAttr {
            name,
            descriptor,
            value,
        });
    }
    Ok(out)
}

/// Copy `src` into a caller buffer, returning the full length of `src`.
///
/// # Safety
/// If `cap > 0`, `buf` must be valid for writes of `cap` bytes.
pub unsafe fn write_truncated(src: &[u8], buf: *mut u8, cap: usize) -> usize {
    if !buf.is_null() && cap > 0 {
        let n = src.len().min(cap);
        unsafe { std::ptr::copy_nonoverlapping(src.as_ptr(), buf, n) };
    }
    src.len()
}
