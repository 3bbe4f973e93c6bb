//! Byte layouts for data crossing the bridge.
//!
//! Fixed-width dtypes are plain little-endian element arrays. Bool is one byte
//! per element holding exactly 0 or 1. Strings are length-prefixed: for each
//! element, a little-endian `u32` byte length followed by that many bytes.

use crate::dtype::{DType, num_elements};
use crate::{Error, Result};

const LEN_PREFIX: usize = std::mem::size_of::<u32>();

/// Byte length a fixed-width tensor of this shape must have.
///
/// Returns `None` for strings, whose length depends on the contents, and for
/// shapes whose byte length does not fit in `usize`.
pub fn expected_byte_len(shape: &[usize], dtype: DType) -> Option<usize> {
    let size = dtype.element_size()?;
    num_elements(shape)?.checked_mul(size)
}

/// Reject any bool byte that is not 0 or 1.
pub fn validate_bool_bytes(bytes: &[u8]) -> Result<()> {
    match bytes.iter().position(|&b| b > 1) {
        Some(index) => Err(Error::CorruptData(format!(
            "bool element {index} has byte value {}",
            bytes[index]
        ))),
        None => Ok(()),
    }
}

/// Check that `bytes` is a legal buffer for a tensor of `shape` and `dtype`.
///
/// A shape too large to address fails with [`Error::ShapeMismatch`] whose
/// `expected` is `usize::MAX`; no buffer can match it.
pub fn validate_bytes(shape: &[usize], dtype: DType, bytes: &[u8]) -> Result<()> {
    let mismatch = |expected: Option<usize>, actual: usize| Error::ShapeMismatch {
        shape: shape.to_vec(),
        dtype,
        expected: expected.unwrap_or(usize::MAX),
        actual,
    };

    if dtype == DType::String {
        let count = count_strings(bytes)?;
        let expected = num_elements(shape);
        if expected != Some(count) {
            return Err(mismatch(expected, count));
        }
        return Ok(());
    }

    let expected = expected_byte_len(shape, dtype);
    if expected != Some(bytes.len()) {
        return Err(mismatch(expected, bytes.len()));
    }
    if dtype == DType::Bool {
        validate_bool_bytes(bytes)?;
    }
    Ok(())
}

/// Encode string elements into the length-prefixed layout.
pub fn encode_strings<S: AsRef<[u8]>>(values: &[S]) -> Result<Vec<u8>> {
    let payload: usize = values.iter().map(|v| v.as_ref().len()).sum();
    let mut out = Vec::with_capacity(payload + values.len() * LEN_PREFIX);
    for value in values {
        let value = value.as_ref();
        let len = u32::try_from(value.len()).map_err(|_| {
            Error::CorruptData(format!(
                "string element of {} bytes exceeds the u32 length prefix",
                value.len()
            ))
        })?;
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(value);
    }
    Ok(out)
}

/// Decode the length-prefixed layout into owned byte strings.
pub fn decode_strings(bytes: &[u8]) -> Result<Vec<Vec<u8>>> {
    let mut values = Vec::new();
    walk_strings(bytes, |value| values.push(value.to_vec()))?;
    Ok(values)
}

fn count_strings(bytes: &[u8]) -> Result<usize> {
    let mut count = 0;
    walk_strings(bytes, |_| count += 1)?;
    Ok(count)
}

fn walk_strings<'a>(bytes: &'a [u8], mut visit: impl FnMut(&'a [u8])) -> Result<()> {
    let mut offset = 0;
    while offset < bytes.len() {
        let Some(prefix) = bytes.get(offset..offset + LEN_PREFIX) else {
            return Err(Error::CorruptData(format!(
                "truncated string length prefix at byte {offset}"
            )));
        };
        let mut len = [0u8; LEN_PREFIX];
        len.copy_from_slice(prefix);
        let len = u32::from_le_bytes(len) as usize;
        let start = offset + LEN_PREFIX;
        let Some(value) = bytes.get(start..start + len) else {
            return Err(Error::CorruptData(format!(
                "string at byte {offset} declares {len} bytes, only {} remain",
                bytes.len() - start
            )));
        };
        visit(value);
        offset = start + len;
    }
    Ok(())
}
