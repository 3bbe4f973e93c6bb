use super::{HostValue, attr_int, element_size, expect_dtype, expect_inputs, unimplemented};
use tensorbridge_core::{NativeAttr, NativeError, NativeType};

fn int_values(input: &HostValue, what: &str) -> Result<Vec<i64>, NativeError> {
    match input.dtype {
        NativeType::INT32 => Ok(input.elements::<i32>().into_iter().map(i64::from).collect()),
        NativeType::INT64 => Ok(input.elements::<i64>()),
        other => Err(NativeError::invalid_argument(format!(
            "{what} must be int32 or int64, got {other}"
        ))),
    }
}

/// Resolve a requested shape with at most one `-1` against an element count.
fn resolve_shape(requested: &[i64], count: usize) -> Result<Vec<usize>, NativeError> {
    let mut unknown = None;
    let mut known = 1usize;
    for (i, &dim) in requested.iter().enumerate() {
        match dim {
            -1 if unknown.is_none() => unknown = Some(i),
            -1 => {
                return Err(NativeError::invalid_argument(
                    "Only one input size may be -1",
                ));
            }
            d if d < 0 => {
                return Err(NativeError::invalid_argument(format!(
                    "Size {i} must be non-negative, not {d}"
                )));
            }
            d => known *= d as usize,
        }
    }

    let mut shape: Vec<usize> = requested.iter().map(|&d| d.max(0) as usize).collect();
    if let Some(i) = unknown {
        if known == 0 || count % known != 0 {
            return Err(NativeError::invalid_argument(format!(
                "Cannot infer -1 in {requested:?} for {count} elements"
            )));
        }
        shape[i] = count / known;
    } else if known != count {
        return Err(NativeError::invalid_argument(format!(
            "Input to reshape is a tensor with {count} values, but the requested shape has {known}"
        )));
    }
    Ok(shape)
}

pub(super) fn reshape(
    attrs: &[NativeAttr],
    inputs: &[&HostValue],
) -> Result<Vec<HostValue>, NativeError> {
    expect_inputs("Reshape", inputs, 2)?;
    let (tensor, shape) = (inputs[0], inputs[1]);
    expect_dtype(attrs, "T", tensor)?;
    expect_dtype(attrs, "Tshape", shape)?;
    if shape.shape.len() > 1 {
        return Err(NativeError::invalid_argument(format!(
            "shape must be a vector, got shape {:?}",
            shape.shape
        )));
    }

    let new_shape = resolve_shape(&int_values(shape, "shape")?, tensor.num_elements())?;
    Ok(vec![HostValue::new(
        new_shape,
        tensor.dtype,
        tensor.bytes.clone(),
    )])
}

pub(super) fn concat(
    attrs: &[NativeAttr],
    inputs: &[&HostValue],
) -> Result<Vec<HostValue>, NativeError> {
    let n = attr_int(attrs, "N")?;
    let n = usize::try_from(n)
        .ok()
        .filter(|&n| n >= 1)
        .ok_or_else(|| NativeError::invalid_argument(format!("N must be at least 1, got {n}")))?;
    expect_inputs("ConcatV2", inputs, n + 1)?;
    let (values, axis_input) = inputs.split_at(n);
    let axis_input = axis_input[0];
    expect_dtype(attrs, "Tidx", axis_input)?;

    let first = values[0];
    let dtype = first.dtype;
    for value in values {
        expect_dtype(attrs, "T", value)?;
    }
    let size = element_size(dtype).ok_or_else(|| unimplemented("ConcatV2", dtype))?;

    let rank = first.shape.len() as i64;
    let axis = match int_values(axis_input, "axis")?.as_slice() {
        [axis] => *axis,
        other => {
            return Err(NativeError::invalid_argument(format!(
                "axis must be a scalar, got {} values",
                other.len()
            )));
        }
    };
    if rank == 0 || axis < -rank || axis >= rank {
        return Err(NativeError::invalid_argument(format!(
            "ConcatOp : Expected concatenating dimensions in the range [{}, {rank}), but got {axis}",
            -rank
        )));
    }
    let axis = (if axis < 0 { axis + rank } else { axis }) as usize;

    let mut out_shape = first.shape.clone();
    out_shape[axis] = 0;
    for (i, value) in values.iter().enumerate() {
        let compatible = value.shape.len() == first.shape.len()
            && value
                .shape
                .iter()
                .zip(&first.shape)
                .enumerate()
                .all(|(d, (a, b))| d == axis || a == b);
        if !compatible {
            return Err(NativeError::invalid_argument(format!(
                "ConcatOp : Dimensions of inputs should match: shape[0] = {:?} vs. shape[{i}] = {:?}",
                first.shape, value.shape
            )));
        }
        out_shape[axis] += value.shape[axis];
    }

    let outer: usize = first.shape[..axis].iter().product();
    let inner: usize = first.shape[axis + 1..].iter().product::<usize>() * size;
    let mut bytes = Vec::with_capacity(out_shape.iter().product::<usize>() * size);
    for o in 0..outer {
        for value in values {
            let chunk = value.shape[axis] * inner;
            bytes.extend_from_slice(&value.bytes[o * chunk..(o + 1) * chunk]);
        }
    }

    Ok(vec![HostValue::new(out_shape, dtype, bytes)])
}
