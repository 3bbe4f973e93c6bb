use super::{HostValue, attr_type, expect_dtype, expect_inputs, unimplemented};
use tensorbridge_core::{NativeAttr, NativeError, NativeType};

/// Numeric view used as the common intermediate of a cast.
fn to_f64(input: &HostValue) -> Result<Vec<f64>, NativeError> {
    match input.dtype {
        NativeType::FLOAT => Ok(input.elements::<f32>().into_iter().map(f64::from).collect()),
        NativeType::INT32 => Ok(input.elements::<i32>().into_iter().map(f64::from).collect()),
        NativeType::BOOL => Ok(input.bytes.iter().map(|&b| f64::from(b)).collect()),
        other => Err(unimplemented("Cast", other)),
    }
}

pub(super) fn cast(
    attrs: &[NativeAttr],
    inputs: &[&HostValue],
) -> Result<Vec<HostValue>, NativeError> {
    expect_inputs("Cast", inputs, 1)?;
    let input = inputs[0];
    let src = expect_dtype(attrs, "SrcT", input)?;
    let dst = attr_type(attrs, "DstT")?;
    if src == dst {
        return Ok(vec![input.clone()]);
    }

    let values = to_f64(input)?;
    let shape = input.shape.clone();
    let out = match dst {
        NativeType::FLOAT => {
            let out: Vec<f32> = values.iter().map(|&v| v as f32).collect();
            HostValue::from_elements(shape, dst, &out)
        }
        NativeType::INT32 => {
            let out: Vec<i32> = values.iter().map(|&v| v.trunc() as i32).collect();
            HostValue::from_elements(shape, dst, &out)
        }
        NativeType::BOOL => {
            let out: Vec<u8> = values.iter().map(|&v| u8::from(v != 0.0)).collect();
            HostValue::new(shape, dst, out)
        }
        other => return Err(unimplemented("Cast", other)),
    };
    Ok(vec![out])
}
