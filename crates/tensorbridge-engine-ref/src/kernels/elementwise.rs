use super::{HostValue, expect_dtype, expect_inputs, unimplemented};
use crate::broadcast::{broadcast_shape, zip_broadcast};
use bytemuck::Pod;
use tensorbridge_core::codec::decode_strings;
use tensorbridge_core::{NativeAttr, NativeError, NativeType};

fn binary<T: Pod, U: Pod>(
    a: &HostValue,
    b: &HostValue,
    out_dtype: NativeType,
    f: impl Fn(T, T) -> U,
) -> Result<HostValue, NativeError> {
    let shape = broadcast_shape(&a.shape, &b.shape)?;
    let out = zip_broadcast(
        &a.elements::<T>(),
        &a.shape,
        &b.elements::<T>(),
        &b.shape,
        &shape,
        f,
    );
    Ok(HostValue::from_elements(shape, out_dtype, &out))
}

fn complex_mul(a: [f32; 2], b: [f32; 2]) -> [f32; 2] {
    [a[0] * b[0] - a[1] * b[1], a[0] * b[1] + a[1] * b[0]]
}

pub(super) fn arithmetic(
    op: &str,
    attrs: &[NativeAttr],
    inputs: &[&HostValue],
) -> Result<Vec<HostValue>, NativeError> {
    expect_inputs(op, inputs, 2)?;
    let (a, b) = (inputs[0], inputs[1]);
    let dtype = expect_dtype(attrs, "T", a)?;
    expect_dtype(attrs, "T", b)?;

    let out = match (op, dtype) {
        ("Add", NativeType::FLOAT) => binary(a, b, dtype, |x: f32, y| x + y)?,
        ("Sub", NativeType::FLOAT) => binary(a, b, dtype, |x: f32, y| x - y)?,
        ("Mul", NativeType::FLOAT) => binary(a, b, dtype, |x: f32, y| x * y)?,
        ("Add", NativeType::INT32) => binary(a, b, dtype, |x: i32, y| x.wrapping_add(y))?,
        ("Sub", NativeType::INT32) => binary(a, b, dtype, |x: i32, y| x.wrapping_sub(y))?,
        ("Mul", NativeType::INT32) => binary(a, b, dtype, |x: i32, y| x.wrapping_mul(y))?,
        ("Add", NativeType::COMPLEX64) => {
            binary(a, b, dtype, |x: [f32; 2], y| [x[0] + y[0], x[1] + y[1]])?
        }
        ("Sub", NativeType::COMPLEX64) => {
            binary(a, b, dtype, |x: [f32; 2], y| [x[0] - y[0], x[1] - y[1]])?
        }
        ("Mul", NativeType::COMPLEX64) => binary(a, b, dtype, complex_mul)?,
        _ => return Err(unimplemented(op, dtype)),
    };
    Ok(vec![out])
}

pub(super) fn equal(
    attrs: &[NativeAttr],
    inputs: &[&HostValue],
) -> Result<Vec<HostValue>, NativeError> {
    expect_inputs("Equal", inputs, 2)?;
    let (a, b) = (inputs[0], inputs[1]);
    let dtype = expect_dtype(attrs, "T", a)?;
    expect_dtype(attrs, "T", b)?;

    let out = match dtype {
        NativeType::FLOAT => binary(a, b, NativeType::BOOL, |x: f32, y| u8::from(x == y))?,
        NativeType::INT32 => binary(a, b, NativeType::BOOL, |x: i32, y| u8::from(x == y))?,
        NativeType::BOOL => binary(a, b, NativeType::BOOL, |x: u8, y| u8::from(x == y))?,
        NativeType::STRING => {
            let shape = broadcast_shape(&a.shape, &b.shape)?;
            let decode = |v: &HostValue| {
                decode_strings(&v.bytes).map_err(|err| NativeError::invalid_argument(err.to_string()))
            };
            let (xs, ys) = (decode(a)?, decode(b)?);
            let xs: Vec<&[u8]> = xs.iter().map(Vec::as_slice).collect();
            let ys: Vec<&[u8]> = ys.iter().map(Vec::as_slice).collect();
            let out = zip_broadcast(&xs, &a.shape, &ys, &b.shape, &shape, |x, y| u8::from(x == y));
            HostValue::new(shape, NativeType::BOOL, out)
        }
        other => return Err(unimplemented("Equal", other)),
    };
    Ok(vec![out])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensorbridge_core::engine::lower_attributes;
    use tensorbridge_core::{DType, OpAttribute};

    fn f32s(shape: &[usize], values: &[f32]) -> HostValue {
        HostValue::from_elements(shape.to_vec(), NativeType::FLOAT, values)
    }

    fn t(dtype: DType) -> Vec<NativeAttr> {
        lower_attributes(&[OpAttribute::dtype("T", dtype)])
    }

    #[test]
    fn test_add_broadcast() {
        let a = f32s(&[2, 2], &[1.0, 2.0, 3.0, 4.0]);
        let b = f32s(&[2], &[10.0, 20.0]);
        let out = arithmetic("Add", &t(DType::Float32), &[&a, &b]).unwrap();
        assert_eq!(out[0].shape, vec![2, 2]);
        assert_eq!(out[0].elements::<f32>(), vec![11.0, 22.0, 13.0, 24.0]);
    }

    #[test]
    fn test_int_sub_mul() {
        let a = HostValue::from_elements(vec![3], NativeType::INT32, &[5i32, 6, 7]);
        let b = HostValue::from_elements(vec![], NativeType::INT32, &[2i32]);
        let sub = arithmetic("Sub", &t(DType::Int32), &[&a, &b]).unwrap();
        assert_eq!(sub[0].elements::<i32>(), vec![3, 4, 5]);
        let mul = arithmetic("Mul", &t(DType::Int32), &[&a, &b]).unwrap();
        assert_eq!(mul[0].elements::<i32>(), vec![10, 12, 14]);
    }

    #[test]
    fn test_complex_mul() {
        let a = HostValue::from_elements(vec![1], NativeType::COMPLEX64, &[[1.0f32, 2.0]]);
        let b = HostValue::from_elements(vec![1], NativeType::COMPLEX64, &[[3.0f32, -1.0]]);
        let out = arithmetic("Mul", &t(DType::Complex64), &[&a, &b]).unwrap();
        assert_eq!(out[0].elements::<[f32; 2]>(), vec![[5.0, 5.0]]);
    }

    #[test]
    fn test_dtype_attr_checked() {
        let a = f32s(&[1], &[1.0]);
        let err = arithmetic("Add", &t(DType::Int32), &[&a, &a]).unwrap_err();
        assert!(err.message.contains("does not match"));
    }

    #[test]
    fn test_equal_strings() {
        let encode = |values: &[&str]| tensorbridge_core::codec::encode_strings(values).unwrap();
        let a = HostValue::new(vec![3], NativeType::STRING, encode(&["a", "b", "c"]));
        let b = HostValue::new(vec![], NativeType::STRING, encode(&["b"]));
        let out = equal(&t(DType::String), &[&a, &b]).unwrap();
        assert_eq!(out[0].dtype, NativeType::BOOL);
        assert_eq!(out[0].bytes, vec![0, 1, 0]);
    }

    #[test]
    fn test_equal_float() {
        let a = f32s(&[2], &[1.0, 2.0]);
        let b = f32s(&[2], &[1.0, 3.0]);
        let out = equal(&t(DType::Float32), &[&a, &b]).unwrap();
        assert_eq!(out[0].bytes, vec![1, 0]);
    }
}
