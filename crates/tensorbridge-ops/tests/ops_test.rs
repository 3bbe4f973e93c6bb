//! Typed op wrappers dispatched against the reference engine.

mod common;

use common::{backend, footprint};
use proptest::prelude::*;
use tensorbridge_core::{AttrValue, DType, Error, OpArgs, encode};
use tensorbridge_ops::{array_ops, core_op_registry, math_ops};

#[test]
fn test_concat_attributes_from_inputs() {
    let registry = core_op_registry();
    let args = OpArgs::default()
        .input_list(vec![DType::Float32; 3])
        .input(DType::Int32);
    let attrs = encode(registry.get("ConcatV2").unwrap(), &args).unwrap();

    let names: Vec<&str> = attrs.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, ["N", "T", "Tidx"]);
    assert_eq!(attrs[0].value, AttrValue::Int(3));
    assert_eq!(attrs[1].value, AttrValue::Type(DType::Float32));
    assert_eq!(attrs[2].value, AttrValue::Type(DType::Int32));
}

#[test]
fn test_concat_three_tensors_axis0() {
    let mut backend = backend();
    let a = backend.tensor_from(&[1.0f32, 2.0], &[1, 2]).unwrap();
    let b = backend.tensor_from(&[3.0f32, 4.0], &[1, 2]).unwrap();
    let c = backend.tensor_from(&[5.0f32, 6.0, 7.0, 8.0], &[2, 2]).unwrap();

    let before = footprint(&backend);
    let out = array_ops::concat(&mut backend, &[&a, &b, &c], 0).unwrap();

    assert_eq!(out.shape(), &[4, 2]);
    assert_eq!(
        backend.data_sync::<f32>(&out).unwrap(),
        vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]
    );
    // only the output survives; the axis scalar is gone
    assert_eq!(footprint(&backend), (before.0 + 1, before.1 + 1));
}

#[test]
fn test_concat_negative_axis() {
    let mut backend = backend();
    let a = backend.tensor_from(&[1i32, 2, 3, 4], &[2, 2]).unwrap();
    let b = backend.tensor_from(&[5i32, 6], &[2, 1]).unwrap();

    let out = array_ops::concat(&mut backend, &[&a, &b], -1).unwrap();
    assert_eq!(out.shape(), &[2, 3]);
    assert_eq!(backend.data_sync::<i32>(&out).unwrap(), vec![1, 2, 5, 3, 4, 6]);
}

#[test]
fn test_concat_mixed_dtypes_fails_before_dispatch() {
    let mut backend = backend();
    let a = backend.tensor_from(&[1.0f32], &[1]).unwrap();
    let b = backend.tensor_from(&[1i32], &[1]).unwrap();
    let executions = backend.engine().stats().executions;
    let before = footprint(&backend);

    let err = array_ops::concat(&mut backend, &[&a, &b], 0).unwrap_err();
    assert!(matches!(err, Error::DtypeMismatch { .. }), "{err:?}");
    assert_eq!(backend.engine().stats().executions, executions);
    assert_eq!(footprint(&backend), before);
}

#[test]
fn test_concat_native_failure_cleans_up_axis() {
    let mut backend = backend();
    let a = backend.tensor_from(&[1.0f32, 2.0], &[2]).unwrap();
    let b = backend.tensor_from(&[3.0f32, 4.0], &[2]).unwrap();
    let before = footprint(&backend);

    let err = array_ops::concat(&mut backend, &[&a, &b], 3).unwrap_err();
    match err {
        Error::NativeExecutionFailure { op, message } => {
            assert_eq!(op, "ConcatV2");
            assert!(message.contains("range"), "{message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(footprint(&backend), before);
}

#[test]
fn test_reshape_infers_dimension() {
    let mut backend = backend();
    let x = backend
        .tensor_from(&[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], &[6])
        .unwrap();
    let before = footprint(&backend);

    let y = array_ops::reshape(&mut backend, &x, &[-1, 3]).unwrap();
    assert_eq!(y.shape(), &[2, 3]);
    assert_eq!(
        backend.data_sync::<f32>(&y).unwrap(),
        vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]
    );
    assert_eq!(footprint(&backend), (before.0 + 1, before.1 + 1));
}

#[test]
fn test_reshape_wrong_size() {
    let mut backend = backend();
    let x = backend.tensor_from(&[1i32, 2, 3], &[3]).unwrap();
    let before = footprint(&backend);

    let err = array_ops::reshape(&mut backend, &x, &[2, 2]).unwrap_err();
    assert!(matches!(err, Error::NativeExecutionFailure { .. }), "{err:?}");
    assert_eq!(footprint(&backend), before);
}

#[test]
fn test_identity_is_independent_copy() {
    let mut backend = backend();
    let x = backend.tensor_from(&[7i32, 8], &[2]).unwrap();
    let y = array_ops::identity(&mut backend, &x).unwrap();
    assert_ne!(x.id(), y.id());

    backend.dispose(&x);
    assert_eq!(backend.data_sync::<i32>(&y).unwrap(), vec![7, 8]);
}

#[test]
fn test_identity_n_keeps_order_and_dtypes() {
    let mut backend = backend();
    let a = backend.tensor_from(&[1.5f32], &[1]).unwrap();
    let b = backend.tensor_from_strings(&["x", "yz"], &[2]).unwrap();
    let c = backend.tensor_from(&[true, false], &[2]).unwrap();

    let outs = array_ops::identity_n(&mut backend, &[&a, &b, &c]).unwrap();
    let dtypes: Vec<DType> = outs.iter().map(|t| t.dtype()).collect();
    assert_eq!(dtypes, [DType::Float32, DType::String, DType::Bool]);
    assert_eq!(backend.strings(&outs[1]).unwrap(), ["x", "yz"]);
    assert_eq!(backend.data_sync::<bool>(&outs[2]).unwrap(), [true, false]);
}

#[test]
fn test_add_broadcasts() {
    let mut backend = backend();
    let x = backend.tensor_from(&[1.0f32, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
    let y = backend.tensor_from(&[10.0f32, 20.0], &[2]).unwrap();

    let z = math_ops::add(&mut backend, &x, &y).unwrap();
    assert_eq!(z.shape(), &[2, 2]);
    assert_eq!(
        backend.data_sync::<f32>(&z).unwrap(),
        vec![11.0, 22.0, 13.0, 24.0]
    );
}

#[test]
fn test_sub_and_mul_int() {
    let mut backend = backend();
    let x = backend.tensor_from(&[5i32, 7], &[2]).unwrap();
    let y = backend.tensor_from(&[2i32, 3], &[2]).unwrap();

    let diff = math_ops::sub(&mut backend, &x, &y).unwrap();
    let prod = math_ops::mul(&mut backend, &x, &y).unwrap();
    assert_eq!(backend.data_sync::<i32>(&diff).unwrap(), vec![3, 4]);
    assert_eq!(backend.data_sync::<i32>(&prod).unwrap(), vec![10, 21]);
}

#[test]
fn test_complex_mul() {
    let mut backend = backend();
    let x = backend.tensor_from(&[[1.0f32, 2.0]], &[1]).unwrap();
    let y = backend.tensor_from(&[[3.0f32, -1.0]], &[1]).unwrap();

    let z = math_ops::mul(&mut backend, &x, &y).unwrap();
    assert_eq!(z.dtype(), DType::Complex64);
    assert_eq!(backend.data_sync::<[f32; 2]>(&z).unwrap(), vec![[5.0, 5.0]]);
}

#[test]
fn test_add_rejects_bool_before_dispatch() {
    let mut backend = backend();
    let x = backend.tensor_from(&[true], &[1]).unwrap();
    let executions = backend.engine().stats().executions;

    let err = math_ops::add(&mut backend, &x, &x).unwrap_err();
    assert!(matches!(err, Error::UnsupportedType(_)), "{err:?}");
    assert_eq!(backend.engine().stats().executions, executions);
}

#[test]
fn test_add_dtype_mismatch() {
    let mut backend = backend();
    let x = backend.tensor_from(&[1.0f32], &[1]).unwrap();
    let y = backend.tensor_from(&[1i32], &[1]).unwrap();

    let err = math_ops::add(&mut backend, &x, &y).unwrap_err();
    match err {
        Error::DtypeMismatch { op, first, second } => {
            assert_eq!(op, "Add");
            assert_eq!((first, second), (DType::Float32, DType::Int32));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_equal_outputs_bool() {
    let mut backend = backend();
    let x = backend.tensor_from_strings(&["a", "b", "c"], &[3]).unwrap();
    let y = backend.tensor_from_strings(&["a", "x", "c"], &[3]).unwrap();

    let eq = math_ops::equal(&mut backend, &x, &y).unwrap();
    assert_eq!(eq.dtype(), DType::Bool);
    assert_eq!(
        backend.data_sync::<bool>(&eq).unwrap(),
        vec![true, false, true]
    );
}

#[test]
fn test_cast_float_to_int_truncates() {
    let mut backend = backend();
    let x = backend.tensor_from(&[1.7f32, -1.7, 0.2], &[3]).unwrap();

    let y = math_ops::cast(&mut backend, &x, DType::Int32).unwrap();
    assert_eq!(y.dtype(), DType::Int32);
    assert_eq!(backend.data_sync::<i32>(&y).unwrap(), vec![1, -1, 0]);

    let b = math_ops::cast(&mut backend, &y, DType::Bool).unwrap();
    assert_eq!(
        backend.data_sync::<bool>(&b).unwrap(),
        vec![true, true, false]
    );
}

#[test]
fn test_wrappers_inside_tidy() {
    let mut backend = backend();
    let before = footprint(&backend);

    let total = backend
        .tidy(|b| {
            let x = b.tensor_from(&[1.0f32, 2.0, 3.0, 4.0], &[4])?;
            let y = array_ops::reshape(b, &x, &[2, 2])?;
            let z = math_ops::mul(b, &y, &y)?;
            math_ops::add(b, &z, &y)
        })
        .unwrap();

    assert_eq!(footprint(&backend), (before.0 + 1, before.1 + 1));
    assert_eq!(
        backend.data_sync::<f32>(&total).unwrap(),
        vec![2.0, 6.0, 12.0, 20.0]
    );
}

proptest! {
    #[test]
    fn prop_reshape_preserves_values(
        rows in 1usize..6,
        cols in 1usize..6,
        seed in any::<i32>(),
    ) {
        let mut backend = backend();
        let values: Vec<i32> = (0..rows * cols).map(|i| seed.wrapping_add(i as i32)).collect();
        let x = backend.tensor_from(&values, &[values.len()]).unwrap();

        let y = array_ops::reshape(&mut backend, &x, &[rows as i32, -1]).unwrap();
        prop_assert_eq!(y.shape(), &[rows, cols][..]);
        prop_assert_eq!(backend.data_sync::<i32>(&y).unwrap(), values);
    }
}
