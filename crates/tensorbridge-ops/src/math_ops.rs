//! Elementwise math wrappers and dtype conversion.

use tensorbridge_core::{DType, NativeEngine, OpAttribute, Result};
use tensorbridge_runtime::{Backend, ManagedTensor};

fn binary<E: NativeEngine>(
    backend: &mut Backend<E>,
    op: &str,
    x: &ManagedTensor,
    y: &ManagedTensor,
) -> Result<ManagedTensor> {
    backend.invoke_single_output(op, &[&[x], &[y]], &[])
}

/// Elementwise `x + y` with broadcasting.
pub fn add<E: NativeEngine>(
    backend: &mut Backend<E>,
    x: &ManagedTensor,
    y: &ManagedTensor,
) -> Result<ManagedTensor> {
    binary(backend, "Add", x, y)
}

/// Elementwise `x - y` with broadcasting.
pub fn sub<E: NativeEngine>(
    backend: &mut Backend<E>,
    x: &ManagedTensor,
    y: &ManagedTensor,
) -> Result<ManagedTensor> {
    binary(backend, "Sub", x, y)
}

/// Elementwise `x * y` with broadcasting.
pub fn mul<E: NativeEngine>(
    backend: &mut Backend<E>,
    x: &ManagedTensor,
    y: &ManagedTensor,
) -> Result<ManagedTensor> {
    binary(backend, "Mul", x, y)
}

/// Elementwise equality. The output is always [`DType::Bool`].
pub fn equal<E: NativeEngine>(
    backend: &mut Backend<E>,
    x: &ManagedTensor,
    y: &ManagedTensor,
) -> Result<ManagedTensor> {
    binary(backend, "Equal", x, y)
}

/// Converts `x` to `dtype`. Float to int conversion truncates toward zero.
pub fn cast<E: NativeEngine>(
    backend: &mut Backend<E>,
    x: &ManagedTensor,
    dtype: DType,
) -> Result<ManagedTensor> {
    backend.invoke_single_output("Cast", &[&[x]], &[OpAttribute::dtype("DstT", dtype)])
}
