//! Array op wrappers: identity, reshape and concatenation.

use tensorbridge_core::{NativeEngine, Result};
use tensorbridge_runtime::{Backend, ManagedTensor};

/// Returns a new handle holding the same values as `input`.
pub fn identity<E: NativeEngine>(
    backend: &mut Backend<E>,
    input: &ManagedTensor,
) -> Result<ManagedTensor> {
    backend.invoke_single_output("Identity", &[&[input]], &[])
}

/// Returns one new handle per input, in order, in a single dispatch.
pub fn identity_n<E: NativeEngine>(
    backend: &mut Backend<E>,
    inputs: &[&ManagedTensor],
) -> Result<Vec<ManagedTensor>> {
    backend.invoke("IdentityN", &[inputs], &[])
}

/// Reshapes `input` to `shape`. One dimension may be `-1` and is inferred
/// by the engine.
#[tracing::instrument(skip_all, fields(shape = ?shape))]
pub fn reshape<E: NativeEngine>(
    backend: &mut Backend<E>,
    input: &ManagedTensor,
    shape: &[i32],
) -> Result<ManagedTensor> {
    let shape_tensor = backend.tensor_from(shape, &[shape.len()])?;
    let result = backend.invoke_single_output("Reshape", &[&[input], &[&shape_tensor]], &[]);
    backend.dispose(&shape_tensor);
    result
}

/// Concatenates `values` along `axis`. Negative axes count from the end.
///
/// All values must share a dtype; the `N` and `T` attributes are inferred
/// from the inputs.
#[tracing::instrument(skip_all, fields(n = values.len(), axis = axis))]
pub fn concat<E: NativeEngine>(
    backend: &mut Backend<E>,
    values: &[&ManagedTensor],
    axis: i32,
) -> Result<ManagedTensor> {
    let axis_tensor = backend.tensor_from(&[axis], &[])?;
    let result = backend.invoke_single_output("ConcatV2", &[values, &[&axis_tensor]], &[]);
    backend.dispose(&axis_tensor);
    result
}
