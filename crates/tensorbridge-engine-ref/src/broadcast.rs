//! Broadcasting helpers for elementwise kernels.

use tensorbridge_core::NativeError;

/// Compute NumPy-style broadcast output shape from two input shapes.
///
/// - Shapes are aligned from the rightmost dimension
/// - Dimensions match if they are equal or one of them is 1
/// - Missing dimensions in shorter shapes are treated as 1
///
/// ```text
/// broadcast_shape(&[2, 3, 4], &[3, 4])    -> [2, 3, 4]
/// broadcast_shape(&[8, 1, 6, 1], &[7, 1, 5]) -> [8, 7, 6, 5]
/// ```
pub fn broadcast_shape(a: &[usize], b: &[usize]) -> Result<Vec<usize>, NativeError> {
    let max_rank = a.len().max(b.len());
    let mut result = Vec::with_capacity(max_rank);

    for i in 0..max_rank {
        let da = dim_or_one(a, i, max_rank);
        let db = dim_or_one(b, i, max_rank);

        if da == db || db == 1 {
            result.push(da);
        } else if da == 1 {
            result.push(db);
        } else {
            return Err(NativeError::invalid_argument(format!(
                "Incompatible shapes: {a:?} vs. {b:?}"
            )));
        }
    }

    Ok(result)
}

fn dim_or_one(shape: &[usize], i: usize, max_rank: usize) -> usize {
    let pad = max_rank - shape.len();
    if i < pad { 1 } else { shape[i - pad] }
}

/// Element strides of `shape` viewed at rank `out_rank`, with 0 for
/// broadcast dimensions.
fn broadcast_strides(shape: &[usize], out_rank: usize) -> Vec<usize> {
    let mut strides = vec![0; out_rank];
    let pad = out_rank - shape.len();
    let mut stride = 1;
    for (i, &dim) in shape.iter().enumerate().rev() {
        strides[pad + i] = if dim == 1 { 0 } else { stride };
        stride *= dim;
    }
    strides
}

/// Apply `f` elementwise over two broadcast inputs.
pub(crate) fn zip_broadcast<T: Copy, U>(
    a: &[T],
    a_shape: &[usize],
    b: &[T],
    b_shape: &[usize],
    out_shape: &[usize],
    f: impl Fn(T, T) -> U,
) -> Vec<U> {
    let rank = out_shape.len();
    let a_strides = broadcast_strides(a_shape, rank);
    let b_strides = broadcast_strides(b_shape, rank);
    let total: usize = out_shape.iter().product();

    let mut out = Vec::with_capacity(total);
    let mut index = vec![0usize; rank];
    for _ in 0..total {
        let a_off: usize = index.iter().zip(&a_strides).map(|(i, s)| i * s).sum();
        let b_off: usize = index.iter().zip(&b_strides).map(|(i, s)| i * s).sum();
        out.push(f(a[a_off], b[b_off]));

        for axis in (0..rank).rev() {
            index[axis] += 1;
            if index[axis] < out_shape[axis] {
                break;
            }
            index[axis] = 0;
        }
    }
    out
}
