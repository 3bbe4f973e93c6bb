//! Execution dispatcher: the single caller of [`NativeEngine::execute_op`].

use crate::handle::HandleManager;
use tensorbridge_core::engine::lower_attributes;
use tensorbridge_core::type_map::to_managed_type;
use tensorbridge_core::{
    Error, NativeEngine, NativeOutput, OpAttribute, OpRegistry, Result, TensorId,
};

/// Run `op` natively and wrap every output as a `Computed` handle.
///
/// Attributes are passed through in the order given. If the op is in `ops`,
/// their kinds are checked against its declaration first. On failure no
/// output handle stays registered and every native output token is released.
#[tracing::instrument(skip_all, fields(op = op, num_inputs = inputs.len()))]
pub(crate) fn execute<E: NativeEngine + ?Sized>(
    engine: &mut E,
    handles: &mut HandleManager,
    ops: &OpRegistry,
    op: &str,
    attrs: &[OpAttribute],
    inputs: &[TensorId],
) -> Result<Vec<TensorId>> {
    if let Some(def) = ops.get(op) {
        def.check_attributes(attrs)?;
    }

    let tokens = inputs
        .iter()
        .map(|&id| handles.input_token(id, engine))
        .collect::<Result<Vec<_>>>()?;

    let native_attrs = lower_attributes(attrs);
    let outputs = engine
        .execute_op(op, &native_attrs, &tokens)
        .map_err(|err| {
            tracing::debug!(%err, "Native execution failed");
            Error::NativeExecutionFailure {
                op: op.to_string(),
                message: err.message,
            }
        })?;

    let ids = wrap_outputs(engine, handles, op, outputs)?;
    tracing::debug!(num_outputs = ids.len(), "Dispatched");
    Ok(ids)
}

fn wrap_outputs<E: NativeEngine + ?Sized>(
    engine: &mut E,
    handles: &mut HandleManager,
    op: &str,
    outputs: Vec<NativeOutput>,
) -> Result<Vec<TensorId>> {
    let mut ids = Vec::with_capacity(outputs.len());
    let mut pending = outputs.into_iter();

    while let Some(output) = pending.next() {
        match to_managed_type(output.dtype) {
            Ok(dtype) => {
                ids.push(handles.adopt_computed(op, output.token, output.shape, dtype));
            }
            Err(err) => {
                tracing::warn!(%err, created = ids.len(), "Discarding outputs of failed dispatch");
                for id in ids {
                    handles.dispose(id, engine);
                }
                engine.release(output.token);
                for rest in pending.by_ref() {
                    engine.release(rest.token);
                }
                return Err(err);
            }
        }
    }

    Ok(ids)
}
