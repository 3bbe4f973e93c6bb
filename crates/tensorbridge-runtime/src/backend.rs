//! The public bridge surface.

use crate::config::BridgeConfig;
use crate::dispatch;
use crate::handle::{HandleManager, HandleState};
use crate::materialize::{Element, TensorView, encode_string_values};
use crate::registry::{TensorRecord, TensorRegistry};
use std::sync::Arc;
use tensorbridge_core::dtype::num_elements;
use tensorbridge_core::encoder::encode;
use tensorbridge_core::{
    DType, Error, InputArg, InputDtypes, NativeEngine, OpArgs, OpAttribute, OpRegistry, Result,
    TensorId,
};

/// A managed tensor: identity, shape and dtype of one native handle.
///
/// Not `Clone`; two tensors never share a handle. Use
/// [`Backend::clone_tensor`] for an independent copy.
#[derive(Debug, PartialEq, Eq)]
pub struct ManagedTensor {
    id: TensorId,
    shape: Vec<usize>,
    dtype: DType,
}

impl ManagedTensor {
    pub fn id(&self) -> TensorId {
        self.id
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Number of elements, or `None` if it does not fit in `usize`.
    pub fn size(&self) -> Option<usize> {
        num_elements(&self.shape)
    }
}

/// Values that carry tensors out of a [`Backend::tidy`] scope.
pub trait TensorBundle {
    fn collect_ids(&self, out: &mut Vec<TensorId>);
}

impl TensorBundle for () {
    fn collect_ids(&self, _out: &mut Vec<TensorId>) {}
}

impl TensorBundle for ManagedTensor {
    fn collect_ids(&self, out: &mut Vec<TensorId>) {
        out.push(self.id);
    }
}

impl<T: TensorBundle> TensorBundle for Vec<T> {
    fn collect_ids(&self, out: &mut Vec<TensorId>) {
        for item in self {
            item.collect_ids(out);
        }
    }
}

impl<T: TensorBundle> TensorBundle for Option<T> {
    fn collect_ids(&self, out: &mut Vec<TensorId>) {
        if let Some(item) = self {
            item.collect_ids(out);
        }
    }
}

impl<A: TensorBundle, B: TensorBundle> TensorBundle for (A, B) {
    fn collect_ids(&self, out: &mut Vec<TensorId>) {
        self.0.collect_ids(out);
        self.1.collect_ids(out);
    }
}

/// Bridge between managed tensors and one native engine.
///
/// Owns the engine, every handle created through it and the live-tensor
/// registry. Single-threaded; see [`crate::SharedBackend`] for a locked
/// wrapper.
pub struct Backend<E: NativeEngine> {
    engine: E,
    handles: HandleManager,
    ops: OpRegistry,
    scopes: Vec<Vec<TensorId>>,
}

impl<E: NativeEngine> Backend<E> {
    pub fn new(engine: E, config: BridgeConfig) -> Self {
        tracing::debug!(version = %engine.version(), ?config, "Creating backend");
        Self {
            engine,
            handles: HandleManager::new(config),
            ops: OpRegistry::new(),
            scopes: Vec::new(),
        }
    }

    /// Use `ops` for attribute encoding and dispatch-time checks.
    pub fn with_op_registry(mut self, ops: OpRegistry) -> Self {
        self.ops = ops;
        self
    }

    pub fn op_registry(&self) -> &OpRegistry {
        &self.ops
    }

    pub fn config(&self) -> &BridgeConfig {
        self.handles.config()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn registry(&self) -> &TensorRegistry {
        self.handles.registry()
    }

    /// Version string of the native library.
    pub fn native_version(&self) -> String {
        self.engine.version()
    }

    fn track(&mut self, id: TensorId) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(id);
        }
    }

    fn wrap(&mut self, id: TensorId) -> Result<ManagedTensor> {
        let tensor = ManagedTensor {
            id,
            shape: self.handles.shape(id)?.to_vec(),
            dtype: self.handles.dtype(id)?,
        };
        self.track(id);
        Ok(tensor)
    }

    /// Create an unbound tensor. No native work happens until it is bound,
    /// used as an input or read.
    pub fn allocate(&mut self, shape: &[usize], dtype: DType) -> ManagedTensor {
        let id = self.handles.allocate(shape, dtype);
        self.track(id);
        ManagedTensor {
            id,
            shape: shape.to_vec(),
            dtype,
        }
    }

    /// Upload bytes into an unbound tensor.
    pub fn bind(&mut self, tensor: &ManagedTensor, bytes: &[u8]) -> Result<()> {
        self.handles.bind(tensor.id, bytes, &mut self.engine)
    }

    /// Allocate and bind in one step. The tensor is disposed if binding fails.
    pub fn tensor_from_bytes(
        &mut self,
        bytes: &[u8],
        shape: &[usize],
        dtype: DType,
    ) -> Result<ManagedTensor> {
        let tensor = self.allocate(shape, dtype);
        if let Err(err) = self.bind(&tensor, bytes) {
            self.dispose(&tensor);
            return Err(err);
        }
        Ok(tensor)
    }

    pub fn tensor_from<T: Element>(&mut self, data: &[T], shape: &[usize]) -> Result<ManagedTensor> {
        self.tensor_from_bytes(&T::encode(data), shape, T::DTYPE)
    }

    pub fn tensor_from_strings<S: AsRef<str>>(
        &mut self,
        values: &[S],
        shape: &[usize],
    ) -> Result<ManagedTensor> {
        let bytes = encode_string_values(values)?;
        self.tensor_from_bytes(&bytes, shape, DType::String)
    }

    pub fn state(&self, tensor: &ManagedTensor) -> HandleState {
        self.handles.state(tensor.id)
    }

    /// Raw bytes of a tensor. Repeated calls reuse the first read.
    pub fn materialize(&mut self, tensor: &ManagedTensor) -> Result<Arc<[u8]>> {
        self.handles.materialize(tensor.id, &mut self.engine)
    }

    pub fn view(&mut self, tensor: &ManagedTensor) -> Result<TensorView> {
        let bytes = self.materialize(tensor)?;
        Ok(TensorView::new(tensor.shape.clone(), tensor.dtype, bytes))
    }

    /// Typed copy of a tensor's elements, blocking on the native read.
    pub fn data_sync<T: Element>(&mut self, tensor: &ManagedTensor) -> Result<Vec<T>> {
        if T::DTYPE != tensor.dtype {
            return Err(Error::TypeMismatch {
                requested: T::DTYPE,
                actual: tensor.dtype,
            });
        }
        self.view(tensor)?.to_vec()
    }

    /// Async form of [`Backend::data_sync`]. Completes by blocking on the
    /// native read; it never yields.
    pub async fn data<T: Element>(&mut self, tensor: &ManagedTensor) -> Result<Vec<T>> {
        self.data_sync(tensor)
    }

    pub fn strings(&mut self, tensor: &ManagedTensor) -> Result<Vec<String>> {
        self.view(tensor)?.strings()
    }

    /// Release a tensor's handle. Returns `false` if it was already disposed.
    pub fn dispose(&mut self, tensor: &ManagedTensor) -> bool {
        self.handles.dispose(tensor.id, &mut self.engine)
    }

    /// Run a native op. Outputs take shape and dtype from the engine.
    pub fn execute(
        &mut self,
        op: &str,
        attrs: &[OpAttribute],
        inputs: &[&ManagedTensor],
    ) -> Result<Vec<ManagedTensor>> {
        let input_ids: Vec<TensorId> = inputs.iter().map(|t| t.id).collect();
        let ids = dispatch::execute(
            &mut self.engine,
            &mut self.handles,
            &self.ops,
            op,
            attrs,
            &input_ids,
        )?;
        ids.into_iter().map(|id| self.wrap(id)).collect()
    }

    /// Run a native op that must produce exactly one output.
    pub fn execute_single_output(
        &mut self,
        op: &str,
        attrs: &[OpAttribute],
        inputs: &[&ManagedTensor],
    ) -> Result<ManagedTensor> {
        let outputs = self.execute(op, attrs, inputs)?;
        self.only_output(op, outputs)
    }

    /// [`Backend::invoke`] for ops that must produce exactly one output.
    pub fn invoke_single_output(
        &mut self,
        op: &str,
        groups: &[&[&ManagedTensor]],
        explicit: &[OpAttribute],
    ) -> Result<ManagedTensor> {
        let outputs = self.invoke(op, groups, explicit)?;
        self.only_output(op, outputs)
    }

    /// Unwrap a lone output, disposing every output on a count mismatch.
    fn only_output(
        &mut self,
        op: &str,
        mut outputs: Vec<ManagedTensor>,
    ) -> Result<ManagedTensor> {
        if outputs.len() != 1 {
            let actual = outputs.len();
            for output in &outputs {
                self.dispose(output);
            }
            return Err(Error::OutputArity {
                op: op.to_string(),
                expected: 1,
                actual,
            });
        }
        Ok(outputs.remove(0))
    }

    /// Encode attributes for a registered op from its input groups and any
    /// explicit values, then execute it.
    ///
    /// `groups` has one entry per declared input; single-tensor inputs take a
    /// one-element group.
    pub fn invoke(
        &mut self,
        op: &str,
        groups: &[&[&ManagedTensor]],
        explicit: &[OpAttribute],
    ) -> Result<Vec<ManagedTensor>> {
        let def = self
            .ops
            .get(op)
            .ok_or_else(|| Error::UnknownOp(op.to_string()))?;
        if groups.len() != def.inputs.len() {
            return Err(Error::InputArity {
                op: op.to_string(),
                expected: def.inputs.len(),
                actual: groups.len(),
            });
        }

        let mut args = OpArgs {
            inputs: Vec::with_capacity(groups.len()),
            attrs: explicit.to_vec(),
        };
        for (arg, group) in def.inputs.iter().zip(groups) {
            let dtypes: Vec<DType> = group.iter().map(|t| t.dtype).collect();
            args.inputs.push(match arg {
                InputArg::Single { .. } if dtypes.len() == 1 => InputDtypes::Single(dtypes[0]),
                _ => InputDtypes::List(dtypes),
            });
        }
        let attrs = encode(def, &args)?;

        let inputs: Vec<&ManagedTensor> = groups.iter().flat_map(|g| g.iter().copied()).collect();
        self.execute(op, &attrs, &inputs)
    }

    /// A second tensor with the same contents and its own handle.
    pub fn clone_tensor(&mut self, tensor: &ManagedTensor) -> Result<ManagedTensor> {
        let attrs = [OpAttribute::dtype("T", tensor.dtype)];
        self.execute_single_output("Identity", &attrs, &[tensor])
    }

    /// Run `f` in a scope. Tensors created inside are disposed when it ends,
    /// except those in the returned value, which move to the enclosing scope.
    /// On error everything created inside is disposed.
    pub fn tidy<T, F>(&mut self, f: F) -> Result<T>
    where
        T: TensorBundle,
        F: FnOnce(&mut Self) -> Result<T>,
    {
        self.scopes.push(Vec::new());
        let result = f(self);
        let created = self.scopes.pop().unwrap_or_default();

        let mut kept = Vec::new();
        if let Ok(value) = &result {
            value.collect_ids(&mut kept);
        }

        let mut disposed = 0;
        for id in created {
            if kept.contains(&id) {
                self.track(id);
            } else if self.handles.dispose(id, &mut self.engine) {
                disposed += 1;
            }
        }
        tracing::trace!(disposed, kept = kept.len(), "Scope ended");
        result
    }

    /// Dispose every live tensor. Returns how many were released.
    pub fn dispose_all(&mut self) -> usize {
        let ids = self.handles.registry().ids();
        if !ids.is_empty() && self.config().warn_on_leaks {
            tracing::warn!(count = ids.len(), ?ids, "Disposing live handles");
        }
        ids.into_iter()
            .filter(|&id| self.handles.dispose(id, &mut self.engine))
            .count()
    }

    /// Records of every live tensor, in creation order.
    pub fn live_handles(&self) -> Vec<TensorRecord> {
        self.registry().records().cloned().collect()
    }

    pub fn live_handle_count(&self) -> usize {
        self.handles.live_count()
    }
}
