//! Shared helpers for runtime integration tests.
#![allow(dead_code)]

use tensorbridge_core::{
    AttrDef, AttrKind, AttrValue, DType, NativeAttr, NativeEngine, NativeError, NativeOutput,
    NativeToken, NativeType, OpAttribute, OpDef, OpRegistry,
};
use tensorbridge_engine_ref::HostEngine;
use tensorbridge_runtime::{Backend, BridgeConfig};

/// Config used by every test: tombstones on, no leak warnings.
pub fn test_config() -> BridgeConfig {
    BridgeConfig::default()
        .with_poison_disposed(true)
        .with_warn_on_leaks(false)
}

/// The few op definitions the runtime tests dispatch through `invoke`.
pub fn test_ops() -> OpRegistry {
    let mut ops = OpRegistry::new();
    ops.register(
        OpDef::new("Add")
            .input("x", "T")
            .input("y", "T")
            .attr(AttrDef::dtype("T")),
    )
    .register(OpDef::new("Identity").input("input", "T").attr(AttrDef::dtype("T")))
    .register(
        OpDef::new("IdentityN")
            .type_list_input("input", "T")
            .attr(AttrDef::new("T", AttrKind::TensorList)),
    )
    .register(
        OpDef::new("ConcatV2")
            .variadic_input("values", "N", "T")
            .input("axis", "Tidx")
            .attr(AttrDef::int("N"))
            .attr(AttrDef::dtype("T"))
            .attr(
                AttrDef::dtype("Tidx")
                    .allowed_types(&[DType::Int32])
                    .with_default(AttrValue::Type(DType::Int32)),
            ),
    );
    ops
}

pub fn backend() -> Backend<HostEngine> {
    backend_with(HostEngine::new())
}

pub fn backend_with<E: NativeEngine>(engine: E) -> Backend<E> {
    Backend::new(engine, test_config()).with_op_registry(test_ops())
}

pub fn t(dtype: DType) -> Vec<OpAttribute> {
    vec![OpAttribute::dtype("T", dtype)]
}

/// Engine with ops that return output the bridge must reject:
/// - "TwoOutputs": a float output, then one in a dtype the bridge cannot represent
/// - "MakeBool": a `[2]` bool tensor holding the bytes `[0, 2]`
/// - "ShortOutput": a `[4]` float32 tensor holding a single element
///
/// Everything else goes to a host engine.
pub struct FaultyEngine {
    pub inner: HostEngine,
}

impl FaultyEngine {
    pub fn new() -> Self {
        Self {
            inner: HostEngine::new(),
        }
    }
}

impl NativeEngine for FaultyEngine {
    fn version(&self) -> String {
        "faulty".to_string()
    }

    fn allocate(
        &mut self,
        shape: &[usize],
        dtype: NativeType,
    ) -> Result<NativeToken, NativeError> {
        self.inner.allocate(shape, dtype)
    }

    fn bind_bytes(&mut self, token: NativeToken, bytes: &[u8]) -> Result<(), NativeError> {
        self.inner.bind_bytes(token, bytes)
    }

    fn read_bytes(&mut self, token: NativeToken) -> Result<Vec<u8>, NativeError> {
        self.inner.read_bytes(token)
    }

    fn execute_op(
        &mut self,
        name: &str,
        attrs: &[NativeAttr],
        inputs: &[NativeToken],
    ) -> Result<Vec<NativeOutput>, NativeError> {
        match name {
            "TwoOutputs" => {}
            "MakeBool" => {
                let token = self.inner.allocate(&[2], NativeType::BOOL)?;
                self.inner.bind_bytes(token, &[0, 2])?;
                return Ok(vec![NativeOutput {
                    token,
                    shape: vec![2],
                    dtype: NativeType::BOOL,
                }]);
            }
            "ShortOutput" => {
                let token = self.inner.allocate(&[1], NativeType::FLOAT)?;
                return Ok(vec![NativeOutput {
                    token,
                    shape: vec![4],
                    dtype: NativeType::FLOAT,
                }]);
            }
            _ => return self.inner.execute_op(name, attrs, inputs),
        }
        let mut outputs = Vec::new();
        for dtype in [NativeType::FLOAT, NativeType::UINT8, NativeType::FLOAT] {
            let token = self.inner.allocate(&[1], dtype)?;
            outputs.push(NativeOutput {
                token,
                shape: vec![1],
                dtype,
            });
        }
        Ok(outputs)
    }

    fn release(&mut self, token: NativeToken) {
        self.inner.release(token)
    }

    fn device_name(&self, token: NativeToken) -> Result<String, NativeError> {
        self.inner.device_name(token)
    }

    fn copy_to_host(&mut self, token: NativeToken) -> Result<NativeToken, NativeError> {
        self.inner.copy_to_host(token)
    }
}
