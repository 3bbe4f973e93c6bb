//! Host-memory token table.

use crate::kernels::{self, HostValue};
use std::collections::HashMap;
use tensorbridge_core::codec::decode_strings;
use tensorbridge_core::dtype::num_elements;
use tensorbridge_core::{
    NativeAttr, NativeEngine, NativeError, NativeOutput, NativeStatus, NativeToken, NativeType,
};

/// Device name reported for host memory.
pub const HOST_DEVICE: &str = "/job:localhost/replica:0/task:0/device:CPU:0";

/// Counters of calls that crossed into the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub allocations: usize,
    pub uploads: usize,
    pub reads: usize,
    pub executions: usize,
    pub copies: usize,
    pub releases: usize,
    /// Tokens currently held by the engine.
    pub live_tokens: usize,
}

#[derive(Debug, Clone)]
struct Slot {
    value: HostValue,
    device: String,
}

/// In-process native engine over host memory.
pub struct HostEngine {
    slots: HashMap<NativeToken, Slot>,
    next_token: u64,
    device: String,
    stats: EngineStats,
}

impl Default for HostEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl HostEngine {
    pub fn new() -> Self {
        Self::with_device(HOST_DEVICE)
    }

    /// An engine placing every allocation and op output on `device`.
    pub fn with_device(device: impl Into<String>) -> Self {
        Self {
            slots: HashMap::new(),
            next_token: 1,
            device: device.into(),
            stats: EngineStats::default(),
        }
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            live_tokens: self.slots.len(),
            ..self.stats
        }
    }

    /// Tokens currently held, in issue order.
    pub fn live_tokens(&self) -> Vec<NativeToken> {
        let mut tokens: Vec<_> = self.slots.keys().copied().collect();
        tokens.sort();
        tokens
    }

    fn insert(&mut self, value: HostValue, device: String) -> NativeToken {
        let token = NativeToken(self.next_token);
        self.next_token += 1;
        self.slots.insert(token, Slot { value, device });
        token
    }

    /// Byte length of a token's data, without counting as a read.
    pub(crate) fn byte_len(&self, token: NativeToken) -> Result<usize, NativeError> {
        Ok(self.host_slot(token)?.value.bytes.len())
    }

    fn host_slot(&self, token: NativeToken) -> Result<&Slot, NativeError> {
        let slot = self.slot(token)?;
        if !slot.device.to_ascii_lowercase().ends_with("cpu:0") {
            return Err(NativeError::new(
                NativeStatus::FAILED_PRECONDITION,
                format!("{token} lives on {}; copy it to host first", slot.device),
            ));
        }
        Ok(slot)
    }

    fn slot(&self, token: NativeToken) -> Result<&Slot, NativeError> {
        self.slots
            .get(&token)
            .ok_or_else(|| NativeError::invalid_argument(format!("Invalid tensor handle {token}")))
    }
}

impl NativeEngine for HostEngine {
    fn version(&self) -> String {
        format!("tensorbridge-ref {}", env!("CARGO_PKG_VERSION"))
    }

    fn allocate(
        &mut self,
        shape: &[usize],
        dtype: NativeType,
    ) -> Result<NativeToken, NativeError> {
        let bytes = match kernels::element_size(dtype) {
            Some(size) => {
                let len = num_elements(shape)
                    .and_then(|count| count.checked_mul(size))
                    .ok_or_else(|| {
                        NativeError::invalid_argument(format!(
                            "Shape {shape:?} of {dtype} is too large to allocate"
                        ))
                    })?;
                vec![0u8; len]
            }
            None if dtype == NativeType::STRING => Vec::new(),
            None => {
                return Err(NativeError::invalid_argument(format!(
                    "Unsupported dtype {dtype}"
                )));
            }
        };
        self.stats.allocations += 1;
        let device = self.device.clone();
        Ok(self.insert(HostValue::new(shape.to_vec(), dtype, bytes), device))
    }

    fn bind_bytes(&mut self, token: NativeToken, bytes: &[u8]) -> Result<(), NativeError> {
        let slot = self
            .slots
            .get_mut(&token)
            .ok_or_else(|| NativeError::invalid_argument(format!("Invalid tensor handle {token}")))?;
        let value = &mut slot.value;
        match kernels::element_size(value.dtype) {
            Some(_) if bytes.len() != value.bytes.len() => {
                return Err(NativeError::invalid_argument(format!(
                    "Buffer of {} bytes for a tensor of {} bytes",
                    bytes.len(),
                    value.bytes.len()
                )));
            }
            Some(_) => {}
            None => {
                let count = decode_strings(bytes)
                    .map_err(|err| NativeError::invalid_argument(err.to_string()))?
                    .len();
                if count != value.num_elements() {
                    return Err(NativeError::invalid_argument(format!(
                        "{count} strings for {} elements",
                        value.num_elements()
                    )));
                }
            }
        }
        value.bytes = bytes.to_vec();
        self.stats.uploads += 1;
        Ok(())
    }

    fn read_bytes(&mut self, token: NativeToken) -> Result<Vec<u8>, NativeError> {
        let bytes = self.host_slot(token)?.value.bytes.clone();
        self.stats.reads += 1;
        Ok(bytes)
    }

    fn execute_op(
        &mut self,
        name: &str,
        attrs: &[NativeAttr],
        inputs: &[NativeToken],
    ) -> Result<Vec<NativeOutput>, NativeError> {
        let values = inputs
            .iter()
            .map(|&token| self.slot(token).map(|slot| &slot.value))
            .collect::<Result<Vec<_>, _>>()?;

        let results = kernels::run(name, attrs, &values)?;
        self.stats.executions += 1;
        tracing::trace!(op = name, outputs = results.len(), "Executed");

        let device = self.device.clone();
        Ok(results
            .into_iter()
            .map(|value| {
                let shape = value.shape.clone();
                let dtype = value.dtype;
                let token = self.insert(value, device.clone());
                NativeOutput {
                    token,
                    shape,
                    dtype,
                }
            })
            .collect())
    }

    fn release(&mut self, token: NativeToken) {
        if self.slots.remove(&token).is_some() {
            self.stats.releases += 1;
        }
    }

    fn device_name(&self, token: NativeToken) -> Result<String, NativeError> {
        Ok(self.slot(token)?.device.clone())
    }

    fn copy_to_host(&mut self, token: NativeToken) -> Result<NativeToken, NativeError> {
        let value = self.slot(token)?.value.clone();
        self.stats.copies += 1;
        Ok(self.insert(value, HOST_DEVICE.to_string()))
    }
}
