//! tensorbridge CLI library - shared functionality for tests and the binary.

pub mod codes;
pub mod diagnostics;

use tensorbridge_engine_ref::HostEngine;
use tensorbridge_ops::core_op_registry;
use tensorbridge_runtime::{Backend, BridgeConfig};

/// Backend over the reference engine with the core op definitions.
pub fn reference_backend(config: BridgeConfig) -> Backend<HostEngine> {
    Backend::new(HostEngine::new(), config).with_op_registry(core_op_registry())
}
