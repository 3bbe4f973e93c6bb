//! Shared helpers for op wrapper tests.
#![allow(dead_code)]

use tensorbridge_engine_ref::HostEngine;
use tensorbridge_ops::core_op_registry;
use tensorbridge_runtime::{Backend, BridgeConfig};

pub fn backend() -> Backend<HostEngine> {
    let config = BridgeConfig::default()
        .with_poison_disposed(true)
        .with_warn_on_leaks(false);
    Backend::new(HostEngine::new(), config).with_op_registry(core_op_registry())
}

/// Live handles and native tokens, for checking that a call leaked nothing.
pub fn footprint(backend: &Backend<HostEngine>) -> (usize, usize) {
    (
        backend.live_handle_count(),
        backend.engine().stats().live_tokens,
    )
}
