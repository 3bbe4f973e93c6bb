//! Reference native engine for tensorbridge.
//!
//! [`HostEngine`] implements the native seam entirely in host memory. It
//! stands in for the real execution context in tests and in the CLI:
//! - A token table with per-token device placement
//! - A small kernel set (Identity, IdentityN, Add, Sub, Mul, Equal, Cast,
//!   Reshape, ConcatV2)
//! - Call statistics for asserting how often the bridge crossed over
//! - A C-ABI export of itself ([`HostEngine::into_c_api`])

mod broadcast;
mod c_api;
mod engine;
mod kernels;

pub use broadcast::broadcast_shape;
pub use engine::{EngineStats, HOST_DEVICE, HostEngine};
