//! Standard op definitions and typed wrappers for tensorbridge.
//!
//! The wrappers build their attribute lists through the encoder, so callers
//! only pass tensors and the few attributes that cannot be inferred.
//!
//! # Ops
//!
//! - **Array**: Identity, IdentityN, Reshape, ConcatV2
//! - **Math**: Add, Sub, Mul, Equal, Cast

pub mod array_ops;
pub mod math_ops;

mod registry;

pub use registry::core_op_registry;
pub use tensorbridge_core::{Error, Result};

