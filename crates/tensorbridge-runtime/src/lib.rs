//! Runtime half of the tensorbridge native bridge.
//!
//! This crate owns every native handle the bridge creates and is the only
//! place that calls into a [`NativeEngine`].
//!
//! # Architecture
//!
//! - **Handle lifecycle** - [`HandleManager`] tracks each tensor's
//!   [`HandleState`] and releases native tokens exactly once
//! - **Registry** - [`TensorRegistry`] answers "what is still alive"
//! - **Dispatch** - op calls go through one function that forces lazy inputs,
//!   calls the engine and wraps outputs
//! - **Materialization** - typed views over bytes read back from the engine
//!
//! [`Backend`] ties these together behind the public surface.
//!
//! # Example
//!
//! ```ignore
//! use tensorbridge_runtime::{Backend, BridgeConfig};
//!
//! let mut backend = Backend::new(engine, BridgeConfig::from_env());
//! let a = backend.tensor_from(&[1.0f32, 2.0], &[2])?;
//! let b = backend.tensor_from(&[3.0f32, 4.0], &[2])?;
//! let sum = backend.execute_single_output("Add", &attrs, &[&a, &b])?;
//! assert_eq!(backend.data_sync::<f32>(&sum)?, vec![4.0, 6.0]);
//! backend.dispose_all();
//! ```

mod backend;
mod c_engine;
mod config;
mod dispatch;
mod handle;
mod materialize;
mod registry;
mod shared;

pub use backend::{Backend, ManagedTensor, TensorBundle};
pub use c_engine::CEngine;
pub use config::BridgeConfig;
pub use handle::{HandleManager, HandleState};
pub use materialize::{Element, TensorView};
pub use registry::{TensorOrigin, TensorRecord, TensorRegistry};
pub use shared::SharedBackend;
pub use tensorbridge_core::{DType, Error, NativeEngine, Result, TensorId};
