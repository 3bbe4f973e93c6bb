//! Leak check and dispatch benchmark over the reference engine.

use std::time::{Duration, Instant};

use tensorbridge_core::Result;
use tensorbridge_ops::array_ops;
use tensorbridge_runtime::BridgeConfig;

use crate::reference_backend;

/// Counts after a leak check. A clean run has no live handles or tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeakReport {
    pub tensors: usize,
    pub allocations: usize,
    pub releases: usize,
    pub live_handles: usize,
    pub live_tokens: usize,
}

impl LeakReport {
    pub fn is_clean(&self) -> bool {
        self.live_handles == 0 && self.live_tokens == 0 && self.allocations == self.releases
    }
}

/// Allocates, binds, reads back and disposes `count` tensors one at a time.
#[tracing::instrument(skip(config))]
pub fn leak_check(count: usize, config: BridgeConfig) -> Result<LeakReport> {
    let mut backend = reference_backend(config);
    for i in 0..count {
        let values = [i as f32; 4];
        let tensor = backend.tensor_from(&values, &[2, 2])?;
        backend.data_sync::<f32>(&tensor)?;
        backend.dispose(&tensor);
    }

    let stats = backend.engine().stats();
    Ok(LeakReport {
        tensors: count,
        allocations: stats.allocations,
        releases: stats.releases,
        live_handles: backend.live_handle_count(),
        live_tokens: stats.live_tokens,
    })
}

/// Timing of a reshape dispatch loop.
#[derive(Debug, Clone)]
pub struct BenchReport {
    pub iterations: usize,
    pub elapsed: Duration,
}

impl BenchReport {
    pub fn ops_per_ms(&self) -> f64 {
        let ms = self.elapsed.as_secs_f64() * 1000.0;
        if ms > 0.0 {
            self.iterations as f64 / ms
        } else {
            f64::INFINITY
        }
    }
}

/// Reshapes one bound tensor back and forth `iterations` times, disposing
/// every intermediate.
#[tracing::instrument(skip(config))]
pub fn bench(iterations: usize, config: BridgeConfig) -> Result<BenchReport> {
    let mut backend = reference_backend(config);
    let values: Vec<f32> = (0..64).map(|i| i as f32).collect();
    let input = backend.tensor_from(&values, &[64])?;

    let start = Instant::now();
    for i in 0..iterations {
        let shape: &[i32] = if i % 2 == 0 { &[8, -1] } else { &[-1] };
        let output = array_ops::reshape(&mut backend, &input, shape)?;
        backend.dispose(&output);
    }
    let elapsed = start.elapsed();

    backend.dispose(&input);
    let leaked = backend.dispose_all();
    tracing::debug!(leaked, "Benchmark finished");
    Ok(BenchReport { iterations, elapsed })
}
