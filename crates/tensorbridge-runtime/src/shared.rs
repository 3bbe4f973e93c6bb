//! Backend shared between threads.

use crate::backend::Backend;
use std::sync::{Arc, Mutex, MutexGuard};
use tensorbridge_core::NativeEngine;

/// A [`Backend`] behind a mutex.
///
/// Every call holds the lock for its whole duration, so dispatches and
/// registry updates never interleave.
pub struct SharedBackend<E: NativeEngine> {
    inner: Arc<Mutex<Backend<E>>>,
}

impl<E: NativeEngine> Clone for SharedBackend<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: NativeEngine> SharedBackend<E> {
    pub fn new(backend: Backend<E>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(backend)),
        }
    }

    /// Lock the backend, recovering from a poisoned lock.
    pub fn lock(&self) -> MutexGuard<'_, Backend<E>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `f` with exclusive access to the backend.
    pub fn with<R>(&self, f: impl FnOnce(&mut Backend<E>) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn live_handle_count(&self) -> usize {
        self.lock().live_handle_count()
    }
}
