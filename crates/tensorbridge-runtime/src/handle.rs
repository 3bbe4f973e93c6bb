//! Handle lifecycle manager.
//!
//! Each managed tensor identity maps to at most one native token. The
//! manager is the only code that changes a handle's [`HandleState`]:
//!
//! ```text
//! Unbound --allocate--> Bound --bind--> Uploaded
//! (dispatch output) ------------------> Computed
//! any --dispose--> Disposed
//! ```

use crate::config::BridgeConfig;
use crate::materialize::{native_call, read_native};
use crate::registry::{TensorOrigin, TensorRecord, TensorRegistry};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tensorbridge_core::codec::validate_bytes;
use tensorbridge_core::type_map::to_native_type;
use tensorbridge_core::{DType, Error, NativeEngine, NativeToken, Result, TensorId};

static NEXT_TENSOR_ID: AtomicU64 = AtomicU64::new(1);

fn next_tensor_id() -> TensorId {
    TensorId::from_raw(NEXT_TENSOR_ID.fetch_add(1, Ordering::Relaxed))
}

/// Binding state of a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleState {
    /// Shape and dtype known, no native allocation yet.
    Unbound,
    /// Native allocation exists, no data uploaded.
    Bound,
    /// Native allocation holds caller-supplied bytes.
    Uploaded,
    /// Native allocation holds engine-produced bytes.
    Computed,
    /// Released. Terminal.
    Disposed,
}

impl HandleState {
    pub fn name(self) -> &'static str {
        match self {
            HandleState::Unbound => "unbound",
            HandleState::Bound => "bound",
            HandleState::Uploaded => "uploaded",
            HandleState::Computed => "computed",
            HandleState::Disposed => "disposed",
        }
    }

    /// Whether the handle holds readable data.
    pub fn has_data(self) -> bool {
        matches!(self, HandleState::Uploaded | HandleState::Computed)
    }
}

impl fmt::Display for HandleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug)]
struct HandleEntry {
    shape: Vec<usize>,
    dtype: DType,
    state: HandleState,
    token: Option<NativeToken>,
    cached: Option<Arc<[u8]>>,
}

/// Owns the mapping from tensor identity to native token.
pub struct HandleManager {
    config: BridgeConfig,
    entries: HashMap<TensorId, HandleEntry>,
    registry: TensorRegistry,
}

impl HandleManager {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
            registry: TensorRegistry::new(),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn registry(&self) -> &TensorRegistry {
        &self.registry
    }

    /// Create an `Unbound` handle. No native work happens.
    pub fn allocate(&mut self, shape: &[usize], dtype: DType) -> TensorId {
        let id = next_tensor_id();
        self.entries.insert(
            id,
            HandleEntry {
                shape: shape.to_vec(),
                dtype,
                state: HandleState::Unbound,
                token: None,
                cached: None,
            },
        );
        self.registry.insert(TensorRecord {
            id,
            shape: shape.to_vec(),
            dtype,
            origin: TensorOrigin::Allocated,
            token: None,
        });
        tracing::debug!(%id, ?shape, %dtype, "Allocated unbound handle");
        id
    }

    /// Wrap a token produced by a native op as a `Computed` handle.
    pub(crate) fn adopt_computed(
        &mut self,
        op: &str,
        token: NativeToken,
        shape: Vec<usize>,
        dtype: DType,
    ) -> TensorId {
        let id = next_tensor_id();
        self.registry.insert(TensorRecord {
            id,
            shape: shape.clone(),
            dtype,
            origin: TensorOrigin::Op(op.to_string()),
            token: Some(token),
        });
        self.entries.insert(
            id,
            HandleEntry {
                shape,
                dtype,
                state: HandleState::Computed,
                token: Some(token),
                cached: None,
            },
        );
        id
    }

    fn entry(&self, id: TensorId) -> Result<&HandleEntry> {
        match self.entries.get(&id) {
            Some(entry) if entry.state == HandleState::Disposed => {
                tracing::error!(%id, shape = ?entry.shape, dtype = %entry.dtype, "Use after dispose");
                Err(Error::UseAfterDispose(id))
            }
            Some(entry) => Ok(entry),
            None => Err(Error::UseAfterDispose(id)),
        }
    }

    fn entry_mut(&mut self, id: TensorId) -> Result<&mut HandleEntry> {
        self.entry(id)?;
        self.entries.get_mut(&id).ok_or(Error::UseAfterDispose(id))
    }

    /// Current state. Disposed handles report `Disposed` whether or not a
    /// tombstone was kept.
    pub fn state(&self, id: TensorId) -> HandleState {
        self.entries
            .get(&id)
            .map_or(HandleState::Disposed, |entry| entry.state)
    }

    pub fn shape(&self, id: TensorId) -> Result<&[usize]> {
        Ok(&self.entry(id)?.shape)
    }

    pub fn dtype(&self, id: TensorId) -> Result<DType> {
        Ok(self.entry(id)?.dtype)
    }

    /// Force a native allocation for an `Unbound` handle.
    pub fn ensure_allocated<E: NativeEngine + ?Sized>(
        &mut self,
        id: TensorId,
        engine: &mut E,
    ) -> Result<NativeToken> {
        let entry = self.entry_mut(id)?;
        if let Some(token) = entry.token {
            return Ok(token);
        }
        let token = engine
            .allocate(&entry.shape, to_native_type(entry.dtype))
            .map_err(|err| native_call("allocate", err))?;
        entry.token = Some(token);
        entry.state = HandleState::Bound;
        self.registry.set_token(id, token);
        tracing::debug!(%id, %token, "Bound native allocation");
        Ok(token)
    }

    /// Upload caller bytes. Valid from `Unbound` or `Bound`.
    ///
    /// # Errors
    /// - [`Error::AlreadyBound`] if the handle already holds data
    /// - [`Error::ShapeMismatch`] / [`Error::CorruptData`] for illegal bytes
    pub fn bind<E: NativeEngine + ?Sized>(
        &mut self,
        id: TensorId,
        bytes: &[u8],
        engine: &mut E,
    ) -> Result<()> {
        let entry = self.entry(id)?;
        if entry.state.has_data() {
            return Err(Error::AlreadyBound {
                id,
                state: entry.state.name(),
            });
        }
        validate_bytes(&entry.shape, entry.dtype, bytes)?;

        let token = self.ensure_allocated(id, engine)?;
        engine
            .bind_bytes(token, bytes)
            .map_err(|err| native_call("bind_bytes", err))?;

        let entry = self.entry_mut(id)?;
        entry.state = HandleState::Uploaded;
        tracing::debug!(%id, len = bytes.len(), "Uploaded bytes");
        Ok(())
    }

    /// Token of a handle about to be used as an op input.
    ///
    /// Inputs without data are allocated natively first and then rejected
    /// with [`Error::NotReady`]; there is nothing for the op to read.
    pub(crate) fn input_token<E: NativeEngine + ?Sized>(
        &mut self,
        id: TensorId,
        engine: &mut E,
    ) -> Result<NativeToken> {
        let entry = self.entry(id)?;
        if let (true, Some(token)) = (entry.state.has_data(), entry.token) {
            return Ok(token);
        }
        self.ensure_allocated(id, engine)?;
        Err(Error::NotReady {
            id,
            state: self.state(id).name(),
        })
    }

    /// Bytes of a handle, read from the engine once and cached.
    ///
    /// Engine-produced bytes are held to the same layout rules as bound ones:
    /// a wrong length is [`Error::ShapeMismatch`], an illegal bool byte is
    /// [`Error::CorruptData`]. Nothing is cached on failure.
    pub fn materialize<E: NativeEngine + ?Sized>(
        &mut self,
        id: TensorId,
        engine: &mut E,
    ) -> Result<Arc<[u8]>> {
        let entry = self.entry(id)?;
        if let Some(cached) = &entry.cached {
            tracing::trace!(%id, "Materialize cache hit");
            return Ok(Arc::clone(cached));
        }
        let token = match (entry.state.has_data(), entry.token) {
            (true, Some(token)) => token,
            _ => {
                return Err(Error::NotReady {
                    id,
                    state: entry.state.name(),
                });
            }
        };

        let bytes = read_native(engine, token, &self.config)?;
        if let Err(err) = validate_bytes(&entry.shape, entry.dtype, &bytes) {
            tracing::warn!(%id, state = %entry.state, %err, "Native bytes failed validation");
            return Err(err);
        }
        let bytes: Arc<[u8]> = bytes.into();
        tracing::debug!(%id, len = bytes.len(), "Materialized");
        let entry = self.entry_mut(id)?;
        entry.cached = Some(Arc::clone(&bytes));
        Ok(bytes)
    }

    /// Release a handle. Returns `false` if it was already disposed.
    pub fn dispose<E: NativeEngine + ?Sized>(&mut self, id: TensorId, engine: &mut E) -> bool {
        let Some(entry) = self.entries.get_mut(&id) else {
            return false;
        };
        if entry.state == HandleState::Disposed {
            return false;
        }
        if let Some(token) = entry.token.take() {
            engine.release(token);
        }
        entry.cached = None;
        entry.state = HandleState::Disposed;
        self.registry.remove(id);
        if !self.config.poison_disposed {
            self.entries.remove(&id);
        }
        tracing::debug!(%id, "Disposed");
        true
    }

    /// Number of live handles.
    pub fn live_count(&self) -> usize {
        self.registry.live_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensorbridge_engine_ref::HostEngine;

    fn manager() -> HandleManager {
        HandleManager::new(BridgeConfig::default().with_poison_disposed(true))
    }

    #[test]
    fn test_allocate_is_lazy() {
        let mut engine = HostEngine::new();
        let mut handles = manager();
        let id = handles.allocate(&[2, 2], DType::Float32);

        assert_eq!(handles.state(id), HandleState::Unbound);
        assert_eq!(engine.stats().live_tokens, 0);

        handles.ensure_allocated(id, &mut engine).unwrap();
        assert_eq!(handles.state(id), HandleState::Bound);
        assert_eq!(engine.stats().live_tokens, 1);
        assert!(handles.registry().get(id).unwrap().token.is_some());
    }

    #[test]
    fn test_bind_then_materialize_reads_once() {
        let mut engine = HostEngine::new();
        let mut handles = manager();
        let id = handles.allocate(&[2], DType::Bool);
        handles.bind(id, &[1, 0], &mut engine).unwrap();
        assert_eq!(handles.state(id), HandleState::Uploaded);

        let first = handles.materialize(id, &mut engine).unwrap();
        let second = handles.materialize(id, &mut engine).unwrap();
        assert_eq!(&*first, &[1, 0]);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(engine.stats().reads, 1);
    }

    #[test]
    fn test_rebind_rejected() {
        let mut engine = HostEngine::new();
        let mut handles = manager();
        let id = handles.allocate(&[1], DType::Int32);
        handles.bind(id, &7i32.to_le_bytes(), &mut engine).unwrap();
        let err = handles.bind(id, &8i32.to_le_bytes(), &mut engine).unwrap_err();
        assert!(matches!(err, Error::AlreadyBound { state: "uploaded", .. }));
    }

    #[test]
    fn test_materialize_without_data() {
        let mut engine = HostEngine::new();
        let mut handles = manager();
        let id = handles.allocate(&[3], DType::Float32);
        assert!(matches!(
            handles.materialize(id, &mut engine),
            Err(Error::NotReady { state: "unbound", .. })
        ));
        handles.ensure_allocated(id, &mut engine).unwrap();
        assert!(matches!(
            handles.materialize(id, &mut engine),
            Err(Error::NotReady { state: "bound", .. })
        ));
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let mut engine = HostEngine::new();
        let mut handles = manager();
        let id = handles.allocate(&[1], DType::Float32);
        handles.bind(id, &1.0f32.to_le_bytes(), &mut engine).unwrap();

        assert!(handles.dispose(id, &mut engine));
        assert!(!handles.dispose(id, &mut engine));
        assert_eq!(handles.state(id), HandleState::Disposed);
        assert_eq!(handles.live_count(), 0);
        assert_eq!(engine.stats().live_tokens, 0);
        assert!(matches!(
            handles.materialize(id, &mut engine),
            Err(Error::UseAfterDispose(_))
        ));
    }

    #[test]
    fn test_dispose_without_tombstones() {
        let mut engine = HostEngine::new();
        let mut handles = HandleManager::new(BridgeConfig::default().with_poison_disposed(false));
        let id = handles.allocate(&[1], DType::Float32);
        assert!(handles.dispose(id, &mut engine));
        assert!(!handles.dispose(id, &mut engine));
        assert!(matches!(handles.dtype(id), Err(Error::UseAfterDispose(_))));
    }

    #[test]
    fn test_failed_bind_keeps_state() {
        let mut engine = HostEngine::new();
        let mut handles = manager();
        let id = handles.allocate(&[2], DType::Bool);
        let err = handles.bind(id, &[1, 2], &mut engine).unwrap_err();
        assert!(matches!(err, Error::CorruptData(_)));
        assert_eq!(handles.state(id), HandleState::Unbound);
        assert_eq!(engine.stats().live_tokens, 0);
    }
}
