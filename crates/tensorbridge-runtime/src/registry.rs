//! Live tensor registry.

use std::collections::BTreeMap;
use tensorbridge_core::{DType, NativeToken, TensorId};

/// Where a tensor came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TensorOrigin {
    /// Created by the caller from a shape and dtype.
    Allocated,
    /// Output of a native op.
    Op(String),
}

/// What the registry knows about one live tensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorRecord {
    pub id: TensorId,
    pub shape: Vec<usize>,
    pub dtype: DType,
    pub origin: TensorOrigin,
    /// Native token, once one has been allocated.
    pub token: Option<NativeToken>,
}

/// Every live tensor, keyed by identity.
///
/// Entries are added when a handle is created and removed when it is
/// disposed. Starts empty.
#[derive(Debug, Default)]
pub struct TensorRegistry {
    records: BTreeMap<TensorId, TensorRecord>,
}

impl TensorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, record: TensorRecord) {
        self.records.insert(record.id, record);
    }

    pub(crate) fn set_token(&mut self, id: TensorId, token: NativeToken) {
        if let Some(record) = self.records.get_mut(&id) {
            record.token = Some(token);
        }
    }

    pub(crate) fn remove(&mut self, id: TensorId) -> Option<TensorRecord> {
        self.records.remove(&id)
    }

    pub fn get(&self, id: TensorId) -> Option<&TensorRecord> {
        self.records.get(&id)
    }

    pub fn contains(&self, id: TensorId) -> bool {
        self.records.contains_key(&id)
    }

    /// Number of live tensors.
    pub fn live_count(&self) -> usize {
        self.records.len()
    }

    /// Number of live tensors holding a native token.
    pub fn native_count(&self) -> usize {
        self.records.values().filter(|r| r.token.is_some()).count()
    }

    /// Live records in creation order.
    pub fn records(&self) -> impl Iterator<Item = &TensorRecord> {
        self.records.values()
    }

    pub fn ids(&self) -> Vec<TensorId> {
        self.records.keys().copied().collect()
    }

    /// The live tensor holding a native token, if any.
    pub fn find_token(&self, token: NativeToken) -> Option<TensorId> {
        self.records
            .values()
            .find(|r| r.token == Some(token))
            .map(|r| r.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u64) -> TensorRecord {
        TensorRecord {
            id: TensorId::from_raw(id),
            shape: vec![2, 2],
            dtype: DType::Float32,
            origin: TensorOrigin::Allocated,
            token: None,
        }
    }

    #[test]
    fn test_insert_remove() {
        let mut registry = TensorRegistry::new();
        assert_eq!(registry.live_count(), 0);

        registry.insert(record(1));
        registry.insert(record(2));
        registry.set_token(TensorId::from_raw(2), NativeToken(7));
        assert_eq!(registry.live_count(), 2);
        assert_eq!(registry.native_count(), 1);
        assert_eq!(registry.find_token(NativeToken(7)), Some(TensorId::from_raw(2)));

        let removed = registry.remove(TensorId::from_raw(2)).unwrap();
        assert_eq!(removed.token, Some(NativeToken(7)));
        assert!(registry.remove(TensorId::from_raw(2)).is_none());
        assert_eq!(registry.ids(), vec![TensorId::from_raw(1)]);
    }
}
