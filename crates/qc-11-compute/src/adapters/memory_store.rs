//! # In-Memory Ledger Store
//!
//! Ordered byte store with nested transactions, for testing and embedding.
//! Each `begin` snapshots the current map; `rollback` restores it and
//! `commit` drops it.

use crate::errors::StoreError;
use crate::ports::outbound::{KvPairs, LedgerStore};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;

type Map = BTreeMap<Vec<u8>, Vec<u8>>;

/// In-memory ledger store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    /// Live data.
    data: RwLock<Map>,
    /// One snapshot per open transaction, innermost last.
    snapshots: Mutex<Vec<Map>>,
}

impl InMemoryStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open transactions.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.snapshots.lock().len()
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl LedgerStore for InMemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.data.read().get(key).cloned())
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        self.data.write().remove(key);
        Ok(())
    }

    fn iter_prefix(&self, prefix: &[u8]) -> Result<KvPairs, StoreError> {
        Ok(self
            .data
            .read()
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn begin(&self) {
        let snapshot = self.data.read().clone();
        self.snapshots.lock().push(snapshot);
    }

    fn commit(&self) -> Result<(), StoreError> {
        self.snapshots
            .lock()
            .pop()
            .map(drop)
            .ok_or(StoreError::NoTransaction)
    }

    fn rollback(&self) -> Result<(), StoreError> {
        let snapshot = self
            .snapshots
            .lock()
            .pop()
            .ok_or(StoreError::NoTransaction)?;
        *self.data.write() = snapshot;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_iteration_is_ordered_and_bounded() {
        let store = InMemoryStore::new();
        store.set(&[1, 2], b"b").unwrap();
        store.set(&[1, 1], b"a").unwrap();
        store.set(&[2, 0], b"c").unwrap();

        let pairs = store.iter_prefix(&[1]).unwrap();
        assert_eq!(
            pairs,
            vec![(vec![1, 1], b"a".to_vec()), (vec![1, 2], b"b".to_vec())]
        );
    }

    #[test]
    fn test_nested_rollback_keeps_outer_writes() {
        let store = InMemoryStore::new();
        store.begin();
        store.set(b"outer", b"1").unwrap();
        store.begin();
        store.set(b"inner", b"2").unwrap();
        store.delete(b"outer").unwrap();
        store.rollback().unwrap();

        assert_eq!(store.get(b"outer").unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.get(b"inner").unwrap(), None);
        store.commit().unwrap();
        assert_eq!(store.depth(), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_unbalanced_commit_fails() {
        let store = InMemoryStore::new();
        assert_eq!(store.commit(), Err(StoreError::NoTransaction));
        assert_eq!(store.rollback(), Err(StoreError::NoTransaction));
    }
}
