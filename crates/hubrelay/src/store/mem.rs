use super::{Quarantined, RelayStore};
use crate::error::Result;
use crate::record::PendingKey;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Default)]
struct Inner {
    height: u64,
    pending: BTreeMap<PendingKey, Vec<u8>>,
    awaiting: BTreeMap<String, Vec<u8>>,
    quarantine: BTreeMap<PendingKey, (Vec<u8>, String)>,
}

/// In-memory [RelayStore]; state is lost on drop. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RelayStore for InMemoryStore {
    fn height(&self) -> Result<u64> {
        Ok(self.inner.read().height)
    }

    fn set_height(&self, height: u64) -> Result<()> {
        self.inner.write().height = height;
        Ok(())
    }

    fn enqueue_pending(&self, record: &[u8]) -> Result<PendingKey> {
        let key = PendingKey::of(record);
        self.inner.write().pending.insert(key, record.to_vec());
        Ok(key)
    }

    fn list_pending(&self) -> Result<Vec<(PendingKey, Vec<u8>)>> {
        Ok(self
            .inner
            .read()
            .pending
            .iter()
            .map(|(k, v)| (*k, v.clone()))
            .collect())
    }

    fn remove_pending(&self, key: &PendingKey) -> Result<()> {
        self.inner.write().pending.remove(key);
        Ok(())
    }

    fn put_awaiting(&self, tx_hash: &str, record: &[u8]) -> Result<()> {
        self.inner
            .write()
            .awaiting
            .insert(tx_hash.to_string(), record.to_vec());
        Ok(())
    }

    fn list_awaiting(&self) -> Result<BTreeMap<String, Vec<u8>>> {
        Ok(self.inner.read().awaiting.clone())
    }

    fn remove_awaiting(&self, tx_hash: &str) -> Result<()> {
        self.inner.write().awaiting.remove(tx_hash);
        Ok(())
    }

    fn promote(&self, key: &PendingKey, tx_hash: &str, record: &[u8]) -> Result<()> {
        let mut guard = self.inner.write();
        guard.pending.remove(key);
        guard.awaiting.insert(tx_hash.to_string(), record.to_vec());
        Ok(())
    }

    fn demote(&self, tx_hash: &str, record: &[u8]) -> Result<PendingKey> {
        let key = PendingKey::of(record);
        let mut guard = self.inner.write();
        guard.awaiting.remove(tx_hash);
        guard.pending.insert(key, record.to_vec());
        Ok(key)
    }

    fn quarantine(&self, key: &PendingKey, record: &[u8], reason: &str) -> Result<()> {
        let mut guard = self.inner.write();
        guard.pending.remove(key);
        guard
            .quarantine
            .insert(*key, (record.to_vec(), reason.to_string()));
        Ok(())
    }

    fn list_quarantined(&self) -> Result<Vec<Quarantined>> {
        Ok(self
            .inner
            .read()
            .quarantine
            .iter()
            .map(|(key, (record, reason))| Quarantined {
                key: *key,
                record: record.clone(),
                reason: reason.clone(),
            })
            .collect())
    }

    fn requeue_quarantined(&self, key: &PendingKey) -> Result<bool> {
        let mut guard = self.inner.write();
        match guard.quarantine.remove(key) {
            Some((record, _)) => {
                guard.pending.insert(*key, record);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
