use super::{decode_quarantined, encode_quarantined, Collection, Quarantined, RelayStore};
use crate::error::{RelayError, Result};
use crate::record::PendingKey;
use ::sled::transaction::{ConflictableTransactionError, TransactionError};
use ::sled::{Transactional, Tree};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::path::Path;

const HEIGHT_KEY: &[u8] = b"height";

/// [RelayStore] backed by a [sled](https://sled.rs) database, one tree per [Collection].
#[derive(Clone)]
pub struct SledStore {
    db: ::sled::Db,
    cursor: Tree,
    pending: Tree,
    awaiting: Tree,
    quarantine: Tree,
}

impl std::fmt::Debug for SledStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledStore").finish()
    }
}

fn tx_error(e: TransactionError<Infallible>) -> RelayError {
    match e {
        TransactionError::Storage(e) => RelayError::Store(e),
        TransactionError::Abort(never) => match never {},
    }
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = ::sled::Config::new()
            .path(path)
            .mode(::sled::Mode::HighThroughput)
            .open()?;
        Self::from_db(db)
    }

    /// Database removed on drop.
    pub fn temporary() -> Result<Self> {
        let db = ::sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: ::sled::Db) -> Result<Self> {
        Ok(Self {
            cursor: db.open_tree(Collection::Cursor.name())?,
            pending: db.open_tree(Collection::Pending.name())?,
            awaiting: db.open_tree(Collection::Awaiting.name())?,
            quarantine: db.open_tree(Collection::Quarantine.name())?,
            db,
        })
    }

    fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl RelayStore for SledStore {
    #[tracing::instrument(skip(self))]
    fn height(&self) -> Result<u64> {
        match self.cursor.get(HEIGHT_KEY)? {
            Some(v) => {
                let bytes = <[u8; 8]>::try_from(v.as_ref())
                    .map_err(|_| RelayError::Decode(format!("height entry is {} bytes", v.len())))?;
                Ok(u64::from_le_bytes(bytes))
            }
            None => Ok(0),
        }
    }

    #[tracing::instrument(skip(self))]
    fn set_height(&self, height: u64) -> Result<()> {
        self.cursor.insert(HEIGHT_KEY, &height.to_le_bytes())?;
        self.flush()
    }

    #[tracing::instrument(skip_all)]
    fn enqueue_pending(&self, record: &[u8]) -> Result<PendingKey> {
        let key = PendingKey::of(record);
        self.pending.insert(key, record)?;
        self.flush()?;
        Ok(key)
    }

    #[tracing::instrument(skip(self))]
    fn list_pending(&self) -> Result<Vec<(PendingKey, Vec<u8>)>> {
        let mut out = Vec::new();
        for entry in self.pending.iter() {
            let (k, v) = entry?;
            match PendingKey::from_slice(&k) {
                Some(key) => out.push((key, v.to_vec())),
                None => tracing::warn!(key = %hex::encode(&k), "ignoring malformed pending key"),
            }
        }
        Ok(out)
    }

    #[tracing::instrument(skip(self))]
    fn remove_pending(&self, key: &PendingKey) -> Result<()> {
        self.pending.remove(key)?;
        self.flush()
    }

    #[tracing::instrument(skip(self, record))]
    fn put_awaiting(&self, tx_hash: &str, record: &[u8]) -> Result<()> {
        self.awaiting.insert(tx_hash.as_bytes(), record)?;
        self.flush()
    }

    #[tracing::instrument(skip(self))]
    fn list_awaiting(&self) -> Result<BTreeMap<String, Vec<u8>>> {
        let mut out = BTreeMap::new();
        for entry in self.awaiting.iter() {
            let (k, v) = entry?;
            let tx_hash = String::from_utf8(k.to_vec())
                .map_err(|_| RelayError::Decode("awaiting key is not utf-8".into()))?;
            out.insert(tx_hash, v.to_vec());
        }
        Ok(out)
    }

    #[tracing::instrument(skip(self))]
    fn remove_awaiting(&self, tx_hash: &str) -> Result<()> {
        self.awaiting.remove(tx_hash.as_bytes())?;
        self.flush()
    }

    #[tracing::instrument(skip(self, record))]
    fn promote(&self, key: &PendingKey, tx_hash: &str, record: &[u8]) -> Result<()> {
        (&self.pending, &self.awaiting)
            .transaction(|(pending, awaiting)| {
                pending.remove(key.as_ref())?;
                awaiting.insert(tx_hash.as_bytes(), record)?;
                Ok::<_, ConflictableTransactionError<Infallible>>(())
            })
            .map_err(tx_error)?;
        self.flush()
    }

    #[tracing::instrument(skip(self, record))]
    fn demote(&self, tx_hash: &str, record: &[u8]) -> Result<PendingKey> {
        let key = PendingKey::of(record);
        (&self.pending, &self.awaiting)
            .transaction(|(pending, awaiting)| {
                awaiting.remove(tx_hash.as_bytes())?;
                pending.insert(key.as_ref(), record)?;
                Ok::<_, ConflictableTransactionError<Infallible>>(())
            })
            .map_err(tx_error)?;
        self.flush()?;
        Ok(key)
    }

    #[tracing::instrument(skip(self, record))]
    fn quarantine(&self, key: &PendingKey, record: &[u8], reason: &str) -> Result<()> {
        let entry = encode_quarantined(record, reason);
        (&self.pending, &self.quarantine)
            .transaction(|(pending, quarantine)| {
                pending.remove(key.as_ref())?;
                quarantine.insert(key.as_ref(), entry.as_slice())?;
                Ok::<_, ConflictableTransactionError<Infallible>>(())
            })
            .map_err(tx_error)?;
        self.flush()
    }

    #[tracing::instrument(skip(self))]
    fn list_quarantined(&self) -> Result<Vec<Quarantined>> {
        let mut out = Vec::new();
        for entry in self.quarantine.iter() {
            let (k, v) = entry?;
            let key = PendingKey::from_slice(&k)
                .ok_or_else(|| RelayError::Decode("malformed quarantine key".into()))?;
            out.push(decode_quarantined(key, &v)?);
        }
        Ok(out)
    }

    #[tracing::instrument(skip(self))]
    fn requeue_quarantined(&self, key: &PendingKey) -> Result<bool> {
        let Some(raw) = self.quarantine.get(key)? else {
            return Ok(false);
        };
        let entry = decode_quarantined(*key, &raw)?;
        (&self.pending, &self.quarantine)
            .transaction(|(pending, quarantine)| {
                quarantine.remove(key.as_ref())?;
                pending.insert(key.as_ref(), entry.record.as_slice())?;
                Ok::<_, ConflictableTransactionError<Infallible>>(())
            })
            .map_err(tx_error)?;
        self.flush()?;
        Ok(true)
    }
}
