//! Durable relay state: the height cursor and the named record collections a transfer
//! moves between (pending → awaiting → gone, or back to pending).
//!
//! Moves between collections are atomic; a record key is never present in both
//! pending and awaiting at once.

use crate::codec::{Sink, Source};
use crate::error::Result;
use crate::record::PendingKey;
use std::collections::BTreeMap;

mod mem;
mod sled;

pub use self::mem::InMemoryStore;
pub use self::sled::SledStore;

/// Logical collections of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    /// Single entry: the processed-height cursor.
    Cursor,
    /// Observed transfers not yet proven, keyed by [PendingKey].
    Pending,
    /// Submitted transfers keyed by hub tx hash.
    Awaiting,
    /// Pending records that failed to decode.
    Quarantine,
}

impl Collection {
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Cursor => "cursor",
            Collection::Pending => "pending",
            Collection::Awaiting => "awaiting",
            Collection::Quarantine => "quarantine",
        }
    }
}

/// A record set aside because it could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quarantined {
    pub key: PendingKey,
    pub record: Vec<u8>,
    pub reason: String,
}

pub(crate) fn encode_quarantined(record: &[u8], reason: &str) -> Vec<u8> {
    let mut sink = Sink::new();
    sink.write_var_bytes(record);
    sink.write_string(reason);
    sink.into_bytes()
}

pub(crate) fn decode_quarantined(key: PendingKey, bytes: &[u8]) -> Result<Quarantined> {
    let mut src = Source::new(bytes);
    let record = src.read_var_bytes("quarantined record")?.to_vec();
    let reason = src.read_string("quarantine reason")?;
    src.finish()?;
    Ok(Quarantined { key, record, reason })
}

/// Store shared by the tracker, relay, and checker loops.
pub trait RelayStore: Send + Sync {
    /// Last fully processed height; 0 when never set.
    fn height(&self) -> Result<u64>;

    fn set_height(&self, height: u64) -> Result<()>;

    /// Insert a record into pending under its content key. Re-enqueueing the same bytes
    /// is a no-op.
    fn enqueue_pending(&self, record: &[u8]) -> Result<PendingKey>;

    fn list_pending(&self) -> Result<Vec<(PendingKey, Vec<u8>)>>;

    fn remove_pending(&self, key: &PendingKey) -> Result<()>;

    fn put_awaiting(&self, tx_hash: &str, record: &[u8]) -> Result<()>;

    fn list_awaiting(&self) -> Result<BTreeMap<String, Vec<u8>>>;

    fn remove_awaiting(&self, tx_hash: &str) -> Result<()>;

    /// Move a pending record to awaiting under `tx_hash`.
    fn promote(&self, key: &PendingKey, tx_hash: &str, record: &[u8]) -> Result<()>;

    /// Move an awaiting entry back to pending; returns its pending key.
    fn demote(&self, tx_hash: &str, record: &[u8]) -> Result<PendingKey>;

    /// Move a pending record to quarantine.
    fn quarantine(&self, key: &PendingKey, record: &[u8], reason: &str) -> Result<()>;

    fn list_quarantined(&self) -> Result<Vec<Quarantined>>;

    /// Move a quarantined record back to pending. False if `key` is not quarantined.
    fn requeue_quarantined(&self, key: &PendingKey) -> Result<bool>;
}
