//! CrossTransfer: one observed deposit awaiting relay, and its persisted encoding.

use crate::codec::{CodecError, Sink, Source};
use sha3::{Digest, Keccak256};
use std::fmt;

/// Observed deposit event. Persisted verbatim in the pending and awaiting collections.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CrossTransfer {
    /// Hex of the event's big-endian transfer index; the storage-mapping key for the proof.
    pub tx_index: String,
    /// Source-chain transaction hash.
    pub tx_id: Vec<u8>,
    /// Raw event payload, opaque to the relay.
    pub value: Vec<u8>,
    pub to_chain: u32,
    /// Source-chain height the event was observed at.
    pub height: u64,
}

impl CrossTransfer {
    /// Field order: string, bytes, bytes, u32, u64.
    pub fn encode(&self) -> Vec<u8> {
        let mut sink = Sink::new();
        sink.write_string(&self.tx_index);
        sink.write_var_bytes(&self.tx_id);
        sink.write_var_bytes(&self.value);
        sink.write_u32(self.to_chain);
        sink.write_u64(self.height);
        sink.into_bytes()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut src = Source::new(bytes);
        let tx_index = src.read_string("tx_index")?;
        let tx_id = src.read_var_bytes("tx_id")?.to_vec();
        let value = src.read_var_bytes("value")?.to_vec();
        let to_chain = src.read_u32("to_chain")?;
        let height = src.read_u64("height")?;
        src.finish()?;
        Ok(Self {
            tx_index,
            tx_id,
            value,
            to_chain,
            height,
        })
    }

    pub fn tx_id_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.tx_id))
    }
}

/// Key of a pending record: keccak256 of its encoded bytes, so enqueueing is idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PendingKey(pub [u8; 32]);

impl PendingKey {
    pub fn of(record_bytes: &[u8]) -> Self {
        let mut out = [0u8; 32];
        out.copy_from_slice(&Keccak256::digest(record_bytes));
        Self(out)
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; 32]>::try_from(bytes).ok().map(Self)
    }
}

impl AsRef<[u8]> for PendingKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for PendingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}
