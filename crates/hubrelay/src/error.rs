//! Relay error type.

use crate::codec::CodecError;
use std::time::Duration;
use thiserror::Error;

/// Hub rejection text for a transfer whose cross-chain id is already processed.
pub const ALREADY_DONE: &str = "tx already done";

/// Hub rejection text for a header that a later synced header already supersedes.
pub const HEADER_SUPERSEDED: &str = "no header you commited is useful";

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("RPC error: {0}")]
    Rpc(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("store error: {0}")]
    Store(#[from] sled::Error),
    #[error("record codec: {0}")]
    Codec(#[from] CodecError),
    #[error("hub tx {tx_hash} not confirmed within {waited:?}")]
    Timeout { tx_hash: String, waited: Duration },
    #[error("config error: {0}")]
    Config(String),
}

impl RelayError {
    /// Hub says the cross-chain transfer was already relayed.
    pub fn is_already_done(&self) -> bool {
        matches!(self, RelayError::Rpc(msg) if msg.contains(ALREADY_DONE))
    }

    /// Hub says a newer header already covers the one we submitted.
    pub fn is_header_superseded(&self) -> bool {
        matches!(self, RelayError::Rpc(msg) if msg.contains(HEADER_SUPERSEDED))
    }
}

pub type Result<T, E = RelayError> = std::result::Result<T, E>;
