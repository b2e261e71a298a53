//! ABI types and decoding for the side chain's cross-chain manager.
//!
//! CrossChainEvent logs and the MakeTxParam payload they carry. Decode from the JSON-RPC
//! log shape returned by eth_getLogs.

use crate::codec::{CodecError, Source};
use crate::error::{RelayError, Result};
use alloy::primitives::B256;
use alloy::sol;
use alloy::sol_types::SolEvent;
use serde_json::{json, Value};

sol! {
    /// Emitted by the cross-chain manager for every outbound transfer.
    event CrossChainEvent(
        address indexed sender,
        bytes txId,
        address proxyOrAssetContract,
        uint64 toChainId,
        bytes toContract,
        bytes rawdata
    );
}

/// Deposit event as the scanner sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositEvent {
    /// See [encode_tx_index].
    pub tx_index: String,
    pub tx_hash: [u8; 32],
    pub to_chain_id: u64,
    /// `rawdata`: a serialized [MakeTxParam].
    pub raw_payload: Vec<u8>,
    pub block_number: u64,
}

/// Hex of the minimal big-endian form of a transfer index; `"00"` for zero.
pub fn encode_tx_index(be_bytes: &[u8]) -> String {
    let start = be_bytes
        .iter()
        .position(|b| *b != 0)
        .unwrap_or(be_bytes.len());
    if start == be_bytes.len() {
        return "00".to_string();
    }
    hex::encode(&be_bytes[start..])
}

/// eth_getLogs filter for CrossChainEvent from `address` over `[from_block, to_block]`.
pub fn build_logs_filter(address: &[u8; 20], from_block: u64, to_block: u64) -> Value {
    json!({
        "address": format!("0x{}", hex::encode(address)),
        "topics": [format!("{:#x}", CrossChainEvent::SIGNATURE_HASH)],
        "fromBlock": format!("0x{:x}", from_block),
        "toBlock": format!("0x{:x}", to_block),
    })
}

/// Decode a JSON-RPC log into a [DepositEvent]. Returns `Ok(None)` for logs flagged `removed`.
pub fn decode_deposit_log(log: &Value) -> Result<Option<DepositEvent>> {
    if log.get("removed").and_then(Value::as_bool) == Some(true) {
        return Ok(None);
    }
    let block_number = parse_hex_u64(field_str(log, "blockNumber")?)?;
    let tx_hash = parse_hex_bytes_32(field_str(log, "transactionHash")?)?;
    let data = parse_hex_bytes(field_str(log, "data")?)?;
    let topics = log
        .get("topics")
        .and_then(Value::as_array)
        .ok_or_else(|| RelayError::Decode("missing topics".into()))?
        .iter()
        .map(|t| {
            let s = t
                .as_str()
                .ok_or_else(|| RelayError::Decode("topic not string".into()))?;
            parse_hex_bytes_32(s).map(B256::from)
        })
        .collect::<Result<Vec<_>>>()?;

    let ev = CrossChainEvent::decode_raw_log(topics, &data, true)
        .map_err(|e| RelayError::Decode(format!("CrossChainEvent: {e}")))?;

    Ok(Some(DepositEvent {
        tx_index: encode_tx_index(&ev.txId),
        tx_hash,
        to_chain_id: ev.toChainId,
        raw_payload: ev.rawdata.to_vec(),
        block_number,
    }))
}

/// Cross-chain call parameters serialized into the event's `rawdata`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MakeTxParam {
    pub tx_hash: Vec<u8>,
    /// Hub-side identifier used for done-record dedup.
    pub cross_chain_id: Vec<u8>,
    pub from_contract: Vec<u8>,
    pub to_chain_id: u64,
    pub to_contract: Vec<u8>,
    pub method: String,
    pub args: Vec<u8>,
}

impl MakeTxParam {
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut src = Source::new(bytes);
        Ok(Self {
            tx_hash: src.read_var_bytes("tx_hash")?.to_vec(),
            cross_chain_id: src.read_var_bytes("cross_chain_id")?.to_vec(),
            from_contract: src.read_var_bytes("from_contract")?.to_vec(),
            to_chain_id: src.read_u64("to_chain_id")?,
            to_contract: src.read_var_bytes("to_contract")?.to_vec(),
            method: src.read_string("method")?,
            args: src.read_var_bytes("args")?.to_vec(),
        })
    }
}

fn field_str<'a>(v: &'a Value, name: &str) -> Result<&'a str> {
    v.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| RelayError::Decode(format!("missing {name}")))
}

pub(crate) fn parse_hex_u64(s: &str) -> Result<u64> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(s, 16).map_err(|e| RelayError::Decode(format!("hex u64 {s:?}: {e}")))
}

pub(crate) fn parse_hex_bytes(s: &str) -> Result<Vec<u8>> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(s).map_err(|e| RelayError::Decode(format!("hex bytes: {e}")))
}

fn parse_hex_bytes_32(s: &str) -> Result<[u8; 32]> {
    let bytes = parse_hex_bytes(s)?;
    <[u8; 32]>::try_from(bytes.as_slice())
        .map_err(|_| RelayError::Decode(format!("expected 32 bytes, got {}", bytes.len())))
}

/// Parse a 20-byte hex address (with or without `0x`).
pub fn parse_address(s: &str) -> Result<[u8; 20]> {
    let bytes = parse_hex_bytes(s)?;
    <[u8; 20]>::try_from(bytes.as_slice())
        .map_err(|_| RelayError::Decode(format!("address must be 20 bytes, got {}", bytes.len())))
}
