//! Relay hub client: header sync and inbound-transfer submission, done-record and
//! epoch-switch lookups, and transaction status.
//!
//! Transaction signing is delegated to a [HubSigner]; this module only builds the calls
//! and speaks the hub's JSON-RPC dialect (numeric `error`, text `desc`).

use crate::abi::parse_hex_bytes;
use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::rpc::{error_text, http_client, post};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

const DONE_TX_PREFIX: &[u8] = b"doneTx";
const EPOCH_SWITCH_PREFIX: &[u8] = b"epochSwitch";

/// Terminal execution state of a hub transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    NotFound,
    Success,
    Failed,
}

#[async_trait]
pub trait HubChain: Send + Sync {
    /// Submit a header bundle; returns the hub tx hash.
    async fn submit_header_sync(&self, side_chain_id: u64, bundle: &[u8]) -> Result<String>;

    /// Submit a proven transfer; returns the hub tx hash.
    async fn submit_inbound_transfer(
        &self,
        side_chain_id: u64,
        payload: &[u8],
        proof_height: u32,
        raw_proof: &[u8],
        bundle: &[u8],
    ) -> Result<String>;

    /// True when the hub already processed `cross_chain_id` from this side chain.
    async fn query_done_record(&self, side_chain_id: u64, cross_chain_id: &[u8]) -> Result<bool>;

    /// Height of the last validator epoch switch synced for this side chain; 0 if none.
    async fn query_epoch_switch_height(&self, side_chain_id: u64) -> Result<u64>;

    async fn get_transaction_state(&self, tx_hash: &str) -> Result<TxState>;

    /// True once the transaction is in a hub block.
    async fn get_transaction(&self, tx_hash: &str) -> Result<bool>;
}

/// Native-contract invocation handed to the signer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubCall {
    SyncBlockHeader {
        contract: String,
        side_chain_id: u64,
        headers: Vec<Vec<u8>>,
    },
    ImportOuterTransfer {
        contract: String,
        side_chain_id: u64,
        tx_data: Vec<u8>,
        height: u32,
        proof: Vec<u8>,
        header: Vec<u8>,
    },
}

/// Signs hub calls with the relayer account. Returns the serialized transaction.
pub trait HubSigner: Send + Sync {
    fn sign(&self, call: &HubCall) -> Result<Vec<u8>>;
}

/// Storage key of the hub's done record for a cross-chain id.
pub fn done_tx_key(side_chain_id: u64, cross_chain_id: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(DONE_TX_PREFIX.len() + 8 + cross_chain_id.len());
    key.extend_from_slice(DONE_TX_PREFIX);
    key.extend_from_slice(&side_chain_id.to_le_bytes());
    key.extend_from_slice(cross_chain_id);
    key
}

/// Storage key of the hub's epoch-switch record for a side chain.
pub fn epoch_switch_key(side_chain_id: u64) -> Vec<u8> {
    let mut key = EPOCH_SWITCH_PREFIX.to_vec();
    key.extend_from_slice(&side_chain_id.to_le_bytes());
    key
}

/// Epoch-switch records start with the switch height as u64 LE. Empty means none.
pub fn parse_epoch_switch_height(raw: &[u8]) -> Result<u64> {
    if raw.is_empty() {
        return Ok(0);
    }
    let head = raw
        .get(..8)
        .ok_or_else(|| RelayError::Decode(format!("epoch switch record is {} bytes", raw.len())))?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(head);
    Ok(u64::from_le_bytes(buf))
}

/// Map a `getsmartcodeevent` result to a [TxState].
pub fn tx_state_from_event(event: &Value) -> TxState {
    match event.get("State").and_then(Value::as_u64) {
        None => TxState::NotFound,
        Some(1) => TxState::Success,
        Some(_) => TxState::Failed,
    }
}

/// [HubChain] over the hub's JSON-RPC.
pub struct HubRpc {
    client: reqwest::Client,
    url: String,
    ccm_contract: String,
    header_sync_contract: String,
    signer: Arc<dyn HubSigner>,
}

impl HubRpc {
    pub fn new(config: &RelayConfig, signer: Arc<dyn HubSigner>) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            url: config.hub_rpc_url.clone(),
            ccm_contract: config.hub_ccm_contract.clone(),
            header_sync_contract: config.hub_header_sync_contract.clone(),
            signer,
        })
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let resp = post(&self.client, &self.url, method, params, 1).await?;
        let code = resp.get("error").and_then(Value::as_i64).unwrap_or(0);
        if code != 0 {
            let desc = resp.get("desc").and_then(Value::as_str).unwrap_or("");
            let detail = resp.get("result").map(error_text).unwrap_or_default();
            return Err(RelayError::Rpc(format!("{method} ({code}) {desc}: {detail}")));
        }
        Ok(resp.get("result").cloned().unwrap_or(Value::Null))
    }

    async fn get_storage(&self, contract: &str, key: &[u8]) -> Result<Vec<u8>> {
        let result = self
            .call("getstorage", json!([contract, hex::encode(key)]))
            .await?;
        match result.as_str() {
            None | Some("") => Ok(Vec::new()),
            Some(s) => parse_hex_bytes(s),
        }
    }

    async fn send(&self, call: HubCall) -> Result<String> {
        let raw = self.signer.sign(&call)?;
        let result = self
            .call("sendrawtransaction", json!([hex::encode(raw)]))
            .await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| RelayError::Decode("sendrawtransaction: tx hash not string".into()))
    }
}

#[async_trait]
impl HubChain for HubRpc {
    async fn submit_header_sync(&self, side_chain_id: u64, bundle: &[u8]) -> Result<String> {
        self.send(HubCall::SyncBlockHeader {
            contract: self.header_sync_contract.clone(),
            side_chain_id,
            headers: vec![bundle.to_vec()],
        })
        .await
    }

    async fn submit_inbound_transfer(
        &self,
        side_chain_id: u64,
        payload: &[u8],
        proof_height: u32,
        raw_proof: &[u8],
        bundle: &[u8],
    ) -> Result<String> {
        self.send(HubCall::ImportOuterTransfer {
            contract: self.ccm_contract.clone(),
            side_chain_id,
            tx_data: payload.to_vec(),
            height: proof_height,
            proof: raw_proof.to_vec(),
            header: bundle.to_vec(),
        })
        .await
    }

    async fn query_done_record(&self, side_chain_id: u64, cross_chain_id: &[u8]) -> Result<bool> {
        let raw = self
            .get_storage(&self.ccm_contract, &done_tx_key(side_chain_id, cross_chain_id))
            .await?;
        Ok(!raw.is_empty())
    }

    async fn query_epoch_switch_height(&self, side_chain_id: u64) -> Result<u64> {
        let raw = self
            .get_storage(&self.header_sync_contract, &epoch_switch_key(side_chain_id))
            .await?;
        parse_epoch_switch_height(&raw)
    }

    async fn get_transaction_state(&self, tx_hash: &str) -> Result<TxState> {
        let event = self.call("getsmartcodeevent", json!([tx_hash])).await?;
        Ok(tx_state_from_event(&event))
    }

    async fn get_transaction(&self, tx_hash: &str) -> Result<bool> {
        let tx = self.call("getrawtransaction", json!([tx_hash])).await?;
        Ok(match tx {
            Value::Null => false,
            Value::String(s) => !s.is_empty(),
            _ => true,
        })
    }
}
