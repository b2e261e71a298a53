//! Source chain client: EVM JSON-RPC for tip and logs, Tendermint RPC for commits and
//! validator sets, and a proof endpoint serving eth_getProof with store proofs.

use crate::abi::{build_logs_filter, decode_deposit_log, parse_hex_u64, DepositEvent};
use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::header::{SignedHeader, Validator};
use crate::pool::{Pick, RandomPool};
use crate::rpc::{http_client, http_json_rpc};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

const VALIDATORS_PER_PAGE: usize = 100;

#[async_trait]
pub trait SourceChain: Send + Sync {
    async fn tip_height(&self) -> Result<u64>;

    /// Deposit events in `[from_height, to_height]`, in log order.
    async fn filter_deposit_events(&self, from_height: u64, to_height: u64) -> Result<Vec<DepositEvent>>;

    async fn fetch_commit(&self, height: u64) -> Result<SignedHeader>;

    /// Full validator set at `height`.
    async fn fetch_validators(&self, height: u64) -> Result<Vec<Validator>>;

    /// Raw eth_getProof response for one storage key of `contract` at `height`.
    async fn fetch_storage_proof(&self, contract: &[u8; 20], key: &[u8; 32], height: u64) -> Result<Vec<u8>>;
}

/// [SourceChain] over HTTP JSON-RPC, picking an endpoint from a pool per call.
pub struct JsonRpcSource {
    client: reqwest::Client,
    evm: Box<dyn Pick<String>>,
    tendermint: Box<dyn Pick<String>>,
    proof: Box<dyn Pick<String>>,
    eccm_address: [u8; 20],
}

impl JsonRpcSource {
    pub fn new(config: &RelayConfig) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            evm: Box::new(RandomPool::new(config.evm_rpc_urls.clone())?),
            tendermint: Box::new(RandomPool::new(config.tendermint_rpc_urls.clone())?),
            proof: Box::new(RandomPool::new(config.proof_rpc_urls.clone())?),
            eccm_address: config.eccm_address()?,
        })
    }

    /// Replace the endpoint selectors, e.g. with a [crate::pool::RoundRobinPool].
    pub fn with_pools(
        mut self,
        evm: Box<dyn Pick<String>>,
        tendermint: Box<dyn Pick<String>>,
        proof: Box<dyn Pick<String>>,
    ) -> Self {
        self.evm = evm;
        self.tendermint = tendermint;
        self.proof = proof;
        self
    }
}

#[derive(Debug, Deserialize)]
struct CommitResult {
    signed_header: SignedHeader,
}

#[derive(Debug, Deserialize)]
struct ValidatorsResult {
    validators: Vec<Validator>,
    total: String,
}

#[async_trait]
impl SourceChain for JsonRpcSource {
    async fn tip_height(&self) -> Result<u64> {
        let result = http_json_rpc(&self.client, self.evm.pick(), "eth_blockNumber", json!([]), 1).await?;
        let s = result
            .as_str()
            .ok_or_else(|| RelayError::Decode("blockNumber not string".into()))?;
        parse_hex_u64(s)
    }

    async fn filter_deposit_events(&self, from_height: u64, to_height: u64) -> Result<Vec<DepositEvent>> {
        let filter = build_logs_filter(&self.eccm_address, from_height, to_height);
        let result = http_json_rpc(&self.client, self.evm.pick(), "eth_getLogs", json!([filter]), 2).await?;
        let logs = result
            .as_array()
            .ok_or_else(|| RelayError::Decode("getLogs not array".into()))?;
        let mut events = Vec::with_capacity(logs.len());
        for log in logs {
            if let Some(ev) = decode_deposit_log(log)? {
                events.push(ev);
            }
        }
        Ok(events)
    }

    async fn fetch_commit(&self, height: u64) -> Result<SignedHeader> {
        let params = json!({ "height": height.to_string() });
        let result = http_json_rpc(&self.client, self.tendermint.pick(), "commit", params, 4).await?;
        let commit: CommitResult =
            serde_json::from_value(result).map_err(|e| RelayError::Decode(format!("commit at {height}: {e}")))?;
        Ok(commit.signed_header)
    }

    async fn fetch_validators(&self, height: u64) -> Result<Vec<Validator>> {
        let url = self.tendermint.pick();
        let mut out = Vec::new();
        let mut page = 1usize;
        loop {
            let params = json!({
                "height": height.to_string(),
                "page": page.to_string(),
                "per_page": VALIDATORS_PER_PAGE.to_string(),
            });
            let result = http_json_rpc(&self.client, url, "validators", params, 5).await?;
            let batch: ValidatorsResult = serde_json::from_value(result)
                .map_err(|e| RelayError::Decode(format!("validators at {height}: {e}")))?;
            let total: usize = batch
                .total
                .parse()
                .map_err(|e| RelayError::Decode(format!("validators total: {e}")))?;
            let fetched = batch.validators.len();
            out.extend(batch.validators);
            if fetched == 0 || out.len() >= total {
                break;
            }
            page += 1;
        }
        Ok(out)
    }

    async fn fetch_storage_proof(&self, contract: &[u8; 20], key: &[u8; 32], height: u64) -> Result<Vec<u8>> {
        let params = json!([
            format!("0x{}", hex::encode(contract)),
            [format!("0x{}", hex::encode(key))],
            format!("0x{:x}", height),
        ]);
        let result = http_json_rpc(&self.client, self.proof.pick(), "eth_getProof", params, 6).await?;
        if result == Value::Null {
            return Err(RelayError::Decode(format!("empty proof at {height}")));
        }
        serde_json::to_vec(&result).map_err(|e| RelayError::Decode(e.to_string()))
    }
}
