//! Common helpers for integration tests: in-process source chain and hub doubles.
//! Some helpers are only used by specific test binaries; allow dead_code to avoid per-binary warnings.
#![allow(dead_code)]

use async_trait::async_trait;
use hubrelay::codec::Sink;
use hubrelay::{
    DepositEvent, HubChain, InMemoryStore, RelayConfig, RelayContext, RelayError, Result,
    SignedHeader, SourceChain, TmHeader, TxState, Validator,
};
use parking_lot::Mutex;
use serde_json::{json, Map};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

pub const SIDE_CHAIN_ID: u64 = 12;
pub const ECCD: [u8; 20] = [0x20; 20];

/// Store proof the mock proof endpoint serves: key path `/evm/storage`.
pub const TEXT_PROOF: &str = r#"ops:<type:"iavl:v" key:"storage" data:"\001" > ops:<type:"multistore" key:"evm" data:"\002" > "#;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("hubrelay=debug".parse().unwrap()))
        .with_test_writer()
        .try_init();
}

pub fn config(finality_lag: u64) -> RelayConfig {
    let toml = format!(
        r#"
side_chain_id = {SIDE_CHAIN_ID}
finality_lag = {finality_lag}
evm_rpc_urls = ["http://127.0.0.1:8545"]
tendermint_rpc_urls = ["http://127.0.0.1:26657"]
proof_rpc_urls = ["http://127.0.0.1:8545"]
eccm_contract_address = "0x1010101010101010101010101010101010101010"
eccd_contract_address = "0x{eccd}"
hub_rpc_url = "http://127.0.0.1:20336"
hub_ccm_contract = "0300000000000000000000000000000000000000"
hub_header_sync_contract = "0800000000000000000000000000000000000000"
db_path = "/tmp/hubrelay-test"

[timing]
poll_interval_ms = 10
retry_backoff_ms = 10
confirm_poll_interval_ms = 5
confirm_timeout_secs = 1
max_backoff_ms = 20
"#,
        eccd = hex::encode(ECCD)
    );
    RelayConfig::from_toml_str(&toml).unwrap()
}

pub struct Harness {
    pub source: Arc<MockSource>,
    pub hub: Arc<MockHub>,
    pub store: Arc<InMemoryStore>,
    pub ctx: RelayContext,
}

pub fn harness(finality_lag: u64) -> Harness {
    harness_with(config(finality_lag))
}

pub fn harness_with(config: RelayConfig) -> Harness {
    init_tracing();
    let source = Arc::new(MockSource::default());
    let hub = Arc::new(MockHub::default());
    let store = Arc::new(InMemoryStore::new());
    let ctx = RelayContext::new(config, source.clone(), hub.clone(), store.clone()).unwrap();
    Harness {
        source,
        hub,
        store,
        ctx,
    }
}

/// Serialized MakeTxParam carrying `cross_chain_id`.
pub fn make_tx_param(cross_chain_id: &[u8]) -> Vec<u8> {
    let mut sink = Sink::new();
    sink.write_var_bytes(&[0x01; 32]);
    sink.write_var_bytes(cross_chain_id);
    sink.write_var_bytes(&[0x02; 20]);
    sink.write_u64(2);
    sink.write_var_bytes(&[0x03; 20]);
    sink.write_string("unlock");
    sink.write_var_bytes(b"args");
    sink.into_bytes()
}

pub fn deposit(height: u64, index: u8, cross_chain_id: &[u8]) -> DepositEvent {
    DepositEvent {
        tx_index: format!("{index:02x}"),
        tx_hash: [index; 32],
        to_chain_id: 2,
        raw_payload: make_tx_param(cross_chain_id),
        block_number: height,
    }
}

/// Side chain double. Headers keep the same validator set unless the height is in `rotations`.
#[derive(Default)]
pub struct MockSource {
    pub tip: AtomicU64,
    pub events: Mutex<HashMap<u64, Vec<DepositEvent>>>,
    pub failing_log_heights: Mutex<HashSet<u64>>,
    pub rotations: Mutex<HashSet<u64>>,
    pub commit_calls: Mutex<Vec<u64>>,
    pub log_calls: Mutex<Vec<(u64, u64)>>,
    pub proof_calls: Mutex<Vec<([u8; 20], [u8; 32], u64)>>,
    pub fail_proofs: Mutex<bool>,
}

impl MockSource {
    pub fn set_tip(&self, tip: u64) {
        self.tip.store(tip, Ordering::SeqCst);
    }

    pub fn add_event(&self, ev: DepositEvent) {
        self.events.lock().entry(ev.block_number).or_default().push(ev);
    }

    pub fn fail_logs_at(&self, height: u64) {
        self.failing_log_heights.lock().insert(height);
    }

    pub fn rotate_at(&self, height: u64) {
        self.rotations.lock().insert(height);
    }

    pub fn proof_response() -> Vec<u8> {
        serde_json::to_vec(&json!({
            "address": format!("0x{}", hex::encode(ECCD)),
            "storageProof": [{ "key": "0x00", "value": "0x01", "proof": [TEXT_PROOF] }]
        }))
        .unwrap()
    }
}

#[async_trait]
impl SourceChain for MockSource {
    async fn tip_height(&self) -> Result<u64> {
        Ok(self.tip.load(Ordering::SeqCst))
    }

    async fn filter_deposit_events(&self, from_height: u64, to_height: u64) -> Result<Vec<DepositEvent>> {
        self.log_calls.lock().push((from_height, to_height));
        let failing = self.failing_log_heights.lock();
        if (from_height..=to_height).any(|h| failing.contains(&h)) {
            return Err(RelayError::Rpc("eth_getLogs: upstream unavailable".into()));
        }
        let events = self.events.lock();
        Ok((from_height..=to_height)
            .flat_map(|h| events.get(&h).cloned().unwrap_or_default())
            .collect())
    }

    async fn fetch_commit(&self, height: u64) -> Result<SignedHeader> {
        self.commit_calls.lock().push(height);
        let next = if self.rotations.lock().contains(&height) {
            "BBBB"
        } else {
            "AAAA"
        };
        Ok(SignedHeader {
            header: TmHeader {
                chain_id: "side-12".into(),
                height,
                validators_hash: "AAAA".into(),
                next_validators_hash: next.into(),
                rest: Map::new(),
            },
            commit: json!({ "height": height.to_string(), "round": 0, "signatures": [] }),
        })
    }

    async fn fetch_validators(&self, _height: u64) -> Result<Vec<Validator>> {
        Ok(vec![Validator {
            address: "F00D".into(),
            pub_key: json!({ "type": "tendermint/PubKeyEd25519", "value": "AAAA" }),
            voting_power: 100,
            proposer_priority: 0,
        }])
    }

    async fn fetch_storage_proof(&self, contract: &[u8; 20], key: &[u8; 32], height: u64) -> Result<Vec<u8>> {
        self.proof_calls.lock().push((*contract, *key, height));
        if *self.fail_proofs.lock() {
            return Err(RelayError::Rpc("eth_getProof: missing trie node".into()));
        }
        Ok(Self::proof_response())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSubmission {
    pub side_chain_id: u64,
    pub payload: Vec<u8>,
    pub proof_height: u32,
    pub raw_proof: Vec<u8>,
    pub bundle: Vec<u8>,
}

/// Hub double. Submissions succeed with sequential tx hashes unless an error is armed.
pub struct MockHub {
    pub done: Mutex<HashSet<Vec<u8>>>,
    pub done_query_error: Mutex<bool>,
    pub epoch_height: AtomicU64,
    pub epoch_failures_left: AtomicU64,
    pub header_submissions: Mutex<Vec<Vec<u8>>>,
    pub header_error: Mutex<Option<String>>,
    pub tx_visible: Mutex<bool>,
    pub transfer_submissions: Mutex<Vec<TransferSubmission>>,
    pub transfer_error: Mutex<Option<String>>,
    pub tx_states: Mutex<HashMap<String, std::result::Result<TxState, String>>>,
    next_tx: AtomicU64,
}

impl Default for MockHub {
    fn default() -> Self {
        Self {
            done: Mutex::default(),
            done_query_error: Mutex::new(false),
            epoch_height: AtomicU64::new(0),
            epoch_failures_left: AtomicU64::new(0),
            header_submissions: Mutex::default(),
            header_error: Mutex::new(None),
            tx_visible: Mutex::new(true),
            transfer_submissions: Mutex::default(),
            transfer_error: Mutex::new(None),
            tx_states: Mutex::default(),
            next_tx: AtomicU64::new(1),
        }
    }
}

impl MockHub {
    pub fn mark_done(&self, cross_chain_id: &[u8]) {
        self.done.lock().insert(cross_chain_id.to_vec());
    }

    pub fn set_state(&self, tx_hash: &str, state: TxState) {
        self.tx_states.lock().insert(tx_hash.to_string(), Ok(state));
    }

    pub fn set_state_error(&self, tx_hash: &str, msg: &str) {
        self.tx_states.lock().insert(tx_hash.to_string(), Err(msg.to_string()));
    }

    fn next_tx_hash(&self) -> String {
        format!("0xhub{:04}", self.next_tx.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl HubChain for MockHub {
    async fn submit_header_sync(&self, _side_chain_id: u64, bundle: &[u8]) -> Result<String> {
        if let Some(msg) = self.header_error.lock().clone() {
            return Err(RelayError::Rpc(msg));
        }
        self.header_submissions.lock().push(bundle.to_vec());
        Ok(self.next_tx_hash())
    }

    async fn submit_inbound_transfer(
        &self,
        side_chain_id: u64,
        payload: &[u8],
        proof_height: u32,
        raw_proof: &[u8],
        bundle: &[u8],
    ) -> Result<String> {
        if let Some(msg) = self.transfer_error.lock().clone() {
            return Err(RelayError::Rpc(msg));
        }
        self.transfer_submissions.lock().push(TransferSubmission {
            side_chain_id,
            payload: payload.to_vec(),
            proof_height,
            raw_proof: raw_proof.to_vec(),
            bundle: bundle.to_vec(),
        });
        Ok(self.next_tx_hash())
    }

    async fn query_done_record(&self, _side_chain_id: u64, cross_chain_id: &[u8]) -> Result<bool> {
        if *self.done_query_error.lock() {
            return Err(RelayError::Rpc("getstorage: timeout".into()));
        }
        Ok(self.done.lock().contains(cross_chain_id))
    }

    async fn query_epoch_switch_height(&self, _side_chain_id: u64) -> Result<u64> {
        let left = self.epoch_failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.epoch_failures_left.store(left - 1, Ordering::SeqCst);
            return Err(RelayError::Rpc("getstorage: connection refused".into()));
        }
        Ok(self.epoch_height.load(Ordering::SeqCst))
    }

    async fn get_transaction_state(&self, tx_hash: &str) -> Result<TxState> {
        match self.tx_states.lock().get(tx_hash) {
            None => Ok(TxState::NotFound),
            Some(Ok(state)) => Ok(*state),
            Some(Err(msg)) => Err(RelayError::Rpc(msg.clone())),
        }
    }

    async fn get_transaction(&self, _tx_hash: &str) -> Result<bool> {
        Ok(*self.tx_visible.lock())
    }
}
