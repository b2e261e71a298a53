//! Example: run the relayer against live side-chain and hub endpoints.
//!
//! Loads a TOML config, opens the sled store at `db_path`, and drives the tracker, relay
//! and checker loops until Ctrl-C. Hub submissions go through [DryRunSigner], which logs
//! each call and refuses it; plug in a [HubSigner] holding the relayer account to submit.
//!
//! Usage:
//!
//!   cargo run -p hubrelay --example relayer -- --config <CONFIG_TOML>
//!
//! Options:
//!   --start-height <H>  Start after height H instead of the persisted cursor / hub epoch switch.

use hubrelay::{
    HubCall, HubRpc, HubSigner, JsonRpcSource, RelayConfig, RelayContext, RelayError, Relayer,
    SledStore,
};
use std::sync::Arc;

struct DryRunSigner;

impl HubSigner for DryRunSigner {
    fn sign(&self, call: &HubCall) -> hubrelay::Result<Vec<u8>> {
        match call {
            HubCall::SyncBlockHeader { side_chain_id, headers, .. } => {
                tracing::info!(side_chain_id, headers = headers.len(), "dry run: SyncBlockHeader")
            }
            HubCall::ImportOuterTransfer { side_chain_id, height, .. } => {
                tracing::info!(side_chain_id, height, "dry run: ImportOuterTransfer")
            }
        }
        Err(RelayError::Config("dry run: no hub signer configured".into()))
    }
}

fn usage() -> ! {
    eprintln!("Usage: relayer --config <CONFIG_TOML> [--start-height H]");
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    hubrelay::init_tracing();
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = String::new();
    let mut start_height = None;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                config_path = args.get(i).cloned().unwrap_or_default();
            }
            "--start-height" => {
                i += 1;
                match args.get(i).and_then(|s| s.parse::<u64>().ok()) {
                    Some(h) => start_height = Some(h),
                    None => usage(),
                }
            }
            "--help" | "-h" => usage(),
            _ => {}
        }
        i += 1;
    }
    if config_path.is_empty() {
        usage();
    }

    let mut config = RelayConfig::from_file(&config_path)?;
    if let Some(h) = start_height {
        config.start_height = h;
    }
    let store = Arc::new(SledStore::open(&config.db_path)?);
    let source = Arc::new(JsonRpcSource::new(&config)?);
    let hub = Arc::new(HubRpc::new(&config, Arc::new(DryRunSigner))?);
    tracing::info!(db_path = %config.db_path.display(), "store opened");

    let relayer = Relayer::new(RelayContext::new(config, source, hub, store)?);
    relayer.run_until_signal().await
}
