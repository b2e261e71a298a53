//! Relay configuration.

use crate::abi::parse_address;
use crate::error::{RelayError, Result};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Relay configuration, usually loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Id of the source chain as registered on the hub.
    pub side_chain_id: u64,
    /// Blocks behind the tip before a height is processed or proven.
    #[serde(default = "default_finality_lag")]
    pub finality_lag: u64,
    /// Explicit start height; 0 means use the persisted cursor / hub epoch switch.
    #[serde(default)]
    pub start_height: u64,
    /// EVM JSON-RPC endpoints (eth_blockNumber, eth_getLogs).
    pub evm_rpc_urls: Vec<String>,
    /// Tendermint RPC endpoints (commit, validators).
    pub tendermint_rpc_urls: Vec<String>,
    /// Endpoints serving eth_getProof with Tendermint store proofs.
    pub proof_rpc_urls: Vec<String>,
    /// Cross-chain manager; emits CrossChainEvent.
    pub eccm_contract_address: String,
    /// Cross-chain data contract; holds the per-transfer proof slot.
    pub eccd_contract_address: String,
    pub hub_rpc_url: String,
    /// Hub native contract for inbound transfers and done records.
    pub hub_ccm_contract: String,
    /// Hub native contract for header sync and epoch-switch records.
    pub hub_header_sync_contract: String,
    pub db_path: PathBuf,
    #[serde(default)]
    pub timing: TimingConfig,
}

/// Poll intervals and retry backoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub poll_interval_ms: u64,
    pub retry_backoff_ms: u64,
    pub confirm_poll_interval_ms: u64,
    pub confirm_timeout_secs: u64,
    pub max_backoff_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            retry_backoff_ms: 1000,
            confirm_poll_interval_ms: 1000,
            confirm_timeout_secs: 180,
            max_backoff_ms: 10_000,
        }
    }
}

impl TimingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn confirm_poll_interval(&self) -> Duration {
        Duration::from_millis(self.confirm_poll_interval_ms)
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.confirm_timeout_secs)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

fn default_finality_lag() -> u64 {
    1
}

impl RelayConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: RelayConfig =
            toml::from_str(s).map_err(|e| RelayError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("load config {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        for (name, urls) in [
            ("evm_rpc_urls", &self.evm_rpc_urls),
            ("tendermint_rpc_urls", &self.tendermint_rpc_urls),
            ("proof_rpc_urls", &self.proof_rpc_urls),
        ] {
            if urls.is_empty() {
                return Err(RelayError::Config(format!("{name} must not be empty")));
            }
        }
        if self.hub_rpc_url.is_empty() {
            return Err(RelayError::Config("hub_rpc_url must not be empty".into()));
        }
        self.eccm_address()?;
        self.eccd_address()?;
        Ok(())
    }

    pub fn eccm_address(&self) -> Result<[u8; 20]> {
        parse_address(&self.eccm_contract_address)
            .map_err(|e| RelayError::Config(format!("eccm_contract_address: {e}")))
    }

    pub fn eccd_address(&self) -> Result<[u8; 20]> {
        parse_address(&self.eccd_contract_address)
            .map_err(|e| RelayError::Config(format!("eccd_contract_address: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
side_chain_id = 12
finality_lag = 10
evm_rpc_urls = ["http://127.0.0.1:8545"]
tendermint_rpc_urls = ["http://127.0.0.1:26657", "http://127.0.0.2:26657"]
proof_rpc_urls = ["http://127.0.0.1:8545"]
eccm_contract_address = "0x1010101010101010101010101010101010101010"
eccd_contract_address = "2020202020202020202020202020202020202020"
hub_rpc_url = "http://127.0.0.1:20336"
hub_ccm_contract = "0300000000000000000000000000000000000000"
hub_header_sync_contract = "0800000000000000000000000000000000000000"
db_path = "/tmp/hubrelay"

[timing]
confirm_timeout_secs = 30
"#;

    #[test]
    fn parses_toml_with_defaults() {
        let c = RelayConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(c.side_chain_id, 12);
        assert_eq!(c.finality_lag, 10);
        assert_eq!(c.start_height, 0);
        assert_eq!(c.tendermint_rpc_urls.len(), 2);
        assert_eq!(c.timing.confirm_timeout(), Duration::from_secs(30));
        assert_eq!(c.timing.poll_interval(), Duration::from_secs(1));
        assert_eq!(c.eccd_address().unwrap(), [0x20; 20]);
        assert_eq!(c.db_path, PathBuf::from("/tmp/hubrelay"));
    }

    #[test]
    fn file_config_opens_store_at_db_path() {
        use crate::store::{RelayStore, SledStore};

        let dir = std::env::temp_dir().join(format!("hubrelay-config-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let db_path = dir.join("db");
        let path = dir.join("relay.toml");
        let toml = SAMPLE.replace("/tmp/hubrelay", &db_path.display().to_string());
        std::fs::write(&path, toml).unwrap();

        let c = RelayConfig::from_file(&path).unwrap();
        assert_eq!(c.db_path, db_path);
        {
            let store = SledStore::open(&c.db_path).unwrap();
            store.set_height(77).unwrap();
        }
        assert_eq!(SledStore::open(&c.db_path).unwrap().height().unwrap(), 77);
        assert!(RelayConfig::from_file(dir.join("missing.toml")).is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn finality_lag_defaults_to_one() {
        let s = SAMPLE.replace("finality_lag = 10\n", "");
        assert_eq!(RelayConfig::from_toml_str(&s).unwrap().finality_lag, 1);
    }

    #[test]
    fn rejects_empty_pool_and_bad_address() {
        let empty = SAMPLE.replace(r#"proof_rpc_urls = ["http://127.0.0.1:8545"]"#, "proof_rpc_urls = []");
        assert!(matches!(
            RelayConfig::from_toml_str(&empty),
            Err(RelayError::Config(msg)) if msg.contains("proof_rpc_urls")
        ));
        let bad = SAMPLE.replace("0x1010101010101010101010101010101010101010", "0x1234");
        assert!(RelayConfig::from_toml_str(&bad).is_err());
    }

    #[test]
    fn timing_default() {
        let t = TimingConfig::default();
        assert_eq!(t.retry_backoff(), Duration::from_secs(1));
        assert_eq!(t.confirm_timeout(), Duration::from_secs(180));
        assert_eq!(t.max_backoff(), Duration::from_secs(10));
    }
}
