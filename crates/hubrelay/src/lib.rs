//! Off-chain relay runtime from an EVM + Tendermint side chain to a relay hub.
//!
//! - **Tracker** ([tracker]): walks final heights in order; per height, syncs the header
//!   bundle to the hub on validator rotation ([header_sync]) and enqueues new deposit
//!   events ([scanner]).
//! - **Relay** ([relay]): proves pending transfers with a storage proof at a final height
//!   and submits them to the hub.
//! - **Checker** ([checker]): settles submitted transfers, re-queueing those that failed.
//!
//! State lives in a [RelayStore]; the loops are run by a [Relayer].

pub mod abi;
pub mod checker;
pub mod codec;
pub mod config;
pub mod cursor;
pub mod error;
pub mod finality;
pub mod header;
pub mod header_sync;
pub mod hub;
pub mod pool;
pub mod proof;
pub mod record;
pub mod relay;
pub mod relayer;
pub mod rpc;
pub mod scanner;
pub mod source;
pub mod store;
pub mod tracker;

pub use abi::{DepositEvent, MakeTxParam};
pub use checker::{check_awaiting, CheckReport};
pub use config::{RelayConfig, TimingConfig};
pub use cursor::{select_start_height, HeightCursor};
pub use error::{RelayError, Result};
pub use finality::{ConfirmationDepth, Strategy};
pub use header::{HeaderBundle, SignedHeader, TmHeader, Validator};
pub use header_sync::{sync_header, HeaderSync};
pub use hub::{HubCall, HubChain, HubRpc, HubSigner, TxState};
pub use pool::{Pick, RandomPool, RoundRobinPool};
pub use proof::{key_path, ProofOp};
pub use record::{CrossTransfer, PendingKey};
pub use relay::{relay_pending, RelayOutcome, RelayReport};
pub use relayer::{RelayContext, Relayer, RelayerHandle};
pub use scanner::{scan_height, ScanReport};
pub use source::{JsonRpcSource, SourceChain};
pub use store::{InMemoryStore, Quarantined, RelayStore, SledStore};
pub use tracker::TrackerCycle;

/// Install a `tracing` subscriber filtered by `RUST_LOG` (default `hubrelay=info`).
/// Does nothing if a global subscriber is already set.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("hubrelay=info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
