//! Node wiring: config -> store -> chain -> RPC.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::LedgerConfig;
use crate::ledger::{Blockchain, LoadOutcome};
use crate::node::service_handle::ServiceHandle;
use crate::rpc::RpcServer;
use crate::storage::FsChainStore;

/// Main Node object
pub struct Node {
    cfg: LedgerConfig,
}

impl Node {
    pub fn new(cfg: LedgerConfig) -> Self {
        Self { cfg }
    }

    /// Open (or create) the configured ledger.
    pub fn open_chain(&self) -> Result<Blockchain> {
        let store = FsChainStore::open(&self.cfg.ledger_path)
            .with_context(|| format!("opening ledger store at {}", self.cfg.ledger_path.display()))?;
        let authority = self.cfg.authority().context("loading authority key")?;
        if authority.keypair().is_none() {
            warn!("no authority private key configured, blocks will be unsigned");
        }

        let (chain, outcome) = Blockchain::open(Arc::new(store), authority)?;
        match &outcome {
            LoadOutcome::Loaded { blocks } => info!(blocks, "using existing ledger"),
            LoadOutcome::Created => info!("created new ledger"),
            LoadOutcome::Recovered { reason } => warn!(%reason, "ledger was reset to genesis"),
        }
        Ok(chain.reject_duplicate_votes(self.cfg.reject_duplicate_votes))
    }

    /// Start the RPC service and return a ServiceHandle for graceful shutdown.
    pub async fn start(self) -> Result<ServiceHandle> {
        let chain = Arc::new(self.open_chain()?);
        let addr: SocketAddr = self
            .cfg
            .rpc_addr
            .parse()
            .with_context(|| format!("invalid rpc address {}", self.cfg.rpc_addr))?;

        let (bound, handle) = RpcServer::new(addr, chain.clone()).start().await?;
        info!("Node started, RPC: {}, ledger: {}", bound, self.cfg.ledger_path.display());
        Ok(ServiceHandle::new(handle, bound, chain))
    }
}
