use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use jsonrpsee::server::ServerHandle;
use tracing::{error, info};

use crate::ledger::Blockchain;

/// Running RPC service plus the chain it serves.
/// Call `shutdown()` to stop the server and flush the ledger.
pub struct ServiceHandle {
    rpc: ServerHandle,
    rpc_addr: SocketAddr,
    chain: Arc<Blockchain>,
}

impl ServiceHandle {
    pub fn new(rpc: ServerHandle, rpc_addr: SocketAddr, chain: Arc<Blockchain>) -> Self {
        Self { rpc, rpc_addr, chain }
    }

    pub fn rpc_addr(&self) -> SocketAddr {
        self.rpc_addr
    }

    pub fn chain(&self) -> &Arc<Blockchain> {
        &self.chain
    }

    /// Stop accepting requests, wait for in-flight ones, mine whatever is
    /// still pending, then persist.
    pub async fn shutdown(self) -> Result<()> {
        // already stopped is fine
        let _ = self.rpc.stop();
        self.rpc.stopped().await;

        let pending = self.chain.pending().len();
        match self.chain.mine() {
            Ok(Some(block)) => info!(index = block.index(), transactions = pending, "pending votes mined at shutdown"),
            Ok(None) => {}
            Err(e) => {
                error!(error = %e, discarded = pending, "could not mine pending votes at shutdown");
                return Err(e.into());
            }
        }
        self.chain.persist()?;
        info!("ledger service stopped");
        Ok(())
    }
}
