use std::net::SocketAddr;
use std::sync::Arc;

use jsonrpsee::server::{Server, ServerHandle};
use tracing::info;

use crate::ledger::Blockchain;
use crate::rpc::handlers::{LedgerApiServer, LedgerRpc};

/// JSON-RPC 2.0 over HTTP in front of one chain.
pub struct RpcServer {
    addr: SocketAddr,
    chain: Arc<Blockchain>,
}

impl RpcServer {
    pub fn new(addr: SocketAddr, chain: Arc<Blockchain>) -> Self {
        Self { addr, chain }
    }

    /// Bind and start serving. Returns the bound address (useful with port 0)
    /// and the handle used to stop the server.
    pub async fn start(self) -> anyhow::Result<(SocketAddr, ServerHandle)> {
        let server = Server::builder().build(self.addr).await?;
        let local = server.local_addr()?;
        let handle = server.start(LedgerRpc::new(self.chain).into_rpc());
        info!("Starting RPC server on {}", local);
        Ok((local, handle))
    }
}
