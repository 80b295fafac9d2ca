//! RPC module
//!
//! - JSON-RPC 2.0 endpoint (jsonrpsee, HTTP) with `ledger_*` methods
//! - Exposes the block list, validity report, tally, and vote receipts
//!
//! To integrate: wrap a `Blockchain` in an `Arc` and pass it to `RpcServer::new()`.

pub mod server;
pub mod handlers;

pub use server::RpcServer;
pub use handlers::{LedgerApiServer, LedgerApiClient, LedgerRpc, QueuedVote};
