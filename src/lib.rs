//! Votechain: an append-only, tamper-evident vote ledger.
//!
//! Blocks are hash-linked over a canonical encoding and, when an authority
//! key is configured, signed with ECDSA/secp256k1. The chain is persisted as
//! a JSON file after every mutation and can be audited at any time.

pub mod utils;
pub mod crypto;
pub mod ledger;
pub mod storage;
pub mod config;
pub mod rpc;
pub mod node;

#[cfg(test)]
mod tests;

pub use config::LedgerConfig;
pub use ledger::{Authority, Block, Blockchain, Transaction, VoteRequest};
pub use utils::{LedgerError, Result};
