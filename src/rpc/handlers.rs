use std::collections::BTreeMap;
use std::sync::Arc;

use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::types::ErrorObjectOwned;
use serde::{Serialize, Deserialize};

use crate::crypto::PublicKey;
use crate::ledger::{Block, Blockchain, Transaction, ValidationReport, VoteReceipt, VoteRequest};
use crate::utils::{LedgerError, METRICS};

/// Answer to a queued vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedVote {
    pub sender: String,
    pub pending: usize,
    pub nonce: Option<String>,
}

/// JSON-RPC surface handed to the UI/CRUD layer. Methods are exposed as
/// `ledger_<name>`.
#[rpc(server, client, namespace = "ledger")]
pub trait LedgerApi {
    /// Record a vote in its own block.
    #[method(name = "castVote")]
    fn cast_vote(&self, request: VoteRequest) -> RpcResult<VoteReceipt>;

    /// Buffer a vote until the next `mine`.
    #[method(name = "queueVote")]
    fn queue_vote(&self, request: VoteRequest) -> RpcResult<QueuedVote>;

    /// `null` when nothing was pending.
    #[method(name = "mine")]
    fn mine(&self) -> RpcResult<Option<Block>>;

    #[method(name = "blocks")]
    fn blocks(&self) -> RpcResult<Vec<Block>>;

    #[method(name = "block")]
    fn block(&self, index: u64) -> RpcResult<Option<Block>>;

    #[method(name = "pending")]
    fn pending(&self) -> RpcResult<Vec<Transaction>>;

    #[method(name = "isValid")]
    fn is_valid(&self) -> RpcResult<bool>;

    #[method(name = "validate")]
    fn validate(&self) -> RpcResult<ValidationReport>;

    #[method(name = "tally")]
    fn tally(&self) -> RpcResult<BTreeMap<String, u64>>;

    /// Whether this voter has already voted, anonymously or not.
    #[method(name = "hasVoted")]
    fn has_voted(&self, voter: String) -> RpcResult<bool>;

    /// Public verification key, if the ledger is signed.
    #[method(name = "authority")]
    fn authority(&self) -> RpcResult<Option<PublicKey>>;

    #[method(name = "metrics")]
    fn metrics(&self) -> RpcResult<BTreeMap<String, u64>>;
}

pub const DUPLICATE_VOTE_CODE: i32 = -32010;
pub const INVALID_KEY_CODE: i32 = -32011;
pub const SIGNATURE_FAILURE_CODE: i32 = -32012;
pub const CHAIN_CORRUPTION_CODE: i32 = -32013;
pub const PERSISTENCE_CODE: i32 = -32014;
pub const ENCODING_CODE: i32 = -32015;

fn rpc_error(e: LedgerError) -> ErrorObjectOwned {
    let code = match &e {
        LedgerError::DuplicateVote(_) => DUPLICATE_VOTE_CODE,
        LedgerError::InvalidKeyFormat(_) => INVALID_KEY_CODE,
        LedgerError::SignatureFailure(_) => SIGNATURE_FAILURE_CODE,
        LedgerError::ChainCorruption(_) => CHAIN_CORRUPTION_CODE,
        LedgerError::Persistence(_) => PERSISTENCE_CODE,
        LedgerError::Encoding(_) => ENCODING_CODE,
    };
    ErrorObjectOwned::owned(code, e.to_string(), None::<()>)
}

/// Binds the RPC methods to a shared chain.
#[derive(Clone)]
pub struct LedgerRpc {
    chain: Arc<Blockchain>,
}

impl LedgerRpc {
    pub fn new(chain: Arc<Blockchain>) -> Self {
        Self { chain }
    }
}

impl LedgerApiServer for LedgerRpc {
    fn cast_vote(&self, request: VoteRequest) -> RpcResult<VoteReceipt> {
        self.chain.cast_vote(request).map_err(rpc_error)
    }

    fn queue_vote(&self, request: VoteRequest) -> RpcResult<QueuedVote> {
        let (sender, nonce) = self.chain.queue_vote(request).map_err(rpc_error)?;
        Ok(QueuedVote {
            sender,
            pending: self.chain.pending().len(),
            nonce: nonce.map(hex::encode),
        })
    }

    fn mine(&self) -> RpcResult<Option<Block>> {
        self.chain.mine().map_err(rpc_error)
    }

    fn blocks(&self) -> RpcResult<Vec<Block>> {
        Ok(self.chain.blocks())
    }

    fn block(&self, index: u64) -> RpcResult<Option<Block>> {
        Ok(self.chain.get(index))
    }

    fn pending(&self) -> RpcResult<Vec<Transaction>> {
        Ok(self.chain.pending())
    }

    fn is_valid(&self) -> RpcResult<bool> {
        Ok(self.chain.is_valid())
    }

    fn validate(&self) -> RpcResult<ValidationReport> {
        Ok(self.chain.validate())
    }

    fn tally(&self) -> RpcResult<BTreeMap<String, u64>> {
        Ok(self.chain.tally())
    }

    fn has_voted(&self, voter: String) -> RpcResult<bool> {
        Ok(self.chain.has_voted(&voter))
    }

    fn authority(&self) -> RpcResult<Option<PublicKey>> {
        Ok(self.chain.authority_public_key().cloned())
    }

    fn metrics(&self) -> RpcResult<BTreeMap<String, u64>> {
        Ok(METRICS.snapshot())
    }
}
