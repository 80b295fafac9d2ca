//! The vote ledger: an ordered, hash-linked list of blocks plus a buffer of
//! transactions waiting to be mined.
//!
//! All mutation goes through one mutex, held across linking, hashing,
//! signing and persisting, so two concurrent votes can never both link to
//! the same tail. A mutation is committed in memory only after the store
//! accepted the new chain; on any failure the chain is left as it was.
//!
//! Double voting is refused per voter, not per sender: every vote cast or
//! queued records the voter's id in a registry kept beside the blocks. The
//! blocks themselves only carry the sender, so an anonymous vote stays
//! unlinkable while its voter still cannot vote again.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Serialize, Deserialize};
use tracing::{debug, error, info, warn};

use crate::crypto::{Hash, Keypair, PublicKey};
use crate::ledger::block::{Block, BlockData, BlockHeader};
use crate::crypto::voter_id;
use crate::ledger::transaction::{now_millis, Transaction, VoteRequest};
use crate::ledger::validation::{validate_blocks, ValidationReport};
use crate::storage::{ChainStore, InMemChainStore};
use crate::utils::metrics::{
    BLOCKS_APPENDED, BLOCKS_MINED, CHAIN_RESETS, PERSIST_FAILURES, TRANSACTIONS_QUEUED, VALIDATION_FAILURES,
};
use crate::utils::{LedgerError, Result, METRICS};

/// Who, if anyone, signs new blocks.
#[derive(Debug, Clone)]
pub enum Authority {
    Unsigned,
    Signing(Keypair),
}

impl Authority {
    pub fn keypair(&self) -> Option<&Keypair> {
        match self {
            Authority::Signing(kp) => Some(kp),
            Authority::Unsigned => None,
        }
    }

    pub fn public_key(&self) -> Option<&PublicKey> {
        self.keypair().map(|kp| kp.public())
    }
}

/// How `Blockchain::open` obtained its chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { blocks: usize },
    /// nothing stored yet; fresh genesis written
    Created,
    /// stored chain was unreadable or failed validation; fresh genesis written
    Recovered { reason: String },
}

/// Confirmation handed back for a recorded vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub block_index: u64,
    pub block_hash: Hash,
    /// the sender as written to the ledger (voter hash or fingerprint)
    pub sender: String,
    /// fingerprint nonce, hex; only for anonymous votes
    pub nonce: Option<String>,
}

impl VoteReceipt {
    fn new(block: &Block, sender: String, nonce: Option<[u8; 32]>) -> Self {
        Self {
            block_index: block.index(),
            block_hash: *block.hash(),
            sender,
            nonce: nonce.map(hex::encode),
        }
    }
}

struct ChainState {
    blocks: Vec<Block>,
    pending: Vec<Transaction>,
    voters: BTreeSet<Hash>,
}

impl ChainState {
    fn last(&self) -> &Block {
        // genesis is always present
        &self.blocks[self.blocks.len() - 1]
    }

    fn contains_sender(&self, sender: &str) -> bool {
        self.pending.iter().any(|tx| tx.sender == sender)
            || self.blocks.iter().any(|b| b.transactions().iter().any(|tx| tx.sender == sender))
    }

    // Plain votes name the voter id as sender, so ledgers written before the
    // registry existed are still covered.
    fn contains_voter(&self, voter: &Hash) -> bool {
        self.voters.contains(voter) || self.contains_sender(&voter.to_hex())
    }

    fn voter_list(&self) -> Vec<Hash> {
        self.voters.iter().copied().collect()
    }
}

pub struct Blockchain {
    state: Mutex<ChainState>,
    authority: Authority,
    store: Arc<dyn ChainStore>,
    reject_duplicate_votes: bool,
}

impl Blockchain {
    /// Load the chain from `store`, or start a fresh one.
    ///
    /// Missing content creates genesis. Unparseable or tampered content is
    /// moved aside (where the engine supports it) and replaced by genesis.
    /// A sound chain signed by a different authority is refused with
    /// `InvalidKeyFormat` rather than wiped.
    pub fn open(store: Arc<dyn ChainStore>, authority: Authority) -> Result<(Self, LoadOutcome)> {
        let loaded = match store.load() {
            Ok(found) => found.map(Ok),
            Err(LedgerError::ChainCorruption(reason)) => Some(Err(reason)),
            Err(e) => return Err(e),
        };

        let (blocks, outcome) = match loaded {
            None => {
                info!(store = %store.name(), "no ledger found, creating genesis");
                (vec![Block::genesis(now_millis(), authority.keypair())?], LoadOutcome::Created)
            }
            Some(Ok(blocks)) => {
                let report = validate_blocks(&blocks, authority.public_key(), false);
                if report.is_valid() {
                    info!(blocks = blocks.len(), "ledger loaded");
                    let n = blocks.len();
                    (blocks, LoadOutcome::Loaded { blocks: n })
                } else if report.only_authority_mismatches() {
                    return Err(LedgerError::InvalidKeyFormat(format!(
                        "stored ledger is not signed by the configured authority ({})",
                        report.violations[0]
                    )));
                } else {
                    for v in &report.violations {
                        warn!(violation = %v, "stored ledger failed validation");
                    }
                    METRICS.inc_counter(VALIDATION_FAILURES);
                    let reason = format!("stored ledger failed validation: {}", report.violations[0]);
                    Self::recover(store.as_ref(), &authority, reason)?
                }
            }
            Some(Err(reason)) => {
                warn!(%reason, "stored ledger is unreadable");
                Self::recover(store.as_ref(), &authority, reason)?
            }
        };

        let voters: BTreeSet<Hash> = if matches!(outcome, LoadOutcome::Loaded { .. }) {
            store.load_voters()?.into_iter().collect()
        } else {
            store.save(&blocks)?;
            store.save_voters(&[])?;
            BTreeSet::new()
        };

        let chain = Self {
            state: Mutex::new(ChainState { blocks, pending: Vec::new(), voters }),
            authority,
            store,
            reject_duplicate_votes: true,
        };
        Ok((chain, outcome))
    }

    fn recover(store: &dyn ChainStore, authority: &Authority, reason: String) -> Result<(Vec<Block>, LoadOutcome)> {
        if let Some(moved) = store.quarantine()? {
            warn!(path = %moved.display(), "previous ledger preserved for inspection");
        }
        warn!("resetting ledger to a fresh genesis block");
        let genesis = Block::genesis(now_millis(), authority.keypair())?;
        Ok((vec![genesis], LoadOutcome::Recovered { reason }))
    }

    /// Ephemeral chain backed by an in-memory store.
    pub fn in_memory(authority: Authority) -> Result<Self> {
        let (chain, _) = Self::open(Arc::new(InMemChainStore::new()), authority)?;
        Ok(chain)
    }

    /// Toggle refusal of a second transaction from the same sender.
    pub fn reject_duplicate_votes(mut self, on: bool) -> Self {
        self.reject_duplicate_votes = on;
        self
    }

    pub fn authority_public_key(&self) -> Option<&PublicKey> {
        self.authority.public_key()
    }

    // Seal a block on top of the current tail and commit it once stored.
    fn commit_block(&self, state: &mut ChainState, data: BlockData) -> Result<Block> {
        let last = state.last();
        let header = BlockHeader::new(last.index() + 1, now_millis(), *last.hash(), data);
        let block = Block::seal(header, self.authority.keypair())?;

        state.blocks.push(block.clone());
        if let Err(e) = self.store.save(&state.blocks) {
            state.blocks.pop();
            METRICS.inc_counter(PERSIST_FAILURES);
            error!(error = %e, index = block.index(), "could not persist ledger, block discarded");
            return Err(e);
        }
        Ok(block)
    }

    fn check_duplicate(&self, state: &ChainState, sender: &str) -> Result<()> {
        if self.reject_duplicate_votes && state.contains_sender(sender) {
            return Err(LedgerError::DuplicateVote(sender.to_string()));
        }
        Ok(())
    }

    fn check_voter(&self, state: &ChainState, voter: &Hash) -> Result<()> {
        if self.reject_duplicate_votes && state.contains_voter(voter) {
            return Err(LedgerError::DuplicateVote(format!("voter {} has already voted", voter)));
        }
        Ok(())
    }

    // Written before the vote lands: a crash in between can lock a voter out
    // but never lets one vote twice. `Ok(true)` when newly added.
    fn register_voter(&self, state: &mut ChainState, voter: Hash) -> Result<bool> {
        if !state.voters.insert(voter) {
            return Ok(false);
        }
        if let Err(e) = self.store.save_voters(&state.voter_list()) {
            state.voters.remove(&voter);
            METRICS.inc_counter(PERSIST_FAILURES);
            error!(error = %e, "could not persist voter registry");
            return Err(e);
        }
        Ok(true)
    }

    fn unregister_voter(&self, state: &mut ChainState, voter: &Hash) {
        state.voters.remove(voter);
        if let Err(e) = self.store.save_voters(&state.voter_list()) {
            METRICS.inc_counter(PERSIST_FAILURES);
            warn!(error = %e, "could not roll back voter registry");
        }
    }

    fn append_locked(&self, state: &mut ChainState, data: BlockData) -> Result<Block> {
        if let BlockData::Transactions(txs) = &data {
            let mut seen = HashSet::new();
            for tx in txs {
                self.check_duplicate(state, &tx.sender)?;
                if self.reject_duplicate_votes && !seen.insert(tx.sender.as_str()) {
                    return Err(LedgerError::DuplicateVote(tx.sender.clone()));
                }
            }
        }
        let block = self.commit_block(state, data)?;
        METRICS.inc_counter(BLOCKS_APPENDED);
        info!(index = block.index(), hash = %block.hash(), "block appended");
        Ok(block)
    }

    fn enqueue_locked(&self, state: &mut ChainState, tx: Transaction) -> Result<usize> {
        self.check_duplicate(state, &tx.sender)?;
        state.pending.push(tx);
        METRICS.inc_counter(TRANSACTIONS_QUEUED);
        debug!(pending = state.pending.len(), "transaction queued");
        Ok(state.pending.len())
    }

    /// Append a new block holding `data` directly, bypassing the pending buffer.
    /// A sender may appear at most once, on the chain or within the batch.
    pub fn append(&self, data: impl Into<BlockData>) -> Result<Block> {
        let mut state = self.state.lock();
        self.append_locked(&mut state, data.into())
    }

    /// Record a vote in its own block.
    pub fn cast_vote(&self, request: VoteRequest) -> Result<VoteReceipt> {
        let voter = request.voter_id();
        let (tx, nonce) = request.into_transaction();
        let sender = tx.sender.clone();

        let mut state = self.state.lock();
        self.check_voter(&state, &voter)?;
        let added = self.register_voter(&mut state, voter)?;
        match self.append_locked(&mut state, tx.into()) {
            Ok(block) => Ok(VoteReceipt::new(&block, sender, nonce)),
            Err(e) => {
                if added {
                    self.unregister_voter(&mut state, &voter);
                }
                Err(e)
            }
        }
    }

    /// Buffer a transaction for the next `mine`. Returns the buffer length.
    pub fn queue_transaction(&self, tx: Transaction) -> Result<usize> {
        let mut state = self.state.lock();
        self.enqueue_locked(&mut state, tx)
    }

    /// Buffer a vote. Returns the sender as recorded and, for anonymous
    /// votes, the fingerprint nonce.
    pub fn queue_vote(&self, request: VoteRequest) -> Result<(String, Option<[u8; 32]>)> {
        let voter = request.voter_id();
        let (tx, nonce) = request.into_transaction();
        let sender = tx.sender.clone();

        let mut state = self.state.lock();
        self.check_voter(&state, &voter)?;
        self.check_duplicate(&state, &sender)?;
        let added = self.register_voter(&mut state, voter)?;
        if let Err(e) = self.enqueue_locked(&mut state, tx) {
            if added {
                self.unregister_voter(&mut state, &voter);
            }
            return Err(e);
        }
        Ok((sender, nonce))
    }

    /// Drain every pending transaction into exactly one new block.
    ///
    /// With nothing pending no block is created and `Ok(None)` is returned.
    /// On failure the pending buffer is kept intact.
    pub fn mine(&self) -> Result<Option<Block>> {
        let mut state = self.state.lock();
        if state.pending.is_empty() {
            debug!("mine requested with an empty buffer");
            return Ok(None);
        }
        let txs = state.pending.clone();
        let count = txs.len();
        let block = self.commit_block(&mut state, BlockData::Transactions(txs))?;
        state.pending.clear();
        METRICS.inc_counter(BLOCKS_MINED);
        info!(index = block.index(), transactions = count, hash = %block.hash(), "block mined");
        Ok(Some(block))
    }

    /// Fail-fast validity check.
    pub fn is_valid(&self) -> bool {
        let state = self.state.lock();
        let report = validate_blocks(&state.blocks, self.authority.public_key(), true);
        if !report.is_valid() {
            METRICS.inc_counter(VALIDATION_FAILURES);
            warn!(violation = %report.violations[0], "ledger failed validation");
        }
        report.is_valid()
    }

    /// Full audit listing every violation.
    pub fn validate(&self) -> ValidationReport {
        let state = self.state.lock();
        let report = validate_blocks(&state.blocks, self.authority.public_key(), false);
        if !report.is_valid() {
            METRICS.inc_counter(VALIDATION_FAILURES);
            for v in &report.violations {
                warn!(violation = %v, "ledger failed validation");
            }
        }
        report
    }

    /// Write the current chain to the store.
    pub fn persist(&self) -> Result<()> {
        let state = self.state.lock();
        self.store.save(&state.blocks).map_err(|e| {
            METRICS.inc_counter(PERSIST_FAILURES);
            error!(error = %e, "could not persist ledger");
            e
        })
    }

    /// Drop every block, pending transaction and registered voter, start over
    /// from genesis.
    pub fn reset(&self) -> Result<Block> {
        let mut state = self.state.lock();
        let genesis = Block::genesis(now_millis(), self.authority.keypair())?;
        let fresh = vec![genesis.clone()];
        self.store.save(&fresh)?;
        state.blocks = fresh;
        state.pending.clear();
        state.voters.clear();
        self.store.save_voters(&[])?;
        METRICS.inc_counter(CHAIN_RESETS);
        warn!("ledger reset to genesis");
        Ok(genesis)
    }

    /// Snapshot of every block, oldest first.
    pub fn blocks(&self) -> Vec<Block> {
        self.state.lock().blocks.clone()
    }

    pub fn get(&self, index: u64) -> Option<Block> {
        let state = self.state.lock();
        usize::try_from(index).ok().and_then(|i| state.blocks.get(i).cloned())
    }

    pub fn last(&self) -> Block {
        self.state.lock().last().clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().blocks.len()
    }

    /// Never true: genesis is always present.
    pub fn is_empty(&self) -> bool {
        self.state.lock().blocks.is_empty()
    }

    pub fn pending(&self) -> Vec<Transaction> {
        self.state.lock().pending.clone()
    }

    /// Whether the voter behind `identifier` has cast or queued a vote,
    /// anonymously or not.
    pub fn has_voted(&self, identifier: &str) -> bool {
        self.state.lock().contains_voter(&voter_id(identifier))
    }

    /// Mined/appended votes per candidate. Pending votes are not counted.
    pub fn tally(&self) -> BTreeMap<String, u64> {
        let state = self.state.lock();
        let mut totals = BTreeMap::new();
        for tx in state.blocks.iter().flat_map(|b| b.transactions()) {
            *totals.entry(tx.recipient.clone()).or_insert(0) += 1;
        }
        totals
    }
}
