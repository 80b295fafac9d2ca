//! Ledger entries.
//!
//! A block's `hash` covers every header field (index, timestamp,
//! previous_hash, payload or transactions, proof, authority_public_key) in
//! canonical form. The signature, when present, is over that hash and is
//! itself excluded from it.

use serde::{Serialize, Deserialize};

use crate::crypto::{hash_record, Hash, Keypair, PublicKey, Signature, Signer, Verifier};
use crate::ledger::transaction::Transaction;
use crate::utils::{LedgerError, Result};

/// Literal payload of every genesis block.
pub const GENESIS_MARKER: &str = "Genesis Block";

/// What a block carries. Serialized as a `payload` or `transactions` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockData {
    Payload(String),
    Transactions(Vec<Transaction>),
}

impl From<String> for BlockData {
    fn from(s: String) -> Self {
        BlockData::Payload(s)
    }
}

impl From<&str> for BlockData {
    fn from(s: &str) -> Self {
        BlockData::Payload(s.to_string())
    }
}

impl From<Transaction> for BlockData {
    fn from(tx: Transaction) -> Self {
        BlockData::Transactions(vec![tx])
    }
}

impl From<Vec<Transaction>> for BlockData {
    fn from(txs: Vec<Transaction>) -> Self {
        BlockData::Transactions(txs)
    }
}

/// Every hashed field of a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub index: u64,
    pub timestamp: u64,
    pub previous_hash: Hash,
    #[serde(flatten)]
    pub data: BlockData,
    pub authority_public_key: Option<PublicKey>,
    pub proof: Option<u64>,
}

impl BlockHeader {
    pub fn new(index: u64, timestamp: u64, previous_hash: Hash, data: impl Into<BlockData>) -> Self {
        Self {
            index,
            timestamp,
            previous_hash,
            data: data.into(),
            authority_public_key: None,
            proof: None,
        }
    }

    pub fn compute_hash(&self) -> Result<Hash> {
        hash_record(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BlockRecord", into = "BlockRecord")]
pub enum Block {
    Unsigned { header: BlockHeader, hash: Hash },
    Signed { header: BlockHeader, hash: Hash, signature: Signature },
}

impl Block {
    /// Hash the header and, given an authority, stamp its public key and sign.
    pub fn seal(mut header: BlockHeader, authority: Option<&Keypair>) -> Result<Block> {
        match authority {
            Some(kp) => {
                header.authority_public_key = Some(kp.public().clone());
                let hash = header.compute_hash()?;
                let signature = kp.sign(hash.as_bytes())?;
                Ok(Block::Signed { header, hash, signature })
            }
            None => {
                let hash = header.compute_hash()?;
                Ok(Block::Unsigned { header, hash })
            }
        }
    }

    pub fn genesis(timestamp: u64, authority: Option<&Keypair>) -> Result<Block> {
        let header = BlockHeader::new(0, timestamp, Hash::zero(), GENESIS_MARKER);
        Block::seal(header, authority)
    }

    pub fn header(&self) -> &BlockHeader {
        match self {
            Block::Unsigned { header, .. } | Block::Signed { header, .. } => header,
        }
    }

    /// Stored hash.
    pub fn hash(&self) -> &Hash {
        match self {
            Block::Unsigned { hash, .. } | Block::Signed { hash, .. } => hash,
        }
    }

    pub fn signature(&self) -> Option<&Signature> {
        match self {
            Block::Signed { signature, .. } => Some(signature),
            Block::Unsigned { .. } => None,
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, Block::Signed { .. })
    }

    pub fn index(&self) -> u64 {
        self.header().index
    }

    pub fn timestamp(&self) -> u64 {
        self.header().timestamp
    }

    pub fn previous_hash(&self) -> &Hash {
        &self.header().previous_hash
    }

    pub fn data(&self) -> &BlockData {
        &self.header().data
    }

    pub fn authority_public_key(&self) -> Option<&PublicKey> {
        self.header().authority_public_key.as_ref()
    }

    /// Transactions carried by the block; empty for payload blocks.
    pub fn transactions(&self) -> &[Transaction] {
        match self.data() {
            BlockData::Transactions(txs) => txs,
            BlockData::Payload(_) => &[],
        }
    }

    pub fn recompute_hash(&self) -> Result<Hash> {
        self.header().compute_hash()
    }

    /// Check the stored signature against a hash recomputed from the current
    /// fields, so a tampered payload fails even if the stored hash was kept.
    /// Unsigned blocks have nothing to verify and return `false`.
    pub fn verify_signature(&self) -> bool {
        let Block::Signed { header, signature, .. } = self else {
            return false;
        };
        let Some(pk) = header.authority_public_key.as_ref() else {
            return false;
        };
        match header.compute_hash() {
            Ok(fresh) => pk.verify(fresh.as_bytes(), signature),
            Err(_) => false,
        }
    }
}

/// Flat persisted form of a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub index: u64,
    pub timestamp: u64,
    pub previous_hash: Hash,
    #[serde(flatten)]
    pub data: BlockData,
    pub authority_public_key: Option<PublicKey>,
    pub signature: Option<Signature>,
    pub hash: Hash,
    pub proof: Option<u64>,
}

impl From<Block> for BlockRecord {
    fn from(block: Block) -> Self {
        let (header, hash, signature) = match block {
            Block::Unsigned { header, hash } => (header, hash, None),
            Block::Signed { header, hash, signature } => (header, hash, Some(signature)),
        };
        BlockRecord {
            index: header.index,
            timestamp: header.timestamp,
            previous_hash: header.previous_hash,
            data: header.data,
            authority_public_key: header.authority_public_key,
            signature,
            hash,
            proof: header.proof,
        }
    }
}

impl TryFrom<BlockRecord> for Block {
    type Error = LedgerError;

    fn try_from(r: BlockRecord) -> Result<Block> {
        let header = BlockHeader {
            index: r.index,
            timestamp: r.timestamp,
            previous_hash: r.previous_hash,
            data: r.data,
            authority_public_key: r.authority_public_key,
            proof: r.proof,
        };
        match r.signature {
            Some(signature) => {
                if header.authority_public_key.is_none() {
                    return Err(LedgerError::Encoding(format!(
                        "block {} carries a signature but no authority_public_key",
                        header.index
                    )));
                }
                Ok(Block::Signed { header, hash: r.hash, signature })
            }
            None => Ok(Block::Unsigned { header, hash: r.hash }),
        }
    }
}
