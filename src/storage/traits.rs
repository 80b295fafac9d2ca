use std::path::PathBuf;

use crate::crypto::Hash;
use crate::ledger::block::Block;
use crate::utils::Result;

/// Durable home of a serialized chain. The whole chain is rewritten on
/// every save; there is no incremental format.
pub trait ChainStore: Send + Sync + 'static {
    fn name(&self) -> String;

    /// `Ok(None)` when nothing has been stored yet.
    /// Unparseable content is `Err(ChainCorruption)`; I/O failures are
    /// `Err(Persistence)`.
    fn load(&self) -> Result<Option<Vec<Block>>>;

    /// Replace the stored chain. Either the new chain is fully written or the
    /// previous content is left in place.
    fn save(&self, blocks: &[Block]) -> Result<()>;

    /// Move unreadable content aside before it is overwritten.
    fn quarantine(&self) -> Result<Option<PathBuf>> {
        Ok(None)
    }

    /// Ids of every voter who has cast or queued a vote. Kept apart from the
    /// blocks so anonymous votes stay unlinkable. Empty when nothing is stored.
    fn load_voters(&self) -> Result<Vec<Hash>>;

    /// Replace the stored voter registry, with the same all-or-nothing
    /// guarantee as `save`.
    fn save_voters(&self, voters: &[Hash]) -> Result<()>;
}

/// Decode a stored chain; shared by every engine.
pub(crate) fn decode_chain(bytes: &[u8]) -> Result<Vec<Block>> {
    use crate::utils::LedgerError;

    let blocks: Vec<Block> = serde_json::from_slice(bytes)
        .map_err(|e| LedgerError::ChainCorruption(format!("unparseable ledger: {}", e)))?;
    if blocks.is_empty() {
        return Err(LedgerError::ChainCorruption("ledger holds no blocks".into()));
    }
    Ok(blocks)
}

pub(crate) fn encode_chain(blocks: &[Block]) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(blocks)?;
    bytes.push(b'\n');
    Ok(bytes)
}

pub(crate) fn decode_voters(bytes: &[u8]) -> Result<Vec<Hash>> {
    use crate::utils::LedgerError;

    serde_json::from_slice(bytes)
        .map_err(|e| LedgerError::ChainCorruption(format!("unparseable voter registry: {}", e)))
}
