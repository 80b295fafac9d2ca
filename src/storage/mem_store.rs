use parking_lot::Mutex;

use crate::crypto::Hash;
use crate::ledger::block::Block;
use crate::storage::traits::{decode_chain, encode_chain, ChainStore};
use crate::utils::Result;

/// In-memory chain store (good for tests/dev). Keeps the serialized bytes so
/// loads go through the same decoding as the file store.
#[derive(Default)]
pub struct InMemChainStore {
    bytes: Mutex<Option<Vec<u8>>>,
    voters: Mutex<Vec<Hash>>,
}

impl InMemChainStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with raw content, e.g. a damaged ledger.
    pub fn with_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes: Mutex::new(Some(bytes)), ..Self::default() }
    }

    pub fn raw(&self) -> Option<Vec<u8>> {
        self.bytes.lock().clone()
    }
}

impl ChainStore for InMemChainStore {
    fn name(&self) -> String {
        "inmem".into()
    }

    fn load(&self) -> Result<Option<Vec<Block>>> {
        match self.bytes.lock().as_deref() {
            Some(b) => decode_chain(b).map(Some),
            None => Ok(None),
        }
    }

    fn save(&self, blocks: &[Block]) -> Result<()> {
        let encoded = encode_chain(blocks)?;
        *self.bytes.lock() = Some(encoded);
        Ok(())
    }

    fn load_voters(&self) -> Result<Vec<Hash>> {
        Ok(self.voters.lock().clone())
    }

    fn save_voters(&self, voters: &[Hash]) -> Result<()> {
        *self.voters.lock() = voters.to_vec();
        Ok(())
    }
}
