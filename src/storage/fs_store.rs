use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::crypto::Hash;
use crate::ledger::block::Block;
use crate::ledger::transaction::now_millis;
use crate::storage::traits::{decode_chain, decode_voters, encode_chain, ChainStore};
use crate::utils::{LedgerError, Result};

/// JSON-file chain store. Saves go to `<file>.tmp`, are flushed and synced,
/// then renamed over the live file, so readers only ever see a complete
/// chain or no file at all. The voter registry lives beside the ledger in
/// `<file>.voters.json` and is written the same way.
pub struct FsChainStore {
    path: PathBuf,
}

impl FsChainStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self { path })
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(suffix);
        self.path.with_file_name(name)
    }

    pub fn voters_path(&self) -> PathBuf {
        self.sibling(".voters.json")
    }

    fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
        match fs::read(path) {
            Ok(b) => Ok(Some(b)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LedgerError::Persistence(format!("read {}: {}", path.display(), e))),
        }
    }

    fn write_atomic(target: &Path, bytes: &[u8]) -> Result<()> {
        let mut name = target.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        let tmp = target.with_file_name(name);

        let written = write_synced(&tmp, bytes).and_then(|_| fs::rename(&tmp, target).map_err(LedgerError::from));
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(LedgerError::Persistence(format!("write {}: {}", target.display(), e)));
        }
        Ok(())
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut f = OpenOptions::new().create(true).write(true).truncate(true).open(path)?;
    f.write_all(bytes)?;
    f.flush()?;
    f.sync_all()?;
    Ok(())
}

impl ChainStore for FsChainStore {
    fn name(&self) -> String {
        "fs".into()
    }

    fn load(&self) -> Result<Option<Vec<Block>>> {
        match Self::read_optional(&self.path)? {
            Some(bytes) => decode_chain(&bytes).map(Some),
            None => Ok(None),
        }
    }

    fn save(&self, blocks: &[Block]) -> Result<()> {
        Self::write_atomic(&self.path, &encode_chain(blocks)?)?;
        debug!(path = %self.path.display(), blocks = blocks.len(), "ledger saved");
        Ok(())
    }

    fn quarantine(&self) -> Result<Option<PathBuf>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(format!(".corrupt-{}", now_millis()));
        let target = self.path.with_file_name(name);
        fs::rename(&self.path, &target)?;
        warn!(from = %self.path.display(), to = %target.display(), "moved unreadable ledger aside");
        Ok(Some(target))
    }

    fn load_voters(&self) -> Result<Vec<Hash>> {
        match Self::read_optional(&self.voters_path())? {
            Some(bytes) => decode_voters(&bytes),
            None => Ok(Vec::new()),
        }
    }

    fn save_voters(&self, voters: &[Hash]) -> Result<()> {
        let path = self.voters_path();
        Self::write_atomic(&path, &serde_json::to_vec(voters)?)?;
        debug!(path = %path.display(), voters = voters.len(), "voter registry saved");
        Ok(())
    }
}

/// Read a ledger file without creating, repairing, or locking anything.
pub fn read_ledger_file(path: impl AsRef<Path>) -> Result<Vec<Block>> {
    let bytes = fs::read(path.as_ref())?;
    decode_chain(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::block::Block;

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsChainStore::open(dir.path().join("nested/ledger.json")).unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let store = FsChainStore::open(&path).unwrap();
        let chain = vec![Block::genesis(1, None).unwrap()];
        store.save(&chain).unwrap();
        assert_eq!(store.load().unwrap().unwrap(), chain);
        assert!(!dir.path().join("ledger.json.tmp").exists());
        assert_eq!(read_ledger_file(&path).unwrap(), chain);
    }

    #[test]
    fn garbage_is_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        fs::write(&path, b"[{\"index\": 0, \"hash\": ").unwrap();
        let store = FsChainStore::open(&path).unwrap();
        assert!(matches!(store.load(), Err(LedgerError::ChainCorruption(_))));

        fs::write(&path, b"[]").unwrap();
        assert!(matches!(store.load(), Err(LedgerError::ChainCorruption(_))));
    }

    #[test]
    fn failed_save_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        // the target is a directory, so the final rename fails
        let path = dir.path().join("ledger.json");
        fs::create_dir(&path).unwrap();
        let store = FsChainStore::open(&path).unwrap();
        let res = store.save(&[Block::genesis(1, None).unwrap()]);
        assert!(matches!(res, Err(LedgerError::Persistence(_))));
        assert!(path.is_dir());
        assert!(!dir.path().join("ledger.json.tmp").exists());
    }

    #[test]
    fn quarantine_moves_file_aside() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        fs::write(&path, b"not json").unwrap();
        let store = FsChainStore::open(&path).unwrap();
        let moved = store.quarantine().unwrap().unwrap();
        assert!(!path.exists());
        assert_eq!(fs::read(moved).unwrap(), b"not json");
        assert!(store.quarantine().unwrap().is_none());
    }

    #[test]
    fn voter_registry_lives_beside_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsChainStore::open(dir.path().join("ledger.json")).unwrap();
        assert!(store.load_voters().unwrap().is_empty());

        let voters = vec![Hash([1u8; 32]), Hash([2u8; 32])];
        store.save_voters(&voters).unwrap();
        assert_eq!(store.voters_path(), dir.path().join("ledger.json.voters.json"));
        assert_eq!(store.load_voters().unwrap(), voters);
        assert!(!dir.path().join("ledger.json.voters.json.tmp").exists());

        fs::write(store.voters_path(), b"{").unwrap();
        assert!(matches!(store.load_voters(), Err(LedgerError::ChainCorruption(_))));
    }
}
