//! Integration tests: a file-backed chain across restarts.

use std::fs;
use std::sync::Arc;
use std::thread;

use crate::crypto::{voter_id, Keypair};
use crate::ledger::{Authority, Blockchain, LoadOutcome, Transaction, VoteRequest};
use crate::storage::{ChainStore, FsChainStore, InMemChainStore};
use crate::utils::LedgerError;

fn file_chain(path: &std::path::Path, authority: Authority) -> (Blockchain, LoadOutcome) {
    let store = Arc::new(FsChainStore::open(path).unwrap());
    Blockchain::open(store, authority).unwrap()
}

#[test]
fn persisted_chain_reloads_identically() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.json");
    let kp = Keypair::generate();

    let (chain, outcome) = file_chain(&path, Authority::Signing(kp.clone()));
    assert_eq!(outcome, LoadOutcome::Created);
    chain.append("A").unwrap();
    chain.cast_vote(VoteRequest::new("alice", "bob").with_message("hello")).unwrap();
    chain.queue_transaction(Transaction::new("v1", "carol", None)).unwrap();
    chain.queue_transaction(Transaction::new("v2", "bob", None)).unwrap();
    chain.mine().unwrap();
    let before = chain.blocks();
    drop(chain);

    let (reloaded, outcome) = file_chain(&path, Authority::Signing(kp));
    assert_eq!(outcome, LoadOutcome::Loaded { blocks: 4 });
    assert_eq!(reloaded.blocks(), before);
    assert!(reloaded.is_valid());
    assert_eq!(reloaded.tally().get("bob"), Some(&2));
}

#[test]
fn ledger_file_holds_no_private_key() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.json");
    let kp = Keypair::generate();
    let (chain, _) = file_chain(&path, Authority::Signing(kp.clone()));
    chain.append("A").unwrap();

    let text = fs::read_to_string(&path).unwrap();
    assert!(!text.contains(&kp.secret().to_hex()));
    assert!(text.contains(&kp.public().to_hex()));
}

#[test]
fn truncated_file_recovers_to_genesis() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.json");
    let (chain, _) = file_chain(&path, Authority::Unsigned);
    chain.append("A").unwrap();
    chain.append("B").unwrap();
    drop(chain);

    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

    let (chain, outcome) = file_chain(&path, Authority::Unsigned);
    assert!(matches!(outcome, LoadOutcome::Recovered { .. }));
    assert_eq!(chain.len(), 1);
    assert!(chain.is_valid());
    // the damaged file was kept aside and a sound one written in its place
    let kept = fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().contains(".corrupt-"))
        .count();
    assert_eq!(kept, 1);
    assert_eq!(crate::storage::read_ledger_file(&path).unwrap().len(), 1);
}

#[test]
fn tampered_file_recovers_to_genesis() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.json");
    let (chain, _) = file_chain(&path, Authority::Unsigned);
    chain.cast_vote(VoteRequest::new("alice", "bob")).unwrap();
    drop(chain);

    let text = fs::read_to_string(&path).unwrap();
    fs::write(&path, text.replace("\"bob\"", "\"mallory\"")).unwrap();

    let (chain, outcome) = file_chain(&path, Authority::Unsigned);
    match outcome {
        LoadOutcome::Recovered { reason } => assert!(reason.contains("hash")),
        other => panic!("expected recovery, got {:?}", other),
    }
    assert!(chain.tally().is_empty());
}

#[test]
fn foreign_authority_ledger_is_refused_not_wiped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.json");
    let (chain, _) = file_chain(&path, Authority::Signing(Keypair::generate()));
    chain.append("A").unwrap();
    drop(chain);
    let original = fs::read(&path).unwrap();

    let store = Arc::new(FsChainStore::open(&path).unwrap());
    let res = Blockchain::open(store, Authority::Signing(Keypair::generate()));
    assert!(matches!(res, Err(LedgerError::InvalidKeyFormat(_))));
    assert_eq!(fs::read(&path).unwrap(), original);
}

#[test]
fn failed_persist_leaves_chain_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.json");
    let (chain, _) = file_chain(&path, Authority::Unsigned);
    chain.append("A").unwrap();
    chain.queue_transaction(Transaction::new("v", "c", None)).unwrap();

    // swap the live file for a directory so the atomic rename fails
    fs::remove_file(&path).unwrap();
    fs::create_dir(&path).unwrap();

    assert!(matches!(chain.append("B"), Err(LedgerError::Persistence(_))));
    assert!(matches!(chain.mine(), Err(LedgerError::Persistence(_))));
    assert_eq!(chain.len(), 2);
    assert_eq!(chain.pending().len(), 1);
    assert!(chain.is_valid());

    // once storage is back the same chain carries on
    fs::remove_dir(&path).unwrap();
    let mined = chain.mine().unwrap().unwrap();
    assert_eq!(mined.index(), 2);
    assert_eq!(crate::storage::read_ledger_file(&path).unwrap().len(), 3);
}

#[test]
fn concurrent_votes_never_fork() {
    let kp = Keypair::generate();
    let chain = Arc::new(Blockchain::in_memory(Authority::Signing(kp)).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let chain = chain.clone();
            thread::spawn(move || {
                for i in 0..10 {
                    chain.cast_vote(VoteRequest::new(format!("voter-{}-{}", t, i), "bob")).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(chain.len(), 81);
    assert!(chain.validate().is_valid());
    assert_eq!(chain.tally().get("bob"), Some(&80));
}

#[test]
fn in_memory_store_roundtrips_through_json() {
    let store = Arc::new(InMemChainStore::new());
    let (chain, _) = Blockchain::open(store.clone(), Authority::Unsigned).unwrap();
    chain.append("A").unwrap();
    let raw = String::from_utf8(store.raw().unwrap()).unwrap();
    assert!(raw.trim_start().starts_with('['));
    assert_eq!(store.load().unwrap().unwrap(), chain.blocks());
}

#[test]
fn unsigned_ledger_then_signing_key_is_refused() {
    let store = Arc::new(InMemChainStore::new());
    let (chain, _) = Blockchain::open(store.clone(), Authority::Unsigned).unwrap();
    chain.append("A").unwrap();
    drop(chain);

    let res = Blockchain::open(store, Authority::Signing(Keypair::generate()));
    assert!(matches!(res, Err(LedgerError::InvalidKeyFormat(_))));
}

#[test]
fn anonymous_voter_refused_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.json");

    let (chain, _) = file_chain(&path, Authority::Unsigned);
    let receipt = chain.cast_vote(VoteRequest::new("alice@example.org", "bob").anonymous("pw")).unwrap();
    drop(chain);

    let registry = fs::read_to_string(dir.path().join("ledger.json.voters.json")).unwrap();
    assert!(!registry.contains(&receipt.sender));
    assert!(!fs::read_to_string(&path).unwrap().contains(&voter_id("alice@example.org").to_hex()));

    let (chain, _) = file_chain(&path, Authority::Unsigned);
    for request in [
        VoteRequest::new("alice@example.org", "carol").anonymous("pw"),
        VoteRequest::new("alice@example.org", "carol"),
    ] {
        assert!(matches!(chain.cast_vote(request), Err(LedgerError::DuplicateVote(_))));
    }
    assert_eq!(chain.len(), 2);
}
