//! Randomized tampering: every single-field forgery must be detected and no
//! malformed ledger may panic the loader.

use std::sync::Arc;

use rand::Rng;

use crate::crypto::{Hash, Keypair};
use crate::ledger::{Authority, Block, BlockData, Blockchain, LoadOutcome, validate_blocks};
use crate::storage::InMemChainStore;

fn sample_chain(signed: bool) -> (Vec<Block>, Option<Keypair>) {
    let kp = signed.then(Keypair::generate);
    let authority = match &kp {
        Some(k) => Authority::Signing(k.clone()),
        None => Authority::Unsigned,
    };
    let chain = Blockchain::in_memory(authority).unwrap();
    for i in 0..6 {
        chain.append(format!("fingerprint-{:04}", i)).unwrap();
    }
    (chain.blocks(), kp)
}

fn header_mut(block: &mut Block) -> &mut crate::ledger::BlockHeader {
    match block {
        Block::Unsigned { header, .. } | Block::Signed { header, .. } => header,
    }
}

#[test]
fn any_payload_byte_flip_is_detected() {
    let mut rng = rand::thread_rng();
    for signed in [false, true] {
        let (pristine, kp) = sample_chain(signed);
        let expected = kp.as_ref().map(|k| k.public());
        for _ in 0..200 {
            let mut blocks = pristine.clone();
            let pos = rng.gen_range(0..blocks.len());
            let header = header_mut(&mut blocks[pos]);
            if let BlockData::Payload(p) = &mut header.data {
                let mut bytes = p.clone().into_bytes();
                let at = rng.gen_range(0..bytes.len());
                // stay within ASCII so the payload remains a String
                bytes[at] = if bytes[at] == b'x' { b'y' } else { b'x' };
                *p = String::from_utf8(bytes).unwrap();
            }
            assert!(!validate_blocks(&blocks, expected, true).is_valid());
        }
    }
}

#[test]
fn any_foreign_previous_hash_is_detected() {
    let mut rng = rand::thread_rng();
    let (pristine, _) = sample_chain(false);
    for _ in 0..200 {
        let mut blocks = pristine.clone();
        let pos = rng.gen_range(1..blocks.len());
        let mut forged = [0u8; 32];
        rng.fill(&mut forged);
        header_mut(&mut blocks[pos]).previous_hash = Hash(forged);
        assert!(!validate_blocks(&blocks, None, true).is_valid());
    }
}

#[test]
fn random_file_damage_never_panics() {
    let mut rng = rand::thread_rng();
    let (pristine, _) = sample_chain(true);
    let bytes = serde_json::to_vec_pretty(&pristine).unwrap();

    for _ in 0..100 {
        let mut damaged = bytes.clone();
        let flips = rng.gen_range(1..8);
        for _ in 0..flips {
            let at = rng.gen_range(0..damaged.len());
            damaged[at] = rng.gen();
        }
        if rng.gen_bool(0.3) {
            let cut = rng.gen_range(0..damaged.len());
            damaged.truncate(cut);
        }

        let store = Arc::new(InMemChainStore::with_bytes(damaged));
        // a flip may land in whitespace and leave the chain sound
        let (chain, outcome) = Blockchain::open(store, Authority::Unsigned).unwrap();
        match outcome {
            LoadOutcome::Recovered { .. } => assert_eq!(chain.len(), 1),
            LoadOutcome::Loaded { .. } => assert!(chain.is_valid()),
            LoadOutcome::Created => panic!("store had content"),
        }
    }
}
