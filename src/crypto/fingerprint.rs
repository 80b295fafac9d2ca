//! Vote fingerprints and voter identifiers.
//!
//! A fingerprint stands in for a ballot when the ledger must not link a
//! voter to a choice. It is `SHA-256(normalize(secret) | candidate | nonce | ts)`
//! where the nonce is 32 fresh random bytes, so the same voter/candidate
//! pair fingerprints differently every time.

use rand::RngCore;
use rand::rngs::OsRng;

use crate::crypto::hash::{hash_bytes, Hash};

/// Domain-separation tag appended to a normalized voter identifier.
pub const VOTER_ID_TAG: &str = "|securevoting";

const FIELD_SEP: u8 = b'|';

/// Trim surrounding whitespace and case-fold.
pub fn normalize_secret(secret: &str) -> String {
    secret.trim().to_lowercase()
}

/// Stable pseudonymous voter identifier derived from an email or login.
pub fn voter_id(identifier: &str) -> Hash {
    let mut input = normalize_secret(identifier);
    input.push_str(VOTER_ID_TAG);
    hash_bytes(input.as_bytes())
}

pub fn fresh_nonce() -> [u8; 32] {
    let mut nonce = [0u8; 32];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Fingerprint with a caller-supplied nonce.
pub fn fingerprint(voter_secret: &str, candidate: &str, nonce: &[u8], timestamp: u64) -> Hash {
    let secret = normalize_secret(voter_secret);
    let mut buf = Vec::with_capacity(secret.len() + candidate.len() + nonce.len() + 24);
    buf.extend_from_slice(secret.as_bytes());
    buf.push(FIELD_SEP);
    buf.extend_from_slice(candidate.as_bytes());
    buf.push(FIELD_SEP);
    buf.extend_from_slice(nonce);
    buf.push(FIELD_SEP);
    buf.extend_from_slice(&timestamp.to_be_bytes());
    hash_bytes(&buf)
}

/// Fingerprint with a freshly drawn nonce. The nonce is returned so the
/// voter can later prove which fingerprint is theirs.
pub fn fingerprint_vote(voter_secret: &str, candidate: &str, timestamp: u64) -> (Hash, [u8; 32]) {
    let nonce = fresh_nonce();
    (fingerprint(voter_secret, candidate, &nonce, timestamp), nonce)
}
