//! Crypto module: hashing, key management, signing, vote fingerprints.
//!
//! - Hash: canonical JSON + SHA-256
//! - Keys: secp256k1 generation, hex import/export
//! - Sign: ECDSA over SHA-256 with RFC 6979 nonces, DER encoded
//! - Fingerprint: one-way vote and voter identifiers

pub mod hash;
pub mod keys;
pub mod sign;
pub mod fingerprint;

pub use hash::{Hash, canonical_bytes, hash_record, hash_bytes};
pub use keys::{Keypair, PublicKey, PrivateKey, generate_key_pair};
pub use sign::{Signature, Signer, Verifier, sign, verify};
pub use fingerprint::{fingerprint, fingerprint_vote, voter_id};
