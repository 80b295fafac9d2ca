use k256::ecdsa::Signature as EcdsaSignature;
use k256::ecdsa::signature::{Signer as _, Verifier as _};
use serde::{Serialize, Deserialize};

use crate::crypto::{Keypair, PrivateKey, PublicKey};
use crate::utils::serde_helpers::{as_hex, from_hex};
use crate::utils::{LedgerError, Result};

/// DER-encoded ECDSA/secp256k1 signature, hex in JSON.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(
    #[serde(serialize_with = "as_hex", deserialize_with = "from_hex")]
    pub Vec<u8>,
);

impl Signature {
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

/// Trait for signing
pub trait Signer {
    fn sign(&self, msg: &[u8]) -> Result<Signature>;
}

/// Trait for verifying. A bad signature is an ordinary `false`.
pub trait Verifier {
    fn verify(&self, msg: &[u8], sig: &Signature) -> bool;
}

impl Signer for PrivateKey {
    // SHA-256 prehash, RFC 6979 deterministic nonce, low-S normalized
    fn sign(&self, msg: &[u8]) -> Result<Signature> {
        let sig: EcdsaSignature = self
            .signing_key()
            .try_sign(msg)
            .map_err(|e| LedgerError::SignatureFailure(e.to_string()))?;
        Ok(Signature(sig.to_der().as_bytes().to_vec()))
    }
}

impl Signer for Keypair {
    fn sign(&self, msg: &[u8]) -> Result<Signature> {
        self.secret().sign(msg)
    }
}

impl Verifier for PublicKey {
    fn verify(&self, msg: &[u8], sig: &Signature) -> bool {
        match EcdsaSignature::from_der(&sig.0) {
            Ok(ds) => self.verifying_key().verify(msg, &ds).is_ok(),
            Err(_) => false,
        }
    }
}

pub fn sign(private_key: &PrivateKey, message: &[u8]) -> Result<Signature> {
    private_key.sign(message)
}

pub fn verify(public_key: &PublicKey, message: &[u8], signature: &Signature) -> bool {
    public_key.verify(message, signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::generate_key_pair;
    use rand::RngCore;

    #[test]
    fn sign_verify_random_trials() {
        let mut rng = rand::thread_rng();
        for _ in 0..64 {
            let (sk, pk) = generate_key_pair();
            let (_, other_pk) = generate_key_pair();
            let mut msg = [0u8; 32];
            rng.fill_bytes(&mut msg);

            let sig = sign(&sk, &msg).unwrap();
            assert!(verify(&pk, &msg, &sig));
            assert!(!verify(&other_pk, &msg, &sig));
        }
    }

    #[test]
    fn signatures_are_deterministic() {
        let kp = Keypair::generate();
        let a = kp.sign(b"block").unwrap();
        let b = kp.sign(b"block").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, kp.sign(b"other block").unwrap());
    }

    #[test]
    fn digest_mismatch_fails() {
        let kp = Keypair::generate();
        let sig = kp.sign(b"vote for alice").unwrap();
        assert!(!kp.public().verify(b"vote for bob", &sig));
    }

    #[test]
    fn malformed_signature_is_false_not_error() {
        let kp = Keypair::generate();
        assert!(!kp.public().verify(b"x", &Signature(vec![])));
        assert!(!kp.public().verify(b"x", &Signature(vec![0x30, 0x02, 0xff])));

        let mut sig = kp.sign(b"x").unwrap();
        let last = sig.0.len() - 1;
        sig.0[last] ^= 0x01;
        assert!(!kp.public().verify(b"x", &sig));
    }
}
