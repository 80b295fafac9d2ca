use std::fmt;

use k256::ecdsa::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Serialize, Deserialize, Serializer, Deserializer};
use serde::de::Error as DeError;

use crate::utils::{LedgerError, Result};

/// secp256k1 verification key.
///
/// Hex form is the raw 64-byte `x || y` point; SEC1 compressed (33 bytes)
/// and uncompressed (65 bytes) encodings are accepted on input.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

/// secp256k1 signing scalar. Deliberately not `Serialize`: a private key
/// never travels inside a block, a ledger file, or an RPC response.
#[derive(Clone)]
pub struct PrivateKey(SigningKey);

/// Authority (or voter) key pair.
#[derive(Clone)]
pub struct Keypair {
    secret: PrivateKey,
    public: PublicKey,
}

impl PublicKey {
    pub fn from_hex(s: &str) -> Result<Self> {
        let raw = hex::decode(s.trim())
            .map_err(|e| LedgerError::InvalidKeyFormat(format!("public key is not hex: {}", e)))?;
        Self::from_bytes(&raw)
    }

    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        let sec1 = match raw.len() {
            64 => {
                let mut v = Vec::with_capacity(65);
                v.push(0x04);
                v.extend_from_slice(raw);
                v
            }
            33 | 65 => raw.to_vec(),
            n => {
                return Err(LedgerError::InvalidKeyFormat(format!(
                    "public key must be 33, 64 or 65 bytes, got {}",
                    n
                )))
            }
        };
        let vk = VerifyingKey::from_sec1_bytes(&sec1)
            .map_err(|_| LedgerError::InvalidKeyFormat("public key is not a point on secp256k1".into()))?;
        Ok(PublicKey(vk))
    }

    /// Raw 64-byte `x || y` encoding.
    pub fn to_bytes(&self) -> Vec<u8> {
        let point = self.0.to_encoded_point(false);
        point.as_bytes()[1..].to_vec()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub(crate) fn verifying_key(&self) -> &VerifyingKey {
        &self.0
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        PublicKey::from_hex(&s).map_err(D::Error::custom)
    }
}

impl PrivateKey {
    /// Decode a 32-byte big-endian scalar; zero and values >= n are rejected.
    pub fn from_hex(s: &str) -> Result<Self> {
        let raw = hex::decode(s.trim())
            .map_err(|e| LedgerError::InvalidKeyFormat(format!("private key is not hex: {}", e)))?;
        if raw.len() != 32 {
            return Err(LedgerError::InvalidKeyFormat(format!(
                "private key must be 32 bytes, got {}",
                raw.len()
            )));
        }
        let sk = SigningKey::from_slice(&raw)
            .map_err(|_| LedgerError::InvalidKeyFormat("private key scalar out of range".into()))?;
        Ok(PrivateKey(sk))
    }

    /// Export secret as hex. Callers own what happens to it.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_bytes())
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.verifying_key().clone())
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.0
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

impl Keypair {
    /// Generate a new random keypair from the OS CSPRNG
    pub fn generate() -> Self {
        let secret = PrivateKey(SigningKey::random(&mut OsRng));
        let public = secret.public_key();
        Self { secret, public }
    }

    pub fn from_private(secret: PrivateKey) -> Self {
        let public = secret.public_key();
        Self { secret, public }
    }

    /// Construct from a hex private key, optionally cross-checking a hex public key.
    pub fn from_hex(private_hex: &str, public_hex: Option<&str>) -> Result<Self> {
        let kp = Self::from_private(PrivateKey::from_hex(private_hex)?);
        if let Some(expected) = public_hex {
            let expected = PublicKey::from_hex(expected)?;
            if expected != kp.public {
                return Err(LedgerError::InvalidKeyFormat(
                    "public key does not match the private key".into(),
                ));
            }
        }
        Ok(kp)
    }

    pub fn public(&self) -> &PublicKey {
        &self.public
    }

    pub fn secret(&self) -> &PrivateKey {
        &self.secret
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("public", &self.public)
            .field("secret", &self.secret)
            .finish()
    }
}

/// Fresh `(private, public)` pair; every call draws a new scalar.
pub fn generate_key_pair() -> (PrivateKey, PublicKey) {
    let kp = Keypair::generate();
    (kp.secret, kp.public)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip_preserves_keys() {
        let kp = Keypair::generate();
        let again = Keypair::from_hex(&kp.secret().to_hex(), Some(&kp.public().to_hex())).unwrap();
        assert_eq!(again.public(), kp.public());
        assert_eq!(kp.public().to_hex().len(), 128);
    }

    #[test]
    fn accepts_sec1_encodings() {
        let kp = Keypair::generate();
        let compressed = kp.public().verifying_key().to_encoded_point(true);
        let parsed = PublicKey::from_bytes(compressed.as_bytes()).unwrap();
        assert_eq!(&parsed, kp.public());
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!(matches!(PrivateKey::from_hex("zz"), Err(LedgerError::InvalidKeyFormat(_))));
        assert!(matches!(PrivateKey::from_hex("00"), Err(LedgerError::InvalidKeyFormat(_))));
        // zero scalar
        assert!(matches!(PrivateKey::from_hex(&"00".repeat(32)), Err(LedgerError::InvalidKeyFormat(_))));
        // above the group order
        assert!(matches!(PrivateKey::from_hex(&"ff".repeat(32)), Err(LedgerError::InvalidKeyFormat(_))));
        // x coordinate not on the curve
        assert!(matches!(PublicKey::from_hex(&"00".repeat(64)), Err(LedgerError::InvalidKeyFormat(_))));
    }

    #[test]
    fn mismatched_public_key_is_rejected() {
        let a = Keypair::generate();
        let b = Keypair::generate();
        let res = Keypair::from_hex(&a.secret().to_hex(), Some(&b.public().to_hex()));
        assert!(matches!(res, Err(LedgerError::InvalidKeyFormat(_))));
    }

    #[test]
    fn generated_scalars_are_distinct() {
        let (a, _) = generate_key_pair();
        let (b, _) = generate_key_pair();
        assert_ne!(a.to_hex(), b.to_hex());
    }

    #[test]
    fn debug_output_redacts_secret() {
        let kp = Keypair::generate();
        let dbg = format!("{:?}", kp);
        assert!(!dbg.contains(&kp.secret().to_hex()));
        assert!(dbg.contains("redacted"));
    }
}
