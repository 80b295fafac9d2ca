//! Hashing primitive: SHA-256 over a canonical JSON encoding.
//!
//! Canonical form: object keys sorted lexicographically at every depth, no
//! whitespace, integers only as serde_json formats them. The same logical
//! record therefore always yields the same bytes, whatever the field order
//! of the in-memory struct.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Deserialize};
use serde_json::{Map, Value};
use sha2::{Sha256, Digest};

use crate::utils::serde_helpers::{as_hex, from_hex32};
use crate::utils::{LedgerError, Result};

/// 256-bit content hash, hex-encoded in JSON.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hash(
    #[serde(serialize_with = "as_hex", deserialize_with = "from_hex32")]
    pub [u8; 32],
);

impl Hash {
    /// All-zero hash; used as the genesis block's `previous_hash`.
    pub const fn zero() -> Self {
        Hash([0u8; 32])
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

impl FromStr for Hash {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim()).map_err(|e| LedgerError::Encoding(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| LedgerError::Encoding(format!("hash must be 32 bytes, got {}", bytes.len())))?;
        Ok(Hash(arr))
    }
}

/// Reduce any serializable record to its canonical byte encoding.
pub fn canonical_bytes<T: Serialize + ?Sized>(record: &T) -> Result<Vec<u8>> {
    let value = serde_json::to_value(record)?;
    let bytes = serde_json::to_vec(&canonicalize(value))?;
    Ok(bytes)
}

/// Canonical-encode then SHA-256 a record.
pub fn hash_record<T: Serialize + ?Sized>(record: &T) -> Result<Hash> {
    Ok(hash_bytes(&canonical_bytes(record)?))
}

/// utility: hash raw bytes
pub fn hash_bytes(bytes: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    Hash(hasher.finalize().into())
}

// Rebuilds every object with sorted keys so the result does not depend on
// whether serde_json keeps insertion order.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (k, v) in entries {
                sorted.insert(k, canonicalize(v));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}
