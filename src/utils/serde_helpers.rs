use serde::{Deserialize, Serializer, Deserializer};
use serde::de::Error as DeError;

/// Serialize bytes as hex string
pub fn as_hex<S>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    s.serialize_str(&hex::encode(bytes))
}

/// Deserialize hex string into bytes
pub fn from_hex<'de, D>(d: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(d)?;
    hex::decode(&s).map_err(D::Error::custom)
}

/// Deserialize a hex string into a fixed 32-byte array
pub fn from_hex32<'de, D>(d: D) -> Result<[u8; 32], D::Error>
where
    D: Deserializer<'de>,
{
    let bytes = from_hex(d)?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| D::Error::custom(format!("expected 32 bytes, got {}", bytes.len())))
}
