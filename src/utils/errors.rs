use thiserror::Error;

/// Unified error type for the vote ledger
#[derive(Error, Debug)]
pub enum LedgerError {
    /// A record could not be canonically serialized or parsed.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// A key does not decode to a valid scalar/point on secp256k1.
    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    #[error("Signature failure: {0}")]
    SignatureFailure(String),

    /// A stored hash, link, or signature failed to verify.
    #[error("Chain corruption: {0}")]
    ChainCorruption(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    /// The voter identifier is already recorded on the chain or pending.
    #[error("Duplicate vote from {0}")]
    DuplicateVote(String),
}

impl From<std::io::Error> for LedgerError {
    fn from(e: std::io::Error) -> Self {
        LedgerError::Persistence(e.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(e: serde_json::Error) -> Self {
        LedgerError::Encoding(e.to_string())
    }
}

/// Convenience alias
pub type Result<T> = std::result::Result<T, LedgerError>;
