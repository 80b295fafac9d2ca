use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Serialize, Deserialize};

use crate::crypto::{Keypair, PublicKey};
use crate::ledger::Authority;
use crate::utils::{LedgerError, Result};

pub const ENV_LEDGER_PATH: &str = "VOTECHAIN_LEDGER_PATH";
pub const ENV_AUTHORITY_PUBLIC_KEY: &str = "VOTECHAIN_AUTHORITY_PUBLIC_KEY";
pub const ENV_AUTHORITY_SECRET: &str = "VOTECHAIN_AUTHORITY_SECRET";
pub const ENV_RPC_ADDR: &str = "VOTECHAIN_RPC_ADDR";

/// Ledger process configuration, read from a TOML file and then overridden
/// by `VOTECHAIN_*` environment variables.
///
/// The authority private key is read here and nowhere else. It is never
/// serialized back out, never logged, and never written next to the ledger.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub ledger_path: PathBuf,
    /// hex secp256k1 point distributed to auditors
    pub authority_public_key: Option<String>,
    /// hex secp256k1 scalar; leave unset for an unsigned ledger
    #[serde(skip_serializing)]
    pub authority_private_key: Option<String>,
    pub rpc_addr: String,
    pub log_filter: String,
    pub reject_duplicate_votes: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            ledger_path: PathBuf::from("./data/ledger.json"),
            authority_public_key: None,
            authority_private_key: None,
            rpc_addr: "127.0.0.1:8545".into(),
            log_filter: "info".into(),
            reject_duplicate_votes: true,
        }
    }
}

impl fmt::Debug for LedgerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerConfig")
            .field("ledger_path", &self.ledger_path)
            .field("authority_public_key", &self.authority_public_key)
            .field("authority_private_key", &self.authority_private_key.as_ref().map(|_| "<redacted>"))
            .field("rpc_addr", &self.rpc_addr)
            .field("log_filter", &self.log_filter)
            .field("reject_duplicate_votes", &self.reject_duplicate_votes)
            .finish()
    }
}

impl LedgerConfig {
    /// Load config from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read_to_string(path.as_ref())?;
        Self::from_toml(&data)
    }

    pub fn from_toml(data: &str) -> Result<Self> {
        toml::from_str(data).map_err(|e| LedgerError::Encoding(format!("config: {}", e)))
    }

    /// Load `path` if it exists, defaults otherwise; then apply the environment.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(p) if p.exists() => Self::load(p)?,
            _ => Self::default(),
        };
        Ok(base.with_env(|k| std::env::var(k).ok()))
    }

    /// Apply overrides from a variable lookup (`std::env::var` in production).
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_LEDGER_PATH) {
            self.ledger_path = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_AUTHORITY_PUBLIC_KEY) {
            self.authority_public_key = Some(v);
        }
        if let Some(v) = lookup(ENV_AUTHORITY_SECRET) {
            self.authority_private_key = Some(v);
        }
        if let Some(v) = lookup(ENV_RPC_ADDR) {
            self.rpc_addr = v;
        }
        self
    }

    /// Signing authority when a private key is configured; the public key,
    /// if also set, must match it.
    pub fn authority(&self) -> Result<Authority> {
        match &self.authority_private_key {
            Some(secret) => {
                let kp = Keypair::from_hex(secret, self.authority_public_key.as_deref())?;
                Ok(Authority::Signing(kp))
            }
            None => Ok(Authority::Unsigned),
        }
    }

    /// Key auditors check signatures against: the configured public key, or
    /// the one derived from the private key.
    pub fn audit_key(&self) -> Result<Option<PublicKey>> {
        if let Some(pk) = &self.authority_public_key {
            return PublicKey::from_hex(pk).map(Some);
        }
        Ok(self.authority()?.public_key().cloned())
    }

    /// TOML rendering without the private key.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| LedgerError::Encoding(format!("config: {}", e)))
    }
}
