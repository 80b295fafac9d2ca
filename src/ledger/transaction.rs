use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Serialize, Deserialize};

use crate::crypto::{fingerprint_vote, voter_id, Hash};

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// One vote (or any sender -> recipient record) awaiting inclusion in a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// voter identifier hash, or a vote fingerprint for anonymous ballots
    pub sender: String,
    /// candidate
    pub recipient: String,
    /// optional free-form message
    pub payload: Option<String>,
    pub timestamp: u64,
}

impl Transaction {
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, payload: Option<String>) -> Self {
        Self {
            sender: sender.into(),
            recipient: recipient.into(),
            payload,
            timestamp: now_millis(),
        }
    }
}

/// Vote-cast request as handed over by the UI/CRUD layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRequest {
    /// raw voter identifier (e.g. email); only its hash reaches the ledger
    pub voter: String,
    pub candidate: String,
    #[serde(default)]
    pub message: Option<String>,
    /// when present the sender is a one-way fingerprint instead of the voter id
    #[serde(default)]
    pub voter_secret: Option<String>,
}

impl VoteRequest {
    pub fn new(voter: impl Into<String>, candidate: impl Into<String>) -> Self {
        Self {
            voter: voter.into(),
            candidate: candidate.into(),
            message: None,
            voter_secret: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn anonymous(mut self, voter_secret: impl Into<String>) -> Self {
        self.voter_secret = Some(voter_secret.into());
        self
    }

    /// Pseudonymous id used for duplicate-vote checks.
    pub fn voter_id(&self) -> Hash {
        voter_id(&self.voter)
    }

    /// Turn the request into a ledger transaction. Anonymous requests yield
    /// the fingerprint nonce as well; it is handed back to the voter only.
    pub fn into_transaction(self) -> (Transaction, Option<[u8; 32]>) {
        let timestamp = now_millis();
        let candidate = self.candidate.trim().to_string();
        match self.voter_secret {
            Some(secret) => {
                let (fp, nonce) = fingerprint_vote(&secret, &candidate, timestamp);
                let tx = Transaction {
                    sender: fp.to_hex(),
                    recipient: candidate,
                    payload: self.message,
                    timestamp,
                };
                (tx, Some(nonce))
            }
            None => {
                let tx = Transaction {
                    sender: voter_id(&self.voter).to_hex(),
                    recipient: candidate,
                    payload: self.message,
                    timestamp,
                };
                (tx, None)
            }
        }
    }
}
