//! Full-chain audit.

use std::fmt;

use serde::{Serialize, Deserialize};

use crate::crypto::{Hash, PublicKey};
use crate::ledger::block::Block;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViolationKind {
    EmptyChain,
    /// position and stored index disagree
    IndexGap { expected: u64, found: u64 },
    /// stored hash differs from the one recomputed from the fields
    HashMismatch { stored: Hash, computed: Hash },
    Unhashable { reason: String },
    BadGenesisLink { found: Hash },
    BrokenLink { expected: Hash, found: Hash },
    BadSignature,
    MissingSignature,
    UnexpectedAuthority { found: Option<PublicKey> },
}

impl ViolationKind {
    /// Structurally sound, but signed by (or missing) a different authority.
    pub fn is_authority_mismatch(&self) -> bool {
        matches!(self, ViolationKind::MissingSignature | ViolationKind::UnexpectedAuthority { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// position in the chain
    pub position: usize,
    #[serde(flatten)]
    pub kind: ViolationKind,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ViolationKind::EmptyChain => write!(f, "chain is empty"),
            ViolationKind::IndexGap { expected, found } => {
                write!(f, "block #{}: index {} (expected {})", self.position, found, expected)
            }
            ViolationKind::HashMismatch { stored, computed } => {
                write!(f, "block #{}: stored hash {} != computed {}", self.position, stored, computed)
            }
            ViolationKind::Unhashable { reason } => write!(f, "block #{}: cannot hash: {}", self.position, reason),
            ViolationKind::BadGenesisLink { found } => {
                write!(f, "block #{}: genesis previous_hash is {}", self.position, found)
            }
            ViolationKind::BrokenLink { expected, found } => {
                write!(f, "block #{}: previous_hash {} != predecessor hash {}", self.position, found, expected)
            }
            ViolationKind::BadSignature => write!(f, "block #{}: signature does not verify", self.position),
            ViolationKind::MissingSignature => write!(f, "block #{}: unsigned", self.position),
            ViolationKind::UnexpectedAuthority { found } => match found {
                Some(pk) => write!(f, "block #{}: signed by unexpected authority {}", self.position, pk),
                None => write!(f, "block #{}: no authority key", self.position),
            },
        }
    }
}

/// Outcome of auditing a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub length: usize,
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// Positions of every offending block, deduplicated, ascending.
    pub fn invalid_positions(&self) -> Vec<usize> {
        let mut v: Vec<usize> = self.violations.iter().map(|v| v.position).collect();
        v.sort_unstable();
        v.dedup();
        v
    }

    pub fn only_authority_mismatches(&self) -> bool {
        !self.violations.is_empty() && self.violations.iter().all(|v| v.kind.is_authority_mismatch())
    }
}

/// Audit `blocks`. With `expected_authority`, every block must be signed by
/// exactly that key. `fail_fast` stops at the first violation.
pub fn validate_blocks(blocks: &[Block], expected_authority: Option<&PublicKey>, fail_fast: bool) -> ValidationReport {
    let mut violations = Vec::new();
    if blocks.is_empty() {
        violations.push(Violation { position: 0, kind: ViolationKind::EmptyChain });
        return ValidationReport { length: 0, violations };
    }

    for (position, block) in blocks.iter().enumerate() {
        let mut found = Vec::new();

        if block.index() != position as u64 {
            found.push(ViolationKind::IndexGap { expected: position as u64, found: block.index() });
        }

        match block.recompute_hash() {
            Ok(computed) if computed != *block.hash() => {
                found.push(ViolationKind::HashMismatch { stored: *block.hash(), computed });
            }
            Ok(_) => {}
            Err(e) => found.push(ViolationKind::Unhashable { reason: e.to_string() }),
        }

        if position == 0 {
            if *block.previous_hash() != Hash::zero() {
                found.push(ViolationKind::BadGenesisLink { found: *block.previous_hash() });
            }
        } else {
            let expected = *blocks[position - 1].hash();
            if *block.previous_hash() != expected {
                found.push(ViolationKind::BrokenLink { expected, found: *block.previous_hash() });
            }
        }

        if block.is_signed() && !block.verify_signature() {
            found.push(ViolationKind::BadSignature);
        }

        if let Some(expected) = expected_authority {
            if !block.is_signed() {
                found.push(ViolationKind::MissingSignature);
            } else if block.authority_public_key() != Some(expected) {
                found.push(ViolationKind::UnexpectedAuthority { found: block.authority_public_key().cloned() });
            }
        }

        for kind in found {
            violations.push(Violation { position, kind });
            if fail_fast {
                return ValidationReport { length: blocks.len(), violations };
            }
        }
    }

    ValidationReport { length: blocks.len(), violations }
}
