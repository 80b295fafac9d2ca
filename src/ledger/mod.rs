//! Ledger: blocks, the chain that links them, and its audit.

pub mod transaction;
pub mod block;
pub mod validation;
pub mod chain;

pub use transaction::{Transaction, VoteRequest, now_millis};
pub use block::{Block, BlockData, BlockHeader, BlockRecord, GENESIS_MARKER};
pub use validation::{validate_blocks, ValidationReport, Violation, ViolationKind};
pub use chain::{Authority, Blockchain, LoadOutcome, VoteReceipt};
