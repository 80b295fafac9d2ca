//! Storage module: where a serialized chain lives between runs.
//!
//! Engines: JSON file (atomic rename) and in-memory.

pub mod traits;
pub mod fs_store;
pub mod mem_store;

pub use traits::ChainStore;
pub use fs_store::{FsChainStore, read_ledger_file};
pub use mem_store::InMemChainStore;
