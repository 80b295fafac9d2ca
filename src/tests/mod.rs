//! Crate-level scenario tests.
//!
//! - Integration: persistence, recovery, authority checks, concurrency
//! - Fuzz: randomized tampering and malformed ledger files

mod integration;
mod fuzz;
