use std::collections::BTreeMap;
use std::sync::Arc;
use lazy_static::lazy_static;
use parking_lot::Mutex;

pub const BLOCKS_APPENDED: &str = "blocks_appended";
pub const BLOCKS_MINED: &str = "blocks_mined";
pub const TRANSACTIONS_QUEUED: &str = "transactions_queued";
pub const CHAIN_RESETS: &str = "chain_resets";
pub const VALIDATION_FAILURES: &str = "validation_failures";
pub const PERSIST_FAILURES: &str = "persist_failures";

/// Metrics registry (simple, Prometheus-style counters)
#[derive(Clone, Default)]
pub struct MetricsRegistry {
    counters: Arc<Mutex<BTreeMap<String, u64>>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_counter(&self, name: &str) {
        self.add(name, 1);
    }

    pub fn add(&self, name: &str, n: u64) {
        let mut counters = self.counters.lock();
        *counters.entry(name.to_string()).or_insert(0) += n;
    }

    pub fn get(&self, name: &str) -> u64 {
        self.counters.lock().get(name).copied().unwrap_or(0)
    }

    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.counters.lock().clone()
    }
}

lazy_static! {
    pub static ref METRICS: MetricsRegistry = MetricsRegistry::new();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let m = MetricsRegistry::new();
        m.inc_counter(BLOCKS_APPENDED);
        m.add(BLOCKS_APPENDED, 2);
        assert_eq!(m.get(BLOCKS_APPENDED), 3);
        assert_eq!(m.get(CHAIN_RESETS), 0);
        assert_eq!(m.snapshot().len(), 1);
    }
}
