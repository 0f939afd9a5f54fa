use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::Serialize;

/// Minimal counters for operational visibility.
#[derive(Clone, Default)]
pub struct Counters {
    /// Set while the worker loop is alive.
    pub worker_running: Arc<AtomicBool>,

    pub cycles: Arc<AtomicU64>,
    pub cycle_failures: Arc<AtomicU64>,
    pub last_cycle_ms: Arc<AtomicU64>,

    pub symbols_processed: Arc<AtomicU64>,
    // skip reasons
    pub symbols_unavailable: Arc<AtomicU64>,
    pub symbols_insufficient: Arc<AtomicU64>,
    pub symbols_failed: Arc<AtomicU64>,

    pub crossings_detected: Arc<AtomicU64>,
    pub suppressed: Arc<AtomicU64>,
    pub suppressor_fail_open: Arc<AtomicU64>,
    pub recorded: Arc<AtomicU64>,
    pub record_failures: Arc<AtomicU64>,

    pub notifications_sent: Arc<AtomicU64>,
    pub notifications_failed: Arc<AtomicU64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CountersSnapshot {
    pub cycles: u64,
    pub cycle_failures: u64,
    pub symbols_processed: u64,
    pub symbols_unavailable: u64,
    pub symbols_insufficient: u64,
    pub symbols_failed: u64,
    pub crossings_detected: u64,
    pub suppressed: u64,
    pub suppressor_fail_open: u64,
    pub recorded: u64,
    pub record_failures: u64,
    pub notifications_sent: u64,
    pub notifications_failed: u64,
}

impl Counters {
    pub fn snapshot(&self) -> CountersSnapshot {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);

        CountersSnapshot {
            cycles: get(&self.cycles),
            cycle_failures: get(&self.cycle_failures),
            symbols_processed: get(&self.symbols_processed),
            symbols_unavailable: get(&self.symbols_unavailable),
            symbols_insufficient: get(&self.symbols_insufficient),
            symbols_failed: get(&self.symbols_failed),
            crossings_detected: get(&self.crossings_detected),
            suppressed: get(&self.suppressed),
            suppressor_fail_open: get(&self.suppressor_fail_open),
            recorded: get(&self.recorded),
            record_failures: get(&self.record_failures),
            notifications_sent: get(&self.notifications_sent),
            notifications_failed: get(&self.notifications_failed),
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker_running.load(Ordering::Relaxed)
    }

    /// Wall-clock ms of the last completed cycle, if any.
    pub fn last_cycle_ms(&self) -> Option<u64> {
        match self.last_cycle_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => Some(ms),
        }
    }
}
