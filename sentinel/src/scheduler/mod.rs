pub mod cycle;

pub use cycle::{CycleReport, CycleScheduler, SchedulerSettings, SymbolOutcome};
