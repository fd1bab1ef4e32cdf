pub mod reconciliation;

pub use reconciliation::{CycleOutcome, CycleReport, ReconciliationWorker};
