//! Sync engine for uploading new files to the destination folder
//!
//! Provides idempotent reconciliation cycles that can be safely repeated,
//! plus the loop that schedules them.

mod engine;
mod filter;
mod ledger;
mod retry;
mod runner;

pub use engine::{ReconciliationEngine, SyncStats};
pub use filter::{accepts_extension, passes_cutoff};
pub use ledger::SyncLedger;
pub use retry::RetryPolicy;
pub use runner::{LoopState, LoopSummary, StopSignal, SyncLoop};
