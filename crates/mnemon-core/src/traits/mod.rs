//! Store traits - the seams between the orchestrator and its backends.

mod ledger_store;
mod report_store;
mod wave_store;

pub use ledger_store::LedgerStore;
pub use report_store::ReportStore;
pub use wave_store::{WaveSnapshot, WaveStore};
