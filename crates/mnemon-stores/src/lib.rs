//! mnemon-stores - Store backends for mnemon.
//!
//! Provides the SQLite ledger store (TSM), the filesystem wave store (WPM),
//! and the SQLite report store used to persist the verification queue.

mod sqlite_ledger;
mod sqlite_reports;
mod wave_fs;

pub use sqlite_ledger::SqliteLedgerStore;
pub use sqlite_reports::SqliteReportStore;
pub use wave_fs::FsWaveStore;
