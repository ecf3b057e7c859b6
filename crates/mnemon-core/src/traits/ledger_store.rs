//! Ledger store trait (TSM) - primary store of promoted records.

use crate::error::MnemonResult;
use crate::types::MemoriseRecord;
use async_trait::async_trait;

/// Primary relational store of promoted memories, keyed by `memorise_id`.
///
/// Implementations must serialize their own concurrent writers so that
/// promotions never interleave partial rows.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Insert a new ledger row. Returns the `tsm_ref` for the row. The row's
    /// `wpm_ref` starts null; the dual-write protocol attaches it later.
    async fn insert(&self, record: &MemoriseRecord) -> MnemonResult<String>;

    /// Attach the wave store reference to an existing row.
    async fn attach_wave_ref(&self, memorise_id: &str, wpm_ref: &str) -> MnemonResult<()>;

    /// Fetch a record by id. Implementations verify the stored checksum on
    /// every read and return a consistency error on mismatch.
    async fn get(&self, memorise_id: &str) -> MnemonResult<Option<MemoriseRecord>>;

    /// List records, newest first.
    async fn list(&self, limit: Option<usize>) -> MnemonResult<Vec<MemoriseRecord>>;

    /// Number of ledger rows.
    async fn count(&self) -> MnemonResult<u64>;
}
