//! Report store trait - optional persisted mirror of the in-memory report
//! list, so pending verifications survive process restarts.

use crate::error::MnemonResult;
use crate::types::TmpReport;
use async_trait::async_trait;

/// Persisted report/verification queue backing.
///
/// The orchestrator's in-memory list remains the authority; a configured
/// report store is mirrored on every mutation and reloaded at startup.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Persist a new report.
    async fn insert(&self, report: &TmpReport) -> MnemonResult<()>;

    /// Mark a report verified by an external reviewer.
    async fn set_verified(&self, report_id: &str) -> MnemonResult<bool>;

    /// Remove the given reports (maintenance purge).
    async fn remove(&self, report_ids: &[String]) -> MnemonResult<usize>;

    /// Load all persisted reports, oldest first.
    async fn load(&self) -> MnemonResult<Vec<TmpReport>>;
}
