//! TMP run reports and their severity levels.

use super::verdict::{ScoredResult, Verdict};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity of a TMP report, derived from the final verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReportLevel {
    Info,
    Important,
    Critical,
}

impl ReportLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportLevel::Info => "INFO",
            ReportLevel::Important => "IMPORTANT",
            ReportLevel::Critical => "CRITICAL",
        }
    }
}

impl From<Verdict> for ReportLevel {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Pass => ReportLevel::Info,
            Verdict::Hold => ReportLevel::Important,
            Verdict::Fail | Verdict::Reject => ReportLevel::Critical,
        }
    }
}

/// One record of a TMP run. Appended on every `run_tmp` call; never mutated
/// except by the verification confirmation step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmpReport {
    /// Unique report identifier.
    pub report_id: String,
    /// When the report was produced (RFC 3339 UTC).
    pub created_at: String,
    /// Severity level derived from the verdict.
    pub level: ReportLevel,
    /// Id of the data vector this run classified.
    pub data_vector_id: String,
    /// The scored OUT value of the run.
    pub out: ScoredResult,
    /// Whether a human must confirm this report before maintenance may
    /// purge it. False only for Info-level reports.
    pub requires_user_verification: bool,
    /// Set once an external reviewer confirms the report.
    pub verified_by_user: bool,
}

impl TmpReport {
    /// Build a report for one TMP run.
    pub fn new(data_vector_id: impl Into<String>, out: ScoredResult) -> Self {
        let level = ReportLevel::from(out.verdict);
        Self {
            report_id: Uuid::new_v4().to_string(),
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            level,
            data_vector_id: data_vector_id.into(),
            out,
            requires_user_verification: level != ReportLevel::Info,
            verified_by_user: false,
        }
    }

    /// Whether this report is waiting on human confirmation.
    pub fn pending_verification(&self) -> bool {
        self.requires_user_verification && !self.verified_by_user
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_derivation_from_verdict() {
        assert_eq!(ReportLevel::from(Verdict::Pass), ReportLevel::Info);
        assert_eq!(ReportLevel::from(Verdict::Hold), ReportLevel::Important);
        assert_eq!(ReportLevel::from(Verdict::Fail), ReportLevel::Critical);
        assert_eq!(ReportLevel::from(Verdict::Reject), ReportLevel::Critical);
    }

    #[test]
    fn only_info_reports_skip_verification() {
        let info = TmpReport::new("d1", ScoredResult::unscored(Verdict::Pass));
        assert!(!info.requires_user_verification);
        assert!(!info.pending_verification());

        let hold = TmpReport::new("d2", ScoredResult::unscored(Verdict::Hold));
        assert!(hold.requires_user_verification);
        assert!(hold.pending_verification());

        let fail = TmpReport::new("d3", ScoredResult::unscored(Verdict::Fail));
        assert!(fail.requires_user_verification);
    }
}
