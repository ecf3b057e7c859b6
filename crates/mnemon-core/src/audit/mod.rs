//! Append-only audit trail.
//!
//! One timestamped JSON object per line. Appends are fire-and-forget: a
//! failed write must never abort the operation that emitted the event, so
//! failures go to the logging channel instead.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Events recorded on the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEvent {
    TmpOut,
    MemorisePromoted,
    UserOverride,
    DailyMaintenance,
    ReportVerified,
    RepairEnqueued,
    RepairCompleted,
}

impl AuditEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEvent::TmpOut => "TMP_OUT",
            AuditEvent::MemorisePromoted => "MEMORISE_PROMOTED",
            AuditEvent::UserOverride => "USER_OVERRIDE",
            AuditEvent::DailyMaintenance => "DAILY_MAINTENANCE",
            AuditEvent::ReportVerified => "REPORT_VERIFIED",
            AuditEvent::RepairEnqueued => "REPAIR_ENQUEUED",
            AuditEvent::RepairCompleted => "REPAIR_COMPLETED",
        }
    }
}

#[derive(Serialize)]
struct AuditLine<'a> {
    ts: String,
    event: &'a str,
    payload: serde_json::Value,
}

/// Append-only JSONL audit log.
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    /// Create an audit log writing to the given path. The parent directory
    /// is created on first append.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Append one event. Never fails the caller; write errors are reported
    /// through `tracing::warn!` only.
    pub async fn append(&self, event: AuditEvent, payload: serde_json::Value) {
        if let Err(e) = self.try_append(event, payload).await {
            tracing::warn!(event = event.as_str(), error = %e, "audit append failed");
        }
    }

    async fn try_append(
        &self,
        event: AuditEvent,
        payload: serde_json::Value,
    ) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let line = AuditLine {
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            event: event.as_str(),
            payload,
        };
        let mut json = serde_json::to_vec(&line).map_err(std::io::Error::other)?;
        json.push(b'\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&json).await?;
        file.flush().await
    }

    /// Path of the underlying log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn appends_one_json_object_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path().join("audit.jsonl"));

        log.append(AuditEvent::TmpOut, serde_json::json!({"verdict": "PASS"}))
            .await;
        log.append(
            AuditEvent::DailyMaintenance,
            serde_json::json!({"purged": 0}),
        )
        .await;

        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"], "TMP_OUT");
        assert_eq!(first["payload"]["verdict"], "PASS");
        assert!(first["ts"].as_str().unwrap().ends_with('Z'));

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["event"], "DAILY_MAINTENANCE");
    }

    #[tokio::test]
    async fn append_failure_does_not_panic_or_error() {
        // Point at an unwritable location; the call must still return.
        let log = AuditLog::new("/proc/nonexistent/audit.jsonl");
        log.append(AuditEvent::TmpOut, serde_json::json!({})).await;
    }
}
