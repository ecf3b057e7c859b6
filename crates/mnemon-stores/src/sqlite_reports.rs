//! SQLite-backed report store.
//!
//! Persists the TMP report list so that pending verifications survive
//! process restarts. May share a database file with the ledger store.

use async_trait::async_trait;
use mnemon_core::{MnemonError, MnemonResult, ReportStore, TmpReport};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

/// Persisted mirror of the orchestrator's report list.
pub struct SqliteReportStore {
    conn: Mutex<Connection>,
}

impl SqliteReportStore {
    /// Open (or create) a report store at the given path.
    pub fn new(path: impl AsRef<Path>) -> MnemonResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path.as_ref())
            .map_err(|e| MnemonError::Report {
                message: "failed to open report db".to_string(),
                source: Some(Box::new(e)),
            })?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// In-memory report store (for testing).
    pub fn in_memory() -> MnemonResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| MnemonError::Report {
            message: "failed to open in-memory report db".to_string(),
            source: Some(Box::new(e)),
        })?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> MnemonResult<()> {
        let conn = self.conn.lock().expect("report lock poisoned");
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tmp_reports (
                report_id                   TEXT PRIMARY KEY,
                created_at                  TEXT NOT NULL,
                level                       TEXT NOT NULL,
                data_vector_id              TEXT NOT NULL,
                out                         TEXT NOT NULL,
                requires_user_verification  INTEGER NOT NULL,
                verified_by_user            INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_reports_created ON tmp_reports(created_at);
        "#,
        )
        .map_err(|e| MnemonError::Report {
            message: "failed to create report schema".to_string(),
            source: Some(Box::new(e)),
        })?;
        Ok(())
    }

    fn report_err(e: rusqlite::Error, message: &str) -> MnemonError {
        MnemonError::Report {
            message: message.to_string(),
            source: Some(Box::new(e)),
        }
    }
}

#[async_trait]
impl ReportStore for SqliteReportStore {
    async fn insert(&self, report: &TmpReport) -> MnemonResult<()> {
        let conn = self.conn.lock().expect("report lock poisoned");
        conn.execute(
            r#"
            INSERT INTO tmp_reports (
                report_id, created_at, level, data_vector_id, out,
                requires_user_verification, verified_by_user
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                report.report_id,
                report.created_at,
                report.level.as_str(),
                report.data_vector_id,
                serde_json::to_string(&report.out)?,
                report.requires_user_verification as i64,
                report.verified_by_user as i64,
            ],
        )
        .map_err(|e| Self::report_err(e, "report insert failed"))?;
        Ok(())
    }

    async fn set_verified(&self, report_id: &str) -> MnemonResult<bool> {
        let conn = self.conn.lock().expect("report lock poisoned");
        let updated = conn
            .execute(
                "UPDATE tmp_reports SET verified_by_user = 1 WHERE report_id = ?1",
                params![report_id],
            )
            .map_err(|e| Self::report_err(e, "report verify failed"))?;
        Ok(updated > 0)
    }

    async fn remove(&self, report_ids: &[String]) -> MnemonResult<usize> {
        let conn = self.conn.lock().expect("report lock poisoned");
        let mut removed = 0;
        for report_id in report_ids {
            removed += conn
                .execute(
                    "DELETE FROM tmp_reports WHERE report_id = ?1",
                    params![report_id],
                )
                .map_err(|e| Self::report_err(e, "report delete failed"))?;
        }
        Ok(removed)
    }

    async fn load(&self) -> MnemonResult<Vec<TmpReport>> {
        let conn = self.conn.lock().expect("report lock poisoned");
        let mut stmt = conn
            .prepare("SELECT * FROM tmp_reports ORDER BY created_at ASC")
            .map_err(|e| Self::report_err(e, "report load failed"))?;
        let rows = stmt
            .query_map([], |row| {
                let level_str: String = row.get("level")?;
                let out_json: String = row.get("out")?;
                Ok((
                    row.get::<_, String>("report_id")?,
                    row.get::<_, String>("created_at")?,
                    level_str,
                    row.get::<_, String>("data_vector_id")?,
                    out_json,
                    row.get::<_, i64>("requires_user_verification")? != 0,
                    row.get::<_, i64>("verified_by_user")? != 0,
                ))
            })
            .map_err(|e| Self::report_err(e, "report load failed"))?;

        let mut reports = Vec::new();
        for row in rows {
            let (report_id, created_at, level_str, data_vector_id, out_json, requires, verified) =
                row.map_err(|e| Self::report_err(e, "report load failed"))?;
            let level = serde_json::from_value(serde_json::Value::String(level_str))?;
            let out = serde_json::from_str(&out_json)?;
            reports.push(TmpReport {
                report_id,
                created_at,
                level,
                data_vector_id,
                out,
                requires_user_verification: requires,
                verified_by_user: verified,
            });
        }
        Ok(reports)
    }
}
