//! SQLite-backed ledger store (TSM).

use async_trait::async_trait;
use mnemon_core::{
    LedgerStore, MemoriseRecord, MnemonError, MnemonResult, RecordSource, SensePayload, WeightAxes,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Mutex;

/// Primary relational store of promoted records. One logical table
/// `memories`, keyed by `memorise_id`; `wpm_ref` is nullable so the
/// partial-durability window of the dual write stays observable.
pub struct SqliteLedgerStore {
    conn: Mutex<Connection>,
}

/// Row as stored, before JSON columns are decoded.
struct RawLedgerRow {
    memorise_id: String,
    created_at: String,
    d_id: String,
    d_context: String,
    d_sense: String,
    d_associations: String,
    d_timestamp: String,
    d_meta: String,
    d_type: Option<String>,
    d_attr: String,
    w_l: f64,
    w_s: f64,
    w_k: f64,
    w_e: f64,
    w_f: i64,
    rationale: String,
    source: String,
    tsm_ref: String,
    wpm_ref: Option<String>,
    checksum: Option<String>,
}

impl SqliteLedgerStore {
    /// Open (or create) a ledger database at the given path.
    pub fn new(path: impl AsRef<Path>) -> MnemonResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path.as_ref())
            .map_err(|e| MnemonError::ledger_with_source("failed to open ledger db", e))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// In-memory ledger (for testing).
    pub fn in_memory() -> MnemonResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| MnemonError::ledger_with_source("failed to open in-memory ledger", e))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> MnemonResult<()> {
        let conn = self.conn.lock().expect("ledger lock poisoned");
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS memories (
                memorise_id    TEXT PRIMARY KEY,
                created_at     TEXT NOT NULL,
                d_id           TEXT NOT NULL,
                d_context      TEXT NOT NULL,
                d_sense        TEXT NOT NULL,
                d_associations TEXT NOT NULL,
                d_timestamp    TEXT NOT NULL,
                d_meta         TEXT NOT NULL,
                d_type         TEXT,
                d_attr         TEXT NOT NULL,
                w_l            REAL NOT NULL,
                w_s            REAL NOT NULL,
                w_k            REAL NOT NULL,
                w_e            REAL NOT NULL,
                w_f            INTEGER NOT NULL,
                rationale      TEXT NOT NULL,
                source         TEXT NOT NULL,
                tsm_ref        TEXT NOT NULL,
                wpm_ref        TEXT,
                checksum       TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_memories_d_id ON memories(d_id);
            CREATE INDEX IF NOT EXISTS idx_memories_created ON memories(created_at);
        "#,
        )
        .map_err(|e| MnemonError::ledger_with_source("failed to create ledger schema", e))?;
        Ok(())
    }

    fn read_row(row: &Row<'_>) -> rusqlite::Result<RawLedgerRow> {
        Ok(RawLedgerRow {
            memorise_id: row.get("memorise_id")?,
            created_at: row.get("created_at")?,
            d_id: row.get("d_id")?,
            d_context: row.get("d_context")?,
            d_sense: row.get("d_sense")?,
            d_associations: row.get("d_associations")?,
            d_timestamp: row.get("d_timestamp")?,
            d_meta: row.get("d_meta")?,
            d_type: row.get("d_type")?,
            d_attr: row.get("d_attr")?,
            w_l: row.get("w_l")?,
            w_s: row.get("w_s")?,
            w_k: row.get("w_k")?,
            w_e: row.get("w_e")?,
            w_f: row.get("w_f")?,
            rationale: row.get("rationale")?,
            source: row.get("source")?,
            tsm_ref: row.get("tsm_ref")?,
            wpm_ref: row.get("wpm_ref")?,
            checksum: row.get("checksum")?,
        })
    }

    fn json_col<T: serde::de::DeserializeOwned>(
        memorise_id: &str,
        column: &str,
        raw: &str,
    ) -> MnemonResult<T> {
        serde_json::from_str(raw).map_err(|e| MnemonError::Consistency {
            memorise_id: memorise_id.to_string(),
            message: format!("malformed {} column: {}", column, e),
        })
    }

    /// Decode a raw row. A JSON column that no longer parses is corruption,
    /// not a default, even though the checksum does not cover it.
    fn decode(raw: RawLedgerRow) -> MnemonResult<MemoriseRecord> {
        let d_sense: SensePayload = Self::json_col(&raw.memorise_id, "d_sense", &raw.d_sense)?;
        let d_associations =
            Self::json_col(&raw.memorise_id, "d_associations", &raw.d_associations)?;
        let d_meta = Self::json_col(&raw.memorise_id, "d_meta", &raw.d_meta)?;
        let d_attr = Self::json_col(&raw.memorise_id, "d_attr", &raw.d_attr)?;
        let source = match raw.source.as_str() {
            "TMP" => RecordSource::Tmp,
            "USER_OVERRIDE" => RecordSource::UserOverride,
            other => {
                return Err(MnemonError::Consistency {
                    memorise_id: raw.memorise_id,
                    message: format!("unknown source {:?}", other),
                })
            }
        };

        Ok(MemoriseRecord {
            memorise_id: raw.memorise_id,
            created_at: raw.created_at,
            d_id: raw.d_id,
            d_context: raw.d_context,
            d_sense,
            d_associations,
            d_timestamp: raw.d_timestamp,
            d_meta,
            d_type: raw.d_type,
            d_attr,
            weights: WeightAxes {
                w_l: raw.w_l,
                w_s: raw.w_s,
                w_k: raw.w_k,
                w_e: raw.w_e,
            },
            bifurcation: raw.w_f != 0,
            rationale: raw.rationale,
            source,
            tsm_ref: Some(raw.tsm_ref),
            wpm_ref: raw.wpm_ref,
            checksum: raw.checksum,
        })
    }

    fn verify(record: MemoriseRecord) -> MnemonResult<MemoriseRecord> {
        if !record.checksum_valid() {
            return Err(MnemonError::Consistency {
                memorise_id: record.memorise_id,
                message: "ledger row checksum mismatch".to_string(),
            });
        }
        Ok(record)
    }
}

#[async_trait]
impl LedgerStore for SqliteLedgerStore {
    async fn insert(&self, record: &MemoriseRecord) -> MnemonResult<String> {
        let tsm_ref = format!("tsm://memories/{}", record.memorise_id);
        let conn = self.conn.lock().expect("ledger lock poisoned");
        conn.execute(
            r#"
            INSERT INTO memories (
                memorise_id, created_at, d_id, d_context, d_sense,
                d_associations, d_timestamp, d_meta, d_type, d_attr,
                w_l, w_s, w_k, w_e, w_f,
                rationale, source, tsm_ref, wpm_ref, checksum
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                      ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, NULL, ?19)
            "#,
            params![
                record.memorise_id,
                record.created_at,
                record.d_id,
                record.d_context,
                serde_json::to_string(&record.d_sense)?,
                serde_json::to_string(&record.d_associations)?,
                record.d_timestamp,
                serde_json::to_string(&record.d_meta)?,
                record.d_type,
                serde_json::to_string(&record.d_attr)?,
                record.weights.w_l,
                record.weights.w_s,
                record.weights.w_k,
                record.weights.w_e,
                record.bifurcation as i64,
                record.rationale,
                record.source.as_str(),
                tsm_ref,
                record.checksum,
            ],
        )
        .map_err(|e| MnemonError::ledger_with_source("ledger insert failed", e))?;
        Ok(tsm_ref)
    }

    async fn attach_wave_ref(&self, memorise_id: &str, wpm_ref: &str) -> MnemonResult<()> {
        let conn = self.conn.lock().expect("ledger lock poisoned");
        let updated = conn
            .execute(
                "UPDATE memories SET wpm_ref = ?1 WHERE memorise_id = ?2",
                params![wpm_ref, memorise_id],
            )
            .map_err(|e| MnemonError::ledger_with_source("wpm_ref attach failed", e))?;
        if updated == 0 {
            return Err(MnemonError::NotFound {
                memorise_id: memorise_id.to_string(),
            });
        }
        Ok(())
    }

    async fn get(&self, memorise_id: &str) -> MnemonResult<Option<MemoriseRecord>> {
        let raw = {
            let conn = self.conn.lock().expect("ledger lock poisoned");
            conn.query_row(
                "SELECT * FROM memories WHERE memorise_id = ?1",
                params![memorise_id],
                Self::read_row,
            )
            .optional()
            .map_err(|e| MnemonError::ledger_with_source("ledger read failed", e))?
        };
        raw.map(|raw| Self::decode(raw).and_then(Self::verify))
            .transpose()
    }

    async fn list(&self, limit: Option<usize>) -> MnemonResult<Vec<MemoriseRecord>> {
        let raws: Vec<RawLedgerRow> = {
            let conn = self.conn.lock().expect("ledger lock poisoned");
            let mut stmt = conn
                .prepare("SELECT * FROM memories ORDER BY created_at DESC LIMIT ?1")
                .map_err(|e| MnemonError::ledger_with_source("ledger list failed", e))?;
            let rows = stmt
                .query_map(params![limit.map(|l| l as i64).unwrap_or(-1)], Self::read_row)
                .map_err(|e| MnemonError::ledger_with_source("ledger list failed", e))?;
            rows.collect::<Result<_, _>>()
                .map_err(|e| MnemonError::ledger_with_source("ledger list failed", e))?
        };
        raws.into_iter()
            .map(|raw| Self::decode(raw).and_then(Self::verify))
            .collect()
    }

    async fn count(&self) -> MnemonResult<u64> {
        let conn = self.conn.lock().expect("ledger lock poisoned");
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))
            .map_err(|e| MnemonError::ledger_with_source("ledger count failed", e))?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemon_core::{DataVector, ScoredResult, Verdict};
    use std::collections::HashMap;

    fn sample_record() -> MemoriseRecord {
        let vector = DataVector::new("test", SensePayload::text("content worth keeping"));
        let out = ScoredResult {
            verdict: Verdict::Pass,
            weights: WeightAxes {
                w_l: 0.6,
                w_s: 0.9,
                w_k: 0.5,
                w_e: 0.8,
            },
            gamma: 1.5,
            bifurcation: true,
        };
        MemoriseRecord::build(
            &vector,
            &out,
            Some("text".to_string()),
            HashMap::new(),
            "auto promotion after bifurcation",
            RecordSource::Tmp,
        )
    }

    #[tokio::test]
    async fn insert_leaves_wpm_ref_null_until_attached() {
        let store = SqliteLedgerStore::in_memory().unwrap();
        let record = sample_record();
        let tsm_ref = store.insert(&record).await.unwrap();
        assert_eq!(tsm_ref, format!("tsm://memories/{}", record.memorise_id));

        let fetched = store.get(&record.memorise_id).await.unwrap().unwrap();
        assert!(fetched.wpm_ref.is_none());

        store
            .attach_wave_ref(&record.memorise_id, "wpm://abc")
            .await
            .unwrap();
        let fetched = store.get(&record.memorise_id).await.unwrap().unwrap();
        assert_eq!(fetched.wpm_ref.as_deref(), Some("wpm://abc"));
    }

    #[tokio::test]
    async fn round_trip_preserves_denormalized_fields() {
        let store = SqliteLedgerStore::in_memory().unwrap();
        let record = sample_record();
        store.insert(&record).await.unwrap();

        let fetched = store.get(&record.memorise_id).await.unwrap().unwrap();
        assert_eq!(fetched.d_context, record.d_context);
        assert_eq!(fetched.d_sense, record.d_sense);
        assert_eq!(fetched.weights, record.weights);
        assert!(fetched.bifurcation);
        assert_eq!(fetched.source, RecordSource::Tmp);
        assert_eq!(fetched.checksum, record.checksum);
    }

    #[tokio::test]
    async fn tampered_row_fails_checksum_on_read() {
        let store = SqliteLedgerStore::in_memory().unwrap();
        let record = sample_record();
        store.insert(&record).await.unwrap();

        {
            let conn = store.conn.lock().unwrap();
            conn.execute(
                "UPDATE memories SET d_context = 'tampered' WHERE memorise_id = ?1",
                params![record.memorise_id],
            )
            .unwrap();
        }

        let err = store.get(&record.memorise_id).await.unwrap_err();
        assert!(matches!(err, MnemonError::Consistency { .. }));
    }

    #[tokio::test]
    async fn corrupt_json_column_is_a_consistency_error() {
        // d_meta is outside the checksum projection; corruption there must
        // still surface on read instead of degrading to a default.
        let store = SqliteLedgerStore::in_memory().unwrap();
        let record = sample_record();
        store.insert(&record).await.unwrap();

        {
            let conn = store.conn.lock().unwrap();
            conn.execute(
                "UPDATE memories SET d_meta = 'not json' WHERE memorise_id = ?1",
                params![record.memorise_id],
            )
            .unwrap();
        }

        let err = store.get(&record.memorise_id).await.unwrap_err();
        assert!(matches!(err, MnemonError::Consistency { .. }));

        let err = store.list(None).await.unwrap_err();
        assert!(matches!(err, MnemonError::Consistency { .. }));
    }

    #[tokio::test]
    async fn attach_to_missing_row_is_not_found() {
        let store = SqliteLedgerStore::in_memory().unwrap();
        let err = store.attach_wave_ref("nope", "wpm://x").await.unwrap_err();
        assert!(matches!(err, MnemonError::NotFound { .. }));
    }

    #[tokio::test]
    async fn duplicate_memorise_id_is_rejected_by_primary_key() {
        let store = SqliteLedgerStore::in_memory().unwrap();
        let record = sample_record();
        store.insert(&record).await.unwrap();
        let err = store.insert(&record).await.unwrap_err();
        assert!(matches!(err, MnemonError::Ledger { .. }));
    }
}
