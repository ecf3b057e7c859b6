//! Memory orchestrator - the facade over the triage pipeline.
//!
//! Owns the kernel, both durable stores, the audit trail, and all mutable
//! pipeline state (report list, verification queue, promoted-id set, repair
//! queue). No state lives outside an orchestrator instance.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};

use crate::audit::{AuditEvent, AuditLog};
use crate::config::EngineConfig;
use crate::error::{MnemonError, MnemonResult};
use crate::kernel::TmpKernel;
use crate::traits::{LedgerStore, ReportStore, WaveSnapshot, WaveStore};
use crate::types::{
    DataVector, MemoriseRecord, PromotionRefs, RecordSource, ReportLevel, ScoredResult,
    SensePayload, TmpReport, Verdict,
};

/// Retry policy for transient store failures during the dual write.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 50,
            max_delay_ms: 1000,
        }
    }
}

impl RetryPolicy {
    fn builder(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_max_times(self.max_retries)
            .with_min_delay(Duration::from_millis(self.initial_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
    }
}

/// Compensation for the partial-durability window of the dual write: a
/// ledger row exists whose wave snapshot or `wpm_ref` attach is missing.
#[derive(Debug, Clone)]
pub struct RepairTask {
    pub memorise_id: String,
    /// Set when the wave write already succeeded and only the attach is
    /// outstanding.
    pub wpm_ref: Option<String>,
    snapshot: WaveSnapshot,
}

/// Result of a maintenance pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MaintenanceSummary {
    pub kept: usize,
    pub purged: usize,
    pub pending_verifications: usize,
}

/// Facade: capture, classify, promote, maintain.
pub struct MemoryOrchestrator {
    kernel: TmpKernel,
    ledger: Arc<dyn LedgerStore>,
    wave: Arc<dyn WaveStore>,
    report_store: Option<Arc<dyn ReportStore>>,
    audit: AuditLog,
    reports: Mutex<Vec<TmpReport>>,
    promoted: Mutex<HashSet<String>>,
    repairs: Mutex<Vec<RepairTask>>,
    allow_user_force_save: bool,
    retry: RetryPolicy,
}

impl MemoryOrchestrator {
    /// Build an orchestrator. Fails only on malformed engine configuration.
    pub fn new(
        config: &EngineConfig,
        ledger: Arc<dyn LedgerStore>,
        wave: Arc<dyn WaveStore>,
        audit: AuditLog,
    ) -> MnemonResult<Self> {
        Ok(Self {
            kernel: TmpKernel::new(config)?,
            ledger,
            wave,
            report_store: None,
            audit,
            reports: Mutex::new(Vec::new()),
            promoted: Mutex::new(HashSet::new()),
            repairs: Mutex::new(Vec::new()),
            allow_user_force_save: true,
            retry: RetryPolicy::default(),
        })
    }

    /// Mirror reports into a persisted store so pending verifications
    /// survive restarts.
    pub fn with_report_store(mut self, store: Arc<dyn ReportStore>) -> Self {
        self.report_store = Some(store);
        self
    }

    /// Allow or forbid `user_force_save`.
    pub fn with_allow_user_force_save(mut self, allow: bool) -> Self {
        self.allow_user_force_save = allow;
        self
    }

    /// Override the dual-write retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Pure constructor for a data vector. Generates a fresh id; the
    /// timestamp defaults to the current time when omitted.
    pub fn capture(
        &self,
        context: impl Into<String>,
        sense: SensePayload,
        associations: Option<Vec<String>>,
        timestamp: Option<String>,
        meta: Option<HashMap<String, serde_json::Value>>,
    ) -> DataVector {
        let mut vector = DataVector::new(context, sense);
        if let Some(associations) = associations {
            vector.associations = associations;
        }
        if let Some(timestamp) = timestamp {
            vector.timestamp = timestamp;
        }
        if let Some(meta) = meta {
            vector.meta = meta;
        }
        vector
    }

    /// Run the TMP classifier over a data vector. Appends a report (the list
    /// only ever shrinks via maintenance) and emits a `TMP_OUT` audit event.
    /// Deliberately not idempotent: two calls produce two reports.
    pub async fn run_tmp(&self, vector: &mut DataVector) -> MnemonResult<ScoredResult> {
        let outcome = self.kernel.process(vector);
        let report = TmpReport::new(&vector.id, outcome.out.clone());

        self.audit
            .append(
                AuditEvent::TmpOut,
                serde_json::json!({
                    "report_id": report.report_id,
                    "data_vector_id": vector.id,
                    "verdict": outcome.out.verdict,
                    "level": report.level,
                    "w_total": outcome.out.w_total(),
                    "summary": outcome.report,
                }),
            )
            .await;

        if let Some(store) = &self.report_store {
            // Mirror is best-effort; the in-memory list stays authoritative.
            if let Err(e) = store.insert(&report).await {
                tracing::warn!(report_id = %report.report_id, error = %e, "report mirror failed");
            }
        }

        self.reports
            .lock()
            .expect("report list lock poisoned")
            .push(report);

        Ok(outcome.out)
    }

    /// Promote to durable storage, but only on a bifurcated PASS. Any other
    /// verdict returns `None` with zero side effects.
    pub async fn promote_if_bifurcated(
        &self,
        vector: &DataVector,
        out: &ScoredResult,
        wave_arrays: Option<HashMap<String, Vec<f64>>>,
        wave_attrs: Option<HashMap<String, serde_json::Value>>,
    ) -> MnemonResult<Option<PromotionRefs>> {
        if out.verdict != Verdict::Pass || !out.bifurcation {
            return Ok(None);
        }

        let record = self.build_record(
            vector,
            out,
            "auto promotion after bifurcation",
            RecordSource::Tmp,
        );
        let refs = self.persist_dual(record, wave_arrays, wave_attrs).await?;

        self.audit
            .append(
                AuditEvent::MemorisePromoted,
                serde_json::json!({
                    "memorise_id": refs.memorise_id,
                    "data_vector_id": vector.id,
                    "tsm_ref": refs.tsm_ref,
                    "wpm_ref": refs.wpm_ref,
                }),
            )
            .await;

        Ok(Some(refs))
    }

    /// Durable save on explicit user request, bypassing the bifurcation
    /// gate. Returns `None` without side effects when force saving is
    /// disabled.
    pub async fn user_force_save(
        &self,
        vector: &DataVector,
        out: &ScoredResult,
        reason: &str,
        wave_arrays: Option<HashMap<String, Vec<f64>>>,
        wave_attrs: Option<HashMap<String, serde_json::Value>>,
    ) -> MnemonResult<Option<PromotionRefs>> {
        if !self.allow_user_force_save {
            tracing::info!(vector_id = %vector.id, "user force save is disabled");
            return Ok(None);
        }

        let record = self.build_record(
            vector,
            out,
            format!("user override: {}", reason),
            RecordSource::UserOverride,
        );
        let refs = self.persist_dual(record, wave_arrays, wave_attrs).await?;

        self.audit
            .append(
                AuditEvent::UserOverride,
                serde_json::json!({
                    "memorise_id": refs.memorise_id,
                    "data_vector_id": vector.id,
                    "reason": reason,
                    "tsm_ref": refs.tsm_ref,
                    "wpm_ref": refs.wpm_ref,
                }),
            )
            .await;

        Ok(Some(refs))
    }

    /// Purge fully resolved (Info-level) reports, keep everything pending,
    /// and recompute the verification queue. Idempotent on a quiescent
    /// report list. Operates on a stable snapshot under the report lock, so
    /// a report inserted after the call begins is never dropped.
    pub async fn daily_maintenance(&self) -> MaintenanceSummary {
        let (summary, purged_ids) = {
            let mut reports = self.reports.lock().expect("report list lock poisoned");
            let before = reports.len();
            let purged_ids: Vec<String> = reports
                .iter()
                .filter(|r| r.level == ReportLevel::Info)
                .map(|r| r.report_id.clone())
                .collect();
            reports.retain(|r| r.level != ReportLevel::Info);
            let pending = reports.iter().filter(|r| r.pending_verification()).count();
            (
                MaintenanceSummary {
                    kept: reports.len(),
                    purged: before - reports.len(),
                    pending_verifications: pending,
                },
                purged_ids,
            )
        };

        if let Some(store) = &self.report_store {
            if !purged_ids.is_empty() {
                if let Err(e) = store.remove(&purged_ids).await {
                    tracing::warn!(error = %e, "report mirror purge failed");
                }
            }
        }

        self.audit
            .append(
                AuditEvent::DailyMaintenance,
                serde_json::to_value(summary).unwrap_or_default(),
            )
            .await;

        summary
    }

    /// Confirm a held report after external review. Returns whether a
    /// pending report with that id existed.
    pub async fn mark_verified(&self, report_id: &str) -> MnemonResult<bool> {
        let found = {
            let mut reports = self.reports.lock().expect("report list lock poisoned");
            match reports.iter_mut().find(|r| r.report_id == report_id) {
                Some(report) if report.requires_user_verification => {
                    report.verified_by_user = true;
                    true
                }
                _ => false,
            }
        };

        if !found {
            return Ok(false);
        }

        if let Some(store) = &self.report_store {
            if let Err(e) = store.set_verified(report_id).await {
                tracing::warn!(report_id, error = %e, "report mirror verify failed");
            }
        }

        self.audit
            .append(
                AuditEvent::ReportVerified,
                serde_json::json!({ "report_id": report_id }),
            )
            .await;

        Ok(true)
    }

    /// Reports awaiting human confirmation.
    pub fn verification_queue(&self) -> Vec<TmpReport> {
        self.reports
            .lock()
            .expect("report list lock poisoned")
            .iter()
            .filter(|r| r.pending_verification())
            .cloned()
            .collect()
    }

    /// All reports recorded since startup (or last reload).
    pub fn reports(&self) -> Vec<TmpReport> {
        self.reports
            .lock()
            .expect("report list lock poisoned")
            .clone()
    }

    /// Replace the in-memory report list with the persisted one. Call once
    /// at startup when a report store is configured.
    pub async fn load_persisted_reports(&self) -> MnemonResult<usize> {
        let Some(store) = &self.report_store else {
            return Ok(0);
        };
        let loaded = store.load().await?;
        let count = loaded.len();
        *self.reports.lock().expect("report list lock poisoned") = loaded;
        Ok(count)
    }

    /// Number of outstanding repair tasks.
    pub fn pending_repairs(&self) -> usize {
        self.repairs.lock().expect("repair queue lock poisoned").len()
    }

    /// Re-drive outstanding repair tasks. Returns the number repaired;
    /// tasks that fail again are re-enqueued.
    pub async fn run_repairs(&self) -> MnemonResult<usize> {
        let tasks: Vec<RepairTask> = {
            let mut repairs = self.repairs.lock().expect("repair queue lock poisoned");
            std::mem::take(&mut *repairs)
        };

        let mut repaired = 0;
        for task in tasks {
            match self.run_one_repair(&task).await {
                Ok(()) => {
                    repaired += 1;
                    self.audit
                        .append(
                            AuditEvent::RepairCompleted,
                            serde_json::json!({ "memorise_id": task.memorise_id }),
                        )
                        .await;
                }
                Err(e) => {
                    tracing::warn!(memorise_id = %task.memorise_id, error = %e, "repair failed");
                    self.repairs
                        .lock()
                        .expect("repair queue lock poisoned")
                        .push(task);
                }
            }
        }
        Ok(repaired)
    }

    async fn run_one_repair(&self, task: &RepairTask) -> MnemonResult<()> {
        let wpm_ref = match &task.wpm_ref {
            Some(wpm_ref) => wpm_ref.clone(),
            None => self.retrying("wave put", || self.wave.put(&task.snapshot)).await?,
        };
        self.retrying("wpm_ref attach", || {
            self.ledger.attach_wave_ref(&task.memorise_id, &wpm_ref)
        })
        .await
    }

    fn build_record(
        &self,
        vector: &DataVector,
        out: &ScoredResult,
        rationale: impl Into<String>,
        source: RecordSource,
    ) -> MemoriseRecord {
        // Re-derive type/attr from the vector; promotion only receives the
        // vector and the OUT value.
        let first = self.kernel.first_analysis(&mut vector.clone());
        MemoriseRecord::build(
            vector,
            out,
            first.derived_type,
            first.attr,
            rationale,
            source,
        )
    }

    /// The dual-write saga, in its fixed order: (1) ledger insert, (2) wave
    /// write, (3) attach `wpm_ref` onto the ledger row. Not atomic; a
    /// failure after (1) leaves an observable null `wpm_ref` and enqueues a
    /// repair task. At most one durable write per data vector id.
    async fn persist_dual(
        &self,
        mut record: MemoriseRecord,
        wave_arrays: Option<HashMap<String, Vec<f64>>>,
        wave_attrs: Option<HashMap<String, serde_json::Value>>,
    ) -> MnemonResult<PromotionRefs> {
        {
            let mut promoted = self.promoted.lock().expect("promoted set lock poisoned");
            if !promoted.insert(record.d_id.clone()) {
                return Err(MnemonError::DuplicatePromotion {
                    data_vector_id: record.d_id.clone(),
                });
            }
        }

        // Step 1: ledger row, wpm_ref null.
        let tsm_ref = match self.retrying("ledger insert", || self.ledger.insert(&record)).await {
            Ok(tsm_ref) => tsm_ref,
            Err(e) => {
                // Nothing durable yet; release the id so the caller may retry.
                self.promoted
                    .lock()
                    .expect("promoted set lock poisoned")
                    .remove(&record.d_id);
                return Err(e);
            }
        };
        record.tsm_ref = Some(tsm_ref.clone());

        let snapshot = WaveSnapshot::from_record(&record, wave_arrays, wave_attrs);

        // Step 2: wave snapshot.
        let put_result = self.retrying("wave put", || self.wave.put(&snapshot)).await;
        let wpm_ref = match put_result {
            Ok(wpm_ref) => wpm_ref,
            Err(e) => {
                return Err(self
                    .partial_durability(record.memorise_id.clone(), tsm_ref, None, snapshot, e)
                    .await);
            }
        };

        // Step 3: attach the cross reference.
        let attach_result = self
            .retrying("wpm_ref attach", || {
                self.ledger.attach_wave_ref(&record.memorise_id, &wpm_ref)
            })
            .await;
        if let Err(e) = attach_result {
            return Err(self
                .partial_durability(
                    record.memorise_id.clone(),
                    tsm_ref,
                    Some(wpm_ref),
                    snapshot,
                    e,
                )
                .await);
        }

        Ok(PromotionRefs {
            memorise_id: record.memorise_id,
            tsm_ref,
            wpm_ref,
        })
    }

    async fn partial_durability(
        &self,
        memorise_id: String,
        tsm_ref: String,
        wpm_ref: Option<String>,
        snapshot: WaveSnapshot,
        cause: MnemonError,
    ) -> MnemonError {
        tracing::error!(
            memorise_id = %memorise_id,
            error = %cause,
            "dual write incomplete, enqueueing repair"
        );
        self.repairs
            .lock()
            .expect("repair queue lock poisoned")
            .push(RepairTask {
                memorise_id: memorise_id.clone(),
                wpm_ref,
                snapshot,
            });
        self.audit
            .append(
                AuditEvent::RepairEnqueued,
                serde_json::json!({ "memorise_id": memorise_id, "cause": cause.to_string() }),
            )
            .await;
        MnemonError::PartialDurability {
            memorise_id,
            tsm_ref,
            message: cause.to_string(),
        }
    }

    async fn retrying<T, F, Fut>(&self, op: &str, f: F) -> MnemonResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = MnemonResult<T>>,
    {
        f.retry(self.retry.builder())
            .when(|e: &MnemonError| e.is_transient())
            .notify(|err, dur| {
                tracing::warn!("{} failed, retrying in {:?}: {}", op, dur, err);
            })
            .await
    }
}
