//! mnemon-core - Core library for mnemon.
//!
//! This crate provides the types, TMP classifier, store traits, and
//! orchestrator for the mnemon memory triage engine.
//!
//! # Example
//!
//! ```ignore
//! use mnemon_core::{EngineConfig, MemoryOrchestrator, SensePayload};
//!
//! let config = EngineConfig::default();
//! let orchestrator = MemoryOrchestrator::new(config, ledger, wave, audit)?;
//!
//! // Capture and classify
//! let mut vector = orchestrator.capture("diary", SensePayload::text("..."), None, None, None);
//! let out = orchestrator.run_tmp(&mut vector).await?;
//!
//! // Promote to durable storage when the verdict allows it
//! let refs = orchestrator.promote_if_bifurcated(&vector, &out, None, None).await?;
//! ```

pub mod audit;
pub mod config;
pub mod error;
pub mod heuristics;
pub mod kernel;
pub mod orchestrator;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use audit::{AuditEvent, AuditLog};
pub use config::{EngineConfig, RulesConfig, SelfHeuristics, StoreConfig, UserHeuristics};
pub use error::{MnemonError, MnemonResult};
pub use heuristics::{HeuristicsEngine, SpectralCategories, SpectralMultiplier};
pub use kernel::{DecisionThresholds, TmpKernel, TmpOutcome, TmpStage};
pub use orchestrator::{MaintenanceSummary, MemoryOrchestrator, RepairTask, RetryPolicy};
pub use traits::{LedgerStore, ReportStore, WaveSnapshot, WaveStore};
pub use types::{
    AnalysisResult, DataVector, MemoriseRecord, PromotionRefs, RecordSource, ReportLevel,
    ScoredResult, SensePayload, TmpReport, Verdict, WeightAxes,
};
