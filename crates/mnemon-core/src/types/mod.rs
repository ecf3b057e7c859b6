//! Core data types for the triage pipeline.

mod data_vector;
mod record;
mod report;
mod verdict;

pub use data_vector::{DataVector, SensePayload};
pub use record::{MemoriseRecord, PromotionRefs, RecordSource};
pub use report::{ReportLevel, TmpReport};
pub use verdict::{AnalysisResult, ScoredResult, Verdict, WeightAxes};
