//! The two-stage TMP classifier.
//!
//! Each `process` call is a fresh traversal of the state machine
//! `NEW → FIRST_ANALYSIS → {FAIL, HOLD}` terminal, or
//! `→ SECOND_ANALYSIS → {REJECT, HOLD, PASS}` terminal. Stages
//! short-circuit in order; no state survives between calls.
//! Structural, ethical, and policy outcomes are returned as data, never as
//! errors — only configuration problems fail construction.

mod timestamp;

pub use timestamp::{canonicalize, parse_permissive};

use crate::config::EngineConfig;
use crate::error::MnemonResult;
use crate::heuristics::{HeuristicsEngine, SpectralMultiplier};
use crate::types::{AnalysisResult, DataVector, ScoredResult, SensePayload, Verdict};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Decision thresholds over the post-gamma mean weight.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DecisionThresholds {
    /// Below this, Reject.
    pub reject_below: f64,
    /// At or above this, Pass (with bifurcation). Between the two, Hold.
    pub pass_at: f64,
}

impl Default for DecisionThresholds {
    fn default() -> Self {
        Self {
            reject_below: 0.40,
            pass_at: 0.70,
        }
    }
}

/// Which stage produced the terminal verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TmpStage {
    FirstAnalysis,
    SecondAnalysis,
}

/// Full outcome of one classifier traversal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmpOutcome {
    /// First-stage result (always present).
    pub first: AnalysisResult,
    /// The OUT value: final verdict plus scoring.
    pub out: ScoredResult,
    /// Stage that terminated the traversal.
    pub stage: TmpStage,
    /// Human-readable one-line summary of the run.
    pub report: String,
}

/// Two-stage classifier combining heuristic weights with the spectral
/// multiplier.
pub struct TmpKernel {
    heuristics: HeuristicsEngine,
    spectral: SpectralMultiplier,
    thresholds: DecisionThresholds,
}

impl TmpKernel {
    /// Build a kernel from engine configuration. Fails only on malformed
    /// configuration.
    pub fn new(config: &EngineConfig) -> MnemonResult<Self> {
        Ok(Self {
            heuristics: HeuristicsEngine::new(config)?,
            spectral: SpectralMultiplier::new(),
            thresholds: DecisionThresholds::default(),
        })
    }

    /// Override the decision thresholds.
    pub fn with_thresholds(mut self, thresholds: DecisionThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Structural screening. Fails on missing context/sense or an
    /// unparseable timestamp; normalizes the timestamp in place on success.
    /// Passes text of length >= 4; anything else ambiguous holds.
    pub fn first_analysis(&self, vector: &mut DataVector) -> AnalysisResult {
        if vector.context.is_empty() || vector.sense.is_empty() {
            return AnalysisResult::terminal(Verdict::Fail);
        }

        let Some(parsed) = parse_permissive(&vector.timestamp) else {
            return AnalysisResult::terminal(Verdict::Fail);
        };
        vector.timestamp = canonicalize(parsed);

        match &vector.sense {
            SensePayload::Text(text) if text.chars().count() >= 4 => {
                let mut attr = HashMap::new();
                attr.insert(
                    "length".to_string(),
                    serde_json::json!(text.chars().count()),
                );
                AnalysisResult {
                    verdict: Verdict::Pass,
                    derived_type: Some("text".to_string()),
                    attr,
                }
            }
            _ => AnalysisResult::terminal(Verdict::Hold),
        }
    }

    /// Scored screening. Rejects outright on an ethical gate failure;
    /// otherwise applies gamma-scaled weights against the thresholds.
    pub fn second_analysis(&self, vector: &DataVector) -> ScoredResult {
        let gate_input = match &vector.sense {
            SensePayload::Text(text) => text.as_str(),
            SensePayload::Numeric(_) => "",
        };
        if !self.heuristics.ethical_gate(gate_input) {
            tracing::debug!(vector_id = %vector.id, "ethical gate rejected content");
            return ScoredResult {
                verdict: Verdict::Reject,
                weights: Default::default(),
                gamma: 0.0,
                bifurcation: false,
            };
        }

        let base = self.heuristics.weight(vector);
        let categories = self.spectral.categorize(vector);
        let gamma = self.spectral.gamma(&categories);
        let weights = base.scaled(gamma);
        let w_total = weights.mean();

        let verdict = if w_total < self.thresholds.reject_below {
            Verdict::Reject
        } else if w_total < self.thresholds.pass_at {
            Verdict::Hold
        } else {
            Verdict::Pass
        };

        ScoredResult {
            verdict,
            weights,
            gamma,
            // Every Pass currently bifurcates; kept until an independent
            // signal is defined.
            bifurcation: verdict == Verdict::Pass,
        }
    }

    /// Run the full traversal. The second stage only runs after a
    /// first-stage Pass.
    pub fn process(&self, vector: &mut DataVector) -> TmpOutcome {
        let first = self.first_analysis(vector);

        if first.verdict != Verdict::Pass {
            let out = ScoredResult::unscored(first.verdict);
            let report = format!(
                "TMP {}: first analysis terminal for {} (context={:?})",
                out.verdict, vector.id, vector.context
            );
            tracing::debug!(vector_id = %vector.id, verdict = %out.verdict, "first analysis terminal");
            return TmpOutcome {
                first,
                out,
                stage: TmpStage::FirstAnalysis,
                report,
            };
        }

        let out = self.second_analysis(vector);
        let report = format!(
            "TMP {}: w_total={:.3} gamma={:.2} bifurcation={} for {}",
            out.verdict,
            out.w_total(),
            out.gamma,
            out.bifurcation,
            vector.id
        );
        tracing::debug!(vector_id = %vector.id, verdict = %out.verdict, w_total = out.w_total(), "second analysis complete");
        TmpOutcome {
            first,
            out,
            stage: TmpStage::SecondAnalysis,
            report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RulesConfig;

    fn kernel() -> TmpKernel {
        TmpKernel::new(&EngineConfig::default()).unwrap()
    }

    fn kernel_with_patterns(patterns: &[&str]) -> TmpKernel {
        let config = EngineConfig {
            rules: RulesConfig {
                forbidden_patterns: patterns.iter().map(|s| s.to_string()).collect(),
                gate_enabled: true,
            },
            ..Default::default()
        };
        TmpKernel::new(&config).unwrap()
    }

    #[test]
    fn empty_context_fails_without_second_stage() {
        let mut vector = DataVector::new("", SensePayload::text("content present"));
        let outcome = kernel().process(&mut vector);
        assert_eq!(outcome.out.verdict, Verdict::Fail);
        assert_eq!(outcome.stage, TmpStage::FirstAnalysis);
        assert_eq!(outcome.out.gamma, 0.0);
    }

    #[test]
    fn empty_sense_fails() {
        let mut vector = DataVector::new("ctx", SensePayload::text(""));
        assert_eq!(kernel().process(&mut vector).out.verdict, Verdict::Fail);

        let mut vector = DataVector::new("ctx", SensePayload::Numeric(vec![]));
        assert_eq!(kernel().process(&mut vector).out.verdict, Verdict::Fail);
    }

    #[test]
    fn bad_timestamp_fails() {
        let mut vector = DataVector::new("ctx", SensePayload::text("content present"))
            .with_timestamp("not a timestamp");
        let outcome = kernel().process(&mut vector);
        assert_eq!(outcome.out.verdict, Verdict::Fail);
        assert_eq!(outcome.stage, TmpStage::FirstAnalysis);
    }

    #[test]
    fn timestamp_is_normalized_in_place() {
        let mut vector = DataVector::new("ctx", SensePayload::text("content present"))
            .with_timestamp("2026-08-27T12:15:30+02:00");
        kernel().process(&mut vector);
        assert_eq!(vector.timestamp, "2026-08-27T10:15:30.000000Z");
    }

    #[test]
    fn numeric_sense_holds_at_first_stage() {
        let mut vector = DataVector::new("ctx", SensePayload::Numeric(vec![1.0, 2.0, 3.0]));
        let outcome = kernel().process(&mut vector);
        assert_eq!(outcome.out.verdict, Verdict::Hold);
        assert_eq!(outcome.stage, TmpStage::FirstAnalysis);
    }

    #[test]
    fn short_text_holds_at_first_stage() {
        let mut vector = DataVector::new("ctx", SensePayload::text("abc"));
        let outcome = kernel().process(&mut vector);
        assert_eq!(outcome.out.verdict, Verdict::Hold);
        assert_eq!(outcome.stage, TmpStage::FirstAnalysis);
    }

    #[test]
    fn first_stage_pass_derives_text_type() {
        let mut vector = DataVector::new("ctx", SensePayload::text("long enough"));
        let outcome = kernel().process(&mut vector);
        assert_eq!(outcome.first.verdict, Verdict::Pass);
        assert_eq!(outcome.first.derived_type.as_deref(), Some("text"));
        assert_eq!(outcome.first.attr["length"], serde_json::json!(11));
    }

    #[test]
    fn forbidden_content_rejects_at_second_stage() {
        let kernel = kernel_with_patterns(&["illegal"]);
        let mut vector = DataVector::new(
            "ctx",
            SensePayload::text("this is illegal content of sufficient length"),
        );
        let outcome = kernel.process(&mut vector);
        assert_eq!(outcome.out.verdict, Verdict::Reject);
        assert_eq!(outcome.stage, TmpStage::SecondAnalysis);
        assert!(!outcome.out.bifurcation);
    }

    #[test]
    fn novelty_hinted_content_passes_with_bifurcation() {
        let mut meta = HashMap::new();
        meta.insert("novelty_hint".to_string(), serde_json::json!(true));
        let mut vector =
            DataVector::new("T", SensePayload::text("Long enough content to pass analyses."))
                .with_meta(meta);
        let outcome = kernel().process(&mut vector);
        assert_eq!(outcome.out.verdict, Verdict::Pass);
        assert!(outcome.out.bifurcation);
        assert!(outcome.out.w_total() >= 0.70);
    }

    #[test]
    fn plain_content_holds_between_thresholds() {
        let mut vector =
            DataVector::new("T", SensePayload::text("Long enough content to pass analyses."));
        let outcome = kernel().process(&mut vector);
        assert_eq!(outcome.out.verdict, Verdict::Hold);
        let w = outcome.out.w_total();
        assert!((0.40..0.70).contains(&w), "w_total {} outside hold band", w);
    }

    #[test]
    fn flagged_contradictory_content_rejects_on_score() {
        let mut meta = HashMap::new();
        meta.insert("contradiction_flag".to_string(), serde_json::json!(true));
        meta.insert("ethics_warning".to_string(), serde_json::json!(true));
        let mut vector = DataVector::new("ctx", SensePayload::text("dubious"))
            .with_meta(meta);
        let outcome = kernel().process(&mut vector);
        assert_eq!(outcome.out.verdict, Verdict::Reject);
        assert!(outcome.out.w_total() < 0.40);
    }

    #[test]
    fn bifurcation_tracks_pass_exactly() {
        let mut meta = HashMap::new();
        meta.insert("novelty_hint".to_string(), serde_json::json!(true));
        let mut pass_vector =
            DataVector::new("T", SensePayload::text("Long enough content to pass analyses."))
                .with_meta(meta);
        let mut hold_vector =
            DataVector::new("T", SensePayload::text("Long enough content to pass analyses."));

        let kernel = kernel();
        let pass = kernel.process(&mut pass_vector).out;
        let hold = kernel.process(&mut hold_vector).out;
        assert_eq!(pass.bifurcation, pass.verdict == Verdict::Pass);
        assert_eq!(hold.bifurcation, hold.verdict == Verdict::Pass);
    }
}
