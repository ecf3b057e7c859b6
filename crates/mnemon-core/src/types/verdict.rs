//! Verdicts and scoring results produced by the two analysis stages.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Outcome of the triage pipeline for one data vector.
///
/// `Fail` is only ever produced by the first stage (structural rejection);
/// `Reject` only by the second (policy/ethical rejection). `Hold` can come
/// from either stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Fail,
    Reject,
    Hold,
    Pass,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Fail => "FAIL",
            Verdict::Reject => "REJECT",
            Verdict::Hold => "HOLD",
            Verdict::Pass => "PASS",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of the first (structural) analysis stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// First-stage verdict: Fail, Hold, or Pass.
    pub verdict: Verdict,
    /// Derived content type, set on Pass (currently always "text").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub derived_type: Option<String>,
    /// Derived attributes, set on Pass (currently the content length).
    #[serde(default)]
    pub attr: HashMap<String, serde_json::Value>,
}

impl AnalysisResult {
    /// A terminal first-stage verdict with no derived type.
    pub fn terminal(verdict: Verdict) -> Self {
        Self {
            verdict,
            derived_type: None,
            attr: HashMap::new(),
        }
    }
}

/// The four heuristic weight axes, each in `[0, 1]`.
///
/// Axes: `w_l` linguistic (length/form), `w_s` salience (context and
/// novelty), `w_k` knowledge (token density, trust, associations), `w_e`
/// emotional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightAxes {
    pub w_l: f64,
    pub w_s: f64,
    pub w_k: f64,
    pub w_e: f64,
}

impl WeightAxes {
    /// Clamp every axis into `[0, 1]`.
    pub fn clamped(self) -> Self {
        Self {
            w_l: self.w_l.clamp(0.0, 1.0),
            w_s: self.w_s.clamp(0.0, 1.0),
            w_k: self.w_k.clamp(0.0, 1.0),
            w_e: self.w_e.clamp(0.0, 1.0),
        }
    }

    /// Multiply every axis by `gamma`, clamping back into `[0, 1]`.
    pub fn scaled(self, gamma: f64) -> Self {
        Self {
            w_l: self.w_l * gamma,
            w_s: self.w_s * gamma,
            w_k: self.w_k * gamma,
            w_e: self.w_e * gamma,
        }
        .clamped()
    }

    /// Mean of the four axes.
    pub fn mean(&self) -> f64 {
        (self.w_l + self.w_s + self.w_k + self.w_e) / 4.0
    }
}

/// Result of the second (scored) analysis stage — the pipeline's OUT value.
///
/// When the first stage short-circuits (Fail/Hold), the axes and gamma are
/// all zero so the absence of a second stage is observable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredResult {
    /// Final verdict for this data vector.
    pub verdict: Verdict,
    /// Post-gamma weight axes.
    pub weights: WeightAxes,
    /// Spectral multiplier applied to the axes, in `[0, 2]`.
    pub gamma: f64,
    /// Whether the verdict is strong enough for automatic promotion. Only
    /// meaningful alongside a Pass verdict.
    pub bifurcation: bool,
}

impl ScoredResult {
    /// OUT value for a first-stage short-circuit: the structural verdict
    /// with no scoring performed.
    pub fn unscored(verdict: Verdict) -> Self {
        Self {
            verdict,
            weights: WeightAxes::default(),
            gamma: 0.0,
            bifurcation: false,
        }
    }

    /// Mean of the post-gamma axes.
    pub fn w_total(&self) -> f64 {
        self.weights.mean()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaling_clamps_into_unit_interval() {
        let axes = WeightAxes {
            w_l: 0.8,
            w_s: 0.9,
            w_k: 0.3,
            w_e: 0.5,
        };
        let scaled = axes.scaled(1.8);
        assert_eq!(scaled.w_l, 1.0);
        assert_eq!(scaled.w_s, 1.0);
        assert!((scaled.w_k - 0.54).abs() < 1e-9);
        assert!((scaled.w_e - 0.9).abs() < 1e-9);
    }

    #[test]
    fn unscored_result_is_visibly_unscored() {
        let out = ScoredResult::unscored(Verdict::Fail);
        assert_eq!(out.verdict, Verdict::Fail);
        assert_eq!(out.gamma, 0.0);
        assert_eq!(out.w_total(), 0.0);
        assert!(!out.bifurcation);
    }

    #[test]
    fn verdicts_serialize_uppercase() {
        assert_eq!(
            serde_json::to_string(&Verdict::Reject).unwrap(),
            "\"REJECT\""
        );
    }
}
