//! Heuristic weighting and the ethical gate.
//!
//! The engine is a pure function of `(DataVector, config)`; all configuration
//! is compiled once at construction. Regex compilation failures surface as
//! fatal configuration errors, never per item.

mod spectral;

pub use spectral::{SpectralCategories, SpectralMultiplier};

use crate::config::{EngineConfig, SelfHeuristics, UserHeuristics};
use crate::error::{MnemonError, MnemonResult};
use crate::types::{DataVector, SensePayload, WeightAxes};
use regex::RegexBuilder;

/// Heuristic scoring engine: four weight axes plus the ethical gate.
#[derive(Debug)]
pub struct HeuristicsEngine {
    forbidden: Vec<regex::Regex>,
    gate_enabled: bool,
    user: UserHeuristics,
    self_heuristics: SelfHeuristics,
}

impl HeuristicsEngine {
    /// Compile the configured rule set. Fails fast on an invalid pattern.
    pub fn new(config: &EngineConfig) -> MnemonResult<Self> {
        let forbidden = config
            .rules
            .forbidden_patterns
            .iter()
            .map(|pattern| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| {
                        MnemonError::Configuration(format!(
                            "invalid forbidden pattern {:?}: {}",
                            pattern, e
                        ))
                    })
            })
            .collect::<MnemonResult<Vec<_>>>()?;

        Ok(Self {
            forbidden,
            gate_enabled: config.rules.gate_enabled,
            user: config.user,
            self_heuristics: config.self_heuristics,
        })
    }

    /// Returns false iff any forbidden pattern matches the text. Permissive
    /// when the gate is disabled or no patterns are configured.
    pub fn ethical_gate(&self, text: &str) -> bool {
        if !self.gate_enabled {
            return true;
        }
        !self.forbidden.iter().any(|re| re.is_match(text))
    }

    /// Compute the four weight axes for a data vector, clamped to `[0, 1]`.
    pub fn weight(&self, vector: &DataVector) -> WeightAxes {
        let sense_len = vector.sense.len();
        let token_count = match &vector.sense {
            SensePayload::Text(s) => s.split_whitespace().count(),
            SensePayload::Numeric(v) => v.len(),
        };

        // Linguistic: content length, long-form boost, too-short penalty.
        let mut w_l = 0.35 + (sense_len.min(400) as f64 / 400.0) * 0.5;
        if sense_len >= self.self_heuristics.long_form_threshold {
            w_l += self.self_heuristics.long_form_boost;
        }
        if sense_len < self.self_heuristics.too_short_threshold {
            w_l -= self.self_heuristics.too_short_penalty;
        }

        // Salience: context presence and novelty.
        let mut w_s = 0.25;
        if !vector.context.is_empty() {
            w_s += 0.25;
        }
        if vector.meta_flag("novelty_hint") {
            w_s += self.user.novelty_boost;
        }

        // Knowledge: token density, trust, associations, contradictions.
        let mut w_k = 0.30 + (token_count.min(64) as f64 / 64.0) * 0.5;
        if vector.meta_flag("trusted_source") {
            w_k += self.user.trusted_source_boost;
        }
        if !vector.associations.is_empty() {
            w_k += self.self_heuristics.associations_boost;
        }
        if vector.meta_flag("contradiction_flag") {
            w_k -= self.user.contradiction_penalty;
        }

        // Emotional: novelty lifts, ethics warnings depress.
        let mut w_e = 0.45;
        if vector.meta_flag("novelty_hint") {
            w_e += self.user.novelty_boost;
        }
        if vector.meta_flag("ethics_warning") {
            w_e -= self.user.ethics_penalty;
        }

        WeightAxes { w_l, w_s, w_k, w_e }.clamped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RulesConfig;
    use std::collections::HashMap;

    fn engine_with_patterns(patterns: &[&str]) -> HeuristicsEngine {
        let config = EngineConfig {
            rules: RulesConfig {
                forbidden_patterns: patterns.iter().map(|s| s.to_string()).collect(),
                gate_enabled: true,
            },
            ..Default::default()
        };
        HeuristicsEngine::new(&config).unwrap()
    }

    #[test]
    fn gate_is_permissive_without_patterns() {
        let engine = engine_with_patterns(&[]);
        assert!(engine.ethical_gate("anything at all"));
    }

    #[test]
    fn gate_matches_case_insensitively() {
        let engine = engine_with_patterns(&["illegal"]);
        assert!(!engine.ethical_gate("this is ILLEGAL content"));
        assert!(engine.ethical_gate("this is fine"));
    }

    #[test]
    fn disabled_gate_lets_everything_through() {
        let config = EngineConfig {
            rules: RulesConfig {
                forbidden_patterns: vec!["illegal".to_string()],
                gate_enabled: false,
            },
            ..Default::default()
        };
        let engine = HeuristicsEngine::new(&config).unwrap();
        assert!(engine.ethical_gate("illegal"));
    }

    #[test]
    fn invalid_pattern_is_a_configuration_error() {
        let config = EngineConfig {
            rules: RulesConfig {
                forbidden_patterns: vec!["[unclosed".to_string()],
                gate_enabled: true,
            },
            ..Default::default()
        };
        let err = HeuristicsEngine::new(&config).unwrap_err();
        assert!(matches!(err, MnemonError::Configuration(_)));
    }

    #[test]
    fn axes_stay_in_unit_interval() {
        let engine = engine_with_patterns(&[]);
        let mut meta = HashMap::new();
        meta.insert("novelty_hint".to_string(), serde_json::json!(true));
        meta.insert("trusted_source".to_string(), serde_json::json!(true));
        let vector = DataVector::new("ctx", SensePayload::text("x".repeat(600)))
            .with_associations(vec!["tag".to_string()])
            .with_meta(meta);

        let axes = engine.weight(&vector);
        for w in [axes.w_l, axes.w_s, axes.w_k, axes.w_e] {
            assert!((0.0..=1.0).contains(&w), "axis out of range: {}", w);
        }
    }

    #[test]
    fn novelty_boosts_salience_and_emotional_axes() {
        let engine = engine_with_patterns(&[]);
        let plain = DataVector::new("ctx", SensePayload::text("some plain content here"));
        let mut meta = HashMap::new();
        meta.insert("novelty_hint".to_string(), serde_json::json!(true));
        let novel = plain.clone().with_meta(meta);

        let base = engine.weight(&plain);
        let boosted = engine.weight(&novel);
        assert!(boosted.w_s > base.w_s);
        assert!(boosted.w_e > base.w_e);
        assert_eq!(boosted.w_l, base.w_l);
    }

    #[test]
    fn penalties_depress_their_axes() {
        let engine = engine_with_patterns(&[]);
        let plain = DataVector::new("ctx", SensePayload::text("some plain content here"));
        let mut meta = HashMap::new();
        meta.insert("contradiction_flag".to_string(), serde_json::json!(true));
        meta.insert("ethics_warning".to_string(), serde_json::json!(true));
        let flagged = plain.clone().with_meta(meta);

        let base = engine.weight(&plain);
        let penalized = engine.weight(&flagged);
        assert!(penalized.w_k < base.w_k);
        assert!(penalized.w_e < base.w_e);
    }

    #[test]
    fn too_short_content_is_penalized() {
        let engine = engine_with_patterns(&[]);
        let short = DataVector::new("ctx", SensePayload::text("tiny"));
        let longer = DataVector::new("ctx", SensePayload::text("meaningfully longer"));
        assert!(engine.weight(&short).w_l < engine.weight(&longer).w_l);
    }
}
