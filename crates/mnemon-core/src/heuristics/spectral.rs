//! Spectral categorization and the gamma multiplier.

use crate::types::{DataVector, SensePayload};
use serde::{Deserialize, Serialize};

/// Categorical scores over a data vector, each in `[-1, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpectralCategories {
    pub clarity: f64,
    pub relevance: f64,
    pub originality: f64,
    pub coherence: f64,
    pub ethical_harmony: f64,
}

impl SpectralCategories {
    fn values(&self) -> [f64; 5] {
        [
            self.clarity,
            self.relevance,
            self.originality,
            self.coherence,
            self.ethical_harmony,
        ]
    }

    /// Median of the five category values.
    pub fn median(&self) -> f64 {
        let mut values = self.values();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        values[2]
    }
}

/// Stateless mapping from categorical scores to a single multiplier.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpectralMultiplier;

impl SpectralMultiplier {
    pub fn new() -> Self {
        Self
    }

    /// Score a data vector on the five spectral categories.
    pub fn categorize(&self, vector: &DataVector) -> SpectralCategories {
        let sense_len = vector.sense.len();

        let clarity: f64 = if sense_len >= 20 {
            0.5
        } else if sense_len >= 4 {
            0.0
        } else {
            -0.5
        };

        let relevance: f64 = if vector.context.is_empty() { -0.5 } else { 0.5 };

        let originality: f64 = if vector.meta_flag("novelty_hint") { 0.5 } else { 0.0 };

        let mut coherence: f64 = 0.2;
        if !vector.associations.is_empty() {
            coherence += 0.1;
        }
        if vector.meta_flag("contradiction_flag") {
            coherence -= 0.6;
        }

        let mut ethical_harmony: f64 = 0.5;
        if vector.meta_flag("ethics_warning") {
            ethical_harmony -= 1.0;
        }

        // Numeric payloads carry no linguistic clarity signal.
        let clarity = match &vector.sense {
            SensePayload::Text(_) => clarity,
            SensePayload::Numeric(_) => 0.0,
        };

        SpectralCategories {
            clarity: clarity.clamp(-1.0, 1.0),
            relevance: relevance.clamp(-1.0, 1.0),
            originality: originality.clamp(-1.0, 1.0),
            coherence: coherence.clamp(-1.0, 1.0),
            ethical_harmony: ethical_harmony.clamp(-1.0, 1.0),
        }
    }

    /// `gamma = 1 + median(categories)`, clamped to `[0, 2]`.
    pub fn gamma(&self, categories: &SpectralCategories) -> f64 {
        (1.0 + categories.median()).clamp(0.0, 2.0)
    }
}
