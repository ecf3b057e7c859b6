//! Durable promotion records.

use super::data_vector::{DataVector, SensePayload};
use super::verdict::{ScoredResult, WeightAxes};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use uuid::Uuid;

/// How a record came to be promoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordSource {
    Tmp,
    UserOverride,
}

impl RecordSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordSource::Tmp => "TMP",
            RecordSource::UserOverride => "USER_OVERRIDE",
        }
    }
}

/// References returned by a successful promotion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionRefs {
    pub memorise_id: String,
    pub tsm_ref: String,
    pub wpm_ref: String,
}

/// A durably promoted memory: denormalized copy of the originating data
/// vector plus the scoring that justified the promotion.
///
/// Immutable once built, except for the `wpm_ref` attach step of the
/// dual-write protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoriseRecord {
    /// Primary key across both stores.
    pub memorise_id: String,
    /// Promotion time (RFC 3339 UTC).
    pub created_at: String,
    /// Originating data vector id.
    pub d_id: String,
    pub d_context: String,
    pub d_sense: SensePayload,
    pub d_associations: Vec<String>,
    pub d_timestamp: String,
    pub d_meta: HashMap<String, serde_json::Value>,
    /// Derived type from the first analysis stage, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d_type: Option<String>,
    #[serde(default)]
    pub d_attr: HashMap<String, serde_json::Value>,
    /// Post-gamma weight axes at promotion time.
    pub weights: WeightAxes,
    /// Bifurcation flag of the promoting verdict.
    pub bifurcation: bool,
    /// Why the record was promoted.
    pub rationale: String,
    pub source: RecordSource,
    /// Ledger reference, set by the ledger insert.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tsm_ref: Option<String>,
    /// Wave store reference, attached after the wave write. Null while the
    /// dual write is incomplete.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wpm_ref: Option<String>,
    /// SHA-256 over the identity projection, hex encoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl MemoriseRecord {
    /// Build a record from a data vector and its scored result.
    pub fn build(
        vector: &DataVector,
        out: &ScoredResult,
        derived_type: Option<String>,
        attr: HashMap<String, serde_json::Value>,
        rationale: impl Into<String>,
        source: RecordSource,
    ) -> Self {
        let mut record = Self {
            memorise_id: Uuid::new_v4().to_string(),
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            d_id: vector.id.clone(),
            d_context: vector.context.clone(),
            d_sense: vector.sense.clone(),
            d_associations: vector.associations.clone(),
            d_timestamp: vector.timestamp.clone(),
            d_meta: vector.meta.clone(),
            d_type: derived_type,
            d_attr: attr,
            weights: out.weights,
            bifurcation: out.bifurcation,
            rationale: rationale.into(),
            source,
            tsm_ref: None,
            wpm_ref: None,
            checksum: None,
        };
        record.checksum = Some(record.compute_checksum());
        record
    }

    /// SHA-256 over the fixed, ordered identity projection:
    /// `memorise_id|created_at|d_id|d_context|d_sense`.
    pub fn compute_checksum(&self) -> String {
        let sense = match &self.d_sense {
            SensePayload::Text(s) => s.clone(),
            // Deterministic projection for numeric payloads.
            SensePayload::Numeric(v) => serde_json::to_string(v).unwrap_or_default(),
        };
        let projection = format!(
            "{}|{}|{}|{}|{}",
            self.memorise_id, self.created_at, self.d_id, self.d_context, sense
        );
        let mut hasher = Sha256::new();
        hasher.update(projection.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Whether the stored checksum matches the record contents. Records
    /// without a checksum verify trivially.
    pub fn checksum_valid(&self) -> bool {
        match &self.checksum {
            Some(stored) => *stored == self.compute_checksum(),
            None => true,
        }
    }
}
