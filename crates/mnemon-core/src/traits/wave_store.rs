//! Wave store trait (WPM) - secondary store for auxiliary payloads.

use crate::error::MnemonResult;
use crate::types::{MemoriseRecord, SensePayload, WeightAxes};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A wave snapshot: the same denormalized record fields the ledger carries,
/// plus optional named array datasets and free-form attributes. A snapshot
/// is a self-contained secondary copy; losing the ledger row must not lose
/// the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaveSnapshot {
    pub memorise_id: String,
    pub created_at: String,
    pub d_id: String,
    pub d_context: String,
    pub d_sense: SensePayload,
    #[serde(default)]
    pub d_associations: Vec<String>,
    pub d_timestamp: String,
    #[serde(default)]
    pub d_meta: HashMap<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d_type: Option<String>,
    #[serde(default)]
    pub d_attr: HashMap<String, serde_json::Value>,
    /// Post-gamma weight axes at promotion time.
    pub weights: WeightAxes,
    pub bifurcation: bool,
    /// Named array datasets. Empty for the metadata-only variant.
    #[serde(default)]
    pub arrays: HashMap<String, Vec<f64>>,
    /// Free-form attributes.
    #[serde(default)]
    pub attrs: HashMap<String, serde_json::Value>,
}

impl WaveSnapshot {
    /// Build a snapshot from a promoted record, with optional arrays and
    /// attributes. Omitting both yields the metadata-only variant.
    pub fn from_record(
        record: &MemoriseRecord,
        arrays: Option<HashMap<String, Vec<f64>>>,
        attrs: Option<HashMap<String, serde_json::Value>>,
    ) -> Self {
        Self {
            memorise_id: record.memorise_id.clone(),
            created_at: record.created_at.clone(),
            d_id: record.d_id.clone(),
            d_context: record.d_context.clone(),
            d_sense: record.d_sense.clone(),
            d_associations: record.d_associations.clone(),
            d_timestamp: record.d_timestamp.clone(),
            d_meta: record.d_meta.clone(),
            d_type: record.d_type.clone(),
            d_attr: record.d_attr.clone(),
            weights: record.weights,
            bifurcation: record.bifurcation,
            arrays: arrays.unwrap_or_default(),
            attrs: attrs.unwrap_or_default(),
        }
    }
}

/// Secondary durable store, keyed by `memorise_id` and cross-referenced from
/// the ledger via `wpm_ref`.
#[async_trait]
pub trait WaveStore: Send + Sync {
    /// Persist a snapshot. Returns the `wpm_ref` for it.
    async fn put(&self, snapshot: &WaveSnapshot) -> MnemonResult<String>;

    /// Fetch a snapshot by memorise id.
    async fn get(&self, memorise_id: &str) -> MnemonResult<Option<WaveSnapshot>>;

    /// The reference a snapshot for this id would be stored under.
    fn key_for(&self, memorise_id: &str) -> String;
}
