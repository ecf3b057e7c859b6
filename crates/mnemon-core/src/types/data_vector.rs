//! In-flight representation of captured content.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Payload of a captured memory: free text or a numeric series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SensePayload {
    Text(String),
    Numeric(Vec<f64>),
}

impl SensePayload {
    /// Create a text payload.
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Whether the payload carries no content at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.is_empty(),
            Self::Numeric(v) => v.is_empty(),
        }
    }

    /// Text content, if this is a text payload.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Numeric(_) => None,
        }
    }

    /// Length in characters (text) or elements (numeric).
    pub fn len(&self) -> usize {
        match self {
            Self::Text(s) => s.chars().count(),
            Self::Numeric(v) => v.len(),
        }
    }
}

/// A single piece of captured content prior to any durable decision.
///
/// Created by `MemoryOrchestrator::capture` and owned by the caller; the only
/// mutation it ever sees is the timestamp normalization performed by the
/// first analysis stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataVector {
    /// Unique identifier, generated on capture.
    pub id: String,
    /// Where the content came from (chat turn, sensor label, diary, ...).
    pub context: String,
    /// The captured payload itself.
    pub sense: SensePayload,
    /// Ordered association tags. May be empty.
    #[serde(default)]
    pub associations: Vec<String>,
    /// ISO-8601 timestamp. Rewritten to canonical RFC 3339 UTC by the first
    /// analysis stage.
    pub timestamp: String,
    /// Open key/value metadata. Recognized flags: `novelty_hint`,
    /// `trusted_source`, `contradiction_flag`, `ethics_warning`.
    #[serde(default)]
    pub meta: HashMap<String, serde_json::Value>,
}

impl DataVector {
    /// Create a new data vector with a fresh id and the current time.
    pub fn new(context: impl Into<String>, sense: SensePayload) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            context: context.into(),
            sense,
            associations: Vec::new(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            meta: HashMap::new(),
        }
    }

    /// Set the association tags.
    pub fn with_associations(mut self, associations: Vec<String>) -> Self {
        self.associations = associations;
        self
    }

    /// Override the capture timestamp.
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    /// Set the metadata map.
    pub fn with_meta(mut self, meta: HashMap<String, serde_json::Value>) -> Self {
        self.meta = meta;
        self
    }

    /// Whether a boolean meta flag is set to true.
    pub fn meta_flag(&self, key: &str) -> bool {
        self.meta
            .get(key)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_vectors_get_unique_ids() {
        let a = DataVector::new("ctx", SensePayload::text("one"));
        let b = DataVector::new("ctx", SensePayload::text("two"));
        assert_ne!(a.id, b.id);
        assert!(!a.timestamp.is_empty());
    }

    #[test]
    fn sense_emptiness_covers_both_payload_kinds() {
        assert!(SensePayload::text("").is_empty());
        assert!(SensePayload::Numeric(vec![]).is_empty());
        assert!(!SensePayload::text("x").is_empty());
        assert!(!SensePayload::Numeric(vec![0.1]).is_empty());
    }

    #[test]
    fn meta_flag_reads_booleans_only() {
        let mut meta = HashMap::new();
        meta.insert("novelty_hint".to_string(), serde_json::json!(true));
        meta.insert("trusted_source".to_string(), serde_json::json!("yes"));
        let d = DataVector::new("ctx", SensePayload::text("x")).with_meta(meta);
        assert!(d.meta_flag("novelty_hint"));
        assert!(!d.meta_flag("trusted_source"));
        assert!(!d.meta_flag("missing"));
    }
}
