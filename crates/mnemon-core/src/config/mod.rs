//! Configuration system for mnemon.
//!
//! Three optional JSON documents feed the engine: immutable rules (forbidden
//! patterns, gate flags), user heuristics (boosts/penalties), and self
//! heuristics (form-based adjustments). A missing file silently falls back to
//! the typed defaults below; a present-but-malformed file is a fatal
//! configuration error.

use crate::error::{MnemonError, MnemonResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Immutable rule set gating what may ever be persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Case-insensitive regex patterns; any match fails the ethical gate.
    pub forbidden_patterns: Vec<String>,
    /// Master switch for the ethical gate.
    pub gate_enabled: bool,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            forbidden_patterns: Vec::new(),
            gate_enabled: true,
        }
    }
}

/// User-supplied boosts and penalties applied to the weight axes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct UserHeuristics {
    /// Added to salience and emotional axes when meta `novelty_hint` is set.
    pub novelty_boost: f64,
    /// Added to the knowledge axis when meta `trusted_source` is set.
    pub trusted_source_boost: f64,
    /// Subtracted from the knowledge axis when meta `contradiction_flag` is set.
    pub contradiction_penalty: f64,
    /// Subtracted from the emotional axis when meta `ethics_warning` is set.
    pub ethics_penalty: f64,
}

impl Default for UserHeuristics {
    fn default() -> Self {
        Self {
            novelty_boost: 0.15,
            trusted_source_boost: 0.15,
            contradiction_penalty: 0.20,
            ethics_penalty: 0.25,
        }
    }
}

/// Self-derived adjustments based on the form of the content itself.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SelfHeuristics {
    /// Added to the linguistic axis at or above `long_form_threshold` chars.
    pub long_form_boost: f64,
    pub long_form_threshold: usize,
    /// Added to the knowledge axis when associations are present.
    pub associations_boost: f64,
    /// Subtracted from the linguistic axis below `too_short_threshold` chars.
    pub too_short_penalty: f64,
    pub too_short_threshold: usize,
}

impl Default for SelfHeuristics {
    fn default() -> Self {
        Self {
            long_form_boost: 0.10,
            long_form_threshold: 280,
            associations_boost: 0.10,
            too_short_penalty: 0.15,
            too_short_threshold: 12,
        }
    }
}

/// Full engine configuration: the three heuristic documents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub rules: RulesConfig,
    pub user: UserHeuristics,
    pub self_heuristics: SelfHeuristics,
}

impl EngineConfig {
    /// Load from three optional JSON documents. Missing file means the typed
    /// default for that document; a file that exists but does not parse is a
    /// fatal error. Absent keys inside a present document fall back to the
    /// field defaults (`#[serde(default)]`).
    pub fn load(
        rules_path: Option<&Path>,
        user_path: Option<&Path>,
        self_path: Option<&Path>,
    ) -> MnemonResult<Self> {
        Ok(Self {
            rules: load_document(rules_path, "rules")?,
            user: load_document(user_path, "user heuristics")?,
            self_heuristics: load_document(self_path, "self heuristics")?,
        })
    }

    /// Load the conventional layout under a config directory:
    /// `rules.json`, `user_heuristics.json`, `self_heuristics.json`.
    pub fn load_dir(dir: impl AsRef<Path>) -> MnemonResult<Self> {
        let dir = dir.as_ref();
        Self::load(
            Some(&dir.join("rules.json")),
            Some(&dir.join("user_heuristics.json")),
            Some(&dir.join("self_heuristics.json")),
        )
    }
}

fn load_document<T: Default + serde::de::DeserializeOwned>(
    path: Option<&Path>,
    label: &str,
) -> MnemonResult<T> {
    let Some(path) = path else {
        return Ok(T::default());
    };
    if !path.exists() {
        tracing::debug!("{} config not found at {}, using defaults", label, path.display());
        return Ok(T::default());
    }
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| {
        MnemonError::Configuration(format!(
            "malformed {} config at {}: {}",
            label,
            path.display(),
            e
        ))
    })
}

/// Where the engine keeps its durable state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database holding the `memories` ledger and report tables.
    pub ledger_db_path: PathBuf,
    /// Directory of wave snapshot files.
    pub wave_dir: PathBuf,
    /// Append-only JSONL audit trail.
    pub audit_log_path: PathBuf,
    /// Whether `user_force_save` is honored at all.
    pub allow_user_force_save: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let data_dir = dirs::home_dir()
            .map(|h| h.join(".mnemon"))
            .unwrap_or_else(|| PathBuf::from(".mnemon"));

        Self {
            ledger_db_path: data_dir.join("ledger.db"),
            wave_dir: data_dir.join("waves"),
            audit_log_path: data_dir.join("audit.jsonl"),
            allow_user_force_save: true,
        }
    }
}

impl StoreConfig {
    /// Root all paths under the given data directory.
    pub fn under(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            ledger_db_path: data_dir.join("ledger.db"),
            wave_dir: data_dir.join("waves"),
            audit_log_path: data_dir.join("audit.jsonl"),
            allow_user_force_save: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_files_yield_defaults() {
        let config = EngineConfig::load(
            Some(Path::new("/nonexistent/rules.json")),
            None,
            Some(Path::new("/nonexistent/self.json")),
        )
        .unwrap();
        assert!(config.rules.forbidden_patterns.is_empty());
        assert!(config.rules.gate_enabled);
        assert_eq!(config.user.novelty_boost, 0.15);
        assert_eq!(config.self_heuristics.long_form_threshold, 280);
    }

    #[test]
    fn malformed_present_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.json");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"{ not valid json").unwrap();

        let err = EngineConfig::load(Some(&path), None, None).unwrap_err();
        assert!(matches!(err, MnemonError::Configuration(_)));
    }

    #[test]
    fn partial_document_merges_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user.json");
        std::fs::write(&path, r#"{"novelty_boost": 0.4}"#).unwrap();

        let config = EngineConfig::load(None, Some(&path), None).unwrap();
        assert_eq!(config.user.novelty_boost, 0.4);
        // Unnamed keys keep their defaults.
        assert_eq!(config.user.trusted_source_boost, 0.15);
        assert_eq!(config.user.ethics_penalty, 0.25);
    }

    #[test]
    fn rules_document_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.json");
        std::fs::write(
            &path,
            r#"{"forbidden_patterns": ["illegal", "secret\\s+key"], "gate_enabled": true}"#,
        )
        .unwrap();

        let config = EngineConfig::load(Some(&path), None, None).unwrap();
        assert_eq!(config.rules.forbidden_patterns.len(), 2);
    }
}
