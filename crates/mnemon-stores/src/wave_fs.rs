//! Filesystem-backed wave store (WPM).
//!
//! One JSON snapshot file per `memorise_id` under the wave directory.
//! Writes go through a temp file + rename so a crashed write never leaves a
//! half-written snapshot behind.

use async_trait::async_trait;
use mnemon_core::{MnemonError, MnemonResult, WaveSnapshot, WaveStore};
use std::path::{Path, PathBuf};

/// Secondary store for wave snapshots, keyed by `memorise_id`.
pub struct FsWaveStore {
    root: PathBuf,
}

impl FsWaveStore {
    /// Create a wave store rooted at the given directory.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn snapshot_path(&self, memorise_id: &str) -> PathBuf {
        self.root.join(format!("{}.wave.json", memorise_id))
    }
}

#[async_trait]
impl WaveStore for FsWaveStore {
    async fn put(&self, snapshot: &WaveSnapshot) -> MnemonResult<String> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| MnemonError::Wave {
                message: format!("failed to create wave dir {}", self.root.display()),
                source: Some(Box::new(e)),
            })?;

        let path = self.snapshot_path(&snapshot.memorise_id);
        let tmp_path = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(snapshot)?;

        tokio::fs::write(&tmp_path, &json)
            .await
            .map_err(|e| MnemonError::Wave {
                message: format!("failed to write wave snapshot {}", tmp_path.display()),
                source: Some(Box::new(e)),
            })?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| MnemonError::Wave {
                message: format!("failed to finalize wave snapshot {}", path.display()),
                source: Some(Box::new(e)),
            })?;

        Ok(self.key_for(&snapshot.memorise_id))
    }

    async fn get(&self, memorise_id: &str) -> MnemonResult<Option<WaveSnapshot>> {
        let path = self.snapshot_path(memorise_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(MnemonError::Wave {
                    message: format!("failed to read wave snapshot {}", path.display()),
                    source: Some(Box::new(e)),
                })
            }
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn key_for(&self, memorise_id: &str) -> String {
        format!("wpm://{}", memorise_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemon_core::{SensePayload, WeightAxes};
    use std::collections::HashMap;

    fn sample_snapshot(memorise_id: &str) -> WaveSnapshot {
        let mut arrays = HashMap::new();
        arrays.insert("signal".to_string(), vec![0.1, 0.2, 0.4]);
        let mut attrs = HashMap::new();
        attrs.insert("channel".to_string(), serde_json::json!("alpha"));
        WaveSnapshot {
            memorise_id: memorise_id.to_string(),
            created_at: "2026-08-27T10:15:30.000000Z".to_string(),
            d_id: "d-1".to_string(),
            d_context: "test".to_string(),
            d_sense: SensePayload::text("a captured reading"),
            d_associations: vec!["sensor".to_string()],
            d_timestamp: "2026-08-27T10:15:30.000000Z".to_string(),
            d_meta: HashMap::new(),
            d_type: Some("text".to_string()),
            d_attr: HashMap::new(),
            weights: WeightAxes {
                w_l: 0.6,
                w_s: 0.8,
                w_k: 0.5,
                w_e: 0.7,
            },
            bifurcation: true,
            arrays,
            attrs,
        }
    }

    #[tokio::test]
    async fn put_then_get_round_trips_arrays_and_attrs() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsWaveStore::new(dir.path());

        let snapshot = sample_snapshot("m-1");
        let wpm_ref = store.put(&snapshot).await.unwrap();
        assert_eq!(wpm_ref, "wpm://m-1");

        let fetched = store.get("m-1").await.unwrap().unwrap();
        assert_eq!(fetched.arrays["signal"], vec![0.1, 0.2, 0.4]);
        assert_eq!(fetched.attrs["channel"], serde_json::json!("alpha"));
        assert_eq!(fetched.d_sense, SensePayload::text("a captured reading"));
        assert_eq!(fetched.d_associations, vec!["sensor".to_string()]);
        assert_eq!(fetched.d_type.as_deref(), Some("text"));
        assert!(fetched.bifurcation);
    }

    #[tokio::test]
    async fn missing_snapshot_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsWaveStore::new(dir.path());
        assert!(store.get("absent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn key_is_deterministic_per_memorise_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsWaveStore::new(dir.path());
        assert_eq!(store.key_for("abc"), "wpm://abc");
        assert_eq!(store.key_for("abc"), store.key_for("abc"));
    }

    #[tokio::test]
    async fn no_temp_files_remain_after_put() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsWaveStore::new(dir.path());
        store.put(&sample_snapshot("m-2")).await.unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map(|x| x == "tmp").unwrap_or(false))
            .collect();
        assert!(leftovers.is_empty());
    }
}
