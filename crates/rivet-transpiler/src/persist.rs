//! Cache persistence as a JSON file.
//!
//! ```json
//! { "version": 1, "entries": [ { "key": {...}, "circuit": {...},
//!   "initial_layout": {...}, "final_layout": {...}, "permutation": [...],
//!   "num_virtual": 3, "quality": {"status": "converged"},
//!   "created_at": "2026-01-01T00:00:00Z" } ] }
//! ```
//!
//! Entries that fail to parse or verify are skipped with a warning; the
//! rest of the file still loads.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use rivet_compile::{Layout, Permutation};
use rivet_ir::Circuit;
use rivet_stack::{FragmentQuality, TranspiledFragment};

use crate::cache::{CacheKey, FragmentCache};
use crate::error::{TranspileError, TranspileResult};

/// Format version written by [`FragmentCache::save`].
pub const CACHE_FORMAT_VERSION: u32 = 1;

/// One stored fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// What the fragment was compiled from.
    pub key: CacheKey,
    /// Physical circuit.
    pub circuit: Circuit,
    /// Layout before the circuit.
    pub initial_layout: Layout,
    /// Layout after the circuit.
    pub final_layout: Layout,
    /// Routing permutation.
    pub permutation: Permutation,
    /// Virtual qubit count.
    pub num_virtual: u32,
    /// Result quality.
    pub quality: FragmentQuality,
    /// When the fragment was first computed.
    pub created_at: DateTime<Utc>,
}

impl CacheRecord {
    fn new(key: CacheKey, fragment: &TranspiledFragment, created_at: DateTime<Utc>) -> Self {
        Self {
            key,
            circuit: fragment.circuit.clone(),
            initial_layout: fragment.initial_layout.clone(),
            final_layout: fragment.final_layout.clone(),
            permutation: fragment.permutation.clone(),
            num_virtual: fragment.num_virtual,
            quality: fragment.quality.clone(),
            created_at,
        }
    }

    /// The stored fragment.
    pub fn fragment(&self) -> TranspiledFragment {
        TranspiledFragment {
            circuit: self.circuit.clone(),
            initial_layout: self.initial_layout.clone(),
            final_layout: self.final_layout.clone(),
            permutation: self.permutation.clone(),
            num_virtual: self.num_virtual,
            quality: self.quality.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CacheFile<'a> {
    version: u32,
    entries: &'a [CacheRecord],
}

#[derive(Debug, Deserialize)]
struct RawCacheFile {
    version: u32,
    #[serde(default)]
    entries: Vec<serde_json::Value>,
}

fn persistence(path: &Path, err: impl std::fmt::Display) -> TranspileError {
    TranspileError::Persistence(format!("{}: {err}", path.display()))
}

/// Default cache file: `<user cache dir>/rivet/fragments.json`.
pub fn default_cache_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("rivet").join("fragments.json"))
}

impl FragmentCache {
    /// Every stored entry as a record, ordered by key.
    pub fn records(&self) -> Vec<CacheRecord> {
        self.entries()
            .into_iter()
            .map(|(key, fragment, created_at)| CacheRecord::new(key, &fragment, created_at))
            .collect()
    }

    /// Write every stored entry to `path`, replacing the file.
    ///
    /// The file is written next to `path` first and renamed into place.
    /// Returns the number of entries written.
    pub fn save(&self, path: impl AsRef<Path>) -> TranspileResult<usize> {
        let path = path.as_ref();
        let records = self.records();
        let json = serde_json::to_string_pretty(&CacheFile {
            version: CACHE_FORMAT_VERSION,
            entries: &records,
        })
        .map_err(|e| persistence(path, e))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| persistence(parent, e))?;
        }
        let staging = path.with_extension("json.tmp");
        std::fs::write(&staging, json).map_err(|e| persistence(&staging, e))?;
        std::fs::rename(&staging, path).map_err(|e| persistence(path, e))?;
        info!("Saved {} cached fragments to {}", records.len(), path.display());
        Ok(records.len())
    }

    /// Add every valid entry of `path` to the cache.
    ///
    /// A missing file loads nothing. A file of another format version is an
    /// error. Returns the number of entries loaded.
    pub fn load(&self, path: impl AsRef<Path>) -> TranspileResult<usize> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No cache file at {}", path.display());
                return Ok(0);
            }
            Err(e) => return Err(persistence(path, e)),
        };
        let raw: RawCacheFile = serde_json::from_str(&content).map_err(|e| persistence(path, e))?;
        if raw.version != CACHE_FORMAT_VERSION {
            return Err(persistence(
                path,
                format!(
                    "format version {} (expected {CACHE_FORMAT_VERSION})",
                    raw.version
                ),
            ));
        }

        let mut loaded = 0;
        for (index, value) in raw.entries.into_iter().enumerate() {
            let record = match serde_json::from_value::<CacheRecord>(value) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping cache entry {index} in {}: {e}", path.display());
                    continue;
                }
            };
            let fragment = record.fragment();
            if let Err(e) = fragment.verify() {
                warn!("Skipping cache entry {index} in {}: {e}", path.display());
                continue;
            }
            self.insert_at(record.key, Arc::new(fragment), record.created_at);
            loaded += 1;
        }
        info!("Loaded {loaded} cached fragments from {}", path.display());
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rivet_compile::{BasisGates, CouplingMap};
    use rivet_ir::QubitId;
    use rivet_stack::{DeviceConstraints, StackKind, StackOptions};

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("rivet-persist-{}-{name}", std::process::id()))
            .join("fragments.json")
    }

    fn record() -> (CacheKey, TranspiledFragment) {
        let device = DeviceConstraints::new("line", CouplingMap::linear(3), BasisGates::ibm());
        let key = CacheKey::new("abc", &device, StackKind::Search, &StackOptions::new()).unwrap();
        let mut b = Circuit::builder("f", 3, 0);
        b.rz(0.1, QubitId(0)).unwrap().cx(QubitId(0), QubitId(1)).unwrap();
        let mut initial = Layout::trivial(2, 3).unwrap();
        initial.mark_ancilla(2).unwrap();
        let permutation = Permutation::transposition(3, 1, 2).unwrap();
        let fragment = TranspiledFragment {
            circuit: b.build(),
            final_layout: initial.permute(&permutation).unwrap(),
            initial_layout: initial,
            permutation,
            num_virtual: 2,
            quality: FragmentQuality::BestEffort {
                reason: "budget".into(),
                cost: 1.5,
            },
        };
        (key, fragment)
    }

    #[test]
    fn test_save_load_round_trip() {
        let path = temp_path("round-trip");
        let (key, fragment) = record();
        let cache = FragmentCache::new();
        cache.insert(key.clone(), fragment.clone());
        assert_eq!(cache.save(&path).unwrap(), 1);

        let restored = FragmentCache::new();
        assert_eq!(restored.load(&path).unwrap(), 1);
        assert_eq!(*restored.get(&key).unwrap(), fragment);
        assert_eq!(restored.records(), cache.records());
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_missing_file_loads_nothing() {
        let cache = FragmentCache::new();
        assert_eq!(cache.load(temp_path("missing")).unwrap(), 0);
    }

    #[test]
    fn test_bad_entries_are_skipped() {
        let path = temp_path("bad-entry");
        let (key, fragment) = record();
        let cache = FragmentCache::new();
        cache.insert(key, fragment);
        cache.save(&path).unwrap();

        let mut json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let entries = json["entries"].as_array_mut().unwrap();
        let mut stale = entries[0].clone();
        stale["final_layout"] = stale["initial_layout"].clone();
        entries.push(stale);
        entries.push(serde_json::json!({"key": "garbage"}));
        std::fs::write(&path, json.to_string()).unwrap();

        let restored = FragmentCache::new();
        assert_eq!(restored.load(&path).unwrap(), 1);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_version_mismatch_is_an_error() {
        let path = temp_path("version");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"version": 99, "entries": []}"#).unwrap();
        assert!(matches!(
            FragmentCache::new().load(&path),
            Err(TranspileError::Persistence(_))
        ));
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
