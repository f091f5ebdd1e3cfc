//! Transpiler configuration.
//!
//! Loaded from YAML, then overridden by environment variables:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `RIVET_STACK` | `stack` |
//! | `RIVET_SEED` | `seed` |
//! | `RIVET_CACHE_CAPACITY` | `cache.capacity` |
//! | `RIVET_CACHE_PATH` | `cache.path` |
//!
//! ```yaml
//! stack: search
//! seed: 7
//! cache:
//!   capacity: 512
//! search:
//!   budget: 4000
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use rivet_stack::stacks::{DEFAULT_BEAM_WIDTH, DEFAULT_BUDGET, DEFAULT_TARGET_FIDELITY};
use rivet_stack::{StackKind, StackOptions};

use crate::error::{TranspileError, TranspileResult};
use crate::hash::CancellationRules;
use crate::persist::default_cache_path;

/// Cache settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum stored fragments; unbounded when absent.
    pub capacity: Option<usize>,
    /// Persistence file; [`default_cache_path`] when absent.
    pub path: Option<PathBuf>,
}

impl CacheConfig {
    /// The persistence file to use.
    pub fn resolved_path(&self) -> Option<PathBuf> {
        self.path.clone().or_else(default_cache_path)
    }
}

/// Hashing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HashConfig {
    /// Gate pairs treated as cancelling.
    pub cancellation: CancellationRules,
}

/// Search stack settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Node expansions before falling back.
    pub budget: u64,
    /// Candidates kept per step.
    pub beam_width: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            budget: DEFAULT_BUDGET,
            beam_width: DEFAULT_BEAM_WIDTH as u64,
        }
    }
}

/// Instantiation stack settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstantiationConfig {
    /// Fidelity a re-instantiated block must reach.
    pub target_fidelity: f64,
}

impl Default for InstantiationConfig {
    fn default() -> Self {
        Self {
            target_fidelity: DEFAULT_TARGET_FIDELITY,
        }
    }
}

/// Complete transpiler configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranspilerConfig {
    /// Stack used by every composition.
    pub stack: StackKind,
    /// Seed passed to the stack.
    pub seed: u64,
    /// Optimization level, 0 to 3.
    pub optimization_level: u8,
    /// Fragment cache.
    pub cache: CacheConfig,
    /// Structural hashing.
    pub hash: HashConfig,
    /// Search stack tuning.
    pub search: SearchConfig,
    /// Instantiation stack tuning.
    pub instantiation: InstantiationConfig,
}

impl Default for TranspilerConfig {
    fn default() -> Self {
        Self {
            stack: StackKind::PassManager,
            seed: 0,
            optimization_level: 1,
            cache: CacheConfig::default(),
            hash: HashConfig::default(),
            search: SearchConfig::default(),
            instantiation: InstantiationConfig::default(),
        }
    }
}

impl TranspilerConfig {
    /// Parse YAML.
    pub fn from_yaml(yaml: &str) -> TranspileResult<Self> {
        let config: Self =
            serde_yaml_ng::from_str(yaml).map_err(|e| TranspileError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> TranspileResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| TranspileError::Config(format!("{}: {e}", path.display())))?;
        Self::from_yaml(&contents)
    }

    /// File (if given) or defaults, then environment overrides.
    pub fn load(path: Option<&Path>) -> TranspileResult<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = config.merge_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from `lookup`, which maps a variable name to its
    /// value. Unparsable values are ignored with a warning.
    #[must_use]
    pub fn merge_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = lookup("RIVET_STACK") {
            match v.parse() {
                Ok(stack) => self.stack = stack,
                Err(e) => warn!("Ignoring RIVET_STACK: {e}"),
            }
        }
        if let Some(v) = lookup("RIVET_SEED") {
            match v.trim().parse() {
                Ok(seed) => self.seed = seed,
                Err(_) => warn!("Ignoring RIVET_SEED={v}: not an integer"),
            }
        }
        if let Some(v) = lookup("RIVET_CACHE_CAPACITY") {
            match v.trim().parse() {
                Ok(capacity) => self.cache.capacity = Some(capacity),
                Err(_) => warn!("Ignoring RIVET_CACHE_CAPACITY={v}: not an integer"),
            }
        }
        if let Some(v) = lookup("RIVET_CACHE_PATH") {
            self.cache.path = Some(PathBuf::from(v));
        }
        self
    }

    /// Check ranges.
    pub fn validate(&self) -> TranspileResult<()> {
        if self.optimization_level > 3 {
            return Err(TranspileError::Config(format!(
                "optimization_level must be 0-3, got {}",
                self.optimization_level
            )));
        }
        if self.search.beam_width == 0 {
            return Err(TranspileError::Config(
                "search.beam_width must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.instantiation.target_fidelity) {
            return Err(TranspileError::Config(format!(
                "instantiation.target_fidelity must lie in [0, 1], got {}",
                self.instantiation.target_fidelity
            )));
        }
        Ok(())
    }

    /// Stack options carrying the seed, level and stack tuning.
    ///
    /// Only the tuning of the configured stack is included, so settings of
    /// other stacks do not split the cache.
    pub fn stack_options(&self) -> StackOptions {
        let options = StackOptions::new()
            .with_seed(self.seed)
            .with_optimization_level(self.optimization_level);
        match self.stack {
            StackKind::PassManager => options,
            StackKind::Search => options
                .with_tuning("search.budget", self.search.budget)
                .with_tuning("search.beam_width", self.search.beam_width),
            StackKind::Instantiation => options.with_tuning(
                "instantiation.target_fidelity",
                self.instantiation.target_fidelity,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TranspilerConfig::default();
        assert_eq!(config.stack, StackKind::PassManager);
        assert_eq!(config.optimization_level, 1);
        assert_eq!(config.search.budget, DEFAULT_BUDGET);
        assert!(config.cache.capacity.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml() {
        let config = TranspilerConfig::from_yaml(
            "stack: search\nseed: 7\ncache:\n  capacity: 16\nsearch:\n  budget: 50\n",
        )
        .unwrap();
        assert_eq!(config.stack, StackKind::Search);
        assert_eq!(config.seed, 7);
        assert_eq!(config.cache.capacity, Some(16));
        assert_eq!(config.search.budget, 50);
        assert_eq!(config.search.beam_width, DEFAULT_BEAM_WIDTH as u64);
        assert!(config.hash.cancellation.self_inverse.contains("h"));
    }

    #[test]
    fn test_custom_cancellation_rules() {
        let config = TranspilerConfig::from_yaml(
            "hash:\n  cancellation:\n    self_inverse: [h]\n    inverse_pairs: [[s, sdg]]\n",
        )
        .unwrap();
        let rules = &config.hash.cancellation;
        assert_eq!(rules.self_inverse.len(), 1);
        assert_eq!(rules.inverse_pairs, vec![("s".to_string(), "sdg".to_string())]);
    }

    #[test]
    fn test_invalid_yaml_values() {
        assert!(TranspilerConfig::from_yaml("optimization_level: 5").is_err());
        assert!(TranspilerConfig::from_yaml("stack: qsearch").is_err());
        assert!(TranspilerConfig::from_yaml("instantiation:\n  target_fidelity: 2.0").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env = |name: &str| match name {
            "RIVET_STACK" => Some("Instantiation".to_string()),
            "RIVET_SEED" => Some("42".to_string()),
            "RIVET_CACHE_CAPACITY" => Some("lots".to_string()),
            "RIVET_CACHE_PATH" => Some("/tmp/rivet.json".to_string()),
            _ => None,
        };
        let config = TranspilerConfig::default().merge_env(env);
        assert_eq!(config.stack, StackKind::Instantiation);
        assert_eq!(config.seed, 42);
        assert!(config.cache.capacity.is_none());
        assert_eq!(config.cache.resolved_path(), Some(PathBuf::from("/tmp/rivet.json")));
    }

    #[test]
    fn test_stack_options_carry_tuning() {
        let config = TranspilerConfig {
            stack: StackKind::Search,
            seed: 3,
            ..TranspilerConfig::default()
        };
        let options = config.stack_options();
        assert_eq!(options.seed, 3);
        assert_eq!(options.tuning_u64("search.budget").unwrap(), Some(DEFAULT_BUDGET));
        assert!(TranspilerConfig::default().stack_options().tuning.is_empty());
    }
}
