//! Per-call stack options.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use rivet_compile::{BasisGates, Layout};

use crate::error::{StackError, StackResult};

/// Options for one `transpile` call.
///
/// Every field takes part in the cache key through
/// [`StackOptions::cache_fingerprint`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackOptions {
    /// Pinned virtual-to-physical positions. Unpinned virtual qubits are
    /// placed by the stack; ancilla marks are reused first.
    pub initial_layout: Option<Layout>,
    /// Seed for every randomised decision.
    pub seed: u64,
    /// Overrides the device basis.
    pub basis_gates: Option<BasisGates>,
    /// 0 to 3.
    pub optimization_level: u8,
    /// Accepted and keyed, not implemented.
    pub dynamical_decoupling: bool,
    /// Stack-specific settings, e.g. `search.budget`.
    pub tuning: BTreeMap<String, serde_json::Value>,
}

impl Default for StackOptions {
    fn default() -> Self {
        Self {
            initial_layout: None,
            seed: 0,
            basis_gates: None,
            optimization_level: 1,
            dynamical_decoupling: false,
            tuning: BTreeMap::new(),
        }
    }
}

impl StackOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin an initial layout.
    #[must_use]
    pub fn with_initial_layout(mut self, layout: Layout) -> Self {
        self.initial_layout = Some(layout);
        self
    }

    /// Set the seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Override the basis.
    #[must_use]
    pub fn with_basis_gates(mut self, basis_gates: BasisGates) -> Self {
        self.basis_gates = Some(basis_gates);
        self
    }

    /// Set the optimization level.
    #[must_use]
    pub fn with_optimization_level(mut self, level: u8) -> Self {
        self.optimization_level = level;
        self
    }

    /// Request dynamical decoupling.
    #[must_use]
    pub fn with_dynamical_decoupling(mut self, enabled: bool) -> Self {
        self.dynamical_decoupling = enabled;
        self
    }

    /// Add a stack-specific setting.
    #[must_use]
    pub fn with_tuning(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.tuning.insert(key.into(), value.into());
        self
    }

    /// Reject out-of-range values.
    pub fn validate(&self) -> StackResult<()> {
        if self.optimization_level > 3 {
            return Err(StackError::InvalidOptions(format!(
                "optimization level {} out of range 0..=3",
                self.optimization_level
            )));
        }
        Ok(())
    }

    /// An integer tuning value.
    pub fn tuning_u64(&self, key: &str) -> StackResult<Option<u64>> {
        match self.tuning.get(key) {
            None => Ok(None),
            Some(value) => value.as_u64().map(Some).ok_or_else(|| {
                StackError::InvalidOptions(format!("'{key}' must be a non-negative integer"))
            }),
        }
    }

    /// A float tuning value.
    pub fn tuning_f64(&self, key: &str) -> StackResult<Option<f64>> {
        match self.tuning.get(key) {
            None => Ok(None),
            Some(value) => value
                .as_f64()
                .map(Some)
                .ok_or_else(|| StackError::InvalidOptions(format!("'{key}' must be a number"))),
        }
    }

    /// Canonical JSON encoding for cache keys.
    ///
    /// Field order is fixed and maps are sorted, so equal options always
    /// encode to the same string.
    pub fn cache_fingerprint(&self) -> StackResult<String> {
        serde_json::to_string(self).map_err(|e| StackError::InvalidOptions(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rivet_ir::QubitId;

    #[test]
    fn test_defaults() {
        let options = StackOptions::new();
        assert_eq!(options.optimization_level, 1);
        assert!(options.validate().is_ok());
        assert!(StackOptions::new().with_optimization_level(4).validate().is_err());
    }

    #[test]
    fn test_fingerprint_ignores_insertion_order() {
        let a = StackOptions::new().with_tuning("b", 1).with_tuning("a", 2);
        let b = StackOptions::new().with_tuning("a", 2).with_tuning("b", 1);
        assert_eq!(a.cache_fingerprint().unwrap(), b.cache_fingerprint().unwrap());
    }

    #[test]
    fn test_fingerprint_tracks_every_field() {
        let base = StackOptions::new();
        let mut pinned = Layout::new(3);
        pinned.add(QubitId(0), 2).unwrap();
        let variants = [
            base.clone().with_seed(7),
            base.clone().with_dynamical_decoupling(true),
            base.clone().with_initial_layout(pinned),
            base.clone().with_basis_gates(BasisGates::heron()),
            base.clone().with_tuning("search.budget", 10),
        ];
        let fp = base.cache_fingerprint().unwrap();
        for v in variants {
            assert_ne!(v.cache_fingerprint().unwrap(), fp);
        }
    }

    #[test]
    fn test_tuning_types_are_checked() {
        let options = StackOptions::new()
            .with_tuning("search.budget", "lots")
            .with_tuning("instantiation.target_fidelity", 0.99);
        assert!(options.tuning_u64("search.budget").is_err());
        assert_eq!(options.tuning_f64("instantiation.target_fidelity").unwrap(), Some(0.99));
        assert_eq!(options.tuning_u64("missing").unwrap(), None);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let options: StackOptions = serde_json::from_str(r#"{"seed": 3}"#).unwrap();
        assert_eq!(options.seed, 3);
        assert_eq!(options.optimization_level, 1);
    }
}
