//! What a stack compiles against.

use serde::{Deserialize, Serialize};

use rivet_compile::{BasisGates, CouplingMap};

/// Target device: connectivity plus native gates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConstraints {
    /// Device name, part of the cache key.
    pub name: String,
    /// Physical connectivity.
    pub coupling_map: CouplingMap,
    /// Native gate set.
    pub basis_gates: BasisGates,
}

impl DeviceConstraints {
    /// A named device.
    pub fn new(
        name: impl Into<String>,
        coupling_map: CouplingMap,
        basis_gates: BasisGates,
    ) -> Self {
        Self {
            name: name.into(),
            coupling_map,
            basis_gates,
        }
    }

    /// Number of physical qubits.
    pub fn num_qubits(&self) -> u32 {
        self.coupling_map.num_qubits()
    }

    /// The same device seen through a different coupling map.
    #[must_use]
    pub fn with_coupling_map(&self, name: impl Into<String>, coupling_map: CouplingMap) -> Self {
        Self {
            name: name.into(),
            coupling_map,
            basis_gates: self.basis_gates.clone(),
        }
    }

    /// Stable identity string: name, connectivity and basis.
    ///
    /// Two devices with the same identity compile every circuit the same way.
    pub fn identity(&self) -> String {
        let basis: Vec<&str> = self.basis_gates.gates().collect();
        format!(
            "{}|{}|{}",
            self.name,
            self.coupling_map.fingerprint(),
            basis.join(",")
        )
    }
}
