//! The stack contract.
//!
//! ```text
//!   Circuit ──► Stack::transpile(circuit, device, options) ──► TranspiledFragment
//!                 │
//!                 ├── PassManagerStack   fixed preset pipeline
//!                 ├── SearchStack        seeded beam search over SWAPs
//!                 └── InstantiationStack block re-synthesis, fidelity-checked
//! ```
//!
//! Every stack is deterministic: the same circuit, device, options and seed
//! give the same fragment, bit for bit.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use rivet_compile::{Layout, RoutingOutcome};
use rivet_ir::{Circuit, CircuitDag};

use crate::device::DeviceConstraints;
use crate::error::{StackError, StackResult};
use crate::fragment::{FragmentQuality, TranspiledFragment};
use crate::options::StackOptions;

/// Identifier of a stack family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackKind {
    /// Layout, routing, translation and peephole passes.
    #[default]
    PassManager,
    /// Budgeted SWAP search.
    Search,
    /// Single-qubit block re-instantiation.
    Instantiation,
}

impl StackKind {
    /// Every built-in kind.
    pub const ALL: [StackKind; 3] = [
        StackKind::PassManager,
        StackKind::Search,
        StackKind::Instantiation,
    ];

    /// Stable name.
    pub fn as_str(self) -> &'static str {
        match self {
            StackKind::PassManager => "pass_manager",
            StackKind::Search => "search",
            StackKind::Instantiation => "instantiation",
        }
    }
}

impl fmt::Display for StackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StackKind {
    type Err = StackError;

    fn from_str(s: &str) -> StackResult<Self> {
        StackKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| StackError::UnknownStack(s.to_string()))
    }
}

/// A compiler backend behind a uniform interface.
///
/// # Contract
///
/// - The returned circuit spans every device qubit.
/// - `initial_layout` contains every pinned position from
///   `options.initial_layout` unchanged.
/// - `final_layout` is `initial_layout` moved along `permutation`.
/// - An exhausted search returns its best candidate with
///   [`FragmentQuality::BestEffort`], never an `Err`.
pub trait Stack: Send + Sync {
    /// Which family this is.
    fn kind(&self) -> StackKind;

    /// Name used in logs and errors.
    fn name(&self) -> &str {
        self.kind().as_str()
    }

    /// Compile `circuit` for `device`.
    fn transpile(
        &self,
        circuit: &Circuit,
        device: &DeviceConstraints,
        options: &StackOptions,
    ) -> StackResult<TranspiledFragment>;
}

/// Assemble a fragment from a routed DAG.
///
/// Physical positions the circuit touches that no virtual qubit starts on
/// are marked as ancillas in both layouts, so a later stage can reuse them.
pub(crate) fn assemble_fragment(
    name: &str,
    dag: &CircuitDag,
    initial: Layout,
    outcome: RoutingOutcome,
    circuit_width: u32,
    quality: FragmentQuality,
) -> StackResult<TranspiledFragment> {
    // pinned positions may name virtual qubits the circuit itself never uses
    let num_virtual = initial
        .iter()
        .map(|(virt, _)| virt.0 + 1)
        .max()
        .unwrap_or(0)
        .max(circuit_width);
    let circuit = Circuit::from_dag(name, dag);
    let mut initial_layout = initial;
    for qubit in circuit.used_qubits() {
        if initial_layout.is_free(qubit.0) {
            initial_layout.mark_ancilla(qubit.0)?;
        }
    }
    let final_layout = initial_layout.permute(&outcome.permutation)?;
    let fragment = TranspiledFragment {
        circuit,
        initial_layout,
        final_layout,
        permutation: outcome.permutation,
        num_virtual,
        quality,
    };
    fragment.verify()?;
    Ok(fragment)
}

/// The effective basis: an override from the options or the device's own.
pub(crate) fn basis_for<'a>(
    device: &'a DeviceConstraints,
    options: &'a StackOptions,
) -> &'a rivet_compile::BasisGates {
    options.basis_gates.as_ref().unwrap_or(&device.basis_gates)
}
