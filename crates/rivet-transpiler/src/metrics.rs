//! Cost model and per-pass metrics.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use rivet_compile::PassEvent;
use rivet_ir::Circuit;
use rivet_stack::{DeviceConstraints, PassManagerStack, Stack, StackOptions, TranspiledFragment};

use crate::error::{TranspileError, TranspileResult};

/// Fidelity estimate from depth and gate counts.
///
/// `cost = depth_penalty^depth · one_qubit_fidelity^n1 · two_qubit_fidelity^n2`,
/// higher is better.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IbmCostModel {
    /// Factor per layer of depth.
    pub depth_penalty: f64,
    /// Factor per single-qubit gate.
    pub one_qubit_fidelity: f64,
    /// Factor per two-qubit gate.
    pub two_qubit_fidelity: f64,
}

impl Default for IbmCostModel {
    fn default() -> Self {
        Self {
            depth_penalty: 0.995,
            one_qubit_fidelity: 0.9996,
            two_qubit_fidelity: 0.99,
        }
    }
}

impl IbmCostModel {
    /// Cost of `circuit` with barriers and final measurements removed.
    ///
    /// Gates on more than two qubits have no defined cost.
    pub fn cost(&self, circuit: &Circuit) -> TranspileResult<f64> {
        let stripped = circuit.without_barriers().without_final_measurements();
        let (mut one, mut two) = (0i32, 0i32);
        for inst in stripped.instructions().iter().filter(|i| i.is_gate()) {
            match inst.qubits.len() {
                1 => one += 1,
                2 => two += 1,
                n => {
                    return Err(TranspileError::CostUndefined {
                        gate: inst.name().to_string(),
                        num_qubits: n,
                    });
                }
            }
        }
        let depth = i32::try_from(stripped.depth()).unwrap_or(i32::MAX);
        Ok(self.depth_penalty.powi(depth)
            * self.one_qubit_fidelity.powi(one)
            * self.two_qubit_fidelity.powi(two))
    }
}

/// [`IbmCostModel::cost`] with the default factors.
pub fn ibm_cost(circuit: &Circuit) -> TranspileResult<f64> {
    IbmCostModel::default().cost(circuit)
}

/// Circuit state after one compilation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassMetrics {
    /// Position in the pipeline.
    pub index: usize,
    /// Pass name.
    pub name: String,
    /// `analysis` or `transformation`.
    pub kind: String,
    /// Wall time of the pass.
    pub duration: Duration,
    /// Circuit depth afterwards.
    pub depth: usize,
    /// Qubits plus classical bits.
    pub width: u32,
    /// Cost afterwards; `None` while gates on three or more qubits remain.
    pub ibm_cost: Option<f64>,
    /// Operation count per arity, barriers excluded.
    pub gate_counts: BTreeMap<usize, usize>,
}

impl PassMetrics {
    /// Capture the circuit state reported by `event`.
    pub fn capture(event: &PassEvent<'_>) -> Self {
        let circuit = Circuit::from_dag(event.name, event.dag);
        let mut gate_counts = BTreeMap::new();
        for inst in circuit.instructions().iter().filter(|i| !i.is_barrier()) {
            *gate_counts.entry(inst.qubits.len()).or_insert(0) += 1;
        }
        Self {
            index: event.index,
            name: event.name.to_string(),
            kind: event.kind.to_string(),
            duration: event.duration,
            depth: circuit.depth(),
            width: circuit.num_qubits() + circuit.num_clbits(),
            ibm_cost: ibm_cost(&circuit).ok(),
            gate_counts,
        }
    }
}

/// Transpile with the pass-manager stack, recording metrics after every
/// pass.
pub fn transpile_and_return_metrics(
    circuit: &Circuit,
    device: &DeviceConstraints,
    options: &StackOptions,
) -> TranspileResult<(TranspiledFragment, Vec<PassMetrics>)> {
    let stack = PassManagerStack;
    let mut metrics = Vec::new();
    let fragment = stack
        .transpile_with_callback(circuit, device, options, &mut |event: &PassEvent<'_>| {
            metrics.push(PassMetrics::capture(event));
        })
        .map_err(|e| TranspileError::stage("metrics", stack.kind(), e))?;
    debug!("Recorded metrics for {} passes", metrics.len());
    Ok((fragment, metrics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rivet_compile::{BasisGates, CouplingMap};
    use rivet_ir::{ClbitId, QubitId};

    #[test]
    fn test_ibm_cost_formula() {
        let mut b = Circuit::builder("c", 2, 2);
        b.h(QubitId(0)).unwrap().cx(QubitId(0), QubitId(1)).unwrap();
        b.barrier_all().unwrap();
        b.measure(QubitId(0), ClbitId(0)).unwrap();
        b.measure(QubitId(1), ClbitId(1)).unwrap();
        let cost = ibm_cost(&b.build()).unwrap();
        let expected = 0.995f64.powi(2) * 0.9996 * 0.99;
        assert!((cost - expected).abs() < 1e-12);
    }

    #[test]
    fn test_empty_circuit_costs_one() {
        assert_eq!(ibm_cost(&Circuit::empty("e", 3, 0)).unwrap(), 1.0);
    }

    #[test]
    fn test_three_qubit_gate_has_no_cost() {
        let mut b = Circuit::builder("c", 3, 0);
        b.ccx(QubitId(0), QubitId(1), QubitId(2)).unwrap();
        assert!(matches!(
            ibm_cost(&b.build()),
            Err(TranspileError::CostUndefined { num_qubits: 3, .. })
        ));
    }

    #[test]
    fn test_metrics_per_pass() {
        let device = DeviceConstraints::new("line", CouplingMap::linear(3), BasisGates::ibm());
        let mut b = Circuit::builder("c", 3, 0);
        b.ccx(QubitId(0), QubitId(1), QubitId(2)).unwrap();
        let (fragment, metrics) =
            transpile_and_return_metrics(&b.build(), &device, &StackOptions::new()).unwrap();
        assert!(!metrics.is_empty());
        assert!(metrics.iter().enumerate().all(|(i, m)| m.index == i));
        // the three-qubit gate is unrolled by the first pass
        assert!(metrics.iter().all(|m| m.ibm_cost.is_some()));
        let last = metrics.last().unwrap();
        assert!(!last.gate_counts.contains_key(&3));
        assert_eq!(last.depth, fragment.circuit.depth());
    }
}
