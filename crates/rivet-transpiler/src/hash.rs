//! Canonical circuit hashing.
//!
//! A circuit is hashed in three steps:
//!
//! ```text
//!   instructions ──► cancel adjacent inverse pairs ──► canonical topological order ──► SHA-256
//! ```
//!
//! Cancellation uses a per-qubit stack of surviving operations, so pairs
//! exposed by an earlier cancellation cancel too (`H X X H` is empty).
//! The canonical order is the DAG's topological order with ties broken by
//! `(qubits, name, parameters)`; circuits that differ only in the order of
//! operations on disjoint qubits have the same DAG and so the same order.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use rivet_ir::{Circuit, Instruction, InstructionKind, IrResult};

/// Which gate pairs cancel when adjacent.
///
/// A pair cancels when both are gates on the same operand list, no other
/// operation touches any of those qubits in between, the names match a
/// rule and the parameters are canonically identical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CancellationRules {
    /// Gates that are their own inverse.
    pub self_inverse: BTreeSet<String>,
    /// Gate pairs that undo each other, in either order.
    pub inverse_pairs: Vec<(String, String)>,
}

impl Default for CancellationRules {
    fn default() -> Self {
        let self_inverse = [
            "x", "y", "z", "h", "cx", "cy", "cz", "ch", "swap", "ccx", "cswap",
        ];
        let inverse_pairs = [("s", "sdg"), ("t", "tdg"), ("sx", "sxdg")];
        Self {
            self_inverse: self_inverse.into_iter().map(String::from).collect(),
            inverse_pairs: inverse_pairs
                .into_iter()
                .map(|(a, b)| (a.to_string(), b.to_string()))
                .collect(),
        }
    }
}

impl CancellationRules {
    /// No cancellation at all.
    pub fn none() -> Self {
        Self {
            self_inverse: BTreeSet::new(),
            inverse_pairs: vec![],
        }
    }

    /// Whether `second`, directly after `first`, undoes it.
    pub fn cancels(&self, first: &Instruction, second: &Instruction) -> bool {
        if !first.is_gate() || !second.is_gate() || first.qubits != second.qubits {
            return false;
        }
        let (a, b) = (first.name(), second.name());
        let named = (a == b && self.self_inverse.contains(a))
            || self
                .inverse_pairs
                .iter()
                .any(|(x, y)| (x == a && y == b) || (x == b && y == a));
        named && canonical_parameters(first) == canonical_parameters(second)
    }
}

fn canonical_parameters(inst: &Instruction) -> Vec<String> {
    inst.parameters().iter().map(|p| p.canonical()).collect()
}

/// How much of the parameter values goes into a hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashMode {
    /// Structure only: parameter values are ignored.
    Shallow,
    /// Structure plus canonical parameter values.
    #[default]
    Deep,
}

/// Structural hasher with a configurable cancellation rule set.
#[derive(Debug, Clone, Default)]
pub struct CircuitHasher {
    rules: CancellationRules,
}

impl CircuitHasher {
    /// A hasher using `rules`.
    pub fn new(rules: CancellationRules) -> Self {
        Self { rules }
    }

    /// The rule set in use.
    pub fn rules(&self) -> &CancellationRules {
        &self.rules
    }

    /// Instructions that survive cascading cancellation, in input order.
    pub fn cancel(&self, circuit: &Circuit) -> Vec<Instruction> {
        let mut kept: Vec<Option<&Instruction>> = Vec::with_capacity(circuit.len());
        // per qubit, indices into `kept` of the surviving operations
        let mut wires: Vec<Vec<usize>> = vec![vec![]; circuit.num_qubits() as usize];

        for inst in circuit.instructions() {
            let top = inst
                .qubits
                .first()
                .and_then(|q| wires[q.index()].last().copied());
            if let Some(i) = top {
                let adjacent = inst
                    .qubits
                    .iter()
                    .all(|q| wires[q.index()].last() == Some(&i));
                if adjacent && kept[i].is_some_and(|prev| self.rules.cancels(prev, inst)) {
                    for q in &inst.qubits {
                        wires[q.index()].pop();
                    }
                    kept[i] = None;
                    continue;
                }
            }
            for q in &inst.qubits {
                wires[q.index()].push(kept.len());
            }
            kept.push(Some(inst));
        }
        kept.into_iter().flatten().cloned().collect()
    }

    /// Surviving instructions in canonical order.
    pub fn canonical_form(&self, circuit: &Circuit) -> IrResult<Vec<Instruction>> {
        let survivors = Circuit::new(
            circuit.name(),
            circuit.num_qubits(),
            circuit.num_clbits(),
            self.cancel(circuit),
        )?;
        let dag = survivors.to_dag();
        let order = dag.topological_ops_by(|inst| {
            (
                inst.qubits.iter().map(|q| q.0).collect::<Vec<_>>(),
                inst.name().to_string(),
                canonical_parameters(inst),
                inst.clbits.iter().map(|c| c.0).collect::<Vec<_>>(),
            )
        });
        Ok(order
            .into_iter()
            .filter_map(|node| dag.get_instruction(node).cloned())
            .collect())
    }

    /// Hex SHA-256 of the canonical form.
    ///
    /// The register sizes are part of the digest; the circuit name is not.
    pub fn hash(&self, circuit: &Circuit, mode: HashMode) -> IrResult<String> {
        let mut hasher = Sha256::new();
        hasher.update(format!("{}q{}c\n", circuit.num_qubits(), circuit.num_clbits()));
        for inst in self.canonical_form(circuit)? {
            let qubits: Vec<u32> = inst.qubits.iter().map(|q| q.0).collect();
            let clbits: Vec<u32> = inst.clbits.iter().map(|c| c.0).collect();
            hasher.update(format!(
                "{}|{:?}|{:?}|{}\n",
                inst.name(),
                qubits,
                clbits,
                parameter_text(&inst, mode)
            ));
        }
        Ok(format!("{:x}", hasher.finalize()))
    }
}

fn parameter_text(inst: &Instruction, mode: HashMode) -> String {
    let mut values = match mode {
        HashMode::Shallow => vec!["_".to_string(); inst.parameters().len()],
        HashMode::Deep => canonical_parameters(inst),
    };
    if let InstructionKind::Delay { duration } = inst.kind {
        values.push(duration.to_string());
    }
    values.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rivet_ir::{ClbitId, ParameterExpression, QubitId};

    fn hash(circuit: &Circuit) -> String {
        CircuitHasher::default().hash(circuit, HashMode::Deep).unwrap()
    }

    fn circuit(f: impl FnOnce(&mut rivet_ir::CircuitBuilder)) -> Circuit {
        let mut b = Circuit::builder("c", 3, 1);
        f(&mut b);
        b.build()
    }

    #[test]
    fn test_hxxh_cancels_completely() {
        let hxxh = circuit(|b| {
            b.h(QubitId(0)).unwrap().x(QubitId(0)).unwrap();
            b.x(QubitId(0)).unwrap().h(QubitId(0)).unwrap();
        });
        assert!(CircuitHasher::default().cancel(&hxxh).is_empty());
        assert_eq!(hash(&hxxh), hash(&circuit(|_| {})));
    }

    #[test]
    fn test_inverse_pairs_cancel_in_either_order() {
        let c = circuit(|b| {
            b.sdg(QubitId(1)).unwrap().s(QubitId(1)).unwrap();
            b.t(QubitId(2)).unwrap().tdg(QubitId(2)).unwrap();
        });
        assert!(CircuitHasher::default().cancel(&c).is_empty());
    }

    #[test]
    fn test_rotations_are_not_cancelled() {
        let c = circuit(|b| {
            b.rz(0.5, QubitId(0)).unwrap().rz(-0.5, QubitId(0)).unwrap();
        });
        assert_eq!(CircuitHasher::default().cancel(&c).len(), 2);
    }

    #[test]
    fn test_intervening_operation_blocks_cancellation() {
        let c = circuit(|b| {
            b.h(QubitId(0)).unwrap();
            b.measure(QubitId(0), ClbitId(0)).unwrap();
            b.h(QubitId(0)).unwrap();
        });
        assert_eq!(CircuitHasher::default().cancel(&c).len(), 3);

        let c = circuit(|b| {
            b.cx(QubitId(0), QubitId(1)).unwrap();
            b.x(QubitId(1)).unwrap();
            b.cx(QubitId(0), QubitId(1)).unwrap();
        });
        assert_eq!(CircuitHasher::default().cancel(&c).len(), 3);
    }

    #[test]
    fn test_cascading_two_qubit_pairs() {
        let c = circuit(|b| {
            b.cx(QubitId(0), QubitId(1)).unwrap();
            b.cz(QubitId(0), QubitId(1)).unwrap();
            b.cz(QubitId(0), QubitId(1)).unwrap();
            b.cx(QubitId(0), QubitId(1)).unwrap();
        });
        assert!(CircuitHasher::default().cancel(&c).is_empty());
    }

    #[test]
    fn test_disjoint_reordering_is_invisible() {
        let a = circuit(|b| {
            b.h(QubitId(0)).unwrap().x(QubitId(2)).unwrap();
            b.cx(QubitId(0), QubitId(1)).unwrap();
        });
        let b = circuit(|b| {
            b.x(QubitId(2)).unwrap().h(QubitId(0)).unwrap();
            b.cx(QubitId(0), QubitId(1)).unwrap();
        });
        assert_eq!(hash(&a), hash(&b));
    }

    #[test]
    fn test_order_on_shared_qubits_matters() {
        let a = circuit(|b| {
            b.h(QubitId(0)).unwrap().cx(QubitId(0), QubitId(1)).unwrap();
        });
        let b = circuit(|b| {
            b.cx(QubitId(0), QubitId(1)).unwrap().h(QubitId(0)).unwrap();
        });
        assert_ne!(hash(&a), hash(&b));
    }

    #[test]
    fn test_shallow_ignores_values_deep_does_not() {
        let hasher = CircuitHasher::default();
        let a = circuit(|b| {
            b.rz(0.1, QubitId(0)).unwrap();
        });
        let b = circuit(|b| {
            b.rz(0.2, QubitId(0)).unwrap();
        });
        let symbolic = circuit(|b| {
            b.rz(ParameterExpression::symbol("theta"), QubitId(0)).unwrap();
        });
        assert_ne!(
            hasher.hash(&a, HashMode::Deep).unwrap(),
            hasher.hash(&b, HashMode::Deep).unwrap()
        );
        assert_eq!(
            hasher.hash(&a, HashMode::Shallow).unwrap(),
            hasher.hash(&b, HashMode::Shallow).unwrap()
        );
        assert_eq!(
            hasher.hash(&a, HashMode::Shallow).unwrap(),
            hasher.hash(&symbolic, HashMode::Shallow).unwrap()
        );
        assert_eq!(
            hasher.hash(&symbolic.bind("theta", 0.1), HashMode::Deep).unwrap(),
            hasher.hash(&a, HashMode::Deep).unwrap()
        );
    }

    #[test]
    fn test_register_size_and_name() {
        let narrow = Circuit::empty("a", 2, 0);
        let wide = Circuit::empty("a", 3, 0);
        assert_ne!(hash(&narrow), hash(&wide));
        assert_eq!(hash(&narrow), hash(&Circuit::empty("b", 2, 0)));
        assert_eq!(hash(&narrow).len(), 64);
    }

    #[test]
    fn test_rules_are_configurable() {
        let c = circuit(|b| {
            b.h(QubitId(0)).unwrap().h(QubitId(0)).unwrap();
        });
        let strict = CircuitHasher::new(CancellationRules::none());
        assert_eq!(strict.cancel(&c).len(), 2);
        assert_ne!(strict.hash(&c, HashMode::Deep).unwrap(), hash(&c));
    }
}
