//! Peephole optimizations.

use rivet_ir::{CircuitDag, Instruction, NodeIndex, QubitId, StandardGate, WireId};
use tracing::debug;

use crate::error::CompileResult;
use crate::pass::{Pass, PassKind};
use crate::passes::target::synthesize_1q;
use crate::property::{BasisGates, PropertySet};
use crate::unitary::Unitary2x2;

/// Whether `second` undoes `first`, parameters compared canonically.
fn undoes(first: &StandardGate, second: &StandardGate) -> bool {
    let inverse = first.inverse();
    inverse.name() == second.name()
        && inverse
            .parameters()
            .iter()
            .zip(second.parameters())
            .all(|(a, b)| a.canonical() == b.canonical())
}

/// Remove adjacent gate pairs that multiply to the identity.
///
/// Two gates are adjacent when the second is the next operation on every
/// wire of the first and they act on the same operand list. Removal
/// repeats until nothing cancels, so `H X X H` disappears completely.
pub struct CancelInversePairs;

impl CancelInversePairs {
    fn find_pair(dag: &CircuitDag) -> Option<(NodeIndex, NodeIndex)> {
        for (node, inst) in dag.topological_ops() {
            let Some(gate) = inst.as_standard_gate() else {
                continue;
            };
            let Some(&first_qubit) = inst.qubits.first() else {
                continue;
            };
            let Some(next) = dag.next_on_wire(node, WireId::Qubit(first_qubit)) else {
                continue;
            };
            let Some(next_inst) = dag.get_instruction(next) else {
                continue;
            };
            let adjacent_everywhere = inst
                .qubits
                .iter()
                .all(|&q| dag.next_on_wire(node, WireId::Qubit(q)) == Some(next));
            if adjacent_everywhere
                && next_inst.qubits == inst.qubits
                && next_inst.as_standard_gate().is_some_and(|g| undoes(gate, g))
            {
                return Some((node, next));
            }
        }
        None
    }
}

impl Pass for CancelInversePairs {
    fn name(&self) -> &str {
        "CancelInversePairs"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, dag: &mut CircuitDag, _properties: &mut PropertySet) -> CompileResult<()> {
        let mut removed = 0;
        while let Some((a, b)) = Self::find_pair(dag) {
            dag.remove_op(a)?;
            dag.remove_op(b)?;
            removed += 2;
        }
        if removed > 0 {
            debug!("Cancelled {removed} gates");
        }
        Ok(())
    }
}

/// Fuse runs of numeric single-qubit gates into one rotation and
/// resynthesise it in the target basis.
///
/// A run is kept as-is unless the resynthesis is strictly shorter.
/// Without a basis, fused runs become a single `u`.
pub struct Optimize1qGates;

fn fusable(inst: &Instruction) -> Option<Unitary2x2> {
    if inst.qubits.len() != 1 {
        return None;
    }
    Unitary2x2::from_gate(inst.as_standard_gate()?)
}

fn flush(
    run: &mut Vec<Instruction>,
    qubit: QubitId,
    basis: &BasisGates,
    out: &mut Vec<Instruction>,
) -> CompileResult<()> {
    if run.is_empty() {
        return Ok(());
    }
    let matrix = run
        .iter()
        .filter_map(fusable)
        .fold(Unitary2x2::identity(), |acc, m| m * acc);
    let replacement = if matrix.is_identity() {
        vec![]
    } else {
        let (theta, phi, lambda) = matrix.to_u_params();
        synthesize_1q(theta.into(), phi.into(), lambda.into(), qubit, basis)?
    };
    if replacement.len() < run.len() {
        out.extend(replacement);
    } else {
        out.append(run);
    }
    run.clear();
    Ok(())
}

impl Pass for Optimize1qGates {
    fn name(&self) -> &str {
        "Optimize1qGates"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()> {
        let basis = properties
            .basis_gates
            .clone()
            .unwrap_or_else(|| BasisGates::new(["u"]));
        let mut runs: Vec<Vec<Instruction>> = vec![vec![]; dag.num_qubits() as usize];
        let mut ordered = vec![];
        for (_, inst) in dag.topological_ops() {
            if fusable(inst).is_some() {
                runs[inst.qubits[0].index()].push(inst.clone());
                continue;
            }
            for &q in &inst.qubits {
                flush(&mut runs[q.index()], q, &basis, &mut ordered)?;
            }
            ordered.push(inst.clone());
        }
        for (q, run) in runs.iter_mut().enumerate() {
            flush(run, QubitId(q as u32), &basis, &mut ordered)?;
        }

        let before = dag.num_ops();
        let mut fused = CircuitDag::new(dag.num_qubits(), dag.num_clbits());
        for inst in ordered {
            fused.apply(inst)?;
        }
        *dag = fused;
        debug!("Single-qubit fusion: {before} -> {} ops", dag.num_ops());
        Ok(())
    }
}
