//! SWAP insertion.
//!
//! Routing rebuilds the DAG over physical qubits. Every two-qubit gate
//! whose operands are not adjacent is preceded by SWAPs, and the layout and
//! permutation are updated as each SWAP is emitted, so the position of every
//! virtual qubit is known at every point of the output.

use rivet_ir::{CircuitDag, Instruction, QubitId, StandardGate};
use tracing::debug;

use crate::error::{CompileError, CompileResult};
use crate::layout::{Layout, Permutation};
use crate::pass::{Pass, PassKind};
use crate::property::{CouplingMap, PropertySet};

/// Where routing left the qubits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingOutcome {
    /// Layout after the last SWAP.
    pub final_layout: Layout,
    /// Start position to end position, for every physical qubit.
    pub permutation: Permutation,
    /// Number of SWAPs inserted.
    pub swaps: usize,
}

/// Incremental physical-circuit writer that tracks qubit movement.
///
/// Routing strategies decide which SWAPs to insert; the router emits them,
/// keeps the layout current and rejects gates on non-adjacent qubits.
#[derive(Debug, Clone)]
pub struct Router<'a> {
    coupling_map: &'a CouplingMap,
    layout: Layout,
    permutation: Permutation,
    out: CircuitDag,
    swaps: usize,
}

impl<'a> Router<'a> {
    /// Start routing from `initial` on `coupling_map`.
    pub fn new(
        coupling_map: &'a CouplingMap,
        initial: &Layout,
        num_clbits: u32,
    ) -> CompileResult<Self> {
        if initial.num_physical() != coupling_map.num_qubits() {
            return Err(CompileError::DimensionMismatch {
                expected: coupling_map.num_qubits() as usize,
                got: initial.num_physical() as usize,
            });
        }
        Ok(Self {
            coupling_map,
            layout: initial.clone(),
            permutation: Permutation::identity(coupling_map.num_qubits()),
            out: CircuitDag::new(coupling_map.num_qubits(), num_clbits),
            swaps: 0,
        })
    }

    /// Current layout.
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// The device.
    pub fn coupling_map(&self) -> &CouplingMap {
        self.coupling_map
    }

    /// Number of SWAPs emitted so far.
    pub fn swap_count(&self) -> usize {
        self.swaps
    }

    /// Current physical position of `qubit`.
    pub fn physical(&self, qubit: QubitId) -> CompileResult<u32> {
        self.layout
            .get_physical(qubit)
            .ok_or(CompileError::UnmappedQubit { qubit })
    }

    /// Emit a SWAP between two adjacent physical qubits.
    pub fn swap(&mut self, a: u32, b: u32) -> CompileResult<()> {
        if !self.coupling_map.is_connected(a, b) {
            return Err(CompileError::RoutingFailed { qubit1: a, qubit2: b });
        }
        self.out.apply(Instruction::two_qubit_gate(
            StandardGate::Swap,
            QubitId(a),
            QubitId(b),
        ))?;
        self.layout.swap_physical(a, b)?;
        self.permutation.then_swap(a, b);
        self.swaps += 1;
        Ok(())
    }

    /// Move `from` next to `to` along a shortest path.
    pub fn bring_adjacent(&mut self, from: QubitId, to: QubitId) -> CompileResult<()> {
        let (pa, pb) = (self.physical(from)?, self.physical(to)?);
        let path = self
            .coupling_map
            .shortest_path(pa, pb)
            .ok_or(CompileError::RoutingFailed { qubit1: pa, qubit2: pb })?;
        for step in path.windows(2).take(path.len().saturating_sub(2)) {
            self.swap(step[0], step[1])?;
        }
        Ok(())
    }

    /// Emit a virtual-qubit instruction at the current positions.
    pub fn emit(&mut self, instruction: &Instruction) -> CompileResult<()> {
        let mapped = instruction.try_map_qubits(|q| self.physical(q).map(QubitId))?;
        if instruction.is_gate() {
            match mapped.qubits.as_slice() {
                [a, b] if !self.coupling_map.is_connected(a.0, b.0) => {
                    return Err(CompileError::RoutingFailed {
                        qubit1: a.0,
                        qubit2: b.0,
                    });
                }
                qs if qs.len() > 2 => {
                    return Err(CompileError::PassFailed {
                        name: "routing".into(),
                        reason: format!(
                            "{}-qubit gate '{}' must be unrolled before routing",
                            qs.len(),
                            instruction.name()
                        ),
                    });
                }
                _ => {}
            }
        }
        self.out.apply(mapped)?;
        Ok(())
    }

    /// The physical DAG and where the qubits ended up.
    pub fn finish(self) -> (CircuitDag, RoutingOutcome) {
        (
            self.out,
            RoutingOutcome {
                final_layout: self.layout,
                permutation: self.permutation,
                swaps: self.swaps,
            },
        )
    }
}

/// Whether routing has to care about `instruction`'s operand adjacency.
pub(crate) fn is_two_qubit_gate(instruction: &Instruction) -> bool {
    instruction.is_gate() && instruction.qubits.len() == 2
}

/// Shortest-path routing: before each non-adjacent two-qubit gate, the
/// first operand walks towards the second.
pub struct BasicRouting;

impl Pass for BasicRouting {
    fn name(&self) -> &str {
        "BasicRouting"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()> {
        let coupling_map = properties
            .coupling_map
            .as_ref()
            .ok_or(CompileError::MissingCouplingMap)?;
        let layout = properties.layout.as_ref().ok_or(CompileError::MissingLayout)?;

        let mut router = Router::new(coupling_map, layout, dag.num_clbits())?;
        for (_, instruction) in dag.topological_ops() {
            if is_two_qubit_gate(instruction) {
                router.bring_adjacent(instruction.qubits[0], instruction.qubits[1])?;
            }
            router.emit(instruction)?;
        }
        let (routed, outcome) = router.finish();
        debug!("Routing inserted {} swaps", outcome.swaps);
        *dag = routed;
        properties.insert(outcome);
        Ok(())
    }
}
