//! Immutable circuit values and their builder.

use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::dag::CircuitDag;
use crate::error::{IrError, IrResult};
use crate::gate::{Gate, StandardGate};
use crate::instruction::{Instruction, InstructionKind};
use crate::parameter::ParameterExpression;
use crate::qubit::{ClbitId, QubitId};

/// An ordered instruction sequence over `num_qubits` qubits and
/// `num_clbits` classical bits.
///
/// A `Circuit` never changes after construction: every transformation
/// returns a new value. Every operand is in range and every gate's arity
/// matches its operand count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Circuit {
    name: String,
    num_qubits: u32,
    num_clbits: u32,
    instructions: Vec<Instruction>,
}

/// Check operands of `instruction` against a register of the given size.
pub(crate) fn check_operands(
    instruction: &Instruction,
    num_qubits: u32,
    num_clbits: u32,
) -> IrResult<()> {
    let gate_name = instruction.as_gate().map(|g| g.name().to_string());
    if let InstructionKind::Gate(gate) = &instruction.kind {
        let got = u32::try_from(instruction.qubits.len()).unwrap_or(u32::MAX);
        if gate.num_qubits() != got {
            return Err(IrError::QubitCountMismatch {
                gate_name: gate.name().to_string(),
                expected: gate.num_qubits(),
                got,
            });
        }
    }
    let mut seen = FxHashSet::default();
    for &qubit in &instruction.qubits {
        if qubit.0 >= num_qubits {
            return Err(IrError::QubitOutOfRange {
                qubit,
                num_qubits,
                gate_name,
            });
        }
        if !seen.insert(qubit) {
            return Err(IrError::DuplicateQubit { qubit, gate_name });
        }
    }
    let mut seen = FxHashSet::default();
    for &clbit in &instruction.clbits {
        if clbit.0 >= num_clbits || !seen.insert(clbit) {
            return Err(IrError::ClbitOutOfRange {
                clbit,
                num_clbits,
                gate_name,
            });
        }
    }
    if instruction.is_measure() && instruction.qubits.len() != instruction.clbits.len() {
        return Err(IrError::InvalidDag(format!(
            "measure over {} qubits into {} classical bits",
            instruction.qubits.len(),
            instruction.clbits.len()
        )));
    }
    Ok(())
}

/// Longest chain of non-barrier operations, following both quantum and
/// classical wires.
pub(crate) fn depth_of<'a>(
    num_qubits: u32,
    num_clbits: u32,
    instructions: impl IntoIterator<Item = &'a Instruction>,
) -> usize {
    let mut qubit_level = vec![0usize; num_qubits as usize];
    let mut clbit_level = vec![0usize; num_clbits as usize];
    let mut depth = 0;
    for inst in instructions {
        if inst.is_barrier() {
            continue;
        }
        let level = inst
            .qubits
            .iter()
            .map(|q| qubit_level[q.index()])
            .chain(inst.clbits.iter().map(|c| clbit_level[c.index()]))
            .max()
            .unwrap_or(0)
            + 1;
        for q in &inst.qubits {
            qubit_level[q.index()] = level;
        }
        for c in &inst.clbits {
            clbit_level[c.index()] = level;
        }
        depth = depth.max(level);
    }
    depth
}

impl Circuit {
    /// Build a circuit from a validated instruction list.
    pub fn new(
        name: impl Into<String>,
        num_qubits: u32,
        num_clbits: u32,
        instructions: Vec<Instruction>,
    ) -> IrResult<Self> {
        for inst in &instructions {
            check_operands(inst, num_qubits, num_clbits)?;
        }
        Ok(Self {
            name: name.into(),
            num_qubits,
            num_clbits,
            instructions,
        })
    }

    /// A circuit with no instructions.
    pub fn empty(name: impl Into<String>, num_qubits: u32, num_clbits: u32) -> Self {
        Self {
            name: name.into(),
            num_qubits,
            num_clbits,
            instructions: vec![],
        }
    }

    /// Start building a circuit of the given width.
    pub fn builder(name: impl Into<String>, num_qubits: u32, num_clbits: u32) -> CircuitBuilder {
        CircuitBuilder {
            circuit: Self::empty(name, num_qubits, num_clbits),
        }
    }

    /// Circuit name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Same circuit under a different name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Number of qubits.
    pub fn num_qubits(&self) -> u32 {
        self.num_qubits
    }

    /// Number of classical bits.
    pub fn num_clbits(&self) -> u32 {
        self.num_clbits
    }

    /// Instructions in program order.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Number of instructions.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Whether the circuit has no instructions.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Depth, ignoring barriers.
    pub fn depth(&self) -> usize {
        depth_of(self.num_qubits, self.num_clbits, &self.instructions)
    }

    /// Instruction counts by name.
    pub fn count_ops(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for inst in &self.instructions {
            *counts.entry(inst.name().to_string()).or_insert(0) += 1;
        }
        counts
    }

    /// Number of gates acting on two or more qubits.
    pub fn num_nonlocal_gates(&self) -> usize {
        self.instructions
            .iter()
            .filter(|i| i.is_gate() && i.qubits.len() >= 2)
            .count()
    }

    /// Qubits that appear as an operand of any instruction.
    pub fn used_qubits(&self) -> BTreeSet<QubitId> {
        self.instructions
            .iter()
            .flat_map(|i| i.qubits.iter().copied())
            .collect()
    }

    /// Whether any gate still has a symbolic parameter.
    pub fn is_parameterized(&self) -> bool {
        self.instructions.iter().any(Instruction::is_parameterized)
    }

    /// Names of all free parameters.
    pub fn parameters(&self) -> BTreeSet<String> {
        self.instructions
            .iter()
            .flat_map(|i| i.parameters().into_iter().flat_map(|p| p.symbols()))
            .collect()
    }

    /// Bind one parameter everywhere.
    #[must_use]
    pub fn bind(&self, name: &str, value: f64) -> Self {
        self.map_instructions(|i| i.map_parameters(|p| p.bind(name, value).simplify()))
    }

    /// Bind every parameter present in `values`.
    #[must_use]
    pub fn bind_all(&self, values: &BTreeMap<String, f64>) -> Self {
        self.map_instructions(|i| i.map_parameters(|p| p.bind_all(values).simplify()))
    }

    fn map_instructions(&self, f: impl Fn(&Instruction) -> Instruction) -> Self {
        Self {
            name: self.name.clone(),
            num_qubits: self.num_qubits,
            num_clbits: self.num_clbits,
            instructions: self.instructions.iter().map(f).collect(),
        }
    }

    /// The adjoint circuit: instructions reversed and each one inverted.
    ///
    /// Fails on measurement, reset or custom gates.
    pub fn inverse(&self) -> IrResult<Self> {
        let instructions = self
            .instructions
            .iter()
            .rev()
            .map(Instruction::inverse)
            .collect::<IrResult<Vec<_>>>()?;
        Ok(Self {
            name: format!("{}_dg", self.name),
            num_qubits: self.num_qubits,
            num_clbits: self.num_clbits,
            instructions,
        })
    }

    /// This circuit followed by `other` on the same wires.
    ///
    /// `other` may be narrower; it may not be wider.
    pub fn compose(&self, other: &Circuit) -> IrResult<Self> {
        if other.num_qubits > self.num_qubits || other.num_clbits > self.num_clbits {
            return Err(IrError::WidthMismatch {
                num_qubits: self.num_qubits,
                num_clbits: self.num_clbits,
                got_qubits: other.num_qubits,
                got_clbits: other.num_clbits,
            });
        }
        let mut instructions = self.instructions.clone();
        instructions.extend(other.instructions.iter().cloned());
        Ok(Self {
            name: self.name.clone(),
            num_qubits: self.num_qubits,
            num_clbits: self.num_clbits,
            instructions,
        })
    }

    /// The same instructions on a register of at least the current size.
    pub fn widen(&self, num_qubits: u32, num_clbits: u32) -> IrResult<Self> {
        if num_qubits < self.num_qubits || num_clbits < self.num_clbits {
            return Err(IrError::WidthMismatch {
                num_qubits,
                num_clbits,
                got_qubits: self.num_qubits,
                got_clbits: self.num_clbits,
            });
        }
        Ok(Self {
            name: self.name.clone(),
            num_qubits,
            num_clbits,
            instructions: self.instructions.clone(),
        })
    }

    /// Rewrite every qubit operand through `map` onto a register of
    /// `num_qubits` qubits. The result is re-validated.
    pub fn remap_qubits<E: From<IrError>>(
        &self,
        num_qubits: u32,
        mut map: impl FnMut(QubitId) -> Result<QubitId, E>,
    ) -> Result<Self, E> {
        let mut instructions = Vec::with_capacity(self.instructions.len());
        for inst in &self.instructions {
            let mapped = inst.try_map_qubits(&mut map)?;
            check_operands(&mapped, num_qubits, self.num_clbits)?;
            instructions.push(mapped);
        }
        Ok(Self {
            name: self.name.clone(),
            num_qubits,
            num_clbits: self.num_clbits,
            instructions,
        })
    }

    /// Drop measurements that are not followed by any other operation on
    /// their qubit.
    #[must_use]
    pub fn without_final_measurements(&self) -> Self {
        let mut touched_later: FxHashSet<QubitId> = FxHashSet::default();
        let mut kept: Vec<Instruction> = Vec::with_capacity(self.instructions.len());
        for inst in self.instructions.iter().rev() {
            let is_final =
                inst.is_measure() && inst.qubits.iter().all(|q| !touched_later.contains(q));
            if !is_final {
                touched_later.extend(inst.qubits.iter().copied());
                kept.push(inst.clone());
            }
        }
        kept.reverse();
        self.map_instructions_from(kept)
    }

    /// Drop every barrier.
    #[must_use]
    pub fn without_barriers(&self) -> Self {
        self.map_instructions_from(
            self.instructions
                .iter()
                .filter(|i| !i.is_barrier())
                .cloned()
                .collect(),
        )
    }

    fn map_instructions_from(&self, instructions: Vec<Instruction>) -> Self {
        Self {
            name: self.name.clone(),
            num_qubits: self.num_qubits,
            num_clbits: self.num_clbits,
            instructions,
        }
    }

    /// DAG view of this circuit.
    pub fn to_dag(&self) -> CircuitDag {
        let mut dag = CircuitDag::new(self.num_qubits, self.num_clbits);
        for inst in &self.instructions {
            dag.push(inst.clone());
        }
        dag
    }

    /// Linearise a DAG back into a circuit.
    pub fn from_dag(name: impl Into<String>, dag: &CircuitDag) -> Self {
        Self {
            name: name.into(),
            num_qubits: dag.num_qubits(),
            num_clbits: dag.num_clbits(),
            instructions: dag.instructions(),
        }
    }
}

/// Incremental construction of a [`Circuit`].
///
/// Every method validates its operands and returns `&mut Self` so calls chain
/// with `?`.
#[derive(Debug, Clone)]
pub struct CircuitBuilder {
    circuit: Circuit,
}

impl CircuitBuilder {
    /// Append an arbitrary instruction.
    pub fn append(&mut self, instruction: Instruction) -> IrResult<&mut Self> {
        check_operands(&instruction, self.circuit.num_qubits, self.circuit.num_clbits)?;
        self.circuit.instructions.push(instruction);
        Ok(self)
    }

    /// Append every instruction of `other`, which may not be wider.
    pub fn extend(&mut self, other: &Circuit) -> IrResult<&mut Self> {
        self.circuit = self.circuit.compose(other)?;
        Ok(self)
    }

    /// Append a gate on the given qubits.
    pub fn gate(
        &mut self,
        gate: impl Into<Gate>,
        qubits: impl IntoIterator<Item = QubitId>,
    ) -> IrResult<&mut Self> {
        self.append(Instruction::gate(gate, qubits))
    }

    fn one(&mut self, gate: StandardGate, qubit: QubitId) -> IrResult<&mut Self> {
        self.append(Instruction::single_qubit_gate(gate, qubit))
    }

    fn two(&mut self, gate: StandardGate, a: QubitId, b: QubitId) -> IrResult<&mut Self> {
        self.append(Instruction::two_qubit_gate(gate, a, b))
    }

    /// Hadamard.
    pub fn h(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.one(StandardGate::H, qubit)
    }

    /// Pauli-X.
    pub fn x(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.one(StandardGate::X, qubit)
    }

    /// Pauli-Y.
    pub fn y(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.one(StandardGate::Y, qubit)
    }

    /// Pauli-Z.
    pub fn z(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.one(StandardGate::Z, qubit)
    }

    /// S.
    pub fn s(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.one(StandardGate::S, qubit)
    }

    /// S-dagger.
    pub fn sdg(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.one(StandardGate::Sdg, qubit)
    }

    /// T.
    pub fn t(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.one(StandardGate::T, qubit)
    }

    /// T-dagger.
    pub fn tdg(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.one(StandardGate::Tdg, qubit)
    }

    /// sqrt(X).
    pub fn sx(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.one(StandardGate::SX, qubit)
    }

    /// X rotation.
    pub fn rx(
        &mut self,
        theta: impl Into<ParameterExpression>,
        qubit: QubitId,
    ) -> IrResult<&mut Self> {
        self.one(StandardGate::Rx(theta.into()), qubit)
    }

    /// Y rotation.
    pub fn ry(
        &mut self,
        theta: impl Into<ParameterExpression>,
        qubit: QubitId,
    ) -> IrResult<&mut Self> {
        self.one(StandardGate::Ry(theta.into()), qubit)
    }

    /// Z rotation.
    pub fn rz(
        &mut self,
        theta: impl Into<ParameterExpression>,
        qubit: QubitId,
    ) -> IrResult<&mut Self> {
        self.one(StandardGate::Rz(theta.into()), qubit)
    }

    /// Phase gate.
    pub fn p(
        &mut self,
        lambda: impl Into<ParameterExpression>,
        qubit: QubitId,
    ) -> IrResult<&mut Self> {
        self.one(StandardGate::P(lambda.into()), qubit)
    }

    /// Universal single-qubit gate.
    pub fn u(
        &mut self,
        theta: impl Into<ParameterExpression>,
        phi: impl Into<ParameterExpression>,
        lambda: impl Into<ParameterExpression>,
        qubit: QubitId,
    ) -> IrResult<&mut Self> {
        self.one(StandardGate::U(theta.into(), phi.into(), lambda.into()), qubit)
    }

    /// CNOT.
    pub fn cx(&mut self, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.two(StandardGate::CX, control, target)
    }

    /// Controlled-Y.
    pub fn cy(&mut self, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.two(StandardGate::CY, control, target)
    }

    /// Controlled-Z.
    pub fn cz(&mut self, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.two(StandardGate::CZ, control, target)
    }

    /// Controlled-Hadamard.
    pub fn ch(&mut self, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.two(StandardGate::CH, control, target)
    }

    /// SWAP.
    pub fn swap(&mut self, a: QubitId, b: QubitId) -> IrResult<&mut Self> {
        self.two(StandardGate::Swap, a, b)
    }

    /// Controlled phase.
    pub fn cp(
        &mut self,
        lambda: impl Into<ParameterExpression>,
        control: QubitId,
        target: QubitId,
    ) -> IrResult<&mut Self> {
        self.two(StandardGate::CP(lambda.into()), control, target)
    }

    /// Controlled Z rotation.
    pub fn crz(
        &mut self,
        theta: impl Into<ParameterExpression>,
        control: QubitId,
        target: QubitId,
    ) -> IrResult<&mut Self> {
        self.two(StandardGate::CRz(theta.into()), control, target)
    }

    /// ZZ interaction.
    pub fn rzz(
        &mut self,
        theta: impl Into<ParameterExpression>,
        a: QubitId,
        b: QubitId,
    ) -> IrResult<&mut Self> {
        self.two(StandardGate::RZZ(theta.into()), a, b)
    }

    /// Toffoli.
    pub fn ccx(&mut self, c1: QubitId, c2: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.append(Instruction::gate(StandardGate::CCX, [c1, c2, target]))
    }

    /// Fredkin.
    pub fn cswap(&mut self, control: QubitId, a: QubitId, b: QubitId) -> IrResult<&mut Self> {
        self.append(Instruction::gate(StandardGate::CSwap, [control, a, b]))
    }

    /// Measure `qubit` into `clbit`.
    pub fn measure(&mut self, qubit: QubitId, clbit: ClbitId) -> IrResult<&mut Self> {
        self.append(Instruction::measure(qubit, clbit))
    }

    /// Measure qubit `i` into classical bit `i` for every qubit.
    pub fn measure_all(&mut self) -> IrResult<&mut Self> {
        for i in 0..self.circuit.num_qubits {
            self.measure(QubitId(i), ClbitId(i))?;
        }
        Ok(self)
    }

    /// Reset.
    pub fn reset(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.append(Instruction::reset(qubit))
    }

    /// Barrier on the given qubits.
    pub fn barrier(&mut self, qubits: impl IntoIterator<Item = QubitId>) -> IrResult<&mut Self> {
        self.append(Instruction::barrier(qubits))
    }

    /// Barrier on every qubit.
    pub fn barrier_all(&mut self) -> IrResult<&mut Self> {
        let all: Vec<_> = (0..self.circuit.num_qubits).map(QubitId).collect();
        self.barrier(all)
    }

    /// Finish building.
    pub fn build(&self) -> Circuit {
        self.circuit.clone()
    }
}
