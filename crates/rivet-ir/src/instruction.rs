//! Instructions: an operation plus its qubit and classical-bit operands.

use serde::{Deserialize, Serialize};

use crate::error::{IrError, IrResult};
use crate::gate::{Gate, GateKind, StandardGate};
use crate::parameter::ParameterExpression;
use crate::qubit::{ClbitId, QubitId};

/// What an instruction does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InstructionKind {
    /// A unitary gate.
    Gate(Gate),
    /// Measurement of each qubit into the matching classical bit.
    Measure,
    /// Reset to |0⟩.
    Reset,
    /// Scheduling barrier.
    Barrier,
    /// Idle for a device-specific duration.
    Delay {
        /// Duration in device units.
        duration: u64,
    },
}

impl InstructionKind {
    /// Name used in gate counts and error messages.
    pub fn name(&self) -> &str {
        match self {
            InstructionKind::Gate(g) => g.name(),
            InstructionKind::Measure => "measure",
            InstructionKind::Reset => "reset",
            InstructionKind::Barrier => "barrier",
            InstructionKind::Delay { .. } => "delay",
        }
    }
}

/// An operation applied to concrete operands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    /// The operation.
    pub kind: InstructionKind,
    /// Qubit operands, in gate order (control first).
    pub qubits: Vec<QubitId>,
    /// Classical operands.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clbits: Vec<ClbitId>,
}

impl Instruction {
    /// A gate on the given qubits.
    pub fn gate(gate: impl Into<Gate>, qubits: impl IntoIterator<Item = QubitId>) -> Self {
        Self {
            kind: InstructionKind::Gate(gate.into()),
            qubits: qubits.into_iter().collect(),
            clbits: vec![],
        }
    }

    /// A single-qubit standard gate.
    pub fn single_qubit_gate(gate: StandardGate, qubit: QubitId) -> Self {
        Self::gate(gate, [qubit])
    }

    /// A two-qubit standard gate.
    pub fn two_qubit_gate(gate: StandardGate, q1: QubitId, q2: QubitId) -> Self {
        Self::gate(gate, [q1, q2])
    }

    /// Measure `qubit` into `clbit`.
    pub fn measure(qubit: QubitId, clbit: ClbitId) -> Self {
        Self {
            kind: InstructionKind::Measure,
            qubits: vec![qubit],
            clbits: vec![clbit],
        }
    }

    /// Reset `qubit`.
    pub fn reset(qubit: QubitId) -> Self {
        Self {
            kind: InstructionKind::Reset,
            qubits: vec![qubit],
            clbits: vec![],
        }
    }

    /// Barrier across `qubits`.
    pub fn barrier(qubits: impl IntoIterator<Item = QubitId>) -> Self {
        Self {
            kind: InstructionKind::Barrier,
            qubits: qubits.into_iter().collect(),
            clbits: vec![],
        }
    }

    /// Delay on `qubit`.
    pub fn delay(qubit: QubitId, duration: u64) -> Self {
        Self {
            kind: InstructionKind::Delay { duration },
            qubits: vec![qubit],
            clbits: vec![],
        }
    }

    /// Instruction name.
    pub fn name(&self) -> &str {
        self.kind.name()
    }

    /// Whether this is a gate.
    pub fn is_gate(&self) -> bool {
        matches!(self.kind, InstructionKind::Gate(_))
    }

    /// Whether this is a measurement.
    pub fn is_measure(&self) -> bool {
        matches!(self.kind, InstructionKind::Measure)
    }

    /// Whether this is a barrier.
    pub fn is_barrier(&self) -> bool {
        matches!(self.kind, InstructionKind::Barrier)
    }

    /// The gate, if this is one.
    pub fn as_gate(&self) -> Option<&Gate> {
        match &self.kind {
            InstructionKind::Gate(g) => Some(g),
            _ => None,
        }
    }

    /// The standard gate, if this is one.
    pub fn as_standard_gate(&self) -> Option<&StandardGate> {
        self.as_gate().and_then(Gate::as_standard)
    }

    /// Gate parameters; empty for non-gate instructions.
    pub fn parameters(&self) -> Vec<&ParameterExpression> {
        match &self.kind {
            InstructionKind::Gate(g) => g.kind.parameters(),
            _ => vec![],
        }
    }

    /// Whether a symbolic parameter remains.
    pub fn is_parameterized(&self) -> bool {
        self.parameters().iter().any(|p| p.is_symbolic())
    }

    /// Same operation on remapped qubits.
    ///
    /// Stops at the first qubit `map` rejects and returns its error.
    pub fn try_map_qubits<E>(
        &self,
        mut map: impl FnMut(QubitId) -> Result<QubitId, E>,
    ) -> Result<Self, E> {
        let qubits = self
            .qubits
            .iter()
            .map(|&q| map(q))
            .collect::<Result<Vec<_>, E>>()?;
        Ok(Self {
            kind: self.kind.clone(),
            qubits,
            clbits: self.clbits.clone(),
        })
    }

    /// Same operation with every parameter passed through `f`.
    #[must_use]
    pub fn map_parameters(&self, f: impl Fn(&ParameterExpression) -> ParameterExpression) -> Self {
        let kind = match &self.kind {
            InstructionKind::Gate(gate) => {
                let kind = match &gate.kind {
                    GateKind::Standard(g) => GateKind::Standard(g.map_parameters(&f)),
                    GateKind::Custom(g) => {
                        let mut g = g.clone();
                        g.params = g.params.iter().map(&f).collect();
                        GateKind::Custom(g)
                    }
                };
                InstructionKind::Gate(Gate {
                    kind,
                    label: gate.label.clone(),
                })
            }
            other => other.clone(),
        };
        Self {
            kind,
            qubits: self.qubits.clone(),
            clbits: self.clbits.clone(),
        }
    }

    /// The adjoint instruction.
    ///
    /// Barriers and delays are their own inverse. Measurement, reset and
    /// custom gates have none.
    pub fn inverse(&self) -> IrResult<Self> {
        let kind = match &self.kind {
            InstructionKind::Gate(gate) => match &gate.kind {
                GateKind::Standard(g) => InstructionKind::Gate(Gate {
                    kind: GateKind::Standard(g.inverse()),
                    label: gate.label.clone(),
                }),
                GateKind::Custom(g) => return Err(IrError::NotInvertible(g.name.clone())),
            },
            InstructionKind::Barrier | InstructionKind::Delay { .. } => self.kind.clone(),
            InstructionKind::Measure | InstructionKind::Reset => {
                return Err(IrError::NotInvertible(self.name().to_string()));
            }
        };
        Ok(Self {
            kind,
            qubits: self.qubits.clone(),
            clbits: self.clbits.clone(),
        })
    }
}
