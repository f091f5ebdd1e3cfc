//! Circuit construction errors.

use crate::qubit::{ClbitId, QubitId};
use thiserror::Error;

/// Failure while building or transforming a circuit.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum IrError {
    /// Qubit index is outside the circuit's register.
    #[error("{qubit} outside a {num_qubits}-qubit register{}", in_gate(.gate_name))]
    QubitOutOfRange {
        /// Qubit index.
        qubit: QubitId,
        /// Register width.
        num_qubits: u32,
        /// Gate being applied, if known.
        gate_name: Option<String>,
    },

    /// Classical bit index is outside the circuit's register.
    #[error("{clbit} outside a {num_clbits}-bit classical register{}", in_gate(.gate_name))]
    ClbitOutOfRange {
        /// Bit index.
        clbit: ClbitId,
        /// Register width.
        num_clbits: u32,
        /// Gate being applied, if known.
        gate_name: Option<String>,
    },

    /// The DAG is not a well-formed wire graph.
    #[error("malformed DAG: {0}")]
    InvalidDag(String),

    /// Node index not present in the DAG.
    #[error("no such DAG node")]
    InvalidNode,

    /// Operand count does not match gate arity.
    #[error("'{gate_name}' acts on {expected} qubits, {got} given")]
    QubitCountMismatch {
        /// Gate name.
        gate_name: String,
        /// Gate arity.
        expected: u32,
        /// Operands supplied.
        got: u32,
    },

    /// Duplicate qubit in one operation.
    #[error("{qubit} used twice{}", in_gate(.gate_name))]
    DuplicateQubit {
        /// Repeated qubit.
        qubit: QubitId,
        /// Gate being applied, if known.
        gate_name: Option<String>,
    },

    /// Two circuits cannot be composed because the second is wider.
    #[error(
        "cannot compose {got_qubits}q/{got_clbits}c onto {num_qubits}q/{num_clbits}c: too wide"
    )]
    WidthMismatch {
        /// Qubits of the receiving circuit.
        num_qubits: u32,
        /// Classical bits of the receiving circuit.
        num_clbits: u32,
        /// Qubits of the appended circuit.
        got_qubits: u32,
        /// Classical bits of the appended circuit.
        got_clbits: u32,
    },

    /// Measurement or reset inside a circuit being inverted.
    #[error("'{0}' has no inverse")]
    NotInvertible(String),

    /// A symbolic parameter was needed as a number.
    #[error("parameter '{0}' has no value")]
    UnboundParameter(String),
}

#[allow(clippy::ref_option)]
fn in_gate(gate_name: &Option<String>) -> String {
    gate_name
        .as_deref()
        .map(|name| format!(" in '{name}'"))
        .unwrap_or_default()
}

/// Result alias for IR operations.
pub type IrResult<T> = Result<T, IrError>;
