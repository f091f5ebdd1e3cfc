//! Error types for the compilation crate.

use rivet_ir::QubitId;
use thiserror::Error;

/// Errors that can occur during layout algebra, compression or compilation.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum CompileError {
    /// Error from the IR crate.
    #[error("IR error: {0}")]
    Ir(#[from] rivet_ir::IrError),

    /// Missing coupling map for a pass that needs one.
    #[error("Missing coupling map")]
    MissingCouplingMap,

    /// Missing layout for routing.
    #[error("Missing layout for routing")]
    MissingLayout,

    /// Missing basis gates.
    #[error("Missing basis gates for translation")]
    MissingBasisGates,

    /// Routing failed because qubits lie in disconnected components.
    #[error("Routing failed: physical qubits {qubit1} and {qubit2} are not connected")]
    RoutingFailed {
        /// First physical qubit.
        qubit1: u32,
        /// Second physical qubit.
        qubit2: u32,
    },

    /// Gate not in the target basis and no translation rule exists.
    #[error("Gate '{0}' not in target basis")]
    GateNotInBasis(String),

    /// Pass execution failed.
    #[error("Pass '{name}' failed: {reason}")]
    PassFailed {
        /// Pass name.
        name: String,
        /// Failure reason.
        reason: String,
    },

    /// Invalid pass or layout configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Circuit too large for the target.
    #[error("Circuit requires {required} qubits but target only has {available}")]
    CircuitTooLarge {
        /// Qubits needed.
        required: u32,
        /// Qubits available.
        available: u32,
    },

    /// Permutation or layout sizes disagree.
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Expected size.
        expected: usize,
        /// Actual size.
        got: usize,
    },

    /// A virtual qubit has no physical position in the layout.
    #[error("Virtual qubit {qubit} is not mapped by the layout")]
    UnmappedQubit {
        /// The unmapped qubit.
        qubit: QubitId,
    },

    /// A vector is not a bijection on `0..n`.
    #[error("Invalid permutation: {0}")]
    InvalidPermutation(String),

    /// Physical index outside the device.
    #[error("Physical qubit {physical} out of range for {num_physical}-qubit device")]
    PhysicalOutOfRange {
        /// The physical index.
        physical: u32,
        /// Device size.
        num_physical: u32,
    },

    /// Two virtual qubits (or a virtual qubit and an ancilla) claim one physical qubit.
    #[error("Physical qubit {physical} is already occupied")]
    PhysicalOccupied {
        /// The contested physical index.
        physical: u32,
    },

    /// The device has no connected region large enough.
    #[error("Need {required} connected qubits but the device offers at most {available}")]
    InsufficientConnectivity {
        /// Qubits needed.
        required: u32,
        /// Size of the largest region reachable by the compressor.
        available: u32,
    },
}

/// Result type for compilation operations.
pub type CompileResult<T> = Result<T, CompileError>;
