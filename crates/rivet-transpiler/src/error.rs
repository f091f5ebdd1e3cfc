//! Error types for orchestration.

use rivet_compile::CompileError;
use rivet_ir::{IrError, QubitId};
use rivet_stack::{StackError, StackKind};
use thiserror::Error;

/// Errors raised while stitching, caching or persisting fragments.
///
/// Every variant is `Clone`: a failed cache computation is handed to each
/// waiting caller as-is.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum TranspileError {
    /// A stack call failed inside a composition.
    #[error("{stage} failed on stack '{stack}': {source}")]
    Stage {
        /// Which composition step, e.g. `chain[2]` or `left`.
        stage: String,
        /// The stack that was called.
        stack: StackKind,
        /// What the stack reported.
        #[source]
        source: StackError,
    },

    /// Two fragments disagree on where a virtual qubit sits at their seam.
    #[error("Virtual qubit {qubit} ends on physical {expected} but the next fragment has it on {}",
        .got.map_or_else(|| "no position".to_string(), |p| p.to_string()))]
    LinkMismatch {
        /// The virtual qubit.
        qubit: QubitId,
        /// Position at the end of the first fragment.
        expected: u32,
        /// Position at the start of the second fragment.
        got: Option<u32>,
    },

    /// Reading or writing a cache file failed.
    #[error("Cache persistence error: {0}")]
    Persistence(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A chain needs at least one circuit.
    #[error("Cannot chain an empty list of circuits")]
    EmptyChain,

    /// The cost model has no fidelity for this gate.
    #[error("No cost defined for '{gate}' on {num_qubits} qubits")]
    CostUndefined {
        /// Gate name.
        gate: String,
        /// Its arity.
        num_qubits: usize,
    },

    /// Invalid argument to a helper such as circuit packing.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The computation this caller was waiting on unwound before finishing.
    #[error("The computation for this cache key was abandoned")]
    ComputationAbandoned,

    /// Stack-level error outside a composition.
    #[error("Stack error: {0}")]
    Stack(#[from] StackError),

    /// Layout or compression error.
    #[error("Compilation error: {0}")]
    Compile(#[from] CompileError),

    /// Circuit error.
    #[error("IR error: {0}")]
    Ir(#[from] IrError),
}

impl TranspileError {
    /// Wrap a stack error with the composition step that raised it.
    pub fn stage(stage: impl Into<String>, stack: StackKind, source: StackError) -> Self {
        TranspileError::Stage {
            stage: stage.into(),
            stack,
            source,
        }
    }
}

/// Result type for orchestration.
pub type TranspileResult<T> = Result<T, TranspileError>;
