//! Error types for compiler stacks.

use rivet_compile::CompileError;
use rivet_ir::IrError;
use thiserror::Error;

use crate::stack::StackKind;

/// Errors a stack can report.
///
/// A search that runs out of budget is not an error: it returns its best
/// candidate with [`FragmentQuality::BestEffort`](crate::FragmentQuality).
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum StackError {
    /// The circuit holds an instruction the stack cannot translate.
    #[error("Stack '{stack}' cannot translate gate '{gate}'")]
    UnsupportedGate {
        /// Gate name.
        gate: String,
        /// Stack that rejected it.
        stack: String,
    },

    /// Options are malformed or out of range.
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// No stack registered under this identifier.
    #[error("No stack registered as '{0}'")]
    UnknownStack(String),

    /// A stack produced a fragment whose parts disagree.
    #[error("Inconsistent fragment: {0}")]
    InconsistentFragment(String),

    /// Layout, routing or translation failure.
    #[error("Compilation error: {0}")]
    Compile(#[from] CompileError),

    /// Circuit construction failure.
    #[error("IR error: {0}")]
    Ir(#[from] IrError),
}

impl StackError {
    /// Attach the stack name to compile errors that name a gate.
    pub fn from_compile(err: CompileError, stack: StackKind) -> Self {
        match err {
            CompileError::GateNotInBasis(gate) => StackError::UnsupportedGate {
                gate,
                stack: stack.to_string(),
            },
            other => StackError::Compile(other),
        }
    }
}

/// Result type for stack operations.
pub type StackResult<T> = Result<T, StackError>;
