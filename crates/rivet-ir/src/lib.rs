//! Rivet circuit intermediate representation.
//!
//! Circuits are immutable values: an ordered list of [`Instruction`]s over
//! `num_qubits` qubits and `num_clbits` classical bits. Every transformation
//! (inversion, composition, qubit remapping, parameter binding) returns a new
//! [`Circuit`]. Compilation passes work on the [`CircuitDag`] view.
//!
//! # Example
//!
//! ```rust
//! use rivet_ir::{Circuit, QubitId};
//!
//! let mut builder = Circuit::builder("bell", 2, 2);
//! builder.h(QubitId(0))?.cx(QubitId(0), QubitId(1))?;
//! builder.measure_all()?;
//! let bell = builder.build();
//!
//! assert_eq!(bell.num_qubits(), 2);
//! assert_eq!(bell.depth(), 3);
//! # Ok::<(), rivet_ir::IrError>(())
//! ```

pub mod circuit;
pub mod dag;
pub mod error;
pub mod gate;
pub mod instruction;
pub mod parameter;
pub mod qubit;

pub use circuit::{Circuit, CircuitBuilder};
pub use dag::{CircuitDag, DagEdge, DagNode, NodeIndex, WireId};
pub use error::{IrError, IrResult};
pub use gate::{CustomGate, Gate, GateKind, StandardGate};
pub use instruction::{Instruction, InstructionKind};
pub use parameter::ParameterExpression;
pub use qubit::{ClbitId, QubitId};
