//! Built-in compilation passes.
//!
//! - [`agnostic`]: passes that only look at DAG structure
//! - [`target`]: passes that need the coupling map or basis

pub mod agnostic;
pub mod target;

pub use agnostic::{CancelInversePairs, Optimize1qGates};
pub use target::{
    BasicRouting, BasisTranslation, DenseLayout, Router, RoutingOutcome, TrivialLayout, Unroll3q,
    synthesize_1q, translate_instruction,
};

use rivet_ir::{CircuitDag, Instruction};

use crate::error::CompileResult;

/// Rebuild `dag` in topological order, replacing each instruction by what
/// `rewrite` returns for it.
pub(crate) fn rebuild_dag(
    dag: &CircuitDag,
    mut rewrite: impl FnMut(&Instruction) -> CompileResult<Vec<Instruction>>,
) -> CompileResult<CircuitDag> {
    let mut out = CircuitDag::new(dag.num_qubits(), dag.num_clbits());
    for (_, instruction) in dag.topological_ops() {
        for replacement in rewrite(instruction)? {
            out.apply(replacement)?;
        }
    }
    Ok(out)
}
