//! The pass trait.

use std::fmt;

use rivet_ir::CircuitDag;

use crate::error::CompileResult;
use crate::property::PropertySet;

/// The kind of compilation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    /// Reads the DAG, writes properties.
    Analysis,
    /// Rewrites the DAG.
    Transformation,
}

impl fmt::Display for PassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassKind::Analysis => f.write_str("analysis"),
            PassKind::Transformation => f.write_str("transformation"),
        }
    }
}

/// A compilation pass over a circuit DAG.
///
/// Layout passes are analysis passes: they choose `properties.layout` and
/// leave the DAG alone. Routing replaces the virtual-qubit DAG with a
/// physical one and records a
/// [`RoutingOutcome`](crate::passes::RoutingOutcome) property.
pub trait Pass: Send + Sync {
    /// Pass name, used in logs and metrics.
    fn name(&self) -> &str;

    /// Pass kind.
    fn kind(&self) -> PassKind;

    /// Run the pass.
    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()>;

    /// Whether the pass has anything to do.
    fn should_run(&self, _dag: &CircuitDag, _properties: &PropertySet) -> bool {
        true
    }
}
