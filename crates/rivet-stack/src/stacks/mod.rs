//! Built-in stacks.

mod instantiation;
mod pass_manager;
mod search;

pub use instantiation::{DEFAULT_TARGET_FIDELITY, InstantiationReport, InstantiationStack};
pub use pass_manager::PassManagerStack;
pub use search::{DEFAULT_BEAM_WIDTH, DEFAULT_BUDGET, SearchReport, SearchStack};

use rivet_compile::{CompileError, Layout, PropertySet, RoutingOutcome};
use tracing::warn;

use crate::error::StackResult;
use crate::options::StackOptions;
use crate::stack::StackKind;

/// Validate options and flag what the stacks accept but ignore.
fn prepare(options: &StackOptions, kind: StackKind) -> StackResult<()> {
    options.validate()?;
    if options.dynamical_decoupling {
        warn!("Stack {kind}: dynamical decoupling requested but not implemented, ignoring");
    }
    Ok(())
}

/// The chosen initial layout and the routing outcome of a finished pipeline.
fn take_routing(properties: &mut PropertySet) -> StackResult<(Layout, RoutingOutcome)> {
    let layout = properties.layout.take().ok_or(CompileError::MissingLayout)?;
    let outcome = properties
        .remove::<RoutingOutcome>()
        .ok_or_else(|| CompileError::PassFailed {
            name: "routing".into(),
            reason: "pipeline finished without a routing outcome".into(),
        })?;
    Ok((layout, outcome))
}
