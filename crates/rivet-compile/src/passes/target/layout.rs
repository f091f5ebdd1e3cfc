//! Layout passes: choose where each virtual qubit starts.
//!
//! Both passes honour a layout already present in the properties. Such a
//! layout holds pinned positions; the remaining virtual qubits are placed
//! by [`Layout::extend_to`].

use rivet_ir::CircuitDag;

use crate::compress::compress;
use crate::error::{CompileError, CompileResult};
use crate::layout::Layout;
use crate::pass::{Pass, PassKind};
use crate::property::{CouplingMap, PropertySet};

fn target(dag: &CircuitDag, properties: &PropertySet) -> CompileResult<CouplingMap> {
    let coupling_map = properties
        .coupling_map
        .as_ref()
        .ok_or(CompileError::MissingCouplingMap)?;
    if dag.num_qubits() > coupling_map.num_qubits() {
        return Err(CompileError::CircuitTooLarge {
            required: dag.num_qubits(),
            available: coupling_map.num_qubits(),
        });
    }
    Ok(coupling_map.clone())
}

fn complete_pinned(
    dag: &CircuitDag,
    properties: &mut PropertySet,
    coupling_map: &CouplingMap,
) -> CompileResult<bool> {
    match properties.layout.take() {
        Some(pinned) => {
            properties.layout = Some(pinned.extend_to(dag.num_qubits(), coupling_map)?);
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Virtual qubit `i` on physical qubit `i`.
pub struct TrivialLayout;

impl Pass for TrivialLayout {
    fn name(&self) -> &str {
        "TrivialLayout"
    }

    fn kind(&self) -> PassKind {
        PassKind::Analysis
    }

    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()> {
        let coupling_map = target(dag, properties)?;
        if !complete_pinned(dag, properties, &coupling_map)? {
            properties.layout = Some(Layout::trivial(dag.num_qubits(), coupling_map.num_qubits())?);
        }
        Ok(())
    }
}

/// Virtual qubits on the densest connected region the compressor finds.
pub struct DenseLayout;

impl Pass for DenseLayout {
    fn name(&self) -> &str {
        "DenseLayout"
    }

    fn kind(&self) -> PassKind {
        PassKind::Analysis
    }

    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()> {
        let coupling_map = target(dag, properties)?;
        if !complete_pinned(dag, properties, &coupling_map)? {
            let region = compress(&coupling_map, dag.num_qubits())?;
            properties.layout = Some(Layout::from_physical_list(
                coupling_map.num_qubits(),
                &region.selected,
            )?);
        }
        Ok(())
    }
}
