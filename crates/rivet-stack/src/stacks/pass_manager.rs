//! The preset pass-manager stack.

use tracing::debug;

use rivet_compile::{PassEvent, PassManagerBuilder, PropertySet};
use rivet_ir::Circuit;

use super::{prepare, take_routing};
use crate::device::DeviceConstraints;
use crate::error::{StackError, StackResult};
use crate::fragment::{FragmentQuality, TranspiledFragment};
use crate::options::StackOptions;
use crate::stack::{Stack, StackKind, assemble_fragment, basis_for};

/// Runs the preset pipeline for the requested optimization level.
///
/// Level 0 places qubits trivially; level 2 and up use the densest region
/// of the device. A pinned initial layout is always honoured.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassManagerStack;

impl PassManagerStack {
    /// Transpile, reporting each pass to `callback`.
    pub fn transpile_with_callback(
        &self,
        circuit: &Circuit,
        device: &DeviceConstraints,
        options: &StackOptions,
        callback: &mut dyn FnMut(&PassEvent<'_>),
    ) -> StackResult<TranspiledFragment> {
        let kind = self.kind();
        prepare(options, kind)?;
        let mut properties = PropertySet::new()
            .with_target(device.coupling_map.clone(), basis_for(device, options).clone());
        properties.layout = options.initial_layout.clone();

        let (pm, mut properties) = PassManagerBuilder::new()
            .with_optimization_level(options.optimization_level)
            .with_properties(properties)
            .build();
        let mut dag = circuit.to_dag();
        pm.run_with_callback(&mut dag, &mut properties, callback)
            .map_err(|e| StackError::from_compile(e, kind))?;

        let (initial, outcome) = take_routing(&mut properties)?;
        debug!(
            "{} on {}: {} ops, {} swaps",
            kind,
            device.name,
            dag.num_ops(),
            outcome.swaps
        );
        assemble_fragment(
            circuit.name(),
            &dag,
            initial,
            outcome,
            circuit.num_qubits(),
            FragmentQuality::Converged,
        )
    }
}

impl Stack for PassManagerStack {
    fn kind(&self) -> StackKind {
        StackKind::PassManager
    }

    fn transpile(
        &self,
        circuit: &Circuit,
        device: &DeviceConstraints,
        options: &StackOptions,
    ) -> StackResult<TranspiledFragment> {
        self.transpile_with_callback(circuit, device, options, &mut |_| {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rivet_compile::{BasisGates, CouplingMap, Layout};
    use rivet_ir::QubitId;

    fn device() -> DeviceConstraints {
        DeviceConstraints::new("line5", CouplingMap::linear(5), BasisGates::ibm())
    }

    fn triangle() -> Circuit {
        let mut b = Circuit::builder("tri", 3, 0);
        b.cx(QubitId(0), QubitId(1)).unwrap();
        b.cx(QubitId(1), QubitId(2)).unwrap();
        b.cx(QubitId(0), QubitId(2)).unwrap();
        b.build()
    }

    #[test]
    fn test_fragment_is_consistent_and_native() {
        let f = PassManagerStack
            .transpile(&triangle(), &device(), &StackOptions::new())
            .unwrap();
        assert!(f.verify().is_ok());
        assert_eq!(f.num_physical(), 5);
        assert_eq!(f.num_virtual, 3);
        assert!(f.quality.is_converged());
        let basis = BasisGates::ibm();
        assert!(f.circuit.instructions().iter().all(|i| basis.contains(i.name())));
    }

    #[test]
    fn test_pinned_positions_are_kept() {
        let mut pins = Layout::new(5);
        pins.add(QubitId(0), 4).unwrap();
        let options = StackOptions::new().with_initial_layout(pins);
        let f = PassManagerStack.transpile(&triangle(), &device(), &options).unwrap();
        assert_eq!(f.initial_layout.get_physical(QubitId(0)), Some(4));
        assert_eq!(f.initial_map().unwrap().len(), 3);
    }

    #[test]
    fn test_unsupported_gate_names_stack() {
        let device = DeviceConstraints::new("odd", CouplingMap::linear(2), BasisGates::new(["cx"]));
        let mut b = Circuit::builder("h", 1, 0);
        b.h(QubitId(0)).unwrap();
        let err = PassManagerStack
            .transpile(&b.build(), &device, &StackOptions::new())
            .unwrap_err();
        assert!(matches!(
            err,
            StackError::UnsupportedGate { ref stack, .. } if stack == "pass_manager"
        ));
    }

    #[test]
    fn test_deterministic() {
        let a = PassManagerStack.transpile(&triangle(), &device(), &StackOptions::new());
        let b = PassManagerStack.transpile(&triangle(), &device(), &StackOptions::new());
        assert_eq!(a.unwrap(), b.unwrap());
    }

    #[test]
    fn test_callback_sees_passes() {
        let mut names = vec![];
        PassManagerStack
            .transpile_with_callback(&triangle(), &device(), &StackOptions::new(), &mut |e| {
                names.push(e.name.to_string())
            })
            .unwrap();
        assert!(names.contains(&"BasicRouting".to_string()));
    }
}
