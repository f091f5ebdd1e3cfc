//! Every built-in stack honours the same contract.

use proptest::prelude::*;
use rivet_compile::{BasisGates, CouplingMap, Layout};
use rivet_ir::{Circuit, Instruction, QubitId, StandardGate};
use rivet_stack::{DeviceConstraints, StackKind, StackOptions, StackRegistry, TranspiledFragment};

// ============================================================================
// Helpers
// ============================================================================

fn device() -> DeviceConstraints {
    DeviceConstraints::new("grid2x3", CouplingMap::grid(2, 3), BasisGates::ibm())
}

fn arb_gate(num_qubits: u32) -> impl Strategy<Value = Instruction> {
    let one = (0..num_qubits, 0usize..5).prop_map(|(q, g)| {
        let gate = match g {
            0 => StandardGate::H,
            1 => StandardGate::T,
            2 => StandardGate::SX,
            3 => StandardGate::Rz(0.3_f64.into()),
            _ => StandardGate::X,
        };
        Instruction::single_qubit_gate(gate, QubitId(q))
    });
    let two = (0..num_qubits, 1..num_qubits).prop_map(move |(a, offset)| {
        let b = (a + offset) % num_qubits;
        Instruction::two_qubit_gate(StandardGate::CX, QubitId(a), QubitId(b))
    });
    prop_oneof![2 => one, 1 => two]
}

fn arb_circuit() -> impl Strategy<Value = Circuit> {
    (2u32..6).prop_flat_map(|n| {
        prop::collection::vec(arb_gate(n), 0..20)
            .prop_map(move |insts| Circuit::new("arb", n, 0, insts).unwrap())
    })
}

fn check_contract(fragment: &TranspiledFragment, device: &DeviceConstraints) {
    fragment.verify().unwrap();
    assert_eq!(fragment.num_physical(), device.num_qubits());
    for inst in fragment.circuit.instructions() {
        assert!(device.basis_gates.contains(inst.name()), "{}", inst.name());
        if let [a, b] = inst.qubits.as_slice() {
            assert!(device.coupling_map.is_connected(a.0, b.0));
        }
    }
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn stacks_produce_consistent_fragments(circuit in arb_circuit(), seed in 0u64..4) {
        let registry = StackRegistry::with_builtins();
        let device = device();
        let options = StackOptions::new().with_seed(seed);
        for kind in StackKind::ALL {
            let stack = registry.get(kind).unwrap();
            let fragment = stack.transpile(&circuit, &device, &options).unwrap();
            check_contract(&fragment, &device);
            prop_assert_eq!(fragment.num_virtual, circuit.num_qubits());
            let again = stack.transpile(&circuit, &device, &options).unwrap();
            prop_assert_eq!(&again, &fragment);
        }
    }
}

#[test]
fn pinned_layout_survives_every_stack() {
    let registry = StackRegistry::with_builtins();
    let device = device();
    let mut b = Circuit::builder("pinned", 3, 0);
    b.cx(QubitId(0), QubitId(2)).unwrap();
    b.cx(QubitId(1), QubitId(2)).unwrap();
    let circuit = b.build();

    let mut pins = Layout::new(6);
    pins.add(QubitId(0), 5).unwrap();
    pins.add(QubitId(2), 0).unwrap();
    let options = StackOptions::new().with_initial_layout(pins);
    for kind in StackKind::ALL {
        let fragment = registry.get(kind).unwrap().transpile(&circuit, &device, &options).unwrap();
        check_contract(&fragment, &device);
        assert_eq!(fragment.initial_layout.get_physical(QubitId(0)), Some(5), "{kind}");
        assert_eq!(fragment.initial_layout.get_physical(QubitId(2)), Some(0), "{kind}");
    }
}

#[test]
fn adjacent_free_qubit_beats_distant_ancilla() {
    let device = DeviceConstraints::new("line", CouplingMap::linear(4), BasisGates::ibm());
    let mut pins = Layout::new(4);
    pins.add(QubitId(0), 0).unwrap();
    pins.mark_ancilla(3).unwrap();
    let mut b = Circuit::builder("two", 2, 0);
    b.cx(QubitId(0), QubitId(1)).unwrap();
    let options = StackOptions::new().with_initial_layout(pins);
    let fragment = StackRegistry::with_builtins()
        .get(StackKind::PassManager)
        .unwrap()
        .transpile(&b.build(), &device, &options)
        .unwrap();
    // the free neighbour of q0 wins over the distant ancilla
    assert_eq!(fragment.initial_layout.get_physical(QubitId(1)), Some(1));
}
