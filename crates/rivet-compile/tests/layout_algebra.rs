//! Property tests for layouts, permutations and the routed pipeline.

use proptest::prelude::*;
use rivet_compile::{
    BasisGates, CouplingMap, Layout, PassManagerBuilder, Permutation, RoutingOutcome, apply_layout,
};
use rivet_ir::{Circuit, Instruction, QubitId, StandardGate};

// ============================================================================
// Strategies
// ============================================================================

fn arb_permutation() -> impl Strategy<Value = Permutation> {
    (1u32..8).prop_flat_map(|n| {
        Just((0..n).collect::<Vec<u32>>())
            .prop_shuffle()
            .prop_map(|v| Permutation::from_vec(v).unwrap())
    })
}

/// `num_virtual` qubits placed on a shuffled subset of `num_physical`.
fn arb_layout(num_virtual: u32, num_physical: u32) -> impl Strategy<Value = Layout> {
    Just((0..num_physical).collect::<Vec<u32>>())
        .prop_shuffle()
        .prop_map(move |v| {
            Layout::from_physical_list(num_physical, &v[..num_virtual as usize]).unwrap()
        })
}

fn arb_circuit(num_qubits: u32) -> impl Strategy<Value = Circuit> {
    let one = (0..num_qubits, 0usize..4).prop_map(|(q, g)| {
        let gate = match g {
            0 => StandardGate::H,
            1 => StandardGate::T,
            2 => StandardGate::SX,
            _ => StandardGate::Y,
        };
        Instruction::single_qubit_gate(gate, QubitId(q))
    });
    let two = (0..num_qubits, 1..num_qubits).prop_map(move |(a, offset)| {
        let b = (a + offset) % num_qubits;
        Instruction::two_qubit_gate(StandardGate::CX, QubitId(a), QubitId(b))
    });
    prop::collection::vec(prop_oneof![2 => one, 1 => two], 0..25)
        .prop_map(move |insts| Circuit::new("arb", num_qubits, 0, insts).unwrap())
}

/// Circuit on `n` virtual qubits, an inner layout onto `m >= n` and an
/// outer layout onto `p >= m`.
fn arb_layout_chain() -> impl Strategy<Value = (Circuit, Layout, Layout)> {
    (2u32..5, 0u32..3, 0u32..3).prop_flat_map(|(n, extra_mid, extra_outer)| {
        let m = n + extra_mid;
        let p = m + extra_outer;
        (arb_circuit(n), arb_layout(n, m), arb_layout(m, p))
    })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn permutation_inverse_composes_to_identity(p in arb_permutation()) {
        prop_assert!(Permutation::compose(&p, &p.inverse()).unwrap().is_identity());
        prop_assert!(Permutation::compose(&p.inverse(), &p).unwrap().is_identity());
    }

    #[test]
    fn layout_composition_matches_sequential_application(
        (circuit, inner, outer) in arb_layout_chain()
    ) {
        let sequential = apply_layout(&outer, &apply_layout(&inner, &circuit).unwrap()).unwrap();
        let composed = apply_layout(&Layout::compose(&outer, &inner).unwrap(), &circuit).unwrap();
        prop_assert_eq!(sequential.instructions(), composed.instructions());
        prop_assert_eq!(sequential.num_qubits(), composed.num_qubits());
    }

    #[test]
    fn routed_circuits_respect_the_device(
        (n, circuit) in (2u32..5).prop_flat_map(|n| (Just(n), arb_circuit(n)))
    ) {
        let cm = CouplingMap::linear(n + 1);
        let (pm, mut props) = PassManagerBuilder::new()
            .with_optimization_level(2)
            .with_target(cm.clone(), BasisGates::ibm())
            .build();
        let mut dag = circuit.to_dag();
        pm.run(&mut dag, &mut props).unwrap();

        let basis = BasisGates::ibm();
        for inst in dag.instructions() {
            prop_assert!(basis.contains(inst.name()), "{} not native", inst.name());
            if let [a, b] = inst.qubits.as_slice() {
                prop_assert!(cm.is_connected(a.0, b.0));
            }
        }

        let initial = props.layout.clone().unwrap();
        let outcome = props.get::<RoutingOutcome>().unwrap();
        prop_assert_eq!(
            initial.permute(&outcome.permutation).unwrap(),
            outcome.final_layout.clone()
        );
    }
}
