//! Structural hash invariants.

use proptest::prelude::*;
use rivet_ir::{Circuit, Instruction, ParameterExpression, QubitId, StandardGate};
use rivet_transpiler::{CircuitHasher, HashMode, get_circuit_hash};

// ============================================================================
// Strategies
// ============================================================================

const WIDTH: u32 = 4;

fn arb_instruction() -> impl Strategy<Value = Instruction> {
    let one = (0..WIDTH, 0usize..5, -3.0f64..3.0).prop_map(|(q, g, theta)| {
        let gate = match g {
            0 => StandardGate::H,
            1 => StandardGate::T,
            2 => StandardGate::S,
            3 => StandardGate::Rz(theta.into()),
            _ => StandardGate::Rx(theta.into()),
        };
        Instruction::single_qubit_gate(gate, QubitId(q))
    });
    let two = (0..WIDTH, 1..WIDTH).prop_map(|(a, offset)| {
        let b = (a + offset) % WIDTH;
        Instruction::two_qubit_gate(StandardGate::CX, QubitId(a), QubitId(b))
    });
    prop_oneof![3 => one, 1 => two]
}

fn circuit(instructions: Vec<Instruction>) -> Circuit {
    Circuit::new("arb", WIDTH, 0, instructions).unwrap()
}

fn deep(c: &Circuit) -> String {
    get_circuit_hash(c, true).unwrap()
}

fn disjoint(a: &Instruction, b: &Instruction) -> bool {
    a.qubits.iter().all(|q| !b.qubits.contains(q))
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn swapping_disjoint_neighbours_keeps_hash(
        insts in prop::collection::vec(arb_instruction(), 2..24),
        at in any::<prop::sample::Index>(),
    ) {
        let i = at.index(insts.len() - 1);
        prop_assume!(disjoint(&insts[i], &insts[i + 1]));
        let mut swapped = insts.clone();
        swapped.swap(i, i + 1);
        prop_assert_eq!(deep(&circuit(insts)), deep(&circuit(swapped)));
    }

    #[test]
    fn inserting_hh_on_idle_qubit_keeps_hash(
        insts in prop::collection::vec(arb_instruction(), 0..24),
        at in any::<prop::sample::Index>(),
        q in 0..WIDTH,
    ) {
        let i = at.index(insts.len() + 1);
        let mut padded = insts.clone();
        let h = Instruction::single_qubit_gate(StandardGate::H, QubitId(q));
        padded.insert(i, h.clone());
        padded.insert(i, h);
        prop_assert_eq!(deep(&circuit(insts)), deep(&circuit(padded)));
    }

    #[test]
    fn changing_a_bound_angle_changes_deep_hash(
        insts in prop::collection::vec(arb_instruction(), 0..16),
        theta in -3.0f64..3.0,
        delta in 0.01f64..1.0,
    ) {
        let with = |angle: f64| {
            let mut all = insts.clone();
            all.push(Instruction::single_qubit_gate(StandardGate::Rz(angle.into()), QubitId(0)));
            circuit(all)
        };
        let (a, b) = (with(theta), with(theta + delta));
        prop_assert_ne!(deep(&a), deep(&b));
        prop_assert_eq!(
            get_circuit_hash(&a, false).unwrap(),
            get_circuit_hash(&b, false).unwrap()
        );
    }

    #[test]
    fn hashing_is_deterministic(insts in prop::collection::vec(arb_instruction(), 0..24)) {
        let c = circuit(insts);
        let hasher = CircuitHasher::default();
        prop_assert_eq!(hasher.hash(&c, HashMode::Deep).unwrap(), deep(&c));
        prop_assert_eq!(deep(&c), deep(&c.clone().with_name("renamed")));
    }
}

// ============================================================================
// Examples
// ============================================================================

#[test]
fn hxxh_matches_empty_circuit() {
    let mut b = Circuit::builder("hxxh", 2, 0);
    b.h(QubitId(1)).unwrap().x(QubitId(1)).unwrap();
    b.x(QubitId(1)).unwrap().h(QubitId(1)).unwrap();
    assert_eq!(deep(&b.build()), deep(&Circuit::empty("empty", 2, 0)));
}

#[test]
fn symbolic_and_bound_circuits_differ_deeply() {
    let mut b = Circuit::builder("sym", 1, 0);
    b.rz(ParameterExpression::symbol("a"), QubitId(0)).unwrap();
    let symbolic = b.build();
    let bound = symbolic.bind("a", 0.25);
    assert_ne!(deep(&symbolic), deep(&bound));
    assert_eq!(
        get_circuit_hash(&symbolic, false).unwrap(),
        get_circuit_hash(&bound, false).unwrap()
    );
}
