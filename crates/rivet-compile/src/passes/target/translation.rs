//! Basis translation.
//!
//! Gates outside the target basis are rewritten into it. Two-qubit gates
//! decompose through CX (or CZ when that is the native entangler), and
//! single-qubit gates are resynthesised from their `U(θ, φ, λ)` angles in
//! whichever of the supported single-qubit families the basis offers:
//! `u`, `rz`+`sx`, or `rz`+`ry`. All rewrites hold up to global phase.

use std::f64::consts::PI;

use rivet_ir::{
    CircuitDag, GateKind, Instruction, InstructionKind, ParameterExpression, QubitId, StandardGate,
};

use crate::error::{CompileError, CompileResult};
use crate::pass::{Pass, PassKind};
use crate::passes::rebuild_dag;
use crate::property::{BasisGates, PropertySet};
use crate::unitary::Unitary2x2;

const ANGLE_EPSILON: f64 = 1e-12;

type Param = ParameterExpression;

fn k(value: f64) -> Param {
    Param::constant(value)
}

fn add(a: &Param, b: &Param) -> Param {
    (a.clone() + b.clone()).simplify()
}

fn half(a: &Param) -> Param {
    (a.clone() / k(2.0)).simplify()
}

fn neg(a: &Param) -> Param {
    (-a.clone()).simplify()
}

/// Whether a numeric angle is a multiple of 2π.
fn is_zero_angle(angle: &Param) -> bool {
    angle
        .as_f64()
        .is_some_and(|a| Unitary2x2::normalize_angle(a).abs() < ANGLE_EPSILON)
}

fn one(gate: StandardGate, qubit: QubitId) -> Instruction {
    Instruction::single_qubit_gate(gate, qubit)
}

/// A Z rotation in the basis, or `None` when the basis has none.
/// Numeric zero rotations vanish.
fn z_rotation(angle: Param, qubit: QubitId, basis: &BasisGates) -> Option<Vec<Instruction>> {
    if is_zero_angle(&angle) {
        return Some(vec![]);
    }
    if basis.contains("rz") {
        Some(vec![one(StandardGate::Rz(angle), qubit)])
    } else if basis.contains("p") {
        Some(vec![one(StandardGate::P(angle), qubit)])
    } else if basis.contains("u") {
        Some(vec![one(StandardGate::U(k(0.0), k(0.0), angle), qubit)])
    } else {
        None
    }
}

fn has_z(basis: &BasisGates) -> bool {
    basis.contains("rz") || basis.contains("p") || basis.contains("u")
}

/// `(θ, φ, λ)` of a single-qubit standard gate.
fn u_angles(gate: &StandardGate) -> Option<(Param, Param, Param)> {
    let diag = |l: Param| Some((k(0.0), k(0.0), l));
    match gate {
        StandardGate::I => diag(k(0.0)),
        StandardGate::X => Some((k(PI), k(0.0), k(PI))),
        StandardGate::Y => Some((k(PI), k(PI / 2.0), k(PI / 2.0))),
        StandardGate::Z => diag(k(PI)),
        StandardGate::H => Some((k(PI / 2.0), k(0.0), k(PI))),
        StandardGate::S => diag(k(PI / 2.0)),
        StandardGate::Sdg => diag(k(-PI / 2.0)),
        StandardGate::T => diag(k(PI / 4.0)),
        StandardGate::Tdg => diag(k(-PI / 4.0)),
        StandardGate::SX => Some((k(PI / 2.0), k(-PI / 2.0), k(PI / 2.0))),
        StandardGate::SXdg => Some((k(-PI / 2.0), k(-PI / 2.0), k(PI / 2.0))),
        StandardGate::Rx(t) => Some((t.clone(), k(-PI / 2.0), k(PI / 2.0))),
        StandardGate::Ry(t) => Some((t.clone(), k(0.0), k(0.0))),
        StandardGate::Rz(t) | StandardGate::P(t) => diag(t.clone()),
        StandardGate::U(t, p, l) => Some((t.clone(), p.clone(), l.clone())),
        _ => None,
    }
}

/// Synthesize `U(θ, φ, λ)` on `qubit` in `basis`, up to global phase.
pub fn synthesize_1q(
    theta: Param,
    phi: Param,
    lambda: Param,
    qubit: QubitId,
    basis: &BasisGates,
) -> CompileResult<Vec<Instruction>> {
    if let Some(t) = theta.as_f64() {
        let t = Unitary2x2::normalize_angle(t);
        if t.abs() < ANGLE_EPSILON {
            if let Some(out) = z_rotation(add(&phi, &lambda), qubit, basis) {
                return Ok(out);
            }
        }
        if (t - PI / 2.0).abs() < ANGLE_EPSILON && basis.contains("sx") && has_z(basis) {
            return zsx(
                &[add(&lambda, &k(-PI / 2.0)), add(&phi, &k(PI / 2.0))],
                qubit,
                basis,
            );
        }
    }
    if basis.contains("u") {
        return Ok(vec![one(StandardGate::U(theta, phi, lambda), qubit)]);
    }
    if basis.contains("sx") && has_z(basis) {
        return zsx(
            &[lambda, add(&theta, &k(PI)), add(&phi, &k(PI))],
            qubit,
            basis,
        );
    }
    if basis.contains("ry") && has_z(basis) {
        let mut out = z_rotation(lambda, qubit, basis).unwrap_or_default();
        out.push(one(StandardGate::Ry(theta), qubit));
        out.extend(z_rotation(phi, qubit, basis).unwrap_or_default());
        return Ok(out);
    }
    Err(CompileError::GateNotInBasis("u".into()))
}

/// `rz(a0) sx rz(a1) sx ... rz(an)`.
fn zsx(angles: &[Param], qubit: QubitId, basis: &BasisGates) -> CompileResult<Vec<Instruction>> {
    let mut out = vec![];
    for (i, angle) in angles.iter().enumerate() {
        if i > 0 {
            out.push(one(StandardGate::SX, qubit));
        }
        out.extend(
            z_rotation(angle.clone(), qubit, basis)
                .ok_or_else(|| CompileError::GateNotInBasis("rz".into()))?,
        );
    }
    Ok(out)
}

fn translate_1q(
    gate: &StandardGate,
    qubit: QubitId,
    basis: &BasisGates,
) -> CompileResult<Vec<Instruction>> {
    let z = |angle: f64| z_rotation(k(angle), qubit, basis);
    let shortcut = match gate {
        StandardGate::I => Some(vec![]),
        StandardGate::Z => z(PI),
        StandardGate::S => z(PI / 2.0),
        StandardGate::Sdg => z(-PI / 2.0),
        StandardGate::T => z(PI / 4.0),
        StandardGate::Tdg => z(-PI / 4.0),
        StandardGate::Rz(t) | StandardGate::P(t) => z_rotation(t.clone(), qubit, basis),
        StandardGate::X if basis.contains("sx") => Some(vec![one(StandardGate::SX, qubit); 2]),
        StandardGate::Y if basis.contains("x") => z(PI).map(|mut out| {
            out.push(one(StandardGate::X, qubit));
            out
        }),
        StandardGate::H if basis.contains("sx") => z(PI / 2.0).map(|first| {
            let mut out = first.clone();
            out.push(one(StandardGate::SX, qubit));
            out.extend(first);
            out
        }),
        StandardGate::SXdg if basis.contains("sx") => z(PI).map(|first| {
            let mut out = first.clone();
            out.push(one(StandardGate::SX, qubit));
            out.extend(first);
            out
        }),
        _ => None,
    };
    if let Some(out) = shortcut {
        return Ok(out);
    }
    let (theta, phi, lambda) =
        u_angles(gate).ok_or_else(|| CompileError::GateNotInBasis(gate.name().into()))?;
    synthesize_1q(theta, phi, lambda, qubit, basis)
        .map_err(|_| CompileError::GateNotInBasis(gate.name().into()))
}

/// One-step decomposition of a multi-qubit standard gate, or `None` if the
/// gate has no rule (or its rule needs an entangler the basis lacks).
fn expand(gate: &StandardGate, q: &[QubitId], basis: &BasisGates) -> Option<Vec<Instruction>> {
    use StandardGate::*;
    let g1 = |g: StandardGate, a: QubitId| Instruction::single_qubit_gate(g, a);
    let g2 = |g: StandardGate, a: QubitId, b: QubitId| Instruction::two_qubit_gate(g, a, b);
    let out = match (gate, q) {
        (CX, &[c, t]) if basis.contains("cz") => vec![g1(H, t), g2(CZ, c, t), g1(H, t)],
        (CZ, &[c, t]) if basis.contains("cx") => vec![g1(H, t), g2(CX, c, t), g1(H, t)],
        (CY, &[c, t]) => vec![g1(Sdg, t), g2(CX, c, t), g1(S, t)],
        (CH, &[c, t]) => vec![
            g1(S, t),
            g1(H, t),
            g1(T, t),
            g2(CX, c, t),
            g1(Tdg, t),
            g1(H, t),
            g1(Sdg, t),
        ],
        (Swap, &[a, b]) => vec![g2(CX, a, b), g2(CX, b, a), g2(CX, a, b)],
        (CP(l), &[c, t]) => vec![
            g1(P(half(l)), c),
            g2(CX, c, t),
            g1(P(neg(&half(l))), t),
            g2(CX, c, t),
            g1(P(half(l)), t),
        ],
        (CRz(theta), &[c, t]) => vec![
            g1(Rz(half(theta)), t),
            g2(CX, c, t),
            g1(Rz(neg(&half(theta))), t),
            g2(CX, c, t),
        ],
        (RZZ(theta), &[a, b]) => vec![g2(CX, a, b), g1(Rz(theta.clone()), b), g2(CX, a, b)],
        (CCX, &[a, b, c]) => vec![
            g1(H, c),
            g2(CX, b, c),
            g1(Tdg, c),
            g2(CX, a, c),
            g1(T, c),
            g2(CX, b, c),
            g1(Tdg, c),
            g2(CX, a, c),
            g1(T, b),
            g1(T, c),
            g1(H, c),
            g2(CX, a, b),
            g1(T, a),
            g1(Tdg, b),
            g2(CX, a, b),
        ],
        (CSwap, &[c, a, b]) => vec![
            g2(CX, b, a),
            Instruction::gate(CCX, [c, a, b]),
            g2(CX, b, a),
        ],
        _ => return None,
    };
    Some(out)
}

/// Rewrite one instruction into `basis`.
///
/// Non-unitary instructions pass through. Custom gates pass only when
/// the basis lists them.
pub fn translate_instruction(
    instruction: &Instruction,
    basis: &BasisGates,
) -> CompileResult<Vec<Instruction>> {
    let InstructionKind::Gate(gate) = &instruction.kind else {
        return Ok(vec![instruction.clone()]);
    };
    if basis.contains(gate.name()) {
        return Ok(vec![instruction.clone()]);
    }
    let GateKind::Standard(standard) = &gate.kind else {
        return Err(CompileError::GateNotInBasis(gate.name().into()));
    };
    if let [qubit] = instruction.qubits.as_slice() {
        return translate_1q(standard, *qubit, basis);
    }
    let steps = expand(standard, &instruction.qubits, basis)
        .ok_or_else(|| CompileError::GateNotInBasis(standard.name().into()))?;
    let mut out = vec![];
    for step in &steps {
        out.extend(translate_instruction(step, basis)?);
    }
    Ok(out)
}

/// Decompose three-qubit gates into one- and two-qubit gates.
pub struct Unroll3q;

impl Pass for Unroll3q {
    fn name(&self) -> &str {
        "Unroll3q"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, dag: &mut CircuitDag, _properties: &mut PropertySet) -> CompileResult<()> {
        let basis = BasisGates::universal();
        let needs_unroll = |inst: &Instruction| inst.is_gate() && inst.qubits.len() > 2;
        let unrolled = rebuild_dag(dag, |inst| {
            if !needs_unroll(inst) {
                return Ok(vec![inst.clone()]);
            }
            let standard = inst
                .as_standard_gate()
                .ok_or_else(|| CompileError::GateNotInBasis(inst.name().into()))?;
            let mut out = vec![];
            let mut pending = expand(standard, &inst.qubits, &basis)
                .ok_or_else(|| CompileError::GateNotInBasis(inst.name().into()))?;
            pending.reverse();
            while let Some(step) = pending.pop() {
                match step.as_standard_gate() {
                    Some(g) if needs_unroll(&step) => {
                        let mut inner = expand(g, &step.qubits, &basis)
                            .ok_or_else(|| CompileError::GateNotInBasis(step.name().into()))?;
                        inner.reverse();
                        pending.extend(inner);
                    }
                    _ => out.push(step),
                }
            }
            Ok(out)
        })?;
        *dag = unrolled;
        Ok(())
    }

    fn should_run(&self, dag: &CircuitDag, _properties: &PropertySet) -> bool {
        dag.topological_ops()
            .iter()
            .any(|(_, inst)| inst.is_gate() && inst.qubits.len() > 2)
    }
}

/// Rewrite every gate into the target basis.
pub struct BasisTranslation;

impl Pass for BasisTranslation {
    fn name(&self) -> &str {
        "BasisTranslation"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()> {
        let basis = properties
            .basis_gates
            .as_ref()
            .ok_or(CompileError::MissingBasisGates)?;
        *dag = rebuild_dag(dag, |inst| translate_instruction(inst, basis))?;
        Ok(())
    }
}
