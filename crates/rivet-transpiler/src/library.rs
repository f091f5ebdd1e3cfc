//! Small parameterised circuits for tests and demos.
//!
//! Every qubit starts with `rz(<name>_<q>)`, so binding distinguishes the
//! instances of one shape, and every circuit ends with a full barrier.

use rivet_ir::{Circuit, CircuitBuilder, ParameterExpression, QubitId};

use crate::error::{TranspileError, TranspileResult};

fn with_rotations(num_qubits: u32, name: &str) -> TranspileResult<CircuitBuilder> {
    let mut b = Circuit::builder(name, num_qubits, 0);
    for q in 0..num_qubits {
        b.rz(ParameterExpression::symbol(format!("{name}_{q}")), QubitId(q))?;
    }
    Ok(b)
}

/// Rotations, a CX ladder `0→1→…→n-1`, a closing `cx(n-1, 0)`, a barrier.
pub fn litmus_circuit(num_qubits: u32, name: &str) -> TranspileResult<Circuit> {
    if num_qubits < 2 {
        return Err(TranspileError::InvalidArgument(format!(
            "a litmus circuit needs at least 2 qubits, got {num_qubits}"
        )));
    }
    let mut b = with_rotations(num_qubits, name)?;
    for q in 1..num_qubits {
        b.cx(QubitId(q - 1), QubitId(q))?;
    }
    b.cx(QubitId(num_qubits - 1), QubitId(0))?;
    b.barrier_all()?;
    Ok(b.build())
}

/// Rotations, one `cx(control, target)`, a barrier.
pub fn cnot_circuit(
    num_qubits: u32,
    name: &str,
    control: u32,
    target: u32,
) -> TranspileResult<Circuit> {
    let mut b = with_rotations(num_qubits, name)?;
    b.cx(QubitId(control), QubitId(target))?;
    b.barrier_all()?;
    Ok(b.build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_litmus_shape() {
        let c = litmus_circuit(4, "L").unwrap();
        let ops = c.count_ops();
        assert_eq!(ops["rz"], 4);
        assert_eq!(ops["cx"], 4);
        assert_eq!(ops["barrier"], 1);
        assert_eq!(c.parameters().len(), 4);
        assert!(c.parameters().contains("L_3"));
        assert!(litmus_circuit(1, "L").is_err());
    }

    #[test]
    fn test_cnot_circuit() {
        let c = cnot_circuit(3, "C", 2, 0).unwrap();
        assert_eq!(c.count_ops()["cx"], 1);
        let cx = c.instructions().iter().find(|i| i.name() == "cx").unwrap();
        assert_eq!(cx.qubits, vec![QubitId(2), QubitId(0)]);
        assert!(cnot_circuit(3, "C", 1, 1).is_err());
        assert!(cnot_circuit(3, "C", 0, 3).is_err());
    }
}
