//! Transpiled fragments.

use serde::{Deserialize, Serialize};

use rivet_compile::{Layout, Permutation};
use rivet_ir::Circuit;

use crate::error::{StackError, StackResult};

/// How good a fragment is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FragmentQuality {
    /// The stack reached its target.
    Converged,
    /// The stack ran out of budget or could not verify its result and
    /// returned the best candidate it had.
    BestEffort {
        /// What stopped the stack.
        reason: String,
        /// Stack-specific cost; lower is better.
        cost: f64,
    },
}

impl FragmentQuality {
    /// Whether the stack reached its target.
    pub fn is_converged(&self) -> bool {
        matches!(self, FragmentQuality::Converged)
    }
}

/// A circuit over physical qubits plus the layouts around it.
///
/// `initial_layout` says where every virtual qubit starts, `final_layout`
/// where it ends, and `permutation` how routing moved every physical
/// position. `final_layout == initial_layout.permute(&permutation)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranspiledFragment {
    /// Physical circuit, one qubit per device qubit.
    pub circuit: Circuit,
    /// Positions before the first instruction.
    pub initial_layout: Layout,
    /// Positions after the last instruction.
    pub final_layout: Layout,
    /// Start position to end position of every physical qubit.
    pub permutation: Permutation,
    /// Number of virtual qubits of the source circuit.
    pub num_virtual: u32,
    /// Result quality.
    pub quality: FragmentQuality,
}

impl TranspiledFragment {
    /// Number of physical qubits the fragment spans.
    pub fn num_physical(&self) -> u32 {
        self.circuit.num_qubits()
    }

    /// Final physical index of each virtual qubit, in virtual order.
    pub fn full_map(&self) -> StackResult<Vec<u32>> {
        Ok(self.final_layout.full_map(self.num_virtual)?)
    }

    /// Initial physical index of each virtual qubit, in virtual order.
    pub fn initial_map(&self) -> StackResult<Vec<u32>> {
        Ok(self.initial_layout.full_map(self.num_virtual)?)
    }

    /// Check that circuit, layouts and permutation agree.
    pub fn verify(&self) -> StackResult<()> {
        let n = self.num_physical();
        let inconsistent = |msg: String| Err(StackError::InconsistentFragment(msg));
        if self.initial_layout.num_physical() != n || self.final_layout.num_physical() != n {
            return inconsistent(format!(
                "layouts span {} and {} qubits, circuit spans {n}",
                self.initial_layout.num_physical(),
                self.final_layout.num_physical()
            ));
        }
        if self.permutation.len() != n as usize {
            return inconsistent(format!(
                "permutation has size {}, circuit spans {n}",
                self.permutation.len()
            ));
        }
        self.initial_map()?;
        if self.initial_layout.permute(&self.permutation)? != self.final_layout {
            return inconsistent("final layout is not the permuted initial layout".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rivet_ir::QubitId;

    fn fragment() -> TranspiledFragment {
        let initial = Layout::trivial(2, 3).unwrap();
        let permutation = Permutation::transposition(3, 1, 2).unwrap();
        TranspiledFragment {
            circuit: Circuit::empty("f", 3, 0),
            final_layout: initial.permute(&permutation).unwrap(),
            initial_layout: initial,
            permutation,
            num_virtual: 2,
            quality: FragmentQuality::Converged,
        }
    }

    #[test]
    fn test_full_map() {
        let f = fragment();
        assert!(f.verify().is_ok());
        assert_eq!(f.full_map().unwrap(), vec![0, 2]);
        assert_eq!(f.initial_map().unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_verify_catches_stale_final_layout() {
        let mut f = fragment();
        f.final_layout = f.initial_layout.clone();
        assert!(matches!(f.verify(), Err(StackError::InconsistentFragment(_))));
    }

    #[test]
    fn test_verify_catches_missing_virtual() {
        let mut f = fragment();
        f.num_virtual = 3;
        assert!(matches!(
            f.verify(),
            Err(StackError::Compile(rivet_compile::CompileError::UnmappedQubit {
                qubit: QubitId(2)
            }))
        ));
    }

    #[test]
    fn test_serde_round_trip() {
        let mut f = fragment();
        f.quality = FragmentQuality::BestEffort {
            reason: "budget".into(),
            cost: 3.0,
        };
        let json = serde_json::to_string(&f).unwrap();
        let back: TranspiledFragment = serde_json::from_str(&json).unwrap();
        assert_eq!(back, f);
    }
}
