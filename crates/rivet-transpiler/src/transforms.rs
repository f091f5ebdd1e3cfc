//! Fragment-level rewrites.

use std::collections::BTreeSet;

use rivet_compile::{CompileError, Layout, Permutation};
use rivet_ir::QubitId;
use rivet_stack::TranspiledFragment;

use crate::error::TranspileResult;

/// Compact a fragment to the physical qubits it needs: those the circuit
/// touches, those a virtual qubit or ancilla occupies at either end.
///
/// Returns the compacted fragment and, for each new index, the original
/// physical qubit.
pub fn remove_unused_qubits(
    fragment: &TranspiledFragment,
) -> TranspileResult<(TranspiledFragment, Vec<u32>)> {
    let mut active: BTreeSet<u32> = fragment
        .circuit
        .used_qubits()
        .into_iter()
        .map(|q| q.0)
        .collect();
    for layout in [&fragment.initial_layout, &fragment.final_layout] {
        active.extend(layout.mapped_physical());
        active.extend(layout.ancillas().iter().copied());
    }
    let kept: Vec<u32> = active.iter().copied().collect();
    let n = kept.len() as u32;

    let mut new_index = vec![None; fragment.num_physical() as usize];
    for (i, &physical) in kept.iter().enumerate() {
        new_index[physical as usize] = Some(i as u32);
    }
    let index_of = |physical: u32| {
        new_index
            .get(physical as usize)
            .copied()
            .flatten()
            .ok_or(CompileError::UnmappedQubit {
                qubit: QubitId(physical),
            })
    };

    let circuit = fragment
        .circuit
        .remap_qubits(n, |q| index_of(q.0).map(QubitId))?;
    let compact = |layout: &Layout| -> TranspileResult<Layout> {
        let mut out = Layout::new(n);
        for (virt, physical) in layout.iter() {
            out.add(virt, index_of(physical)?)?;
        }
        for &physical in layout.ancillas() {
            out.mark_ancilla(index_of(physical)?)?;
        }
        Ok(out)
    };
    let map = kept
        .iter()
        .map(|&physical| {
            index_of(fragment.permutation.apply(physical)).map_err(|_| {
                CompileError::InvalidPermutation(format!(
                    "{physical} moves outside the active qubits"
                ))
            })
        })
        .collect::<Result<Vec<u32>, _>>()?;

    let compacted = TranspiledFragment {
        circuit,
        initial_layout: compact(&fragment.initial_layout)?,
        final_layout: compact(&fragment.final_layout)?,
        permutation: Permutation::from_vec(map)?,
        num_virtual: fragment.num_virtual,
        quality: fragment.quality.clone(),
    };
    compacted.verify()?;
    Ok((compacted, kept))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rivet_compile::{BasisGates, CouplingMap};
    use rivet_ir::Circuit;
    use rivet_stack::{DeviceConstraints, SearchStack, Stack, StackOptions};

    #[test]
    fn test_idle_device_qubits_are_dropped() {
        let device = DeviceConstraints::new("line", CouplingMap::linear(6), BasisGates::ibm());
        let mut b = Circuit::builder("far", 3, 0);
        b.cx(QubitId(0), QubitId(2)).unwrap();
        let fragment = SearchStack::new()
            .transpile(&b.build(), &device, &StackOptions::new().with_seed(1))
            .unwrap();
        let (compact, kept) = remove_unused_qubits(&fragment).unwrap();

        assert!(compact.num_physical() >= 3 && compact.num_physical() < 6);
        assert_eq!(compact.num_physical() as usize, kept.len());
        assert_eq!(compact.circuit.len(), fragment.circuit.len());
        let before = fragment.full_map().unwrap();
        let after: Vec<u32> = compact
            .full_map()
            .unwrap()
            .into_iter()
            .map(|i| kept[i as usize])
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_pinned_idle_qubit_is_kept() {
        let device = DeviceConstraints::new("line", CouplingMap::linear(5), BasisGates::ibm());
        let mut pins = Layout::new(5);
        pins.add(QubitId(0), 0).unwrap();
        pins.add(QubitId(1), 1).unwrap();
        pins.add(QubitId(2), 4).unwrap();
        let mut b = Circuit::builder("bell", 2, 0);
        b.h(QubitId(0)).unwrap().cx(QubitId(0), QubitId(1)).unwrap();
        let fragment = SearchStack::new()
            .transpile(&b.build(), &device, &StackOptions::new().with_initial_layout(pins))
            .unwrap();
        let (compact, kept) = remove_unused_qubits(&fragment).unwrap();
        assert_eq!(kept, vec![0, 1, 4]);
        assert_eq!(compact.initial_layout.get_physical(QubitId(2)), Some(2));
        assert!(compact.permutation.is_identity());
    }
}
