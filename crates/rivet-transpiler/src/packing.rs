//! Disjoint copies of one circuit on one device.
//!
//! [`pack_circuits`] places the copies, [`PackedCircuits::unpack`] splits
//! the counts of a run back into per-copy counts, and
//! [`Stitcher::pack_and_transpile_chain`] packs several circuits and chains
//! them on one device.

use std::collections::{BTreeMap, BTreeSet};

use tracing::info;

use rivet_compile::{CouplingMap, grow_connected_subset};
use rivet_ir::{Circuit, ClbitId, Instruction, QubitId};
use rivet_stack::{DeviceConstraints, StackOptions, TranspiledFragment};

use crate::error::{TranspileError, TranspileResult};
use crate::stitch::Stitcher;

/// A packed circuit and where each copy landed.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedCircuits {
    /// Every copy, measured into its own classical bits, on the full device.
    pub circuit: Circuit,
    /// `regions[c][v]` is the device qubit holding virtual qubit `v` of copy `c`.
    pub regions: Vec<Vec<u32>>,
    /// First classical bit written by copy 0.
    pub clbit_offset: u32,
}

impl PackedCircuits {
    /// Number of packed copies.
    pub fn copies(&self) -> usize {
        self.regions.len()
    }

    /// Classical bits holding the results of copy `copy`, in virtual order.
    pub fn clbits_of(&self, copy: usize) -> Vec<ClbitId> {
        let width = self.regions.first().map_or(0, Vec::len);
        let start = self.clbit_offset as usize + copy * width;
        (start..start + width).map(|c| ClbitId(c as u32)).collect()
    }

    /// Split counts of the packed circuit into one histogram per copy.
    ///
    /// Character `i` of every key is classical bit `i`. Counts of keys that
    /// agree on a copy's bits are summed for that copy.
    pub fn unpack(
        &self,
        counts: &BTreeMap<String, u64>,
    ) -> TranspileResult<Vec<BTreeMap<String, u64>>> {
        let bits: Vec<Vec<usize>> = (0..self.copies())
            .map(|copy| self.clbits_of(copy).iter().map(|c| c.0 as usize).collect())
            .collect();
        let needed = bits.iter().flatten().max().map_or(0, |&b| b + 1);
        let mut unpacked = vec![BTreeMap::new(); self.copies()];
        for (key, &count) in counts {
            let key = key.as_bytes();
            if key.len() < needed {
                return Err(TranspileError::InvalidArgument(format!(
                    "bitstring of {} bits, packed results need {needed}",
                    key.len()
                )));
            }
            for (histogram, copy_bits) in unpacked.iter_mut().zip(&bits) {
                let part: String = copy_bits.iter().map(|&b| char::from(key[b])).collect();
                *histogram.entry(part).or_insert(0) += count;
            }
        }
        Ok(unpacked)
    }

    /// How well the copies use the device, compared with `original`.
    pub fn efficiency(&self, original: &Circuit) -> PackingEfficiency {
        let device_qubits = self.circuit.num_qubits() as usize;
        let packed_qubits = self.regions.iter().map(Vec::len).sum::<usize>();
        let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
        PackingEfficiency {
            copies: self.copies(),
            original_qubits: original.num_qubits() as usize,
            packed_qubits,
            device_qubits,
            qubit_utilization: ratio(packed_qubits, device_qubits),
            qubit_efficiency: ratio(original.num_qubits() as usize * self.copies(), packed_qubits),
            depth_original: original.depth(),
            depth_packed: self.circuit.depth(),
            gates_original: original.len(),
            gates_packed: self.circuit.len(),
        }
    }
}

/// Device usage of a packed circuit.
#[derive(Debug, Clone, PartialEq)]
pub struct PackingEfficiency {
    /// Copies placed; also the ideal speedup over running them one by one.
    pub copies: usize,
    /// Width of one copy.
    pub original_qubits: usize,
    /// Device qubits holding some copy.
    pub packed_qubits: usize,
    /// Device width.
    pub device_qubits: usize,
    /// `packed_qubits / device_qubits`.
    pub qubit_utilization: f64,
    /// `original_qubits * copies / packed_qubits`; 1.0 when nothing is wasted.
    pub qubit_efficiency: f64,
    /// Depth of one copy.
    pub depth_original: usize,
    /// Depth of the packed circuit, measurements included.
    pub depth_packed: usize,
    /// Instructions in one copy.
    pub gates_original: usize,
    /// Instructions in the packed circuit.
    pub gates_packed: usize,
}

/// Place `copies` copies of `circuit` on disjoint connected regions of
/// `coupling_map` and measure each copy into its own classical bits.
///
/// Regions are grown one after another with the compressor's rule, each
/// avoiding the qubits already taken. `circuit` must not measure.
pub fn pack_circuits(
    circuit: &Circuit,
    copies: usize,
    coupling_map: &CouplingMap,
) -> TranspileResult<PackedCircuits> {
    pack_at(circuit, copies, coupling_map, 0)
}

fn pack_at(
    circuit: &Circuit,
    copies: usize,
    coupling_map: &CouplingMap,
    clbit_offset: u32,
) -> TranspileResult<PackedCircuits> {
    if copies == 0 {
        return Err(TranspileError::InvalidArgument(
            "at least one copy is required".into(),
        ));
    }
    if circuit.num_clbits() > 0 || circuit.instructions().iter().any(Instruction::is_measure) {
        return Err(TranspileError::InvalidArgument(format!(
            "'{}' already has classical bits; packed copies are measured automatically",
            circuit.name()
        )));
    }

    let n = circuit.num_qubits();
    let num_clbits = u32::try_from(copies)
        .ok()
        .and_then(|c| c.checked_mul(n))
        .and_then(|c| c.checked_add(clbit_offset))
        .ok_or_else(|| TranspileError::InvalidArgument(format!("{copies} copies is too many")))?;
    let size = coupling_map.num_qubits();
    let mut taken = BTreeSet::new();
    let mut regions = Vec::with_capacity(copies);
    let mut b = Circuit::builder(format!("{}x{copies}", circuit.name()), size, num_clbits);

    for copy in 0..copies {
        let region = grow_connected_subset(coupling_map, n, &taken)?;
        let placed = circuit.remap_qubits(size, |q| {
            Ok::<_, TranspileError>(QubitId(region[q.index()]))
        })?;
        b.extend(&placed)?;
        let first = clbit_offset + copy as u32 * n;
        for (v, &physical) in region.iter().enumerate() {
            b.measure(QubitId(physical), ClbitId(first + v as u32))?;
        }
        taken.extend(region.iter().copied());
        regions.push(region);
    }
    info!(
        "Packed {copies} copies of '{}' onto {} of {} qubits",
        circuit.name(),
        taken.len(),
        coupling_map.num_qubits()
    );
    Ok(PackedCircuits {
        circuit: b.build(),
        regions,
        clbit_offset,
    })
}

impl Stitcher<'_> {
    /// Pack `copies` copies of every circuit and chain the packed circuits.
    ///
    /// Each packed circuit spans the whole device, so virtual qubit `q` of
    /// the chain is the device qubit `q` it was packed onto. Packed circuits
    /// write to consecutive classical bits, so every copy of every circuit
    /// keeps its own results.
    pub fn pack_and_transpile_chain(
        &self,
        circuits: &[Circuit],
        copies: usize,
        device: &DeviceConstraints,
        options: &StackOptions,
    ) -> TranspileResult<(TranspiledFragment, Vec<PackedCircuits>)> {
        if circuits.is_empty() {
            return Err(TranspileError::EmptyChain);
        }
        let mut packed = Vec::with_capacity(circuits.len());
        let mut offset = 0;
        for circuit in circuits {
            let p = pack_at(circuit, copies, &device.coupling_map, offset)?;
            offset = p.circuit.num_clbits();
            packed.push(p);
        }
        let links: Vec<Circuit> = packed.iter().map(|p| p.circuit.clone()).collect();
        let chained = self.transpile_chain(&links, device, options)?;
        Ok((chained, packed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bell() -> Circuit {
        let mut b = Circuit::builder("bell", 2, 0);
        b.h(QubitId(0)).unwrap().cx(QubitId(0), QubitId(1)).unwrap();
        b.build()
    }

    #[test]
    fn test_copies_are_disjoint_and_connected() {
        let cm = CouplingMap::grid(2, 3);
        let packed = pack_circuits(&bell(), 3, &cm).unwrap();
        assert_eq!(packed.circuit.num_qubits(), 6);
        assert_eq!(packed.circuit.num_clbits(), 6);
        let all: BTreeSet<u32> = packed.regions.iter().flatten().copied().collect();
        assert_eq!(all.len(), 6);
        for region in &packed.regions {
            assert!(cm.is_connected(region[0], region[1]));
        }
        assert_eq!(packed.circuit.count_ops()["measure"], 6);
        assert_eq!(packed.clbits_of(2), vec![ClbitId(4), ClbitId(5)]);
    }

    #[test]
    fn test_measurements_follow_regions() {
        let packed = pack_circuits(&bell(), 2, &CouplingMap::linear(4)).unwrap();
        let measures: Vec<&Instruction> = packed
            .circuit
            .instructions()
            .iter()
            .filter(|i| i.is_measure())
            .collect();
        for (copy, region) in packed.regions.iter().enumerate() {
            for (v, &physical) in region.iter().enumerate() {
                let clbit = ClbitId((copy * 2 + v) as u32);
                assert!(
                    measures
                        .iter()
                        .any(|m| m.qubits == [QubitId(physical)] && m.clbits == [clbit])
                );
            }
        }
    }

    #[test]
    fn test_too_many_copies() {
        assert!(matches!(
            pack_circuits(&bell(), 3, &CouplingMap::linear(5)),
            Err(TranspileError::Compile(_))
        ));
    }

    #[test]
    fn test_unpack_splits_counts_per_copy() {
        let packed = pack_circuits(&bell(), 2, &CouplingMap::linear(4)).unwrap();
        let counts = BTreeMap::from([
            ("0000".to_string(), 5),
            ("0011".to_string(), 3),
            ("1111".to_string(), 2),
        ]);
        let unpacked = packed.unpack(&counts).unwrap();
        assert_eq!(unpacked.len(), 2);
        assert_eq!(
            unpacked[0],
            BTreeMap::from([("00".to_string(), 8), ("11".to_string(), 2)])
        );
        assert_eq!(
            unpacked[1],
            BTreeMap::from([("00".to_string(), 5), ("11".to_string(), 5)])
        );

        let short = BTreeMap::from([("01".to_string(), 1)]);
        assert!(matches!(
            packed.unpack(&short),
            Err(TranspileError::InvalidArgument(_))
        ));
        assert_eq!(packed.unpack(&BTreeMap::new()).unwrap(), vec![BTreeMap::new(); 2]);
    }

    #[test]
    fn test_efficiency() {
        let packed = pack_circuits(&bell(), 2, &CouplingMap::linear(5)).unwrap();
        let eff = packed.efficiency(&bell());
        assert_eq!(eff.copies, 2);
        assert_eq!(eff.original_qubits, 2);
        assert_eq!(eff.packed_qubits, 4);
        assert_eq!(eff.device_qubits, 5);
        assert!((eff.qubit_utilization - 0.8).abs() < 1e-12);
        assert!((eff.qubit_efficiency - 1.0).abs() < 1e-12);
        assert_eq!(eff.gates_original, 2);
        // two copies of two gates, plus four measurements
        assert_eq!(eff.gates_packed, 8);
        assert_eq!(eff.depth_original, 2);
    }

    #[test]
    fn test_pack_and_transpile_chain() {
        let device = DeviceConstraints::new(
            "grid",
            CouplingMap::grid(2, 3),
            rivet_compile::BasisGates::ibm(),
        );
        let mut flip = Circuit::builder("flip", 2, 0);
        flip.x(QubitId(1)).unwrap();
        let (chained, packed) = Stitcher::uncached()
            .pack_and_transpile_chain(&[bell(), flip.build()], 2, &device, &StackOptions::new())
            .unwrap();

        assert_eq!(packed.len(), 2);
        assert_eq!(packed[0].clbits_of(1), vec![ClbitId(2), ClbitId(3)]);
        assert_eq!(packed[1].clbit_offset, 4);
        assert_eq!(packed[1].clbits_of(0), vec![ClbitId(4), ClbitId(5)]);
        assert_eq!(chained.circuit.num_clbits(), 8);
        assert_eq!(chained.circuit.count_ops()["measure"], 8);
        assert_eq!(chained.full_map().unwrap().len(), 6);
        chained.verify().unwrap();

        assert!(matches!(
            Stitcher::uncached().pack_and_transpile_chain(&[], 2, &device, &StackOptions::new()),
            Err(TranspileError::EmptyChain)
        ));
    }

    #[test]
    fn test_rejects_measured_circuit_and_zero_copies() {
        let mut b = Circuit::builder("m", 1, 1);
        b.measure(QubitId(0), ClbitId(0)).unwrap();
        let cm = CouplingMap::linear(4);
        assert!(pack_circuits(&b.build(), 2, &cm).is_err());
        assert!(pack_circuits(&bell(), 0, &cm).is_err());
    }
}
