//! Stitched fragments act like their source circuits.
//!
//! A random state of the virtual qubits is placed through the initial
//! layout, the physical circuit is simulated, and the result must match the
//! source circuit's output read back through the final layout, up to a
//! global phase.

use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use rivet_compile::{BasisGates, CouplingMap, Unitary2x2};
use rivet_ir::{Circuit, QubitId, StandardGate};
use rivet_stack::{DeviceConstraints, StackKind, StackOptions, TranspiledFragment};
use rivet_transpiler::Stitcher;

// ============================================================================
// Statevector
// ============================================================================

/// Amplitudes with qubit `q` on bit `q` of the index.
#[derive(Debug, Clone)]
struct Statevector {
    num_qubits: u32,
    amps: Vec<Complex64>,
}

impl Statevector {
    fn random(num_qubits: u32, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut amps: Vec<Complex64> = (0..1usize << num_qubits)
            .map(|_| Complex64::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)))
            .collect();
        let norm = amps.iter().map(Complex64::norm_sqr).sum::<f64>().sqrt();
        for a in &mut amps {
            *a /= norm;
        }
        Self { num_qubits, amps }
    }

    /// Place virtual qubit `v` on physical qubit `map[v]`; the rest start in |0⟩.
    fn embed(&self, map: &[u32], num_physical: u32) -> Self {
        let mut amps = vec![Complex64::new(0.0, 0.0); 1usize << num_physical];
        for (index, &amp) in self.amps.iter().enumerate() {
            let physical = (0..self.num_qubits as usize)
                .filter(|v| index >> v & 1 == 1)
                .fold(0usize, |acc, v| acc | 1 << map[v]);
            amps[physical] = amp;
        }
        Self {
            num_qubits: num_physical,
            amps,
        }
    }

    fn run(mut self, circuit: &Circuit) -> Self {
        for inst in circuit.instructions() {
            if inst.is_barrier() {
                continue;
            }
            let gate = inst
                .as_standard_gate()
                .unwrap_or_else(|| panic!("cannot simulate {}", inst.name()));
            let q: Vec<usize> = inst.qubits.iter().map(|q| q.index()).collect();
            match (gate, q.as_slice()) {
                (StandardGate::CX, &[c, t]) => self.swap_where(|i| i >> c & 1 == 1, 1 << t),
                (StandardGate::Swap, &[a, b]) => {
                    self.swap_where(|i| i >> a & 1 == 1 && i >> b & 1 == 0, 1 << a | 1 << b);
                }
                (StandardGate::CZ, &[a, b]) => {
                    for (i, amp) in self.amps.iter_mut().enumerate() {
                        if i >> a & 1 == 1 && i >> b & 1 == 1 {
                            *amp = -*amp;
                        }
                    }
                }
                (_, &[t]) => {
                    let u = Unitary2x2::from_gate(gate)
                        .unwrap_or_else(|| panic!("cannot simulate {}", inst.name()));
                    let [a, b, c, d] = u.data;
                    for i in (0..self.amps.len()).filter(|i| i >> t & 1 == 0) {
                        let j = i | 1 << t;
                        let (x0, x1) = (self.amps[i], self.amps[j]);
                        self.amps[i] = a * x0 + b * x1;
                        self.amps[j] = c * x0 + d * x1;
                    }
                }
                _ => panic!("cannot simulate {}", inst.name()),
            }
        }
        self
    }

    /// Swap each amplitude whose index satisfies `pick` with index `i ^ flip`.
    fn swap_where(&mut self, pick: impl Fn(usize) -> bool, flip: usize) {
        for i in 0..self.amps.len() {
            if pick(i) && i & flip != flip {
                self.amps.swap(i, i ^ flip);
            }
        }
    }

    fn overlap(&self, other: &Self) -> f64 {
        assert_eq!(self.num_qubits, other.num_qubits);
        self.amps
            .iter()
            .zip(&other.amps)
            .map(|(a, b)| a.conj() * b)
            .sum::<Complex64>()
            .norm()
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn linear(n: u32) -> DeviceConstraints {
    DeviceConstraints::new("linear", CouplingMap::linear(n), BasisGates::ibm())
}

fn grid() -> DeviceConstraints {
    DeviceConstraints::new("grid3x3", CouplingMap::grid(3, 3), BasisGates::ibm())
}

fn triangle() -> Circuit {
    let mut b = Circuit::builder("triangle", 3, 0);
    b.cx(QubitId(0), QubitId(1)).unwrap();
    b.cx(QubitId(1), QubitId(2)).unwrap();
    b.cx(QubitId(0), QubitId(2)).unwrap();
    b.build()
}

fn mixer(n: u32) -> Circuit {
    let mut b = Circuit::builder(format!("mixer{n}"), n, 0);
    for q in (0..n).map(QubitId) {
        b.h(q).unwrap().rz(0.3 + f64::from(q.0), q).unwrap();
    }
    b.sx(QubitId(0)).unwrap().t(QubitId(n - 1)).unwrap();
    for q in 1..n {
        b.cx(QubitId(q - 1), QubitId(q)).unwrap();
    }
    b.ry(0.7, QubitId(0)).unwrap();
    b.build()
}

/// `fragment` implements `source` on the first `source.num_qubits()` virtual qubits.
fn assert_equivalent(source: &Circuit, fragment: &TranspiledFragment, seed: u64) {
    let n = source.num_qubits() as usize;
    let initial = fragment.initial_map().unwrap();
    let full = fragment.full_map().unwrap();
    assert!(initial.len() >= n && full.len() >= n);

    let psi = Statevector::random(source.num_qubits(), seed);
    let physical = psi
        .embed(&initial[..n], fragment.num_physical())
        .run(&fragment.circuit);
    let expected = psi.run(source).embed(&full[..n], fragment.num_physical());
    let overlap = physical.overlap(&expected);
    assert!(
        (overlap - 1.0).abs() < 1e-6,
        "{} on {}: overlap {overlap}",
        source.name(),
        fragment.circuit.name()
    );
}

// ============================================================================
// Modes
// ============================================================================

#[test]
fn chain_matches_source_on_every_stack() {
    let device = linear(5);
    let links = [triangle(), mixer(3)];
    let source = links[0].compose(&links[1]).unwrap();
    for kind in StackKind::ALL {
        let stitcher = Stitcher::uncached().with_stack(kind);
        for level in 0..=3 {
            let options = StackOptions::new().with_seed(7).with_optimization_level(level);
            let chained = stitcher.transpile_chain(&links, &device, &options).unwrap();
            assert_equivalent(&source, &chained, u64::from(level));
        }
    }
}

#[test]
fn chain_with_wider_link_matches_source() {
    let device = linear(5);
    let links = [mixer(2), mixer(3)];
    let source = links[0].widen(3, 0).unwrap().compose(&links[1]).unwrap();
    let options = StackOptions::new().with_seed(3);
    let chained = Stitcher::uncached().transpile_chain(&links, &device, &options).unwrap();
    assert_eq!(chained.full_map().unwrap().len(), 3);
    assert_equivalent(&source, &chained, 11);
}

#[test]
fn right_matches_source() {
    let device = grid();
    let options = StackOptions::new().with_seed(5);
    let stitcher = Stitcher::uncached();
    let base = stitcher.transpile(&mixer(4), &device, &options).unwrap();
    let suffix = {
        let mut b = Circuit::builder("suffix", 4, 0);
        b.cx(QubitId(3), QubitId(0)).unwrap().sdg(QubitId(2)).unwrap().h(QubitId(1)).unwrap();
        b.build()
    };
    let stitched = stitcher.transpile_right(&base, &suffix, &device, &options).unwrap();
    let source = mixer(4).compose(&suffix).unwrap();
    assert_equivalent(&source, &stitched, 21);
}

#[test]
fn left_matches_source() {
    let device = linear(5);
    let options = StackOptions::new().with_seed(9);
    let stitcher = Stitcher::uncached();
    let base = stitcher.transpile(&triangle(), &device, &options).unwrap();
    let prep = mixer(3);
    let prepared = stitcher.transpile_left(&prep, &base, &device, &options).unwrap();
    let source = prep.compose(&triangle()).unwrap();
    assert_equivalent(&source, &prepared, 31);
}

#[test]
fn compressed_fragment_matches_source() {
    let device = grid();
    let options = StackOptions::new().with_seed(13);
    let compressed = Stitcher::uncached()
        .transpile_and_compress(&mixer(3), &device, &options)
        .unwrap();
    assert_eq!(compressed.num_physical(), 9);
    assert_equivalent(&mixer(3), &compressed, 41);
}
