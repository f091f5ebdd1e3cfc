//! The stitching scenarios shown by `rivet-demo`.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::info;

use rivet_compile::{BasisGates, CouplingMap};
use rivet_ir::{Circuit, QubitId};
use rivet_stack::{DeviceConstraints, StackOptions, TranspiledFragment};
use rivet_transpiler::{
    Stitcher, get_full_map, ibm_cost, library, pack_circuits, remove_unused_qubits,
    transpile_and_return_metrics,
};

use crate::create_progress_bar;

/// Outcome of one scenario, for printing.
#[derive(Debug, Clone)]
pub struct Summary {
    /// Scenario name.
    pub name: &'static str,
    /// Final physical qubit of every virtual qubit.
    pub full_map: Vec<u32>,
    /// Instructions in the stitched circuit.
    pub ops: usize,
    /// Depth of the stitched circuit.
    pub depth: usize,
    /// Physical qubits the circuit touches.
    pub touched: usize,
    /// Cost estimate, when defined.
    pub cost: Option<f64>,
    /// Wall time.
    pub elapsed: Duration,
}

impl Summary {
    fn of(name: &'static str, fragment: &TranspiledFragment, start: Instant) -> Result<Self> {
        Ok(Self {
            name,
            full_map: get_full_map(fragment)?,
            ops: fragment.circuit.len(),
            depth: fragment.circuit.depth(),
            touched: fragment.circuit.used_qubits().len(),
            cost: ibm_cost(&fragment.circuit).ok(),
            elapsed: start.elapsed(),
        })
    }
}

/// A 3x4 grid with the IBM basis.
pub fn demo_device() -> DeviceConstraints {
    DeviceConstraints::new("grid3x4", CouplingMap::grid(3, 4), BasisGates::ibm())
}

/// CNOT(0,1), CNOT(1,2), CNOT(0,2).
pub fn triangle() -> Circuit {
    let mut b = Circuit::builder("triangle", 3, 0);
    for (c, t) in [(0, 1), (1, 2), (0, 2)] {
        // indices are in range by construction
        let _ = b.cx(QubitId(c), QubitId(t));
    }
    b.build()
}

/// The triangle circuit chained three times.
pub fn chain(
    stitcher: &Stitcher<'_>,
    device: &DeviceConstraints,
    options: &StackOptions,
) -> Result<Summary> {
    let start = Instant::now();
    let circuits = vec![triangle(); 3];
    let fragment = stitcher
        .transpile_chain(&circuits, device, options)
        .context("chaining triangle circuits")?;
    Summary::of("chain", &fragment, start)
}

/// One litmus prefix with a suffix per measurement basis.
pub fn right(
    stitcher: &Stitcher<'_>,
    device: &DeviceConstraints,
    options: &StackOptions,
) -> Result<Vec<Summary>> {
    let start = Instant::now();
    let prefix = library::litmus_circuit(4, "prefix")?;
    let base = stitcher.transpile(&prefix, device, options)?;

    let suffixes = measurement_suffixes(4)?;
    let pb = create_progress_bar(suffixes.len() as u64, "appending suffixes");
    let mut summaries = Vec::with_capacity(suffixes.len());
    for suffix in &suffixes {
        let stitched = stitcher
            .transpile_right(&base, suffix, device, options)
            .with_context(|| format!("appending '{}'", suffix.name()))?;
        summaries.push(Summary::of("right", &stitched, start)?);
        pb.inc(1);
    }
    pb.finish_and_clear();
    Ok(summaries)
}

/// A state-preparation prefix placed before an already compiled body.
pub fn left(
    stitcher: &Stitcher<'_>,
    device: &DeviceConstraints,
    options: &StackOptions,
) -> Result<Summary> {
    let start = Instant::now();
    let body = stitcher.transpile(&library::litmus_circuit(3, "body")?, device, options)?;
    let prep = library::cnot_circuit(3, "prep", 2, 0)?;
    let fragment = stitcher
        .transpile_left(&prep, &body, device, options)
        .context("prepending the preparation circuit")?;
    Summary::of("left", &fragment, start)
}

/// The triangle on the densest 3-qubit region, then compacted.
pub fn compress(
    stitcher: &Stitcher<'_>,
    device: &DeviceConstraints,
    options: &StackOptions,
) -> Result<Summary> {
    let start = Instant::now();
    let fragment = stitcher.transpile_and_compress(&triangle(), device, options)?;
    let (compact, kept) = remove_unused_qubits(&fragment)?;
    info!("Compressed fragment keeps device qubits {kept:?}");
    let mut summary = Summary::of("compress", &fragment, start)?;
    summary.touched = compact.num_physical() as usize;
    Ok(summary)
}

/// Copies of a Bell pair packed side by side, and per-pass metrics.
pub fn pack(device: &DeviceConstraints, options: &StackOptions) -> Result<Summary> {
    let start = Instant::now();
    let mut bell = Circuit::builder("bell", 2, 0);
    bell.h(QubitId(0))?.cx(QubitId(0), QubitId(1))?;
    // leave slack so greedy region growth never strands a pair
    let copies = (device.num_qubits() / 3) as usize;
    let packed = pack_circuits(&bell.build(), copies, &device.coupling_map)?;
    let (fragment, metrics) = transpile_and_return_metrics(&packed.circuit, device, options)?;
    for m in &metrics {
        info!(
            "pass {:>2} {:<24} depth {:>3} cost {}",
            m.index,
            m.name,
            m.depth,
            m.ibm_cost.map_or("-".to_string(), |c| format!("{c:.4}"))
        );
    }
    Summary::of("pack", &fragment, start)
}

fn measurement_suffixes(n: u32) -> Result<Vec<Circuit>> {
    let mut suffixes = Vec::new();
    for basis in ["z", "x", "y"] {
        let mut b = Circuit::builder(format!("basis_{basis}"), n, 0);
        for q in (0..n).map(QubitId) {
            match basis {
                "x" => {
                    b.h(q)?;
                }
                "y" => {
                    b.sdg(q)?.h(q)?;
                }
                _ => {}
            }
        }
        b.barrier_all()?;
        suffixes.push(b.build());
    }
    Ok(suffixes)
}
