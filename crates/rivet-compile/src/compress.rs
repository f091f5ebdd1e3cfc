//! Topological compression: pick a small, densely connected region of the
//! device before transpiling so no more physical qubits are touched than
//! the circuit needs.

use std::cmp::Reverse;
use std::collections::BTreeSet;

use tracing::debug;

use crate::error::{CompileError, CompileResult};
use crate::property::CouplingMap;

/// A connected region of a device, presented as a device of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compression {
    /// Device qubits in the region, ascending. Compressed index `i` is
    /// device qubit `selected[i]`.
    pub selected: Vec<u32>,
    /// Induced subgraph on `selected`, relabelled to `0..k`.
    pub coupling_map: CouplingMap,
    device_size: u32,
}

impl Compression {
    /// Number of qubits in the region.
    pub fn len(&self) -> usize {
        self.selected.len()
    }

    /// Whether the region is empty.
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Size of the original device.
    pub fn device_size(&self) -> u32 {
        self.device_size
    }

    /// Device qubit for compressed index `index`.
    pub fn to_device(&self, index: u32) -> Option<u32> {
        self.selected.get(index as usize).copied()
    }

    /// Compressed index of device qubit `physical`, if selected.
    pub fn from_device(&self, physical: u32) -> Option<u32> {
        self.selected.binary_search(&physical).ok().map(|i| i as u32)
    }
}

/// Select a connected region of exactly `k` qubits.
///
/// Growth starts at the qubit of highest degree (lowest index on ties) and
/// repeatedly adds the neighbour with the most edges into the region
/// (lowest index on ties). If that component is too small, the best start
/// of the next component is tried.
pub fn compress(coupling_map: &CouplingMap, k: u32) -> CompileResult<Compression> {
    let mut selected = grow_connected_subset(coupling_map, k, &BTreeSet::new())?;
    selected.sort_unstable();
    let sub = coupling_map.subgraph(&selected)?;
    debug!(
        "Compressed {}-qubit device to {:?} ({} edges)",
        coupling_map.num_qubits(),
        selected,
        sub.edges().len()
    );
    Ok(Compression {
        selected,
        coupling_map: sub,
        device_size: coupling_map.num_qubits(),
    })
}

/// Grow a connected set of `k` qubits avoiding `excluded`, in selection order.
pub fn grow_connected_subset(
    coupling_map: &CouplingMap,
    k: u32,
    excluded: &BTreeSet<u32>,
) -> CompileResult<Vec<u32>> {
    let available: Vec<u32> = (0..coupling_map.num_qubits())
        .filter(|q| !excluded.contains(q))
        .collect();
    if (available.len() as u32) < k {
        return Err(CompileError::InsufficientConnectivity {
            required: k,
            available: available.len() as u32,
        });
    }
    if k == 0 {
        return Ok(vec![]);
    }

    let live_degree = |q: u32| {
        coupling_map
            .neighbors(q)
            .iter()
            .filter(|n| !excluded.contains(n))
            .count()
    };
    let mut starts = available.clone();
    starts.sort_by_key(|&q| (Reverse(live_degree(q)), q));

    let mut visited = BTreeSet::new();
    let mut largest = 0u32;
    for start in starts {
        if visited.contains(&start) {
            continue;
        }
        let region = grow_from(coupling_map, start, k, excluded);
        if region.len() as u32 == k {
            return Ok(region);
        }
        // region stopped short: it is the whole component
        largest = largest.max(region.len() as u32);
        visited.extend(region);
    }
    Err(CompileError::InsufficientConnectivity {
        required: k,
        available: largest,
    })
}

fn grow_from(coupling_map: &CouplingMap, start: u32, k: u32, excluded: &BTreeSet<u32>) -> Vec<u32> {
    let mut region = vec![start];
    let mut in_region = BTreeSet::from([start]);
    while (region.len() as u32) < k {
        let frontier: BTreeSet<u32> = region
            .iter()
            .flat_map(|&q| coupling_map.neighbors(q).iter().copied())
            .filter(|n| !in_region.contains(n) && !excluded.contains(n))
            .collect();
        let next = frontier.into_iter().min_by_key(|&candidate| {
            let links = coupling_map
                .neighbors(candidate)
                .iter()
                .filter(|n| in_region.contains(n))
                .count();
            (Reverse(links), candidate)
        });
        let Some(next) = next else {
            break;
        };
        region.push(next);
        in_region.insert(next);
    }
    region
}
