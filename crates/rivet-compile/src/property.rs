//! Device description types and the `PropertySet` passes share.
//!
//! [`CouplingMap`] is the connectivity graph of a device, [`BasisGates`] its
//! native gate set. [`PropertySet`] carries both, plus the layout chosen by
//! a layout pass and any typed values passes want to hand to each other.
//!
//! ```
//! use rivet_compile::{BasisGates, CouplingMap, PropertySet};
//!
//! let props = PropertySet::new().with_target(CouplingMap::linear(5), BasisGates::ibm());
//! let cm = props.coupling_map.as_ref().unwrap();
//! assert!(cm.is_connected(0, 1));
//! assert_eq!(cm.distance(0, 4), Some(4));
//! ```

use std::any::{Any, TypeId};
use std::collections::{BTreeSet, VecDeque};

use petgraph::graph::UnGraph;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{CompileError, CompileResult};
use crate::layout::Layout;

/// Serialized form of a [`CouplingMap`]: only the defining data.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CouplingMapRepr {
    num_qubits: u32,
    edges: Vec<(u32, u32)>,
}

/// Undirected connectivity graph over physical qubits `0..num_qubits`.
///
/// Adjacency lists are kept sorted and all-pairs BFS distances are
/// precomputed whenever the edge set changes, so routing queries are O(1)
/// and shortest paths are deterministic (lowest-index neighbours first).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "CouplingMapRepr", into = "CouplingMapRepr")]
pub struct CouplingMap {
    num_qubits: u32,
    edges: Vec<(u32, u32)>,
    adjacency: Vec<Vec<u32>>,
    dist: Vec<Vec<u32>>,
    next_hop: Vec<Vec<u32>>,
}

impl TryFrom<CouplingMapRepr> for CouplingMap {
    type Error = CompileError;

    fn try_from(repr: CouplingMapRepr) -> CompileResult<Self> {
        CouplingMap::from_edges(repr.num_qubits, repr.edges)
    }
}

impl From<CouplingMap> for CouplingMapRepr {
    fn from(map: CouplingMap) -> Self {
        CouplingMapRepr {
            num_qubits: map.num_qubits,
            edges: map.edges,
        }
    }
}

impl PartialEq for CouplingMap {
    fn eq(&self, other: &Self) -> bool {
        self.num_qubits == other.num_qubits && self.sorted_edges() == other.sorted_edges()
    }
}

impl Eq for CouplingMap {}

impl CouplingMap {
    /// A device with `num_qubits` isolated qubits.
    pub fn new(num_qubits: u32) -> Self {
        let mut map = Self {
            num_qubits,
            edges: vec![],
            adjacency: vec![],
            dist: vec![],
            next_hop: vec![],
        };
        map.rebuild_caches();
        map
    }

    /// A device from an edge list. Duplicate and reversed edges collapse.
    pub fn from_edges(
        num_qubits: u32,
        edges: impl IntoIterator<Item = (u32, u32)>,
    ) -> CompileResult<Self> {
        let mut map = Self::new(num_qubits);
        for (a, b) in edges {
            for q in [a, b] {
                if q >= num_qubits {
                    return Err(CompileError::PhysicalOutOfRange {
                        physical: q,
                        num_physical: num_qubits,
                    });
                }
            }
            if a == b {
                return Err(CompileError::InvalidConfiguration(format!(
                    "self-loop on physical qubit {a}"
                )));
            }
            map.insert_edge(a, b);
        }
        map.rebuild_caches();
        Ok(map)
    }

    fn insert_edge(&mut self, a: u32, b: u32) -> bool {
        let dup = self
            .edges
            .iter()
            .any(|&(x, y)| (x == a && y == b) || (x == b && y == a));
        if !dup {
            self.edges.push((a, b));
        }
        !dup
    }

    /// Add an undirected edge; duplicates are ignored.
    pub fn add_edge(&mut self, a: u32, b: u32) -> CompileResult<()> {
        if a >= self.num_qubits || b >= self.num_qubits {
            return Err(CompileError::PhysicalOutOfRange {
                physical: a.max(b),
                num_physical: self.num_qubits,
            });
        }
        if self.insert_edge(a, b) {
            self.rebuild_caches();
        }
        Ok(())
    }

    fn rebuild_caches(&mut self) {
        let n = self.num_qubits as usize;
        self.adjacency = vec![vec![]; n];
        for &(a, b) in &self.edges {
            self.adjacency[a as usize].push(b);
            self.adjacency[b as usize].push(a);
        }
        for list in &mut self.adjacency {
            list.sort_unstable();
        }

        // BFS from every target; next_hop[t][s] is the neighbour of s one step closer to t.
        self.dist = vec![vec![u32::MAX; n]; n];
        self.next_hop = vec![vec![u32::MAX; n]; n];
        for target in 0..n {
            self.dist[target][target] = 0;
            self.next_hop[target][target] = target as u32;
            let mut queue = VecDeque::from([target as u32]);
            while let Some(current) = queue.pop_front() {
                for &nb in &self.adjacency[current as usize] {
                    if self.dist[target][nb as usize] == u32::MAX {
                        self.dist[target][nb as usize] = self.dist[target][current as usize] + 1;
                        self.next_hop[target][nb as usize] = current;
                        queue.push_back(nb);
                    }
                }
            }
        }
    }

    /// Number of physical qubits.
    #[inline]
    pub fn num_qubits(&self) -> u32 {
        self.num_qubits
    }

    /// Edges in insertion order.
    pub fn edges(&self) -> &[(u32, u32)] {
        &self.edges
    }

    /// Edges normalised to `(low, high)` and sorted.
    pub fn sorted_edges(&self) -> Vec<(u32, u32)> {
        let mut edges: Vec<_> = self.edges.iter().map(|&(a, b)| (a.min(b), a.max(b))).collect();
        edges.sort_unstable();
        edges
    }

    /// Whether `a` and `b` share an edge.
    #[inline]
    pub fn is_connected(&self, a: u32, b: u32) -> bool {
        self.adjacency
            .get(a as usize)
            .is_some_and(|nbs| nbs.binary_search(&b).is_ok())
    }

    /// Neighbours of `qubit`, ascending.
    pub fn neighbors(&self, qubit: u32) -> &[u32] {
        self.adjacency.get(qubit as usize).map_or(&[], Vec::as_slice)
    }

    /// Number of neighbours of `qubit`.
    pub fn degree(&self, qubit: u32) -> usize {
        self.neighbors(qubit).len()
    }

    /// Shortest-path distance, or `None` if unreachable or out of range.
    pub fn distance(&self, from: u32, to: u32) -> Option<u32> {
        let d = *self.dist.get(to as usize)?.get(from as usize)?;
        (d != u32::MAX).then_some(d)
    }

    /// A shortest path `from -> ... -> to`, inclusive of both ends.
    pub fn shortest_path(&self, from: u32, to: u32) -> Option<Vec<u32>> {
        self.distance(from, to)?;
        let mut path = vec![from];
        let mut current = from;
        while current != to {
            current = self.next_hop[to as usize][current as usize];
            path.push(current);
        }
        Some(path)
    }

    /// petgraph view of the device.
    pub fn to_graph(&self) -> UnGraph<u32, ()> {
        let mut graph = UnGraph::with_capacity(self.num_qubits as usize, self.edges.len());
        let nodes: Vec<_> = (0..self.num_qubits).map(|q| graph.add_node(q)).collect();
        for &(a, b) in &self.edges {
            graph.add_edge(nodes[a as usize], nodes[b as usize], ());
        }
        graph
    }

    /// Whether every qubit can reach every other one.
    pub fn is_connected_graph(&self) -> bool {
        petgraph::algo::connected_components(&self.to_graph()) <= 1
    }

    /// Qubits reachable from `qubit`, including itself.
    pub fn component_of(&self, qubit: u32) -> BTreeSet<u32> {
        (0..self.num_qubits)
            .filter(|&q| self.distance(qubit, q).is_some())
            .collect()
    }

    /// The induced subgraph on `qubits`, relabelled so that `qubits[i]` becomes `i`.
    pub fn subgraph(&self, qubits: &[u32]) -> CompileResult<CouplingMap> {
        let mut index = FxHashMap::default();
        for (i, &q) in qubits.iter().enumerate() {
            if q >= self.num_qubits {
                return Err(CompileError::PhysicalOutOfRange {
                    physical: q,
                    num_physical: self.num_qubits,
                });
            }
            if index.insert(q, i as u32).is_some() {
                return Err(CompileError::PhysicalOccupied { physical: q });
            }
        }
        let edges = self
            .edges
            .iter()
            .filter_map(|(a, b)| Some((*index.get(a)?, *index.get(b)?)));
        CouplingMap::from_edges(qubits.len() as u32, edges)
    }

    /// Stable textual identity: size plus sorted edge list.
    pub fn fingerprint(&self) -> String {
        let edges: Vec<String> = self
            .sorted_edges()
            .into_iter()
            .map(|(a, b)| format!("{a}-{b}"))
            .collect();
        format!("{}:{}", self.num_qubits, edges.join(","))
    }

    /// Linear chain `0-1-2-...`.
    pub fn linear(n: u32) -> Self {
        let edges = (1..n).map(|i| (i - 1, i));
        Self::from_edges(n, edges).unwrap_or_else(|_| Self::new(n))
    }

    /// Ring `0-1-...-(n-1)-0`.
    pub fn ring(n: u32) -> Self {
        let mut edges: Vec<_> = (1..n).map(|i| (i - 1, i)).collect();
        if n > 2 {
            edges.push((n - 1, 0));
        }
        Self::from_edges(n, edges).unwrap_or_else(|_| Self::new(n))
    }

    /// All-to-all connectivity.
    pub fn full(n: u32) -> Self {
        let edges = (0..n).flat_map(|i| ((i + 1)..n).map(move |j| (i, j)));
        Self::from_edges(n, edges).unwrap_or_else(|_| Self::new(n))
    }

    /// Qubit 0 connected to every other qubit.
    pub fn star(n: u32) -> Self {
        let edges = (1..n).map(|i| (0, i));
        Self::from_edges(n, edges).unwrap_or_else(|_| Self::new(n))
    }

    /// Row-major `rows x cols` grid with nearest-neighbour edges.
    pub fn grid(rows: u32, cols: u32) -> Self {
        let mut edges = vec![];
        for r in 0..rows {
            for c in 0..cols {
                let q = r * cols + c;
                if c + 1 < cols {
                    edges.push((q, q + 1));
                }
                if r + 1 < rows {
                    edges.push((q, q + cols));
                }
            }
        }
        Self::from_edges(rows * cols, edges).unwrap_or_else(|_| Self::new(rows * cols))
    }
}

/// Native gate set of a target, by lower-case gate name.
///
/// Non-unitary instructions (measure, reset, barrier, delay) are always
/// accepted and are not listed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BasisGates {
    gates: BTreeSet<String>,
}

impl BasisGates {
    /// A basis from gate names.
    pub fn new(gates: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            gates: gates.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `gate` is native.
    pub fn contains(&self, gate: &str) -> bool {
        self.gates.contains(gate)
    }

    /// Gate names, sorted.
    pub fn gates(&self) -> impl Iterator<Item = &str> {
        self.gates.iter().map(String::as_str)
    }

    /// IBM Eagle-style basis: RZ, SX, X, CX.
    pub fn ibm() -> Self {
        Self::new(["rz", "sx", "x", "cx", "id"])
    }

    /// IBM Heron-style basis: RZ, SX, X, CZ.
    pub fn heron() -> Self {
        Self::new(["rz", "sx", "x", "cz", "id"])
    }

    /// Every standard gate.
    pub fn universal() -> Self {
        Self::new([
            "id", "x", "y", "z", "h", "s", "sdg", "t", "tdg", "sx", "sxdg", "rx", "ry", "rz", "p",
            "u", "cx", "cy", "cz", "ch", "swap", "cp", "crz", "rzz", "ccx", "cswap",
        ])
    }
}

/// Properties shared between compilation passes.
///
/// `layout` is the initial virtual-to-physical layout chosen (or pinned)
/// before routing. Routing results and other pass outputs travel as typed
/// custom properties.
#[derive(Debug, Default)]
pub struct PropertySet {
    /// Initial layout.
    pub layout: Option<Layout>,
    /// Target connectivity.
    pub coupling_map: Option<CouplingMap>,
    /// Target gate set.
    pub basis_gates: Option<BasisGates>,
    custom: FxHashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl PropertySet {
    /// An empty property set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set coupling map and basis.
    #[must_use]
    pub fn with_target(mut self, coupling_map: CouplingMap, basis_gates: BasisGates) -> Self {
        self.coupling_map = Some(coupling_map);
        self.basis_gates = Some(basis_gates);
        self
    }

    /// Set the initial layout.
    #[must_use]
    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = Some(layout);
        self
    }

    /// Store a typed value, replacing any previous value of that type.
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) {
        self.custom.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Borrow a typed value.
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.custom.get(&TypeId::of::<T>()).and_then(|v| v.downcast_ref())
    }

    /// Take a typed value out.
    pub fn remove<T: Any>(&mut self) -> Option<T> {
        self.custom
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast().ok())
            .map(|v| *v)
    }
}
