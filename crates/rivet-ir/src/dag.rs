//! DAG view of a circuit, used by compilation passes and the canonical hasher.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap};

use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex as PetNodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use rustc_hash::FxHashMap;

use crate::circuit::{check_operands, depth_of};
use crate::error::{IrError, IrResult};
use crate::instruction::Instruction;
use crate::qubit::{ClbitId, QubitId};

/// Node index type for the circuit DAG.
pub type NodeIndex = PetNodeIndex<u32>;

/// A node in the circuit DAG.
#[derive(Debug, Clone, PartialEq)]
pub enum DagNode {
    /// Start of a wire.
    In(WireId),
    /// End of a wire.
    Out(WireId),
    /// An operation.
    Op(Instruction),
}

/// A quantum or classical wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireId {
    /// Quantum wire.
    Qubit(QubitId),
    /// Classical wire.
    Clbit(ClbitId),
}

/// Edge weight: the wire the edge runs along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DagEdge {
    /// The wire.
    pub wire: WireId,
}

/// Directed acyclic graph of operations connected along their wires.
///
/// Each wire runs `In -> op -> ... -> op -> Out`. Node indices stay valid
/// across [`CircuitDag::remove_op`].
#[derive(Debug, Clone)]
pub struct CircuitDag {
    graph: StableDiGraph<DagNode, DagEdge, u32>,
    inputs: Vec<NodeIndex>,
    outputs: Vec<NodeIndex>,
    /// Last node before `Out`, per wire slot.
    wire_front: Vec<NodeIndex>,
    num_qubits: u32,
    num_clbits: u32,
}

impl CircuitDag {
    /// An empty DAG over `num_qubits` qubit wires and `num_clbits` classical wires.
    pub fn new(num_qubits: u32, num_clbits: u32) -> Self {
        let mut graph = StableDiGraph::default();
        let wires = (0..num_qubits)
            .map(|q| WireId::Qubit(QubitId(q)))
            .chain((0..num_clbits).map(|c| WireId::Clbit(ClbitId(c))));
        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        for wire in wires {
            let in_node = graph.add_node(DagNode::In(wire));
            let out_node = graph.add_node(DagNode::Out(wire));
            graph.add_edge(in_node, out_node, DagEdge { wire });
            inputs.push(in_node);
            outputs.push(out_node);
        }
        Self {
            graph,
            wire_front: inputs.clone(),
            inputs,
            outputs,
            num_qubits,
            num_clbits,
        }
    }

    /// Number of qubit wires.
    pub fn num_qubits(&self) -> u32 {
        self.num_qubits
    }

    /// Number of classical wires.
    pub fn num_clbits(&self) -> u32 {
        self.num_clbits
    }

    /// Number of operation nodes.
    pub fn num_ops(&self) -> usize {
        self.graph.node_count() - self.inputs.len() - self.outputs.len()
    }

    fn slot(&self, wire: WireId) -> usize {
        match wire {
            WireId::Qubit(q) => q.index(),
            WireId::Clbit(c) => self.num_qubits as usize + c.index(),
        }
    }

    /// Validate an instruction against this DAG's wires.
    pub fn check(&self, instruction: &Instruction) -> IrResult<()> {
        check_operands(instruction, self.num_qubits, self.num_clbits)
    }

    /// Append an instruction at the end of its wires.
    pub fn apply(&mut self, instruction: Instruction) -> IrResult<NodeIndex> {
        self.check(&instruction)?;
        Ok(self.push(instruction))
    }

    /// Append an instruction already known to be valid for this DAG.
    pub(crate) fn push(&mut self, instruction: Instruction) -> NodeIndex {
        let wires: Vec<WireId> = instruction
            .qubits
            .iter()
            .map(|&q| WireId::Qubit(q))
            .chain(instruction.clbits.iter().map(|&c| WireId::Clbit(c)))
            .collect();
        let op = self.graph.add_node(DagNode::Op(instruction));
        for wire in wires {
            let slot = self.slot(wire);
            let prev = self.wire_front[slot];
            let out = self.outputs[slot];
            if let Some(edge) = self.graph.find_edge(prev, out) {
                self.graph.remove_edge(edge);
            }
            self.graph.add_edge(prev, op, DagEdge { wire });
            self.graph.add_edge(op, out, DagEdge { wire });
            self.wire_front[slot] = op;
        }
        op
    }

    /// Remove an operation, reconnecting each of its wires around it.
    pub fn remove_op(&mut self, node: NodeIndex) -> IrResult<Instruction> {
        match self.graph.node_weight(node) {
            Some(DagNode::Op(_)) => {}
            Some(_) => return Err(IrError::InvalidDag("cannot remove a wire endpoint".into())),
            None => return Err(IrError::InvalidNode),
        }
        let incoming: Vec<(NodeIndex, WireId)> = self
            .graph
            .edges_directed(node, Direction::Incoming)
            .map(|e| (e.source(), e.weight().wire))
            .collect();
        for (pred, wire) in incoming {
            let succ = self
                .graph
                .edges_directed(node, Direction::Outgoing)
                .find(|e| e.weight().wire == wire)
                .map(|e| e.target())
                .ok_or_else(|| IrError::InvalidDag(format!("wire {wire:?} has no successor")))?;
            self.graph.add_edge(pred, succ, DagEdge { wire });
            let slot = self.slot(wire);
            if self.wire_front[slot] == node {
                self.wire_front[slot] = pred;
            }
        }
        match self.graph.remove_node(node) {
            Some(DagNode::Op(instruction)) => Ok(instruction),
            _ => Err(IrError::InvalidNode),
        }
    }

    /// The instruction at `node`, if it is an operation.
    pub fn get_instruction(&self, node: NodeIndex) -> Option<&Instruction> {
        match self.graph.node_weight(node) {
            Some(DagNode::Op(inst)) => Some(inst),
            _ => None,
        }
    }

    /// Mutable access to the instruction at `node`.
    ///
    /// Callers must keep the operand list unchanged.
    pub fn get_instruction_mut(&mut self, node: NodeIndex) -> Option<&mut Instruction> {
        match self.graph.node_weight_mut(node) {
            Some(DagNode::Op(inst)) => Some(inst),
            _ => None,
        }
    }

    /// The next operation on `wire` after `node`, if any.
    pub fn next_on_wire(&self, node: NodeIndex, wire: WireId) -> Option<NodeIndex> {
        self.graph
            .edges_directed(node, Direction::Outgoing)
            .find(|e| e.weight().wire == wire)
            .map(|e| e.target())
            .filter(|&t| matches!(self.graph[t], DagNode::Op(_)))
    }

    /// The previous operation on `wire` before `node`, if any.
    pub fn prev_on_wire(&self, node: NodeIndex, wire: WireId) -> Option<NodeIndex> {
        self.graph
            .edges_directed(node, Direction::Incoming)
            .find(|e| e.weight().wire == wire)
            .map(|e| e.source())
            .filter(|&s| matches!(self.graph[s], DagNode::Op(_)))
    }

    /// Operations in topological order, preferring insertion order among ready nodes.
    pub fn topological_ops(&self) -> Vec<(NodeIndex, &Instruction)> {
        let mut ready = BinaryHeap::new();
        let mut pending = self.op_in_degrees(|node, _| ready.push(Reverse(node)));
        let mut out = Vec::with_capacity(self.num_ops());
        while let Some(Reverse(node)) = ready.pop() {
            if let Some(inst) = self.get_instruction(node) {
                out.push((node, inst));
            }
            self.release_successors(node, &mut pending, |succ| ready.push(Reverse(succ)));
        }
        out
    }

    /// Topological order where, among ready operations, the one with the
    /// smallest `key` is emitted first. Ties fall back to node index.
    pub fn topological_ops_by<K: Ord>(&self, key: impl Fn(&Instruction) -> K) -> Vec<NodeIndex> {
        let mut ready = BTreeSet::new();
        let mut pending = self.op_in_degrees(|node, inst| {
            ready.insert((key(inst), node));
        });
        let mut out = Vec::with_capacity(self.num_ops());
        while let Some((_, node)) = ready.pop_first() {
            out.push(node);
            self.release_successors(node, &mut pending, |succ| {
                if let Some(inst) = self.get_instruction(succ) {
                    ready.insert((key(inst), succ));
                }
            });
        }
        out
    }

    /// Count, per operation, incoming edges that come from other operations.
    /// Calls `on_ready` for every operation with none.
    fn op_in_degrees(
        &self,
        mut on_ready: impl FnMut(NodeIndex, &Instruction),
    ) -> FxHashMap<NodeIndex, usize> {
        let mut pending = FxHashMap::default();
        for node in self.graph.node_indices() {
            let Some(inst) = self.get_instruction(node) else {
                continue;
            };
            let degree = self
                .graph
                .edges_directed(node, Direction::Incoming)
                .filter(|e| matches!(self.graph[e.source()], DagNode::Op(_)))
                .count();
            if degree == 0 {
                on_ready(node, inst);
            } else {
                pending.insert(node, degree);
            }
        }
        pending
    }

    fn release_successors(
        &self,
        node: NodeIndex,
        pending: &mut FxHashMap<NodeIndex, usize>,
        mut on_ready: impl FnMut(NodeIndex),
    ) {
        for edge in self.graph.edges_directed(node, Direction::Outgoing) {
            let succ = edge.target();
            if let Some(count) = pending.get_mut(&succ) {
                *count -= 1;
                if *count == 0 {
                    pending.remove(&succ);
                    on_ready(succ);
                }
            }
        }
    }

    /// Instructions in topological order.
    pub fn instructions(&self) -> Vec<Instruction> {
        self.topological_ops()
            .into_iter()
            .map(|(_, inst)| inst.clone())
            .collect()
    }

    /// Circuit depth: the longest chain of non-barrier operations along any wires.
    pub fn depth(&self) -> usize {
        depth_of(
            self.num_qubits,
            self.num_clbits,
            self.topological_ops().into_iter().map(|(_, inst)| inst),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::StandardGate;

    fn h(q: u32) -> Instruction {
        Instruction::single_qubit_gate(StandardGate::H, QubitId(q))
    }

    fn cx(a: u32, b: u32) -> Instruction {
        Instruction::two_qubit_gate(StandardGate::CX, QubitId(a), QubitId(b))
    }

    #[test]
    fn test_apply_validates_operands() {
        let mut dag = CircuitDag::new(2, 0);
        assert!(matches!(
            dag.apply(h(2)),
            Err(IrError::QubitOutOfRange { .. })
        ));
        assert!(matches!(
            dag.apply(Instruction::gate(StandardGate::CX, [QubitId(0), QubitId(0)])),
            Err(IrError::DuplicateQubit { .. })
        ));
        assert!(matches!(
            dag.apply(Instruction::gate(StandardGate::CX, [QubitId(0)])),
            Err(IrError::QubitCountMismatch { .. })
        ));
    }

    #[test]
    fn test_wire_neighbours() {
        let mut dag = CircuitDag::new(2, 0);
        let a = dag.apply(h(0)).unwrap();
        let b = dag.apply(cx(0, 1)).unwrap();
        let c = dag.apply(h(1)).unwrap();
        let q0 = WireId::Qubit(QubitId(0));
        let q1 = WireId::Qubit(QubitId(1));
        assert_eq!(dag.next_on_wire(a, q0), Some(b));
        assert_eq!(dag.prev_on_wire(b, q1), None);
        assert_eq!(dag.next_on_wire(b, q1), Some(c));
        assert_eq!(dag.next_on_wire(c, q1), None);
    }

    #[test]
    fn test_remove_op_reconnects_wires() {
        let mut dag = CircuitDag::new(2, 0);
        let a = dag.apply(h(0)).unwrap();
        let b = dag.apply(cx(0, 1)).unwrap();
        let c = dag.apply(h(0)).unwrap();
        dag.remove_op(b).unwrap();
        assert_eq!(dag.num_ops(), 2);
        assert_eq!(dag.next_on_wire(a, WireId::Qubit(QubitId(0))), Some(c));
        // appending after removal still links to the right front
        let d = dag.apply(h(1)).unwrap();
        assert_eq!(dag.prev_on_wire(d, WireId::Qubit(QubitId(1))), None);
    }

    #[test]
    fn test_topological_order_prefers_insertion() {
        let mut dag = CircuitDag::new(3, 0);
        dag.apply(h(2)).unwrap();
        dag.apply(h(0)).unwrap();
        dag.apply(cx(0, 1)).unwrap();
        let names: Vec<_> = dag
            .topological_ops()
            .into_iter()
            .map(|(_, i)| i.qubits[0].0)
            .collect();
        assert_eq!(names, vec![2, 0, 0]);
    }

    #[test]
    fn test_keyed_order_ignores_insertion_of_disjoint_ops() {
        let mut first = CircuitDag::new(2, 0);
        first.apply(h(1)).unwrap();
        first.apply(h(0)).unwrap();
        let mut second = CircuitDag::new(2, 0);
        second.apply(h(0)).unwrap();
        second.apply(h(1)).unwrap();
        let key = |i: &Instruction| i.qubits.clone();
        let order = |dag: &CircuitDag| -> Vec<Vec<QubitId>> {
            dag.topological_ops_by(key)
                .into_iter()
                .map(|n| dag.get_instruction(n).unwrap().qubits.clone())
                .collect()
        };
        assert_eq!(order(&first), order(&second));
    }

    #[test]
    fn test_depth_skips_barriers() {
        let mut dag = CircuitDag::new(2, 0);
        dag.apply(h(0)).unwrap();
        dag.apply(Instruction::barrier([QubitId(0), QubitId(1)])).unwrap();
        dag.apply(cx(0, 1)).unwrap();
        assert_eq!(dag.depth(), 2);
    }
}
