//! Block re-instantiation.
//!
//! After layout, routing and translation, every run of two or more numeric
//! single-qubit gates is collapsed into one unitary, re-instantiated from its
//! ZYZ angles in the target basis and checked against the original. A block
//! is replaced only when the check passes and the new block is no longer
//! than the old one. Blocks that fail the check are kept and make the
//! fragment best-effort.

use tracing::{debug, warn};

use rivet_compile::passes::{CancelInversePairs, synthesize_1q};
use rivet_compile::{
    CompileError, CompileResult, LayoutMethod, Pass, PassKind, PassManagerBuilder, PropertySet,
    Unitary2x2,
};
use rivet_ir::{Circuit, CircuitDag, Instruction, QubitId};

use super::{prepare, take_routing};
use crate::device::DeviceConstraints;
use crate::error::{StackError, StackResult};
use crate::fragment::{FragmentQuality, TranspiledFragment};
use crate::options::StackOptions;
use crate::stack::{Stack, StackKind, assemble_fragment, basis_for};

/// Default fidelity a re-instantiated block must reach.
pub const DEFAULT_TARGET_FIDELITY: f64 = 1.0 - 1e-9;

/// How re-instantiation went.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstantiationReport {
    /// Blocks examined.
    pub blocks: usize,
    /// Blocks replaced by their re-instantiation.
    pub replaced: usize,
    /// Blocks whose re-instantiation missed the target.
    pub rejected: usize,
    /// Lowest fidelity seen.
    pub worst_fidelity: f64,
}

impl Default for InstantiationReport {
    fn default() -> Self {
        Self {
            blocks: 0,
            replaced: 0,
            rejected: 0,
            worst_fidelity: 1.0,
        }
    }
}

/// Preset routing followed by fidelity-checked block re-instantiation.
///
/// Tuning key: `instantiation.target_fidelity`.
#[derive(Debug, Clone, Copy)]
pub struct InstantiationStack {
    target_fidelity: f64,
}

impl InstantiationStack {
    /// Default target fidelity.
    pub fn new() -> Self {
        Self {
            target_fidelity: DEFAULT_TARGET_FIDELITY,
        }
    }

    /// Set the target fidelity.
    #[must_use]
    pub fn with_target_fidelity(mut self, target_fidelity: f64) -> Self {
        self.target_fidelity = target_fidelity;
        self
    }

    fn target(&self, options: &StackOptions) -> StackResult<f64> {
        let target = options
            .tuning_f64("instantiation.target_fidelity")?
            .unwrap_or(self.target_fidelity);
        if !(0.0..=1.0).contains(&target) {
            return Err(StackError::InvalidOptions(format!(
                "instantiation.target_fidelity {target} outside [0, 1]"
            )));
        }
        Ok(target)
    }
}

impl Default for InstantiationStack {
    fn default() -> Self {
        Self::new()
    }
}

impl Stack for InstantiationStack {
    fn kind(&self) -> StackKind {
        StackKind::Instantiation
    }

    fn transpile(
        &self,
        circuit: &Circuit,
        device: &DeviceConstraints,
        options: &StackOptions,
    ) -> StackResult<TranspiledFragment> {
        let kind = self.kind();
        prepare(options, kind)?;
        let target_fidelity = self.target(options)?;

        let mut properties = PropertySet::new()
            .with_target(device.coupling_map.clone(), basis_for(device, options).clone());
        properties.layout = options.initial_layout.clone();
        let (mut pm, mut properties) = PassManagerBuilder::new()
            .with_optimization_level(0)
            .with_layout_method(LayoutMethod::Dense)
            .with_properties(properties)
            .build();
        pm.add_pass(ReinstantiateBlocks { target_fidelity });
        if options.optimization_level >= 2 {
            pm.add_pass(CancelInversePairs);
        }

        let mut dag = circuit.to_dag();
        pm.run(&mut dag, &mut properties)
            .map_err(|e| StackError::from_compile(e, kind))?;

        let report = properties.remove::<InstantiationReport>().unwrap_or_default();
        let (initial, outcome) = take_routing(&mut properties)?;
        debug!(
            "instantiation: {} blocks, {} replaced, {} rejected",
            report.blocks, report.replaced, report.rejected
        );
        let quality = if report.rejected > 0 {
            warn!(
                "{} blocks of {} missed fidelity {target_fidelity}",
                report.rejected,
                circuit.name()
            );
            FragmentQuality::BestEffort {
                reason: format!(
                    "{} blocks below target fidelity {target_fidelity}",
                    report.rejected
                ),
                cost: 1.0 - report.worst_fidelity,
            }
        } else {
            FragmentQuality::Converged
        };
        assemble_fragment(
            circuit.name(),
            &dag,
            initial,
            outcome,
            circuit.num_qubits(),
            quality,
        )
    }
}

/// Collapse and re-instantiate single-qubit blocks.
struct ReinstantiateBlocks {
    target_fidelity: f64,
}

fn block_unitary(block: &[Instruction]) -> Option<Unitary2x2> {
    block.iter().try_fold(Unitary2x2::identity(), |acc, inst| {
        if inst.qubits.len() != 1 {
            return None;
        }
        Some(Unitary2x2::from_gate(inst.as_standard_gate()?)? * acc)
    })
}

impl ReinstantiateBlocks {
    fn flush(
        &self,
        block: &mut Vec<Instruction>,
        qubit: QubitId,
        properties: &PropertySet,
        report: &mut InstantiationReport,
        out: &mut Vec<Instruction>,
    ) -> CompileResult<()> {
        if block.len() < 2 {
            out.append(block);
            return Ok(());
        }
        let basis = properties
            .basis_gates
            .as_ref()
            .ok_or(CompileError::MissingBasisGates)?;
        let original = block_unitary(block).unwrap_or_default();
        let (theta, phi, lambda) = original.to_u_params();
        let candidate = synthesize_1q(theta.into(), phi.into(), lambda.into(), qubit, basis)?;
        let fidelity = block_unitary(&candidate).map_or(0.0, |u| u.fidelity(&original));

        report.blocks += 1;
        report.worst_fidelity = report.worst_fidelity.min(fidelity);
        if fidelity < self.target_fidelity {
            report.rejected += 1;
            out.append(block);
        } else if candidate.len() <= block.len() {
            report.replaced += 1;
            out.extend(candidate);
            block.clear();
        } else {
            out.append(block);
        }
        Ok(())
    }
}

impl Pass for ReinstantiateBlocks {
    fn name(&self) -> &str {
        "ReinstantiateBlocks"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()> {
        let mut report = InstantiationReport::default();
        let mut blocks: Vec<Vec<Instruction>> = vec![vec![]; dag.num_qubits() as usize];
        let mut ordered = vec![];
        for (_, inst) in dag.topological_ops() {
            if block_unitary(std::slice::from_ref(inst)).is_some() {
                blocks[inst.qubits[0].index()].push(inst.clone());
                continue;
            }
            for &q in &inst.qubits {
                self.flush(&mut blocks[q.index()], q, properties, &mut report, &mut ordered)?;
            }
            ordered.push(inst.clone());
        }
        for (q, block) in blocks.iter_mut().enumerate() {
            self.flush(block, QubitId(q as u32), properties, &mut report, &mut ordered)?;
        }

        let mut out = CircuitDag::new(dag.num_qubits(), dag.num_clbits());
        for inst in ordered {
            out.apply(inst)?;
        }
        *dag = out;
        properties.insert(report);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rivet_compile::{BasisGates, CouplingMap};

    fn device() -> DeviceConstraints {
        DeviceConstraints::new("ring4", CouplingMap::ring(4), BasisGates::ibm())
    }

    fn rotations() -> Circuit {
        let mut b = Circuit::builder("rot", 2, 0);
        b.h(QubitId(0)).unwrap().t(QubitId(0)).unwrap().h(QubitId(0)).unwrap();
        b.rx(0.7, QubitId(1)).unwrap().ry(0.2, QubitId(1)).unwrap();
        b.cx(QubitId(0), QubitId(1)).unwrap();
        b.build()
    }

    #[test]
    fn test_blocks_shrink() {
        let level0 = StackOptions::new().with_optimization_level(0);
        let plain = crate::stacks::PassManagerStack
            .transpile(&rotations(), &device(), &level0)
            .unwrap();
        let f = InstantiationStack::new()
            .transpile(&rotations(), &device(), &StackOptions::new())
            .unwrap();
        assert!(f.verify().is_ok());
        assert!(f.quality.is_converged());
        assert!(f.circuit.len() < plain.circuit.len());
    }

    #[test]
    fn test_unreachable_target_is_best_effort() {
        let strict = ReinstantiateBlocks {
            target_fidelity: 1.0 + 1e-3,
        };
        let mut props = PropertySet::new().with_target(CouplingMap::linear(1), BasisGates::ibm());
        let mut b = Circuit::builder("c", 1, 0);
        b.h(QubitId(0)).unwrap().t(QubitId(0)).unwrap();
        let mut dag = b.build().to_dag();
        strict.run(&mut dag, &mut props).unwrap();
        let report = props.get::<InstantiationReport>().unwrap();
        assert_eq!(report.rejected, 1);
        assert_eq!(dag.num_ops(), 2);
    }

    #[test]
    fn test_target_out_of_range() {
        let options = StackOptions::new().with_tuning("instantiation.target_fidelity", 1.5);
        assert!(matches!(
            InstantiationStack::new().transpile(&rotations(), &device(), &options),
            Err(StackError::InvalidOptions(_))
        ));
    }
}
