//! Pass manager and preset pipelines.

use std::time::{Duration, Instant};

use tracing::{debug, info, instrument};

use rivet_ir::CircuitDag;

use crate::error::CompileResult;
use crate::pass::{Pass, PassKind};
use crate::passes::{
    BasicRouting, BasisTranslation, CancelInversePairs, DenseLayout, Optimize1qGates, TrivialLayout,
    Unroll3q,
};
use crate::property::{BasisGates, CouplingMap, PropertySet};

/// What the pass manager reports after each pass that ran.
#[derive(Debug)]
pub struct PassEvent<'a> {
    /// Position of the pass in the pipeline.
    pub index: usize,
    /// Pass name.
    pub name: &'a str,
    /// Pass kind.
    pub kind: PassKind,
    /// Wall time spent in the pass.
    pub duration: Duration,
    /// The DAG after the pass.
    pub dag: &'a CircuitDag,
    /// Properties after the pass.
    pub properties: &'a PropertySet,
}

/// An ordered sequence of passes.
#[derive(Default)]
pub struct PassManager {
    passes: Vec<Box<dyn Pass>>,
}

impl PassManager {
    /// An empty pipeline.
    pub fn new() -> Self {
        Self { passes: vec![] }
    }

    /// Append a pass.
    pub fn add_pass(&mut self, pass: impl Pass + 'static) {
        self.passes.push(Box::new(pass));
    }

    /// Names of the passes, in order.
    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Run every pass.
    pub fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()> {
        self.run_with_callback(dag, properties, &mut |_| {})
    }

    /// Run every pass, reporting each one that ran to `callback`.
    #[instrument(skip_all, fields(passes = self.passes.len()))]
    pub fn run_with_callback(
        &self,
        dag: &mut CircuitDag,
        properties: &mut PropertySet,
        callback: &mut dyn FnMut(&PassEvent<'_>),
    ) -> CompileResult<()> {
        info!(
            "Running {} passes on a {}-qubit circuit with {} ops",
            self.passes.len(),
            dag.num_qubits(),
            dag.num_ops()
        );

        for (index, pass) in self.passes.iter().enumerate() {
            if !pass.should_run(dag, properties) {
                debug!("Skipping pass: {}", pass.name());
                continue;
            }
            debug!("Running pass: {}", pass.name());
            let start = Instant::now();
            pass.run(dag, properties)?;
            let duration = start.elapsed();
            debug!("Pass {} completed, ops: {}", pass.name(), dag.num_ops());
            callback(&PassEvent {
                index,
                name: pass.name(),
                kind: pass.kind(),
                duration,
                dag: &*dag,
                properties: &*properties,
            });
        }

        debug!("Pass manager completed, ops: {}", dag.num_ops());
        Ok(())
    }

    /// Number of passes.
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    /// Whether the pipeline is empty.
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }
}

/// How the layout stage places unpinned virtual qubits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayoutMethod {
    /// Virtual `i` on physical `i`.
    #[default]
    Trivial,
    /// The compressor's densest connected region.
    Dense,
}

/// Builds preset pipelines by optimization level.
#[derive(Debug)]
pub struct PassManagerBuilder {
    optimization_level: u8,
    layout_method: Option<LayoutMethod>,
    properties: PropertySet,
}

impl PassManagerBuilder {
    /// Level-1 defaults, no target.
    pub fn new() -> Self {
        Self {
            optimization_level: 1,
            layout_method: None,
            properties: PropertySet::new(),
        }
    }

    /// Set the optimization level.
    ///
    /// - 0: unroll, layout, route, translate
    /// - 1: plus single-qubit fusion
    /// - 2: plus inverse-pair cancellation and dense layout
    /// - 3: plus a second cancellation round after translation
    #[must_use]
    pub fn with_optimization_level(mut self, level: u8) -> Self {
        self.optimization_level = level.min(3);
        self
    }

    /// Override the level's layout method.
    #[must_use]
    pub fn with_layout_method(mut self, method: LayoutMethod) -> Self {
        self.layout_method = Some(method);
        self
    }

    /// Use these properties (target, pinned layout).
    #[must_use]
    pub fn with_properties(mut self, properties: PropertySet) -> Self {
        self.properties = properties;
        self
    }

    /// Set coupling map and basis.
    #[must_use]
    pub fn with_target(mut self, coupling_map: CouplingMap, basis_gates: BasisGates) -> Self {
        self.properties.coupling_map = Some(coupling_map);
        self.properties.basis_gates = Some(basis_gates);
        self
    }

    /// Build the pipeline and hand back the properties it should run with.
    pub fn build(self) -> (PassManager, PropertySet) {
        let level = self.optimization_level;
        let mut pm = PassManager::new();
        let has_coupling = self.properties.coupling_map.is_some();
        let has_basis = self.properties.basis_gates.is_some();

        if has_coupling || has_basis {
            pm.add_pass(Unroll3q);
        }
        if has_coupling {
            let method = self.layout_method.unwrap_or(if level >= 2 {
                LayoutMethod::Dense
            } else {
                LayoutMethod::Trivial
            });
            match method {
                LayoutMethod::Trivial => pm.add_pass(TrivialLayout),
                LayoutMethod::Dense => pm.add_pass(DenseLayout),
            }
            pm.add_pass(BasicRouting);
        }
        if level >= 2 {
            pm.add_pass(CancelInversePairs);
        }
        if has_basis {
            pm.add_pass(BasisTranslation);
        }
        if level >= 1 {
            pm.add_pass(Optimize1qGates);
        }
        if level >= 3 {
            pm.add_pass(CancelInversePairs);
        }

        (pm, self.properties)
    }
}

impl Default for PassManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rivet_ir::{Circuit, QubitId};

    #[test]
    fn test_empty_pass_manager() {
        let pm = PassManager::new();
        assert!(pm.is_empty());
        let mut b = Circuit::builder("t", 2, 0);
        b.h(QubitId(0)).unwrap().cx(QubitId(0), QubitId(1)).unwrap();
        let mut dag = b.build().to_dag();
        pm.run(&mut dag, &mut PropertySet::new()).unwrap();
        assert_eq!(dag.num_ops(), 2);
    }

    #[test]
    fn test_level_presets() {
        let names = |level| {
            let (pm, _) = PassManagerBuilder::new()
                .with_optimization_level(level)
                .with_target(CouplingMap::linear(3), BasisGates::ibm())
                .build();
            pm.pass_names().into_iter().map(String::from).collect::<Vec<_>>()
        };
        assert_eq!(
            names(0),
            ["Unroll3q", "TrivialLayout", "BasicRouting", "BasisTranslation"]
        );
        assert!(names(1).contains(&"Optimize1qGates".to_string()));
        assert!(names(2).contains(&"DenseLayout".to_string()));
        assert_eq!(
            names(3).iter().filter(|n| *n == "CancelInversePairs").count(),
            2
        );
    }

    #[test]
    fn test_callback_sees_every_pass() {
        let (pm, mut props) = PassManagerBuilder::new()
            .with_target(CouplingMap::linear(3), BasisGates::ibm())
            .build();
        let mut b = Circuit::builder("t", 3, 0);
        b.h(QubitId(0)).unwrap().cx(QubitId(0), QubitId(2)).unwrap();
        b.ccx(QubitId(0), QubitId(1), QubitId(2)).unwrap();
        let mut dag = b.build().to_dag();
        let mut seen = vec![];
        pm.run_with_callback(&mut dag, &mut props, &mut |event| {
            seen.push((event.index, event.name.to_string()));
        })
        .unwrap();
        assert_eq!(seen.len(), pm.len());
        assert_eq!(seen[0], (0, "Unroll3q".to_string()));
    }
}
