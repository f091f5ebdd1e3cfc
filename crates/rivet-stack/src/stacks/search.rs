//! Budgeted beam search over SWAP sequences.
//!
//! Gates are routed in topological order. When a two-qubit gate acts on
//! non-adjacent qubits, a beam of candidate layouts is grown one SWAP at a
//! time until one makes the gate adjacent. Candidates are scored by the
//! distance of the blocked gate plus a discounted lookahead over the next
//! few two-qubit gates; ties are broken by a seeded RNG. Every scored
//! candidate costs one unit of budget. When the budget runs out the router
//! falls back to shortest-path SWAPs and the fragment is marked best-effort.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, warn};

use rivet_compile::passes::{
    BasisTranslation, CancelInversePairs, DenseLayout, Optimize1qGates, Unroll3q,
};
use rivet_compile::{
    CompileError, CompileResult, CouplingMap, Layout, Pass, PassKind, PassManager, PropertySet,
    Router,
};
use rivet_ir::{Circuit, CircuitDag, Instruction, QubitId};

use super::{prepare, take_routing};
use crate::device::DeviceConstraints;
use crate::error::{StackError, StackResult};
use crate::fragment::{FragmentQuality, TranspiledFragment};
use crate::options::StackOptions;
use crate::stack::{Stack, StackKind, assemble_fragment, basis_for};

/// Default number of scored candidates per transpile call.
pub const DEFAULT_BUDGET: u64 = 2000;
/// Default number of candidates kept per search level.
pub const DEFAULT_BEAM_WIDTH: usize = 4;

const LOOKAHEAD: usize = 4;
const LOOKAHEAD_WEIGHT: f64 = 0.5;

/// How the search went.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SearchReport {
    /// Candidates scored.
    pub expansions: u64,
    /// Gates routed by the shortest-path fallback.
    pub fallbacks: usize,
}

/// SWAP search with a seeded tie-breaker and an expansion budget.
///
/// Tuning keys: `search.budget`, `search.beam_width`.
#[derive(Debug, Clone, Copy)]
pub struct SearchStack {
    budget: u64,
    beam_width: usize,
}

impl SearchStack {
    /// Default budget and beam width.
    pub fn new() -> Self {
        Self {
            budget: DEFAULT_BUDGET,
            beam_width: DEFAULT_BEAM_WIDTH,
        }
    }

    /// Set the expansion budget.
    #[must_use]
    pub fn with_budget(mut self, budget: u64) -> Self {
        self.budget = budget;
        self
    }

    /// Set the beam width.
    #[must_use]
    pub fn with_beam_width(mut self, beam_width: usize) -> Self {
        self.beam_width = beam_width;
        self
    }

    fn settings(&self, options: &StackOptions) -> StackResult<(u64, usize)> {
        let budget = options.tuning_u64("search.budget")?.unwrap_or(self.budget);
        let beam_width = options
            .tuning_u64("search.beam_width")?
            .map_or(self.beam_width, |w| w as usize);
        if beam_width == 0 {
            return Err(StackError::InvalidOptions("search.beam_width must be positive".into()));
        }
        Ok((budget, beam_width))
    }
}

impl Default for SearchStack {
    fn default() -> Self {
        Self::new()
    }
}

impl Stack for SearchStack {
    fn kind(&self) -> StackKind {
        StackKind::Search
    }

    fn transpile(
        &self,
        circuit: &Circuit,
        device: &DeviceConstraints,
        options: &StackOptions,
    ) -> StackResult<TranspiledFragment> {
        let kind = self.kind();
        prepare(options, kind)?;
        let (budget, beam_width) = self.settings(options)?;

        let mut properties = PropertySet::new()
            .with_target(device.coupling_map.clone(), basis_for(device, options).clone());
        properties.layout = options.initial_layout.clone();

        let level = options.optimization_level;
        let mut pm = PassManager::new();
        pm.add_pass(Unroll3q);
        pm.add_pass(DenseLayout);
        pm.add_pass(SearchRouting {
            budget,
            beam_width,
            seed: options.seed,
        });
        if level >= 2 {
            pm.add_pass(CancelInversePairs);
        }
        pm.add_pass(BasisTranslation);
        if level >= 1 {
            pm.add_pass(Optimize1qGates);
        }
        if level >= 3 {
            pm.add_pass(CancelInversePairs);
        }

        let mut dag = circuit.to_dag();
        pm.run(&mut dag, &mut properties)
            .map_err(|e| StackError::from_compile(e, kind))?;

        let report = properties.remove::<SearchReport>().unwrap_or_default();
        let (initial, outcome) = take_routing(&mut properties)?;
        debug!(
            "search: {} expansions, {} swaps, {} fallbacks",
            report.expansions, outcome.swaps, report.fallbacks
        );
        let quality = if report.fallbacks > 0 {
            warn!(
                "Search budget of {budget} exhausted on {}, {} gates routed by fallback",
                circuit.name(),
                report.fallbacks
            );
            FragmentQuality::BestEffort {
                reason: format!("search budget of {budget} expansions exhausted"),
                cost: outcome.swaps as f64,
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

/// Routing pass driving the beam search.
struct SearchRouting {
    budget: u64,
    beam_width: usize,
    seed: u64,
}

#[derive(Clone)]
struct Candidate {
    layout: Layout,
    swaps: Vec<(u32, u32)>,
}

fn position(layout: &Layout, qubit: QubitId) -> CompileResult<u32> {
    layout
        .get_physical(qubit)
        .ok_or(CompileError::UnmappedQubit { qubit })
}

fn pair_distance(layout: &Layout, cm: &CouplingMap, a: QubitId, b: QubitId) -> f64 {
    match (layout.get_physical(a), layout.get_physical(b)) {
        (Some(pa), Some(pb)) => cm.distance(pa, pb).map_or(f64::INFINITY, f64::from),
        _ => f64::INFINITY,
    }
}

fn score(
    layout: &Layout,
    cm: &CouplingMap,
    gate: (QubitId, QubitId),
    upcoming: &[(QubitId, QubitId)],
) -> f64 {
    let primary = pair_distance(layout, cm, gate.0, gate.1);
    if upcoming.is_empty() {
        return primary;
    }
    let ahead: f64 = upcoming
        .iter()
        .map(|&(a, b)| pair_distance(layout, cm, a, b))
        .sum();
    primary + LOOKAHEAD_WEIGHT * ahead / upcoming.len() as f64
}

impl SearchRouting {
    /// SWAPs that make `gate` adjacent, or `None` once the budget is spent.
    fn search(
        &self,
        start: &Layout,
        cm: &CouplingMap,
        gate: (QubitId, QubitId),
        upcoming: &[(QubitId, QubitId)],
        budget: &mut u64,
        rng: &mut StdRng,
    ) -> CompileResult<Option<Vec<(u32, u32)>>> {
        let mut beam = vec![Candidate {
            layout: start.clone(),
            swaps: vec![],
        }];
        loop {
            let mut children: Vec<(f64, Candidate)> = vec![];
            for candidate in &beam {
                let pa = position(&candidate.layout, gate.0)?;
                let pb = position(&candidate.layout, gate.1)?;
                let last = candidate.swaps.last().copied();
                for &p in &[pa, pb] {
                    for &n in cm.neighbors(p) {
                        let swap = (p.min(n), p.max(n));
                        if Some(swap) == last {
                            continue;
                        }
                        if *budget == 0 {
                            return Ok(None);
                        }
                        *budget -= 1;
                        let mut layout = candidate.layout.clone();
                        layout.swap_physical(swap.0, swap.1)?;
                        let mut swaps = candidate.swaps.clone();
                        swaps.push(swap);
                        let cost = score(&layout, cm, gate, upcoming);
                        children.push((cost, Candidate { layout, swaps }));
                    }
                }
            }
            if children.is_empty() {
                return Ok(None);
            }
            // shuffle first: the stable sort keeps ties in seeded order
            children.shuffle(rng);
            children.sort_by(|x, y| x.0.total_cmp(&y.0));
            let done = children
                .iter()
                .find(|(_, c)| pair_distance(&c.layout, cm, gate.0, gate.1) <= 1.0);
            if let Some((_, winner)) = done {
                return Ok(Some(winner.swaps.clone()));
            }
            children.truncate(self.beam_width);
            beam = children.into_iter().map(|(_, c)| c).collect();
        }
    }
}

fn as_pair(instruction: &Instruction) -> Option<(QubitId, QubitId)> {
    match instruction.qubits.as_slice() {
        [a, b] if instruction.is_gate() => Some((*a, *b)),
        _ => None,
    }
}

impl Pass for SearchRouting {
    fn name(&self) -> &str {
        "SearchRouting"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()> {
        let coupling_map = properties
            .coupling_map
            .as_ref()
            .ok_or(CompileError::MissingCouplingMap)?;
        let layout = properties.layout.as_ref().ok_or(CompileError::MissingLayout)?;

        let ops: Vec<Instruction> = dag
            .topological_ops()
            .into_iter()
            .map(|(_, inst)| inst.clone())
            .collect();
        let pairs: Vec<(usize, (QubitId, QubitId))> = ops
            .iter()
            .enumerate()
            .filter_map(|(i, inst)| as_pair(inst).map(|p| (i, p)))
            .collect();

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut budget = self.budget;
        let mut report = SearchReport::default();
        let mut router = Router::new(coupling_map, layout, dag.num_clbits())?;
        let mut next_pair = 0;

        for (i, inst) in ops.iter().enumerate() {
            if let Some((a, b)) = as_pair(inst) {
                next_pair += 1;
                let (pa, pb) = (router.physical(a)?, router.physical(b)?);
                if coupling_map.distance(pa, pb).is_none() {
                    return Err(CompileError::RoutingFailed { qubit1: pa, qubit2: pb });
                }
                if !coupling_map.is_connected(pa, pb) {
                    let upcoming: Vec<_> = pairs[next_pair..]
                        .iter()
                        .take(LOOKAHEAD)
                        .map(|&(_, p)| p)
                        .collect();
                    let before = budget;
                    let found = self.search(
                        router.layout(),
                        coupling_map,
                        (a, b),
                        &upcoming,
                        &mut budget,
                        &mut rng,
                    )?;
                    report.expansions += before - budget;
                    match found {
                        Some(swaps) => {
                            for (p, q) in swaps {
                                router.swap(p, q)?;
                            }
                        }
                        None => {
                            debug!("Search exhausted at op {i}, falling back to shortest path");
                            report.fallbacks += 1;
                            router.bring_adjacent(a, b)?;
                        }
                    }
                }
            }
            router.emit(inst)?;
        }

        let (routed, outcome) = router.finish();
        *dag = routed;
        properties.insert(outcome);
        properties.insert(report);
        Ok(())
    }
}
