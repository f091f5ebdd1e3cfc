//! Fragment stitching.
//!
//! ```text
//!   chain     c0 ──► F0 ─┬─► pin F0.final ──► c1 ──► F1 ─┬─► ...
//!                        └──────────── append ───────────┘
//!
//!   right     base ──► pin base.final ──► extra ──► append(base, extra)
//!
//!   left      extra⁻¹ ──► pin base.initial ──► R ──► reverse(R) ──► append(R⁻¹, base)
//!
//!   compress  device ──► densest k-qubit region ──► transpile ──► lift back to device
//! ```
//!
//! Every stack call goes through the cache when the stitcher has one. The
//! key is the deep structural hash of the circuit handed to the stack, the
//! device identity, the stack and the full option set (pins included).

use std::collections::BTreeSet;

use tracing::{debug, info, instrument};

use rivet_compile::passes::translate_instruction;
use rivet_compile::{CompileError, Compression, Layout, Permutation, compress};
use rivet_ir::{Circuit, Instruction, QubitId};
use rivet_stack::{
    DeviceConstraints, FragmentQuality, StackError, StackKind, StackOptions, StackRegistry,
    TranspiledFragment,
};

use crate::cache::{CacheKey, FragmentCache};
use crate::config::TranspilerConfig;
use crate::error::{TranspileError, TranspileResult};
use crate::hash::{CircuitHasher, HashMode};

/// Composes stack calls into one physically consistent fragment.
///
/// A stitcher borrows its cache; several stitchers, on several threads,
/// may share one.
#[derive(Debug, Clone)]
pub struct Stitcher<'c> {
    registry: StackRegistry,
    cache: Option<&'c FragmentCache>,
    hasher: CircuitHasher,
    stack: StackKind,
}

impl Stitcher<'static> {
    /// A stitcher that never caches.
    pub fn uncached() -> Self {
        Self {
            registry: StackRegistry::with_builtins(),
            cache: None,
            hasher: CircuitHasher::default(),
            stack: StackKind::default(),
        }
    }
}

impl<'c> Stitcher<'c> {
    /// Built-in stacks, default hasher, pass-manager stack, backed by `cache`.
    pub fn new(cache: &'c FragmentCache) -> Self {
        Self {
            cache: Some(cache),
            ..Stitcher::uncached()
        }
    }

    /// Stack and hashing rules from `config`.
    pub fn from_config(config: &TranspilerConfig, cache: Option<&'c FragmentCache>) -> Self {
        Self {
            registry: StackRegistry::with_builtins(),
            cache,
            hasher: CircuitHasher::new(config.hash.cancellation.clone()),
            stack: config.stack,
        }
    }

    /// Use another stack registry.
    #[must_use]
    pub fn with_registry(mut self, registry: StackRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Select the stack.
    #[must_use]
    pub fn with_stack(mut self, stack: StackKind) -> Self {
        self.stack = stack;
        self
    }

    /// Use another hasher for cache keys.
    #[must_use]
    pub fn with_hasher(mut self, hasher: CircuitHasher) -> Self {
        self.hasher = hasher;
        self
    }

    /// The selected stack.
    pub fn stack(&self) -> StackKind {
        self.stack
    }

    /// The cache, if any.
    pub fn cache(&self) -> Option<&'c FragmentCache> {
        self.cache
    }

    /// One stack call, through the cache.
    pub fn transpile(
        &self,
        circuit: &Circuit,
        device: &DeviceConstraints,
        options: &StackOptions,
    ) -> TranspileResult<TranspiledFragment> {
        self.run_stage("transpile", circuit, device, options)
    }

    fn run_stage(
        &self,
        stage: &str,
        circuit: &Circuit,
        device: &DeviceConstraints,
        options: &StackOptions,
    ) -> TranspileResult<TranspiledFragment> {
        let kind = self.stack;
        let stack = self
            .registry
            .get(kind)
            .map_err(|e| TranspileError::stage(stage, kind, e))?;
        let compute = || {
            stack
                .transpile(circuit, device, options)
                .map_err(|e| TranspileError::stage(stage, kind, e))
        };
        let Some(cache) = self.cache else {
            return compute();
        };
        let hash = self.hasher.hash(circuit, HashMode::Deep)?;
        let key = CacheKey::new(hash, device, kind, options)?;
        let fragment = cache.get_or_compute(&key, compute)?;
        Ok(fragment.as_ref().clone())
    }

    /// Transpile `circuits` in sequence, each pinned to where the previous
    /// one left every virtual qubit.
    ///
    /// The first circuit is placed freely (or by `options.initial_layout`).
    /// Virtual qubits that appear later are placed on ancillas of earlier
    /// links first, then on unused qubits.
    #[instrument(
        skip_all,
        fields(stack = %self.stack, device = %device.name, links = circuits.len())
    )]
    pub fn transpile_chain(
        &self,
        circuits: &[Circuit],
        device: &DeviceConstraints,
        options: &StackOptions,
    ) -> TranspileResult<TranspiledFragment> {
        let (first, rest) = circuits.split_first().ok_or(TranspileError::EmptyChain)?;
        info!("Chaining {} circuits on {}", circuits.len(), device.name);

        let mut chained = self.run_stage("chain[0]", first, device, options)?;
        for (i, circuit) in rest.iter().enumerate() {
            let stage = format!("chain[{}]", i + 1);
            let link = self.run_stage(&stage, circuit, device, &pinned(options, &chained))?;
            chained = append(&chained, &link)?;
            debug!("{stage}: {} ops so far", chained.circuit.len());
        }
        info!(
            "Chain complete: {} ops, {} physical qubits touched",
            chained.circuit.len(),
            chained.circuit.used_qubits().len()
        );
        Ok(chained)
    }

    /// Append `extra` after `base` without recompiling `base`.
    #[instrument(skip_all, fields(stack = %self.stack, device = %device.name))]
    pub fn transpile_right(
        &self,
        base: &TranspiledFragment,
        extra: &Circuit,
        device: &DeviceConstraints,
        options: &StackOptions,
    ) -> TranspileResult<TranspiledFragment> {
        let suffix = self.run_stage("right", extra, device, &pinned(options, base))?;
        let stitched = append(base, &suffix)?;
        info!(
            "Appended '{}' ({} ops) to '{}'",
            extra.name(),
            suffix.circuit.len(),
            base.circuit.name()
        );
        Ok(stitched)
    }

    /// Prepend `extra` before `base` without recompiling `base`.
    ///
    /// The prefix must end where `base` starts. No stack compiles towards a
    /// final layout, so the inverse of `extra` is compiled from
    /// `base.initial_layout` instead and the physical result is inverted
    /// back. Inversion can leave gates outside the basis (`sx` becomes
    /// `sxdg`); those are translated again. `extra` must be unitary.
    #[instrument(skip_all, fields(stack = %self.stack, device = %device.name))]
    pub fn transpile_left(
        &self,
        extra: &Circuit,
        base: &TranspiledFragment,
        device: &DeviceConstraints,
        options: &StackOptions,
    ) -> TranspileResult<TranspiledFragment> {
        let reversed = extra.inverse()?;
        let mut pins = options.clone();
        pins.initial_layout = Some(base.initial_layout.clone());
        let compiled = self.run_stage("left", &reversed, device, &pins)?;

        let basis = options.basis_gates.as_ref().unwrap_or(&device.basis_gates);
        let kind = self.stack;
        let prefix = reverse_fragment(&compiled, extra.name(), |inst| {
            translate_instruction(inst, basis).map_err(|e| {
                TranspileError::stage("left", kind, StackError::from_compile(e, kind))
            })
        })?;
        let stitched = append(&prefix, base)?;
        info!(
            "Prepended '{}' ({} ops) to '{}'",
            extra.name(),
            prefix.circuit.len(),
            base.circuit.name()
        );
        Ok(stitched)
    }

    /// Transpile onto the densest connected region of exactly
    /// `circuit.num_qubits()` device qubits.
    ///
    /// The fragment spans the whole device but touches only the region.
    /// Pinned positions must lie inside the region.
    #[instrument(skip_all, fields(stack = %self.stack, device = %device.name))]
    pub fn transpile_and_compress(
        &self,
        circuit: &Circuit,
        device: &DeviceConstraints,
        options: &StackOptions,
    ) -> TranspileResult<TranspiledFragment> {
        let region = compress(&device.coupling_map, circuit.num_qubits())?;
        let names: Vec<String> = region.selected.iter().map(u32::to_string).collect();
        let reduced = device.with_coupling_map(
            format!("{}[{}]", device.name, names.join(",")),
            region.coupling_map.clone(),
        );
        info!(
            "Compressed {} from {} to {} qubits: {:?}",
            device.name,
            device.num_qubits(),
            region.len(),
            region.selected
        );

        let mut local = options.clone();
        if let Some(pins) = &options.initial_layout {
            local.initial_layout = Some(into_region(pins, &region)?);
        }
        let fragment = self.run_stage("compress", circuit, &reduced, &local)?;
        lift_fragment(&fragment, &region)
    }
}

fn pinned(options: &StackOptions, base: &TranspiledFragment) -> StackOptions {
    let mut options = options.clone();
    options.initial_layout = Some(base.final_layout.clone());
    options
}

/// `first` followed by `second` as one fragment.
///
/// Every virtual qubit `first` ends with must start `second` on the same
/// physical qubit, or be absent from `second` and sit on a position
/// `second` does not start with. Virtual qubits new in `second` are traced
/// back through `first`'s permutation to their starting position.
pub fn append(
    first: &TranspiledFragment,
    second: &TranspiledFragment,
) -> TranspileResult<TranspiledFragment> {
    let n = first.num_physical();
    if second.num_physical() != n {
        return Err(CompileError::DimensionMismatch {
            expected: n as usize,
            got: second.num_physical() as usize,
        }
        .into());
    }
    for (virt, physical) in first.final_layout.iter() {
        match second.initial_layout.get_physical(virt) {
            Some(p) if p == physical => {}
            None if second.initial_layout.get_virtual(physical).is_none() => {}
            got => {
                return Err(TranspileError::LinkMismatch {
                    qubit: virt,
                    expected: physical,
                    got,
                });
            }
        }
    }

    let back = first.permutation.inverse();
    let mut initial = first.initial_layout.restrict_to_active();
    for (virt, physical) in second.initial_layout.iter() {
        if first.final_layout.get_physical(virt).is_none() {
            initial.add(virt, back.apply(physical))?;
        }
    }

    let num_clbits = first.circuit.num_clbits().max(second.circuit.num_clbits());
    let circuit = first
        .circuit
        .widen(n, num_clbits)?
        .compose(&second.circuit)?;
    let ancillas: BTreeSet<u32> = first
        .initial_layout
        .ancillas()
        .iter()
        .copied()
        .chain(second.initial_layout.ancillas().iter().map(|&p| back.apply(p)))
        .chain(circuit.used_qubits().into_iter().map(|q| q.0))
        .collect();
    for physical in ancillas {
        if initial.is_free(physical) {
            initial.mark_ancilla(physical)?;
        }
    }

    let permutation = Permutation::compose(&second.permutation, &first.permutation)?;
    let final_layout = initial.permute(&permutation)?;
    for (virt, physical) in second.final_layout.iter() {
        let got = final_layout.get_physical(virt);
        if got != Some(physical) {
            return Err(TranspileError::LinkMismatch {
                qubit: virt,
                expected: physical,
                got,
            });
        }
    }

    let fragment = TranspiledFragment {
        circuit,
        initial_layout: initial,
        final_layout,
        permutation,
        num_virtual: first.num_virtual.max(second.num_virtual),
        quality: merge_quality(&first.quality, &second.quality),
    };
    fragment.verify()?;
    Ok(fragment)
}

fn merge_quality(a: &FragmentQuality, b: &FragmentQuality) -> FragmentQuality {
    match (a, b) {
        (FragmentQuality::Converged, FragmentQuality::Converged) => FragmentQuality::Converged,
        (q @ FragmentQuality::BestEffort { .. }, FragmentQuality::Converged)
        | (FragmentQuality::Converged, q @ FragmentQuality::BestEffort { .. }) => q.clone(),
        (
            FragmentQuality::BestEffort { reason: ra, cost: ca },
            FragmentQuality::BestEffort { reason: rb, cost: cb },
        ) => FragmentQuality::BestEffort {
            reason: format!("{ra}; {rb}"),
            cost: ca + cb,
        },
    }
}

/// The time reversal of a fragment: inverted circuit, swapped layouts,
/// inverse permutation. `fix` rewrites each inverted instruction.
fn reverse_fragment(
    fragment: &TranspiledFragment,
    name: &str,
    mut fix: impl FnMut(&Instruction) -> TranspileResult<Vec<Instruction>>,
) -> TranspileResult<TranspiledFragment> {
    let inverted = fragment.circuit.inverse()?;
    let mut instructions = Vec::with_capacity(inverted.len());
    for inst in inverted.instructions() {
        instructions.extend(fix(inst)?);
    }
    let reversed = TranspiledFragment {
        circuit: Circuit::new(
            name,
            inverted.num_qubits(),
            inverted.num_clbits(),
            instructions,
        )?,
        initial_layout: fragment.final_layout.clone(),
        final_layout: fragment.initial_layout.clone(),
        permutation: fragment.permutation.inverse(),
        num_virtual: fragment.num_virtual,
        quality: fragment.quality.clone(),
    };
    reversed.verify()?;
    Ok(reversed)
}

/// Pins on the device, re-expressed on the region.
fn into_region(pins: &Layout, region: &Compression) -> TranspileResult<Layout> {
    let mut local = Layout::new(region.len() as u32);
    for (virt, physical) in pins.iter() {
        let index = region.from_device(physical).ok_or_else(|| {
            StackError::InvalidOptions(format!(
                "{virt} is pinned to physical {physical}, outside the compressed region {:?}",
                region.selected
            ))
        })?;
        local.add(virt, index)?;
    }
    for &physical in pins.ancillas() {
        if let Some(index) = region.from_device(physical) {
            local.mark_ancilla(index)?;
        }
    }
    Ok(local)
}

fn lift_layout(layout: &Layout, region: &Compression) -> TranspileResult<Layout> {
    let to_device = |index: u32| {
        region
            .to_device(index)
            .ok_or(CompileError::UnmappedQubit { qubit: QubitId(index) })
    };
    let mut lifted = Layout::new(region.device_size());
    for (virt, index) in layout.iter() {
        lifted.add(virt, to_device(index)?)?;
    }
    for &index in layout.ancillas() {
        lifted.mark_ancilla(to_device(index)?)?;
    }
    Ok(lifted)
}

/// A fragment compiled on a region, expressed on the whole device.
fn lift_fragment(
    fragment: &TranspiledFragment,
    region: &Compression,
) -> TranspileResult<TranspiledFragment> {
    let size = region.device_size();
    let circuit = fragment.circuit.remap_qubits(size, |q| {
        region
            .to_device(q.0)
            .map(QubitId)
            .ok_or(CompileError::UnmappedQubit { qubit: q })
    })?;
    let mut map: Vec<u32> = (0..size).collect();
    for (index, &physical) in region.selected.iter().enumerate() {
        let target = fragment.permutation.apply(index as u32) as usize;
        map[physical as usize] = region.selected[target];
    }
    let lifted = TranspiledFragment {
        circuit,
        initial_layout: lift_layout(&fragment.initial_layout, region)?,
        final_layout: lift_layout(&fragment.final_layout, region)?,
        permutation: Permutation::from_vec(map)?,
        num_virtual: fragment.num_virtual,
        quality: fragment.quality.clone(),
    };
    lifted.verify()?;
    Ok(lifted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rivet_compile::{BasisGates, CouplingMap};

    fn device(n: u32) -> DeviceConstraints {
        DeviceConstraints::new("line", CouplingMap::linear(n), BasisGates::ibm())
    }

    fn bell() -> Circuit {
        let mut b = Circuit::builder("bell", 2, 0);
        b.h(QubitId(0)).unwrap().cx(QubitId(0), QubitId(1)).unwrap();
        b.build()
    }

    fn far_pair() -> Circuit {
        let mut b = Circuit::builder("far", 3, 0);
        b.cx(QubitId(0), QubitId(2)).unwrap();
        b.build()
    }

    #[test]
    fn test_right_pins_the_base() {
        let stitcher = Stitcher::uncached();
        let dev = device(4);
        let options = StackOptions::new();
        let base = stitcher.transpile(&far_pair(), &dev, &options).unwrap();
        let stitched = stitcher.transpile_right(&base, &bell(), &dev, &options).unwrap();
        assert_eq!(
            stitched.initial_layout.restrict_to_active(),
            base.initial_layout.restrict_to_active()
        );
        assert_eq!(stitched.num_virtual, 3);
        assert!(stitched.circuit.len() > base.circuit.len());
    }

    #[test]
    fn test_left_ends_where_base_starts() {
        let stitcher = Stitcher::uncached();
        let dev = device(4);
        let options = StackOptions::new();
        let base = stitcher.transpile(&bell(), &dev, &options).unwrap();
        let stitched = stitcher.transpile_left(&far_pair(), &base, &dev, &options).unwrap();
        assert_eq!(stitched.full_map().unwrap().len(), 3);
        for inst in stitched.circuit.instructions() {
            assert!(dev.basis_gates.contains(inst.name()), "{}", inst.name());
        }
        // the base is the tail of the stitched circuit
        let tail = &stitched.circuit.instructions()[stitched.circuit.len() - base.circuit.len()..];
        assert_eq!(tail, base.circuit.instructions());
    }

    #[test]
    fn test_left_rejects_measurements() {
        let stitcher = Stitcher::uncached();
        let dev = device(3);
        let base = stitcher.transpile(&bell(), &dev, &StackOptions::new()).unwrap();
        let mut b = Circuit::builder("m", 1, 1);
        b.measure(QubitId(0), rivet_ir::ClbitId(0)).unwrap();
        assert!(matches!(
            stitcher.transpile_left(&b.build(), &base, &dev, &StackOptions::new()),
            Err(TranspileError::Ir(_))
        ));
    }

    #[test]
    fn test_append_detects_moved_qubit() {
        let stitcher = Stitcher::uncached();
        let dev = device(3);
        let first = stitcher.transpile(&bell(), &dev, &StackOptions::new()).unwrap();
        let mut pins = Layout::new(3);
        pins.add(QubitId(0), first.final_layout.get_physical(QubitId(1)).unwrap()).unwrap();
        pins.add(QubitId(1), first.final_layout.get_physical(QubitId(0)).unwrap()).unwrap();
        let second = stitcher
            .transpile(&bell(), &dev, &StackOptions::new().with_initial_layout(pins))
            .unwrap();
        assert!(matches!(
            append(&first, &second),
            Err(TranspileError::LinkMismatch { .. })
        ));
    }

    #[test]
    fn test_compress_stays_in_region() {
        let dev = DeviceConstraints::new("grid", CouplingMap::grid(3, 3), BasisGates::ibm());
        let fragment = Stitcher::uncached()
            .transpile_and_compress(&far_pair(), &dev, &StackOptions::new())
            .unwrap();
        let region = compress(&dev.coupling_map, 3).unwrap();
        assert_eq!(fragment.num_physical(), 9);
        for q in fragment.circuit.used_qubits() {
            assert!(region.selected.contains(&q.0));
        }
        for physical in fragment.full_map().unwrap() {
            assert!(region.selected.contains(&physical));
        }
    }

    #[test]
    fn test_compress_rejects_pins_outside_region() {
        let dev = DeviceConstraints::new("grid", CouplingMap::grid(3, 3), BasisGates::ibm());
        let region = compress(&dev.coupling_map, 3).unwrap();
        let outside = (0..9).find(|p| !region.selected.contains(p)).unwrap();
        let mut pins = Layout::new(9);
        pins.add(QubitId(0), outside).unwrap();
        assert!(matches!(
            Stitcher::uncached().transpile_and_compress(
                &far_pair(),
                &dev,
                &StackOptions::new().with_initial_layout(pins)
            ),
            Err(TranspileError::Stack(StackError::InvalidOptions(_)))
        ));
    }

    #[test]
    fn test_empty_chain() {
        assert_eq!(
            Stitcher::uncached().transpile_chain(&[], &device(2), &StackOptions::new()),
            Err(TranspileError::EmptyChain)
        );
    }

    #[test]
    fn test_best_effort_is_merged() {
        let a = FragmentQuality::BestEffort {
            reason: "a".into(),
            cost: 1.0,
        };
        let b = FragmentQuality::BestEffort {
            reason: "b".into(),
            cost: 2.0,
        };
        assert_eq!(
            merge_quality(&a, &b),
            FragmentQuality::BestEffort {
                reason: "a; b".into(),
                cost: 3.0
            }
        );
        assert_eq!(merge_quality(&FragmentQuality::Converged, &a), a);
    }
}
