//! Layout and permutation algebra.
//!
//! A [`Layout`] maps virtual qubits to physical qubits of a device and marks
//! the physical qubits used only as routing ancillas. A [`Permutation`] is a
//! bijection on physical positions, produced by SWAP insertion: entry `i`
//! is where the state that started on physical qubit `i` ended up.
//!
//! The two relate through [`Layout::permute`]: routing a circuit that starts
//! in layout `L` and applies permutation `P` ends in `L.permute(&P)`.

use std::collections::{BTreeMap, BTreeSet};

use rivet_ir::{Circuit, QubitId};
use serde::{Deserialize, Serialize};

use crate::error::{CompileError, CompileResult};
use crate::property::CouplingMap;

/// Serialized form of a [`Layout`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LayoutRepr {
    num_physical: u32,
    mapping: Vec<(QubitId, u32)>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    ancillas: Vec<u32>,
}

/// Virtual-to-physical qubit mapping on a device of `num_physical` qubits.
///
/// The mapping is injective, and ancilla positions never coincide with a
/// mapped position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LayoutRepr", into = "LayoutRepr")]
pub struct Layout {
    num_physical: u32,
    virtual_to_physical: BTreeMap<QubitId, u32>,
    physical_to_virtual: BTreeMap<u32, QubitId>,
    ancillas: BTreeSet<u32>,
}

impl TryFrom<LayoutRepr> for Layout {
    type Error = CompileError;

    fn try_from(repr: LayoutRepr) -> CompileResult<Self> {
        let mut layout = Layout::new(repr.num_physical);
        for (virt, phys) in repr.mapping {
            layout.add(virt, phys)?;
        }
        for phys in repr.ancillas {
            layout.mark_ancilla(phys)?;
        }
        Ok(layout)
    }
}

impl From<Layout> for LayoutRepr {
    fn from(layout: Layout) -> Self {
        LayoutRepr {
            num_physical: layout.num_physical,
            mapping: layout.virtual_to_physical.into_iter().collect(),
            ancillas: layout.ancillas.into_iter().collect(),
        }
    }
}

impl Layout {
    /// An empty layout on a device of `num_physical` qubits.
    pub fn new(num_physical: u32) -> Self {
        Self {
            num_physical,
            virtual_to_physical: BTreeMap::new(),
            physical_to_virtual: BTreeMap::new(),
            ancillas: BTreeSet::new(),
        }
    }

    /// Virtual qubit `i` on physical qubit `i`, for `i < num_virtual`.
    pub fn trivial(num_virtual: u32, num_physical: u32) -> CompileResult<Self> {
        if num_virtual > num_physical {
            return Err(CompileError::CircuitTooLarge {
                required: num_virtual,
                available: num_physical,
            });
        }
        Self::from_physical_list(num_physical, &(0..num_virtual).collect::<Vec<_>>())
    }

    /// Virtual qubit `i` on `physical[i]`.
    pub fn from_physical_list(num_physical: u32, physical: &[u32]) -> CompileResult<Self> {
        let mut layout = Self::new(num_physical);
        for (virt, &phys) in physical.iter().enumerate() {
            layout.add(QubitId(virt as u32), phys)?;
        }
        Ok(layout)
    }

    fn check_physical(&self, physical: u32) -> CompileResult<()> {
        if physical >= self.num_physical {
            return Err(CompileError::PhysicalOutOfRange {
                physical,
                num_physical: self.num_physical,
            });
        }
        Ok(())
    }

    /// Map `virt` to `physical`.
    ///
    /// Fails if the physical qubit is out of range, already mapped or an
    /// ancilla, or if `virt` is already mapped.
    pub fn add(&mut self, virt: QubitId, physical: u32) -> CompileResult<()> {
        self.check_physical(physical)?;
        if self.physical_to_virtual.contains_key(&physical) || self.ancillas.contains(&physical) {
            return Err(CompileError::PhysicalOccupied { physical });
        }
        if self.virtual_to_physical.contains_key(&virt) {
            return Err(CompileError::InvalidConfiguration(format!(
                "virtual qubit {virt} is already mapped"
            )));
        }
        self.virtual_to_physical.insert(virt, physical);
        self.physical_to_virtual.insert(physical, virt);
        Ok(())
    }

    /// Mark an unmapped physical qubit as an ancilla.
    pub fn mark_ancilla(&mut self, physical: u32) -> CompileResult<()> {
        self.check_physical(physical)?;
        if self.physical_to_virtual.contains_key(&physical) {
            return Err(CompileError::PhysicalOccupied { physical });
        }
        self.ancillas.insert(physical);
        Ok(())
    }

    /// Device size.
    #[inline]
    pub fn num_physical(&self) -> u32 {
        self.num_physical
    }

    /// Number of mapped virtual qubits.
    pub fn len(&self) -> usize {
        self.virtual_to_physical.len()
    }

    /// Whether no virtual qubit is mapped.
    pub fn is_empty(&self) -> bool {
        self.virtual_to_physical.is_empty()
    }

    /// Physical position of `virt`.
    pub fn get_physical(&self, virt: QubitId) -> Option<u32> {
        self.virtual_to_physical.get(&virt).copied()
    }

    /// Virtual qubit on `physical`.
    pub fn get_virtual(&self, physical: u32) -> Option<QubitId> {
        self.physical_to_virtual.get(&physical).copied()
    }

    /// `(virtual, physical)` pairs in virtual order.
    pub fn iter(&self) -> impl Iterator<Item = (QubitId, u32)> + '_ {
        self.virtual_to_physical.iter().map(|(&v, &p)| (v, p))
    }

    /// Physical positions holding a virtual qubit.
    pub fn mapped_physical(&self) -> BTreeSet<u32> {
        self.physical_to_virtual.keys().copied().collect()
    }

    /// Ancilla positions.
    pub fn ancillas(&self) -> &BTreeSet<u32> {
        &self.ancillas
    }

    /// Whether `physical` holds neither a virtual qubit nor an ancilla.
    pub fn is_free(&self, physical: u32) -> bool {
        physical < self.num_physical
            && !self.physical_to_virtual.contains_key(&physical)
            && !self.ancillas.contains(&physical)
    }

    /// Exchange whatever occupies two physical positions.
    pub fn swap_physical(&mut self, a: u32, b: u32) -> CompileResult<()> {
        self.check_physical(a)?;
        self.check_physical(b)?;
        if a == b {
            return Ok(());
        }
        let va = self.physical_to_virtual.remove(&a);
        let vb = self.physical_to_virtual.remove(&b);
        if let Some(v) = va {
            self.physical_to_virtual.insert(b, v);
            self.virtual_to_physical.insert(v, b);
        }
        if let Some(v) = vb {
            self.physical_to_virtual.insert(a, v);
            self.virtual_to_physical.insert(v, a);
        }
        let anc_a = self.ancillas.remove(&a);
        let anc_b = self.ancillas.remove(&b);
        if anc_a {
            self.ancillas.insert(b);
        }
        if anc_b {
            self.ancillas.insert(a);
        }
        Ok(())
    }

    /// The same mapping without ancilla marks.
    #[must_use]
    pub fn restrict_to_active(&self) -> Self {
        Self {
            ancillas: BTreeSet::new(),
            ..self.clone()
        }
    }

    /// Physical position of each virtual qubit `0..num_virtual`, in order.
    pub fn full_map(&self, num_virtual: u32) -> CompileResult<Vec<u32>> {
        (0..num_virtual)
            .map(|v| {
                let qubit = QubitId(v);
                self.get_physical(qubit)
                    .ok_or(CompileError::UnmappedQubit { qubit })
            })
            .collect()
    }

    /// Move every mapped qubit and ancilla along `permutation`.
    pub fn permute(&self, permutation: &Permutation) -> CompileResult<Self> {
        if permutation.len() != self.num_physical as usize {
            return Err(CompileError::DimensionMismatch {
                expected: self.num_physical as usize,
                got: permutation.len(),
            });
        }
        let mut out = Self::new(self.num_physical);
        for (virt, phys) in self.iter() {
            out.add(virt, permutation.apply(phys))?;
        }
        for &phys in &self.ancillas {
            out.mark_ancilla(permutation.apply(phys))?;
        }
        Ok(out)
    }

    /// `outer ∘ inner`: the physical positions of `inner` are read as the
    /// virtual qubits of `outer`.
    ///
    /// Every position `inner` maps to must be mapped by `outer`. Ancillas of
    /// `inner` carry over where `outer` maps them to a position it leaves
    /// unoccupied.
    pub fn compose(outer: &Layout, inner: &Layout) -> CompileResult<Self> {
        let mut out = Self::new(outer.num_physical);
        for (virt, mid) in inner.iter() {
            let phys = outer
                .get_physical(QubitId(mid))
                .ok_or(CompileError::UnmappedQubit { qubit: QubitId(mid) })?;
            out.add(virt, phys)?;
        }
        let inner_ancillas = inner
            .ancillas
            .iter()
            .filter_map(|&mid| outer.get_physical(QubitId(mid)));
        for phys in outer.ancillas.iter().copied().chain(inner_ancillas) {
            if out.get_virtual(phys).is_none() {
                out.ancillas.insert(phys);
            }
        }
        Ok(out)
    }

    /// Place every virtual qubit `0..num_virtual` that is not yet mapped.
    ///
    /// Positions are chosen in tiers, first match wins:
    /// 1. an existing ancilla adjacent to a mapped qubit,
    /// 2. a free qubit adjacent to a mapped qubit,
    /// 3. any existing ancilla,
    /// 4. any free qubit.
    ///
    /// Within a tier the candidate with most mapped neighbours wins, then
    /// the lowest index. Reused ancillas stop being ancillas.
    pub fn extend_to(&self, num_virtual: u32, coupling_map: &CouplingMap) -> CompileResult<Self> {
        if coupling_map.num_qubits() != self.num_physical {
            return Err(CompileError::DimensionMismatch {
                expected: self.num_physical as usize,
                got: coupling_map.num_qubits() as usize,
            });
        }
        let mut out = self.clone();
        for v in 0..num_virtual {
            let virt = QubitId(v);
            if out.get_physical(virt).is_some() {
                continue;
            }
            let physical = out
                .choose_position(coupling_map)
                .ok_or(CompileError::CircuitTooLarge {
                    required: num_virtual.max(out.len() as u32 + 1),
                    available: self.num_physical,
                })?;
            out.ancillas.remove(&physical);
            out.add(virt, physical)?;
        }
        Ok(out)
    }

    fn choose_position(&self, coupling_map: &CouplingMap) -> Option<u32> {
        let score = |p: u32| {
            coupling_map
                .neighbors(p)
                .iter()
                .filter(|n| self.physical_to_virtual.contains_key(n))
                .count()
        };
        let free: Vec<u32> = (0..self.num_physical).filter(|&p| self.is_free(p)).collect();
        let ancillas: Vec<u32> = self.ancillas.iter().copied().collect();
        let best = |candidates: &[u32], adjacent_only: bool| -> Option<u32> {
            candidates
                .iter()
                .map(|&p| (score(p), p))
                .filter(|&(s, _)| !adjacent_only || s > 0)
                // most mapped neighbours, then lowest index
                .min_by_key(|&(s, p)| (std::cmp::Reverse(s), p))
                .map(|(_, p)| p)
        };
        best(&ancillas, true)
            .or_else(|| best(&free, true))
            .or_else(|| best(&ancillas, false))
            .or_else(|| best(&free, false))
    }
}

/// Bijection on `0..n`: `map[i]` is the image of `i`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<u32>", into = "Vec<u32>")]
pub struct Permutation {
    map: Vec<u32>,
}

impl TryFrom<Vec<u32>> for Permutation {
    type Error = CompileError;

    fn try_from(map: Vec<u32>) -> CompileResult<Self> {
        Permutation::from_vec(map)
    }
}

impl From<Permutation> for Vec<u32> {
    fn from(p: Permutation) -> Self {
        p.map
    }
}

impl Permutation {
    /// Identity on `0..n`.
    pub fn identity(n: u32) -> Self {
        Self { map: (0..n).collect() }
    }

    /// Validate and wrap an image vector.
    pub fn from_vec(map: Vec<u32>) -> CompileResult<Self> {
        let n = map.len();
        let mut seen = vec![false; n];
        for &image in &map {
            let slot = seen.get_mut(image as usize).ok_or_else(|| {
                CompileError::InvalidPermutation(format!("image {image} out of range for size {n}"))
            })?;
            if *slot {
                return Err(CompileError::InvalidPermutation(format!(
                    "image {image} appears twice"
                )));
            }
            *slot = true;
        }
        Ok(Self { map })
    }

    /// The permutation exchanging `a` and `b`.
    pub fn transposition(n: u32, a: u32, b: u32) -> CompileResult<Self> {
        let mut p = Self::identity(n);
        if a >= n || b >= n {
            return Err(CompileError::InvalidPermutation(format!(
                "transposition ({a} {b}) out of range for size {n}"
            )));
        }
        p.map.swap(a as usize, b as usize);
        Ok(p)
    }

    /// Domain size.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the domain is empty.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Image of `i`. Points outside the domain are fixed.
    #[inline]
    pub fn apply(&self, i: u32) -> u32 {
        self.map.get(i as usize).copied().unwrap_or(i)
    }

    /// Images in domain order.
    pub fn as_slice(&self) -> &[u32] {
        &self.map
    }

    /// The inverse bijection.
    #[must_use]
    pub fn inverse(&self) -> Self {
        let mut inv = vec![0; self.map.len()];
        for (i, &image) in self.map.iter().enumerate() {
            inv[image as usize] = i as u32;
        }
        Self { map: inv }
    }

    /// `outer ∘ inner`: apply `inner` first, then `outer`.
    pub fn compose(outer: &Permutation, inner: &Permutation) -> CompileResult<Self> {
        if outer.len() != inner.len() {
            return Err(CompileError::DimensionMismatch {
                expected: inner.len(),
                got: outer.len(),
            });
        }
        Ok(Self {
            map: inner.map.iter().map(|&i| outer.apply(i)).collect(),
        })
    }

    /// Whether every point is fixed.
    pub fn is_identity(&self) -> bool {
        self.map.iter().enumerate().all(|(i, &image)| i as u32 == image)
    }

    /// Follow this permutation with a SWAP of positions `a` and `b`.
    pub fn then_swap(&mut self, a: u32, b: u32) {
        for image in &mut self.map {
            if *image == a {
                *image = b;
            } else if *image == b {
                *image = a;
            }
        }
    }
}

/// Rewrite a circuit's virtual operands to physical indices.
///
/// The result spans the whole device. Fails with
/// [`CompileError::UnmappedQubit`] on the first operand the layout does not
/// cover.
pub fn apply_layout(layout: &Layout, circuit: &Circuit) -> CompileResult<Circuit> {
    circuit.remap_qubits(layout.num_physical(), |qubit| {
        layout
            .get_physical(qubit)
            .map(QubitId)
            .ok_or(CompileError::UnmappedQubit { qubit })
    })
}
