//! Rivet compilation passes.
//!
//! A pass-based pipeline that maps a virtual circuit onto a device:
//!
//! 1. **Unroll**: three-qubit gates become one- and two-qubit gates
//! 2. **Layout**: pick a physical qubit for every virtual qubit
//! 3. **Routing**: insert SWAPs so every two-qubit gate acts on a coupled pair
//! 4. **Translation**: rewrite gates into the device's native basis
//! 5. **Optimization**: fuse single-qubit runs and cancel inverse pairs
//!
//! ```text
//! Circuit ── to_dag ──► PassManager ◄── PropertySet (coupling map, basis, layout)
//!                          │
//!                          ├── Unroll3q
//!                          ├── TrivialLayout / DenseLayout
//!                          ├── BasicRouting ──► RoutingOutcome
//!                          ├── BasisTranslation
//!                          └── Optimize1qGates / CancelInversePairs
//! ```
//!
//! The qubit bookkeeping that routing produces ([`Layout`], [`Permutation`])
//! is a small algebra of its own: layouts compose, permutations compose and
//! invert, and [`apply_layout`] relabels a circuit onto physical qubits.
//!
//! # Example
//!
//! ```rust
//! use rivet_compile::{BasisGates, CouplingMap, PassManagerBuilder, RoutingOutcome};
//! use rivet_ir::{Circuit, QubitId};
//!
//! let mut builder = Circuit::builder("ghz", 3, 0);
//! builder.h(QubitId(0))?.cx(QubitId(0), QubitId(2))?;
//! let circuit = builder.build();
//!
//! let (pm, mut props) = PassManagerBuilder::new()
//!     .with_optimization_level(1)
//!     .with_target(CouplingMap::linear(3), BasisGates::ibm())
//!     .build();
//!
//! let mut dag = circuit.to_dag();
//! pm.run(&mut dag, &mut props)?;
//!
//! let outcome = props.get::<RoutingOutcome>().unwrap();
//! assert_eq!(outcome.swaps, 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Custom passes
//!
//! ```rust
//! use rivet_compile::{CompileResult, Pass, PassKind, PropertySet};
//! use rivet_ir::CircuitDag;
//!
//! struct CountOps;
//!
//! impl Pass for CountOps {
//!     fn name(&self) -> &str {
//!         "CountOps"
//!     }
//!
//!     fn kind(&self) -> PassKind {
//!         PassKind::Analysis
//!     }
//!
//!     fn run(&self, dag: &mut CircuitDag, props: &mut PropertySet) -> CompileResult<()> {
//!         props.insert(dag.num_ops());
//!         Ok(())
//!     }
//! }
//! ```

pub mod compress;
pub mod error;
pub mod layout;
pub mod manager;
pub mod pass;
pub mod passes;
pub mod property;
pub mod unitary;

pub use compress::{Compression, compress, grow_connected_subset};
pub use error::{CompileError, CompileResult};
pub use layout::{Layout, Permutation, apply_layout};
pub use manager::{LayoutMethod, PassEvent, PassManager, PassManagerBuilder};
pub use pass::{Pass, PassKind};
pub use passes::{Router, RoutingOutcome};
pub use property::{BasisGates, CouplingMap, PropertySet};
pub use unitary::Unitary2x2;
