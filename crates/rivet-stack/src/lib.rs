//! Rivet compiler-stack contract.
//!
//! A [`Stack`] turns a virtual circuit into a [`TranspiledFragment`]: a
//! physical circuit plus the initial layout, final layout and routing
//! permutation that tie its qubits back to the virtual ones. Stacks are
//! selected by [`StackKind`] through a [`StackRegistry`].
//!
//! | Kind | Stack | Strategy |
//! |------|-------|----------|
//! | `pass_manager` | [`PassManagerStack`] | preset pipeline, levels 0-3 |
//! | `search` | [`SearchStack`] | seeded beam search over SWAPs, budgeted |
//! | `instantiation` | [`InstantiationStack`] | block re-instantiation, fidelity-checked |
//!
//! # Example
//!
//! ```rust
//! use rivet_compile::{BasisGates, CouplingMap};
//! use rivet_ir::{Circuit, QubitId};
//! use rivet_stack::{DeviceConstraints, StackKind, StackOptions, StackRegistry};
//!
//! let mut builder = Circuit::builder("pair", 2, 0);
//! builder.h(QubitId(0))?.cx(QubitId(0), QubitId(1))?;
//! let circuit = builder.build();
//!
//! let device = DeviceConstraints::new("line", CouplingMap::linear(4), BasisGates::ibm());
//! let stack = StackRegistry::with_builtins().get(StackKind::Search)?;
//! let fragment = stack.transpile(&circuit, &device, &StackOptions::new().with_seed(1))?;
//!
//! assert_eq!(fragment.num_physical(), 4);
//! assert_eq!(fragment.full_map()?.len(), 2);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod device;
pub mod error;
pub mod fragment;
pub mod options;
pub mod registry;
pub mod stack;
pub mod stacks;

pub use device::DeviceConstraints;
pub use error::{StackError, StackResult};
pub use fragment::{FragmentQuality, TranspiledFragment};
pub use options::StackOptions;
pub use registry::StackRegistry;
pub use stack::{Stack, StackKind};
pub use stacks::{InstantiationStack, PassManagerStack, SearchStack};
