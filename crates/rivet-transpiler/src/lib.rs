//! Rivet layout-preserving transpilation.
//!
//! Compiles circuits piece by piece and stitches the pieces into one
//! physically consistent circuit, so an expensive prefix is compiled once
//! and many cheap suffixes are appended to it.
//!
//! - [`Stitcher`]: chain, right, left and compressed transpilation.
//! - [`FragmentCache`]: at most one stack call per key, shared across
//!   threads, optionally bounded and persisted to JSON.
//! - [`CircuitHasher`]: cancellation- and reordering-invariant SHA-256
//!   digests used as cache keys.
//! - [`TranspilerConfig`]: YAML plus environment configuration.
//!
//! # Example
//!
//! ```rust
//! use rivet_compile::{BasisGates, CouplingMap};
//! use rivet_stack::{DeviceConstraints, StackOptions};
//! use rivet_transpiler::{FragmentCache, Stitcher, get_full_map, library};
//!
//! let device = DeviceConstraints::new("line", CouplingMap::linear(5), BasisGates::ibm());
//! let circuits = vec![
//!     library::cnot_circuit(3, "a", 0, 1)?,
//!     library::cnot_circuit(3, "b", 1, 2)?,
//!     library::cnot_circuit(3, "c", 0, 2)?,
//! ];
//!
//! let cache = FragmentCache::new();
//! let stitcher = Stitcher::new(&cache);
//! let options = StackOptions::new().with_seed(7);
//! let chained = stitcher.transpile_chain(&circuits, &device, &options)?;
//!
//! assert_eq!(get_full_map(&chained)?.len(), 3);
//! assert_eq!(cache.len(), 3);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod hash;
pub mod library;
pub mod metrics;
pub mod packing;
pub mod persist;
pub mod stitch;
pub mod transforms;

pub use cache::{CacheKey, CacheStats, FragmentCache};
pub use config::TranspilerConfig;
pub use error::{TranspileError, TranspileResult};
pub use hash::{CancellationRules, CircuitHasher, HashMode};
pub use metrics::{IbmCostModel, PassMetrics, ibm_cost, transpile_and_return_metrics};
pub use packing::{PackedCircuits, PackingEfficiency, pack_circuits};
pub use persist::{CACHE_FORMAT_VERSION, CacheRecord, default_cache_path};
pub use stitch::{Stitcher, append};
pub use transforms::remove_unused_qubits;

use rivet_ir::Circuit;
use rivet_stack::{DeviceConstraints, StackKind, StackOptions, TranspiledFragment};

/// Compile `circuit` once with `stack`, without caching.
pub fn transpile(
    circuit: &Circuit,
    device: &DeviceConstraints,
    stack: StackKind,
    options: &StackOptions,
) -> TranspileResult<TranspiledFragment> {
    Stitcher::uncached()
        .with_stack(stack)
        .transpile(circuit, device, options)
}

/// Final physical qubit of every virtual qubit, in virtual order.
pub fn get_full_map(fragment: &TranspiledFragment) -> TranspileResult<Vec<u32>> {
    Ok(fragment.full_map()?)
}

/// Hex SHA-256 structural digest with the default cancellation rules.
///
/// `deep` includes parameter values; otherwise only structure counts.
pub fn get_circuit_hash(circuit: &Circuit, deep: bool) -> TranspileResult<String> {
    let mode = if deep {
        HashMode::Deep
    } else {
        HashMode::Shallow
    };
    Ok(CircuitHasher::default().hash(circuit, mode)?)
}
