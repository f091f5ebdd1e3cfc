//! Target-agnostic passes.

mod optimization;

pub use optimization::{CancelInversePairs, Optimize1qGates};
