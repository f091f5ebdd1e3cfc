//! Target-specific passes.

mod layout;
mod routing;
mod translation;

pub use layout::{DenseLayout, TrivialLayout};
pub use routing::{BasicRouting, Router, RoutingOutcome};
pub use translation::{BasisTranslation, Unroll3q, synthesize_1q, translate_instruction};
