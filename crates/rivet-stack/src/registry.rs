//! Stack lookup by identifier.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::{StackError, StackResult};
use crate::stack::{Stack, StackKind};
use crate::stacks::{InstantiationStack, PassManagerStack, SearchStack};

/// Stacks keyed by [`StackKind`].
///
/// Registering a stack under a kind that is already present replaces it,
/// which lets callers wrap or reconfigure a built-in stack.
#[derive(Clone, Default)]
pub struct StackRegistry {
    stacks: FxHashMap<StackKind, Arc<dyn Stack>>,
}

impl StackRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the three built-in stacks with default settings.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(PassManagerStack);
        registry.register(SearchStack::new());
        registry.register(InstantiationStack::new());
        registry
    }

    /// Register `stack` under its own kind.
    pub fn register(&mut self, stack: impl Stack + 'static) {
        self.register_shared(Arc::new(stack));
    }

    /// Register an already shared stack.
    pub fn register_shared(&mut self, stack: Arc<dyn Stack>) {
        debug!("Registering stack: {}", stack.name());
        self.stacks.insert(stack.kind(), stack);
    }

    /// Look up a stack.
    pub fn get(&self, kind: StackKind) -> StackResult<Arc<dyn Stack>> {
        self.stacks
            .get(&kind)
            .cloned()
            .ok_or_else(|| StackError::UnknownStack(kind.to_string()))
    }

    /// Whether a stack is registered for `kind`.
    pub fn has(&self, kind: StackKind) -> bool {
        self.stacks.contains_key(&kind)
    }

    /// Registered kinds, sorted.
    pub fn available(&self) -> Vec<StackKind> {
        let mut kinds: Vec<_> = self.stacks.keys().copied().collect();
        kinds.sort();
        kinds
    }
}

impl std::fmt::Debug for StackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StackRegistry")
            .field("stacks", &self.available())
            .finish()
    }
}
