//! Dynamic scope: ambient named values inherited across component boundaries

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use indexmap::IndexMap;

use crate::reference::ValueRef;

/// A named-value environment pushed and popped with component boundaries.
///
/// Handles are shared: the copy a component manager receives at creation
/// time is the same environment it receives on every later update. A child
/// scope starts as a copy of its parent's bindings; later writes to either
/// side are not seen by the other.
#[derive(Clone, Default)]
pub struct DynamicScope {
    bindings: Arc<RwLock<IndexMap<String, ValueRef>>>,
}

impl DynamicScope {
    /// Create an empty dynamic scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a child scope holding a copy of this scope's bindings.
    pub fn child(&self) -> Self {
        let bindings = self
            .bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        Self {
            bindings: Arc::new(RwLock::new(bindings)),
        }
    }

    /// Look up a binding.
    pub fn get(&self, name: &str) -> Option<ValueRef> {
        self.bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Bind or rebind a name.
    pub fn set(&self, name: impl Into<String>, reference: ValueRef) {
        self.bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), reference);
    }

    /// Check if a name is bound.
    pub fn contains(&self, name: &str) -> bool {
        self.bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Bound names in insertion order.
    pub fn names(&self) -> Vec<String> {
        self.bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Whether two handles refer to the same environment.
    pub fn ptr_eq(&self, other: &DynamicScope) -> bool {
        Arc::ptr_eq(&self.bindings, &other.bindings)
    }
}

impl fmt::Debug for DynamicScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicScope")
            .field("names", &self.names())
            .finish()
    }
}
