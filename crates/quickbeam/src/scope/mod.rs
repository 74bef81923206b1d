//! Lexical scopes
//!
//! Scopes live in a [`ScopeArena`] and are addressed by [`ScopeId`]. A
//! scope's parent is a plain index, never an ownership edge. Scopes are
//! pushed on component/block entry and released on exit in strict LIFO
//! order; releasing a scope frees it and every scope allocated after it as
//! one contiguous index range.
//!
//! # Example
//!
//! ```
//! use quickbeam::{const_ref, Reference, ScopeArena, Value};
//!
//! let mut arena = ScopeArena::new();
//! let root = arena.push_root(const_ref("self"), 1);
//! arena.bind_symbol(root, 0, const_ref(42)).unwrap();
//!
//! // A child scope sees its parent's symbols
//! let child = arena.push_child(root, 0).unwrap();
//! assert_eq!(arena.symbol(child, 0).map(|r| r.value()), Some(Value::from(42)));
//!
//! arena.release(child);
//! assert_eq!(arena.len(), 1);
//! ```

mod dynamic;

pub use dynamic::DynamicScope;

use indexmap::IndexMap;

use crate::error::{RenderError, Result};
use crate::reference::ValueRef;

/// Index of a scope inside a [`ScopeArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(usize);

impl ScopeId {
    /// The raw arena index.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Compile-time layout of a scope's symbol slots.
///
/// Named symbols receive slots in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    named: IndexMap<String, usize>,
    size: usize,
}

impl SymbolTable {
    /// Create an empty symbol table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a named symbol, allocating the next slot for it.
    pub fn with_named(mut self, name: impl Into<String>) -> Self {
        self.declare(name);
        self
    }

    /// Declare an anonymous local, allocating the next slot for it.
    pub fn with_local(mut self) -> Self {
        self.size += 1;
        self
    }

    /// Declare a named symbol and return its slot.
    ///
    /// Declaring the same name twice returns the existing slot.
    pub fn declare(&mut self, name: impl Into<String>) -> usize {
        let next = self.size;
        let slot = *self.named.entry(name.into()).or_insert(next);
        if slot == next {
            self.size += 1;
        }
        slot
    }

    /// Look up a named symbol's slot.
    pub fn symbol(&self, name: &str) -> Option<usize> {
        self.named.get(name).copied()
    }

    /// Iterate over `(name, slot)` pairs in declaration order.
    pub fn named(&self) -> impl Iterator<Item = (&str, usize)> {
        self.named.iter().map(|(name, slot)| (name.as_str(), *slot))
    }

    /// Number of slots a scope for this table needs.
    pub fn size(&self) -> usize {
        self.size
    }
}

#[derive(Debug)]
struct ScopeFrame {
    self_ref: ValueRef,
    slots: Vec<Option<ValueRef>>,
    parent: Option<ScopeId>,
}

/// Arena of scope frames.
#[derive(Debug, Default)]
pub struct ScopeArena {
    frames: Vec<ScopeFrame>,
}

impl ScopeArena {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a root scope with its own `self` and `size` empty slots.
    ///
    /// Root scopes have no parent: a component's layout never sees the
    /// caller's symbols.
    pub fn push_root(&mut self, self_ref: ValueRef, size: usize) -> ScopeId {
        let id = ScopeId(self.frames.len());
        self.frames.push(ScopeFrame {
            self_ref,
            slots: vec![None; size],
            parent: None,
        });
        id
    }

    /// Allocate a child scope that inherits `self` and falls back to
    /// `parent` for symbols it does not bind itself.
    pub fn push_child(&mut self, parent: ScopeId, size: usize) -> Result<ScopeId> {
        let self_ref = self.frame(parent)?.self_ref.clone();
        let id = ScopeId(self.frames.len());
        self.frames.push(ScopeFrame {
            self_ref,
            slots: vec![None; size],
            parent: Some(parent),
        });
        Ok(id)
    }

    /// Bind a reference to a slot of the given scope.
    pub fn bind_symbol(&mut self, scope: ScopeId, slot: usize, reference: ValueRef) -> Result<()> {
        let frame = self.frame_mut(scope)?;
        let size = frame.slots.len();
        match frame.slots.get_mut(slot) {
            Some(entry) => {
                *entry = Some(reference);
                Ok(())
            }
            None => Err(RenderError::protocol(
                "bind-symbol",
                format!("slot {} out of range for scope of size {}", slot, size),
            )),
        }
    }

    /// Look up a slot, walking the parent chain for unbound slots.
    pub fn symbol(&self, scope: ScopeId, slot: usize) -> Option<&ValueRef> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let frame = self.frames.get(id.0)?;
            if let Some(Some(reference)) = frame.slots.get(slot) {
                return Some(reference);
            }
            current = frame.parent;
        }
        None
    }

    /// The `self` reference of a scope.
    pub fn self_ref(&self, scope: ScopeId) -> Option<&ValueRef> {
        self.frames.get(scope.0).map(|frame| &frame.self_ref)
    }

    /// The parent of a scope, if it has one.
    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.frames.get(scope.0).and_then(|frame| frame.parent)
    }

    /// Free `scope` and everything allocated after it.
    pub fn release(&mut self, scope: ScopeId) {
        self.frames.truncate(scope.0);
    }

    /// Free every scope at index `len` or above.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.frames.truncate(len);
    }

    /// Number of live scopes.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Check if the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    fn frame(&self, scope: ScopeId) -> Result<&ScopeFrame> {
        self.frames
            .get(scope.0)
            .ok_or_else(|| released_scope(scope))
    }

    fn frame_mut(&mut self, scope: ScopeId) -> Result<&mut ScopeFrame> {
        self.frames
            .get_mut(scope.0)
            .ok_or_else(|| released_scope(scope))
    }
}

fn released_scope(scope: ScopeId) -> RenderError {
    RenderError::protocol("scope", format!("scope {} was already released", scope.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::{const_ref, Reference};
    use crate::value::Value;

    #[test]
    fn test_symbol_table_allocates_in_order() {
        let mut table = SymbolTable::new().with_named("title").with_local();
        assert_eq!(table.declare("body"), 2);
        assert_eq!(table.declare("title"), 0);
        assert_eq!(table.symbol("body"), Some(2));
        assert_eq!(table.size(), 3);
    }

    #[test]
    fn test_root_scope_does_not_see_other_roots() {
        let mut arena = ScopeArena::new();
        let outer = arena.push_root(const_ref("outer"), 1);
        arena.bind_symbol(outer, 0, const_ref(1)).unwrap();

        let inner = arena.push_root(const_ref("inner"), 1);
        assert!(arena.symbol(inner, 0).is_none());
        assert_eq!(arena.self_ref(inner).map(|r| r.value()), Some(Value::from("inner")));
    }

    #[test]
    fn test_child_shadows_parent_slot() {
        let mut arena = ScopeArena::new();
        let root = arena.push_root(const_ref(Value::Null), 2);
        arena.bind_symbol(root, 0, const_ref("a")).unwrap();
        arena.bind_symbol(root, 1, const_ref("b")).unwrap();

        let child = arena.push_child(root, 2).unwrap();
        arena.bind_symbol(child, 1, const_ref("c")).unwrap();

        assert_eq!(arena.symbol(child, 0).map(|r| r.value()), Some(Value::from("a")));
        assert_eq!(arena.symbol(child, 1).map(|r| r.value()), Some(Value::from("c")));
        assert_eq!(arena.parent(child), Some(root));
    }

    #[test]
    fn test_bind_out_of_range_is_protocol_violation() {
        let mut arena = ScopeArena::new();
        let root = arena.push_root(const_ref(Value::Null), 1);
        assert!(matches!(
            arena.bind_symbol(root, 3, const_ref(1)),
            Err(RenderError::ProtocolViolation { .. })
        ));
    }

    #[test]
    fn test_release_frees_contiguous_range() {
        let mut arena = ScopeArena::new();
        let root = arena.push_root(const_ref(Value::Null), 0);
        let a = arena.push_child(root, 0).unwrap();
        let _b = arena.push_child(a, 0).unwrap();
        assert_eq!(arena.len(), 3);

        arena.release(a);
        assert_eq!(arena.len(), 1);
        assert!(arena.push_child(a, 0).is_err());
    }
}
