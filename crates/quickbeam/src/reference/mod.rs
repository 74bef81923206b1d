//! References: value sources paired with revision tags
//!
//! A [`Reference`] produces a value and a [`Tag`] describing when that value
//! may have changed. Opcodes share references freely; a reference owns no
//! downstream state.

mod cache;

pub use cache::{ReferenceCache, Validation};

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::tag::{DirtyableTag, Tag};
use crate::value::Value;

/// A capability producing a value plus its current tag.
pub trait Reference<T>: fmt::Debug + Send + Sync {
    /// Read the current value.
    fn value(&self) -> T;

    /// The tag that advances whenever [`value`](Self::value) may change.
    fn tag(&self) -> Tag;
}

/// Shared handle to a reference producing [`Value`]s.
pub type ValueRef = Arc<dyn Reference<Value>>;

/// Whether the reference's tag can never invalidate.
///
/// Constant references need neither a cache nor an updating opcode.
pub fn is_const<T>(reference: &(impl Reference<T> + ?Sized)) -> bool {
    reference.tag().is_const()
}

/// A reference whose value never changes.
#[derive(Debug, Clone)]
pub struct ConstReference<T> {
    inner: T,
}

impl<T> ConstReference<T> {
    /// Wrap a fixed value.
    pub fn new(inner: T) -> Self {
        Self { inner }
    }
}

impl<T: Clone + fmt::Debug + Send + Sync> Reference<T> for ConstReference<T> {
    fn value(&self) -> T {
        self.inner.clone()
    }

    fn tag(&self) -> Tag {
        Tag::Const
    }
}

/// A mutable reference whose tag advances on every [`update`](Self::update).
#[derive(Debug)]
pub struct DynamicReference<T> {
    inner: RwLock<T>,
    tag: Arc<DirtyableTag>,
}

impl<T> DynamicReference<T> {
    /// Create a reference holding `inner`.
    pub fn new(inner: T) -> Self {
        Self {
            inner: RwLock::new(inner),
            tag: Arc::new(DirtyableTag::new()),
        }
    }

    /// Replace the value and advance the tag.
    pub fn update(&self, value: T) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = value;
        self.tag.dirty();
    }

    /// Advance the tag without changing the value.
    pub fn dirty(&self) {
        self.tag.dirty();
    }

    /// Mark the reference's tag as destroyed.
    pub fn destroy(&self) {
        self.tag.destroy();
    }
}

impl<T: Clone + fmt::Debug + Send + Sync> Reference<T> for DynamicReference<T> {
    fn value(&self) -> T {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn tag(&self) -> Tag {
        Tag::Dirtyable(Arc::clone(&self.tag))
    }
}

/// Shorthand for a constant [`ValueRef`].
pub fn const_ref(value: impl Into<Value>) -> ValueRef {
    Arc::new(ConstReference::new(value.into()))
}

/// The reference used for missing values.
pub fn undefined_ref() -> ValueRef {
    const_ref(Value::Undefined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_const_reference_is_const() {
        let r = ConstReference::new(Value::from(1));
        assert!(is_const(&r));
        assert_eq!(r.value(), Value::from(1));
    }

    #[test]
    fn test_dynamic_reference_update() {
        let r = DynamicReference::new(Value::from("a"));
        assert!(!is_const(&r));

        let tag = r.tag();
        let seen = tag.value();
        r.update(Value::from("b"));

        assert_eq!(r.value(), Value::from("b"));
        assert!(!tag.validate(seen));
    }

    #[test]
    fn test_value_ref_is_object_safe() {
        let r: ValueRef = Arc::new(DynamicReference::new(Value::Null));
        assert!(!is_const(r.as_ref()));
        assert!(is_const(const_ref("x").as_ref()));
    }
}
