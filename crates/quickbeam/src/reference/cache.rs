//! Revision-aware caching of a reference's last observed value

use std::sync::Arc;

use super::{is_const, Reference};
use crate::tag::{Revision, Tag, CONSTANT};

/// Outcome of [`ReferenceCache::revalidate`].
#[derive(Debug, Clone, PartialEq)]
pub enum Validation<T> {
    /// The value is the same as last time
    Unchanged,

    /// The value differs; carries the new value
    Changed(T),
}

impl<T> Validation<T> {
    /// Whether the value changed.
    pub fn is_changed(&self) -> bool {
        matches!(self, Validation::Changed(_))
    }

    /// The new value, if it changed.
    pub fn changed(self) -> Option<T> {
        match self {
            Validation::Changed(value) => Some(value),
            Validation::Unchanged => None,
        }
    }
}

/// Remembers the last value and revision read from a reference.
///
/// Revalidation is two-level:
///
/// 1. If the reference's tag still validates against the remembered
///    revision, the value is reported unchanged without being read. The
///    revision is authoritative here, even if a direct read would now
///    return something else.
/// 2. Otherwise the remembered revision is refreshed, the value is read and
///    compared with `PartialEq`, and only a real difference is reported as
///    [`Validation::Changed`].
pub struct ReferenceCache<T> {
    reference: Arc<dyn Reference<T>>,
    last_value: Option<T>,
    last_revision: Revision,
}

impl<T: Clone + PartialEq> ReferenceCache<T> {
    /// Create a cache; nothing is read until the first peek or revalidate.
    pub fn new(reference: Arc<dyn Reference<T>>) -> Self {
        Self {
            reference,
            last_value: None,
            last_revision: CONSTANT,
        }
    }

    /// Create a cache only if the reference can change.
    pub fn for_reference(reference: Arc<dyn Reference<T>>) -> Option<Self> {
        if is_const(reference.as_ref()) {
            None
        } else {
            Some(Self::new(reference))
        }
    }

    /// The last observed value, reading it now if nothing was observed yet.
    pub fn peek(&mut self) -> T {
        match &self.last_value {
            Some(value) => value.clone(),
            None => self.initialize(),
        }
    }

    /// Check whether the reference's value changed since it was last seen.
    ///
    /// The first call on a fresh cache always reports the value as changed.
    pub fn revalidate(&mut self) -> Validation<T> {
        if self.last_value.is_none() {
            return Validation::Changed(self.initialize());
        }

        let tag = self.reference.tag();
        if tag.validate(self.last_revision) {
            return Validation::Unchanged;
        }
        self.last_revision = tag.value();

        let value = self.reference.value();
        if self.last_value.as_ref() == Some(&value) {
            return Validation::Unchanged;
        }

        self.last_value = Some(value.clone());
        Validation::Changed(value)
    }

    /// The underlying reference's tag.
    pub fn tag(&self) -> Tag {
        self.reference.tag()
    }

    /// The revision remembered by the last read.
    pub fn last_revision(&self) -> Revision {
        self.last_revision
    }

    fn initialize(&mut self) -> T {
        self.last_revision = self.reference.tag().value();
        let value = self.reference.value();
        self.last_value = Some(value.clone());
        value
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for ReferenceCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceCache")
            .field("reference", &self.reference)
            .field("last_value", &self.last_value)
            .field("last_revision", &self.last_revision)
            .finish()
    }
}
