//! Revision tags
//!
//! A [`Tag`] answers one question cheaply: "has anything I depend on changed
//! since revision `r`?" Every mutation of a value source advances a single
//! process-wide revision counter and stamps the source's tag with the new
//! revision. A consumer remembers the revision it last saw and later asks the
//! tag to [`Tag::validate`] it.
//!
//! # Revisions
//!
//! ```text
//! CONSTANT (0)  < INITIAL (1) <= ... current ...  < VOLATILE (u64::MAX)
//! ```
//!
//! The counter is intentional shared mutable state. It starts at
//! [`INITIAL`], only ever moves forward, and needs no teardown.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{RenderError, Result};

/// A snapshot of a tag's state, comparable for equality.
pub type Revision = u64;

/// Revision of tags that never change.
pub const CONSTANT: Revision = 0;

/// First revision handed out by the global counter.
pub const INITIAL: Revision = 1;

/// Revision reported by tags that never validate.
pub const VOLATILE: Revision = u64::MAX;

static REVISION: AtomicU64 = AtomicU64::new(INITIAL);

/// The current value of the process-wide revision counter.
pub fn current_revision() -> Revision {
    REVISION.load(Ordering::Acquire)
}

fn bump() -> Revision {
    REVISION.fetch_add(1, Ordering::AcqRel) + 1
}

/// A tag owned by a mutable value source.
///
/// Calling [`dirty`](Self::dirty) advances it to a fresh revision.
/// Calling [`destroy`](Self::destroy) marks it stale; any later attempt to
/// revalidate through it is a programming error.
#[derive(Debug)]
pub struct DirtyableTag {
    revision: AtomicU64,
    destroyed: AtomicBool,
}

impl Default for DirtyableTag {
    fn default() -> Self {
        Self::new()
    }
}

impl DirtyableTag {
    /// Create a tag stamped with the current revision.
    pub fn new() -> Self {
        Self {
            revision: AtomicU64::new(current_revision()),
            destroyed: AtomicBool::new(false),
        }
    }

    /// The tag's current revision.
    pub fn revision(&self) -> Revision {
        self.revision.load(Ordering::Acquire)
    }

    /// Advance the tag to a fresh revision.
    pub fn dirty(&self) {
        self.revision.store(bump(), Ordering::Release);
    }

    /// Mark the tag as belonging to a destroyed source.
    pub fn destroy(&self) {
        self.destroyed.store(true, Ordering::Release);
    }

    /// Whether [`destroy`](Self::destroy) has been called.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }
}

/// An opaque revision marker attached to a value source.
#[derive(Clone)]
pub enum Tag {
    /// Never invalidates
    Const,

    /// Never validates
    Volatile,

    /// Advances when its source is dirtied
    Dirtyable(Arc<DirtyableTag>),

    /// Reports the most recent revision among its members
    Combined(Arc<[Tag]>),
}

impl Tag {
    /// Create a fresh dirtyable tag, returning the tag and its handle.
    pub fn dirtyable() -> (Tag, Arc<DirtyableTag>) {
        let inner = Arc::new(DirtyableTag::new());
        (Tag::Dirtyable(Arc::clone(&inner)), inner)
    }

    /// The tag's current revision.
    ///
    /// For a combined tag this is the maximum of its members, recomputed on
    /// every call.
    pub fn value(&self) -> Revision {
        match self {
            Tag::Const => CONSTANT,
            Tag::Volatile => VOLATILE,
            Tag::Dirtyable(tag) => tag.revision(),
            Tag::Combined(tags) => tags.iter().map(Tag::value).max().unwrap_or(CONSTANT),
        }
    }

    /// Whether the tag still reports the remembered revision.
    pub fn validate(&self, snapshot: Revision) -> bool {
        snapshot != VOLATILE && self.value() == snapshot
    }

    /// Whether this tag can never invalidate.
    pub fn is_const(&self) -> bool {
        matches!(self, Tag::Const)
    }

    /// Whether this tag, or any tag it combines, has been destroyed.
    pub fn is_stale(&self) -> bool {
        match self {
            Tag::Const | Tag::Volatile => false,
            Tag::Dirtyable(tag) => tag.is_destroyed(),
            Tag::Combined(tags) => tags.iter().any(Tag::is_stale),
        }
    }

    /// Fail with [`RenderError::StaleTag`] if the tag has been destroyed.
    pub fn check(&self, context: impl fmt::Display) -> Result<()> {
        if self.is_stale() {
            return Err(RenderError::StaleTag {
                context: context.to_string(),
            });
        }
        Ok(())
    }
}

impl From<Arc<DirtyableTag>> for Tag {
    fn from(tag: Arc<DirtyableTag>) -> Self {
        Tag::Dirtyable(tag)
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::Const => write!(f, "Tag::Const"),
            Tag::Volatile => write!(f, "Tag::Volatile"),
            Tag::Dirtyable(tag) => write!(f, "Tag::Dirtyable(@{})", tag.revision()),
            Tag::Combined(tags) => f.debug_tuple("Tag::Combined").field(tags).finish(),
        }
    }
}

/// Combine several tags into one.
///
/// Constant members are dropped. A volatile member makes the whole
/// combination volatile. Combining nothing (or only constants) yields
/// [`Tag::Const`].
pub fn combine(tags: impl IntoIterator<Item = Tag>) -> Tag {
    let mut members = Vec::new();
    for tag in tags {
        match tag {
            Tag::Const => {}
            Tag::Volatile => return Tag::Volatile,
            other => members.push(other),
        }
    }

    match members.len() {
        0 => Tag::Const,
        1 => members.pop().unwrap_or(Tag::Const),
        _ => Tag::Combined(members.into()),
    }
}
