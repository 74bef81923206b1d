//! Runtime values carried by template references

mod display;
mod impls;

use std::sync::Arc;

use crate::component::ComponentDefinition;

/// A value produced by a [`Reference`](crate::Reference) during rendering.
///
/// Values are cheap to clone: strings are shared and component definitions
/// are handles.
#[derive(Clone, Default)]
pub enum Value {
    /// No value at all; renders as nothing
    #[default]
    Undefined,

    /// An explicit empty value; renders as nothing
    Null,

    /// Boolean
    Bool(bool),

    /// Numbers are always 64-bit floats
    Number(f64),

    /// Shared string
    String(Arc<str>),

    /// A resolved component definition (compared by identity)
    Definition(ComponentDefinition),
}
