//! Error types for rendering and revalidation

use thiserror::Error;

use crate::value::Value;

/// Main error type for Quickbeam operations.
///
/// A failed opcode aborts its whole phase. Nothing here is recovered in
/// place; the caller decides whether to discard the partial output and run
/// the destructors registered so far.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Open/close bookkeeping went out of balance, or an opcode found the
    /// frame without the state it needs.
    #[error("Protocol violation in {opcode}: {message}")]
    ProtocolViolation {
        /// Opcode type that detected the violation
        opcode: &'static str,
        /// What went wrong
        message: String,
    },

    /// A component manager method failed.
    ///
    /// The manager's error is kept as `source` without modification, so it
    /// can still be downcast to its original type.
    #[error("{opcode} failed for component `{component}`: {source}")]
    Manager {
        /// Opcode type that invoked the manager
        opcode: &'static str,
        /// Name of the component definition being processed
        component: String,
        /// The error raised by the manager
        #[source]
        source: anyhow::Error,
    },

    /// A tag belonging to a destroyed source was read.
    #[error("Stale tag read: {context}")]
    StaleTag {
        /// Where the stale tag was encountered
        context: String,
    },

    /// An operand had the wrong kind of value.
    #[error("Type error: expected {expected}, got {got}")]
    TypeError {
        /// Expected kind
        expected: String,
        /// Actual kind received
        got: String,
    },

    /// A symbol slot was read before anything was bound to it.
    #[error("Unbound symbol in slot {slot}")]
    UnboundSymbol {
        /// The slot index
        slot: usize,
    },

    /// Frame nesting exceeded the configured limit.
    #[error("Nesting depth exceeded: {depth} (max: {max})")]
    DepthExceeded {
        /// Depth that was reached
        depth: usize,
        /// Configured maximum
        max: usize,
    },

    /// A dynamic component definition changed after the initial render.
    ///
    /// The region that invoked it must be rendered again from scratch.
    #[error("Component definition changed; now `{name}`")]
    DefinitionChanged {
        /// Description of the new value
        name: String,
    },
}

impl RenderError {
    /// Create a protocol violation error.
    pub fn protocol(opcode: &'static str, message: impl Into<String>) -> Self {
        RenderError::ProtocolViolation {
            opcode,
            message: message.into(),
        }
    }

    /// Wrap a manager failure with the opcode and component it came from.
    pub fn manager(
        opcode: &'static str,
        component: impl Into<String>,
        source: anyhow::Error,
    ) -> Self {
        RenderError::Manager {
            opcode,
            component: component.into(),
            source,
        }
    }

    /// Create a type error for an unexpected value.
    pub fn type_error(expected: impl Into<String>, got: &Value) -> Self {
        RenderError::TypeError {
            expected: expected.into(),
            got: type_name(got).to_string(),
        }
    }

    /// The manager's original error, if this is a manager failure.
    pub fn manager_error(&self) -> Option<&anyhow::Error> {
        match self {
            RenderError::Manager { source, .. } => Some(source),
            _ => None,
        }
    }

    /// The opcode type this error is tagged with, where one is known.
    pub fn opcode(&self) -> Option<&'static str> {
        match self {
            RenderError::ProtocolViolation { opcode, .. } | RenderError::Manager { opcode, .. } => {
                Some(opcode)
            }
            _ => None,
        }
    }
}

/// Result type alias for Quickbeam operations
pub type Result<T> = std::result::Result<T, RenderError>;

/// Get a human-readable name for a value's kind.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Undefined => "undefined",
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Definition(_) => "component definition",
    }
}
