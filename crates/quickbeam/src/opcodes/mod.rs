//! Append-phase opcodes
//!
//! A compiled template is a [`Program`]: an immutable, shared sequence of
//! [`Instruction`]s. Programs are built once and reused by every render of
//! the template. Each instruction wraps one [`Opcode`]; the interpreter
//! dispatches on the opcode with a single `match`.
//!
//! Opcodes that depend on values which can change append an
//! [`UpdatingOpcode`] to the render's updating program, which the
//! [`UpdatingVm`](crate::UpdatingVm) later walks to revalidate the output.

pub mod component;
pub mod dom;
mod expression;
pub mod updating;

pub use component::UpdateComponentOpcode;
pub use dom::{UpdateAttributeOpcode, UpdateTextOpcode};
pub use expression::Expression;
pub use updating::{
    AssertOpcode, JumpIfNotModifiedOpcode, UpdatingInstruction, UpdatingOpcode, UpdatingProgram,
};

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::component::{CompiledArgs, ComponentDefinition, Templates};
use crate::error::Result;
use crate::vm::AppendVm;

/// Unique identifier of an instruction, for debugging output.
pub type Guid = u64;

static NEXT_GUID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_guid() -> Guid {
    NEXT_GUID.fetch_add(1, Ordering::Relaxed)
}

/// Opcode type names as they appear in debug output and errors.
pub mod names {
    #![allow(missing_docs)]

    pub const TEXT: &str = "text";
    pub const PUT_VALUE: &str = "put-value";
    pub const DYNAMIC_CONTENT: &str = "dynamic-content";
    pub const OPEN_ELEMENT: &str = "open-element";
    pub const STATIC_ATTR: &str = "static-attr";
    pub const DYNAMIC_ATTR: &str = "dynamic-attr";
    pub const FLUSH_ELEMENT: &str = "flush-element";
    pub const CLOSE_ELEMENT: &str = "close-element";
    pub const SET_DYNAMIC_VAR: &str = "set-dynamic-var";
    pub const PUT_DYNAMIC_COMPONENT_DEFINITION: &str = "put-dynamic-component-definition";
    pub const PUT_COMPONENT_DEFINITION: &str = "put-component-definition";
    pub const OPEN_COMPONENT: &str = "open-component";
    pub const DID_CREATE_ELEMENT: &str = "did-create-element";
    pub const SHADOW_ATTRIBUTES: &str = "shadow-attributes";
    pub const DID_RENDER_LAYOUT: &str = "did-render-layout";
    pub const CLOSE_COMPONENT: &str = "close-component";
    pub const YIELD: &str = "yield";

    pub const UPDATE_COMPONENT: &str = "update-component";
    pub const UPDATE_TEXT: &str = "update-text";
    pub const UPDATE_ATTRIBUTE: &str = "update-attribute";
    pub const ASSERT: &str = "assert";
    pub const JUMP_IF_NOT_MODIFIED: &str = "jump-if-not-modified";
    pub const DID_MODIFY: &str = "did-modify";
}

use names::*;

/// Arguments of [`Opcode::OpenComponent`].
#[derive(Debug, Clone, Default)]
pub struct OpenComponent {
    /// Arguments at the invocation site
    pub args: CompiledArgs,

    /// Named arguments the caller may write onto the component's element
    pub shadow: Vec<String>,

    /// Blocks passed to the component
    pub templates: Templates,
}

/// A single append-phase instruction.
#[derive(Debug, Clone)]
pub enum Opcode {
    /// Append literal text
    Text(String),

    /// Evaluate an expression into the frame's operand
    PutValue(Expression),

    /// Append the operand as text, revalidated if it can change
    DynamicContent,

    /// Start constructing an element
    OpenElement(String),

    /// Queue a literal attribute
    StaticAttr {
        /// Attribute name
        name: String,
        /// Attribute value
        value: String,
    },

    /// Queue the operand as an attribute value
    DynamicAttr {
        /// Attribute name
        name: String,
        /// Whether the value may bypass sanitization
        trusted: bool,
    },

    /// Write queued attributes and insert the element
    FlushElement,

    /// Close the current element
    CloseElement,

    /// Bind the operand into the current dynamic scope
    SetDynamicVar(String),

    /// Resolve the operand to a component definition
    PutDynamicComponentDefinition,

    /// Install a statically known component definition
    PutComponentDefinition(ComponentDefinition),

    /// Run the component open protocol
    OpenComponent(OpenComponent),

    /// Tell the manager the component's element exists
    DidCreateElement,

    /// Write shadowed named arguments onto the component's element
    ShadowAttributes,

    /// Tell the manager the layout finished rendering
    DidRenderLayout,

    /// Run the component close protocol
    CloseComponent,

    /// Render the component's default block in the caller's scope
    Yield,
}

impl Opcode {
    /// Shorthand for [`Opcode::OpenComponent`].
    pub fn open_component(args: CompiledArgs, shadow: Vec<String>, templates: Templates) -> Self {
        Opcode::OpenComponent(OpenComponent {
            args,
            shadow,
            templates,
        })
    }

    /// The opcode's type name.
    pub fn name(&self) -> &'static str {
        match self {
            Opcode::Text(_) => TEXT,
            Opcode::PutValue(_) => PUT_VALUE,
            Opcode::DynamicContent => DYNAMIC_CONTENT,
            Opcode::OpenElement(_) => OPEN_ELEMENT,
            Opcode::StaticAttr { .. } => STATIC_ATTR,
            Opcode::DynamicAttr { .. } => DYNAMIC_ATTR,
            Opcode::FlushElement => FLUSH_ELEMENT,
            Opcode::CloseElement => CLOSE_ELEMENT,
            Opcode::SetDynamicVar(_) => SET_DYNAMIC_VAR,
            Opcode::PutDynamicComponentDefinition => PUT_DYNAMIC_COMPONENT_DEFINITION,
            Opcode::PutComponentDefinition(_) => PUT_COMPONENT_DEFINITION,
            Opcode::OpenComponent(_) => OPEN_COMPONENT,
            Opcode::DidCreateElement => DID_CREATE_ELEMENT,
            Opcode::ShadowAttributes => SHADOW_ATTRIBUTES,
            Opcode::DidRenderLayout => DID_RENDER_LAYOUT,
            Opcode::CloseComponent => CLOSE_COMPONENT,
            Opcode::Yield => YIELD,
        }
    }

    fn debug_args(&self) -> Vec<String> {
        match self {
            Opcode::Text(text) | Opcode::OpenElement(text) | Opcode::SetDynamicVar(text) => {
                vec![quote(text)]
            }
            Opcode::PutValue(expr) => vec![expr.describe()],
            Opcode::StaticAttr { name, value } => vec![quote(name), quote(value)],
            Opcode::DynamicAttr { name, trusted } => vec![quote(name), trusted.to_string()],
            Opcode::PutComponentDefinition(definition) => vec![quote(definition.name())],
            Opcode::OpenComponent(open) => open.shadow.iter().map(|s| quote(s)).collect(),
            Opcode::DidCreateElement | Opcode::ShadowAttributes => vec!["$ARGS".to_string()],
            _ => Vec::new(),
        }
    }
}

/// JSON-quote a string for debug output.
pub(crate) fn quote(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

/// Trait for executing an append-phase opcode.
///
/// This is the single dispatch point of the append VM.
pub trait Evaluate {
    /// Execute against the VM's execution context.
    fn evaluate(&self, vm: &mut AppendVm<'_>) -> Result<()>;
}

impl Evaluate for Opcode {
    fn evaluate(&self, vm: &mut AppendVm<'_>) -> Result<()> {
        match self {
            // Element construction
            Opcode::Text(text) => dom::text(vm, text),
            Opcode::PutValue(expr) => dom::put_value(vm, expr),
            Opcode::DynamicContent => dom::dynamic_content(vm),
            Opcode::OpenElement(tag) => dom::open_element(vm, tag),
            Opcode::StaticAttr { name, value } => dom::static_attr(vm, name, value),
            Opcode::DynamicAttr { name, trusted } => dom::dynamic_attr(vm, name, *trusted),
            Opcode::FlushElement => dom::flush_element(vm),
            Opcode::CloseElement => dom::close_element(vm),
            Opcode::SetDynamicVar(name) => dom::set_dynamic_var(vm, name),

            // Component lifecycle
            Opcode::PutDynamicComponentDefinition => component::put_dynamic_component_definition(vm),
            Opcode::PutComponentDefinition(definition) => {
                component::put_component_definition(vm, definition)
            }
            Opcode::OpenComponent(open) => component::open_component(vm, open),
            Opcode::DidCreateElement => component::did_create_element(vm),
            Opcode::ShadowAttributes => component::shadow_attributes(vm),
            Opcode::DidRenderLayout => component::did_render_layout(vm),
            Opcode::CloseComponent => component::close_component(vm),
            Opcode::Yield => component::yield_block(vm),
        }
    }
}

/// Debugging snapshot of an instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpcodeJson {
    /// Instruction guid
    pub guid: Guid,

    /// Opcode type name
    #[serde(rename = "type")]
    pub kind: &'static str,

    /// Rendered arguments
    pub args: Vec<String>,
}

/// An opcode stamped with a guid.
#[derive(Debug, Clone)]
pub struct Instruction {
    /// Unique id
    pub guid: Guid,

    /// The opcode itself
    pub opcode: Opcode,
}

impl Instruction {
    /// Stamp an opcode with a fresh guid.
    pub fn new(opcode: Opcode) -> Self {
        Self {
            guid: next_guid(),
            opcode,
        }
    }

    /// Debugging snapshot; not used by execution.
    pub fn to_json(&self) -> OpcodeJson {
        OpcodeJson {
            guid: self.guid,
            kind: self.opcode.name(),
            args: self.opcode.debug_args(),
        }
    }
}

/// An immutable, shareable opcode sequence.
#[derive(Clone, Default)]
pub struct Program {
    instructions: Arc<[Instruction]>,
}

impl Program {
    /// Build a program, stamping every opcode with a guid.
    pub fn new(opcodes: impl IntoIterator<Item = Opcode>) -> Self {
        opcodes.into_iter().collect()
    }

    /// The instruction at `pc`.
    pub fn get(&self, pc: usize) -> Option<&Instruction> {
        self.instructions.get(pc)
    }

    /// Number of instructions.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Check if the program is empty.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Iterate over instructions.
    pub fn iter(&self) -> impl Iterator<Item = &Instruction> {
        self.instructions.iter()
    }

    /// Debugging snapshot of every instruction.
    pub fn to_json(&self) -> Vec<OpcodeJson> {
        self.iter().map(Instruction::to_json).collect()
    }
}

impl FromIterator<Opcode> for Program {
    fn from_iter<I: IntoIterator<Item = Opcode>>(iter: I) -> Self {
        Self {
            instructions: iter.into_iter().map(Instruction::new).collect(),
        }
    }
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.iter().map(|i| i.opcode.name()))
            .finish()
    }
}
