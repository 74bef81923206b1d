//! Execution frames

use std::sync::Arc;

use crate::component::{Component, ComponentDefinition, ComponentManager, EvaluatedArgs, Templates};
use crate::error::{RenderError, Result};
use crate::opcodes::Program;
use crate::reference::ValueRef;
use crate::scope::ScopeId;

/// What pushed a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// The program passed to `evaluate`
    Root,
    /// A component's layout
    Layout,
    /// A yielded block; owns one child scope
    Block,
}

/// The component a layout frame is rendering.
#[derive(Clone)]
pub struct Invocation {
    /// Definition name, for errors and logs
    pub name: String,
    /// Instance returned by the manager
    pub component: Component,
    /// Manager that created the instance
    pub manager: Arc<dyn ComponentManager>,
    /// Prepared arguments
    pub args: EvaluatedArgs,
    /// Named arguments to write onto the component's element
    pub shadow: Vec<String>,
    /// Scope of the invocation site, used by `Yield`
    pub caller_scope: ScopeId,
    /// Blocks passed by the caller
    pub templates: Templates,
    /// Invocation the caller itself was rendering for, if any
    pub caller: Option<Arc<Invocation>>,
}

/// One program being executed, with its registers.
pub struct Frame {
    program: Program,
    pub(crate) pc: usize,
    kind: FrameKind,
    operand: Option<ValueRef>,
    definition: Option<ComponentDefinition>,
    invocation: Option<Arc<Invocation>>,
}

impl Frame {
    pub(crate) fn new(program: Program, kind: FrameKind) -> Self {
        Self {
            program,
            pc: 0,
            kind,
            operand: None,
            definition: None,
            invocation: None,
        }
    }

    pub(crate) fn layout(program: Program, invocation: Invocation) -> Self {
        Self {
            invocation: Some(Arc::new(invocation)),
            ..Self::new(program, FrameKind::Layout)
        }
    }

    /// A yielded block belongs to the caller's template, so it runs under
    /// the caller's invocation rather than the yielding layout's.
    pub(crate) fn block(program: Program, invocation: Option<Arc<Invocation>>) -> Self {
        Self {
            invocation,
            ..Self::new(program, FrameKind::Block)
        }
    }

    /// The program being executed.
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Index of the next instruction.
    pub fn pc(&self) -> usize {
        self.pc
    }

    /// What pushed this frame.
    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    /// The operand register.
    pub fn operand(&self, opcode: &'static str) -> Result<ValueRef> {
        self.operand
            .clone()
            .ok_or_else(|| RenderError::protocol(opcode, "operand register is empty"))
    }

    pub(crate) fn set_operand(&mut self, reference: ValueRef) {
        self.operand = Some(reference);
    }

    pub(crate) fn set_definition(&mut self, definition: ComponentDefinition) {
        self.definition = Some(definition);
    }

    /// Consume the definition register.
    pub(crate) fn take_definition(&mut self, opcode: &'static str) -> Result<ComponentDefinition> {
        self.definition
            .take()
            .ok_or_else(|| RenderError::protocol(opcode, "no component definition in register"))
    }

    /// The component this frame renders for.
    pub fn invocation(&self, opcode: &'static str) -> Result<&Invocation> {
        self.invocation
            .as_deref()
            .ok_or_else(|| RenderError::protocol(opcode, "not inside a component layout"))
    }

    pub(crate) fn invocation_handle(&self) -> Option<Arc<Invocation>> {
        self.invocation.clone()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("kind", &self.kind)
            .field("pc", &self.pc)
            .field("len", &self.program.len())
            .field("component", &self.invocation.as_ref().map(|i| i.name.as_str()))
            .finish()
    }
}
