//! The append VM
//!
//! [`AppendVm`] executes a program once, building output through an
//! [`OutputAdapter`] and recording an [`UpdatingProgram`] as it goes. The
//! result of a render is a [`RenderResult`]; rerendering replays its
//! updating program through an [`UpdatingVm`].
//!
//! Every stack the VM keeps (frames, scopes, dynamic scopes, cache groups,
//! element blocks) is balanced by the program itself. If a program ends
//! with anything left open the render fails with a protocol violation, and
//! if an opcode fails the VM unwinds every stack back to where it started.

mod frame;
mod update;

pub use frame::{Frame, FrameKind, Invocation};
pub use update::{UpdateStats, UpdatingVm};

use std::mem;
use std::sync::Arc;

use crate::component::{Destroyable, DestructorList, Layout};
use crate::context::RenderContext;
use crate::dom::{Bounds, ElementStack, NodeId, OutputAdapter};
use crate::environment::Environment;
use crate::error::{RenderError, Result};
use crate::opcodes::{
    Evaluate, JumpIfNotModifiedOpcode, Program, UpdatingInstruction, UpdatingOpcode,
    UpdatingProgram,
};
use crate::reference::ValueRef;
use crate::scope::{DynamicScope, ScopeArena, ScopeId};
use crate::tag::combine;

const EVALUATE: &str = "evaluate";

/// Stack depths recorded before a render, restored when it fails.
#[derive(Debug, Clone, Copy)]
struct Checkpoint {
    arena: usize,
    scopes: usize,
    dynamic_scopes: usize,
    cache_groups: usize,
    updating: usize,
    elements: usize,
    blocks: usize,
}

/// Everything a finished render leaves behind.
#[derive(Debug)]
pub struct RenderResult {
    /// Nodes rendered into the root element
    pub bounds: Bounds,

    /// Instructions that keep the output current
    pub updating: UpdatingProgram,

    /// Teardown registered by the components that rendered
    pub destructors: DestructorList,
}

impl RenderResult {
    /// Revalidate the output against current reference values.
    pub fn rerender(
        &mut self,
        env: &dyn Environment,
        dom: &mut dyn OutputAdapter,
    ) -> Result<UpdateStats> {
        UpdatingVm::new(env, dom).execute(&mut self.updating)
    }

    /// Same as [`rerender`](Self::rerender) with explicit settings.
    pub fn rerender_with(
        &mut self,
        env: &dyn Environment,
        dom: &mut dyn OutputAdapter,
        ctx: RenderContext,
    ) -> Result<UpdateStats> {
        UpdatingVm::new(env, dom)
            .with_context(ctx)
            .execute(&mut self.updating)
    }

    /// Run every registered destructor. Returns how many ran; calling this
    /// again does nothing.
    pub fn destroy(&mut self) -> usize {
        self.destructors.destroy_all()
    }
}

/// Executes a program once, producing output and its updating program.
pub struct AppendVm<'a> {
    env: &'a dyn Environment,
    dom: &'a mut dyn OutputAdapter,
    ctx: RenderContext,
    frames: Vec<Frame>,
    stack: ElementStack,
    scopes: ScopeArena,
    scope_stack: Vec<ScopeId>,
    dynamic_scopes: Vec<DynamicScope>,
    updating: Vec<UpdatingInstruction>,
    cache_groups: Vec<usize>,
    destructors: DestructorList,
}

impl<'a> AppendVm<'a> {
    /// Create a VM that appends into `root`.
    pub fn new(env: &'a dyn Environment, dom: &'a mut dyn OutputAdapter, root: NodeId) -> Self {
        Self {
            env,
            dom,
            ctx: RenderContext::default(),
            frames: Vec::new(),
            stack: ElementStack::new(root),
            scopes: ScopeArena::new(),
            scope_stack: Vec::new(),
            dynamic_scopes: vec![DynamicScope::new()],
            updating: Vec::new(),
            cache_groups: Vec::new(),
            destructors: DestructorList::new(),
        }
    }

    /// Use custom settings.
    pub fn with_context(mut self, ctx: RenderContext) -> Self {
        self.ctx = ctx;
        self
    }

    /// Start from a host-provided dynamic scope instead of an empty one.
    pub fn with_dynamic_scope(mut self, scope: DynamicScope) -> Self {
        self.dynamic_scopes = vec![scope];
        self
    }

    /// Render `layout` with `self_ref` bound as the root scope's `self`.
    ///
    /// On failure every stack is unwound to its state before the call.
    /// Destructors of components created before the failure stay pending;
    /// run them with [`teardown`](Self::teardown).
    pub fn evaluate(&mut self, layout: &Layout, self_ref: ValueRef) -> Result<RenderResult> {
        let checkpoint = self.checkpoint();
        tracing::debug!(instructions = layout.program.len(), "render started");

        match self.render(layout, self_ref, checkpoint) {
            Ok(result) => {
                tracing::debug!(
                    updating = result.updating.len(),
                    destructors = result.destructors.len(),
                    "render finished"
                );
                Ok(result)
            }
            Err(err) => {
                tracing::warn!(error = %err, "render failed, unwinding");
                self.unwind(checkpoint);
                Err(err)
            }
        }
    }

    /// Run destructors registered by a failed render.
    pub fn teardown(&mut self) -> usize {
        self.destructors.destroy_all()
    }

    fn render(
        &mut self,
        layout: &Layout,
        self_ref: ValueRef,
        checkpoint: Checkpoint,
    ) -> Result<RenderResult> {
        let root = self.scopes.push_root(self_ref, layout.symbols.size());
        self.scope_stack.push(root);
        self.stack.push_simple_block();
        self.frames
            .push(Frame::new(layout.program.clone(), FrameKind::Root));

        self.run()?;
        self.check_balanced(checkpoint)?;

        let bounds = self.stack.pop_block()?;
        self.pop_scope(EVALUATE)?;
        let updating = self.updating.split_off(checkpoint.updating);
        Ok(RenderResult {
            bounds,
            updating: UpdatingProgram::new(updating),
            destructors: mem::take(&mut self.destructors),
        })
    }

    fn run(&mut self) -> Result<()> {
        while let Some(frame) = self.frames.last_mut() {
            let program = frame.program().clone();
            let Some(instruction) = program.get(frame.pc) else {
                self.exit_frame()?;
                continue;
            };
            frame.pc += 1;

            if self.ctx.trace {
                tracing::trace!(
                    guid = instruction.guid,
                    opcode = instruction.opcode.name(),
                    depth = self.frames.len(),
                    "append"
                );
            }
            instruction.opcode.evaluate(self)?;
        }
        Ok(())
    }

    fn exit_frame(&mut self) -> Result<()> {
        if let Some(frame) = self.frames.pop() {
            if frame.kind() == FrameKind::Block {
                self.pop_scope(crate::opcodes::names::YIELD)?;
            }
        }
        Ok(())
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            arena: self.scopes.len(),
            scopes: self.scope_stack.len(),
            dynamic_scopes: self.dynamic_scopes.len(),
            cache_groups: self.cache_groups.len(),
            updating: self.updating.len(),
            elements: self.stack.element_depth(),
            blocks: self.stack.block_depth(),
        }
    }

    fn check_balanced(&self, checkpoint: Checkpoint) -> Result<()> {
        if self.stack.constructing().is_some() {
            return Err(RenderError::protocol(
                EVALUATE,
                "program ended with an element under construction",
            ));
        }

        let depths = [
            ("scope", self.scope_stack.len(), checkpoint.scopes + 1),
            ("dynamic scope", self.dynamic_scopes.len(), checkpoint.dynamic_scopes),
            ("cache group", self.cache_groups.len(), checkpoint.cache_groups),
            ("element", self.stack.element_depth(), checkpoint.elements),
            ("block", self.stack.block_depth(), checkpoint.blocks + 1),
        ];
        for (what, actual, expected) in depths {
            if actual != expected {
                return Err(RenderError::protocol(
                    EVALUATE,
                    format!(
                        "program ended with {} stack at depth {}, expected {}",
                        what, actual, expected
                    ),
                ));
            }
        }
        Ok(())
    }

    fn unwind(&mut self, checkpoint: Checkpoint) {
        self.frames.clear();
        self.scopes.truncate(checkpoint.arena);
        self.scope_stack.truncate(checkpoint.scopes);
        self.dynamic_scopes.truncate(checkpoint.dynamic_scopes);
        self.cache_groups.truncate(checkpoint.cache_groups);
        self.updating.truncate(checkpoint.updating);
        self.stack.reset_to(checkpoint.elements, checkpoint.blocks);
    }

    // Introspection

    /// Number of open lexical scopes.
    pub fn scope_depth(&self) -> usize {
        self.scope_stack.len()
    }

    /// Number of open dynamic scopes, including the base scope.
    pub fn dynamic_scope_depth(&self) -> usize {
        self.dynamic_scopes.len()
    }

    /// Number of open cache groups.
    pub fn cache_group_depth(&self) -> usize {
        self.cache_groups.len()
    }

    /// Number of open element blocks.
    pub fn block_depth(&self) -> usize {
        self.stack.block_depth()
    }

    /// Number of active frames.
    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    /// Number of destructors not yet handed off or run.
    pub fn pending_destructors(&self) -> usize {
        self.destructors.len()
    }

    // Opcode support

    pub(crate) fn env(&self) -> &'a dyn Environment {
        self.env
    }

    pub(crate) fn frame(&self, opcode: &'static str) -> Result<&Frame> {
        self.frames
            .last()
            .ok_or_else(|| RenderError::protocol(opcode, "no active frame"))
    }

    pub(crate) fn frame_mut(&mut self, opcode: &'static str) -> Result<&mut Frame> {
        self.frames
            .last_mut()
            .ok_or_else(|| RenderError::protocol(opcode, "no active frame"))
    }

    pub(crate) fn stack_mut(&mut self) -> &mut ElementStack {
        &mut self.stack
    }

    pub(crate) fn stack_and_dom(&mut self) -> (&mut ElementStack, &mut dyn OutputAdapter) {
        (&mut self.stack, &mut *self.dom)
    }

    /// The innermost lexical scope.
    pub(crate) fn scope(&self) -> Result<ScopeId> {
        self.scope_stack
            .last()
            .copied()
            .ok_or_else(|| RenderError::protocol(EVALUATE, "no active scope"))
    }

    pub(crate) fn self_ref(&self) -> Result<ValueRef> {
        let scope = self.scope()?;
        self.scopes
            .self_ref(scope)
            .cloned()
            .ok_or_else(|| RenderError::protocol(EVALUATE, "scope has no self"))
    }

    pub(crate) fn symbol(&self, slot: usize) -> Option<ValueRef> {
        let scope = self.scope().ok()?;
        self.scopes.symbol(scope, slot).cloned()
    }

    pub(crate) fn push_root_scope(&mut self, self_ref: ValueRef, size: usize) -> ScopeId {
        let id = self.scopes.push_root(self_ref, size);
        self.scope_stack.push(id);
        id
    }

    pub(crate) fn pop_scope(&mut self, opcode: &'static str) -> Result<()> {
        let id = self
            .scope_stack
            .pop()
            .ok_or_else(|| RenderError::protocol(opcode, "scope stack underflow"))?;
        self.scopes.release(id);
        Ok(())
    }

    pub(crate) fn dynamic_scope(&self) -> Result<&DynamicScope> {
        self.dynamic_scopes
            .last()
            .ok_or_else(|| RenderError::protocol(EVALUATE, "no dynamic scope"))
    }

    /// Push a child of the current dynamic scope and return a handle to it.
    pub(crate) fn push_dynamic_scope(&mut self) -> Result<DynamicScope> {
        let child = self.dynamic_scope()?.child();
        self.dynamic_scopes.push(child.clone());
        Ok(child)
    }

    pub(crate) fn pop_dynamic_scope(&mut self, opcode: &'static str) -> Result<()> {
        if self.dynamic_scopes.len() <= 1 {
            return Err(RenderError::protocol(opcode, "dynamic scope stack underflow"));
        }
        self.dynamic_scopes.pop();
        Ok(())
    }

    pub(crate) fn update_with(&mut self, opcode: UpdatingOpcode) {
        self.updating.push(UpdatingInstruction::new(opcode));
    }

    pub(crate) fn begin_cache_group(&mut self) {
        self.cache_groups.push(self.updating.len());
        self.update_with(UpdatingOpcode::JumpIfNotModified(
            JumpIfNotModifiedOpcode::placeholder(),
        ));
    }

    /// Seal the innermost cache group.
    ///
    /// An empty group leaves nothing behind. Otherwise the guard takes the
    /// combined tag of everything recorded after it and learns where its
    /// region ends.
    pub(crate) fn commit_cache_group(&mut self, opcode: &'static str) -> Result<()> {
        let guard = self
            .cache_groups
            .pop()
            .ok_or_else(|| RenderError::protocol(opcode, "cache group stack underflow"))?;

        if self.updating.len() == guard + 1 {
            self.updating.truncate(guard);
            return Ok(());
        }

        let recorded = self.updating.get(guard + 1..).unwrap_or_default();
        let tag = combine(recorded.iter().map(|i| i.opcode.tag()));
        tag.check(opcode)?;
        self.update_with(UpdatingOpcode::DidModify { guard });
        let target = self.updating.len();

        match self.updating.get_mut(guard).map(|i| &mut i.opcode) {
            Some(UpdatingOpcode::JumpIfNotModified(op)) => {
                op.finalize(tag, target);
                Ok(())
            }
            _ => Err(RenderError::protocol(opcode, "cache group guard is missing")),
        }
    }

    pub(crate) fn new_destroyable(&mut self, component: &str, destructor: Box<dyn Destroyable>) {
        self.destructors.push(component, destructor);
    }

    fn check_depth(&self) -> Result<()> {
        let depth = self.frames.len() + 1;
        if depth > self.ctx.max_depth {
            return Err(RenderError::DepthExceeded {
                depth,
                max: self.ctx.max_depth,
            });
        }
        Ok(())
    }

    /// Push a component's layout frame. The layout's root scope must
    /// already be on top of the scope stack; every named symbol is bound to
    /// the matching named argument, or to undefined when the caller left it
    /// out.
    pub(crate) fn invoke_layout(&mut self, layout: &Layout, invocation: Invocation) -> Result<()> {
        self.check_depth()?;

        let scope = self.scope()?;
        for (name, slot) in layout.symbols.named() {
            self.scopes
                .bind_symbol(scope, slot, invocation.args.get(name))?;
        }

        if self.ctx.trace {
            tracing::trace!(component = %invocation.name, depth = self.frames.len() + 1, "enter layout");
        }
        self.frames
            .push(Frame::layout(layout.program.clone(), invocation));
        Ok(())
    }

    /// Push a block frame running in a child of `caller_scope`.
    pub(crate) fn invoke_block(
        &mut self,
        program: Program,
        caller_scope: ScopeId,
        caller: Option<Arc<Invocation>>,
    ) -> Result<()> {
        self.check_depth()?;

        let scope = self.scopes.push_child(caller_scope, 0)?;
        self.scope_stack.push(scope);
        self.frames.push(Frame::block(program, caller));
        Ok(())
    }
}

impl std::fmt::Debug for AppendVm<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppendVm")
            .field("frames", &self.frames)
            .field("scopes", &self.scope_stack.len())
            .field("dynamic_scopes", &self.dynamic_scopes.len())
            .field("cache_groups", &self.cache_groups)
            .field("updating", &self.updating.len())
            .finish()
    }
}
