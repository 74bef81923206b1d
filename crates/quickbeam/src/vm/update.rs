//! The updating VM

use crate::context::RenderContext;
use crate::dom::OutputAdapter;
use crate::environment::Environment;
use crate::error::Result;
use crate::opcodes::{UpdatingOpcode, UpdatingProgram};

/// Counters from one revalidation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateStats {
    /// Instructions executed
    pub visited: usize,

    /// Instructions that changed output or updated a component
    pub updated: usize,

    /// Component regions skipped by their guard
    pub skipped_groups: usize,
}

enum Step {
    Next { updated: bool },
    Jump(usize),
    Modified(usize),
}

/// Walks an updating program and re-syncs output with current values.
///
/// Each instruction compares its tag with the revision it last saw; only
/// instructions whose tag moved do any work.
pub struct UpdatingVm<'a> {
    env: &'a dyn Environment,
    dom: &'a mut dyn OutputAdapter,
    ctx: RenderContext,
}

impl<'a> UpdatingVm<'a> {
    /// Create an updating VM.
    pub fn new(env: &'a dyn Environment, dom: &'a mut dyn OutputAdapter) -> Self {
        Self {
            env,
            dom,
            ctx: RenderContext::default(),
        }
    }

    /// Use custom settings.
    pub fn with_context(mut self, ctx: RenderContext) -> Self {
        self.ctx = ctx;
        self
    }

    /// Execute every instruction in order, honoring cache-group jumps.
    ///
    /// Reading a destroyed tag fails with
    /// [`StaleTag`](crate::RenderError::StaleTag).
    pub fn execute(&mut self, program: &mut UpdatingProgram) -> Result<UpdateStats> {
        let mut stats = UpdateStats::default();
        let mut pc = 0;

        while pc < program.instructions.len() {
            let step = {
                let instruction = &mut program.instructions[pc];
                let name = instruction.opcode.name();
                instruction
                    .opcode
                    .tag()
                    .check(format_args!("{} #{}", name, instruction.guid))?;

                if self.ctx.trace {
                    tracing::trace!(guid = instruction.guid, opcode = name, pc, "update");
                }
                stats.visited += 1;
                self.step(&mut instruction.opcode)?
            };

            match step {
                Step::Next { updated } => {
                    if updated {
                        stats.updated += 1;
                    }
                    pc += 1;
                }
                Step::Jump(target) => {
                    stats.skipped_groups += 1;
                    pc = target;
                }
                Step::Modified(guard) => {
                    if let Some(UpdatingOpcode::JumpIfNotModified(op)) =
                        program.instructions.get_mut(guard).map(|i| &mut i.opcode)
                    {
                        op.did_modify();
                    }
                    pc += 1;
                }
            }
        }

        tracing::debug!(
            visited = stats.visited,
            updated = stats.updated,
            skipped = stats.skipped_groups,
            "revalidation finished"
        );
        Ok(stats)
    }

    fn step(&mut self, opcode: &mut UpdatingOpcode) -> Result<Step> {
        let updated = match opcode {
            UpdatingOpcode::JumpIfNotModified(op) => {
                if op.is_unmodified() {
                    return Ok(Step::Jump(op.target()));
                }
                false
            }
            UpdatingOpcode::DidModify { guard } => return Ok(Step::Modified(*guard)),
            UpdatingOpcode::UpdateComponent(op) => op.evaluate(self)?,
            UpdatingOpcode::Assert(op) => op.evaluate()?,
            UpdatingOpcode::UpdateText(op) => op.evaluate(self)?,
            UpdatingOpcode::UpdateAttribute(op) => op.evaluate(self)?,
        };
        Ok(Step::Next { updated })
    }

    pub(crate) fn env(&self) -> &'a dyn Environment {
        self.env
    }

    pub(crate) fn dom_mut(&mut self) -> &mut dyn OutputAdapter {
        &mut *self.dom
    }
}
