//! Revalidation-phase opcodes
//!
//! The append VM leaves behind an [`UpdatingProgram`]: one entry for every
//! piece of output that depends on something that can change. Each entry
//! carries the [`Tag`] it depends on. Component regions are bracketed by a
//! [`JumpIfNotModifiedOpcode`] guard and a matching
//! [`DidModify`](UpdatingOpcode::DidModify), so an untouched component is
//! skipped with a single tag comparison.

use serde::Serialize;

use super::component::UpdateComponentOpcode;
use super::dom::{UpdateAttributeOpcode, UpdateTextOpcode};
use super::names::*;
use super::{next_guid, quote, Guid, OpcodeJson};
use crate::error::{RenderError, Result};
use crate::reference::{ReferenceCache, Validation};
use crate::tag::{Revision, Tag, CONSTANT};
use crate::value::Value;

/// Fails revalidation if a dynamic component definition changed.
#[derive(Debug)]
pub struct AssertOpcode {
    cache: ReferenceCache<Value>,
}

impl AssertOpcode {
    /// Guard a cache that already holds the rendered definition.
    pub fn new(cache: ReferenceCache<Value>) -> Self {
        Self { cache }
    }

    pub(crate) fn evaluate(&mut self) -> Result<bool> {
        match self.cache.revalidate() {
            Validation::Unchanged => Ok(false),
            Validation::Changed(value) => Err(RenderError::DefinitionChanged {
                name: value.to_text(),
            }),
        }
    }
}

/// Skips to `target` while the guarded region's tag is unchanged.
#[derive(Debug)]
pub struct JumpIfNotModifiedOpcode {
    tag: Tag,
    last_revision: Revision,
    target: usize,
}

impl JumpIfNotModifiedOpcode {
    pub(crate) fn placeholder() -> Self {
        Self {
            tag: Tag::Const,
            last_revision: CONSTANT,
            target: 0,
        }
    }

    /// Seal the guard once its region is complete.
    pub(crate) fn finalize(&mut self, tag: Tag, target: usize) {
        self.last_revision = tag.value();
        self.tag = tag;
        self.target = target;
    }

    /// Index of the instruction just past the region's `DidModify`.
    pub fn target(&self) -> usize {
        self.target
    }

    /// Whether the region can be skipped.
    pub(crate) fn is_unmodified(&self) -> bool {
        self.tag.validate(self.last_revision)
    }

    /// Remember the region's current revision.
    pub(crate) fn did_modify(&mut self) {
        self.last_revision = self.tag.value();
    }
}

/// An updating-phase instruction.
#[derive(Debug)]
pub enum UpdatingOpcode {
    /// Re-run a component's `update` hook when its inputs moved
    UpdateComponent(UpdateComponentOpcode),

    /// Fail if a dynamic definition changed
    Assert(AssertOpcode),

    /// Rewrite a text node
    UpdateText(UpdateTextOpcode),

    /// Rewrite an attribute
    UpdateAttribute(UpdateAttributeOpcode),

    /// Cache guard opening a component region
    JumpIfNotModified(JumpIfNotModifiedOpcode),

    /// Closes a region; refreshes the guard at index `guard`
    DidModify {
        /// Index of the matching guard
        guard: usize,
    },
}

impl UpdatingOpcode {
    /// The opcode's type name.
    pub fn name(&self) -> &'static str {
        match self {
            UpdatingOpcode::UpdateComponent(_) => UPDATE_COMPONENT,
            UpdatingOpcode::Assert(_) => ASSERT,
            UpdatingOpcode::UpdateText(_) => UPDATE_TEXT,
            UpdatingOpcode::UpdateAttribute(_) => UPDATE_ATTRIBUTE,
            UpdatingOpcode::JumpIfNotModified(_) => JUMP_IF_NOT_MODIFIED,
            UpdatingOpcode::DidModify { .. } => DID_MODIFY,
        }
    }

    /// The tag this instruction depends on.
    pub fn tag(&self) -> Tag {
        match self {
            UpdatingOpcode::UpdateComponent(op) => op.tag().clone(),
            UpdatingOpcode::Assert(op) => op.cache.tag(),
            UpdatingOpcode::UpdateText(op) => op.tag(),
            UpdatingOpcode::UpdateAttribute(op) => op.tag(),
            UpdatingOpcode::JumpIfNotModified(op) => op.tag.clone(),
            UpdatingOpcode::DidModify { .. } => Tag::Const,
        }
    }

    fn debug_args(&self) -> Vec<String> {
        match self {
            UpdatingOpcode::UpdateComponent(op) => vec![quote(op.name())],
            UpdatingOpcode::Assert(_) => Vec::new(),
            UpdatingOpcode::UpdateText(op) => vec![op.node().0.to_string()],
            UpdatingOpcode::UpdateAttribute(op) => {
                vec![op.element().0.to_string(), quote(op.name())]
            }
            UpdatingOpcode::JumpIfNotModified(op) => vec![op.target.to_string()],
            UpdatingOpcode::DidModify { guard } => vec![guard.to_string()],
        }
    }
}

/// An updating opcode stamped with a guid.
#[derive(Debug)]
pub struct UpdatingInstruction {
    /// Unique id
    pub guid: Guid,

    /// The opcode itself
    pub opcode: UpdatingOpcode,
}

impl UpdatingInstruction {
    /// Stamp an opcode with a fresh guid.
    pub fn new(opcode: UpdatingOpcode) -> Self {
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

/// The updating program produced by one render.
#[derive(Debug, Default)]
pub struct UpdatingProgram {
    pub(crate) instructions: Vec<UpdatingInstruction>,
}

#[derive(Serialize)]
struct ProgramDump<'a> {
    opcodes: &'a [OpcodeJson],
}

impl UpdatingProgram {
    /// Wrap a finished instruction list.
    pub fn new(instructions: Vec<UpdatingInstruction>) -> Self {
        Self { instructions }
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
    pub fn iter(&self) -> impl Iterator<Item = &UpdatingInstruction> {
        self.instructions.iter()
    }

    /// Type names in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.iter().map(|i| i.opcode.name()).collect()
    }

    /// Debugging snapshot of every instruction.
    pub fn to_json(&self) -> Vec<OpcodeJson> {
        self.iter().map(UpdatingInstruction::to_json).collect()
    }

    /// Pretty-printed JSON dump for logs.
    pub fn dump(&self) -> String {
        let opcodes = self.to_json();
        serde_json::to_string_pretty(&ProgramDump { opcodes: &opcodes }).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_skips_until_region_changes() {
        let (tag, handle) = Tag::dirtyable();
        let mut guard = JumpIfNotModifiedOpcode::placeholder();
        guard.finalize(tag, 3);

        assert!(guard.is_unmodified());
        assert_eq!(guard.target(), 3);

        handle.dirty();
        assert!(!guard.is_unmodified());
        guard.did_modify();
        assert!(guard.is_unmodified());
    }

    #[test]
    fn test_volatile_guard_never_skips() {
        let mut guard = JumpIfNotModifiedOpcode::placeholder();
        guard.finalize(Tag::Volatile, 1);
        assert!(!guard.is_unmodified());
    }

    #[test]
    fn test_program_names_and_dump() {
        let program = UpdatingProgram::new(vec![
            UpdatingInstruction::new(UpdatingOpcode::JumpIfNotModified(
                JumpIfNotModifiedOpcode::placeholder(),
            )),
            UpdatingInstruction::new(UpdatingOpcode::DidModify { guard: 0 }),
        ]);
        assert_eq!(program.names(), vec!["jump-if-not-modified", "did-modify"]);

        let dump: serde_json::Value = serde_json::from_str(&program.dump()).unwrap();
        assert_eq!(dump["opcodes"][1]["type"], "did-modify");
        assert_eq!(dump["opcodes"][1]["args"][0], "0");
    }
}
