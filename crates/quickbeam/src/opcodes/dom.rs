//! Element and content opcodes

use super::names::*;
use super::updating::UpdatingOpcode;
use super::Expression;
use crate::dom::{apply_attribute, AttributeBinding, NodeId};
use crate::error::Result;
use crate::reference::{Reference, ReferenceCache, Validation, ValueRef};
use crate::tag::Tag;
use crate::value::Value;
use crate::vm::{AppendVm, UpdatingVm};

pub(crate) fn text(vm: &mut AppendVm<'_>, text: &str) -> Result<()> {
    let (stack, dom) = vm.stack_and_dom();
    stack.append_text(dom, text)?;
    Ok(())
}

pub(crate) fn put_value(vm: &mut AppendVm<'_>, expr: &Expression) -> Result<()> {
    let reference = expr.evaluate(vm)?;
    vm.frame_mut(PUT_VALUE)?.set_operand(reference);
    Ok(())
}

pub(crate) fn dynamic_content(vm: &mut AppendVm<'_>) -> Result<()> {
    let reference = vm.frame(DYNAMIC_CONTENT)?.operand(DYNAMIC_CONTENT)?;
    let (value, cache) = read_through_cache(DYNAMIC_CONTENT, reference)?;

    let (stack, dom) = vm.stack_and_dom();
    let node = stack.append_text(dom, &value.to_text())?;
    if let Some(cache) = cache {
        vm.update_with(UpdatingOpcode::UpdateText(UpdateTextOpcode { node, cache }));
    }
    Ok(())
}

pub(crate) fn open_element(vm: &mut AppendVm<'_>, tag: &str) -> Result<()> {
    let (stack, dom) = vm.stack_and_dom();
    stack.open_element(dom, tag)?;
    Ok(())
}

pub(crate) fn static_attr(vm: &mut AppendVm<'_>, name: &str, value: &str) -> Result<()> {
    vm.stack_mut().set_static_attribute(name, value)
}

pub(crate) fn dynamic_attr(vm: &mut AppendVm<'_>, name: &str, trusted: bool) -> Result<()> {
    let reference = vm.frame(DYNAMIC_ATTR)?.operand(DYNAMIC_ATTR)?;
    vm.stack_mut().set_dynamic_attribute(name, reference, trusted)
}

pub(crate) fn flush_element(vm: &mut AppendVm<'_>) -> Result<()> {
    let (stack, dom) = vm.stack_and_dom();
    let bindings = stack.flush_element(dom)?;
    for binding in bindings {
        vm.update_with(UpdatingOpcode::UpdateAttribute(binding.into()));
    }
    Ok(())
}

pub(crate) fn close_element(vm: &mut AppendVm<'_>) -> Result<()> {
    vm.stack_mut().close_element()?;
    Ok(())
}

pub(crate) fn set_dynamic_var(vm: &mut AppendVm<'_>, name: &str) -> Result<()> {
    let reference = vm.frame(SET_DYNAMIC_VAR)?.operand(SET_DYNAMIC_VAR)?;
    vm.dynamic_scope()?.set(name, reference);
    Ok(())
}

/// Read a reference's value, keeping a cache only if it can change.
///
/// A reference from a destroyed source is a [`StaleTag`](crate::RenderError::StaleTag)
/// read attributed to `opcode`.
pub(crate) fn read_through_cache(
    opcode: &'static str,
    reference: ValueRef,
) -> Result<(Value, Option<ReferenceCache<Value>>)> {
    reference.tag().check(opcode)?;
    Ok(match ReferenceCache::for_reference(reference.clone()) {
        Some(mut cache) => (cache.peek(), Some(cache)),
        None => (reference.value(), None),
    })
}

/// Rewrites a text node when its content changes.
#[derive(Debug)]
pub struct UpdateTextOpcode {
    node: NodeId,
    cache: ReferenceCache<Value>,
}

impl UpdateTextOpcode {
    /// The text node being kept current.
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub(crate) fn tag(&self) -> Tag {
        self.cache.tag()
    }

    pub(crate) fn evaluate(&mut self, vm: &mut UpdatingVm<'_>) -> Result<bool> {
        match self.cache.revalidate() {
            Validation::Changed(value) => {
                vm.dom_mut().set_text(self.node, &value.to_text());
                Ok(true)
            }
            Validation::Unchanged => Ok(false),
        }
    }
}

/// Rewrites an attribute when its value changes.
#[derive(Debug)]
pub struct UpdateAttributeOpcode {
    element: NodeId,
    name: String,
    cache: ReferenceCache<Value>,
    trusted: bool,
}

impl UpdateAttributeOpcode {
    /// The element carrying the attribute.
    pub fn element(&self) -> NodeId {
        self.element
    }

    /// Attribute name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn tag(&self) -> Tag {
        self.cache.tag()
    }

    pub(crate) fn evaluate(&mut self, vm: &mut UpdatingVm<'_>) -> Result<bool> {
        match self.cache.revalidate() {
            Validation::Changed(value) => {
                apply_attribute(vm.dom_mut(), self.element, &self.name, &value, self.trusted);
                Ok(true)
            }
            Validation::Unchanged => Ok(false),
        }
    }
}

impl From<AttributeBinding> for UpdateAttributeOpcode {
    fn from(binding: AttributeBinding) -> Self {
        Self {
            element: binding.element,
            name: binding.name,
            cache: binding.cache,
            trusted: binding.trusted,
        }
    }
}
