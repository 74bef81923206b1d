//! Component lifecycle opcodes
//!
//! `OpenComponent` drives a component's manager through creation and
//! pushes the layout frame. The layout itself then emits
//! `DidCreateElement`, `ShadowAttributes` and `DidRenderLayout` at the
//! right points, and the caller's program closes the invocation with
//! `CloseComponent`.

use std::fmt;
use std::sync::Arc;

use super::dom::read_through_cache;
use super::names::*;
use super::updating::{AssertOpcode, UpdatingOpcode};
use super::OpenComponent;
use crate::component::{Component, ComponentDefinition, ComponentManager, EvaluatedArgs};
use crate::error::{RenderError, Result};
use crate::scope::DynamicScope;
use crate::tag::{combine, Revision, Tag};
use crate::value::Value;
use crate::vm::{AppendVm, Invocation, UpdatingVm};

pub(crate) fn put_dynamic_component_definition(vm: &mut AppendVm<'_>) -> Result<()> {
    let reference = vm
        .frame(PUT_DYNAMIC_COMPONENT_DEFINITION)?
        .operand(PUT_DYNAMIC_COMPONENT_DEFINITION)?;
    let (value, cache) = read_through_cache(PUT_DYNAMIC_COMPONENT_DEFINITION, reference)?;

    let definition = match value {
        Value::Definition(definition) => definition,
        other => return Err(RenderError::type_error("component definition", &other)),
    };
    vm.frame_mut(PUT_DYNAMIC_COMPONENT_DEFINITION)?
        .set_definition(definition);

    if let Some(cache) = cache {
        vm.update_with(UpdatingOpcode::Assert(AssertOpcode::new(cache)));
    }
    Ok(())
}

pub(crate) fn put_component_definition(
    vm: &mut AppendVm<'_>,
    definition: &ComponentDefinition,
) -> Result<()> {
    vm.frame_mut(PUT_COMPONENT_DEFINITION)?
        .set_definition(definition.clone());
    Ok(())
}

pub(crate) fn open_component(vm: &mut AppendVm<'_>, open: &OpenComponent) -> Result<()> {
    let definition = vm
        .frame_mut(OPEN_COMPONENT)?
        .take_definition(OPEN_COMPONENT)?;
    let manager = Arc::clone(definition.manager());
    let name = definition.name().to_string();
    let failed = |source| RenderError::manager(OPEN_COMPONENT, name.as_str(), source);

    let dynamic_scope = vm.push_dynamic_scope()?;
    let args = open.args.evaluate(vm)?;
    let args = manager.prepare_args(&definition, args).map_err(failed)?;

    let has_default_block = open.templates.default.is_some();
    let component = manager
        .create(&definition, &args, &dynamic_scope, has_default_block)
        .map_err(failed)?;
    if let Some(destructor) = manager.get_destructor(&component) {
        vm.new_destroyable(&name, destructor);
    }

    let layout = manager
        .layout_for(&definition, &component, vm.env())
        .map_err(failed)?;
    let caller_scope = vm.scope()?;
    let caller = vm.frame(OPEN_COMPONENT)?.invocation_handle();
    let self_ref = manager.get_self(&component);

    vm.begin_cache_group();
    vm.stack_mut().push_simple_block();
    vm.push_root_scope(self_ref, layout.symbols.size());
    vm.invoke_layout(
        &layout,
        Invocation {
            name: name.clone(),
            component: component.clone(),
            manager: Arc::clone(&manager),
            args: args.clone(),
            shadow: open.shadow.clone(),
            caller_scope,
            templates: open.templates.clone(),
            caller,
        },
    )?;

    vm.env().did_create(&component, manager.as_ref());
    tracing::debug!(component = %name, "component opened");

    vm.update_with(UpdatingOpcode::UpdateComponent(UpdateComponentOpcode::new(
        name,
        component,
        manager,
        args,
        dynamic_scope,
    )));
    Ok(())
}

pub(crate) fn did_create_element(vm: &mut AppendVm<'_>) -> Result<()> {
    let invocation = vm.frame(DID_CREATE_ELEMENT)?.invocation(DID_CREATE_ELEMENT)?;
    let (name, component, manager) = (
        invocation.name.clone(),
        invocation.component.clone(),
        Arc::clone(&invocation.manager),
    );

    let stack = vm.stack_mut();
    let element = stack.constructing().ok_or_else(|| {
        RenderError::protocol(DID_CREATE_ELEMENT, "no element under construction")
    })?;
    manager
        .did_create_element(&component, element, stack.operations_mut())
        .map_err(|source| RenderError::manager(DID_CREATE_ELEMENT, name, source))
}

pub(crate) fn shadow_attributes(vm: &mut AppendVm<'_>) -> Result<()> {
    let invocation = vm.frame(SHADOW_ATTRIBUTES)?.invocation(SHADOW_ATTRIBUTES)?;
    let shadowed: Vec<_> = invocation
        .shadow
        .iter()
        .map(|name| (name.clone(), invocation.args.get(name)))
        .collect();

    let stack = vm.stack_mut();
    for (name, reference) in shadowed {
        stack.set_dynamic_attribute(&name, reference, false)?;
    }
    Ok(())
}

pub(crate) fn did_render_layout(vm: &mut AppendVm<'_>) -> Result<()> {
    let invocation = vm.frame(DID_RENDER_LAYOUT)?.invocation(DID_RENDER_LAYOUT)?;
    let (name, component, manager) = (
        invocation.name.clone(),
        invocation.component.clone(),
        Arc::clone(&invocation.manager),
    );

    let bounds = vm.stack_mut().pop_block()?;
    manager
        .did_render_layout(&component, &bounds)
        .map_err(|source| RenderError::manager(DID_RENDER_LAYOUT, name, source))
}

pub(crate) fn close_component(vm: &mut AppendVm<'_>) -> Result<()> {
    vm.pop_scope(CLOSE_COMPONENT)?;
    vm.pop_dynamic_scope(CLOSE_COMPONENT)?;
    vm.commit_cache_group(CLOSE_COMPONENT)
}

pub(crate) fn yield_block(vm: &mut AppendVm<'_>) -> Result<()> {
    let invocation = vm.frame(YIELD)?.invocation(YIELD)?;
    let Some(block) = invocation.templates.default.clone() else {
        return Ok(());
    };
    let caller_scope = invocation.caller_scope;
    let caller = invocation.caller.clone();
    vm.invoke_block(block, caller_scope, caller)
}

/// Brings a component up to date when its arguments or own state moved.
pub struct UpdateComponentOpcode {
    name: String,
    component: Component,
    manager: Arc<dyn ComponentManager>,
    args: EvaluatedArgs,
    dynamic_scope: DynamicScope,
    tag: Tag,
    last_updated: Revision,
}

impl UpdateComponentOpcode {
    /// Snapshot the component's combined tag as of creation.
    pub fn new(
        name: String,
        component: Component,
        manager: Arc<dyn ComponentManager>,
        args: EvaluatedArgs,
        dynamic_scope: DynamicScope,
    ) -> Self {
        let tag = match manager.get_tag(&component) {
            Some(own) => combine([args.tag().clone(), own]),
            None => args.tag().clone(),
        };
        let last_updated = tag.value();
        Self {
            name,
            component,
            manager,
            args,
            dynamic_scope,
            tag,
            last_updated,
        }
    }

    /// Name of the component's definition.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Arguments tag combined with the component's own tag.
    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    pub(crate) fn evaluate(&mut self, vm: &mut UpdatingVm<'_>) -> Result<bool> {
        if self.tag.validate(self.last_updated) {
            return Ok(false);
        }

        self.manager
            .update(&self.component, &self.args, &self.dynamic_scope)
            .map_err(|source| RenderError::manager(UPDATE_COMPONENT, self.name.as_str(), source))?;
        vm.env().did_update(&self.component, self.manager.as_ref());
        tracing::debug!(component = %self.name, "component updated");

        self.last_updated = self.tag.value();
        Ok(true)
    }
}

impl fmt::Debug for UpdateComponentOpcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateComponentOpcode")
            .field("name", &self.name)
            .field("tag", &self.tag)
            .field("last_updated", &self.last_updated)
            .finish()
    }
}
