//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use quickbeam::*;

/// Error raised by a manager configured to fail.
#[derive(Debug, thiserror::Error)]
#[error("boom in {0}")]
pub struct Boom(pub &'static str);

/// Which manager hook should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailAt {
    #[default]
    Nowhere,
    Create,
    Layout,
    Update,
    DidCreateElement,
}

/// Per-hook call counters.
#[derive(Debug, Default)]
pub struct Counters {
    pub created: AtomicUsize,
    pub updated: AtomicUsize,
    pub destroyed: AtomicUsize,
    pub elements: AtomicUsize,
    pub layouts_rendered: AtomicUsize,
}

impl Counters {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn updated(&self) -> usize {
        self.updated.load(Ordering::SeqCst)
    }

    pub fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }

    pub fn elements(&self) -> usize {
        self.elements.load(Ordering::SeqCst)
    }

    pub fn layouts_rendered(&self) -> usize {
        self.layouts_rendered.load(Ordering::SeqCst)
    }
}

/// Instance state created by [`CountingManager`].
#[derive(Debug)]
pub struct Instance {
    pub name: String,
    pub has_block: bool,
    pub seen: Mutex<Vec<Value>>,
    pub dynamic_scope: DynamicScope,
}

/// A manager that renders a fixed layout and counts every hook.
pub struct CountingManager {
    pub layout: Arc<Layout>,
    pub counters: Arc<Counters>,
    pub fail_at: FailAt,
    pub own_tag: Option<Tag>,
    pub with_destructor: bool,
    pub log: Option<Arc<Mutex<Vec<String>>>>,
}

impl CountingManager {
    pub fn new(layout: Layout) -> Self {
        Self {
            layout: Arc::new(layout),
            counters: Arc::new(Counters::default()),
            fail_at: FailAt::Nowhere,
            own_tag: None,
            with_destructor: false,
            log: None,
        }
    }

    pub fn failing_at(mut self, fail_at: FailAt) -> Self {
        self.fail_at = fail_at;
        self
    }

    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.own_tag = Some(tag);
        self
    }

    pub fn with_destructor(mut self) -> Self {
        self.with_destructor = true;
        self
    }

    pub fn logging_to(mut self, log: Arc<Mutex<Vec<String>>>) -> Self {
        self.log = Some(log);
        self
    }

    fn record(&self, event: String) {
        if let Some(log) = &self.log {
            log.lock().unwrap().push(event);
        }
    }
}

impl ComponentManager for CountingManager {
    fn create(
        &self,
        definition: &ComponentDefinition,
        args: &EvaluatedArgs,
        dynamic_scope: &DynamicScope,
        has_default_block: bool,
    ) -> anyhow::Result<Component> {
        if self.fail_at == FailAt::Create {
            return Err(Boom("create").into());
        }
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        self.record(format!("create {}", definition.name()));
        Ok(Component::new(Instance {
            name: definition.name().to_string(),
            has_block: has_default_block,
            seen: Mutex::new(vec![args.value("title")]),
            dynamic_scope: dynamic_scope.clone(),
        }))
    }

    fn get_self(&self, component: &Component) -> ValueRef {
        let name = component
            .downcast_ref::<Instance>()
            .map(|i| i.name.clone())
            .unwrap_or_default();
        const_ref(name)
    }

    fn get_tag(&self, _component: &Component) -> Option<Tag> {
        self.own_tag.clone()
    }

    fn layout_for(
        &self,
        _definition: &ComponentDefinition,
        _component: &Component,
        _env: &dyn Environment,
    ) -> anyhow::Result<Arc<Layout>> {
        if self.fail_at == FailAt::Layout {
            return Err(Boom("layout").into());
        }
        Ok(Arc::clone(&self.layout))
    }

    fn update(
        &self,
        component: &Component,
        args: &EvaluatedArgs,
        _dynamic_scope: &DynamicScope,
    ) -> anyhow::Result<()> {
        if self.fail_at == FailAt::Update {
            return Err(Boom("update").into());
        }
        self.counters.updated.fetch_add(1, Ordering::SeqCst);
        if let Some(instance) = component.downcast_ref::<Instance>() {
            instance.seen.lock().unwrap().push(args.value("title"));
            self.record(format!("update {}", instance.name));
        }
        Ok(())
    }

    fn did_create_element(
        &self,
        _component: &Component,
        _element: NodeId,
        operations: &mut ElementOperations,
    ) -> anyhow::Result<()> {
        if self.fail_at == FailAt::DidCreateElement {
            return Err(Boom("did-create-element").into());
        }
        self.counters.elements.fetch_add(1, Ordering::SeqCst);
        operations.add_static_attribute("data-component", "true");
        Ok(())
    }

    fn did_render_layout(&self, _component: &Component, _bounds: &Bounds) -> anyhow::Result<()> {
        self.counters.layouts_rendered.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn get_destructor(&self, component: &Component) -> Option<Box<dyn Destroyable>> {
        if !self.with_destructor {
            return None;
        }
        let counters = Arc::clone(&self.counters);
        let log = self.log.clone();
        let name = component
            .downcast_ref::<Instance>()
            .map(|i| i.name.clone())
            .unwrap_or_default();
        Some(Box::new(move || {
            counters.destroyed.fetch_add(1, Ordering::SeqCst);
            if let Some(log) = log {
                log.lock().unwrap().push(format!("destroy {}", name));
            }
        }))
    }
}

/// An environment recording every notification.
#[derive(Debug, Default)]
pub struct RecordingEnvironment {
    pub created: AtomicUsize,
    pub updated: AtomicUsize,
}

impl RecordingEnvironment {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn updated(&self) -> usize {
        self.updated.load(Ordering::SeqCst)
    }
}

impl Environment for RecordingEnvironment {
    fn did_create(&self, _component: &Component, _manager: &dyn ComponentManager) {
        self.created.fetch_add(1, Ordering::SeqCst);
    }

    fn did_update(&self, _component: &Component, _manager: &dyn ComponentManager) {
        self.updated.fetch_add(1, Ordering::SeqCst);
    }
}

/// `<div data-component ...>{{title}}</div>` with `title` in slot 0.
pub fn title_layout() -> Layout {
    Layout::new(
        Program::new([
            Opcode::OpenElement("div".into()),
            Opcode::DidCreateElement,
            Opcode::ShadowAttributes,
            Opcode::FlushElement,
            Opcode::PutValue(Expression::Symbol(0)),
            Opcode::DynamicContent,
            Opcode::CloseElement,
            Opcode::DidRenderLayout,
        ]),
        SymbolTable::new().with_named("title"),
    )
}

/// A layout rendering only static text.
pub fn static_layout(text: &str) -> Layout {
    Layout::new(
        Program::new([
            Opcode::OpenElement("span".into()),
            Opcode::FlushElement,
            Opcode::Text(text.to_string()),
            Opcode::CloseElement,
            Opcode::DidRenderLayout,
        ]),
        SymbolTable::new(),
    )
}

/// Build a definition backed by `manager`, keeping a handle to its counters.
pub fn definition(name: &str, manager: CountingManager) -> (ComponentDefinition, Arc<Counters>) {
    let counters = Arc::clone(&manager.counters);
    (ComponentDefinition::new(name, Arc::new(manager)), counters)
}

/// The opcodes invoking `definition` with the given arguments.
pub fn invoke(definition: &ComponentDefinition, args: CompiledArgs) -> Vec<Opcode> {
    invoke_with(definition, args, Vec::new(), Templates::default())
}

pub fn invoke_with(
    definition: &ComponentDefinition,
    args: CompiledArgs,
    shadow: Vec<String>,
    templates: Templates,
) -> Vec<Opcode> {
    vec![
        Opcode::PutComponentDefinition(definition.clone()),
        Opcode::open_component(args, shadow, templates),
        Opcode::CloseComponent,
    ]
}

/// A top-level layout without symbols.
pub fn root(opcodes: impl IntoIterator<Item = Opcode>) -> Layout {
    Layout::new(Program::new(opcodes), SymbolTable::new())
}

/// Render a layout into a fresh document.
pub fn render(env: &dyn Environment, layout: &Layout) -> (Document, RenderResult) {
    let mut doc = Document::new();
    let root = doc.root();
    let result = AppendVm::new(env, &mut doc, root)
        .evaluate(layout, undefined_ref())
        .expect("render should succeed");
    (doc, result)
}

/// Serialize the whole document.
pub fn html(doc: &Document) -> String {
    doc.serialize(doc.root())
}

/// A dynamic reference usable as an expression.
pub fn dynamic(value: impl Into<Value>) -> Arc<DynamicReference<Value>> {
    Arc::new(DynamicReference::new(value.into()))
}

/// Wrap a dynamic reference as an expression.
pub fn expr(reference: &Arc<DynamicReference<Value>>) -> Expression {
    let reference: ValueRef = reference.clone();
    Expression::Reference(reference)
}
