//! Components: definitions, managers, and lifecycle plumbing
//!
//! The VM knows nothing about concrete component kinds. Each kind supplies
//! a [`ComponentManager`], and every lifecycle step goes through it:
//!
//! ```text
//! prepare_args → create → get_destructor → layout_for → get_self
//!      → (layout renders) → did_create_element → did_render_layout
//!      → ... later revalidation passes: update ...
//! ```

mod args;

pub use args::{CompiledArgs, EvaluatedArgs};

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::dom::{Bounds, ElementOperations, NodeId};
use crate::environment::Environment;
use crate::opcodes::Program;
use crate::reference::ValueRef;
use crate::scope::{DynamicScope, SymbolTable};
use crate::tag::Tag;

/// An opaque component instance owned by its manager.
///
/// Cloning the handle does not clone the instance.
#[derive(Clone)]
pub struct Component(Arc<dyn Any + Send + Sync>);

impl Component {
    /// Wrap a manager-specific instance.
    pub fn new<T: Any + Send + Sync>(instance: T) -> Self {
        Component(Arc::new(instance))
    }

    /// Borrow the instance as its concrete type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Whether two handles refer to the same instance.
    pub fn ptr_eq(&self, other: &Component) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component({:p})", Arc::as_ptr(&self.0))
    }
}

struct DefinitionInner {
    name: String,
    manager: Arc<dyn ComponentManager>,
    state: Option<Arc<dyn Any + Send + Sync>>,
}

/// Identifies a component's manager and static metadata.
///
/// Definitions are immutable once resolved and compare by identity.
#[derive(Clone)]
pub struct ComponentDefinition {
    inner: Arc<DefinitionInner>,
}

impl ComponentDefinition {
    /// Create a definition with no static state.
    pub fn new(name: impl Into<String>, manager: Arc<dyn ComponentManager>) -> Self {
        Self {
            inner: Arc::new(DefinitionInner {
                name: name.into(),
                manager,
                state: None,
            }),
        }
    }

    /// Create a definition carrying manager-specific static state.
    pub fn with_state<T: Any + Send + Sync>(
        name: impl Into<String>,
        manager: Arc<dyn ComponentManager>,
        state: T,
    ) -> Self {
        Self {
            inner: Arc::new(DefinitionInner {
                name: name.into(),
                manager,
                state: Some(Arc::new(state)),
            }),
        }
    }

    /// The definition's name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The manager responsible for this kind of component.
    pub fn manager(&self) -> &Arc<dyn ComponentManager> {
        &self.inner.manager
    }

    /// Static state, if present and of type `T`.
    pub fn state<T: Any>(&self) -> Option<&T> {
        self.inner.state.as_ref().and_then(|s| s.downcast_ref::<T>())
    }

    /// Whether two definitions are the same definition.
    pub fn ptr_eq(&self, other: &ComponentDefinition) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for ComponentDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for ComponentDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentDefinition({})", self.inner.name)
    }
}

/// A component's own compiled program and the symbols its scope needs.
#[derive(Debug, Clone)]
pub struct Layout {
    /// Opcodes executed when the component renders
    pub program: Program,

    /// Slot layout for the component's root scope. Named symbols are bound
    /// to the matching named arguments on entry, or to undefined.
    pub symbols: SymbolTable,
}

impl Layout {
    /// Create a layout.
    pub fn new(program: Program, symbols: SymbolTable) -> Self {
        Self { program, symbols }
    }
}

/// Blocks passed to a component invocation.
#[derive(Debug, Clone, Default)]
pub struct Templates {
    /// Block rendered by `Yield`, in the caller's scope
    pub default: Option<Program>,
}

impl Templates {
    /// Templates with only a default block.
    pub fn with_default(program: Program) -> Self {
        Self {
            default: Some(program),
        }
    }
}

/// A teardown callback registered when a component is created.
///
/// `destroy` consumes the box, so a destructor can run at most once.
pub trait Destroyable: Send {
    /// Tear down whatever the component owns.
    fn destroy(self: Box<Self>);
}

impl<F: FnOnce() + Send> Destroyable for F {
    fn destroy(self: Box<Self>) {
        (*self)()
    }
}

/// Destructors registered by the components of one render.
#[derive(Default)]
pub struct DestructorList {
    entries: Vec<(String, Box<dyn Destroyable>)>,
}

impl DestructorList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a destructor for the named component.
    pub fn push(&mut self, component: impl Into<String>, destructor: Box<dyn Destroyable>) {
        self.entries.push((component.into(), destructor));
    }

    /// Run every pending destructor, most recently registered first.
    ///
    /// Destructors are removed as they run, so calling this again does
    /// nothing. Returns how many ran.
    pub fn destroy_all(&mut self) -> usize {
        let count = self.entries.len();
        while let Some((name, destructor)) = self.entries.pop() {
            tracing::debug!(component = %name, "destroying component");
            destructor.destroy();
        }
        count
    }

    /// Number of pending destructors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for DestructorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(name, _)| name))
            .finish()
    }
}

impl Drop for DestructorList {
    fn drop(&mut self) {
        if !self.entries.is_empty() {
            tracing::warn!(
                pending = self.entries.len(),
                "destructor list dropped without being destroyed"
            );
        }
    }
}

/// The capability set implementing one component kind's lifecycle.
///
/// Methods that can fail return [`anyhow::Result`]; the VM tags a failure
/// with the opcode and component name and propagates it without
/// interpreting it.
pub trait ComponentManager: Send + Sync {
    /// Turn evaluated invocation arguments into the arguments the component
    /// actually receives.
    fn prepare_args(
        &self,
        definition: &ComponentDefinition,
        args: EvaluatedArgs,
    ) -> anyhow::Result<EvaluatedArgs> {
        let _ = definition;
        Ok(args)
    }

    /// Create an instance.
    fn create(
        &self,
        definition: &ComponentDefinition,
        args: &EvaluatedArgs,
        dynamic_scope: &DynamicScope,
        has_default_block: bool,
    ) -> anyhow::Result<Component>;

    /// The reference bound as `self` in the component's layout.
    fn get_self(&self, component: &Component) -> ValueRef;

    /// A tag for the component's own state, if it has any.
    ///
    /// Components without a tag are revalidated only when their arguments
    /// change.
    fn get_tag(&self, component: &Component) -> Option<Tag> {
        let _ = component;
        None
    }

    /// Resolve the program the component renders.
    fn layout_for(
        &self,
        definition: &ComponentDefinition,
        component: &Component,
        env: &dyn Environment,
    ) -> anyhow::Result<Arc<Layout>>;

    /// Bring the instance up to date with its (possibly changed) arguments.
    fn update(
        &self,
        component: &Component,
        args: &EvaluatedArgs,
        dynamic_scope: &DynamicScope,
    ) -> anyhow::Result<()>;

    /// The component's root element now exists but is not yet flushed;
    /// `operations` holds the attributes queued on it.
    fn did_create_element(
        &self,
        component: &Component,
        element: NodeId,
        operations: &mut ElementOperations,
    ) -> anyhow::Result<()> {
        let _ = (component, element, operations);
        Ok(())
    }

    /// The layout finished rendering into `bounds`.
    fn did_render_layout(&self, component: &Component, bounds: &Bounds) -> anyhow::Result<()> {
        let _ = (component, bounds);
        Ok(())
    }

    /// Teardown to run when the rendered region is destroyed, if any.
    fn get_destructor(&self, component: &Component) -> Option<Box<dyn Destroyable>> {
        let _ = component;
        None
    }
}
