//! Component invocation arguments

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::Result;
use crate::opcodes::Expression;
use crate::reference::{undefined_ref, Reference, ValueRef};
use crate::tag::{combine, Tag};
use crate::value::Value;
use crate::vm::AppendVm;

/// Arguments as written at the invocation site.
#[derive(Debug, Clone, Default)]
pub struct CompiledArgs {
    /// Positional arguments in order
    pub positional: Vec<Expression>,

    /// Named arguments in declaration order
    pub named: IndexMap<String, Expression>,
}

impl CompiledArgs {
    /// Create an empty argument list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    pub fn with_positional(mut self, expr: Expression) -> Self {
        self.positional.push(expr);
        self
    }

    /// Add or replace a named argument.
    pub fn with_named(mut self, name: impl Into<String>, expr: Expression) -> Self {
        self.named.insert(name.into(), expr);
        self
    }

    /// Evaluate every argument expression in the VM's current scope.
    pub fn evaluate(&self, vm: &AppendVm<'_>) -> Result<EvaluatedArgs> {
        let positional = self
            .positional
            .iter()
            .map(|expr| expr.evaluate(vm))
            .collect::<Result<Vec<_>>>()?;

        let mut named = IndexMap::with_capacity(self.named.len());
        for (name, expr) in &self.named {
            named.insert(name.clone(), expr.evaluate(vm)?);
        }

        EvaluatedArgs::new(positional, named)
    }
}

/// Arguments resolved to references.
///
/// The arg-set [`tag`](Self::tag) combines every argument's tag, so a
/// change to any single argument invalidates the whole set.
#[derive(Clone)]
pub struct EvaluatedArgs {
    positional: Arc<[ValueRef]>,
    named: Arc<IndexMap<String, ValueRef>>,
    tag: Tag,
}

impl EvaluatedArgs {
    /// Build an argument set and compute its combined tag.
    ///
    /// Fails with [`StaleTag`](crate::RenderError::StaleTag) if any argument
    /// comes from a destroyed source.
    pub fn new(positional: Vec<ValueRef>, named: IndexMap<String, ValueRef>) -> Result<Self> {
        let tag = combine(
            positional
                .iter()
                .chain(named.values())
                .map(|reference| reference.tag()),
        );
        tag.check("component arguments")?;
        Ok(Self {
            positional: positional.into(),
            named: Arc::new(named),
            tag,
        })
    }

    /// An empty argument set.
    pub fn empty() -> Self {
        Self {
            positional: Arc::from(Vec::new()),
            named: Arc::new(IndexMap::new()),
            tag: Tag::Const,
        }
    }

    /// The combined tag of every argument.
    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    /// Whether no argument can ever change.
    pub fn is_const(&self) -> bool {
        self.tag.is_const()
    }

    /// A positional argument.
    pub fn positional(&self, index: usize) -> Option<&ValueRef> {
        self.positional.get(index)
    }

    /// Number of positional arguments.
    pub fn positional_len(&self) -> usize {
        self.positional.len()
    }

    /// A named argument.
    pub fn named(&self, name: &str) -> Option<&ValueRef> {
        self.named.get(name)
    }

    /// A named argument, or an undefined reference if absent.
    pub fn get(&self, name: &str) -> ValueRef {
        self.named.get(name).cloned().unwrap_or_else(undefined_ref)
    }

    /// Current value of a named argument.
    pub fn value(&self, name: &str) -> Value {
        self.named
            .get(name)
            .map(|reference| reference.value())
            .unwrap_or_default()
    }

    /// Named argument names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.named.keys().map(String::as_str)
    }
}

impl fmt::Debug for EvaluatedArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluatedArgs")
            .field("positional", &self.positional.len())
            .field("named", &self.named.keys().collect::<Vec<_>>())
            .field("tag", &self.tag)
            .finish()
    }
}
