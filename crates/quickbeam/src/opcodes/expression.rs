//! Operand expressions

use crate::error::{RenderError, Result};
use crate::reference::{const_ref, undefined_ref, Reference, ValueRef};
use crate::value::Value;
use crate::vm::AppendVm;

/// Something that evaluates to a reference in the current scope.
#[derive(Debug, Clone)]
pub enum Expression {
    /// A constant value
    Literal(Value),

    /// The current scope's `self`
    SelfRef,

    /// A symbol slot, resolved through the scope chain
    Symbol(usize),

    /// A dynamic-scope variable; undefined when unset
    DynamicVar(String),

    /// An already-built reference, typically host data
    Reference(ValueRef),
}

impl Expression {
    /// Resolve to a reference.
    pub fn evaluate(&self, vm: &AppendVm<'_>) -> Result<ValueRef> {
        match self {
            Expression::Literal(value) => Ok(const_ref(value.clone())),
            Expression::SelfRef => vm.self_ref(),
            Expression::Symbol(slot) => vm
                .symbol(*slot)
                .ok_or(RenderError::UnboundSymbol { slot: *slot }),
            Expression::DynamicVar(name) => Ok(vm
                .dynamic_scope()?
                .get(name)
                .unwrap_or_else(undefined_ref)),
            Expression::Reference(reference) => Ok(reference.clone()),
        }
    }

    /// Short form for debug output.
    pub(crate) fn describe(&self) -> String {
        match self {
            Expression::Literal(value) => format!("literal({:?})", value),
            Expression::SelfRef => "self".to_string(),
            Expression::Symbol(slot) => format!("symbol({})", slot),
            Expression::DynamicVar(name) => format!("-dynamic({})", name),
            Expression::Reference(reference) => format!("ref({:?})", reference.value()),
        }
    }
}

impl From<Value> for Expression {
    fn from(value: Value) -> Self {
        Expression::Literal(value)
    }
}

impl From<ValueRef> for Expression {
    fn from(reference: ValueRef) -> Self {
        Expression::Reference(reference)
    }
}
