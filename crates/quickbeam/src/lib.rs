//! # Quickbeam
//!
//! An incremental-rendering virtual machine.
//!
//! A template is compiled once into a [`Program`] of append opcodes. The
//! [`AppendVm`] runs it a single time to build output through an
//! [`OutputAdapter`], and along the way records an [`UpdatingProgram`]:
//! the minimal set of instructions that can bring that output up to date.
//! Later changes are applied by re-running the updating program with an
//! [`UpdatingVm`], which touches only output whose dependencies moved.
//!
//! ## Architecture
//!
//! - **Tags and references**: every value source exposes a [`Tag`] that
//!   advances on mutation; a [`ReferenceCache`] turns that into cheap
//!   "changed / unchanged" checks
//! - **Append phase**: frames, lexical and dynamic scopes, and the
//!   [`ElementStack`] driven by a closed [`Opcode`] enum
//! - **Components**: lifecycle delegated to a [`ComponentManager`] per
//!   component kind
//! - **Update phase**: updating opcodes grouped into skippable regions
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use quickbeam::*;
//!
//! let name = Arc::new(DynamicReference::new(Value::from("world")));
//! let layout = Layout::new(
//!     Program::new([
//!         Opcode::Text("hello ".into()),
//!         Opcode::PutValue(Expression::Reference(name.clone())),
//!         Opcode::DynamicContent,
//!     ]),
//!     SymbolTable::new(),
//! );
//!
//! let env = NoopEnvironment;
//! let mut doc = Document::new();
//! let root = doc.root();
//! let mut result = AppendVm::new(&env, &mut doc, root)
//!     .evaluate(&layout, undefined_ref())
//!     .unwrap();
//! assert_eq!(doc.serialize(root), "hello world");
//!
//! name.update(Value::from("there"));
//! result.rerender(&env, &mut doc).unwrap();
//! assert_eq!(doc.serialize(root), "hello there");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod component;
pub mod context;
pub mod dom;
pub mod environment;
pub mod error;
pub mod opcodes;
pub mod reference;
pub mod scope;
pub mod tag;
pub mod value;
pub mod vm;

// Re-export main types
pub use component::{
    CompiledArgs, Component, ComponentDefinition, ComponentManager, Destroyable, DestructorList,
    EvaluatedArgs, Layout, Templates,
};
pub use context::RenderContext;
pub use dom::{
    AttributeValue, Bounds, Document, ElementOperations, ElementStack, NodeId, OutputAdapter,
    PendingAttribute,
};
pub use environment::{Environment, NoopEnvironment};
pub use error::{type_name, RenderError, Result};
pub use opcodes::{
    Evaluate, Expression, Guid, Instruction, OpcodeJson, Opcode, OpenComponent, Program,
    UpdatingInstruction, UpdatingOpcode, UpdatingProgram,
};
pub use reference::{
    const_ref, is_const, undefined_ref, ConstReference, DynamicReference, Reference,
    ReferenceCache, Validation, ValueRef,
};
pub use scope::{DynamicScope, ScopeArena, ScopeId, SymbolTable};
pub use tag::{combine, current_revision, DirtyableTag, Revision, Tag, CONSTANT, INITIAL, VOLATILE};
pub use value::Value;
pub use vm::{AppendVm, Frame, FrameKind, RenderResult, UpdateStats, UpdatingVm};

/// Quickbeam version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
