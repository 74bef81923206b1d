//! Updating VM tests

mod common;

use std::sync::{Arc, Mutex};

use common::*;
use pretty_assertions::assert_eq;
use quickbeam::*;

fn title_args(title: Expression) -> CompiledArgs {
    CompiledArgs::new().with_named("title", title)
}

// ═══════════════════════════════════════════════════════════════════════
// Content and attributes
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_text_follows_its_reference() {
    let name = dynamic("world");
    let layout = root([
        Opcode::Text("hello ".into()),
        Opcode::PutValue(expr(&name)),
        Opcode::DynamicContent,
    ]);
    let env = NoopEnvironment;
    let (mut doc, mut result) = render(&env, &layout);

    name.update(Value::from("there"));
    let stats = result.rerender(&env, &mut doc).unwrap();
    assert_eq!(html(&doc), "hello there");
    assert_eq!(stats.updated, 1);

    let stats = result.rerender(&env, &mut doc).unwrap();
    assert_eq!(stats.updated, 0);
}

#[test]
fn test_same_value_does_not_touch_output() {
    let count = dynamic(1);
    let layout = root([Opcode::PutValue(expr(&count)), Opcode::DynamicContent]);
    let env = NoopEnvironment;
    let (mut doc, mut result) = render(&env, &layout);

    count.update(Value::from(1));
    let stats = result.rerender(&env, &mut doc).unwrap();
    assert_eq!(stats.visited, 1);
    assert_eq!(stats.updated, 0);
    assert_eq!(html(&doc), "1");
}

#[test]
fn test_attribute_follows_its_reference() {
    let disabled = dynamic(false);
    let layout = root([
        Opcode::OpenElement("button".into()),
        Opcode::PutValue(expr(&disabled)),
        Opcode::DynamicAttr {
            name: "disabled".into(),
            trusted: false,
        },
        Opcode::FlushElement,
        Opcode::CloseElement,
    ]);
    let env = NoopEnvironment;
    let (mut doc, mut result) = render(&env, &layout);
    assert_eq!(html(&doc), "<button></button>");

    disabled.update(Value::from(true));
    result.rerender(&env, &mut doc).unwrap();
    assert_eq!(html(&doc), "<button disabled=\"\"></button>");

    disabled.update(Value::from("yes"));
    result.rerender(&env, &mut doc).unwrap();
    assert_eq!(html(&doc), "<button disabled=\"yes\"></button>");

    disabled.update(Value::Null);
    result.rerender(&env, &mut doc).unwrap();
    assert_eq!(html(&doc), "<button></button>");
}

// ═══════════════════════════════════════════════════════════════════════
// Components
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_constant_args_never_update() {
    let (def, counters) = definition("title-card", CountingManager::new(title_layout()));
    let layout = root(invoke(&def, title_args(Expression::Literal("Hi".into()))));
    let env = RecordingEnvironment::default();
    let (mut doc, mut result) = render(&env, &layout);
    assert_eq!(counters.created(), 1);

    let stats = result.rerender(&env, &mut doc).unwrap();
    assert_eq!(counters.updated(), 0);
    assert_eq!(env.updated(), 0);
    assert_eq!(stats.skipped_groups, 1);
    assert_eq!(stats.visited, 1);
}

#[test]
fn test_changed_arg_updates_component_and_content() {
    let title = dynamic("first");
    let (def, counters) = definition("title-card", CountingManager::new(title_layout()));
    let layout = root(invoke(&def, title_args(expr(&title))));
    let env = RecordingEnvironment::default();
    let (mut doc, mut result) = render(&env, &layout);
    assert_eq!(html(&doc), "<div data-component=\"true\">first</div>");

    title.update(Value::from("second"));
    let stats = result.rerender(&env, &mut doc).unwrap();
    assert_eq!(html(&doc), "<div data-component=\"true\">second</div>");
    assert_eq!(counters.updated(), 1);
    assert_eq!(env.updated(), 1);
    assert_eq!(stats.updated, 2);
    assert_eq!(stats.skipped_groups, 0);
}

#[test]
fn test_second_pass_without_mutation_is_silent() {
    let title = dynamic("first");
    let (def, counters) = definition("title-card", CountingManager::new(title_layout()));
    let layout = root(invoke(&def, title_args(expr(&title))));
    let env = RecordingEnvironment::default();
    let (mut doc, mut result) = render(&env, &layout);

    title.update(Value::from("second"));
    result.rerender(&env, &mut doc).unwrap();
    assert_eq!(env.updated(), 1);

    let stats = result.rerender(&env, &mut doc).unwrap();
    assert_eq!(env.updated(), 1);
    assert_eq!(counters.updated(), 1);
    assert_eq!(stats.updated, 0);
    assert_eq!(stats.skipped_groups, 1);
}

#[test]
fn test_dirty_arg_updates_component_without_rewriting_text() {
    let title = dynamic("same");
    let (def, counters) = definition("title-card", CountingManager::new(title_layout()));
    let layout = root(invoke(&def, title_args(expr(&title))));
    let env = NoopEnvironment;
    let (mut doc, mut result) = render(&env, &layout);

    title.dirty();
    let stats = result.rerender(&env, &mut doc).unwrap();
    assert_eq!(counters.updated(), 1);
    assert_eq!(stats.updated, 1);
}

#[test]
fn test_component_own_tag_triggers_update() {
    let (tag, handle) = Tag::dirtyable();
    let (def, counters) = definition(
        "stateful",
        CountingManager::new(static_layout("s")).with_tag(tag),
    );
    let env = NoopEnvironment;
    let (mut doc, mut result) = render(&env, &root(invoke(&def, CompiledArgs::new())));

    result.rerender(&env, &mut doc).unwrap();
    assert_eq!(counters.updated(), 0);

    handle.dirty();
    result.rerender(&env, &mut doc).unwrap();
    assert_eq!(counters.updated(), 1);
}

#[test]
fn test_volatile_component_updates_every_pass() {
    let (def, counters) = definition(
        "volatile",
        CountingManager::new(static_layout("v")).with_tag(Tag::Volatile),
    );
    let env = NoopEnvironment;
    let (mut doc, mut result) = render(&env, &root(invoke(&def, CompiledArgs::new())));

    result.rerender(&env, &mut doc).unwrap();
    result.rerender(&env, &mut doc).unwrap();
    assert_eq!(counters.updated(), 2);
}

#[test]
fn test_nested_constant_components_skip_as_a_unit() {
    let (inner, inner_counters) = definition("inner", CountingManager::new(static_layout("in")));
    let mut outer_program = Vec::new();
    outer_program.extend(invoke(&inner, CompiledArgs::new()));
    outer_program.extend(invoke(&inner, CompiledArgs::new()));
    outer_program.push(Opcode::DidRenderLayout);
    let (outer, outer_counters) = definition(
        "outer",
        CountingManager::new(Layout::new(Program::new(outer_program), SymbolTable::new())),
    );

    let unrelated = dynamic("a");
    let mut opcodes = invoke(&outer, CompiledArgs::new());
    opcodes.extend([Opcode::PutValue(expr(&unrelated)), Opcode::DynamicContent]);

    let env = RecordingEnvironment::default();
    let (mut doc, mut result) = render(&env, &root(opcodes));
    assert_eq!(inner_counters.created(), 2);

    unrelated.update(Value::from("b"));
    let stats = result.rerender(&env, &mut doc).unwrap();

    assert_eq!(inner_counters.updated(), 0);
    assert_eq!(outer_counters.updated(), 0);
    assert_eq!(env.updated(), 0);
    assert_eq!(stats.skipped_groups, 1);
    assert_eq!(stats.visited, 2);
    assert_eq!(stats.updated, 1);
    assert_eq!(html(&doc), "<span>in</span><span>in</span>b");
}

#[test]
fn test_only_the_changed_sibling_revalidates() {
    let first_title = dynamic("one");
    let (def, counters) = definition("title-card", CountingManager::new(title_layout()));
    let mut opcodes = invoke(&def, title_args(expr(&first_title)));
    opcodes.extend(invoke(&def, title_args(Expression::Literal("two".into()))));

    let env = NoopEnvironment;
    let (mut doc, mut result) = render(&env, &root(opcodes));

    first_title.update(Value::from("uno"));
    let stats = result.rerender(&env, &mut doc).unwrap();

    assert_eq!(counters.updated(), 1);
    assert_eq!(stats.skipped_groups, 1);
    assert_eq!(
        html(&doc),
        "<div data-component=\"true\">uno</div><div data-component=\"true\">two</div>"
    );
}

#[test]
fn test_shadowed_attribute_updates() {
    let class = dynamic("big");
    let (def, _counters) = definition("title-card", CountingManager::new(title_layout()));
    let args = title_args(Expression::Literal("Hi".into())).with_named("class", expr(&class));
    let layout = root(invoke_with(&def, args, vec!["class".into()], Templates::default()));
    let env = NoopEnvironment;
    let (mut doc, mut result) = render(&env, &layout);

    class.update(Value::from("small"));
    result.rerender(&env, &mut doc).unwrap();
    assert_eq!(
        html(&doc),
        "<div data-component=\"true\" class=\"small\">Hi</div>"
    );
}

// ═══════════════════════════════════════════════════════════════════════
// Failures
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_manager_update_failure_propagates() {
    let title = dynamic("a");
    let (def, _counters) = definition(
        "title-card",
        CountingManager::new(title_layout()).failing_at(FailAt::Update),
    );
    let env = NoopEnvironment;
    let (mut doc, mut result) = render(&env, &root(invoke(&def, title_args(expr(&title)))));

    title.update(Value::from("b"));
    let err = result.rerender(&env, &mut doc).unwrap_err();
    assert_eq!(err.opcode(), Some("update-component"));
    let boom = err.manager_error().and_then(|e| e.downcast_ref::<Boom>());
    assert_eq!(boom.map(|b| b.0), Some("update"));
}

#[test]
fn test_destroyed_reference_is_a_stale_tag_read() {
    let name = dynamic("x");
    let layout = root([Opcode::PutValue(expr(&name)), Opcode::DynamicContent]);
    let env = NoopEnvironment;
    let (mut doc, mut result) = render(&env, &layout);

    name.destroy();
    let err = result.rerender(&env, &mut doc).unwrap_err();
    assert!(matches!(err, RenderError::StaleTag { .. }));
}

#[test]
fn test_changed_definition_fails_revalidation() {
    let (first, _c1) = definition("first", CountingManager::new(static_layout("1")));
    let (second, _c2) = definition("second", CountingManager::new(static_layout("2")));
    let current = dynamic(first.clone());
    let layout = root([
        Opcode::PutValue(expr(&current)),
        Opcode::PutDynamicComponentDefinition,
        Opcode::open_component(CompiledArgs::new(), Vec::new(), Templates::default()),
        Opcode::CloseComponent,
    ]);
    let env = NoopEnvironment;
    let (mut doc, mut result) = render(&env, &layout);

    current.update(Value::from(first));
    assert!(result.rerender(&env, &mut doc).is_ok());

    current.update(Value::from(second));
    let err = result.rerender(&env, &mut doc).unwrap_err();
    match err {
        RenderError::DefinitionChanged { name } => assert_eq!(name, "second"),
        other => panic!("unexpected error: {other:?}"),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Teardown
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_destructor_runs_exactly_once() {
    let (def, counters) = definition(
        "title-card",
        CountingManager::new(title_layout()).with_destructor(),
    );
    let env = NoopEnvironment;
    let (_doc, mut result) = render(&env, &root(invoke(&def, CompiledArgs::new())));
    assert_eq!(counters.destroyed(), 0);
    assert_eq!(result.destructors.len(), 1);

    assert_eq!(result.destroy(), 1);
    assert_eq!(counters.destroyed(), 1);

    assert_eq!(result.destroy(), 0);
    assert_eq!(counters.destroyed(), 1);
}

#[test]
fn test_destructors_run_innermost_first() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let (inner, _inner_counters) = definition(
        "inner",
        CountingManager::new(static_layout("in"))
            .with_destructor()
            .logging_to(Arc::clone(&log)),
    );
    let mut outer_program = invoke(&inner, CompiledArgs::new());
    outer_program.push(Opcode::DidRenderLayout);
    let (outer, _outer_counters) = definition(
        "outer",
        CountingManager::new(Layout::new(Program::new(outer_program), SymbolTable::new()))
            .with_destructor()
            .logging_to(Arc::clone(&log)),
    );

    let env = NoopEnvironment;
    let (_doc, mut result) = render(&env, &root(invoke(&outer, CompiledArgs::new())));
    result.destroy();

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "create outer".to_string(),
            "create inner".to_string(),
            "destroy inner".to_string(),
            "destroy outer".to_string(),
        ]
    );
}

#[test]
fn test_rerender_with_tracing() {
    let name = dynamic("a");
    let layout = root([Opcode::PutValue(expr(&name)), Opcode::DynamicContent]);
    let env = NoopEnvironment;
    let (mut doc, mut result) = render(&env, &layout);

    name.update(Value::from("b"));
    let stats = result
        .rerender_with(&env, &mut doc, RenderContext::new().with_trace(true))
        .unwrap();
    assert_eq!(stats, UpdateStats { visited: 1, updated: 1, skipped_groups: 0 });
    assert_eq!(html(&doc), "b");
}
