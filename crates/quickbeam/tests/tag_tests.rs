//! Tag and revision tests

use quickbeam::*;

// ═══════════════════════════════════════════════════════════════════════
// Revisions
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_revision_constants_are_ordered() {
    assert!(CONSTANT < INITIAL);
    assert!(INITIAL < VOLATILE);
    assert!(current_revision() >= INITIAL);
}

#[test]
fn test_tag_values_never_decrease() {
    let (tag, handle) = Tag::dirtyable();
    let mut last = tag.value();
    for _ in 0..16 {
        handle.dirty();
        let next = tag.value();
        assert!(next > last);
        last = next;
    }
    assert!(current_revision() >= last);
}

#[test]
fn test_unrelated_mutations_do_not_move_a_tag() {
    let (a, _a_handle) = Tag::dirtyable();
    let (_b, b_handle) = Tag::dirtyable();
    let seen = a.value();
    b_handle.dirty();
    assert_eq!(a.value(), seen);
    assert!(a.validate(seen));
}

// ═══════════════════════════════════════════════════════════════════════
// Validation
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_validate_fails_right_after_dirty() {
    let (tag, handle) = Tag::dirtyable();
    let seen = tag.value();
    assert!(tag.validate(seen));

    handle.dirty();
    assert!(!tag.validate(seen));
    assert!(tag.validate(tag.value()));
}

#[test]
fn test_const_tag_always_validates_constant() {
    assert_eq!(Tag::Const.value(), CONSTANT);
    assert!(Tag::Const.validate(CONSTANT));
    assert!(Tag::Const.is_const());
}

#[test]
fn test_volatile_tag_never_validates() {
    assert_eq!(Tag::Volatile.value(), VOLATILE);
    assert!(!Tag::Volatile.validate(VOLATILE));
    assert!(!Tag::Volatile.validate(Tag::Volatile.value()));
}

// ═══════════════════════════════════════════════════════════════════════
// Combination
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_combined_value_is_max_of_members() {
    let (a, a_handle) = Tag::dirtyable();
    let (b, b_handle) = Tag::dirtyable();
    let combined = combine([a.clone(), b.clone(), Tag::Const]);

    for step in 0..6 {
        if step % 2 == 0 {
            a_handle.dirty();
        } else {
            b_handle.dirty();
        }
        assert_eq!(combined.value(), a.value().max(b.value()));
    }
}

#[test]
fn test_combined_tag_invalidates_on_any_member() {
    let (a, _a_handle) = Tag::dirtyable();
    let (b, b_handle) = Tag::dirtyable();
    let combined = combine([a, b]);
    let seen = combined.value();

    b_handle.dirty();
    assert!(!combined.validate(seen));
}

#[test]
fn test_combine_of_constants_is_const() {
    assert!(combine(Vec::new()).is_const());
    assert!(combine([Tag::Const, Tag::Const]).is_const());
}

#[test]
fn test_combine_with_volatile_is_volatile() {
    let (a, _handle) = Tag::dirtyable();
    let combined = combine([a, Tag::Volatile]);
    assert_eq!(combined.value(), VOLATILE);
    assert!(!combined.validate(combined.value()));
}

#[test]
fn test_combine_single_member_is_that_member() {
    let (a, handle) = Tag::dirtyable();
    let combined = combine([Tag::Const, a.clone()]);
    handle.dirty();
    assert_eq!(combined.value(), a.value());
    assert!(matches!(combined, Tag::Dirtyable(_)));
}

// ═══════════════════════════════════════════════════════════════════════
// Destruction
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_destroyed_tag_fails_check() {
    let (tag, handle) = Tag::dirtyable();
    assert!(tag.check("fresh").is_ok());

    handle.destroy();
    assert!(handle.is_destroyed());
    let err = tag.check("destroyed source").unwrap_err();
    assert!(matches!(err, RenderError::StaleTag { ref context } if context == "destroyed source"));
}

#[test]
fn test_staleness_propagates_through_combine() {
    let (a, _a_handle) = Tag::dirtyable();
    let (b, b_handle) = Tag::dirtyable();
    let combined = combine([a, b]);
    assert!(!combined.is_stale());

    b_handle.destroy();
    assert!(combined.is_stale());
}
