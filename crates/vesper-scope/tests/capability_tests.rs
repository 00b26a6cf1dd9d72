//! Storage-capability flags: indexed vs by-name storage, stack vs heap
//! placement, and how `eval`/`with` poison them.

use vesper_common::Interner;
use vesper_scope::summary::UnitSummary;
use vesper_scope::{BlockId, Placement, ScopeTree, UnitId, UnitKind};

// =============================================================================
// Ordinary units
// =============================================================================

#[test]
fn plain_function_gets_full_capability() {
    let mut interner = Interner::new();
    let x = interner.intern("x");
    let summary = UnitSummary::new(UnitKind::Global).with_child(
        BlockId(0),
        UnitSummary::new(UnitKind::FunctionDeclaration).with_var(x),
    );
    let tree = ScopeTree::build(summary, interner);

    let f = tree.unit(UnitId(1));
    assert!(f.uses_indexed_storage());
    assert!(f.can_allocate_variables_on_stack());
    assert!(f.can_allocate_environment_on_stack());
    assert_eq!(f.vars()[0].placement, Placement::Stack(0));
    assert_eq!(f.vars_on_stack(), 1);
    assert_eq!(f.vars_on_heap(), 0);
}

#[test]
fn global_unit_gets_full_capability() {
    let interner = Interner::new();
    let tree = ScopeTree::build(UnitSummary::new(UnitKind::Global), interner);

    let global = tree.root_unit();
    assert!(global.is_global());
    assert!(global.uses_indexed_storage());
    assert!(global.can_allocate_variables_on_stack());
    assert!(global.can_allocate_environment_on_stack());
}

// =============================================================================
// Dynamic scope constructs
// =============================================================================

#[test]
fn direct_eval_disables_indexed_storage() {
    let mut interner = Interner::new();
    let x = interner.intern("x");
    let summary = UnitSummary::new(UnitKind::Global).with_child(
        BlockId(0),
        UnitSummary::new(UnitKind::FunctionDeclaration)
            .with_var(x)
            .with_direct_eval(),
    );
    let tree = ScopeTree::build(summary, interner);

    let f = tree.unit(UnitId(1));
    assert!(f.has_direct_eval());
    assert!(f.uses_dynamic_scope_construct());
    assert!(!f.uses_indexed_storage());
    assert!(!f.can_allocate_variables_on_stack());
    assert!(!f.can_allocate_environment_on_stack());
    // No numeric slots: every name is looked up dynamically.
    assert_eq!(f.vars()[0].placement, Placement::ByName);
    assert_eq!(f.vars_on_stack(), 0);
    assert_eq!(f.vars_on_heap(), 0);
}

#[test]
fn with_statement_disables_indexed_storage() {
    let mut interner = Interner::new();
    let x = interner.intern("x");
    let summary = UnitSummary::new(UnitKind::Global).with_child(
        BlockId(0),
        UnitSummary::new(UnitKind::FunctionDeclaration)
            .with_var(x)
            .with_with(),
    );
    let tree = ScopeTree::build(summary, interner);

    let f = tree.unit(UnitId(1));
    assert!(f.has_with());
    assert!(!f.uses_indexed_storage());
    assert_eq!(f.vars()[0].placement, Placement::ByName);
}

#[test]
fn eval_body_disables_indexed_storage() {
    let mut interner = Interner::new();
    let y = interner.intern("y");
    let summary = UnitSummary::new(UnitKind::Global)
        .with_child(BlockId(0), UnitSummary::new(UnitKind::Eval).with_var(y));
    let tree = ScopeTree::build(summary, interner);

    let e = tree.unit(UnitId(1));
    assert!(e.is_eval_code());
    assert!(!e.uses_indexed_storage());
    assert!(!e.can_allocate_variables_on_stack());
    assert!(!e.can_allocate_environment_on_stack());
}

// =============================================================================
// Capability below a dynamic unit
// =============================================================================

#[test]
fn descendants_of_dynamic_unit() {
    // f contains direct eval; g is a clean function inside f; h is a clean
    // function inside g. Only the *immediate* child of a non-indexed unit
    // loses stack placement; deeper clean units regain it.
    let mut interner = Interner::new();
    let v = interner.intern("v");
    let h = UnitSummary::new(UnitKind::FunctionDeclaration).with_var(v);
    let g = UnitSummary::new(UnitKind::FunctionDeclaration)
        .with_var(v)
        .with_child(BlockId(0), h);
    let f = UnitSummary::new(UnitKind::FunctionDeclaration)
        .with_direct_eval()
        .with_child(BlockId(0), g);
    let summary = UnitSummary::new(UnitKind::Global).with_child(BlockId(0), f);
    let tree = ScopeTree::build(summary, interner);

    let f = tree.unit(UnitId(1));
    let g = tree.unit(UnitId(2));
    let h = tree.unit(UnitId(3));

    assert!(!f.uses_indexed_storage());

    // g keeps slots for its own names but must place them on the heap,
    // where f's dynamic lookups can reach them.
    assert!(g.uses_indexed_storage());
    assert!(!g.can_allocate_variables_on_stack());
    assert!(!g.can_allocate_environment_on_stack());
    assert_eq!(g.vars()[0].placement, Placement::Heap(0));
    assert_eq!(g.vars_on_heap(), 1);

    assert!(h.uses_indexed_storage());
    assert!(h.can_allocate_variables_on_stack());
    assert!(h.can_allocate_environment_on_stack());
    assert_eq!(h.vars()[0].placement, Placement::Stack(0));

    // Both g and h sit below the dynamic f.
    assert!(tree.has_ancestor_without_indexed_storage(UnitId(2)));
    assert!(tree.has_ancestor_without_indexed_storage(UnitId(3)));
    assert!(!tree.has_ancestor_without_indexed_storage(UnitId(1)));
    assert!(!tree.has_ancestor_without_indexed_storage(tree.root()));
}

#[test]
fn non_indexed_descendant_flag_propagates_to_ancestors() {
    let interner = Interner::new();
    let f = UnitSummary::new(UnitKind::FunctionDeclaration).with_child(
        BlockId(0),
        UnitSummary::new(UnitKind::FunctionExpression).with_with(),
    );
    let summary = UnitSummary::new(UnitKind::Global).with_child(BlockId(0), f);
    let tree = ScopeTree::build(summary, interner);

    assert!(tree.root_unit().has_non_indexed_descendant());
    assert!(tree.unit(UnitId(1)).has_non_indexed_descendant());
    assert!(!tree.unit(UnitId(2)).has_non_indexed_descendant());
}

// =============================================================================
// Parameter handling
// =============================================================================

#[test]
fn duplicate_parameters_are_flagged_and_share_the_last_slot() {
    // function f(a, b, a) {} — non-strict duplicate parameters. Both
    // occurrences of `a` point at one shared binding; argument copying
    // leaves the last caller-supplied value in it.
    let mut interner = Interner::new();
    let a = interner.intern("a");
    let b = interner.intern("b");
    let summary = UnitSummary::new(UnitKind::Global).with_child(
        BlockId(0),
        UnitSummary::new(UnitKind::FunctionDeclaration)
            .with_param(a)
            .with_param(b)
            .with_param(a),
    );
    let tree = ScopeTree::build(summary, interner);

    let f = tree.unit(UnitId(1));
    assert_eq!(f.parameter_count(), 3);
    assert_eq!(f.vars().len(), 2);
    assert!(f.params()[0].duplicated);
    assert!(!f.params()[1].duplicated);
    assert!(f.params()[2].duplicated);
    assert_eq!(f.params()[0].var_index, f.params()[2].var_index);
    assert!(f.needs_complex_parameter_copy());
}

#[test]
fn parameter_initializers_force_complex_copy() {
    let mut interner = Interner::new();
    let a = interner.intern("a");
    let mut inner = UnitSummary::new(UnitKind::FunctionDeclaration).with_param(a);
    inner.has_parameter_initializers = true;
    let summary = UnitSummary::new(UnitKind::Global).with_child(BlockId(0), inner);
    let tree = ScopeTree::build(summary, interner);

    let f = tree.unit(UnitId(1));
    assert!(f.needs_complex_parameter_copy());
    assert!(!f.params()[0].duplicated);
}
