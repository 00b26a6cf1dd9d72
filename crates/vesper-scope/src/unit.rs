//! Scope units: the per-function/eval/script containers for declarations.

use crate::block::BlockScope;
use crate::{BlockId, UnitId};
use bitflags::bitflags;
use serde::Serialize;
use vesper_common::Atom;

/// What kind of compiled body a unit is. Drives codegen strategy selection;
/// the capability rules only care about [`UnitKind::Global`] and
/// [`UnitKind::Eval`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum UnitKind {
    /// The top-level script body.
    Global,
    FunctionDeclaration,
    FunctionExpression,
    Arrow,
    ClassConstructor,
    DerivedClassConstructor,
    ClassMethod,
    Generator,
    /// An `eval` body, standalone or nested in a function
    /// (see [`UnitFlags::EVAL_IN_FUNCTION`]).
    Eval,
}

bitflags! {
    /// Per-unit flags. The parser sets the input bits during construction;
    /// analysis computes the capability bits once, after which the whole
    /// set is frozen.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct UnitFlags: u16 {
        // --- set by the parser ---
        /// The unit directly contains a direct `eval` call.
        const HAS_DIRECT_EVAL = 1 << 0;
        /// The unit directly contains a `with` statement.
        const HAS_WITH = 1 << 1;
        /// Eval body whose call site is inside a function.
        const EVAL_IN_FUNCTION = 1 << 2;
        /// Some parameter has a default value or destructuring pattern.
        const HAS_PARAMETER_INITIALIZERS = 1 << 3;
        /// The parameter list repeats a name (non-strict only).
        const HAS_DUPLICATE_PARAMS = 1 << 4;

        // --- computed by analysis ---
        /// Names declared here get fixed numeric slots; false means every
        /// name in this unit's own frame is looked up by name at run time.
        const INDEXED_STORAGE = 1 << 8;
        /// `var`-class bindings may live in the transient call-stack frame.
        const STACK_VARIABLES = 1 << 9;
        /// The unit's environment record itself may be stack-allocated
        /// (no binding outlives the frame).
        const STACK_ENVIRONMENT = 1 << 10;
        /// Some descendant unit lost indexed storage (`eval`/`with` below).
        const NON_INDEXED_DESCENDANT = 1 << 11;
    }
}

/// Where one binding lives at run time. Unset until analysis runs, then
/// frozen for the unit's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Placement {
    /// Not yet decided (only observable before analysis completes).
    Unassigned,
    /// Fixed slot in the call-stack frame.
    Stack(u32),
    /// Fixed slot in a heap-allocated environment record.
    Heap(u32),
    /// No numeric slot: the owning unit lacks indexed storage, so the
    /// binding is looked up by name unconditionally.
    ByName,
}

impl Placement {
    #[inline]
    pub fn is_heap(self) -> bool {
        matches!(self, Placement::Heap(_))
    }

    #[inline]
    pub fn is_stack(self) -> bool {
        matches!(self, Placement::Stack(_))
    }
}

/// How a name was declared, as far as shadowing rules care.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DeclarationKind {
    /// Parameter, `var`, or hoisted function declaration (unit-scoped).
    Var,
    /// `let`/`const`/class/catch parameter (block-scoped).
    Lexical,
}

/// One unit-level (`var`-class) binding: a parameter, `var`, or hoisted
/// function declaration.
#[derive(Clone, Debug)]
pub struct VarBinding {
    pub name: Atom,
    pub mutable: bool,
    /// The name appeared in the parameter list.
    pub from_parameter: bool,
    /// Referenced by a nested closure; forces heap placement.
    pub captured: bool,
    pub placement: Placement,
}

/// One entry of the parameter list, in source order. Duplicate names each
/// keep their positional entry but share one [`VarBinding`].
#[derive(Clone, Copy, Debug)]
pub struct Param {
    pub name: Atom,
    /// The name occurs more than once in the parameter list. The shared
    /// var binding belongs to the last occurrence, matching the standard
    /// rule that later duplicate parameters shadow earlier ones.
    pub duplicated: bool,
    /// Index of the binding in the unit's var table.
    pub var_index: u32,
}

/// The per-function/eval/script scope container.
///
/// Owned by the [`crate::ScopeTree`] arena. Owns its parameter, var, and
/// block tables; links to parent and children by [`UnitId`] only.
#[derive(Debug)]
pub struct ScopeUnit {
    pub(crate) id: UnitId,
    pub(crate) kind: UnitKind,
    pub(crate) flags: UnitFlags,
    pub(crate) parent: Option<UnitId>,
    pub(crate) children: Vec<UnitId>,
    /// Which block of the parent unit this unit is lexically located in.
    pub(crate) located_in_block: BlockId,
    pub(crate) params: Vec<Param>,
    pub(crate) vars: Vec<VarBinding>,
    pub(crate) blocks: Vec<BlockScope>,
    /// Capture requests: free names referenced here but not declared here.
    pub(crate) free_names: Vec<Atom>,
    // Frame sizing, computed by analysis. Var counts cover `var`-class
    // bindings only; the lexical depth covers `let`-class stack slots.
    pub(crate) vars_on_stack: u16,
    pub(crate) vars_on_heap: u16,
    pub(crate) max_lexical_stack_depth: u16,
}

impl ScopeUnit {
    pub fn id(&self) -> UnitId {
        self.id
    }

    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    pub fn flags(&self) -> UnitFlags {
        self.flags
    }

    pub fn parent(&self) -> Option<UnitId> {
        self.parent
    }

    pub fn children(&self) -> &[UnitId] {
        &self.children
    }

    pub fn located_in_block(&self) -> BlockId {
        self.located_in_block
    }

    // --- capability flags (fixed once analysis completes) ---

    pub fn uses_indexed_storage(&self) -> bool {
        self.flags.contains(UnitFlags::INDEXED_STORAGE)
    }

    pub fn can_allocate_variables_on_stack(&self) -> bool {
        self.flags.contains(UnitFlags::STACK_VARIABLES)
    }

    pub fn can_allocate_environment_on_stack(&self) -> bool {
        self.flags.contains(UnitFlags::STACK_ENVIRONMENT)
    }

    pub fn has_non_indexed_descendant(&self) -> bool {
        self.flags.contains(UnitFlags::NON_INDEXED_DESCENDANT)
    }

    /// Direct use of `eval` or `with` in this unit.
    pub fn uses_dynamic_scope_construct(&self) -> bool {
        self.flags
            .intersects(UnitFlags::HAS_DIRECT_EVAL | UnitFlags::HAS_WITH)
    }

    pub fn has_direct_eval(&self) -> bool {
        self.flags.contains(UnitFlags::HAS_DIRECT_EVAL)
    }

    pub fn has_with(&self) -> bool {
        self.flags.contains(UnitFlags::HAS_WITH)
    }

    // --- kind predicates ---

    pub fn is_global(&self) -> bool {
        self.kind == UnitKind::Global
    }

    pub fn is_eval_code(&self) -> bool {
        self.kind == UnitKind::Eval
    }

    pub fn is_eval_code_in_function(&self) -> bool {
        self.kind == UnitKind::Eval && self.flags.contains(UnitFlags::EVAL_IN_FUNCTION)
    }

    pub fn is_function_declaration(&self) -> bool {
        self.kind == UnitKind::FunctionDeclaration
    }

    pub fn is_function_expression(&self) -> bool {
        self.kind == UnitKind::FunctionExpression
    }

    pub fn is_arrow(&self) -> bool {
        self.kind == UnitKind::Arrow
    }

    pub fn is_class_constructor(&self) -> bool {
        matches!(
            self.kind,
            UnitKind::ClassConstructor | UnitKind::DerivedClassConstructor
        )
    }

    pub fn is_derived_class_constructor(&self) -> bool {
        self.kind == UnitKind::DerivedClassConstructor
    }

    pub fn is_class_method(&self) -> bool {
        self.kind == UnitKind::ClassMethod
    }

    pub fn is_generator(&self) -> bool {
        self.kind == UnitKind::Generator
    }

    // --- parameters ---

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn parameter_count(&self) -> u16 {
        self.params.len() as u16
    }

    pub fn has_parameter(&self, name: Atom) -> bool {
        self.params.iter().any(|p| p.name == name)
    }

    /// Parameter copying cannot use the one-slot-per-argument fast path:
    /// duplicates or default/destructuring initializers are involved.
    pub fn needs_complex_parameter_copy(&self) -> bool {
        self.flags.intersects(
            UnitFlags::HAS_DUPLICATE_PARAMS | UnitFlags::HAS_PARAMETER_INITIALIZERS,
        )
    }

    // --- declaration tables ---

    pub fn vars(&self) -> &[VarBinding] {
        &self.vars
    }

    /// Index of a `var`-class binding by name, if declared in this unit.
    pub fn find_var(&self, name: Atom) -> Option<usize> {
        self.vars.iter().position(|v| v.name == name)
    }

    pub fn has_var(&self, name: Atom) -> bool {
        self.find_var(name).is_some()
    }

    pub fn blocks(&self) -> &[BlockScope] {
        &self.blocks
    }

    /// The block record for `index`. Panics if the id is not in this
    /// unit's table: that is a corrupted reference from the parser or a
    /// defect in this pass, never a recoverable condition.
    pub fn block(&self, index: BlockId) -> &BlockScope {
        match self.blocks.iter().find(|b| b.index() == index) {
            Some(block) => block,
            None => panic!(
                "block {:?} missing from unit {:?} block table",
                index, self.id
            ),
        }
    }

    pub(crate) fn block_mut(&mut self, index: BlockId) -> &mut BlockScope {
        let id = self.id;
        match self.blocks.iter_mut().find(|b| b.index() == index) {
            Some(block) => block,
            None => panic!("block {index:?} missing from unit {id:?} block table"),
        }
    }

    /// Whether `name` is visible at `block` through the block chain or the
    /// unit-level var table.
    pub fn has_name(&self, block: BlockId, name: Atom) -> bool {
        self.find_name_within_block(block, name).is_some() || self.has_var(name)
    }

    /// Search `block` and its ancestor blocks for a lexical declaration.
    /// Returns (owning block id, binding index within that block).
    pub(crate) fn find_name_within_block(
        &self,
        block: BlockId,
        name: Atom,
    ) -> Option<(BlockId, usize)> {
        let mut current = block;
        let mut iterations = 0;
        while !current.is_none() {
            let b = self.block(current);
            if let Some(i) = b.find(name) {
                return Some((current, i));
            }
            current = b.parent();
            iterations += 1;
            assert!(
                iterations <= vesper_common::limits::MAX_BLOCK_WALK_ITERATIONS,
                "block parent chain of unit {:?} does not terminate",
                self.id
            );
        }
        None
    }

    // --- frame sizing (computed by analysis) ---

    /// Number of `var`-class bindings placed in the call-stack frame.
    pub fn vars_on_stack(&self) -> u16 {
        self.vars_on_stack
    }

    /// Number of `var`-class bindings promoted to the heap environment.
    pub fn vars_on_heap(&self) -> u16 {
        self.vars_on_heap
    }

    /// Maximum simultaneously live stack-placed lexical bindings across
    /// any path through the block tree.
    pub fn max_lexical_stack_depth(&self) -> u16 {
        self.max_lexical_stack_depth
    }

    /// Total call-stack frame slots the interpreter must reserve.
    pub fn total_stack_frame_size(&self) -> u16 {
        self.vars_on_stack + self.max_lexical_stack_depth
    }
}
