//! Block scope records: per-block lexical declaration tables.

use crate::BlockId;
use crate::unit::Placement;
use smallvec::SmallVec;
use vesper_common::Atom;

/// One block-scoped (`let`/`const`/class/catch-parameter) binding.
#[derive(Clone, Debug)]
pub struct LexicalBinding {
    pub name: Atom,
    /// `let` and catch parameters are mutable, `const` and class names are
    /// not.
    pub mutable: bool,
    /// Referenced from a nested unit; forces the owning block onto a heap
    /// environment record.
    pub captured: bool,
    pub placement: Placement,
}

/// One lexical block inside a scope unit.
///
/// Blocks form a tree rooted at the unit's body block (whose parent is
/// [`BlockId::NONE`]); the tree mirrors `{}` nesting in the source. Each
/// record holds the names declared directly in its block, nothing inherited.
#[derive(Clone, Debug)]
pub struct BlockScope {
    index: BlockId,
    parent: BlockId,
    /// Declarations in source order. Most blocks declare at most a handful
    /// of names, so the table lives inline.
    bindings: SmallVec<[LexicalBinding; 4]>,
    /// At least one binding here outlives the block's dynamic extent, or a
    /// nested unit below this block lost stack placement. Decided during
    /// analysis, frozen afterwards.
    needs_heap_environment: bool,
}

impl BlockScope {
    pub(crate) fn new(index: BlockId, parent: BlockId) -> BlockScope {
        BlockScope {
            index,
            parent,
            bindings: SmallVec::new(),
            needs_heap_environment: false,
        }
    }

    pub(crate) fn push(&mut self, name: Atom, mutable: bool) {
        self.bindings.push(LexicalBinding {
            name,
            mutable,
            captured: false,
            placement: Placement::Unassigned,
        });
    }

    pub fn index(&self) -> BlockId {
        self.index
    }

    /// Parent block within the same unit; [`BlockId::NONE`] for the unit's
    /// body block.
    pub fn parent(&self) -> BlockId {
        self.parent
    }

    pub fn bindings(&self) -> &[LexicalBinding] {
        &self.bindings
    }

    pub(crate) fn bindings_mut(&mut self) -> &mut [LexicalBinding] {
        &mut self.bindings
    }

    /// Index of a binding declared directly in this block.
    pub fn find(&self, name: Atom) -> Option<usize> {
        self.bindings.iter().position(|b| b.name == name)
    }

    /// Whether this block's environment record must be heap-allocated at
    /// run time (a capture reaches into it, or execution can re-enter it
    /// while a previous activation is still live).
    pub fn needs_heap_environment(&self) -> bool {
        self.needs_heap_environment
    }

    pub(crate) fn set_needs_heap_environment(&mut self) {
        self.needs_heap_environment = true;
    }
}
