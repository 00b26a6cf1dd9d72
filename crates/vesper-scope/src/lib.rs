//! Static scope resolution for the vesper JavaScript engine front end.
//!
//! For every function, block, and top-level program unit this crate decides,
//! at compile time, how each declared name will be stored and accessed at
//! run time, and it answers the identifier-lookup queries the bytecode
//! generator emits code from.
//!
//! The pipeline has three stages:
//!
//! 1. **Construction**: the parser hands over one [`summary::UnitSummary`]
//!    per function/eval/script body (declared names, parameters, the nested
//!    block tree, and the free names each nested unit references).
//!    [`ScopeTree::build`] turns the summary tree into an arena of
//!    [`ScopeUnit`]s.
//!
//! 2. **Analysis**: a top-down pass computes the storage-capability flags
//!    (indexed slots vs. by-name lookup, stack vs. heap placement), then a
//!    bottom-up pass promotes closure-captured bindings onto heap-backed
//!    environment records and assigns dense slot indices. After analysis
//!    the tree is immutable.
//!
//! 3. **Queries**: [`ScopeTree::resolve`] maps a free identifier reference
//!    at some (unit, block) position to exactly one [`Resolution`]
//!    descriptor; [`Resolution::Dynamic`] is the well-defined fallback that
//!    tells the caller to emit by-name lookup against the live environment
//!    chain (`eval`/`with` territory), never an error.
//!
//! There is no user-facing error surface here: inputs are already
//! syntax-validated, and the only fatal condition is an internal invariant
//! violation, which panics (a compiler defect, not a script error).

pub mod block;
pub mod resolve;
pub mod summary;
pub mod tree;
pub mod unit;

mod analyze;

pub use block::{BlockScope, LexicalBinding};
pub use resolve::Resolution;
pub use tree::ScopeTree;
pub use unit::{DeclarationKind, Param, Placement, ScopeUnit, UnitFlags, UnitKind, VarBinding};

use serde::Serialize;

/// Index of a [`ScopeUnit`] within its owning [`ScopeTree`] arena.
///
/// Units hold their parent and children as `UnitId`s rather than references,
/// keeping ownership strictly tree-shaped (the arena owns, ids point).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, PartialOrd, Ord)]
pub struct UnitId(pub u32);

impl UnitId {
    /// Get the raw index value.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of a lexical block within its owning [`ScopeUnit`].
///
/// Block indices are assigned by the parser and unique per unit; they form
/// a tree rooted at the unit's body block, whose parent is [`BlockId::NONE`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, PartialOrd, Ord)]
pub struct BlockId(pub u16);

impl BlockId {
    /// Sentinel for "no block": the parent of a unit's body block.
    pub const NONE: BlockId = BlockId(u16::MAX);

    #[inline]
    pub fn is_none(self) -> bool {
        self == BlockId::NONE
    }
}
