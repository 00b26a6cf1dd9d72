//! Parser-facing scope summaries.
//!
//! The parser produces one [`UnitSummary`] per function, eval body, or
//! top-level script while it builds the AST: the parameter list in source
//! order, the `var`/function declarations hoisted to the unit level, the
//! nested block tree with its lexical declarations, and — per nested child
//! unit — the set of free names that child references but does not itself
//! declare (capture requests). That is everything scope analysis needs;
//! no re-scan of source text happens after parsing.

use crate::{BlockId, unit::UnitKind};
use vesper_common::Atom;

/// One parameter name, in source order. Duplicate names may repeat;
/// duplicate detection happens during unit construction.
#[derive(Clone, Copy, Debug)]
pub struct ParamSummary {
    pub name: Atom,
}

/// One unit-level (`var`-class) declaration: `var`s and hoisted function
/// declarations.
#[derive(Clone, Copy, Debug)]
pub struct VarSummary {
    pub name: Atom,
    pub mutable: bool,
}

/// One lexical (`let`/`const`/class/catch-parameter) declaration inside a
/// block.
#[derive(Clone, Copy, Debug)]
pub struct LexicalSummary {
    pub name: Atom,
    pub mutable: bool,
}

/// One lexical block: its parser-assigned index, its parent block index
/// ([`BlockId::NONE`] for the unit's body block), and the names declared
/// directly in it.
#[derive(Clone, Debug)]
pub struct BlockSummary {
    pub index: BlockId,
    pub parent: BlockId,
    pub lexicals: Vec<LexicalSummary>,
}

impl BlockSummary {
    pub fn new(index: BlockId, parent: BlockId) -> BlockSummary {
        BlockSummary {
            index,
            parent,
            lexicals: Vec::new(),
        }
    }

    pub fn with_lexical(mut self, name: Atom, mutable: bool) -> BlockSummary {
        self.lexicals.push(LexicalSummary { name, mutable });
        self
    }
}

/// Per-unit scope summary handed over by the parser.
#[derive(Clone, Debug)]
pub struct UnitSummary {
    pub kind: UnitKind,
    /// The unit directly contains a direct `eval` call.
    pub has_direct_eval: bool,
    /// The unit directly contains a `with` statement.
    pub has_with: bool,
    /// For eval bodies: the eval site is inside a function (as opposed to
    /// global code).
    pub eval_in_function: bool,
    /// Some parameter has a default value or destructuring pattern.
    pub has_parameter_initializers: bool,
    /// Parameters in source order.
    pub params: Vec<ParamSummary>,
    /// `var`/function declarations hoisted to the unit level, in source order.
    pub vars: Vec<VarSummary>,
    /// The block tree. The body block (parent == [`BlockId::NONE`]) must be
    /// present; every other block's parent must also be listed.
    pub blocks: Vec<BlockSummary>,
    /// Free names this unit references but does not declare, deduplicated
    /// by the parser. These are the capture requests the enclosing unit
    /// answers during analysis.
    pub free_names: Vec<Atom>,
    /// The block of the *parent* unit this unit is lexically located in.
    /// [`BlockId::NONE`] for the root unit.
    pub located_in_block: BlockId,
    /// Nested function/eval units, innermost structure preserved.
    pub children: Vec<UnitSummary>,
}

impl UnitSummary {
    /// A fresh summary with an empty body block already present.
    pub fn new(kind: UnitKind) -> UnitSummary {
        UnitSummary {
            kind,
            has_direct_eval: false,
            has_with: false,
            eval_in_function: false,
            has_parameter_initializers: false,
            params: Vec::new(),
            vars: Vec::new(),
            blocks: vec![BlockSummary::new(BlockId(0), BlockId::NONE)],
            free_names: Vec::new(),
            located_in_block: BlockId::NONE,
            children: Vec::new(),
        }
    }

    pub fn with_param(mut self, name: Atom) -> UnitSummary {
        self.params.push(ParamSummary { name });
        self
    }

    pub fn with_var(mut self, name: Atom) -> UnitSummary {
        self.vars.push(VarSummary {
            name,
            mutable: true,
        });
        self
    }

    pub fn with_block(mut self, block: BlockSummary) -> UnitSummary {
        self.blocks.push(block);
        self
    }

    /// Declare a lexical directly in the unit's body block.
    pub fn with_body_lexical(mut self, name: Atom, mutable: bool) -> UnitSummary {
        self.blocks[0].lexicals.push(LexicalSummary { name, mutable });
        self
    }

    pub fn with_free_name(mut self, name: Atom) -> UnitSummary {
        self.free_names.push(name);
        self
    }

    pub fn with_direct_eval(mut self) -> UnitSummary {
        self.has_direct_eval = true;
        self
    }

    pub fn with_with(mut self) -> UnitSummary {
        self.has_with = true;
        self
    }

    /// Attach a nested unit located in `block` of this unit.
    pub fn with_child(mut self, block: BlockId, mut child: UnitSummary) -> UnitSummary {
        child.located_in_block = block;
        self.children.push(child);
        self
    }
}
