//! Identifier resolution queries against an analyzed scope tree.

use crate::tree::ScopeTree;
use crate::unit::{DeclarationKind, Placement};
use crate::{BlockId, UnitId};
use serde::Serialize;
use tracing::trace;
use vesper_common::{Atom, limits};

/// The answer to one identifier lookup: how the generated bytecode should
/// access the name.
///
/// `Dynamic` is a first-class result, not an error: it tells the caller to
/// emit a by-name lookup against the live environment chain, which is the
/// correct semantics around `eval`, `with`, and unresolved globals.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Resolution {
    /// Fixed slot in the current call-stack frame. Only ever produced for
    /// bindings of the unit the query started in.
    Stack {
        slot: u32,
        mutable: bool,
        kind: DeclarationKind,
        /// Owning block for lexical bindings, [`BlockId::NONE`] for vars.
        block: BlockId,
    },
    /// Fixed slot in the heap environment record `hops` materialized
    /// records up the chain from the reference site.
    Heap {
        hops: u32,
        slot: u32,
        mutable: bool,
        kind: DeclarationKind,
        /// Owning block for lexical bindings, [`BlockId::NONE`] for vars.
        block: BlockId,
    },
    /// Top-level `let`/`const`/class binding: resolved by name against the
    /// single shared global lexical record, never by index.
    GlobalLexical { mutable: bool },
    /// No statically known storage; emit a by-name environment-chain
    /// lookup.
    Dynamic,
}

impl ScopeTree {
    /// Resolve a free identifier referenced at (`unit`, `block`) to its
    /// storage descriptor.
    ///
    /// Walks block chains inward-out, then unit parents, mirroring the
    /// run-time environment chain. The hop count advances once per crossed
    /// block whose record is heap-materialized and once per function
    /// boundary; blocks that never materialize a record cost nothing, in
    /// agreement with the environment allocator.
    pub fn resolve(&self, unit: UnitId, block: BlockId, name: Atom) -> Resolution {
        let mut current = unit;
        let mut entry = block;
        let mut hops: u32 = 0;
        let mut crossed_units: u32 = 0;
        let mut unit_iterations = 0;
        loop {
            unit_iterations += 1;
            assert!(
                unit_iterations <= limits::MAX_UNIT_WALK_ITERATIONS,
                "unit parent chain does not terminate at {current:?}"
            );
            let u = self.unit(current);
            if !u.uses_indexed_storage() {
                break;
            }

            let mut b = entry;
            let mut block_iterations = 0;
            while !b.is_none() {
                let rec = u.block(b);
                if let Some(i) = rec.find(name) {
                    let binding = &rec.bindings()[i];
                    if u.is_global() && rec.parent().is_none() {
                        return Resolution::GlobalLexical {
                            mutable: binding.mutable,
                        };
                    }
                    return match binding.placement {
                        Placement::Stack(slot) => {
                            assert!(
                                crossed_units == 0,
                                "stack-placed lexical {name:?} reached across a function \
                                 boundary; capture analysis should have promoted it"
                            );
                            Resolution::Stack {
                                slot,
                                mutable: binding.mutable,
                                kind: DeclarationKind::Lexical,
                                block: b,
                            }
                        }
                        Placement::Heap(slot) => Resolution::Heap {
                            hops,
                            slot,
                            mutable: binding.mutable,
                            kind: DeclarationKind::Lexical,
                            block: b,
                        },
                        Placement::Unassigned | Placement::ByName => {
                            panic!("lexical {name:?} in {current:?} has no placement")
                        }
                    };
                }
                if rec.needs_heap_environment() {
                    hops += 1;
                }
                b = rec.parent();
                block_iterations += 1;
                assert!(
                    block_iterations <= limits::MAX_BLOCK_WALK_ITERATIONS,
                    "block parent chain of {current:?} does not terminate"
                );
            }

            if let Some(i) = u.find_var(name) {
                let var = &u.vars()[i];
                return match var.placement {
                    Placement::Stack(slot) => {
                        assert!(
                            crossed_units == 0,
                            "stack-placed var {name:?} reached across a function \
                             boundary; capture analysis should have promoted it"
                        );
                        Resolution::Stack {
                            slot,
                            mutable: var.mutable,
                            kind: DeclarationKind::Var,
                            block: BlockId::NONE,
                        }
                    }
                    Placement::Heap(slot) => Resolution::Heap {
                        hops,
                        slot,
                        mutable: var.mutable,
                        kind: DeclarationKind::Var,
                        block: BlockId::NONE,
                    },
                    Placement::Unassigned | Placement::ByName => {
                        panic!("var {name:?} in {current:?} has no placement")
                    }
                };
            }

            let Some(parent) = u.parent() else {
                break;
            };
            hops += 1;
            crossed_units += 1;
            entry = u.located_in_block();
            current = parent;
        }
        trace!(?unit, ?name, "dynamic resolution");
        Resolution::Dynamic
    }
}
