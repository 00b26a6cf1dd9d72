//! The scope tree: arena of units plus construction from parser summaries.

use crate::block::BlockScope;
use crate::summary::UnitSummary;
use crate::unit::{Param, Placement, ScopeUnit, UnitFlags, VarBinding};
use crate::{BlockId, UnitId};
use rustc_hash::FxHashMap;
use tracing::debug;
use vesper_common::{Atom, Interner, limits};

/// All scope units of one program, analysis results included.
///
/// Built once from the parser's summary tree by [`ScopeTree::build`], which
/// also runs the full capability/capture/slot analysis. After that the tree
/// is immutable; resolution queries take `&self` and mutate nothing.
pub struct ScopeTree {
    units: Vec<ScopeUnit>,
    interner: Interner,
    root: UnitId,
}

impl ScopeTree {
    /// Construct and analyze the scope tree for one program.
    ///
    /// `summary` is the root unit (global script or standalone eval body);
    /// `interner` must be the one the parser interned all names into.
    pub fn build(summary: UnitSummary, interner: Interner) -> ScopeTree {
        let mut tree = ScopeTree {
            units: Vec::with_capacity(limits::UNIT_PREALLOC),
            interner,
            root: UnitId(0),
        };
        tree.root = tree.add_unit(summary, None);
        debug!(units = tree.units.len(), "scope tree constructed");
        tree.analyze();
        tree
    }

    fn add_unit(&mut self, summary: UnitSummary, parent: Option<UnitId>) -> UnitId {
        let id = UnitId(self.units.len() as u32);
        let unit = self.lower_summary(id, &summary, parent);
        self.units.push(unit);
        for child in summary.children {
            let child_id = self.add_unit(child, Some(id));
            self.units[id.index()].children.push(child_id);
        }
        id
    }

    fn lower_summary(
        &self,
        id: UnitId,
        summary: &UnitSummary,
        parent: Option<UnitId>,
    ) -> ScopeUnit {
        let mut flags = UnitFlags::empty();
        if summary.has_direct_eval {
            flags |= UnitFlags::HAS_DIRECT_EVAL;
        }
        if summary.has_with {
            flags |= UnitFlags::HAS_WITH;
        }
        if summary.eval_in_function {
            flags |= UnitFlags::EVAL_IN_FUNCTION;
        }
        if summary.has_parameter_initializers {
            flags |= UnitFlags::HAS_PARAMETER_INITIALIZERS;
        }

        // Parameters first. Duplicate names share a single var binding, owned
        // by the last occurrence; every occurrence of a repeated name is
        // flagged so argument copying knows the fast path is off.
        let mut vars: Vec<VarBinding> = Vec::new();
        let mut var_index_by_name: FxHashMap<Atom, u32> = FxHashMap::default();
        let mut params: Vec<Param> = Vec::with_capacity(summary.params.len());
        for p in &summary.params {
            let duplicated = summary.params.iter().filter(|q| q.name == p.name).count() > 1;
            let var_index = match var_index_by_name.get(&p.name) {
                Some(&existing) => {
                    flags |= UnitFlags::HAS_DUPLICATE_PARAMS;
                    existing
                }
                None => {
                    let index = vars.len() as u32;
                    vars.push(VarBinding {
                        name: p.name,
                        mutable: true,
                        from_parameter: true,
                        captured: false,
                        placement: Placement::Unassigned,
                    });
                    var_index_by_name.insert(p.name, index);
                    index
                }
            };
            params.push(Param {
                name: p.name,
                duplicated,
                var_index,
            });
        }

        // `var` redeclaring a parameter name (or another `var`) merges into
        // the existing binding instead of introducing a second one.
        for v in &summary.vars {
            if var_index_by_name.contains_key(&v.name) {
                continue;
            }
            var_index_by_name.insert(v.name, vars.len() as u32);
            vars.push(VarBinding {
                name: v.name,
                mutable: v.mutable,
                from_parameter: false,
                captured: false,
                placement: Placement::Unassigned,
            });
        }

        let mut blocks: Vec<BlockScope> = Vec::with_capacity(summary.blocks.len());
        for b in &summary.blocks {
            let mut block = BlockScope::new(b.index, b.parent);
            for lex in &b.lexicals {
                block.push(lex.name, lex.mutable);
            }
            blocks.push(block);
        }
        assert!(
            blocks.iter().any(|b| b.parent().is_none()),
            "unit {id:?} has no body block"
        );

        let mut free_names = summary.free_names.clone();
        free_names.sort_unstable();
        free_names.dedup();

        ScopeUnit {
            id,
            kind: summary.kind,
            flags,
            parent,
            children: Vec::new(),
            located_in_block: summary.located_in_block,
            params,
            vars,
            blocks,
            free_names,
            vars_on_stack: 0,
            vars_on_heap: 0,
            max_lexical_stack_depth: 0,
        }
    }

    pub fn root(&self) -> UnitId {
        self.root
    }

    pub fn root_unit(&self) -> &ScopeUnit {
        &self.units[self.root.index()]
    }

    /// The unit for `id`. Panics on an id from another tree; unit ids are
    /// never exposed before the unit exists, so a miss is a caller defect.
    pub fn unit(&self, id: UnitId) -> &ScopeUnit {
        match self.units.get(id.index()) {
            Some(unit) => unit,
            None => panic!("unit {id:?} out of range for this scope tree"),
        }
    }

    pub(crate) fn unit_mut(&mut self, id: UnitId) -> &mut ScopeUnit {
        match self.units.get_mut(id.index()) {
            Some(unit) => unit,
            None => panic!("unit {id:?} out of range for this scope tree"),
        }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn units(&self) -> impl Iterator<Item = &ScopeUnit> {
        self.units.iter()
    }

    /// Whether any ancestor of `id` lacks indexed storage. Such an
    /// ancestor resolves names dynamically, so this unit's environment
    /// records can be observed from outside its static scope chain.
    pub fn has_ancestor_without_indexed_storage(&self, id: UnitId) -> bool {
        let mut current = self.unit(id).parent();
        let mut iterations = 0;
        while let Some(ancestor) = current {
            iterations += 1;
            assert!(
                iterations <= limits::MAX_UNIT_WALK_ITERATIONS,
                "unit parent chain does not terminate at {ancestor:?}"
            );
            let unit = self.unit(ancestor);
            if !unit.uses_indexed_storage() {
                return true;
            }
            current = unit.parent();
        }
        false
    }

    pub fn interner(&self) -> &Interner {
        &self.interner
    }
}

impl std::fmt::Debug for ScopeTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeTree")
            .field("units", &self.units.len())
            .field("root", &self.root)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::BlockSummary;
    use crate::unit::UnitKind;
    use vesper_common::Atom;

    fn names(interner: &mut Interner, list: &[&str]) -> Vec<Atom> {
        list.iter().map(|n| interner.intern(n)).collect()
    }

    #[test]
    fn duplicate_parameters_share_one_binding() {
        let mut interner = Interner::new();
        let n = names(&mut interner, &["a", "b"]);
        let summary = UnitSummary::new(UnitKind::Global).with_child(
            BlockId(0),
            UnitSummary::new(UnitKind::FunctionDeclaration)
                .with_param(n[0])
                .with_param(n[1])
                .with_param(n[0]),
        );
        let tree = ScopeTree::build(summary, interner);
        let f = tree.unit(UnitId(1));
        assert_eq!(f.params().len(), 3);
        assert_eq!(f.vars().len(), 2);
        assert!(f.params()[0].duplicated);
        assert!(!f.params()[1].duplicated);
        assert!(f.params()[2].duplicated);
        assert_eq!(f.params()[0].var_index, f.params()[2].var_index);
        assert!(f.needs_complex_parameter_copy());
    }

    #[test]
    fn var_redeclaring_parameter_merges() {
        let mut interner = Interner::new();
        let x = interner.intern("x");
        let summary = UnitSummary::new(UnitKind::Global).with_child(
            BlockId(0),
            UnitSummary::new(UnitKind::FunctionDeclaration)
                .with_param(x)
                .with_var(x),
        );
        let tree = ScopeTree::build(summary, interner);
        let f = tree.unit(UnitId(1));
        assert_eq!(f.vars().len(), 1);
        assert!(f.vars()[0].from_parameter);
    }

    #[test]
    fn free_names_are_deduplicated() {
        let mut interner = Interner::new();
        let x = interner.intern("x");
        let summary = UnitSummary::new(UnitKind::Global).with_child(
            BlockId(0),
            UnitSummary::new(UnitKind::Arrow)
                .with_free_name(x)
                .with_free_name(x),
        );
        let tree = ScopeTree::build(summary, interner);
        assert_eq!(tree.unit(UnitId(1)).children().len(), 0);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn foreign_unit_id_panics() {
        let interner = Interner::new();
        let tree = ScopeTree::build(UnitSummary::new(UnitKind::Global), interner);
        let _ = tree.unit(UnitId(99));
    }
}
