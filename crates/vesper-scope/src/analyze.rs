//! Scope analysis: capability flags, closure-capture propagation, and slot
//! assignment.
//!
//! Runs once from [`ScopeTree::build`], in four passes over the unit arena:
//!
//! 1. top-down capability computation (indexed storage, stack placement),
//! 2. bottom-up `NON_INDEXED_DESCENDANT` marking,
//! 3. capture propagation: each unit's free names walk the ancestor chain
//!    and promote whatever binding satisfies them onto heap storage,
//! 4. slot assignment: dense numeric slots per unit, frame-size counters.
//!
//! After the last pass the tree is frozen; resolution queries read it
//! through `&self` only.

use crate::tree::ScopeTree;
use crate::unit::{Placement, UnitFlags, UnitKind};
use crate::{BlockId, UnitId};
use smallvec::SmallVec;
use tracing::{debug, trace};
use vesper_common::{Atom, limits};

impl ScopeTree {
    pub(crate) fn analyze(&mut self) {
        self.compute_capabilities(self.root(), None);
        self.mark_non_indexed_descendants(self.root());
        self.propagate_captures();
        for idx in 0..self.len() {
            self.assign_slots(UnitId(idx as u32));
        }
        debug!(units = self.len(), "scope analysis complete");
    }

    /// Pass 1: storage capabilities, parent before child.
    ///
    /// A unit that contains direct `eval` or `with`, or *is* eval code,
    /// cannot know its own name set statically: it loses indexed storage
    /// outright. A unit below a non-indexed parent keeps indexed slots for
    /// its own names but must place them on the heap, since the parent's
    /// dynamic lookups can reach into a live environment record at any
    /// time. The rule looks at the immediate parent only; a clean unit
    /// below that regains full stack capability.
    fn compute_capabilities(&mut self, id: UnitId, parent: Option<UnitId>) {
        let parent_indexed =
            parent.is_none_or(|p| self.unit(p).uses_indexed_storage());
        let unit = self.unit_mut(id);
        let dynamic =
            unit.kind() == UnitKind::Eval || unit.uses_dynamic_scope_construct();
        if !dynamic {
            unit.flags |= UnitFlags::INDEXED_STORAGE;
            if parent_indexed {
                unit.flags |= UnitFlags::STACK_VARIABLES | UnitFlags::STACK_ENVIRONMENT;
            }
        }
        trace!(unit = ?id, flags = ?self.unit(id).flags(), "capabilities");
        let children: Vec<UnitId> = self.unit(id).children().to_vec();
        for child in children {
            self.compute_capabilities(child, Some(id));
        }
    }

    /// Pass 2: post-order. A unit learns whether any unit below it lost
    /// indexed storage; codegen uses this to keep environment records for
    /// such subtrees discoverable by name.
    fn mark_non_indexed_descendants(&mut self, id: UnitId) -> bool {
        let children: Vec<UnitId> = self.unit(id).children().to_vec();
        let mut tainted = false;
        for child in children {
            let child_tainted = self.mark_non_indexed_descendants(child);
            tainted |= child_tainted || !self.unit(child).uses_indexed_storage();
        }
        if tainted {
            self.unit_mut(id).flags |= UnitFlags::NON_INDEXED_DESCENDANT;
        }
        tainted || !self.unit(id).uses_indexed_storage()
    }

    /// Pass 3: answer every unit's capture requests.
    ///
    /// All marking is monotonic (bits set, never cleared back), so units
    /// can be processed in any order; arena order is used.
    fn propagate_captures(&mut self) {
        for idx in 0..self.len() {
            let id = UnitId(idx as u32);
            let unit = self.unit(id);
            if unit.parent().is_none() {
                continue;
            }
            let names: Vec<Atom> = unit.free_names.clone();
            let parent = unit.parent();
            let entry = unit.located_in_block();
            for name in names {
                self.capture_name(parent, entry, name);
            }
        }
    }

    /// Walk the ancestor chain looking for the binding a free name refers
    /// to, and promote it to heap storage when found.
    ///
    /// A non-indexed ancestor absorbs the request (the name will be looked
    /// up by name at run time, nothing to promote); a name unresolved at
    /// the global unit is a global-object property and needs no marking.
    fn capture_name(&mut self, mut current: Option<UnitId>, mut entry: BlockId, name: Atom) {
        let mut crossed: SmallVec<[UnitId; 4]> = SmallVec::new();
        let mut iterations = 0;
        while let Some(anc_id) = current {
            iterations += 1;
            assert!(
                iterations <= limits::MAX_UNIT_WALK_ITERATIONS,
                "unit parent chain does not terminate at {anc_id:?}"
            );
            let anc = self.unit(anc_id);
            if !anc.uses_indexed_storage() {
                return;
            }
            if let Some((owning, binding)) = anc.find_name_within_block(entry, name) {
                trace!(unit = ?anc_id, block = ?owning, "lexical capture");
                self.mark_lexical_capture(anc_id, entry, owning, binding);
                self.clear_stack_environment(&crossed);
                return;
            }
            if let Some(var) = self.unit(anc_id).find_var(name) {
                trace!(unit = ?anc_id, var, "var capture");
                let anc = self.unit_mut(anc_id);
                anc.vars[var].captured = true;
                anc.flags.remove(UnitFlags::STACK_ENVIRONMENT);
                self.clear_stack_environment(&crossed);
                return;
            }
            if self.unit(anc_id).is_global() {
                return;
            }
            crossed.push(anc_id);
            entry = self.unit(anc_id).located_in_block();
            current = self.unit(anc_id).parent();
        }
    }

    /// Promote one lexical binding onto a heap-backed block record, and
    /// mark every block from the capture's entry point up to the owning
    /// block: each of those records sits on the environment chain the
    /// closure keeps alive, so none of them may live in the dying frame.
    ///
    /// The global unit's body block is exempt: its lexicals live in the
    /// single persistent global lexical record, addressed by name.
    fn mark_lexical_capture(
        &mut self,
        id: UnitId,
        entry: BlockId,
        owning: BlockId,
        binding: usize,
    ) {
        let is_global = self.unit(id).is_global();
        let unit = self.unit_mut(id);
        let owning_is_global_record = is_global && unit.block(owning).parent().is_none();
        unit.block_mut(owning).bindings_mut()[binding].captured = true;
        let mut block = entry;
        let mut iterations = 0;
        loop {
            if !(is_global && unit.block(block).parent().is_none()) {
                unit.block_mut(block).set_needs_heap_environment();
            }
            if block == owning {
                break;
            }
            block = unit.block(block).parent();
            assert!(
                !block.is_none(),
                "capture entry block is not a descendant of the owning block in {id:?}"
            );
            iterations += 1;
            assert!(
                iterations <= limits::MAX_BLOCK_WALK_ITERATIONS,
                "block parent chain of unit {id:?} does not terminate"
            );
        }
        if !owning_is_global_record {
            unit.flags.remove(UnitFlags::STACK_ENVIRONMENT);
        }
    }

    /// Every unit a capture walked through keeps its environment record on
    /// the closure's chain, so its record goes to the heap too.
    fn clear_stack_environment(&mut self, crossed: &[UnitId]) {
        for &id in crossed {
            self.unit_mut(id)
                .flags
                .remove(UnitFlags::STACK_ENVIRONMENT);
        }
    }

    /// Pass 4: numeric slot assignment and frame-size counters for one unit.
    ///
    /// Non-indexed units get [`Placement::ByName`] for everything and zero
    /// counters. Otherwise the var table fills two dense slot ranges
    /// (stack and heap), and the block tree is walked depth-first with a
    /// running stack-depth accumulator; sibling subtrees reuse the same
    /// stack slots because at most one of them is live at a time.
    fn assign_slots(&mut self, id: UnitId) {
        let unit = self.unit_mut(id);
        if !unit.uses_indexed_storage() {
            for var in &mut unit.vars {
                var.placement = Placement::ByName;
            }
            for block in &mut unit.blocks {
                for binding in block.bindings_mut() {
                    binding.placement = Placement::ByName;
                }
            }
            return;
        }

        let stack_vars = unit.can_allocate_variables_on_stack();
        let mut on_stack: u16 = 0;
        let mut on_heap: u16 = 0;
        for var in &mut unit.vars {
            if stack_vars && !var.captured {
                var.placement = Placement::Stack(on_stack as u32);
                on_stack += 1;
            } else {
                var.placement = Placement::Heap(on_heap as u32);
                on_heap += 1;
            }
        }
        unit.vars_on_stack = on_stack;
        unit.vars_on_heap = on_heap;
        if on_heap > 0 {
            unit.flags.remove(UnitFlags::STACK_ENVIRONMENT);
        }

        let body = unit
            .blocks
            .iter()
            .position(|b| b.parent().is_none())
            .map(|i| unit.blocks[i].index());
        let is_global = unit.is_global();
        let mut max_depth: u16 = 0;
        if let Some(body) = body {
            self.assign_block_slots(id, body, 0, stack_vars, is_global, &mut max_depth);
        }
        let unit = self.unit_mut(id);
        unit.max_lexical_stack_depth = max_depth;
        debug!(
            unit = ?id,
            vars_on_stack = unit.vars_on_stack,
            vars_on_heap = unit.vars_on_heap,
            lexical_depth = unit.max_lexical_stack_depth,
            "slots assigned"
        );
    }

    /// Depth-first slot assignment over one block subtree. `depth` counts
    /// the stack-placed lexicals live on the path from the body block;
    /// stack lexical slots are numbered after the unit's stack vars.
    fn assign_block_slots(
        &mut self,
        id: UnitId,
        block: BlockId,
        depth: u16,
        stack_vars: bool,
        is_global: bool,
        max_depth: &mut u16,
    ) {
        let unit = self.unit_mut(id);
        let vars_on_stack = unit.vars_on_stack;
        let global_record = is_global && unit.block(block).parent().is_none();
        let mut depth = depth;
        let mut heap_slots: u32 = 0;
        {
            let b = unit.block_mut(block);
            for binding in b.bindings_mut() {
                if global_record {
                    binding.placement = Placement::ByName;
                } else if stack_vars && !binding.captured {
                    binding.placement = Placement::Stack((vars_on_stack + depth) as u32);
                    depth += 1;
                } else {
                    binding.placement = Placement::Heap(heap_slots);
                    heap_slots += 1;
                }
            }
            if heap_slots > 0 {
                b.set_needs_heap_environment();
            }
        }
        if depth > *max_depth {
            *max_depth = depth;
        }
        let children: SmallVec<[BlockId; 4]> = self
            .unit(id)
            .blocks()
            .iter()
            .filter(|b| b.parent() == block)
            .map(|b| b.index())
            .collect();
        for child in children {
            self.assign_block_slots(id, child, depth, stack_vars, is_global, max_depth);
        }
    }
}
