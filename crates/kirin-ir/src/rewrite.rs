//! Rewrite primitives: value replacement, statement replacement and
//! erasure, and identifier remapping after arena compaction.
//!
//! These are the mutations the function model's invalidation story rests
//! on: replacing or erasing a call statement updates the callee's
//! backedge set in the same operation.

use tracing::debug;

use crate::arena::IdMap;
use crate::dialect::{
    Dialect, HasCallTarget, HasOperands, HasOperandsMut, HasRegions, HasRegionsMut, HasResults,
    HasResultsMut, HasSuccessorsMut, IsTerminator,
};
use crate::error::IrError;
use crate::node::{
    Block, GetInfo, Region, ResultValue, SSAKind, SSAValue, Statement, Successor, Use,
};
use crate::stage::StageInfo;

impl<L: Dialect> StageInfo<L> {
    /// Rewrite every use of `old` to `new`, updating both sides of the
    /// use-def relation atomically.
    ///
    /// For each recorded use `(s, i)`, operand `i` of `s` is set to `new`
    /// and the [`Use`] token moves from `old`'s use list to `new`'s.
    pub fn replace_all_uses_with(
        &mut self,
        old: impl Into<SSAValue>,
        new: impl Into<SSAValue>,
    ) -> Result<(), IrError> {
        let old = old.into();
        let new = new.into();
        if old == new {
            return Ok(());
        }
        // Both ends must be live before any mutation.
        self.ssas.get(new)?;
        let uses: Vec<Use> = self.ssas.get(old)?.uses().iter().copied().collect();

        for u in &uses {
            let info = u.stmt.expect_info_mut(self);
            let operand = info
                .definition
                .operands_mut()
                .nth(u.operand_index)
                .expect("use list points at a valid operand index");
            debug_assert_eq!(*operand, old);
            *operand = new;
        }

        self.ssas
            .get_mut(old)
            .expect("checked live above")
            .uses_mut()
            .clear();
        let new_uses = self
            .ssas
            .get_mut(new)
            .expect("checked live above")
            .uses_mut();
        new_uses.extend(uses.iter().copied());
        debug!(%old, %new, count = uses.len(), "replaced all uses");
        Ok(())
    }

    /// Swap `new` into `old`'s position and rewrite all uses of `old`'s
    /// results to `new`'s results.
    ///
    /// Result arity must match ([`IrError::ArityMismatch`]); all checks
    /// run before any mutation, so a failed replacement leaves the IR
    /// untouched. `old` ends up detached but alive; erase it separately
    /// if it is garbage. Call-site backedges follow the swap.
    ///
    /// # Panics
    ///
    /// Panics if `new` is already attached to a block.
    pub fn replace_statement(&mut self, old: Statement, new: Statement) -> Result<(), IrError> {
        let old_info = old.get_info(self).ok_or(IrError::OrphanStatement(old))?;
        let block = old_info.parent.ok_or(IrError::OrphanStatement(old))?;
        let old_results: Vec<ResultValue> = old_info.definition.results().copied().collect();

        let new_info = new.get_info(self).ok_or(IrError::OrphanStatement(new))?;
        if let Some(parent) = new_info.parent {
            panic!(
                "replacement statement {new} already belongs to block {parent}; detach it first"
            );
        }
        let new_results: Vec<ResultValue> = new_info.definition.results().copied().collect();
        if old_results.len() != new_results.len() {
            return Err(IrError::ArityMismatch {
                expected: old_results.len(),
                got: new_results.len(),
            });
        }

        let old_is_term = block.expect_info(self).terminator == Some(old);
        let new_is_term = new.expect_info(self).definition.is_terminator();
        if old_is_term != new_is_term {
            return Err(IrError::InvalidTerminator(new));
        }

        // Occupancy swap.
        let old_callee = old.expect_info(self).definition.call_target();
        if old_is_term {
            block.expect_info_mut(self).terminator = Some(new);
        } else {
            let (prev, next) = {
                let node = &old.expect_info(self).node;
                (node.prev, node.next)
            };
            match prev {
                Some(prev) => prev.expect_info_mut(self).node.next = Some(new),
                None => block.expect_info_mut(self).statements.head = Some(new),
            }
            match next {
                Some(next) => next.expect_info_mut(self).node.prev = Some(new),
                None => block.expect_info_mut(self).statements.tail = Some(new),
            }
            let n = new.expect_info_mut(self);
            n.node.prev = prev;
            n.node.next = next;
        }
        new.expect_info_mut(self).parent = Some(block);
        {
            let o = old.expect_info_mut(self);
            o.node = crate::LinkedListNode::detached();
            o.parent = None;
        }

        for (o, n) in old_results.into_iter().zip(new_results) {
            self.replace_all_uses_with(o, n)?;
        }

        // Backedges: the old site is gone, the new one is live.
        self.retarget_call_site(old, old_callee);
        self.retarget_call_site(new, None);
        debug!(%old, %new, "replaced statement");
        Ok(())
    }

    /// Erase a statement: unlink it, drop its operand uses, tombstone its
    /// result values, and recursively erase its owned regions.
    ///
    /// Uses of the erased results are not rewritten; callers replace them
    /// first (or accept dangling uses being reported by validation).
    pub fn erase_statement(&mut self, stmt: Statement) -> Result<(), IrError> {
        // Detaching also clears the call-site backedge.
        if stmt
            .get_info(self)
            .ok_or(IrError::OrphanStatement(stmt))?
            .parent
            .is_some()
        {
            self.remove_statement(stmt)?;
        }

        let info = stmt.expect_info(self);
        let operands: Vec<SSAValue> = info.definition.operands().copied().collect();
        let results: Vec<ResultValue> = info.definition.results().copied().collect();
        let regions: Vec<Region> = info.definition.regions().copied().collect();

        for (operand_index, operand) in operands.into_iter().enumerate() {
            if let Ok(ssa) = self.ssas.get_mut(operand) {
                ssa.uses_mut().remove(&Use {
                    stmt,
                    operand_index,
                });
            }
        }
        for result in results {
            self.ssas.mark_deleted(SSAValue::from(result));
        }
        for region in regions {
            self.erase_region(region)?;
        }

        self.statements.mark_deleted(stmt);
        debug!(%stmt, "erased statement");
        Ok(())
    }

    /// Erase a block: its argument values, every statement, then the
    /// block itself. Does not unlink from the region; use
    /// [`remove_block`](Self::remove_block) first when the region stays.
    pub fn erase_block(&mut self, block: Block) -> Result<(), IrError> {
        let stmts: Vec<Statement> = block
            .statements(self)
            .chain(block.terminator(self))
            .collect();
        for stmt in stmts {
            // Unlink without touching the list we're consuming.
            let s = stmt.expect_info_mut(self);
            s.node = crate::LinkedListNode::detached();
            s.parent = None;
            self.unregister_call_site_of(stmt);
            self.erase_statement(stmt)?;
        }
        let arguments: Vec<_> = block.expect_info(self).arguments.to_vec();
        for arg in arguments {
            self.ssas.mark_deleted(SSAValue::from(arg));
        }
        self.blocks.mark_deleted(block);
        Ok(())
    }

    /// Erase a region and everything inside it.
    pub fn erase_region(&mut self, region: Region) -> Result<(), IrError> {
        let blocks: Vec<Block> = region.blocks(self).collect();
        for block in blocks {
            self.erase_block(block)?;
        }
        self.regions.mark_deleted(region);
        Ok(())
    }

    fn unregister_call_site_of(&mut self, stmt: Statement) {
        let Some(callee) = stmt.expect_info(self).definition.call_target() else {
            return;
        };
        if let Some(info) = callee.get_info_mut(self) {
            info.backedges.remove(&stmt);
        }
        if let Some(info) = callee.staged().get_info_mut(self) {
            info.backedges.remove(&stmt);
        }
    }
}

// -- Post-compaction remapping ----------------------------------------------

fn remap_opt<I: crate::arena::Identifier>(map: &IdMap<I>, slot: &mut Option<I>) {
    if let Some(id) = slot {
        map.apply(id);
    }
}

impl<L: Dialect> StageInfo<L> {
    /// Compact the statement arena and rewrite every statement reference
    /// held by this stage.
    pub fn compact_statements(&mut self) -> IdMap<Statement> {
        let map = self.statements.compact();

        for (_, info) in self.statements.iter_live_mut() {
            remap_opt(&map, &mut info.node.prev);
            remap_opt(&map, &mut info.node.next);
        }
        for (_, block) in self.blocks.iter_live_mut() {
            remap_opt(&map, &mut block.statements.head);
            remap_opt(&map, &mut block.statements.tail);
            remap_opt(&map, &mut block.terminator);
        }
        for (_, region) in self.regions.iter_live_mut() {
            remap_opt(&map, &mut region.owner);
        }
        for (_, ssa) in self.ssas.iter_live_mut() {
            if let SSAKind::Result(stmt, _) = &mut ssa.kind {
                map.apply(stmt);
            }
            let remapped: Vec<Use> = ssa
                .uses
                .drain()
                .map(|mut u| {
                    map.apply(&mut u.stmt);
                    u
                })
                .collect();
            ssa.uses.extend(remapped);
        }
        for (_, staged) in self.staged_functions.iter_live_mut() {
            // Backedges into invalidated entries survive compaction, but
            // only for call sites that still exist.
            staged.backedges = staged
                .backedges
                .iter()
                .filter_map(|stmt| map.remap(*stmt))
                .collect();
            for spec in &mut staged.specializations {
                spec.backedges = spec
                    .backedges
                    .iter()
                    .filter_map(|stmt| map.remap(*stmt))
                    .collect();
            }
        }
        map
    }

    /// Compact the SSA arena and rewrite every value reference held by
    /// this stage, including operands and results inside dialect
    /// payloads.
    pub fn compact_ssa_values(&mut self) -> IdMap<SSAValue> {
        let map = self.ssas.compact();

        for (id, ssa) in self.ssas.iter_live_mut() {
            ssa.id = id;
        }
        for (_, info) in self.statements.iter_live_mut() {
            for operand in info.definition.operands_mut() {
                map.apply(operand);
            }
            for result in info.definition.results_mut() {
                let mut ssa: SSAValue = (*result).into();
                map.apply(&mut ssa);
                *result = ssa.into();
            }
        }
        for (_, block) in self.blocks.iter_live_mut() {
            for arg in &mut block.arguments {
                let mut ssa: SSAValue = (*arg).into();
                map.apply(&mut ssa);
                *arg = ssa.into();
            }
        }
        map
    }

    /// Compact the block arena and rewrite every block reference held by
    /// this stage, including successor references inside dialect
    /// payloads.
    pub fn compact_blocks(&mut self) -> IdMap<Block> {
        let map = self.blocks.compact();

        for (_, block) in self.blocks.iter_live_mut() {
            remap_opt(&map, &mut block.node.prev);
            remap_opt(&map, &mut block.node.next);
        }
        for (_, region) in self.regions.iter_live_mut() {
            remap_opt(&map, &mut region.blocks.head);
            remap_opt(&map, &mut region.blocks.tail);
        }
        for (_, info) in self.statements.iter_live_mut() {
            remap_opt(&map, &mut info.parent);
            for succ in info.definition.successors_mut() {
                let mut block: Block = (*succ).into();
                map.apply(&mut block);
                *succ = Successor::from(block);
            }
        }
        for (_, ssa) in self.ssas.iter_live_mut() {
            if let SSAKind::BlockArgument(block, _) = &mut ssa.kind {
                map.apply(block);
            }
        }
        map
    }

    /// Compact the region arena and rewrite every region reference held
    /// by this stage, including region lists inside dialect payloads and
    /// specialization bodies.
    pub fn compact_regions(&mut self) -> IdMap<Region> {
        let map = self.regions.compact();

        for (_, block) in self.blocks.iter_live_mut() {
            remap_opt(&map, &mut block.parent);
        }
        for (_, info) in self.statements.iter_live_mut() {
            for region in info.definition.regions_mut() {
                map.apply(region);
            }
        }
        for (_, staged) in self.staged_functions.iter_live_mut() {
            for spec in &mut staged.specializations {
                map.apply(&mut spec.body);
            }
        }
        map
    }
}
