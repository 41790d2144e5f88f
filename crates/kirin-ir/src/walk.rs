//! Depth-first traversal over statements, blocks and regions.
//!
//! The walker visits statements in block order (terminator last) and
//! descends into owned regions, with [`std::ops::ControlFlow`] early exit
//! and a per-statement [`WalkAction`] to skip nested regions.

use std::ops::ControlFlow;

use crate::dialect::{Dialect, HasRegions};
use crate::node::{Block, GetInfo, Region, Statement};
use crate::stage::StageInfo;

/// Controls whether to descend into a statement's regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkAction {
    /// Visit nested regions of the current statement.
    Advance,
    /// Skip the nested regions of the current statement.
    Skip,
}

/// Walk all statements in a region recursively, entry block first.
pub fn walk_region<L: Dialect, B>(
    stage: &StageInfo<L>,
    region: Region,
    f: &mut dyn FnMut(Statement) -> ControlFlow<B, WalkAction>,
) -> ControlFlow<B, ()> {
    for block in region.blocks(stage) {
        walk_block(stage, block, f)?;
    }
    ControlFlow::Continue(())
}

/// Walk all statements in a block recursively, terminator last.
pub fn walk_block<L: Dialect, B>(
    stage: &StageInfo<L>,
    block: Block,
    f: &mut dyn FnMut(Statement) -> ControlFlow<B, WalkAction>,
) -> ControlFlow<B, ()> {
    let stmts: Vec<Statement> = block
        .statements(stage)
        .chain(block.terminator(stage))
        .collect();
    for stmt in stmts {
        walk_statement(stage, stmt, f)?;
    }
    ControlFlow::Continue(())
}

/// Walk one statement and, unless skipped, its owned regions.
pub fn walk_statement<L: Dialect, B>(
    stage: &StageInfo<L>,
    stmt: Statement,
    f: &mut dyn FnMut(Statement) -> ControlFlow<B, WalkAction>,
) -> ControlFlow<B, ()> {
    match f(stmt) {
        ControlFlow::Break(b) => return ControlFlow::Break(b),
        ControlFlow::Continue(WalkAction::Skip) => return ControlFlow::Continue(()),
        ControlFlow::Continue(WalkAction::Advance) => {}
    }
    let regions: Vec<Region> = stmt.expect_info(stage).definition().regions().copied().collect();
    for region in regions {
        walk_region(stage, region, f)?;
    }
    ControlFlow::Continue(())
}
