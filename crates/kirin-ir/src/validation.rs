//! Structural verifier passes.
//!
//! Validation is optional and collects *all* violations into a single
//! report instead of failing on the first. Two kinds of checks:
//!
//! 1. **Use-chain consistency**: the use list stored on every SSA value
//!    must match the actual operands of all statements, in both
//!    directions.
//! 2. **Block and region shape**: every block ends in exactly one
//!    terminator with no terminator in its body, and every successor a
//!    terminator names belongs to the same region.

use std::fmt;

use rustc_hash::FxHashSet;

use crate::dialect::{Dialect, HasOperands, HasSuccessors, IsTerminator};
use crate::node::{Block, GetInfo, Region, Statement, Use};
use crate::stage::StageInfo;

/// One violation found during validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// An operand is not reflected in its value's use list.
    MissingUse { value: crate::node::SSAValue, stmt: Statement, operand_index: usize },
    /// A use list entry points at a statement that does not hold the
    /// value at that operand position.
    StaleUse { value: crate::node::SSAValue, stmt: Statement, operand_index: usize },
    /// A block has no terminator.
    MissingTerminator { block: Block },
    /// A terminator sits in a block's body, or a non-terminator in the
    /// terminator slot.
    MisplacedTerminator { block: Block, stmt: Statement },
    /// A terminator names a successor outside its own region.
    CrossRegionSuccessor { stmt: Statement, successor: Block },
    /// A statement in a block list does not point back at that block.
    BadParentLink { block: Block, stmt: Statement },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::MissingUse { value, stmt, operand_index } => write!(
                f,
                "operand #{operand_index} of {stmt} reads {value} but its use list has no entry"
            ),
            Violation::StaleUse { value, stmt, operand_index } => write!(
                f,
                "use list of {value} claims operand #{operand_index} of {stmt}, but no such \
                 operand exists"
            ),
            Violation::MissingTerminator { block } => {
                write!(f, "block {block} has no terminator")
            }
            Violation::MisplacedTerminator { block, stmt } => {
                write!(f, "statement {stmt} violates terminator placement in {block}")
            }
            Violation::CrossRegionSuccessor { stmt, successor } => {
                write!(f, "successor {successor} of {stmt} is not in the same region")
            }
            Violation::BadParentLink { block, stmt } => {
                write!(f, "statement {stmt} is listed in {block} but does not point back to it")
            }
        }
    }
}

/// Result of a validation run.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            return write!(f, "validation passed");
        }
        writeln!(f, "{} violation(s) found:", self.violations.len())?;
        for v in &self.violations {
            writeln!(f, "  - {v}")?;
        }
        Ok(())
    }
}

/// Check use-chain consistency across the whole stage.
pub fn validate_use_chains<L: Dialect>(stage: &StageInfo<L>) -> ValidationReport {
    let mut report = ValidationReport::default();

    // Direction 1: every actual operand has a use entry.
    let mut actual: FxHashSet<Use> = FxHashSet::default();
    for (stmt, info) in stage.statement_arena().iter_live() {
        for (operand_index, operand) in info.definition().operands().enumerate() {
            actual.insert(Use {
                stmt,
                operand_index,
            });
            let recorded = operand
                .get_info(stage)
                .is_some_and(|ssa| ssa.uses().contains(&Use { stmt, operand_index }));
            if !recorded {
                report.violations.push(Violation::MissingUse {
                    value: *operand,
                    stmt,
                    operand_index,
                });
            }
        }
    }

    // Direction 2: every use entry matches an actual operand.
    for (value, info) in stage.ssa_arena().iter_live() {
        for u in info.uses() {
            let matches = u
                .stmt
                .get_info(stage)
                .and_then(|s| s.definition().operands().nth(u.operand_index))
                .is_some_and(|operand| *operand == value);
            if !matches {
                report.violations.push(Violation::StaleUse {
                    value,
                    stmt: u.stmt,
                    operand_index: u.operand_index,
                });
            }
        }
    }

    report
}

/// Check terminator placement and successor locality for every block of a
/// region tree.
pub fn validate_region<L: Dialect>(stage: &StageInfo<L>, region: Region) -> ValidationReport {
    let mut report = ValidationReport::default();
    let blocks: FxHashSet<Block> = region.blocks(stage).collect();

    for &block in &blocks {
        validate_block_shape(stage, block, &blocks, &mut report);
    }
    report
}

/// Check every block in the stage, grouping successor locality by the
/// block's parent region.
pub fn validate_stage<L: Dialect>(stage: &StageInfo<L>) -> ValidationReport {
    let mut report = validate_use_chains(stage);
    for (region, _) in stage.region_arena().iter_live() {
        let blocks: FxHashSet<Block> = region.blocks(stage).collect();
        for &block in &blocks {
            validate_block_shape(stage, block, &blocks, &mut report);
        }
    }
    report
}

fn validate_block_shape<L: Dialect>(
    stage: &StageInfo<L>,
    block: Block,
    region_blocks: &FxHashSet<Block>,
    report: &mut ValidationReport,
) {
    for stmt in block.statements(stage) {
        let info = stmt.expect_info(stage);
        if info.definition().is_terminator() {
            report
                .violations
                .push(Violation::MisplacedTerminator { block, stmt });
        }
        if info.parent() != Some(block) {
            report.violations.push(Violation::BadParentLink { block, stmt });
        }
    }

    match block.terminator(stage) {
        None => report.violations.push(Violation::MissingTerminator { block }),
        Some(term) => {
            let info = term.expect_info(stage);
            if !info.definition().is_terminator() {
                report
                    .violations
                    .push(Violation::MisplacedTerminator { block, stmt: term });
            }
            if info.parent() != Some(block) {
                report
                    .violations
                    .push(Violation::BadParentLink { block, stmt: term });
            }
            for succ in info.definition().successors() {
                let target = Block::from(*succ);
                if !region_blocks.contains(&target) {
                    report.violations.push(Violation::CrossRegionSuccessor {
                        stmt: term,
                        successor: target,
                    });
                }
            }
        }
    }
}
