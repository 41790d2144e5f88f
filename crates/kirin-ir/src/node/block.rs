//! Blocks: argument lists plus an intrusive statement list with a
//! dedicated terminator slot.
//!
//! The terminator is stored out of line rather than as the list tail, so a
//! well-formed block satisfies the terminator invariant structurally: the
//! body list holds only non-terminators and the slot holds exactly one
//! terminator.

use smallvec::SmallVec;

use crate::dialect::Dialect;
use crate::identifier;
use crate::node::linked_list::{LinkedList, LinkedListNode};
use crate::node::{BlockArgument, GetInfo, Region, Statement};

identifier! {
    /// Arena token for a basic block.
    pub struct Block, "^"
}

identifier! {
    /// A block reference used as a control-flow target in a statement's
    /// successor list. Distinct from [`Block`] ownership references
    /// (a statement owning a block vs. branching to it).
    pub struct Successor, "^"
}

impl From<Successor> for Block {
    #[inline]
    fn from(succ: Successor) -> Self {
        Block(succ.into())
    }
}

impl From<Block> for Successor {
    #[inline]
    fn from(block: Block) -> Self {
        Successor(block.into())
    }
}

/// Arena record for one block.
#[derive(Clone, Debug)]
pub struct BlockInfo<L: Dialect> {
    pub(crate) parent: Option<Region>,
    pub(crate) node: LinkedListNode<Block>,
    pub(crate) arguments: SmallVec<[BlockArgument; 4]>,
    pub(crate) statements: LinkedList<Statement>,
    pub(crate) terminator: Option<Statement>,
    pub(crate) _marker: std::marker::PhantomData<L>,
}

impl<L: Dialect> BlockInfo<L> {
    pub fn parent(&self) -> Option<Region> {
        self.parent
    }

    pub fn arguments(&self) -> &[BlockArgument] {
        &self.arguments
    }

    pub fn terminator(&self) -> Option<Statement> {
        self.terminator
    }

    pub fn statement_count(&self) -> usize {
        self.statements.len + usize::from(self.terminator.is_some())
    }
}

impl<L: Dialect> GetInfo<L> for Block {
    type Info = BlockInfo<L>;

    fn get_info<'a>(&self, stage: &'a crate::StageInfo<L>) -> Option<&'a Self::Info> {
        stage.blocks.get(*self).ok()
    }

    fn get_info_mut<'a>(&self, stage: &'a mut crate::StageInfo<L>) -> Option<&'a mut Self::Info> {
        stage.blocks.get_mut(*self).ok()
    }
}

impl Block {
    pub fn parent<L: Dialect>(&self, stage: &crate::StageInfo<L>) -> Option<Region> {
        self.expect_info(stage).parent
    }

    /// The `index`-th block argument; panics when out of range.
    pub fn argument<L: Dialect>(&self, stage: &crate::StageInfo<L>, index: usize) -> BlockArgument {
        self.expect_info(stage).arguments[index]
    }

    pub fn arguments<'a, L: Dialect>(&self, stage: &'a crate::StageInfo<L>) -> &'a [BlockArgument] {
        &self.expect_info(stage).arguments
    }

    pub fn terminator<L: Dialect>(&self, stage: &crate::StageInfo<L>) -> Option<Statement> {
        self.expect_info(stage).terminator
    }

    /// First statement to execute: body head, or the terminator for a
    /// body-less block.
    pub fn first_statement<L: Dialect>(&self, stage: &crate::StageInfo<L>) -> Option<Statement> {
        let info = self.expect_info(stage);
        info.statements.head.or(info.terminator)
    }

    /// Iterate the body statements in list order (terminator excluded).
    pub fn statements<'a, L: Dialect>(&self, stage: &'a crate::StageInfo<L>) -> StatementIter<'a, L> {
        let info = self.expect_info(stage);
        StatementIter {
            current: info.statements.head,
            remaining: info.statements.len,
            stage,
        }
    }
}

pub struct StatementIter<'a, L: Dialect> {
    current: Option<Statement>,
    remaining: usize,
    stage: &'a crate::StageInfo<L>,
}

impl<'a, L: Dialect> Iterator for StatementIter<'a, L> {
    type Item = Statement;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current?;
        self.current = current.expect_info(self.stage).node.next;
        self.remaining -= 1;
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, L: Dialect> ExactSizeIterator for StatementIter<'a, L> {}
