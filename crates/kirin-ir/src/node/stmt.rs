//! Statements: intrusively-linked dialect payloads.

use crate::dialect::Dialect;
use crate::identifier;
use crate::node::linked_list::LinkedListNode;
use crate::node::{Block, GetInfo};

identifier! {
    /// Arena token for a statement.
    pub struct Statement, "stmt"
}

/// Arena record for one statement: sibling links, owning block (or `None`
/// while detached), and the dialect payload carrying operands, results,
/// successors, regions and property flags.
#[derive(Clone, Debug)]
pub struct StatementInfo<L: Dialect> {
    pub(crate) node: LinkedListNode<Statement>,
    pub(crate) parent: Option<Block>,
    pub(crate) definition: L,
}

impl<L: Dialect> StatementInfo<L> {
    pub fn new(definition: L) -> Self {
        Self {
            node: LinkedListNode::detached(),
            parent: None,
            definition,
        }
    }

    pub fn definition(&self) -> &L {
        &self.definition
    }

    pub fn definition_mut(&mut self) -> &mut L {
        &mut self.definition
    }

    pub fn parent(&self) -> Option<Block> {
        self.parent
    }

    pub fn prev(&self) -> Option<Statement> {
        self.node.prev
    }

    pub fn next(&self) -> Option<Statement> {
        self.node.next
    }
}

impl<L: Dialect> GetInfo<L> for Statement {
    type Info = StatementInfo<L>;

    fn get_info<'a>(&self, stage: &'a crate::StageInfo<L>) -> Option<&'a Self::Info> {
        stage.statements.get(*self).ok()
    }

    fn get_info_mut<'a>(&self, stage: &'a mut crate::StageInfo<L>) -> Option<&'a mut Self::Info> {
        stage.statements.get_mut(*self).ok()
    }
}

impl Statement {
    /// The dialect payload; panics if the statement was deleted.
    pub fn definition<'a, L: Dialect>(&self, stage: &'a crate::StageInfo<L>) -> &'a L {
        &self.expect_info(stage).definition
    }

    pub fn parent<L: Dialect>(&self, stage: &crate::StageInfo<L>) -> Option<Block> {
        self.expect_info(stage).parent
    }

    pub fn next<L: Dialect>(&self, stage: &crate::StageInfo<L>) -> Option<Statement> {
        self.expect_info(stage).node.next
    }

    pub fn prev<L: Dialect>(&self, stage: &crate::StageInfo<L>) -> Option<Statement> {
        self.expect_info(stage).node.prev
    }

    pub fn operands<'a, L: Dialect>(
        &self,
        stage: &'a crate::StageInfo<L>,
    ) -> <L as crate::HasOperands<'a>>::Iter {
        self.expect_info(stage).definition.operands()
    }

    pub fn results<'a, L: Dialect>(
        &self,
        stage: &'a crate::StageInfo<L>,
    ) -> <L as crate::HasResults<'a>>::Iter {
        self.expect_info(stage).definition.results()
    }

    pub fn successors<'a, L: Dialect>(
        &self,
        stage: &'a crate::StageInfo<L>,
    ) -> <L as crate::HasSuccessors<'a>>::Iter {
        self.expect_info(stage).definition.successors()
    }

    pub fn regions<'a, L: Dialect>(
        &self,
        stage: &'a crate::StageInfo<L>,
    ) -> <L as crate::HasRegions<'a>>::Iter {
        self.expect_info(stage).definition.regions()
    }
}
