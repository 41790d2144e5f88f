//! IR node kinds and their arena records.

pub mod block;
pub mod function;
pub mod linked_list;
pub mod region;
pub mod ssa;
pub mod stmt;
pub mod symbol;

pub use block::{Block, BlockInfo, StatementIter, Successor};
pub use function::{
    CompileStage, DispatchError, Function, FunctionInfo, SpecializedFunction,
    SpecializedFunctionInfo, StagedFunction, StagedFunctionInfo, StagedNamePolicy,
};
pub use linked_list::{LinkedList, LinkedListNode};
pub use region::{BlockIter, Region, RegionInfo};
pub use ssa::{BlockArgument, ResultValue, SSAInfo, SSAKind, SSAValue, Use};
pub use stmt::{Statement, StatementInfo};
pub use symbol::{GlobalSymbol, Symbol};

use crate::dialect::Dialect;

/// Look up a token's arena record inside a stage.
///
/// Implemented for every node token kind; tokens are only meaningful
/// relative to the stage whose arenas minted them.
pub trait GetInfo<L: Dialect>: std::fmt::Debug {
    type Info;

    fn get_info<'a>(&self, stage: &'a crate::StageInfo<L>) -> Option<&'a Self::Info>;

    fn get_info_mut<'a>(&self, stage: &'a mut crate::StageInfo<L>) -> Option<&'a mut Self::Info>;

    /// As [`get_info`](Self::get_info), panicking on deleted or foreign
    /// tokens. For code paths whose structural invariants guarantee
    /// liveness.
    fn expect_info<'a>(&self, stage: &'a crate::StageInfo<L>) -> &'a Self::Info {
        self.get_info(stage)
            .unwrap_or_else(|| panic!("no live record for {:?} in this stage", self))
    }

    fn expect_info_mut<'a>(&self, stage: &'a mut crate::StageInfo<L>) -> &'a mut Self::Info {
        self.get_info_mut(stage)
            .unwrap_or_else(|| panic!("no live record for {:?} in this stage", self))
    }
}
