//! Composable compiler IR infrastructure.
//!
//! Small dialects (statement-kind sums with their own types, traits and
//! semantics) combine into a single language sharing one set of
//! structural primitives: SSA values with use lists, intrusively-linked
//! statements in blocks, blocks in regions, and a
//! `Function → StagedFunction → SpecializedFunction` refinement
//! hierarchy. A [`Pipeline`] holds the stages; each stage owns arenas for
//! the IR it hosts, and statement/call dispatch routes through the
//! stage's dialect at compile time where possible and through the
//! type-level stage list at runtime where not.

pub mod arena;
pub mod dialect;
pub mod error;
pub mod intern;
pub mod lattice;
pub mod node;
pub mod pipeline;
pub mod rewrite;
pub mod signature;
pub mod stage;
pub mod stage_dispatch;
pub mod validation;
pub mod walk;

pub use arena::{Arena, ArenaError, IdMap, Identifier, RawId};
pub use dialect::{
    Dialect, HasCallTarget, HasOperands, HasOperandsMut, HasRegions, HasRegionsMut, HasResults,
    HasResultsMut, HasSuccessors, HasSuccessorsMut, IsConstant, IsPure, IsSpeculatable,
    IsTerminator,
};
pub use error::{IrError, SpecializeConflict, StagedConflict, StagedConflictKind};
pub use intern::InternTable;
pub use lattice::{FiniteLattice, HasBottom, HasTop, Lattice, TypeAttribute, TypeLattice};
pub use node::{
    Block, BlockArgument, BlockInfo, CompileStage, DispatchError, Function, FunctionInfo,
    GetInfo, GlobalSymbol, LinkedList, LinkedListNode, Region, RegionInfo, ResultValue, SSAInfo,
    SSAKind, SSAValue, SpecializedFunction, SpecializedFunctionInfo, StagedFunction,
    StagedFunctionInfo, StagedNamePolicy, Statement, StatementInfo, Successor, Symbol, Use,
};
pub use pipeline::{HasStageInfo, Pipeline, StageMeta};
pub use signature::{
    ExactSemantics, LatticeSemantics, Signature, SignatureCmp, SignatureSemantics,
};
pub use stage::{
    BlockBuilder, RegionBuilder, SpecializeBuilder, StageInfo, StagedFunctionBuilder,
};
pub use stage_dispatch::{StageAction, StageActionMut, StageDispatch, StageDispatchMut};
pub use validation::{ValidationReport, Violation};
pub use walk::{WalkAction, walk_block, walk_region, walk_statement};

#[cfg(test)]
mod tests;
