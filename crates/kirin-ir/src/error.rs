//! Error taxonomy for IR construction and mutation.
//!
//! All kinds are tagged, never stringly typed. Conflict errors carry both
//! the old and the new entity data so callers can opt in to the
//! `redefine_*` APIs (see [`crate::StageInfo`]) instead of aborting.

use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::arena::ArenaError;
use crate::dialect::Dialect;
use crate::node::{
    Block, Region, SpecializedFunction, SpecializedFunctionInfo, StagedFunction, Statement,
    Successor,
};
use crate::signature::Signature;

/// Structural errors surfaced by construction and rewrite operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IrError {
    #[error(transparent)]
    Arena(#[from] ArenaError),

    #[error("expected {expected} values, got {got}")]
    ArityMismatch { expected: usize, got: usize },

    /// The statement is not attached to a block (or is attached when it
    /// must not be).
    #[error("statement {0} is not attached to a block")]
    OrphanStatement(Statement),

    /// Terminator placement violation: a terminator in the body list, a
    /// non-terminator in the terminator slot, or a second terminator.
    #[error("invalid terminator placement at {0}")]
    InvalidTerminator(Statement),

    /// A terminator names a successor outside its own region.
    #[error("successor {successor} of {stmt} is not in the same region")]
    CrossRegionSuccessor { stmt: Statement, successor: Successor },

    #[error("unknown symbol `{0}`")]
    UnknownSymbol(String),

    /// A region operation received a block that belongs elsewhere.
    #[error("block {block} already belongs to region {region}")]
    BlockAlreadyOwned { block: Block, region: Region },
}

/// Why a staged-function definition conflicted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StagedConflictKind {
    /// Same name and same signature already present.
    DuplicateSignature,
    /// Same name with a different signature while
    /// [`StagedNamePolicy::SingleInterface`](crate::StagedNamePolicy::SingleInterface)
    /// is active.
    SignatureMismatch,
}

/// Rejected staged-function definition.
///
/// Carries every construction argument so the caller can hand the error
/// to [`StageInfo::redefine_staged_function`](crate::StageInfo::redefine_staged_function),
/// which invalidates the conflicting entries and installs this definition.
#[derive(Debug, Clone, Error)]
#[error("staged function conflicts with {} existing entr{}", conflicting.len(), if conflicting.len() == 1 { "y" } else { "ies" })]
pub struct StagedConflict<L: Dialect> {
    pub kind: StagedConflictKind,
    pub name: Option<crate::node::GlobalSymbol>,
    pub signature: Signature<L::Type>,
    /// The live entries this definition collided with.
    pub conflicting: Vec<StagedFunction>,
    pub specializations: Vec<SpecializedFunctionInfo<L>>,
    pub backedges: FxHashSet<Statement>,
}

/// Rejected specialization.
///
/// Convertible to a redefinition via
/// [`StageInfo::redefine_specialization`](crate::StageInfo::redefine_specialization).
#[derive(Debug, Clone, Error)]
#[error("specialization of {staged_function} duplicates {} existing entr{}", conflicting.len(), if conflicting.len() == 1 { "y" } else { "ies" })]
pub struct SpecializeConflict<L: Dialect> {
    pub staged_function: StagedFunction,
    pub signature: Signature<L::Type>,
    /// The live specializations with the same signature.
    pub conflicting: Vec<SpecializedFunction>,
    pub body: Region,
    pub backedges: FxHashSet<Statement>,
}
