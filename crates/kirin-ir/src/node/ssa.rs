//! SSA values and their use lists.

use rustc_hash::FxHashSet;

use crate::dialect::Dialect;
use crate::identifier;
use crate::node::{Block, GetInfo, Statement, Symbol};

identifier! {
    /// A general SSA value: either a statement result or a block argument.
    ///
    /// Use [`ResultValue`] or [`BlockArgument`] when the kind is known
    /// statically.
    pub struct SSAValue, "%"
}

identifier! {
    /// An SSA value produced by a statement.
    pub struct ResultValue, "%"
}

identifier! {
    /// An SSA value defined as a block argument.
    pub struct BlockArgument, "%"
}

macro_rules! impl_from_ssa {
    ($name:ident) => {
        impl From<SSAValue> for $name {
            #[inline]
            fn from(ssa: SSAValue) -> Self {
                $name(ssa.into())
            }
        }

        impl From<$name> for SSAValue {
            #[inline]
            fn from(value: $name) -> Self {
                SSAValue(value.into())
            }
        }
    };
}

impl_from_ssa!(ResultValue);
impl_from_ssa!(BlockArgument);

impl From<&SSAValue> for SSAValue {
    #[inline]
    fn from(ssa: &SSAValue) -> Self {
        *ssa
    }
}

/// One consumer of an SSA value: which statement uses it, at which operand
/// position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Use {
    pub stmt: Statement,
    pub operand_index: usize,
}

/// Where an SSA value is defined.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SSAKind {
    /// `index`-th result of a statement.
    Result(Statement, usize),
    /// `index`-th argument of a block.
    BlockArgument(Block, usize),
    /// Placeholder minted by a builder before the owning statement exists;
    /// patched to [`SSAKind::Result`] when the statement is allocated.
    PendingResult,
}

/// Arena record for one SSA value.
#[derive(Clone, Debug)]
pub struct SSAInfo<L: Dialect> {
    pub(crate) id: SSAValue,
    pub(crate) name: Option<Symbol>,
    pub(crate) ty: L::Type,
    pub(crate) kind: SSAKind,
    pub(crate) uses: FxHashSet<Use>,
}

impl<L: Dialect> SSAInfo<L> {
    pub fn new(id: SSAValue, name: Option<Symbol>, ty: L::Type, kind: SSAKind) -> Self {
        Self {
            id,
            name,
            ty,
            kind,
            uses: FxHashSet::default(),
        }
    }

    pub fn id(&self) -> SSAValue {
        self.id
    }

    pub fn name(&self) -> Option<Symbol> {
        self.name
    }

    pub fn ty(&self) -> &L::Type {
        &self.ty
    }

    pub fn set_ty(&mut self, ty: L::Type) {
        self.ty = ty;
    }

    pub fn kind(&self) -> SSAKind {
        self.kind
    }

    /// All `(statement, operand-index)` pairs consuming this value.
    pub fn uses(&self) -> &FxHashSet<Use> {
        &self.uses
    }

    pub(crate) fn uses_mut(&mut self) -> &mut FxHashSet<Use> {
        &mut self.uses
    }
}

impl<L: Dialect, T> GetInfo<L> for T
where
    T: Into<SSAValue> + Copy + std::fmt::Debug,
{
    type Info = SSAInfo<L>;

    fn get_info<'a>(&self, stage: &'a crate::StageInfo<L>) -> Option<&'a Self::Info> {
        stage.ssas.get((*self).into()).ok()
    }

    fn get_info_mut<'a>(&self, stage: &'a mut crate::StageInfo<L>) -> Option<&'a mut Self::Info> {
        stage.ssas.get_mut((*self).into()).ok()
    }
}
