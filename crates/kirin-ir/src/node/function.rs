//! The function refinement hierarchy.
//!
//! A callable is modeled at three altitudes. [`Function`] is the
//! pipeline-wide identity: a name mapped to its per-stage versions, all
//! of which must describe the same conceptual operation viewed through
//! different type systems. Each [`StagedFunction`] carries the declared
//! signature in one stage's type system and owns that stage's ordered
//! specialization list; zero specializations means `extern` (signature
//! only). A [`SpecializedFunction`] is one concrete implementation
//! owning an IR body (a region); dispatch selects the most specific
//! live specialization under a [`SignatureSemantics`] policy.
//!
//! Redefinition never deletes: conflicting entries are *invalidated*
//! and stay addressable so their backedges identify exactly the call
//! sites that need recompilation.

use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::dialect::Dialect;
use crate::identifier;
use crate::node::{GetInfo, GlobalSymbol, Region, Statement};
use crate::signature::{Signature, SignatureCmp, SignatureSemantics};

identifier! {
    /// Handle naming one compile stage in a pipeline.
    pub struct CompileStage, "stage"
}

identifier! {
    /// A named abstract callable, independent of any stage.
    pub struct Function, "fn"
}

identifier! {
    /// A function compiled to one specific stage.
    pub struct StagedFunction, "sf"
}

/// One concrete implementation of a staged function, addressed as
/// `(staged function, position in its specialization list)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpecializedFunction(pub(crate) StagedFunction, pub(crate) usize);

impl SpecializedFunction {
    pub fn staged(&self) -> StagedFunction {
        self.0
    }

    pub fn index(&self) -> usize {
        self.1
    }
}

impl std::fmt::Display for SpecializedFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.0, self.1)
    }
}

/// Policy controlling whether one function name may carry several staged
/// signatures within a stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum StagedNamePolicy {
    /// One semantic interface per name: a new staged function under an
    /// existing name must repeat the existing signature.
    #[default]
    SingleInterface,
    /// Allow several staged signatures under one name. Duplicate
    /// `(name, signature)` pairs are still rejected.
    MultipleDispatch,
}

/// Stage-independent record for one abstract callable.
#[derive(Clone, Debug)]
pub struct FunctionInfo {
    id: Function,
    name: Option<GlobalSymbol>,
    /// Staged versions in insertion order. Stages need not be contiguous:
    /// a user may program a low-level stage directly, and early stages
    /// may be discarded to save memory.
    staged: IndexMap<CompileStage, StagedFunction>,
}

impl FunctionInfo {
    pub fn new(id: Function, name: Option<GlobalSymbol>) -> Self {
        Self {
            id,
            name,
            staged: IndexMap::new(),
        }
    }

    pub fn id(&self) -> Function {
        self.id
    }

    pub fn name(&self) -> Option<GlobalSymbol> {
        self.name
    }

    pub fn staged_functions(&self) -> &IndexMap<CompileStage, StagedFunction> {
        &self.staged
    }

    pub fn staged_at(&self, stage: CompileStage) -> Option<StagedFunction> {
        self.staged.get(&stage).copied()
    }

    pub fn add_staged_function(&mut self, stage: CompileStage, staged: StagedFunction) {
        self.staged.insert(stage, staged);
    }
}

/// Outcome classification for specialization dispatch.
///
/// `Ambiguous` is set-valued and sorted, so the outcome is independent of
/// the insertion order among non-dominating candidates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("no live specialization accepts the call signature")]
    NoMatch,
    #[error("{} live specializations are mutually non-dominating", .0.len())]
    Ambiguous(Vec<SpecializedFunction>),
}

/// Per-stage record for one function.
#[derive(Clone, Debug)]
pub struct StagedFunctionInfo<L: Dialect> {
    pub(crate) id: StagedFunction,
    pub(crate) name: Option<GlobalSymbol>,
    pub(crate) signature: Signature<L::Type>,
    pub(crate) specializations: Vec<SpecializedFunctionInfo<L>>,
    /// Call sites at this stage that resolve to this staged function.
    pub(crate) backedges: FxHashSet<Statement>,
    pub(crate) invalidated: bool,
}

impl<L: Dialect> StagedFunctionInfo<L> {
    pub fn id(&self) -> StagedFunction {
        self.id
    }

    pub fn name(&self) -> Option<GlobalSymbol> {
        self.name
    }

    pub fn signature(&self) -> &Signature<L::Type> {
        &self.signature
    }

    pub fn return_type(&self) -> &L::Type {
        &self.signature.ret
    }

    /// An `extern` staged function declares a signature but owns no body.
    pub fn is_extern(&self) -> bool {
        self.specializations.is_empty()
    }

    pub fn backedges(&self) -> &FxHashSet<Statement> {
        &self.backedges
    }

    pub fn is_invalidated(&self) -> bool {
        self.invalidated
    }

    /// Exclude this entry from dispatch while keeping it addressable.
    pub fn invalidate(&mut self) {
        self.invalidated = true;
    }

    /// Specializations in insertion order, invalidated entries included.
    pub fn specializations(&self) -> &[SpecializedFunctionInfo<L>] {
        &self.specializations
    }

    pub fn specialization(&self, spec: SpecializedFunction) -> Option<&SpecializedFunctionInfo<L>> {
        debug_assert_eq!(spec.staged(), self.id);
        self.specializations.get(spec.index())
    }

    /// All applicable live specializations for `call`, reduced to the
    /// candidates not strictly dominated by another applicable candidate.
    pub fn all_matching<S: SignatureSemantics<L::Type>>(
        &self,
        call: &Signature<L::Type>,
    ) -> Vec<(&SpecializedFunctionInfo<L>, S::Env)> {
        let applicable: Vec<_> = self
            .specializations
            .iter()
            .filter(|spec| !spec.is_invalidated())
            .filter_map(|spec| S::applicable(call, spec.signature()).map(|env| (spec, env)))
            .collect();

        applicable
            .iter()
            .enumerate()
            .filter(|(i, (spec, env))| {
                !applicable.iter().enumerate().any(|(j, (other, other_env))| {
                    *i != j
                        && S::cmp_candidate(other.signature(), other_env, spec.signature(), env)
                            == SignatureCmp::More
                })
            })
            .map(|(_, (spec, _))| {
                // Recompute the env: S::Env has no Clone bound.
                let env = S::applicable(call, spec.signature())
                    .expect("candidate was applicable above");
                (*spec, env)
            })
            .collect()
    }

    /// Resolve a call signature to a unique most-specific specialization.
    ///
    /// Filters live specializations by [`SignatureSemantics::applicable`],
    /// drops every candidate strictly dominated by another, and classifies
    /// the remainder: empty is [`DispatchError::NoMatch`], one is the
    /// answer, several is [`DispatchError::Ambiguous`]. Ties are never
    /// silently broken.
    pub fn resolve<S: SignatureSemantics<L::Type>>(
        &self,
        call: &Signature<L::Type>,
    ) -> Result<(SpecializedFunction, S::Env), DispatchError> {
        let mut matching = self.all_matching::<S>(call);
        match matching.len() {
            0 => Err(DispatchError::NoMatch),
            1 => {
                let (spec, env) = matching.pop().expect("len checked");
                Ok((spec.id(), env))
            }
            _ => {
                let mut ids: Vec<_> = matching.iter().map(|(spec, _)| spec.id()).collect();
                ids.sort();
                Err(DispatchError::Ambiguous(ids))
            }
        }
    }
}

/// Record for one concrete implementation.
#[derive(Clone, Debug)]
pub struct SpecializedFunctionInfo<L: Dialect> {
    pub(crate) id: SpecializedFunction,
    pub(crate) signature: Signature<L::Type>,
    pub(crate) body: Region,
    /// Inbound call sites, for invalidation-driven recompilation.
    pub(crate) backedges: FxHashSet<Statement>,
    pub(crate) invalidated: bool,
}

impl<L: Dialect> SpecializedFunctionInfo<L> {
    pub fn id(&self) -> SpecializedFunction {
        self.id
    }

    pub fn signature(&self) -> &Signature<L::Type> {
        &self.signature
    }

    pub fn return_type(&self) -> &L::Type {
        &self.signature.ret
    }

    pub fn body(&self) -> Region {
        self.body
    }

    pub fn backedges(&self) -> &FxHashSet<Statement> {
        &self.backedges
    }

    pub fn is_invalidated(&self) -> bool {
        self.invalidated
    }

    pub fn invalidate(&mut self) {
        self.invalidated = true;
    }
}

impl<L: Dialect> GetInfo<L> for StagedFunction {
    type Info = StagedFunctionInfo<L>;

    fn get_info<'a>(&self, stage: &'a crate::StageInfo<L>) -> Option<&'a Self::Info> {
        stage.staged_functions.get(*self).ok()
    }

    fn get_info_mut<'a>(&self, stage: &'a mut crate::StageInfo<L>) -> Option<&'a mut Self::Info> {
        stage.staged_functions.get_mut(*self).ok()
    }
}

impl<L: Dialect> GetInfo<L> for SpecializedFunction {
    type Info = SpecializedFunctionInfo<L>;

    fn get_info<'a>(&self, stage: &'a crate::StageInfo<L>) -> Option<&'a Self::Info> {
        stage
            .staged_functions
            .get(self.staged())
            .ok()
            .and_then(|info| info.specializations.get(self.index()))
    }

    fn get_info_mut<'a>(&self, stage: &'a mut crate::StageInfo<L>) -> Option<&'a mut Self::Info> {
        stage
            .staged_functions
            .get_mut(self.staged())
            .ok()
            .and_then(|info| info.specializations.get_mut(self.index()))
    }
}
