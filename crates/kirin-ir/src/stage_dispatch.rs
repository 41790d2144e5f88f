//! Runtime routing of stage ids to typed stage storage.
//!
//! A pipeline's stage container `S` advertises the dialects it can host
//! through `S::Languages`, a type-level list of nested tuples. An action
//! implements [`StageAction`] (or [`StageActionMut`]) for each listed
//! dialect; [`Pipeline::dispatch_stage`] resolves a runtime
//! [`CompileStage`] to the one dialect the stage actually hosts and runs
//! the action against its [`StageInfo`]. This is how drivers execute a
//! frame whose stage is only known at runtime (mixed-stage recursion)
//! while keeping every dialect statically dispatched.

use crate::dialect::Dialect;
use crate::node::CompileStage;
use crate::pipeline::{HasStageInfo, Pipeline, StageMeta};
use crate::stage::StageInfo;

/// Immutable action run against the resolved stage storage.
pub trait StageAction<S, L>
where
    S: StageMeta + HasStageInfo<L>,
    L: Dialect,
{
    type Output;
    type Error;

    fn run(
        &mut self,
        stage_id: CompileStage,
        stage: &StageInfo<L>,
    ) -> Result<Self::Output, Self::Error>;
}

/// Mutable action run against the resolved stage storage.
pub trait StageActionMut<S, L>
where
    S: StageMeta + HasStageInfo<L>,
    L: Dialect,
{
    type Output;
    type Error;

    fn run(
        &mut self,
        stage_id: CompileStage,
        stage: &mut StageInfo<L>,
    ) -> Result<Self::Output, Self::Error>;
}

/// Recursive dispatcher over `S::Languages` for immutable access.
///
/// Implemented for `()` (no match) and `(L, Tail)`.
pub trait StageDispatch<S, A, R, E>
where
    S: StageMeta,
{
    fn dispatch(stage: &S, stage_id: CompileStage, action: &mut A) -> Result<Option<R>, E>;
}

impl<S, A, R, E> StageDispatch<S, A, R, E> for ()
where
    S: StageMeta,
{
    fn dispatch(_stage: &S, _stage_id: CompileStage, _action: &mut A) -> Result<Option<R>, E> {
        Ok(None)
    }
}

impl<S, L, Tail, A, R, E> StageDispatch<S, A, R, E> for (L, Tail)
where
    S: StageMeta + HasStageInfo<L>,
    L: Dialect,
    A: StageAction<S, L, Output = R, Error = E>,
    Tail: StageDispatch<S, A, R, E>,
{
    fn dispatch(stage: &S, stage_id: CompileStage, action: &mut A) -> Result<Option<R>, E> {
        if let Some(info) = <S as HasStageInfo<L>>::try_stage_info(stage) {
            return action.run(stage_id, info).map(Some);
        }
        <Tail as StageDispatch<S, A, R, E>>::dispatch(stage, stage_id, action)
    }
}

/// Recursive dispatcher over `S::Languages` for mutable access.
pub trait StageDispatchMut<S, A, R, E>
where
    S: StageMeta,
{
    fn dispatch(stage: &mut S, stage_id: CompileStage, action: &mut A) -> Result<Option<R>, E>;
}

impl<S, A, R, E> StageDispatchMut<S, A, R, E> for ()
where
    S: StageMeta,
{
    fn dispatch(_stage: &mut S, _stage_id: CompileStage, _action: &mut A) -> Result<Option<R>, E> {
        Ok(None)
    }
}

impl<S, L, Tail, A, R, E> StageDispatchMut<S, A, R, E> for (L, Tail)
where
    S: StageMeta + HasStageInfo<L>,
    L: Dialect,
    A: StageActionMut<S, L, Output = R, Error = E>,
    Tail: StageDispatchMut<S, A, R, E>,
{
    fn dispatch(stage: &mut S, stage_id: CompileStage, action: &mut A) -> Result<Option<R>, E> {
        if let Some(info) = <S as HasStageInfo<L>>::try_stage_info_mut(stage) {
            return action.run(stage_id, info).map(Some);
        }
        <Tail as StageDispatchMut<S, A, R, E>>::dispatch(stage, stage_id, action)
    }
}

impl<S> Pipeline<S>
where
    S: StageMeta,
{
    /// Resolve `stage_id` and run `action` against the first dialect in
    /// `S::Languages` the stage hosts.
    ///
    /// `Ok(None)` when `stage_id` does not exist or no listed dialect
    /// matches.
    pub fn dispatch_stage<A, R, E>(
        &self,
        stage_id: CompileStage,
        action: &mut A,
    ) -> Result<Option<R>, E>
    where
        S::Languages: StageDispatch<S, A, R, E>,
    {
        let Some(stage) = self.stage(stage_id) else {
            return Ok(None);
        };
        <S::Languages as StageDispatch<S, A, R, E>>::dispatch(stage, stage_id, action)
    }

    /// Mutable variant of [`Self::dispatch_stage`].
    pub fn dispatch_stage_mut<A, R, E>(
        &mut self,
        stage_id: CompileStage,
        action: &mut A,
    ) -> Result<Option<R>, E>
    where
        S::Languages: StageDispatchMut<S, A, R, E>,
    {
        let Some(stage) = self.stage_mut(stage_id) else {
            return Ok(None);
        };
        <S::Languages as StageDispatchMut<S, A, R, E>>::dispatch(stage, stage_id, action)
    }
}
