//! Call-target resolution for calling dialects.
//!
//! Choosing a concrete specialization for an abstract function and an
//! argument abstraction is the *calling dialect's* job, not the driver's.
//! This helper implements the initial unique-or-error policy over a
//! [`SignatureSemantics`]: exactly one live most-specific candidate is
//! emitted as a `Call`; zero or several surface as
//! [`InterpreterError::CallResolutionFailed`].

use kirin_ir::{
    CompileStage, Dialect, Function, GetInfo, HasStageInfo, Pipeline, Signature,
    SignatureSemantics, SpecializedFunction, StageMeta,
};

use crate::error::InterpreterError;

/// Resolve `function` at `stage` against a call signature.
///
/// Looks up the function's staged entry for the stage, then dispatches
/// over its live specializations under semantics `SEM`.
pub fn resolve_callee<L, SEM, S>(
    pipeline: &Pipeline<S>,
    function: Function,
    stage: CompileStage,
    call: &Signature<L::Type>,
) -> Result<SpecializedFunction, InterpreterError>
where
    L: Dialect,
    SEM: SignatureSemantics<L::Type>,
    S: StageMeta + HasStageInfo<L>,
{
    let staged = pipeline
        .function_info(function)
        .and_then(|info| info.staged_at(stage))
        .ok_or(InterpreterError::MissingFunctionStageMapping { function, stage })?;

    let stage_info = pipeline
        .with_stage::<L>(stage)
        .ok_or(InterpreterError::StageMismatch { frame_stage: stage })?;

    let info = staged
        .get_info(stage_info)
        .ok_or(InterpreterError::MissingFunctionStageMapping { function, stage })?;

    info.resolve::<SEM>(call)
        .map(|(spec, _env)| spec)
        .map_err(|inner| InterpreterError::CallResolutionFailed { staged, inner })
}
