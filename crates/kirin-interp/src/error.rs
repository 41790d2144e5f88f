//! Interpreter error taxonomy.
//!
//! No panics on recoverable conditions, and no automatic unwinding on
//! failure: every error leaves the interpreter state valid at the failing
//! statement so a tool can inspect frames, repair bindings, and resume.

use thiserror::Error;

use kirin_ir::{
    CompileStage, DispatchError, Function, IrError, SSAValue, SpecializedFunction, StagedFunction,
};

/// Minimum constructors every interpreter error type must provide.
///
/// Driver loops are generic over the error; these two constructors cover
/// the conditions the drivers raise themselves. Custom domains add their
/// own variants and convert through `From<InterpreterError>`.
pub trait InterpError: Sized {
    /// Bad machine state: no current frame, exhausted fuel, unexpected
    /// halt, exceeded depth.
    fn no_frame() -> Self;
    /// A read of an SSA value with no binding in the current frame.
    fn unbound_value(ssa: SSAValue) -> Self;
}

impl<E: From<InterpreterError>> InterpError for E {
    fn no_frame() -> Self {
        InterpreterError::NoFrame.into()
    }

    fn unbound_value(ssa: SSAValue) -> Self {
        InterpreterError::UnboundValue(ssa).into()
    }
}

/// Default error type covering the execution taxonomy.
#[derive(Debug, Error)]
pub enum InterpreterError {
    /// An operation needed a current frame and none exists.
    #[error("no active frame")]
    NoFrame,

    #[error("read of unbound SSA value {0}")]
    UnboundValue(SSAValue),

    /// A continuation reached a driver that cannot apply it (`Fork` in
    /// concrete execution, advancing past a block end, ...).
    #[error("bad interpreter state: {0}")]
    BadState(&'static str),

    /// Fuel ran out; the cursor is left on the statement that was about
    /// to execute.
    #[error("fuel exhausted")]
    Exhausted,

    #[error("maximum call depth exceeded")]
    MaxDepthExceeded,

    /// A typed driver touched a frame whose stage does not host the
    /// requested dialect.
    #[error("stage {frame_stage} does not host the requested dialect")]
    StageMismatch { frame_stage: CompileStage },

    /// A call's specialization dispatch failed; carries the dispatch
    /// outcome.
    #[error("call resolution failed at {staged}: {inner}")]
    CallResolutionFailed {
        staged: StagedFunction,
        inner: DispatchError,
    },

    /// The abstract fixpoint hit its iteration cap or a lattice contract
    /// violation.
    #[error("abstract interpretation did not converge")]
    DidNotConverge,

    #[error("block argument arity mismatch: expected {expected}, got {got}")]
    ArityMismatch { expected: usize, got: usize },

    /// A specialization has no entry block to execute.
    #[error("specialization {0} has no entry block")]
    MissingEntry(SpecializedFunction),

    #[error("no stage {0} in the pipeline")]
    MissingStage(CompileStage),

    /// A function has no staged entry at the requested stage.
    #[error("function {function} has no staged entry at {stage}")]
    MissingFunctionStageMapping {
        function: Function,
        stage: CompileStage,
    },

    #[error(transparent)]
    Ir(#[from] IrError),

    /// Escape hatch for dialect-defined failures.
    #[error("{0}")]
    Custom(Box<dyn std::error::Error + Send + Sync>),
}

impl InterpreterError {
    pub fn custom(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        InterpreterError::Custom(Box::new(err))
    }
}
