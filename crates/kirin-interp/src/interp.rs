//! The interpreter state contract and the dialect dispatch hook.

use kirin_ir::{CompileStage, Pipeline, ResultValue, SSAValue, StageMeta};

use crate::control::Continuation;
use crate::error::InterpError;

/// The state contract dialect semantics program against.
///
/// Deliberately tiny: reads, writes, and pipeline/stage identity. Frame
/// push/pop, fuel accounting and the execution loops are *inherent* to
/// each driver ([`crate::StackInterpreter`],
/// [`crate::AbstractInterpreter`]) because different walking strategies
/// need different state.
pub trait Interpreter<'ir> {
    type Value;
    type Error: InterpError;
    /// Driver-specific continuation extension
    /// ([`crate::ConcreteExt`] or [`std::convert::Infallible`]).
    type Ext;
    /// The pipeline's stage container type.
    type StageInfo: StageMeta;

    /// Borrow the binding of an SSA value in the current frame.
    fn read_ref(&self, value: SSAValue) -> Result<&Self::Value, Self::Error>;

    /// Clone out the binding of an SSA value.
    fn read(&self, value: impl Into<SSAValue>) -> Result<Self::Value, Self::Error>
    where
        Self::Value: Clone,
    {
        self.read_ref(value.into()).cloned()
    }

    /// Bind a statement result in the current frame.
    fn write(&mut self, result: ResultValue, value: Self::Value) -> Result<(), Self::Error>;

    /// Bind an arbitrary SSA value (block arguments) in the current
    /// frame.
    fn write_ssa(&mut self, ssa: SSAValue, value: Self::Value) -> Result<(), Self::Error>;

    fn pipeline(&self) -> &'ir Pipeline<Self::StageInfo>;

    /// The stage the session was started on. Individual frames may run on
    /// other stages; see [`crate::Frame::stage`].
    fn active_stage(&self) -> CompileStage;

    /// The stage of the currently executing frame, falling back to the
    /// active stage when no frame is live. Same-stage call statements use
    /// this as the stage tag of the `Call` they emit.
    fn current_stage(&self) -> CompileStage {
        self.active_stage()
    }
}

/// Per-statement semantics: read operand bindings, write result bindings,
/// return a continuation for the driver.
///
/// Implemented by dialects, dispatched statically through the dialect
/// enum: the driver reads the cursor, resolves the frame's stage storage,
/// fetches the statement's definition and calls `interpret` on it.
///
/// Bounds go on the interpreter or on `I::Value` depending on whether the
/// operation is pure (value-bounded) or effectful (interpreter-bounded);
/// pure transfer functions written against `I::Value` bounds run
/// unchanged under both the concrete and the abstract driver.
pub trait Interpretable<'ir, I: Interpreter<'ir>> {
    fn interpret(&self, interp: &mut I) -> Result<Continuation<I::Value, I::Ext>, I::Error>;
}
