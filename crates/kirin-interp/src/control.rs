//! The continuation protocol between dialect semantics and drivers.

use smallvec::SmallVec;

use kirin_ir::{Block, CompileStage, ResultValue, SpecializedFunction};

/// Argument tuple passed along control-flow edges.
pub type Args<V> = SmallVec<[V; 4]>;

/// Value returned by a dialect's `interpret` to instruct the driver.
///
/// The `X` parameter carries driver-specific extensions: the stack
/// interpreter uses [`ConcreteExt`] (`Break`/`Halt`), the abstract
/// interpreter uses [`std::convert::Infallible`] so those variants are
/// unrepresentable during analysis. `Fork` is shared in the protocol but
/// is a [`BadState`](crate::InterpreterError::BadState) error when it
/// reaches the concrete driver.
#[derive(Debug, Clone)]
pub enum Continuation<V, X = ConcreteExt> {
    /// Advance to the next statement in the current block.
    Continue,
    /// Bind the values to the target block's arguments and move the
    /// cursor to its entry.
    Jump(Block, Args<V>),
    /// Abstract non-determinism: enqueue each target with its bindings;
    /// merged on revisit.
    Fork(Vec<(Block, Args<V>)>),
    /// Push a frame for `callee` on `stage`, binding `args` to its entry
    /// block arguments; the caller suspends on the current statement and
    /// receives the return in `result`.
    Call {
        callee: SpecializedFunction,
        stage: CompileStage,
        args: Args<V>,
        result: ResultValue,
    },
    /// Pop the current frame with a return value.
    Return(V),
    /// Driver-specific extension.
    Ext(X),
}

/// Concrete-only control actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcreteExt {
    /// Suspend at the current statement without advancing; control goes
    /// back to the caller.
    Break,
    /// Terminate the session.
    Halt,
}

impl<V> Continuation<V, ConcreteExt> {
    pub fn brk() -> Self {
        Continuation::Ext(ConcreteExt::Break)
    }

    pub fn halt() -> Self {
        Continuation::Ext(ConcreteExt::Halt)
    }
}

/// Branch decidability for a value domain.
///
/// One conditional-branch transfer function serves both interpreters:
/// concrete values always decide, abstract values return `None` to make
/// the dialect emit a [`Continuation::Fork`].
pub trait BranchCondition {
    /// `Some(b)` when the value decides the branch, `None` when both
    /// targets are possible.
    fn is_truthy(&self) -> Option<bool>;
}

impl BranchCondition for i64 {
    fn is_truthy(&self) -> Option<bool> {
        Some(*self != 0)
    }
}

impl BranchCondition for bool {
    fn is_truthy(&self) -> Option<bool> {
        Some(*self)
    }
}
