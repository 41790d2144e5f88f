//! Interpreters for the kirin IR.
//!
//! Two drivers share one dialect dispatch protocol
//! ([`Interpretable`]) and one state contract ([`Interpreter`]):
//!
//! - [`StackInterpreter`] executes concretely with a frame stack, fuel
//!   and depth limits, breakpoints, and typed or stage-dynamic stepping.
//! - [`AbstractInterpreter`] runs a worklist fixpoint over block entry
//!   states with widening, bounded narrowing, and per-context call
//!   summaries.
//!
//! Dialect semantics return a [`Continuation`] instructing the driver;
//! pure transfer functions bounded on `I::Value` run unchanged under
//! both drivers.

pub mod call;
pub mod control;
pub mod domain;
pub mod error;
pub mod fixpoint;
pub mod frame;
pub mod interp;
pub mod stack;

pub use call::resolve_callee;
pub use control::{Args, BranchCondition, ConcreteExt, Continuation};
pub use domain::{AbstractValue, WideningStrategy};
pub use error::{InterpError, InterpreterError};
pub use fixpoint::{AbstractInterpreter, AnalysisResult, CallContext, CallSummaries, FixpointState};
pub use frame::Frame;
pub use interp::{Interpretable, Interpreter};
pub use stack::StackInterpreter;
