//! The concrete stack interpreter.
//!
//! Owns a frame stack, optional fuel and depth limits, a breakpoint set
//! and optional global state `G`. Two parallel driver APIs:
//!
//! - **Typed** (`step::<L>` / `advance::<L>` / `run::<L>` / `call::<L>`):
//!   every frame must live on a stage hosting dialect `L`; touching a
//!   frame on any other stage is a
//!   [`StageMismatch`](InterpreterError::StageMismatch).
//! - **Dynamic** (`step_dyn` / `advance_dyn` / `run_dyn` / `call_dyn`):
//!   each operation routes through the frame's stage tag over the
//!   pipeline's type-level language list, so recursive mixed-stage call
//!   chains (`A → C → B → A`) execute with per-frame stage fidelity.
//!
//! `advance` must be fed exactly the continuation returned by the
//! immediately preceding `step`; mixing stale continuations is a
//! programmer error the types do not defend against.

use rustc_hash::FxHashSet;
use std::marker::PhantomData;
use tracing::trace;

use kirin_ir::{
    Block, CompileStage, Dialect, GetInfo, HasStageInfo, Pipeline, ResultValue, SSAValue,
    SpecializedFunction, StageAction, StageDispatch, StageInfo, StageMeta, Statement,
};

use crate::control::{ConcreteExt, Continuation};
use crate::error::InterpreterError;
use crate::frame::Frame;
use crate::interp::{Interpretable, Interpreter};

type StackFrame<V> = Frame<V, Option<Statement>>;

pub struct StackInterpreter<'ir, V, S, E = InterpreterError, G = ()>
where
    S: StageMeta,
{
    pipeline: &'ir Pipeline<S>,
    active_stage: CompileStage,
    frames: Vec<StackFrame<V>>,
    global: G,
    breakpoints: FxHashSet<Statement>,
    fuel: Option<u64>,
    max_depth: Option<usize>,
    _error: PhantomData<E>,
}

// -- Construction -----------------------------------------------------------

impl<'ir, V, S, E> StackInterpreter<'ir, V, S, E, ()>
where
    S: StageMeta,
{
    pub fn new(pipeline: &'ir Pipeline<S>, active_stage: CompileStage) -> Self {
        Self {
            pipeline,
            active_stage,
            frames: Vec::new(),
            global: (),
            breakpoints: FxHashSet::default(),
            fuel: None,
            max_depth: None,
            _error: PhantomData,
        }
    }

    /// Attach global state, changing `G` from `()` to the provided type.
    pub fn with_global<G>(self, global: G) -> StackInterpreter<'ir, V, S, E, G> {
        StackInterpreter {
            pipeline: self.pipeline,
            active_stage: self.active_stage,
            frames: self.frames,
            global,
            breakpoints: self.breakpoints,
            fuel: self.fuel,
            max_depth: self.max_depth,
            _error: PhantomData,
        }
    }
}

impl<'ir, V, S, E, G> StackInterpreter<'ir, V, S, E, G>
where
    S: StageMeta,
{
    /// Cap the number of `step`s this session may execute.
    pub fn with_fuel(mut self, fuel: u64) -> Self {
        self.fuel = Some(fuel);
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn fuel(&self) -> Option<u64> {
        self.fuel
    }

    /// Replace the remaining fuel, e.g. to resume after
    /// [`InterpreterError::Exhausted`].
    pub fn set_fuel(&mut self, fuel: Option<u64>) {
        self.fuel = fuel;
    }

    pub fn global(&self) -> &G {
        &self.global
    }

    pub fn global_mut(&mut self) -> &mut G {
        &mut self.global
    }

    pub fn set_breakpoints(&mut self, stmts: FxHashSet<Statement>) {
        self.breakpoints = stmts;
    }

    pub fn add_breakpoint(&mut self, stmt: Statement) {
        self.breakpoints.insert(stmt);
    }

    pub fn clear_breakpoints(&mut self) {
        self.breakpoints.clear();
    }

    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }
}

// -- Frame management (inherent, not on the trait) --------------------------

impl<'ir, V, S, E, G> StackInterpreter<'ir, V, S, E, G>
where
    S: StageMeta,
    E: From<InterpreterError>,
{
    pub fn current_frame(&self) -> Result<&StackFrame<V>, E> {
        self.frames
            .last()
            .ok_or_else(|| InterpreterError::NoFrame.into())
    }

    pub fn current_frame_mut(&mut self) -> Result<&mut StackFrame<V>, E> {
        self.frames
            .last_mut()
            .ok_or_else(|| InterpreterError::NoFrame.into())
    }

    pub fn push_frame(&mut self, frame: StackFrame<V>) -> Result<(), E> {
        if let Some(max) = self.max_depth {
            if self.frames.len() >= max {
                return Err(InterpreterError::MaxDepthExceeded.into());
            }
        }
        self.frames.push(frame);
        Ok(())
    }

    pub fn pop_frame(&mut self) -> Result<StackFrame<V>, E> {
        self.frames
            .pop()
            .ok_or_else(|| InterpreterError::NoFrame.into())
    }

    fn consume_fuel(&mut self) -> Result<(), E> {
        if let Some(fuel) = &mut self.fuel {
            if *fuel == 0 {
                return Err(InterpreterError::Exhausted.into());
            }
            *fuel -= 1;
        }
        Ok(())
    }

    /// Typed stage resolution: `stage_id` must host dialect `L`.
    fn stage_info<L>(&self, stage_id: CompileStage) -> Result<&'ir StageInfo<L>, E>
    where
        L: Dialect,
        S: HasStageInfo<L>,
    {
        let stage = self
            .pipeline
            .stage(stage_id)
            .ok_or(InterpreterError::MissingStage(stage_id))?;
        stage
            .try_stage_info()
            .ok_or_else(|| InterpreterError::StageMismatch { frame_stage: stage_id }.into())
    }
}

// -- Interpreter trait ------------------------------------------------------

impl<'ir, V, S, E, G> Interpreter<'ir> for StackInterpreter<'ir, V, S, E, G>
where
    S: StageMeta,
    E: From<InterpreterError>,
{
    type Value = V;
    type Error = E;
    type Ext = ConcreteExt;
    type StageInfo = S;

    fn read_ref(&self, value: SSAValue) -> Result<&V, E> {
        self.current_frame()?
            .read(value)
            .ok_or_else(|| InterpreterError::UnboundValue(value).into())
    }

    fn write(&mut self, result: ResultValue, value: V) -> Result<(), E> {
        self.current_frame_mut()?.write(result, value);
        Ok(())
    }

    fn write_ssa(&mut self, ssa: SSAValue, value: V) -> Result<(), E> {
        self.current_frame_mut()?.write_ssa(ssa, value);
        Ok(())
    }

    fn pipeline(&self) -> &'ir Pipeline<S> {
        self.pipeline
    }

    fn active_stage(&self) -> CompileStage {
        self.active_stage
    }

    fn current_stage(&self) -> CompileStage {
        self.frames
            .last()
            .map_or(self.active_stage, StackFrame::stage)
    }
}

// -- Typed execution engine -------------------------------------------------

impl<'ir, V, S, E, G> StackInterpreter<'ir, V, S, E, G>
where
    V: Clone,
    S: StageMeta,
    E: From<InterpreterError>,
{
    /// Execute the current statement's dialect semantics and return the
    /// raw continuation without applying any cursor mutation.
    pub fn step<L>(&mut self) -> Result<Continuation<V, ConcreteExt>, E>
    where
        L: Dialect + Interpretable<'ir, Self>,
        S: HasStageInfo<L>,
    {
        self.consume_fuel()?;
        let frame_stage = self.current_frame()?.stage();
        let stage = self.stage_info::<L>(frame_stage)?;
        let cursor = self
            .current_frame()?
            .cursor()
            .ok_or(InterpreterError::BadState("step past the end of a frame"))?;
        trace!(%cursor, stage = %frame_stage, "step");
        let def: &L = cursor.definition(stage);
        def.interpret(self)
    }

    /// Apply the cursor mutations of a continuation returned by the
    /// immediately preceding [`step`](Self::step).
    pub fn advance<L>(&mut self, control: &Continuation<V, ConcreteExt>) -> Result<(), E>
    where
        L: Dialect,
        S: HasStageInfo<L>,
    {
        match control {
            Continuation::Continue => self.advance_cursor::<L>(),
            Continuation::Jump(block, args) => self.enter_block::<L>(*block, args),
            Continuation::Fork(_) => {
                Err(InterpreterError::BadState("fork in concrete execution").into())
            }
            Continuation::Call {
                callee,
                stage,
                args,
                result,
            } => self.push_call_frame::<L>(*callee, *stage, args, Some(*result)),
            Continuation::Return(value) => {
                let popped = self.pop_frame()?;
                if let Some(slot) = popped.result_slot() {
                    self.write(slot, value.clone())?;
                    // The caller suspended on its call statement.
                    self.advance_cursor::<L>()?;
                }
                Ok(())
            }
            Continuation::Ext(ConcreteExt::Break) | Continuation::Ext(ConcreteExt::Halt) => Ok(()),
        }
    }

    /// Step and advance until the call that entered the current frame
    /// depth returns, or the session halts. Ignores breakpoints; a
    /// dialect-emitted `Break` is stepped over.
    pub fn run<L>(&mut self) -> Result<Continuation<V, ConcreteExt>, E>
    where
        L: Dialect + Interpretable<'ir, Self>,
        S: HasStageInfo<L>,
    {
        let initial_depth = self.frames.len();
        loop {
            let control = self.step::<L>()?;
            match &control {
                Continuation::Ext(ConcreteExt::Halt) => return Ok(control),
                Continuation::Ext(ConcreteExt::Break) => {
                    self.advance::<L>(&Continuation::Continue)?;
                }
                Continuation::Return(_) => {
                    self.advance::<L>(&control)?;
                    if self.frames.len() < initial_depth {
                        return Ok(control);
                    }
                }
                _ => self.advance::<L>(&control)?,
            }
        }
    }

    /// As [`run`](Self::run), but consult the breakpoint set before each
    /// step and honor dialect-emitted `Break` by suspending at the
    /// current statement.
    pub fn run_until_break<L>(&mut self) -> Result<Continuation<V, ConcreteExt>, E>
    where
        L: Dialect + Interpretable<'ir, Self>,
        S: HasStageInfo<L>,
    {
        let initial_depth = self.frames.len();
        loop {
            if let Some(cursor) = self.current_frame()?.cursor() {
                if self.breakpoints.contains(&cursor) {
                    return Ok(Continuation::brk());
                }
            }
            let control = self.step::<L>()?;
            match &control {
                Continuation::Ext(_) => return Ok(control),
                Continuation::Return(_) => {
                    self.advance::<L>(&control)?;
                    if self.frames.len() < initial_depth {
                        return Ok(control);
                    }
                }
                _ => self.advance::<L>(&control)?,
            }
        }
    }

    /// Push a root frame for `callee` at the session's active stage, run
    /// it to completion, and return its return value.
    pub fn call<L>(&mut self, callee: SpecializedFunction, args: &[V]) -> Result<V, E>
    where
        L: Dialect + Interpretable<'ir, Self>,
        S: HasStageInfo<L>,
    {
        let initial_depth = self.frames.len();
        self.push_call_frame::<L>(callee, self.active_stage, args, None)?;
        loop {
            let control = self.step::<L>()?;
            match &control {
                Continuation::Ext(ConcreteExt::Halt) => {
                    return Err(InterpreterError::BadState("halt during call").into());
                }
                Continuation::Ext(ConcreteExt::Break) => {
                    self.advance::<L>(&Continuation::Continue)?;
                }
                Continuation::Return(value) => {
                    let value = value.clone();
                    self.advance::<L>(&control)?;
                    if self.frames.len() == initial_depth {
                        return Ok(value);
                    }
                }
                _ => self.advance::<L>(&control)?,
            }
        }
    }

    // -- Internal helpers ---------------------------------------------------

    fn advance_cursor<L>(&mut self) -> Result<(), E>
    where
        L: Dialect,
        S: HasStageInfo<L>,
    {
        let frame_stage = self.current_frame()?.stage();
        let stage = self.stage_info::<L>(frame_stage)?;
        let cursor = self
            .current_frame()?
            .cursor()
            .ok_or(InterpreterError::BadState("advance past the end of a frame"))?;
        let next = next_cursor(stage, cursor)?;
        self.current_frame_mut()?.set_cursor(next);
        Ok(())
    }

    fn enter_block<L>(&mut self, block: Block, args: &[V]) -> Result<(), E>
    where
        L: Dialect,
        S: HasStageInfo<L>,
    {
        let frame_stage = self.current_frame()?.stage();
        let stage = self.stage_info::<L>(frame_stage)?;
        let frame = self.current_frame_mut()?;
        bind_block_args(stage, frame, block, args)?;
        let first = block.first_statement(stage);
        self.current_frame_mut()?.set_cursor(first);
        Ok(())
    }

    fn push_call_frame<L>(
        &mut self,
        callee: SpecializedFunction,
        stage_id: CompileStage,
        args: &[V],
        result_slot: Option<ResultValue>,
    ) -> Result<(), E>
    where
        L: Dialect,
        S: HasStageInfo<L>,
    {
        let stage = self.stage_info::<L>(stage_id)?;
        let mut frame = new_call_frame(stage, callee, stage_id, args)?;
        if let Some(slot) = result_slot {
            frame = frame.with_result_slot(slot);
        }
        self.push_frame(frame)
    }
}

// -- Shared frame construction ----------------------------------------------

fn next_cursor<L: Dialect>(
    stage: &StageInfo<L>,
    cursor: Statement,
) -> Result<Option<Statement>, InterpreterError> {
    if let Some(next) = cursor.next(stage) {
        return Ok(Some(next));
    }
    let block = cursor
        .parent(stage)
        .ok_or(kirin_ir::IrError::OrphanStatement(cursor))?;
    match block.terminator(stage) {
        Some(term) if term == cursor => Ok(None),
        Some(term) => Ok(Some(term)),
        None => Err(InterpreterError::BadState("block has no terminator")),
    }
}

fn bind_block_args<L: Dialect, V: Clone, X>(
    stage: &StageInfo<L>,
    frame: &mut Frame<V, X>,
    block: Block,
    args: &[V],
) -> Result<(), InterpreterError> {
    let arguments = block.arguments(stage);
    if arguments.len() != args.len() {
        return Err(InterpreterError::ArityMismatch {
            expected: arguments.len(),
            got: args.len(),
        });
    }
    for (arg, value) in arguments.iter().zip(args) {
        frame.write_ssa(SSAValue::from(*arg), value.clone());
    }
    Ok(())
}

fn new_call_frame<L: Dialect, V: Clone>(
    stage: &StageInfo<L>,
    callee: SpecializedFunction,
    stage_id: CompileStage,
    args: &[V],
) -> Result<StackFrame<V>, InterpreterError> {
    let spec = callee
        .get_info(stage)
        .ok_or(InterpreterError::MissingEntry(callee))?;
    let entry = spec
        .body()
        .entry_block(stage)
        .ok_or(InterpreterError::MissingEntry(callee))?;
    let mut frame = Frame::new(callee, stage_id, entry.first_statement(stage));
    bind_block_args(stage, &mut frame, entry, args)?;
    Ok(frame)
}

// -- Dynamic dispatch actions ------------------------------------------------

/// Runs one `step` against whatever dialect the frame's stage hosts.
///
/// Public only because it appears in the dynamic drivers' dispatch
/// bounds; not constructible outside this module.
pub struct StepAction<'a, 'ir, V, S, E, G>
where
    S: StageMeta,
{
    interp: &'a mut StackInterpreter<'ir, V, S, E, G>,
}

impl<'a, 'ir, V, S, E, G, L> StageAction<S, L> for StepAction<'a, 'ir, V, S, E, G>
where
    V: Clone,
    S: StageMeta + HasStageInfo<L>,
    E: From<InterpreterError>,
    L: Dialect + Interpretable<'ir, StackInterpreter<'ir, V, S, E, G>>,
{
    type Output = Continuation<V, ConcreteExt>;
    type Error = E;

    fn run(
        &mut self,
        _stage_id: CompileStage,
        stage: &StageInfo<L>,
    ) -> Result<Self::Output, Self::Error> {
        let cursor = self
            .interp
            .current_frame()?
            .cursor()
            .ok_or(InterpreterError::BadState("step past the end of a frame"))?;
        let def: &L = cursor.definition(stage);
        def.interpret(self.interp)
    }
}

/// Moves the current frame's cursor past the current statement.
pub struct AdvanceCursorAction<'a, 'ir, V, S, E, G>
where
    S: StageMeta,
{
    interp: &'a mut StackInterpreter<'ir, V, S, E, G>,
}

impl<'a, 'ir, V, S, E, G, L> StageAction<S, L> for AdvanceCursorAction<'a, 'ir, V, S, E, G>
where
    S: StageMeta + HasStageInfo<L>,
    E: From<InterpreterError>,
    L: Dialect,
{
    type Output = ();
    type Error = E;

    fn run(
        &mut self,
        _stage_id: CompileStage,
        stage: &StageInfo<L>,
    ) -> Result<Self::Output, Self::Error> {
        let cursor = self
            .interp
            .current_frame()?
            .cursor()
            .ok_or(InterpreterError::BadState("advance past the end of a frame"))?;
        let next = next_cursor(stage, cursor)?;
        self.interp.current_frame_mut()?.set_cursor(next);
        Ok(())
    }
}

/// Binds jump arguments and moves the cursor to a block entry.
pub struct JumpAction<'a, 'ir, V, S, E, G>
where
    S: StageMeta,
{
    interp: &'a mut StackInterpreter<'ir, V, S, E, G>,
    block: Block,
    args: &'a [V],
}

impl<'a, 'ir, V, S, E, G, L> StageAction<S, L> for JumpAction<'a, 'ir, V, S, E, G>
where
    V: Clone,
    S: StageMeta + HasStageInfo<L>,
    E: From<InterpreterError>,
    L: Dialect,
{
    type Output = ();
    type Error = E;

    fn run(
        &mut self,
        _stage_id: CompileStage,
        stage: &StageInfo<L>,
    ) -> Result<Self::Output, Self::Error> {
        let frame = self.interp.current_frame_mut()?;
        bind_block_args(stage, frame, self.block, self.args)?;
        let first = self.block.first_statement(stage);
        self.interp.current_frame_mut()?.set_cursor(first);
        Ok(())
    }
}

/// Builds and pushes the frame for a callee on its own stage.
pub struct PushFrameAction<'a, 'ir, V, S, E, G>
where
    S: StageMeta,
{
    interp: &'a mut StackInterpreter<'ir, V, S, E, G>,
    callee: SpecializedFunction,
    args: &'a [V],
    result_slot: Option<ResultValue>,
}

impl<'a, 'ir, V, S, E, G, L> StageAction<S, L> for PushFrameAction<'a, 'ir, V, S, E, G>
where
    V: Clone,
    S: StageMeta + HasStageInfo<L>,
    E: From<InterpreterError>,
    L: Dialect,
{
    type Output = ();
    type Error = E;

    fn run(
        &mut self,
        stage_id: CompileStage,
        stage: &StageInfo<L>,
    ) -> Result<Self::Output, Self::Error> {
        let mut frame = new_call_frame(stage, self.callee, stage_id, self.args)?;
        if let Some(slot) = self.result_slot {
            frame = frame.with_result_slot(slot);
        }
        self.interp.push_frame(frame)
    }
}

// -- Dynamic execution engine -----------------------------------------------

impl<'ir, V, S, E, G> StackInterpreter<'ir, V, S, E, G>
where
    V: Clone,
    S: StageMeta,
    E: From<InterpreterError>,
{
    /// As [`step`](Self::step), dispatching on the current frame's stage
    /// tag at runtime.
    pub fn step_dyn(&mut self) -> Result<Continuation<V, ConcreteExt>, E>
    where
        for<'a> S::Languages:
            StageDispatch<S, StepAction<'a, 'ir, V, S, E, G>, Continuation<V, ConcreteExt>, E>,
    {
        self.consume_fuel()?;
        let frame_stage = self.current_frame()?.stage();
        let pipeline = self.pipeline;
        pipeline
            .dispatch_stage(frame_stage, &mut StepAction { interp: self })?
            .ok_or_else(|| InterpreterError::MissingStage(frame_stage).into())
    }

    /// As [`advance`](Self::advance), dispatching each cursor mutation on
    /// the stage tag of the frame it touches. `Call` pushes the callee's
    /// frame on the *callee's* stage; `Return` advances the caller on the
    /// caller's stage.
    pub fn advance_dyn(&mut self, control: &Continuation<V, ConcreteExt>) -> Result<(), E>
    where
        for<'a> S::Languages: StageDispatch<S, AdvanceCursorAction<'a, 'ir, V, S, E, G>, (), E>,
        for<'a> S::Languages: StageDispatch<S, JumpAction<'a, 'ir, V, S, E, G>, (), E>,
        for<'a> S::Languages: StageDispatch<S, PushFrameAction<'a, 'ir, V, S, E, G>, (), E>,
    {
        match control {
            Continuation::Continue => self.advance_cursor_dyn(),
            Continuation::Jump(block, args) => {
                let frame_stage = self.current_frame()?.stage();
                let pipeline = self.pipeline;
                pipeline
                    .dispatch_stage(
                        frame_stage,
                        &mut JumpAction {
                            interp: self,
                            block: *block,
                            args: args.as_slice(),
                        },
                    )?
                    .ok_or_else(|| InterpreterError::MissingStage(frame_stage).into())
            }
            Continuation::Fork(_) => {
                Err(InterpreterError::BadState("fork in concrete execution").into())
            }
            Continuation::Call {
                callee,
                stage,
                args,
                result,
            } => {
                let pipeline = self.pipeline;
                pipeline
                    .dispatch_stage(
                        *stage,
                        &mut PushFrameAction {
                            interp: self,
                            callee: *callee,
                            args: args.as_slice(),
                            result_slot: Some(*result),
                        },
                    )?
                    .ok_or_else(|| InterpreterError::MissingStage(*stage).into())
            }
            Continuation::Return(value) => {
                let popped = self.pop_frame()?;
                if let Some(slot) = popped.result_slot() {
                    self.write(slot, value.clone())?;
                    self.advance_cursor_dyn()?;
                }
                Ok(())
            }
            Continuation::Ext(_) => Ok(()),
        }
    }

    fn advance_cursor_dyn(&mut self) -> Result<(), E>
    where
        for<'a> S::Languages: StageDispatch<S, AdvanceCursorAction<'a, 'ir, V, S, E, G>, (), E>,
    {
        let frame_stage = self.current_frame()?.stage();
        let pipeline = self.pipeline;
        pipeline
            .dispatch_stage(frame_stage, &mut AdvanceCursorAction { interp: self })?
            .ok_or_else(|| InterpreterError::MissingStage(frame_stage).into())
    }

    /// As [`run`](Self::run), routed through stage tags: step and
    /// advance until the call that entered the current frame depth
    /// returns, or the session halts.
    pub fn run_dyn(&mut self) -> Result<Continuation<V, ConcreteExt>, E>
    where
        for<'a> S::Languages:
            StageDispatch<S, StepAction<'a, 'ir, V, S, E, G>, Continuation<V, ConcreteExt>, E>,
        for<'a> S::Languages: StageDispatch<S, AdvanceCursorAction<'a, 'ir, V, S, E, G>, (), E>,
        for<'a> S::Languages: StageDispatch<S, JumpAction<'a, 'ir, V, S, E, G>, (), E>,
        for<'a> S::Languages: StageDispatch<S, PushFrameAction<'a, 'ir, V, S, E, G>, (), E>,
    {
        let initial_depth = self.frames.len();
        loop {
            let control = self.step_dyn()?;
            match &control {
                Continuation::Ext(ConcreteExt::Halt) => return Ok(control),
                Continuation::Ext(ConcreteExt::Break) => {
                    self.advance_dyn(&Continuation::Continue)?;
                }
                Continuation::Return(_) => {
                    self.advance_dyn(&control)?;
                    if self.frames.len() < initial_depth {
                        return Ok(control);
                    }
                }
                _ => self.advance_dyn(&control)?,
            }
        }
    }

    /// As [`run_until_break`](Self::run_until_break), routed through
    /// stage tags.
    pub fn run_until_break_dyn(&mut self) -> Result<Continuation<V, ConcreteExt>, E>
    where
        for<'a> S::Languages:
            StageDispatch<S, StepAction<'a, 'ir, V, S, E, G>, Continuation<V, ConcreteExt>, E>,
        for<'a> S::Languages: StageDispatch<S, AdvanceCursorAction<'a, 'ir, V, S, E, G>, (), E>,
        for<'a> S::Languages: StageDispatch<S, JumpAction<'a, 'ir, V, S, E, G>, (), E>,
        for<'a> S::Languages: StageDispatch<S, PushFrameAction<'a, 'ir, V, S, E, G>, (), E>,
    {
        let initial_depth = self.frames.len();
        loop {
            if let Some(cursor) = self.current_frame()?.cursor() {
                if self.breakpoints.contains(&cursor) {
                    return Ok(Continuation::brk());
                }
            }
            let control = self.step_dyn()?;
            match &control {
                Continuation::Ext(_) => return Ok(control),
                Continuation::Return(_) => {
                    self.advance_dyn(&control)?;
                    if self.frames.len() < initial_depth {
                        return Ok(control);
                    }
                }
                _ => self.advance_dyn(&control)?,
            }
        }
    }

    /// Call `callee` on an explicit stage and run the mixed-stage session
    /// to completion.
    pub fn call_dyn(
        &mut self,
        callee: SpecializedFunction,
        stage: CompileStage,
        args: &[V],
    ) -> Result<V, E>
    where
        for<'a> S::Languages:
            StageDispatch<S, StepAction<'a, 'ir, V, S, E, G>, Continuation<V, ConcreteExt>, E>,
        for<'a> S::Languages: StageDispatch<S, AdvanceCursorAction<'a, 'ir, V, S, E, G>, (), E>,
        for<'a> S::Languages: StageDispatch<S, JumpAction<'a, 'ir, V, S, E, G>, (), E>,
        for<'a> S::Languages: StageDispatch<S, PushFrameAction<'a, 'ir, V, S, E, G>, (), E>,
    {
        let initial_depth = self.frames.len();
        let pipeline = self.pipeline;
        pipeline
            .dispatch_stage(
                stage,
                &mut PushFrameAction {
                    interp: self,
                    callee,
                    args,
                    result_slot: None,
                },
            )?
            .ok_or(InterpreterError::MissingStage(stage))?;

        loop {
            let control = self.step_dyn()?;
            match &control {
                Continuation::Ext(ConcreteExt::Halt) => {
                    return Err(InterpreterError::BadState("halt during call").into());
                }
                Continuation::Ext(ConcreteExt::Break) => {
                    self.advance_dyn(&Continuation::Continue)?;
                }
                Continuation::Return(value) => {
                    let value = value.clone();
                    self.advance_dyn(&control)?;
                    if self.frames.len() == initial_depth {
                        return Ok(value);
                    }
                }
                _ => self.advance_dyn(&control)?,
            }
        }
    }
}
