//! The worklist-based abstract interpreter.
//!
//! Computes, for each reachable block entry, an over-approximation of the
//! values every SSA value may take, then widens to a post-fixpoint and
//! optionally narrows back toward the greatest fixpoint. Calls are
//! summarized per `(stage, callee, argument abstraction)` with tentative
//! entries driving recursive convergence.

use std::collections::VecDeque;
use std::marker::PhantomData;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace, warn};

use kirin_ir::{
    Block, CompileStage, Dialect, GetInfo, HasStageInfo, Pipeline, ResultValue, SSAValue,
    SpecializedFunction, StageInfo, StageMeta,
};

use crate::control::Continuation;
use crate::domain::{AbstractValue, WideningStrategy};
use crate::error::InterpreterError;
use crate::frame::Frame;
use crate::interp::{Interpretable, Interpreter};

/// Per-activation fixpoint bookkeeping, stored as frame extra state.
///
/// The worklist is FIFO with an O(1) membership side-set; pop order is
/// not part of the observable contract, only the fixpoint is.
#[derive(Debug, Default)]
pub struct FixpointState {
    worklist: VecDeque<Block>,
    queued: FxHashSet<Block>,
    /// Block argument SSA ids per visited block. Key presence marks the
    /// block as reached.
    block_args: FxHashMap<Block, Vec<SSAValue>>,
    /// Ascending revisit counts, for [`WideningStrategy::Delayed`].
    revisits: FxHashMap<Block, usize>,
}

impl FixpointState {
    fn enqueue(&mut self, block: Block) {
        if self.queued.insert(block) {
            self.worklist.push_back(block);
        }
    }

    fn pop(&mut self) -> Option<Block> {
        let block = self.worklist.pop_front()?;
        self.queued.remove(&block);
        Some(block)
    }
}

/// Result of one abstract analysis: the final abstract store, the
/// argument ids of every reached block, and the joined return value.
#[derive(Debug, Clone)]
pub struct AnalysisResult<V> {
    values: FxHashMap<SSAValue, V>,
    block_args: FxHashMap<Block, Vec<SSAValue>>,
    return_value: Option<V>,
}

impl<V> AnalysisResult<V> {
    /// The empty result: nothing reached, no return.
    pub fn bottom() -> Self {
        Self {
            values: FxHashMap::default(),
            block_args: FxHashMap::default(),
            return_value: None,
        }
    }

    pub fn ssa_value(&self, value: impl Into<SSAValue>) -> Option<&V> {
        self.values.get(&value.into())
    }

    /// `(ssa, value)` pairs bound at a block's entry.
    pub fn block_arg_values(&self, block: Block) -> Option<impl Iterator<Item = (SSAValue, &V)>> {
        let args = self.block_args.get(&block)?;
        Some(
            args.iter()
                .filter_map(|ssa| self.values.get(ssa).map(|v| (*ssa, v))),
        )
    }

    pub fn reached_blocks(&self) -> impl Iterator<Item = &Block> {
        self.block_args.keys()
    }

    pub fn return_value(&self) -> Option<&V> {
        self.return_value.as_ref()
    }
}

impl<V: AbstractValue> AnalysisResult<V> {
    /// Pointwise convergence check on block entry states and the return
    /// summary.
    pub fn is_subseteq(&self, other: &Self) -> bool {
        let returns_ok = match (&self.return_value, &other.return_value) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(a), Some(b)) => a.is_subseteq(b),
        };
        returns_ok
            && self.block_args.iter().all(|(block, args)| {
                args.iter().all(|ssa| {
                    match (self.values.get(ssa), other.values.get(ssa)) {
                        (None, _) => true,
                        (Some(_), None) => false,
                        (Some(a), Some(b)) => a.is_subseteq(b),
                    }
                }) && other.block_args.contains_key(block)
            })
    }
}

/// One memoized call context: the argument abstraction an analysis ran
/// with, and what it produced.
#[derive(Debug, Clone)]
pub struct CallContext<V> {
    arguments: Vec<V>,
    result: AnalysisResult<V>,
    invalidated: bool,
}

impl<V> CallContext<V> {
    pub fn arguments(&self) -> &[V] {
        &self.arguments
    }

    pub fn result(&self) -> &AnalysisResult<V> {
        &self.result
    }

    /// Invalidated contexts are skipped by lookups but kept until
    /// [`CallSummaries::drop_invalidated`] runs.
    pub fn is_invalidated(&self) -> bool {
        self.invalidated
    }
}

impl<V: AbstractValue> CallContext<V> {
    /// Whether this context can answer a query: same arity, every query
    /// argument pointwise below the context's.
    fn covers(&self, query: &[V]) -> bool {
        self.arguments.len() == query.len()
            && query
                .iter()
                .zip(&self.arguments)
                .all(|(q, arg)| q.is_subseteq(arg))
    }

    /// Whether this context is pointwise at or below `other`, i.e. the
    /// more precise answer when both cover a query.
    fn subsumed_by_args_of(&self, other: &Self) -> bool {
        self.arguments
            .iter()
            .zip(&other.arguments)
            .all(|(mine, theirs)| mine.is_subseteq(theirs))
    }
}

/// Memoized analyses for one callee, in three tiers:
///
/// - a *pinned* result supplied by the caller, answered as-is and never
///   recomputed;
/// - computed (or seeded) [`CallContext`]s, searched by argument
///   subsumption;
/// - at most one *in-progress* context, read by recursive calls to the
///   same callee while the outer fixpoint is still iterating.
#[derive(Debug, Clone)]
pub struct CallSummaries<V> {
    pinned: Option<AnalysisResult<V>>,
    contexts: Vec<CallContext<V>>,
    in_progress: Option<CallContext<V>>,
}

impl<V> Default for CallSummaries<V> {
    fn default() -> Self {
        Self {
            pinned: None,
            contexts: Vec::new(),
            in_progress: None,
        }
    }
}

impl<V: AbstractValue> CallSummaries<V> {
    /// Answer a query: the pinned result wins; otherwise the narrowest
    /// live context covering the query. One context per distinct call
    /// pattern keeps the list short, so this is a plain scan.
    pub fn lookup(&self, query: &[V]) -> Option<&AnalysisResult<V>> {
        if let Some(pinned) = &self.pinned {
            return Some(pinned);
        }
        self.contexts
            .iter()
            .filter(|ctx| !ctx.invalidated && ctx.covers(query))
            .reduce(|best, ctx| {
                if ctx.subsumed_by_args_of(best) {
                    ctx
                } else {
                    best
                }
            })
            .map(|ctx| &ctx.result)
    }

    pub fn pin(&mut self, result: AnalysisResult<V>) {
        self.pinned = Some(result);
    }

    pub fn record(&mut self, arguments: Vec<V>, result: AnalysisResult<V>) {
        self.contexts.push(CallContext {
            arguments,
            result,
            invalidated: false,
        });
    }

    pub fn contexts(&self) -> &[CallContext<V>] {
        &self.contexts
    }

    fn in_progress_result(&self) -> Option<&AnalysisResult<V>> {
        self.in_progress.as_ref().map(|ctx| &ctx.result)
    }

    /// Invalidate every computed context; returns how many changed
    /// state. The pinned result is untouched.
    pub fn invalidate_all(&mut self) -> usize {
        let mut count = 0;
        for ctx in &mut self.contexts {
            if !ctx.invalidated {
                ctx.invalidated = true;
                count += 1;
            }
        }
        self.in_progress = None;
        count
    }

    pub fn drop_invalidated(&mut self) {
        self.contexts.retain(|ctx| !ctx.invalidated);
    }

    pub fn is_empty(&self) -> bool {
        self.pinned.is_none() && self.contexts.is_empty() && self.in_progress.is_none()
    }
}

/// Worklist-based abstract interpreter.
///
/// Unlike [`crate::StackInterpreter`], which follows one concrete path,
/// this driver explores every reachable path by joining abstract states
/// at block entries and iterating to a fixpoint, widening at join points
/// to guarantee termination on infinite domains.
pub struct AbstractInterpreter<'ir, V, S, E = InterpreterError, G = ()>
where
    S: StageMeta,
{
    pipeline: &'ir Pipeline<S>,
    active_stage: CompileStage,
    global: G,
    frames: Vec<Frame<V, FixpointState>>,
    widening: WideningStrategy,
    max_iterations: usize,
    narrowing_iterations: usize,
    max_summary_iterations: usize,
    max_depth: Option<usize>,
    summaries: FxHashMap<(CompileStage, SpecializedFunction), CallSummaries<V>>,
    _error: PhantomData<E>,
}

// -- Construction -----------------------------------------------------------

impl<'ir, V, S, E> AbstractInterpreter<'ir, V, S, E, ()>
where
    S: StageMeta,
{
    pub fn new(pipeline: &'ir Pipeline<S>, active_stage: CompileStage) -> Self {
        Self {
            pipeline,
            active_stage,
            global: (),
            frames: Vec::new(),
            widening: WideningStrategy::AllJoins,
            // Unbounded by default; callers opt in to a cap.
            max_iterations: usize::MAX,
            narrowing_iterations: 3,
            max_summary_iterations: 100,
            max_depth: None,
            summaries: FxHashMap::default(),
            _error: PhantomData,
        }
    }

    /// Attach global state, changing `G` from `()` to the provided type.
    ///
    /// The state is shared mutably across forked branches; domains that
    /// need branch-local state carry it in `V` instead.
    pub fn with_global<G>(self, global: G) -> AbstractInterpreter<'ir, V, S, E, G> {
        AbstractInterpreter {
            pipeline: self.pipeline,
            active_stage: self.active_stage,
            global,
            frames: self.frames,
            widening: self.widening,
            max_iterations: self.max_iterations,
            narrowing_iterations: self.narrowing_iterations,
            max_summary_iterations: self.max_summary_iterations,
            max_depth: self.max_depth,
            summaries: self.summaries,
            _error: PhantomData,
        }
    }
}

impl<'ir, V, S, E, G> AbstractInterpreter<'ir, V, S, E, G>
where
    S: StageMeta,
{
    pub fn with_widening(mut self, strategy: WideningStrategy) -> Self {
        self.widening = strategy;
        self
    }

    /// Cap on ascending worklist pops per activation; exceeding it is
    /// [`InterpreterError::DidNotConverge`].
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_narrowing_iterations(mut self, n: usize) -> Self {
        self.narrowing_iterations = n;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_max_summary_iterations(mut self, n: usize) -> Self {
        self.max_summary_iterations = n;
        self
    }

    pub fn global(&self) -> &G {
        &self.global
    }

    pub fn global_mut(&mut self) -> &mut G {
        &mut self.global
    }
}

// -- Summary management -----------------------------------------------------

impl<'ir, V, S, E, G> AbstractInterpreter<'ir, V, S, E, G>
where
    V: AbstractValue,
    S: StageMeta,
{
    /// Best cached summary for `callee` at `stage` given `args`.
    pub fn summary(
        &self,
        stage: CompileStage,
        callee: SpecializedFunction,
        args: &[V],
    ) -> Option<&AnalysisResult<V>> {
        self.summaries.get(&(stage, callee))?.lookup(args)
    }

    pub fn call_summaries(
        &self,
        stage: CompileStage,
        callee: SpecializedFunction,
    ) -> Option<&CallSummaries<V>> {
        self.summaries.get(&(stage, callee))
    }

    /// Pin a summary: analysis will never recompute `callee`.
    pub fn pin_summary(
        &mut self,
        stage: CompileStage,
        callee: SpecializedFunction,
        result: AnalysisResult<V>,
    ) {
        self.summaries
            .entry((stage, callee))
            .or_default()
            .pin(result);
    }

    /// Record a refinable seed for one call context.
    pub fn seed_summary(
        &mut self,
        stage: CompileStage,
        callee: SpecializedFunction,
        args: Vec<V>,
        result: AnalysisResult<V>,
    ) {
        self.summaries
            .entry((stage, callee))
            .or_default()
            .record(args, result);
    }

    /// Invalidate computed contexts so the next
    /// [`analyze`](Self::analyze) re-runs. Pinned summaries are not
    /// affected. Returns the number of contexts invalidated.
    pub fn invalidate_summaries(
        &mut self,
        stage: CompileStage,
        callee: SpecializedFunction,
    ) -> usize {
        self.summaries
            .get_mut(&(stage, callee))
            .map_or(0, CallSummaries::invalidate_all)
    }

    /// Drop invalidated contexts everywhere, freeing memory.
    pub fn gc_summaries(&mut self) {
        for cache in self.summaries.values_mut() {
            cache.drop_invalidated();
        }
        self.summaries.retain(|_, cache| !cache.is_empty());
    }
}

// -- Interpreter trait ------------------------------------------------------

impl<'ir, V, S, E, G> Interpreter<'ir> for AbstractInterpreter<'ir, V, S, E, G>
where
    V: AbstractValue,
    S: StageMeta,
    E: From<InterpreterError>,
{
    type Value = V;
    type Error = E;
    type Ext = std::convert::Infallible;
    type StageInfo = S;

    fn read_ref(&self, value: SSAValue) -> Result<&V, E> {
        self.frames
            .last()
            .and_then(|frame| frame.read(value))
            .ok_or_else(|| InterpreterError::UnboundValue(value).into())
    }

    fn write(&mut self, result: ResultValue, value: V) -> Result<(), E> {
        self.frames
            .last_mut()
            .ok_or_else(|| InterpreterError::NoFrame.into())?
            .write(result, value);
        Ok(())
    }

    fn write_ssa(&mut self, ssa: SSAValue, value: V) -> Result<(), E> {
        self.frames
            .last_mut()
            .ok_or_else(|| InterpreterError::NoFrame.into())?
            .write_ssa(ssa, value);
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
            .map_or(self.active_stage, Frame::stage)
    }
}

type AbstractContinuation<V> = Continuation<V, std::convert::Infallible>;

// -- Analysis engine --------------------------------------------------------

impl<'ir, V, S, E, G> AbstractInterpreter<'ir, V, S, E, G>
where
    V: AbstractValue,
    S: StageMeta,
    E: From<InterpreterError>,
{
    /// Analyze `callee` at the active stage with the given argument
    /// abstraction.
    pub fn analyze<L>(
        &mut self,
        callee: SpecializedFunction,
        args: &[V],
    ) -> Result<AnalysisResult<V>, E>
    where
        L: Dialect + Interpretable<'ir, Self>,
        S: HasStageInfo<L>,
    {
        self.analyze_at::<L>(self.active_stage, callee, args)
    }

    /// Analyze `callee` at an explicit stage.
    ///
    /// Results are cached per `(stage, callee, args)`: a cached entry is
    /// reused only when every query argument is subsumed by the cached
    /// argument, so calls with more precise arguments trigger a fresh
    /// analysis. Recursive calls see the callee's tentative summary
    /// (bottom at first) and the outermost activation re-analyzes until
    /// all summaries stabilize.
    pub fn analyze_at<L>(
        &mut self,
        stage_id: CompileStage,
        callee: SpecializedFunction,
        args: &[V],
    ) -> Result<AnalysisResult<V>, E>
    where
        L: Dialect + Interpretable<'ir, Self>,
        S: HasStageInfo<L>,
    {
        if let Some(cached) = self
            .summaries
            .get(&(stage_id, callee))
            .and_then(|cache| cache.lookup(args))
        {
            trace!(%callee, stage = %stage_id, "summary cache hit");
            return Ok(cached.clone());
        }

        // A callee already on the frame stack is a recursive call: hand
        // back its tentative summary and let the outer fixpoint drive.
        if self
            .frames
            .iter()
            .any(|f| f.callee() == callee && f.stage() == stage_id)
        {
            let tentative = self
                .summaries
                .get(&(stage_id, callee))
                .and_then(CallSummaries::in_progress_result)
                .cloned()
                .unwrap_or_else(AnalysisResult::bottom);
            return Ok(tentative);
        }

        if let Some(max) = self.max_depth {
            if self.frames.len() >= max {
                return Err(InterpreterError::MaxDepthExceeded.into());
            }
        }

        let entry = {
            let stage = self.stage_info::<L>(stage_id)?;
            callee
                .get_info(stage)
                .ok_or(InterpreterError::MissingEntry(callee))?
                .body()
                .entry_block(stage)
                .ok_or(InterpreterError::MissingEntry(callee))?
        };

        self.mark_in_progress(stage_id, callee, args, AnalysisResult::bottom());

        let mut summary_iterations = 0;
        let final_result = loop {
            summary_iterations += 1;
            if summary_iterations > self.max_summary_iterations {
                warn!(%callee, "inter-procedural summary iteration cap hit");
                return Err(InterpreterError::DidNotConverge.into());
            }

            self.frames
                .push(Frame::new(callee, stage_id, FixpointState::default()));
            let result = self.run_forward::<L>(stage_id, entry, args);
            self.frames.pop().expect("frame stack underflow");
            let result = result?;

            let converged = match self
                .summaries
                .get(&(stage_id, callee))
                .and_then(CallSummaries::in_progress_result)
            {
                Some(old) => result.is_subseteq(old),
                None => summary_iterations > 1,
            };
            self.mark_in_progress(stage_id, callee, args, result.clone());

            if converged {
                break result;
            }
            debug!(%callee, iteration = summary_iterations, "summary not yet stable");
        };

        // Promote the in-progress context to a committed one.
        let cache = self.summaries.entry((stage_id, callee)).or_default();
        cache.in_progress = None;
        cache.record(args.to_vec(), final_result.clone());
        Ok(final_result)
    }

    /// Run the forward fixpoint from `entry` with `args` bound to its
    /// block arguments. Requires an analysis frame to be pushed.
    pub fn run_forward<L>(
        &mut self,
        stage_id: CompileStage,
        entry: Block,
        args: &[V],
    ) -> Result<AnalysisResult<V>, E>
    where
        L: Dialect + Interpretable<'ir, Self>,
        S: HasStageInfo<L>,
    {
        // Seed the entry block.
        {
            let stage = self.stage_info::<L>(stage_id)?;
            let arg_ssas: Vec<SSAValue> = entry
                .arguments(stage)
                .iter()
                .map(|a| SSAValue::from(*a))
                .collect();
            if arg_ssas.len() != args.len() {
                return Err(InterpreterError::ArityMismatch {
                    expected: arg_ssas.len(),
                    got: args.len(),
                }
                .into());
            }
            let frame = self
                .frames
                .last_mut()
                .ok_or_else(|| InterpreterError::NoFrame.into())?;
            let (values, fp) = frame.values_and_extra_mut();
            for (ssa, value) in arg_ssas.iter().zip(args) {
                values.insert(*ssa, value.clone());
            }
            fp.block_args.insert(entry, arg_ssas);
            fp.enqueue(entry);
        }

        let mut return_value: Option<V> = None;
        let mut iterations = 0;

        // Ascending phase: widen to a post-fixpoint.
        loop {
            let block = {
                let frame = self
                    .frames
                    .last_mut()
                    .ok_or_else(|| InterpreterError::NoFrame.into())?;
                frame.extra_mut().pop()
            };
            let Some(block) = block else { break };

            iterations += 1;
            if iterations > self.max_iterations {
                warn!(iterations, "ascending phase iteration cap hit");
                return Err(InterpreterError::DidNotConverge.into());
            }
            trace!(%block, iterations, "ascending visit");

            let control = self.interpret_block::<L>(stage_id, block)?;
            self.propagate_ascending::<L>(stage_id, &control, &mut return_value)?;
        }

        // Descending phase: bounded narrowing toward the greatest
        // fixpoint. Each sweep recomputes every reached block, joins the
        // inbound edges per target, then narrows the target's entry state
        // against the recomputed join.
        for sweep in 0..self.narrowing_iterations {
            let blocks: Vec<Block> = {
                let frame = self
                    .frames
                    .last()
                    .ok_or_else(|| InterpreterError::NoFrame.into())?;
                let mut blocks: Vec<Block> = frame.extra().block_args.keys().copied().collect();
                blocks.sort();
                blocks
            };

            let mut inbound: FxHashMap<Block, Vec<V>> = FxHashMap::default();
            inbound.insert(entry, args.to_vec());
            let mut recomputed_return: Option<V> = None;

            for &block in &blocks {
                let control = self.interpret_block::<L>(stage_id, block)?;
                collect_edges(&control, &mut inbound, &mut recomputed_return);
            }

            let mut changed = false;
            for (target, joined_args) in inbound {
                changed |= self.narrow_block_entry::<L>(stage_id, target, &joined_args)?;
            }
            if let (Some(prior), Some(new)) = (&return_value, &recomputed_return) {
                let narrowed = prior.narrow(new);
                if !narrowed.is_subseteq(prior) {
                    warn!("narrow produced a value above its left operand");
                    return Err(InterpreterError::DidNotConverge.into());
                }
                changed |= !prior.is_subseteq(&narrowed);
                return_value = Some(narrowed);
            }
            if !changed {
                trace!(sweep, "narrowing stabilized");
                break;
            }
        }

        let frame = self
            .frames
            .last()
            .ok_or_else(|| InterpreterError::NoFrame.into())?;
        Ok(AnalysisResult {
            values: frame.values().clone(),
            block_args: frame.extra().block_args.clone(),
            return_value,
        })
    }

    // -- Internal helpers ---------------------------------------------------

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

    fn mark_in_progress(
        &mut self,
        stage_id: CompileStage,
        callee: SpecializedFunction,
        args: &[V],
        result: AnalysisResult<V>,
    ) {
        self.summaries.entry((stage_id, callee)).or_default().in_progress = Some(CallContext {
            arguments: args.to_vec(),
            result,
            invalidated: false,
        });
    }

    /// Interpret all body statements of a block, then its terminator,
    /// returning the terminator's continuation. Nested calls are resolved
    /// through the summary cache or recursive analysis.
    fn interpret_block<L>(
        &mut self,
        stage_id: CompileStage,
        block: Block,
    ) -> Result<AbstractContinuation<V>, E>
    where
        L: Dialect + Interpretable<'ir, Self>,
        S: HasStageInfo<L>,
    {
        let (stmts, terminator) = {
            let stage = self.stage_info::<L>(stage_id)?;
            let stmts: Vec<_> = block.statements(stage).collect();
            (stmts, block.terminator(stage))
        };

        for stmt in stmts {
            let control = {
                let stage = self.stage_info::<L>(stage_id)?;
                let def: &L = stmt.definition(stage);
                def.interpret(self)?
            };
            match control {
                Continuation::Continue => {}
                Continuation::Call {
                    callee,
                    stage,
                    args,
                    result,
                } => {
                    let analysis = self.analyze_at::<L>(stage, callee, &args)?;
                    let returned = analysis
                        .return_value()
                        .cloned()
                        .unwrap_or_else(V::bottom);
                    self.write(result, returned)?;
                }
                other => return Ok(other),
            }
        }

        let terminator =
            terminator.ok_or(InterpreterError::BadState("block has no terminator"))?;
        let stage = self.stage_info::<L>(stage_id)?;
        let def: &L = terminator.definition(stage);
        def.interpret(self)
    }

    /// Apply a terminator's control action during the ascending phase:
    /// merge edges, enqueue changed targets, join returns.
    fn propagate_ascending<L>(
        &mut self,
        stage_id: CompileStage,
        control: &AbstractContinuation<V>,
        return_value: &mut Option<V>,
    ) -> Result<(), E>
    where
        L: Dialect,
        S: HasStageInfo<L>,
    {
        match control {
            Continuation::Jump(target, args) => {
                self.merge_edge::<L>(stage_id, *target, args)?;
            }
            Continuation::Fork(targets) => {
                // Fork is one Jump per target, each merged independently.
                for (target, args) in targets {
                    self.merge_edge::<L>(stage_id, *target, args)?;
                }
            }
            Continuation::Return(value) => {
                *return_value = Some(match return_value.take() {
                    Some(existing) => existing.join(value),
                    None => value.clone(),
                });
            }
            Continuation::Continue | Continuation::Call { .. } => {}
            Continuation::Ext(never) => match *never {},
        }
        Ok(())
    }

    /// Merge one inbound edge into a target's entry state; enqueue the
    /// target when the state strictly grows.
    fn merge_edge<L>(&mut self, stage_id: CompileStage, target: Block, args: &[V]) -> Result<(), E>
    where
        L: Dialect,
        S: HasStageInfo<L>,
    {
        let target_args: Vec<SSAValue> = {
            let stage = self.stage_info::<L>(stage_id)?;
            target
                .arguments(stage)
                .iter()
                .map(|a| SSAValue::from(*a))
                .collect()
        };
        if target_args.len() != args.len() {
            return Err(InterpreterError::ArityMismatch {
                expected: target_args.len(),
                got: args.len(),
            }
            .into());
        }

        let widening = &self.widening;
        let frame = self
            .frames
            .last_mut()
            .ok_or_else(|| InterpreterError::NoFrame.into())?;
        let (values, fp) = frame.values_and_extra_mut();

        if !fp.block_args.contains_key(&target) {
            for (ssa, value) in target_args.iter().zip(args) {
                values.insert(*ssa, value.clone());
            }
            fp.block_args.insert(target, target_args);
            fp.enqueue(target);
            return Ok(());
        }

        let revisits = {
            let count = fp.revisits.entry(target).or_insert(0);
            *count += 1;
            *count
        };

        let mut changed = false;
        for (ssa, next) in target_args.iter().zip(args) {
            match values.get(ssa) {
                Some(prior) => {
                    let merged = widening.merge(prior, next, target, revisits);
                    if !prior.is_subseteq(&merged) || !next.is_subseteq(&merged) {
                        warn!(%target, "widen produced a value below its operands");
                        return Err(InterpreterError::DidNotConverge.into());
                    }
                    if !merged.is_subseteq(prior) {
                        changed = true;
                    }
                    values.insert(*ssa, merged);
                }
                None => {
                    values.insert(*ssa, next.clone());
                    changed = true;
                }
            }
        }
        if changed {
            fp.enqueue(target);
        }
        Ok(())
    }

    /// Narrow a block's entry state against the join of its recomputed
    /// inbound edges. Returns whether a strict refinement occurred.
    fn narrow_block_entry<L>(
        &mut self,
        stage_id: CompileStage,
        target: Block,
        joined_args: &[V],
    ) -> Result<bool, E>
    where
        L: Dialect,
        S: HasStageInfo<L>,
    {
        let target_args: Vec<SSAValue> = {
            let stage = self.stage_info::<L>(stage_id)?;
            target
                .arguments(stage)
                .iter()
                .map(|a| SSAValue::from(*a))
                .collect()
        };
        if target_args.len() != joined_args.len() {
            return Err(InterpreterError::ArityMismatch {
                expected: target_args.len(),
                got: joined_args.len(),
            }
            .into());
        }

        let frame = self
            .frames
            .last_mut()
            .ok_or_else(|| InterpreterError::NoFrame.into())?;
        let values = frame.values_mut();

        let mut changed = false;
        for (ssa, next) in target_args.iter().zip(joined_args) {
            let Some(prior) = values.get(ssa) else {
                continue;
            };
            let narrowed = prior.narrow(next);
            if !narrowed.is_subseteq(prior) {
                warn!(%target, "narrow produced a value above its left operand");
                return Err(InterpreterError::DidNotConverge.into());
            }
            if !prior.is_subseteq(&narrowed) {
                changed = true;
            }
            values.insert(*ssa, narrowed);
        }
        Ok(changed)
    }
}

/// Accumulate a terminator's outgoing edges into the per-target join map
/// used by the descending phase.
fn collect_edges<V: AbstractValue>(
    control: &AbstractContinuation<V>,
    inbound: &mut FxHashMap<Block, Vec<V>>,
    return_value: &mut Option<V>,
) {
    let mut add_edge = |target: Block, args: &[V]| {
        match inbound.get_mut(&target) {
            Some(existing) => {
                for (slot, next) in existing.iter_mut().zip(args) {
                    *slot = slot.join(next);
                }
            }
            None => {
                inbound.insert(target, args.to_vec());
            }
        }
    };
    match control {
        Continuation::Jump(target, args) => add_edge(*target, args),
        Continuation::Fork(targets) => {
            for (target, args) in targets {
                add_edge(*target, args);
            }
        }
        Continuation::Return(value) => {
            *return_value = Some(match return_value.take() {
                Some(existing) => existing.join(value),
                None => value.clone(),
            });
        }
        Continuation::Continue | Continuation::Call { .. } => {}
        Continuation::Ext(never) => match *never {},
    }
}
