//! A small SSA-CFG language used by the interpreter test suites.
//!
//! Integer constants and arithmetic, comparison, jumps, two branch
//! forms, returns, and three call forms: a pre-resolved same-stage call,
//! a pre-resolved cross-stage call, and a function call resolved at
//! interpret time against the callee's staged entry.
//!
//! The transfer functions are written once against [`NumericValue`] and
//! [`BranchCondition`], so the same dialect executes under the concrete
//! driver (over `i64`) and the abstract driver (over
//! [`Interval`](crate::Interval)).

use kirin_interp::{
    Args, BranchCondition, Continuation, Interpretable, Interpreter, InterpreterError,
};
use kirin_ir::{
    Block, CompileStage, Dialect, DispatchError, Function, GetInfo, HasBottom, HasStageInfo,
    HasTop, IsConstant, IsPure, IsSpeculatable, IsTerminator, Lattice, ResultValue, SSAValue,
    SpecializedFunction, StageInfo, Statement, Successor, forward_dialect,
};

use crate::interval::{Bound, Interval, interval_add, interval_mul, interval_sub};

// ---------------------------------------------------------------------------
// Type attribute
// ---------------------------------------------------------------------------

/// Numeric type lattice:
/// `Never ⊑ PositiveInt ⊑ Int ⊑ Number ⊑ Any`, `Float ⊑ Number`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum NumberType {
    #[default]
    Any,
    Number,
    Int,
    PositiveInt,
    Float,
    Never,
}

impl Lattice for NumberType {
    fn join(&self, other: &Self) -> Self {
        if self.is_subseteq(other) {
            *other
        } else if other.is_subseteq(self) {
            *self
        } else {
            NumberType::Number
        }
    }

    fn meet(&self, other: &Self) -> Self {
        if self.is_subseteq(other) {
            *self
        } else if other.is_subseteq(self) {
            *other
        } else {
            NumberType::Never
        }
    }

    fn is_subseteq(&self, other: &Self) -> bool {
        use NumberType::*;
        matches!(
            (self, other),
            (Never, _)
                | (_, Any)
                | (PositiveInt, Int | Number)
                | (Int, Number)
                | (Float, Number)
        ) || self == other
    }
}

impl HasBottom for NumberType {
    fn bottom() -> Self {
        NumberType::Never
    }
}

impl HasTop for NumberType {
    fn top() -> Self {
        NumberType::Any
    }
}

// ---------------------------------------------------------------------------
// Value domains
// ---------------------------------------------------------------------------

/// Shared arithmetic surface for the concrete (`i64`) and abstract
/// ([`Interval`]) value domains.
pub trait NumericValue: Clone + Sized {
    fn from_const(value: i64) -> Self;
    fn num_add(&self, other: &Self) -> Self;
    fn num_sub(&self, other: &Self) -> Self;
    fn num_mul(&self, other: &Self) -> Self;
    /// `self < other`, encoded as 0/1.
    fn num_lt(&self, other: &Self) -> Self;
    /// Split `self` along a `self < bound` branch: values flowing to the
    /// taken edge and to the fall-through edge. The identity split is
    /// always sound.
    fn refine_lt(&self, bound: &Self) -> (Self, Self) {
        let _ = bound;
        (self.clone(), self.clone())
    }
}

impl NumericValue for i64 {
    fn from_const(value: i64) -> Self {
        value
    }

    fn num_add(&self, other: &Self) -> Self {
        self + other
    }

    fn num_sub(&self, other: &Self) -> Self {
        self - other
    }

    fn num_mul(&self, other: &Self) -> Self {
        self * other
    }

    fn num_lt(&self, other: &Self) -> Self {
        i64::from(self < other)
    }
}

impl NumericValue for Interval {
    fn from_const(value: i64) -> Self {
        Interval::constant(value)
    }

    fn num_add(&self, other: &Self) -> Self {
        interval_add(self, other)
    }

    fn num_sub(&self, other: &Self) -> Self {
        interval_sub(self, other)
    }

    fn num_mul(&self, other: &Self) -> Self {
        interval_mul(self, other)
    }

    fn num_lt(&self, other: &Self) -> Self {
        if self.is_empty() || other.is_empty() {
            return Interval::empty();
        }
        if self.hi.less_than(other.lo) {
            Interval::constant(1)
        } else if other.hi.less_eq(self.lo) {
            Interval::constant(0)
        } else {
            Interval::new(0, 1)
        }
    }

    fn refine_lt(&self, bound: &Self) -> (Self, Self) {
        let taken = match bound.hi {
            Bound::Finite(hi) => self.meet(&Interval::at_most(hi - 1)),
            Bound::PosInf => self.clone(),
            Bound::NegInf => Interval::empty(),
        };
        let fallthrough = match bound.lo {
            Bound::Finite(lo) => self.meet(&Interval::at_least(lo)),
            Bound::NegInf => self.clone(),
            Bound::PosInf => Interval::empty(),
        };
        (taken, fallthrough)
    }
}

// ---------------------------------------------------------------------------
// The dialect
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub enum TestLang {
    Const {
        value: i64,
        result: ResultValue,
    },
    Add {
        lhs: SSAValue,
        rhs: SSAValue,
        result: ResultValue,
    },
    Sub {
        lhs: SSAValue,
        rhs: SSAValue,
        result: ResultValue,
    },
    Mul {
        lhs: SSAValue,
        rhs: SSAValue,
        result: ResultValue,
    },
    Lt {
        lhs: SSAValue,
        rhs: SSAValue,
        result: ResultValue,
    },
    Jump {
        target: Successor,
        args: Vec<SSAValue>,
    },
    /// Fused compare-and-branch on `lhs < rhs`. In the abstract, edge
    /// arguments equal to `lhs` are refined by the branch constraint.
    BranchLt {
        lhs: SSAValue,
        rhs: SSAValue,
        then_dest: Successor,
        then_args: Vec<SSAValue>,
        else_dest: Successor,
        else_args: Vec<SSAValue>,
    },
    /// Branch on an already-computed condition value.
    CondBr {
        cond: SSAValue,
        then_dest: Successor,
        then_args: Vec<SSAValue>,
        else_dest: Successor,
        else_args: Vec<SSAValue>,
    },
    Return {
        value: SSAValue,
    },
    /// Call a specialization resolved at construction time, in the
    /// caller's own stage.
    Call {
        callee: SpecializedFunction,
        args: Vec<SSAValue>,
        result: ResultValue,
    },
    /// Call a specialization in another stage, resolved at construction
    /// time.
    CrossCall {
        callee: SpecializedFunction,
        stage: CompileStage,
        args: Vec<SSAValue>,
        result: ResultValue,
    },
    /// Call an abstract function at a stage, resolved at interpret time
    /// with the unique-or-error policy.
    FnCall {
        function: Function,
        stage: CompileStage,
        args: Vec<SSAValue>,
        result: ResultValue,
    },
}

impl<'a> kirin_ir::HasOperands<'a> for TestLang {
    type Iter = Box<dyn Iterator<Item = &'a SSAValue> + 'a>;

    fn operands(&'a self) -> Self::Iter {
        match self {
            TestLang::Const { .. } => Box::new(std::iter::empty()),
            TestLang::Add { lhs, rhs, .. }
            | TestLang::Sub { lhs, rhs, .. }
            | TestLang::Mul { lhs, rhs, .. }
            | TestLang::Lt { lhs, rhs, .. } => Box::new([lhs, rhs].into_iter()),
            TestLang::Jump { args, .. } => Box::new(args.iter()),
            TestLang::BranchLt {
                lhs,
                rhs,
                then_args,
                else_args,
                ..
            } => Box::new([lhs, rhs].into_iter().chain(then_args).chain(else_args)),
            TestLang::CondBr {
                cond,
                then_args,
                else_args,
                ..
            } => Box::new(std::iter::once(cond).chain(then_args).chain(else_args)),
            TestLang::Return { value } => Box::new(std::iter::once(value)),
            TestLang::Call { args, .. }
            | TestLang::CrossCall { args, .. }
            | TestLang::FnCall { args, .. } => Box::new(args.iter()),
        }
    }
}

impl<'a> kirin_ir::HasOperandsMut<'a> for TestLang {
    type IterMut = Box<dyn Iterator<Item = &'a mut SSAValue> + 'a>;

    fn operands_mut(&'a mut self) -> Self::IterMut {
        match self {
            TestLang::Const { .. } => Box::new(std::iter::empty()),
            TestLang::Add { lhs, rhs, .. }
            | TestLang::Sub { lhs, rhs, .. }
            | TestLang::Mul { lhs, rhs, .. }
            | TestLang::Lt { lhs, rhs, .. } => Box::new([lhs, rhs].into_iter()),
            TestLang::Jump { args, .. } => Box::new(args.iter_mut()),
            TestLang::BranchLt {
                lhs,
                rhs,
                then_args,
                else_args,
                ..
            } => Box::new(
                [lhs, rhs]
                    .into_iter()
                    .chain(then_args.iter_mut())
                    .chain(else_args.iter_mut()),
            ),
            TestLang::CondBr {
                cond,
                then_args,
                else_args,
                ..
            } => Box::new(
                std::iter::once(cond)
                    .chain(then_args.iter_mut())
                    .chain(else_args.iter_mut()),
            ),
            TestLang::Return { value } => Box::new(std::iter::once(value)),
            TestLang::Call { args, .. }
            | TestLang::CrossCall { args, .. }
            | TestLang::FnCall { args, .. } => Box::new(args.iter_mut()),
        }
    }
}

impl<'a> kirin_ir::HasResults<'a> for TestLang {
    type Iter = Box<dyn Iterator<Item = &'a ResultValue> + 'a>;

    fn results(&'a self) -> Self::Iter {
        match self {
            TestLang::Const { result, .. }
            | TestLang::Add { result, .. }
            | TestLang::Sub { result, .. }
            | TestLang::Mul { result, .. }
            | TestLang::Lt { result, .. }
            | TestLang::Call { result, .. }
            | TestLang::CrossCall { result, .. }
            | TestLang::FnCall { result, .. } => Box::new(std::iter::once(result)),
            _ => Box::new(std::iter::empty()),
        }
    }
}

impl<'a> kirin_ir::HasResultsMut<'a> for TestLang {
    type IterMut = Box<dyn Iterator<Item = &'a mut ResultValue> + 'a>;

    fn results_mut(&'a mut self) -> Self::IterMut {
        match self {
            TestLang::Const { result, .. }
            | TestLang::Add { result, .. }
            | TestLang::Sub { result, .. }
            | TestLang::Mul { result, .. }
            | TestLang::Lt { result, .. }
            | TestLang::Call { result, .. }
            | TestLang::CrossCall { result, .. }
            | TestLang::FnCall { result, .. } => Box::new(std::iter::once(result)),
            _ => Box::new(std::iter::empty()),
        }
    }
}

impl<'a> kirin_ir::HasSuccessors<'a> for TestLang {
    type Iter = Box<dyn Iterator<Item = &'a Successor> + 'a>;

    fn successors(&'a self) -> Self::Iter {
        match self {
            TestLang::Jump { target, .. } => Box::new(std::iter::once(target)),
            TestLang::BranchLt {
                then_dest,
                else_dest,
                ..
            }
            | TestLang::CondBr {
                then_dest,
                else_dest,
                ..
            } => Box::new([then_dest, else_dest].into_iter()),
            _ => Box::new(std::iter::empty()),
        }
    }
}

impl<'a> kirin_ir::HasSuccessorsMut<'a> for TestLang {
    type IterMut = Box<dyn Iterator<Item = &'a mut Successor> + 'a>;

    fn successors_mut(&'a mut self) -> Self::IterMut {
        match self {
            TestLang::Jump { target, .. } => Box::new(std::iter::once(target)),
            TestLang::BranchLt {
                then_dest,
                else_dest,
                ..
            }
            | TestLang::CondBr {
                then_dest,
                else_dest,
                ..
            } => Box::new([then_dest, else_dest].into_iter()),
            _ => Box::new(std::iter::empty()),
        }
    }
}

kirin_ir::empty_dialect_views!(TestLang: regions);

impl IsTerminator for TestLang {
    fn is_terminator(&self) -> bool {
        matches!(
            self,
            TestLang::Jump { .. }
                | TestLang::BranchLt { .. }
                | TestLang::CondBr { .. }
                | TestLang::Return { .. }
        )
    }
}

impl IsConstant for TestLang {
    fn is_constant(&self) -> bool {
        matches!(self, TestLang::Const { .. })
    }
}

impl IsPure for TestLang {
    fn is_pure(&self) -> bool {
        matches!(
            self,
            TestLang::Const { .. }
                | TestLang::Add { .. }
                | TestLang::Sub { .. }
                | TestLang::Mul { .. }
                | TestLang::Lt { .. }
        )
    }
}

impl IsSpeculatable for TestLang {
    fn is_speculatable(&self) -> bool {
        self.is_pure()
    }
}

impl kirin_ir::HasCallTarget for TestLang {
    fn call_target(&self) -> Option<SpecializedFunction> {
        match self {
            TestLang::Call { callee, .. } => Some(*callee),
            _ => None,
        }
    }
}

impl Dialect for TestLang {
    type Type = NumberType;
}

/// A second language hosting the same statements behind a wrapper, for
/// pipelines whose stages carry different dialect types.
#[derive(Clone, Debug, PartialEq)]
pub enum AuxLang {
    Core(TestLang),
}

forward_dialect!(AuxLang { Core });

impl Dialect for AuxLang {
    type Type = NumberType;
}

impl From<TestLang> for AuxLang {
    fn from(inner: TestLang) -> Self {
        AuxLang::Core(inner)
    }
}

// ---------------------------------------------------------------------------
// Construction helpers
// ---------------------------------------------------------------------------

/// Languages the construction helpers below can target: anything built
/// from [`TestLang`] statements over [`NumberType`].
pub trait FromTestLang: Dialect<Type = NumberType> + From<TestLang> {}

impl<L: Dialect<Type = NumberType> + From<TestLang>> FromTestLang for L {}

pub fn op_const<L: FromTestLang>(stage: &mut StageInfo<L>, value: i64) -> (Statement, ResultValue) {
    let result = stage.result_value(NumberType::Int);
    let stmt = stage
        .statement(L::from(TestLang::Const { value, result }))
        .expect("const statement");
    (stmt, result)
}

pub fn op_add<L: FromTestLang>(
    stage: &mut StageInfo<L>,
    lhs: impl Into<SSAValue>,
    rhs: impl Into<SSAValue>,
) -> (Statement, ResultValue) {
    let result = stage.result_value(NumberType::Int);
    let stmt = stage
        .statement(L::from(TestLang::Add {
            lhs: lhs.into(),
            rhs: rhs.into(),
            result,
        }))
        .expect("add statement");
    (stmt, result)
}

pub fn op_sub<L: FromTestLang>(
    stage: &mut StageInfo<L>,
    lhs: impl Into<SSAValue>,
    rhs: impl Into<SSAValue>,
) -> (Statement, ResultValue) {
    let result = stage.result_value(NumberType::Int);
    let stmt = stage
        .statement(L::from(TestLang::Sub {
            lhs: lhs.into(),
            rhs: rhs.into(),
            result,
        }))
        .expect("sub statement");
    (stmt, result)
}

pub fn op_jump<L: FromTestLang>(
    stage: &mut StageInfo<L>,
    target: Block,
    args: Vec<SSAValue>,
) -> Statement {
    stage
        .statement(L::from(TestLang::Jump {
            target: target.into(),
            args,
        }))
        .expect("jump statement")
}

#[allow(clippy::too_many_arguments)]
pub fn op_branch_lt<L: FromTestLang>(
    stage: &mut StageInfo<L>,
    lhs: impl Into<SSAValue>,
    rhs: impl Into<SSAValue>,
    then_dest: Block,
    then_args: Vec<SSAValue>,
    else_dest: Block,
    else_args: Vec<SSAValue>,
) -> Statement {
    stage
        .statement(L::from(TestLang::BranchLt {
            lhs: lhs.into(),
            rhs: rhs.into(),
            then_dest: then_dest.into(),
            then_args,
            else_dest: else_dest.into(),
            else_args,
        }))
        .expect("branch statement")
}

pub fn op_return<L: FromTestLang>(
    stage: &mut StageInfo<L>,
    value: impl Into<SSAValue>,
) -> Statement {
    stage
        .statement(L::from(TestLang::Return {
            value: value.into(),
        }))
        .expect("return statement")
}

pub fn op_fn_call<L: FromTestLang>(
    stage: &mut StageInfo<L>,
    function: Function,
    target_stage: CompileStage,
    args: Vec<SSAValue>,
) -> (Statement, ResultValue) {
    let result = stage.result_value(NumberType::Int);
    let stmt = stage
        .statement(L::from(TestLang::FnCall {
            function,
            stage: target_stage,
            args,
            result,
        }))
        .expect("call statement");
    (stmt, result)
}

// ---------------------------------------------------------------------------
// Semantics
// ---------------------------------------------------------------------------

fn read_args<'ir, I: Interpreter<'ir>>(
    interp: &I,
    args: &[SSAValue],
) -> Result<Args<I::Value>, I::Error>
where
    I::Value: Clone,
{
    args.iter().map(|ssa| interp.read(*ssa)).collect()
}

/// Read one branch edge's arguments, substituting the refined condition
/// operand where it flows along the edge.
fn read_edge_args<'ir, I: Interpreter<'ir>>(
    interp: &I,
    args: &[SSAValue],
    refined: (SSAValue, &I::Value),
) -> Result<Args<I::Value>, I::Error>
where
    I::Value: Clone,
{
    args.iter()
        .map(|ssa| {
            if *ssa == refined.0 {
                Ok(refined.1.clone())
            } else {
                interp.read(*ssa)
            }
        })
        .collect()
}

impl<'ir, I> Interpretable<'ir, I> for TestLang
where
    I: Interpreter<'ir> + 'ir,
    I::Value: NumericValue + BranchCondition,
    I::Error: From<InterpreterError>,
    I::StageInfo: HasStageInfo<TestLang>,
{
    fn interpret(&self, interp: &mut I) -> Result<Continuation<I::Value, I::Ext>, I::Error> {
        match self {
            TestLang::Const { value, result } => {
                interp.write(*result, I::Value::from_const(*value))?;
                Ok(Continuation::Continue)
            }
            TestLang::Add { lhs, rhs, result } => {
                let value = interp.read(*lhs)?.num_add(&interp.read(*rhs)?);
                interp.write(*result, value)?;
                Ok(Continuation::Continue)
            }
            TestLang::Sub { lhs, rhs, result } => {
                let value = interp.read(*lhs)?.num_sub(&interp.read(*rhs)?);
                interp.write(*result, value)?;
                Ok(Continuation::Continue)
            }
            TestLang::Mul { lhs, rhs, result } => {
                let value = interp.read(*lhs)?.num_mul(&interp.read(*rhs)?);
                interp.write(*result, value)?;
                Ok(Continuation::Continue)
            }
            TestLang::Lt { lhs, rhs, result } => {
                let value = interp.read(*lhs)?.num_lt(&interp.read(*rhs)?);
                interp.write(*result, value)?;
                Ok(Continuation::Continue)
            }
            TestLang::Jump { target, args } => {
                Ok(Continuation::Jump(Block::from(*target), read_args(interp, args)?))
            }
            TestLang::BranchLt {
                lhs,
                rhs,
                then_dest,
                then_args,
                else_dest,
                else_args,
            } => {
                let left = interp.read(*lhs)?;
                let right = interp.read(*rhs)?;
                let (taken, fallthrough) = left.refine_lt(&right);
                match left.num_lt(&right).is_truthy() {
                    Some(true) => Ok(Continuation::Jump(
                        Block::from(*then_dest),
                        read_edge_args(interp, then_args, (*lhs, &taken))?,
                    )),
                    Some(false) => Ok(Continuation::Jump(
                        Block::from(*else_dest),
                        read_edge_args(interp, else_args, (*lhs, &fallthrough))?,
                    )),
                    None => Ok(Continuation::Fork(vec![
                        (
                            Block::from(*then_dest),
                            read_edge_args(interp, then_args, (*lhs, &taken))?,
                        ),
                        (
                            Block::from(*else_dest),
                            read_edge_args(interp, else_args, (*lhs, &fallthrough))?,
                        ),
                    ])),
                }
            }
            TestLang::CondBr {
                cond,
                then_dest,
                then_args,
                else_dest,
                else_args,
            } => match interp.read(*cond)?.is_truthy() {
                Some(true) => Ok(Continuation::Jump(
                    Block::from(*then_dest),
                    read_args(interp, then_args)?,
                )),
                Some(false) => Ok(Continuation::Jump(
                    Block::from(*else_dest),
                    read_args(interp, else_args)?,
                )),
                None => Ok(Continuation::Fork(vec![
                    (Block::from(*then_dest), read_args(interp, then_args)?),
                    (Block::from(*else_dest), read_args(interp, else_args)?),
                ])),
            },
            TestLang::Return { value } => Ok(Continuation::Return(interp.read(*value)?)),
            TestLang::Call {
                callee,
                args,
                result,
            } => Ok(Continuation::Call {
                callee: *callee,
                stage: interp.current_stage(),
                args: read_args(interp, args)?,
                result: *result,
            }),
            TestLang::CrossCall {
                callee,
                stage,
                args,
                result,
            } => Ok(Continuation::Call {
                callee: *callee,
                stage: *stage,
                args: read_args(interp, args)?,
                result: *result,
            }),
            TestLang::FnCall {
                function,
                stage,
                args,
                result,
            } => {
                let callee = resolve_unique::<I>(interp, *function, *stage)?;
                Ok(Continuation::Call {
                    callee,
                    stage: *stage,
                    args: read_args(interp, args)?,
                    result: *result,
                })
            }
        }
    }
}

/// Unique-or-error resolution of a function's specialization at a stage
/// hosting [`TestLang`].
fn resolve_unique<'ir, I>(
    interp: &I,
    function: Function,
    stage: CompileStage,
) -> Result<SpecializedFunction, I::Error>
where
    I: Interpreter<'ir> + 'ir,
    I::Error: From<InterpreterError>,
    I::StageInfo: HasStageInfo<TestLang>,
{
    let staged = interp
        .pipeline()
        .function_info(function)
        .and_then(|info| info.staged_at(stage))
        .ok_or(InterpreterError::MissingFunctionStageMapping { function, stage })?;
    let stage_meta = interp
        .pipeline()
        .stage(stage)
        .ok_or(InterpreterError::MissingStage(stage))?;
    let stage_info = <I::StageInfo as HasStageInfo<TestLang>>::try_stage_info(stage_meta)
        .ok_or(InterpreterError::StageMismatch { frame_stage: stage })?;
    let info = staged
        .get_info(stage_info)
        .ok_or(InterpreterError::MissingFunctionStageMapping { function, stage })?;

    let mut live = info
        .specializations()
        .iter()
        .filter(|spec| !spec.is_invalidated());
    match (live.next(), live.next()) {
        (Some(only), None) => Ok(only.id()),
        (None, _) => Err(InterpreterError::CallResolutionFailed {
            staged,
            inner: DispatchError::NoMatch,
        }
        .into()),
        (Some(first), Some(second)) => {
            let mut candidates = vec![first.id(), second.id()];
            candidates.extend(live.map(|spec| spec.id()));
            candidates.sort();
            Err(InterpreterError::CallResolutionFailed {
                staged,
                inner: DispatchError::Ambiguous(candidates),
            }
            .into())
        }
    }
}

impl<'ir, I> Interpretable<'ir, I> for AuxLang
where
    I: Interpreter<'ir> + 'ir,
    I::Value: NumericValue + BranchCondition,
    I::Error: From<InterpreterError>,
    I::StageInfo: HasStageInfo<TestLang> + HasStageInfo<AuxLang>,
{
    fn interpret(&self, interp: &mut I) -> Result<Continuation<I::Value, I::Ext>, I::Error> {
        match self {
            AuxLang::Core(inner) => inner.interpret(interp),
        }
    }
}
