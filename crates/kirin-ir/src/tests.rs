//! Crate-level tests over a small hand-written dialect.

use std::ops::ControlFlow;

use crate::dialect::HasOperands;
use crate::lattice::{HasBottom, HasTop, Lattice};
use crate::node::{
    GetInfo, ResultValue, SSAKind, SSAValue, SpecializedFunction, Successor, Use,
};
use crate::signature::{LatticeSemantics, Signature};
use crate::stage::StageInfo;
use crate::walk::{WalkAction, walk_region};
use crate::{
    Dialect, DispatchError, HasCallTarget, IrError, IsConstant, IsPure, IsSpeculatable,
    IsTerminator, Pipeline, StagedConflictKind, StagedNamePolicy,
};

// ---------------------------------------------------------------------------
// Test dialect
// ---------------------------------------------------------------------------

/// Numeric type lattice: `Never ⊑ Pos ⊑ Int ⊑ Number ⊑ Any`,
/// `Float ⊑ Number`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub(crate) enum NumTy {
    #[default]
    Any,
    Number,
    Int,
    Pos,
    Float,
    Never,
}

impl Lattice for NumTy {
    fn join(&self, other: &Self) -> Self {
        if self.is_subseteq(other) {
            *other
        } else if other.is_subseteq(self) {
            *self
        } else {
            NumTy::Number
        }
    }

    fn meet(&self, other: &Self) -> Self {
        if self.is_subseteq(other) {
            *self
        } else if other.is_subseteq(self) {
            *other
        } else {
            NumTy::Never
        }
    }

    fn is_subseteq(&self, other: &Self) -> bool {
        use NumTy::*;
        matches!(
            (self, other),
            (Never, _)
                | (_, Any)
                | (Pos, Int | Number)
                | (Int, Number)
                | (Float, Number)
        ) || self == other
    }
}

impl HasBottom for NumTy {
    fn bottom() -> Self {
        NumTy::Never
    }
}

impl HasTop for NumTy {
    fn top() -> Self {
        NumTy::Any
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum TestOp {
    Const {
        value: i64,
        result: ResultValue,
    },
    Add {
        lhs: SSAValue,
        rhs: SSAValue,
        result: ResultValue,
    },
    Jump {
        target: Successor,
        args: Vec<SSAValue>,
    },
    Return {
        value: SSAValue,
    },
    Call {
        callee: SpecializedFunction,
        args: Vec<SSAValue>,
        result: ResultValue,
    },
}

impl<'a> crate::HasOperands<'a> for TestOp {
    type Iter = Box<dyn Iterator<Item = &'a SSAValue> + 'a>;

    fn operands(&'a self) -> Self::Iter {
        match self {
            TestOp::Const { .. } => Box::new(std::iter::empty()),
            TestOp::Add { lhs, rhs, .. } => Box::new([lhs, rhs].into_iter()),
            TestOp::Jump { args, .. } => Box::new(args.iter()),
            TestOp::Return { value } => Box::new(std::iter::once(value)),
            TestOp::Call { args, .. } => Box::new(args.iter()),
        }
    }
}

impl<'a> crate::HasOperandsMut<'a> for TestOp {
    type IterMut = Box<dyn Iterator<Item = &'a mut SSAValue> + 'a>;

    fn operands_mut(&'a mut self) -> Self::IterMut {
        match self {
            TestOp::Const { .. } => Box::new(std::iter::empty()),
            TestOp::Add { lhs, rhs, .. } => Box::new([lhs, rhs].into_iter()),
            TestOp::Jump { args, .. } => Box::new(args.iter_mut()),
            TestOp::Return { value } => Box::new(std::iter::once(value)),
            TestOp::Call { args, .. } => Box::new(args.iter_mut()),
        }
    }
}

impl<'a> crate::HasResults<'a> for TestOp {
    type Iter = Box<dyn Iterator<Item = &'a ResultValue> + 'a>;

    fn results(&'a self) -> Self::Iter {
        match self {
            TestOp::Const { result, .. }
            | TestOp::Add { result, .. }
            | TestOp::Call { result, .. } => Box::new(std::iter::once(result)),
            TestOp::Jump { .. } | TestOp::Return { .. } => Box::new(std::iter::empty()),
        }
    }
}

impl<'a> crate::HasResultsMut<'a> for TestOp {
    type IterMut = Box<dyn Iterator<Item = &'a mut ResultValue> + 'a>;

    fn results_mut(&'a mut self) -> Self::IterMut {
        match self {
            TestOp::Const { result, .. }
            | TestOp::Add { result, .. }
            | TestOp::Call { result, .. } => Box::new(std::iter::once(result)),
            TestOp::Jump { .. } | TestOp::Return { .. } => Box::new(std::iter::empty()),
        }
    }
}

impl<'a> crate::HasSuccessors<'a> for TestOp {
    type Iter = Box<dyn Iterator<Item = &'a Successor> + 'a>;

    fn successors(&'a self) -> Self::Iter {
        match self {
            TestOp::Jump { target, .. } => Box::new(std::iter::once(target)),
            _ => Box::new(std::iter::empty()),
        }
    }
}

impl<'a> crate::HasSuccessorsMut<'a> for TestOp {
    type IterMut = Box<dyn Iterator<Item = &'a mut Successor> + 'a>;

    fn successors_mut(&'a mut self) -> Self::IterMut {
        match self {
            TestOp::Jump { target, .. } => Box::new(std::iter::once(target)),
            _ => Box::new(std::iter::empty()),
        }
    }
}

crate::empty_dialect_views!(TestOp: regions);

impl IsTerminator for TestOp {
    fn is_terminator(&self) -> bool {
        matches!(self, TestOp::Jump { .. } | TestOp::Return { .. })
    }
}

impl IsConstant for TestOp {
    fn is_constant(&self) -> bool {
        matches!(self, TestOp::Const { .. })
    }
}

impl IsPure for TestOp {
    fn is_pure(&self) -> bool {
        !matches!(self, TestOp::Call { .. })
    }
}

impl IsSpeculatable for TestOp {
    fn is_speculatable(&self) -> bool {
        self.is_pure() && !self.is_terminator()
    }
}

impl HasCallTarget for TestOp {
    fn call_target(&self) -> Option<SpecializedFunction> {
        match self {
            TestOp::Call { callee, .. } => Some(*callee),
            _ => None,
        }
    }
}

impl Dialect for TestOp {
    type Type = NumTy;
}

fn op_const(stage: &mut StageInfo<TestOp>, value: i64) -> (crate::Statement, ResultValue) {
    let result = stage.result_value(NumTy::Int);
    let stmt = stage.statement(TestOp::Const { value, result }).unwrap();
    (stmt, result)
}

fn op_add(
    stage: &mut StageInfo<TestOp>,
    lhs: impl Into<SSAValue>,
    rhs: impl Into<SSAValue>,
) -> (crate::Statement, ResultValue) {
    let result = stage.result_value(NumTy::Int);
    let stmt = stage
        .statement(TestOp::Add {
            lhs: lhs.into(),
            rhs: rhs.into(),
            result,
        })
        .unwrap();
    (stmt, result)
}

fn op_return(stage: &mut StageInfo<TestOp>, value: impl Into<SSAValue>) -> crate::Statement {
    stage
        .statement(TestOp::Return {
            value: value.into(),
        })
        .unwrap()
}

fn sig(params: Vec<NumTy>, ret: NumTy) -> Signature<NumTy> {
    Signature::simple(params, ret)
}

// ---------------------------------------------------------------------------
// Structural construction
// ---------------------------------------------------------------------------

#[test]
fn statement_records_uses_and_result_kinds() {
    let mut stage: StageInfo<TestOp> = StageInfo::new();
    let (c, cv) = op_const(&mut stage, 1);
    let (a, av) = op_add(&mut stage, cv, cv);

    let kind = SSAValue::from(cv).expect_info(&stage).kind();
    assert_eq!(kind, SSAKind::Result(c, 0));
    assert_eq!(SSAValue::from(av).expect_info(&stage).kind(), SSAKind::Result(a, 0));

    let uses = SSAValue::from(cv).expect_info(&stage).uses();
    assert_eq!(uses.len(), 2);
    assert!(uses.contains(&Use { stmt: a, operand_index: 0 }));
    assert!(uses.contains(&Use { stmt: a, operand_index: 1 }));
}

#[test]
fn block_builder_orders_statements_and_terminator() {
    let mut stage: StageInfo<TestOp> = StageInfo::new();
    let (c0, v0) = op_const(&mut stage, 1);
    let (c1, v1) = op_add(&mut stage, v0, v0);
    let ret = op_return(&mut stage, v1);

    let block = stage
        .block()
        .argument(NumTy::Int)
        .stmt(c0)
        .stmt(c1)
        .terminator(ret)
        .finish()
        .unwrap();

    let stmts: Vec<_> = block.statements(&stage).collect();
    assert_eq!(stmts, vec![c0, c1]);
    assert_eq!(block.terminator(&stage), Some(ret));
    assert_eq!(block.arguments(&stage).len(), 1);
    assert_eq!(c0.parent(&stage), Some(block));
    assert_eq!(ret.parent(&stage), Some(block));

    let arg = block.argument(&stage, 0);
    assert_eq!(
        SSAValue::from(arg).expect_info(&stage).kind(),
        SSAKind::BlockArgument(block, 0)
    );
}

#[test]
fn terminator_in_body_is_rejected() {
    let mut stage: StageInfo<TestOp> = StageInfo::new();
    let (c0, v0) = op_const(&mut stage, 1);
    let ret = op_return(&mut stage, v0);
    let err = stage.block().stmt(ret).terminator(c0).finish().unwrap_err();
    assert!(matches!(err, IrError::InvalidTerminator(s) if s == ret));
}

#[test]
fn second_terminator_is_rejected() {
    let mut stage: StageInfo<TestOp> = StageInfo::new();
    let (_c0, v0) = op_const(&mut stage, 1);
    let ret0 = op_return(&mut stage, v0);
    let ret1 = op_return(&mut stage, v0);
    let block = stage.block().terminator(ret0).finish().unwrap();
    let err = stage.append_statement(block, ret1).unwrap_err();
    assert!(matches!(err, IrError::InvalidTerminator(s) if s == ret1));
}

#[test]
fn insert_before_and_after_maintain_links() {
    let mut stage: StageInfo<TestOp> = StageInfo::new();
    let (a, va) = op_const(&mut stage, 1);
    let (c, _) = op_add(&mut stage, va, va);
    let ret = op_return(&mut stage, va);
    let block = stage.block().stmt(a).stmt(c).terminator(ret).finish().unwrap();

    let (b, _) = op_const(&mut stage, 2);
    stage.insert_before(c, b).unwrap();
    let (d, _) = op_const(&mut stage, 3);
    stage.insert_after(c, d).unwrap();
    let (e, _) = op_const(&mut stage, 4);
    stage.insert_before(ret, e).unwrap();

    let stmts: Vec<_> = block.statements(&stage).collect();
    assert_eq!(stmts, vec![a, b, c, d, e]);
    assert_eq!(b.prev(&stage), Some(a));
    assert_eq!(b.next(&stage), Some(c));
}

#[test]
fn remove_statement_unlinks() {
    let mut stage: StageInfo<TestOp> = StageInfo::new();
    let (a, va) = op_const(&mut stage, 1);
    let (b, _) = op_const(&mut stage, 2);
    let (c, _) = op_const(&mut stage, 3);
    let ret = op_return(&mut stage, va);
    let block = stage
        .block()
        .stmts([a, b, c])
        .terminator(ret)
        .finish()
        .unwrap();

    stage.remove_statement(b).unwrap();
    let stmts: Vec<_> = block.statements(&stage).collect();
    assert_eq!(stmts, vec![a, c]);
    assert_eq!(b.parent(&stage), None);
    // Removed, not erased: the statement stays live.
    assert!(stage.statement_arena().is_live(b));

    let err = stage.remove_statement(b).unwrap_err();
    assert!(matches!(err, IrError::OrphanStatement(s) if s == b));
}

#[test]
fn region_builder_sets_entry_and_parents() {
    let mut stage: StageInfo<TestOp> = StageInfo::new();
    let (_c, v) = op_const(&mut stage, 1);
    let r0 = op_return(&mut stage, v);
    let r1 = op_return(&mut stage, v);
    let b0 = stage.block().terminator(r0).finish().unwrap();
    let b1 = stage.block().terminator(r1).finish().unwrap();
    let region = stage.region().block(b0).block(b1).finish().unwrap();

    assert_eq!(region.entry_block(&stage), Some(b0));
    let blocks: Vec<_> = region.blocks(&stage).collect();
    assert_eq!(blocks, vec![b0, b1]);
    assert_eq!(b0.parent(&stage), Some(region));

    // A block cannot belong to two regions.
    let err = stage.region().block(b0).finish().unwrap_err();
    assert!(matches!(err, IrError::BlockAlreadyOwned { block, .. } if block == b0));
}

// ---------------------------------------------------------------------------
// Rewrites
// ---------------------------------------------------------------------------

#[test]
fn replace_all_uses_moves_use_tokens() {
    let mut stage: StageInfo<TestOp> = StageInfo::new();
    let (_c0, v0) = op_const(&mut stage, 1);
    let (_c1, v1) = op_const(&mut stage, 2);
    let (add, _) = op_add(&mut stage, v0, v0);

    stage.replace_all_uses_with(v0, v1).unwrap();

    assert!(SSAValue::from(v0).expect_info(&stage).uses().is_empty());
    assert_eq!(SSAValue::from(v1).expect_info(&stage).uses().len(), 2);
    let operands: Vec<SSAValue> = add.expect_info(&stage).definition().operands().copied().collect();
    assert_eq!(operands, vec![SSAValue::from(v1), SSAValue::from(v1)]);
}

#[test]
fn replace_statement_swaps_occupancy_and_uses() {
    let mut stage: StageInfo<TestOp> = StageInfo::new();
    let (old, vo) = op_const(&mut stage, 1);
    let (user, _) = op_add(&mut stage, vo, vo);
    let ret = op_return(&mut stage, vo);
    let block = stage.block().stmt(old).stmt(user).terminator(ret).finish().unwrap();

    let (new, vn) = op_const(&mut stage, 42);
    stage.replace_statement(old, new).unwrap();

    let stmts: Vec<_> = block.statements(&stage).collect();
    assert_eq!(stmts, vec![new, user]);
    assert_eq!(old.parent(&stage), None);
    // Both the add and the return now read the new constant.
    assert_eq!(SSAValue::from(vn).expect_info(&stage).uses().len(), 3);
    assert!(SSAValue::from(vo).expect_info(&stage).uses().is_empty());
}

#[test]
fn erase_statement_clears_uses_and_results() {
    let mut stage: StageInfo<TestOp> = StageInfo::new();
    let (c0, v0) = op_const(&mut stage, 1);
    let (add, va) = op_add(&mut stage, v0, v0);
    let ret = op_return(&mut stage, v0);
    let _block = stage.block().stmt(c0).stmt(add).terminator(ret).finish().unwrap();

    stage.erase_statement(add).unwrap();

    assert!(!stage.statement_arena().is_live(add));
    assert!(!stage.ssa_arena().is_live(SSAValue::from(va)));
    // Only the return still reads v0.
    let uses = SSAValue::from(v0).expect_info(&stage).uses();
    assert_eq!(uses.len(), 1);
    assert!(uses.contains(&Use { stmt: ret, operand_index: 0 }));
}

#[test]
fn compact_statements_remaps_all_references() {
    let mut stage: StageInfo<TestOp> = StageInfo::new();
    let (c0, v0) = op_const(&mut stage, 1);
    let (dead, _) = op_add(&mut stage, v0, v0);
    let (live, vl) = op_add(&mut stage, v0, v0);
    let ret = op_return(&mut stage, vl);
    let block = stage
        .block()
        .stmt(c0)
        .stmt(dead)
        .stmt(live)
        .terminator(ret)
        .finish()
        .unwrap();

    stage.erase_statement(dead).unwrap();
    let map = stage.compact_statements();

    assert_eq!(map.remap(dead), None);
    let new_live = map.remap(live).unwrap();
    let new_ret = map.remap(ret).unwrap();

    let stmts: Vec<_> = block.statements(&stage).collect();
    assert_eq!(stmts, vec![map.remap(c0).unwrap(), new_live]);
    assert_eq!(block.terminator(&stage), Some(new_ret));
    assert_eq!(
        SSAValue::from(vl).expect_info(&stage).kind(),
        SSAKind::Result(new_live, 0)
    );
    assert!(
        SSAValue::from(v0)
            .expect_info(&stage)
            .uses()
            .contains(&Use { stmt: new_live, operand_index: 0 })
    );
    assert!(crate::validation::validate_use_chains(&stage).is_ok());
}

#[test]
fn compact_ssa_values_rewrites_payloads() {
    let mut stage: StageInfo<TestOp> = StageInfo::new();
    let dead = stage.result_value(NumTy::Int);
    let (_c0, v0) = op_const(&mut stage, 1);
    let (add, va) = op_add(&mut stage, v0, v0);

    stage.ssas.mark_deleted(SSAValue::from(dead));
    let map = stage.compact_ssa_values();

    let new_v0 = map.remap(SSAValue::from(v0)).unwrap();
    let operands: Vec<SSAValue> = add.expect_info(&stage).definition().operands().copied().collect();
    assert_eq!(operands, vec![new_v0, new_v0]);
    let new_va = map.remap(SSAValue::from(va)).unwrap();
    assert_eq!(new_va.expect_info(&stage).id(), new_va);
}

// ---------------------------------------------------------------------------
// Staged functions, specialization, invalidation
// ---------------------------------------------------------------------------

fn const_body(stage: &mut StageInfo<TestOp>, value: i64) -> crate::Region {
    let (c, v) = op_const(stage, value);
    let ret = op_return(stage, v);
    let block = stage.block().stmt(c).terminator(ret).finish().unwrap();
    stage.region().block(block).finish().unwrap()
}

#[test]
fn single_interface_rejects_signature_mismatch() {
    let mut pipeline: Pipeline<StageInfo<TestOp>> = Pipeline::new();
    let foo = pipeline.intern("foo");
    let stage = pipeline.add_stage(StageInfo::new());
    let info = pipeline.with_stage_mut::<TestOp>(stage).unwrap();

    info.staged_function()
        .name(foo)
        .signature(sig(vec![NumTy::Int], NumTy::Int))
        .finish()
        .unwrap();

    let conflict = info
        .staged_function()
        .name(foo)
        .signature(sig(vec![NumTy::Float], NumTy::Float))
        .finish()
        .unwrap_err();
    assert_eq!(conflict.kind, StagedConflictKind::SignatureMismatch);
}

#[test]
fn multiple_dispatch_allows_distinct_signatures() {
    let mut pipeline: Pipeline<StageInfo<TestOp>> = Pipeline::new();
    let foo = pipeline.intern("foo");
    let stage = pipeline.add_stage(StageInfo::new());
    let info = pipeline.with_stage_mut::<TestOp>(stage).unwrap();
    info.set_staged_name_policy(StagedNamePolicy::MultipleDispatch);

    info.staged_function()
        .name(foo)
        .signature(sig(vec![NumTy::Int], NumTy::Int))
        .finish()
        .unwrap();
    info.staged_function()
        .name(foo)
        .signature(sig(vec![NumTy::Float], NumTy::Float))
        .finish()
        .unwrap();

    // Exact duplicates still conflict.
    let conflict = info
        .staged_function()
        .name(foo)
        .signature(sig(vec![NumTy::Int], NumTy::Int))
        .finish()
        .unwrap_err();
    assert_eq!(conflict.kind, StagedConflictKind::DuplicateSignature);
}

#[test]
fn specialize_conflict_and_redefinition() {
    let mut stage: StageInfo<TestOp> = StageInfo::new();
    let staged = stage
        .staged_function()
        .signature(sig(vec![NumTy::Int, NumTy::Int], NumTy::Int))
        .finish()
        .unwrap();

    let body0 = const_body(&mut stage, 1);
    let first = stage.specialize(staged).body(body0).finish().unwrap();

    let body1 = const_body(&mut stage, 2);
    let conflict = stage.specialize(staged).body(body1).finish().unwrap_err();
    assert_eq!(conflict.conflicting, vec![first]);

    let second = stage.redefine_specialization(conflict);
    assert_ne!(first, second);
    assert!(first.expect_info(&stage).is_invalidated());
    assert!(!second.expect_info(&stage).is_invalidated());
    // The invalidated entry stays addressable.
    assert_eq!(first.expect_info(&stage).body(), body0);
}

#[test]
fn call_sites_register_backedges() {
    let mut stage: StageInfo<TestOp> = StageInfo::new();
    let staged = stage.staged_function().finish().unwrap();
    let body = const_body(&mut stage, 7);
    let spec = stage.specialize(staged).body(body).finish().unwrap();

    let result = stage.result_value(NumTy::Int);
    let call = stage
        .statement(TestOp::Call {
            callee: spec,
            args: vec![],
            result,
        })
        .unwrap();
    let ret = op_return(&mut stage, result);
    let _caller_block = stage.block().stmt(call).terminator(ret).finish().unwrap();

    assert!(spec.expect_info(&stage).backedges().contains(&call));
    assert!(staged.expect_info(&stage).backedges().contains(&call));

    stage.erase_statement(call).unwrap();
    assert!(!spec.expect_info(&stage).backedges().contains(&call));
    assert!(!staged.expect_info(&stage).backedges().contains(&call));
}

#[test]
fn lattice_dispatch_picks_most_specific() {
    let mut stage: StageInfo<TestOp> = StageInfo::new();
    let staged = stage
        .staged_function()
        .signature(sig(vec![NumTy::Number, NumTy::Number], NumTy::Number))
        .finish()
        .unwrap();
    let int_body = const_body(&mut stage, 0);
    let int_spec = stage
        .specialize(staged)
        .signature(sig(vec![NumTy::Int, NumTy::Int], NumTy::Int))
        .body(int_body)
        .finish()
        .unwrap();
    let pos_body = const_body(&mut stage, 1);
    let pos_spec = stage
        .specialize(staged)
        .signature(sig(vec![NumTy::Pos, NumTy::Pos], NumTy::Pos))
        .body(pos_body)
        .finish()
        .unwrap();

    let info = staged.expect_info(&stage);

    let (chosen, ()) = info
        .resolve::<LatticeSemantics<NumTy>>(&sig(vec![NumTy::Pos, NumTy::Pos], NumTy::Pos))
        .unwrap();
    assert_eq!(chosen, pos_spec);

    let (chosen, ()) = info
        .resolve::<LatticeSemantics<NumTy>>(&sig(vec![NumTy::Int, NumTy::Pos], NumTy::Int))
        .unwrap();
    assert_eq!(chosen, int_spec);

    let err = info
        .resolve::<LatticeSemantics<NumTy>>(&sig(vec![NumTy::Float, NumTy::Float], NumTy::Float))
        .unwrap_err();
    assert_eq!(err, DispatchError::NoMatch);
}

#[test]
fn ambiguous_dispatch_is_set_valued() {
    let mut stage: StageInfo<TestOp> = StageInfo::new();
    let staged = stage
        .staged_function()
        .signature(sig(vec![NumTy::Number], NumTy::Number))
        .finish()
        .unwrap();
    // Int and Float are incomparable; a Pos call fits neither, a Never
    // call fits both without either dominating.
    let b0 = const_body(&mut stage, 0);
    let int_spec = stage
        .specialize(staged)
        .signature(sig(vec![NumTy::Int], NumTy::Number))
        .body(b0)
        .finish()
        .unwrap();
    let b1 = const_body(&mut stage, 1);
    let float_spec = stage
        .specialize(staged)
        .signature(sig(vec![NumTy::Float], NumTy::Number))
        .body(b1)
        .finish()
        .unwrap();

    let info = staged.expect_info(&stage);
    let err = info
        .resolve::<LatticeSemantics<NumTy>>(&sig(vec![NumTy::Never], NumTy::Never))
        .unwrap_err();
    assert_eq!(err, DispatchError::Ambiguous(vec![int_spec, float_spec]));
}

#[test]
fn pipeline_function_is_create_or_return() {
    let mut pipeline: Pipeline<StageInfo<TestOp>> = Pipeline::new();
    let f0 = pipeline.function("main");
    let f1 = pipeline.function("main");
    let f2 = pipeline.function("other");
    assert_eq!(f0, f1);
    assert_ne!(f0, f2);

    assert_eq!(pipeline.resolve_function("main"), Ok(f0));
    assert!(matches!(
        pipeline.resolve_function("missing"),
        Err(IrError::UnknownSymbol(name)) if name == "missing"
    ));

    let stage = pipeline.add_stage(StageInfo::new());
    let staged = pipeline
        .staged_function::<TestOp>(f0, stage, Some(sig(vec![], NumTy::Int)))
        .unwrap();
    assert_eq!(
        pipeline.function_info(f0).unwrap().staged_at(stage),
        Some(staged)
    );
}

// ---------------------------------------------------------------------------
// Walk and validation
// ---------------------------------------------------------------------------

#[test]
fn walk_visits_in_block_order_with_early_exit() {
    let mut stage: StageInfo<TestOp> = StageInfo::new();
    let (c0, v0) = op_const(&mut stage, 1);
    let (c1, _) = op_add(&mut stage, v0, v0);
    let ret = op_return(&mut stage, v0);
    let block = stage.block().stmt(c0).stmt(c1).terminator(ret).finish().unwrap();
    let region = stage.region().block(block).finish().unwrap();

    let mut visited = Vec::new();
    let flow = walk_region::<_, ()>(&stage, region, &mut |stmt| {
        visited.push(stmt);
        ControlFlow::Continue(WalkAction::Advance)
    });
    assert!(flow.is_continue());
    assert_eq!(visited, vec![c0, c1, ret]);

    let mut count = 0;
    let flow = walk_region::<_, ()>(&stage, region, &mut |_| {
        count += 1;
        ControlFlow::Break(())
    });
    assert!(flow.is_break());
    assert_eq!(count, 1);
}

#[test]
fn validation_reports_all_shape_violations() {
    let mut stage: StageInfo<TestOp> = StageInfo::new();
    let (c0, v0) = op_const(&mut stage, 1);
    // Block with no terminator.
    let block = stage.block().stmt(c0).finish().unwrap();
    let region = stage.region().block(block).finish().unwrap();

    let report = crate::validation::validate_region(&stage, region);
    assert!(!report.is_ok());
    assert!(report
        .violations
        .iter()
        .any(|v| matches!(v, crate::Violation::MissingTerminator { .. })));

    // Jump to a block in a different region.
    let foreign_ret = op_return(&mut stage, v0);
    let foreign = stage.block().terminator(foreign_ret).finish().unwrap();
    let _foreign_region = stage.region().block(foreign).finish().unwrap();

    let jump = stage
        .statement(TestOp::Jump {
            target: foreign.into(),
            args: vec![],
        })
        .unwrap();
    stage.append_statement(block, jump).unwrap();
    let report = crate::validation::validate_region(&stage, region);
    assert!(report
        .violations
        .iter()
        .any(|v| matches!(v, crate::Violation::CrossRegionSuccessor { .. })));
}

#[test]
fn validation_detects_stale_use_chain() {
    let mut stage: StageInfo<TestOp> = StageInfo::new();
    let (_c0, v0) = op_const(&mut stage, 1);
    let (add, _) = op_add(&mut stage, v0, v0);

    // Corrupt the use chain by hand.
    SSAValue::from(v0)
        .expect_info_mut(&mut stage)
        .uses_mut()
        .insert(Use { stmt: add, operand_index: 9 });

    let report = crate::validation::validate_use_chains(&stage);
    assert!(report
        .violations
        .iter()
        .any(|v| matches!(v, crate::Violation::StaleUse { .. })));
}
