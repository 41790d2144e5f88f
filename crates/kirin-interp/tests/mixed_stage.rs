//! Mixed-stage recursion through the dynamic driver, and the typed
//! driver's stage-mismatch contract.

use kirin_interp::{InterpreterError, StackInterpreter};
use kirin_ir::{
    CompileStage, Function, GlobalSymbol, HasStageInfo, Pipeline, Region, StageInfo, StageMeta,
};
use kirin_test_utils::lang::{
    op_branch_lt, op_const, op_fn_call, op_return, op_sub,
};
use kirin_test_utils::{AuxLang, NumberType, TestLang};

/// `f(n): if n < 1 { 0 } else { g(n - 1) }`, with `g` resolved at
/// another stage at interpret time.
fn build_f(stage: &mut StageInfo<TestLang>, g: Function, g_stage: CompileStage) -> Region {
    let (bz, vz) = op_const(stage, 0);
    let ret_base = op_return(stage, vz);
    let base = stage.block().stmt(bz).terminator(ret_base).finish().unwrap();

    let rec = stage.block().argument(NumberType::Int).finish().unwrap();
    let n_rec = rec.argument(stage, 0);
    let (c1, v1) = op_const(stage, 1);
    let (dec, n1) = op_sub(stage, n_rec, v1);
    let (call, r) = op_fn_call(stage, g, g_stage, vec![n1.into()]);
    let ret_rec = op_return(stage, r);
    stage.append_statement(rec, c1).unwrap();
    stage.append_statement(rec, dec).unwrap();
    stage.append_statement(rec, call).unwrap();
    stage.append_statement(rec, ret_rec).unwrap();

    let entry = stage.block().argument(NumberType::Int).finish().unwrap();
    let n = entry.argument(stage, 0);
    let (ce, ve) = op_const(stage, 1);
    let branch = op_branch_lt(stage, n, ve, base, vec![], rec, vec![n.into()]);
    stage.append_statement(entry, ce).unwrap();
    stage.append_statement(entry, branch).unwrap();

    stage
        .region()
        .blocks([entry, base, rec])
        .finish()
        .unwrap()
}

/// `wrap(n): target(n)`, forwarding the argument to a function at
/// another stage.
fn build_forwarder(
    stage: &mut StageInfo<TestLang>,
    target: Function,
    target_stage: CompileStage,
) -> Region {
    let entry = stage.block().argument(NumberType::Int).finish().unwrap();
    let n = entry.argument(stage, 0);
    let (call, r) = op_fn_call(stage, target, target_stage, vec![n.into()]);
    let ret = op_return(stage, r);
    stage.append_statement(entry, call).unwrap();
    stage.append_statement(entry, ret).unwrap();
    stage.region().block(entry).finish().unwrap()
}

/// Stages A, B, C: `f@A` calls `g@C`, `g` calls `h@B`, `h` calls `f@A`
/// with a smaller argument until the base case. The dynamic driver keeps
/// per-frame stage fidelity across the whole chain.
#[test]
fn cross_stage_recursion_completes_dynamically() {
    let mut pipeline: Pipeline<StageInfo<TestLang>> = Pipeline::new();
    let stage_a = pipeline.add_named_stage(StageInfo::new(), "a");
    let stage_b = pipeline.add_named_stage(StageInfo::new(), "b");
    let stage_c = pipeline.add_named_stage(StageInfo::new(), "c");
    pipeline.add_lowering_edge(stage_a, stage_b);
    pipeline.add_lowering_edge(stage_b, stage_c);

    let f = pipeline.function("f");
    let g = pipeline.function("g");
    let h = pipeline.function("h");

    let f_staged = pipeline
        .staged_function::<TestLang>(f, stage_a, None)
        .unwrap();
    let g_staged = pipeline
        .staged_function::<TestLang>(g, stage_c, None)
        .unwrap();
    let h_staged = pipeline
        .staged_function::<TestLang>(h, stage_b, None)
        .unwrap();

    let f_spec = {
        let stage = pipeline.with_stage_mut::<TestLang>(stage_a).unwrap();
        let body = build_f(stage, g, stage_c);
        stage.specialize(f_staged).body(body).finish().unwrap()
    };
    {
        let stage = pipeline.with_stage_mut::<TestLang>(stage_c).unwrap();
        let body = build_forwarder(stage, h, stage_b);
        stage.specialize(g_staged).body(body).finish().unwrap();
    }
    {
        let stage = pipeline.with_stage_mut::<TestLang>(stage_b).unwrap();
        let body = build_forwarder(stage, f, stage_a);
        stage.specialize(h_staged).body(body).finish().unwrap();
    }

    let mut interp: StackInterpreter<i64, _> = StackInterpreter::new(&pipeline, stage_a);
    let result = interp.call_dyn(f_spec, stage_a, &[5]).unwrap();
    assert_eq!(result, 0);
    assert_eq!(interp.frame_depth(), 0);
}

#[test]
fn missing_stage_mapping_is_reported() {
    let mut pipeline: Pipeline<StageInfo<TestLang>> = Pipeline::new();
    let stage_a = pipeline.add_stage(StageInfo::new());
    let stage_b = pipeline.add_stage(StageInfo::new());

    let f = pipeline.function("f");
    let callee = pipeline.function("callee");
    // The callee is staged at A only; the caller asks for it at B.
    let _callee_staged = pipeline
        .staged_function::<TestLang>(callee, stage_a, None)
        .unwrap();
    let f_staged = pipeline
        .staged_function::<TestLang>(f, stage_a, None)
        .unwrap();

    let f_spec = {
        let stage = pipeline.with_stage_mut::<TestLang>(stage_a).unwrap();
        let body = build_forwarder(stage, callee, stage_b);
        stage.specialize(f_staged).body(body).finish().unwrap()
    };

    let mut interp: StackInterpreter<i64, _> = StackInterpreter::new(&pipeline, stage_a);
    let err = interp.call_dyn(f_spec, stage_a, &[1]).unwrap_err();
    assert!(matches!(
        err,
        InterpreterError::MissingFunctionStageMapping { function, stage }
            if function == callee && stage == stage_b
    ));
}

// ---------------------------------------------------------------------------
// A pipeline whose stages host different dialect types
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum MixedStage {
    Main(StageInfo<TestLang>),
    Aux(StageInfo<AuxLang>),
}

impl StageMeta for MixedStage {
    type Languages = (TestLang, (AuxLang, ()));

    fn stage_name(&self) -> Option<GlobalSymbol> {
        match self {
            MixedStage::Main(info) => info.name(),
            MixedStage::Aux(info) => info.name(),
        }
    }

    fn set_stage_name(&mut self, name: Option<GlobalSymbol>) {
        match self {
            MixedStage::Main(info) => info.set_name(name),
            MixedStage::Aux(info) => info.set_name(name),
        }
    }

    fn stage_id(&self) -> Option<CompileStage> {
        match self {
            MixedStage::Main(info) => info.stage_id(),
            MixedStage::Aux(info) => info.stage_id(),
        }
    }

    fn set_stage_id(&mut self, id: Option<CompileStage>) {
        match self {
            MixedStage::Main(info) => info.set_stage_id(id),
            MixedStage::Aux(info) => info.set_stage_id(id),
        }
    }
}

impl HasStageInfo<TestLang> for MixedStage {
    fn try_stage_info(&self) -> Option<&StageInfo<TestLang>> {
        match self {
            MixedStage::Main(info) => Some(info),
            MixedStage::Aux(_) => None,
        }
    }

    fn try_stage_info_mut(&mut self) -> Option<&mut StageInfo<TestLang>> {
        match self {
            MixedStage::Main(info) => Some(info),
            MixedStage::Aux(_) => None,
        }
    }
}

impl HasStageInfo<AuxLang> for MixedStage {
    fn try_stage_info(&self) -> Option<&StageInfo<AuxLang>> {
        match self {
            MixedStage::Main(_) => None,
            MixedStage::Aux(info) => Some(info),
        }
    }

    fn try_stage_info_mut(&mut self) -> Option<&mut StageInfo<AuxLang>> {
        match self {
            MixedStage::Main(_) => None,
            MixedStage::Aux(info) => Some(info),
        }
    }
}

/// Build both stages: `main_fn` cross-calls a constant function hosted
/// in the aux stage's wrapped dialect.
fn build_mixed_pipeline() -> (
    Pipeline<MixedStage>,
    CompileStage,
    kirin_ir::SpecializedFunction,
) {
    let mut pipeline: Pipeline<MixedStage> = Pipeline::new();
    let main_stage = pipeline.add_named_stage(MixedStage::Main(StageInfo::new()), "main");
    let aux_stage = pipeline.add_named_stage(MixedStage::Aux(StageInfo::new()), "aux");

    let aux_spec = {
        let stage = pipeline.with_stage_mut::<AuxLang>(aux_stage).unwrap();
        let staged = stage.staged_function().finish().unwrap();
        let (c, v) = op_const(stage, 7);
        let ret = op_return(stage, v);
        let block = stage.block().stmt(c).terminator(ret).finish().unwrap();
        let region = stage.region().block(block).finish().unwrap();
        stage.specialize(staged).body(region).finish().unwrap()
    };

    let main_spec = {
        let stage = pipeline.with_stage_mut::<TestLang>(main_stage).unwrap();
        let staged = stage.staged_function().finish().unwrap();
        let result = stage.result_value(NumberType::Int);
        let call = stage
            .statement(TestLang::CrossCall {
                callee: aux_spec,
                stage: aux_stage,
                args: vec![],
                result,
            })
            .unwrap();
        let ret = op_return(stage, result);
        let block = stage.block().stmt(call).terminator(ret).finish().unwrap();
        let region = stage.region().block(block).finish().unwrap();
        stage.specialize(staged).body(region).finish().unwrap()
    };

    (pipeline, main_stage, main_spec)
}

/// The typed driver is pinned to one dialect: the first transition into
/// a stage hosting a different dialect is a stage mismatch.
#[test]
fn typed_driver_rejects_cross_dialect_transition() {
    let (pipeline, main_stage, main_spec) = build_mixed_pipeline();

    let mut interp: StackInterpreter<i64, MixedStage> =
        StackInterpreter::new(&pipeline, main_stage);
    let err = interp.call::<TestLang>(main_spec, &[]).unwrap_err();
    assert!(matches!(
        err,
        InterpreterError::StageMismatch { frame_stage } if frame_stage != main_stage
    ));
}

/// The dynamic driver routes each frame through its own stage's dialect,
/// including the wrapped one.
#[test]
fn dynamic_driver_crosses_dialect_boundaries() {
    let (pipeline, main_stage, main_spec) = build_mixed_pipeline();

    let mut interp: StackInterpreter<i64, MixedStage> =
        StackInterpreter::new(&pipeline, main_stage);
    let result = interp.call_dyn(main_spec, main_stage, &[]).unwrap();
    assert_eq!(result, 7);
}
