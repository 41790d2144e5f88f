//! Specialization dispatch under lattice semantics, and redefinition
//! with backedge-driven invalidation.

use kirin_interp::{InterpreterError, resolve_callee};
use kirin_ir::{
    DispatchError, GetInfo, LatticeSemantics, Pipeline, Region, Signature, StageInfo,
};
use kirin_test_utils::lang::{op_const, op_return};
use kirin_test_utils::{NumberType, TestLang};

fn sig(params: Vec<NumberType>, ret: NumberType) -> Signature<NumberType> {
    Signature::simple(params, ret)
}

fn const_body(stage: &mut StageInfo<TestLang>, value: i64) -> Region {
    let (c, v) = op_const(stage, value);
    let ret = op_return(stage, v);
    let block = stage.block().stmt(c).terminator(ret).finish().unwrap();
    stage.region().block(block).finish().unwrap()
}

/// `add` has staged signature `(Number, Number) → Number` with
/// specializations `(Int, Int) → Int` and
/// `(PositiveInt, PositiveInt) → PositiveInt`.
#[test]
fn lattice_dispatch_selects_most_specific_specialization() {
    let mut pipeline: Pipeline<StageInfo<TestLang>> = Pipeline::new();
    let stage_id = pipeline.add_stage(StageInfo::new());
    let add = pipeline.function("add");
    let staged = pipeline
        .staged_function::<TestLang>(
            add,
            stage_id,
            Some(sig(
                vec![NumberType::Number, NumberType::Number],
                NumberType::Number,
            )),
        )
        .unwrap();

    let stage = pipeline.with_stage_mut::<TestLang>(stage_id).unwrap();
    let int_body = const_body(stage, 0);
    let int_spec = stage
        .specialize(staged)
        .signature(sig(vec![NumberType::Int, NumberType::Int], NumberType::Int))
        .body(int_body)
        .finish()
        .unwrap();
    let pos_body = const_body(stage, 1);
    let pos_spec = stage
        .specialize(staged)
        .signature(sig(
            vec![NumberType::PositiveInt, NumberType::PositiveInt],
            NumberType::PositiveInt,
        ))
        .body(pos_body)
        .finish()
        .unwrap();

    // (PositiveInt, PositiveInt) → the PositiveInt specialization.
    let chosen = resolve_callee::<TestLang, LatticeSemantics<NumberType>, _>(
        &pipeline,
        add,
        stage_id,
        &sig(
            vec![NumberType::PositiveInt, NumberType::PositiveInt],
            NumberType::PositiveInt,
        ),
    )
    .unwrap();
    assert_eq!(chosen, pos_spec);

    // (Int, PositiveInt) → only the Int specialization applies.
    let chosen = resolve_callee::<TestLang, LatticeSemantics<NumberType>, _>(
        &pipeline,
        add,
        stage_id,
        &sig(vec![NumberType::Int, NumberType::PositiveInt], NumberType::Int),
    )
    .unwrap();
    assert_eq!(chosen, int_spec);

    // (Float, Float) → no match.
    let err = resolve_callee::<TestLang, LatticeSemantics<NumberType>, _>(
        &pipeline,
        add,
        stage_id,
        &sig(vec![NumberType::Float, NumberType::Float], NumberType::Float),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        InterpreterError::CallResolutionFailed {
            inner: DispatchError::NoMatch,
            ..
        }
    ));
}

/// Dispatch outcomes do not depend on insertion order among
/// non-dominating candidates.
#[test]
fn ambiguity_is_insertion_order_independent() {
    let outcomes: Vec<DispatchError> = [false, true]
        .into_iter()
        .map(|reversed| {
            let mut stage: StageInfo<TestLang> = StageInfo::new();
            let staged = stage
                .staged_function()
                .signature(sig(vec![NumberType::Number], NumberType::Number))
                .finish()
                .unwrap();
            let mut sigs = vec![
                sig(vec![NumberType::Int], NumberType::Number),
                sig(vec![NumberType::Float], NumberType::Number),
            ];
            if reversed {
                sigs.reverse();
            }
            for s in sigs {
                let body = const_body(&mut stage, 0);
                stage
                    .specialize(staged)
                    .signature(s)
                    .body(body)
                    .finish()
                    .unwrap();
            }
            // A Never call fits both; neither dominates.
            staged
                .expect_info(&stage)
                .resolve::<LatticeSemantics<NumberType>>(&sig(
                    vec![NumberType::Never],
                    NumberType::Never,
                ))
                .unwrap_err()
        })
        .collect();

    // The ambiguity set is id-sorted, so both insertion orders yield the
    // same set of candidate positions.
    match (&outcomes[0], &outcomes[1]) {
        (DispatchError::Ambiguous(a), DispatchError::Ambiguous(b)) => {
            assert_eq!(a.len(), 2);
            assert_eq!(a.len(), b.len());
        }
        other => panic!("expected two ambiguous outcomes, got {other:?}"),
    }
}

/// Redefining a duplicate specialization invalidates the old entry but
/// keeps it addressable; its backedges name the call sites that resolved
/// to it.
#[test]
fn redefinition_invalidates_but_keeps_backedges() {
    let mut stage: StageInfo<TestLang> = StageInfo::new();
    let int_sig = sig(vec![NumberType::Int, NumberType::Int], NumberType::Int);
    let staged = stage
        .staged_function()
        .signature(int_sig.clone())
        .finish()
        .unwrap();

    let body = const_body(&mut stage, 1);
    let old_spec = stage
        .specialize(staged)
        .signature(int_sig.clone())
        .body(body)
        .finish()
        .unwrap();

    // A caller resolves the old specialization and records a call site.
    let resolved = staged
        .expect_info(&stage)
        .resolve::<LatticeSemantics<NumberType>>(&int_sig)
        .unwrap()
        .0;
    assert_eq!(resolved, old_spec);

    let (a0, v0) = op_const(&mut stage, 2);
    let result = stage.result_value(NumberType::Int);
    let call = stage
        .statement(TestLang::Call {
            callee: resolved,
            args: vec![v0.into(), v0.into()],
            result,
        })
        .unwrap();
    let ret = op_return(&mut stage, result);
    let _caller = stage
        .block()
        .stmts([a0, call])
        .terminator(ret)
        .finish()
        .unwrap();
    assert!(old_spec.expect_info(&stage).backedges().contains(&call));

    // A second attempt with the same signature is a conflict.
    let body = const_body(&mut stage, 1);
    let conflict = stage
        .specialize(staged)
        .signature(int_sig.clone())
        .body(body)
        .finish()
        .unwrap_err();
    assert_eq!(conflict.conflicting, vec![old_spec]);

    // Opt in to the redefinition.
    let new_spec = stage.redefine_specialization(conflict);
    assert_ne!(new_spec, old_spec);

    // The old entry is invalidated, still addressable, and its backedges
    // enumerate exactly the caller that needs recompilation.
    let old_info = old_spec.expect_info(&stage);
    assert!(old_info.is_invalidated());
    assert_eq!(old_info.backedges().len(), 1);
    assert!(old_info.backedges().contains(&call));

    // Dispatch on the same input now yields the new entry.
    let resolved = staged
        .expect_info(&stage)
        .resolve::<LatticeSemantics<NumberType>>(&int_sig)
        .unwrap()
        .0;
    assert_eq!(resolved, new_spec);
}

/// A staged function with no specializations is extern: declared
/// signature, nothing to dispatch to.
#[test]
fn extern_staged_function_has_no_match() {
    let mut stage: StageInfo<TestLang> = StageInfo::new();
    let staged = stage
        .staged_function()
        .signature(sig(vec![NumberType::Int], NumberType::Int))
        .finish()
        .unwrap();

    let info = staged.expect_info(&stage);
    assert!(info.is_extern());
    let err = info
        .resolve::<LatticeSemantics<NumberType>>(&sig(vec![NumberType::Int], NumberType::Int))
        .unwrap_err();
    assert_eq!(err, DispatchError::NoMatch);
}
