//! Randomized construction: use-chain and erasure invariants hold for
//! arbitrary build/erase/compact sequences.

use proptest::prelude::*;

use kirin_ir::validation::validate_use_chains;
use kirin_ir::{
    Dialect, GetInfo, HasCallTarget, HasOperands, IsConstant, IsPure, IsSpeculatable,
    IsTerminator, ResultValue, SSAValue, StageInfo, Statement, Use,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
struct AnyType;

#[derive(Clone, Debug, PartialEq)]
enum Op {
    Const { result: ResultValue },
    Add { lhs: SSAValue, rhs: SSAValue, result: ResultValue },
}

impl<'a> kirin_ir::HasOperands<'a> for Op {
    type Iter = Box<dyn Iterator<Item = &'a SSAValue> + 'a>;

    fn operands(&'a self) -> Self::Iter {
        match self {
            Op::Const { .. } => Box::new(std::iter::empty()),
            Op::Add { lhs, rhs, .. } => Box::new([lhs, rhs].into_iter()),
        }
    }
}

impl<'a> kirin_ir::HasOperandsMut<'a> for Op {
    type IterMut = Box<dyn Iterator<Item = &'a mut SSAValue> + 'a>;

    fn operands_mut(&'a mut self) -> Self::IterMut {
        match self {
            Op::Const { .. } => Box::new(std::iter::empty()),
            Op::Add { lhs, rhs, .. } => Box::new([lhs, rhs].into_iter()),
        }
    }
}

impl<'a> kirin_ir::HasResults<'a> for Op {
    type Iter = std::iter::Once<&'a ResultValue>;

    fn results(&'a self) -> Self::Iter {
        match self {
            Op::Const { result } | Op::Add { result, .. } => std::iter::once(result),
        }
    }
}

impl<'a> kirin_ir::HasResultsMut<'a> for Op {
    type IterMut = std::iter::Once<&'a mut ResultValue>;

    fn results_mut(&'a mut self) -> Self::IterMut {
        match self {
            Op::Const { result } | Op::Add { result, .. } => std::iter::once(result),
        }
    }
}

kirin_ir::empty_dialect_views!(Op: successors, regions);

impl IsTerminator for Op {
    fn is_terminator(&self) -> bool {
        false
    }
}

impl IsConstant for Op {
    fn is_constant(&self) -> bool {
        matches!(self, Op::Const { .. })
    }
}

impl IsPure for Op {
    fn is_pure(&self) -> bool {
        true
    }
}

impl IsSpeculatable for Op {
    fn is_speculatable(&self) -> bool {
        true
    }
}

impl HasCallTarget for Op {}

impl Dialect for Op {
    type Type = AnyType;
}

/// One randomized build step.
#[derive(Clone, Debug)]
enum Action {
    /// Add a fresh constant.
    Const,
    /// Add `add` reading two earlier results, chosen by index.
    Add(usize, usize),
    /// Erase an earlier statement, chosen by index.
    Erase(usize),
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        2 => Just(Action::Const),
        3 => (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Action::Add(a, b)),
        1 => any::<usize>().prop_map(Action::Erase),
    ]
}

/// Apply a script, tracking live statements and their result values.
fn apply(actions: &[Action]) -> (StageInfo<Op>, Vec<(Statement, ResultValue)>) {
    let mut stage: StageInfo<Op> = StageInfo::new();
    let mut live: Vec<(Statement, ResultValue)> = Vec::new();

    for action in actions {
        match action {
            Action::Const => {
                let result = stage.result_value(AnyType);
                let stmt = stage.statement(Op::Const { result }).unwrap();
                live.push((stmt, result));
            }
            Action::Add(a, b) => {
                if live.is_empty() {
                    continue;
                }
                let (_, lhs) = live[a % live.len()];
                let (_, rhs) = live[b % live.len()];
                let result = stage.result_value(AnyType);
                let stmt = stage
                    .statement(Op::Add {
                        lhs: lhs.into(),
                        rhs: rhs.into(),
                        result,
                    })
                    .unwrap();
                live.push((stmt, result));
            }
            Action::Erase(index) => {
                if live.is_empty() {
                    continue;
                }
                let index = index % live.len();
                let (stmt, result) = live[index];
                // Only erase results nothing reads, as a rewriter would.
                let used = SSAValue::from(result)
                    .expect_info(&stage)
                    .uses()
                    .iter()
                    .any(|u| stage.statement_arena().is_live(u.stmt));
                if !used {
                    stage.erase_statement(stmt).unwrap();
                    live.remove(index);
                }
            }
        }
    }
    (stage, live)
}

proptest! {
    /// For every use `(s, i)` recorded on a value, `s`'s `i`-th operand
    /// is that value, and vice versa.
    #[test]
    fn use_chains_stay_consistent(actions in proptest::collection::vec(action_strategy(), 0..64)) {
        let (stage, _) = apply(&actions);
        let report = validate_use_chains(&stage);
        prop_assert!(report.is_ok(), "{report}");
    }

    /// Erasing a statement kills it and removes all its operand uses.
    #[test]
    fn erase_removes_statement_and_uses(actions in proptest::collection::vec(action_strategy(), 0..64)) {
        let (mut stage, live) = apply(&actions);

        for (stmt, result) in live.iter().rev() {
            let used = SSAValue::from(*result)
                .expect_info(&stage)
                .uses()
                .iter()
                .any(|u| stage.statement_arena().is_live(u.stmt));
            if used {
                continue;
            }
            let operands: Vec<SSAValue> = stmt
                .expect_info(&stage)
                .definition()
                .operands()
                .copied()
                .collect();
            stage.erase_statement(*stmt).unwrap();

            prop_assert!(!stage.statement_arena().is_live(*stmt));
            for (operand_index, operand) in operands.into_iter().enumerate() {
                if let Some(info) = operand.get_info(&stage) {
                    let use_ = Use { stmt: *stmt, operand_index };
                    prop_assert!(!info.uses().contains(&use_));
                }
            }
        }
        let report = validate_use_chains(&stage);
        prop_assert!(report.is_ok(), "{report}");
    }

    /// Compaction preserves the invariants after its id map is applied.
    #[test]
    fn compaction_preserves_invariants(actions in proptest::collection::vec(action_strategy(), 0..64)) {
        let (mut stage, live) = apply(&actions);

        let stmt_map = stage.compact_statements();
        let ssa_map = stage.compact_ssa_values();

        for (stmt, result) in live {
            let stmt = stmt_map.remap(stmt).expect("live statement survives");
            let result = ssa_map.remap(result).expect("live result survives");
            prop_assert!(stage.statement_arena().is_live(stmt));
            prop_assert!(stage.ssa_arena().is_live(result));
        }
        let report = validate_use_chains(&stage);
        prop_assert!(report.is_ok(), "{report}");
    }
}
