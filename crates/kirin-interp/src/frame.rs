//! Call frames.

use rustc_hash::FxHashMap;

use kirin_ir::{CompileStage, ResultValue, SSAValue, SpecializedFunction, Statement};

/// One activation of a [`SpecializedFunction`].
///
/// Bindings are a sparse map: SSA tokens are dense across the whole stage
/// arena, but a single activation touches a small non-contiguous subset.
/// The map is insertion-only during one activation and dropped with the
/// frame.
///
/// `X` is driver-specific extra state: the stack interpreter stores the
/// instruction cursor (`Option<Statement>`), the abstract interpreter its
/// fixpoint state.
#[derive(Debug)]
pub struct Frame<V, X> {
    callee: SpecializedFunction,
    /// The stage this activation executes in. Calls carry a stage tag, so
    /// recursive mixed-stage chains keep per-frame stage fidelity.
    stage: CompileStage,
    values: FxHashMap<SSAValue, V>,
    /// Where the caller wants this frame's return value written, if this
    /// frame was entered through a `Call`.
    result_slot: Option<ResultValue>,
    extra: X,
}

impl<V, X> Frame<V, X> {
    pub fn new(callee: SpecializedFunction, stage: CompileStage, extra: X) -> Self {
        Self {
            callee,
            stage,
            values: FxHashMap::default(),
            result_slot: None,
            extra,
        }
    }

    pub fn with_result_slot(mut self, slot: ResultValue) -> Self {
        self.result_slot = Some(slot);
        self
    }

    pub fn callee(&self) -> SpecializedFunction {
        self.callee
    }

    pub fn stage(&self) -> CompileStage {
        self.stage
    }

    pub fn result_slot(&self) -> Option<ResultValue> {
        self.result_slot
    }

    pub fn read(&self, value: impl Into<SSAValue>) -> Option<&V> {
        self.values.get(&value.into())
    }

    pub fn write(&mut self, result: ResultValue, value: V) -> Option<V> {
        self.values.insert(result.into(), value)
    }

    /// Write keyed by an arbitrary SSA value (block arguments).
    pub fn write_ssa(&mut self, ssa: impl Into<SSAValue>, value: V) -> Option<V> {
        self.values.insert(ssa.into(), value)
    }

    pub fn values(&self) -> &FxHashMap<SSAValue, V> {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut FxHashMap<SSAValue, V> {
        &mut self.values
    }

    pub fn extra(&self) -> &X {
        &self.extra
    }

    pub fn extra_mut(&mut self) -> &mut X {
        &mut self.extra
    }

    pub fn values_and_extra_mut(&mut self) -> (&mut FxHashMap<SSAValue, V>, &mut X) {
        (&mut self.values, &mut self.extra)
    }

    pub fn into_parts(self) -> (SpecializedFunction, FxHashMap<SSAValue, V>, X) {
        (self.callee, self.values, self.extra)
    }
}

impl<V> Frame<V, Option<Statement>> {
    pub fn cursor(&self) -> Option<Statement> {
        *self.extra()
    }

    pub fn set_cursor(&mut self, cursor: Option<Statement>) {
        *self.extra_mut() = cursor;
    }
}
