//! The compilation pipeline: stages, functions and global symbols.
//!
//! A [`Pipeline`] owns every stage's storage, the pipeline-wide symbol
//! table, the abstract function arena, and an informational graph of
//! lowering edges between stages. There is no global registry: a process
//! may hold many pipelines concurrently without interference.

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::arena::{Arena, Identifier, RawId};
use crate::dialect::Dialect;
use crate::error::StagedConflict;
use crate::intern::InternTable;
use crate::node::{CompileStage, Function, FunctionInfo, GlobalSymbol, StagedFunction};
use crate::signature::Signature;
use crate::stage::StageInfo;

/// Access to the identity of a stage container, independent of which
/// dialect it hosts.
///
/// `Languages` is the type-level list of dialects this container can
/// host, encoded as nested tuples: `(L1, (L2, ()))`. The stage-dispatch
/// machinery recurses over it to route runtime stage ids to typed
/// [`StageInfo`] access.
pub trait StageMeta {
    type Languages;

    fn stage_name(&self) -> Option<GlobalSymbol>;
    fn set_stage_name(&mut self, name: Option<GlobalSymbol>);
    fn stage_id(&self) -> Option<CompileStage>;
    fn set_stage_id(&mut self, id: Option<CompileStage>);
}

/// Containers that may hold a [`StageInfo`] for dialect `L`.
///
/// Implemented once per dialect by multi-dialect stage enums:
///
/// ```ignore
/// enum Stage {
///     A(StageInfo<LangA>),
///     B(StageInfo<LangB>),
/// }
///
/// impl HasStageInfo<LangA> for Stage {
///     fn try_stage_info(&self) -> Option<&StageInfo<LangA>> {
///         match self { Stage::A(info) => Some(info), _ => None }
///     }
///     // ...
/// }
/// ```
pub trait HasStageInfo<L: Dialect> {
    fn try_stage_info(&self) -> Option<&StageInfo<L>>;
    fn try_stage_info_mut(&mut self) -> Option<&mut StageInfo<L>>;
}

impl<L: Dialect> HasStageInfo<L> for StageInfo<L> {
    fn try_stage_info(&self) -> Option<&StageInfo<L>> {
        Some(self)
    }

    fn try_stage_info_mut(&mut self) -> Option<&mut StageInfo<L>> {
        Some(self)
    }
}

impl<L: Dialect> StageMeta for StageInfo<L> {
    type Languages = (L, ());

    fn stage_name(&self) -> Option<GlobalSymbol> {
        self.name()
    }

    fn set_stage_name(&mut self, name: Option<GlobalSymbol>) {
        self.set_name(name);
    }

    fn stage_id(&self) -> Option<CompileStage> {
        self.stage_id()
    }

    fn set_stage_id(&mut self, id: Option<CompileStage>) {
        self.set_stage_id(id);
    }
}

/// A directed graph of compile stages plus cross-stage bookkeeping.
pub struct Pipeline<S> {
    stages: Vec<S>,
    /// Informational lowering edges `(from, to)`. Not interpreted by the
    /// core; drivers may use them for scheduling or display.
    lowering_edges: Vec<(CompileStage, CompileStage)>,
    functions: Arena<Function, FunctionInfo>,
    functions_by_name: FxHashMap<GlobalSymbol, Function>,
    global_symbols: InternTable<String, GlobalSymbol>,
}

impl<S> Default for Pipeline<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Pipeline<S> {
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            lowering_edges: Vec::new(),
            functions: Arena::default(),
            functions_by_name: FxHashMap::default(),
            global_symbols: InternTable::default(),
        }
    }

    pub fn stage(&self, id: CompileStage) -> Option<&S> {
        self.stages.get(id.index())
    }

    pub fn stage_mut(&mut self, id: CompileStage) -> Option<&mut S> {
        self.stages.get_mut(id.index())
    }

    pub fn stages(&self) -> &[S] {
        &self.stages
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Record an informational lowering edge from one stage to another.
    pub fn add_lowering_edge(&mut self, from: CompileStage, to: CompileStage) {
        self.lowering_edges.push((from, to));
    }

    pub fn lowering_edges(&self) -> &[(CompileStage, CompileStage)] {
        &self.lowering_edges
    }

    /// Intern a name in the pipeline-wide symbol table.
    pub fn intern(&mut self, name: impl Into<String>) -> GlobalSymbol {
        self.global_symbols.intern(name.into())
    }

    /// Resolve a global symbol back to its string.
    pub fn resolve(&self, sym: GlobalSymbol) -> Option<&str> {
        self.global_symbols.lookup(sym).map(String::as_str)
    }

    pub fn global_symbols(&self) -> &InternTable<String, GlobalSymbol> {
        &self.global_symbols
    }

    pub fn global_symbols_mut(&mut self) -> &mut InternTable<String, GlobalSymbol> {
        &mut self.global_symbols
    }

    /// Create or return the abstract function named `name`.
    pub fn function(&mut self, name: impl Into<String>) -> Function {
        let sym = self.global_symbols.intern(name.into());
        if let Some(&existing) = self.functions_by_name.get(&sym) {
            return existing;
        }
        let id = self
            .functions
            .alloc_with_id(|id| FunctionInfo::new(id, Some(sym)));
        self.functions_by_name.insert(sym, id);
        id
    }

    /// Create an anonymous abstract function.
    pub fn anonymous_function(&mut self) -> Function {
        self.functions.alloc_with_id(|id| FunctionInfo::new(id, None))
    }

    /// Look up a function by an already-interned name.
    pub fn function_by_name(&self, name: GlobalSymbol) -> Option<Function> {
        self.functions_by_name.get(&name).copied()
    }

    /// Resolve a function by its string name, for external frontends.
    pub fn resolve_function(&self, name: &str) -> Result<Function, crate::IrError> {
        self.global_symbols
            .resolve(&name.to_owned())
            .and_then(|sym| self.function_by_name(sym))
            .ok_or_else(|| crate::IrError::UnknownSymbol(name.to_owned()))
    }

    pub fn function_info(&self, func: Function) -> Option<&FunctionInfo> {
        self.functions.get(func).ok()
    }

    pub fn function_info_mut(&mut self, func: Function) -> Option<&mut FunctionInfo> {
        self.functions.get_mut(func).ok()
    }

    pub fn function_arena(&self) -> &Arena<Function, FunctionInfo> {
        &self.functions
    }

    /// Link a staged function to an abstract function at `stage`.
    ///
    /// # Panics
    ///
    /// Panics if `func` was not allocated by this pipeline.
    pub fn link(&mut self, func: Function, stage: CompileStage, staged: StagedFunction) {
        self.functions
            .get_mut(func)
            .expect("function was not allocated by this pipeline")
            .add_staged_function(stage, staged);
    }
}

impl<S: StageMeta> Pipeline<S> {
    /// Add a stage, assigning its [`CompileStage`] id.
    pub fn add_stage(&mut self, mut stage: S) -> CompileStage {
        let id = CompileStage::from(RawId::from_index(self.stages.len()));
        stage.set_stage_id(Some(id));
        self.stages.push(stage);
        debug!(stage = %id, "added pipeline stage");
        id
    }

    /// Add a stage with a readable name interned in the global table.
    pub fn add_named_stage(&mut self, mut stage: S, name: impl Into<String>) -> CompileStage {
        let sym = self.global_symbols.intern(name.into());
        stage.set_stage_name(Some(sym));
        self.add_stage(stage)
    }

    /// Typed storage lookup: the [`StageInfo`] for dialect `L` held by
    /// stage `id`, if that stage hosts `L`.
    pub fn with_stage<L: Dialect>(&self, id: CompileStage) -> Option<&StageInfo<L>>
    where
        S: HasStageInfo<L>,
    {
        self.stage(id).and_then(HasStageInfo::try_stage_info)
    }

    pub fn with_stage_mut<L: Dialect>(&mut self, id: CompileStage) -> Option<&mut StageInfo<L>>
    where
        S: HasStageInfo<L>,
    {
        self.stage_mut(id).and_then(HasStageInfo::try_stage_info_mut)
    }

    /// Declare a staged function for `func` at `stage` and link it.
    ///
    /// The staged function inherits the abstract function's name, so the
    /// identity stays consistent across stages. Conflict rules are those
    /// of [`StageInfo::staged_function`].
    ///
    /// # Panics
    ///
    /// Panics if `func` or `stage` is unknown, or the stage does not host
    /// dialect `L`.
    pub fn staged_function<L: Dialect>(
        &mut self,
        func: Function,
        stage: CompileStage,
        signature: Option<Signature<L::Type>>,
    ) -> Result<StagedFunction, StagedConflict<L>>
    where
        S: HasStageInfo<L>,
    {
        let name = self
            .functions
            .get(func)
            .expect("function was not allocated by this pipeline")
            .name();
        let info = self
            .with_stage_mut::<L>(stage)
            .expect("stage does not host a StageInfo for this dialect");

        let mut builder = info.staged_function();
        if let Some(name) = name {
            builder = builder.name(name);
        }
        if let Some(signature) = signature {
            builder = builder.signature(signature);
        }
        let staged = builder.finish()?;

        self.link(func, stage, staged);
        Ok(staged)
    }
}
