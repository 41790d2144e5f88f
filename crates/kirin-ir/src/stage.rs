//! Per-stage IR storage and construction.
//!
//! A [`StageInfo`] owns every arena for one compile stage: statements,
//! blocks, regions, SSA values, staged functions, plus the stage-local
//! symbol table. Every node token is relative to exactly one stage.
//!
//! Construction is flat and deterministic so that external frontends
//! (parsers, lowering passes) can build IR from a plain specification:
//! allocate SSA result values, build the statement payload, wrap it with
//! [`StageInfo::statement`], then assemble blocks and regions with the
//! builders below.

use tracing::debug;

use crate::arena::Arena;
use crate::dialect::{Dialect, HasCallTarget, HasOperands, HasResults, IsTerminator};
use crate::error::{IrError, SpecializeConflict, StagedConflict, StagedConflictKind};
use crate::intern::InternTable;
use crate::node::{
    Block, BlockArgument, BlockInfo, CompileStage, GetInfo, GlobalSymbol, LinkedList,
    LinkedListNode, Region, RegionInfo, ResultValue, SSAInfo, SSAKind, SSAValue,
    SpecializedFunction, SpecializedFunctionInfo, StagedFunction, StagedFunctionInfo,
    StagedNamePolicy, Statement, StatementInfo, Symbol, Use,
};
use crate::signature::Signature;

/// Storage bundle for one compile stage hosting dialect `L`.
#[derive(Debug)]
pub struct StageInfo<L: Dialect> {
    /// Optional readable stage name, interned in the pipeline's global
    /// symbol table. Display infrastructure prefers this over the
    /// numeric stage id.
    pub(crate) name: Option<GlobalSymbol>,
    pub(crate) stage_id: Option<CompileStage>,
    pub(crate) staged_name_policy: StagedNamePolicy,
    pub(crate) staged_functions: Arena<StagedFunction, StagedFunctionInfo<L>>,
    pub(crate) regions: Arena<Region, RegionInfo<L>>,
    pub(crate) blocks: Arena<Block, BlockInfo<L>>,
    pub(crate) statements: Arena<Statement, StatementInfo<L>>,
    pub(crate) ssas: Arena<SSAValue, SSAInfo<L>>,
    pub(crate) symbols: InternTable<String, Symbol>,
}

impl<L: Dialect> Default for StageInfo<L> {
    fn default() -> Self {
        Self {
            name: None,
            stage_id: None,
            staged_name_policy: StagedNamePolicy::default(),
            staged_functions: Arena::default(),
            regions: Arena::default(),
            blocks: Arena::default(),
            statements: Arena::default(),
            ssas: Arena::default(),
            symbols: InternTable::default(),
        }
    }
}

impl<L: Dialect> Clone for StageInfo<L> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            stage_id: self.stage_id,
            staged_name_policy: self.staged_name_policy,
            staged_functions: self.staged_functions.clone(),
            regions: self.regions.clone(),
            blocks: self.blocks.clone(),
            statements: self.statements.clone(),
            ssas: self.ssas.clone(),
            symbols: self.symbols.clone(),
        }
    }
}

// -- Identity and accessors -------------------------------------------------

impl<L: Dialect> StageInfo<L> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(&self) -> Option<GlobalSymbol> {
        self.name
    }

    pub fn set_name(&mut self, name: Option<GlobalSymbol>) {
        self.name = name;
    }

    pub fn stage_id(&self) -> Option<CompileStage> {
        self.stage_id
    }

    pub fn set_stage_id(&mut self, id: Option<CompileStage>) {
        self.stage_id = id;
    }

    pub fn staged_name_policy(&self) -> StagedNamePolicy {
        self.staged_name_policy
    }

    /// Defaults to [`StagedNamePolicy::SingleInterface`].
    pub fn set_staged_name_policy(&mut self, policy: StagedNamePolicy) {
        self.staged_name_policy = policy;
    }

    pub fn statement_arena(&self) -> &Arena<Statement, StatementInfo<L>> {
        &self.statements
    }

    pub fn block_arena(&self) -> &Arena<Block, BlockInfo<L>> {
        &self.blocks
    }

    pub fn region_arena(&self) -> &Arena<Region, RegionInfo<L>> {
        &self.regions
    }

    pub fn ssa_arena(&self) -> &Arena<SSAValue, SSAInfo<L>> {
        &self.ssas
    }

    pub fn staged_function_arena(&self) -> &Arena<StagedFunction, StagedFunctionInfo<L>> {
        &self.staged_functions
    }

    pub fn symbol_table(&self) -> &InternTable<String, Symbol> {
        &self.symbols
    }

    pub fn symbol_table_mut(&mut self) -> &mut InternTable<String, Symbol> {
        &mut self.symbols
    }

    pub fn intern_symbol(&mut self, name: impl Into<String>) -> Symbol {
        self.symbols.intern(name.into())
    }

    /// The type attribute of an SSA value.
    pub fn ssa_type(&self, value: impl Into<SSAValue>) -> Result<&L::Type, IrError> {
        Ok(self.ssas.get(value.into())?.ty())
    }
}

// -- SSA and statement construction -----------------------------------------

impl<L: Dialect> StageInfo<L> {
    /// Allocate a result value whose owning statement does not exist yet.
    ///
    /// The kind is patched to [`SSAKind::Result`] when the payload is
    /// wrapped by [`statement`](Self::statement).
    pub fn result_value(&mut self, ty: L::Type) -> ResultValue {
        let id = self.ssas.next_id();
        self.ssas
            .alloc(SSAInfo::new(id, None, ty, SSAKind::PendingResult));
        id.into()
    }

    /// As [`result_value`](Self::result_value), with a stage-local name.
    pub fn named_result_value(&mut self, name: impl Into<String>, ty: L::Type) -> ResultValue {
        let sym = self.symbols.intern(name.into());
        let id = self.ssas.next_id();
        self.ssas
            .alloc(SSAInfo::new(id, Some(sym), ty, SSAKind::PendingResult));
        id.into()
    }

    /// Allocate a detached statement from its dialect payload.
    ///
    /// Patches each result value's kind to point at the new statement and
    /// records one [`Use`] per operand in the operand's use list. The
    /// statement is inserted into a block separately (builders,
    /// [`append_statement`](Self::append_statement), ...).
    pub fn statement(&mut self, definition: L) -> Result<Statement, IrError> {
        let id = self.statements.next_id();

        let results: Vec<ResultValue> = definition.results().copied().collect();
        let operands: Vec<SSAValue> = definition.operands().copied().collect();

        // Every operand and result must be a live SSA value before the
        // statement exists; fail before mutating anything.
        for value in results.iter().map(|r| SSAValue::from(*r)).chain(operands.iter().copied()) {
            self.ssas.get(value)?;
        }

        for (index, result) in results.into_iter().enumerate() {
            let info = self
                .ssas
                .get_mut(SSAValue::from(result))
                .expect("checked live above");
            info.kind = SSAKind::Result(id, index);
        }

        for (operand_index, operand) in operands.into_iter().enumerate() {
            self.ssas
                .get_mut(operand)
                .expect("checked live above")
                .uses_mut()
                .insert(Use {
                    stmt: id,
                    operand_index,
                });
        }

        self.statements.alloc(StatementInfo::new(definition));
        Ok(id)
    }

    /// Start building a block.
    pub fn block(&mut self) -> BlockBuilder<'_, L> {
        BlockBuilder {
            stage: self,
            arguments: Vec::new(),
            statements: Vec::new(),
            terminator: None,
        }
    }

    /// Start building a region.
    pub fn region(&mut self) -> RegionBuilder<'_, L> {
        RegionBuilder {
            stage: self,
            blocks: Vec::new(),
        }
    }
}

// -- Block mutation ---------------------------------------------------------

impl<L: Dialect> StageInfo<L> {
    /// Attach a detached statement at the end of a block.
    ///
    /// A terminator goes into the block's terminator slot (at most one); a
    /// non-terminator is appended to the body list.
    ///
    /// # Panics
    ///
    /// Panics if the statement is already attached to a block; detach it
    /// first.
    pub fn append_statement(&mut self, block: Block, stmt: Statement) -> Result<(), IrError> {
        self.assert_detached(stmt);
        let is_term = stmt.expect_info(self).definition.is_terminator();
        if is_term {
            let info = block.expect_info_mut(self);
            if info.terminator.is_some() {
                return Err(IrError::InvalidTerminator(stmt));
            }
            info.terminator = Some(stmt);
        } else {
            let tail = block.expect_info(self).statements.tail;
            match tail {
                Some(tail) => {
                    tail.expect_info_mut(self).node.next = Some(stmt);
                    stmt.expect_info_mut(self).node.prev = Some(tail);
                }
                None => block.expect_info_mut(self).statements.head = Some(stmt),
            }
            let list = &mut block.expect_info_mut(self).statements;
            list.tail = Some(stmt);
            list.len += 1;
        }
        stmt.expect_info_mut(self).parent = Some(block);
        self.register_call_site(stmt);
        Ok(())
    }

    /// Attach a detached non-terminator immediately before `cursor`.
    ///
    /// `cursor` may be the block's terminator, which appends to the body
    /// list tail.
    pub fn insert_before(&mut self, cursor: Statement, stmt: Statement) -> Result<(), IrError> {
        self.assert_detached(stmt);
        if stmt.expect_info(self).definition.is_terminator() {
            return Err(IrError::InvalidTerminator(stmt));
        }
        let block = cursor
            .expect_info(self)
            .parent
            .ok_or(IrError::OrphanStatement(cursor))?;

        if block.expect_info(self).terminator == Some(cursor) {
            // Inserting before the terminator is a plain body append.
            return self.append_body_tail(block, stmt);
        }

        let prev = cursor.expect_info(self).node.prev;
        match prev {
            Some(prev) => {
                prev.expect_info_mut(self).node.next = Some(stmt);
                stmt.expect_info_mut(self).node.prev = Some(prev);
            }
            None => block.expect_info_mut(self).statements.head = Some(stmt),
        }
        cursor.expect_info_mut(self).node.prev = Some(stmt);
        let s = stmt.expect_info_mut(self);
        s.node.next = Some(cursor);
        s.parent = Some(block);
        block.expect_info_mut(self).statements.len += 1;
        self.register_call_site(stmt);
        Ok(())
    }

    /// Attach a detached non-terminator immediately after `cursor`.
    ///
    /// `cursor` must be a body statement; nothing executes after a
    /// terminator.
    pub fn insert_after(&mut self, cursor: Statement, stmt: Statement) -> Result<(), IrError> {
        self.assert_detached(stmt);
        if stmt.expect_info(self).definition.is_terminator() {
            return Err(IrError::InvalidTerminator(stmt));
        }
        let block = cursor
            .expect_info(self)
            .parent
            .ok_or(IrError::OrphanStatement(cursor))?;
        if block.expect_info(self).terminator == Some(cursor) {
            return Err(IrError::InvalidTerminator(stmt));
        }

        let next = cursor.expect_info(self).node.next;
        match next {
            Some(next) => {
                next.expect_info_mut(self).node.prev = Some(stmt);
                stmt.expect_info_mut(self).node.next = Some(next);
            }
            None => block.expect_info_mut(self).statements.tail = Some(stmt),
        }
        cursor.expect_info_mut(self).node.next = Some(stmt);
        let s = stmt.expect_info_mut(self);
        s.node.prev = Some(cursor);
        s.parent = Some(block);
        block.expect_info_mut(self).statements.len += 1;
        self.register_call_site(stmt);
        Ok(())
    }

    /// Detach a statement from its block without destroying it.
    ///
    /// The statement keeps its operands and results; only the sibling
    /// links, the parent pointer, and its call-site backedge registration
    /// are cleared.
    pub fn remove_statement(&mut self, stmt: Statement) -> Result<(), IrError> {
        let info = stmt.get_info(self).ok_or(IrError::OrphanStatement(stmt))?;
        let block = info.parent.ok_or(IrError::OrphanStatement(stmt))?;
        let (prev, next) = (info.node.prev, info.node.next);

        if block.expect_info(self).terminator == Some(stmt) {
            block.expect_info_mut(self).terminator = None;
        } else {
            match prev {
                Some(prev) => prev.expect_info_mut(self).node.next = next,
                None => block.expect_info_mut(self).statements.head = next,
            }
            match next {
                Some(next) => next.expect_info_mut(self).node.prev = prev,
                None => block.expect_info_mut(self).statements.tail = prev,
            }
            block.expect_info_mut(self).statements.len -= 1;
        }

        let s = stmt.expect_info_mut(self);
        s.node = LinkedListNode::detached();
        s.parent = None;
        self.unregister_call_site(stmt);
        Ok(())
    }

    fn append_body_tail(&mut self, block: Block, stmt: Statement) -> Result<(), IrError> {
        let tail = block.expect_info(self).statements.tail;
        match tail {
            Some(tail) => {
                tail.expect_info_mut(self).node.next = Some(stmt);
                stmt.expect_info_mut(self).node.prev = Some(tail);
            }
            None => block.expect_info_mut(self).statements.head = Some(stmt),
        }
        let list = &mut block.expect_info_mut(self).statements;
        list.tail = Some(stmt);
        list.len += 1;
        stmt.expect_info_mut(self).parent = Some(block);
        self.register_call_site(stmt);
        Ok(())
    }

    fn assert_detached(&self, stmt: Statement) {
        if let Some(parent) = stmt.expect_info(self).parent {
            panic!(
                "statement {stmt} already belongs to block {parent}; remove it from the old \
                 block first"
            );
        }
    }
}

// -- Region mutation --------------------------------------------------------

impl<L: Dialect> StageInfo<L> {
    /// Attach an unowned block at the end of a region.
    pub fn append_block(&mut self, region: Region, block: Block) -> Result<(), IrError> {
        if let Some(owner) = block.expect_info(self).parent {
            return Err(IrError::BlockAlreadyOwned {
                block,
                region: owner,
            });
        }
        let tail = region.expect_info(self).blocks.tail;
        match tail {
            Some(tail) => {
                tail.expect_info_mut(self).node.next = Some(block);
                block.expect_info_mut(self).node.prev = Some(tail);
            }
            None => region.expect_info_mut(self).blocks.head = Some(block),
        }
        let list = &mut region.expect_info_mut(self).blocks;
        list.tail = Some(block);
        list.len += 1;
        block.expect_info_mut(self).parent = Some(region);
        Ok(())
    }

    /// Detach a block from its region without destroying it.
    pub fn remove_block(&mut self, region: Region, block: Block) -> Result<(), IrError> {
        let info = block.expect_info(self);
        if info.parent != Some(region) {
            return Err(IrError::BlockAlreadyOwned {
                block,
                region: info.parent.unwrap_or(region),
            });
        }
        let (prev, next) = (info.node.prev, info.node.next);
        match prev {
            Some(prev) => prev.expect_info_mut(self).node.next = next,
            None => region.expect_info_mut(self).blocks.head = next,
        }
        match next {
            Some(next) => next.expect_info_mut(self).node.prev = prev,
            None => region.expect_info_mut(self).blocks.tail = prev,
        }
        region.expect_info_mut(self).blocks.len -= 1;
        let b = block.expect_info_mut(self);
        b.node = LinkedListNode::detached();
        b.parent = None;
        Ok(())
    }
}

// -- Staged functions and specializations -----------------------------------

impl<L: Dialect> StageInfo<L> {
    /// Start declaring a staged function.
    ///
    /// Conflicts under the active [`StagedNamePolicy`] come back as a
    /// [`StagedConflict`] carrying both the old entries and this
    /// definition; pass it to
    /// [`redefine_staged_function`](Self::redefine_staged_function) to
    /// overwrite intentionally. Anonymous staged functions never conflict.
    pub fn staged_function(&mut self) -> StagedFunctionBuilder<'_, L> {
        StagedFunctionBuilder {
            stage: self,
            name: None,
            signature: None,
        }
    }

    /// The identifier the next [`specialize`](Self::specialize) on
    /// `staged` will assign. Lets a body reference its own
    /// specialization (self-recursion) before `specialize` runs.
    pub fn next_specialization(&self, staged: StagedFunction) -> SpecializedFunction {
        SpecializedFunction(staged, staged.expect_info(self).specializations.len())
    }

    /// Start appending a specialization to `staged`.
    ///
    /// The signature defaults to the staged function's. A live
    /// specialization with the same signature is a [`SpecializeConflict`],
    /// convertible to an overwrite via
    /// [`redefine_specialization`](Self::redefine_specialization).
    pub fn specialize(&mut self, staged: StagedFunction) -> SpecializeBuilder<'_, L> {
        SpecializeBuilder {
            stage: self,
            staged,
            signature: None,
            body: None,
        }
    }

    /// Consume a [`StagedConflict`]: invalidate the conflicting entries
    /// and install the rejected definition.
    ///
    /// The invalidated entries stay addressable; inspect their backedges
    /// to find the call sites that need recompilation.
    pub fn redefine_staged_function(&mut self, conflict: StagedConflict<L>) -> StagedFunction {
        for &old in &conflict.conflicting {
            old.expect_info_mut(self).invalidate();
            debug!(staged = %old, "invalidated staged function for redefinition");
        }
        let id = self.staged_functions.next_id();
        self.staged_functions.alloc(StagedFunctionInfo {
            id,
            name: conflict.name,
            signature: conflict.signature,
            specializations: conflict.specializations,
            backedges: conflict.backedges,
            invalidated: false,
        });
        id
    }

    /// Consume a [`SpecializeConflict`]: invalidate the conflicting
    /// specializations and append the rejected one.
    pub fn redefine_specialization(
        &mut self,
        conflict: SpecializeConflict<L>,
    ) -> SpecializedFunction {
        let staged = conflict.staged_function;
        let info = staged.expect_info_mut(self);
        for &old in &conflict.conflicting {
            info.specializations[old.index()].invalidate();
            debug!(spec = %old, "invalidated specialization for redefinition");
        }
        let id = SpecializedFunction(staged, info.specializations.len());
        info.specializations.push(SpecializedFunctionInfo {
            id,
            signature: conflict.signature,
            body: conflict.body,
            backedges: conflict.backedges,
            invalidated: false,
        });
        id
    }
}

// -- Backedge maintenance ---------------------------------------------------

impl<L: Dialect> StageInfo<L> {
    /// Record `stmt` as a call site of its resolved callee, if it is one.
    ///
    /// Call statements report their same-stage callee through
    /// [`HasCallTarget`]; the callee's specialization and its parent
    /// staged function both record the site.
    fn register_call_site(&mut self, stmt: Statement) {
        let Some(callee) = stmt.expect_info(self).definition.call_target() else {
            return;
        };
        if let Some(info) = callee.get_info_mut(self) {
            info.backedges.insert(stmt);
        }
        if let Some(info) = callee.staged().get_info_mut(self) {
            info.backedges.insert(stmt);
        }
        debug!(stmt = %stmt, callee = %callee, "registered call backedge");
    }

    fn unregister_call_site(&mut self, stmt: Statement) {
        let Some(callee) = stmt.expect_info(self).definition.call_target() else {
            return;
        };
        if let Some(info) = callee.get_info_mut(self) {
            info.backedges.remove(&stmt);
        }
        if let Some(info) = callee.staged().get_info_mut(self) {
            info.backedges.remove(&stmt);
        }
        debug!(stmt = %stmt, callee = %callee, "removed call backedge");
    }

    /// Re-register a call site after its operands or target changed.
    ///
    /// The rewrite utilities call this with the callee recorded *before*
    /// the mutation; the statement's current target is re-read afterwards.
    pub(crate) fn retarget_call_site(
        &mut self,
        stmt: Statement,
        old_target: Option<SpecializedFunction>,
    ) {
        if let Some(old) = old_target {
            if let Some(info) = old.get_info_mut(self) {
                info.backedges.remove(&stmt);
            }
            if let Some(info) = old.staged().get_info_mut(self) {
                info.backedges.remove(&stmt);
            }
        }
        if stmt.expect_info(self).parent.is_some() {
            self.register_call_site(stmt);
        }
    }
}

// -- Builders ---------------------------------------------------------------

/// Builds one block: argument types, body statements, terminator.
pub struct BlockBuilder<'s, L: Dialect> {
    stage: &'s mut StageInfo<L>,
    arguments: Vec<(Option<String>, L::Type)>,
    statements: Vec<Statement>,
    terminator: Option<Statement>,
}

impl<'s, L: Dialect> BlockBuilder<'s, L> {
    pub fn argument(mut self, ty: L::Type) -> Self {
        self.arguments.push((None, ty));
        self
    }

    pub fn named_argument(mut self, name: impl Into<String>, ty: L::Type) -> Self {
        self.arguments.push((Some(name.into()), ty));
        self
    }

    pub fn stmt(mut self, stmt: Statement) -> Self {
        self.statements.push(stmt);
        self
    }

    pub fn stmts(mut self, stmts: impl IntoIterator<Item = Statement>) -> Self {
        self.statements.extend(stmts);
        self
    }

    pub fn terminator(mut self, stmt: Statement) -> Self {
        self.terminator = Some(stmt);
        self
    }

    /// Allocate the block, its argument values, and attach the collected
    /// statements.
    pub fn finish(self) -> Result<Block, IrError> {
        let BlockBuilder {
            stage,
            arguments,
            statements,
            terminator,
        } = self;

        let block = stage.blocks.next_id();
        let mut argument_ids = smallvec::SmallVec::new();
        for (index, (name, ty)) in arguments.into_iter().enumerate() {
            let sym = name.map(|n| stage.symbols.intern(n));
            let id = stage.ssas.next_id();
            stage.ssas.alloc(SSAInfo::new(
                id,
                sym,
                ty,
                SSAKind::BlockArgument(block, index),
            ));
            argument_ids.push(BlockArgument::from(id));
        }

        stage.blocks.alloc(BlockInfo {
            parent: None,
            node: LinkedListNode::detached(),
            arguments: argument_ids,
            statements: LinkedList::default(),
            terminator: None,
            _marker: std::marker::PhantomData,
        });

        for stmt in statements {
            if stmt.expect_info(stage).definition.is_terminator() {
                return Err(IrError::InvalidTerminator(stmt));
            }
            stage.append_statement(block, stmt)?;
        }
        if let Some(term) = terminator {
            if !term.expect_info(stage).definition.is_terminator() {
                return Err(IrError::InvalidTerminator(term));
            }
            stage.append_statement(block, term)?;
        }
        Ok(block)
    }
}

/// Builds one region from an ordered list of blocks (entry first).
pub struct RegionBuilder<'s, L: Dialect> {
    stage: &'s mut StageInfo<L>,
    blocks: Vec<Block>,
}

impl<'s, L: Dialect> RegionBuilder<'s, L> {
    pub fn block(mut self, block: Block) -> Self {
        self.blocks.push(block);
        self
    }

    pub fn blocks(mut self, blocks: impl IntoIterator<Item = Block>) -> Self {
        self.blocks.extend(blocks);
        self
    }

    pub fn finish(self) -> Result<Region, IrError> {
        let RegionBuilder { stage, blocks } = self;
        let region = stage.regions.alloc(RegionInfo {
            owner: None,
            blocks: LinkedList::default(),
            _marker: std::marker::PhantomData,
        });
        for block in blocks {
            stage.append_block(region, block)?;
        }
        Ok(region)
    }
}

/// Declares one staged function.
pub struct StagedFunctionBuilder<'s, L: Dialect> {
    stage: &'s mut StageInfo<L>,
    name: Option<GlobalSymbol>,
    signature: Option<Signature<L::Type>>,
}

impl<'s, L: Dialect> StagedFunctionBuilder<'s, L> {
    /// Name interned in the pipeline's global table, so the identity is
    /// consistent across stages.
    pub fn name(mut self, name: GlobalSymbol) -> Self {
        self.name = Some(name);
        self
    }

    pub fn signature(mut self, signature: Signature<L::Type>) -> Self {
        self.signature = Some(signature);
        self
    }

    pub fn finish(self) -> Result<StagedFunction, StagedConflict<L>> {
        let StagedFunctionBuilder {
            stage,
            name,
            signature,
        } = self;
        let signature = signature.unwrap_or_default();

        if name.is_some() {
            let same_name: Vec<StagedFunction> = stage
                .staged_functions
                .iter_live()
                .filter(|(_, info)| !info.invalidated && info.name == name)
                .map(|(id, _)| id)
                .collect();

            let duplicates: Vec<StagedFunction> = same_name
                .iter()
                .copied()
                .filter(|id| id.expect_info(stage).signature() == &signature)
                .collect();
            if !duplicates.is_empty() {
                return Err(StagedConflict {
                    kind: StagedConflictKind::DuplicateSignature,
                    name,
                    signature,
                    conflicting: duplicates,
                    specializations: Vec::new(),
                    backedges: Default::default(),
                });
            }

            if stage.staged_name_policy == StagedNamePolicy::SingleInterface {
                let mismatched: Vec<StagedFunction> = same_name
                    .into_iter()
                    .filter(|id| id.expect_info(stage).signature() != &signature)
                    .collect();
                if !mismatched.is_empty() {
                    return Err(StagedConflict {
                        kind: StagedConflictKind::SignatureMismatch,
                        name,
                        signature,
                        conflicting: mismatched,
                        specializations: Vec::new(),
                        backedges: Default::default(),
                    });
                }
            }
        }

        let id = stage.staged_functions.next_id();
        stage.staged_functions.alloc(StagedFunctionInfo {
            id,
            name,
            signature,
            specializations: Vec::new(),
            backedges: Default::default(),
            invalidated: false,
        });
        Ok(id)
    }
}

/// Appends one specialization to a staged function.
pub struct SpecializeBuilder<'s, L: Dialect> {
    stage: &'s mut StageInfo<L>,
    staged: StagedFunction,
    signature: Option<Signature<L::Type>>,
    body: Option<Region>,
}

impl<'s, L: Dialect> SpecializeBuilder<'s, L> {
    /// The specialized signature; must be accepted by the staged
    /// signature under the pipeline's [`SignatureSemantics`]
    /// (checked by the caller, not here). Defaults to the staged
    /// signature.
    pub fn signature(mut self, signature: Signature<L::Type>) -> Self {
        self.signature = Some(signature);
        self
    }

    pub fn body(mut self, body: Region) -> Self {
        self.body = Some(body);
        self
    }

    pub fn finish(self) -> Result<SpecializedFunction, SpecializeConflict<L>> {
        let SpecializeBuilder {
            stage,
            staged,
            signature,
            body,
        } = self;
        let body = body.expect("specialization requires a body region");
        let info = staged.expect_info(stage);
        let signature = signature.unwrap_or_else(|| info.signature.clone());

        let conflicting: Vec<SpecializedFunction> = info
            .specializations
            .iter()
            .filter(|spec| !spec.is_invalidated() && spec.signature() == &signature)
            .map(|spec| spec.id())
            .collect();
        if !conflicting.is_empty() {
            return Err(SpecializeConflict {
                staged_function: staged,
                signature,
                conflicting,
                body,
                backedges: Default::default(),
            });
        }

        let info = staged.expect_info_mut(stage);
        let id = SpecializedFunction(staged, info.specializations.len());
        info.specializations.push(SpecializedFunctionInfo {
            id,
            signature,
            body,
            backedges: Default::default(),
            invalidated: false,
        });
        Ok(id)
    }
}
