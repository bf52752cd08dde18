//! Lowering of an SSA method body into a symbolic form.
//!
//! Blocks are visited in layout order. Because only forward edges are followed, every
//! predecessor of a block has been lowered before the block itself, so its incoming
//! condition chains and variable versions are complete on entry.
//!
//! # Groups
//!
//! For basic block `b`:
//!
//! - `(b, NotApplicable)` holds declarations and defining equations
//! - `(b, AllNormal)` holds the positive operation guards, the merge condition and the
//!   edge conditions of `b`'s incoming branches
//! - `(b, SomethingBranch(i))` holds the negated guard of the i-th raising operation
//!
//! # Precondition Chains
//!
//! A chain is the list of instructions whose conditions hold when control reaches a
//! point. Leaving `(p, AllNormal)` contributes `PRE(p)`, all positive guards of `p` and
//! the decided edge; leaving `(p, SomethingBranch(i))` for `p`'s handler contributes
//! `PRE(p)`, the first `i` guards and the negated guard `i`. `PRE(b)` is the longest
//! common prefix of the contributions plus, when they differ, one merge instruction.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Arc,
};

use tracing::{debug, trace};

use crate::{
    form::{
        AssertionGroup, BlockKey, ExceptionGroup, InstrFlags, InstrId, InstructionKind, SmtBlock,
        SmtForm, SmtInstruction, SourceRef,
    },
    formula::{
        CallSite, ConstantOrigin, Emission, PhiArm, SmtLibStringContext, Term, Versions,
    },
    model::{
        BasicBlock, BinaryOp, CompareOp, Literal, MethodBody, MethodRef, ModelProvider, Op,
        PrimitiveKind, RuntimeType, Terminator, TypeKind, VarId, VarOrigin,
    },
    smt::sanitize,
    utils::Interner,
    Error, Result,
};

const NA: ExceptionGroup = ExceptionGroup::NotApplicable;
const AN: ExceptionGroup = ExceptionGroup::AllNormal;

const fn declaration_key(block: usize) -> BlockKey {
    BlockKey::new(block, NA, InstructionKind::Declaration, false)
}

const fn normal_key(block: usize) -> BlockKey {
    BlockKey::new(block, NA, InstructionKind::Normal, false)
}

const fn guard_key(block: usize) -> BlockKey {
    BlockKey::new(block, AN, InstructionKind::Normal, true)
}

const fn raise_key(block: usize, ordinal: u32) -> BlockKey {
    BlockKey::new(
        block,
        ExceptionGroup::SomethingBranch(ordinal),
        InstructionKind::Normal,
        true,
    )
}

const fn marker_key(block: usize, group: ExceptionGroup) -> BlockKey {
    BlockKey::new(block, group, InstructionKind::Branch, true)
}

/// A contribution to a block's entry state.
struct Incoming {
    from: AssertionGroup,
    chain: Vec<InstrId>,
    versions: Versions,
}

/// The state of a block raising at one of its guards.
struct Raised {
    ordinal: u32,
    chain: Vec<InstrId>,
    versions: Versions,
}

/// Lowering state of the block being visited.
struct BlockState {
    index: usize,
    pre: Vec<InstrId>,
    guards: Vec<InstrId>,
    raised: Vec<Raised>,
    arms: Vec<(usize, Vec<InstrId>, Versions)>,
}

impl BlockState {
    fn reached(&self) -> Vec<InstrId> {
        let mut chain = self.pre.clone();
        chain.extend(self.guards.iter().copied());
        chain
    }
}

/// Length of the longest common prefix of `chains`.
fn common_prefix(chains: &[&[InstrId]]) -> usize {
    let Some(first) = chains.first() else {
        return 0;
    };
    chains[1..].iter().fold(first.len(), |len, chain| {
        len.min(
            first
                .iter()
                .zip(chain.iter())
                .take_while(|(a, b)| a == b)
                .count(),
        )
    })
}

pub(crate) struct Lowerer<'a> {
    body: &'a MethodBody,
    provider: &'a dyn ModelProvider,
    ctx: SmtLibStringContext,
    instructions: Vec<SmtInstruction>,
    keys: Interner<BlockKey>,
    blocks: Vec<SmtBlock>,
    incoming: BTreeMap<usize, Vec<Incoming>>,
    group_predecessors: BTreeMap<AssertionGroup, Vec<AssertionGroup>>,
    preconditions: BTreeMap<usize, Vec<InstrId>>,
    complements: HashMap<InstrId, InstrId>,
    returns: BTreeMap<usize, Option<(String, RuntimeType)>>,
    types: BTreeSet<RuntimeType>,
    calls: Vec<MethodRef>,
    parameters: Vec<(String, RuntimeType)>,
}

impl<'a> Lowerer<'a> {
    pub(crate) fn new(
        body: &'a MethodBody,
        provider: &'a dyn ModelProvider,
        call_stack: Vec<String>,
    ) -> Self {
        Lowerer {
            body,
            provider,
            ctx: SmtLibStringContext::new(call_stack),
            instructions: Vec::new(),
            keys: Interner::new(),
            blocks: Vec::new(),
            incoming: BTreeMap::new(),
            group_predecessors: BTreeMap::new(),
            preconditions: BTreeMap::new(),
            complements: HashMap::new(),
            returns: BTreeMap::new(),
            types: BTreeSet::new(),
            calls: Vec::new(),
            parameters: Vec::new(),
        }
    }

    /// Lowers every reachable block and assembles the form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedConstruct`] for operations without an encoding and
    /// [`Error::InvalidIdentity`] for reads of undefined variables.
    pub(crate) fn lower(mut self, body: Arc<MethodBody>, depth: usize) -> Result<SmtForm> {
        let source = self.body;
        for index in 0..source.blocks.len() {
            let block = source.block(index)?;
            let incoming = self.incoming.remove(&index).unwrap_or_default();
            if index != 0 && incoming.is_empty() {
                trace!(block = index, "block has no forward predecessor, skipped");
                continue;
            }
            let mut state = self.enter(index, incoming)?;
            for (op_index, op) in block.ops.iter().enumerate() {
                self.lower_op(&mut state, op_index, op)?;
            }
            self.terminate(&mut state, block)?;
        }

        debug!(
            method = %self.body.method,
            instructions = self.instructions.len(),
            blocks = self.blocks.len(),
            "method lowered"
        );

        Ok(SmtForm::assemble(
            body,
            depth,
            self.ctx,
            self.instructions,
            self.keys,
            self.blocks,
            self.group_predecessors,
            self.preconditions,
            self.returns,
            self.types,
            self.calls,
        ))
    }

    fn push(
        &mut self,
        key: BlockKey,
        source: SourceRef,
        flags: InstrFlags,
        guard: Option<u32>,
        emission: Emission,
    ) -> Result<InstrId> {
        let (handle, inserted) = self.keys.intern(key);
        if inserted {
            self.blocks.push(SmtBlock::new(key));
        }
        let id = u32::try_from(self.instructions.len())
            .map(InstrId::new)
            .map_err(|_| unsupported!("More than {} instructions in one form", u32::MAX))?;
        self.blocks
            .get_mut(handle)
            .ok_or_else(|| Error::InvalidIdentity(format!("block handle {handle} for {key}")))?
            .instructions
            .push(id);
        self.instructions.push(SmtInstruction {
            id,
            key,
            handle,
            source,
            flags,
            guard,
            emission,
        });
        Ok(id)
    }

    fn type_of(&self, var: VarId) -> Result<RuntimeType> {
        Ok(self.body.variable(var)?.ty.clone())
    }

    /// Element operations address single-dimensional arrays only.
    fn vector_of(&self, array: VarId) -> Result<()> {
        match self.type_of(array)? {
            RuntimeType::Array { rank, .. } if rank > 1 => {
                Err(unsupported!("Element access on a rank-{} array", rank))
            }
            _ => Ok(()),
        }
    }

    fn kind_of(&self, var: VarId) -> Result<PrimitiveKind> {
        let ty = self.type_of(var)?;
        ty.primitive()
            .ok_or_else(|| unsupported!("{} of type {} is not primitive", var, ty))
    }

    fn operand(&self, var: VarId) -> Result<Term> {
        Ok(Term::var(self.ctx.current(var)?))
    }

    /// Arrays, classes and types without a definition can be null; strings cannot.
    fn is_reference(&self, ty: &RuntimeType) -> bool {
        match ty {
            RuntimeType::Primitive(_) => false,
            RuntimeType::Array { .. } => true,
            RuntimeType::Named(name) => self
                .provider
                .type_def(name)
                .map_or(true, |def| def.kind == TypeKind::Class),
        }
    }

    fn declare(
        &mut self,
        var: VarId,
        block: usize,
        op: Option<usize>,
        origin: ConstantOrigin,
    ) -> Result<String> {
        let variable = self.body.variable(var)?;
        let ty = variable.ty.clone();
        let name = self.ctx.define(var, &sanitize(&variable.name), origin);
        self.types.insert(ty.clone());

        let mut aliases = Vec::new();
        if op.is_none() && matches!(variable.origin, VarOrigin::Argument(_)) && ty.primitive().is_none() {
            aliases = self
                .parameters
                .iter()
                .filter(|(_, other)| *other == ty)
                .map(|(other, _)| other.clone())
                .collect();
            self.parameters.push((name.clone(), ty.clone()));
        }

        self.push(
            declaration_key(block),
            SourceRef { block, op },
            InstrFlags::empty(),
            None,
            Emission::Declare {
                name: name.clone(),
                ty,
                origin,
                aliases,
            },
        )?;
        Ok(name)
    }

    fn define(&mut self, block: usize, op: usize, dest: VarId, term: Term, origin: ConstantOrigin) -> Result<String> {
        let name = self.declare(dest, block, Some(op), origin)?;
        self.push(
            normal_key(block),
            SourceRef {
                block,
                op: Some(op),
            },
            InstrFlags::empty(),
            None,
            Emission::Define {
                name: name.clone(),
                term,
            },
        )?;
        Ok(name)
    }

    fn flow(&mut self, source: usize, target: usize, incoming: Incoming) {
        if target <= source {
            trace!(source, target, "back edge ignored");
            return;
        }
        self.incoming.entry(target).or_default().push(incoming);
    }

    fn complementary(&self, suffixes: &[Vec<InstrId>]) -> bool {
        match suffixes {
            [first, second] if first.len() == 1 && second.len() == 1 => {
                self.complements.get(&first[0]) == Some(&second[0])
            }
            _ => false,
        }
    }

    fn enter(&mut self, index: usize, incoming: Vec<Incoming>) -> Result<BlockState> {
        let group = AssertionGroup::normal(index);
        if incoming.is_empty() {
            let arguments: Vec<(VarId, u16)> = self
                .body
                .arguments()
                .iter()
                .map(|var| match var.origin {
                    VarOrigin::Argument(position) => (var.id, position),
                    _ => (var.id, u16::MAX),
                })
                .collect();
            for (var, position) in arguments {
                self.declare(var, index, None, ConstantOrigin::Parameter(position))?;
            }
            self.group_predecessors.insert(group, Vec::new());
            self.preconditions.insert(index, Vec::new());
            return Ok(BlockState {
                index,
                pre: Vec::new(),
                guards: Vec::new(),
                raised: Vec::new(),
                arms: Vec::new(),
            });
        }

        let mut predecessors = Vec::new();
        for contribution in &incoming {
            if !predecessors.contains(&contribution.from) {
                predecessors.push(contribution.from);
            }
        }
        self.group_predecessors.insert(group, predecessors);

        let chains: Vec<&[InstrId]> = incoming.iter().map(|c| c.chain.as_slice()).collect();
        let shared = common_prefix(&chains);
        let suffixes: Vec<Vec<InstrId>> = incoming
            .iter()
            .map(|c| c.chain[shared..].to_vec())
            .collect();
        let mut pre = incoming[0].chain[..shared].to_vec();
        if incoming.len() > 1
            && !suffixes.iter().any(Vec::is_empty)
            && !self.complementary(&suffixes)
        {
            let merge = self.push(
                marker_key(index, AN),
                SourceRef {
                    block: index,
                    op: None,
                },
                InstrFlags::ASSERTION | InstrFlags::BRANCHABLE,
                None,
                Emission::Merge {
                    arms: suffixes.clone(),
                },
            )?;
            pre.push(merge);
        }
        self.preconditions.insert(index, pre.clone());

        let mut entry = Versions::new();
        for contribution in &incoming {
            for (var, name) in &contribution.versions {
                entry.entry(*var).or_insert_with(|| name.clone());
            }
        }
        self.ctx.set_versions(entry.clone());

        for var in entry.keys().copied() {
            let mut names = Vec::with_capacity(incoming.len());
            for contribution in &incoming {
                match contribution.versions.get(&var) {
                    Some(name) => names.push(name.clone()),
                    None => break,
                }
            }
            if names.len() != incoming.len() || names.iter().all(|name| *name == names[0]) {
                continue;
            }
            let arms = names
                .into_iter()
                .zip(&suffixes)
                .map(|(name, suffix)| PhiArm {
                    conditions: suffix.clone(),
                    value: Term::var(name),
                })
                .collect();
            let name = self.declare(var, index, None, ConstantOrigin::Variable)?;
            self.push(
                normal_key(index),
                SourceRef {
                    block: index,
                    op: None,
                },
                InstrFlags::empty(),
                None,
                Emission::Phi { name, arms },
            )?;
        }

        Ok(BlockState {
            index,
            pre,
            guards: Vec::new(),
            raised: Vec::new(),
            arms: incoming
                .into_iter()
                .zip(suffixes)
                .map(|(c, suffix)| (c.from.block, suffix, c.versions))
                .collect(),
        })
    }

    fn guard(&mut self, state: &mut BlockState, op: usize, cond: Term) -> Result<()> {
        let block = state.index;
        let ordinal = u32::try_from(state.guards.len())
            .map_err(|_| unsupported!("Too many raising operations in block {}", block))?;
        let source = SourceRef {
            block,
            op: Some(op),
        };
        let reached = state.reached();
        let positive = self.push(
            guard_key(block),
            source,
            InstrFlags::ASSERTION,
            Some(ordinal),
            Emission::Guard {
                reached: reached.clone(),
                cond: cond.clone(),
                negated: false,
            },
        )?;
        let negative = self.push(
            raise_key(block, ordinal),
            source,
            InstrFlags::ASSERTION | InstrFlags::RAISES,
            Some(ordinal),
            Emission::Guard {
                reached: reached.clone(),
                cond,
                negated: true,
            },
        )?;
        self.push(
            marker_key(block, ExceptionGroup::SomethingBranch(ordinal)),
            source,
            InstrFlags::BRANCHABLE,
            None,
            Emission::Own { cond: None },
        )?;

        let mut chain = reached;
        chain.push(negative);
        state.raised.push(Raised {
            ordinal,
            chain,
            versions: self.ctx.versions().clone(),
        });
        state.guards.push(positive);
        Ok(())
    }

    fn null_guard(&mut self, state: &mut BlockState, op: usize, var: VarId) -> Result<()> {
        let ty = self.type_of(var)?;
        if !self.is_reference(&ty) {
            return Ok(());
        }
        let value = self.operand(var)?;
        self.guard(state, op, Term::not(Term::IsNull(ty, Box::new(value))))
    }

    fn bounds_guard(&mut self, state: &mut BlockState, op: usize, array: VarId, index: VarId) -> Result<()> {
        let ty = self.type_of(array)?;
        let cond = Term::InBounds {
            ty,
            array: Box::new(self.operand(array)?),
            index: Box::new(self.operand(index)?),
        };
        self.guard(state, op, cond)
    }

    /// Writes a new version of `var` from a term over its previous version.
    fn update(&mut self, block: usize, op: usize, var: VarId, term: Term, previous: &str) -> Result<()> {
        let name = self.define(block, op, var, term, ConstantOrigin::Variable)?;
        self.ctx.relate(name, previous);
        Ok(())
    }

    fn lower_op(&mut self, state: &mut BlockState, op_index: usize, op: &Op) -> Result<()> {
        let block = state.index;
        let local = ConstantOrigin::Variable;
        match op {
            Op::Const { dest, value } => {
                let term = match value {
                    Literal::Int(_, value) => Term::Int(*value),
                    Literal::Bool(value) => Term::Bool(*value),
                    Literal::Str(text) => Term::Str(text.clone()),
                    Literal::Null(ty) => {
                        self.types.insert(ty.clone());
                        Term::Null(ty.clone())
                    }
                };
                self.define(block, op_index, *dest, term, local)?;
            }
            Op::Copy { dest, src } => {
                let source = self.ctx.current(*src)?.to_string();
                let origin = match self.ctx.origin_of(&source) {
                    ConstantOrigin::Parameter(position) => ConstantOrigin::Parameter(position),
                    _ => local,
                };
                let name = self.define(block, op_index, *dest, Term::var(source.clone()), origin)?;
                self.ctx.relate(name, source);
            }
            Op::Binary {
                dest,
                op,
                left,
                right,
            } => {
                let kind = self.kind_of(*dest)?;
                let l = self.operand(*left)?;
                let r = self.operand(*right)?;
                if op.divides() {
                    self.guard(state, op_index, Term::not(Term::eq(r.clone(), Term::Int(0))))?;
                    if let (true, Some((min, _))) = (kind.is_signed(), kind.bounds()) {
                        let overflows = Term::Apply(
                            "and",
                            vec![Term::eq(l.clone(), Term::Int(min)), Term::eq(r.clone(), Term::Int(-1))],
                        );
                        self.guard(state, op_index, Term::not(overflows))?;
                    }
                }
                let term = binary_term(*op, kind, l, r)?;
                self.define(block, op_index, *dest, term, local)?;
            }
            Op::Compare {
                dest,
                op,
                left,
                right,
            } => {
                let ty = self.type_of(*left)?;
                let l = self.operand(*left)?;
                let r = self.operand(*right)?;
                let term = compare_term(*op, ty, l, r)?;
                self.define(block, op_index, *dest, term, local)?;
            }
            Op::Not { dest, src } => {
                let kind = self.kind_of(*src)?;
                let value = self.operand(*src)?;
                let term = match kind {
                    PrimitiveKind::Boolean => Term::not(value),
                    k if k.is_integral() => Term::BitNot(k, Box::new(value)),
                    k => return Err(unsupported!("Not on {}", k)),
                };
                self.define(block, op_index, *dest, term, local)?;
            }
            Op::Negate { dest, src } => {
                let kind = self.kind_of(*dest)?;
                if !kind.is_integral() {
                    return Err(unsupported!("Negate on {}", kind));
                }
                let term = Term::Wrap(kind, Box::new(Term::Apply("-", vec![self.operand(*src)?])));
                self.define(block, op_index, *dest, term, local)?;
            }
            Op::Convert { dest, src, to } => {
                let term = Term::Convert {
                    from: self.kind_of(*src)?,
                    to: *to,
                    value: Box::new(self.operand(*src)?),
                };
                self.define(block, op_index, *dest, term, local)?;
            }
            Op::Phi { dest, operands } => {
                let mut arms = Vec::new();
                for (predecessor, var) in operands {
                    for (from, suffix, versions) in &state.arms {
                        if from != predecessor {
                            continue;
                        }
                        if let Some(name) = versions.get(var) {
                            arms.push(PhiArm {
                                conditions: suffix.clone(),
                                value: Term::var(name.clone()),
                            });
                        }
                    }
                }
                match arms.len() {
                    0 => return Err(unsupported!("Phi for {} has no forward operand", dest)),
                    1 => {
                        let value = arms.remove(0).value;
                        self.define(block, op_index, *dest, value, local)?;
                    }
                    _ => {
                        let name = self.declare(*dest, block, Some(op_index), local)?;
                        self.push(
                            normal_key(block),
                            SourceRef {
                                block,
                                op: Some(op_index),
                            },
                            InstrFlags::empty(),
                            None,
                            Emission::Phi { name, arms },
                        )?;
                    }
                }
            }
            Op::NewObject { dest, ty } => {
                let ty = RuntimeType::Named(ty.clone());
                self.types.insert(ty.clone());
                let pointer = self.ctx.allocate_pointer();
                self.define(block, op_index, *dest, Term::NewObject { ty, pointer }, local)?;
            }
            Op::NewArray {
                dest,
                element,
                length,
            } => {
                let len = self.operand(*length)?;
                self.guard(state, op_index, Term::Apply("<=", vec![Term::Int(0), len.clone()]))?;
                let ty = RuntimeType::array_of(element.clone());
                self.types.insert(ty.clone());
                let pointer = self.ctx.allocate_pointer();
                let name = self.declare(*dest, block, Some(op_index), local)?;
                self.push(
                    normal_key(block),
                    SourceRef {
                        block,
                        op: Some(op_index),
                    },
                    InstrFlags::empty(),
                    None,
                    Emission::Allocate {
                        name,
                        ty,
                        pointer,
                        length: len,
                    },
                )?;
            }
            Op::LoadField {
                dest,
                object,
                field,
            } => {
                self.null_guard(state, op_index, *object)?;
                let term = Term::Field {
                    ty: self.type_of(*object)?,
                    field: field.clone(),
                    object: Box::new(self.operand(*object)?),
                };
                self.define(block, op_index, *dest, term, local)?;
            }
            Op::StoreField {
                object,
                field,
                value,
            } => {
                self.null_guard(state, op_index, *object)?;
                let previous = self.ctx.current(*object)?.to_string();
                let term = Term::WithField {
                    ty: self.type_of(*object)?,
                    field: field.clone(),
                    object: Box::new(Term::var(previous.clone())),
                    value: Box::new(self.operand(*value)?),
                };
                self.update(block, op_index, *object, term, &previous)?;
            }
            Op::LoadElement { dest, array, index } => {
                self.vector_of(*array)?;
                self.null_guard(state, op_index, *array)?;
                self.bounds_guard(state, op_index, *array, *index)?;
                let term = Term::Element {
                    ty: self.type_of(*array)?,
                    array: Box::new(self.operand(*array)?),
                    index: Box::new(self.operand(*index)?),
                };
                self.define(block, op_index, *dest, term, local)?;
            }
            Op::StoreElement {
                array,
                index,
                value,
            } => {
                self.vector_of(*array)?;
                self.null_guard(state, op_index, *array)?;
                self.bounds_guard(state, op_index, *array, *index)?;
                let previous = self.ctx.current(*array)?.to_string();
                let term = Term::WithElement {
                    ty: self.type_of(*array)?,
                    array: Box::new(Term::var(previous.clone())),
                    index: Box::new(self.operand(*index)?),
                    value: Box::new(self.operand(*value)?),
                };
                self.update(block, op_index, *array, term, &previous)?;
            }
            Op::ArrayLength { dest, array } => {
                self.null_guard(state, op_index, *array)?;
                let term = Term::Length {
                    ty: self.type_of(*array)?,
                    value: Box::new(self.operand(*array)?),
                };
                self.define(block, op_index, *dest, term, local)?;
            }
            Op::Call { dest, method, args } => {
                self.lower_call(state, op_index, *dest, method, args)?;
            }
        }
        Ok(())
    }

    fn lower_call(
        &mut self,
        state: &mut BlockState,
        op_index: usize,
        dest: Option<VarId>,
        method: &MethodRef,
        args: &[VarId],
    ) -> Result<()> {
        let block = state.index;
        let expected = method.argument_types();
        if expected.len() != args.len() {
            return Err(unsupported!(
                "Call to {} passes {} arguments, signature takes {}",
                method,
                args.len(),
                expected.len()
            ));
        }
        if method.has_this {
            if let Some(receiver) = args.first() {
                self.null_guard(state, op_index, *receiver)?;
            }
        }
        self.types.extend(expected);
        if let Some(ret) = &method.ret {
            self.types.insert(ret.clone());
        }

        let mut arguments = Vec::with_capacity(args.len());
        for arg in args {
            arguments.push((self.ctx.current(*arg)?.to_string(), self.type_of(*arg)?));
        }
        let site = self.ctx.next_site();
        let reached = state.reached();
        let dest = match dest {
            Some(var) => {
                let ty = self.type_of(var)?;
                Some((
                    self.declare(var, block, Some(op_index), ConstantOrigin::Variable)?,
                    ty,
                ))
            }
            None => None,
        };

        let signature = method.signature();
        if !self.calls.iter().any(|known| known.signature() == signature) {
            self.calls.push(method.clone());
        }
        self.push(
            normal_key(block),
            SourceRef {
                block,
                op: Some(op_index),
            },
            InstrFlags::CALL,
            None,
            Emission::Call(CallSite {
                site,
                method: method.clone(),
                args: arguments,
                dest,
                reached,
            }),
        )?;
        Ok(())
    }

    fn terminate(&mut self, state: &mut BlockState, block: &BasicBlock) -> Result<()> {
        let index = state.index;
        let source = SourceRef { block: index, op: None };
        let own = match &block.terminator {
            Terminator::Branch { condition, .. } => Some(self.operand(*condition)?),
            _ => None,
        };
        self.push(
            marker_key(index, AN),
            source,
            InstrFlags::BRANCHABLE,
            None,
            Emission::Own { cond: own },
        )?;

        let normal = state.reached();
        let versions = self.ctx.versions().clone();
        let from = AssertionGroup::normal(index);
        match &block.terminator {
            Terminator::Jump(target) => self.flow(
                index,
                *target,
                Incoming {
                    from,
                    chain: normal,
                    versions,
                },
            ),
            Terminator::Branch {
                if_true, if_false, ..
            } if if_true == if_false => self.flow(
                index,
                *if_true,
                Incoming {
                    from,
                    chain: normal,
                    versions,
                },
            ),
            Terminator::Branch {
                condition,
                if_true,
                if_false,
            } => {
                let cond = self.operand(*condition)?;
                let mut edges = Vec::with_capacity(2);
                for (target, term) in [(*if_true, cond.clone()), (*if_false, Term::not(cond))] {
                    if target <= index {
                        trace!(source = index, target, "back edge ignored");
                        continue;
                    }
                    let edge = self.push(
                        marker_key(target, AN),
                        source,
                        InstrFlags::ASSERTION | InstrFlags::BRANCHABLE,
                        None,
                        Emission::Edge { cond: term },
                    )?;
                    edges.push(edge);
                    let mut chain = normal.clone();
                    chain.push(edge);
                    self.flow(
                        index,
                        target,
                        Incoming {
                            from,
                            chain,
                            versions: versions.clone(),
                        },
                    );
                }
                if let [positive, negative] = edges[..] {
                    self.complements.insert(positive, negative);
                    self.complements.insert(negative, positive);
                }
            }
            Terminator::Return(value) => {
                let value = match value {
                    Some(var) => Some((self.ctx.current(*var)?.to_string(), self.type_of(*var)?)),
                    None => None,
                };
                self.returns.insert(index, value);
            }
            Terminator::Throw(_) => {
                if let Some(handler) = block.handler {
                    self.flow(
                        index,
                        handler,
                        Incoming {
                            from,
                            chain: normal,
                            versions,
                        },
                    );
                }
            }
        }

        if let Some(handler) = block.handler {
            for raised in std::mem::take(&mut state.raised) {
                self.flow(
                    index,
                    handler,
                    Incoming {
                        from: AssertionGroup::new(
                            index,
                            ExceptionGroup::SomethingBranch(raised.ordinal),
                        ),
                        chain: raised.chain,
                        versions: raised.versions,
                    },
                );
            }
        }
        Ok(())
    }
}

fn binary_term(op: BinaryOp, kind: PrimitiveKind, left: Term, right: Term) -> Result<Term> {
    let pair = vec![left.clone(), right.clone()];
    match (kind, op) {
        (PrimitiveKind::String, BinaryOp::Add) => Ok(Term::Apply("seq.++", pair)),
        (PrimitiveKind::Boolean, BinaryOp::And) => Ok(Term::Apply("and", pair)),
        (PrimitiveKind::Boolean, BinaryOp::Or) => Ok(Term::Apply("or", pair)),
        (PrimitiveKind::Boolean, BinaryOp::Xor) => Ok(Term::Apply("xor", pair)),
        (k, op) if k.is_integral() => Ok(match op {
            BinaryOp::Add => Term::Wrap(k, Box::new(Term::Apply("+", pair))),
            BinaryOp::Sub => Term::Wrap(k, Box::new(Term::Apply("-", pair))),
            BinaryOp::Mul => Term::Wrap(k, Box::new(Term::Apply("*", pair))),
            BinaryOp::Div => Term::Wrap(k, Box::new(Term::TruncDiv(Box::new(left), Box::new(right)))),
            BinaryOp::Rem => Term::Wrap(k, Box::new(Term::TruncRem(Box::new(left), Box::new(right)))),
            BinaryOp::And => Term::Bitwise("bvand", k, Box::new(left), Box::new(right)),
            BinaryOp::Or => Term::Bitwise("bvor", k, Box::new(left), Box::new(right)),
            BinaryOp::Xor => Term::Bitwise("bvxor", k, Box::new(left), Box::new(right)),
        }),
        (k, op) => Err(unsupported!("{} on {}", op, k)),
    }
}

fn compare_term(op: CompareOp, ty: RuntimeType, left: Term, right: Term) -> Result<Term> {
    let ordered = |name: &'static str| Term::Apply(name, vec![left.clone(), right.clone()]);
    match ty.primitive() {
        Some(kind) => match op {
            CompareOp::Eq => Ok(Term::eq(left.clone(), right.clone())),
            CompareOp::Ne => Ok(Term::not(Term::eq(left.clone(), right.clone()))),
            _ if !kind.is_integral() => Err(unsupported!("{} on {}", op, kind)),
            CompareOp::Lt => Ok(ordered("<")),
            CompareOp::Le => Ok(ordered("<=")),
            CompareOp::Gt => Ok(ordered(">")),
            CompareOp::Ge => Ok(ordered(">=")),
        },
        None => match op {
            CompareOp::Eq => Ok(Term::Equals(ty, Box::new(left), Box::new(right))),
            CompareOp::Ne => Ok(Term::not(Term::Equals(ty, Box::new(left), Box::new(right)))),
            _ => Err(unsupported!("{} on reference type {}", op, ty)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_prefix() {
        let a = [InstrId::new(1), InstrId::new(2), InstrId::new(3)];
        let b = [InstrId::new(1), InstrId::new(2), InstrId::new(4)];
        let c = [InstrId::new(1)];
        assert_eq!(common_prefix(&[&a, &b]), 2);
        assert_eq!(common_prefix(&[&a, &b, &c]), 1);
        assert_eq!(common_prefix(&[&a]), 3);
        assert_eq!(common_prefix(&[]), 0);
    }

    #[test]
    fn test_binary_terms() {
        let term = binary_term(
            BinaryOp::Add,
            PrimitiveKind::Int32,
            Term::var("a.0"),
            Term::var("b.0"),
        )
        .unwrap();
        assert!(matches!(term, Term::Wrap(PrimitiveKind::Int32, _)));
        assert!(binary_term(BinaryOp::Mul, PrimitiveKind::Boolean, Term::Bool(true), Term::Bool(false)).is_err());
        assert_eq!(
            binary_term(BinaryOp::Add, PrimitiveKind::String, Term::var("s.0"), Term::var("t.0")).unwrap(),
            Term::Apply("seq.++", vec![Term::var("s.0"), Term::var("t.0")])
        );
    }

    #[test]
    fn test_compare_on_references() {
        let ty = RuntimeType::named("Sample.Node");
        assert!(matches!(
            compare_term(CompareOp::Eq, ty.clone(), Term::var("a.0"), Term::var("b.0")).unwrap(),
            Term::Equals(..)
        ));
        assert!(compare_term(CompareOp::Lt, ty, Term::var("a.0"), Term::var("b.0")).is_err());
    }
}
