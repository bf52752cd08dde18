//! The symbolic form of one method.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use dashmap::DashMap;

use crate::{
    encoding::SentenceRepository,
    form::{
        predicate::{
            GuardBefore, InGroup, IsAssertion, IsBranchPrecondition, IsDeclaration,
            IsExceptionGuard, IsNormal, PredecessorOf, SameBlock, Predicate,
        },
        AssertionGroup, BlockKey, BlockSlices, ExceptionGroup, InstrId, InstructionKind,
        SmtBlock, SmtInstruction,
    },
    formula::{MethodEncoding, SmtLibStringContext},
    model::{MethodBody, MethodRef, RuntimeType, TypeName},
    utils::{DotWriter, Interner},
    Error, Result,
};

/// A method lowered into instructions partitioned by block, exception group, kind and
/// assertion role.
///
/// The form is immutable once lowered except for its method encodings, which the
/// resolution loop fills in through [`SmtForm::set_encoding`].
#[derive(Debug)]
pub struct SmtForm {
    body: Arc<MethodBody>,
    depth: usize,
    context: SmtLibStringContext,
    instructions: Vec<SmtInstruction>,
    keys: Interner<BlockKey>,
    blocks: Vec<SmtBlock>,
    groups: Vec<AssertionGroup>,
    group_predecessors: BTreeMap<AssertionGroup, Vec<AssertionGroup>>,
    preconditions: BTreeMap<usize, Vec<InstrId>>,
    returns: BTreeMap<usize, Option<(String, RuntimeType)>>,
    types: BTreeSet<RuntimeType>,
    calls: Vec<MethodRef>,
    encodings: DashMap<String, MethodEncoding>,
}

fn select<S: Predicate<SmtInstruction>>(
    instructions: &[SmtInstruction],
    predicate: S,
) -> Vec<InstrId> {
    instructions
        .iter()
        .filter(|instruction| predicate.is_satisfied_by(instruction))
        .map(SmtInstruction::id)
        .collect()
}

fn slices_for(
    instructions: &[SmtInstruction],
    key: &BlockKey,
    preconditions: &BTreeMap<usize, Vec<InstrId>>,
) -> BlockSlices {
    let block = key.index;
    let exception_guards = select(
        instructions,
        SameBlock(block)
            .and(InGroup(ExceptionGroup::AllNormal))
            .and(IsExceptionGuard),
    );
    let same_block_assertions = match key.group {
        ExceptionGroup::NotApplicable => Vec::new(),
        ExceptionGroup::AllNormal => exception_guards.clone(),
        ExceptionGroup::SomethingBranch(ordinal) => {
            let mut assertions = select(
                instructions,
                SameBlock(block)
                    .and(InGroup(ExceptionGroup::AllNormal))
                    .and(GuardBefore(ordinal)),
            );
            assertions.extend(select(
                instructions,
                SameBlock(block)
                    .and(InGroup(key.group))
                    .and(IsExceptionGuard),
            ));
            assertions
        }
    };

    let mut branch_preconditions = preconditions.get(&block).cloned().unwrap_or_default();
    if key.group != ExceptionGroup::NotApplicable {
        let own = select(
            instructions,
            SameBlock(block)
                .and(InGroup(key.group))
                .and(IsBranchPrecondition)
                .and(IsAssertion.not()),
        );
        branch_preconditions.extend(own.last().copied());
    }

    BlockSlices {
        declarations: select(instructions, SameBlock(block).and(IsDeclaration)),
        same_block_assertions,
        normals: select(
            instructions,
            SameBlock(block)
                .and(IsNormal)
                .and(InGroup(ExceptionGroup::NotApplicable)),
        ),
        branch_preconditions,
        exception_guards,
    }
}

impl SmtForm {
    /// Computes slices, block edges and the path groups of a lowered method.
    pub(crate) fn assemble(
        body: Arc<MethodBody>,
        depth: usize,
        context: SmtLibStringContext,
        instructions: Vec<SmtInstruction>,
        keys: Interner<BlockKey>,
        mut blocks: Vec<SmtBlock>,
        group_predecessors: BTreeMap<AssertionGroup, Vec<AssertionGroup>>,
        preconditions: BTreeMap<usize, Vec<InstrId>>,
        returns: BTreeMap<usize, Option<(String, RuntimeType)>>,
        types: BTreeSet<RuntimeType>,
        calls: Vec<MethodRef>,
    ) -> Self {
        for block in &mut blocks {
            block.slices = slices_for(&instructions, &block.key, &preconditions);
        }

        let empty = Vec::new();
        let mut edges = Vec::new();
        for (handle, block) in blocks.iter().enumerate() {
            let normal = AssertionGroup::normal(block.key.index);
            let preds = group_predecessors.get(&normal).unwrap_or(&empty);
            let predecessor = PredecessorOf(preds);
            for (other, candidate) in blocks.iter().enumerate() {
                if predecessor.is_satisfied_by(candidate) {
                    edges.push((other, handle));
                }
            }
        }
        for (from, to) in edges {
            blocks[to].predecessors.push(from);
            blocks[from].successors.push(to);
        }

        let groups: BTreeSet<AssertionGroup> = keys
            .iter()
            .filter(|(_, key)| key.assertion)
            .map(|(_, key)| key.assertion_group())
            .collect();

        SmtForm {
            body,
            depth,
            context,
            instructions,
            keys,
            blocks,
            groups: groups.into_iter().collect(),
            group_predecessors,
            preconditions,
            returns,
            types,
            calls,
            encodings: DashMap::new(),
        }
    }

    /// The lowered method.
    #[must_use]
    pub fn method(&self) -> &MethodRef {
        &self.body.method
    }

    /// The lowered body.
    #[must_use]
    pub fn body(&self) -> &Arc<MethodBody> {
        &self.body
    }

    /// Inlining depth; `0` for the method under test.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Naming state after lowering.
    #[must_use]
    pub fn context(&self) -> &SmtLibStringContext {
        &self.context
    }

    /// All instructions in creation order.
    #[must_use]
    pub fn instructions(&self) -> &[SmtInstruction] {
        &self.instructions
    }

    /// Looks up an instruction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIdentity`] if `id` does not belong to this form.
    pub fn instruction(&self, id: InstrId) -> Result<&SmtInstruction> {
        self.instructions
            .get(id.index())
            .ok_or_else(|| Error::InvalidIdentity(format!("{id} in form of {}", self.method())))
    }

    /// All blocks, indexed by handle.
    #[must_use]
    pub fn blocks(&self) -> &[SmtBlock] {
        &self.blocks
    }

    /// Looks up a block by handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIdentity`] if `handle` is out of range.
    pub fn block(&self, handle: usize) -> Result<&SmtBlock> {
        self.blocks
            .get(handle)
            .ok_or_else(|| Error::InvalidIdentity(format!("block handle {handle} in form of {}", self.method())))
    }

    /// Handle of the block with the given key.
    #[must_use]
    pub fn block_handle(&self, key: &BlockKey) -> Option<usize> {
        self.keys.get(key)
    }

    /// Slices of the block that closes an assertion group.
    #[must_use]
    pub fn slices_of(&self, group: AssertionGroup) -> Option<&BlockSlices> {
        let key = BlockKey::new(group.block, group.group, InstructionKind::Branch, true);
        self.block_handle(&key)
            .and_then(|handle| self.blocks.get(handle))
            .map(SmtBlock::slices)
    }

    /// Assertion groups in `(block, group)` order; one path each.
    #[must_use]
    pub fn groups(&self) -> &[AssertionGroup] {
        &self.groups
    }

    /// Groups control may come from when entering `group`'s block.
    ///
    /// Every group of a block shares the predecessors of its normal group.
    #[must_use]
    pub fn predecessors_of(&self, group: AssertionGroup) -> &[AssertionGroup] {
        self.group_predecessors
            .get(&AssertionGroup::normal(group.block))
            .map_or(&[], Vec::as_slice)
    }

    /// Entry chains, `PRE(b)`, by basic block.
    #[must_use]
    pub fn preconditions(&self) -> &BTreeMap<usize, Vec<InstrId>> {
        &self.preconditions
    }

    /// Returning blocks with the returned constant.
    #[must_use]
    pub fn returns(&self) -> &BTreeMap<usize, Option<(String, RuntimeType)>> {
        &self.returns
    }

    /// Every type the form mentions.
    #[must_use]
    pub fn types(&self) -> &BTreeSet<RuntimeType> {
        &self.types
    }

    /// Distinct invoked methods in first-call order.
    #[must_use]
    pub fn calls(&self) -> &[MethodRef] {
        &self.calls
    }

    /// Named types without a sentence yet.
    #[must_use]
    pub fn unknown_types(&self, repo: &SentenceRepository) -> Vec<TypeName> {
        let types: Vec<RuntimeType> = self
            .types
            .iter()
            .filter(|ty| ty.primitive().is_none())
            .cloned()
            .collect();
        repo.closure_of(&types).err().unwrap_or_default()
    }

    /// Invoked methods without an encoding yet.
    #[must_use]
    pub fn unknown_methods(&self) -> Vec<MethodRef> {
        self.calls
            .iter()
            .filter(|method| !self.encodings.contains_key(&method.signature()))
            .cloned()
            .collect()
    }

    /// The encoding registered for a signature.
    #[must_use]
    pub fn encoding(&self, signature: &str) -> Option<MethodEncoding> {
        self.encodings.get(signature).map(|entry| entry.value().clone())
    }

    /// Registers how calls to `signature` are rendered.
    pub fn set_encoding(&self, signature: String, encoding: MethodEncoding) {
        self.encodings.insert(signature, encoding);
    }

    /// Renders the group graph in DOT format.
    #[must_use]
    pub fn to_dot(&self) -> String {
        let mut dot = DotWriter::new(&self.method().to_string());
        for group in &self.groups {
            let assertions = self
                .blocks
                .iter()
                .filter(|block| block.key.assertion_group() == *group)
                .map(|block| block.instructions.len())
                .sum::<usize>();
            dot.node(&group.to_string(), &format!("{group}\n{assertions} instructions"));
        }
        for group in &self.groups {
            for predecessor in self.predecessors_of(*group) {
                dot.edge(&predecessor.to_string(), &group.to_string(), None);
            }
        }
        dot.finish()
    }
}
