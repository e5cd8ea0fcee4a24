//! Basic blocks, block arguments and instruction list operations.
//!
//! A block's instructions form a doubly linked list threaded through the
//! `prev`/`next` fields of the instruction nodes; the block itself only
//! stores the head, the tail and a length counter. Linking, unlinking and
//! relinking a range are pointer updates on the arena, so no instruction
//! is ever reallocated while it stays in its function.
//!
//! Every list operation asserts the structural invariants it relies on
//! (an instruction is linked at most once, a result is dead before it is
//! erased). Violations are bugs in the caller and panic.

use smallvec::SmallVec;

use crate::arena::{define_id, Arena};
use crate::inst::Instruction;
use crate::ownership::OwnershipMismatch;
use crate::value::ValueData;
use crate::{Function, InstId, Name, OwnershipKind, Ty, TypeFacts, Value};

define_id!(
    /// Handle to a basic block within one function.
    BlockId,
    "bb"
);

define_id!(
    /// Handle to a block argument within one function.
    ArgId,
    "a"
);

// ── Arguments ───────────────────────────────────────────────────────

/// Which kind of block argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ArgKind {
    /// A formal parameter; only legal in the entry block.
    Function,
    /// A value that may differ per predecessor; only legal in non-entry
    /// blocks.
    Phi,
}

/// A value produced at a block boundary.
#[derive(Clone, Debug)]
pub struct Argument {
    pub(crate) kind: ArgKind,
    pub(crate) block: BlockId,
    pub(crate) index: u32,
    pub(crate) data: ValueData,
    pub(crate) decl: Option<Name>,
}

impl Argument {
    #[inline]
    pub fn kind(&self) -> ArgKind {
        self.kind
    }

    /// The block whose argument list holds this argument.
    #[inline]
    pub fn block(&self) -> BlockId {
        self.block
    }

    /// Position in the block's argument list.
    #[inline]
    pub fn index(&self) -> usize {
        self.index as usize
    }

    #[inline]
    pub fn ty(&self) -> Ty {
        self.data.ty
    }

    #[inline]
    pub fn ownership(&self) -> OwnershipKind {
        self.data.ownership
    }

    /// Declaration this argument was lowered from, for debug info.
    #[inline]
    pub fn decl(&self) -> Option<Name> {
        self.decl
    }
}

// ── Blocks ──────────────────────────────────────────────────────────

/// A basic block: an instruction list and an argument list.
#[derive(Clone, Debug, Default)]
pub struct BasicBlock {
    pub(crate) head: Option<InstId>,
    pub(crate) tail: Option<InstId>,
    pub(crate) len: usize,
    pub(crate) args: Vec<ArgId>,
}

impl BasicBlock {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn first_inst(&self) -> Option<InstId> {
        self.head
    }

    #[inline]
    pub fn last_inst(&self) -> Option<InstId> {
        self.tail
    }

    /// Number of linked instructions.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn args(&self) -> &[ArgId] {
        &self.args
    }
}

/// Iterator over the instructions of one block.
pub struct BlockInsts<'a> {
    insts: &'a Arena<InstId, Instruction>,
    front: Option<InstId>,
    back: Option<InstId>,
    remaining: usize,
}

impl Iterator for BlockInsts<'_> {
    type Item = InstId;

    fn next(&mut self) -> Option<InstId> {
        if self.remaining == 0 {
            return None;
        }
        let id = self.front?;
        self.remaining -= 1;
        self.front = self.insts[id].next;
        Some(id)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl DoubleEndedIterator for BlockInsts<'_> {
    fn next_back(&mut self) -> Option<InstId> {
        if self.remaining == 0 {
            return None;
        }
        let id = self.back?;
        self.remaining -= 1;
        self.back = self.insts[id].prev;
        Some(id)
    }
}

impl ExactSizeIterator for BlockInsts<'_> {}

// ── Block queries ───────────────────────────────────────────────────

impl Function {
    /// Iterate over the instructions of `block` in order.
    pub fn block_insts(&self, block: BlockId) -> BlockInsts<'_> {
        let b = &self.blocks[block];
        BlockInsts {
            insts: &self.insts,
            front: b.head,
            back: b.tail,
            remaining: b.len,
        }
    }

    /// Number of instructions in `block`.
    #[inline]
    pub fn block_len(&self, block: BlockId) -> usize {
        self.blocks[block].len
    }

    /// Arguments of `block` in order.
    #[inline]
    pub fn block_args(&self, block: BlockId) -> &[ArgId] {
        &self.blocks[block].args
    }

    /// Whether `block` is the first block of the function.
    pub fn is_entry(&self, block: BlockId) -> bool {
        self.layout.first() == Some(&block)
    }

    /// The last instruction of `block` if it is a terminator.
    pub fn terminator(&self, block: BlockId) -> Option<InstId> {
        let tail = self.blocks[block].tail?;
        self.insts[tail].is_terminator().then_some(tail)
    }

    /// Distinct successor blocks, in terminator operand order.
    pub fn successors(&self, block: BlockId) -> SmallVec<[BlockId; 2]> {
        let Some(term) = self.terminator(block) else {
            return SmallVec::new();
        };
        let mut succs = self.insts[term].kind.successors();
        let mut seen = SmallVec::<[BlockId; 4]>::new();
        succs.retain(|b| {
            if seen.contains(b) {
                false
            } else {
                seen.push(*b);
                true
            }
        });
        succs
    }

    /// Distinct blocks whose terminator names `block`, in layout order.
    ///
    /// Predecessors are not cached; this scans every block.
    pub fn predecessors(&self, block: BlockId) -> SmallVec<[BlockId; 4]> {
        self.layout
            .iter()
            .copied()
            .filter(|&pred| {
                self.terminator(pred)
                    .is_some_and(|term| self.insts[term].kind.successors().contains(&block))
            })
            .collect()
    }

    // ── Linking ─────────────────────────────────────────────────

    fn link(&mut self, block: BlockId, inst: InstId, prev: Option<InstId>, next: Option<InstId>) {
        let node = &mut self.insts[inst];
        assert!(
            node.block.is_none(),
            "{inst:?} is already linked into {:?}",
            node.block
        );
        node.block = Some(block);
        node.prev = prev;
        node.next = next;
        match prev {
            Some(p) => self.insts[p].next = Some(inst),
            None => self.blocks[block].head = Some(inst),
        }
        match next {
            Some(n) => self.insts[n].prev = Some(inst),
            None => self.blocks[block].tail = Some(inst),
        }
        self.blocks[block].len += 1;
    }

    fn unlink(&mut self, inst: InstId) {
        let node = &mut self.insts[inst];
        let Some(block) = node.block.take() else {
            panic!("{inst:?} is not linked");
        };
        let prev = node.prev.take();
        let next = node.next.take();
        match prev {
            Some(p) => self.insts[p].next = next,
            None => self.blocks[block].head = next,
        }
        match next {
            Some(n) => self.insts[n].prev = prev,
            None => self.blocks[block].tail = prev,
        }
        self.blocks[block].len -= 1;
    }

    fn linked_block(&self, inst: InstId) -> BlockId {
        match self.insts[inst].block {
            Some(block) => block,
            None => panic!("{inst:?} is not linked"),
        }
    }

    /// Link `inst` immediately before `pos`.
    pub fn insert_before(&mut self, pos: InstId, inst: InstId) {
        self.assert_mutable();
        let block = self.linked_block(pos);
        let prev = self.insts[pos].prev;
        self.link(block, inst, prev, Some(pos));
    }

    /// Link `inst` immediately after `pos`.
    pub fn insert_after(&mut self, pos: InstId, inst: InstId) {
        self.assert_mutable();
        let block = self.linked_block(pos);
        let next = self.insts[pos].next;
        self.link(block, inst, Some(pos), next);
    }

    /// Link `inst` at the end of `block`.
    pub fn push_back(&mut self, block: BlockId, inst: InstId) {
        self.assert_mutable();
        let tail = self.blocks[block].tail;
        self.link(block, inst, tail, None);
    }

    /// Link `inst` at the start of `block`.
    pub fn push_front(&mut self, block: BlockId, inst: InstId) {
        self.assert_mutable();
        let head = self.blocks[block].head;
        self.link(block, inst, None, head);
    }

    /// Unlink and destroy `inst`, returning the instruction that followed it.
    ///
    /// # Panics
    ///
    /// Panics if any result of `inst` still has a use. Replace the uses
    /// first; the block layer never force-deletes live values.
    pub fn erase(&mut self, inst: InstId) -> Option<InstId> {
        self.assert_mutable();
        let node = &self.insts[inst];
        if let Some((n, data)) = node
            .results
            .iter()
            .enumerate()
            .find(|(_, data)| !data.uses.is_empty())
        {
            panic!(
                "erasing {inst:?} ({}) while result #{n} still has {} use(s)",
                node.kind.mnemonic(),
                data.uses.len(),
            );
        }
        let next = node.next;
        if node.block.is_some() {
            self.unlink(inst);
        }
        self.drop_operands(inst);
        self.notify_inst_deleted(inst);
        self.insts.remove(inst);
        next
    }

    /// Move `[first, last)` of `src_block` before `dest_pos` in `dest_block`
    /// (at its end when `dest_pos` is `None`). `last == None` means "to the
    /// end of `src_block`".
    ///
    /// Relative order inside the range is preserved. The range is detached
    /// and reattached with a constant number of link updates; each moved
    /// instruction's block back-reference is then rewritten.
    ///
    /// # Panics
    ///
    /// Panics if `first` is not in `src_block`, if `last` does not follow
    /// `first` there, or if `dest_pos` lies inside the range.
    pub fn splice(
        &mut self,
        dest_block: BlockId,
        dest_pos: Option<InstId>,
        src_block: BlockId,
        first: InstId,
        last: Option<InstId>,
    ) {
        self.assert_mutable();
        assert_eq!(
            self.insts[first].block,
            Some(src_block),
            "splice range start {first:?} is not in {src_block:?}",
        );

        let mut range = Vec::new();
        let mut cursor = Some(first);
        while cursor != last {
            let Some(current) = cursor else {
                panic!("splice range end {last:?} does not follow {first:?} in {src_block:?}");
            };
            range.push(current);
            cursor = self.insts[current].next;
        }
        let Some(&last_moved) = range.last() else {
            return;
        };
        if let Some(pos) = dest_pos {
            assert_eq!(
                self.insts[pos].block,
                Some(dest_block),
                "splice destination {pos:?} is not in {dest_block:?}",
            );
            assert!(
                !range.contains(&pos),
                "splice destination {pos:?} lies inside the moved range",
            );
        }

        // Detach from the source list.
        let before = self.insts[first].prev;
        let after = self.insts[last_moved].next;
        match before {
            Some(p) => self.insts[p].next = after,
            None => self.blocks[src_block].head = after,
        }
        match after {
            Some(n) => self.insts[n].prev = before,
            None => self.blocks[src_block].tail = before,
        }
        self.blocks[src_block].len -= range.len();

        // Attach to the destination list.
        let (prev, next) = match dest_pos {
            Some(pos) => (self.insts[pos].prev, Some(pos)),
            None => (self.blocks[dest_block].tail, None),
        };
        self.insts[first].prev = prev;
        self.insts[last_moved].next = next;
        match prev {
            Some(p) => self.insts[p].next = Some(first),
            None => self.blocks[dest_block].head = Some(first),
        }
        match next {
            Some(n) => self.insts[n].prev = Some(last_moved),
            None => self.blocks[dest_block].tail = Some(last_moved),
        }
        self.blocks[dest_block].len += range.len();

        for inst in range {
            self.insts[inst].block = Some(dest_block);
        }
    }

    /// Split the block containing `at` into two.
    ///
    /// A new block is created right after it in the layout and `[at, end)`
    /// moves into it. The original block is left without a terminator; the
    /// caller adds one (typically a branch to the new block).
    pub fn split_block(&mut self, at: InstId) -> BlockId {
        let block = self.linked_block(at);
        let new_block = self.create_basic_block(Some(block), true);
        self.splice(new_block, None, block, at, None);
        new_block
    }

    /// Destroy `block` with its instructions and arguments.
    ///
    /// Uses between the block's own instructions are dropped first. Branches
    /// into the block must already be gone.
    ///
    /// # Panics
    ///
    /// Panics if a value defined in the block is still used outside it.
    pub fn erase_block(&mut self, block: BlockId) {
        self.assert_mutable();
        let insts: Vec<InstId> = self.block_insts(block).collect();
        for &inst in &insts {
            self.drop_operands(inst);
        }
        for &inst in &insts {
            for (n, data) in self.insts[inst].results.iter().enumerate() {
                assert!(
                    data.uses.is_empty(),
                    "erasing {block:?} while {inst:?}#{n} is still used by {:?}",
                    data.uses,
                );
            }
        }
        let args = std::mem::take(&mut self.blocks[block].args);
        for &arg in &args {
            assert!(
                self.args[arg].data.uses.is_empty(),
                "erasing {block:?} while its argument {arg:?} is still used",
            );
        }

        for inst in insts.into_iter().rev() {
            self.notify_inst_deleted(inst);
            self.insts.remove(inst);
        }
        for arg in args {
            self.notify_arg_deleted(arg);
            self.args.remove(arg);
        }
        self.notify_block_deleted(block);
        self.layout.retain(|&b| b != block);
        self.blocks.remove(block);
    }

    // ── Arguments ───────────────────────────────────────────────

    pub(crate) fn append_arg(
        &mut self,
        block: BlockId,
        kind: ArgKind,
        ty: Ty,
        ownership: OwnershipKind,
        decl: Option<Name>,
    ) -> ArgId {
        self.assert_mutable();
        let index = u32::try_from(self.blocks[block].args.len())
            .unwrap_or_else(|_| panic!("argument count exceeds u32::MAX"));
        let arg = self.args.alloc(Argument {
            kind,
            block,
            index,
            data: ValueData::new(ty, ownership),
            decl,
        });
        self.blocks[block].args.push(arg);
        arg
    }

    /// Append a formal parameter to the entry block.
    ///
    /// # Panics
    ///
    /// Panics if `block` is not the entry block.
    pub fn create_function_argument(
        &mut self,
        block: BlockId,
        ty: Ty,
        ownership: OwnershipKind,
        decl: Option<Name>,
    ) -> ArgId {
        assert!(
            self.is_entry(block),
            "function arguments belong to the entry block, not {block:?}"
        );
        self.append_arg(block, ArgKind::Function, ty, ownership, decl)
    }

    /// Append a phi argument to a non-entry block.
    ///
    /// # Panics
    ///
    /// Panics if `block` is the entry block.
    pub fn create_phi_argument(
        &mut self,
        block: BlockId,
        ty: Ty,
        ownership: OwnershipKind,
        decl: Option<Name>,
    ) -> ArgId {
        assert!(
            !self.is_entry(block),
            "phi arguments cannot be added to the entry block"
        );
        self.append_arg(block, ArgKind::Phi, ty, ownership, decl)
    }

    /// Append a phi argument whose ownership is merged from the values
    /// flowing into it.
    ///
    /// A trivial `ty` gets [`OwnershipKind::None`] whatever comes in.
    pub fn create_phi_argument_merged(
        &mut self,
        block: BlockId,
        ty: Ty,
        incoming: &[Value],
        types: &dyn TypeFacts,
        decl: Option<Name>,
    ) -> Result<ArgId, OwnershipMismatch> {
        let ownership = if types.is_trivial(ty) {
            OwnershipKind::None
        } else {
            self.merge_value_ownership(incoming)?
        };
        Ok(self.create_phi_argument(block, ty, ownership, decl))
    }
}

#[cfg(test)]
mod tests;
