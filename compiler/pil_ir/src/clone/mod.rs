//! Copying and moving code between functions.
//!
//! Arena handles are only meaningful inside the function that minted them,
//! so code crossing a function boundary is re-created in the destination
//! arenas and every reference is translated through a map:
//!
//! - [`FunctionCloner`] copies a whole body into an empty function,
//!   preserving block layout, argument lists, instruction order, successor
//!   topology and the shape of the scope tree.
//! - [`transfer_range`] moves a contiguous instruction range of one block
//!   into a block of another function (the cross-function counterpart of
//!   [`Function::splice`]).
//!
//! Debug scopes are rewritten through a [`ScopeCloner`] rooted at the
//! destination function.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::scope::ScopeCloner;
use crate::{BlockId, FuncId, Function, InstId, OwnershipKind, Ty, Value};

/// Copies a function body, remembering where each node went.
pub struct FunctionCloner {
    blocks: FxHashMap<BlockId, BlockId>,
    insts: FxHashMap<InstId, InstId>,
    values: FxHashMap<Value, Value>,
    scopes: ScopeCloner,
}

impl FunctionCloner {
    /// Create a cloner targeting the function `dest`.
    pub fn new(dest: FuncId) -> Self {
        Self {
            blocks: FxHashMap::default(),
            insts: FxHashMap::default(),
            values: FxHashMap::default(),
            scopes: ScopeCloner::new(dest),
        }
    }

    /// Copy the body of `src` into `dest`.
    ///
    /// Blocks keep their layout order. All instructions are created and
    /// linked before any operand is wired, so operands may refer to values
    /// defined later in layout order (as values flowing around a loop do).
    ///
    /// # Panics
    ///
    /// Panics if `dest` already has a body.
    pub fn clone_body(&mut self, src: &Function, dest: &mut Function) {
        assert!(
            !dest.is_definition(),
            "cloning into {:?}, which already has a body",
            dest.id()
        );
        self.scopes.seed(src.root_scope(), dest.root_scope());

        for &block in src.blocks() {
            let new_block = dest.create_basic_block(None, false);
            self.blocks.insert(block, new_block);
            for &arg in src.block_args(block) {
                let a = src.arg(arg);
                let new_arg = dest.append_arg(new_block, a.kind(), a.ty(), a.ownership(), a.decl());
                self.values.insert(Value::Arg(arg), Value::Arg(new_arg));
            }
        }

        let mut order = Vec::with_capacity(src.num_insts());
        for &block in src.blocks() {
            let new_block = self.blocks[&block];
            for inst in src.block_insts(block) {
                let new_inst = self.clone_node(src, dest, inst);
                dest.push_back(new_block, new_inst);
                order.push((inst, new_inst));
            }
        }

        for (inst, new_inst) in order {
            let operands: SmallVec<[Value; 4]> = src
                .inst(inst)
                .operands()
                .iter()
                .map(|&v| self.mapped_operand(v, inst))
                .collect();
            dest.attach_operands(new_inst, operands);
        }
    }

    /// Create an unlinked, operand-less copy of `inst` in `dest`.
    fn clone_node(&mut self, src: &Function, dest: &mut Function, inst: InstId) -> InstId {
        let node = src.inst(inst);
        let mut kind = node.kind().clone();
        kind.map_successors(|b| self.blocks.get(&b).copied().unwrap_or(b));
        let results: SmallVec<[(Ty, OwnershipKind); 1]> = node
            .results()
            .iter()
            .map(|r| (r.ty(), r.ownership()))
            .collect();
        let scope = self
            .scopes
            .clone_scope(&src.scopes, &mut dest.scopes, node.scope());
        let new_inst = dest.create_inst(kind, [], &results, scope);
        self.insts.insert(inst, new_inst);
        for (old, new) in src.results(inst).into_iter().zip(dest.results(new_inst)) {
            self.values.insert(old, new);
        }
        new_inst
    }

    fn mapped_operand(&self, value: Value, user: InstId) -> Value {
        match self.values.get(&value) {
            Some(&v) => v,
            None => panic!("operand {value:?} of {user:?} is not defined in the cloned body"),
        }
    }

    /// Where `block` went.
    pub fn mapped_block(&self, block: BlockId) -> Option<BlockId> {
        self.blocks.get(&block).copied()
    }

    /// Where `inst` went.
    pub fn mapped_inst(&self, inst: InstId) -> Option<InstId> {
        self.insts.get(&inst).copied()
    }

    /// Where `value` went.
    pub fn mapped_value(&self, value: Value) -> Option<Value> {
        self.values.get(&value).copied()
    }
}

/// Move `[first, last)` of `src_block` in `src` before `dest_pos` in
/// `dest_block` of `dest` (at its end when `dest_pos` is `None`).
///
/// Operands defined inside the range follow the moved instructions.
/// Operands defined outside it must have an entry in `value_map` (for
/// example callee arguments mapped to call operands when inlining); the
/// results of moved instructions are added to it. Scopes are rewritten
/// through `scopes`. Returns the new instructions in order.
///
/// # Panics
///
/// Panics if the range contains a terminator, if an external operand has
/// no mapping, or if a moved result is still used outside the range.
#[expect(
    clippy::too_many_arguments,
    reason = "source and destination coordinates plus the value and scope maps"
)]
pub fn transfer_range(
    src: &mut Function,
    src_block: BlockId,
    first: InstId,
    last: Option<InstId>,
    dest: &mut Function,
    dest_block: BlockId,
    dest_pos: Option<InstId>,
    value_map: &mut FxHashMap<Value, Value>,
    scopes: &mut ScopeCloner,
) -> Vec<InstId> {
    assert_eq!(
        src.inst(first).block(),
        Some(src_block),
        "transfer range start {first:?} is not in {src_block:?}",
    );
    let mut range = Vec::new();
    let mut cursor = Some(first);
    while cursor != last {
        let Some(current) = cursor else {
            panic!("transfer range end {last:?} does not follow {first:?} in {src_block:?}");
        };
        assert!(
            !src.inst(current).is_terminator(),
            "cannot transfer terminator {current:?} across functions"
        );
        range.push(current);
        cursor = src.inst(current).next();
    }

    let mut moved = Vec::with_capacity(range.len());
    for &inst in &range {
        let node = src.inst(inst);
        let operands: SmallVec<[Value; 4]> = node
            .operands()
            .iter()
            .map(|v| match value_map.get(v) {
                Some(&mapped) => mapped,
                None => panic!("operand {v:?} of {inst:?} has no mapping in the destination"),
            })
            .collect();
        let results: SmallVec<[(Ty, OwnershipKind); 1]> = node
            .results()
            .iter()
            .map(|r| (r.ty(), r.ownership()))
            .collect();
        let scope = scopes.clone_scope(&src.scopes, &mut dest.scopes, node.scope());
        let new_inst = dest.create_inst(node.kind().clone(), operands, &results, scope);
        match dest_pos {
            Some(pos) => dest.insert_before(pos, new_inst),
            None => dest.push_back(dest_block, new_inst),
        }
        for (old, new) in src.results(inst).into_iter().zip(dest.results(new_inst)) {
            value_map.insert(old, new);
        }
        moved.push(new_inst);
    }

    // Erasing back to front drops uses inside the range before their
    // definitions go.
    for inst in range.into_iter().rev() {
        src.erase(inst);
    }
    moved
}
