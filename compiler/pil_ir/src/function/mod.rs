//! PIL functions.
//!
//! A [`Function`] owns everything in its body: the arenas holding its
//! blocks, instructions and arguments, the block layout (entry block
//! first), and its debug [`ScopeTable`]. Nothing inside a function is
//! shared with another function, so independent functions can be mutated
//! on different threads.
//!
//! This module holds the function-level state (attributes, layout, value
//! and use bookkeeping, lifecycle flags). Instruction list operations live
//! in [`crate::block`] and argument resolution in [`crate::phi`].

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use bitflags::bitflags;
use smallvec::SmallVec;

use crate::arena::Arena;
use crate::block::{Argument, BasicBlock};
use crate::inst::{Instruction, InstKind};
use crate::notify::DeleteNotificationHandler;
use crate::ownership::{merge_ownership, OwnershipMismatch};
use crate::scope::{ScopeId, ScopeTable, SourceLoc};
use crate::value::{Use, ValueData};
use crate::{ArgId, BlockId, InstId, Name, OwnershipKind, Ty, Value};

/// Handle to a function within a [`Module`](crate::Module).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct FuncId(u32);

impl FuncId {
    /// Create from a raw index.
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw index.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Get the index as `usize`.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for FuncId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f{}", self.0)
    }
}

// ── Attributes ──────────────────────────────────────────────────────

/// Symbol visibility of a function.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Linkage {
    #[default]
    Public,
    Hidden,
    /// Emitted on demand in every module that uses it.
    Shared,
    Private,
    /// Defined in another module.
    External,
}

impl Linkage {
    pub fn is_external(self) -> bool {
        self == Linkage::External
    }
}

bitflags! {
    /// Side effects a function may have when called.
    ///
    /// The empty set means the function is pure.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
    pub struct Effects: u8 {
        /// May read memory.
        const READS = 1 << 0;
        /// May write memory.
        const WRITES = 1 << 1;
        /// May decrement a reference count (and run a deinitializer).
        const RELEASES = 1 << 2;
        /// May throw.
        const THROWS = 1 << 3;
    }
}

impl Default for Effects {
    fn default() -> Self {
        Effects::all()
    }
}

impl Effects {
    /// Whether a call with these effects can be deleted when its result is
    /// unused.
    pub fn is_removable(self) -> bool {
        !self.intersects(Effects::WRITES | Effects::RELEASES | Effects::THROWS)
    }
}

/// Generic parameters a function body is written against.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct GenericEnvironment {
    pub params: Vec<Name>,
}

impl GenericEnvironment {
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// Records that a function is a specialization of a generic one.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SpecializationInfo {
    /// The generic function this was specialized from.
    pub generic: FuncId,
    /// Concrete types substituted for the generic parameters.
    pub substitutions: Vec<Ty>,
}

/// Formal signature of a function.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct FunctionType {
    pub params: Vec<Ty>,
    pub result: Ty,
    /// Error type for throwing functions.
    pub error: Option<Ty>,
}

impl FunctionType {
    pub fn new(params: Vec<Ty>, result: Ty) -> Self {
        Self {
            params,
            result,
            error: None,
        }
    }
}

// ── Function ────────────────────────────────────────────────────────

/// A PIL function: signature, attributes and (for definitions) a body.
pub struct Function {
    id: FuncId,
    name: Name,
    signature: FunctionType,

    linkage: Linkage,
    transparent: bool,
    serialized: bool,
    effects: Effects,
    generic_env: GenericEnvironment,
    pub(crate) specialization: Option<SpecializationInfo>,
    pub(crate) replaced_by: Option<FuncId>,

    pub(crate) insts: Arena<InstId, Instruction>,
    pub(crate) blocks: Arena<BlockId, BasicBlock>,
    pub(crate) args: Arena<ArgId, Argument>,
    /// Block order; `layout[0]` is the entry block.
    pub(crate) layout: Vec<BlockId>,

    pub(crate) scopes: ScopeTable,
    root_scope: ScopeId,

    ref_count: AtomicU32,
    zombie: bool,
    handlers: Vec<Box<dyn DeleteNotificationHandler>>,
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("blocks", &self.layout.len())
            .field("insts", &self.insts.len())
            .field("zombie", &self.zombie)
            .finish_non_exhaustive()
    }
}

impl Function {
    /// Create a declaration (a function with no blocks).
    pub fn new(id: FuncId, name: Name, signature: FunctionType) -> Self {
        Self::with_location(id, name, signature, SourceLoc::SYNTHETIC)
    }

    /// Create a declaration whose root scope sits at `loc`.
    pub fn with_location(id: FuncId, name: Name, signature: FunctionType, loc: SourceLoc) -> Self {
        let mut scopes = ScopeTable::new();
        let root_scope = scopes.new_scope(loc, None, id, None);
        Self {
            id,
            name,
            signature,
            linkage: Linkage::default(),
            transparent: false,
            serialized: false,
            effects: Effects::default(),
            generic_env: GenericEnvironment::default(),
            specialization: None,
            replaced_by: None,
            insts: Arena::new(),
            blocks: Arena::new(),
            args: Arena::new(),
            layout: Vec::new(),
            scopes,
            root_scope,
            ref_count: AtomicU32::new(0),
            zombie: false,
            handlers: Vec::new(),
        }
    }

    // ── Identity and attributes ─────────────────────────────────

    #[inline]
    pub fn id(&self) -> FuncId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> Name {
        self.name
    }

    #[inline]
    pub fn signature(&self) -> &FunctionType {
        &self.signature
    }

    pub fn linkage(&self) -> Linkage {
        self.linkage
    }

    pub fn set_linkage(&mut self, linkage: Linkage) {
        self.assert_mutable();
        self.linkage = linkage;
    }

    pub fn is_transparent(&self) -> bool {
        self.transparent
    }

    pub fn set_transparent(&mut self, transparent: bool) {
        self.assert_mutable();
        self.transparent = transparent;
    }

    pub fn is_serialized(&self) -> bool {
        self.serialized
    }

    pub fn set_serialized(&mut self, serialized: bool) {
        self.assert_mutable();
        self.serialized = serialized;
    }

    pub fn effects(&self) -> Effects {
        self.effects
    }

    pub fn set_effects(&mut self, effects: Effects) {
        self.assert_mutable();
        self.effects = effects;
    }

    pub fn generic_environment(&self) -> &GenericEnvironment {
        &self.generic_env
    }

    pub fn set_generic_environment(&mut self, env: GenericEnvironment) {
        self.assert_mutable();
        self.generic_env = env;
    }

    /// The generic function this one was specialized from.
    ///
    /// Set through [`Module::set_specialization`](crate::Module::set_specialization),
    /// which also maintains the reference count of the generic function.
    pub fn specialization(&self) -> Option<&SpecializationInfo> {
        self.specialization.as_ref()
    }

    /// The function that replaced this one, if any.
    pub fn replaced_by(&self) -> Option<FuncId> {
        self.replaced_by
    }

    // ── Scopes ──────────────────────────────────────────────────

    pub fn scopes(&self) -> &ScopeTable {
        &self.scopes
    }

    /// The top-level scope of the function body.
    pub fn root_scope(&self) -> ScopeId {
        self.root_scope
    }

    /// Create a scope in this function.
    pub fn new_scope(
        &mut self,
        loc: SourceLoc,
        parent: Option<ScopeId>,
        inlined_call_site: Option<ScopeId>,
    ) -> ScopeId {
        self.assert_mutable();
        self.scopes.new_scope(loc, parent, self.id, inlined_call_site)
    }

    // ── Reference counting and lifecycle ────────────────────────

    /// Number of counted references held by vtables, witness tables,
    /// specializations and replaced-by links.
    pub fn ref_count(&self) -> u32 {
        self.ref_count.load(Ordering::Acquire)
    }

    pub fn inc_ref_count(&self) {
        self.ref_count.fetch_add(1, Ordering::AcqRel);
    }

    /// Drop one counted reference, returning the remaining count.
    ///
    /// # Panics
    ///
    /// Panics if the count is already zero.
    pub fn dec_ref_count(&self) -> u32 {
        let previous = self.ref_count.fetch_sub(1, Ordering::AcqRel);
        assert!(previous > 0, "reference count of {:?} underflowed", self.id);
        previous - 1
    }

    /// Whether the function was removed from the live list but kept for
    /// debug info and vtable stubs.
    pub fn is_zombie(&self) -> bool {
        self.zombie
    }

    /// Mark the function as a zombie. Zombies must not be mutated again.
    pub fn mark_zombie(&mut self) {
        self.zombie = true;
    }

    #[inline]
    pub(crate) fn assert_mutable(&self) {
        assert!(!self.zombie, "mutating zombie function {:?}", self.id);
    }

    /// Register a handler notified before instructions, arguments and
    /// blocks of this function are destroyed.
    pub fn add_delete_notification_handler(&mut self, handler: Box<dyn DeleteNotificationHandler>) {
        self.handlers.push(handler);
    }

    pub(crate) fn notify_inst_deleted(&mut self, inst: InstId) {
        for handler in &mut self.handlers {
            handler.will_delete_inst(inst);
        }
    }

    pub(crate) fn notify_arg_deleted(&mut self, arg: ArgId) {
        for handler in &mut self.handlers {
            handler.will_delete_arg(arg);
        }
    }

    pub(crate) fn notify_block_deleted(&mut self, block: BlockId) {
        for handler in &mut self.handlers {
            handler.will_delete_block(block);
        }
    }

    // ── Block layout ────────────────────────────────────────────

    /// Blocks in layout order.
    #[inline]
    pub fn blocks(&self) -> &[BlockId] {
        &self.layout
    }

    #[inline]
    pub fn num_blocks(&self) -> usize {
        self.layout.len()
    }

    /// Whether the function has a body.
    #[inline]
    pub fn is_definition(&self) -> bool {
        !self.layout.is_empty()
    }

    /// The first block.
    ///
    /// # Panics
    ///
    /// Panics if the function is a declaration.
    pub fn entry_block(&self) -> BlockId {
        match self.layout.first() {
            Some(&entry) => entry,
            None => panic!("{:?} is a declaration and has no entry block", self.id),
        }
    }

    /// Create an empty block.
    ///
    /// Without `relative_to` the block is appended. Otherwise it is placed
    /// immediately after (`after == true`) or before `relative_to`.
    pub fn create_basic_block(&mut self, relative_to: Option<BlockId>, after: bool) -> BlockId {
        self.assert_mutable();
        let block = self.blocks.alloc(BasicBlock::new());
        match relative_to {
            None => self.layout.push(block),
            Some(anchor) => {
                let pos = self.layout_position(anchor);
                let pos = if after { pos + 1 } else { pos };
                self.layout.insert(pos, block);
            }
        }
        block
    }

    /// Position of `block` in the layout.
    ///
    /// # Panics
    ///
    /// Panics if `block` is not part of this function.
    pub(crate) fn layout_position(&self, block: BlockId) -> usize {
        match self.layout.iter().position(|&b| b == block) {
            Some(pos) => pos,
            None => panic!("{block:?} is not in the layout of {:?}", self.id),
        }
    }

    /// First block (in layout order) whose terminator satisfies `pred`.
    pub fn find_block_with_terminator(
        &self,
        mut pred: impl FnMut(&Instruction) -> bool,
    ) -> Option<BlockId> {
        self.layout.iter().copied().find(|&block| {
            self.terminator(block)
                .is_some_and(|term| pred(&self.insts[term]))
        })
    }

    /// Drop the whole body, turning the function into a declaration.
    ///
    /// Deletion handlers are notified for every instruction, argument and
    /// block; all outstanding handles become stale.
    pub fn convert_to_declaration(&mut self) {
        self.assert_mutable();
        let insts = self.insts.ids();
        let args = self.args.ids();
        for inst in insts {
            self.notify_inst_deleted(inst);
        }
        for arg in args {
            self.notify_arg_deleted(arg);
        }
        for block in std::mem::take(&mut self.layout) {
            self.notify_block_deleted(block);
        }
        self.insts.clear();
        self.args.clear();
        self.blocks.clear();
    }

    // ── Node access ─────────────────────────────────────────────

    /// Borrow an instruction.
    ///
    /// # Panics
    ///
    /// Panics if `inst` is stale or belongs to another function.
    #[inline]
    pub fn inst(&self, inst: InstId) -> &Instruction {
        &self.insts[inst]
    }

    /// Borrow an instruction, or `None` if the handle is stale.
    #[inline]
    pub fn try_inst(&self, inst: InstId) -> Option<&Instruction> {
        self.insts.get(inst)
    }

    #[inline]
    pub fn contains_inst(&self, inst: InstId) -> bool {
        self.insts.contains(inst)
    }

    /// Number of live instructions, linked or not.
    #[inline]
    pub fn num_insts(&self) -> usize {
        self.insts.len()
    }

    /// Borrow a block.
    ///
    /// # Panics
    ///
    /// Panics if `block` is stale or belongs to another function.
    #[inline]
    pub fn block(&self, block: BlockId) -> &BasicBlock {
        &self.blocks[block]
    }

    #[inline]
    pub fn contains_block(&self, block: BlockId) -> bool {
        self.blocks.contains(block)
    }

    /// Borrow an argument.
    ///
    /// # Panics
    ///
    /// Panics if `arg` is stale or belongs to another function.
    #[inline]
    pub fn arg(&self, arg: ArgId) -> &Argument {
        &self.args[arg]
    }

    /// Create an unlinked instruction.
    ///
    /// Operand uses are registered immediately; `results` gives the type and
    /// ownership of each result. Link the instruction with one of the list
    /// operations (or use a [`Builder`](crate::Builder), which does both).
    ///
    /// # Panics
    ///
    /// Panics if an operand is stale.
    pub fn create_inst(
        &mut self,
        kind: InstKind,
        operands: impl IntoIterator<Item = Value>,
        results: &[(Ty, OwnershipKind)],
        scope: Option<ScopeId>,
    ) -> InstId {
        self.assert_mutable();
        let results = results
            .iter()
            .map(|&(ty, ownership)| ValueData::new(ty, ownership))
            .collect();
        let inst = self.insts.alloc(Instruction::new(kind, results, scope));
        self.attach_operands(inst, operands);
        inst
    }

    /// Append operands to a freshly created instruction, registering uses.
    pub(crate) fn attach_operands(&mut self, inst: InstId, operands: impl IntoIterator<Item = Value>) {
        for value in operands {
            let index = self.insts[inst].operands.len();
            let operand = u32::try_from(index)
                .unwrap_or_else(|_| panic!("operand count exceeds u32::MAX"));
            self.value_data_mut(value).uses.push(Use {
                user: inst,
                operand,
            });
            self.insts[inst].operands.push(value);
        }
    }

    /// Remove every operand of `inst`, unregistering its uses.
    pub(crate) fn drop_operands(&mut self, inst: InstId) {
        let operands = std::mem::take(&mut self.insts[inst].operands);
        for (index, value) in operands.into_iter().enumerate() {
            #[expect(
                clippy::cast_possible_truncation,
                reason = "operand count is bounded by u32 in attach_operands"
            )]
            let operand = index as u32;
            self.remove_use(value, Use { user: inst, operand });
        }
    }

    fn remove_use(&mut self, value: Value, target: Use) {
        if let Some(data) = self.try_value_data_mut(value) {
            if let Some(pos) = data.uses.iter().position(|&u| u == target) {
                data.uses.swap_remove(pos);
            }
        }
    }

    /// Set the debug scope of an instruction.
    pub fn set_scope(&mut self, inst: InstId, scope: Option<ScopeId>) {
        self.assert_mutable();
        self.insts[inst].scope = scope;
    }

    // ── Values and uses ─────────────────────────────────────────

    /// Type, ownership and uses of a value.
    ///
    /// # Panics
    ///
    /// Panics if the producer of `value` has been destroyed.
    pub fn value_data(&self, value: Value) -> &ValueData {
        match self.try_value_data(value) {
            Some(data) => data,
            None => panic!("use of dead value {value:?}"),
        }
    }

    /// Type, ownership and uses of a value, or `None` if it no longer
    /// exists.
    pub fn try_value_data(&self, value: Value) -> Option<&ValueData> {
        match value {
            Value::Result(inst, n) => self.insts.get(inst)?.results.get(n as usize),
            Value::Arg(arg) => self.args.get(arg).map(|a| &a.data),
        }
    }

    fn try_value_data_mut(&mut self, value: Value) -> Option<&mut ValueData> {
        match value {
            Value::Result(inst, n) => self.insts.get_mut(inst)?.results.get_mut(n as usize),
            Value::Arg(arg) => self.args.get_mut(arg).map(|a| &mut a.data),
        }
    }

    fn value_data_mut(&mut self, value: Value) -> &mut ValueData {
        match self.try_value_data_mut(value) {
            Some(data) => data,
            None => panic!("use of dead value {value:?}"),
        }
    }

    /// Whether the producer of `value` still exists.
    pub fn is_live(&self, value: Value) -> bool {
        self.try_value_data(value).is_some()
    }

    #[inline]
    pub fn value_type(&self, value: Value) -> Ty {
        self.value_data(value).ty
    }

    #[inline]
    pub fn value_ownership(&self, value: Value) -> OwnershipKind {
        self.value_data(value).ownership
    }

    #[inline]
    pub fn uses(&self, value: Value) -> &[Use] {
        &self.value_data(value).uses
    }

    #[inline]
    pub fn has_uses(&self, value: Value) -> bool {
        !self.value_data(value).uses.is_empty()
    }

    /// Every result of `inst` as a value.
    pub fn results(&self, inst: InstId) -> SmallVec<[Value; 1]> {
        (0..self.insts[inst].results.len())
            .map(|n| {
                #[expect(
                    clippy::cast_possible_truncation,
                    reason = "result counts are tiny"
                )]
                let n = n as u32;
                Value::Result(inst, n)
            })
            .collect()
    }

    /// The block a value is defined in (for results, the block their
    /// instruction is linked into).
    pub fn defining_block(&self, value: Value) -> Option<BlockId> {
        match value {
            Value::Result(inst, _) => self.insts.get(inst)?.block,
            Value::Arg(arg) => self.args.get(arg).map(|a| a.block),
        }
    }

    /// Common ownership kind of a set of incoming values.
    pub fn merge_value_ownership(&self, values: &[Value]) -> Result<OwnershipKind, OwnershipMismatch> {
        merge_ownership(values.iter().map(|&v| self.value_ownership(v)))
    }

    /// Point operand `index` of `inst` at `value`.
    ///
    /// # Panics
    ///
    /// Panics if `inst` or `value` is stale, or `index` is out of range.
    pub fn set_operand(&mut self, inst: InstId, index: usize, value: Value) {
        self.assert_mutable();
        let old = self.insts[inst].operands[index];
        if old == value {
            return;
        }
        let operand = u32::try_from(index)
            .unwrap_or_else(|_| panic!("operand index exceeds u32::MAX"));
        let slot = Use { user: inst, operand };
        self.remove_use(old, slot);
        self.value_data_mut(value).uses.push(slot);
        self.insts[inst].operands[index] = value;
    }

    /// Redirect every use of `old` to `new`.
    ///
    /// # Panics
    ///
    /// Panics if either value is dead.
    pub fn replace_all_uses_with(&mut self, old: Value, new: Value) {
        self.assert_mutable();
        if old == new {
            return;
        }
        assert!(self.is_live(new), "replacing {old:?} with dead value {new:?}");
        let uses = std::mem::take(&mut self.value_data_mut(old).uses);
        for u in &uses {
            self.insts[u.user].operands[u.operand as usize] = new;
        }
        self.value_data_mut(new).uses.extend(uses);
    }
}
