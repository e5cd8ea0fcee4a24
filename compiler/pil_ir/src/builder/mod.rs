//! Insertion-point instruction builder.
//!
//! A [`Builder`] creates instructions and links them at an insertion point:
//! the end of a block, or before an existing instruction. Result ownership
//! is computed from the opcode with [`result_ownership`], so every value a
//! builder produces has a well-defined kind from the start.
//!
//! Aggregate constructors can see disagreeing operand kinds and return
//! [`OwnershipMismatch`]. Every other constructor has at most one
//! forwarded operand and cannot fail.

use smallvec::SmallVec;

use crate::inst::{result_ownership, BuiltinOp, LoadQualifier, StoreQualifier};
use crate::ownership::OwnershipMismatch;
use crate::scope::ScopeId;
use crate::{BlockId, Function, InstId, InstKind, Name, OwnershipKind, Ty, TypeFacts, Value};

/// Where new instructions go.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertPoint {
    /// Append to the block.
    End(BlockId),
    /// Insert before the instruction; successive inserts keep their order.
    Before(InstId),
}

/// Creates and links instructions at an [`InsertPoint`].
pub struct Builder<'f> {
    func: &'f mut Function,
    types: &'f dyn TypeFacts,
    point: InsertPoint,
    scope: Option<ScopeId>,
}

impl<'f> Builder<'f> {
    /// Build at the end of `block`.
    pub fn at_end(func: &'f mut Function, types: &'f dyn TypeFacts, block: BlockId) -> Self {
        let scope = Some(func.root_scope());
        Self {
            func,
            types,
            point: InsertPoint::End(block),
            scope,
        }
    }

    /// Build before `inst`, inheriting its scope.
    pub fn before(func: &'f mut Function, types: &'f dyn TypeFacts, inst: InstId) -> Self {
        let scope = func.inst(inst).scope().or(Some(func.root_scope()));
        Self {
            func,
            types,
            point: InsertPoint::Before(inst),
            scope,
        }
    }

    pub fn insert_point(&self) -> InsertPoint {
        self.point
    }

    pub fn set_insert_point(&mut self, point: InsertPoint) {
        self.point = point;
    }

    /// Scope given to new instructions.
    pub fn set_scope(&mut self, scope: Option<ScopeId>) {
        self.scope = scope;
    }

    #[must_use]
    pub fn with_scope(mut self, scope: Option<ScopeId>) -> Self {
        self.scope = scope;
        self
    }

    /// The function being built.
    pub fn func(&self) -> &Function {
        &*self.func
    }

    pub fn func_mut(&mut self) -> &mut Function {
        &mut *self.func
    }

    /// Create and link an instruction with explicitly computed ownership.
    pub fn try_build(
        &mut self,
        kind: InstKind,
        operands: &[Value],
        result_tys: &[Ty],
    ) -> Result<InstId, OwnershipMismatch> {
        let operand_kinds: SmallVec<[OwnershipKind; 4]> =
            operands.iter().map(|&v| self.func.value_ownership(v)).collect();
        let results = result_tys
            .iter()
            .map(|&ty| Ok((ty, result_ownership(&kind, &operand_kinds, ty, self.types)?)))
            .collect::<Result<SmallVec<[(Ty, OwnershipKind); 1]>, OwnershipMismatch>>()?;

        let inst = self
            .func
            .create_inst(kind, operands.iter().copied(), &results, self.scope);
        match self.point {
            InsertPoint::End(block) => self.func.push_back(block, inst),
            InsertPoint::Before(pos) => self.func.insert_before(pos, inst),
        }
        Ok(inst)
    }

    /// [`try_build`](Self::try_build) for kinds with at most one forwarded
    /// operand, whose ownership cannot disagree.
    fn build(&mut self, kind: InstKind, operands: &[Value], result_tys: &[Ty]) -> InstId {
        let mnemonic = kind.mnemonic();
        match self.try_build(kind, operands, result_tys) {
            Ok(inst) => inst,
            Err(err) => panic!("building {mnemonic}: {err}"),
        }
    }

    fn build_value(&mut self, kind: InstKind, operands: &[Value], ty: Ty) -> Value {
        Value::result(self.build(kind, operands, &[ty]))
    }

    // ── Constants and references ────────────────────────────────

    pub fn integer_literal(&mut self, ty: Ty, value: i64) -> Value {
        self.build_value(InstKind::IntegerLiteral { value }, &[], ty)
    }

    pub fn function_ref(&mut self, ty: Ty, func: Name) -> Value {
        self.build_value(InstKind::FunctionRef { func }, &[], ty)
    }

    /// A binary builtin. Comparisons produce `Int1`; everything else has
    /// the type of `lhs`.
    pub fn builtin(&mut self, op: BuiltinOp, lhs: Value, rhs: Value) -> Value {
        let ty = if op.is_comparison() {
            Ty::INT1
        } else {
            self.func.value_type(lhs)
        };
        self.build_value(InstKind::Builtin { op }, &[lhs, rhs], ty)
    }

    // ── Aggregates ──────────────────────────────────────────────

    pub fn struct_(&mut self, ty: Ty, fields: &[Value]) -> Result<Value, OwnershipMismatch> {
        self.try_build(InstKind::Struct, fields, &[ty]).map(Value::result)
    }

    pub fn tuple(&mut self, ty: Ty, elements: &[Value]) -> Result<Value, OwnershipMismatch> {
        self.try_build(InstKind::Tuple, elements, &[ty]).map(Value::result)
    }

    pub fn struct_extract(&mut self, aggregate: Value, field: u32, ty: Ty) -> Value {
        self.build_value(InstKind::StructExtract { field }, &[aggregate], ty)
    }

    pub fn tuple_extract(&mut self, aggregate: Value, index: u32, ty: Ty) -> Value {
        self.build_value(InstKind::TupleExtract { index }, &[aggregate], ty)
    }

    /// Split a tuple into one value per element.
    pub fn destructure_tuple(&mut self, tuple: Value, element_tys: &[Ty]) -> SmallVec<[Value; 1]> {
        let inst = self.build(InstKind::DestructureTuple, &[tuple], element_tys);
        self.func.results(inst)
    }

    // ── Casts ───────────────────────────────────────────────────

    pub fn upcast(&mut self, operand: Value, ty: Ty) -> Value {
        self.build_value(InstKind::Upcast, &[operand], ty)
    }

    pub fn unchecked_ref_cast(&mut self, operand: Value, ty: Ty) -> Value {
        self.build_value(InstKind::UncheckedRefCast, &[operand], ty)
    }

    // ── Allocation and memory ───────────────────────────────────

    pub fn alloc_ref(&mut self, ty: Ty) -> Value {
        self.build_value(InstKind::AllocRef, &[], ty)
    }

    /// Allocate a stack slot; `addr_ty` is the address type of the slot.
    pub fn alloc_stack(&mut self, addr_ty: Ty) -> Value {
        self.build_value(InstKind::AllocStack, &[], addr_ty)
    }

    pub fn dealloc_stack(&mut self, addr: Value) -> InstId {
        self.build(InstKind::DeallocStack, &[addr], &[])
    }

    pub fn load(&mut self, addr: Value, qualifier: LoadQualifier, ty: Ty) -> Value {
        self.build_value(InstKind::Load { qualifier }, &[addr], ty)
    }

    pub fn store(&mut self, src: Value, addr: Value, qualifier: StoreQualifier) -> InstId {
        self.build(InstKind::Store { qualifier }, &[src, addr], &[])
    }

    // ── Reference counting ──────────────────────────────────────

    pub fn strong_retain(&mut self, operand: Value) -> InstId {
        self.build(InstKind::StrongRetain, &[operand], &[])
    }

    pub fn strong_release(&mut self, operand: Value) -> InstId {
        self.build(InstKind::StrongRelease, &[operand], &[])
    }

    pub fn copy_value(&mut self, operand: Value) -> Value {
        let ty = self.func.value_type(operand);
        self.build_value(InstKind::CopyValue, &[operand], ty)
    }

    pub fn destroy_value(&mut self, operand: Value) -> InstId {
        self.build(InstKind::DestroyValue, &[operand], &[])
    }

    // ── Calls and dispatch ──────────────────────────────────────

    pub fn apply(&mut self, callee: Value, args: &[Value], result_ty: Ty) -> Value {
        let mut operands: SmallVec<[Value; 4]> = SmallVec::with_capacity(args.len() + 1);
        operands.push(callee);
        operands.extend_from_slice(args);
        self.build_value(InstKind::Apply, &operands, result_ty)
    }

    pub fn class_method(&mut self, self_value: Value, method: Name, ty: Ty) -> Value {
        self.build_value(InstKind::ClassMethod { method }, &[self_value], ty)
    }

    pub fn witness_method(&mut self, protocol: Name, method: Name, lookup_type: Ty, ty: Ty) -> Value {
        let kind = InstKind::WitnessMethod {
            protocol,
            method,
            lookup_type,
        };
        self.build_value(kind, &[], ty)
    }

    pub fn init_existential(&mut self, operand: Value, existential_ty: Ty) -> Value {
        let concrete = self.func.value_type(operand);
        self.build_value(InstKind::InitExistential { concrete }, &[operand], existential_ty)
    }

    pub fn open_existential(&mut self, existential: Value, opened_ty: Ty) -> Value {
        self.build_value(InstKind::OpenExistential, &[existential], opened_ty)
    }

    // ── Terminators ─────────────────────────────────────────────

    pub fn br(&mut self, dest: BlockId, args: &[Value]) -> InstId {
        self.build(InstKind::Branch { dest }, args, &[])
    }

    pub fn cond_br(
        &mut self,
        cond: Value,
        true_dest: BlockId,
        true_args: &[Value],
        false_dest: BlockId,
        false_args: &[Value],
    ) -> InstId {
        let true_arg_count = u32::try_from(true_args.len())
            .unwrap_or_else(|_| panic!("branch argument count exceeds u32::MAX"));
        let mut operands: SmallVec<[Value; 4]> = SmallVec::new();
        operands.push(cond);
        operands.extend_from_slice(true_args);
        operands.extend_from_slice(false_args);
        let kind = InstKind::CondBranch {
            true_dest,
            false_dest,
            true_arg_count,
        };
        self.build(kind, &operands, &[])
    }

    pub fn switch(&mut self, value: Value, cases: Vec<(i64, BlockId)>, default: Option<BlockId>) -> InstId {
        self.build(InstKind::Switch { cases, default }, &[value], &[])
    }

    pub fn try_apply(&mut self, callee: Value, args: &[Value], normal: BlockId, error: BlockId) -> InstId {
        let mut operands: SmallVec<[Value; 4]> = SmallVec::with_capacity(args.len() + 1);
        operands.push(callee);
        operands.extend_from_slice(args);
        self.build(InstKind::TryApply { normal, error }, &operands, &[])
    }

    pub fn return_(&mut self, value: Value) -> InstId {
        self.build(InstKind::Return, &[value], &[])
    }

    pub fn throw(&mut self, error: Value) -> InstId {
        self.build(InstKind::Throw, &[error], &[])
    }

    pub fn unreachable(&mut self) -> InstId {
        self.build(InstKind::Unreachable, &[], &[])
    }
}
