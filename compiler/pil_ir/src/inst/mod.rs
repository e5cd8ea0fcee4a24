//! Instruction kinds and instruction nodes.
//!
//! [`InstKind`] is the closed set of PIL opcodes, terminators included. It
//! carries only the non-value payload of an instruction (literals, field
//! indices, successor blocks, method names). Value operands live uniformly
//! in the [`Instruction`] node so that use lists can point at an
//! `(instruction, operand index)` slot regardless of opcode.
//!
//! # Operand layout
//!
//! | Kind | Operands |
//! |------|----------|
//! | `Builtin` | `[lhs, rhs]` |
//! | `Struct`, `Tuple` | elements |
//! | `StructExtract`, `TupleExtract`, `DestructureTuple` | `[aggregate]` |
//! | `Store` | `[src, dest_addr]` |
//! | `Apply`, `TryApply` | `[callee, args..]` |
//! | `ClassMethod` | `[self]` |
//! | `Branch` | successor args |
//! | `CondBranch` | `[cond, true_args.., false_args..]` |
//! | `Switch` | `[discriminant]` |
//! | `Return`, `Throw` | `[value]` |
//! | everything else | at most one operand, see [`InstKind::arity`] |

use smallvec::SmallVec;

use crate::arena::define_id;
use crate::ownership::{merge_ownership, OwnershipMismatch};
use crate::scope::ScopeId;
use crate::value::ValueData;
use crate::{BlockId, Name, OwnershipKind, Ty, TypeFacts, Value};

define_id!(
    /// Handle to an instruction within one function.
    InstId,
    "i"
);

// ── Payload enums ───────────────────────────────────────────────────

/// Integer builtin operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BuiltinOp {
    Add,
    Sub,
    Mul,
    And,
    Or,
    Xor,
    Shl,
    CmpEq,
    CmpNe,
    /// Signed less-than.
    CmpSlt,
}

impl BuiltinOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            BuiltinOp::Add => "add",
            BuiltinOp::Sub => "sub",
            BuiltinOp::Mul => "mul",
            BuiltinOp::And => "and",
            BuiltinOp::Or => "or",
            BuiltinOp::Xor => "xor",
            BuiltinOp::Shl => "shl",
            BuiltinOp::CmpEq => "cmp_eq",
            BuiltinOp::CmpNe => "cmp_ne",
            BuiltinOp::CmpSlt => "cmp_slt",
        }
    }

    /// Whether the result is an `Int1` regardless of operand width.
    pub fn is_comparison(self) -> bool {
        matches!(self, BuiltinOp::CmpEq | BuiltinOp::CmpNe | BuiltinOp::CmpSlt)
    }

    pub fn is_commutative(self) -> bool {
        matches!(
            self,
            BuiltinOp::Add
                | BuiltinOp::Mul
                | BuiltinOp::And
                | BuiltinOp::Or
                | BuiltinOp::Xor
                | BuiltinOp::CmpEq
                | BuiltinOp::CmpNe
        )
    }
}

/// How a `load` treats the loaded value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LoadQualifier {
    /// Bitwise load of a trivial value.
    Trivial,
    /// Load a +1 copy, leaving memory initialized.
    Copy,
    /// Move the value out, leaving memory uninitialized.
    Take,
}

/// How a `store` treats the destination.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StoreQualifier {
    /// Bitwise store of a trivial value.
    Trivial,
    /// Initialize uninitialized memory, consuming the source.
    Init,
    /// Overwrite initialized memory, destroying the old value.
    Assign,
}

// ── Instruction kinds ───────────────────────────────────────────────

/// The opcode and non-value payload of an instruction.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InstKind {
    // Constants and references
    IntegerLiteral {
        value: i64,
    },
    FunctionRef {
        func: Name,
    },

    Builtin {
        op: BuiltinOp,
    },

    // Aggregates
    Struct,
    Tuple,
    StructExtract {
        field: u32,
    },
    TupleExtract {
        index: u32,
    },
    /// One result per tuple element.
    DestructureTuple,

    // Casts
    Upcast,
    UncheckedRefCast,

    // Allocation and memory
    AllocRef,
    AllocStack,
    DeallocStack,
    Load {
        qualifier: LoadQualifier,
    },
    Store {
        qualifier: StoreQualifier,
    },

    // Reference counting
    StrongRetain,
    StrongRelease,
    CopyValue,
    DestroyValue,

    // Calls and dispatch
    Apply,
    ClassMethod {
        method: Name,
    },
    /// Witness lookup of `method` from `protocol` for `lookup_type`.
    WitnessMethod {
        protocol: Name,
        method: Name,
        lookup_type: Ty,
    },
    InitExistential {
        concrete: Ty,
    },
    OpenExistential,

    // Terminators
    Branch {
        dest: BlockId,
    },
    CondBranch {
        true_dest: BlockId,
        false_dest: BlockId,
        /// Number of operands after the condition that belong to `true_dest`.
        true_arg_count: u32,
    },
    Switch {
        cases: Vec<(i64, BlockId)>,
        default: Option<BlockId>,
    },
    /// A call that either continues at `normal` (receiving the result as a
    /// block argument) or at `error` (receiving the thrown error).
    TryApply {
        normal: BlockId,
        error: BlockId,
    },
    Return,
    Throw,
    Unreachable,
}

/// Expected operand count of an instruction kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == n,
            Arity::AtLeast(n) => count >= n,
        }
    }
}

impl InstKind {
    /// Textual opcode used by the printer and in logs.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            InstKind::IntegerLiteral { .. } => "integer_literal",
            InstKind::FunctionRef { .. } => "function_ref",
            InstKind::Builtin { op } => op.mnemonic(),
            InstKind::Struct => "struct",
            InstKind::Tuple => "tuple",
            InstKind::StructExtract { .. } => "struct_extract",
            InstKind::TupleExtract { .. } => "tuple_extract",
            InstKind::DestructureTuple => "destructure_tuple",
            InstKind::Upcast => "upcast",
            InstKind::UncheckedRefCast => "unchecked_ref_cast",
            InstKind::AllocRef => "alloc_ref",
            InstKind::AllocStack => "alloc_stack",
            InstKind::DeallocStack => "dealloc_stack",
            InstKind::Load { .. } => "load",
            InstKind::Store { .. } => "store",
            InstKind::StrongRetain => "strong_retain",
            InstKind::StrongRelease => "strong_release",
            InstKind::CopyValue => "copy_value",
            InstKind::DestroyValue => "destroy_value",
            InstKind::Apply => "apply",
            InstKind::ClassMethod { .. } => "class_method",
            InstKind::WitnessMethod { .. } => "witness_method",
            InstKind::InitExistential { .. } => "init_existential",
            InstKind::OpenExistential => "open_existential",
            InstKind::Branch { .. } => "br",
            InstKind::CondBranch { .. } => "cond_br",
            InstKind::Switch { .. } => "switch",
            InstKind::TryApply { .. } => "try_apply",
            InstKind::Return => "return",
            InstKind::Throw => "throw",
            InstKind::Unreachable => "unreachable",
        }
    }

    /// Operand count this kind requires.
    pub fn arity(&self) -> Arity {
        match self {
            InstKind::IntegerLiteral { .. }
            | InstKind::FunctionRef { .. }
            | InstKind::WitnessMethod { .. }
            | InstKind::AllocRef
            | InstKind::AllocStack
            | InstKind::Unreachable => Arity::Exact(0),

            InstKind::StructExtract { .. }
            | InstKind::TupleExtract { .. }
            | InstKind::DestructureTuple
            | InstKind::Upcast
            | InstKind::UncheckedRefCast
            | InstKind::DeallocStack
            | InstKind::Load { .. }
            | InstKind::StrongRetain
            | InstKind::StrongRelease
            | InstKind::CopyValue
            | InstKind::DestroyValue
            | InstKind::ClassMethod { .. }
            | InstKind::InitExistential { .. }
            | InstKind::OpenExistential
            | InstKind::Switch { .. }
            | InstKind::Return
            | InstKind::Throw => Arity::Exact(1),

            InstKind::Builtin { .. } | InstKind::Store { .. } => Arity::Exact(2),

            InstKind::Struct | InstKind::Tuple | InstKind::Branch { .. } => Arity::AtLeast(0),

            InstKind::Apply | InstKind::TryApply { .. } => Arity::AtLeast(1),

            InstKind::CondBranch { true_arg_count, .. } => {
                Arity::AtLeast(1 + *true_arg_count as usize)
            }
        }
    }

    /// Whether this kind ends a basic block.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            InstKind::Branch { .. }
                | InstKind::CondBranch { .. }
                | InstKind::Switch { .. }
                | InstKind::TryApply { .. }
                | InstKind::Return
                | InstKind::Throw
                | InstKind::Unreachable
        )
    }

    /// Successor blocks in operand order. Duplicates are kept.
    pub fn successors(&self) -> SmallVec<[BlockId; 2]> {
        match self {
            InstKind::Branch { dest } => SmallVec::from_slice(&[*dest]),
            InstKind::CondBranch {
                true_dest,
                false_dest,
                ..
            } => SmallVec::from_slice(&[*true_dest, *false_dest]),
            InstKind::Switch { cases, default } => cases
                .iter()
                .map(|&(_, dest)| dest)
                .chain(default.iter().copied())
                .collect(),
            InstKind::TryApply { normal, error } => SmallVec::from_slice(&[*normal, *error]),
            _ => SmallVec::new(),
        }
    }

    /// Rewrite every successor block through `f`.
    pub fn map_successors(&mut self, mut f: impl FnMut(BlockId) -> BlockId) {
        match self {
            InstKind::Branch { dest } => *dest = f(*dest),
            InstKind::CondBranch {
                true_dest,
                false_dest,
                ..
            } => {
                *true_dest = f(*true_dest);
                *false_dest = f(*false_dest);
            }
            InstKind::Switch { cases, default } => {
                for (_, dest) in cases.iter_mut() {
                    *dest = f(*dest);
                }
                if let Some(dest) = default {
                    *dest = f(*dest);
                }
            }
            InstKind::TryApply { normal, error } => {
                *normal = f(*normal);
                *error = f(*error);
            }
            _ => {}
        }
    }

    /// The operands this terminator passes to the arguments of `dest`.
    ///
    /// Only `br` and `cond_br` carry block arguments. Every other kind
    /// (including `switch` and `try_apply`, whose successor arguments are
    /// produced by the edge itself) returns `None`, as does a `cond_br`
    /// that does not target `dest`. When both arms of a `cond_br` target
    /// the same block, the true arm's operands are returned.
    pub fn successor_operands<'a>(&self, operands: &'a [Value], dest: BlockId) -> Option<&'a [Value]> {
        match self {
            InstKind::Branch { dest: target } if *target == dest => Some(operands),
            InstKind::CondBranch {
                true_dest,
                false_dest,
                true_arg_count,
            } => {
                let split = 1 + *true_arg_count as usize;
                if *true_dest == dest {
                    operands.get(1..split)
                } else if *false_dest == dest {
                    operands.get(split..)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Whether this kind has any effect beyond producing its results.
    ///
    /// `apply` is conservatively effectful here; the optimizer refines it
    /// with callee facts.
    pub fn has_side_effects(&self) -> bool {
        match self {
            InstKind::IntegerLiteral { .. }
            | InstKind::FunctionRef { .. }
            | InstKind::Builtin { .. }
            | InstKind::Struct
            | InstKind::Tuple
            | InstKind::StructExtract { .. }
            | InstKind::TupleExtract { .. }
            | InstKind::DestructureTuple
            | InstKind::Upcast
            | InstKind::UncheckedRefCast
            | InstKind::ClassMethod { .. }
            | InstKind::WitnessMethod { .. }
            | InstKind::InitExistential { .. }
            | InstKind::OpenExistential
            | InstKind::CopyValue
            | InstKind::AllocRef
            | InstKind::AllocStack => false,

            InstKind::Load { qualifier } => *qualifier == LoadQualifier::Take,

            InstKind::DeallocStack
            | InstKind::Store { .. }
            | InstKind::StrongRetain
            | InstKind::StrongRelease
            | InstKind::DestroyValue
            | InstKind::Apply => true,

            InstKind::Branch { .. }
            | InstKind::CondBranch { .. }
            | InstKind::Switch { .. }
            | InstKind::TryApply { .. }
            | InstKind::Return
            | InstKind::Throw
            | InstKind::Unreachable => true,
        }
    }

    /// Whether an instance with no used results can simply be deleted.
    ///
    /// `copy_value` and `alloc_ref` are excluded: dropping them changes the
    /// balance of owned values, which is the ARC rules' business.
    pub fn is_trivially_dead_when_unused(&self) -> bool {
        !self.has_side_effects() && !matches!(self, InstKind::CopyValue | InstKind::AllocRef)
    }

    /// Whether this kind may write memory (including freeing objects).
    pub fn may_write_memory(&self) -> bool {
        matches!(
            self,
            InstKind::Store { .. }
                | InstKind::Load {
                    qualifier: LoadQualifier::Take
                }
                | InstKind::StrongRelease
                | InstKind::DestroyValue
                | InstKind::DeallocStack
                | InstKind::Apply
                | InstKind::TryApply { .. }
        )
    }

    /// Whether this kind may read memory.
    pub fn may_read_memory(&self) -> bool {
        matches!(
            self,
            InstKind::Load { .. } | InstKind::Apply | InstKind::TryApply { .. }
        ) || self.may_release()
    }

    /// Whether this kind may decrement a reference count (and so run a
    /// deinitializer).
    pub fn may_release(&self) -> bool {
        matches!(
            self,
            InstKind::StrongRelease
                | InstKind::DestroyValue
                | InstKind::Store {
                    qualifier: StoreQualifier::Assign
                }
                | InstKind::Apply
                | InstKind::TryApply { .. }
        )
    }
}

/// Ownership of a freshly created result.
///
/// `operands` are the ownership kinds of the instruction's operands in
/// operand order. The kind is computed once from the opcode semantics and
/// never inherited from whatever the instruction replaces.
pub fn result_ownership(
    kind: &InstKind,
    operands: &[OwnershipKind],
    result_ty: Ty,
    types: &dyn TypeFacts,
) -> Result<OwnershipKind, OwnershipMismatch> {
    if types.is_trivial(result_ty) {
        return Ok(OwnershipKind::None);
    }
    let kind = match kind {
        InstKind::IntegerLiteral { .. }
        | InstKind::FunctionRef { .. }
        | InstKind::Builtin { .. }
        | InstKind::ClassMethod { .. }
        | InstKind::WitnessMethod { .. }
        | InstKind::AllocStack
        | InstKind::Load {
            qualifier: LoadQualifier::Trivial,
        } => OwnershipKind::None,

        InstKind::Struct
        | InstKind::Tuple
        | InstKind::DestructureTuple
        | InstKind::Upcast
        | InstKind::UncheckedRefCast
        | InstKind::InitExistential { .. }
        | InstKind::OpenExistential => merge_ownership(operands.iter().copied())?,

        InstKind::StructExtract { .. } | InstKind::TupleExtract { .. } => {
            match operands.first().copied().unwrap_or(OwnershipKind::None) {
                OwnershipKind::Owned | OwnershipKind::Guaranteed => OwnershipKind::Guaranteed,
                OwnershipKind::Unowned => OwnershipKind::Unowned,
                OwnershipKind::None => OwnershipKind::None,
            }
        }

        InstKind::CopyValue
        | InstKind::Load {
            qualifier: LoadQualifier::Copy | LoadQualifier::Take,
        }
        | InstKind::AllocRef
        | InstKind::Apply => OwnershipKind::Owned,

        // No results.
        InstKind::DeallocStack
        | InstKind::Store { .. }
        | InstKind::StrongRetain
        | InstKind::StrongRelease
        | InstKind::DestroyValue
        | InstKind::Branch { .. }
        | InstKind::CondBranch { .. }
        | InstKind::Switch { .. }
        | InstKind::TryApply { .. }
        | InstKind::Return
        | InstKind::Throw
        | InstKind::Unreachable => OwnershipKind::None,
    };
    Ok(kind)
}

// ── Instruction node ────────────────────────────────────────────────

/// One instruction: kind, operands, results, scope and list links.
///
/// An instruction is created unlinked and then inserted into exactly one
/// block. `block`, `prev` and `next` are maintained by the list operations
/// on [`Function`](crate::Function) and are `None` while unlinked.
#[derive(Clone, Debug)]
pub struct Instruction {
    pub(crate) kind: InstKind,
    pub(crate) operands: SmallVec<[Value; 4]>,
    pub(crate) results: SmallVec<[ValueData; 1]>,
    pub(crate) scope: Option<ScopeId>,
    pub(crate) block: Option<BlockId>,
    pub(crate) prev: Option<InstId>,
    pub(crate) next: Option<InstId>,
}

impl Instruction {
    pub(crate) fn new(kind: InstKind, results: SmallVec<[ValueData; 1]>, scope: Option<ScopeId>) -> Self {
        Self {
            kind,
            operands: SmallVec::new(),
            results,
            scope,
            block: None,
            prev: None,
            next: None,
        }
    }

    #[inline]
    pub fn kind(&self) -> &InstKind {
        &self.kind
    }

    #[inline]
    pub fn operands(&self) -> &[Value] {
        &self.operands
    }

    /// Operand `i`.
    ///
    /// # Panics
    ///
    /// Panics if the instruction has fewer than `i + 1` operands.
    #[inline]
    pub fn operand(&self, i: usize) -> Value {
        self.operands[i]
    }

    #[inline]
    pub fn results(&self) -> &[ValueData] {
        &self.results
    }

    #[inline]
    pub fn num_results(&self) -> usize {
        self.results.len()
    }

    #[inline]
    pub fn scope(&self) -> Option<ScopeId> {
        self.scope
    }

    /// The block this instruction is linked into.
    #[inline]
    pub fn block(&self) -> Option<BlockId> {
        self.block
    }

    #[inline]
    pub fn is_linked(&self) -> bool {
        self.block.is_some()
    }

    #[inline]
    pub fn prev(&self) -> Option<InstId> {
        self.prev
    }

    #[inline]
    pub fn next(&self) -> Option<InstId> {
        self.next
    }

    #[inline]
    pub fn is_terminator(&self) -> bool {
        self.kind.is_terminator()
    }

    /// Whether any result has a use.
    pub fn has_used_results(&self) -> bool {
        self.results.iter().any(|r| !r.uses.is_empty())
    }

    /// See [`InstKind::successor_operands`].
    pub fn successor_operands(&self, dest: BlockId) -> Option<&[Value]> {
        self.kind.successor_operands(&self.operands, dest)
    }
}
