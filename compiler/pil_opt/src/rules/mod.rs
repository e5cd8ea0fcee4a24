//! The rule table: one entry per instruction kind.
//!
//! [`visit`] is an exhaustive `match` over [`InstKind`] with no wildcard
//! arm, so a new opcode does not compile until it is given a rule (or an
//! explicit `Unchanged`). Rules read the function through the
//! [`Combiner`], may build helper instructions or schedule extra erasures
//! through it, and return a [`Rewrite`] for the visited instruction. The
//! Combiner applies the rewrite only after its safety checks pass.
//!
//! | Family | Module | Opcodes |
//! |--------|--------|---------|
//! | reference counting | `arc` | `strong_retain`, `strong_release`, `copy_value`, `destroy_value` |
//! | aggregates | `aggregate` | `struct_extract`, `tuple_extract` |
//! | casts | `cast` | `upcast`, `unchecked_ref_cast` |
//! | integer arithmetic | `arith` | `builtin` |
//! | calls | `apply` | `apply` |
//! | dynamic dispatch | `devirt` | `class_method`, `witness_method` |
//! | existentials | `existential` | `open_existential` |
//! | memory | `memory` | `alloc_stack`, `load`, `store` |

use pil_ir::{Function, InstId, InstKind, Value};

use crate::combiner::{Combiner, Rewrite};

mod aggregate;
mod apply;
mod arc;
mod arith;
mod cast;
mod devirt;
mod existential;
mod memory;

/// Ask the rule for `inst`'s opcode what to do with it.
pub(crate) fn visit(cx: &mut Combiner<'_, '_>, inst: InstId) -> Rewrite {
    let kind = cx.func().inst(inst).kind().clone();
    match kind {
        InstKind::Builtin { op } => arith::visit_builtin(cx, inst, op),

        InstKind::StructExtract { field } => aggregate::visit_extract(cx, inst, field, false),
        InstKind::TupleExtract { index } => aggregate::visit_extract(cx, inst, index, true),

        InstKind::Upcast | InstKind::UncheckedRefCast => cast::visit_cast(cx, inst, &kind),

        InstKind::AllocStack => memory::visit_alloc_stack(cx, inst),
        InstKind::Load { qualifier } => memory::visit_load(cx, inst, qualifier),
        InstKind::Store { qualifier } => memory::visit_store(cx, inst, qualifier),

        InstKind::StrongRetain => arc::visit_strong_retain(cx, inst),
        InstKind::StrongRelease => arc::visit_strong_release(cx, inst),
        InstKind::CopyValue => arc::visit_copy_value(cx, inst),
        InstKind::DestroyValue => arc::visit_destroy_value(cx, inst),

        InstKind::Apply => apply::visit_apply(cx, inst),

        InstKind::ClassMethod { method } => devirt::visit_class_method(cx, inst, method),
        InstKind::WitnessMethod {
            protocol,
            method,
            lookup_type,
        } => devirt::visit_witness_method(cx, inst, protocol, method, lookup_type),

        InstKind::OpenExistential => existential::visit_open_existential(cx, inst),

        InstKind::IntegerLiteral { .. }
        | InstKind::FunctionRef { .. }
        | InstKind::Struct
        | InstKind::Tuple
        | InstKind::DestructureTuple
        | InstKind::AllocRef
        | InstKind::DeallocStack
        | InstKind::InitExistential { .. } => Rewrite::Unchanged,

        // The Combiner never changes control flow.
        InstKind::Branch { .. }
        | InstKind::CondBranch { .. }
        | InstKind::Switch { .. }
        | InstKind::TryApply { .. }
        | InstKind::Return
        | InstKind::Throw
        | InstKind::Unreachable => Rewrite::Unchanged,
    }
}

// ── Shared matchers ─────────────────────────────────────────────────

/// The instruction defining `value`, if it is a result of kind `want`.
fn defined_by(func: &Function, value: Value, want: fn(&InstKind) -> bool) -> Option<InstId> {
    let inst = value.defining_inst()?;
    want(func.try_inst(inst)?.kind()).then_some(inst)
}

/// The value of an `integer_literal`.
fn literal(func: &Function, value: Value) -> Option<i64> {
    let inst = value.defining_inst()?;
    match func.try_inst(inst)?.kind() {
        InstKind::IntegerLiteral { value } => Some(*value),
        _ => None,
    }
}

/// Whether `value` has a trivial type under the current type facts.
fn is_trivial(cx: &Combiner<'_, '_>, value: Value) -> bool {
    cx.facts().types.is_trivial(cx.func().value_type(value))
}
