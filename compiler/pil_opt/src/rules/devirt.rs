//! Devirtualization.
//!
//! A `class_method` lookup whose receiver's dynamic class is known becomes
//! a `function_ref` to the implementation. The class is known when the
//! receiver comes straight from an `alloc_ref`, or when its static class
//! has no subclasses. A `witness_method` lookup becomes a `function_ref`
//! when the lookup type conforms directly, or when the protocol has
//! exactly one conforming type.

use pil_ir::{InstId, InstKind, Name, Ty, Value};

use super::defined_by;
use crate::combiner::{Combiner, NewInst, Rewrite};

pub(super) fn visit_class_method(cx: &mut Combiner<'_, '_>, inst: InstId, method: Name) -> Rewrite {
    if !cx.config().devirtualize {
        return Rewrite::Unchanged;
    }
    let func = cx.func();
    let receiver = func.inst(inst).operand(0);
    let classes = cx.facts().classes;

    let class = match defined_by(func, receiver, |k| matches!(k, InstKind::AllocRef)) {
        Some(_) => func.value_type(receiver),
        None => {
            let ty = func.value_type(receiver);
            if classes.has_subclasses(ty) {
                return Rewrite::Unchanged;
            }
            ty
        }
    };
    let Some(target) = classes.resolve_method(class, method) else {
        return Rewrite::Unchanged;
    };
    let ty = func.value_type(Value::result(inst));
    Rewrite::ReplaceWithNew(NewInst::function_ref(ty, target))
}

pub(super) fn visit_witness_method(
    cx: &mut Combiner<'_, '_>,
    inst: InstId,
    protocol: Name,
    method: Name,
    lookup_type: Ty,
) -> Rewrite {
    if !cx.config().devirtualize {
        return Rewrite::Unchanged;
    }
    let conformances = cx.facts().conformances;
    let concrete = if conformances.conforms(lookup_type, protocol) {
        lookup_type
    } else {
        match conformances.sole_conforming_type(protocol) {
            Some(only) => only,
            None => return Rewrite::Unchanged,
        }
    };
    let Some(target) = conformances.resolve_witness(concrete, protocol, method) else {
        return Rewrite::Unchanged;
    };
    let ty = cx.func().value_type(Value::result(inst));
    Rewrite::ReplaceWithNew(NewInst::function_ref(ty, target))
}
