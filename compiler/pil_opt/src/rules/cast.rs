//! Reference cast simplification.
//!
//! A cast to the operand's own type is the operand. A cast of a cast
//! becomes a single cast of the original value: two upcasts stay an
//! upcast, any chain involving `unchecked_ref_cast` becomes one.

use pil_ir::{InstId, InstKind, Value};

use super::defined_by;
use crate::combiner::{Combiner, NewInst, Rewrite};

fn is_cast(kind: &InstKind) -> bool {
    matches!(kind, InstKind::Upcast | InstKind::UncheckedRefCast)
}

pub(super) fn visit_cast(cx: &mut Combiner<'_, '_>, inst: InstId, outer: &InstKind) -> Rewrite {
    let func = cx.func();
    let source = func.inst(inst).operand(0);
    let target = func.value_type(Value::result(inst));
    if func.value_type(source) == target {
        return Rewrite::ReplaceWith(source);
    }

    let Some(inner) = defined_by(func, source, is_cast) else {
        return Rewrite::Unchanged;
    };
    let inner_node = func.inst(inner);
    let origin = inner_node.operand(0);
    if func.value_type(origin) == target {
        return Rewrite::ReplaceWith(origin);
    }
    let kind = match (inner_node.kind(), outer) {
        (InstKind::Upcast, InstKind::Upcast) => InstKind::Upcast,
        _ => InstKind::UncheckedRefCast,
    };
    Rewrite::ReplaceWithNew(NewInst::new(kind, &[origin], target))
}
