//! Projection out of a freshly built aggregate.
//!
//! `struct_extract (struct a, b, c), #1` is `b`, and likewise for tuples.
//! Extracts borrow while the field operands may be owned, so the
//! Combiner's ownership check rejects the forward unless the kinds agree
//! or the field is trivial.

use pil_ir::{InstId, InstKind, Value};

use super::defined_by;
use crate::combiner::{Combiner, Rewrite};

pub(super) fn visit_extract(
    cx: &mut Combiner<'_, '_>,
    inst: InstId,
    index: u32,
    is_tuple: bool,
) -> Rewrite {
    let func = cx.func();
    let aggregate = func.inst(inst).operand(0);
    let constructor = if is_tuple {
        defined_by(func, aggregate, |k| matches!(k, InstKind::Tuple))
    } else {
        defined_by(func, aggregate, |k| matches!(k, InstKind::Struct))
    };
    let Some(constructor) = constructor else {
        return Rewrite::Unchanged;
    };
    let field: Option<Value> = func
        .inst(constructor)
        .operands()
        .get(index as usize)
        .copied();
    match field {
        Some(field) => Rewrite::ReplaceWith(field),
        None => Rewrite::Unchanged,
    }
}
