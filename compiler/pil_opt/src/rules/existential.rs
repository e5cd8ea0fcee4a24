//! `open_existential (init_existential x)` is `x` when the opened type is
//! the concrete type that was boxed.

use pil_ir::{InstId, InstKind, Value};

use crate::combiner::{Combiner, Rewrite};

pub(super) fn visit_open_existential(cx: &mut Combiner<'_, '_>, inst: InstId) -> Rewrite {
    let func = cx.func();
    let existential = func.inst(inst).operand(0);
    let Some(init) = existential.defining_inst().and_then(|i| func.try_inst(i)) else {
        return Rewrite::Unchanged;
    };
    let InstKind::InitExistential { concrete } = *init.kind() else {
        return Rewrite::Unchanged;
    };
    let boxed = init.operand(0);
    let opened = func.value_type(Value::result(inst));
    if opened == concrete && func.value_type(boxed) == concrete {
        Rewrite::ReplaceWith(boxed)
    } else {
        Rewrite::Unchanged
    }
}
