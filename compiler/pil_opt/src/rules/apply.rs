//! Removal of calls whose result is only reference counted.
//!
//! A call to a callee without writes, releases or throws, whose result
//! feeds nothing but ARC bookkeeping, is erased along with that
//! bookkeeping. Owned non-trivial arguments are destroyed in its place.

use smallvec::SmallVec;

use pil_ir::{InstId, InstKind, OwnershipKind, Value};

use super::is_trivial;
use crate::arc_users;
use crate::combiner::{Combiner, NewInst, Rewrite};

pub(super) fn visit_apply(cx: &mut Combiner<'_, '_>, inst: InstId) -> Rewrite {
    let func = cx.func();
    let node = func.inst(inst);
    let callee = node.operand(0);
    let Some(name) = callee
        .defining_inst()
        .and_then(|i| func.try_inst(i))
        .and_then(|i| match i.kind() {
            InstKind::FunctionRef { func } => Some(*func),
            _ => None,
        })
    else {
        return Rewrite::Unchanged;
    };
    if !cx.facts().callees.effects(name).is_removable() {
        return Rewrite::Unchanged;
    }

    let mut bookkeeping = Vec::new();
    for result in func.results(inst) {
        match arc_users::collect(func, result) {
            Some(users) => bookkeeping.extend(users),
            None => return Rewrite::Unchanged,
        }
    }
    let consumed: SmallVec<[Value; 4]> = node.operands()[1..]
        .iter()
        .copied()
        .filter(|&arg| {
            func.value_ownership(arg) == OwnershipKind::Owned && !is_trivial(cx, arg)
        })
        .collect();

    for user in bookkeeping {
        cx.erase_inst(user);
    }
    for arg in consumed {
        cx.insert_before(inst, NewInst::without_result(InstKind::DestroyValue, &[arg]));
    }
    Rewrite::Erase
}
