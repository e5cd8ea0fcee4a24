//! Memory rules for trivially typed values.
//!
//! All scans stay inside one block and stop after
//! [`CombinerConfig::max_scan_distance`](crate::CombinerConfig::max_scan_distance)
//! instructions.
//!
//! - A `load [trivial]` takes the value of the nearest preceding
//!   `store [trivial]` to (or `load [trivial]` from) the same address, if
//!   nothing in between may write aliasing memory.
//! - A `store [trivial]` is dead if the same address is overwritten by a
//!   later `store [trivial]`, or deallocated, before anything may read it.
//! - An `alloc_stack` whose only users are trivial stores into it and its
//!   `dealloc_stack` is removed together with them.

use smallvec::SmallVec;

use pil_ir::{InstId, InstKind, LoadQualifier, StoreQualifier, Value};

use crate::combiner::{Combiner, Rewrite};

pub(super) fn visit_load(cx: &mut Combiner<'_, '_>, inst: InstId, qualifier: LoadQualifier) -> Rewrite {
    if !cx.config().forward_memory || qualifier != LoadQualifier::Trivial {
        return Rewrite::Unchanged;
    }
    let func = cx.func();
    let alias = cx.facts().alias;
    let addr = func.inst(inst).operand(0);

    let mut cursor = func.inst(inst).prev();
    for _ in 0..cx.config().max_scan_distance {
        let Some(current) = cursor else {
            break;
        };
        let node = func.inst(current);
        match node.kind() {
            InstKind::Store {
                qualifier: StoreQualifier::Trivial,
            } if node.operand(1) == addr => return Rewrite::ReplaceWith(node.operand(0)),
            InstKind::Load {
                qualifier: LoadQualifier::Trivial,
            } if node.operand(0) == addr => return Rewrite::ReplaceWith(Value::result(current)),
            InstKind::Store { .. } => {
                if alias.may_alias(func, node.operand(1), addr) {
                    return Rewrite::Unchanged;
                }
            }
            kind if kind.may_write_memory() => return Rewrite::Unchanged,
            _ => {}
        }
        cursor = node.prev();
    }
    Rewrite::Unchanged
}

pub(super) fn visit_store(cx: &mut Combiner<'_, '_>, inst: InstId, qualifier: StoreQualifier) -> Rewrite {
    if !cx.config().forward_memory || qualifier != StoreQualifier::Trivial {
        return Rewrite::Unchanged;
    }
    let func = cx.func();
    let alias = cx.facts().alias;
    let addr = func.inst(inst).operand(1);

    let mut cursor = func.inst(inst).next();
    for _ in 0..cx.config().max_scan_distance {
        let Some(current) = cursor else {
            break;
        };
        let node = func.inst(current);
        match node.kind() {
            InstKind::Store {
                qualifier: StoreQualifier::Trivial,
            }
            | InstKind::DeallocStack
                if node.operands().last() == Some(&addr) =>
            {
                return Rewrite::Erase;
            }
            InstKind::Store {
                qualifier: StoreQualifier::Trivial,
            } => {
                if alias.may_alias(func, node.operand(1), addr) {
                    return Rewrite::Unchanged;
                }
            }
            InstKind::Load {
                qualifier: LoadQualifier::Trivial,
            } => {
                if alias.may_alias(func, node.operand(0), addr) {
                    return Rewrite::Unchanged;
                }
            }
            InstKind::DeallocStack => {}
            kind if kind.is_terminator() || kind.may_read_memory() || kind.may_write_memory() => {
                return Rewrite::Unchanged;
            }
            _ => {}
        }
        cursor = node.next();
    }
    Rewrite::Unchanged
}

pub(super) fn visit_alloc_stack(cx: &mut Combiner<'_, '_>, inst: InstId) -> Rewrite {
    if !cx.config().forward_memory {
        return Rewrite::Unchanged;
    }
    let func = cx.func();
    let slot = Value::result(inst);
    let mut users: SmallVec<[InstId; 4]> = SmallVec::new();
    for u in func.uses(slot) {
        let only_writes = match func.inst(u.user).kind() {
            InstKind::Store {
                qualifier: StoreQualifier::Trivial,
            } => u.operand == 1,
            InstKind::DeallocStack => true,
            _ => false,
        };
        if !only_writes {
            return Rewrite::Unchanged;
        }
        if !users.contains(&u.user) {
            users.push(u.user);
        }
    }
    for user in users {
        cx.erase_inst(user);
    }
    Rewrite::Erase
}
