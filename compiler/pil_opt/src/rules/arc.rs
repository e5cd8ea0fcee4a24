//! Reference-counting rules.
//!
//! - Any ARC operation on a trivially typed value is a no-op and goes away
//!   (`copy_value` is replaced by its operand).
//! - `strong_retain x` followed in the same block by `strong_release x`,
//!   with nothing in between that uses `x` or may decrement a count, is
//!   removed as a pair.
//! - `destroy_value (copy_value x)` where the copy has no other use is
//!   removed as a pair.

use pil_ir::{InstId, InstKind, Value};

use super::{defined_by, is_trivial};
use crate::combiner::{Combiner, Rewrite};

pub(super) fn visit_strong_retain(cx: &mut Combiner<'_, '_>, inst: InstId) -> Rewrite {
    let operand = cx.func().inst(inst).operand(0);
    if is_trivial(cx, operand) {
        return Rewrite::Erase;
    }
    match paired_release(cx, inst, operand) {
        Some(release) => {
            cx.erase_after(release);
            Rewrite::Erase
        }
        None => Rewrite::Unchanged,
    }
}

pub(super) fn visit_strong_release(cx: &mut Combiner<'_, '_>, inst: InstId) -> Rewrite {
    let operand = cx.func().inst(inst).operand(0);
    if is_trivial(cx, operand) {
        Rewrite::Erase
    } else {
        Rewrite::Unchanged
    }
}

pub(super) fn visit_copy_value(cx: &mut Combiner<'_, '_>, inst: InstId) -> Rewrite {
    let operand = cx.func().inst(inst).operand(0);
    if is_trivial(cx, operand) {
        Rewrite::ReplaceWith(operand)
    } else {
        Rewrite::Unchanged
    }
}

pub(super) fn visit_destroy_value(cx: &mut Combiner<'_, '_>, inst: InstId) -> Rewrite {
    let operand = cx.func().inst(inst).operand(0);
    if is_trivial(cx, operand) {
        return Rewrite::Erase;
    }
    let Some(copy) = defined_by(cx.func(), operand, |k| matches!(k, InstKind::CopyValue)) else {
        return Rewrite::Unchanged;
    };
    if cx.func().uses(operand).len() != 1 {
        return Rewrite::Unchanged;
    }
    cx.erase_after(copy);
    Rewrite::Erase
}

/// The `strong_release` of `value` that cancels `retain`, if one follows
/// within the scan window with nothing in between that observes the count.
fn paired_release(cx: &Combiner<'_, '_>, retain: InstId, value: Value) -> Option<InstId> {
    let func = cx.func();
    let mut cursor = func.inst(retain).next();
    for _ in 0..cx.config().max_scan_distance {
        let current = cursor?;
        let node = func.inst(current);
        if matches!(node.kind(), InstKind::StrongRelease) && node.operand(0) == value {
            return Some(current);
        }
        if node.is_terminator() || node.kind().may_release() || node.operands().contains(&value) {
            return None;
        }
        cursor = node.next();
    }
    None
}
