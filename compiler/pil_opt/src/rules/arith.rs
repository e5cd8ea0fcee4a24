//! Integer builtin rules: constant folding, algebraic identities and
//! strength reduction.
//!
//! Folding is done in `i128` and kept only if the result fits the
//! operand's signed width (`Int1` is `0` or `1`). An overflowing operation
//! is left alone. Signed comparisons read an `Int1` literal `1` as `-1`.

use pil_ir::{BuiltinOp, InstId, InstKind, Ty, Value};

use super::literal;
use crate::combiner::{Combiner, NewInst, Rewrite};

pub(super) fn visit_builtin(cx: &mut Combiner<'_, '_>, inst: InstId, op: BuiltinOp) -> Rewrite {
    let func = cx.func();
    let node = func.inst(inst);
    let (lhs, rhs) = (node.operand(0), node.operand(1));
    let ty = func.value_type(Value::result(inst));
    let (l, r) = (literal(func, lhs), literal(func, rhs));

    if let (Some(a), Some(b)) = (l, r) {
        if !cx.config().fold_constants {
            return Rewrite::Unchanged;
        }
        let width = cx.facts().types.integer_width(func.value_type(lhs));
        return match fold(op, a, b, width) {
            Some(value) => Rewrite::ReplaceWithNew(NewInst::literal(ty, value)),
            None => Rewrite::Unchanged,
        };
    }

    if let Some(rewrite) = identity(op, lhs, rhs, l, r, ty) {
        return rewrite;
    }

    if op == BuiltinOp::Mul && cx.config().strength_reduce {
        let width = cx.facts().types.integer_width(ty).unwrap_or(0);
        let candidate = match (l, r) {
            (_, Some(c)) => shift_amount(c, width).map(|k| (lhs, k)),
            (Some(c), _) => shift_amount(c, width).map(|k| (rhs, k)),
            _ => None,
        };
        if let Some((x, k)) = candidate {
            let Some(amount) = cx.insert_before(inst, NewInst::literal(ty, k)) else {
                return Rewrite::Unchanged;
            };
            return Rewrite::ReplaceWithNew(NewInst::new(
                InstKind::Builtin { op: BuiltinOp::Shl },
                &[x, Value::result(amount)],
                ty,
            ));
        }
    }

    Rewrite::Unchanged
}

/// Evaluate `a op b` at `width` bits, or `None` if the result does not fit
/// or the operands are not integers.
pub(super) fn fold(op: BuiltinOp, a: i64, b: i64, width: Option<u32>) -> Option<i64> {
    let width = width.filter(|w| (1..=64).contains(w))?;
    let (a, b) = (i128::from(a), i128::from(b));
    let wide = match op {
        BuiltinOp::Add => a + b,
        BuiltinOp::Sub => a - b,
        BuiltinOp::Mul => a * b,
        BuiltinOp::And => a & b,
        BuiltinOp::Or => a | b,
        BuiltinOp::Xor => a ^ b,
        BuiltinOp::Shl => {
            let amount = u32::try_from(b).ok().filter(|&s| s < width)?;
            a << amount
        }
        BuiltinOp::CmpEq => return Some(i64::from(a == b)),
        BuiltinOp::CmpNe => return Some(i64::from(a != b)),
        BuiltinOp::CmpSlt => return Some(i64::from(signed(a, width) < signed(b, width))),
    };
    // Int1 holds 0 and 1.
    let (min, max) = if width == 1 {
        (0, 1)
    } else {
        (-(1i128 << (width - 1)), (1i128 << (width - 1)) - 1)
    };
    if (min..=max).contains(&wide) {
        i64::try_from(wide).ok()
    } else {
        None
    }
}

/// `value` read as a two's-complement integer of `width` bits. Only `Int1`
/// literals (`0` and `1`) are stored unsigned.
fn signed(value: i128, width: u32) -> i128 {
    if width == 1 {
        -(value & 1)
    } else {
        value
    }
}

/// Identities that need at most one constant operand.
fn identity(
    op: BuiltinOp,
    lhs: Value,
    rhs: Value,
    l: Option<i64>,
    r: Option<i64>,
    ty: Ty,
) -> Option<Rewrite> {
    let same = lhs == rhs;
    let keep = Rewrite::ReplaceWith;
    let constant = |value| Rewrite::ReplaceWithNew(NewInst::literal(ty, value));
    let rewrite = match op {
        BuiltinOp::Add | BuiltinOp::Or | BuiltinOp::Xor if r == Some(0) => keep(lhs),
        BuiltinOp::Add | BuiltinOp::Or | BuiltinOp::Xor if l == Some(0) => keep(rhs),
        BuiltinOp::Sub | BuiltinOp::Shl if r == Some(0) => keep(lhs),
        BuiltinOp::Mul if r == Some(1) => keep(lhs),
        BuiltinOp::Mul if l == Some(1) => keep(rhs),
        BuiltinOp::Mul | BuiltinOp::And if r == Some(0) || l == Some(0) => constant(0),
        BuiltinOp::Sub | BuiltinOp::Xor if same => constant(0),
        BuiltinOp::And | BuiltinOp::Or if same => keep(lhs),
        BuiltinOp::CmpEq if same => constant(1),
        BuiltinOp::CmpNe | BuiltinOp::CmpSlt if same => constant(0),
        _ => return None,
    };
    Some(rewrite)
}

/// `k` such that `c == 1 << k`, for `1 <= k < width - 1`.
fn shift_amount(c: i64, width: u32) -> Option<i64> {
    let c = u64::try_from(c).ok()?;
    if !c.is_power_of_two() {
        return None;
    }
    let k = c.trailing_zeros();
    (k >= 1 && k + 1 < width).then_some(i64::from(k))
}
