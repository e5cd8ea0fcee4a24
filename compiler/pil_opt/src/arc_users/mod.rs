//! Reference-counting users of a value.
//!
//! A value whose every use only adjusts reference counts (directly, or
//! through copies and reference-identity-preserving projections of it) is
//! dead in all but bookkeeping. [`collect`] finds those users so the call
//! rule can delete a removable call together with them.

use rustc_hash::FxHashSet;

use pil_ir::{Function, InstId, InstKind, Value};

/// Every instruction that transitively uses `value` only for reference
/// counting, ordered so each one's results are unused by the time it is
/// erased (users before the copies and projections they use).
///
/// Returns `None` if any transitive user does something else with the
/// value.
pub(crate) fn collect(func: &Function, value: Value) -> Option<Vec<InstId>> {
    let mut users = Vec::new();
    let mut seen = FxHashSet::default();
    visit(func, value, &mut seen, &mut users)?;
    Some(users)
}

fn visit(
    func: &Function,
    value: Value,
    seen: &mut FxHashSet<InstId>,
    users: &mut Vec<InstId>,
) -> Option<()> {
    for u in func.uses(value) {
        if !seen.insert(u.user) {
            continue;
        }
        match func.inst(u.user).kind() {
            InstKind::StrongRetain | InstKind::StrongRelease | InstKind::DestroyValue => {}
            InstKind::CopyValue
            | InstKind::Upcast
            | InstKind::UncheckedRefCast
            | InstKind::StructExtract { .. }
            | InstKind::TupleExtract { .. } => {
                visit(func, Value::result(u.user), seen, users)?;
            }
            _ => return None,
        }
        users.push(u.user);
    }
    Some(())
}
