use pretty_assertions::assert_eq;

use crate::test_helpers::{class_types, diamond, ends_with, lit, make_func, mnemonics};
use crate::{Builder, InstKind, OwnershipKind, Ty, Value};

use super::*;

fn forward_and_back(func: &Function, block: BlockId) -> (Vec<InstId>, Vec<InstId>) {
    let forward: Vec<_> = func.block_insts(block).collect();
    let mut backward: Vec<_> = func.block_insts(block).rev().collect();
    backward.reverse();
    (forward, backward)
}

// ── Linking ─────────────────────────────────────────────────

#[test]
fn push_back_and_front_order() {
    let (types, _) = class_types();
    let mut func = make_func(&types, &[], Ty::UNIT);
    let entry = func.entry_block();

    let a = func.create_inst(InstKind::IntegerLiteral { value: 1 }, [], &[(Ty::INT64, OwnershipKind::None)], None);
    let b = func.create_inst(InstKind::IntegerLiteral { value: 2 }, [], &[(Ty::INT64, OwnershipKind::None)], None);
    let c = func.create_inst(InstKind::IntegerLiteral { value: 3 }, [], &[(Ty::INT64, OwnershipKind::None)], None);
    func.push_back(entry, b);
    func.push_front(entry, a);
    func.push_back(entry, c);

    let (forward, backward) = forward_and_back(&func, entry);
    assert_eq!(forward, vec![a, b, c]);
    assert_eq!(backward, forward);
    assert_eq!(func.block_len(entry), 3);
    assert_eq!(func.block(entry).first_inst(), Some(a));
    assert_eq!(func.block(entry).last_inst(), Some(c));
    assert_eq!(func.inst(b).block(), Some(entry));
}

#[test]
fn insert_before_and_after() {
    let (types, _) = class_types();
    let mut func = make_func(&types, &[], Ty::UNIT);
    let entry = func.entry_block();
    let first = lit(&mut func, &types, entry, 1).defining_inst().unwrap();
    let last = lit(&mut func, &types, entry, 3).defining_inst().unwrap();

    let middle = func.create_inst(InstKind::IntegerLiteral { value: 2 }, [], &[(Ty::INT64, OwnershipKind::None)], None);
    func.insert_before(last, middle);
    let tail = func.create_inst(InstKind::IntegerLiteral { value: 4 }, [], &[(Ty::INT64, OwnershipKind::None)], None);
    func.insert_after(last, tail);

    let order: Vec<_> = func.block_insts(entry).collect();
    assert_eq!(order, vec![first, middle, last, tail]);
}

#[test]
#[should_panic(expected = "is already linked")]
fn double_link_panics() {
    let (types, _) = class_types();
    let mut func = make_func(&types, &[], Ty::UNIT);
    let entry = func.entry_block();
    let v = lit(&mut func, &types, entry, 1);
    func.push_back(entry, v.defining_inst().unwrap());
}

// ── Erase ───────────────────────────────────────────────────

#[test]
fn erase_unused_returns_next() {
    let (types, _) = class_types();
    let mut func = make_func(&types, &[], Ty::UNIT);
    let entry = func.entry_block();
    let a = lit(&mut func, &types, entry, 1).defining_inst().unwrap();
    let b = lit(&mut func, &types, entry, 2).defining_inst().unwrap();

    assert_eq!(func.erase(a), Some(b));
    assert!(!func.contains_inst(a));
    assert!(func.try_inst(a).is_none());
    assert_eq!(func.block_len(entry), 1);
    assert_eq!(func.erase(b), None);
    assert!(func.block(entry).is_empty());
}

#[test]
#[should_panic(expected = "still has 1 use(s)")]
fn erase_used_value_panics() {
    let (types, _) = class_types();
    let mut func = make_func(&types, &[], Ty::INT64);
    let entry = func.entry_block();
    let v = lit(&mut func, &types, entry, 1);
    Builder::at_end(&mut func, &types, entry).return_(v);
    func.erase(v.defining_inst().unwrap());
}

#[test]
fn erase_drops_operand_uses() {
    let (types, _) = class_types();
    let mut func = make_func(&types, &[], Ty::INT64);
    let entry = func.entry_block();
    let v = lit(&mut func, &types, entry, 1);
    let ret = Builder::at_end(&mut func, &types, entry).return_(v);
    assert_eq!(func.uses(v).len(), 1);
    func.erase(ret);
    assert!(!func.has_uses(v));
}

#[test]
#[should_panic(expected = "stale or foreign arena id")]
fn stale_handle_fails_loudly() {
    let (types, _) = class_types();
    let mut func = make_func(&types, &[], Ty::UNIT);
    let entry = func.entry_block();
    let a = lit(&mut func, &types, entry, 1).defining_inst().unwrap();
    func.erase(a);
    // The slot is reused, but the old handle must not alias the new node.
    lit(&mut func, &types, entry, 2);
    let _ = func.inst(a);
}

// ── Splice and split ────────────────────────────────────────

#[test]
fn splice_between_blocks_preserves_order() {
    let (types, _) = class_types();
    let mut func = make_func(&types, &[], Ty::UNIT);
    let x = func.entry_block();
    let y = func.create_basic_block(None, false);
    let xs: Vec<_> = (0..5).map(|i| lit(&mut func, &types, x, i).defining_inst().unwrap()).collect();
    let ys: Vec<_> = (10..13).map(|i| lit(&mut func, &types, y, i).defining_inst().unwrap()).collect();

    // Move [x1, x4) before y2.
    func.splice(y, Some(ys[2]), x, xs[1], Some(xs[4]));

    assert_eq!(func.block_insts(x).collect::<Vec<_>>(), vec![xs[0], xs[4]]);
    assert_eq!(
        func.block_insts(y).collect::<Vec<_>>(),
        vec![ys[0], ys[1], xs[1], xs[2], xs[3], ys[2]]
    );
    assert_eq!(func.block_len(x) + func.block_len(y), 8);
    assert!(xs[1..4].iter().all(|&i| func.inst(i).block() == Some(y)));
    let (forward, backward) = forward_and_back(&func, y);
    assert_eq!(forward, backward);
}

#[test]
fn splice_within_block_moves_range_to_end() {
    let (types, _) = class_types();
    let mut func = make_func(&types, &[], Ty::UNIT);
    let b = func.entry_block();
    let is: Vec<_> = (0..4).map(|i| lit(&mut func, &types, b, i).defining_inst().unwrap()).collect();

    func.splice(b, None, b, is[0], Some(is[2]));

    assert_eq!(func.block_insts(b).collect::<Vec<_>>(), vec![is[2], is[3], is[0], is[1]]);
    assert_eq!(func.block_len(b), 4);
}

#[test]
#[should_panic(expected = "lies inside the moved range")]
fn splice_into_own_range_panics() {
    let (types, _) = class_types();
    let mut func = make_func(&types, &[], Ty::UNIT);
    let b = func.entry_block();
    let is: Vec<_> = (0..3).map(|i| lit(&mut func, &types, b, i).defining_inst().unwrap()).collect();
    func.splice(b, Some(is[1]), b, is[0], None);
}

#[test]
fn split_block_moves_tail_and_terminator() {
    let (types, _) = class_types();
    let mut func = make_func(&types, &[], Ty::INT64);
    let entry = func.entry_block();
    let a = lit(&mut func, &types, entry, 1);
    let b = lit(&mut func, &types, entry, 2);
    Builder::at_end(&mut func, &types, entry).return_(b);

    let tail = func.split_block(b.defining_inst().unwrap());

    assert_eq!(func.blocks(), &[entry, tail]);
    assert_eq!(mnemonics(&func, entry), vec!["integer_literal"]);
    assert_eq!(mnemonics(&func, tail), vec!["integer_literal", "return"]);
    assert_eq!(func.terminator(entry), None);
    assert!(ends_with(&func, tail, |k| matches!(k, InstKind::Return)));
    assert_eq!(func.defining_block(a), Some(entry));
    assert_eq!(func.defining_block(b), Some(tail));

    Builder::at_end(&mut func, &types, entry).br(tail, &[]);
    assert_eq!(func.predecessors(tail).as_slice(), &[entry]);
}

// ── CFG queries ─────────────────────────────────────────────

#[test]
fn successors_and_predecessors() {
    let (types, _) = class_types();
    let d = diamond(&types);
    let f = &d.func;
    assert_eq!(f.successors(d.entry).as_slice(), &[d.left, d.right]);
    assert_eq!(f.predecessors(d.merge).as_slice(), &[d.left, d.right]);
    assert!(f.predecessors(d.entry).is_empty());
    assert!(f.successors(d.merge).is_empty());
    assert!(f.is_entry(d.entry));
    assert!(!f.is_entry(d.merge));
}

#[test]
fn duplicate_edges_are_reported_once() {
    let (types, _) = class_types();
    let mut func = make_func(&types, &[Ty::INT1], Ty::UNIT);
    let entry = func.entry_block();
    let cond = Value::Arg(func.block_args(entry)[0]);
    let target = func.create_basic_block(None, false);
    Builder::at_end(&mut func, &types, entry).cond_br(cond, target, &[], target, &[]);
    assert_eq!(func.successors(entry).as_slice(), &[target]);
    assert_eq!(func.predecessors(target).as_slice(), &[entry]);
}

// ── Arguments ───────────────────────────────────────────────

#[test]
fn argument_indices_follow_creation_order() {
    let (types, class) = class_types();
    let func = make_func(&types, &[Ty::INT64, class], Ty::UNIT);
    let entry = func.entry_block();
    let args = func.block_args(entry).to_vec();
    assert_eq!(func.arg(args[0]).index(), 0);
    assert_eq!(func.arg(args[1]).index(), 1);
    assert_eq!(func.arg(args[1]).kind(), ArgKind::Function);
    assert_eq!(func.arg(args[1]).ownership(), OwnershipKind::Owned);
    assert_eq!(func.arg(args[0]).ownership(), OwnershipKind::None);
}

#[test]
#[should_panic(expected = "function arguments belong to the entry block")]
fn function_argument_outside_entry_panics() {
    let (types, _) = class_types();
    let mut func = make_func(&types, &[], Ty::UNIT);
    let other = func.create_basic_block(None, false);
    func.create_function_argument(other, Ty::INT64, OwnershipKind::None, None);
}

#[test]
#[should_panic(expected = "phi arguments cannot be added to the entry block")]
fn phi_argument_in_entry_panics() {
    let (types, _) = class_types();
    let mut func = make_func(&types, &[], Ty::UNIT);
    let entry = func.entry_block();
    func.create_phi_argument(entry, Ty::INT64, OwnershipKind::None, None);
}

#[test]
fn merged_phi_argument_ownership() {
    let (types, class) = class_types();
    let mut func = make_func(&types, &[class, class], Ty::UNIT);
    let merge = func.create_basic_block(None, false);
    let args: Vec<Value> = func.block_args(func.entry_block()).iter().map(|&a| a.into()).collect();

    let owned = func
        .create_phi_argument_merged(merge, class, &args, &types, None)
        .unwrap();
    assert_eq!(func.arg(owned).ownership(), OwnershipKind::Owned);

    // Trivial types absorb whatever flows in.
    let trivial = func
        .create_phi_argument_merged(merge, Ty::INT64, &args, &types, None)
        .unwrap();
    assert_eq!(func.arg(trivial).ownership(), OwnershipKind::None);
}

#[test]
fn merged_phi_argument_rejects_mismatch() {
    let (types, class) = class_types();
    let mut func = make_func(&types, &[class], Ty::UNIT);
    let entry = func.entry_block();
    let owned = Value::Arg(func.block_args(entry)[0]);
    let borrowed = Builder::at_end(&mut func, &types, entry).struct_extract(owned, 0, class);
    let merge = func.create_basic_block(None, false);

    let err = func
        .create_phi_argument_merged(merge, class, &[owned, borrowed], &types, None)
        .unwrap_err();
    assert_eq!(err.first, OwnershipKind::Owned);
    assert_eq!(err.second, OwnershipKind::Guaranteed);
    assert!(func.block_args(merge).is_empty());
}

// ── Block erasure ───────────────────────────────────────────

#[test]
fn erase_block_drops_internal_uses() {
    let (types, _) = class_types();
    let mut d = diamond(&types);
    // Detach the left edge: entry now branches straight to right.
    let term = d.func.terminator(d.entry).unwrap();
    d.func.erase(term);
    let cond = Value::Arg(d.func.block_args(d.entry)[0]);
    Builder::at_end(&mut d.func, &types, d.entry).cond_br(cond, d.right, &[], d.right, &[]);

    // `left` still branches to merge; its own literal is used only inside it.
    d.func.erase_block(d.left);

    assert!(!d.func.contains_block(d.left));
    assert!(!d.func.is_live(d.left_value));
    assert_eq!(d.func.blocks(), &[d.entry, d.right, d.merge]);
    assert_eq!(d.func.predecessors(d.merge).as_slice(), &[d.right]);
}

#[test]
#[should_panic(expected = "is still used by")]
fn erase_block_with_escaping_value_panics() {
    let (types, _) = class_types();
    let mut func = make_func(&types, &[], Ty::INT64);
    let entry = func.entry_block();
    let other = func.create_basic_block(None, false);
    let v = lit(&mut func, &types, other, 7);
    Builder::at_end(&mut func, &types, entry).return_(v);
    func.erase_block(other);
}
