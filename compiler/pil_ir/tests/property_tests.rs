//! Property-based tests for the PIL core.
//!
//! 1. Instruction lists: any sequence of insertions and erasures leaves the
//!    block's forward order, backward order and length in agreement with a
//!    plain `Vec` model, and splitting preserves the sequence.
//! 2. Ownership merging: `merge_ownership` ignores order and `None`, and
//!    fails exactly when two different non-`None` kinds meet.

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]
#![allow(
    clippy::doc_markdown,
    clippy::redundant_closure_for_method_calls,
    reason = "Proptest macros generate code with these patterns"
)]

use pil_ir::{
    merge_ownership, BlockId, FuncId, Function, FunctionType, InstId, InstKind, Name,
    OwnershipKind, Ty,
};
use proptest::prelude::*;

// -- Strategies --

#[derive(Clone, Debug)]
enum ListOp {
    PushBack,
    PushFront,
    InsertBefore(usize),
    InsertAfter(usize),
    Erase(usize),
}

fn list_op_strategy() -> impl Strategy<Value = ListOp> {
    prop_oneof![
        Just(ListOp::PushBack),
        Just(ListOp::PushFront),
        any::<usize>().prop_map(ListOp::InsertBefore),
        any::<usize>().prop_map(ListOp::InsertAfter),
        any::<usize>().prop_map(ListOp::Erase),
    ]
}

fn ownership_strategy() -> impl Strategy<Value = OwnershipKind> {
    prop_oneof![
        Just(OwnershipKind::Unowned),
        Just(OwnershipKind::Owned),
        Just(OwnershipKind::Guaranteed),
        Just(OwnershipKind::None),
    ]
}

// -- Helpers --

fn function_with_block() -> (Function, BlockId) {
    let mut func = Function::new(FuncId::new(0), Name::from_raw(0), FunctionType::default());
    let block = func.create_basic_block(None, false);
    (func, block)
}

fn literal(func: &mut Function, value: i64) -> InstId {
    func.create_inst(
        InstKind::IntegerLiteral { value },
        [],
        &[(Ty::INT64, OwnershipKind::None)],
        None,
    )
}

fn apply(func: &mut Function, block: BlockId, model: &mut Vec<InstId>, op: &ListOp, n: i64) {
    match *op {
        ListOp::PushBack => {
            let inst = literal(func, n);
            func.push_back(block, inst);
            model.push(inst);
        }
        ListOp::PushFront => {
            let inst = literal(func, n);
            func.push_front(block, inst);
            model.insert(0, inst);
        }
        ListOp::InsertBefore(i) if !model.is_empty() => {
            let at = i % model.len();
            let inst = literal(func, n);
            func.insert_before(model[at], inst);
            model.insert(at, inst);
        }
        ListOp::InsertAfter(i) if !model.is_empty() => {
            let at = i % model.len();
            let inst = literal(func, n);
            func.insert_after(model[at], inst);
            model.insert(at + 1, inst);
        }
        ListOp::Erase(i) if !model.is_empty() => {
            let at = i % model.len();
            let next = func.erase(model.remove(at));
            assert_eq!(next, model.get(at).copied());
        }
        _ => {}
    }
}

fn assert_matches_model(func: &Function, block: BlockId, model: &[InstId]) {
    let forward: Vec<_> = func.block_insts(block).collect();
    let mut backward: Vec<_> = func.block_insts(block).rev().collect();
    backward.reverse();
    assert_eq!(forward, model);
    assert_eq!(backward, model);
    assert_eq!(func.block_len(block), model.len());
    assert_eq!(func.block(block).first_inst(), model.first().copied());
    assert_eq!(func.block(block).last_inst(), model.last().copied());
    for &inst in model {
        assert_eq!(func.inst(inst).block(), Some(block));
    }
}

// -- Properties --

proptest! {
    #[test]
    fn list_operations_agree_with_vec_model(ops in prop::collection::vec(list_op_strategy(), 0..64)) {
        let (mut func, block) = function_with_block();
        let mut model = Vec::new();
        for (n, op) in ops.iter().enumerate() {
            apply(&mut func, block, &mut model, op, n as i64);
            assert_matches_model(&func, block, &model);
        }
        prop_assert_eq!(func.num_insts(), model.len());
    }

    #[test]
    fn split_preserves_sequence(len in 1usize..32, at in any::<usize>()) {
        let (mut func, block) = function_with_block();
        let mut model = Vec::new();
        for n in 0..len {
            apply(&mut func, block, &mut model, &ListOp::PushBack, n as i64);
        }
        let at = at % len;
        let tail = func.split_block(model[at]);

        assert_matches_model(&func, block, &model[..at]);
        assert_matches_model(&func, tail, &model[at..]);
        prop_assert_eq!(func.blocks(), &[block, tail][..]);
    }

    #[test]
    fn merge_ignores_order(kinds in prop::collection::vec(ownership_strategy(), 0..8)) {
        let mut reversed = kinds.clone();
        reversed.reverse();
        prop_assert_eq!(
            merge_ownership(kinds.iter().copied()).is_ok(),
            merge_ownership(reversed.iter().copied()).is_ok()
        );
        if let Ok(k) = merge_ownership(kinds.iter().copied()) {
            prop_assert_eq!(merge_ownership(reversed.iter().copied()), Ok(k));
        }
    }

    #[test]
    fn none_is_the_identity(kinds in prop::collection::vec(ownership_strategy(), 0..8)) {
        let without: Vec<_> = kinds
            .iter()
            .copied()
            .filter(|&k| k != OwnershipKind::None)
            .collect();
        prop_assert_eq!(
            merge_ownership(kinds.iter().copied()).ok(),
            merge_ownership(without.iter().copied()).ok()
        );
    }

    #[test]
    fn merge_fails_exactly_on_disagreement(kinds in prop::collection::vec(ownership_strategy(), 0..8)) {
        let mut distinct: Vec<_> = kinds
            .iter()
            .copied()
            .filter(|&k| k != OwnershipKind::None)
            .collect();
        distinct.dedup();
        distinct.sort_by_key(|k| *k as u8);
        distinct.dedup();
        let merged = merge_ownership(kinds.iter().copied());
        match distinct.as_slice() {
            [] => prop_assert_eq!(merged, Ok(OwnershipKind::None)),
            [single] => prop_assert_eq!(merged, Ok(*single)),
            _ => prop_assert!(merged.is_err()),
        }
    }
}
