use pretty_assertions::assert_eq;

use pil_ir::{
    BuiltinOp, Builder, FuncId, Function, FunctionType, Module, Name, Ty, TypeTable, Value,
};

use crate::graph::DominatorTree;
use crate::test_helpers::{
    class_types, combine, entry_args, entry_mnemonics, local_facts, make_func, mnemonics,
};
use crate::{combine_function, combine_module, CombinerConfig};

use super::*;

/// `entry: strong_retain x; %c = copy_value x; destroy_value %c;
/// strong_release x; return ()`
fn nested_pairs(types: &TypeTable, class: Ty) -> Function {
    let mut func = make_func(types, &[class], Ty::UNIT);
    let x = entry_args(&func)[0];
    let entry = func.entry_block();
    {
        let mut b = Builder::at_end(&mut func, types, entry);
        b.strong_retain(x);
        let copy = b.copy_value(x);
        b.destroy_value(copy);
        b.strong_release(x);
        let unit = b.tuple(Ty::UNIT, &[]).unwrap();
        b.return_(unit);
    }
    func
}

#[test]
fn optimal_function_is_a_fixed_point() {
    let types = TypeTable::new();
    let mut func = make_func(&types, &[Ty::INT64], Ty::INT64);
    let x = entry_args(&func)[0];
    let entry = func.entry_block();
    {
        let mut b = Builder::at_end(&mut func, &types, entry);
        let sum = b.builtin(BuiltinOp::Add, x, x);
        b.return_(sum);
    }

    let stats = combine(&mut func, local_facts(&types));

    assert_eq!(
        stats,
        CombineStats {
            iterations: 1,
            visited: 2,
            replaced: 0,
            erased: 0,
            inserted: 0,
            made_change: false,
        }
    );
}

#[test]
fn declarations_are_skipped() {
    let types = TypeTable::new();
    let mut func = Function::new(
        FuncId::new(3),
        Name::from_raw(11),
        FunctionType::new(vec![], Ty::UNIT),
    );

    let stats = combine(&mut func, local_facts(&types));

    assert_eq!(stats, CombineStats::default());
}

#[test]
fn dead_pure_instructions_are_erased() {
    let types = TypeTable::new();
    let mut func = make_func(&types, &[Ty::INT64], Ty::INT64);
    let x = entry_args(&func)[0];
    let entry = func.entry_block();
    {
        let mut b = Builder::at_end(&mut func, &types, entry);
        let one = b.integer_literal(Ty::INT64, 1);
        b.builtin(BuiltinOp::Xor, x, one);
        b.return_(x);
    }

    let stats = combine(&mut func, local_facts(&types));

    assert_eq!(entry_mnemonics(&func), vec!["return"]);
    assert_eq!(stats.erased, 2);
}

#[test]
fn unreachable_blocks_are_left_alone() {
    let (types, class) = class_types();
    let mut func = make_func(&types, &[class], class);
    let x = entry_args(&func)[0];
    let entry = func.entry_block();
    let dead = func.create_basic_block(None, false);
    Builder::at_end(&mut func, &types, entry).return_(x);
    {
        let mut b = Builder::at_end(&mut func, &types, dead);
        b.strong_retain(x);
        b.strong_release(x);
        b.unreachable();
    }

    let stats = combine(&mut func, local_facts(&types));

    assert_eq!(
        mnemonics(&func, dead),
        vec!["strong_retain", "strong_release", "unreachable"]
    );
    assert_eq!(stats.visited, 1);
}

#[test]
fn requeued_users_in_unreachable_blocks_are_skipped() {
    let (types, class) = class_types();
    let mut func = make_func(&types, &[class], class);
    let x = entry_args(&func)[0];
    let entry = func.entry_block();
    let dead = func.create_basic_block(None, false);
    {
        let mut b = Builder::at_end(&mut func, &types, entry);
        let same = b.upcast(x, class);
        b.return_(same);
    }
    {
        let mut b = Builder::at_end(&mut func, &types, dead);
        b.strong_retain(x);
        b.strong_release(x);
        b.unreachable();
    }

    let stats = combine(&mut func, local_facts(&types));

    // Replacing the upcast with `x` requeues every user of `x`.
    assert_eq!(stats.replaced, 1);
    assert_eq!(entry_mnemonics(&func), vec!["return"]);
    assert_eq!(
        mnemonics(&func, dead),
        vec!["strong_retain", "strong_release", "unreachable"]
    );
}

#[test]
fn iteration_cap_stops_early() {
    let (types, class) = class_types();
    let mut func = nested_pairs(&types, class);
    let config = CombinerConfig::debug().with_max_iterations(1);

    let stats = combine_function(&mut func, local_facts(&types), &config);

    assert_eq!(stats.iterations, 1);
    assert!(stats.made_change);
    assert_eq!(
        entry_mnemonics(&func),
        vec!["strong_retain", "strong_release", "tuple", "return"]
    );
}

#[test]
fn rounds_continue_until_nothing_changes() {
    let (types, class) = class_types();
    let mut func = nested_pairs(&types, class);

    let stats = combine(&mut func, local_facts(&types));

    assert_eq!(stats.iterations, 3);
    assert_eq!(stats.erased, 4);
    assert_eq!(entry_mnemonics(&func), vec!["tuple", "return"]);
}

#[test]
#[should_panic(expected = "verification error")]
fn verification_failure_panics() {
    let types = TypeTable::new();
    let mut func = make_func(&types, &[Ty::INT64], Ty::INT64);
    let entry = func.entry_block();
    Builder::at_end(&mut func, &types, entry).integer_literal(Ty::INT64, 1);

    combine(&mut func, local_facts(&types));
}

#[test]
fn verification_is_opt_in() {
    let types = TypeTable::new();
    let mut func = make_func(&types, &[Ty::INT64], Ty::INT64);
    let x = entry_args(&func)[0];
    let entry = func.entry_block();
    {
        let mut b = Builder::at_end(&mut func, &types, entry);
        b.builtin(BuiltinOp::Add, x, x);
    }

    let stats = combine_function(&mut func, local_facts(&types), &CombinerConfig::release());

    assert_eq!(stats.erased, 1);
}

// ── Replacement safety ──────────────────────────────────────────────

struct Merge {
    func: Function,
    cond: Value,
    in_entry: Value,
    in_left: Value,
    sum: Value,
    after_sum: Value,
}

/// ```text
/// entry(%c: Int1, %x: Int64): %e = integer_literal 5; cond_br %c, left, right
/// left:  %l = integer_literal 1; br merge
/// right: br merge
/// merge: %m = add %x, %x; %n = integer_literal 9; return %m
/// ```
fn merge(types: &TypeTable) -> Merge {
    let mut func = make_func(types, &[Ty::INT1, Ty::INT64], Ty::INT64);
    let args = entry_args(&func);
    let entry = func.entry_block();
    let left = func.create_basic_block(None, false);
    let right = func.create_basic_block(None, false);
    let join = func.create_basic_block(None, false);

    let in_entry = {
        let mut b = Builder::at_end(&mut func, types, entry);
        let e = b.integer_literal(Ty::INT64, 5);
        b.cond_br(args[0], left, &[], right, &[]);
        e
    };
    let in_left = {
        let mut b = Builder::at_end(&mut func, types, left);
        let l = b.integer_literal(Ty::INT64, 1);
        b.br(join, &[]);
        l
    };
    Builder::at_end(&mut func, types, right).br(join, &[]);
    let (sum, after_sum) = {
        let mut b = Builder::at_end(&mut func, types, join);
        let m = b.builtin(BuiltinOp::Add, args[1], args[1]);
        let n = b.integer_literal(Ty::INT64, 9);
        b.return_(m);
        (m, n)
    };

    Merge {
        func,
        cond: args[0],
        in_entry,
        in_left,
        sum,
        after_sum,
    }
}

#[test]
fn replacement_must_dominate_every_use() {
    let types = TypeTable::new();
    let Merge {
        mut func,
        cond,
        in_entry,
        in_left,
        sum,
        after_sum,
    } = merge(&types);
    let dominators = DominatorTree::build(&func);
    let config = CombinerConfig::new();
    let inst = sum.defining_inst().unwrap();
    let cx = Combiner::new(&mut func, local_facts(&types), &dominators, &config);

    assert!(cx.can_replace(inst, sum, in_entry));
    assert!(!cx.can_replace(inst, sum, in_left));
    assert!(!cx.can_replace(inst, sum, after_sum));
    // Int1 for Int64.
    assert!(!cx.can_replace(inst, sum, cond));
}

#[test]
fn replacement_must_preserve_ownership() {
    let (mut types, class) = class_types();
    let single = types.tuple(vec![class]);
    let mut func = make_func(&types, &[class], class);
    let x = entry_args(&func)[0];
    let entry = func.entry_block();
    let (tuple, element) = {
        let mut b = Builder::at_end(&mut func, &types, entry);
        let t = b.tuple(single, &[x]).unwrap();
        let e = b.tuple_extract(t, 0, class);
        let copy = b.copy_value(e);
        b.return_(copy);
        (t, e)
    };
    let dominators = DominatorTree::build(&func);
    let config = CombinerConfig::new();
    let inst = element.defining_inst().unwrap();
    let cx = Combiner::new(&mut func, local_facts(&types), &dominators, &config);

    // Owned for guaranteed.
    assert!(!cx.can_replace(inst, element, x));
    // Different type.
    assert!(!cx.can_replace(inst, element, tuple));
}

// ── Whole modules ───────────────────────────────────────────────────

/// Give `id` the body `return 2 + 3`.
fn define_sum(module: &mut Module, id: FuncId) {
    let types = module.types().clone();
    let func = module.function_mut(id);
    let entry = func.create_basic_block(None, false);
    let mut b = Builder::at_end(func, &types, entry);
    let two = b.integer_literal(Ty::INT64, 2);
    let three = b.integer_literal(Ty::INT64, 3);
    let sum = b.builtin(BuiltinOp::Add, two, three);
    b.return_(sum);
}

#[test]
fn module_definitions_are_combined_in_id_order() {
    let mut module = Module::new();
    let signature = FunctionType::new(vec![], Ty::INT64);
    let first = module.create_function("first", signature.clone());
    let declared = module.create_function("declared", signature.clone());
    let second = module.create_function("second", signature);
    define_sum(&mut module, first);
    define_sum(&mut module, second);

    let results = combine_module(&mut module, &CombinerConfig::debug());

    let ids: Vec<FuncId> = results.iter().map(|(id, _)| *id).collect();
    assert_eq!(ids, vec![first, second]);
    assert!(results.iter().all(|(_, stats)| stats.made_change));
    assert!(!module.function(declared).is_definition());
    for id in [first, second] {
        assert_eq!(
            entry_mnemonics(module.function(id)),
            vec!["integer_literal", "return"]
        );
    }
}

// ── Rewrite application ─────────────────────────────────────────────

/// `entry(%x: Int64): %s = add %x, %x; return %s`
fn sum_of_arg(types: &TypeTable) -> (Function, Value, Value) {
    let mut func = make_func(types, &[Ty::INT64], Ty::INT64);
    let x = entry_args(&func)[0];
    let entry = func.entry_block();
    let sum = {
        let mut b = Builder::at_end(&mut func, types, entry);
        let s = b.builtin(BuiltinOp::Add, x, x);
        b.return_(s);
        s
    };
    (func, x, sum)
}

#[test]
fn insert_before_keeps_the_visited_instruction() {
    let types = TypeTable::new();
    let (mut func, _, sum) = sum_of_arg(&types);
    let inst = sum.defining_inst().unwrap();
    let dominators = DominatorTree::build(&func);
    let config = CombinerConfig::new();
    let mut cx = Combiner::new(&mut func, local_facts(&types), &dominators, &config);

    let applied = cx.apply(inst, Rewrite::InsertBefore(NewInst::literal(Ty::INT64, 4)));

    assert!(applied);
    assert_eq!(cx.worklist.len(), 1);
    assert_eq!(cx.stats.inserted, 1);
    assert_eq!(cx.stats.replaced, 0);
    assert_eq!(cx.stats.erased, 0);
    drop(cx);
    assert!(func.contains_inst(inst));
    assert_eq!(
        entry_mnemonics(&func),
        vec!["integer_literal", "add", "return"]
    );
    assert_eq!(func.uses(sum).len(), 1);
}

#[test]
fn replace_with_new_takes_the_visited_instructions_place() {
    let types = TypeTable::new();
    let (mut func, _, sum) = sum_of_arg(&types);
    let inst = sum.defining_inst().unwrap();
    let dominators = DominatorTree::build(&func);
    let config = CombinerConfig::new();
    let mut cx = Combiner::new(&mut func, local_facts(&types), &dominators, &config);

    let applied = cx.apply(inst, Rewrite::ReplaceWithNew(NewInst::literal(Ty::INT64, 4)));

    assert!(applied);
    assert_eq!(cx.stats.inserted, 1);
    assert_eq!(cx.stats.replaced, 1);
    assert_eq!(cx.stats.erased, 1);
    drop(cx);
    assert!(!func.contains_inst(inst));
    assert_eq!(entry_mnemonics(&func), vec!["integer_literal", "return"]);
}

#[test]
fn replace_with_new_of_another_type_is_dropped() {
    let types = TypeTable::new();
    let (mut func, _, sum) = sum_of_arg(&types);
    let inst = sum.defining_inst().unwrap();
    let dominators = DominatorTree::build(&func);
    let config = CombinerConfig::new();
    let mut cx = Combiner::new(&mut func, local_facts(&types), &dominators, &config);

    let applied = cx.apply(inst, Rewrite::ReplaceWithNew(NewInst::literal(Ty::INT32, 4)));

    assert!(!applied);
    assert_eq!(cx.stats.inserted, 0);
    drop(cx);
    assert_eq!(entry_mnemonics(&func), vec!["add", "return"]);
}
