//! Shared test utilities for the optimizer.
//!
//! Only compiled in test builds.

use pil_ir::{
    BlockId, Effects, FuncId, Function, FunctionType, Name, OwnershipKind, Ty, TypeFacts,
    TypeTable, Value,
};

use crate::facts::{BasicAlias, CalleeFacts, Conservative, Facts};
use crate::{combine_function, CombineStats, CombinerConfig};

/// A definition with an entry block holding one function argument per
/// parameter. Non-trivial parameters are `@owned`.
pub(crate) fn make_func(types: &TypeTable, params: &[Ty], result: Ty) -> Function {
    let mut func = Function::new(
        FuncId::new(0),
        Name::from_raw(10),
        FunctionType::new(params.to_vec(), result),
    );
    let entry = func.create_basic_block(None, false);
    for &ty in params {
        let ownership = if types.is_trivial(ty) {
            OwnershipKind::None
        } else {
            OwnershipKind::Owned
        };
        func.create_function_argument(entry, ty, ownership, None);
    }
    func
}

/// The arguments of the entry block as values.
pub(crate) fn entry_args(func: &Function) -> Vec<Value> {
    func.block_args(func.entry_block())
        .iter()
        .map(|&a| Value::Arg(a))
        .collect()
}

/// Mnemonics of the instructions of `block`, in order.
pub(crate) fn mnemonics(func: &Function, block: BlockId) -> Vec<&'static str> {
    func.block_insts(block)
        .map(|i| func.inst(i).kind().mnemonic())
        .collect()
}

/// Mnemonics of the entry block.
pub(crate) fn entry_mnemonics(func: &Function) -> Vec<&'static str> {
    mnemonics(func, func.entry_block())
}

/// A type table with one non-final class, returned alongside it.
pub(crate) fn class_types() -> (TypeTable, Ty) {
    let mut types = TypeTable::new();
    let class = types.class(Name::from_raw(1), None, false);
    (types, class)
}

/// Every callee is pure.
pub(crate) struct PureCallees;

impl CalleeFacts for PureCallees {
    fn effects(&self, _callee: Name) -> Effects {
        Effects::empty()
    }
}

/// Real type facts and [`BasicAlias`]; conservative for everything else.
pub(crate) fn local_facts(types: &dyn TypeFacts) -> Facts<'_> {
    Facts {
        types,
        classes: &Conservative,
        conformances: &Conservative,
        alias: &BasicAlias,
        callees: &Conservative,
    }
}

/// Run the Combiner with verification after every round.
pub(crate) fn combine(func: &mut Function, facts: Facts<'_>) -> CombineStats {
    combine_function(func, facts, &CombinerConfig::debug())
}
