//! Shared test utilities for the PIL core.
//!
//! Factory functions for types, functions and common CFG shapes used across
//! the `block`, `function`, `phi`, `builder`, `clone` and `verify` tests.
//! Only compiled in test builds.

use crate::{
    ArgId, BlockId, Builder, FuncId, Function, FunctionType, InstKind, Name, OwnershipKind, Ty,
    TypeFacts, TypeTable, Value,
};

/// A type table with one non-final class, returned alongside it.
pub(crate) fn class_types() -> (TypeTable, Ty) {
    let mut types = TypeTable::new();
    let class = types.class(Name::from_raw(1), None, false);
    (types, class)
}

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

/// Append `integer_literal value : Int64` to `block`.
pub(crate) fn lit(func: &mut Function, types: &TypeTable, block: BlockId, value: i64) -> Value {
    Builder::at_end(func, types, block).integer_literal(Ty::INT64, value)
}

/// A diamond:
///
/// ```text
/// entry(%c: Int1): cond_br %c, left, right
/// left:  %l = integer_literal 1; br merge(%l)
/// right: %r = integer_literal 2; br merge(%r)
/// merge(%phi: Int64): return %phi
/// ```
pub(crate) struct Diamond {
    pub func: Function,
    pub entry: BlockId,
    pub left: BlockId,
    pub right: BlockId,
    pub merge: BlockId,
    pub phi: ArgId,
    pub left_value: Value,
    pub right_value: Value,
}

pub(crate) fn diamond(types: &TypeTable) -> Diamond {
    let mut func = make_func(types, &[Ty::INT1], Ty::INT64);
    let entry = func.entry_block();
    let cond = entry_args(&func)[0];
    let left = func.create_basic_block(None, false);
    let right = func.create_basic_block(None, false);
    let merge = func.create_basic_block(None, false);
    let phi = func.create_phi_argument(merge, Ty::INT64, OwnershipKind::None, None);

    Builder::at_end(&mut func, types, entry).cond_br(cond, left, &[], right, &[]);
    let left_value = lit(&mut func, types, left, 1);
    Builder::at_end(&mut func, types, left).br(merge, &[left_value]);
    let right_value = lit(&mut func, types, right, 2);
    Builder::at_end(&mut func, types, right).br(merge, &[right_value]);
    Builder::at_end(&mut func, types, merge).return_(Value::Arg(phi));

    Diamond {
        func,
        entry,
        left,
        right,
        merge,
        phi,
        left_value,
        right_value,
    }
}

/// Whether the terminator of `block` satisfies `kind`.
pub(crate) fn ends_with(func: &Function, block: BlockId, kind: fn(&InstKind) -> bool) -> bool {
    func.terminator(block)
        .is_some_and(|t| kind(func.inst(t).kind()))
}
