//! PIL: the SSA intermediate language of the middle-end.
//!
//! This crate provides:
//!
//! - **Values and ownership** ([`Value`], [`OwnershipKind`]): every SSA value
//!   is an instruction result or a block argument, with a type, an ownership
//!   kind computed once at creation ([`result_ownership`]) and a use list.
//!
//! - **Functions and blocks** ([`Function`], [`BasicBlock`], [`Instruction`]):
//!   each function owns generational arenas of blocks, instructions and
//!   arguments. Blocks hold intrusive doubly linked instruction lists;
//!   handles are checked on every dereference so a stale one is caught
//!   instead of reading a recycled slot.
//!
//! - **Debug scopes** ([`ScopeTable`], [`ScopeCloner`]): a per-function tree
//!   of lexical and inlined scopes, copied with memoization when code moves
//!   between functions.
//!
//! - **Argument resolution** ([`PhiKind`], [`Function::resolve_incoming`]):
//!   block arguments find their incoming values by reading the operands of
//!   predecessor terminators.
//!
//! - **Supporting pieces**: an insertion-point [`Builder`], whole-body and
//!   range cloning ([`FunctionCloner`], [`transfer_range`]), module-level
//!   bookkeeping with counted function references ([`Module`]), a
//!   structural verifier ([`verify_function`]) and a textual dump
//!   ([`Function::dump`]).
//!
//! # Crate Dependencies
//!
//! None within the workspace. Type information reaches the IR through the
//! [`TypeFacts`] trait; [`TypeTable`] is the in-crate implementation.

mod arena;
pub mod block;
pub mod builder;
pub mod clone;
pub mod function;
pub mod inst;
pub mod module;
mod name;
mod notify;
pub mod ownership;
pub mod phi;
mod print;
pub mod scope;
pub mod ty;
mod value;
pub mod verify;

#[cfg(test)]
mod test_helpers;

pub use block::{ArgId, ArgKind, Argument, BasicBlock, BlockId, BlockInsts};
pub use builder::{Builder, InsertPoint};
pub use clone::{transfer_range, FunctionCloner};
pub use function::{
    Effects, FuncId, Function, FunctionType, GenericEnvironment, Linkage, SpecializationInfo,
};
pub use inst::{
    result_ownership, Arity, BuiltinOp, InstId, InstKind, Instruction, LoadQualifier,
    StoreQualifier,
};
pub use module::{Module, VTable, WitnessTable};
pub use name::{Name, StringInterner};
pub use notify::DeleteNotificationHandler;
pub use ownership::{merge_ownership, OwnershipKind, OwnershipMismatch};
pub use phi::{PhiKind, ResolveError};
pub use scope::{DebugScope, ScopeCloner, ScopeId, ScopeParent, ScopeTable, SourceLoc};
pub use ty::{Ty, TypeFacts, TypeKind, TypeTable};
pub use value::{Use, Value, ValueData};
pub use verify::{verify_function, VerifyError};
