//! Values and uses.
//!
//! A [`Value`] names something that can appear as an operand: either a result
//! of an instruction or a block argument. Values are identities, not owners:
//! the producer (instruction or block) owns the storage, and every use is a
//! non-owning back-reference recorded in the value's use list.

use std::fmt;

use smallvec::SmallVec;

use crate::{ArgId, InstId, OwnershipKind, Ty};

/// Handle to an operand-capable value.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    /// The `n`th result of an instruction.
    Result(InstId, u32),
    /// A block argument.
    Arg(ArgId),
}

impl Value {
    /// The primary (first) result of `inst`.
    #[inline]
    pub fn result(inst: InstId) -> Self {
        Value::Result(inst, 0)
    }

    /// The instruction producing this value, if it is a result.
    #[inline]
    pub fn defining_inst(self) -> Option<InstId> {
        match self {
            Value::Result(inst, _) => Some(inst),
            Value::Arg(_) => None,
        }
    }

    /// The argument behind this value, if it is one.
    #[inline]
    pub fn as_arg(self) -> Option<ArgId> {
        match self {
            Value::Arg(arg) => Some(arg),
            Value::Result(..) => None,
        }
    }
}

impl From<ArgId> for Value {
    fn from(arg: ArgId) -> Self {
        Value::Arg(arg)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Result(inst, 0) => write!(f, "%{inst}"),
            Value::Result(inst, n) => write!(f, "%{inst}#{n}"),
            Value::Arg(arg) => write!(f, "%{arg}"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One operand slot that refers to a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Use {
    /// The instruction holding the operand.
    pub user: InstId,
    /// Index into the user's operand list.
    pub operand: u32,
}

/// Type, ownership and use list of a value, stored with its producer.
#[derive(Clone, Debug)]
pub struct ValueData {
    pub(crate) ty: Ty,
    pub(crate) ownership: OwnershipKind,
    pub(crate) uses: SmallVec<[Use; 2]>,
}

impl ValueData {
    pub(crate) fn new(ty: Ty, ownership: OwnershipKind) -> Self {
        Self {
            ty,
            ownership,
            uses: SmallVec::new(),
        }
    }

    /// The value's type.
    #[inline]
    pub fn ty(&self) -> Ty {
        self.ty
    }

    /// The value's ownership kind.
    #[inline]
    pub fn ownership(&self) -> OwnershipKind {
        self.ownership
    }

    /// All current uses.
    #[inline]
    pub fn uses(&self) -> &[Use] {
        &self.uses
    }
}
