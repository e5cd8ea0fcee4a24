//! PIL types and the type-fact oracle.
//!
//! The core never inspects type structure directly: ownership assignment and
//! the optimizer ask a [`TypeFacts`] implementation whether a type is trivial
//! (no ownership discipline applies) or an aggregate of trivial fields. Type
//! checking and layout live outside this crate.
//!
//! [`Ty`] is a 32-bit handle. Frequently used primitives have fixed indices so
//! IR can be built against them without a table in hand. [`TypeTable`] is a
//! structural interner implementing [`TypeFacts`] for drivers and tests that
//! do not bring their own type system.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::Name;

/// A 32-bit handle to a PIL type.
///
/// Equality is handle equality: a [`TypeTable`] interns structurally equal
/// types to the same handle.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct Ty(u32);

impl Ty {
    /// `Builtin.Int1`, the result of comparisons and branch conditions.
    pub const INT1: Self = Self(0);
    /// `Builtin.Int8`.
    pub const INT8: Self = Self(1);
    /// `Builtin.Int32`.
    pub const INT32: Self = Self(2);
    /// `Builtin.Int64`.
    pub const INT64: Self = Self(3);
    /// `Builtin.FPIEEE64`.
    pub const FLOAT64: Self = Self(4);
    /// The empty tuple `()`.
    pub const UNIT: Self = Self(5);
    /// `Builtin.RawPointer`.
    pub const RAW_POINTER: Self = Self(6);
    /// `Builtin.NativeObject`, an untyped reference-counted object.
    pub const NATIVE_OBJECT: Self = Self(7);

    /// First index handed out for non-primitive types.
    pub const FIRST_DYNAMIC: u32 = 8;

    /// Sentinel for "no type".
    pub const NONE: Self = Self(u32::MAX);

    /// Create a handle from a raw index.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw index.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Whether this is one of the fixed primitive handles.
    #[inline]
    pub const fn is_primitive(self) -> bool {
        self.0 < Self::FIRST_DYNAMIC
    }

    /// Human-readable name of a primitive handle.
    pub const fn name(self) -> Option<&'static str> {
        match self.0 {
            0 => Some("Int1"),
            1 => Some("Int8"),
            2 => Some("Int32"),
            3 => Some("Int64"),
            4 => Some("FPIEEE64"),
            5 => Some("()"),
            6 => Some("RawPointer"),
            7 => Some("NativeObject"),
            _ => None,
        }
    }
}

/// The empty tuple, the result type of a function that returns nothing.
impl Default for Ty {
    fn default() -> Self {
        Ty::UNIT
    }
}

impl fmt::Debug for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.name(), *self) {
            (Some(n), _) => write!(f, "Ty::{n}"),
            (None, Self::NONE) => write!(f, "Ty::NONE"),
            (None, _) => write!(f, "Ty({})", self.0),
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.name(), *self) {
            (Some(n), _) => write!(f, "${n}"),
            (None, Self::NONE) => write!(f, "$<none>"),
            (None, _) => write!(f, "$T{}", self.0),
        }
    }
}

/// Read-only type queries consumed by the PIL core.
///
/// Implementations must be `Sync`: independent functions may be optimized
/// on different threads against one shared oracle.
pub trait TypeFacts: Sync {
    /// Whether values of `ty` need no ownership tracking at all.
    fn is_trivial(&self, ty: Ty) -> bool;

    /// Whether `ty` is a struct or tuple whose fields are all trivial.
    fn is_trivial_aggregate(&self, ty: Ty) -> bool;

    /// Bit width of an integer type, `None` for anything else.
    fn integer_width(&self, ty: Ty) -> Option<u32> {
        match ty {
            Ty::INT1 => Some(1),
            Ty::INT8 => Some(8),
            Ty::INT32 => Some(32),
            Ty::INT64 => Some(64),
            _ => None,
        }
    }
}

/// Structural description of a type in a [`TypeTable`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Builtin integer of the given bit width.
    Int(u32),
    /// Builtin IEEE float of the given bit width.
    Float(u32),
    /// Tuple of element types (`()` for no elements).
    Tuple(Vec<Ty>),
    /// Nominal value type with stored fields.
    Struct { name: Name, fields: Vec<Ty> },
    /// Reference-counted class.
    Class {
        name: Name,
        superclass: Option<Ty>,
        is_final: bool,
    },
    /// Existential box for a protocol.
    Existential { protocol: Name },
    /// Thin function type.
    Function { params: Vec<Ty>, result: Ty },
    /// Address of a value of the given type.
    Address(Ty),
    /// Untyped raw pointer.
    RawPointer,
    /// Untyped reference-counted object.
    NativeObject,
}

/// Structural type interner implementing [`TypeFacts`].
///
/// Primitives are pre-interned at their fixed [`Ty`] indices. Composite
/// types can only reference handles that already exist, so the table is
/// acyclic and triviality needs no cycle detection.
#[derive(Clone, Debug)]
pub struct TypeTable {
    kinds: Vec<TypeKind>,
    lookup: FxHashMap<TypeKind, Ty>,
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeTable {
    /// Create a table with the primitive types pre-interned.
    pub fn new() -> Self {
        let mut table = Self {
            kinds: Vec::new(),
            lookup: FxHashMap::default(),
        };
        let primitives = [
            (Ty::INT1, TypeKind::Int(1)),
            (Ty::INT8, TypeKind::Int(8)),
            (Ty::INT32, TypeKind::Int(32)),
            (Ty::INT64, TypeKind::Int(64)),
            (Ty::FLOAT64, TypeKind::Float(64)),
            (Ty::UNIT, TypeKind::Tuple(Vec::new())),
            (Ty::RAW_POINTER, TypeKind::RawPointer),
            (Ty::NATIVE_OBJECT, TypeKind::NativeObject),
        ];
        for (expected, kind) in primitives {
            let ty = table.intern(kind);
            debug_assert_eq!(ty, expected, "primitive interned out of order");
        }
        table
    }

    /// Intern a type, returning the existing handle for an equal kind.
    ///
    /// # Panics
    ///
    /// Panics if `kind` references a handle this table does not contain.
    pub fn intern(&mut self, kind: TypeKind) -> Ty {
        if let Some(&ty) = self.lookup.get(&kind) {
            return ty;
        }
        for referenced in Self::referenced(&kind) {
            assert!(
                self.contains(referenced),
                "type {kind:?} references unknown {referenced:?}",
            );
        }
        let raw = u32::try_from(self.kinds.len())
            .unwrap_or_else(|_| panic!("type table exceeds u32::MAX entries"));
        let ty = Ty(raw);
        self.kinds.push(kind.clone());
        self.lookup.insert(kind, ty);
        ty
    }

    /// Whether `ty` is a handle of this table.
    #[inline]
    pub fn contains(&self, ty: Ty) -> bool {
        (ty.0 as usize) < self.kinds.len()
    }

    /// The structure of `ty`.
    ///
    /// # Panics
    ///
    /// Panics if `ty` is not a handle of this table.
    pub fn kind(&self, ty: Ty) -> &TypeKind {
        match self.kinds.get(ty.0 as usize) {
            Some(kind) => kind,
            None => panic!("unknown type handle {ty:?}"),
        }
    }

    /// Intern a tuple type.
    pub fn tuple(&mut self, elements: Vec<Ty>) -> Ty {
        self.intern(TypeKind::Tuple(elements))
    }

    /// Intern a struct type.
    pub fn struct_type(&mut self, name: Name, fields: Vec<Ty>) -> Ty {
        self.intern(TypeKind::Struct { name, fields })
    }

    /// Intern a class type.
    pub fn class(&mut self, name: Name, superclass: Option<Ty>, is_final: bool) -> Ty {
        self.intern(TypeKind::Class {
            name,
            superclass,
            is_final,
        })
    }

    /// Intern an existential type.
    pub fn existential(&mut self, protocol: Name) -> Ty {
        self.intern(TypeKind::Existential { protocol })
    }

    /// Intern a thin function type.
    pub fn function(&mut self, params: Vec<Ty>, result: Ty) -> Ty {
        self.intern(TypeKind::Function { params, result })
    }

    /// Intern the address type of `pointee`.
    pub fn address_of(&mut self, pointee: Ty) -> Ty {
        self.intern(TypeKind::Address(pointee))
    }

    /// The pointee of an address type.
    pub fn pointee(&self, ty: Ty) -> Option<Ty> {
        match self.kinds.get(ty.0 as usize) {
            Some(TypeKind::Address(pointee)) => Some(*pointee),
            _ => None,
        }
    }

    /// Iterate over every class in the table with its superclass.
    pub fn classes(&self) -> impl Iterator<Item = (Ty, Option<Ty>, bool)> + '_ {
        self.kinds.iter().enumerate().filter_map(|(i, kind)| match kind {
            TypeKind::Class {
                superclass,
                is_final,
                ..
            } => {
                #[expect(
                    clippy::cast_possible_truncation,
                    reason = "table size is bounded by u32 in intern"
                )]
                let ty = Ty(i as u32);
                Some((ty, *superclass, *is_final))
            }
            _ => None,
        })
    }

    fn referenced(kind: &TypeKind) -> Vec<Ty> {
        match kind {
            TypeKind::Int(_)
            | TypeKind::Float(_)
            | TypeKind::Existential { .. }
            | TypeKind::RawPointer
            | TypeKind::NativeObject => Vec::new(),
            TypeKind::Tuple(elements) => elements.clone(),
            TypeKind::Struct { fields, .. } => fields.clone(),
            TypeKind::Class { superclass, .. } => superclass.iter().copied().collect(),
            TypeKind::Function { params, result } => {
                let mut tys = params.clone();
                tys.push(*result);
                tys
            }
            TypeKind::Address(pointee) => vec![*pointee],
        }
    }
}

impl TypeFacts for TypeTable {
    fn is_trivial(&self, ty: Ty) -> bool {
        let Some(kind) = self.kinds.get(ty.0 as usize) else {
            // Unknown handles get the conservative answer.
            return false;
        };
        match kind {
            TypeKind::Int(_)
            | TypeKind::Float(_)
            | TypeKind::Function { .. }
            | TypeKind::Address(_)
            | TypeKind::RawPointer => true,
            TypeKind::Tuple(elements) => elements.iter().all(|&e| self.is_trivial(e)),
            TypeKind::Struct { fields, .. } => fields.iter().all(|&f| self.is_trivial(f)),
            TypeKind::Class { .. } | TypeKind::Existential { .. } | TypeKind::NativeObject => {
                false
            }
        }
    }

    fn is_trivial_aggregate(&self, ty: Ty) -> bool {
        match self.kinds.get(ty.0 as usize) {
            Some(TypeKind::Tuple(elements)) => elements.iter().all(|&e| self.is_trivial(e)),
            Some(TypeKind::Struct { fields, .. }) => fields.iter().all(|&f| self.is_trivial(f)),
            _ => false,
        }
    }

    fn integer_width(&self, ty: Ty) -> Option<u32> {
        match self.kinds.get(ty.0 as usize) {
            Some(TypeKind::Int(bits)) => Some(*bits),
            _ => None,
        }
    }
}

const _: () = assert!(std::mem::size_of::<Ty>() == 4);

#[cfg(test)]
mod tests;
