//! Oracles the Combiner consults before rewriting.
//!
//! Each trait answers one family of questions about the world outside the
//! instruction being visited. Every answer must be safe to act on: when an
//! implementation does not know, it returns the answer that blocks the
//! rewrite (`true` for "may alias", `None` for "resolve", and so on).
//!
//! - [`Conservative`] answers everything with the blocking value.
//! - [`BasicAlias`] separates distinct stack allocations.
//! - [`ModuleFacts`] is a `Sync` snapshot of a [`Module`]'s class hierarchy,
//!   vtables, witness tables and function effects, built once before
//!   functions are optimized in parallel.
//! - [`DominatorTree`](crate::DominatorTree) answers dominance queries.
//!
//! [`Facts`] bundles one implementation of each trait for a Combiner run.

use rustc_hash::{FxHashMap, FxHashSet};

use pil_ir::{ArgKind, BlockId, Effects, Function, InstKind, Module, Name, Ty, TypeFacts, TypeTable, Value};

// ── Oracle traits ───────────────────────────────────────────────────

/// Class inheritance and method resolution.
pub trait ClassHierarchy: Sync {
    /// Classes whose immediate superclass is `class`.
    fn direct_subclasses(&self, class: Ty) -> Vec<Ty>;

    /// Whether any class may override methods of `class`.
    fn has_subclasses(&self, class: Ty) -> bool {
        !self.direct_subclasses(class).is_empty()
    }

    /// Name of the function implementing `method` for an object whose
    /// dynamic type is exactly `class`.
    fn resolve_method(&self, class: Ty, method: Name) -> Option<Name>;
}

/// Protocol conformances and witness resolution.
pub trait ConformanceFacts: Sync {
    /// Every type known to conform to `protocol`.
    fn conforming_types(&self, protocol: Name) -> Vec<Ty>;

    /// The only type that can ever conform to `protocol`, if there is one.
    fn sole_conforming_type(&self, protocol: Name) -> Option<Ty> {
        match self.conforming_types(protocol).as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }

    fn conforms(&self, ty: Ty, protocol: Name) -> bool {
        self.conforming_types(protocol).contains(&ty)
    }

    /// Name of the function implementing `requirement` of `protocol`
    /// for `ty`.
    fn resolve_witness(&self, ty: Ty, protocol: Name, requirement: Name) -> Option<Name>;
}

/// Whether two addresses may refer to overlapping memory.
pub trait AliasFacts: Sync {
    fn may_alias(&self, func: &Function, a: Value, b: Value) -> bool;
}

/// Dominance between blocks of the function being optimized.
pub trait DominanceFacts: Sync {
    /// Whether every path from the entry to `use_block` passes through
    /// `def_block`. A block dominates itself.
    fn dominates(&self, def_block: BlockId, use_block: BlockId) -> bool;
}

/// Side effects of calling a function by name.
pub trait CalleeFacts: Sync {
    /// Effects of `callee`; unknown callees have every effect.
    fn effects(&self, callee: Name) -> Effects;
}

// ── Bundle ──────────────────────────────────────────────────────────

/// One oracle of each kind, borrowed for a Combiner run.
///
/// Dominance is per function and is passed to the Combiner separately.
#[derive(Clone, Copy)]
pub struct Facts<'a> {
    pub types: &'a dyn TypeFacts,
    pub classes: &'a dyn ClassHierarchy,
    pub conformances: &'a dyn ConformanceFacts,
    pub alias: &'a dyn AliasFacts,
    pub callees: &'a dyn CalleeFacts,
}

impl<'a> Facts<'a> {
    /// Real type facts, blocking answers for everything else.
    pub fn conservative(types: &'a dyn TypeFacts) -> Self {
        Self {
            types,
            classes: &Conservative,
            conformances: &Conservative,
            alias: &Conservative,
            callees: &Conservative,
        }
    }

    /// Everything from a module snapshot, with [`BasicAlias`].
    pub fn from_module(module: &'a ModuleFacts) -> Self {
        Self {
            types: module,
            classes: module,
            conformances: module,
            alias: &BasicAlias,
            callees: module,
        }
    }
}

// ── Conservative ────────────────────────────────────────────────────

/// Knows nothing; every answer blocks the rewrite that asked.
#[derive(Clone, Copy, Debug, Default)]
pub struct Conservative;

impl TypeFacts for Conservative {
    fn is_trivial(&self, _ty: Ty) -> bool {
        false
    }

    fn is_trivial_aggregate(&self, _ty: Ty) -> bool {
        false
    }
}

impl ClassHierarchy for Conservative {
    fn direct_subclasses(&self, _class: Ty) -> Vec<Ty> {
        Vec::new()
    }

    fn has_subclasses(&self, _class: Ty) -> bool {
        true
    }

    fn resolve_method(&self, _class: Ty, _method: Name) -> Option<Name> {
        None
    }
}

impl ConformanceFacts for Conservative {
    fn conforming_types(&self, _protocol: Name) -> Vec<Ty> {
        Vec::new()
    }

    fn sole_conforming_type(&self, _protocol: Name) -> Option<Ty> {
        None
    }

    fn conforms(&self, _ty: Ty, _protocol: Name) -> bool {
        false
    }

    fn resolve_witness(&self, _ty: Ty, _protocol: Name, _requirement: Name) -> Option<Name> {
        None
    }
}

impl AliasFacts for Conservative {
    fn may_alias(&self, _func: &Function, _a: Value, _b: Value) -> bool {
        true
    }
}

impl DominanceFacts for Conservative {
    fn dominates(&self, def_block: BlockId, use_block: BlockId) -> bool {
        def_block == use_block
    }
}

impl CalleeFacts for Conservative {
    fn effects(&self, _callee: Name) -> Effects {
        Effects::all()
    }
}

// ── BasicAlias ──────────────────────────────────────────────────────

/// Distinguishes stack allocations from each other and from incoming
/// addresses; everything else may alias.
#[derive(Clone, Copy, Debug, Default)]
pub struct BasicAlias;

/// Where an address comes from, as far as [`BasicAlias`] can tell.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Origin {
    Stack,
    Parameter,
    Unknown,
}

fn origin(func: &Function, addr: Value) -> Origin {
    match addr {
        Value::Result(inst, _) => match func.try_inst(inst).map(|i| i.kind()) {
            Some(InstKind::AllocStack) => Origin::Stack,
            _ => Origin::Unknown,
        },
        Value::Arg(arg) if func.arg(arg).kind() == ArgKind::Function => Origin::Parameter,
        Value::Arg(_) => Origin::Unknown,
    }
}

impl AliasFacts for BasicAlias {
    fn may_alias(&self, func: &Function, a: Value, b: Value) -> bool {
        if a == b {
            return true;
        }
        match (origin(func, a), origin(func, b)) {
            // A stack slot allocated in this function is distinct from every
            // other slot and from anything the caller could pass in.
            (Origin::Stack, Origin::Stack | Origin::Parameter)
            | (Origin::Parameter, Origin::Stack) => false,
            _ => true,
        }
    }
}

// ── ModuleFacts ─────────────────────────────────────────────────────

/// Snapshot of module-level facts, owned so it can be shared across
/// threads while the module's functions are mutated.
///
/// The snapshot assumes whole-module visibility: a non-final class with no
/// subclass in the module is treated as having none, and a protocol with a
/// single witness table has exactly one conforming type.
#[derive(Clone, Debug, Default)]
pub struct ModuleFacts {
    types: TypeTable,
    superclass: FxHashMap<Ty, Ty>,
    final_classes: FxHashSet<Ty>,
    subclasses: FxHashMap<Ty, Vec<Ty>>,
    methods: FxHashMap<(Ty, Name), Name>,
    conformances: FxHashMap<Name, Vec<Ty>>,
    witnesses: FxHashMap<(Ty, Name, Name), Name>,
    effects: FxHashMap<Name, Effects>,
}

impl ModuleFacts {
    /// Take a snapshot of `module`.
    ///
    /// Table entries pointing at removed or zombie functions are skipped.
    pub fn new(module: &Module) -> Self {
        let types = module.types().clone();

        let mut superclass = FxHashMap::default();
        let mut final_classes = FxHashSet::default();
        let mut subclasses: FxHashMap<Ty, Vec<Ty>> = FxHashMap::default();
        for (class, parent, is_final) in types.classes() {
            if is_final {
                final_classes.insert(class);
            }
            if let Some(parent) = parent {
                superclass.insert(class, parent);
                subclasses.entry(parent).or_default().push(class);
            }
        }

        let implementation = |id| {
            module
                .try_function(id)
                .filter(|f| !f.is_zombie())
                .map(Function::name)
        };

        let mut methods = FxHashMap::default();
        for vtable in module.vtables() {
            for &(method, id) in &vtable.entries {
                if let Some(name) = implementation(id) {
                    methods.insert((vtable.class, method), name);
                }
            }
        }

        let mut conformances: FxHashMap<Name, Vec<Ty>> = FxHashMap::default();
        let mut witnesses = FxHashMap::default();
        for table in module.witness_tables() {
            conformances
                .entry(table.protocol)
                .or_default()
                .push(table.conforming);
            for &(requirement, id) in &table.entries {
                if let Some(name) = implementation(id) {
                    witnesses.insert((table.conforming, table.protocol, requirement), name);
                }
            }
        }

        let effects = module
            .live_functions()
            .chain(module.zombie_functions())
            .map(|f| (f.name(), f.effects()))
            .collect();

        tracing::debug!(
            classes = superclass.len() + final_classes.len(),
            methods = methods.len(),
            witnesses = witnesses.len(),
            functions = module.live_functions().count(),
            "built module fact snapshot"
        );

        Self {
            types,
            superclass,
            final_classes,
            subclasses,
            methods,
            conformances,
            witnesses,
            effects,
        }
    }

    /// The type table the snapshot was taken from.
    pub fn types(&self) -> &TypeTable {
        &self.types
    }
}

impl TypeFacts for ModuleFacts {
    fn is_trivial(&self, ty: Ty) -> bool {
        self.types.is_trivial(ty)
    }

    fn is_trivial_aggregate(&self, ty: Ty) -> bool {
        self.types.is_trivial_aggregate(ty)
    }

    fn integer_width(&self, ty: Ty) -> Option<u32> {
        self.types.integer_width(ty)
    }
}

impl ClassHierarchy for ModuleFacts {
    fn direct_subclasses(&self, class: Ty) -> Vec<Ty> {
        self.subclasses.get(&class).cloned().unwrap_or_default()
    }

    fn has_subclasses(&self, class: Ty) -> bool {
        !self.final_classes.contains(&class)
            && self.subclasses.get(&class).is_some_and(|s| !s.is_empty())
    }

    fn resolve_method(&self, class: Ty, method: Name) -> Option<Name> {
        let mut current = Some(class);
        while let Some(c) = current {
            if let Some(&name) = self.methods.get(&(c, method)) {
                return Some(name);
            }
            current = self.superclass.get(&c).copied();
        }
        None
    }
}

impl ConformanceFacts for ModuleFacts {
    fn conforming_types(&self, protocol: Name) -> Vec<Ty> {
        self.conformances.get(&protocol).cloned().unwrap_or_default()
    }

    fn conforms(&self, ty: Ty, protocol: Name) -> bool {
        self.conformances
            .get(&protocol)
            .is_some_and(|tys| tys.contains(&ty))
    }

    fn resolve_witness(&self, ty: Ty, protocol: Name, requirement: Name) -> Option<Name> {
        self.witnesses.get(&(ty, protocol, requirement)).copied()
    }
}

impl CalleeFacts for ModuleFacts {
    fn effects(&self, callee: Name) -> Effects {
        self.effects.get(&callee).copied().unwrap_or_else(Effects::all)
    }
}

#[cfg(test)]
mod tests;
