//! The module: every function of a compilation unit plus the tables that
//! reference them.
//!
//! Functions are addressed by [`FuncId`] (their slot) and by interned name.
//! Holders of a function reference (vtable and witness table entries,
//! specialization records, replaced-by links) keep the target's reference
//! count up to date, so [`Module::erase_function`] can decide without a
//! reachability scan whether a function must linger as a zombie.

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::{
    FuncId, Function, FunctionType, Name, SpecializationInfo, StringInterner, Ty, TypeTable,
};

/// Method implementations of one class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VTable {
    pub class: Ty,
    pub entries: Vec<(Name, FuncId)>,
}

impl VTable {
    /// Implementation of `method`, if this class declares one.
    pub fn lookup(&self, method: Name) -> Option<FuncId> {
        self.entries
            .iter()
            .find(|&&(m, _)| m == method)
            .map(|&(_, f)| f)
    }
}

/// Requirement implementations of a type's conformance to a protocol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WitnessTable {
    pub conforming: Ty,
    pub protocol: Name,
    pub entries: Vec<(Name, FuncId)>,
}

impl WitnessTable {
    /// Implementation of `requirement`, if the conformance provides one.
    pub fn lookup(&self, requirement: Name) -> Option<FuncId> {
        self.entries
            .iter()
            .find(|&&(m, _)| m == requirement)
            .map(|&(_, f)| f)
    }
}

/// A compilation unit.
#[derive(Default)]
pub struct Module {
    interner: StringInterner,
    types: TypeTable,
    functions: Vec<Option<Function>>,
    by_name: FxHashMap<Name, FuncId>,
    vtables: Vec<VTable>,
    witness_tables: Vec<WitnessTable>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a module around an existing type table.
    pub fn with_types(types: TypeTable) -> Self {
        Self {
            types,
            ..Self::default()
        }
    }

    // ── Names and types ─────────────────────────────────────────

    #[inline]
    pub fn interner(&self) -> &StringInterner {
        &self.interner
    }

    pub fn intern(&mut self, s: &str) -> Name {
        self.interner.intern(s)
    }

    #[inline]
    pub fn types(&self) -> &TypeTable {
        &self.types
    }

    #[inline]
    pub fn types_mut(&mut self) -> &mut TypeTable {
        &mut self.types
    }

    // ── Functions ───────────────────────────────────────────────

    /// Declare a function. Give it a body through [`Module::function_mut`].
    ///
    /// # Panics
    ///
    /// Panics if a function (live or zombie) already has this name.
    pub fn create_function(&mut self, name: &str, signature: FunctionType) -> FuncId {
        let name = self.interner.intern(name);
        assert!(
            !self.by_name.contains_key(&name),
            "function `{}` is already defined",
            self.interner.lookup(name)
        );
        let id = FuncId::new(
            u32::try_from(self.functions.len())
                .unwrap_or_else(|_| panic!("function count exceeds u32::MAX")),
        );
        self.functions.push(Some(Function::new(id, name, signature)));
        self.by_name.insert(name, id);
        id
    }

    /// The function called `name`, live or zombie.
    pub fn lookup(&self, name: &str) -> Option<FuncId> {
        let name = self.interner.get(name)?;
        self.by_name.get(&name).copied()
    }

    /// The function called `name`, looked up by interned name.
    pub fn lookup_name(&self, name: Name) -> Option<FuncId> {
        self.by_name.get(&name).copied()
    }

    /// Whether `id` still names a function (live or zombie).
    pub fn contains(&self, id: FuncId) -> bool {
        self.functions.get(id.index()).is_some_and(Option::is_some)
    }

    pub fn try_function(&self, id: FuncId) -> Option<&Function> {
        self.functions.get(id.index()).and_then(Option::as_ref)
    }

    /// # Panics
    ///
    /// Panics if `id` was removed.
    pub fn function(&self, id: FuncId) -> &Function {
        match self.try_function(id) {
            Some(f) => f,
            None => panic!("{id:?} was removed from the module"),
        }
    }

    /// # Panics
    ///
    /// Panics if `id` was removed.
    pub fn function_mut(&mut self, id: FuncId) -> &mut Function {
        match self.functions.get_mut(id.index()).and_then(Option::as_mut) {
            Some(f) => f,
            None => panic!("{id:?} was removed from the module"),
        }
    }

    /// Functions that are neither removed nor zombies, in creation order.
    pub fn live_functions(&self) -> impl Iterator<Item = &Function> + '_ {
        self.functions
            .iter()
            .flatten()
            .filter(|f| !f.is_zombie())
    }

    /// Mutable access to every live function at once.
    pub fn live_functions_mut(&mut self) -> impl Iterator<Item = &mut Function> + '_ {
        self.functions
            .iter_mut()
            .flatten()
            .filter(|f| !f.is_zombie())
    }

    /// Functions kept only because something still references them.
    pub fn zombie_functions(&self) -> impl Iterator<Item = &Function> + '_ {
        self.functions.iter().flatten().filter(|f| f.is_zombie())
    }

    /// Remove a function from the live list.
    ///
    /// A function that is still referenced becomes a zombie: its body is
    /// dropped but the declaration stays addressable. An unreferenced one is
    /// removed outright. Either way the references it held (specialization
    /// parent, replacement) are released, and zombies whose count drops to
    /// zero as a result are removed too.
    pub fn erase_function(&mut self, id: FuncId) {
        let mut pending = vec![id];
        while let Some(id) = pending.pop() {
            let Some(func) = self.functions.get_mut(id.index()).and_then(Option::as_mut) else {
                continue;
            };

            let held: Vec<FuncId> = func
                .specialization
                .take()
                .map(|s| s.generic)
                .into_iter()
                .chain(func.replaced_by.take())
                .collect();

            if func.ref_count() > 0 {
                if !func.is_zombie() {
                    func.convert_to_declaration();
                    func.mark_zombie();
                    debug!(function = ?id, refs = func.ref_count(), "function became a zombie");
                }
            } else {
                let name = func.name();
                self.functions[id.index()] = None;
                self.by_name.remove(&name);
                debug!(function = ?id, "function removed");
            }

            pending.extend(held.into_iter().filter(|&target| self.release(target)));
        }
    }

    /// Drop one reference to `target`; returns whether it is now an
    /// unreferenced zombie.
    fn release(&self, target: FuncId) -> bool {
        self.try_function(target)
            .is_some_and(|f| f.dec_ref_count() == 0 && f.is_zombie())
    }

    fn retain(&self, target: FuncId) {
        self.function(target).inc_ref_count();
    }

    // ── Counted links ───────────────────────────────────────────

    /// Record that `func` specializes `info.generic`.
    ///
    /// # Panics
    ///
    /// Panics if either function was removed.
    pub fn set_specialization(&mut self, func: FuncId, info: SpecializationInfo) {
        self.retain(info.generic);
        let previous = self.function_mut(func).specialization.replace(info);
        if let Some(previous) = previous {
            self.release_and_collect(previous.generic);
        }
    }

    /// Record (or clear) the function that replaces `func`.
    pub fn set_replaced_by(&mut self, func: FuncId, target: Option<FuncId>) {
        if let Some(target) = target {
            self.retain(target);
        }
        let previous = std::mem::replace(&mut self.function_mut(func).replaced_by, target);
        if let Some(previous) = previous {
            self.release_and_collect(previous);
        }
    }

    fn release_and_collect(&mut self, target: FuncId) {
        if self.release(target) {
            self.erase_function(target);
        }
    }

    // ── Dispatch tables ─────────────────────────────────────────

    /// Register a class's vtable, taking a reference to every entry.
    ///
    /// # Panics
    ///
    /// Panics if the class already has one or an entry was removed.
    pub fn add_vtable(&mut self, vtable: VTable) {
        assert!(
            self.vtable(vtable.class).is_none(),
            "{:?} already has a vtable",
            vtable.class
        );
        for &(_, f) in &vtable.entries {
            self.retain(f);
        }
        self.vtables.push(vtable);
    }

    pub fn vtable(&self, class: Ty) -> Option<&VTable> {
        self.vtables.iter().find(|v| v.class == class)
    }

    pub fn vtables(&self) -> &[VTable] {
        &self.vtables
    }

    /// Drop a class's vtable and the references it held.
    pub fn remove_vtable(&mut self, class: Ty) -> Option<VTable> {
        let pos = self.vtables.iter().position(|v| v.class == class)?;
        let vtable = self.vtables.remove(pos);
        for &(_, f) in &vtable.entries {
            self.release_and_collect(f);
        }
        Some(vtable)
    }

    /// Register a conformance, taking a reference to every entry.
    ///
    /// # Panics
    ///
    /// Panics if the conformance is already registered or an entry was
    /// removed.
    pub fn add_witness_table(&mut self, table: WitnessTable) {
        assert!(
            self.witness_table(table.conforming, table.protocol).is_none(),
            "{:?} already has a witness table for {:?}",
            table.conforming,
            table.protocol
        );
        for &(_, f) in &table.entries {
            self.retain(f);
        }
        self.witness_tables.push(table);
    }

    pub fn witness_table(&self, conforming: Ty, protocol: Name) -> Option<&WitnessTable> {
        self.witness_tables
            .iter()
            .find(|w| w.conforming == conforming && w.protocol == protocol)
    }

    pub fn witness_tables(&self) -> &[WitnessTable] {
        &self.witness_tables
    }

    /// Drop a conformance and the references it held.
    pub fn remove_witness_table(&mut self, conforming: Ty, protocol: Name) -> Option<WitnessTable> {
        let pos = self
            .witness_tables
            .iter()
            .position(|w| w.conforming == conforming && w.protocol == protocol)?;
        let table = self.witness_tables.remove(pos);
        for &(_, f) in &table.entries {
            self.release_and_collect(f);
        }
        Some(table)
    }
}
