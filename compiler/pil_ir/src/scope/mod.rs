//! Debug scope tree.
//!
//! Every instruction may point at a [`DebugScope`] describing the lexical
//! region it came from. Scopes form a tree through their parent link (the
//! root of each tree is attached to a function) plus an auxiliary chain
//! through `inlined_call_site` recording where inlined code was spliced in.
//!
//! Scopes are immutable once created and stored in a per-function
//! [`ScopeTable`]. A scope can only name parents and call sites that already
//! exist in the table, so neither chain can form a cycle.
//!
//! When instructions move to another function, their scopes are re-created
//! in the destination table through a [`ScopeCloner`], which memoizes the
//! mapping so shared ancestors are cloned exactly once.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::FuncId;

/// Handle to a scope within one [`ScopeTable`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct ScopeId(u32);

impl ScopeId {
    /// Create from a raw index.
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw index.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Get the index as `usize`.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope{}", self.0)
    }
}

/// A source position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SourceLoc {
    pub line: u32,
    pub column: u32,
}

impl SourceLoc {
    /// Location for compiler-synthesized code.
    pub const SYNTHETIC: SourceLoc = SourceLoc { line: 0, column: 0 };

    #[inline]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// What a scope hangs off.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScopeParent {
    /// Nested inside another scope of the same table.
    Scope(ScopeId),
    /// Top-level scope of a function.
    Function(FuncId),
}

/// One lexical scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DebugScope {
    pub loc: SourceLoc,
    pub parent: ScopeParent,
    /// Scope of the call this scope was inlined into, if any.
    pub inlined_call_site: Option<ScopeId>,
}

/// Append-only storage for the scopes of one function.
#[derive(Clone, Debug, Default)]
pub struct ScopeTable {
    scopes: Vec<DebugScope>,
}

impl ScopeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scope.
    ///
    /// With a `parent` the scope nests inside it and `function` is only
    /// recorded through the parent chain; without one the scope is a
    /// top-level scope of `function`.
    ///
    /// # Panics
    ///
    /// Panics if `parent` or `inlined_call_site` is not in this table.
    pub fn new_scope(
        &mut self,
        loc: SourceLoc,
        parent: Option<ScopeId>,
        function: FuncId,
        inlined_call_site: Option<ScopeId>,
    ) -> ScopeId {
        for existing in parent.iter().chain(inlined_call_site.iter()) {
            assert!(
                existing.index() < self.scopes.len(),
                "{existing:?} is not in this scope table",
            );
        }
        let raw = u32::try_from(self.scopes.len())
            .unwrap_or_else(|_| panic!("scope table exceeds u32::MAX entries"));
        self.scopes.push(DebugScope {
            loc,
            parent: parent.map_or(ScopeParent::Function(function), ScopeParent::Scope),
            inlined_call_site,
        });
        ScopeId(raw)
    }

    /// Look up a scope.
    ///
    /// # Panics
    ///
    /// Panics if `scope` is not in this table.
    pub fn get(&self, scope: ScopeId) -> &DebugScope {
        match self.scopes.get(scope.index()) {
            Some(s) => s,
            None => panic!("{scope:?} is not in this scope table"),
        }
    }

    /// The function a scope logically belongs to.
    ///
    /// Inlined scopes belong to the function their call site belongs to, so
    /// the call-site chain is followed first; otherwise the parent chain is
    /// walked up to the attached function.
    pub fn parent_function(&self, scope: ScopeId) -> FuncId {
        let mut current = scope;
        loop {
            let s = self.get(current);
            if let Some(site) = s.inlined_call_site {
                current = site;
                continue;
            }
            match s.parent {
                ScopeParent::Scope(parent) => current = parent,
                ScopeParent::Function(func) => return func,
            }
        }
    }

    /// Iterate from `scope` up its parent chain, starting with `scope`.
    pub fn ancestors(&self, scope: ScopeId) -> impl Iterator<Item = ScopeId> + '_ {
        std::iter::successors(Some(scope), move |&s| match self.get(s).parent {
            ScopeParent::Scope(parent) => Some(parent),
            ScopeParent::Function(_) => None,
        })
    }

    /// Length of the parent chain, counting `scope` itself.
    pub fn depth(&self, scope: ScopeId) -> usize {
        self.ancestors(scope).count()
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

/// Memoized scope copier used when code moves between functions.
///
/// Cloning the same source scope twice yields the same destination scope,
/// so the shape of the tree (including shared ancestors) survives the move.
#[derive(Debug)]
pub struct ScopeCloner {
    dest_function: FuncId,
    map: FxHashMap<ScopeId, ScopeId>,
}

impl ScopeCloner {
    /// Create a cloner whose top-level scopes attach to `dest_function`.
    pub fn new(dest_function: FuncId) -> Self {
        Self {
            dest_function,
            map: FxHashMap::default(),
        }
    }

    /// The function new top-level scopes are attached to.
    pub fn dest_function(&self) -> FuncId {
        self.dest_function
    }

    /// Make `from` clone to the existing scope `to`.
    ///
    /// Used to map a source function's root scope onto the destination's
    /// own root instead of creating a second top-level scope.
    pub fn seed(&mut self, from: ScopeId, to: ScopeId) {
        self.map.insert(from, to);
    }

    /// Clone `scope` from `src` into `dest`, reusing earlier clones.
    pub fn clone_scope(
        &mut self,
        src: &ScopeTable,
        dest: &mut ScopeTable,
        scope: Option<ScopeId>,
    ) -> Option<ScopeId> {
        let scope = scope?;
        if let Some(&cloned) = self.map.get(&scope) {
            return Some(cloned);
        }

        // Ancestors and call sites first; they are strictly older than
        // `scope`, so recursion terminates.
        let original = *src.get(scope);
        let parent = match original.parent {
            ScopeParent::Scope(p) => self.clone_scope(src, dest, Some(p)),
            ScopeParent::Function(_) => None,
        };
        let call_site = self.clone_scope(src, dest, original.inlined_call_site);

        let cloned = dest.new_scope(original.loc, parent, self.dest_function, call_site);
        self.map.insert(scope, cloned);
        Some(cloned)
    }

    /// Number of distinct scopes cloned so far.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
