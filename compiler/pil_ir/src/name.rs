//! Interned identifiers for functions, methods, protocols and declarations.
//!
//! A [`Name`] is a 32-bit handle into a [`StringInterner`]. Names compare in
//! O(1) and are `Copy`, so they can sit inside instruction payloads without
//! allocation. A module owns one interner; functions built in isolation (for
//! example in tests) can mint names with [`Name::from_raw`].

use std::fmt;

use rustc_hash::FxHashMap;

/// Interned string identifier.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct Name(u32);

impl Name {
    /// The pre-interned empty string.
    pub const EMPTY: Name = Name(0);

    /// Create from a raw index.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Name(raw)
    }

    /// Get the raw index.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self.0)
    }
}

/// Owns the string data behind every [`Name`] of a module.
#[derive(Clone, Debug)]
pub struct StringInterner {
    strings: Vec<Box<str>>,
    lookup: FxHashMap<Box<str>, Name>,
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

impl StringInterner {
    /// Create an interner with the empty string pre-interned as [`Name::EMPTY`].
    pub fn new() -> Self {
        let mut interner = Self {
            strings: Vec::new(),
            lookup: FxHashMap::default(),
        };
        let empty = interner.intern("");
        debug_assert_eq!(empty, Name::EMPTY);
        interner
    }

    /// Intern `s`, returning the existing name if it was seen before.
    pub fn intern(&mut self, s: &str) -> Name {
        if let Some(&name) = self.lookup.get(s) {
            return name;
        }
        let raw = u32::try_from(self.strings.len())
            .unwrap_or_else(|_| panic!("interner exceeds u32::MAX strings"));
        let name = Name(raw);
        self.strings.push(s.into());
        self.lookup.insert(s.into(), name);
        name
    }

    /// Look up a name without interning.
    pub fn get(&self, s: &str) -> Option<Name> {
        self.lookup.get(s).copied()
    }

    /// Resolve a name to its string. Unknown names resolve to `"<unknown>"`.
    pub fn lookup(&self, name: Name) -> &str {
        self.strings
            .get(name.0 as usize)
            .map_or("<unknown>", |s| &**s)
    }

    /// Number of interned strings, including the empty string.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Always `false`: the empty string is pre-interned.
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_is_idempotent() {
        let mut interner = StringInterner::new();
        let a = interner.intern("retain");
        let b = interner.intern("retain");
        assert_eq!(a, b);
        assert_eq!(interner.lookup(a), "retain");
    }

    #[test]
    fn empty_is_preinterned() {
        let interner = StringInterner::new();
        assert_eq!(interner.get(""), Some(Name::EMPTY));
        assert_eq!(interner.len(), 1);
    }

    #[test]
    fn distinct_strings_get_distinct_names() {
        let mut interner = StringInterner::new();
        let a = interner.intern("a");
        let b = interner.intern("b");
        assert_ne!(a, b);
        assert_eq!(interner.lookup(Name::from_raw(999)), "<unknown>");
    }
}
