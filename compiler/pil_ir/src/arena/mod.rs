//! Generational arenas for PIL graph nodes.
//!
//! Instructions, blocks and arguments are owned by their [`Function`]
//! through an [`Arena`] and referenced everywhere else by a typed,
//! generational identifier. An identifier packs a slot index with the
//! generation the slot had when the node was allocated; once the node is
//! freed, the slot's generation moves on and every outstanding identifier
//! for it becomes stale.
//!
//! Stale identifiers are detected on every dereference: [`Arena::get`]
//! returns `None`, and indexing panics with the identifier in the message.
//! A dangling handle can therefore never silently alias a newer node.
//!
//! [`Function`]: crate::Function

use std::fmt;
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

/// A typed generational identifier.
pub trait ArenaId: Copy + Eq + fmt::Debug {
    /// Build an identifier from a slot index and its generation.
    fn from_parts(index: u32, generation: u32) -> Self;

    /// The slot index.
    fn slot(self) -> u32;

    /// The generation the slot had when this identifier was minted.
    fn generation(self) -> u32;
}

/// Define a generational identifier newtype.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub struct $name {
            index: u32,
            generation: u32,
        }

        impl $name {
            /// Slot index as `usize` (for side tables indexed by slot).
            #[inline]
            pub fn index(self) -> usize {
                self.index as usize
            }
        }

        impl $crate::arena::ArenaId for $name {
            #[inline]
            fn from_parts(index: u32, generation: u32) -> Self {
                Self { index, generation }
            }

            #[inline]
            fn slot(self) -> u32 {
                self.index
            }

            #[inline]
            fn generation(self) -> u32 {
                self.generation
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}{}v{}", $prefix, self.index, self.generation)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}{}", $prefix, self.index)
            }
        }
    };
}

pub(crate) use define_id;

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot-reusing storage addressed by generational identifiers.
pub struct Arena<I, T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
    _id: PhantomData<fn() -> I>,
}

impl<I: ArenaId, T> Default for Arena<I, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: ArenaId, T> Arena<I, T> {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
            _id: PhantomData,
        }
    }

    /// Store `value` and return its identifier.
    pub fn alloc(&mut self, value: T) -> I {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            debug_assert!(slot.value.is_none(), "free list points at a live slot");
            slot.value = Some(value);
            return I::from_parts(index, slot.generation);
        }
        let index = u32::try_from(self.slots.len())
            .unwrap_or_else(|_| panic!("arena exceeds u32::MAX slots"));
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        I::from_parts(index, 0)
    }

    /// Free the node behind `id`, returning it. Stale ids return `None`.
    pub fn remove(&mut self, id: I) -> Option<T> {
        let slot = self.slots.get_mut(id.slot() as usize)?;
        if slot.generation != id.generation() {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.slot());
        self.len -= 1;
        Some(value)
    }

    /// Whether `id` refers to a live node.
    #[inline]
    pub fn contains(&self, id: I) -> bool {
        self.get(id).is_some()
    }

    /// Borrow the node behind `id`, or `None` if the id is stale.
    #[inline]
    pub fn get(&self, id: I) -> Option<&T> {
        let slot = self.slots.get(id.slot() as usize)?;
        if slot.generation == id.generation() {
            slot.value.as_ref()
        } else {
            None
        }
    }

    /// Mutably borrow the node behind `id`, or `None` if the id is stale.
    #[inline]
    pub fn get_mut(&mut self, id: I) -> Option<&mut T> {
        let slot = self.slots.get_mut(id.slot() as usize)?;
        if slot.generation == id.generation() {
            slot.value.as_mut()
        } else {
            None
        }
    }

    /// Number of live nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Iterate over live nodes in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (I, &T)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.value.as_ref().map(|v| {
                #[expect(
                    clippy::cast_possible_truncation,
                    reason = "slot count is bounded by u32 in alloc"
                )]
                let id = I::from_parts(i as u32, slot.generation);
                (id, v)
            })
        })
    }

    /// Identifiers of all live nodes in slot order.
    pub fn ids(&self) -> Vec<I> {
        self.iter().map(|(id, _)| id).collect()
    }

    /// Drop every node, invalidating all identifiers.
    pub fn clear(&mut self) {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.value.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                #[expect(
                    clippy::cast_possible_truncation,
                    reason = "slot count is bounded by u32 in alloc"
                )]
                let index = i as u32;
                self.free.push(index);
            }
        }
        self.len = 0;
    }
}

impl<I: ArenaId, T> Index<I> for Arena<I, T> {
    type Output = T;

    fn index(&self, id: I) -> &T {
        match self.get(id) {
            Some(v) => v,
            None => panic!("stale or foreign arena id {id:?}"),
        }
    }
}

impl<I: ArenaId, T> IndexMut<I> for Arena<I, T> {
    fn index_mut(&mut self, id: I) -> &mut T {
        match self.get_mut(id) {
            Some(v) => v,
            None => panic!("stale or foreign arena id {id:?}"),
        }
    }
}

#[cfg(test)]
mod tests;
