//! Ownership kinds for PIL values.
//!
//! Every value carries an [`OwnershipKind`] assigned once, when its producer
//! is created. The kind says how the value's lifetime is managed:
//!
//! - [`Owned`](OwnershipKind::Owned): the holder must consume it exactly once
//!   (destroy it, or pass it to a consuming use).
//! - [`Guaranteed`](OwnershipKind::Guaranteed): borrowed; someone else keeps
//!   it alive for the duration of the uses.
//! - [`Unowned`](OwnershipKind::Unowned): no lifetime guarantee at all.
//! - [`None`](OwnershipKind::None): trivial type, no discipline applies.
//!
//! At a merge point (a phi argument, or a forwarding instruction with several
//! operands) the incoming kinds must agree. Trivial incoming values are
//! ignored; see [`merge_ownership`].

use std::fmt;

/// How a value's lifetime is managed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OwnershipKind {
    /// No lifetime guarantee (`unowned(unsafe)`-style references).
    Unowned,
    /// Must be consumed exactly once.
    Owned,
    /// Borrowed for the duration of its uses.
    Guaranteed,
    /// Trivial type; no ownership discipline.
    None,
}

impl OwnershipKind {
    /// Whether this is the trivial kind.
    #[inline]
    pub fn is_trivial(self) -> bool {
        self == OwnershipKind::None
    }

    /// Merge two kinds at a merge point.
    ///
    /// `None` is the identity. Two distinct non-trivial kinds do not merge.
    pub fn merge(self, other: OwnershipKind) -> Option<OwnershipKind> {
        match (self, other) {
            (OwnershipKind::None, k) | (k, OwnershipKind::None) => Some(k),
            (a, b) if a == b => Some(a),
            _ => None,
        }
    }

    /// Whether a value of kind `self` may take the place of a value of kind
    /// `replaced` at every one of its uses.
    ///
    /// Only identical kinds, or a trivial replacement, are interchangeable:
    /// swapping an owned value for a borrowed one (or vice versa) would
    /// change who is responsible for consuming it.
    pub fn can_replace(self, replaced: OwnershipKind) -> bool {
        self == replaced || self.is_trivial()
    }
}

impl fmt::Display for OwnershipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OwnershipKind::Unowned => "@unowned",
            OwnershipKind::Owned => "@owned",
            OwnershipKind::Guaranteed => "@guaranteed",
            OwnershipKind::None => "@none",
        };
        f.write_str(s)
    }
}

/// Incoming ownership kinds at a merge point disagree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("ownership mismatch at merge point: {first} vs {second}")]
pub struct OwnershipMismatch {
    /// The first non-trivial kind seen.
    pub first: OwnershipKind,
    /// The first kind that disagreed with it.
    pub second: OwnershipKind,
}

/// Compute the common ownership kind of a set of incoming values.
///
/// Trivial kinds are skipped. If nothing remains the result is
/// [`OwnershipKind::None`]; if the remaining kinds disagree the merge fails.
pub fn merge_ownership<I>(kinds: I) -> Result<OwnershipKind, OwnershipMismatch>
where
    I: IntoIterator<Item = OwnershipKind>,
{
    let mut merged = OwnershipKind::None;
    for kind in kinds {
        merged = merged.merge(kind).ok_or(OwnershipMismatch {
            first: merged,
            second: kind,
        })?;
    }
    Ok(merged)
}
