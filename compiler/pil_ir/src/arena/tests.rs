use super::*;

define_id!(
    /// Test-only id.
    TestId,
    "t"
);

#[test]
fn alloc_and_get() {
    let mut arena: Arena<TestId, &str> = Arena::new();
    let a = arena.alloc("a");
    let b = arena.alloc("b");
    assert_eq!(arena.len(), 2);
    assert_eq!(arena[a], "a");
    assert_eq!(arena.get(b), Some(&"b"));
}

#[test]
fn removed_id_is_stale() {
    let mut arena: Arena<TestId, u32> = Arena::new();
    let a = arena.alloc(1);
    assert_eq!(arena.remove(a), Some(1));
    assert!(!arena.contains(a));
    assert_eq!(arena.get(a), None);
    assert_eq!(arena.remove(a), None);
    assert_eq!(arena.len(), 0);
}

#[test]
fn reused_slot_does_not_resurrect_old_id() {
    let mut arena: Arena<TestId, u32> = Arena::new();
    let a = arena.alloc(1);
    arena.remove(a);
    let b = arena.alloc(2);
    // Same slot, new generation.
    assert_eq!(a.index(), b.index());
    assert_ne!(a, b);
    assert_eq!(arena.get(a), None);
    assert_eq!(arena[b], 2);
}

#[test]
#[should_panic(expected = "stale or foreign arena id")]
fn indexing_stale_id_panics() {
    let mut arena: Arena<TestId, u32> = Arena::new();
    let a = arena.alloc(1);
    arena.remove(a);
    let _ = arena[a];
}

#[test]
fn iter_skips_free_slots() {
    let mut arena: Arena<TestId, u32> = Arena::new();
    let a = arena.alloc(1);
    let b = arena.alloc(2);
    let c = arena.alloc(3);
    arena.remove(b);
    let ids = arena.ids();
    assert_eq!(ids, vec![a, c]);
}

#[test]
fn clear_invalidates_everything() {
    let mut arena: Arena<TestId, u32> = Arena::new();
    let a = arena.alloc(1);
    let b = arena.alloc(2);
    arena.clear();
    assert_eq!(arena.len(), 0);
    assert!(!arena.contains(a));
    assert!(!arena.contains(b));
    let c = arena.alloc(3);
    assert_ne!(c, a);
    assert_ne!(c, b);
}

#[test]
fn debug_format_includes_generation() {
    let mut arena: Arena<TestId, u32> = Arena::new();
    let a = arena.alloc(1);
    arena.remove(a);
    let b = arena.alloc(2);
    assert_eq!(format!("{b:?}"), "t0v1");
    assert_eq!(format!("{b}"), "t0");
}
