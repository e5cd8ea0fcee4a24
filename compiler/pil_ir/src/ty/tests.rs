use crate::Name;

use super::*;

#[test]
fn primitives_have_fixed_handles() {
    let table = TypeTable::new();
    assert_eq!(table.kind(Ty::INT1), &TypeKind::Int(1));
    assert_eq!(table.kind(Ty::INT64), &TypeKind::Int(64));
    assert_eq!(table.kind(Ty::UNIT), &TypeKind::Tuple(vec![]));
    assert_eq!(table.kind(Ty::NATIVE_OBJECT), &TypeKind::NativeObject);
}

#[test]
fn interning_is_structural() {
    let mut table = TypeTable::new();
    let a = table.tuple(vec![Ty::INT64, Ty::INT1]);
    let b = table.tuple(vec![Ty::INT64, Ty::INT1]);
    let c = table.tuple(vec![Ty::INT1, Ty::INT64]);
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert!(!a.is_primitive());
}

#[test]
fn triviality() {
    let mut table = TypeTable::new();
    let class = table.class(Name::from_raw(1), None, false);
    let pair = table.tuple(vec![Ty::INT64, Ty::INT32]);
    let boxed = table.struct_type(Name::from_raw(2), vec![Ty::INT64, class]);
    let addr = table.address_of(class);

    assert!(table.is_trivial(Ty::INT64));
    assert!(table.is_trivial(pair));
    assert!(table.is_trivial(addr));
    assert!(!table.is_trivial(class));
    assert!(!table.is_trivial(boxed));
    assert!(!table.is_trivial(Ty::NATIVE_OBJECT));
    assert!(!table.is_trivial(Ty::NONE));
}

#[test]
fn trivial_aggregate_requires_aggregate() {
    let mut table = TypeTable::new();
    let class = table.class(Name::from_raw(1), None, true);
    let pair = table.tuple(vec![Ty::INT64, Ty::INT32]);
    let mixed = table.tuple(vec![Ty::INT64, class]);
    assert!(table.is_trivial_aggregate(pair));
    assert!(!table.is_trivial_aggregate(mixed));
    assert!(!table.is_trivial_aggregate(Ty::INT64));
}

#[test]
fn integer_width_from_table() {
    let mut table = TypeTable::new();
    let int16 = table.intern(TypeKind::Int(16));
    assert_eq!(table.integer_width(int16), Some(16));
    assert_eq!(table.integer_width(Ty::INT1), Some(1));
    assert_eq!(table.integer_width(Ty::FLOAT64), None);
}

#[test]
fn classes_lists_superclass_links() {
    let mut table = TypeTable::new();
    let base = table.class(Name::from_raw(1), None, false);
    let derived = table.class(Name::from_raw(2), Some(base), true);
    let classes: Vec<_> = table.classes().collect();
    assert_eq!(classes, vec![(base, None, false), (derived, Some(base), true)]);
}

#[test]
#[should_panic(expected = "references unknown")]
fn interning_dangling_reference_panics() {
    let mut table = TypeTable::new();
    table.tuple(vec![Ty::from_raw(500)]);
}

#[test]
fn display_names() {
    assert_eq!(Ty::INT64.to_string(), "$Int64");
    assert_eq!(Ty::from_raw(40).to_string(), "$T40");
    assert_eq!(format!("{:?}", Ty::NONE), "Ty::NONE");
}
