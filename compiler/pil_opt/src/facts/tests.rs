use pretty_assertions::assert_eq;

use pil_ir::{
    Builder, Effects, FunctionType, Module, Name, Ty, TypeFacts, TypeTable, VTable, Value,
    WitnessTable,
};

use crate::test_helpers::make_func;

use super::*;

// ── Conservative ────────────────────────────────────────────

#[test]
fn conservative_blocks_every_rewrite() {
    let types = TypeTable::new();
    let func = make_func(&types, &[Ty::INT64], Ty::INT64);
    let arg = Value::Arg(func.block_args(func.entry_block())[0]);
    let c = Conservative;
    let class = Ty::from_raw(42);
    let name = Name::from_raw(3);

    assert!(!TypeFacts::is_trivial(&c, Ty::INT64));
    assert!(c.has_subclasses(class));
    assert_eq!(c.resolve_method(class, name), None);
    assert_eq!(c.sole_conforming_type(name), None);
    assert!(!c.conforms(class, name));
    assert_eq!(c.resolve_witness(class, name, name), None);
    assert!(c.may_alias(&func, arg, arg));
    assert_eq!(c.effects(name), Effects::all());
    assert!(!Effects::all().is_removable());
}

#[test]
fn conservative_dominance_is_reflexive_only() {
    let types = TypeTable::new();
    let mut func = make_func(&types, &[], Ty::UNIT);
    let entry = func.entry_block();
    let other = func.create_basic_block(None, false);
    assert!(DominanceFacts::dominates(&Conservative, entry, entry));
    assert!(!DominanceFacts::dominates(&Conservative, entry, other));
}

// ── BasicAlias ──────────────────────────────────────────────

#[test]
fn basic_alias_separates_stack_slots() {
    let mut types = TypeTable::new();
    let addr_ty = types.address_of(Ty::INT64);
    let slot_ty = types.address_of(addr_ty);
    let mut func = make_func(&types, &[addr_ty], Ty::UNIT);
    let entry = func.entry_block();
    let param = Value::Arg(func.block_args(entry)[0]);

    let mut b = Builder::at_end(&mut func, &types, entry);
    let s1 = b.alloc_stack(addr_ty);
    let s2 = b.alloc_stack(addr_ty);
    let holder = b.alloc_stack(slot_ty);
    let loaded = b.load(holder, pil_ir::LoadQualifier::Trivial, addr_ty);

    let alias = BasicAlias;
    assert!(alias.may_alias(&func, s1, s1));
    assert!(!alias.may_alias(&func, s1, s2));
    assert!(!alias.may_alias(&func, s1, param));
    assert!(!alias.may_alias(&func, param, s2));
    // An address read from memory could be anything.
    assert!(alias.may_alias(&func, s1, loaded));
    assert!(alias.may_alias(&func, param, loaded));
}

// ── ModuleFacts ─────────────────────────────────────────────

struct Hierarchy {
    module: Module,
    base: Ty,
    derived: Ty,
    lonely: Ty,
    speak: Name,
    base_speak: Name,
    derived_speak: Name,
}

/// `Base` (open) with final subclass `Derived`, plus an open `Lonely`
/// class nobody inherits from. `Base.speak` is overridden by `Derived`.
fn hierarchy() -> Hierarchy {
    let mut module = Module::new();
    let base_name = module.intern("Base");
    let derived_name = module.intern("Derived");
    let lonely_name = module.intern("Lonely");
    let speak = module.intern("speak");
    let base = module.types_mut().class(base_name, None, false);
    let derived = module.types_mut().class(derived_name, Some(base), true);
    let lonely = module.types_mut().class(lonely_name, None, false);

    let base_fn = module.create_function("Base.speak", FunctionType::new(vec![base], Ty::UNIT));
    let derived_fn =
        module.create_function("Derived.speak", FunctionType::new(vec![derived], Ty::UNIT));
    let base_speak = module.function(base_fn).name();
    let derived_speak = module.function(derived_fn).name();
    module.add_vtable(VTable {
        class: base,
        entries: vec![(speak, base_fn)],
    });
    module.add_vtable(VTable {
        class: derived,
        entries: vec![(speak, derived_fn)],
    });

    Hierarchy {
        module,
        base,
        derived,
        lonely,
        speak,
        base_speak,
        derived_speak,
    }
}

#[test]
fn module_facts_class_hierarchy() {
    let h = hierarchy();
    let facts = ModuleFacts::new(&h.module);

    assert_eq!(facts.direct_subclasses(h.base), vec![h.derived]);
    assert!(facts.has_subclasses(h.base));
    assert!(!facts.has_subclasses(h.derived));
    assert!(!facts.has_subclasses(h.lonely));

    assert_eq!(facts.resolve_method(h.base, h.speak), Some(h.base_speak));
    assert_eq!(facts.resolve_method(h.derived, h.speak), Some(h.derived_speak));
    assert_eq!(facts.resolve_method(h.lonely, h.speak), None);
}

#[test]
fn module_facts_inherit_methods_through_superclass() {
    let mut h = hierarchy();
    let leaf_name = h.module.intern("Leaf");
    let open_name = h.module.intern("Open");
    let open = h.module.types_mut().class(open_name, Some(h.base), false);
    let leaf = h.module.types_mut().class(leaf_name, Some(open), true);
    let facts = ModuleFacts::new(&h.module);

    assert_eq!(facts.resolve_method(leaf, h.speak), Some(h.base_speak));
    assert_eq!(facts.direct_subclasses(open), vec![leaf]);
}

#[test]
fn module_facts_witnesses() {
    let mut module = Module::new();
    let shape = module.intern("Shape");
    let eq = module.intern("Equatable");
    let area = module.intern("area");
    let equals = module.intern("equals");
    let circle_name = module.intern("Circle");
    let square_name = module.intern("Square");
    let circle = module.types_mut().struct_type(circle_name, vec![Ty::INT64]);
    let square = module.types_mut().struct_type(square_name, vec![Ty::INT64]);

    let circle_area = module.create_function("Circle.area", FunctionType::new(vec![circle], Ty::INT64));
    let circle_eq = module.create_function("Circle.==", FunctionType::new(vec![circle], Ty::INT1));
    let square_eq = module.create_function("Square.==", FunctionType::new(vec![square], Ty::INT1));
    module.add_witness_table(WitnessTable {
        conforming: circle,
        protocol: shape,
        entries: vec![(area, circle_area)],
    });
    module.add_witness_table(WitnessTable {
        conforming: circle,
        protocol: eq,
        entries: vec![(equals, circle_eq)],
    });
    module.add_witness_table(WitnessTable {
        conforming: square,
        protocol: eq,
        entries: vec![(equals, square_eq)],
    });
    let facts = ModuleFacts::new(&module);

    assert_eq!(facts.sole_conforming_type(shape), Some(circle));
    assert_eq!(facts.sole_conforming_type(eq), None);
    assert!(facts.conforms(square, eq));
    assert!(!facts.conforms(square, shape));
    assert_eq!(
        facts.resolve_witness(circle, shape, area),
        Some(module.function(circle_area).name())
    );
    assert_eq!(
        facts.resolve_witness(square, eq, equals),
        Some(module.function(square_eq).name())
    );
    assert_eq!(facts.resolve_witness(square, shape, area), None);
}

#[test]
fn module_facts_effects_default_to_everything() {
    let mut module = Module::new();
    let pure = module.create_function("pure", FunctionType::default());
    module.function_mut(pure).set_effects(Effects::READS);
    let impure = module.create_function("impure", FunctionType::default());
    let unknown = module.intern("elsewhere");
    let facts = ModuleFacts::new(&module);

    assert_eq!(facts.effects(module.function(pure).name()), Effects::READS);
    assert!(facts.effects(module.function(pure).name()).is_removable());
    assert_eq!(facts.effects(module.function(impure).name()), Effects::all());
    assert_eq!(facts.effects(unknown), Effects::all());
}

#[test]
fn module_facts_delegate_type_queries() {
    let h = hierarchy();
    let facts = ModuleFacts::new(&h.module);
    assert!(TypeFacts::is_trivial(&facts, Ty::INT64));
    assert!(!TypeFacts::is_trivial(&facts, h.base));
    assert_eq!(facts.integer_width(Ty::INT32), Some(32));
    assert_eq!(facts.types().classes().count(), 3);
}

#[test]
fn facts_bundle_from_module_uses_basic_alias() {
    let h = hierarchy();
    let snapshot = ModuleFacts::new(&h.module);
    let facts = Facts::from_module(&snapshot);
    let mut func = make_func(snapshot.types(), &[], Ty::UNIT);
    let entry = func.entry_block();
    let mut b = Builder::at_end(&mut func, snapshot.types(), entry);
    let s1 = b.alloc_stack(Ty::INT64);
    let s2 = b.alloc_stack(Ty::INT64);

    assert!(!facts.alias.may_alias(&func, s1, s2));
    assert!(!facts.classes.has_subclasses(h.derived));
    assert!(Facts::conservative(snapshot.types()).alias.may_alias(&func, s1, s2));
}
