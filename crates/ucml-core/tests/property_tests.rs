//! # Property-Based Tests
//!
//! Invariants of registration, inference, compatibility, composition and
//! fractal validation, checked with proptest.

use proptest::collection::vec;
use proptest::prelude::*;
use std::collections::BTreeSet;
use ucml_core::{
    CompatibilityLevel, Datum, TypeCategory, TypeDefinition, TypeId, TypeSystem,
    export_canonical, import_canonical,
};

fn category() -> impl Strategy<Value = TypeCategory> {
    prop::sample::select(TypeCategory::ALL.to_vec())
}

fn definition() -> impl Strategy<Value = TypeDefinition> {
    (
        "[a-z][a-z0-9_]{0,15}",
        category(),
        0u64..4096,
        1u64..20,
        vec("[a-z]{1,6}", 0..4),
    )
        .prop_map(|(name, category, size, complexity, methods)| {
            TypeDefinition::new(name, category)
                .size(size)
                .complexity(complexity)
                .methods(methods)
        })
}

fn system() -> TypeSystem {
    TypeSystem::with_default_profile().expect("default profile")
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Every registered type reads back unchanged.
    #[test]
    fn registered_types_round_trip(defs in vec(definition(), 1..30)) {
        let mut system = system();
        let mut registered = Vec::new();
        for def in defs {
            registered.push(system.register_type(def).expect("register"));
        }

        for ty in &registered {
            prop_assert_eq!(system.get_type(ty.id()).expect("get"), ty);
        }
    }

    /// Auto-generated ids never repeat, even for identical names.
    #[test]
    fn auto_ids_unique(count in 1usize..200) {
        let mut system = system();
        let mut ids = BTreeSet::new();
        for _ in 0..count {
            let ty = system
                .register_type(TypeDefinition::new("dup", TypeCategory::Agent))
                .expect("register");
            prop_assert!(ids.insert(ty.id().clone()));
        }
    }

    /// A type is always exactly compatible with itself.
    #[test]
    fn identity_is_exact(def in definition(), op in "[a-z]{1,8}") {
        let mut system = system();
        let ty = system.register_type(def).expect("register");
        let level = system.check_compatibility(ty.id(), ty.id(), &op).expect("check");
        prop_assert_eq!(level, CompatibilityLevel::Exact);
    }

    /// Compatibility grading is symmetric.
    #[test]
    fn compatibility_symmetric(a in definition(), b in definition()) {
        let mut system = system();
        let a = system.register_type(a).expect("a");
        let b = system.register_type(b).expect("b");

        prop_assert_eq!(
            system.check_compatibility(a.id(), b.id(), "compose").expect("ab"),
            system.check_compatibility(b.id(), a.id(), "compose").expect("ba")
        );
    }

    /// Integers always infer the narrowest width holding them.
    #[test]
    fn integer_inference_is_narrowest(value in any::<i64>()) {
        let mut system = system();
        let ty = system.infer_type(&Datum::from(value)).expect("infer");

        let expected = if i8::try_from(value).is_ok() {
            "int8"
        } else if i16::try_from(value).is_ok() {
            "int16"
        } else if i32::try_from(value).is_ok() {
            "int32"
        } else {
            "int64"
        };
        prop_assert_eq!(ty.name(), expected);
    }

    /// Composition never fails for registered inputs, and a failed
    /// validation always yields the error type.
    #[test]
    fn composition_is_total(defs in vec(definition(), 1..8)) {
        let mut system = system();
        let ids: Vec<TypeId> = defs
            .into_iter()
            .map(|d| system.register_type(d).expect("register").id().clone())
            .collect();

        let comp = system.compose(&ids, "auto").expect("compose");
        prop_assert_eq!(comp.inputs.len(), ids.len());
        if comp.validation_passed {
            prop_assert_eq!(comp.output.category(), TypeCategory::Composite);
            prop_assert!(comp.result().is_ok());
        } else {
            prop_assert_eq!(comp.output.name(), "composition_error");
            prop_assert!(comp.result().is_err());
        }
    }

    /// Output size and complexity follow the input sums.
    #[test]
    fn generic_output_sums_inputs(defs in vec(definition(), 1..5)) {
        let mut system = system();
        let types: Vec<_> = defs
            .into_iter()
            .map(|d| system.register_type(d).expect("register"))
            .collect();
        let ids: Vec<TypeId> = types.iter().map(|t| t.id().clone()).collect();

        let comp = system.compose(&ids, "generic_composition").expect("compose");
        prop_assert!(comp.validation_passed);
        prop_assert_eq!(comp.output.size(), types.iter().map(|t| t.size()).sum::<u64>());
        prop_assert_eq!(
            comp.output.complexity(),
            types.iter().map(|t| t.complexity()).sum::<u64>()
        );
    }

    /// Fractal size bound is inclusive at every tier.
    #[test]
    fn fractal_size_bound_inclusive(tier_index in 0usize..3) {
        let system = system();
        let tier = system.list_fractal_tiers()[tier_index].clone();

        prop_assert!(
            system
                .validate_fractal_expansion(&tier.name, tier.complexity_limit, tier.max_expansion)
                .valid
        );
        prop_assert!(
            !system
                .validate_fractal_expansion(&tier.name, tier.complexity_limit, tier.max_expansion + 1)
                .valid
        );
        prop_assert!(
            !system
                .validate_fractal_expansion(&tier.name, tier.complexity_limit + 1, 0)
                .valid
        );
    }

    /// Canonical export survives a round trip for arbitrary registrations.
    #[test]
    fn canonical_round_trip(defs in vec(definition(), 0..10)) {
        let mut system = system();
        for def in defs {
            system.register_type(def).expect("register");
        }
        let snapshot = system.snapshot();
        let bytes = export_canonical(&snapshot).expect("export");
        prop_assert_eq!(import_canonical(&bytes).expect("import"), snapshot);
    }
}
