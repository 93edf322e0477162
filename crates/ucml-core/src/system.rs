//! # Type System
//!
//! The owned entry point tying registry, inference, compatibility,
//! composition and fractal validation together.
//!
//! `TypeSystem` is a plain struct: `&mut self` for registration and
//! inference, `&self` for everything else. `SharedTypeSystem` puts it
//! behind `Arc<RwLock<_>>` for use across threads.

use crate::compatibility::{CompatibilityChecker, CompatibilityLevel};
use crate::composition::{CompositionEngine, RuleBook, TypeComposition};
use crate::config::{CompositionRule, FractalTier, Profile};
use crate::export::TypeSystemSnapshot;
use crate::fractal::{FractalConstraintValidator, FractalVerdict};
use crate::inference::{Datum, TypeInferencer};
use crate::paradox::{ParadoxPattern, ParadoxReport, paradox_patterns};
use crate::registry::TypeRegistry;
use crate::types::{Type, TypeCategory, TypeDefinition, TypeId, TypeSystemError};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Summary counts of a type system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSystemStatus {
    pub profile_version: u32,
    pub total_types: usize,
    /// Every category, including empty ones.
    pub categories: BTreeMap<TypeCategory, usize>,
    pub composition_rules: usize,
    pub selection_entries: usize,
    pub paradox_patterns: usize,
    pub fractal_tiers: usize,
    pub complexity_budget: u64,
}

/// The semantic type and composition engine.
#[derive(Debug)]
pub struct TypeSystem {
    profile_version: u32,
    registry: TypeRegistry,
    engine: CompositionEngine,
    fractal: FractalConstraintValidator,
}

impl TypeSystem {
    /// Build a system from a profile, registering its built-in types.
    pub fn from_profile(profile: &Profile) -> Result<Self, TypeSystemError> {
        profile.validate()?;

        let mut registry = TypeRegistry::new();
        registry.register_group(profile.builtin_definitions())?;

        let system = Self {
            profile_version: profile.version,
            registry,
            engine: CompositionEngine::new(RuleBook::from_profile(profile)),
            fractal: FractalConstraintValidator::new(profile.tiers.clone()),
        };
        info!(
            types = system.registry.len(),
            rules = profile.rules.len(),
            tiers = profile.tiers.len(),
            "type system initialized"
        );
        Ok(system)
    }

    /// Build a system from the embedded default profile.
    pub fn with_default_profile() -> Result<Self, TypeSystemError> {
        Self::from_profile(&Profile::default_profile()?)
    }

    /// Rebuild a system from a snapshot, keeping ids and counters.
    pub fn from_snapshot(snapshot: TypeSystemSnapshot) -> Result<Self, TypeSystemError> {
        let profile = Profile {
            version: snapshot.profile_version,
            complexity_budget: snapshot.complexity_budget,
            types: Vec::new(),
            rules: snapshot.rules,
            selection: snapshot.selection,
            default_rule: snapshot.default_rule,
            tiers: snapshot.tiers,
        };
        profile.validate()?;

        let registry = TypeRegistry::from_parts(snapshot.types, snapshot.registry_counter)?;
        let engine =
            CompositionEngine::with_counters(RuleBook::from_profile(&profile), snapshot.counters);

        info!(types = registry.len(), "type system restored");
        Ok(Self {
            profile_version: profile.version,
            registry,
            engine,
            fractal: FractalConstraintValidator::new(profile.tiers),
        })
    }

    /// Full state for persistence.
    #[must_use]
    pub fn snapshot(&self) -> TypeSystemSnapshot {
        let book = self.engine.rule_book();
        TypeSystemSnapshot {
            profile_version: self.profile_version,
            complexity_budget: book.complexity_budget(),
            default_rule: book.default_rule().to_string(),
            types: self.registry.iter().cloned().collect(),
            rules: book.rules().to_vec(),
            selection: book.selection().to_vec(),
            tiers: self.fractal.tiers().to_vec(),
            registry_counter: self.registry.id_counter(),
            counters: self.engine.counters(),
        }
    }

    // =========================================================================
    // REGISTRY
    // =========================================================================

    pub fn register_type(&mut self, definition: TypeDefinition) -> Result<Type, TypeSystemError> {
        self.registry.register(definition)
    }

    /// Atomic group registration; members may depend on each other.
    pub fn register_types(
        &mut self,
        definitions: Vec<TypeDefinition>,
    ) -> Result<Vec<Type>, TypeSystemError> {
        self.registry.register_group(definitions)
    }

    /// Register an existing type (typically a composition output) as is.
    pub fn adopt_type(&mut self, ty: Type) -> Result<TypeId, TypeSystemError> {
        self.registry.adopt(ty)
    }

    pub fn get_type(&self, id: &TypeId) -> Result<&Type, TypeSystemError> {
        self.registry.get(id)
    }

    pub fn list_by_category(&self, category: TypeCategory) -> impl Iterator<Item = &Type> + '_ {
        self.registry.list_by_category(category)
    }

    #[must_use]
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    // =========================================================================
    // INFERENCE, COMPATIBILITY, COMPOSITION
    // =========================================================================

    pub fn infer_type(&mut self, datum: &Datum) -> Result<Type, TypeSystemError> {
        TypeInferencer::infer(&mut self.registry, datum)
    }

    pub fn check_compatibility(
        &self,
        a: &TypeId,
        b: &TypeId,
        operation: &str,
    ) -> Result<CompatibilityLevel, TypeSystemError> {
        let a = self.registry.get(a)?;
        let b = self.registry.get(b)?;
        Ok(CompatibilityChecker::new(self.engine.rule_book().rules()).check(a, b, operation))
    }

    /// See `CompositionEngine::compose`.
    pub fn compose(
        &self,
        inputs: &[TypeId],
        rule_name: &str,
    ) -> Result<TypeComposition, TypeSystemError> {
        self.engine.compose(&self.registry, inputs, rule_name)
    }

    #[must_use]
    pub fn list_composition_rules(&self) -> &[CompositionRule] {
        self.engine.rule_book().rules()
    }

    #[must_use]
    pub fn paradox_patterns(&self) -> Vec<ParadoxPattern> {
        paradox_patterns()
    }

    // =========================================================================
    // FRACTAL
    // =========================================================================

    #[must_use]
    pub fn validate_fractal_expansion(
        &self,
        tier: &str,
        complexity: u64,
        estimated_size: u64,
    ) -> FractalVerdict {
        self.fractal.validate(tier, complexity, estimated_size)
    }

    #[must_use]
    pub fn validate_nested_expansion(
        &self,
        tier: &str,
        complexity: u64,
        estimated_size: u64,
        depth: u32,
    ) -> FractalVerdict {
        self.fractal
            .validate_nested(tier, complexity, estimated_size, depth)
    }

    /// Fail with `FractalConstraintViolation` instead of returning a verdict.
    pub fn enforce_fractal_expansion(
        &self,
        tier: &str,
        complexity: u64,
        estimated_size: u64,
        depth: u32,
    ) -> Result<(), TypeSystemError> {
        Ok(self
            .fractal
            .enforce(tier, complexity, estimated_size, depth)?)
    }

    /// `FractalOverflow` paradox report for a failed verdict.
    #[must_use]
    pub fn fractal_overflow_report(&self, verdict: &FractalVerdict) -> Option<ParadoxReport> {
        self.engine.detector().overflow_report(verdict)
    }

    #[must_use]
    pub fn list_fractal_tiers(&self) -> &[FractalTier] {
        self.fractal.tiers()
    }

    // =========================================================================
    // STATUS
    // =========================================================================

    #[must_use]
    pub fn status(&self) -> TypeSystemStatus {
        let mut categories: BTreeMap<TypeCategory, usize> =
            TypeCategory::ALL.iter().map(|c| (*c, 0)).collect();
        for ty in self.registry.iter() {
            *categories.entry(ty.category()).or_insert(0) += 1;
        }

        let book = self.engine.rule_book();
        TypeSystemStatus {
            profile_version: self.profile_version,
            total_types: self.registry.len(),
            categories,
            composition_rules: book.rules().len(),
            selection_entries: book.selection().len(),
            paradox_patterns: paradox_patterns().len(),
            fractal_tiers: self.fractal.tiers().len(),
            complexity_budget: book.complexity_budget(),
        }
    }
}

// =============================================================================
// SHARED HANDLE
// =============================================================================

/// Thread-safe handle: writers take the write lock, everything else reads.
#[derive(Debug, Clone)]
pub struct SharedTypeSystem {
    inner: Arc<RwLock<TypeSystem>>,
}

impl SharedTypeSystem {
    #[must_use]
    pub fn new(system: TypeSystem) -> Self {
        Self {
            inner: Arc::new(RwLock::new(system)),
        }
    }

    pub fn register_type(&self, definition: TypeDefinition) -> Result<Type, TypeSystemError> {
        self.inner.write().register_type(definition)
    }

    pub fn register_types(
        &self,
        definitions: Vec<TypeDefinition>,
    ) -> Result<Vec<Type>, TypeSystemError> {
        self.inner.write().register_types(definitions)
    }

    pub fn adopt_type(&self, ty: Type) -> Result<TypeId, TypeSystemError> {
        self.inner.write().adopt_type(ty)
    }

    pub fn infer_type(&self, datum: &Datum) -> Result<Type, TypeSystemError> {
        self.inner.write().infer_type(datum)
    }

    /// Owned copy of a type.
    pub fn get_type(&self, id: &TypeId) -> Result<Type, TypeSystemError> {
        self.inner.read().get_type(id).cloned()
    }

    pub fn check_compatibility(
        &self,
        a: &TypeId,
        b: &TypeId,
        operation: &str,
    ) -> Result<CompatibilityLevel, TypeSystemError> {
        self.inner.read().check_compatibility(a, b, operation)
    }

    pub fn compose(
        &self,
        inputs: &[TypeId],
        rule_name: &str,
    ) -> Result<TypeComposition, TypeSystemError> {
        self.inner.read().compose(inputs, rule_name)
    }

    #[must_use]
    pub fn validate_fractal_expansion(
        &self,
        tier: &str,
        complexity: u64,
        estimated_size: u64,
    ) -> FractalVerdict {
        self.inner
            .read()
            .validate_fractal_expansion(tier, complexity, estimated_size)
    }

    #[must_use]
    pub fn status(&self) -> TypeSystemStatus {
        self.inner.read().status()
    }

    #[must_use]
    pub fn snapshot(&self) -> TypeSystemSnapshot {
        self.inner.read().snapshot()
    }

    /// Run a closure under the read lock.
    pub fn read<R>(&self, f: impl FnOnce(&TypeSystem) -> R) -> R {
        f(&self.inner.read())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::thread;

    #[test]
    fn default_system_status() {
        let system = TypeSystem::with_default_profile().expect("system");
        let status = system.status();

        assert_eq!(status.total_types, 21);
        assert_eq!(status.categories[&TypeCategory::Primitive], 9);
        assert_eq!(status.categories[&TypeCategory::Quantum], 1);
        assert_eq!(status.composition_rules, 6);
        assert_eq!(status.paradox_patterns, 5);
        assert_eq!(status.fractal_tiers, 3);
    }

    #[test]
    fn check_compatibility_requires_known_ids() {
        let system = TypeSystem::with_default_profile().expect("system");
        let result =
            system.check_compatibility(&TypeId::new("type_int8"), &TypeId::new("nope"), "add");
        assert!(matches!(result, Err(TypeSystemError::NotFound(_))));
    }

    #[test]
    fn adopted_output_composes_further() {
        let mut system = TypeSystem::with_default_profile().expect("system");
        let comp = system
            .compose(
                &[TypeId::new("type_int8"), TypeId::new("type_int16")],
                "numeric_operations",
            )
            .expect("compose");
        let id = system.adopt_type(comp.output).expect("adopt");

        let next = system
            .compose(&[id.clone(), TypeId::new("type_bytes")], "auto")
            .expect("compose again");
        assert_eq!(next.inputs[0], id);
    }

    #[test]
    fn enforce_maps_to_fractal_error() {
        let system = TypeSystem::with_default_profile().expect("system");
        let result = system.enforce_fractal_expansion("tier1", 1, 2048, 1);
        assert!(matches!(
            result,
            Err(TypeSystemError::FractalConstraintViolation(_))
        ));
    }

    #[test]
    fn snapshot_restores_state_and_counters() {
        let mut system = TypeSystem::with_default_profile().expect("system");
        system
            .register_type(TypeDefinition::new("sentinel", TypeCategory::Agent))
            .expect("register");
        let comp = system
            .compose(&[TypeId::new("type_int8")], "auto")
            .expect("compose");
        system.adopt_type(comp.output.clone()).expect("adopt");

        let restored = TypeSystem::from_snapshot(system.snapshot()).expect("restore");
        assert_eq!(restored.status(), system.status());

        // Restored counters never reissue an adopted id.
        let again = restored
            .compose(&[TypeId::new("type_int8")], "auto")
            .expect("compose");
        assert_ne!(again.output.id(), comp.output.id());
    }

    #[test]
    fn concurrent_registration_yields_unique_ids() {
        let shared = SharedTypeSystem::new(TypeSystem::with_default_profile().expect("system"));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let shared = shared.clone();
                thread::spawn(move || {
                    (0..50)
                        .map(|_| {
                            shared
                                .register_type(TypeDefinition::new("worker", TypeCategory::System))
                                .expect("register")
                                .id()
                                .clone()
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = BTreeSet::new();
        for handle in handles {
            for id in handle.join().expect("join") {
                assert!(seen.insert(id));
            }
        }
        assert_eq!(seen.len(), 400);
        assert_eq!(shared.status().total_types, 421);
    }

    #[test]
    fn concurrent_compositions_have_unique_ids() {
        let shared = SharedTypeSystem::new(TypeSystem::with_default_profile().expect("system"));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let shared = shared.clone();
                thread::spawn(move || {
                    (0..25)
                        .map(|_| {
                            shared
                                .compose(&[TypeId::new("type_bool")], "auto")
                                .expect("compose")
                                .id
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = BTreeSet::new();
        for handle in handles {
            for id in handle.join().expect("join") {
                assert!(seen.insert(id));
            }
        }
        assert_eq!(seen.len(), 100);
    }
}
