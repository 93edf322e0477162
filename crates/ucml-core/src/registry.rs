//! # Type Registry
//!
//! The single owner of every `Type` record.
//!
//! - Keyed storage uses `BTreeMap` for deterministic ordering
//! - Insertion order is kept separately so listings are stable and restartable
//! - Auto-generated ids come from a monotonic counter and skip taken ids
//! - Records are never removed or mutated

use crate::primitives::{
    CUSTOM_ID_PREFIX, MAX_DESCRIPTION_LENGTH, MAX_GROUP_SIZE, MAX_NAME_LENGTH,
};
use crate::types::{Type, TypeCategory, TypeDefinition, TypeId, TypeSystemError};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Registry of all known types.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    /// Type storage: TypeId -> Type
    types: BTreeMap<TypeId, Type>,

    /// Registration order.
    order: Vec<TypeId>,

    /// Last value handed out by the custom id counter.
    id_counter: u64,
}

impl TypeRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a registry from previously exported records.
    ///
    /// Records keep their ids and order. Dependencies may point anywhere
    /// inside the record set.
    pub fn from_parts(types: Vec<Type>, id_counter: u64) -> Result<Self, TypeSystemError> {
        let mut registry = Self {
            id_counter,
            ..Self::default()
        };

        let ids: BTreeSet<TypeId> = types.iter().map(|t| t.id().clone()).collect();
        for ty in &types {
            registry.check_dependencies(ty, &ids)?;
        }
        for ty in types {
            if registry.types.contains_key(ty.id()) {
                return Err(TypeSystemError::DuplicateId(ty.id().clone()));
            }
            registry.insert_unchecked(ty);
        }

        Ok(registry)
    }

    /// Register a single type.
    ///
    /// Fails with `DependencyNotFound` if any dependency is not registered and
    /// with `DuplicateId` if an explicit id is already taken.
    pub fn register(&mut self, definition: TypeDefinition) -> Result<Type, TypeSystemError> {
        Self::validate_definition(&definition)?;

        let id = match &definition.id {
            Some(id) => {
                if self.types.contains_key(id) {
                    return Err(TypeSystemError::DuplicateId(id.clone()));
                }
                id.clone()
            }
            None => self.generate_id(&definition.name, &BTreeSet::new()),
        };

        let ty = Type::from_definition(id, definition);
        self.check_dependencies(&ty, &BTreeSet::new())?;

        debug!(type_id = %ty.id(), name = ty.name(), category = %ty.category(), "registered type");
        self.insert_unchecked(ty.clone());
        Ok(ty)
    }

    /// Register a group of types atomically.
    ///
    /// Dependencies resolve against the registry or against other members of
    /// the group, which allows mutually dependent types. If any member fails,
    /// nothing is registered.
    pub fn register_group(
        &mut self,
        definitions: Vec<TypeDefinition>,
    ) -> Result<Vec<Type>, TypeSystemError> {
        if definitions.len() > MAX_GROUP_SIZE {
            return Err(TypeSystemError::InvalidDefinition(format!(
                "Group of {} definitions exceeds maximum {}",
                definitions.len(),
                MAX_GROUP_SIZE
            )));
        }

        let mut staged_ids = BTreeSet::new();
        let mut staged = Vec::with_capacity(definitions.len());

        for definition in definitions {
            Self::validate_definition(&definition)?;
            let id = match &definition.id {
                Some(id) => {
                    if self.types.contains_key(id) || staged_ids.contains(id) {
                        return Err(TypeSystemError::DuplicateId(id.clone()));
                    }
                    id.clone()
                }
                None => self.generate_id(&definition.name, &staged_ids),
            };
            staged_ids.insert(id.clone());
            staged.push(Type::from_definition(id, definition));
        }

        for ty in &staged {
            self.check_dependencies(ty, &staged_ids)?;
        }

        for ty in &staged {
            self.insert_unchecked(ty.clone());
        }
        debug!(count = staged.len(), "registered type group");

        Ok(staged)
    }

    /// Register an already built type under its own id.
    ///
    /// Used to keep the output of a composition for further composition.
    pub fn adopt(&mut self, ty: Type) -> Result<TypeId, TypeSystemError> {
        if self.types.contains_key(ty.id()) {
            return Err(TypeSystemError::DuplicateId(ty.id().clone()));
        }
        self.check_dependencies(&ty, &BTreeSet::new())?;

        let id = ty.id().clone();
        debug!(type_id = %id, name = ty.name(), "adopted type");
        self.insert_unchecked(ty);
        Ok(id)
    }

    /// Look up a type by id.
    pub fn get(&self, id: &TypeId) -> Result<&Type, TypeSystemError> {
        self.types
            .get(id)
            .ok_or_else(|| TypeSystemError::NotFound(id.clone()))
    }

    /// Check if a type id is registered.
    #[must_use]
    pub fn contains(&self, id: &TypeId) -> bool {
        self.types.contains_key(id)
    }

    /// First registered type with the given name.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&Type> {
        self.iter().find(|t| t.name() == name)
    }

    /// All types of a category, in registration order.
    pub fn list_by_category(&self, category: TypeCategory) -> impl Iterator<Item = &Type> + '_ {
        self.iter().filter(move |t| t.category() == category)
    }

    /// All types in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Type> + '_ {
        self.order.iter().filter_map(|id| self.types.get(id))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Current value of the custom id counter (for snapshots).
    #[must_use]
    pub fn id_counter(&self) -> u64 {
        self.id_counter
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn validate_definition(definition: &TypeDefinition) -> Result<(), TypeSystemError> {
        let name = definition.name.trim();
        if name.is_empty() {
            return Err(TypeSystemError::InvalidDefinition(
                "Type name must not be empty".to_string(),
            ));
        }
        if definition.name.len() > MAX_NAME_LENGTH {
            return Err(TypeSystemError::InvalidDefinition(format!(
                "Type name longer than {} bytes",
                MAX_NAME_LENGTH
            )));
        }
        if definition.description.len() > MAX_DESCRIPTION_LENGTH {
            return Err(TypeSystemError::InvalidDefinition(format!(
                "Description of '{}' longer than {} bytes",
                definition.name, MAX_DESCRIPTION_LENGTH
            )));
        }
        if let Some(id) = &definition.id {
            if id.as_str().trim().is_empty() {
                return Err(TypeSystemError::InvalidDefinition(
                    "Explicit type id must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Every dependency must be registered or be one of `pending`.
    fn check_dependencies(
        &self,
        ty: &Type,
        pending: &BTreeSet<TypeId>,
    ) -> Result<(), TypeSystemError> {
        for dependency in ty.dependencies() {
            if !self.types.contains_key(dependency) && !pending.contains(dependency) {
                return Err(TypeSystemError::DependencyNotFound {
                    type_name: ty.name().to_string(),
                    dependency: dependency.clone(),
                });
            }
        }
        Ok(())
    }

    /// Next free `custom_{name}_{n}` id, also avoiding `reserved`.
    pub(crate) fn generate_id(&mut self, name: &str, reserved: &BTreeSet<TypeId>) -> TypeId {
        loop {
            self.id_counter = self.id_counter.saturating_add(1);
            let candidate = TypeId::new(format!(
                "{}{}_{}",
                CUSTOM_ID_PREFIX,
                name.trim(),
                self.id_counter
            ));
            if !self.types.contains_key(&candidate) && !reserved.contains(&candidate) {
                return candidate;
            }
        }
    }

    fn insert_unchecked(&mut self, ty: Type) {
        self.order.push(ty.id().clone());
        self.types.insert(ty.id().clone(), ty);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn primitive(name: &str) -> TypeDefinition {
        TypeDefinition::new(name, TypeCategory::Primitive)
    }

    #[test]
    fn register_then_get_round_trips() {
        let mut registry = TypeRegistry::new();
        let ty = registry
            .register(primitive("int32").size(4).complexity(1))
            .expect("register");

        assert_eq!(registry.get(ty.id()).expect("get"), &ty);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unknown_id_is_not_found() {
        let registry = TypeRegistry::new();
        let result = registry.get(&TypeId::new("nope"));
        assert!(matches!(result, Err(TypeSystemError::NotFound(_))));
    }

    #[test]
    fn unresolved_dependency_rejected() {
        let mut registry = TypeRegistry::new();
        let result = registry.register(primitive("a").depends_on("missing"));

        assert!(matches!(
            result,
            Err(TypeSystemError::DependencyNotFound { .. })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn explicit_duplicate_id_rejected() {
        let mut registry = TypeRegistry::new();
        registry
            .register(primitive("a").with_id("fixed"))
            .expect("first");
        let result = registry.register(primitive("b").with_id("fixed"));

        assert!(matches!(result, Err(TypeSystemError::DuplicateId(_))));
    }

    #[test]
    fn rapid_auto_ids_never_collide() {
        let mut registry = TypeRegistry::new();
        let mut seen = BTreeSet::new();
        for _ in 0..500 {
            let ty = registry.register(primitive("same")).expect("register");
            assert!(seen.insert(ty.id().clone()));
        }
    }

    #[test]
    fn auto_id_skips_explicitly_taken_id() {
        let mut registry = TypeRegistry::new();
        registry
            .register(primitive("x").with_id("custom_x_1"))
            .expect("explicit");
        let auto = registry.register(primitive("x")).expect("auto");

        assert_eq!(auto.id().as_str(), "custom_x_2");
    }

    #[test]
    fn empty_name_rejected() {
        let mut registry = TypeRegistry::new();
        let result = registry.register(primitive("   "));
        assert!(matches!(result, Err(TypeSystemError::InvalidDefinition(_))));
    }

    #[test]
    fn list_by_category_keeps_insertion_order() {
        let mut registry = TypeRegistry::new();
        registry.register(primitive("z")).expect("z");
        registry
            .register(TypeDefinition::new("q", TypeCategory::Quantum))
            .expect("q");
        registry.register(primitive("a")).expect("a");

        let names: Vec<_> = registry
            .list_by_category(TypeCategory::Primitive)
            .map(|t| t.name().to_string())
            .collect();
        assert_eq!(names, vec!["z", "a"]);

        // Restartable: a second pass yields the same sequence.
        let again: Vec<_> = registry
            .list_by_category(TypeCategory::Primitive)
            .map(|t| t.name().to_string())
            .collect();
        assert_eq!(names, again);
    }

    #[test]
    fn group_allows_mutual_dependencies() {
        let mut registry = TypeRegistry::new();
        let group = registry
            .register_group(vec![
                primitive("A").with_id("a").depends_on("b"),
                primitive("B").with_id("b").depends_on("a"),
            ])
            .expect("group");

        assert_eq!(group.len(), 2);
        assert!(registry.contains(&TypeId::new("a")));
        assert!(registry.contains(&TypeId::new("b")));
    }

    #[test]
    fn failed_group_registers_nothing() {
        let mut registry = TypeRegistry::new();
        let result = registry.register_group(vec![
            primitive("ok").with_id("ok"),
            primitive("bad").with_id("bad").depends_on("ghost"),
        ]);

        assert!(result.is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn adopt_keeps_id() {
        let mut source = TypeRegistry::new();
        let ty = source
            .register(primitive("kept").with_id("kept_1"))
            .expect("register");

        let mut registry = TypeRegistry::new();
        let id = registry.adopt(ty.clone()).expect("adopt");
        assert_eq!(id, TypeId::new("kept_1"));
        assert!(matches!(
            registry.adopt(ty),
            Err(TypeSystemError::DuplicateId(_))
        ));
    }

    #[test]
    fn from_parts_restores_order_and_counter() {
        let mut registry = TypeRegistry::new();
        registry.register(primitive("one")).expect("one");
        registry.register(primitive("two")).expect("two");

        let types: Vec<Type> = registry.iter().cloned().collect();
        let restored = TypeRegistry::from_parts(types, registry.id_counter()).expect("restore");

        let names: Vec<_> = restored.iter().map(|t| t.name().to_string()).collect();
        assert_eq!(names, vec!["one", "two"]);
        assert_eq!(restored.id_counter(), 2);
    }
}
