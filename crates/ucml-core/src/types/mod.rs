//! # Core Type Definitions
//!
//! This module contains the shared vocabulary of the UCML type engine:
//! - Identifiers (`TypeId`) and id generation (`IdSequence`)
//! - The type record itself (`Type`, `TypeCategory`, `Constraints`)
//! - Registration requests (`TypeDefinition`)
//! - Error types (`TypeSystemError`, `ValidationError`, `FractalViolation`, `ProfileError`)
//!
//! ## Determinism Guarantees
//!
//! - Methods and dependencies are `BTreeSet`s, constraints a `BTreeMap`
//! - Ids come from monotonic counters, never from wall-clock time

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Unique, stable identifier of a registered type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeId(pub String);

impl TypeId {
    /// Create a type id from a string.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Monotonic id generator shared by concurrent readers.
///
/// Produces `{prefix}_{n}` with `n` starting at the seed. Never repeats
/// within a process because the counter is only ever incremented.
#[derive(Debug)]
pub struct IdSequence {
    prefix: &'static str,
    next: AtomicU64,
}

impl IdSequence {
    /// Create a sequence starting at 1.
    #[must_use]
    pub const fn new(prefix: &'static str) -> Self {
        Self::starting_at(prefix, 1)
    }

    /// Create a sequence starting at `seed`.
    #[must_use]
    pub const fn starting_at(prefix: &'static str, seed: u64) -> Self {
        Self {
            prefix,
            next: AtomicU64::new(seed),
        }
    }

    /// Take the next id.
    pub fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}_{}", self.prefix, n)
    }

    /// The value the next call to `next_id` will use.
    #[must_use]
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

// =============================================================================
// CATEGORY
// =============================================================================

/// The category a symbolic unit belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeCategory {
    /// Basic values: integers, floats, booleans, strings.
    Primitive,
    /// Aggregates: arrays, tensors, composed types.
    Composite,
    /// Signatures, closures, operators.
    Function,
    /// Behaviors and capabilities of agents.
    Agent,
    /// Resources and protocols.
    System,
    /// Superposition and entanglement units.
    Quantum,
}

impl TypeCategory {
    /// All categories in declaration order.
    pub const ALL: [TypeCategory; 6] = [
        TypeCategory::Primitive,
        TypeCategory::Composite,
        TypeCategory::Function,
        TypeCategory::Agent,
        TypeCategory::System,
        TypeCategory::Quantum,
    ];

    /// Lowercase name, as used in profiles.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeCategory::Primitive => "primitive",
            TypeCategory::Composite => "composite",
            TypeCategory::Function => "function",
            TypeCategory::Agent => "agent",
            TypeCategory::System => "system",
            TypeCategory::Quantum => "quantum",
        }
    }
}

impl fmt::Display for TypeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TypeCategory {
    type Err = TypeSystemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TypeCategory::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| TypeSystemError::InvalidDefinition(format!("Unknown category: {}", s)))
    }
}

// =============================================================================
// CONSTRAINTS
// =============================================================================

/// Free-form semantic tags attached to a type (`"access" => "read-only"`, ...).
pub type Constraints = BTreeMap<String, Value>;

fn value_carries_tag(value: &Value, tag: &str) -> bool {
    match value {
        Value::String(s) => s == tag,
        Value::Array(items) => items.iter().any(|item| item.as_str() == Some(tag)),
        _ => false,
    }
}

// =============================================================================
// TYPE
// =============================================================================

/// A named, categorized descriptor of a symbolic unit.
///
/// Types are immutable once created. The registry hands out shared
/// references; there is no mutation API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Type {
    id: TypeId,
    category: TypeCategory,
    name: String,
    description: String,
    size: u64,
    complexity: u64,
    constraints: Constraints,
    methods: BTreeSet<String>,
    dependencies: BTreeSet<TypeId>,
}

impl Type {
    /// Build a type record from a definition and its resolved id.
    pub(crate) fn from_definition(id: TypeId, definition: TypeDefinition) -> Self {
        Self {
            id,
            category: definition.category,
            name: definition.name,
            description: definition.description,
            size: definition.size,
            complexity: definition.complexity,
            constraints: definition.constraints,
            methods: definition.methods,
            dependencies: definition.dependencies,
        }
    }

    #[must_use]
    pub fn id(&self) -> &TypeId {
        &self.id
    }

    #[must_use]
    pub fn category(&self) -> TypeCategory {
        self.category
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Semantic footprint in bytes (not a physical size).
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[must_use]
    pub fn complexity(&self) -> u64 {
        self.complexity
    }

    #[must_use]
    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    /// Look up a single constraint value.
    #[must_use]
    pub fn constraint(&self, key: &str) -> Option<&Value> {
        self.constraints.get(key)
    }

    #[must_use]
    pub fn methods(&self) -> &BTreeSet<String> {
        &self.methods
    }

    #[must_use]
    pub fn dependencies(&self) -> &BTreeSet<TypeId> {
        &self.dependencies
    }

    /// Check whether the constraints carry a semantic tag.
    ///
    /// A tag is present when it is a constraint key whose value is not
    /// `false`/`null`, a string constraint value, or a string inside an
    /// array constraint value. Matching is exact: `"immutable"` never
    /// matches `"mutable"`.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.constraints.iter().any(|(key, value)| {
            (key == tag && !matches!(value, Value::Bool(false) | Value::Null))
                || value_carries_tag(value, tag)
        })
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}: {})", self.id, self.name, self.category)
    }
}

// =============================================================================
// TYPE DEFINITION (registration request)
// =============================================================================

fn default_complexity() -> u64 {
    1
}

/// Everything needed to register a type.
///
/// Used both for caller registrations and for the built-in types listed
/// in a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDefinition {
    /// Explicit id. Auto-generated when absent.
    #[serde(default)]
    pub id: Option<TypeId>,
    pub name: String,
    pub category: TypeCategory,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default = "default_complexity")]
    pub complexity: u64,
    #[serde(default)]
    pub constraints: Constraints,
    #[serde(default)]
    pub methods: BTreeSet<String>,
    #[serde(default)]
    pub dependencies: BTreeSet<TypeId>,
}

impl TypeDefinition {
    /// Start a definition with defaults: empty description, size 0, complexity 1.
    #[must_use]
    pub fn new(name: impl Into<String>, category: TypeCategory) -> Self {
        Self {
            id: None,
            name: name.into(),
            category,
            description: String::new(),
            size: 0,
            complexity: default_complexity(),
            constraints: Constraints::new(),
            methods: BTreeSet::new(),
            dependencies: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<TypeId>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    #[must_use]
    pub fn complexity(mut self, complexity: u64) -> Self {
        self.complexity = complexity;
        self
    }

    #[must_use]
    pub fn constraint(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.constraints.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.methods.insert(method.into());
        self
    }

    #[must_use]
    pub fn methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.methods.extend(methods.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn depends_on(mut self, dependency: impl Into<TypeId>) -> Self {
        self.dependencies.insert(dependency.into());
        self
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors returned by the type engine.
///
/// - No silent failures
/// - Composition rule violations are NOT errors; they are embedded in the
///   returned `TypeComposition` (see `ValidationError`)
#[derive(Debug, Error)]
pub enum TypeSystemError {
    /// The requested type id is not registered.
    #[error("Type not found: {0}")]
    NotFound(TypeId),

    /// A registration referenced a dependency that does not resolve.
    #[error("Type '{type_name}' depends on unknown type {dependency}")]
    DependencyNotFound {
        type_name: String,
        dependency: TypeId,
    },

    /// An explicit id collides with an existing type.
    #[error("Duplicate type id: {0}")]
    DuplicateId(TypeId),

    /// The definition itself is malformed.
    #[error("Invalid type definition: {0}")]
    InvalidDefinition(String),

    /// `compose` was called without inputs.
    #[error("Cannot compose an empty type list")]
    EmptyComposition,

    /// `compose` was called with too many inputs.
    #[error("Composition arity {count} exceeds maximum {max}")]
    ArityExceeded { count: usize, max: usize },

    /// A fractal expansion exceeded its tier.
    #[error(transparent)]
    FractalConstraintViolation(#[from] FractalViolation),

    /// The profile could not be loaded.
    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred (driver layer only).
    #[error("I/O error: {0}")]
    IoError(String),
}

/// Why a composition was rejected by its rule.
///
/// Carried inside `TypeComposition`; never returned as `Err`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationError {
    #[error("Unknown composition rule: {rule}")]
    UnknownRule { rule: String },

    #[error("Type {type_id} ({type_name}) not allowed in {rule}")]
    TypeNotAllowed {
        type_id: TypeId,
        type_name: String,
        rule: String,
    },

    #[error("Category {category} of type {type_id} not allowed in {rule}")]
    CategoryNotAllowed {
        type_id: TypeId,
        category: TypeCategory,
        rule: String,
    },

    #[error("Total complexity {total} exceeds limit {budget}")]
    ComplexityBudgetExceeded { total: u64, budget: u64 },
}

/// A fractal expansion that does not fit its tier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Fractal constraint violation in tier '{tier}': {reason}")]
pub struct FractalViolation {
    pub tier: String,
    pub reason: String,
}

/// Errors raised while loading or validating a profile.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProfileError {
    #[error("Cannot parse profile: {0}")]
    Parse(String),

    #[error("Unsupported profile version {found} (this build supports up to {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("Duplicate composition rule: {0}")]
    DuplicateRule(String),

    #[error("Duplicate fractal tier: {0}")]
    DuplicateTier(String),

    #[error("{context} references unknown rule '{rule}'")]
    UnknownRule { context: String, rule: String },

    #[error("Rule '{rule}' has invalid complexity multiplier {value}")]
    InvalidMultiplier { rule: String, value: f64 },
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tagged(constraints: Constraints) -> Type {
        let mut def = TypeDefinition::new("t", TypeCategory::System);
        def.constraints = constraints;
        Type::from_definition(TypeId::new("t"), def)
    }

    #[test]
    fn id_sequence_is_monotonic() {
        let seq = IdSequence::new("comp");
        assert_eq!(seq.next_id(), "comp_1");
        assert_eq!(seq.next_id(), "comp_2");
        assert_eq!(seq.peek(), 3);
    }

    #[test]
    fn category_parses_case_insensitively() {
        assert_eq!(
            "Quantum".parse::<TypeCategory>().expect("parse"),
            TypeCategory::Quantum
        );
        assert!("plasma".parse::<TypeCategory>().is_err());
    }

    #[test]
    fn tag_from_key_value_and_array() {
        let by_key = tagged([("read-only".to_string(), json!(true))].into());
        let by_value = tagged([("access".to_string(), json!("read-only"))].into());
        let by_array = tagged([("modes".to_string(), json!(["x", "read-only"]))].into());
        let disabled = tagged([("read-only".to_string(), json!(false))].into());

        assert!(by_key.has_tag("read-only"));
        assert!(by_value.has_tag("read-only"));
        assert!(by_array.has_tag("read-only"));
        assert!(!disabled.has_tag("read-only"));
    }

    #[test]
    fn tag_matching_is_exact() {
        let immutable = tagged([("state".to_string(), json!("immutable"))].into());
        assert!(immutable.has_tag("immutable"));
        assert!(!immutable.has_tag("mutable"));
    }

    #[test]
    fn definition_builder_defaults() {
        let def = TypeDefinition::new("x", TypeCategory::Primitive);
        assert_eq!(def.complexity, 1);
        assert_eq!(def.size, 0);
        assert!(def.id.is_none());
    }

    #[test]
    fn validation_error_message_cites_type_id() {
        let err = ValidationError::TypeNotAllowed {
            type_id: TypeId::new("type_qubit"),
            type_name: "qubit".to_string(),
            rule: "numeric_operations".to_string(),
        };
        assert!(err.to_string().contains("type_qubit"));
    }
}
