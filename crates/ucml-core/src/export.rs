//! # Canonical Export Module
//!
//! Full-state snapshots of a type system and their bit-exact binary form.
//!
//! - `TypeSystemSnapshot` is the serde-friendly state (used for JSON export)
//! - `export_canonical` writes a deterministic `postcard` stream
//! - `import_canonical` validates header, limits, counts and checksum before
//!   handing back a snapshot
//!
//! Constraint values are stored as canonical JSON text in the binary form;
//! `postcard` cannot decode self-describing values.

use crate::composition::EngineCounters;
use crate::config::{CompositionRule, FractalTier, ResultPolicy, SelectionEntry};
use crate::primitives::{SNAPSHOT_MAGIC, SNAPSHOT_VERSION};
use crate::types::{Constraints, Type, TypeCategory, TypeDefinition, TypeId, TypeSystemError};
use serde::{Deserialize, Serialize};

/// Maximum type count accepted by `import_canonical`.
pub const MAX_IMPORT_TYPE_COUNT: u64 = 1_000_000;

/// Maximum rule count accepted by `import_canonical`.
pub const MAX_IMPORT_RULE_COUNT: u64 = 10_000;

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Everything needed to rebuild a `TypeSystem`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeSystemSnapshot {
    pub profile_version: u32,
    pub complexity_budget: u64,
    pub default_rule: String,
    /// Registration order.
    pub types: Vec<Type>,
    pub rules: Vec<CompositionRule>,
    pub selection: Vec<SelectionEntry>,
    pub tiers: Vec<FractalTier>,
    /// Custom id counter of the registry.
    pub registry_counter: u64,
    pub counters: EngineCounters,
}

// =============================================================================
// CANONICAL FORMAT
// =============================================================================

/// Header for canonical snapshot files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CanonicalHeader {
    pub magic: [u8; 4],
    pub version: u8,
    pub type_count: u64,
    pub rule_count: u64,
    /// Checksum of the data section. Not cryptographic.
    pub checksum: u64,
}

impl CanonicalHeader {
    #[must_use]
    pub fn new(type_count: u64, rule_count: u64, checksum: u64) -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: SNAPSHOT_VERSION,
            type_count,
            rule_count,
            checksum,
        }
    }

    /// Reject foreign or newer files.
    pub fn validate(&self) -> Result<(), TypeSystemError> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(TypeSystemError::SerializationError(
                "Invalid file format".to_string(),
            ));
        }
        if self.version != SNAPSHOT_VERSION {
            return Err(TypeSystemError::SerializationError(
                "Unsupported file version".to_string(),
            ));
        }
        Ok(())
    }
}

/// A type in canonical form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CanonicalType {
    pub id: String,
    pub category: TypeCategory,
    pub name: String,
    pub description: String,
    pub size: u64,
    pub complexity: u64,
    /// (key, JSON text), sorted by key.
    pub constraints: Vec<(String, String)>,
    pub methods: Vec<String>,
    pub dependencies: Vec<String>,
}

impl CanonicalType {
    fn from_type(ty: &Type) -> Result<Self, TypeSystemError> {
        let constraints = ty
            .constraints()
            .iter()
            .map(|(key, value)| {
                serde_json::to_string(value)
                    .map(|text| (key.clone(), text))
                    .map_err(|e| TypeSystemError::SerializationError(format!("Constraint: {}", e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id: ty.id().to_string(),
            category: ty.category(),
            name: ty.name().to_string(),
            description: ty.description().to_string(),
            size: ty.size(),
            complexity: ty.complexity(),
            constraints,
            methods: ty.methods().iter().cloned().collect(),
            dependencies: ty.dependencies().iter().map(TypeId::to_string).collect(),
        })
    }

    fn into_type(self) -> Result<Type, TypeSystemError> {
        let mut constraints = Constraints::new();
        for (key, text) in self.constraints {
            let value = serde_json::from_str(&text)
                .map_err(|e| TypeSystemError::SerializationError(format!("Constraint: {}", e)))?;
            constraints.insert(key, value);
        }

        let mut definition = TypeDefinition::new(self.name, self.category)
            .description(self.description)
            .size(self.size)
            .complexity(self.complexity)
            .methods(self.methods);
        definition.constraints = constraints;
        definition.dependencies = self.dependencies.into_iter().map(TypeId::new).collect();

        Ok(Type::from_definition(TypeId::new(self.id), definition))
    }
}

/// A snapshot in canonical form for bit-exact serialization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CanonicalSnapshot {
    pub profile_version: u32,
    pub complexity_budget: u64,
    pub default_rule: String,
    /// Registration order.
    pub types: Vec<CanonicalType>,
    pub rules: Vec<CompositionRule>,
    pub selection: Vec<SelectionEntry>,
    pub tiers: Vec<FractalTier>,
    pub registry_counter: u64,
    pub counters: EngineCounters,
}

impl CanonicalSnapshot {
    pub fn from_snapshot(snapshot: &TypeSystemSnapshot) -> Result<Self, TypeSystemError> {
        let types = snapshot
            .types
            .iter()
            .map(CanonicalType::from_type)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            profile_version: snapshot.profile_version,
            complexity_budget: snapshot.complexity_budget,
            default_rule: snapshot.default_rule.clone(),
            types,
            rules: snapshot.rules.clone(),
            selection: snapshot.selection.clone(),
            tiers: snapshot.tiers.clone(),
            registry_counter: snapshot.registry_counter,
            counters: snapshot.counters,
        })
    }

    pub fn into_snapshot(self) -> Result<TypeSystemSnapshot, TypeSystemError> {
        let types = self
            .types
            .into_iter()
            .map(CanonicalType::into_type)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TypeSystemSnapshot {
            profile_version: self.profile_version,
            complexity_budget: self.complexity_budget,
            default_rule: self.default_rule,
            types,
            rules: self.rules,
            selection: self.selection,
            tiers: self.tiers,
            registry_counter: self.registry_counter,
            counters: self.counters,
        })
    }

    /// Deterministic, order-sensitive checksum (FNV-1a over every field).
    ///
    /// Detects accidental corruption only; it is not a cryptographic hash.
    #[must_use]
    pub fn checksum(&self) -> u64 {
        let mut h = Fnv::new();

        h.u64(u64::from(self.profile_version));
        h.u64(self.complexity_budget);
        h.str(&self.default_rule);

        for ty in &self.types {
            h.str(&ty.id);
            h.str(ty.category.as_str());
            h.str(&ty.name);
            h.str(&ty.description);
            h.u64(ty.size);
            h.u64(ty.complexity);
            for (key, text) in &ty.constraints {
                h.str(key);
                h.str(text);
            }
            for method in &ty.methods {
                h.str(method);
            }
            for dep in &ty.dependencies {
                h.str(dep);
            }
        }

        for rule in &self.rules {
            h.str(&rule.name);
            h.str(&rule.description);
            for category in &rule.allowed_categories {
                h.str(category.as_str());
            }
            for entry in &rule.allowed_types {
                h.str(entry);
            }
            for op in &rule.operations {
                h.str(op);
            }
            match &rule.result {
                ResultPolicy::AutoInfer => h.str("auto_infer"),
                ResultPolicy::FixedName(name) => {
                    h.str("fixed_name");
                    h.str(name);
                }
                ResultPolicy::GenericComposite => h.str("generic_composite"),
            }
            h.u64(rule.complexity_multiplier.to_bits());
        }

        for entry in &self.selection {
            h.str(&entry.rule);
            h.u64(entry.when as u64);
        }

        for tier in &self.tiers {
            h.str(&tier.name);
            h.str(&tier.label);
            h.u64(tier.max_expansion);
            h.u64(tier.complexity_limit);
            h.u64(u64::from(tier.depth_limit));
            h.u64(tier.memory_ceiling);
        }

        h.u64(self.registry_counter);
        h.u64(self.counters.compositions);
        h.u64(self.counters.outputs);
        h.u64(self.counters.errors);
        h.u64(self.counters.paradoxes);

        h.finish()
    }
}

struct Fnv(u64);

impl Fnv {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    fn new() -> Self {
        Self(Self::OFFSET)
    }

    fn bytes(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.0 ^= u64::from(*byte);
            self.0 = self.0.wrapping_mul(Self::PRIME);
        }
    }

    /// Length-prefixed so adjacent fields cannot alias.
    fn str(&mut self, s: &str) {
        self.u64(s.len() as u64);
        self.bytes(s.as_bytes());
    }

    fn u64(&mut self, n: u64) {
        self.bytes(&n.to_le_bytes());
    }

    fn finish(&self) -> u64 {
        self.0
    }
}

// =============================================================================
// EXPORT FUNCTIONS
// =============================================================================

/// Export a snapshot to canonical postcard format.
///
/// Format:
/// ```text
/// [header_len: u32 LE] [CanonicalHeader (postcard)] [CanonicalSnapshot (postcard)]
/// ```
pub fn export_canonical(snapshot: &TypeSystemSnapshot) -> Result<Vec<u8>, TypeSystemError> {
    let canonical = CanonicalSnapshot::from_snapshot(snapshot)?;
    let header = CanonicalHeader::new(
        canonical.types.len() as u64,
        canonical.rules.len() as u64,
        canonical.checksum(),
    );

    let header_bytes = postcard::to_allocvec(&header)
        .map_err(|e| TypeSystemError::SerializationError(format!("Header: {}", e)))?;
    let data_bytes = postcard::to_allocvec(&canonical)
        .map_err(|e| TypeSystemError::SerializationError(format!("Data: {}", e)))?;

    let mut result = Vec::with_capacity(4 + header_bytes.len() + data_bytes.len());
    result.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
    result.extend_from_slice(&header_bytes);
    result.extend_from_slice(&data_bytes);

    Ok(result)
}

/// Import a snapshot from canonical postcard format.
pub fn import_canonical(data: &[u8]) -> Result<TypeSystemSnapshot, TypeSystemError> {
    let Some((len_bytes, rest)) = data.split_first_chunk::<4>() else {
        return Err(TypeSystemError::SerializationError(
            "Data too short".to_string(),
        ));
    };
    let header_len = u32::from_le_bytes(*len_bytes) as usize;
    if rest.len() < header_len {
        return Err(TypeSystemError::SerializationError(
            "Data too short for header".to_string(),
        ));
    }
    let (header_bytes, data_bytes) = rest.split_at(header_len);

    let header: CanonicalHeader = postcard::from_bytes(header_bytes)
        .map_err(|e| TypeSystemError::SerializationError(format!("Header: {}", e)))?;
    header.validate()?;

    if header.type_count > MAX_IMPORT_TYPE_COUNT {
        return Err(TypeSystemError::SerializationError(format!(
            "Type count {} exceeds maximum allowed {}",
            header.type_count, MAX_IMPORT_TYPE_COUNT
        )));
    }
    if header.rule_count > MAX_IMPORT_RULE_COUNT {
        return Err(TypeSystemError::SerializationError(format!(
            "Rule count {} exceeds maximum allowed {}",
            header.rule_count, MAX_IMPORT_RULE_COUNT
        )));
    }

    let canonical: CanonicalSnapshot = postcard::from_bytes(data_bytes)
        .map_err(|e| TypeSystemError::SerializationError(format!("Data: {}", e)))?;

    let computed = canonical.checksum();
    if computed != header.checksum {
        return Err(TypeSystemError::SerializationError(format!(
            "Checksum mismatch: expected {}, got {}",
            header.checksum, computed
        )));
    }
    if canonical.types.len() as u64 != header.type_count {
        return Err(TypeSystemError::SerializationError(
            "Type count mismatch".to_string(),
        ));
    }
    if canonical.rules.len() as u64 != header.rule_count {
        return Err(TypeSystemError::SerializationError(
            "Rule count mismatch".to_string(),
        ));
    }

    canonical.into_snapshot()
}

/// Check that `canonical_data` decodes to exactly `snapshot`.
pub fn verify_canonical(
    snapshot: &TypeSystemSnapshot,
    canonical_data: &[u8],
) -> Result<bool, TypeSystemError> {
    let imported = import_canonical(canonical_data)?;
    Ok(CanonicalSnapshot::from_snapshot(snapshot)? == CanonicalSnapshot::from_snapshot(&imported)?)
}

/// Canonical checksum of a snapshot.
pub fn canonical_checksum(snapshot: &TypeSystemSnapshot) -> Result<u64, TypeSystemError> {
    Ok(CanonicalSnapshot::from_snapshot(snapshot)?.checksum())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::TypeSystem;
    use serde_json::json;

    fn populated() -> TypeSystem {
        let mut system = TypeSystem::with_default_profile().expect("system");
        system
            .register_type(
                TypeDefinition::new("sensor", TypeCategory::System)
                    .constraint("access", "read-only")
                    .constraint("range", json!({"min": 0, "max": 10}))
                    .depends_on("type_float32"),
            )
            .expect("register");
        system
    }

    #[test]
    fn export_import_round_trip() {
        let snapshot = populated().snapshot();
        let bytes = export_canonical(&snapshot).expect("export");
        let imported = import_canonical(&bytes).expect("import");

        assert_eq!(imported, snapshot);
        assert!(verify_canonical(&snapshot, &bytes).expect("verify"));
    }

    #[test]
    fn export_is_deterministic() {
        let snapshot = populated().snapshot();
        let a = export_canonical(&snapshot).expect("a");
        let b = export_canonical(&snapshot).expect("b");
        assert_eq!(a, b);
    }

    #[test]
    fn checksum_changes_with_content() {
        let system = populated();
        let before = canonical_checksum(&system.snapshot()).expect("before");

        let mut other = populated();
        other
            .register_type(TypeDefinition::new("extra", TypeCategory::Agent))
            .expect("register");
        let after = canonical_checksum(&other.snapshot()).expect("after");

        assert_ne!(before, after);
    }

    #[test]
    fn tampered_data_rejected() {
        let snapshot = populated().snapshot();
        let mut bytes = export_canonical(&snapshot).expect("export");
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;

        assert!(import_canonical(&bytes).is_err());
    }

    #[test]
    fn wrong_magic_rejected() {
        let snapshot = populated().snapshot();
        let mut bytes = export_canonical(&snapshot).expect("export");
        bytes[4] = b'X';

        assert!(matches!(
            import_canonical(&bytes),
            Err(TypeSystemError::SerializationError(_))
        ));
    }

    #[test]
    fn truncated_data_rejected() {
        assert!(import_canonical(&[1, 0]).is_err());
        assert!(import_canonical(&[200, 0, 0, 0, 1]).is_err());
    }
}
