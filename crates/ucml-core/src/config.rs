//! # Profile Configuration
//!
//! A profile is the versioned configuration bundle the engine boots from:
//! built-in types, composition rules, the automatic rule-selection table
//! and the fractal tiers. Profiles are TOML documents; the default profile
//! is embedded in the binary.
//!
//! Everything here is read-only once the `TypeSystem` is constructed.

use crate::primitives::{BUILTIN_ID_PREFIX, DEFAULT_COMPLEXITY_BUDGET, PROFILE_VERSION};
use crate::types::{ProfileError, Type, TypeCategory, TypeDefinition, TypeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The profile shipped with the crate.
pub const DEFAULT_PROFILE: &str = include_str!("../profiles/default.toml");

fn default_budget() -> u64 {
    DEFAULT_COMPLEXITY_BUDGET
}

fn default_multiplier() -> f64 {
    1.0
}

// =============================================================================
// COMPOSITION RULES
// =============================================================================

/// How a rule names the type it produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultPolicy {
    /// `composed_{name}` of the most complex input (first one on ties).
    AutoInfer,
    /// A fixed output name.
    FixedName(String),
    /// `composite_{rule}`.
    GenericComposite,
}

/// A named policy constraining which types may combine and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionRule {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Empty means any category.
    #[serde(default)]
    pub allowed_categories: BTreeSet<TypeCategory>,
    /// Type ids or names. Empty means any type.
    #[serde(default)]
    pub allowed_types: Vec<String>,
    #[serde(default)]
    pub operations: BTreeSet<String>,
    pub result: ResultPolicy,
    #[serde(default = "default_multiplier")]
    pub complexity_multiplier: f64,
}

impl CompositionRule {
    /// Whether the category passes the rule's category filter.
    #[must_use]
    pub fn admits_category(&self, category: TypeCategory) -> bool {
        self.allowed_categories.is_empty() || self.allowed_categories.contains(&category)
    }

    /// Whether the type passes the rule's type whitelist.
    #[must_use]
    pub fn admits_type(&self, ty: &Type) -> bool {
        self.allowed_types.is_empty() || self.lists_type(ty)
    }

    /// Whether the type passes both filters.
    #[must_use]
    pub fn admits(&self, ty: &Type) -> bool {
        self.admits_category(ty.category()) && self.admits_type(ty)
    }

    /// Whether the whitelist names the type explicitly (by id or name).
    ///
    /// An empty whitelist lists nothing.
    #[must_use]
    pub fn lists_type(&self, ty: &Type) -> bool {
        self.allowed_types
            .iter()
            .any(|entry| entry == ty.id().as_str() || entry == ty.name())
    }

    #[must_use]
    pub fn allows_operation(&self, operation: &str) -> bool {
        self.operations.contains(operation)
    }
}

// =============================================================================
// RULE SELECTION
// =============================================================================

/// Predicate applied to the inputs of an `"auto"` composition.
///
/// Every mode reads the named rule's own category/type lists, so the
/// selection table can never drift from the rule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// Every input passes the rule's category and type filters.
    AllAdmitted,
    /// At least one input passes both filters.
    AnyAdmitted,
    /// At least one input has an allowed category.
    AnyCategory,
}

/// One row of the ordered selection table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionEntry {
    pub rule: String,
    pub when: SelectionMode,
}

// =============================================================================
// FRACTAL TIERS
// =============================================================================

/// Bounds for one tier of hierarchical expansion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FractalTier {
    pub name: String,
    #[serde(default)]
    pub label: String,
    /// Inclusive upper bound on expanded size, in bytes.
    pub max_expansion: u64,
    /// Inclusive upper bound on complexity.
    pub complexity_limit: u64,
    /// Inclusive upper bound on nesting depth.
    pub depth_limit: u32,
    /// Inclusive upper bound on memory, in bytes.
    pub memory_ceiling: u64,
}

// =============================================================================
// PROFILE
// =============================================================================

/// The full configuration bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub version: u32,
    #[serde(default = "default_budget")]
    pub complexity_budget: u64,
    #[serde(default)]
    pub types: Vec<TypeDefinition>,
    #[serde(default)]
    pub rules: Vec<CompositionRule>,
    #[serde(default)]
    pub selection: Vec<SelectionEntry>,
    pub default_rule: String,
    #[serde(default)]
    pub tiers: Vec<FractalTier>,
}

impl Profile {
    /// Parse and validate a TOML profile.
    pub fn from_toml_str(source: &str) -> Result<Self, ProfileError> {
        let profile: Profile =
            toml::from_str(source).map_err(|e| ProfileError::Parse(e.to_string()))?;
        profile.validate()?;
        Ok(profile)
    }

    /// The embedded default profile.
    pub fn default_profile() -> Result<Self, ProfileError> {
        Self::from_toml_str(DEFAULT_PROFILE)
    }

    /// Check version, uniqueness and cross references.
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.version == 0 || self.version > PROFILE_VERSION {
            return Err(ProfileError::UnsupportedVersion {
                found: self.version,
                supported: PROFILE_VERSION,
            });
        }

        let mut rule_names = BTreeSet::new();
        for rule in &self.rules {
            if !rule_names.insert(rule.name.as_str()) {
                return Err(ProfileError::DuplicateRule(rule.name.clone()));
            }
            let m = rule.complexity_multiplier;
            if !m.is_finite() || m < 0.0 {
                return Err(ProfileError::InvalidMultiplier {
                    rule: rule.name.clone(),
                    value: m,
                });
            }
        }

        for entry in &self.selection {
            if !rule_names.contains(entry.rule.as_str()) {
                return Err(ProfileError::UnknownRule {
                    context: "selection table".to_string(),
                    rule: entry.rule.clone(),
                });
            }
        }
        if !rule_names.contains(self.default_rule.as_str()) {
            return Err(ProfileError::UnknownRule {
                context: "default_rule".to_string(),
                rule: self.default_rule.clone(),
            });
        }

        let mut tier_names = BTreeSet::new();
        for tier in &self.tiers {
            if !tier_names.insert(tier.name.as_str()) {
                return Err(ProfileError::DuplicateTier(tier.name.clone()));
            }
        }

        Ok(())
    }

    /// Built-in definitions with their ids resolved (`type_{name}` by default).
    #[must_use]
    pub fn builtin_definitions(&self) -> Vec<TypeDefinition> {
        self.types
            .iter()
            .cloned()
            .map(|mut def| {
                if def.id.is_none() {
                    def.id = Some(TypeId::new(format!("{}{}", BUILTIN_ID_PREFIX, def.name)));
                }
                def
            })
            .collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================
