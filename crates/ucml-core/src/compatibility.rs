//! # Compatibility Checker
//!
//! Grades how well two types combine for an operation. First match wins:
//!
//! | Level | Condition |
//! |-------|-----------|
//! | Exact | same id |
//! | Compatible | a rule allows the operation and explicitly lists both types |
//! | Compatible | same category |
//! | Convertible | a primitive conversion exists in either direction |
//! | Incompatible | otherwise |
//!
//! The check is a pure function of the rule table and the two records.

use crate::config::CompositionRule;
use crate::primitives::{BOOL_TYPE, STRING_TYPE, is_integer_name, is_numeric_name};
use crate::types::Type;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of a compatibility check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompatibilityLevel {
    Exact,
    Compatible,
    Convertible,
    Incompatible,
}

impl CompatibilityLevel {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CompatibilityLevel::Exact => "exact",
            CompatibilityLevel::Compatible => "compatible",
            CompatibilityLevel::Convertible => "convertible",
            CompatibilityLevel::Incompatible => "incompatible",
        }
    }
}

impl fmt::Display for CompatibilityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Checks pairwise compatibility against a rule table.
#[derive(Debug, Clone, Copy)]
pub struct CompatibilityChecker<'a> {
    rules: &'a [CompositionRule],
}

impl<'a> CompatibilityChecker<'a> {
    #[must_use]
    pub fn new(rules: &'a [CompositionRule]) -> Self {
        Self { rules }
    }

    /// Grade `a` against `b` for `operation`.
    #[must_use]
    pub fn check(&self, a: &Type, b: &Type, operation: &str) -> CompatibilityLevel {
        if a.id() == b.id() {
            return CompatibilityLevel::Exact;
        }

        let shared_rule = self.rules.iter().any(|rule| {
            rule.allows_operation(operation) && rule.lists_type(a) && rule.lists_type(b)
        });
        if shared_rule || a.category() == b.category() {
            return CompatibilityLevel::Compatible;
        }

        if converts(a.name(), b.name()) || converts(b.name(), a.name()) {
            return CompatibilityLevel::Convertible;
        }

        CompatibilityLevel::Incompatible
    }
}

/// Built-in primitive conversions: numeric to numeric, numeric to string,
/// integer to bool.
fn converts(from: &str, to: &str) -> bool {
    if !is_numeric_name(from) {
        return false;
    }
    is_numeric_name(to) || to == STRING_TYPE || (to == BOOL_TYPE && is_integer_name(from))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Profile;
    use crate::types::{TypeCategory, TypeDefinition, TypeId};

    fn ty(id: &str, name: &str, category: TypeCategory) -> Type {
        Type::from_definition(TypeId::new(id), TypeDefinition::new(name, category))
    }

    fn rules() -> Vec<CompositionRule> {
        Profile::default_profile().expect("profile").rules
    }

    #[test]
    fn same_id_is_exact() {
        let rules = rules();
        let checker = CompatibilityChecker::new(&rules);
        let qubit = ty("type_qubit", "qubit", TypeCategory::Quantum);
        assert_eq!(
            checker.check(&qubit, &qubit, "anything"),
            CompatibilityLevel::Exact
        );
    }

    #[test]
    fn shared_rule_listing_is_compatible() {
        let rules = rules();
        let checker = CompatibilityChecker::new(&rules);
        let agent = ty("type_agent", "agent", TypeCategory::Agent);
        let resource = ty("type_resource", "resource", TypeCategory::System);

        assert_eq!(
            checker.check(&agent, &resource, "compose"),
            CompatibilityLevel::Compatible
        );
    }

    #[test]
    fn unrestricted_rule_lists_nothing() {
        let rules = rules();
        let checker = CompatibilityChecker::new(&rules);
        let qubit = ty("type_qubit", "qubit", TypeCategory::Quantum);
        let agent = ty("type_agent", "agent", TypeCategory::Agent);

        assert_eq!(
            checker.check(&qubit, &agent, "compose"),
            CompatibilityLevel::Incompatible
        );
    }

    #[test]
    fn same_category_is_compatible() {
        let checker = CompatibilityChecker::new(&[]);
        let a = ty("a", "a", TypeCategory::Function);
        let b = ty("b", "b", TypeCategory::Function);
        assert_eq!(checker.check(&a, &b, "x"), CompatibilityLevel::Compatible);
    }

    #[test]
    fn conversions_in_either_direction() {
        let checker = CompatibilityChecker::new(&[]);
        let int8 = ty("i", "int8", TypeCategory::Primitive);
        let float = ty("f", "float32", TypeCategory::Composite);
        let text = ty("s", "string", TypeCategory::System);
        let flag = ty("b", "bool", TypeCategory::Agent);

        assert_eq!(checker.check(&int8, &float, "x"), CompatibilityLevel::Convertible);
        assert_eq!(checker.check(&text, &int8, "x"), CompatibilityLevel::Convertible);
        assert_eq!(checker.check(&flag, &int8, "x"), CompatibilityLevel::Convertible);
        assert_eq!(checker.check(&float, &flag, "x"), CompatibilityLevel::Incompatible);
    }
}
