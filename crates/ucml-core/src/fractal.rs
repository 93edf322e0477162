//! # Fractal Constraint Validator
//!
//! Bounds hierarchical expansion per tier. All bounds are inclusive and the
//! checks short-circuit in this order:
//!
//! 1. tier exists (looked up by name, then by label)
//! 2. complexity <= complexity limit
//! 3. estimated size <= max expansion
//! 4. estimated size <= memory ceiling
//! 5. depth <= depth limit (nested validation only)

use crate::config::FractalTier;
use crate::types::FractalViolation;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Outcome of a fractal expansion check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FractalVerdict {
    pub tier: String,
    pub valid: bool,
    pub reason: String,
}

impl FractalVerdict {
    fn pass(tier: &str) -> Self {
        Self {
            tier: tier.to_string(),
            valid: true,
            reason: "Fractal expansion validated successfully".to_string(),
        }
    }

    fn fail(tier: &str, reason: String) -> Self {
        Self {
            tier: tier.to_string(),
            valid: false,
            reason,
        }
    }
}

/// Validates expansions against a read-only tier table.
#[derive(Debug, Clone, Default)]
pub struct FractalConstraintValidator {
    tiers: Vec<FractalTier>,
}

impl FractalConstraintValidator {
    #[must_use]
    pub fn new(tiers: Vec<FractalTier>) -> Self {
        Self { tiers }
    }

    /// The tier table in profile order.
    #[must_use]
    pub fn tiers(&self) -> &[FractalTier] {
        &self.tiers
    }

    /// Find a tier by name or label.
    #[must_use]
    pub fn tier(&self, name: &str) -> Option<&FractalTier> {
        self.tiers
            .iter()
            .find(|t| t.name == name)
            .or_else(|| self.tiers.iter().find(|t| !t.label.is_empty() && t.label == name))
    }

    /// Check complexity and estimated size against a tier.
    #[must_use]
    pub fn validate(&self, tier: &str, complexity: u64, estimated_size: u64) -> FractalVerdict {
        let Some(bounds) = self.tier(tier) else {
            return FractalVerdict::fail(tier, format!("Unknown fractal tier: {}", tier));
        };

        let verdict = if complexity > bounds.complexity_limit {
            FractalVerdict::fail(
                tier,
                format!(
                    "Complexity {} exceeds limit {}",
                    complexity, bounds.complexity_limit
                ),
            )
        } else if estimated_size > bounds.max_expansion {
            FractalVerdict::fail(
                tier,
                format!(
                    "Estimated size {} exceeds limit {}",
                    estimated_size, bounds.max_expansion
                ),
            )
        } else if estimated_size > bounds.memory_ceiling {
            FractalVerdict::fail(
                tier,
                format!(
                    "Estimated size {} exceeds memory limit {}",
                    estimated_size, bounds.memory_ceiling
                ),
            )
        } else {
            FractalVerdict::pass(tier)
        };

        debug!(tier, complexity, estimated_size, valid = verdict.valid, "fractal check");
        verdict
    }

    /// Same as `validate`, with a nesting depth check last.
    #[must_use]
    pub fn validate_nested(
        &self,
        tier: &str,
        complexity: u64,
        estimated_size: u64,
        depth: u32,
    ) -> FractalVerdict {
        let verdict = self.validate(tier, complexity, estimated_size);
        if !verdict.valid {
            return verdict;
        }
        match self.tier(tier) {
            Some(bounds) if depth > bounds.depth_limit => FractalVerdict::fail(
                tier,
                format!("Depth {} exceeds limit {}", depth, bounds.depth_limit),
            ),
            _ => verdict,
        }
    }

    /// Like `validate_nested` but as a `Result`, for callers that treat an
    /// oversized expansion as an error.
    pub fn enforce(
        &self,
        tier: &str,
        complexity: u64,
        estimated_size: u64,
        depth: u32,
    ) -> Result<(), FractalViolation> {
        let verdict = self.validate_nested(tier, complexity, estimated_size, depth);
        if verdict.valid {
            Ok(())
        } else {
            Err(FractalViolation {
                tier: verdict.tier,
                reason: verdict.reason,
            })
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
