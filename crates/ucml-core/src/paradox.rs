//! # Paradox Detection
//!
//! Flags structural and semantic contradictions among the inputs of a
//! composition. Detection is advisory: reports are attached to the
//! composition and never abort it.
//!
//! ## Checks
//!
//! - Type mismatch: every unordered input pair graded `Incompatible` for `compose`
//! - Circular dependency: iterative DFS over the input-restricted dependency
//!   graph; the first cycle found is reported
//! - Semantic contradiction: antagonist tags and conflicting `access` values
//!
//! Severity, confidence and resolution hints come from the static pattern
//! catalog (`ParadoxKind::pattern`).

use crate::compatibility::{CompatibilityChecker, CompatibilityLevel};
use crate::config::CompositionRule;
use crate::fractal::FractalVerdict;
use crate::primitives::COMPOSE_OPERATION;
use crate::types::{IdSequence, Type, TypeId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Tag pairs that cannot coexist in one composition.
pub const ANTAGONIST_TAGS: [(&str, &str); 2] =
    [("read-only", "write-only"), ("immutable", "mutable")];

/// Constraint key compared across inputs for conflicting access patterns.
pub const ACCESS_KEY: &str = "access";

// =============================================================================
// CATALOG
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParadoxKind {
    TypeMismatch,
    CircularDependency,
    SemanticContradiction,
    CompositionViolation,
    FractalOverflow,
}

impl ParadoxKind {
    pub const ALL: [ParadoxKind; 5] = [
        ParadoxKind::TypeMismatch,
        ParadoxKind::CircularDependency,
        ParadoxKind::SemanticContradiction,
        ParadoxKind::CompositionViolation,
        ParadoxKind::FractalOverflow,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ParadoxKind::TypeMismatch => "type_mismatch",
            ParadoxKind::CircularDependency => "circular_dependency",
            ParadoxKind::SemanticContradiction => "semantic_contradiction",
            ParadoxKind::CompositionViolation => "composition_violation",
            ParadoxKind::FractalOverflow => "fractal_overflow",
        }
    }

    /// Catalog entry for this kind.
    #[must_use]
    pub fn pattern(&self) -> ParadoxPattern {
        match self {
            ParadoxKind::TypeMismatch => ParadoxPattern {
                kind: *self,
                description: "Type incompatibility in composition",
                severity: Severity::High,
                confidence: 0.9,
                detection: "type_check",
                resolution: "type_conversion",
                examples: &["int + string", "bool * float"],
            },
            ParadoxKind::CircularDependency => ParadoxPattern {
                kind: *self,
                description: "Circular type references",
                severity: Severity::Critical,
                confidence: 0.95,
                detection: "dependency_cycle",
                resolution: "dependency_breaking",
                examples: &["A depends on B, B depends on A"],
            },
            ParadoxKind::SemanticContradiction => ParadoxPattern {
                kind: *self,
                description: "Meaning conflicts in composition",
                severity: Severity::Medium,
                confidence: 0.8,
                detection: "semantic_analysis",
                resolution: "semantic_resolution",
                examples: &["read-only + write-only"],
            },
            ParadoxKind::CompositionViolation => ParadoxPattern {
                kind: *self,
                description: "Invalid composition patterns",
                severity: Severity::High,
                confidence: 0.85,
                detection: "rule_validation",
                resolution: "composition_correction",
                examples: &["incompatible operation types"],
            },
            ParadoxKind::FractalOverflow => ParadoxPattern {
                kind: *self,
                description: "Fractal expansion too large",
                severity: Severity::Critical,
                confidence: 1.0,
                detection: "size_validation",
                resolution: "size_limiting",
                examples: &["27-byte glyph expands to >10MB"],
            },
        }
    }
}

impl fmt::Display for ParadoxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static description of a paradox kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParadoxPattern {
    pub kind: ParadoxKind,
    pub description: &'static str,
    pub severity: Severity,
    pub confidence: f64,
    pub detection: &'static str,
    pub resolution: &'static str,
    pub examples: &'static [&'static str],
}

/// The full catalog, in kind order.
#[must_use]
pub fn paradox_patterns() -> Vec<ParadoxPattern> {
    ParadoxKind::ALL.iter().map(ParadoxKind::pattern).collect()
}

// =============================================================================
// REPORT
// =============================================================================

/// One detected contradiction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParadoxReport {
    pub id: String,
    pub kind: ParadoxKind,
    pub severity: Severity,
    pub description: String,
    pub affected: Vec<TypeId>,
    /// Advisory resolution hint; nothing acts on it.
    pub resolution: String,
    pub resolved: bool,
    pub confidence: f64,
}

impl ParadoxReport {
    fn from_pattern(
        id: String,
        kind: ParadoxKind,
        description: String,
        affected: Vec<TypeId>,
    ) -> Self {
        let pattern = kind.pattern();
        Self {
            id,
            kind,
            severity: pattern.severity,
            description,
            affected,
            resolution: pattern.resolution.to_string(),
            resolved: false,
            confidence: pattern.confidence,
        }
    }

    /// Record that the caller dealt with this paradox.
    pub fn mark_resolved(&mut self) {
        self.resolved = true;
    }
}

// =============================================================================
// DETECTOR
// =============================================================================

/// Runs every paradox check and numbers the reports.
#[derive(Debug)]
pub struct ParadoxDetector {
    ids: IdSequence,
}

impl Default for ParadoxDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ParadoxDetector {
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Resume numbering at `seed` (used when restoring a snapshot).
    #[must_use]
    pub fn starting_at(seed: u64) -> Self {
        Self {
            ids: IdSequence::starting_at("paradox", seed),
        }
    }

    /// Next report number.
    #[must_use]
    pub fn next_sequence(&self) -> u64 {
        self.ids.peek()
    }

    /// Run all checks over `inputs`.
    #[must_use]
    pub fn detect(
        &self,
        rules: &[CompositionRule],
        inputs: &[&Type],
        rule_name: &str,
    ) -> Vec<ParadoxReport> {
        let mut reports = Vec::new();
        self.detect_mismatches(&CompatibilityChecker::new(rules), inputs, &mut reports);

        if let Some(cycle) = find_cycle(inputs) {
            let first = cycle.first().map(TypeId::to_string).unwrap_or_default();
            reports.push(self.report(
                ParadoxKind::CircularDependency,
                format!("Circular dependency involving {}", first),
                cycle,
            ));
        }

        self.detect_contradictions(inputs, &mut reports);

        debug!(rule = rule_name, found = reports.len(), "paradox scan");
        reports
    }

    /// Build a `FractalOverflow` report for a failed verdict.
    #[must_use]
    pub fn overflow_report(&self, verdict: &FractalVerdict) -> Option<ParadoxReport> {
        if verdict.valid {
            return None;
        }
        Some(self.report(
            ParadoxKind::FractalOverflow,
            format!("Fractal overflow in {}: {}", verdict.tier, verdict.reason),
            Vec::new(),
        ))
    }

    fn report(&self, kind: ParadoxKind, description: String, affected: Vec<TypeId>) -> ParadoxReport {
        ParadoxReport::from_pattern(self.ids.next_id(), kind, description, affected)
    }

    fn detect_mismatches(
        &self,
        checker: &CompatibilityChecker<'_>,
        inputs: &[&Type],
        reports: &mut Vec<ParadoxReport>,
    ) {
        for (i, a) in inputs.iter().enumerate() {
            for b in &inputs[i + 1..] {
                if checker.check(a, b, COMPOSE_OPERATION) == CompatibilityLevel::Incompatible {
                    reports.push(self.report(
                        ParadoxKind::TypeMismatch,
                        format!(
                            "Type mismatch: {} and {} are incompatible",
                            a.name(),
                            b.name()
                        ),
                        vec![a.id().clone(), b.id().clone()],
                    ));
                }
            }
        }
    }

    fn detect_contradictions(&self, inputs: &[&Type], reports: &mut Vec<ParadoxReport>) {
        for (i, a) in inputs.iter().enumerate() {
            for b in &inputs[i + 1..] {
                if a.id() == b.id() {
                    continue;
                }
                let affected = || vec![a.id().clone(), b.id().clone()];

                for (x, y) in ANTAGONIST_TAGS {
                    if (a.has_tag(x) && b.has_tag(y)) || (a.has_tag(y) && b.has_tag(x)) {
                        reports.push(self.report(
                            ParadoxKind::SemanticContradiction,
                            format!(
                                "{} and {} types cannot be composed: {} vs {}",
                                x,
                                y,
                                a.id(),
                                b.id()
                            ),
                            affected(),
                        ));
                    }
                }

                if let (Some(va), Some(vb)) = (a.constraint(ACCESS_KEY), b.constraint(ACCESS_KEY))
                {
                    if va != vb && !is_antagonist_pair(va, vb) {
                        reports.push(self.report(
                            ParadoxKind::SemanticContradiction,
                            format!("Conflicting access patterns: {} vs {}", va, vb),
                            affected(),
                        ));
                    }
                }
            }
        }
    }
}

/// Whether two access values are already covered by an antagonist tag pair.
fn is_antagonist_pair(a: &Value, b: &Value) -> bool {
    let (Some(a), Some(b)) = (a.as_str(), b.as_str()) else {
        return false;
    };
    ANTAGONIST_TAGS
        .iter()
        .any(|&(x, y)| (a == x && b == y) || (a == y && b == x))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// First dependency cycle among the inputs, starting at the node the back
/// edge returns to. Self-edges are ignored.
fn find_cycle(inputs: &[&Type]) -> Option<Vec<TypeId>> {
    let mut graph: BTreeMap<&TypeId, Vec<&TypeId>> = BTreeMap::new();
    let mut nodes: Vec<&TypeId> = Vec::new();
    for ty in inputs {
        if !graph.contains_key(ty.id()) {
            nodes.push(ty.id());
            graph.insert(ty.id(), Vec::new());
        }
    }
    for ty in inputs {
        let edges: Vec<&TypeId> = ty
            .dependencies()
            .iter()
            .filter(|dep| *dep != ty.id() && graph.contains_key(dep))
            .collect();
        if let Some(slot) = graph.get_mut(ty.id()) {
            for dep in edges {
                if !slot.contains(&dep) {
                    slot.push(dep);
                }
            }
        }
    }

    let mut marks: BTreeMap<&TypeId, Mark> = BTreeMap::new();
    for &root in &nodes {
        if marks.contains_key(root) {
            continue;
        }
        marks.insert(root, Mark::InProgress);
        let mut stack: Vec<(&TypeId, usize)> = vec![(root, 0)];

        while let Some(&(node, cursor)) = stack.last() {
            let next = graph.get(node).and_then(|edges| edges.get(cursor)).copied();
            match next {
                Some(neighbor) => {
                    if let Some(top) = stack.last_mut() {
                        top.1 += 1;
                    }
                    match marks.get(neighbor) {
                        Some(Mark::InProgress) => {
                            let start = stack
                                .iter()
                                .position(|(n, _)| *n == neighbor)
                                .unwrap_or(0);
                            return Some(stack[start..].iter().map(|(n, _)| (*n).clone()).collect());
                        }
                        Some(Mark::Done) => {}
                        None => {
                            marks.insert(neighbor, Mark::InProgress);
                            stack.push((neighbor, 0));
                        }
                    }
                }
                None => {
                    marks.insert(node, Mark::Done);
                    stack.pop();
                }
            }
        }
    }
    None
}

// =============================================================================
// TESTS
// =============================================================================
