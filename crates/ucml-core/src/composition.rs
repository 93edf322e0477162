//! # Composition Engine
//!
//! Combines several registered types into one synthesized type under a
//! named rule.
//!
//! ## Pipeline
//!
//! | Stage | Meaning |
//! |-------|---------|
//! | Input | inputs resolved from the registry |
//! | RuleSelected | explicit rule taken, or `"auto"` resolved via the selection table |
//! | Validated / Invalid | rule whitelist, category filter and complexity budget |
//! | ParadoxScanned | paradox checks, always run |
//! | OutputSynthesized | terminal, composite output built |
//! | ErrorTypeReturned | terminal, `composition_error` output returned |
//!
//! A rejected composition is still a successful return value: the rejection
//! is carried as a `ValidationError` inside the `TypeComposition`.
//! Only empty input, excessive arity and unknown input ids are `Err`.

use crate::config::{CompositionRule, Profile, ResultPolicy, SelectionEntry, SelectionMode};
use crate::paradox::{ParadoxDetector, ParadoxReport};
use crate::primitives::{AUTO_RULE, MAX_COMPOSITION_ARITY};
use crate::registry::TypeRegistry;
use crate::types::{
    IdSequence, Type, TypeCategory, TypeDefinition, TypeId, TypeSystemError, ValidationError,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, warn};

// =============================================================================
// PIPELINE STAGES
// =============================================================================

/// Stages of a single composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositionStage {
    Input,
    RuleSelected,
    Validated,
    Invalid,
    ParadoxScanned,
    OutputSynthesized,
    ErrorTypeReturned,
}

impl CompositionStage {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            CompositionStage::Input => "input",
            CompositionStage::RuleSelected => "rule_selected",
            CompositionStage::Validated => "validated",
            CompositionStage::Invalid => "invalid",
            CompositionStage::ParadoxScanned => "paradox_scanned",
            CompositionStage::OutputSynthesized => "output_synthesized",
            CompositionStage::ErrorTypeReturned => "error_type_returned",
        }
    }

    /// Stages that may directly follow this one.
    #[must_use]
    pub fn successors(&self) -> &'static [CompositionStage] {
        match self {
            CompositionStage::Input => &[CompositionStage::RuleSelected],
            CompositionStage::RuleSelected => {
                &[CompositionStage::Validated, CompositionStage::Invalid]
            }
            CompositionStage::Validated | CompositionStage::Invalid => {
                &[CompositionStage::ParadoxScanned]
            }
            CompositionStage::ParadoxScanned => &[
                CompositionStage::OutputSynthesized,
                CompositionStage::ErrorTypeReturned,
            ],
            CompositionStage::OutputSynthesized | CompositionStage::ErrorTypeReturned => &[],
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.successors().is_empty()
    }
}

impl fmt::Display for CompositionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Records stage transitions for one composition.
struct StageTrace<'a> {
    composition: &'a str,
    stages: Vec<CompositionStage>,
}

impl<'a> StageTrace<'a> {
    fn start(composition: &'a str) -> Self {
        debug!(composition, stage = %CompositionStage::Input, "composition stage");
        Self {
            composition,
            stages: vec![CompositionStage::Input],
        }
    }

    fn advance(&mut self, stage: CompositionStage) {
        if let Some(previous) = self.stages.last() {
            if !previous.successors().contains(&stage) {
                warn!(composition = self.composition, from = %previous, to = %stage, "unexpected stage transition");
            }
        }
        debug!(composition = self.composition, stage = %stage, "composition stage");
        self.stages.push(stage);
    }

    fn finish(self) -> Vec<CompositionStage> {
        self.stages
    }
}

// =============================================================================
// RULE BOOK
// =============================================================================

/// Read-only rule table with the automatic selection order and budget.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleBook {
    rules: Vec<CompositionRule>,
    selection: Vec<SelectionEntry>,
    default_rule: String,
    complexity_budget: u64,
}

impl RuleBook {
    /// Take the rule-related parts of a profile.
    #[must_use]
    pub fn from_profile(profile: &Profile) -> Self {
        Self {
            rules: profile.rules.clone(),
            selection: profile.selection.clone(),
            default_rule: profile.default_rule.clone(),
            complexity_budget: profile.complexity_budget,
        }
    }

    #[must_use]
    pub fn rules(&self) -> &[CompositionRule] {
        &self.rules
    }

    #[must_use]
    pub fn selection(&self) -> &[SelectionEntry] {
        &self.selection
    }

    #[must_use]
    pub fn default_rule(&self) -> &str {
        &self.default_rule
    }

    #[must_use]
    pub fn complexity_budget(&self) -> u64 {
        self.complexity_budget
    }

    #[must_use]
    pub fn rule(&self, name: &str) -> Option<&CompositionRule> {
        self.rules.iter().find(|r| r.name == name)
    }

    /// Pick a rule for `"auto"`: first matching selection entry, else the default.
    #[must_use]
    pub fn select(&self, inputs: &[&Type]) -> &str {
        for entry in &self.selection {
            let Some(rule) = self.rule(&entry.rule) else {
                continue;
            };
            let matched = match entry.when {
                SelectionMode::AllAdmitted => inputs.iter().all(|t| rule.admits(t)),
                SelectionMode::AnyAdmitted => inputs.iter().any(|t| rule.admits(t)),
                SelectionMode::AnyCategory => {
                    inputs.iter().any(|t| rule.admits_category(t.category()))
                }
            };
            if matched {
                return &rule.name;
            }
        }
        &self.default_rule
    }

    /// Check inputs against a rule: type whitelist, then category, then budget.
    pub fn validate(
        &self,
        inputs: &[&Type],
        rule_name: &str,
    ) -> Result<&CompositionRule, ValidationError> {
        let rule = self
            .rule(rule_name)
            .ok_or_else(|| ValidationError::UnknownRule {
                rule: rule_name.to_string(),
            })?;

        if let Some(ty) = inputs.iter().find(|t| !rule.admits_type(t)) {
            return Err(ValidationError::TypeNotAllowed {
                type_id: ty.id().clone(),
                type_name: ty.name().to_string(),
                rule: rule.name.clone(),
            });
        }

        if let Some(ty) = inputs.iter().find(|t| !rule.admits_category(t.category())) {
            return Err(ValidationError::CategoryNotAllowed {
                type_id: ty.id().clone(),
                category: ty.category(),
                rule: rule.name.clone(),
            });
        }

        let total = total_complexity(inputs);
        if total > self.complexity_budget {
            return Err(ValidationError::ComplexityBudgetExceeded {
                total,
                budget: self.complexity_budget,
            });
        }

        Ok(rule)
    }
}

fn total_complexity(inputs: &[&Type]) -> u64 {
    inputs
        .iter()
        .fold(0u64, |acc, t| acc.saturating_add(t.complexity()))
}

fn total_size(inputs: &[&Type]) -> u64 {
    inputs.iter().fold(0u64, |acc, t| acc.saturating_add(t.size()))
}

fn dependency_union(inputs: &[&Type]) -> BTreeSet<TypeId> {
    inputs
        .iter()
        .flat_map(|t| t.dependencies().iter().cloned())
        .collect()
}

/// `Σcomplexity × multiplier + log2(max(Σsize, 1)) × 0.1 + distinct deps × 0.2`,
/// rounded to two decimals.
#[must_use]
pub fn complexity_score(inputs: &[&Type], multiplier: f64) -> f64 {
    let size = total_size(inputs).max(1) as f64;
    let raw = total_complexity(inputs) as f64 * multiplier
        + size.log2() * 0.1
        + dependency_union(inputs).len() as f64 * 0.2;
    (raw * 100.0).round() / 100.0
}

// =============================================================================
// COMPOSITION RESULT
// =============================================================================

/// The record of one composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeComposition {
    pub id: String,
    pub inputs: Vec<TypeId>,
    /// Synthesized type, or a `composition_error` type when invalid.
    pub output: Type,
    pub rule: String,
    pub validation_passed: bool,
    pub validation_error: Option<ValidationError>,
    pub paradoxes: Vec<ParadoxReport>,
    pub complexity_score: f64,
    pub stages: Vec<CompositionStage>,
}

impl TypeComposition {
    /// The output type if validation passed, the rejection otherwise.
    pub fn result(&self) -> Result<&Type, &ValidationError> {
        match &self.validation_error {
            None => Ok(&self.output),
            Some(error) => Err(error),
        }
    }

    /// Ids of the attached paradox reports.
    pub fn paradox_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.paradoxes.iter().map(|p| p.id.as_str())
    }

    #[must_use]
    pub fn has_paradoxes(&self) -> bool {
        !self.paradoxes.is_empty()
    }
}

// =============================================================================
// ENGINE
// =============================================================================

/// Next values of the engine's id sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineCounters {
    pub compositions: u64,
    pub outputs: u64,
    pub errors: u64,
    pub paradoxes: u64,
}

impl Default for EngineCounters {
    fn default() -> Self {
        Self {
            compositions: 1,
            outputs: 1,
            errors: 1,
            paradoxes: 1,
        }
    }
}

/// Runs the composition pipeline. Holds no registry; callers pass one in.
#[derive(Debug)]
pub struct CompositionEngine {
    book: RuleBook,
    detector: ParadoxDetector,
    compositions: IdSequence,
    outputs: IdSequence,
    errors: IdSequence,
}

impl CompositionEngine {
    #[must_use]
    pub fn new(book: RuleBook) -> Self {
        Self::with_counters(book, EngineCounters::default())
    }

    /// Resume id sequences (used when restoring a snapshot).
    #[must_use]
    pub fn with_counters(book: RuleBook, counters: EngineCounters) -> Self {
        Self {
            book,
            detector: ParadoxDetector::starting_at(counters.paradoxes),
            compositions: IdSequence::starting_at("comp", counters.compositions),
            outputs: IdSequence::starting_at("composed", counters.outputs),
            errors: IdSequence::starting_at("composition_error", counters.errors),
        }
    }

    #[must_use]
    pub fn counters(&self) -> EngineCounters {
        EngineCounters {
            compositions: self.compositions.peek(),
            outputs: self.outputs.peek(),
            errors: self.errors.peek(),
            paradoxes: self.detector.next_sequence(),
        }
    }

    #[must_use]
    pub fn rule_book(&self) -> &RuleBook {
        &self.book
    }

    #[must_use]
    pub fn detector(&self) -> &ParadoxDetector {
        &self.detector
    }

    /// Compose registered types under `rule_name` (`"auto"` selects one).
    ///
    /// The output is not registered; adopt it explicitly to compose further.
    pub fn compose(
        &self,
        registry: &TypeRegistry,
        input_ids: &[TypeId],
        rule_name: &str,
    ) -> Result<TypeComposition, TypeSystemError> {
        if input_ids.is_empty() {
            return Err(TypeSystemError::EmptyComposition);
        }
        if input_ids.len() > MAX_COMPOSITION_ARITY {
            return Err(TypeSystemError::ArityExceeded {
                count: input_ids.len(),
                max: MAX_COMPOSITION_ARITY,
            });
        }

        let inputs = input_ids
            .iter()
            .map(|id| registry.get(id))
            .collect::<Result<Vec<&Type>, _>>()?;

        let id = self.compositions.next_id();
        let mut trace = StageTrace::start(&id);

        let rule_name = if rule_name == AUTO_RULE {
            self.book.select(&inputs)
        } else {
            rule_name
        };
        trace.advance(CompositionStage::RuleSelected);

        let validation = self.book.validate(&inputs, rule_name);
        trace.advance(if validation.is_ok() {
            CompositionStage::Validated
        } else {
            CompositionStage::Invalid
        });

        let paradoxes = self.detector.detect(self.book.rules(), &inputs, rule_name);
        trace.advance(CompositionStage::ParadoxScanned);

        let multiplier = self
            .book
            .rule(rule_name)
            .map(|r| r.complexity_multiplier)
            .unwrap_or(1.0);
        let score = complexity_score(&inputs, multiplier);

        let (output, validation_error) = match validation {
            Ok(rule) => {
                trace.advance(CompositionStage::OutputSynthesized);
                (self.synthesize(registry, &inputs, rule), None)
            }
            Err(error) => {
                trace.advance(CompositionStage::ErrorTypeReturned);
                (self.error_type(registry, &error), Some(error))
            }
        };

        debug!(
            composition = %id,
            rule = rule_name,
            valid = validation_error.is_none(),
            paradoxes = paradoxes.len(),
            output = %output.id(),
            "composition finished"
        );

        Ok(TypeComposition {
            inputs: input_ids.to_vec(),
            output,
            rule: rule_name.to_string(),
            validation_passed: validation_error.is_none(),
            validation_error,
            paradoxes,
            complexity_score: score,
            stages: trace.finish(),
            id,
        })
    }

    fn synthesize(
        &self,
        registry: &TypeRegistry,
        inputs: &[&Type],
        rule: &CompositionRule,
    ) -> Type {
        let name = match &rule.result {
            ResultPolicy::AutoInfer => format!(
                "composed_{}",
                dominant(inputs).map(Type::name).unwrap_or("composite")
            ),
            ResultPolicy::FixedName(name) => name.clone(),
            ResultPolicy::GenericComposite => format!("composite_{}", rule.name),
        };
        let input_names: Vec<&str> = inputs.iter().map(|t| t.name()).collect();
        let complexity =
            (total_complexity(inputs) as f64 * rule.complexity_multiplier).round() as u64;

        let mut definition = TypeDefinition::new(name, TypeCategory::Composite)
            .description(format!(
                "Composition of {} using {}",
                input_names.join(", "),
                rule.name
            ))
            .size(total_size(inputs))
            .complexity(complexity)
            .constraint("composition_rule", rule.name.as_str())
            .constraint("input_count", inputs.len() as u64)
            .methods(inputs.iter().flat_map(|t| t.methods().iter().cloned()));
        definition.dependencies = dependency_union(inputs);

        Type::from_definition(unregistered_id(&self.outputs, registry), definition)
    }

    fn error_type(&self, registry: &TypeRegistry, error: &ValidationError) -> Type {
        let reason = error.to_string();
        let definition = TypeDefinition::new("composition_error", TypeCategory::System)
            .description(format!("Composition error: {}", reason))
            .constraint("error", true)
            .constraint("reason", reason);

        Type::from_definition(unregistered_id(&self.errors, registry), definition)
    }
}

/// Next id of `sequence` not already held by the registry, so an output can
/// always be adopted.
fn unregistered_id(sequence: &IdSequence, registry: &TypeRegistry) -> TypeId {
    loop {
        let id = TypeId::new(sequence.next_id());
        if !registry.contains(&id) {
            return id;
        }
    }
}

/// First input with the highest complexity.
fn dominant<'a>(inputs: &[&'a Type]) -> Option<&'a Type> {
    inputs.iter().copied().fold(None, |best, ty| match best {
        Some(b) if b.complexity() >= ty.complexity() => Some(b),
        _ => Some(ty),
    })
}

// =============================================================================
// TESTS
// =============================================================================
