//! # ucml-core
//!
//! The semantic type and composition engine for UCML symbolic units.
//!
//! This crate keeps a registry of typed units, infers types from raw values,
//! grades pairwise compatibility, composes several types into one under a
//! named rule, flags paradoxes among the inputs of a composition and bounds
//! hierarchical ("fractal") expansion.
//!
//! ## Architectural Constraints
//!
//! - Pure, synchronous and in-memory: no async, no network, no file I/O
//! - Deterministic: ordered collections and counter-based ids
//! - Configured by a versioned profile (built-in types, rules, tiers)
//! - Rule violations and paradoxes are returned as data, never as panics

// =============================================================================
// MODULES
// =============================================================================

pub mod compatibility;
pub mod composition;
pub mod config;
pub mod export;
pub mod fractal;
pub mod inference;
pub mod paradox;
pub mod primitives;
pub mod registry;
pub mod system;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Constraints, FractalViolation, IdSequence, ProfileError, Type, TypeCategory, TypeDefinition,
    TypeId, TypeSystemError, ValidationError,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use compatibility::{CompatibilityChecker, CompatibilityLevel};
pub use composition::{
    CompositionEngine, CompositionStage, EngineCounters, RuleBook, TypeComposition,
    complexity_score,
};
pub use fractal::{FractalConstraintValidator, FractalVerdict};
pub use inference::{Datum, TypeInferencer};
pub use paradox::{
    ParadoxDetector, ParadoxKind, ParadoxPattern, ParadoxReport, Severity, paradox_patterns,
};
pub use registry::TypeRegistry;
pub use system::{SharedTypeSystem, TypeSystem, TypeSystemStatus};

// =============================================================================
// RE-EXPORTS: Configuration & Export
// =============================================================================

pub use config::{
    CompositionRule, DEFAULT_PROFILE, FractalTier, Profile, ResultPolicy, SelectionEntry,
    SelectionMode,
};
pub use export::{
    CanonicalHeader, CanonicalSnapshot, TypeSystemSnapshot, canonical_checksum,
    export_canonical, import_canonical, verify_canonical,
};
