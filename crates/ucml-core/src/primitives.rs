//! # Innate Primitives
//!
//! Hardcoded runtime constants for the UCML type engine.
//!
//! The engine starts from a profile (built-in types, rules, tiers) but the
//! limits and well-known names below are compiled into the binary and are
//! immutable at runtime.
//!
//! ## Primitives
//!
//! 1. **Well-known type names**: the primitives that inference and the
//!    conversion lattice refer to by name.
//! 2. **Bounds**: every registration and composition is computationally bounded.
//! 3. **Format markers**: magic bytes and versions for profiles and snapshots.

// =============================================================================
// WELL-KNOWN TYPE NAMES
// =============================================================================

/// Boolean primitive.
pub const BOOL_TYPE: &str = "bool";

/// UTF-8 string primitive.
pub const STRING_TYPE: &str = "string";

/// Raw byte primitive.
pub const BYTES_TYPE: &str = "bytes";

/// Signed integer primitives, narrowest first.
///
/// Inference walks this list in order and picks the first width covering the value.
pub const INTEGER_TYPES: [&str; 4] = ["int8", "int16", "int32", "int64"];

/// Floating point primitives.
pub const FLOAT_TYPES: [&str; 2] = ["float32", "float64"];

/// The float primitive chosen for inferred floating point values.
pub const INFERRED_FLOAT_TYPE: &str = "float64";

/// Prefix of the ids given to built-in types that do not declare one.
pub const BUILTIN_ID_PREFIX: &str = "type_";

/// Prefix of auto-generated ids for caller-registered types.
pub const CUSTOM_ID_PREFIX: &str = "custom_";

/// Operation used when the paradox detector checks pairwise compatibility.
pub const COMPOSE_OPERATION: &str = "compose";

/// Rule name that triggers automatic rule selection.
pub const AUTO_RULE: &str = "auto";

// =============================================================================
// BOUNDS
// =============================================================================

/// Default budget for the summed complexity of a composition's inputs.
///
/// Profiles may override this with `complexity_budget`.
pub const DEFAULT_COMPLEXITY_BUDGET: u64 = 100;

/// Maximum number of inputs accepted by a single composition.
///
/// Pairwise checks are quadratic in the arity; this keeps them bounded.
pub const MAX_COMPOSITION_ARITY: usize = 64;

/// Maximum length for type names.
pub const MAX_NAME_LENGTH: usize = 256;

/// Maximum length for type descriptions.
pub const MAX_DESCRIPTION_LENGTH: usize = 4096;

/// Maximum number of definitions accepted in one group registration.
pub const MAX_GROUP_SIZE: usize = 1024;

/// Deepest sequence nesting inference follows.
///
/// Matches the recursion limit of the JSON parser, so parsed input never
/// hits it. Stays below `MAX_GROUP_SIZE`.
pub const MAX_INFERENCE_DEPTH: usize = 128;

// =============================================================================
// FORMAT MARKERS
// =============================================================================

/// Highest profile format version this build understands.
pub const PROFILE_VERSION: u32 = 1;

/// Magic bytes for the canonical snapshot format.
pub const SNAPSHOT_MAGIC: [u8; 4] = *b"UCTS";

/// Current canonical snapshot format version.
pub const SNAPSHOT_VERSION: u8 = 1;

/// Returns `true` if `name` is one of the integer primitives.
#[must_use]
pub fn is_integer_name(name: &str) -> bool {
    INTEGER_TYPES.contains(&name)
}

/// Returns `true` if `name` is one of the integer or float primitives.
#[must_use]
pub fn is_numeric_name(name: &str) -> bool {
    is_integer_name(name) || FLOAT_TYPES.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_widths_are_ordered() {
        assert_eq!(INTEGER_TYPES, ["int8", "int16", "int32", "int64"]);
    }

    #[test]
    fn numeric_names() {
        assert!(is_numeric_name("int8"));
        assert!(is_numeric_name("float32"));
        assert!(!is_numeric_name("bool"));
        assert!(!is_integer_name("float64"));
    }

    #[test]
    fn snapshot_magic_correct() {
        assert_eq!(&SNAPSHOT_MAGIC, b"UCTS");
    }
}
