//! # Type Inference
//!
//! Derives a `Type` from a raw value.
//!
//! - Scalars resolve to the registered built-in primitives
//! - Sequences, empty sequences and unknown values synthesize NEW records
//!   on every call; there is no structural caching

use crate::primitives::{
    BOOL_TYPE, BUILTIN_ID_PREFIX, BYTES_TYPE, INFERRED_FLOAT_TYPE, INTEGER_TYPES,
    MAX_INFERENCE_DEPTH, MAX_NAME_LENGTH, STRING_TYPE,
};
use crate::registry::TypeRegistry;
use crate::types::{Type, TypeCategory, TypeDefinition, TypeId, TypeSystemError};
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::debug;

/// A raw value handed to the inferencer.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Bool(bool),
    /// Wide enough for every JSON integer.
    Int(i128),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Sequence(Vec<Datum>),
    /// Anything else, labelled by its kind (`"null"`, `"object"`, ...).
    Other(String),
}

impl Datum {
    /// Short kind label, logged with each synthesized inference.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Datum::Bool(_) => "bool",
            Datum::Int(_) => "int",
            Datum::Float(_) => "float",
            Datum::Text(_) => "text",
            Datum::Bytes(_) => "bytes",
            Datum::Sequence(_) => "sequence",
            Datum::Other(kind) => kind,
        }
    }
}

impl From<Value> for Datum {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Datum::Other("null".to_string()),
            Value::Bool(b) => Datum::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Datum::Int(i128::from(i))
                } else if let Some(u) = n.as_u64() {
                    Datum::Int(i128::from(u))
                } else {
                    Datum::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => Datum::Text(s),
            Value::Array(items) => Datum::Sequence(items.into_iter().map(Datum::from).collect()),
            Value::Object(_) => Datum::Other("object".to_string()),
        }
    }
}

impl From<bool> for Datum {
    fn from(b: bool) -> Self {
        Datum::Bool(b)
    }
}

impl From<i64> for Datum {
    fn from(i: i64) -> Self {
        Datum::Int(i128::from(i))
    }
}

impl From<i32> for Datum {
    fn from(i: i32) -> Self {
        Datum::Int(i128::from(i))
    }
}

impl From<f64> for Datum {
    fn from(f: f64) -> Self {
        Datum::Float(f)
    }
}

impl From<&str> for Datum {
    fn from(s: &str) -> Self {
        Datum::Text(s.to_string())
    }
}

impl From<String> for Datum {
    fn from(s: String) -> Self {
        Datum::Text(s)
    }
}

impl From<Vec<u8>> for Datum {
    fn from(bytes: Vec<u8>) -> Self {
        Datum::Bytes(bytes)
    }
}

/// Narrowest integer primitive that holds `value`.
fn integer_width(value: i128) -> &'static str {
    let [int8, int16, int32, int64] = INTEGER_TYPES;
    if i8::try_from(value).is_ok() {
        int8
    } else if i16::try_from(value).is_ok() {
        int16
    } else if i32::try_from(value).is_ok() {
        int32
    } else {
        int64
    }
}

/// Cut `s` to at most `max` bytes on a char boundary.
fn bounded(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// `array_{element}`, cut to the name limit. Identity lives in the id and
/// the `element_type` constraint, not in the name.
fn array_name(element: &str) -> String {
    let name = format!("{}{}", ARRAY_PREFIX, element);
    bounded(&name, MAX_NAME_LENGTH).to_string()
}

const ARRAY_PREFIX: &str = "array_";
const UNKNOWN_PREFIX: &str = "unknown_";

/// The parts of an element type an enclosing array is derived from.
struct Element {
    id: TypeId,
    name: String,
    size: u64,
    complexity: u64,
}

impl Element {
    fn of(ty: &Type) -> Self {
        Self {
            id: ty.id().clone(),
            name: ty.name().to_string(),
            size: ty.size(),
            complexity: ty.complexity(),
        }
    }
}

/// Definitions waiting to be registered as one group.
struct Staging<'a> {
    registry: &'a mut TypeRegistry,
    reserved: BTreeSet<TypeId>,
    definitions: Vec<TypeDefinition>,
}

impl Staging<'_> {
    fn stage(&mut self, definition: TypeDefinition) -> Element {
        let id = self.registry.generate_id(&definition.name, &self.reserved);
        self.reserved.insert(id.clone());
        let element = Element {
            id: id.clone(),
            name: definition.name.clone(),
            size: definition.size,
            complexity: definition.complexity,
        };
        self.definitions.push(definition.with_id(id));
        element
    }
}

/// The TypeInferencer maps raw values onto types.
pub struct TypeInferencer;

impl TypeInferencer {
    /// Infer the type of a value.
    ///
    /// Sequence and unknown values register new types in `registry`: one per
    /// nesting level, all in a single atomic group. Nesting is followed
    /// through first elements, without recursion, up to
    /// `MAX_INFERENCE_DEPTH` levels (the JSON parser's own limit).
    /// Returns `NotFound` if a needed built-in primitive is missing.
    pub fn infer(registry: &mut TypeRegistry, datum: &Datum) -> Result<Type, TypeSystemError> {
        // Outermost first.
        let mut lengths: Vec<u64> = Vec::new();
        let mut leaf = datum;
        while let Datum::Sequence(items) = leaf {
            let Some(first) = items.first() else {
                break;
            };
            if lengths.len() == MAX_INFERENCE_DEPTH {
                return Err(TypeSystemError::InvalidDefinition(format!(
                    "Sequence nesting deeper than {} levels",
                    MAX_INFERENCE_DEPTH
                )));
            }
            lengths.push(items.len() as u64);
            leaf = first;
        }

        let builtin = match leaf {
            Datum::Bool(_) => Some(Self::builtin(registry, BOOL_TYPE)?),
            Datum::Int(i) => Some(Self::builtin(registry, integer_width(*i))?),
            Datum::Float(_) => Some(Self::builtin(registry, INFERRED_FLOAT_TYPE)?),
            Datum::Text(_) => Some(Self::builtin(registry, STRING_TYPE)?),
            Datum::Bytes(_) => Some(Self::builtin(registry, BYTES_TYPE)?),
            Datum::Sequence(_) | Datum::Other(_) => None,
        };
        if lengths.is_empty() {
            if let Some(ty) = builtin {
                return Ok(ty);
            }
        }

        let mut staging = Staging {
            registry,
            reserved: BTreeSet::new(),
            definitions: Vec::with_capacity(lengths.len() + 1),
        };

        let mut element = match (&builtin, leaf) {
            (Some(ty), _) => Element::of(ty),
            (None, Datum::Other(kind)) => {
                let kind = bounded(kind, MAX_NAME_LENGTH - UNKNOWN_PREFIX.len());
                let name = format!("{}{}", UNKNOWN_PREFIX, kind);
                staging.stage(
                    TypeDefinition::new(name, TypeCategory::Primitive)
                        .description(format!("Unknown type: {}", kind))
                        .constraint("unknown", true),
                )
            }
            (None, _) => staging.stage(
                TypeDefinition::new("empty_array", TypeCategory::Composite)
                    .description("Empty array")
                    .constraint("length", 0)
                    .method("length"),
            ),
        };

        for &length in lengths.iter().rev() {
            element = staging.stage(
                TypeDefinition::new(array_name(&element.name), TypeCategory::Composite)
                    .description(format!("Array of {}", element.name))
                    .size(length.saturating_mul(element.size))
                    .complexity(element.complexity.saturating_add(1))
                    .constraint("length", length)
                    .constraint("element_type", element.id.as_str())
                    .methods(["get", "set", "length"])
                    .depends_on(element.id.clone()),
            );
        }

        let Staging {
            registry,
            definitions,
            ..
        } = staging;
        let outermost = registry
            .register_group(definitions)?
            .pop()
            .ok_or_else(|| TypeSystemError::InvalidDefinition("Nothing to infer".to_string()))?;

        debug!(
            kind = datum.kind(),
            levels = lengths.len(),
            type_id = %outermost.id(),
            "synthesized inferred type"
        );
        Ok(outermost)
    }

    /// Resolve a built-in primitive by its `type_{name}` id, then by name.
    fn builtin(registry: &TypeRegistry, name: &str) -> Result<Type, TypeSystemError> {
        let id = TypeId::new(format!("{}{}", BUILTIN_ID_PREFIX, name));
        match registry.get(&id) {
            Ok(ty) => Ok(ty.clone()),
            Err(_) => registry
                .find_by_name(name)
                .cloned()
                .ok_or(TypeSystemError::NotFound(id)),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
