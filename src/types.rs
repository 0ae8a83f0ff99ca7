//! Structural type algebra.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Leaf scalar kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Primitive {
    String,
    Number,
    Bool,
}

impl Primitive {
    pub fn name(&self) -> &'static str {
        match self {
            Primitive::String => "string",
            Primitive::Number => "number",
            Primitive::Bool => "bool",
        }
    }
}

/// A closed structural type.
///
/// Equality is structural: two `Object` types are equal when they declare the
/// same attribute names with equal types. There is no fixpoint variant, so a
/// self-referencing schema can only ever be approximated to a bounded depth.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Type {
    Primitive(Primitive),
    /// Homogeneous ordered sequence.
    List(Box<Type>),
    /// Homogeneous collection of values unique by value.
    Set(Box<Type>),
    /// Fixed-arity heterogeneous sequence. A tuple with exactly one element
    /// type is a *templated* tuple: its arity comes from the value it is
    /// matched against.
    Tuple(Vec<Type>),
    /// String-keyed collection with one value type.
    Map(Box<Type>),
    /// Closed set of named attributes, each with its own type.
    Object(BTreeMap<String, Type>),
    /// Open type: any payload shape is acceptable.
    Dynamic,
}

impl Type {
    pub const STRING: Type = Type::Primitive(Primitive::String);
    pub const NUMBER: Type = Type::Primitive(Primitive::Number);
    pub const BOOL: Type = Type::Primitive(Primitive::Bool);

    pub fn list(element: Type) -> Self {
        Type::List(Box::new(element))
    }

    pub fn set(element: Type) -> Self {
        Type::Set(Box::new(element))
    }

    pub fn map(element: Type) -> Self {
        Type::Map(Box::new(element))
    }

    pub fn tuple(elements: impl IntoIterator<Item = Type>) -> Self {
        Type::Tuple(elements.into_iter().collect())
    }

    /// Build an object type from `(name, type)` pairs.
    pub fn object<K: Into<String>>(attributes: impl IntoIterator<Item = (K, Type)>) -> Self {
        Type::Object(
            attributes
                .into_iter()
                .map(|(name, ty)| (name.into(), ty))
                .collect(),
        )
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Type::Primitive(p) => p.name(),
            Type::List(_) => "list",
            Type::Set(_) => "set",
            Type::Tuple(_) => "tuple",
            Type::Map(_) => "map",
            Type::Object(_) => "object",
            Type::Dynamic => "dynamic",
        }
    }

    pub fn as_primitive(&self) -> Option<Primitive> {
        match self {
            Type::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, Type::Dynamic)
    }

    /// True if `Dynamic` appears anywhere inside this type.
    pub fn contains_dynamic(&self) -> bool {
        match self {
            Type::Dynamic => true,
            Type::Primitive(_) => false,
            Type::List(e) | Type::Set(e) | Type::Map(e) => e.contains_dynamic(),
            Type::Tuple(es) => es.iter().any(Type::contains_dynamic),
            Type::Object(attrs) => attrs.values().any(Type::contains_dynamic),
        }
    }

    /// True for a tuple with a single, broadcastable element type.
    pub fn is_templated_tuple(&self) -> bool {
        matches!(self, Type::Tuple(es) if es.len() == 1)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Primitive(p) => f.write_str(p.name()),
            Type::List(e) => write!(f, "list({})", e),
            Type::Set(e) => write!(f, "set({})", e),
            Type::Map(e) => write!(f, "map({})", e),
            Type::Tuple(es) => {
                f.write_str("tuple([")?;
                for (i, e) in es.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                f.write_str("])")
            }
            Type::Object(attrs) => {
                f.write_str("object({")?;
                for (i, (name, ty)) in attrs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", name, ty)?;
                }
                f.write_str("})")
            }
            Type::Dynamic => f.write_str("dynamic"),
        }
    }
}
