//! Typed values: every value carries exactly one [`Type`] and is either
//! null, unknown, or known.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Number;

use crate::types::Type;

/// Payload of a known value. The variant must agree with the value's type,
/// except inside a `Dynamic` slot where the type is inferred from the data.
#[derive(Debug, Clone, PartialEq)]
pub enum Data {
    String(String),
    Number(Number),
    Bool(bool),
    List(Vec<TypedValue>),
    Set(Vec<TypedValue>),
    Tuple(Vec<TypedValue>),
    Map(BTreeMap<String, TypedValue>),
    Object(BTreeMap<String, TypedValue>),
}

impl Data {
    pub fn kind(&self) -> &'static str {
        match self {
            Data::String(_) => "string",
            Data::Number(_) => "number",
            Data::Bool(_) => "bool",
            Data::List(_) => "list",
            Data::Set(_) => "set",
            Data::Tuple(_) => "tuple",
            Data::Map(_) => "map",
            Data::Object(_) => "object",
        }
    }
}

/// Three-valued state of a typed value.
#[derive(Debug, Clone, PartialEq)]
pub enum State {
    Null,
    /// Not yet known; only exists while planning, never at rest.
    Unknown,
    Known(Data),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypedValue {
    ty: Type,
    state: State,
}

impl TypedValue {
    pub fn new(ty: Type, state: State) -> Self {
        Self { ty, state }
    }

    pub fn null(ty: Type) -> Self {
        Self::new(ty, State::Null)
    }

    pub fn unknown(ty: Type) -> Self {
        Self::new(ty, State::Unknown)
    }

    pub fn string(s: impl Into<String>) -> Self {
        Self::new(Type::STRING, State::Known(Data::String(s.into())))
    }

    pub fn number(n: impl Into<Number>) -> Self {
        Self::new(Type::NUMBER, State::Known(Data::Number(n.into())))
    }

    pub fn bool(b: bool) -> Self {
        Self::new(Type::BOOL, State::Known(Data::Bool(b)))
    }

    pub fn list(element: Type, values: Vec<TypedValue>) -> Self {
        Self::new(Type::list(element), State::Known(Data::List(values)))
    }

    /// Build a set; values equal to an earlier value are dropped.
    pub fn set(element: Type, values: Vec<TypedValue>) -> Self {
        Self::new(Type::set(element), State::Known(Data::Set(dedupe(values))))
    }

    pub fn tuple(element_types: Vec<Type>, values: Vec<TypedValue>) -> Self {
        Self::new(Type::Tuple(element_types), State::Known(Data::Tuple(values)))
    }

    pub fn map(element: Type, entries: BTreeMap<String, TypedValue>) -> Self {
        Self::new(Type::map(element), State::Known(Data::Map(entries)))
    }

    pub fn object(
        attributes: BTreeMap<String, Type>,
        entries: BTreeMap<String, TypedValue>,
    ) -> Self {
        Self::new(Type::Object(attributes), State::Known(Data::Object(entries)))
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn into_parts(self) -> (Type, State) {
        (self.ty, self.state)
    }

    pub fn data(&self) -> Option<&Data> {
        match &self.state {
            State::Known(data) => Some(data),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.state, State::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self.state, State::Unknown)
    }

    pub fn is_known(&self) -> bool {
        matches!(self.state, State::Known(_))
    }

    /// True if `Unknown` appears at this value or anywhere below it.
    pub fn contains_unknown(&self) -> bool {
        match &self.state {
            State::Unknown => true,
            State::Null => false,
            State::Known(data) => match data {
                Data::List(vs) | Data::Set(vs) | Data::Tuple(vs) => {
                    vs.iter().any(TypedValue::contains_unknown)
                }
                Data::Map(es) | Data::Object(es) => es.values().any(TypedValue::contains_unknown),
                _ => false,
            },
        }
    }

    /// Known all the way down; nulls below are fine.
    pub fn is_fully_known(&self) -> bool {
        self.is_known() && !self.contains_unknown()
    }

    pub fn as_str(&self) -> Option<&str> {
        match self.data() {
            Some(Data::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<&Number> {
        match self.data() {
            Some(Data::Number(n)) => Some(n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.data() {
            Some(Data::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Elements of a known list, set or tuple.
    pub fn elements(&self) -> Option<&[TypedValue]> {
        match self.data() {
            Some(Data::List(vs) | Data::Set(vs) | Data::Tuple(vs)) => Some(vs),
            _ => None,
        }
    }

    /// Entries of a known map or object.
    pub fn entries(&self) -> Option<&BTreeMap<String, TypedValue>> {
        match self.data() {
            Some(Data::Map(es) | Data::Object(es)) => Some(es),
            _ => None,
        }
    }

    /// Attribute or map entry by name.
    pub fn get(&self, name: &str) -> Option<&TypedValue> {
        self.entries().and_then(|es| es.get(name))
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            State::Null => f.write_str("null"),
            State::Unknown => f.write_str("unknown"),
            State::Known(data) => match data {
                Data::String(s) => write!(f, "{:?}", s),
                Data::Number(n) => write!(f, "{}", n),
                Data::Bool(b) => write!(f, "{}", b),
                Data::List(vs) | Data::Set(vs) | Data::Tuple(vs) => {
                    f.write_str("[")?;
                    for (i, v) in vs.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{}", v)?;
                    }
                    f.write_str("]")
                }
                Data::Map(es) | Data::Object(es) => {
                    f.write_str("{")?;
                    for (i, (k, v)) in es.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{}: {}", k, v)?;
                    }
                    f.write_str("}")
                }
            },
        }
    }
}

/// Drop values equal to an earlier value, keeping first-seen order.
pub(crate) fn dedupe(values: Vec<TypedValue>) -> Vec<TypedValue> {
    let mut unique: Vec<TypedValue> = Vec::with_capacity(values.len());
    for v in values {
        if !unique.contains(&v) {
            unique.push(v);
        }
    }
    unique
}

/// Canonical decimal text of a number: integers without a fraction,
/// floats in shortest round-trip form and never in exponent notation.
pub(crate) fn format_number(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        i.to_string()
    } else if let Some(u) = n.as_u64() {
        u.to_string()
    } else {
        n.as_f64().map(|f| f.to_string()).unwrap_or_else(|| n.to_string())
    }
}

/// Parse decimal text into a number, preferring integer representations.
pub(crate) fn parse_number(s: &str) -> Option<Number> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(Number::from(i));
    }
    if let Ok(u) = s.parse::<u64>() {
        return Some(Number::from(u));
    }
    s.parse::<f64>().ok().and_then(Number::from_f64)
}

/// Parse boolean text. Accepts the usual spellings of true and false.
pub(crate) fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "true" | "True" | "TRUE" | "t" | "T" | "1" => Some(true),
        "false" | "False" | "FALSE" | "f" | "F" | "0" => Some(false),
        _ => None,
    }
}
