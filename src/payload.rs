//! Payload transcoding between typed values and schema-free JSON.
//!
//! Decoding follows the declared type and accepts the same string
//! coercions as [`morph`](crate::morph::morph) (`"10"` into a number). A number
//! into a string slot is only accepted where the hint map marks the path
//! [`Hint::AmbiguousNumericString`]; encoding reverses that. Values in
//! `dynamic` slots take the type inferred from the payload.

use serde_json::{Map, Value};

use crate::error::{DecodeError, EncodeError};
use crate::hints::{Hint, HintMap};
use crate::path::Path;
use crate::types::{json_type_name, Primitive, Type};
use crate::value::{format_number, parse_bool, parse_number, Data, State, TypedValue};

/// Decode `payload` as a value of type `target`.
///
/// # Errors
///
/// Returns `DecodeError` when the payload's shape cannot be reconciled with
/// `target`.
pub fn decode(payload: &Value, target: &Type, hints: &HintMap) -> Result<TypedValue, DecodeError> {
    decode_at(payload, target, hints, &Path::root())
}

/// Decode `payload` found at `path`. Hints are looked up by `path`.
pub fn decode_at(
    payload: &Value,
    target: &Type,
    hints: &HintMap,
    path: &Path,
) -> Result<TypedValue, DecodeError> {
    if payload.is_null() {
        return Ok(TypedValue::null(target.clone()));
    }

    match target {
        Type::Dynamic => Ok(infer(payload)),
        Type::Primitive(p) => decode_primitive(payload, *p, hints, path),
        Type::List(element) => {
            let values = decode_elements(payload, element, target, hints, path)?;
            Ok(TypedValue::list((**element).clone(), values))
        }
        Type::Set(element) => {
            let values = decode_elements(payload, element, target, hints, path)?;
            Ok(TypedValue::set((**element).clone(), values))
        }
        Type::Tuple(types) => {
            let items = as_array(payload, target, path)?;
            let effective: Vec<Type> = if items.len() == types.len() {
                types.clone()
            } else if let [template] = types.as_slice() {
                vec![template.clone(); items.len()]
            } else {
                return Err(DecodeError::IncompatibleArity {
                    path: path.to_string(),
                    expected: types.len(),
                    actual: items.len(),
                });
            };
            let values = items
                .iter()
                .zip(&effective)
                .enumerate()
                .map(|(i, (item, ty))| decode_at(item, ty, hints, &path.index(i)))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(TypedValue::tuple(effective, values))
        }
        Type::Map(element) => {
            let object = as_object(payload, target, path)?;
            let entries = object
                .iter()
                .map(|(k, v)| decode_at(v, element, hints, &path.key(k)).map(|d| (k.clone(), d)))
                .collect::<Result<_, _>>()?;
            Ok(TypedValue::map((**element).clone(), entries))
        }
        Type::Object(attributes) => {
            let object = as_object(payload, target, path)?;
            if let Some(name) = object.keys().find(|k| !attributes.contains_key(*k)) {
                return Err(DecodeError::UndeclaredAttribute {
                    path: path.to_string(),
                    name: name.clone(),
                });
            }
            let entries = attributes
                .iter()
                .map(|(name, ty)| {
                    let item = object.get(name).unwrap_or(&Value::Null);
                    decode_at(item, ty, hints, &path.attribute(name)).map(|d| (name.clone(), d))
                })
                .collect::<Result<_, _>>()?;
            Ok(TypedValue::object(attributes.clone(), entries))
        }
    }
}

fn decode_primitive(
    payload: &Value,
    target: Primitive,
    hints: &HintMap,
    path: &Path,
) -> Result<TypedValue, DecodeError> {
    let parse_error = |s: &str| DecodeError::Parse {
        path: path.to_string(),
        value: s.to_string(),
        to: target.name(),
    };
    match (target, payload) {
        (Primitive::String, Value::String(s)) => Ok(TypedValue::string(s.as_str())),
        (Primitive::String, Value::Number(n))
            if hints.effective(path) == Some(Hint::AmbiguousNumericString) =>
        {
            Ok(TypedValue::string(format_number(n)))
        }
        (Primitive::Number, Value::Number(n)) => Ok(TypedValue::number(n.clone())),
        (Primitive::Number, Value::String(s)) => parse_number(s)
            .map(TypedValue::number)
            .ok_or_else(|| parse_error(s.as_str())),
        (Primitive::Bool, Value::Bool(b)) => Ok(TypedValue::bool(*b)),
        (Primitive::Bool, Value::String(s)) => parse_bool(s)
            .map(TypedValue::bool)
            .ok_or_else(|| parse_error(s.as_str())),
        (_, other) => Err(mismatch(&Type::Primitive(target), other, path)),
    }
}

fn decode_elements(
    payload: &Value,
    element: &Type,
    target: &Type,
    hints: &HintMap,
    path: &Path,
) -> Result<Vec<TypedValue>, DecodeError> {
    as_array(payload, target, path)?
        .iter()
        .enumerate()
        .map(|(i, item)| decode_at(item, element, hints, &path.index(i)))
        .collect()
}

fn as_array<'a>(payload: &'a Value, target: &Type, path: &Path) -> Result<&'a Vec<Value>, DecodeError> {
    payload
        .as_array()
        .ok_or_else(|| mismatch(target, payload, path))
}

fn as_object<'a>(
    payload: &'a Value,
    target: &Type,
    path: &Path,
) -> Result<&'a Map<String, Value>, DecodeError> {
    payload
        .as_object()
        .ok_or_else(|| mismatch(target, payload, path))
}

fn mismatch(target: &Type, payload: &Value, path: &Path) -> DecodeError {
    DecodeError::Mismatch {
        path: path.to_string(),
        expected: target.to_string(),
        actual: json_type_name(payload),
    }
}

/// Typed value for a payload in a `dynamic` slot: arrays become tuples and
/// objects become objects of the inferred element types.
pub fn infer(payload: &Value) -> TypedValue {
    match payload {
        Value::Null => TypedValue::null(Type::Dynamic),
        Value::Bool(b) => TypedValue::bool(*b),
        Value::Number(n) => TypedValue::number(n.clone()),
        Value::String(s) => TypedValue::string(s.as_str()),
        Value::Array(items) => {
            let values: Vec<TypedValue> = items.iter().map(infer).collect();
            let types = values.iter().map(|v| v.ty().clone()).collect();
            TypedValue::tuple(types, values)
        }
        Value::Object(object) => {
            let entries: std::collections::BTreeMap<String, TypedValue> = object
                .iter()
                .map(|(k, v)| (k.clone(), infer(v)))
                .collect();
            let attributes = entries
                .iter()
                .map(|(k, v)| (k.clone(), v.ty().clone()))
                .collect();
            TypedValue::object(attributes, entries)
        }
    }
}

/// Encode `value` as a JSON payload.
///
/// Null attributes of an object are left out; null elements of lists and
/// maps are kept as `null`.
///
/// # Errors
///
/// Returns `EncodeError::Unknown` if an unknown value is reached. Collapse
/// unknowns with [`collapse_unknown_to_null`](crate::unknown::collapse_unknown_to_null)
/// before encoding a planned value.
pub fn encode(value: &TypedValue, hints: &HintMap) -> Result<Value, EncodeError> {
    encode_at(value, hints, &Path::root())
}

/// Encode `value` found at `path`. Hints are looked up by `path`.
pub fn encode_at(value: &TypedValue, hints: &HintMap, path: &Path) -> Result<Value, EncodeError> {
    let data = match value.state() {
        State::Unknown => {
            return Err(EncodeError::Unknown {
                path: path.to_string(),
            })
        }
        State::Null => return Ok(Value::Null),
        State::Known(data) => data,
    };

    match data {
        Data::String(s) => {
            if hints.effective(path) == Some(Hint::AmbiguousNumericString) {
                // Only numbers that read back as the same text.
                if let Some(n) = parse_number(s).filter(|n| format_number(n) == *s) {
                    return Ok(Value::Number(n));
                }
            }
            Ok(Value::String(s.clone()))
        }
        Data::Number(n) => Ok(Value::Number(n.clone())),
        Data::Bool(b) => Ok(Value::Bool(*b)),
        Data::List(vs) | Data::Set(vs) | Data::Tuple(vs) => vs
            .iter()
            .enumerate()
            .map(|(i, v)| encode_at(v, hints, &path.index(i)))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Data::Map(es) => {
            let mut object = Map::new();
            for (k, v) in es {
                object.insert(k.clone(), encode_at(v, hints, &path.key(k))?);
            }
            Ok(Value::Object(object))
        }
        Data::Object(es) => {
            let mut object = Map::new();
            for (name, v) in es {
                if v.is_null() {
                    continue;
                }
                object.insert(name.clone(), encode_at(v, hints, &path.attribute(name))?);
            }
            Ok(Value::Object(object))
        }
    }
}
