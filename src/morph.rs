//! Value morphing - re-types a value into a structurally compatible type.
//!
//! | from | to | rule |
//! |------|----|------|
//! | string | number / bool | parse |
//! | number / bool | string | canonical text |
//! | anything | dynamic | unchanged |
//! | list / set / tuple | list / set | element-wise |
//! | list / set / tuple | tuple(N) | positional when lengths agree, broadcast when N = 1 |
//! | map / object | object | attribute-wise, missing attributes become null |
//! | map / object | map | entry-wise |
//!
//! Null and unknown values keep their state and take the target type. An
//! unknown primitive may not change primitive kind.

use std::collections::BTreeMap;

use crate::error::MorphError;
use crate::path::Path;
use crate::types::{Primitive, Type};
use crate::value::{format_number, parse_bool, parse_number, Data, State, TypedValue};

/// Morph `value` into `target`.
///
/// # Errors
///
/// Returns `MorphError` when no rule converts between the two shapes, a
/// string does not parse, or tuple arities are incompatible.
pub fn morph(value: &TypedValue, target: &Type) -> Result<TypedValue, MorphError> {
    morph_at(value, target, &Path::root())
}

/// Morph `value` into `target`, reporting errors relative to `path`.
pub fn morph_at(value: &TypedValue, target: &Type, path: &Path) -> Result<TypedValue, MorphError> {
    match value.state() {
        State::Null => Ok(TypedValue::null(target.clone())),
        State::Unknown => morph_unknown(value.ty(), target, path),
        State::Known(data) => morph_known(value, data, target, path),
    }
}

fn morph_unknown(from: &Type, target: &Type, path: &Path) -> Result<TypedValue, MorphError> {
    match (from.as_primitive(), target.as_primitive()) {
        (Some(a), Some(b)) if a != b => Err(MorphError::UnknownKindChange {
            path: path.to_string(),
            from: a.name(),
            to: b.name(),
        }),
        _ => Ok(TypedValue::unknown(target.clone())),
    }
}

fn morph_known(
    value: &TypedValue,
    data: &Data,
    target: &Type,
    path: &Path,
) -> Result<TypedValue, MorphError> {
    match (data, target) {
        (_, Type::Dynamic) => Ok(value.clone()),

        (Data::String(s), Type::Primitive(p)) => morph_string(s, *p, path),
        (Data::Number(n), Type::Primitive(Primitive::Number)) => Ok(TypedValue::number(n.clone())),
        (Data::Number(n), Type::Primitive(Primitive::String)) => {
            Ok(TypedValue::string(format_number(n)))
        }
        (Data::Bool(b), Type::Primitive(Primitive::Bool)) => Ok(TypedValue::bool(*b)),
        (Data::Bool(b), Type::Primitive(Primitive::String)) => Ok(TypedValue::string(b.to_string())),

        (Data::List(vs) | Data::Set(vs) | Data::Tuple(vs), Type::List(element)) => {
            let elements = morph_elements(vs, element, path)?;
            Ok(TypedValue::list((**element).clone(), elements))
        }
        (Data::List(vs) | Data::Set(vs) | Data::Tuple(vs), Type::Set(element)) => {
            let elements = morph_elements(vs, element, path)?;
            Ok(TypedValue::set((**element).clone(), elements))
        }
        (Data::List(vs) | Data::Set(vs) | Data::Tuple(vs), Type::Tuple(types)) => {
            morph_tuple(vs, types, path)
        }

        (Data::Map(es), Type::Object(attributes)) => {
            morph_object(es, attributes, path, |p, k| p.key(k))
        }
        (Data::Object(es), Type::Object(attributes)) => {
            morph_object(es, attributes, path, |p, k| p.attribute(k))
        }
        (Data::Map(es), Type::Map(element)) => {
            let entries = morph_entries(es, element, path, |p, k| p.key(k))?;
            Ok(TypedValue::map((**element).clone(), entries))
        }
        (Data::Object(es), Type::Map(element)) => {
            let entries = morph_entries(es, element, path, |p, k| p.attribute(k))?;
            Ok(TypedValue::map((**element).clone(), entries))
        }

        _ => Err(MorphError::Unsupported {
            path: path.to_string(),
            from: value.ty().to_string(),
            to: target.to_string(),
        }),
    }
}

fn morph_string(s: &str, target: Primitive, path: &Path) -> Result<TypedValue, MorphError> {
    let parse_error = || MorphError::Parse {
        path: path.to_string(),
        value: s.to_string(),
        to: target.name(),
    };
    match target {
        Primitive::String => Ok(TypedValue::string(s)),
        Primitive::Number => parse_number(s).map(TypedValue::number).ok_or_else(parse_error),
        Primitive::Bool => parse_bool(s).map(TypedValue::bool).ok_or_else(parse_error),
    }
}

fn morph_elements(
    values: &[TypedValue],
    element: &Type,
    path: &Path,
) -> Result<Vec<TypedValue>, MorphError> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| morph_at(v, element, &path.index(i)))
        .collect()
}

/// Positional morph into a tuple. A single element type is broadcast over
/// every source element.
fn morph_tuple(values: &[TypedValue], types: &[Type], path: &Path) -> Result<TypedValue, MorphError> {
    let effective: Vec<Type> = if values.len() == types.len() {
        types.to_vec()
    } else if let [template] = types {
        vec![template.clone(); values.len()]
    } else {
        return Err(MorphError::IncompatibleArity {
            path: path.to_string(),
            expected: types.len(),
            actual: values.len(),
        });
    };

    let elements = values
        .iter()
        .zip(&effective)
        .enumerate()
        .map(|(i, (v, t))| morph_at(v, t, &path.index(i)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(TypedValue::tuple(effective, elements))
}

fn morph_object(
    entries: &BTreeMap<String, TypedValue>,
    attributes: &BTreeMap<String, Type>,
    path: &Path,
    step: fn(&Path, &str) -> Path,
) -> Result<TypedValue, MorphError> {
    if let Some(name) = entries.keys().find(|name| !attributes.contains_key(*name)) {
        return Err(MorphError::UndeclaredAttribute {
            path: path.to_string(),
            name: name.clone(),
        });
    }

    let mut morphed = BTreeMap::new();
    for (name, ty) in attributes {
        let value = match entries.get(name) {
            Some(v) => morph_at(v, ty, &step(path, name))?,
            None => TypedValue::null(ty.clone()),
        };
        morphed.insert(name.clone(), value);
    }
    Ok(TypedValue::object(attributes.clone(), morphed))
}

fn morph_entries(
    entries: &BTreeMap<String, TypedValue>,
    element: &Type,
    path: &Path,
    step: fn(&Path, &str) -> Path,
) -> Result<BTreeMap<String, TypedValue>, MorphError> {
    entries
        .iter()
        .map(|(k, v)| morph_at(v, element, &step(path, k)).map(|m| (k.clone(), m)))
        .collect()
}
