//! Unknown propagation for planning, and its inverse for persistence.

use std::collections::BTreeMap;

use crate::types::Type;
use crate::value::{dedupe, Data, State, TypedValue};

/// Complete `value` against `target`, marking everything not yet known as
/// unknown.
///
/// Known leaves are kept. Objects always come back known with exactly the
/// declared attributes, and fixed-arity tuples come back known with every
/// position filled. Lists, sets, maps and templated tuples that are not
/// known become unknown as a whole, since their size is not known either.
///
/// A known value in a `dynamic` slot is completed against its own inferred
/// type, so nulls inside an opaque subtree become unknown as well.
///
/// A templated tuple target is widened to the arity of a known value.
/// A known value whose shape does not fit `target` is returned unchanged.
pub fn backfill_unknown(target: &Type, value: &TypedValue) -> TypedValue {
    match target {
        Type::Primitive(_) => {
            if value.is_known() {
                value.clone()
            } else {
                TypedValue::unknown(target.clone())
            }
        }
        // Known values in an open slot carry their inferred type.
        Type::Dynamic => match value.ty() {
            _ if !value.is_known() => TypedValue::unknown(Type::Dynamic),
            Type::Dynamic => value.clone(),
            inferred => backfill_unknown(inferred, value),
        },
        Type::Object(attributes) => {
            let entries = value.entries();
            if value.is_known() && entries.is_none() {
                return value.clone();
            }
            let backfilled = attributes
                .iter()
                .map(|(name, ty)| {
                    let attribute = entries
                        .and_then(|es| es.get(name))
                        .cloned()
                        .unwrap_or_else(|| TypedValue::null(ty.clone()));
                    (name.clone(), backfill_unknown(ty, &attribute))
                })
                .collect();
            TypedValue::object(attributes.clone(), backfilled)
        }
        Type::List(element) | Type::Set(element) => match value.elements() {
            Some(values) => {
                let values = values.iter().map(|v| backfill_unknown(element, v)).collect();
                let data = if matches!(target, Type::Set(_)) {
                    Data::Set(dedupe(values))
                } else {
                    Data::List(values)
                };
                TypedValue::new(target.clone(), State::Known(data))
            }
            None if value.is_known() => value.clone(),
            None => TypedValue::unknown(target.clone()),
        },
        Type::Map(element) => match value.entries() {
            Some(entries) => {
                let entries = entries
                    .iter()
                    .map(|(k, v)| (k.clone(), backfill_unknown(element, v)))
                    .collect();
                TypedValue::map((**element).clone(), entries)
            }
            None if value.is_known() => value.clone(),
            None => TypedValue::unknown(target.clone()),
        },
        Type::Tuple(types) => backfill_tuple(target, types, value),
    }
}

fn backfill_tuple(target: &Type, types: &[Type], value: &TypedValue) -> TypedValue {
    match value.elements() {
        Some(values) => {
            let effective: Vec<Type> = match types {
                [template] if values.len() != 1 => vec![template.clone(); values.len()],
                _ => types.to_vec(),
            };
            if effective.len() != values.len() {
                return value.clone();
            }
            let values = values
                .iter()
                .zip(&effective)
                .map(|(v, t)| backfill_unknown(t, v))
                .collect();
            TypedValue::tuple(effective, values)
        }
        None if value.is_known() => value.clone(),
        // Arity of a templated tuple comes from its value.
        None if types.len() == 1 => TypedValue::unknown(target.clone()),
        None => {
            let values = types
                .iter()
                .map(|t| backfill_unknown(t, &TypedValue::null(t.clone())))
                .collect();
            TypedValue::tuple(types.to_vec(), values)
        }
    }
}

/// Replace every unknown, at any depth, with null of the same type.
pub fn collapse_unknown_to_null(value: &TypedValue) -> TypedValue {
    match value.state() {
        State::Unknown => TypedValue::null(value.ty().clone()),
        State::Null => value.clone(),
        State::Known(data) => {
            let data = match data {
                Data::List(vs) => Data::List(collapse_all(vs)),
                Data::Set(vs) => Data::Set(dedupe(collapse_all(vs))),
                Data::Tuple(vs) => Data::Tuple(collapse_all(vs)),
                Data::Map(es) => Data::Map(collapse_entries(es)),
                Data::Object(es) => Data::Object(collapse_entries(es)),
                leaf => leaf.clone(),
            };
            TypedValue::new(value.ty().clone(), State::Known(data))
        }
    }
}

fn collapse_all(values: &[TypedValue]) -> Vec<TypedValue> {
    values.iter().map(collapse_unknown_to_null).collect()
}

fn collapse_entries(entries: &BTreeMap<String, TypedValue>) -> BTreeMap<String, TypedValue> {
    entries
        .iter()
        .map(|(k, v)| (k.clone(), collapse_unknown_to_null(v)))
        .collect()
}
